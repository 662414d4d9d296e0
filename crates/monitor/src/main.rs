mod cli;
mod pipeline;
mod report;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use rad_core::config::load_dotenv;
use rad_core::{CategorySet, Config};
use rad_executor::{ElasticsearchTransport, ExecuteOptions};
use rad_query::{
    compile_formula, parse_filter_expression, CompileContext, GroupBy, Node, TermsOrder,
    TimeBounds,
};

use crate::cli::{CliArgs, Command};
use crate::pipeline::Monitor;

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let mut config = Config::for_profile(args.profile.as_deref().unwrap_or_default());
    if args.inspect_from.is_some() {
        config.monitor.inspect_from = args.inspect_from.clone();
    }
    if args.inspect_to.is_some() {
        config.monitor.inspect_to = args.inspect_to.clone();
    }
    config.log_summary();

    let categories_file = args
        .categories
        .clone()
        .unwrap_or_else(|| config.monitor.categories_file.clone());
    let categories = CategorySet::load(&categories_file)
        .with_context(|| format!("failed to load categories from {}", categories_file.display()))?;

    let transport = Arc::new(ElasticsearchTransport::new(&config.elasticsearch));

    match args.command {
        Command::Kql { expr } => {
            let clause = parse_filter_expression(&expr);
            println!("{}", serde_json::to_string_pretty(&clause.to_json())?);
        }
        Command::Compile { formula, group_by } => {
            let body = match formula {
                Some(path) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    let ast: Node = serde_json::from_str(&text).context("invalid formula AST")?;
                    let ctx = CompileContext {
                        index: config.elasticsearch.index.clone(),
                        time_range: Some(TimeBounds {
                            gte: config.monitor.baseline_start.clone(),
                            lt: "now".to_string(),
                        }),
                        filters: Vec::new(),
                        group_by: group_by.map(|field| GroupBy {
                            field,
                            size: config.monitor.terms_size,
                            order: TermsOrder::CountDesc,
                        }),
                    };
                    let compiled = compile_formula(&ast, &ctx)?;
                    for metric in &compiled.metrics {
                        info!(bucket = %metric.bucket, function = %metric.function, field = ?metric.field, "metric");
                    }
                    for wrapper in &compiled.wrappers {
                        info!(function = %wrapper.function, wraps = %wrapper.wraps, "wrapper");
                    }
                    compiled.document.to_search_body()
                }
                None => {
                    let monitor = Monitor::new(config, categories, args.current.as_deref(), transport)?;
                    let (_, compiled) = monitor.compile()?;
                    compiled.document.to_search_body()
                }
            };
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Run { json, refresh } => {
            let monitor = Monitor::new(config, categories, args.current.as_deref(), transport)?;
            let options = if refresh {
                ExecuteOptions::refresh()
            } else {
                ExecuteOptions::default()
            };
            let report = monitor.run_once(options).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report::render_table(&report));
            }
        }
        Command::Watch { interval, json } => {
            let interval = interval.unwrap_or(config.monitor.poll_interval_secs).max(1);
            let monitor = Monitor::new(config, categories, args.current.as_deref(), transport)?;
            watch(&monitor, Duration::from_secs(interval), json).await;
        }
    }

    Ok(())
}

/// Poll until Ctrl-C. Failed passes are logged and retried on the next tick.
async fn watch(monitor: &Monitor, interval: Duration, json: bool) {
    info!(interval_secs = interval.as_secs(), "watching traffic");
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match monitor.run_once(ExecuteOptions::default()).await {
                    Ok(report) if json => match serde_json::to_string(&report) {
                        Ok(line) => println!("{}", line),
                        Err(e) => error!(error = %e, "failed to serialize report"),
                    },
                    Ok(report) => print!("{}", report::render_table(&report)),
                    Err(e) => error!(error = %format!("{e:#}"), "scoring pass failed"),
                }
                let executor = monitor.executor();
                executor.evict_expired();
                info!("{}", report::render_performance(&executor.stats(), &executor.performance_report()));
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }
}
