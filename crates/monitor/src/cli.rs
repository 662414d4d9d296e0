use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Traffic anomaly monitor.
///
/// Compiles the baseline-vs-current traffic query, runs it against
/// Elasticsearch and scores every entity against its baseline.
#[derive(Parser, Debug)]
#[command(name = "rad-monitor", about = "Traffic anomaly monitor")]
pub struct CliArgs {
    /// Config profile (keys are read as {PROFILE}_{KEY} first)
    #[arg(long, env = "RAD_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Category configuration file (overrides RAD_CATEGORIES_FILE)
    #[arg(long, global = true)]
    pub categories: Option<PathBuf>,

    /// Current window: now-<N><h|d|w>, -<N><unit>-<M><unit> or inspection_time
    #[arg(long, global = true)]
    pub current: Option<String>,

    /// Start of the inspection_time window, date or RFC 3339 (overrides RAD_INSPECT_FROM)
    #[arg(long, global = true)]
    pub inspect_from: Option<String>,

    /// End of the inspection_time window, date or RFC 3339 (overrides RAD_INSPECT_TO)
    #[arg(long, global = true)]
    pub inspect_to: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the search body for the traffic request or a formula
    Compile {
        /// Formula AST as JSON; compiles the traffic request when absent
        #[arg(long)]
        formula: Option<PathBuf>,

        /// Split formula metrics by this field
        #[arg(long, requires = "formula")]
        group_by: Option<String>,
    },

    /// Translate a filter expression and print the resulting clause
    Kql {
        expr: String,
    },

    /// Run one scoring pass
    Run {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Bypass the response cache
        #[arg(long)]
        refresh: bool,
    },

    /// Poll and score on an interval until interrupted
    Watch {
        /// Seconds between polls (defaults to RAD_POLL_INTERVAL_SECS)
        #[arg(long)]
        interval: Option<u64>,

        /// Print each report as JSON
        #[arg(long)]
        json: bool,
    },
}
