//! One scoring pass: compile → execute → normalize → score.

use std::sync::Arc;

use anyhow::{Context, Result};
use rad_core::time_range::{BaselineWindow, InspectionWindow, TimeRangeExpr};
use rad_core::{CategorySet, Config};
use rad_executor::{
    normalize, ExecuteOptions, ExecutorSettings, NormalizedBucket, QueryExecutor, SearchTransport,
};
use rad_query::request::TRAFFIC_ROOT_NAME;
use rad_query::{compile_traffic, CompileContext, CompiledTraffic, TrafficRequest};
use rad_scoring::{score_buckets, CategoryMatcher, ScoreReport, ScoringConfig};

/// Logical query id of the traffic request in the cache.
const TRAFFIC_QUERY_ID: &str = "traffic";

/// Long-lived monitor state. The executor cache survives across passes.
pub struct Monitor {
    config: Config,
    categories: CategorySet,
    current: TimeRangeExpr,
    inspection: Option<InspectionWindow>,
    executor: QueryExecutor,
}

impl Monitor {
    pub fn new(
        config: Config,
        categories: CategorySet,
        current_override: Option<&str>,
        transport: Arc<dyn SearchTransport>,
    ) -> Result<Self> {
        let expr = current_override.unwrap_or(&config.monitor.current_time_range);
        let current = TimeRangeExpr::parse(expr)
            .with_context(|| format!("invalid current time range '{}'", expr))?;
        let inspection = config
            .monitor
            .inspection_window()
            .context("invalid inspection window")?;
        if current == TimeRangeExpr::InspectionTime && inspection.is_none() {
            anyhow::bail!("inspection_time needs --inspect-from and --inspect-to (or RAD_INSPECT_FROM/RAD_INSPECT_TO)");
        }
        let settings = ExecutorSettings::from_configs(&config.cache, &config.elasticsearch);
        Ok(Self {
            executor: QueryExecutor::new(transport, settings),
            config,
            categories,
            current,
            inspection,
        })
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    pub fn request(&self) -> Result<TrafficRequest> {
        let monitor = &self.config.monitor;
        let baseline = BaselineWindow::parse(&monitor.baseline_start, &monitor.baseline_end)
            .context("invalid baseline window")?;
        let mut request = TrafficRequest::new(
            monitor.entity_field.clone(),
            baseline,
            self.current,
            &self.categories.enabled_patterns(),
        );
        request.size = monitor.terms_size;
        request.inspection = self.inspection;
        Ok(request)
    }

    pub fn compile(&self) -> Result<(TrafficRequest, CompiledTraffic)> {
        let request = self.request()?;
        let ctx = CompileContext {
            index: self.config.elasticsearch.index.clone(),
            ..Default::default()
        };
        let compiled = compile_traffic(&request, &ctx).context("failed to compile traffic query")?;
        Ok((request, compiled))
    }

    /// Run one pass. Categories are recompiled per pass.
    pub async fn run_once(&self, options: ExecuteOptions) -> Result<ScoreReport> {
        let (request, compiled) = self.compile()?;
        let raw = self
            .executor
            .execute(TRAFFIC_QUERY_ID, &compiled.document, options)
            .await
            .context("traffic query failed")?;

        let response = normalize(&raw);
        if let Some(error) = &response.error {
            if response.aggregations.is_empty() {
                anyhow::bail!(
                    "search returned an error: {}",
                    error.reason.as_deref().unwrap_or("unknown reason")
                );
            }
        }

        let buckets: &[NormalizedBucket] = match response.aggregation(TRAFFIC_ROOT_NAME) {
            Some(events) => events.buckets(),
            None => {
                tracing::warn!(aggregation = TRAFFIC_ROOT_NAME, "response has no entity aggregation");
                &[]
            }
        };

        let matcher = CategoryMatcher::new(&self.categories)?;
        let scoring = ScoringConfig::new(&request.baseline, &compiled.current)
            .with_thresholds(&self.config.monitor);
        Ok(score_buckets(buckets, &scoring, &matcher))
    }
}
