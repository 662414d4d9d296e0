//! Structured requests that compile without a formula.

use std::collections::BTreeMap;

use rad_core::time_range::{BaselineWindow, InspectionWindow, ResolvedRange, TimeRangeExpr};

use crate::ast::Node;
use crate::compiler::{CompileContext, CompiledFormula, FormulaCompiler, GroupBy};
use crate::document::{
    AggregationNode, Clause, DateHistogramAgg, FilterAgg, QueryDocument, TermsAgg, TermsOrder,
    TimeBounds, TIMESTAMP_FIELD,
};
use crate::error::CompileError;
use crate::patterns::build_pattern_filter;

/// Root aggregation name of a traffic request.
pub const TRAFFIC_ROOT_NAME: &str = "events";
pub const BASELINE_AGG: &str = "baseline";
pub const CURRENT_AGG: &str = "current";
/// Root aggregation name of a time-series request.
pub const TIME_SERIES_ROOT_NAME: &str = "timeline";
/// Name of the terms split nested under each histogram bucket.
pub const SPLIT_AGG: &str = "split";

pub const DEFAULT_TERMS_SIZE: u32 = 500;

// ── Traffic analysis ────────────────────────────────────────────────

/// Baseline-vs-current volume per entity.
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficRequest {
    pub entity_field: String,
    pub baseline: BaselineWindow,
    pub current: TimeRangeExpr,
    /// Required when `current` is `inspection_time`.
    pub inspection: Option<InspectionWindow>,
    pub size: u32,
    /// Enabled category glob patterns.
    pub patterns: Vec<String>,
}

impl TrafficRequest {
    pub fn new(
        entity_field: impl Into<String>,
        baseline: BaselineWindow,
        current: TimeRangeExpr,
        patterns: &[String],
    ) -> Self {
        Self {
            entity_field: entity_field.into(),
            baseline,
            current,
            inspection: None,
            size: DEFAULT_TERMS_SIZE,
            patterns: patterns.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTraffic {
    pub document: QueryDocument,
    /// The resolved current window, whose `hours` feeds scoring.
    pub current: ResolvedRange,
    /// Whether the built-in default category pattern was used.
    pub pattern_fallback: bool,
}

fn range_filter(gte: &str, lt: &str) -> AggregationNode {
    AggregationNode::Filter(FilterAgg {
        clause: Clause::range(TIMESTAMP_FIELD, Some(gte.to_string()), Some(lt.to_string())),
        sub_aggs: BTreeMap::new(),
    })
}

/// Overall window covering both the baseline and the current range.
fn overall_bounds(req: &TrafficRequest) -> TimeBounds {
    match (&req.current, &req.inspection) {
        (TimeRangeExpr::InspectionTime, Some(window)) => TimeBounds {
            gte: req.baseline.start_at().min(window.from).to_rfc3339(),
            lt: req.baseline.end_at().max(window.to).to_rfc3339(),
        },
        _ => TimeBounds {
            gte: req.baseline.start.clone(),
            lt: "now".to_string(),
        },
    }
}

/// Compile a traffic request into a terms aggregation over the entity
/// field with `baseline` and `current` filter sub-aggregations.
///
/// The category pattern filter is prepended to the context filters.
pub fn compile_traffic(
    req: &TrafficRequest,
    ctx: &CompileContext,
) -> Result<CompiledTraffic, CompileError> {
    let current = req.current.resolve(req.inspection.as_ref())?;
    let pattern = build_pattern_filter(&req.entity_field, &req.patterns);

    let mut sub_aggs = BTreeMap::new();
    sub_aggs.insert(
        BASELINE_AGG.to_string(),
        range_filter(&req.baseline.start, &req.baseline.end),
    );
    sub_aggs.insert(CURRENT_AGG.to_string(), range_filter(&current.gte, &current.lt));

    let mut filters = Vec::with_capacity(ctx.filters.len() + 1);
    filters.push(pattern.clause);
    filters.extend(ctx.filters.iter().cloned());

    let time_range = ctx
        .time_range
        .clone()
        .unwrap_or_else(|| overall_bounds(req));

    tracing::debug!(
        entity_field = %req.entity_field,
        current = %req.current,
        current_hours = current.hours,
        size = req.size,
        "compiled traffic request"
    );

    Ok(CompiledTraffic {
        document: QueryDocument {
            index: ctx.index.clone(),
            filters,
            root_name: TRAFFIC_ROOT_NAME.to_string(),
            root: AggregationNode::Terms(TermsAgg {
                field: req.entity_field.clone(),
                size: req.size,
                order: TermsOrder::KeyAsc,
                sub_aggs,
            }),
            time_range: Some(time_range),
        },
        current,
        pattern_fallback: pattern.used_fallback,
    })
}

// ── Time series ─────────────────────────────────────────────────────

/// Fixed-interval histogram, optionally split by terms, with optional
/// formula metrics in every bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesRequest {
    /// Fixed interval such as `30m` or `1h`.
    pub interval: String,
    pub split: Option<GroupBy>,
    pub formula: Option<Node>,
}

fn valid_interval(interval: &str) -> bool {
    let digits = interval.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0
        && interval.len() == digits + 1
        && matches!(interval.as_bytes()[digits], b's' | b'm' | b'h' | b'd')
        && interval[..digits].parse::<u64>().map_or(false, |n| n > 0)
}

/// Compile a time-series request. Formula metrics sit in each histogram
/// bucket, or in each split bucket when a split is requested.
pub fn compile_time_series(
    req: &TimeSeriesRequest,
    ctx: &CompileContext,
) -> Result<CompiledFormula, CompileError> {
    if !valid_interval(&req.interval) {
        return Err(CompileError::InvalidArgument {
            function: "date_histogram".to_string(),
            argument: "interval".to_string(),
            reason: format!("'{}' is not a fixed interval", req.interval),
            location: None,
        });
    }

    let mut compiler = FormulaCompiler::default();
    if let Some(formula) = &req.formula {
        compiler.visit(formula)?;
    }
    let (metric_aggs, metrics, wrappers) = compiler.into_parts();

    let sub_aggs = match &req.split {
        Some(split) => {
            let mut aggs = BTreeMap::new();
            aggs.insert(
                SPLIT_AGG.to_string(),
                AggregationNode::Terms(TermsAgg {
                    field: split.field.clone(),
                    size: split.size,
                    order: split.order,
                    sub_aggs: metric_aggs,
                }),
            );
            aggs
        }
        None => metric_aggs,
    };

    Ok(CompiledFormula {
        document: QueryDocument {
            index: ctx.index.clone(),
            filters: ctx.filters.clone(),
            root_name: TIME_SERIES_ROOT_NAME.to_string(),
            root: AggregationNode::DateHistogram(DateHistogramAgg {
                field: TIMESTAMP_FIELD.to_string(),
                fixed_interval: req.interval.clone(),
                sub_aggs,
            }),
            time_range: ctx.time_range.clone(),
        },
        metrics,
        wrappers,
    })
}
