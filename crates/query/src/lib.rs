//! Query compilation for the traffic anomaly monitor.
//!
//! This crate provides:
//! - The formula AST consumed from the external formula parser
//! - A compiler from formulas and structured requests to aggregation queries
//! - A restricted KQL translator for `kql:` named arguments
//! - The query document model and its `_search` body rendering
//! - Category pattern filters

pub mod ast;
pub mod compiler;
pub mod document;
pub mod error;
pub mod kql;
pub mod patterns;
pub mod request;

pub use ast::{BinaryOp, Location, Node, Value};
pub use compiler::{compile_formula, CompileContext, CompiledFormula, GroupBy, MetricBinding, WrapperBinding};
pub use document::{
    AggregationNode, BoolClause, Clause, DateHistogramAgg, FilterAgg, MetricAgg, MetricKind,
    QueryDocument, RangeClause, TermsAgg, TermsOrder, TimeBounds, TIMESTAMP_FIELD,
};
pub use error::CompileError;
pub use kql::parse_filter_expression;
pub use patterns::{build_pattern_filter, PatternFilter};
pub use request::{compile_time_series, compile_traffic, CompiledTraffic, TimeSeriesRequest, TrafficRequest};
