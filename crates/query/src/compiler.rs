//! Formula compiler: walks a formula AST depth-first and emits one
//! aggregation per engine-native metric call.
//!
//! - Literals and field references are leaves and emit nothing.
//! - Binary operations and math helpers recurse into their operands;
//!   arithmetic runs on returned values, not in the search engine.
//! - Metric calls emit `<seq>-bucket` aggregations, numbered in visit order.
//!   A `kql` named argument wraps the metric in a filter aggregation.
//! - Time-series wrappers (`moving_average`, `cumulative_sum`, …) are not
//!   aggregations. When their first argument is a metric call, that metric
//!   is emitted and the wrapper is recorded against its bucket. Other
//!   arguments emit nothing; unknown functions or metric calls inside them
//!   are errors.
//!
//! Compilation is a pure function: every call builds a fresh compiler, so
//! no state carries over between documents.

use std::collections::BTreeMap;

use crate::ast::{Location, Node, Value};
use crate::document::{
    AggregationNode, Clause, FilterAgg, MetricAgg, MetricKind, QueryDocument, TermsAgg, TermsOrder,
    TimeBounds,
};
use crate::error::CompileError;
use crate::kql::parse_filter_expression;

/// Name of the inner metric inside a `kql` filter aggregation.
pub const FILTERED_METRIC_NAME: &str = "metric";

/// Root aggregation name when no group-by is requested.
pub const FORMULA_ROOT_NAME: &str = "formula";

/// Root aggregation name for grouped formulas.
pub const GROUPED_ROOT_NAME: &str = "groups";

const WRAPPER_FUNCTIONS: &[&str] = &[
    "moving_average",
    "cumulative_sum",
    "differences",
    "counter_rate",
    "rate",
    "normalize_by_unit",
    "overall_sum",
    "overall_average",
    "overall_min",
    "overall_max",
];

const MATH_FUNCTIONS: &[&str] = &[
    "abs", "add", "cbrt", "ceil", "clamp", "cube", "defaults", "divide", "exp", "fix", "floor",
    "log", "mod", "multiply", "pick_max", "pick_min", "pow", "round", "sqrt", "square", "subtract",
];

enum FunctionKind {
    Metric(MetricKind),
    Wrapper,
    Math,
}

fn metric_kind(name: &str) -> Option<MetricKind> {
    match name {
        "count" => Some(MetricKind::Count),
        "average" => Some(MetricKind::Avg),
        "sum" => Some(MetricKind::Sum),
        "max" => Some(MetricKind::Max),
        "min" => Some(MetricKind::Min),
        "percentile" => Some(MetricKind::Percentile),
        "unique_count" => Some(MetricKind::Cardinality),
        "last_value" => Some(MetricKind::LastValue),
        _ => None,
    }
}

fn classify(name: &str) -> Option<FunctionKind> {
    if let Some(kind) = metric_kind(name) {
        return Some(FunctionKind::Metric(kind));
    }
    if WRAPPER_FUNCTIONS.contains(&name) {
        return Some(FunctionKind::Wrapper);
    }
    if MATH_FUNCTIONS.contains(&name) {
        return Some(FunctionKind::Math);
    }
    None
}

// ── Context and output ──────────────────────────────────────────────

/// Optional terms split applied around the formula metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupBy {
    pub field: String,
    pub size: u32,
    pub order: TermsOrder,
}

/// Caller-supplied compilation context.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompileContext {
    /// Target index pattern.
    pub index: String,
    /// Resolved overall time window.
    pub time_range: Option<TimeBounds>,
    /// Additional clauses ANDed into the query.
    pub filters: Vec<Clause>,
    pub group_by: Option<GroupBy>,
}

/// One emitted metric aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricBinding {
    /// Aggregation name, `<seq>-bucket`.
    pub bucket: String,
    pub function: String,
    pub field: Option<String>,
    /// Whether the metric sits inside a `kql` filter aggregation.
    pub filtered: bool,
    pub location: Option<Location>,
}

/// A time-series wrapper discovered around a metric.
#[derive(Debug, Clone, PartialEq)]
pub struct WrapperBinding {
    pub function: String,
    /// Bucket of the wrapped metric.
    pub wraps: String,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFormula {
    pub document: QueryDocument,
    /// Metrics in emission order.
    pub metrics: Vec<MetricBinding>,
    pub wrappers: Vec<WrapperBinding>,
}

// ── Compiler ────────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct FormulaCompiler {
    seq: usize,
    aggs: BTreeMap<String, AggregationNode>,
    metrics: Vec<MetricBinding>,
    wrappers: Vec<WrapperBinding>,
}

impl FormulaCompiler {
    fn next_bucket(&mut self) -> String {
        let name = format!("{}-bucket", self.seq);
        self.seq += 1;
        name
    }

    pub(crate) fn visit(&mut self, node: &Node) -> Result<(), CompileError> {
        match node {
            Node::Literal { .. } | Node::FieldReference { .. } => Ok(()),
            Node::BinaryOperation { left, right, .. } => {
                self.visit(left)?;
                self.visit(right)
            }
            Node::FunctionCall {
                name,
                arguments,
                named_arguments,
                location,
            } => match classify(name) {
                Some(FunctionKind::Metric(kind)) => {
                    self.emit_metric(name, kind, arguments, named_arguments, *location)?;
                    Ok(())
                }
                Some(FunctionKind::Wrapper) => self.visit_wrapper(name, arguments, *location),
                Some(FunctionKind::Math) => {
                    for arg in arguments {
                        self.visit(arg)?;
                    }
                    Ok(())
                }
                None => Err(CompileError::UnknownFunction {
                    name: name.clone(),
                    location: *location,
                }),
            },
        }
    }

    fn visit_wrapper(
        &mut self,
        name: &str,
        arguments: &[Node],
        location: Option<Location>,
    ) -> Result<(), CompileError> {
        let (first, rest) = match arguments.split_first() {
            Some(split) => split,
            None => return Ok(()),
        };

        if let Node::FunctionCall {
            name: inner,
            arguments: inner_args,
            named_arguments: inner_named,
            location: inner_location,
        } = first
        {
            if let Some(kind) = metric_kind(inner) {
                let bucket = self.emit_metric(inner, kind, inner_args, inner_named, *inner_location)?;
                self.wrappers.push(WrapperBinding {
                    function: name.to_string(),
                    wraps: bucket,
                    location,
                });
                return validate_wrapper_arguments(name, rest);
            }
        }

        tracing::debug!(function = name, "wrapper does not wrap a metric call, nothing emitted");
        validate_wrapper_arguments(name, arguments)
    }

    fn emit_metric(
        &mut self,
        name: &str,
        kind: MetricKind,
        arguments: &[Node],
        named: &BTreeMap<String, Value>,
        location: Option<Location>,
    ) -> Result<String, CompileError> {
        let field = match arguments.first() {
            Some(Node::FieldReference { field }) => Some(field.clone()),
            _ => None,
        };
        if field.is_none() && kind.requires_field() {
            return Err(CompileError::MissingField {
                function: name.to_string(),
                location,
            });
        }

        let percentile = if kind == MetricKind::Percentile {
            Some(percentile_argument(name, arguments, named, location)?)
        } else {
            None
        };

        let metric = AggregationNode::Metric(MetricAgg {
            kind,
            field: field.clone(),
            percentile,
        });

        let kql = match named.get("kql") {
            None => None,
            Some(Value::String(expr)) => Some(expr.as_str()),
            Some(_) => {
                return Err(CompileError::InvalidArgument {
                    function: name.to_string(),
                    argument: "kql".to_string(),
                    reason: "expected a string".to_string(),
                    location,
                })
            }
        };

        let bucket = self.next_bucket();
        let node = match kql {
            Some(expr) => {
                let mut sub_aggs = BTreeMap::new();
                sub_aggs.insert(FILTERED_METRIC_NAME.to_string(), metric);
                AggregationNode::Filter(FilterAgg {
                    clause: parse_filter_expression(expr),
                    sub_aggs,
                })
            }
            None => metric,
        };

        self.aggs.insert(bucket.clone(), node);
        self.metrics.push(MetricBinding {
            bucket: bucket.clone(),
            function: name.to_string(),
            field,
            filtered: kql.is_some(),
            location,
        });
        Ok(bucket)
    }

    pub(crate) fn into_parts(self) -> (BTreeMap<String, AggregationNode>, Vec<MetricBinding>, Vec<WrapperBinding>) {
        (self.aggs, self.metrics, self.wrappers)
    }
}

/// Check wrapper arguments that are not wrapped directly. Nothing is
/// emitted for them, so unknown functions and buried metric calls are
/// rejected rather than dropped.
fn validate_wrapper_arguments(wrapper: &str, arguments: &[Node]) -> Result<(), CompileError> {
    for arg in arguments {
        match arg {
            Node::Literal { .. } | Node::FieldReference { .. } => {}
            Node::BinaryOperation { left, right, .. } => {
                validate_wrapper_arguments(wrapper, std::slice::from_ref(&**left))?;
                validate_wrapper_arguments(wrapper, std::slice::from_ref(&**right))?;
            }
            Node::FunctionCall {
                name,
                arguments,
                location,
                ..
            } => match classify(name) {
                None => {
                    return Err(CompileError::UnknownFunction {
                        name: name.clone(),
                        location: *location,
                    })
                }
                Some(FunctionKind::Metric(_)) => {
                    return Err(CompileError::InvalidArgument {
                        function: wrapper.to_string(),
                        argument: name.clone(),
                        reason: "a wrapped metric must be the first argument".to_string(),
                        location: *location,
                    })
                }
                Some(FunctionKind::Wrapper) | Some(FunctionKind::Math) => {
                    validate_wrapper_arguments(wrapper, arguments)?
                }
            },
        }
    }
    Ok(())
}

fn percentile_argument(
    function: &str,
    arguments: &[Node],
    named: &BTreeMap<String, Value>,
    location: Option<Location>,
) -> Result<f64, CompileError> {
    let invalid = |reason: &str| CompileError::InvalidArgument {
        function: function.to_string(),
        argument: "percentile".to_string(),
        reason: reason.to_string(),
        location,
    };

    let value = match named.get("percentile") {
        Some(v) => v.as_f64().ok_or_else(|| invalid("expected a number"))?,
        None => match arguments.get(1) {
            Some(Node::Literal {
                value: Value::Number(n),
            }) => *n,
            _ => return Err(invalid("missing percentile")),
        },
    };

    if !(0.0..=100.0).contains(&value) {
        return Err(invalid("must be between 0 and 100"));
    }
    Ok(value)
}

/// Compile a formula into a query document.
///
/// The AST is only read. Without a group-by the metrics hang off a
/// match-all filter aggregation named `formula`; with one they hang off a
/// terms aggregation named `groups`.
pub fn compile_formula(ast: &Node, ctx: &CompileContext) -> Result<CompiledFormula, CompileError> {
    let mut compiler = FormulaCompiler::default();
    compiler.visit(ast)?;
    let (aggs, metrics, wrappers) = compiler.into_parts();

    let (root_name, root) = match &ctx.group_by {
        Some(group) => (
            GROUPED_ROOT_NAME,
            AggregationNode::Terms(TermsAgg {
                field: group.field.clone(),
                size: group.size,
                order: group.order,
                sub_aggs: aggs,
            }),
        ),
        None => (
            FORMULA_ROOT_NAME,
            AggregationNode::Filter(FilterAgg {
                clause: Clause::MatchAll,
                sub_aggs: aggs,
            }),
        ),
    };

    tracing::debug!(
        metrics = metrics.len(),
        wrappers = wrappers.len(),
        "compiled formula"
    );

    Ok(CompiledFormula {
        document: QueryDocument {
            index: ctx.index.clone(),
            filters: ctx.filters.clone(),
            root_name: root_name.to_string(),
            root,
            time_range: ctx.time_range.clone(),
        },
        metrics,
        wrappers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOp;

    fn ctx() -> CompileContext {
        CompileContext {
            index: "traffic-*".into(),
            ..Default::default()
        }
    }

    fn sub_aggs(compiled: &CompiledFormula) -> &BTreeMap<String, AggregationNode> {
        compiled.document.root.sub_aggs().unwrap()
    }

    #[test]
    fn literals_and_fields_emit_nothing() {
        let compiled = compile_formula(&Node::number(3.0), &ctx()).unwrap();
        assert!(sub_aggs(&compiled).is_empty());
        assert!(compiled.metrics.is_empty());
    }

    #[test]
    fn buckets_numbered_in_visit_order() {
        let ast = Node::binary(
            BinaryOp::Divide,
            Node::call("sum", vec![Node::field("bytes")]),
            Node::call("count", vec![]),
        );
        let compiled = compile_formula(&ast, &ctx()).unwrap();
        let names: Vec<&str> = compiled.metrics.iter().map(|m| m.bucket.as_str()).collect();
        assert_eq!(names, vec!["0-bucket", "1-bucket"]);
        assert_eq!(compiled.metrics[0].function, "sum");
        assert_eq!(compiled.metrics[1].function, "count");
        assert_eq!(
            sub_aggs(&compiled)["0-bucket"],
            AggregationNode::Metric(MetricAgg {
                kind: MetricKind::Sum,
                field: Some("bytes".into()),
                percentile: None
            })
        );
    }

    #[test]
    fn kql_wraps_metric_in_filter() {
        let ast = Node::call("count", vec![])
            .with_named("kql", Value::String("status: 500".into()));
        let compiled = compile_formula(&ast, &ctx()).unwrap();
        let AggregationNode::Filter(filter) = &sub_aggs(&compiled)["0-bucket"] else {
            panic!("expected filter aggregation");
        };
        assert_eq!(
            filter.clause,
            Clause::MatchPhrase {
                field: "status".into(),
                value: "500".into()
            }
        );
        assert!(filter.sub_aggs.contains_key(FILTERED_METRIC_NAME));
        assert!(compiled.metrics[0].filtered);
    }

    #[test]
    fn unknown_function_reports_location() {
        let ast = Node::binary(
            BinaryOp::Add,
            Node::number(1.0),
            Node::call("median_of", vec![Node::field("x")]).at(4, 17),
        );
        assert_eq!(
            compile_formula(&ast, &ctx()),
            Err(CompileError::UnknownFunction {
                name: "median_of".into(),
                location: Some(Location { start: 4, end: 17 })
            })
        );
    }

    #[test]
    fn metric_without_field_is_error() {
        let ast = Node::call("average", vec![Node::number(3.0)]).at(0, 10);
        assert_eq!(
            compile_formula(&ast, &ctx()),
            Err(CompileError::MissingField {
                function: "average".into(),
                location: Some(Location { start: 0, end: 10 })
            })
        );
    }

    #[test]
    fn count_without_field_is_allowed() {
        let compiled = compile_formula(&Node::call("count", vec![]), &ctx()).unwrap();
        assert_eq!(compiled.metrics[0].field, None);
    }

    #[test]
    fn wrapper_discovers_wrapped_metric() {
        let ast = Node::call(
            "moving_average",
            vec![Node::call("sum", vec![Node::field("bytes")])],
        )
        .with_named("window", Value::Number(5.0));
        let compiled = compile_formula(&ast, &ctx()).unwrap();
        assert_eq!(compiled.metrics.len(), 1);
        assert_eq!(
            compiled.wrappers,
            vec![WrapperBinding {
                function: "moving_average".into(),
                wraps: "0-bucket".into(),
                location: None
            }]
        );
        // The wrapper itself is not an aggregation.
        assert_eq!(sub_aggs(&compiled).len(), 1);
    }

    #[test]
    fn wrapper_rejects_metric_buried_in_expression() {
        let ast = Node::call(
            "cumulative_sum",
            vec![Node::binary(
                BinaryOp::Add,
                Node::call("sum", vec![Node::field("a")]).at(15, 21),
                Node::number(1.0),
            )],
        );
        assert_eq!(
            compile_formula(&ast, &ctx()),
            Err(CompileError::InvalidArgument {
                function: "cumulative_sum".into(),
                argument: "sum".into(),
                reason: "a wrapped metric must be the first argument".into(),
                location: Some(Location { start: 15, end: 21 })
            })
        );
    }

    #[test]
    fn wrapper_rejects_unknown_function_argument() {
        let ast = Node::call(
            "moving_average",
            vec![Node::call("median_of", vec![Node::field("x")]).at(15, 27)],
        );
        assert_eq!(
            compile_formula(&ast, &ctx()),
            Err(CompileError::UnknownFunction {
                name: "median_of".into(),
                location: Some(Location { start: 15, end: 27 })
            })
        );

        // Trailing arguments are checked too.
        let ast = Node::call(
            "moving_average",
            vec![
                Node::call("sum", vec![Node::field("bytes")]),
                Node::call("window_of", vec![]).at(30, 41),
            ],
        );
        assert!(matches!(
            compile_formula(&ast, &ctx()),
            Err(CompileError::UnknownFunction { ref name, .. }) if name == "window_of"
        ));
    }

    #[test]
    fn wrapper_with_plain_arguments_emits_nothing() {
        let ast = Node::call("rate", vec![Node::field("bytes"), Node::number(60.0)]);
        let compiled = compile_formula(&ast, &ctx()).unwrap();
        assert!(compiled.metrics.is_empty());
        assert!(compiled.wrappers.is_empty());
    }

    #[test]
    fn math_functions_recurse_into_all_arguments() {
        let ast = Node::call(
            "pick_max",
            vec![
                Node::call("max", vec![Node::field("a")]),
                Node::call("min", vec![Node::field("b")]),
            ],
        );
        let compiled = compile_formula(&ast, &ctx()).unwrap();
        assert_eq!(compiled.metrics.len(), 2);
    }

    #[test]
    fn percentile_from_named_or_positional_argument() {
        let named = Node::call("percentile", vec![Node::field("latency")])
            .with_named("percentile", Value::Number(95.0));
        let compiled = compile_formula(&named, &ctx()).unwrap();
        let AggregationNode::Metric(m) = &sub_aggs(&compiled)["0-bucket"] else {
            panic!("expected metric");
        };
        assert_eq!(m.percentile, Some(95.0));

        let positional = Node::call("percentile", vec![Node::field("latency"), Node::number(99.0)]);
        let compiled = compile_formula(&positional, &ctx()).unwrap();
        let AggregationNode::Metric(m) = &sub_aggs(&compiled)["0-bucket"] else {
            panic!("expected metric");
        };
        assert_eq!(m.percentile, Some(99.0));
    }

    #[test]
    fn percentile_out_of_range_rejected() {
        let ast = Node::call("percentile", vec![Node::field("latency")])
            .with_named("percentile", Value::Number(150.0));
        assert!(matches!(
            compile_formula(&ast, &ctx()),
            Err(CompileError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn non_string_kql_rejected() {
        let ast = Node::call("count", vec![]).with_named("kql", Value::Number(1.0));
        assert!(matches!(
            compile_formula(&ast, &ctx()),
            Err(CompileError::InvalidArgument { ref argument, .. }) if argument == "kql"
        ));
    }

    #[test]
    fn group_by_uses_terms_root() {
        let ctx = CompileContext {
            group_by: Some(GroupBy {
                field: "host.keyword".into(),
                size: 10,
                order: TermsOrder::CountDesc,
            }),
            ..ctx()
        };
        let compiled = compile_formula(&Node::call("count", vec![]), &ctx).unwrap();
        assert_eq!(compiled.document.root_name, GROUPED_ROOT_NAME);
        assert!(matches!(compiled.document.root, AggregationNode::Terms(_)));
    }
}
