//! Formula AST as produced by the external formula parser.
//!
//! The compiler only reads these nodes. JSON shape:
//!
//! ```json
//! { "type": "function_call", "name": "sum",
//!   "arguments": [{ "type": "field_reference", "field": "bytes" }],
//!   "named_arguments": { "kql": "status: \"500\"" },
//!   "location": { "start": 0, "end": 10 } }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Source span of a node within the original formula text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub start: usize,
    pub end: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Literal value in a formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    String(String),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
}

/// A formula node. Closed set: the compiler matches exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Literal {
        value: Value,
    },
    FieldReference {
        field: String,
    },
    FunctionCall {
        name: String,
        #[serde(default)]
        arguments: Vec<Node>,
        #[serde(default)]
        named_arguments: BTreeMap<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<Location>,
    },
    BinaryOperation {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    pub fn number(n: f64) -> Self {
        Node::Literal {
            value: Value::Number(n),
        }
    }

    pub fn string(s: impl Into<String>) -> Self {
        Node::Literal {
            value: Value::String(s.into()),
        }
    }

    pub fn field(field: impl Into<String>) -> Self {
        Node::FieldReference {
            field: field.into(),
        }
    }

    pub fn call(name: impl Into<String>, arguments: Vec<Node>) -> Self {
        Node::FunctionCall {
            name: name.into(),
            arguments,
            named_arguments: BTreeMap::new(),
            location: None,
        }
    }

    pub fn binary(op: BinaryOp, left: Node, right: Node) -> Self {
        Node::BinaryOperation {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Attach a named argument. No-op on anything but a function call.
    pub fn with_named(mut self, key: impl Into<String>, value: Value) -> Self {
        if let Node::FunctionCall {
            named_arguments, ..
        } = &mut self
        {
            named_arguments.insert(key.into(), value);
        }
        self
    }

    /// Attach a source location. No-op on anything but a function call.
    pub fn at(mut self, start: usize, end: usize) -> Self {
        if let Node::FunctionCall { location, .. } = &mut self {
            *location = Some(Location { start, end });
        }
        self
    }
}
