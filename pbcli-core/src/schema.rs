//! # Schema Model
//!
//! The remote service description, reduced to what a command line needs: a list of
//! [`Operation`]s, each one with a tree of input and output [`ParameterNode`]s.
//!
//! Nodes are built once from the fetched schema (see [`descriptor`]) and never change
//! afterwards. Everything else (flattening, rendering, documentation) is a plain recursive
//! traversal over this tree.
pub mod descriptor;
pub mod flatten;
pub mod render;

pub use flatten::{FlatParameter, flatten};

use serde_json::Value;

/// The transport independent schema of a remote API.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDocument {
    /// Operations in the order the schema declares them.
    pub operations: Vec<Operation>,
}

/// One remotely invokable operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub name: String,
    pub inputs: Vec<ParameterNode>,
    pub outputs: Vec<ParameterNode>,
}

/// One input or output parameter of an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterNode {
    pub name: String,
    pub kind: ParameterKind,
    /// The value is a sequence, not a scalar.
    pub unbounded: bool,
    pub required: bool,
}

/// The resolved type of a [`ParameterNode`].
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterKind {
    Scalar(ScalarKind),
    Enum {
        type_name: String,
        values: Vec<String>,
    },
    Composite {
        type_name: String,
        children: Vec<ParameterNode>,
    },
}

/// Leaf value types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarKind {
    Bool,
    String,
    Bytes,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Float,
    Double,
    /// A structured leaf that is passed through as raw JSON (maps, recursive references).
    Json(String),
}

impl ScalarKind {
    pub fn type_name(&self) -> &str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::String => "string",
            ScalarKind::Bytes => "bytes",
            ScalarKind::Int32 => "int32",
            ScalarKind::Int64 => "int64",
            ScalarKind::Uint32 => "uint32",
            ScalarKind::Uint64 => "uint64",
            ScalarKind::Sint32 => "sint32",
            ScalarKind::Sint64 => "sint64",
            ScalarKind::Fixed32 => "fixed32",
            ScalarKind::Fixed64 => "fixed64",
            ScalarKind::Sfixed32 => "sfixed32",
            ScalarKind::Sfixed64 => "sfixed64",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
            ScalarKind::Json(name) => name,
        }
    }
}

/// Errors produced while coercing a command line string into a parameter value.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValueError {
    #[error("Invalid value '{value}' for parameter '{parameter}': expected {expected}")]
    Invalid {
        parameter: String,
        value: String,
        expected: String,
    },
    #[error("Parameter '{0}' is a structure and cannot be set directly")]
    Composite(String),
}

impl ParameterNode {
    pub fn scalar(name: impl Into<String>, kind: ScalarKind) -> Self {
        Self {
            name: name.into(),
            kind: ParameterKind::Scalar(kind),
            unbounded: false,
            required: false,
        }
    }

    pub fn enumeration(
        name: impl Into<String>,
        type_name: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ParameterKind::Enum {
                type_name: type_name.into(),
                values: values.into_iter().map(Into::into).collect(),
            },
            unbounded: false,
            required: false,
        }
    }

    pub fn composite(
        name: impl Into<String>,
        type_name: impl Into<String>,
        children: Vec<ParameterNode>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ParameterKind::Composite {
                type_name: type_name.into(),
                children,
            },
            unbounded: false,
            required: false,
        }
    }

    pub fn with_unbounded(mut self, unbounded: bool) -> Self {
        self.unbounded = unbounded;
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.kind, ParameterKind::Enum { .. })
    }

    /// Child parameters. Always empty for scalars and enums.
    pub fn children(&self) -> &[ParameterNode] {
        match &self.kind {
            ParameterKind::Composite { children, .. } => children,
            _ => &[],
        }
    }

    /// A node is a leaf when it is an enum or has no children.
    pub fn is_leaf(&self) -> bool {
        self.is_enum() || self.children().is_empty()
    }

    pub fn type_name(&self) -> &str {
        match &self.kind {
            ParameterKind::Scalar(kind) => kind.type_name(),
            ParameterKind::Enum { type_name, .. } => type_name,
            ParameterKind::Composite { type_name, .. } => type_name,
        }
    }

    /// Converts a command line string into the JSON value sent to the remote API.
    ///
    /// Unbounded parameters take a comma separated list.
    pub fn parse_value(&self, raw: &str) -> Result<Value, ValueError> {
        if self.unbounded {
            let items = raw
                .split(',')
                .map(|item| self.parse_single(item.trim()))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Value::Array(items));
        }

        self.parse_single(raw)
    }

    fn parse_single(&self, raw: &str) -> Result<Value, ValueError> {
        let invalid = |expected: &str| ValueError::Invalid {
            parameter: self.name.clone(),
            value: raw.to_string(),
            expected: expected.to_string(),
        };

        match &self.kind {
            ParameterKind::Enum { values, .. } => {
                if values.iter().any(|v| v == raw) {
                    Ok(Value::String(raw.to_string()))
                } else {
                    Err(invalid(&values.join("|")))
                }
            }
            ParameterKind::Composite { children, .. } if children.is_empty() => {
                serde_json::from_str(raw).map_err(|_| invalid("a JSON object"))
            }
            ParameterKind::Composite { .. } => Err(ValueError::Composite(self.name.clone())),
            ParameterKind::Scalar(kind) => match kind {
                ScalarKind::Bool => match raw {
                    "True" | "true" => Ok(Value::Bool(true)),
                    "False" | "false" => Ok(Value::Bool(false)),
                    _ => Err(invalid("True|False")),
                },
                ScalarKind::Int32 | ScalarKind::Sint32 | ScalarKind::Sfixed32 => raw
                    .parse::<i32>()
                    .map(Value::from)
                    .map_err(|_| invalid("a 32-bit integer")),
                ScalarKind::Uint32 | ScalarKind::Fixed32 => raw
                    .parse::<u32>()
                    .map(Value::from)
                    .map_err(|_| invalid("an unsigned 32-bit integer")),
                // The protobuf JSON mapping encodes 64-bit integers as strings.
                ScalarKind::Int64 | ScalarKind::Sint64 | ScalarKind::Sfixed64 => raw
                    .parse::<i64>()
                    .map(|_| Value::String(raw.to_string()))
                    .map_err(|_| invalid("a 64-bit integer")),
                ScalarKind::Uint64 | ScalarKind::Fixed64 => raw
                    .parse::<u64>()
                    .map(|_| Value::String(raw.to_string()))
                    .map_err(|_| invalid("an unsigned 64-bit integer")),
                ScalarKind::Float | ScalarKind::Double => raw
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| invalid("a number")),
                ScalarKind::String | ScalarKind::Bytes => Ok(Value::String(raw.to_string())),
                ScalarKind::Json(_) => serde_json::from_str(raw).map_err(|_| invalid("JSON")),
            },
        }
    }
}
