//! # Type Rendering
//!
//! Human readable type strings, shared by the command line hints and the call
//! documentation. Structures render as an empty string: they are expanded, not named.
use super::{ParameterKind, ParameterNode, ScalarKind};

/// Type hint used on the command line, e.g. `<int32>`, `True|False` or `EUROPE|NORTH_AMERICA`.
pub fn cli_type(node: &ParameterNode) -> String {
    match &node.kind {
        ParameterKind::Enum { values, .. } => values.join("|"),
        ParameterKind::Scalar(ScalarKind::Bool) => "True|False".to_string(),
        ParameterKind::Composite { children, .. } if !children.is_empty() => String::new(),
        _ => format!("<{}>", node.type_name()),
    }
}

/// Type shown in the documentation, e.g. ` int32` or ` [EUROPE, NORTH_AMERICA]`.
///
/// The leading space is part of the rendering so lines read `name :type`.
pub fn doc_type(node: &ParameterNode) -> String {
    match &node.kind {
        ParameterKind::Enum { values, .. } => format!(" [{}]", values.join(", ")),
        ParameterKind::Composite { children, .. } if !children.is_empty() => String::new(),
        _ => format!(" {}", node.type_name()),
    }
}
