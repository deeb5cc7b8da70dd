//! # Parameter Flattening
//!
//! Nested parameter structures are expanded depth first into an ordered list of leaves.
//! Each leaf becomes one `--name value` flag on the command line; the nesting is rebuilt
//! from the raw schema when the call is dispatched.
use super::ParameterNode;
use std::collections::HashSet;

/// A leaf reachable by flattening, keyed by its name.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatParameter {
    pub name: String,
    pub node: ParameterNode,
}

/// Two leaves of the same structure ended up with the same name.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Parameter '{0}' appears more than once after flattening")]
pub struct DuplicateParameter(pub String);

/// Flattens `nodes` into their leaves, preserving schema order.
///
/// Enums and nodes without children are emitted as is. Any other node is replaced, in
/// place, by the flattened list of its children.
pub fn flatten(nodes: &[ParameterNode]) -> Result<Vec<FlatParameter>, DuplicateParameter> {
    let mut flat = Vec::new();
    let mut seen = HashSet::new();
    collect(nodes, &mut flat, &mut seen)?;
    Ok(flat)
}

fn collect(
    nodes: &[ParameterNode],
    flat: &mut Vec<FlatParameter>,
    seen: &mut HashSet<String>,
) -> Result<(), DuplicateParameter> {
    for node in nodes {
        if node.is_leaf() {
            if !seen.insert(node.name.clone()) {
                return Err(DuplicateParameter(node.name.clone()));
            }
            flat.push(FlatParameter {
                name: node.name.clone(),
                node: node.clone(),
            });
        } else {
            collect(node.children(), flat, seen)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ScalarKind;

    fn names(flat: &[FlatParameter]) -> Vec<&str> {
        flat.iter().map(|p| p.name.as_str()).collect()
    }

    fn server_request() -> Vec<ParameterNode> {
        vec![ParameterNode::composite(
            "request",
            "createServerRequest",
            vec![
                ParameterNode::scalar("dataCenterId", ScalarKind::String),
                ParameterNode::scalar("cores", ScalarKind::Int32).with_required(true),
                ParameterNode::composite(
                    "network",
                    "networkSettings",
                    vec![
                        ParameterNode::scalar("lanId", ScalarKind::Int32),
                        ParameterNode::scalar("internetAccess", ScalarKind::Bool),
                    ],
                ),
                ParameterNode::enumeration("osType", "osType", ["WINDOWS", "LINUX"]),
                ParameterNode::scalar("ram", ScalarKind::Int32),
            ],
        )]
    }

    #[test]
    fn children_are_spliced_in_place_of_their_parent() {
        let flat = flatten(&server_request()).unwrap();
        assert_eq!(
            names(&flat),
            ["dataCenterId", "cores", "lanId", "internetAccess", "osType", "ram"]
        );
        assert!(flat[1].node.required);
    }

    #[test]
    fn enums_and_empty_composites_are_kept_as_leaves() {
        let nodes = vec![
            ParameterNode::enumeration("region", "region", ["EUROPE"]),
            ParameterNode::composite("options", "options", vec![]),
        ];
        let flat = flatten(&nodes).unwrap();
        assert_eq!(names(&flat), ["region", "options"]);
    }

    #[test]
    fn flattening_a_flat_list_returns_it_unchanged() {
        let flat = flatten(&server_request()).unwrap();
        let leaves: Vec<ParameterNode> = flat.iter().map(|p| p.node.clone()).collect();

        assert_eq!(flatten(&leaves).unwrap(), flat);
    }

    #[test]
    fn name_collisions_between_nested_structures_are_rejected() {
        let nodes = vec![
            ParameterNode::composite(
                "source",
                "address",
                vec![ParameterNode::scalar("ip", ScalarKind::String)],
            ),
            ParameterNode::composite(
                "target",
                "address",
                vec![ParameterNode::scalar("ip", ScalarKind::String)],
            ),
        ];

        assert_eq!(
            flatten(&nodes),
            Err(DuplicateParameter("ip".to_string()))
        );
    }

    #[test]
    fn no_parameters_flatten_to_nothing() {
        assert!(flatten(&[]).unwrap().is_empty());
    }
}
