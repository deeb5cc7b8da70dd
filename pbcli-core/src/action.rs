//! # Action Descriptor
//!
//! An [`ActionDescriptor`] wraps one remote operation and exposes a uniform call contract:
//! a flat mapping from parameter name to value, validated against the flattened input
//! parameters and packaged back into the shape the operation expects before dispatch.
//!
//! It also produces the human readable documentation of the operation. Both documentation
//! strings are computed on first access and cached for the lifetime of the descriptor.
use crate::{
    INDENTATION,
    schema::{
        FlatParameter, Operation, ParameterNode,
        flatten::{DuplicateParameter, flatten},
        render::{cli_type, doc_type},
    },
    transport::{CallArguments, Transport, TransportError},
};
use serde_json::{Map, Value};
use std::{collections::HashSet, sync::OnceLock};
use tonic::Code;

/// Errors that can occur when calling an action.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("{}", unexpected_arguments_message(.action, .arguments))]
    UnexpectedArgument {
        action: String,
        arguments: Vec<String>,
    },
    #[error("Bad user name and password.")]
    WrongCredentials(#[source] tonic::Status),
    #[error("Server raised a fault: {} ({:?})", .0.message(), .0.code())]
    RemoteFault(tonic::Status),
    #[error("Invalid call '{0}'.")]
    UnknownAction(String),
    #[error(transparent)]
    Transport(TransportError),
}

fn unexpected_arguments_message(action: &str, arguments: &[String]) -> String {
    match arguments {
        [single] => format!("{action}() got an unexpected keyword argument '{single}'"),
        many => format!(
            "{action}() got {} unexpected keyword arguments {}",
            many.len(),
            many.iter()
                .map(|a| format!("'{a}'"))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// One discovered remote operation.
#[derive(Debug)]
pub struct ActionDescriptor {
    name: String,
    inputs: Vec<ParameterNode>,
    outputs: Vec<ParameterNode>,
    flat_inputs: Vec<FlatParameter>,
    input_doc: OnceLock<String>,
    output_doc: OnceLock<String>,
}

impl ActionDescriptor {
    /// Builds the descriptor of `operation`, flattening its inputs once.
    pub fn new(operation: Operation) -> Result<Self, DuplicateParameter> {
        let flat_inputs = flatten(&operation.inputs)?;

        Ok(Self {
            name: operation.name,
            inputs: operation.inputs,
            outputs: operation.outputs,
            flat_inputs,
            input_doc: OnceLock::new(),
            output_doc: OnceLock::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw, unflattened input parameters.
    pub fn inputs(&self) -> &[ParameterNode] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ParameterNode] {
        &self.outputs
    }

    /// The flattened input parameters, in schema order.
    pub fn parameters(&self) -> &[FlatParameter] {
        &self.flat_inputs
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.flat_inputs.iter().map(|p| p.name.as_str())
    }

    pub fn parameter(&self, name: &str) -> Option<&FlatParameter> {
        self.flat_inputs.iter().find(|p| p.name == name)
    }

    /// `true` when the operation takes exactly one parameter and that parameter is a
    /// structure: the flat arguments are then sent wrapped in it.
    pub fn has_composite_input(&self) -> bool {
        matches!(self.inputs.as_slice(), [single] if !single.is_leaf())
    }

    /// Validates `arguments`, packages them and dispatches the call through `transport`.
    pub async fn call<T: Transport>(
        &self,
        transport: &mut T,
        arguments: Map<String, Value>,
    ) -> Result<Value, CallError> {
        let known: HashSet<&str> = self.parameter_names().collect();
        let unexpected: Vec<String> = arguments
            .keys()
            .filter(|key| !known.contains(key.as_str()))
            .cloned()
            .collect();

        if !unexpected.is_empty() {
            return Err(CallError::UnexpectedArgument {
                action: self.name.clone(),
                arguments: unexpected,
            });
        }

        let packaged = self.package(arguments);
        tracing::debug!(action = %self.name, arguments = ?packaged, "calling action");

        match transport.invoke(&self.name, packaged).await {
            Ok(result) => Ok(result),
            Err(TransportError::Status(status)) if status.code() == Code::Unauthenticated => {
                Err(CallError::WrongCredentials(status))
            }
            Err(TransportError::Status(status)) => Err(CallError::RemoteFault(status)),
            Err(err) => Err(CallError::Transport(err)),
        }
    }

    fn package(&self, mut arguments: Map<String, Value>) -> CallArguments {
        match self.inputs.as_slice() {
            [single] if !single.is_leaf() => CallArguments::Composite {
                parameter: single.name.clone(),
                value: nest(single.children(), &mut arguments),
            },
            inputs => CallArguments::Keywords(nest(inputs, &mut arguments)),
        }
    }

    /// Documentation of the input parameters, one line per flattened parameter.
    pub fn input_doc(&self) -> &str {
        self.input_doc.get_or_init(|| {
            let mut doc = String::from("Input parameters:\n\n");
            if self.flat_inputs.is_empty() {
                doc.push_str(&format!("{INDENTATION}None\n"));
            }
            for FlatParameter { name, node } in &self.flat_inputs {
                doc.push_str(&format!(
                    "{INDENTATION}{name}{} :{}{}\n",
                    if node.unbounded { "[]" } else { "" },
                    doc_type(node),
                    if node.required { "  required!" } else { "" },
                ));
            }
            doc
        })
    }

    /// Documentation of the returned structure, indented one level per nesting depth.
    pub fn output_doc(&self) -> &str {
        self.output_doc.get_or_init(|| {
            let mut tree = String::new();
            output_tree(&self.outputs, 1, &mut tree);
            if tree.is_empty() {
                tree = format!("{INDENTATION}None");
            }
            format!("Returned parameters:\n\n{tree}")
        })
    }

    /// Full usage text of the action for `program`, ending with an example invocation.
    pub fn command_line_doc(&self, program: &str) -> String {
        let flags: String = self
            .flat_inputs
            .iter()
            .map(|FlatParameter { name, node }| {
                let flag = format!("--{name} {}", cli_type(node));
                if node.required {
                    format!(" {flag}")
                } else {
                    format!(" [{flag}]")
                }
            })
            .collect();

        format!(
            "{name}\n\n{inputs}\n{outputs}\nExample:\n{INDENTATION}{program} {name}{flags}",
            name = self.name,
            inputs = self.input_doc(),
            outputs = self.output_doc(),
        )
    }
}

/// Rebuilds the nested structure of `nodes` out of flat `arguments`.
///
/// Structures that end up without any value are left out.
fn nest(nodes: &[ParameterNode], arguments: &mut Map<String, Value>) -> Map<String, Value> {
    let mut nested = Map::new();
    for node in nodes {
        if node.is_leaf() {
            if let Some(value) = arguments.remove(&node.name) {
                nested.insert(node.name.clone(), value);
            }
        } else {
            let children = nest(node.children(), arguments);
            if !children.is_empty() {
                nested.insert(node.name.clone(), Value::Object(children));
            }
        }
    }
    nested
}

fn output_tree(nodes: &[ParameterNode], depth: usize, out: &mut String) {
    for node in nodes {
        let type_text = doc_type(node);
        // Structures are listed by their type name; their fields follow, one level deeper.
        let name = if type_text.is_empty() {
            node.type_name()
        } else {
            node.name.as_str()
        };
        out.push_str(&format!(
            "{}{name}{} :{type_text}\n",
            INDENTATION.repeat(depth),
            if node.unbounded { "[]" } else { "" },
        ));

        if !node.is_leaf() {
            output_tree(node.children(), depth + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ScalarKind, SchemaDocument};
    use crate::transport::SchemaFetchError;
    use serde_json::json;

    /// Records every dispatched call and answers with a canned result.
    #[derive(Default)]
    struct RecordingTransport {
        calls: Vec<(String, CallArguments)>,
        status: Option<tonic::Status>,
    }

    impl Transport for RecordingTransport {
        async fn fetch_schema(&mut self) -> Result<SchemaDocument, SchemaFetchError> {
            Ok(SchemaDocument::default())
        }

        async fn invoke(
            &mut self,
            operation: &str,
            arguments: CallArguments,
        ) -> Result<Value, TransportError> {
            self.calls.push((operation.to_string(), arguments));
            match self.status.take() {
                Some(status) => Err(TransportError::Status(status)),
                None => Ok(json!({ "requestId": "2360771" })),
            }
        }
    }

    fn create_data_center() -> ActionDescriptor {
        ActionDescriptor::new(Operation {
            name: "createDataCenter".to_string(),
            inputs: vec![
                ParameterNode::scalar("dataCenterName", ScalarKind::String),
                ParameterNode::enumeration("region", "region", ["EUROPE", "NORTH_AMERICA"]),
            ],
            outputs: vec![
                ParameterNode::scalar("requestId", ScalarKind::String),
                ParameterNode::scalar("dataCenterId", ScalarKind::String),
                ParameterNode::enumeration("region", "region", ["EUROPE", "NORTH_AMERICA"]),
            ],
        })
        .unwrap()
    }

    fn create_server() -> ActionDescriptor {
        ActionDescriptor::new(Operation {
            name: "createServer".to_string(),
            inputs: vec![ParameterNode::composite(
                "request",
                "createServerRequest",
                vec![
                    ParameterNode::scalar("cores", ScalarKind::Int32).with_required(true),
                    ParameterNode::scalar("ram", ScalarKind::Int32).with_required(true),
                    ParameterNode::scalar("internetAccess", ScalarKind::Bool),
                    ParameterNode::scalar("ips", ScalarKind::String).with_unbounded(true),
                ],
            )],
            outputs: vec![ParameterNode::composite(
                "return",
                "createServerResponse",
                vec![
                    ParameterNode::scalar("requestId", ScalarKind::String),
                    ParameterNode::scalar("serverId", ScalarKind::String),
                ],
            )],
        })
        .unwrap()
    }

    fn arguments(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn one_unknown_argument_is_reported_in_singular() {
        let mut transport = RecordingTransport::default();
        let action = create_data_center();

        let err = action
            .call(&mut transport, arguments(json!({ "cores": 1 })))
            .await
            .unwrap_err();

        assert!(matches!(err, CallError::UnexpectedArgument { .. }));
        assert_eq!(
            err.to_string(),
            "createDataCenter() got an unexpected keyword argument 'cores'"
        );
        assert!(transport.calls.is_empty());
    }

    #[tokio::test]
    async fn several_unknown_arguments_are_reported_in_plural() {
        let mut transport = RecordingTransport::default();
        let action = create_data_center();

        let err = action
            .call(
                &mut transport,
                arguments(json!({ "cores": 1, "dataCenterName": "Test", "ram": 256 })),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "createDataCenter() got 2 unexpected keyword arguments 'cores', 'ram'"
        );
    }

    #[tokio::test]
    async fn flat_operations_receive_keyword_arguments() {
        let mut transport = RecordingTransport::default();
        let action = create_data_center();
        assert!(!action.has_composite_input());

        let result = action
            .call(
                &mut transport,
                arguments(json!({ "dataCenterName": "Test", "region": "EUROPE" })),
            )
            .await
            .unwrap();

        assert_eq!(result, json!({ "requestId": "2360771" }));
        assert_eq!(
            transport.calls,
            [(
                "createDataCenter".to_string(),
                CallArguments::Keywords(arguments(
                    json!({ "dataCenterName": "Test", "region": "EUROPE" })
                )),
            )]
        );
    }

    #[tokio::test]
    async fn a_single_structure_receives_its_arguments_packaged() {
        let mut transport = RecordingTransport::default();
        let action = create_server();
        assert!(action.has_composite_input());

        action
            .call(&mut transport, arguments(json!({ "cores": 1, "ram": 256 })))
            .await
            .unwrap();

        assert_eq!(
            transport.calls,
            [(
                "createServer".to_string(),
                CallArguments::Composite {
                    parameter: "request".to_string(),
                    value: arguments(json!({ "cores": 1, "ram": 256 })),
                },
            )]
        );
    }

    #[tokio::test]
    async fn authentication_failures_become_wrong_credentials() {
        let mut transport = RecordingTransport {
            status: Some(tonic::Status::unauthenticated("no")),
            ..Default::default()
        };

        let err = create_data_center()
            .call(&mut transport, Map::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CallError::WrongCredentials(_)));
        assert_eq!(err.to_string(), "Bad user name and password.");
    }

    #[tokio::test]
    async fn other_faults_are_passed_through() {
        let mut transport = RecordingTransport {
            status: Some(tonic::Status::not_found("data center does not exist")),
            ..Default::default()
        };

        let err = create_data_center()
            .call(&mut transport, Map::new())
            .await
            .unwrap_err();

        match err {
            CallError::RemoteFault(status) => {
                assert_eq!(status.code(), Code::NotFound);
                assert_eq!(status.message(), "data center does not exist");
            }
            other => panic!("Expected RemoteFault, got {other:?}"),
        }
    }

    #[test]
    fn input_doc_lists_flattened_parameters() {
        assert_eq!(
            create_server().input_doc(),
            "Input parameters:\n\n\
             \x20   cores : int32  required!\n\
             \x20   ram : int32  required!\n\
             \x20   internetAccess : bool\n\
             \x20   ips[] : string\n"
        );
    }

    #[test]
    fn input_doc_without_parameters() {
        let action = ActionDescriptor::new(Operation {
            name: "getAllDataCenters".to_string(),
            inputs: vec![],
            outputs: vec![],
        })
        .unwrap();

        assert_eq!(action.input_doc(), "Input parameters:\n\n    None\n");
        assert_eq!(action.output_doc(), "Returned parameters:\n\n    None");
    }

    #[test]
    fn output_doc_expands_structures() {
        assert_eq!(
            create_server().output_doc(),
            "Returned parameters:\n\n\
             \x20   createServerResponse :\n\
             \x20       requestId : string\n\
             \x20       serverId : string\n"
        );
        assert_eq!(
            create_data_center().output_doc(),
            "Returned parameters:\n\n\
             \x20   requestId : string\n\
             \x20   dataCenterId : string\n\
             \x20   region : [EUROPE, NORTH_AMERICA]\n"
        );
    }

    #[test]
    fn documentation_is_cached() {
        let action = create_server();
        let first = action.output_doc() as *const str;
        let second = action.output_doc() as *const str;
        assert_eq!(first, second);
    }

    #[test]
    fn command_line_doc_ends_with_an_example() {
        let doc = create_data_center().command_line_doc("pbcli");

        assert!(doc.starts_with("createDataCenter\n\nInput parameters:\n\n"));
        assert!(doc.contains("\nReturned parameters:\n\n"));
        assert!(doc.ends_with(
            "\nExample:\n    pbcli createDataCenter [--dataCenterName <string>] \
             [--region EUROPE|NORTH_AMERICA]"
        ));

        let doc = create_server().command_line_doc("pbcli");
        assert!(doc.ends_with(
            "pbcli createServer --cores <int32> --ram <int32> \
             [--internetAccess True|False] [--ips <string>]"
        ));
    }
}
