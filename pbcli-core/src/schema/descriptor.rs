//! # Schema from Protobuf Descriptors
//!
//! Converts a `prost_reflect::DescriptorPool` into a [`SchemaDocument`].
//!
//! Every unary method of every service (except the reflection service itself) becomes an
//! [`Operation`]. The fields of its request message are the inputs, the fields of its
//! response message are the outputs.
use super::{Operation, ParameterKind, ParameterNode, ScalarKind, SchemaDocument};
use prost_reflect::{
    Cardinality, DescriptorPool, FieldDescriptor, Kind, MessageDescriptor, MethodDescriptor,
};

const REFLECTION_PACKAGE: &str = "grpc.reflection.";

/// Builds the schema of every service available in `pool`.
pub fn schema_from_pool(pool: &DescriptorPool) -> SchemaDocument {
    let operations = pool
        .services()
        .filter(|service| !service.full_name().starts_with(REFLECTION_PACKAGE))
        .flat_map(|service| service.methods().collect::<Vec<_>>())
        .filter_map(|method| operation_from_method(&method))
        .collect();

    SchemaDocument { operations }
}

/// Streaming methods have no single request/response pair and are skipped.
pub fn operation_from_method(method: &MethodDescriptor) -> Option<Operation> {
    if method.is_client_streaming() || method.is_server_streaming() {
        tracing::debug!(method = method.full_name(), "skipping streaming method");
        return None;
    }

    Some(Operation {
        name: method.name().to_string(),
        inputs: message_fields(&method.input(), &mut Vec::new()),
        outputs: message_fields(&method.output(), &mut Vec::new()),
    })
}

fn message_fields(message: &MessageDescriptor, path: &mut Vec<String>) -> Vec<ParameterNode> {
    path.push(message.full_name().to_string());
    let nodes = message
        .fields()
        .map(|field| field_node(&field, path))
        .collect();
    path.pop();
    nodes
}

fn field_node(field: &FieldDescriptor, path: &mut Vec<String>) -> ParameterNode {
    let kind = match field.kind() {
        Kind::Message(entry) if field.is_map() => {
            let key = kind_name(&entry.map_entry_key_field().kind());
            let value = kind_name(&entry.map_entry_value_field().kind());
            ParameterKind::Scalar(ScalarKind::Json(format!("map<{key}, {value}>")))
        }
        // A message that is already being expanded would never terminate.
        Kind::Message(message) if path.iter().any(|name| name == message.full_name()) => {
            ParameterKind::Scalar(ScalarKind::Json(message.name().to_string()))
        }
        Kind::Message(message) => ParameterKind::Composite {
            type_name: message.name().to_string(),
            children: message_fields(&message, path),
        },
        Kind::Enum(enumeration) => ParameterKind::Enum {
            type_name: enumeration.name().to_string(),
            values: enumeration.values().map(|v| v.name().to_string()).collect(),
        },
        other => ParameterKind::Scalar(scalar_kind(&other)),
    };

    ParameterNode {
        name: field.name().to_string(),
        kind,
        unbounded: field.is_list(),
        required: field.cardinality() == Cardinality::Required,
    }
}

fn scalar_kind(kind: &Kind) -> ScalarKind {
    match kind {
        Kind::Double => ScalarKind::Double,
        Kind::Float => ScalarKind::Float,
        Kind::Int32 => ScalarKind::Int32,
        Kind::Int64 => ScalarKind::Int64,
        Kind::Uint32 => ScalarKind::Uint32,
        Kind::Uint64 => ScalarKind::Uint64,
        Kind::Sint32 => ScalarKind::Sint32,
        Kind::Sint64 => ScalarKind::Sint64,
        Kind::Fixed32 => ScalarKind::Fixed32,
        Kind::Fixed64 => ScalarKind::Fixed64,
        Kind::Sfixed32 => ScalarKind::Sfixed32,
        Kind::Sfixed64 => ScalarKind::Sfixed64,
        Kind::Bool => ScalarKind::Bool,
        Kind::String => ScalarKind::String,
        Kind::Bytes => ScalarKind::Bytes,
        Kind::Message(m) => ScalarKind::Json(m.name().to_string()),
        Kind::Enum(e) => ScalarKind::Json(e.name().to_string()),
    }
}

fn kind_name(kind: &Kind) -> String {
    match kind {
        Kind::Message(m) => m.name().to_string(),
        Kind::Enum(e) => e.name().to_string(),
        other => scalar_kind(other).type_name().to_string(),
    }
}
