//! # Transport
//!
//! The seam between the action engine and the network. A [`Transport`] knows how to fetch
//! the remote schema and how to invoke one operation with already packaged arguments;
//! everything else (validation, flattening, documentation) lives above it.
//!
//! [`GrpcTransport`] is the production implementation.
pub mod grpc;

pub use grpc::{ConnectError, GrpcTransport};

use crate::{
    grpc::client::GrpcRequestError, reflection::client::ReflectionResolveError,
    schema::SchemaDocument,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use prost_reflect::DescriptorError;
use serde_json::{Map, Value};
use std::{fmt, future::Future, time::Duration};

/// Default timeout for connecting and for every request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

/// Arguments of one call, packaged the way the operation expects them.
#[derive(Debug, Clone, PartialEq)]
pub enum CallArguments {
    /// The operation takes its parameters directly.
    Keywords(Map<String, Value>),
    /// The operation takes exactly one structure, named `parameter`.
    Composite {
        parameter: String,
        value: Map<String, Value>,
    },
}

impl CallArguments {
    /// The request body as a single JSON object.
    pub fn into_body(self) -> Value {
        match self {
            CallArguments::Keywords(arguments) => Value::Object(arguments),
            CallArguments::Composite { parameter, value } => {
                let mut body = Map::new();
                body.insert(parameter, Value::Object(value));
                Value::Object(body)
            }
        }
    }
}

/// Errors that can occur while fetching the remote schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaFetchError {
    #[error("Reflection resolution failed: '{0}'")]
    ReflectionResolve(#[from] ReflectionResolveError),
    #[error("Failed to decode file descriptor set: '{0}'")]
    DescriptorError(#[from] DescriptorError),
}

/// Errors that can occur while invoking a remote operation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Server returned status {}: {}", .0.code(), .0.message())]
    Status(tonic::Status),
    #[error("gRPC client request error: '{0}'")]
    Request(#[from] GrpcRequestError),
    #[error("Operation '{0}' is not part of the fetched schema")]
    UnknownOperation(String),
}

/// Fetches the remote schema and invokes operations.
pub trait Transport {
    fn fetch_schema(&mut self) -> impl Future<Output = Result<SchemaDocument, SchemaFetchError>>;

    fn invoke(
        &mut self,
        operation: &str,
        arguments: CallArguments,
    ) -> impl Future<Output = Result<Value, TransportError>>;
}

/// Username and password sent with every request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// HTTP basic authentication, as a metadata header.
    pub fn authorization_header(&self) -> (String, String) {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        ("authorization".to_string(), format!("Basic {token}"))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Settings applied when connecting to the remote API.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub timeout: Duration,
    pub credentials: Option<Credentials>,
    /// Extra metadata (headers) attached to every request.
    pub headers: Vec<(String, String)>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            credentials: None,
            headers: Vec::new(),
        }
    }
}

impl ConnectOptions {
    /// All headers sent with a request, credentials first.
    pub fn request_headers(&self) -> Vec<(String, String)> {
        self.credentials
            .iter()
            .map(Credentials::authorization_header)
            .chain(self.headers.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn composite_arguments_are_wrapped_in_their_parameter() {
        let value = json!({ "cores": 1, "ram": 256 }).as_object().unwrap().clone();
        let arguments = CallArguments::Composite {
            parameter: "request".to_string(),
            value,
        };

        assert_eq!(
            arguments.into_body(),
            json!({ "request": { "cores": 1, "ram": 256 } })
        );
    }

    #[test]
    fn keyword_arguments_are_sent_as_is() {
        let map = json!({ "dataCenterName": "Test" }).as_object().unwrap().clone();
        assert_eq!(
            CallArguments::Keywords(map).into_body(),
            json!({ "dataCenterName": "Test" })
        );
    }

    #[test]
    fn credentials_use_basic_authentication() {
        let credentials = Credentials::new("user", "secret");
        assert_eq!(
            credentials.authorization_header(),
            ("authorization".to_string(), "Basic dXNlcjpzZWNyZXQ=".to_string())
        );
        assert!(!format!("{credentials:?}").contains("secret"));
    }

    #[test]
    fn credentials_come_before_extra_headers() {
        let options = ConnectOptions {
            credentials: Some(Credentials::new("user", "secret")),
            headers: vec![("x-request-id".to_string(), "42".to_string())],
            ..Default::default()
        };

        let headers = options.request_headers();
        assert_eq!(headers[0].0, "authorization");
        assert_eq!(headers[1], ("x-request-id".to_string(), "42".to_string()));
    }
}
