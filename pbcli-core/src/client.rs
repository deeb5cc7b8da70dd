//! # API Client
//!
//! [`ApiClient`] ties a [`Transport`] to the [`ActionRegistry`] built from the schema that
//! transport serves. The schema is fetched exactly once, when the client is created.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pbcli_core::client::ApiClient;
//! use pbcli_core::transport::ConnectOptions;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = ApiClient::connect("http://localhost:50051", &ConnectOptions::default()).await?;
//!
//! for name in client.registry().action_names() {
//!     println!("{name}");
//! }
//!
//! let arguments = serde_json::json!({ "dataCenterName": "Test" });
//! let _result = client
//!     .call("createDataCenter", arguments.as_object().cloned().unwrap_or_default())
//!     .await?;
//! # Ok(())
//! # }
//! ```
use crate::{
    action::{ActionDescriptor, CallError},
    registry::{ActionRegistry, SchemaError},
    transport::{ConnectError, ConnectOptions, GrpcTransport, SchemaFetchError, Transport},
};
use serde_json::{Map, Value};
use tonic::transport::Channel;

/// Errors that can occur while creating an [`ApiClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error("Failed to fetch the API schema: {0}")]
    SchemaFetch(#[from] SchemaFetchError),
    #[error("The API schema is not usable: {0}")]
    Schema(#[from] SchemaError),
}

/// A client exposing every operation of the remote API as an action.
pub struct ApiClient<T> {
    transport: T,
    registry: ActionRegistry,
}

impl ApiClient<GrpcTransport<Channel>> {
    /// Connects to `url` and discovers its actions through Server Reflection.
    pub async fn connect(url: &str, options: &ConnectOptions) -> Result<Self, ClientError> {
        let transport = GrpcTransport::connect(url, options).await?;
        Self::new(transport).await
    }
}

impl<T: Transport> ApiClient<T> {
    /// Fetches the schema from `transport` and builds the registry.
    pub async fn new(mut transport: T) -> Result<Self, ClientError> {
        let schema = transport.fetch_schema().await?;
        let registry = ActionRegistry::from_schema(schema)?;
        if registry.is_empty() {
            tracing::warn!("the API schema does not describe any callable operation");
        }
        Ok(Self {
            transport,
            registry,
        })
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn action(&self, name: &str) -> Option<&ActionDescriptor> {
        self.registry.get(name)
    }

    /// Calls the action `name` with flat `arguments`.
    pub async fn call(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Value, CallError> {
        let action = self
            .registry
            .get(name)
            .ok_or_else(|| CallError::UnknownAction(name.to_string()))?;

        action.call(&mut self.transport, arguments).await
    }
}
