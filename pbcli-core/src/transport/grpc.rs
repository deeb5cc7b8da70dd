//! # gRPC Transport
//!
//! [`GrpcTransport`] talks to a gRPC server. The schema is resolved in one of two ways:
//!
//! 1. **Server Reflection** (default): every service listed by the server is downloaded
//!    through `grpc.reflection.v1` and merged into one descriptor pool.
//! 2. **File Descriptor**: a local, encoded `FileDescriptorSet` is used instead and the
//!    server is only contacted to perform calls.
use super::{CallArguments, ConnectOptions, SchemaFetchError, Transport, TransportError};
use crate::{
    BoxError,
    grpc::client::GrpcClient,
    reflection::client::ReflectionClient,
    schema::{SchemaDocument, descriptor::schema_from_pool},
};
use http_body::Body as HttpBody;
use prost_reflect::{DescriptorError, DescriptorPool, MethodDescriptor};
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use std::collections::{BTreeMap, HashMap};
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};

/// Errors that can occur when connecting to a gRPC server.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("Invalid URL '{0}': {1}")]
    InvalidUrl(String, #[source] tonic::transport::Error),
    #[error("Failed to configure TLS for '{0}': {1}")]
    Tls(String, #[source] tonic::transport::Error),
    #[error("Failed to connect to '{0}': {1}")]
    ConnectionFailed(String, #[source] tonic::transport::Error),
}

enum SchemaSource<S> {
    Reflection(ReflectionClient<S>),
    FileDescriptor(DescriptorPool),
}

/// A [`Transport`] backed by a gRPC channel (or any compatible Tonic service).
pub struct GrpcTransport<S = Channel> {
    grpc_client: GrpcClient<S>,
    source: SchemaSource<S>,
    headers: Vec<(String, String)>,
    methods: HashMap<String, MethodDescriptor>,
}

impl GrpcTransport<Channel> {
    /// Connects to the server at `url`.
    ///
    /// The timeout of `options` applies to establishing the connection and to every request.
    pub async fn connect(url: &str, options: &ConnectOptions) -> Result<Self, ConnectError> {
        let mut endpoint = Endpoint::new(url.to_string())
            .map_err(|e| ConnectError::InvalidUrl(url.to_string(), e))?
            .timeout(options.timeout)
            .connect_timeout(options.timeout);

        if url.starts_with("https://") {
            endpoint = endpoint
                .tls_config(ClientTlsConfig::new().with_webpki_roots())
                .map_err(|e| ConnectError::Tls(url.to_string(), e))?;
        }

        tracing::debug!(url, "connecting");

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| ConnectError::ConnectionFailed(url.to_string(), e))?;

        Ok(Self::from_service(channel, options.request_headers()))
    }
}

impl<S> GrpcTransport<S>
where
    S: tonic::client::GrpcService<tonic::body::Body> + Clone,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    /// Wraps an existing Tonic service (e.g. a `Channel` or an `InterceptedService`).
    ///
    /// `headers` are attached to every call.
    pub fn from_service(service: S, headers: Vec<(String, String)>) -> Self {
        Self {
            grpc_client: GrpcClient::new(service.clone()),
            source: SchemaSource::Reflection(ReflectionClient::new(service)),
            headers,
            methods: HashMap::new(),
        }
    }

    /// Uses the given encoded `FileDescriptorSet` instead of Server Reflection.
    pub fn with_file_descriptor(self, file_descriptor: &[u8]) -> Result<Self, DescriptorError> {
        let pool = DescriptorPool::decode(file_descriptor)?;
        Ok(self.with_descriptor_pool(pool))
    }

    /// Uses an already decoded descriptor pool instead of Server Reflection.
    pub fn with_descriptor_pool(self, pool: DescriptorPool) -> Self {
        Self {
            source: SchemaSource::FileDescriptor(pool),
            ..self
        }
    }

    async fn resolve_pool(&mut self) -> Result<DescriptorPool, SchemaFetchError> {
        let reflection_client = match &mut self.source {
            SchemaSource::FileDescriptor(pool) => return Ok(pool.clone()),
            SchemaSource::Reflection(client) => client,
        };

        let services = reflection_client.list_services().await?;
        tracing::debug!(?services, "services listed by the server");

        // Files shared between services are returned once per service.
        let mut files: BTreeMap<String, FileDescriptorProto> = BTreeMap::new();
        for service in services
            .iter()
            .filter(|s| !s.starts_with("grpc.reflection."))
        {
            let fd_set = reflection_client
                .file_descriptor_set_by_symbol(service)
                .await?;
            for file in fd_set.file {
                files.entry(file.name().to_string()).or_insert(file);
            }
        }

        Ok(DescriptorPool::from_file_descriptor_set(
            FileDescriptorSet {
                file: files.into_values().collect(),
            },
        )?)
    }
}

impl<S> Transport for GrpcTransport<S>
where
    S: tonic::client::GrpcService<tonic::body::Body> + Clone,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    async fn fetch_schema(&mut self) -> Result<SchemaDocument, SchemaFetchError> {
        let pool = self.resolve_pool().await?;

        self.methods = pool
            .services()
            .flat_map(|service| service.methods().collect::<Vec<_>>())
            .map(|method| (method.name().to_string(), method))
            .collect();

        Ok(schema_from_pool(&pool))
    }

    async fn invoke(
        &mut self,
        operation: &str,
        arguments: CallArguments,
    ) -> Result<serde_json::Value, TransportError> {
        let method = self
            .methods
            .get(operation)
            .ok_or_else(|| TransportError::UnknownOperation(operation.to_string()))?;

        tracing::debug!(method = method.full_name(), "dispatching unary call");

        self.grpc_client
            .unary(method, arguments.into_body(), &self.headers)
            .await?
            .map_err(TransportError::Status)
    }
}
