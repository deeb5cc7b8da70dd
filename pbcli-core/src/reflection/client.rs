//! # Reflection Client
//!
//! A client for `grpc.reflection.v1`, built on the bindings shipped by `tonic-reflection`.
//!
//! Schema downloads run over a single bidirectional stream: the file defining the requested
//! symbol is asked for first, then every import that has not been seen yet, until the
//! dependency tree is closed.
//!
//! ## References
//!
//! * [gRPC Server Reflection Protocol](https://github.com/grpc/grpc/blob/master/doc/server-reflection.md)
use crate::BoxError;
use futures_util::stream::once;
use http_body::Body as HttpBody;
use prost::Message;
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::Channel;
use tonic::{Streaming, client::GrpcService};
use tonic_reflection::pb::v1::{
    ServerReflectionRequest, ServerReflectionResponse,
    server_reflection_client::ServerReflectionClient, server_reflection_request::MessageRequest,
    server_reflection_response::MessageResponse,
};

#[derive(Debug, thiserror::Error)]
pub enum ReflectionResolveError {
    #[error("Server Reflection is not available: '{0}'")]
    StreamStart(#[source] tonic::Status),
    #[error("Server Reflection stream failed: '{0}'")]
    Stream(#[source] tonic::Status),
    #[error("Server Reflection stream ended before all answers arrived")]
    StreamClosed,
    #[error("Server Reflection stream no longer accepts requests")]
    SendFailed,
    #[error("Server Reflection answered with error {code}: {message}")]
    Server { code: i32, message: String },
    #[error("Server Reflection sent an unexpected answer: {0}")]
    UnexpectedResponse(String),
    #[error("Failed to decode a file descriptor: {0}")]
    Decode(#[from] prost::DecodeError),
}

fn request(message: MessageRequest) -> ServerReflectionRequest {
    ServerReflectionRequest {
        host: String::new(),
        message_request: Some(message),
    }
}

/// Pulls the payload out of one answer, turning anything else into an error.
fn expect<T>(
    response: ServerReflectionResponse,
    extract: impl FnOnce(MessageResponse) -> Result<T, MessageResponse>,
) -> Result<T, ReflectionResolveError> {
    match response.message_response.map(extract) {
        Some(Ok(payload)) => Ok(payload),
        Some(Err(MessageResponse::ErrorResponse(e))) => Err(ReflectionResolveError::Server {
            code: e.error_code,
            message: e.error_message,
        }),
        Some(Err(other)) => Err(ReflectionResolveError::UnexpectedResponse(format!("{other:?}"))),
        None => Err(ReflectionResolveError::UnexpectedResponse("empty answer".into())),
    }
}

async fn next_response(
    stream: &mut Streaming<ServerReflectionResponse>,
) -> Result<ServerReflectionResponse, ReflectionResolveError> {
    stream
        .message()
        .await
        .map_err(ReflectionResolveError::Stream)?
        .ok_or(ReflectionResolveError::StreamClosed)
}

/// Files received so far and the imports already asked for.
#[derive(Default)]
struct DescriptorCollector {
    files: BTreeMap<String, FileDescriptorProto>,
    requested: HashSet<String>,
}

impl DescriptorCollector {
    /// Stores the encoded `protos` and returns the imports that still have to be requested.
    fn absorb(&mut self, protos: Vec<Vec<u8>>) -> Result<Vec<String>, ReflectionResolveError> {
        let mut missing = Vec::new();

        for raw in protos {
            let file = FileDescriptorProto::decode(raw.as_slice())?;
            let name = file.name().to_string();
            if self.files.contains_key(&name) {
                continue;
            }

            missing.extend(
                file.dependency
                    .iter()
                    .filter(|dep| !self.files.contains_key(*dep) && self.requested.insert((*dep).clone()))
                    .cloned(),
            );
            self.files.insert(name, file);
        }

        Ok(missing)
    }

    fn into_set(self) -> FileDescriptorSet {
        FileDescriptorSet {
            file: self.files.into_values().collect(),
        }
    }
}

/// A client for the gRPC Server Reflection Protocol.
#[derive(Clone)]
pub struct ReflectionClient<T = Channel> {
    client: ServerReflectionClient<T>,
}

impl<S> ReflectionClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(service: S) -> Self {
        Self {
            client: ServerReflectionClient::new(service),
        }
    }

    /// Downloads the file defining `symbol` (e.g. `my.package.MyService`) and every file
    /// it imports, directly or not.
    pub async fn file_descriptor_set_by_symbol(
        &mut self,
        symbol: &str,
    ) -> Result<FileDescriptorSet, ReflectionResolveError> {
        let (tx, rx) = mpsc::channel(16);
        tx.send(request(MessageRequest::FileContainingSymbol(symbol.to_string())))
            .await
            .map_err(|_| ReflectionResolveError::SendFailed)?;

        let mut stream = self
            .client
            .server_reflection_info(ReceiverStream::new(rx))
            .await
            .map_err(ReflectionResolveError::StreamStart)?
            .into_inner();

        let mut collector = DescriptorCollector::default();
        let mut pending = 1usize;

        while pending > 0 {
            let protos = expect(next_response(&mut stream).await?, |message| match message {
                MessageResponse::FileDescriptorResponse(files) => Ok(files.file_descriptor_proto),
                other => Err(other),
            })?;
            pending -= 1;

            for dependency in collector.absorb(protos)? {
                tx.send(request(MessageRequest::FileByFilename(dependency)))
                    .await
                    .map_err(|_| ReflectionResolveError::SendFailed)?;
                pending += 1;
            }
        }

        tracing::debug!(symbol, files = collector.files.len(), "resolved symbol");

        Ok(collector.into_set())
    }

    /// Lists all services exposed by the server.
    pub async fn list_services(&mut self) -> Result<Vec<String>, ReflectionResolveError> {
        let mut stream = self
            .client
            .server_reflection_info(once(async {
                request(MessageRequest::ListServices(String::new()))
            }))
            .await
            .map_err(ReflectionResolveError::StreamStart)?
            .into_inner();

        let services = expect(next_response(&mut stream).await?, |message| match message {
            MessageResponse::ListServicesResponse(list) => Ok(list.service),
            other => Err(other),
        })?;

        Ok(services.into_iter().map(|s| s.name).collect())
    }
}
