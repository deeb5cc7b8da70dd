//! # Generic gRPC Client
//!
//! Wraps a `tonic` client to perform unary calls whose message types are only known at
//! runtime. The HTTP/2 path (`/package.Service/Method`) is built from the
//! `MethodDescriptor` and the payload is handed to [`JsonCodec`] untouched.
use super::codec::JsonCodec;
use crate::BoxError;
use http_body::Body as HttpBody;
use prost_reflect::MethodDescriptor;
use std::str::FromStr;
use tonic::{
    client::GrpcService,
    metadata::{
        MetadataKey, MetadataValue,
        errors::{InvalidMetadataKey, InvalidMetadataValue},
    },
    transport::Channel,
};

#[derive(thiserror::Error, Debug)]
pub enum GrpcRequestError {
    #[error("Internal error, the client was not ready: '{0}'")]
    ClientNotReady(#[source] BoxError),
    #[error("Invalid metadata (header) key '{key}': '{source}'")]
    InvalidMetadataKey {
        key: String,
        source: InvalidMetadataKey,
    },
    #[error("Invalid metadata (header) value for key '{key}': '{source}'")]
    InvalidMetadataValue {
        key: String,
        source: InvalidMetadataValue,
    },
    #[error("Invalid gRPC path '{0}'")]
    InvalidPath(String),
}

/// A dynamic unary gRPC client.
#[derive(Clone)]
pub struct GrpcClient<S = Channel> {
    client: tonic::client::Grpc<S>,
}

impl<S> GrpcClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(service: S) -> Self {
        let client = tonic::client::Grpc::new(service);
        Self { client }
    }

    /// Performs a Unary gRPC call (Single Request -> Single Response).
    ///
    /// # Returns
    /// * `Ok(Ok(Value))` - Successful RPC execution.
    /// * `Ok(Err(Status))` - RPC executed, but server returned an error.
    /// * `Err(GrpcRequestError)` - Failed to send request or connect.
    pub async fn unary(
        &mut self,
        method: &MethodDescriptor,
        payload: serde_json::Value,
        headers: &[(String, String)],
    ) -> Result<Result<serde_json::Value, tonic::Status>, GrpcRequestError> {
        self.client
            .ready()
            .await
            .map_err(|e| GrpcRequestError::ClientNotReady(e.into()))?;

        let codec = JsonCodec::for_client(method);
        let path = http_path(method)?;
        let request = build_request(payload, headers)?;

        match self.client.unary(request, path, codec).await {
            Ok(response) => Ok(Ok(response.into_inner())),
            Err(status) => Ok(Err(status)),
        }
    }
}

fn http_path(method: &MethodDescriptor) -> Result<http::uri::PathAndQuery, GrpcRequestError> {
    let path = format!("/{}/{}", method.parent_service().full_name(), method.name());
    http::uri::PathAndQuery::from_str(&path).map_err(|_| GrpcRequestError::InvalidPath(path))
}

fn build_request<T>(
    payload: T,
    headers: &[(String, String)],
) -> Result<tonic::Request<T>, GrpcRequestError> {
    let mut request = tonic::Request::new(payload);
    for (k, v) in headers {
        let key =
            MetadataKey::from_str(k).map_err(|source| GrpcRequestError::InvalidMetadataKey {
                key: k.clone(),
                source,
            })?;
        let val = MetadataValue::from_str(v).map_err(|source| {
            GrpcRequestError::InvalidMetadataValue {
                key: k.clone(),
                source,
            }
        })?;
        request.metadata_mut().insert(key, val);
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_become_request_metadata() {
        let headers = vec![("authorization".to_string(), "Basic dTpw".to_string())];
        let request = build_request((), &headers).unwrap();

        assert_eq!(
            request.metadata().get("authorization").unwrap(),
            "Basic dTpw"
        );
    }

    #[test]
    fn invalid_header_keys_are_rejected() {
        let headers = vec![("bad key".to_string(), "value".to_string())];

        assert!(matches!(
            build_request((), &headers),
            Err(GrpcRequestError::InvalidMetadataKey { key, .. }) if key == "bad key"
        ));
    }
}
