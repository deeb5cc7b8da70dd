//! # Endpoint Negotiation
//!
//! Finds the endpoint to talk to from the running client version, the API version the user
//! asked for and the published [`SupportMatrix`](matrix::SupportMatrix).
//!
//! The matrix is only downloaded when it is needed: an explicit endpoint without an explicit
//! API version is used as is.
pub mod matrix;
pub mod resolve;
pub mod version;

use matrix::{SupportMatrix, SupportMatrixError};
use resolve::{ProtocolRequest, RunningClient, VersionError};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    #[error(transparent)]
    Matrix(#[from] SupportMatrixError),
    #[error(transparent)]
    Version(#[from] VersionError),
}

/// What the user asked for, and where to look it up.
#[derive(Debug, Clone)]
pub struct NegotiationRequest<'a> {
    pub endpoint: Option<&'a str>,
    pub api_version: Option<ProtocolRequest>,
    pub support_matrix_url: &'a str,
    pub timeout: Duration,
}

/// Resolves the endpoint for `client`, downloading the support matrix when needed.
pub async fn negotiate_endpoint(
    client: &RunningClient,
    request: NegotiationRequest<'_>,
) -> Result<String, NegotiationError> {
    if let (Some(endpoint), None) = (request.endpoint, &request.api_version) {
        tracing::debug!(endpoint, "using explicit endpoint");
        return Ok(endpoint.to_string());
    }

    let matrix = SupportMatrix::fetch(request.support_matrix_url, request.timeout).await?;

    let endpoint = resolve::select_endpoint(
        request.endpoint,
        request.api_version.as_ref(),
        client,
        &matrix,
    )?;

    tracing::debug!(%client, endpoint, "negotiated endpoint");

    Ok(endpoint)
}
