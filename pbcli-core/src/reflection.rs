//! # Server Reflection
//!
//! Interaction with the gRPC Server Reflection Protocol, used to download the schema of
//! the remote API at runtime instead of shipping pre-compiled descriptors.
pub mod client;
