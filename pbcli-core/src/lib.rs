//! # pbcli Core
//!
//! `pbcli-core` is the library powering the `pbcli` command line client. It discovers the
//! operations exposed by a remote API at runtime and turns each one into a callable,
//! self-documenting action. It also decides which endpoint a given client release should
//! talk to for a requested API version.
//!
//! ## Key Components
//!
//! * **[`ApiClient`](client::ApiClient):** The main entry point. It fetches the schema once,
//!   builds the [`ActionRegistry`](registry::ActionRegistry) and dispatches calls.
//! * **[`ParameterNode`](schema::ParameterNode):** One input or output parameter of a remote
//!   operation, as a tagged tree instead of a runtime-reflected object.
//! * **[`ActionDescriptor`](action::ActionDescriptor):** One discovered operation with its
//!   flattened input parameters and cached documentation.
//! * **[`negotiate`]:** Support matrix parsing and the endpoint/version resolver.
//!
//! ## Transport
//!
//! The remote API is a gRPC server. Schemas are obtained through the gRPC Server Reflection
//! Protocol (or a local `FileDescriptorSet`), and calls are performed with a generic client
//! that transcodes JSON to Protobuf on the fly:
//!
//! * **[`GrpcClient`](grpc::client::GrpcClient):** A dynamic unary gRPC client using a custom Json Codec.
//! * **[`ReflectionClient`](reflection::client::ReflectionClient):** A gRPC Reflection client offering
//!   only the functionality that we need internally.
//!
//! Everything above the [`Transport`](transport::Transport) trait is independent of gRPC.
//!
//! ## Re-exports
//!
//! This crate re-exports `prost`, `prost-reflect`, and `tonic` to ensure that consumers
//! use compatible versions of these underlying dependencies.
pub mod action;
pub mod client;
pub mod grpc;
pub mod negotiate;
pub mod reflection;
pub mod registry;
pub mod schema;
pub mod transport;

// Re-exports
pub use prost;
pub use prost_reflect;
pub use tonic;

/// Type alias for the standard boxed error used in generic bounds.
type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Four spaces, the indentation unit of every human readable listing.
pub const INDENTATION: &str = "    ";
