//! # Generic gRPC Transport
//!
//! Low-level building blocks for calling a gRPC method whose Protobuf types are only known
//! at runtime. Requests and responses are `serde_json::Value`s, transcoded to the Protobuf
//! wire format by [`codec::JsonCodec`].
pub mod client;
pub mod codec;
