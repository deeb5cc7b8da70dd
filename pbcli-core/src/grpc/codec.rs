//! # JSON Codec
//!
//! Lets `tonic` carry `serde_json::Value` payloads for messages only known at runtime.
//!
//! Each direction of a call is handled by a [`MessageCoder`] bound to one
//! `MessageDescriptor`: it writes JSON as Protobuf bytes when encoding and reads Protobuf
//! bytes back as JSON when decoding. A client encodes the method input and decodes the
//! method output; a server does the opposite, so the same codec serves both sides.
use prost::Message;
use prost_reflect::{DynamicMessage, MessageDescriptor, MethodDescriptor};
use serde_json::Value;
use tonic::{
    Status,
    codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder},
};

#[derive(Debug, Clone)]
pub struct JsonCodec {
    outgoing: MessageDescriptor,
    incoming: MessageDescriptor,
}

impl JsonCodec {
    /// Encodes `outgoing` messages and decodes `incoming` ones.
    pub fn new(outgoing: MessageDescriptor, incoming: MessageDescriptor) -> Self {
        Self { outgoing, incoming }
    }

    /// The codec a caller of `method` uses.
    pub fn for_client(method: &MethodDescriptor) -> Self {
        Self::new(method.input(), method.output())
    }

    /// The codec a server implementing `method` uses.
    pub fn for_server(method: &MethodDescriptor) -> Self {
        Self::new(method.output(), method.input())
    }
}

impl Codec for JsonCodec {
    type Encode = Value;
    type Decode = Value;
    type Encoder = MessageCoder;
    type Decoder = MessageCoder;

    fn encoder(&mut self) -> MessageCoder {
        MessageCoder(self.outgoing.clone())
    }

    fn decoder(&mut self) -> MessageCoder {
        MessageCoder(self.incoming.clone())
    }
}

/// Converts between JSON and the wire form of one message type.
#[derive(Debug, Clone)]
pub struct MessageCoder(MessageDescriptor);

impl MessageCoder {
    fn to_message(&self, value: Value) -> Result<DynamicMessage, Status> {
        DynamicMessage::deserialize(self.0.clone(), value).map_err(|e| {
            Status::invalid_argument(format!(
                "Arguments do not match the '{}' message: {e}",
                self.0.full_name()
            ))
        })
    }

    fn to_value(&self, message: &DynamicMessage) -> Result<Value, Status> {
        serde_json::to_value(message).map_err(|e| {
            Status::internal(format!("'{}' has no JSON form: {e}", self.0.full_name()))
        })
    }
}

impl Encoder for MessageCoder {
    type Item = Value;
    type Error = Status;

    fn encode(&mut self, item: Value, dst: &mut EncodeBuf<'_>) -> Result<(), Status> {
        self.to_message(item)?.encode_raw(dst);
        Ok(())
    }
}

impl Decoder for MessageCoder {
    type Item = Value;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Value>, Status> {
        let message = DynamicMessage::decode(self.0.clone(), src).map_err(|e| {
            Status::internal(format!("Malformed '{}' message: {e}", self.0.full_name()))
        })?;

        self.to_value(&message).map(Some)
    }
}
