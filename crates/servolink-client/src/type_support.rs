//! Service type support.
//!
//! A [`TypeSupport`] knows how to turn one service's request into bytes and
//! bytes back into its response. The client treats it as opaque: it only
//! asks it to encode requests into blocks the client allocated.

use std::{io, marker::PhantomData};

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::allocator::Block;

/// Codec failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Destination block too small; retry with a larger one
    #[error("destination buffer full")]
    BufferFull,

    /// Request cannot be encoded
    #[error("encode failed: {0}")]
    Encode(String),

    /// Response bytes cannot be decoded
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Encode/decode capability for one request/response pair.
pub trait TypeSupport: Send + Sync {
    /// Request message type
    type Request;
    /// Response message type
    type Response;

    /// Fully qualified service type name, e.g. `example_interfaces/srv/AddTwoInts`.
    fn type_name(&self) -> &str;

    /// Append the encoded request to `dst`.
    ///
    /// Must return [`CodecError::BufferFull`] (not a partial success) when the
    /// block runs out of space. Bytes written before that point are discarded
    /// by the caller.
    fn encode_request(&self, request: &Self::Request, dst: &mut Block) -> Result<(), CodecError>;

    /// Decode a response payload.
    fn decode_response(&self, bytes: &[u8]) -> Result<Self::Response, CodecError>;
}

/// CBOR type support for any serde request/response pair.
pub struct CborTypeSupport<Req, Resp> {
    type_name: &'static str,
    _marker: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> CborTypeSupport<Req, Resp> {
    /// Type support registered under `type_name`.
    pub const fn new(type_name: &'static str) -> Self {
        Self { type_name, _marker: PhantomData }
    }
}

impl<Req, Resp> std::fmt::Debug for CborTypeSupport<Req, Resp> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CborTypeSupport").field("type_name", &self.type_name).finish()
    }
}

impl<Req, Resp> TypeSupport for CborTypeSupport<Req, Resp>
where
    Req: Serialize,
    Resp: DeserializeOwned,
{
    type Request = Req;
    type Response = Resp;

    fn type_name(&self) -> &str {
        self.type_name
    }

    fn encode_request(&self, request: &Req, dst: &mut Block) -> Result<(), CodecError> {
        ciborium::into_writer(request, dst).map_err(|e| match e {
            ciborium::ser::Error::Io(io) if io.kind() == io::ErrorKind::WriteZero => {
                CodecError::BufferFull
            },
            other => CodecError::Encode(other.to_string()),
        })
    }

    fn decode_response(&self, bytes: &[u8]) -> Result<Resp, CodecError> {
        ciborium::from_reader(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Serialize)]
    struct Ping {
        payload: Vec<u8>,
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct Pong {
        echoed: u32,
    }

    const PING: CborTypeSupport<Ping, Pong> = CborTypeSupport::new("test_msgs/srv/Ping");

    #[test]
    fn encodes_into_block() {
        let mut block = Block::with_capacity(64);
        PING.encode_request(&Ping { payload: vec![1, 2, 3] }, &mut block).expect("encode");

        assert!(!block.is_empty());
        assert_eq!(PING.type_name(), "test_msgs/srv/Ping");
    }

    #[test]
    fn small_block_reports_buffer_full() {
        let mut block = Block::with_capacity(4);
        let result = PING.encode_request(&Ping { payload: vec![0; 32] }, &mut block);

        assert_eq!(result, Err(CodecError::BufferFull));
    }

    #[test]
    fn decodes_response() {
        #[derive(Serialize)]
        struct Wire {
            echoed: u32,
        }

        let mut bytes = Vec::new();
        ciborium::into_writer(&Wire { echoed: 9 }, &mut bytes).expect("serialize");

        assert_eq!(PING.decode_response(&bytes), Ok(Pong { echoed: 9 }));
    }

    #[test]
    fn garbage_response_is_decode_error() {
        let result = PING.decode_response(&[0xFF, 0x00]);
        assert!(matches!(result, Err(CodecError::Decode(_))));
    }
}
