//! Request frame combining header and payload.
//!
//! Layout on the wire: `[RequestHeader: 32 bytes] + [payload: variable]`.
//! The payload is opaque here; it was encoded by the service's type support.

use bytes::{BufMut, Bytes};

use crate::{
    RequestHeader,
    errors::{ProtocolError, Result},
};

/// Complete request frame (transport layer)
///
/// # Invariants
///
/// - `payload.len()` equals `header.payload_size()`. Enforced by
///   [`RequestFrame::new`] and verified by [`RequestFrame::decode`].
/// - `payload.len()` never exceeds [`RequestHeader::MAX_PAYLOAD_SIZE`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    /// Frame header
    pub header: RequestHeader,

    /// Encoded payload bytes
    pub payload: Bytes,
}

impl RequestFrame {
    /// Create a frame, setting the header's payload size from the payload.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if the payload exceeds
    ///   [`RequestHeader::MAX_PAYLOAD_SIZE`]
    pub fn new(mut header: RequestHeader, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();

        let payload_len = u32::try_from(payload.len())
            .ok()
            .filter(|len| *len <= RequestHeader::MAX_PAYLOAD_SIZE)
            .ok_or(ProtocolError::PayloadTooLarge {
                size: payload.len(),
                max: RequestHeader::MAX_PAYLOAD_SIZE as usize,
            })?;

        header.set_payload_size(payload_len);

        debug_assert_eq!(header.payload_size() as usize, payload.len());

        Ok(Self { header, payload })
    }

    /// Encoded length of this frame.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        RequestHeader::SIZE + self.payload.len()
    }

    /// Encode frame into buffer.
    ///
    /// Writes `[header (32 bytes)] + [payload (variable)]`.
    pub fn encode(&self, dst: &mut impl BufMut) {
        debug_assert_eq!(self.payload.len(), self.header.payload_size() as usize);

        dst.put_slice(&self.header.to_bytes());
        dst.put_slice(&self.payload);
    }

    /// Decode frame from wire format.
    ///
    /// Trailing bytes after the claimed payload are ignored.
    ///
    /// # Errors
    ///
    /// - Any header validation error from [`RequestHeader::from_bytes`]
    /// - `ProtocolError::FrameTruncated` if fewer payload bytes are present
    ///   than the header claims
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = RequestHeader::from_bytes(bytes)?;

        let payload_size = header.payload_size() as usize;
        let total_size = RequestHeader::SIZE + payload_size;

        let payload = bytes.get(RequestHeader::SIZE..total_size).ok_or(
            ProtocolError::FrameTruncated {
                expected: payload_size,
                actual: bytes.len().saturating_sub(RequestHeader::SIZE),
            },
        )?;

        debug_assert_eq!(payload.len(), payload_size);

        Ok(Self { header, payload: Bytes::copy_from_slice(payload) })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::MessageKind;

    proptest! {
        #[test]
        fn decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
            let _ = RequestFrame::decode(&bytes);
        }
    }

    #[test]
    fn frame_with_payload() {
        let mut header = RequestHeader::new(MessageKind::Request);
        header.set_sequence_number(7);
        header.set_writer_id(42);

        let frame = RequestFrame::new(header, vec![1, 2, 3, 4]).expect("should build");
        assert_eq!(frame.header.payload_size(), 4);
        assert_eq!(frame.encoded_len(), RequestHeader::SIZE + 4);

        let mut wire = Vec::new();
        frame.encode(&mut wire);

        let parsed = RequestFrame::decode(&wire).expect("should decode");
        assert_eq!(parsed, frame);
        assert_eq!(parsed.header.sequence_number(), 7);
        assert_eq!(parsed.header.writer_id(), 42);
    }

    #[test]
    fn reject_truncated_frame() {
        let mut header = RequestHeader::new(MessageKind::Request);
        header.set_payload_size(100);

        let result = RequestFrame::decode(&header.to_bytes());
        assert_eq!(result, Err(ProtocolError::FrameTruncated { expected: 100, actual: 0 }));
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let frame = RequestFrame::new(RequestHeader::new(MessageKind::Request), vec![9, 9])
            .expect("should build");

        let mut wire = Vec::new();
        frame.encode(&mut wire);
        wire.extend_from_slice(&[0xAA, 0xBB]);

        let parsed = RequestFrame::decode(&wire).expect("should decode");
        assert_eq!(parsed.payload.as_ref(), &[9, 9]);
    }
}
