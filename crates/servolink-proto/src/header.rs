//! Request header with zero-copy parsing.
//!
//! The `RequestHeader` is a fixed 32-byte structure serialized as raw binary
//! (Big Endian). Routing and correlation fields can be read without touching
//! the payload.

use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use crate::errors::{ProtocolError, Result};

/// Kind of message carried by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageKind {
    /// Client to service request
    Request = 0x0001,
    /// Service to client response
    Response = 0x0002,
}

impl MessageKind {
    /// Raw wire value.
    #[must_use]
    pub fn to_u16(self) -> u16 {
        self as u16
    }

    /// Parse a wire value. `None` if unrecognized.
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0001 => Some(Self::Request),
            0x0002 => Some(Self::Response),
            _ => None,
        }
    }
}

/// Fixed 32-byte request header (Big Endian network byte order)
///
/// Fields are stored as raw byte arrays so the struct has no alignment
/// requirements and every 32-byte pattern is a valid value.
///
/// Layout:
///
/// | bytes  | field             |
/// |--------|-------------------|
/// | 0-3    | magic (`"SLRQ"`)  |
/// | 4      | version           |
/// | 5      | reserved          |
/// | 6-7    | kind              |
/// | 8-11   | payload size      |
/// | 12-15  | reserved          |
/// | 16-23  | sequence number   |
/// | 24-31  | writer id         |
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct RequestHeader {
    magic: [u8; 4],
    version: u8,
    reserved0: u8,
    kind: [u8; 2],
    pub(crate) payload_size: [u8; 4],
    reserved1: [u8; 4],
    sequence_number: [u8; 8],
    writer_id: [u8; 8],
}

impl RequestHeader {
    /// Size of the serialized header
    pub const SIZE: usize = 32;

    /// Magic number: "SLRQ" in ASCII
    pub const MAGIC: u32 = 0x534C_5251;

    /// Current protocol version
    pub const VERSION: u8 = 0x01;

    /// Maximum payload size (16 MB)
    pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

    /// Create a new header of the given kind with all other fields zeroed.
    #[must_use]
    pub fn new(kind: MessageKind) -> Self {
        let mut header = Self::new_zeroed();
        header.magic = Self::MAGIC.to_be_bytes();
        header.version = Self::VERSION;
        header.kind = kind.to_u16().to_be_bytes();
        header
    }

    /// Parse header from network bytes.
    ///
    /// Only the first [`Self::SIZE`] bytes are read; trailing bytes are the
    /// payload and are ignored here.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if buffer is shorter than the header
    /// - `ProtocolError::InvalidMagic` if magic number is invalid
    /// - `ProtocolError::UnsupportedVersion` if version is not supported
    /// - `ProtocolError::UnknownKind` if the message kind is unrecognized
    /// - `ProtocolError::PayloadTooLarge` if payload size exceeds maximum
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (header, _) = Self::read_from_prefix(bytes).map_err(|_| {
            ProtocolError::FrameTooShort { expected: Self::SIZE, actual: bytes.len() }
        })?;

        if u32::from_be_bytes(header.magic) != Self::MAGIC {
            return Err(ProtocolError::InvalidMagic);
        }

        if header.version != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }

        let kind = u16::from_be_bytes(header.kind);
        if MessageKind::from_u16(kind).is_none() {
            return Err(ProtocolError::UnknownKind(kind));
        }

        let payload_size = u32::from_be_bytes(header.payload_size);
        if payload_size > Self::MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_size as usize,
                max: Self::MAX_PAYLOAD_SIZE as usize,
            });
        }

        Ok(header)
    }

    /// Serialize header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(IntoBytes::as_bytes(self));
        arr
    }

    /// Protocol magic number.
    #[must_use]
    pub fn magic(&self) -> u32 {
        u32::from_be_bytes(self.magic)
    }

    /// Protocol version byte.
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Message kind. `None` only for headers that were never validated.
    #[must_use]
    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::from_u16(u16::from_be_bytes(self.kind))
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn payload_size(&self) -> u32 {
        u32::from_be_bytes(self.payload_size)
    }

    /// Correlation tag assigned by the sending client.
    #[must_use]
    pub fn sequence_number(&self) -> i64 {
        i64::from_be_bytes(self.sequence_number)
    }

    /// Identifier of the publication that wrote this frame.
    #[must_use]
    pub fn writer_id(&self) -> u64 {
        u64::from_be_bytes(self.writer_id)
    }

    /// Set the correlation tag.
    pub fn set_sequence_number(&mut self, sequence_number: i64) {
        self.sequence_number = sequence_number.to_be_bytes();
    }

    /// Set the writer identifier.
    pub fn set_writer_id(&mut self, writer_id: u64) {
        self.writer_id = writer_id.to_be_bytes();
    }

    /// Set payload size.
    pub fn set_payload_size(&mut self, size: u32) {
        self.payload_size = size.to_be_bytes();
    }
}

// Manual Debug implementation (can't derive due to packed repr)
impl std::fmt::Debug for RequestHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHeader")
            .field("magic", &format!("{:#010x}", self.magic()))
            .field("version", &self.version())
            .field("kind", &self.kind())
            .field("payload_size", &self.payload_size())
            .field("sequence_number", &self.sequence_number())
            .field("writer_id", &self.writer_id())
            .finish_non_exhaustive()
    }
}

// Manual PartialEq implementation (can't derive due to packed repr)
impl PartialEq for RequestHeader {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for RequestHeader {}
