//! Servolink wire protocol.
//!
//! Framing for service requests published over a pub/sub transport. Every
//! request travels as a [`RequestFrame`]: a fixed 32-byte [`RequestHeader`]
//! carrying the client-assigned sequence number and writer id, followed by the
//! already-encoded payload bytes.
//!
//! The sequence number is the correlation tag: a response carrying the same
//! `(writer_id, sequence_number)` pair belongs to the request that produced it.
//! Matching responses to requests happens outside this crate.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod errors;
mod frame;
mod header;

pub use errors::{ProtocolError, Result};
pub use frame::RequestFrame;
pub use header::{MessageKind, RequestHeader};
