//! Servolink service client.
//!
//! The client side of a request/response service carried over pub/sub. A
//! [`Client`] is bound to a [`Node`](node::Node) and a service name, owns one
//! request publication, and tags every request it sends with a sequence
//! number so the response path can correlate replies.
//!
//! # Components
//!
//! - [`Client`]: lifecycle (`init` / `fini`), validity and `send_request`
//! - [`Allocator`]: injectable memory capability every client allocation goes
//!   through
//! - [`TypeSupport`]: request encoding for one service type
//! - [`node`]: node and publication boundary, with in-memory and
//!   fault-injecting implementations
//! - [`naming`]: service name resolution
//! - [`error_state`]: thread-local record of the last failure
//!
//! # Sequence numbers
//!
//! Numbers start at 1 and are reserved atomically, so concurrent senders on
//! one client never share a number. A request whose publish fails keeps its
//! number; nothing that fails earlier consumes one.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod allocator;
pub mod client;
pub mod error_state;
pub mod naming;
pub mod node;

mod error;
mod options;
mod type_support;

pub use allocator::{
    AllocationStats, Allocator, AllocatorBackend, Block, FailureMode, SystemAllocator,
    TrackingAllocator,
};
pub use client::{Client, InvalidReason};
pub use error::{ClientError, ErrorKind, NodeError, TransportError};
pub use node::{ChaoticNode, MemoryNode, Node, Publication, PublishedRequest};
pub use options::{ClientOptions, Durability, History, QosProfile, Reliability};
pub use type_support::{CborTypeSupport, CodecError, TypeSupport};
