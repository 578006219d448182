//! Node and publication boundary.
//!
//! A [`Node`] is the communication endpoint a client is bound to. The client
//! never owns it: it checks validity, asks it for a [`Publication`] at
//! construction and hands the publication back at finalization. Everything
//! the client sends goes through [`Publication::publish`].
//!
//! Two implementations ship with the crate: [`MemoryNode`], an in-process
//! node that records every published frame, and [`ChaoticNode`], a wrapper
//! that injects failures for chaos testing.

mod chaotic;
mod memory;

pub use chaotic::{ChaoticNode, ChaoticPublication};
pub use memory::{MemoryNode, MemoryPublication, PublishedRequest};

use crate::{
    error::{NodeError, TransportError},
    options::QosProfile,
};

/// Communication endpoint shared by any number of clients.
///
/// Implementations are expected to share internal state behind `Arc`, so
/// publications can keep talking to the node they came from.
pub trait Node: Send + Sync {
    /// Handle returned by [`Node::create_publication`]
    type Publication: Publication;

    /// Whether the node is initialized and not shut down.
    fn is_valid(&self) -> bool;

    /// Node name, used to expand private (`~`) service names.
    fn name(&self) -> &str;

    /// Node namespace, used to qualify relative service names.
    fn namespace(&self) -> &str;

    /// Create a publication for requests to `service_name`.
    ///
    /// `service_name` is already fully qualified.
    fn create_publication(
        &self,
        type_name: &str,
        service_name: &str,
        qos: &QosProfile,
    ) -> Result<Self::Publication, NodeError>;

    /// Release a publication created by this node.
    fn release_publication(&self, publication: Self::Publication) -> Result<(), NodeError>;
}

/// Transport-level publication handle.
pub trait Publication: Send + Sync {
    /// Identifier stamped into every frame as the writer id.
    fn writer_id(&self) -> u64;

    /// Whether the handle can still publish.
    fn is_valid(&self) -> bool;

    /// Publish one encoded request frame. Fire-and-forget: returns once the
    /// transport accepted or refused the frame.
    fn publish(&self, frame: &[u8]) -> Result<(), TransportError>;
}
