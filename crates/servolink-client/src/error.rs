//! Error types for the service client.
//!
//! [`ClientError`] is the status domain every client operation reports in.
//! Errors from the node and transport collaborators are carried through
//! unchanged in [`ClientError::Node`] and [`ClientError::Transport`].

use thiserror::Error;

/// Errors reported by the node while creating or releasing a publication.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Node is not (or no longer) active
    #[error("node is shut down")]
    NodeShutdown,

    /// Publication handle unknown to this node
    #[error("unknown publication {0}")]
    UnknownPublication(u64),

    /// Node refused the request
    #[error("node rejected request: {0}")]
    Rejected(String),
}

/// Errors reported by the publish path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Publication has been released or its node shut down
    #[error("publication closed")]
    PublicationClosed,

    /// Transport refused the frame
    #[error("frame rejected: {0}")]
    Rejected(String),

    /// Underlying I/O failure
    #[error("i/o error: {0}")]
    Io(String),
}

/// Errors that can occur during client operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Missing or malformed caller input, detected before any side effect
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Node reference present but not usable
    #[error("node invalid: {0}")]
    NodeInvalid(String),

    /// Allocator capability reported failure
    #[error("bad alloc: {0}")]
    BadAlloc(String),

    /// Service name rejected by name resolution
    #[error("invalid service name '{name}': {reason}")]
    ServiceNameInvalid {
        /// Name as supplied by the caller
        name: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Finalize called on an already finalized client
    #[error("client already finalized")]
    AlreadyFinalized,

    /// Node failed to create or release the publication
    #[error("node error: {0}")]
    Node(#[from] NodeError),

    /// Publish failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Abstract status of a [`ClientError`], without its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`ClientError::InvalidArgument`]
    InvalidArgument,
    /// See [`ClientError::NodeInvalid`]
    NodeInvalid,
    /// See [`ClientError::BadAlloc`]
    BadAlloc,
    /// See [`ClientError::ServiceNameInvalid`]
    ServiceNameInvalid,
    /// See [`ClientError::AlreadyFinalized`]
    AlreadyFinalized,
    /// See [`ClientError::Node`]
    Node,
    /// See [`ClientError::Transport`]
    Transport,
}

impl ClientError {
    /// Abstract status of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::NodeInvalid(_) => ErrorKind::NodeInvalid,
            Self::BadAlloc(_) => ErrorKind::BadAlloc,
            Self::ServiceNameInvalid { .. } => ErrorKind::ServiceNameInvalid,
            Self::AlreadyFinalized => ErrorKind::AlreadyFinalized,
            Self::Node(_) => ErrorKind::Node,
            Self::Transport(_) => ErrorKind::Transport,
        }
    }

    /// Returns true if the operation may succeed when retried unchanged.
    ///
    /// Only collaborator failures qualify. Caller mistakes and allocator
    /// exhaustion need the caller to change something first.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Io(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_variants() {
        assert_eq!(ClientError::InvalidArgument("x".into()).kind(), ErrorKind::InvalidArgument);
        assert_eq!(ClientError::NodeInvalid("x".into()).kind(), ErrorKind::NodeInvalid);
        assert_eq!(ClientError::BadAlloc("x".into()).kind(), ErrorKind::BadAlloc);
        assert_eq!(ClientError::from(NodeError::NodeShutdown).kind(), ErrorKind::Node);
        assert_eq!(
            ClientError::from(TransportError::PublicationClosed).kind(),
            ErrorKind::Transport
        );
    }

    #[test]
    fn only_io_failures_are_transient() {
        assert!(ClientError::Transport(TransportError::Io("reset".into())).is_transient());
        assert!(!ClientError::Transport(TransportError::PublicationClosed).is_transient());
        assert!(!ClientError::BadAlloc("oom".into()).is_transient());
        assert!(!ClientError::InvalidArgument("null".into()).is_transient());
    }

    #[test]
    fn transport_message_is_passed_through() {
        let err = ClientError::from(TransportError::Rejected("queue full".into()));
        assert_eq!(err.to_string(), "transport error: frame rejected: queue full");
    }
}
