//! Client configuration.

use serde::{Deserialize, Serialize};

use crate::allocator::Allocator;

/// Message history policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum History {
    /// Let the transport decide
    SystemDefault,
    /// Keep the last `depth` messages
    KeepLast,
    /// Keep everything, subject to transport limits
    KeepAll,
}

/// Delivery guarantee requested from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reliability {
    /// Let the transport decide
    SystemDefault,
    /// Retransmit until delivered
    Reliable,
    /// Send once, drop on loss
    BestEffort,
}

/// Whether late joiners receive earlier messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    /// Let the transport decide
    SystemDefault,
    /// Keep messages for late joiners
    TransientLocal,
    /// Only deliver to currently matched readers
    Volatile,
}

/// Transport quality-of-service parameters.
///
/// The client never interprets these; they are copied at construction and
/// handed to the node when the publication is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QosProfile {
    /// History policy
    pub history: History,
    /// Queue depth, meaningful with [`History::KeepLast`]
    pub depth: usize,
    /// Delivery guarantee
    pub reliability: Reliability,
    /// Late-joiner policy
    pub durability: Durability,
}

impl QosProfile {
    /// Default profile for service clients.
    pub const SERVICES_DEFAULT: Self = Self {
        history: History::KeepLast,
        depth: 10,
        reliability: Reliability::Reliable,
        durability: Durability::Volatile,
    };
}

impl Default for QosProfile {
    fn default() -> Self {
        Self::SERVICES_DEFAULT
    }
}

/// Options captured by a client at construction.
///
/// The client stores its own copy; changing or dropping the caller's value
/// afterwards has no effect on an initialized client.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Transport parameters for the request publication
    pub qos: QosProfile,
    /// Source of all memory the client allocates
    pub allocator: Allocator,
}

impl ClientOptions {
    /// Replace the QoS profile.
    #[must_use]
    pub fn with_qos(mut self, qos: QosProfile) -> Self {
        self.qos = qos;
        self
    }

    /// Replace the allocator.
    #[must_use]
    pub fn with_allocator(mut self, allocator: Allocator) -> Self {
        self.allocator = allocator;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_use_services_profile() {
        let options = ClientOptions::default();

        assert_eq!(options.qos, QosProfile::SERVICES_DEFAULT);
        assert!(options.allocator.validate().is_ok());
    }

    #[test]
    fn qos_profile_round_trips_through_cbor() {
        let qos = QosProfile {
            history: History::KeepAll,
            depth: 0,
            reliability: Reliability::BestEffort,
            durability: Durability::TransientLocal,
        };

        let mut bytes = Vec::new();
        ciborium::into_writer(&qos, &mut bytes).expect("serialize");
        let parsed: QosProfile = ciborium::from_reader(bytes.as_slice()).expect("deserialize");

        assert_eq!(parsed, qos);
    }
}
