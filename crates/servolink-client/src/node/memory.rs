use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use servolink_proto::RequestFrame;

use super::{Node, Publication};
use crate::{
    error::{NodeError, TransportError},
    options::QosProfile,
};

/// A frame accepted by a [`MemoryNode`] publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedRequest {
    /// Fully qualified service name of the publication
    pub service_name: String,
    /// Decoded frame
    pub frame: RequestFrame,
}

impl PublishedRequest {
    /// Correlation tag of the request.
    pub fn sequence_number(&self) -> i64 {
        self.frame.header.sequence_number()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Active,
    Shutdown,
}

#[derive(Debug)]
struct PublicationRecord {
    service_name: String,
    type_name: String,
    qos: QosProfile,
}

struct MemoryNodeInner {
    lifecycle: Lifecycle,
    next_writer_id: u64,
    /// Live publications by writer id
    publications: HashMap<u64, PublicationRecord>,
    /// Every accepted frame, in publish order
    published: Vec<PublishedRequest>,
}

impl MemoryNodeInner {
    fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }
}

/// In-process node for testing and simulation
///
/// Publications decode every frame they are given and append it to a shared
/// log, so tests can inspect exactly what a client put on the wire. All state
/// sits behind `Arc<Mutex<>>`; clones observe the same node. A poisoned lock is
/// recovered rather than propagated.
#[derive(Clone)]
pub struct MemoryNode {
    name: Arc<str>,
    namespace: Arc<str>,
    inner: Arc<Mutex<MemoryNodeInner>>,
}

impl MemoryNode {
    /// Active node with the given name and namespace.
    pub fn new(name: &str, namespace: &str) -> Self {
        Self::with_lifecycle(name, namespace, Lifecycle::Active)
    }

    /// Node that was never initialized. [`Node::is_valid`] is `false`.
    pub fn uninitialized() -> Self {
        Self::with_lifecycle("", "", Lifecycle::Uninitialized)
    }

    fn with_lifecycle(name: &str, namespace: &str, lifecycle: Lifecycle) -> Self {
        Self {
            name: Arc::from(name),
            namespace: Arc::from(namespace),
            inner: Arc::new(Mutex::new(MemoryNodeInner {
                lifecycle,
                next_writer_id: 1,
                publications: HashMap::new(),
                published: Vec::new(),
            })),
        }
    }

    /// Shut the node down. Existing publications stop accepting frames.
    pub fn shutdown(&self) {
        self.lock().lifecycle = Lifecycle::Shutdown;
    }

    /// Publications created and not yet released.
    pub fn live_publications(&self) -> usize {
        self.lock().publications.len()
    }

    /// Service names of live publications, sorted.
    pub fn live_services(&self) -> Vec<String> {
        let inner = self.lock();
        let mut services: Vec<String> =
            inner.publications.values().map(|p| p.service_name.clone()).collect();
        services.sort();
        services
    }

    /// Type name and QoS a live publication was created with.
    pub fn publication_info(&self, writer_id: u64) -> Option<(String, QosProfile)> {
        self.lock().publications.get(&writer_id).map(|p| (p.type_name.clone(), p.qos))
    }

    /// Every frame accepted so far, in publish order.
    pub fn published(&self) -> Vec<PublishedRequest> {
        self.lock().published.clone()
    }

    /// Total number of accepted frames.
    pub fn published_count(&self) -> usize {
        self.lock().published.len()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryNodeInner> {
        lock(&self.inner)
    }
}

fn lock(inner: &Mutex<MemoryNodeInner>) -> MutexGuard<'_, MemoryNodeInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl std::fmt::Debug for MemoryNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("MemoryNode")
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("lifecycle", &inner.lifecycle)
            .field("publications", &inner.publications.len())
            .field("published", &inner.published.len())
            .finish()
    }
}

impl Node for MemoryNode {
    type Publication = MemoryPublication;

    fn is_valid(&self) -> bool {
        self.lock().is_active()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn create_publication(
        &self,
        type_name: &str,
        service_name: &str,
        qos: &QosProfile,
    ) -> Result<MemoryPublication, NodeError> {
        let mut inner = self.lock();
        if !inner.is_active() {
            return Err(NodeError::NodeShutdown);
        }

        let writer_id = inner.next_writer_id;
        inner.next_writer_id += 1;
        inner.publications.insert(
            writer_id,
            PublicationRecord {
                service_name: service_name.to_string(),
                type_name: type_name.to_string(),
                qos: *qos,
            },
        );

        tracing::debug!(writer_id, service = %service_name, "Created publication");

        Ok(MemoryPublication {
            writer_id,
            service_name: Arc::from(service_name),
            node: Arc::clone(&self.inner),
        })
    }

    fn release_publication(&self, publication: MemoryPublication) -> Result<(), NodeError> {
        if !Arc::ptr_eq(&publication.node, &self.inner) {
            return Err(NodeError::UnknownPublication(publication.writer_id));
        }

        let mut inner = self.lock();
        inner
            .publications
            .remove(&publication.writer_id)
            .map(|_| ())
            .ok_or(NodeError::UnknownPublication(publication.writer_id))
    }
}

/// Publication handle of a [`MemoryNode`].
pub struct MemoryPublication {
    writer_id: u64,
    service_name: Arc<str>,
    node: Arc<Mutex<MemoryNodeInner>>,
}

impl std::fmt::Debug for MemoryPublication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPublication")
            .field("writer_id", &self.writer_id)
            .field("service_name", &self.service_name)
            .finish_non_exhaustive()
    }
}

impl Publication for MemoryPublication {
    fn writer_id(&self) -> u64 {
        self.writer_id
    }

    fn is_valid(&self) -> bool {
        let inner = lock(&self.node);
        inner.is_active() && inner.publications.contains_key(&self.writer_id)
    }

    fn publish(&self, frame: &[u8]) -> Result<(), TransportError> {
        let frame = RequestFrame::decode(frame)
            .map_err(|e| TransportError::Rejected(format!("malformed frame: {e}")))?;

        let mut inner = lock(&self.node);
        if !inner.is_active() || !inner.publications.contains_key(&self.writer_id) {
            return Err(TransportError::PublicationClosed);
        }

        debug_assert_eq!(frame.header.writer_id(), self.writer_id);

        inner
            .published
            .push(PublishedRequest { service_name: self.service_name.to_string(), frame });
        Ok(())
    }
}
