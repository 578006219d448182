//! Service client lifecycle and request sending.
//!
//! A [`Client`] starts zeroed, becomes ready through [`init`] and ends
//! finalized through [`Client::fini`]. While ready it owns two resources: the
//! resolved service name (stored in a block from the client's allocator) and
//! a publication created by its node. Both are released in reverse order of
//! acquisition.
//!
//! Requests are tagged with a per-client sequence number reserved by an
//! atomic increment. The first request gets 1. A request that fails before
//! the reservation (invalid client, allocation, encoding) consumes nothing; a
//! request whose publish fails keeps its number and leaves a gap.

use std::{
    ptr,
    sync::atomic::{AtomicI64, Ordering},
};

use servolink_proto::{MessageKind, RequestHeader};
use thiserror::Error;

use crate::{
    allocator::Block,
    error::{ClientError, NodeError},
    error_state::RecordError,
    naming,
    node::{Node, Publication},
    options::ClientOptions,
    type_support::{CodecError, TypeSupport},
};

/// Initial frame buffer: header plus a small payload.
const INITIAL_FRAME_CAPACITY: usize = RequestHeader::SIZE + 224;

/// Largest frame a client will build.
const MAX_FRAME_LEN: usize = RequestHeader::SIZE + RequestHeader::MAX_PAYLOAD_SIZE as usize;

const HEADER_PLACEHOLDER: [u8; RequestHeader::SIZE] = [0; RequestHeader::SIZE];

/// Why a client is not usable.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[error("{}", self.as_str())]
pub enum InvalidReason {
    /// No client was given
    Null,
    /// Client was never initialized
    NotInitialized,
    /// Client has been finalized
    Finalized,
    /// The node the client was built on is no longer valid
    NodeInvalid,
    /// The publication has been closed underneath the client
    PublicationInvalid,
}

impl InvalidReason {
    /// Static description of the reason.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Null => "client is null",
            Self::NotInitialized => "client is not initialized",
            Self::Finalized => "client is finalized",
            Self::NodeInvalid => "client's node is invalid",
            Self::PublicationInvalid => "client's publication is invalid",
        }
    }
}

enum State<'a, N: Node, T: TypeSupport> {
    Uninitialized,
    Ready(ClientImpl<'a, N, T>),
    Finalized,
}

struct ClientImpl<'a, N: Node, T: TypeSupport> {
    node: &'a N,
    type_support: &'a T,
    /// Resolved service name, UTF-8, allocated from `options.allocator`
    service_name: Block,
    options: ClientOptions,
    publication: N::Publication,
    /// Last reserved sequence number; 0 before the first send
    sequence_number: AtomicI64,
}

/// Client side of a request/response service.
///
/// Borrows its node and type support for `'a`. Sending only needs `&self`,
/// so a ready client can be shared across threads; initialization and
/// finalization need `&mut self`.
pub struct Client<'a, N: Node, T: TypeSupport> {
    state: State<'a, N, T>,
}

/// Initialize `client`, checking arguments in a fixed order.
///
/// Absent arguments stand in for null handles. Checks, in order:
///
/// 1. `client` present, else `InvalidArgument`
/// 2. `node` present (`InvalidArgument`) and valid (`NodeInvalid`)
/// 3. `type_support` present, else `InvalidArgument`
/// 4. `service_name` present and non-empty, else `InvalidArgument`
/// 5. `options` present, else `InvalidArgument`
/// 6. allocator has `allocate` and `deallocate`, else `InvalidArgument`
/// 7. client not already ready, else `InvalidArgument`
/// 8. service name resolves, else `ServiceNameInvalid`
///
/// No memory is requested before all checks pass. Allocation failure is
/// `BadAlloc`; a node refusing the publication is `Node`. On any failure the
/// client is left as it was and nothing stays allocated.
pub fn init<'a, N: Node, T: TypeSupport>(
    client: Option<&mut Client<'a, N, T>>,
    node: Option<&'a N>,
    type_support: Option<&'a T>,
    service_name: Option<&str>,
    options: Option<&ClientOptions>,
) -> Result<(), ClientError> {
    init_client(client, node, type_support, service_name, options).record_error()
}

fn init_client<'a, N: Node, T: TypeSupport>(
    client: Option<&mut Client<'a, N, T>>,
    node: Option<&'a N>,
    type_support: Option<&'a T>,
    service_name: Option<&str>,
    options: Option<&ClientOptions>,
) -> Result<(), ClientError> {
    let client = client.ok_or_else(|| ClientError::InvalidArgument("client is null".into()))?;
    let node = node.ok_or_else(|| ClientError::InvalidArgument("node is null".into()))?;
    if !node.is_valid() {
        return Err(ClientError::NodeInvalid("node is not initialized or shut down".into()));
    }
    let type_support = type_support
        .ok_or_else(|| ClientError::InvalidArgument("type support is null".into()))?;
    let service_name = service_name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ClientError::InvalidArgument("service name is null or empty".into()))?;
    let options = options.ok_or_else(|| ClientError::InvalidArgument("options is null".into()))?;
    options.allocator.validate()?;

    if matches!(client.state, State::Ready(_)) {
        return Err(ClientError::InvalidArgument("client is already initialized".into()));
    }

    let resolved = naming::resolve_service_name(service_name, node.name(), node.namespace())?;

    // Deep copy; later changes to the caller's options do not reach the client.
    let options = options.clone();
    let allocator = &options.allocator;

    let mut name_block = allocator.try_allocate(resolved.len())?;
    if !resolved.write_into(&mut name_block) {
        allocator.deallocate(name_block);
        return Err(ClientError::BadAlloc("service name does not fit its block".into()));
    }

    let created = std::str::from_utf8(name_block.as_slice())
        .map_err(|_| NodeError::Rejected("service name is not UTF-8".into()))
        .and_then(|service| {
            node.create_publication(type_support.type_name(), service, &options.qos)
        });
    let publication = match created {
        Ok(publication) => publication,
        Err(e) => {
            allocator.deallocate(name_block);
            tracing::warn!(service = %resolved, error = %e, "Publication creation failed");
            return Err(e.into());
        },
    };

    tracing::debug!(
        service = %resolved,
        type_name = %type_support.type_name(),
        writer_id = publication.writer_id(),
        "Client initialized"
    );

    client.state = State::Ready(ClientImpl {
        node,
        type_support,
        service_name: name_block,
        options,
        publication,
        sequence_number: AtomicI64::new(0),
    });
    Ok(())
}

impl<'a, N: Node, T: TypeSupport> Client<'a, N, T> {
    /// Zero-initialized client. Not valid until initialized.
    pub const fn zeroed() -> Self {
        Self { state: State::Uninitialized }
    }

    /// Initialized client for `service_name` on `node`.
    pub fn new(
        node: &'a N,
        type_support: &'a T,
        service_name: &str,
        options: &ClientOptions,
    ) -> Result<Self, ClientError> {
        let mut client = Self::zeroed();
        client.init(node, type_support, service_name, options)?;
        Ok(client)
    }

    /// Initialize this client. See [`init`].
    pub fn init(
        &mut self,
        node: &'a N,
        type_support: &'a T,
        service_name: &str,
        options: &ClientOptions,
    ) -> Result<(), ClientError> {
        init(Some(self), Some(node), Some(type_support), Some(service_name), Some(options))
    }

    /// Finalize the client, releasing its publication and then its name.
    ///
    /// `node` must be the node the client was initialized on. A zeroed client
    /// finalizes to `Ok` without touching anything. The client is finalized
    /// even when the node fails to release the publication; that failure is
    /// returned.
    ///
    /// # Errors
    ///
    /// - `ClientError::AlreadyFinalized` on a second call
    /// - `ClientError::InvalidArgument` if `node` is absent or a different node
    /// - `ClientError::NodeInvalid` if `node` is not valid
    /// - `ClientError::Node` if releasing the publication failed
    pub fn fini(&mut self, node: Option<&N>) -> Result<(), ClientError> {
        self.finalize(node).record_error()
    }

    fn finalize(&mut self, node: Option<&N>) -> Result<(), ClientError> {
        let inner = match &self.state {
            State::Uninitialized => return Ok(()),
            State::Finalized => return Err(ClientError::AlreadyFinalized),
            State::Ready(inner) => inner,
        };

        let node = node.ok_or_else(|| ClientError::InvalidArgument("node is null".into()))?;
        if !node.is_valid() {
            return Err(ClientError::NodeInvalid("node is not initialized or shut down".into()));
        }
        if !ptr::eq(node, inner.node) {
            return Err(ClientError::InvalidArgument(
                "node is not the one the client was initialized on".into(),
            ));
        }

        let State::Ready(inner) = std::mem::replace(&mut self.state, State::Finalized) else {
            return Ok(());
        };

        tracing::debug!(
            service = inner.service_name_str().unwrap_or_default(),
            sequence_number = inner.sequence_number.load(Ordering::Acquire),
            "Client finalized"
        );
        inner.release()
    }

    /// Whether `client` is present and usable.
    ///
    /// Writes the reason into `reason` when returning `false`. Never
    /// allocates and never touches the error state.
    pub fn is_valid(client: Option<&Self>, reason: Option<&mut InvalidReason>) -> bool {
        let result = client.map_or(Err(InvalidReason::Null), Self::check_valid);
        match (result, reason) {
            (Ok(()), _) => true,
            (Err(why), Some(out)) => {
                *out = why;
                false
            },
            (Err(_), None) => false,
        }
    }

    /// `Ok` if the client is ready and its node and publication are valid.
    pub fn check_valid(&self) -> Result<(), InvalidReason> {
        self.ready().map(|_| ())
    }

    fn ready(&self) -> Result<&ClientImpl<'a, N, T>, InvalidReason> {
        let inner = match &self.state {
            State::Uninitialized => return Err(InvalidReason::NotInitialized),
            State::Finalized => return Err(InvalidReason::Finalized),
            State::Ready(inner) => inner,
        };
        if !inner.node.is_valid() {
            return Err(InvalidReason::NodeInvalid);
        }
        if !inner.publication.is_valid() {
            return Err(InvalidReason::PublicationInvalid);
        }
        Ok(inner)
    }

    /// Encode and publish `request`, returning its sequence number.
    ///
    /// Does not wait for a response. Safe to call from several threads at
    /// once; every call that reaches the publish step gets a distinct number.
    ///
    /// # Errors
    ///
    /// - `ClientError::InvalidArgument` if the client is not valid, or the
    ///   request cannot be encoded or exceeds the maximum payload size
    /// - `ClientError::BadAlloc` if the frame buffer cannot be allocated
    /// - `ClientError::Transport` if publishing failed; the sequence number
    ///   is consumed
    pub fn send_request(&self, request: &T::Request) -> Result<i64, ClientError> {
        self.send(request).record_error()
    }

    fn send(&self, request: &T::Request) -> Result<i64, ClientError> {
        let inner =
            self.ready().map_err(|reason| ClientError::InvalidArgument(reason.to_string()))?;
        inner.send(request)
    }

    /// Resolved service name, if ready.
    pub fn service_name(&self) -> Option<&str> {
        match &self.state {
            State::Ready(inner) => inner.service_name_str(),
            _ => None,
        }
    }

    /// Options captured at initialization, if ready.
    pub fn options(&self) -> Option<&ClientOptions> {
        match &self.state {
            State::Ready(inner) => Some(&inner.options),
            _ => None,
        }
    }

    /// Publication handle, if ready.
    pub fn publication(&self) -> Option<&N::Publication> {
        match &self.state {
            State::Ready(inner) => Some(&inner.publication),
            _ => None,
        }
    }

    /// Most recently reserved sequence number (0 before the first send), if
    /// ready.
    pub fn last_sequence_number(&self) -> Option<i64> {
        match &self.state {
            State::Ready(inner) => Some(inner.sequence_number.load(Ordering::Acquire)),
            _ => None,
        }
    }
}

impl<N: Node, T: TypeSupport> ClientImpl<'_, N, T> {
    fn service_name_str(&self) -> Option<&str> {
        std::str::from_utf8(self.service_name.as_slice()).ok()
    }

    fn send(&self, request: &T::Request) -> Result<i64, ClientError> {
        let allocator = &self.options.allocator;
        let mut frame = self.encode_frame(request)?;
        let payload_len = frame.len() - RequestHeader::SIZE;

        let sequence_number = self.sequence_number.fetch_add(1, Ordering::AcqRel) + 1;
        debug_assert!(sequence_number > 0, "sequence number overflowed");

        let mut header = RequestHeader::new(MessageKind::Request);
        header.set_sequence_number(sequence_number);
        header.set_writer_id(self.publication.writer_id());
        header.set_payload_size(payload_len as u32);
        if let Some(slot) = frame.as_mut_slice().get_mut(..RequestHeader::SIZE) {
            slot.copy_from_slice(&header.to_bytes());
        }

        let published = self.publication.publish(frame.as_slice());
        allocator.deallocate(frame);

        match published {
            Ok(()) => {
                tracing::trace!(sequence_number, payload_len, "Request published");
                Ok(sequence_number)
            },
            Err(e) => {
                tracing::warn!(
                    sequence_number,
                    error = %e,
                    "Publish failed, sequence number consumed"
                );
                Err(ClientError::Transport(e))
            },
        }
    }

    /// Frame block holding a zeroed header followed by the encoded request.
    ///
    /// Grows the block through the allocator until the request fits or the
    /// frame limit is reached. The block is returned to the allocator on
    /// every failure.
    fn encode_frame(&self, request: &T::Request) -> Result<Block, ClientError> {
        let allocator = &self.options.allocator;
        let mut block = allocator.try_allocate(INITIAL_FRAME_CAPACITY)?;

        loop {
            block.clear();
            let encoded = if block.try_extend(&HEADER_PLACEHOLDER) {
                self.type_support.encode_request(request, &mut block)
            } else {
                Err(CodecError::BufferFull)
            };

            match encoded {
                Ok(()) => return Ok(block),
                Err(CodecError::BufferFull) => {
                    let capacity = block.capacity();
                    if capacity >= MAX_FRAME_LEN {
                        allocator.deallocate(block);
                        return Err(ClientError::InvalidArgument(format!(
                            "request exceeds maximum payload size of {} bytes",
                            RequestHeader::MAX_PAYLOAD_SIZE
                        )));
                    }

                    let grown = capacity.saturating_mul(2).min(MAX_FRAME_LEN);
                    tracing::debug!(from = capacity, to = grown, "Growing request frame");

                    block = allocator.try_reallocate(block, grown).map_err(|(block, e)| {
                        allocator.deallocate(block);
                        e
                    })?;
                },
                Err(e) => {
                    allocator.deallocate(block);
                    return Err(ClientError::InvalidArgument(format!(
                        "request cannot be encoded: {e}"
                    )));
                },
            }
        }
    }

    /// Release the publication, then the name.
    fn release(self) -> Result<(), ClientError> {
        let Self { node, service_name, options, publication, .. } = self;

        let released = node.release_publication(publication);
        options.allocator.deallocate(service_name);
        released.map_err(ClientError::from)
    }
}

impl<N: Node, T: TypeSupport> Default for Client<'_, N, T> {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl<N: Node, T: TypeSupport> Drop for Client<'_, N, T> {
    fn drop(&mut self) {
        if let State::Ready(inner) = std::mem::replace(&mut self.state, State::Finalized) {
            tracing::warn!(
                service = inner.service_name_str().unwrap_or_default(),
                "Client dropped without fini, releasing resources"
            );
            if let Err(e) = inner.release() {
                tracing::warn!(error = %e, "Release on drop failed");
            }
        }
    }
}

impl<N: Node, T: TypeSupport> std::fmt::Debug for Client<'_, N, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::Uninitialized => "uninitialized",
            State::Ready(_) => "ready",
            State::Finalized => "finalized",
        };
        f.debug_struct("Client")
            .field("state", &state)
            .field("service_name", &self.service_name())
            .field("last_sequence_number", &self.last_sequence_number())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::{
        CborTypeSupport, ErrorKind, TrackingAllocator,
        node::{ChaoticNode, MemoryNode},
    };

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct AddTwoInts {
        a: i64,
        b: i64,
    }

    #[derive(Debug, Deserialize)]
    struct Sum {
        #[allow(dead_code)]
        sum: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Blob(Vec<u8>);

    static ADD_TWO_INTS: CborTypeSupport<AddTwoInts, Sum> =
        CborTypeSupport::new("example_interfaces/srv/AddTwoInts");

    /// Type support whose requests never fit.
    struct Bottomless;

    impl TypeSupport for Bottomless {
        type Request = ();
        type Response = ();

        fn type_name(&self) -> &str {
            "test_msgs/srv/Bottomless"
        }

        fn encode_request(&self, _: &(), _: &mut Block) -> Result<(), CodecError> {
            Err(CodecError::BufferFull)
        }

        fn decode_response(&self, _: &[u8]) -> Result<(), CodecError> {
            Ok(())
        }
    }

    /// Type support that refuses every request.
    struct Refusing;

    impl TypeSupport for Refusing {
        type Request = ();
        type Response = ();

        fn type_name(&self) -> &str {
            "test_msgs/srv/Refusing"
        }

        fn encode_request(&self, _: &(), _: &mut Block) -> Result<(), CodecError> {
            Err(CodecError::Encode("unsupported field".into()))
        }

        fn decode_response(&self, _: &[u8]) -> Result<(), CodecError> {
            Ok(())
        }
    }

    fn tracked() -> (Arc<TrackingAllocator>, ClientOptions) {
        let tracker = Arc::new(TrackingAllocator::new());
        let options = ClientOptions::default().with_allocator(tracker.allocator());
        (tracker, options)
    }

    #[test]
    fn zeroed_client_is_not_valid() {
        let client: Client<'_, MemoryNode, CborTypeSupport<AddTwoInts, Sum>> = Client::zeroed();
        let mut reason = InvalidReason::Null;

        assert!(!Client::is_valid(Some(&client), Some(&mut reason)));
        assert_eq!(reason, InvalidReason::NotInitialized);
        assert_eq!(client.service_name(), None);
        assert_eq!(client.last_sequence_number(), None);
    }

    #[test]
    fn missing_client_is_not_valid() {
        let mut reason = InvalidReason::NotInitialized;

        assert!(!Client::<MemoryNode, CborTypeSupport<AddTwoInts, Sum>>::is_valid(
            None,
            Some(&mut reason)
        ));
        assert_eq!(reason, InvalidReason::Null);
    }

    #[test]
    fn sends_are_numbered_from_one() {
        let node = MemoryNode::new("node", "");
        let client = Client::new(&node, &ADD_TWO_INTS, "add_two_ints", &ClientOptions::default())
            .expect("init");

        assert_eq!(client.last_sequence_number(), Some(0));
        for expected in 1..=3 {
            assert_eq!(client.send_request(&AddTwoInts { a: expected, b: 1 }), Ok(expected));
        }

        let sequences: Vec<i64> = node.published().iter().map(|p| p.sequence_number()).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert_eq!(client.last_sequence_number(), Some(3));
    }

    #[test]
    fn published_frame_carries_header_and_payload() {
        let node = MemoryNode::new("node", "/math");
        let client = Client::new(&node, &ADD_TWO_INTS, "add_two_ints", &ClientOptions::default())
            .expect("init");
        let request = AddTwoInts { a: 2, b: 40 };

        client.send_request(&request).expect("send");

        let published = node.published();
        let frame = &published[0].frame;
        assert_eq!(published[0].service_name, "/math/add_two_ints");
        assert_eq!(frame.header.kind(), Some(MessageKind::Request));
        assert_eq!(
            frame.header.writer_id(),
            client.publication().map(Publication::writer_id).expect("publication")
        );
        assert_eq!(frame.header.payload_size() as usize, frame.payload.len());

        let decoded: AddTwoInts = ciborium::from_reader(&frame.payload[..]).expect("decode");
        assert_eq!(decoded, request);
    }

    #[test]
    fn large_request_grows_frame_through_allocator() {
        let blob: CborTypeSupport<Blob, ()> = CborTypeSupport::new("test_msgs/srv/Blob");
        let node = MemoryNode::new("node", "");
        let (tracker, options) = tracked();
        let client = Client::new(&node, &blob, "blob", &options).expect("init");

        assert_eq!(client.send_request(&Blob(vec![7; 10_000])), Ok(1));

        let stats = tracker.stats();
        assert!(stats.reallocate_calls > 0);
        // Only the service name is still held
        assert_eq!(stats.live_blocks, 1);
        assert!(node.published()[0].frame.payload.len() > 10_000);
    }

    #[test]
    fn oversized_request_is_invalid_and_not_numbered() {
        let node = MemoryNode::new("node", "");
        let (tracker, options) = tracked();
        let client = Client::new(&node, &Bottomless, "bottomless", &options).expect("init");

        let err = client.send_request(&()).expect_err("never fits");

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(client.last_sequence_number(), Some(0));
        assert_eq!(tracker.live_blocks(), 1);
        assert_eq!(node.published_count(), 0);
    }

    #[test]
    fn encode_failure_is_invalid_and_not_numbered() {
        let node = MemoryNode::new("node", "");
        let (tracker, options) = tracked();
        let client = Client::new(&node, &Refusing, "refusing", &options).expect("init");

        let err = client.send_request(&()).expect_err("refused");

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(client.last_sequence_number(), Some(0));
        assert_eq!(tracker.live_blocks(), 1);
    }

    #[test]
    fn reinit_of_ready_client_is_rejected() {
        let node = MemoryNode::new("node", "");
        let options = ClientOptions::default();
        let mut client = Client::new(&node, &ADD_TWO_INTS, "add_two_ints", &options).expect("init");

        let err = client.init(&node, &ADD_TWO_INTS, "other", &options).expect_err("ready");

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(client.service_name(), Some("/add_two_ints"));
        assert_eq!(node.live_publications(), 1);
    }

    #[test]
    fn fini_with_foreign_node_is_rejected() {
        let node = MemoryNode::new("node", "");
        let other = MemoryNode::new("other", "");
        let mut client =
            Client::new(&node, &ADD_TWO_INTS, "add_two_ints", &ClientOptions::default())
                .expect("init");

        let err = client.fini(Some(&other)).expect_err("foreign node");

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(client.check_valid().is_ok());
        assert_eq!(client.fini(Some(&node)), Ok(()));
    }

    #[test]
    fn shutdown_node_invalidates_client() {
        let node = MemoryNode::new("node", "");
        let client = Client::new(&node, &ADD_TWO_INTS, "add_two_ints", &ClientOptions::default())
            .expect("init");

        node.shutdown();

        assert_eq!(client.check_valid(), Err(InvalidReason::NodeInvalid));
        let err = client.send_request(&AddTwoInts { a: 1, b: 1 }).expect_err("invalid");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(client.last_sequence_number(), Some(0));
    }

    #[test]
    fn finalized_client_cannot_send() {
        let node = MemoryNode::new("node", "");
        let mut client =
            Client::new(&node, &ADD_TWO_INTS, "add_two_ints", &ClientOptions::default())
                .expect("init");
        client.fini(Some(&node)).expect("fini");

        assert_eq!(client.check_valid(), Err(InvalidReason::Finalized));
        let err = client.send_request(&AddTwoInts { a: 1, b: 1 }).expect_err("finalized");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn finalized_client_can_be_reinitialized() {
        let node = MemoryNode::new("node", "");
        let options = ClientOptions::default();
        let mut client = Client::new(&node, &ADD_TWO_INTS, "add_two_ints", &options).expect("init");
        client.send_request(&AddTwoInts { a: 1, b: 1 }).expect("send");
        client.fini(Some(&node)).expect("fini");

        client.init(&node, &ADD_TWO_INTS, "add_two_ints", &options).expect("reinit");

        assert_eq!(client.last_sequence_number(), Some(0));
        assert_eq!(client.send_request(&AddTwoInts { a: 1, b: 1 }), Ok(1));
    }

    #[test]
    fn drop_releases_resources() {
        let node = MemoryNode::new("node", "");
        let (tracker, options) = tracked();
        {
            let _client =
                Client::new(&node, &ADD_TWO_INTS, "add_two_ints", &options).expect("init");
            assert_eq!(node.live_publications(), 1);
        }

        assert_eq!(node.live_publications(), 0);
        assert_eq!(tracker.live_blocks(), 0);
    }

    #[test]
    fn publication_failure_unwinds_name_block() {
        let node = ChaoticNode::new(MemoryNode::new("node", ""), 0.0);
        node.fail_publication_creation(true);
        let (tracker, options) = tracked();

        let err = Client::new(&node, &ADD_TWO_INTS, "add_two_ints", &options).expect_err("node");

        assert_eq!(err.kind(), ErrorKind::Node);
        assert_eq!(tracker.stats().allocate_calls, 1);
        assert_eq!(tracker.live_blocks(), 0);
    }

    #[test]
    fn resolved_name_is_stored_in_one_exact_block() {
        let node = MemoryNode::new("driver", "/robot");
        let (tracker, options) = tracked();

        let mut client = Client::new(&node, &ADD_TWO_INTS, "~/reset", &options).expect("init");

        let stats = tracker.stats();
        assert_eq!(stats.allocate_calls, 1);
        assert_eq!(stats.live_bytes, "/robot/driver/reset".len());
        assert_eq!(client.service_name(), Some("/robot/driver/reset"));

        client.fini(Some(&node)).expect("fini");
        assert_eq!(tracker.live_blocks(), 0);
    }

    #[test]
    fn send_after_fini_reports_reason() {
        let node = MemoryNode::new("node", "");
        let mut client = Client::new(&node, &ADD_TWO_INTS, "add", &ClientOptions::default())
            .expect("init");
        client.fini(Some(&node)).expect("fini");

        let err = client.send_request(&AddTwoInts { a: 1, b: 2 }).expect_err("finalized");

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains(InvalidReason::Finalized.as_str()));
    }
}
