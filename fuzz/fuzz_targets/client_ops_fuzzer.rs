//! Fuzz target for arbitrary client operation sequences
//!
//! Drives one client through random init / send / fini calls while the
//! allocator and the node fail on demand.
//!
//! # Invariants
//!
//! - No operation panics, whatever the order
//! - Within one initialization, successful sends return strictly increasing
//!   numbers starting above the previous reservation
//! - Failed allocations never advance the sequence
//! - Once the client is gone, every block and publication has been returned

#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use serde::{Deserialize, Serialize};
use servolink_client::{
    CborTypeSupport, ChaoticNode, Client, ClientOptions, ErrorKind, FailureMode, MemoryNode,
    TrackingAllocator,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Payload(Vec<u8>);

static PAYLOAD: CborTypeSupport<Payload, Payload> = CborTypeSupport::new("fuzz_msgs/srv/Payload");

const NAMES: [&str; 6] = ["add_two_ints", "/abs/name", "~/private", "", "1bad", "a//b"];

#[derive(Debug, Clone, Arbitrary)]
struct Scenario {
    chaos_seed: u64,
    /// Publish failure rate 0-9 maps to 0%-90%
    failure_rate_tenth: u8,
    operations: Vec<Operation>,
}

#[derive(Debug, Clone, Arbitrary)]
enum Operation {
    Init { name_idx: u8 },
    Send { len: u16 },
    Fini { wrong_node: bool },
    FailAllocations { after: Option<u8> },
    HealAllocations,
    FailPublicationCreation(bool),
    CheckValid,
}

fuzz_target!(|scenario: Scenario| {
    let failure_rate = f64::from(scenario.failure_rate_tenth % 10) / 10.0;
    let node =
        ChaoticNode::with_seed(MemoryNode::new("fuzz", "/ns"), failure_rate, scenario.chaos_seed);
    let other = ChaoticNode::new(MemoryNode::new("other", ""), 0.0);
    let tracker = Arc::new(TrackingAllocator::new());
    let options = ClientOptions::default().with_allocator(tracker.allocator());

    {
        let mut client = Client::zeroed();
        let mut last = 0i64;

        for op in scenario.operations.into_iter().take(256) {
            match op {
                Operation::Init { name_idx } => {
                    let name = NAMES[usize::from(name_idx) % NAMES.len()];
                    let was_valid = client.check_valid().is_ok();
                    if client.init(&node, &PAYLOAD, name, &options).is_ok() {
                        assert!(!was_valid);
                        assert_eq!(client.last_sequence_number(), Some(0));
                        last = 0;
                    }
                },
                Operation::Send { len } => {
                    let before = client.last_sequence_number();
                    match client.send_request(&Payload(vec![0xEE; usize::from(len)])) {
                        Ok(sequence_number) => {
                            assert!(sequence_number > last);
                            last = sequence_number;
                        },
                        Err(e) if e.kind() == ErrorKind::Transport => {
                            last = client.last_sequence_number().unwrap_or(last);
                        },
                        Err(_) => assert_eq!(client.last_sequence_number(), before),
                    }
                },
                Operation::Fini { wrong_node } => {
                    let target = if wrong_node { &other } else { &node };
                    let _ = client.fini(Some(target));
                },
                Operation::FailAllocations { after } => {
                    let mode = after.map_or(FailureMode::Always, |n| {
                        FailureMode::AfterSuccesses(usize::from(n))
                    });
                    tracker.set_failure_mode(mode);
                },
                Operation::HealAllocations => tracker.set_failure_mode(FailureMode::Never),
                Operation::FailPublicationCreation(fail) => node.fail_publication_creation(fail),
                Operation::CheckValid => {
                    let _ = Client::is_valid(Some(&client), None);
                },
            }
        }
    }

    assert_eq!(tracker.live_blocks(), 0);
    assert_eq!(node.inner().live_publications(), 0);
});
