//! Chaotic node wrapper for fault injection testing
//!
//! Wraps another [`Node`] and randomly fails publishes so tests can check how
//! clients account for transport failures. Failures are driven by a seeded
//! LCG, so a given seed always fails the same operations.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use super::{Node, Publication};
use crate::{
    error::{NodeError, TransportError},
    options::QosProfile,
};

const DEFAULT_SEED: u64 = 0x1234_5678_9ABC_DEF0;

/// Deterministic RNG for chaos injection
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // Numerical Recipes constants
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

/// State shared by the wrapper and every publication it hands out.
struct Chaos {
    failure_rate: f64,
    rng: Mutex<ChaoticRng>,
    fail_create: AtomicBool,
    publish_attempts: AtomicUsize,
    injected_failures: AtomicUsize,
}

impl Chaos {
    fn should_fail_publish(&self) -> bool {
        self.publish_attempts.fetch_add(1, Ordering::Relaxed);
        let roll = self.rng.lock().unwrap_or_else(PoisonError::into_inner).next();
        let fail = roll < self.failure_rate;
        if fail {
            self.injected_failures.fetch_add(1, Ordering::Relaxed);
        }
        fail
    }
}

/// Node wrapper that injects publish failures
///
/// Delegates everything to the inner node. Each publish through one of its
/// publications fails with `TransportError::Io` with probability
/// `failure_rate`, without reaching the inner publication. Clones share the
/// RNG and counters.
#[derive(Clone)]
pub struct ChaoticNode<N: Node> {
    inner: N,
    chaos: Arc<Chaos>,
}

impl<N: Node> ChaoticNode<N> {
    /// Wrap `inner` with the default seed.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: N, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, DEFAULT_SEED)
    }

    /// Wrap `inner` with an explicit seed for reproducible chaos.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: N, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            chaos: Arc::new(Chaos {
                failure_rate,
                rng: Mutex::new(ChaoticRng::new(seed)),
                fail_create: AtomicBool::new(false),
                publish_attempts: AtomicUsize::new(0),
                injected_failures: AtomicUsize::new(0),
            }),
        }
    }

    /// Make every subsequent publication creation fail.
    pub fn fail_publication_creation(&self, fail: bool) {
        self.chaos.fail_create.store(fail, Ordering::Relaxed);
    }

    /// Wrapped node (for checking invariants after chaos).
    pub fn inner(&self) -> &N {
        &self.inner
    }

    /// Publishes attempted through any publication of this wrapper.
    pub fn publish_attempts(&self) -> usize {
        self.chaos.publish_attempts.load(Ordering::Relaxed)
    }

    /// Publishes failed by injection.
    pub fn injected_failures(&self) -> usize {
        self.chaos.injected_failures.load(Ordering::Relaxed)
    }
}

impl<N: Node> std::fmt::Debug for ChaoticNode<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaoticNode")
            .field("failure_rate", &self.chaos.failure_rate)
            .field("publish_attempts", &self.publish_attempts())
            .field("injected_failures", &self.injected_failures())
            .finish_non_exhaustive()
    }
}

impl<N: Node> Node for ChaoticNode<N> {
    type Publication = ChaoticPublication<N::Publication>;

    fn is_valid(&self) -> bool {
        self.inner.is_valid()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn namespace(&self) -> &str {
        self.inner.namespace()
    }

    fn create_publication(
        &self,
        type_name: &str,
        service_name: &str,
        qos: &QosProfile,
    ) -> Result<Self::Publication, NodeError> {
        if self.chaos.fail_create.load(Ordering::Relaxed) {
            return Err(NodeError::Rejected("chaotic failure injection".to_string()));
        }

        let inner = self.inner.create_publication(type_name, service_name, qos)?;
        Ok(ChaoticPublication { inner, chaos: Arc::clone(&self.chaos) })
    }

    fn release_publication(&self, publication: Self::Publication) -> Result<(), NodeError> {
        self.inner.release_publication(publication.inner)
    }
}

/// Publication handle of a [`ChaoticNode`].
pub struct ChaoticPublication<P: Publication> {
    inner: P,
    chaos: Arc<Chaos>,
}

impl<P: Publication + std::fmt::Debug> std::fmt::Debug for ChaoticPublication<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaoticPublication").field("inner", &self.inner).finish_non_exhaustive()
    }
}

impl<P: Publication> Publication for ChaoticPublication<P> {
    fn writer_id(&self) -> u64 {
        self.inner.writer_id()
    }

    fn is_valid(&self) -> bool {
        self.inner.is_valid()
    }

    fn publish(&self, frame: &[u8]) -> Result<(), TransportError> {
        if self.chaos.should_fail_publish() {
            return Err(TransportError::Io("chaotic failure injection".to_string()));
        }
        self.inner.publish(frame)
    }
}
