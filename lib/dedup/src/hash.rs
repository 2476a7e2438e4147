use crate::table::{Growth, OpenTable, Striped, TableSlot, STRIPES, TWO_THIRDS};
use crate::StatementDeduplicator;
use rdf_flow_model::{fingerprint_quad, Fingerprint, QuadRef};
use std::num::NonZeroUsize;

/// Initial number of slots of each shard of a total deduplicator.
const INITIAL_SHARD_CAPACITY: usize = 64;

/// A slot holding a statement fingerprint. A zero low word marks a vacant slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct FingerprintSlot {
    low: u64,
    high: u64,
}

impl From<Fingerprint> for FingerprintSlot {
    fn from(fingerprint: Fingerprint) -> Self {
        Self {
            low: fingerprint.low(),
            high: fingerprint.high(),
        }
    }
}

impl TableSlot for FingerprintSlot {
    fn is_vacant(&self) -> bool {
        self.low == 0
    }

    fn position_hash(&self) -> u64 {
        self.low
    }
}

/// Identifies statements by their 128-bit fingerprint.
///
/// Statements are spread over 64 shards selected by the low bits of the fingerprint's high word.
/// Each shard is an independently locked table positioned by the low word. Two different
/// statements with the same fingerprint are treated as the same statement.
///
/// The total variant grows its shards as needed. The partial variant keeps a fixed number of
/// slots and a statement evicts the statement stored in its slot.
#[derive(Debug)]
pub struct HashDeduplicator {
    shards: Striped<OpenTable<FingerprintSlot>>,
    total: bool,
}

impl HashDeduplicator {
    /// Creates a deduplicator that remembers every statement.
    pub fn new_total() -> Self {
        Self {
            shards: Striped::new(|| OpenTable::new(INITIAL_SHARD_CAPACITY, TWO_THIRDS)),
            total: true,
        }
    }

    /// Creates a deduplicator that remembers about `capacity` statements.
    ///
    /// The capacity is split evenly over the shards, rounding up.
    pub fn new_partial(capacity: NonZeroUsize) -> Self {
        let shard_capacity = capacity.get().div_ceil(STRIPES);
        Self {
            shards: Striped::new(|| OpenTable::new(shard_capacity, Growth::Evict)),
            total: false,
        }
    }

    /// Returns the number of remembered statements.
    pub fn len(&self) -> usize {
        self.shards.fold(0, |len, shard| len + shard.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up `fingerprint` directly.
    pub fn process_fingerprint(&self, fingerprint: Fingerprint, mark: bool) -> bool {
        let slot = FingerprintSlot::from(fingerprint.non_zero());
        self.shards.lock(slot.high).probe(
            slot.low,
            |stored| *stored == slot,
            mark,
            || slot,
        )
    }
}

impl StatementDeduplicator for HashDeduplicator {
    fn is_total(&self) -> bool {
        self.total
    }

    fn process(&self, quad: QuadRef<'_>, mark: bool) -> bool {
        self.process_fingerprint(fingerprint_quad(quad), mark)
    }
}
