use rdf_flow_common::MutexExt;
use std::mem;
use std::sync::{Mutex, MutexGuard};

/// Number of independently locked stripes.
pub(crate) const STRIPES: usize = 64;

const STRIPE_MASK: u64 = STRIPES as u64 - 1;

/// A slot of an [OpenTable]. The default value is the vacant slot.
pub(crate) trait TableSlot: Default {
    fn is_vacant(&self) -> bool;

    /// The hash the entry was positioned with. Only used when the table grows.
    fn position_hash(&self) -> u64;
}

/// What an [OpenTable] does once it fills up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Growth {
    /// Probes linearly and doubles once `len / capacity` reaches `numerator / denominator`.
    Rehash { numerator: usize, denominator: usize },
    /// Looks at a single slot and overwrites it on insertion.
    Evict,
}

/// Doubling at two thirds of the capacity keeps probe sequences short.
pub(crate) const TWO_THIRDS: Growth = Growth::Rehash {
    numerator: 2,
    denominator: 3,
};

/// An open-addressing hash table with a vacant-slot sentinel.
///
/// The table only supports lookups and insertions; entries are never removed except by
/// eviction.
#[derive(Debug)]
pub(crate) struct OpenTable<S> {
    slots: Box<[S]>,
    len: usize,
    growth: Growth,
}

impl<S: TableSlot> OpenTable<S> {
    pub(crate) fn new(capacity: usize, growth: Growth) -> Self {
        Self {
            slots: vacant_slots(capacity.max(1)),
            len: 0,
            growth,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Looks for an entry with `hash` for which `matches` holds.
    ///
    /// If none is found and `insert` is set, the entry created by `make` is stored. Returns true
    /// if no matching entry was found.
    pub(crate) fn probe(
        &mut self,
        hash: u64,
        matches: impl Fn(&S) -> bool,
        insert: bool,
        make: impl FnOnce() -> S,
    ) -> bool {
        match self.growth {
            Growth::Evict => {
                let index = self.home(hash);
                let slot = &mut self.slots[index];
                let vacant = slot.is_vacant();
                if !vacant && matches(slot) {
                    return false;
                }
                if insert {
                    *slot = make();
                    if vacant {
                        self.len += 1;
                    }
                }
                true
            }
            Growth::Rehash {
                numerator,
                denominator,
            } => {
                let mut index = self.home(hash);
                loop {
                    let slot = &self.slots[index];
                    if slot.is_vacant() {
                        break;
                    }
                    if matches(slot) {
                        return false;
                    }
                    index = (index + 1) % self.slots.len();
                }
                if insert {
                    self.slots[index] = make();
                    self.len += 1;
                    if self.len * denominator >= self.slots.len() * numerator {
                        self.grow();
                    }
                }
                true
            }
        }
    }

    fn home(&self, hash: u64) -> usize {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "The remainder is smaller than the number of slots"
        )]
        let index = (hash % self.slots.len() as u64) as usize;
        index
    }

    fn grow(&mut self) {
        let doubled = self.slots.len() * 2;
        let old = mem::replace(&mut self.slots, vacant_slots(doubled));
        for slot in old.into_vec() {
            if slot.is_vacant() {
                continue;
            }
            let mut index = self.home(slot.position_hash());
            while !self.slots[index].is_vacant() {
                index = (index + 1) % self.slots.len();
            }
            self.slots[index] = slot;
        }
    }
}

fn vacant_slots<S: TableSlot>(capacity: usize) -> Box<[S]> {
    (0..capacity).map(|_| S::default()).collect()
}

/// A fixed number of independently locked values, selected by the low bits of a hash.
#[derive(Debug)]
pub(crate) struct Striped<T> {
    stripes: Box<[Mutex<T>]>,
}

impl<T> Striped<T> {
    pub(crate) fn new(mut init: impl FnMut() -> T) -> Self {
        Self {
            stripes: (0..STRIPES).map(|_| Mutex::new(init())).collect(),
        }
    }

    /// Locks the stripe responsible for `hash`.
    pub(crate) fn lock(&self, hash: u64) -> MutexGuard<'_, T> {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "The stripe index has six bits"
        )]
        let index = (hash & STRIPE_MASK) as usize;
        self.stripes[index].lock_unpoisoned()
    }

    /// Folds over all stripes, locking one at a time.
    pub(crate) fn fold<A>(&self, init: A, mut f: impl FnMut(A, &T) -> A) -> A {
        self.stripes
            .iter()
            .fold(init, |acc, stripe| f(acc, &stripe.lock_unpoisoned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    struct Key(u64);

    impl TableSlot for Key {
        fn is_vacant(&self) -> bool {
            self.0 == 0
        }

        fn position_hash(&self) -> u64 {
            self.0
        }
    }

    fn add(table: &mut OpenTable<Key>, key: u64) -> bool {
        table.probe(key, |slot| slot.0 == key, true, || Key(key))
    }

    #[test]
    fn test_rehash_grows_at_two_thirds() {
        let mut table = OpenTable::new(3, TWO_THIRDS);
        assert!(add(&mut table, 1));
        assert_eq!(table.capacity(), 3);
        assert!(add(&mut table, 2));
        assert_eq!(table.capacity(), 6);
        assert!(!add(&mut table, 1));
        assert!(!add(&mut table, 2));
    }

    #[test]
    fn test_rehash_keeps_colliding_entries() {
        let mut table = OpenTable::new(8, TWO_THIRDS);
        for key in (1..=200).map(|i| i * 8) {
            assert!(add(&mut table, key));
        }
        for key in (1..=200).map(|i| i * 8) {
            assert!(!add(&mut table, key));
        }
        assert_eq!(table.len(), 200);
        assert!(table.len() * 3 < table.capacity() * 2);
    }

    #[test]
    fn test_lookup_without_insert_does_not_store() {
        let mut table = OpenTable::new(8, TWO_THIRDS);
        assert!(table.probe(5, |slot: &Key| slot.0 == 5, false, || Key(5)));
        assert!(table.probe(5, |slot: &Key| slot.0 == 5, false, || Key(5)));
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_evict_overwrites_colliding_entry() {
        let mut table = OpenTable::new(4, Growth::Evict);
        assert!(add(&mut table, 1));
        assert!(add(&mut table, 5));
        assert!(add(&mut table, 1));
        assert!(!add(&mut table, 1));
        assert_eq!(table.len(), 1);
        assert_eq!(table.capacity(), 4);
    }

    #[test]
    fn test_stripes_are_selected_by_low_bits() {
        let striped = Striped::new(|| 0_usize);
        *striped.lock(3) += 1;
        *striped.lock(3 + 64) += 1;
        *striped.lock(4) += 1;
        assert_eq!(*striped.lock(3), 2);
        assert_eq!(striped.fold(0, |sum, value| sum + value), 3);
    }
}
