use crate::table::{Growth, OpenTable, Striped, TableSlot, STRIPES, TWO_THIRDS};
use crate::StatementDeduplicator;
use rdf_flow_common::MutexExt;
use rdf_flow_model::{
    GraphNameRef, InternedQuad, InternedTerm, QuadRef, Term, TermInterner, TermRef,
};
use rustc_hash::FxHasher;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Initial number of slots of a total value table.
const INITIAL_CAPACITY: usize = 1024;

/// Combines the hashes of the four positions of a statement. Never returns zero.
fn statement_hash(subject: u64, predicate: u64, object: u64, graph_name: u64) -> u64 {
    let hash = subject
        .wrapping_mul(6661)
        .wrapping_add(predicate.wrapping_mul(961))
        .wrapping_add(object.wrapping_mul(31))
        .wrapping_add(graph_name);
    if hash == 0 {
        1
    } else {
        hash
    }
}

fn value_hash(term: TermRef<'_>) -> u64 {
    let mut hasher = FxHasher::default();
    term.hash(&mut hasher);
    hasher.finish()
}

fn address_hash(term: &InternedTerm) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write_u64(term.identity_hash());
    hasher.finish()
}

/// The four positions of a stored statement.
#[derive(Clone, Debug)]
struct StoredQuad<T> {
    subject: T,
    predicate: T,
    object: T,
    graph_name: Option<T>,
}

/// A slot of a value table. A zero hash marks a vacant slot.
#[derive(Debug)]
struct ValueSlot<T> {
    hash: u64,
    quad: Option<StoredQuad<T>>,
}

impl<T> Default for ValueSlot<T> {
    fn default() -> Self {
        Self {
            hash: 0,
            quad: None,
        }
    }
}

impl<T> TableSlot for ValueSlot<T> {
    fn is_vacant(&self) -> bool {
        self.hash == 0
    }

    fn position_hash(&self) -> u64 {
        self.hash
    }
}

/// A statement that can be looked up in a [ValueTables].
trait LookupKey {
    type Stored;

    fn key_hash(&self) -> u64;

    fn matches(&self, stored: &StoredQuad<Self::Stored>) -> bool;

    fn to_stored(&self) -> StoredQuad<Self::Stored>;
}

impl LookupKey for QuadRef<'_> {
    type Stored = Term;

    fn key_hash(&self) -> u64 {
        statement_hash(
            value_hash(self.subject.into()),
            value_hash(self.predicate.into()),
            value_hash(self.object),
            match self.graph_name {
                GraphNameRef::NamedNode(node) => value_hash(node.into()),
                GraphNameRef::BlankNode(node) => value_hash(node.into()),
                GraphNameRef::DefaultGraph => 0,
            },
        )
    }

    fn matches(&self, stored: &StoredQuad<Term>) -> bool {
        stored.subject.as_ref() == TermRef::from(self.subject)
            && stored.predicate.as_ref() == TermRef::from(self.predicate)
            && stored.object.as_ref() == self.object
            && match (&stored.graph_name, self.graph_name) {
                (None, GraphNameRef::DefaultGraph) => true,
                (Some(Term::NamedNode(stored)), GraphNameRef::NamedNode(node)) => {
                    stored.as_ref() == node
                }
                (Some(Term::BlankNode(stored)), GraphNameRef::BlankNode(node)) => {
                    stored.as_ref() == node
                }
                _ => false,
            }
    }

    fn to_stored(&self) -> StoredQuad<Term> {
        StoredQuad {
            subject: self.subject.into_owned().into(),
            predicate: self.predicate.into_owned().into(),
            object: self.object.into_owned(),
            graph_name: match self.graph_name {
                GraphNameRef::NamedNode(node) => Some(node.into_owned().into()),
                GraphNameRef::BlankNode(node) => Some(node.into_owned().into()),
                GraphNameRef::DefaultGraph => None,
            },
        }
    }
}

impl LookupKey for &InternedQuad {
    type Stored = InternedTerm;

    fn key_hash(&self) -> u64 {
        statement_hash(
            address_hash(&self.subject),
            address_hash(&self.predicate),
            address_hash(&self.object),
            self.graph_name.as_ref().map_or(0, address_hash),
        )
    }

    fn matches(&self, stored: &StoredQuad<InternedTerm>) -> bool {
        stored.subject.same_instance(&self.subject)
            && stored.predicate.same_instance(&self.predicate)
            && stored.object.same_instance(&self.object)
            && match (&stored.graph_name, &self.graph_name) {
                (None, None) => true,
                (Some(stored), Some(graph_name)) => stored.same_instance(graph_name),
                _ => false,
            }
    }

    fn to_stored(&self) -> StoredQuad<InternedTerm> {
        StoredQuad {
            subject: self.subject.clone(),
            predicate: self.predicate.clone(),
            object: self.object.clone(),
            graph_name: self.graph_name.clone(),
        }
    }
}

/// The tables of a value-based deduplicator.
#[derive(Debug)]
enum ValueTables<T> {
    /// A single growable table.
    Total(Mutex<OpenTable<ValueSlot<T>>>),
    /// Fixed-size tables selected by the low bits of the statement hash and positioned by the
    /// remaining bits.
    Partial(Striped<OpenTable<ValueSlot<T>>>),
}

impl<T> ValueTables<T> {
    fn total() -> Self {
        Self::Total(Mutex::new(OpenTable::new(INITIAL_CAPACITY, TWO_THIRDS)))
    }

    fn partial(capacity: NonZeroUsize) -> Self {
        let stripe_capacity = capacity.get().div_ceil(STRIPES);
        Self::Partial(Striped::new(|| {
            OpenTable::new(stripe_capacity, Growth::Evict)
        }))
    }

    fn is_total(&self) -> bool {
        matches!(self, Self::Total(_))
    }

    fn len(&self) -> usize {
        match self {
            Self::Total(table) => table.lock_unpoisoned().len(),
            Self::Partial(stripes) => stripes.fold(0, |len, table| len + table.len()),
        }
    }

    fn process<K: LookupKey<Stored = T>>(&self, key: &K, mark: bool) -> bool {
        let hash = key.key_hash();
        let matches = |slot: &ValueSlot<T>| {
            slot.hash == hash
                && slot
                    .quad
                    .as_ref()
                    .is_some_and(|stored| key.matches(stored))
        };
        let make = || ValueSlot {
            hash,
            quad: Some(key.to_stored()),
        };
        match self {
            Self::Total(table) => table.lock_unpoisoned().probe(hash, matches, mark, make),
            Self::Partial(stripes) => stripes.lock(hash).probe(hash >> 6, matches, mark, make),
        }
    }
}

/// Identifies statements by the values of their terms.
#[derive(Debug)]
pub struct EqualsDeduplicator {
    tables: ValueTables<Term>,
}

impl EqualsDeduplicator {
    /// Creates a deduplicator that remembers every statement.
    pub fn new_total() -> Self {
        Self {
            tables: ValueTables::total(),
        }
    }

    /// Creates a deduplicator that remembers about `capacity` statements.
    pub fn new_partial(capacity: NonZeroUsize) -> Self {
        Self {
            tables: ValueTables::partial(capacity),
        }
    }

    /// Returns the number of remembered statements.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StatementDeduplicator for EqualsDeduplicator {
    fn is_total(&self) -> bool {
        self.tables.is_total()
    }

    fn process(&self, quad: QuadRef<'_>, mark: bool) -> bool {
        self.tables.process(&quad, mark)
    }
}

/// Identifies statements by the identity of their terms.
///
/// Statements passed as [QuadRef] are canonicalized through the [TermInterner] first. Callers
/// that already hold [InternedQuad]s from the same interner can skip that step with
/// [IdentityDeduplicator::add_interned] and [IdentityDeduplicator::test_interned]. Quads
/// interned by another interner never match.
///
/// The interner only keeps the terms that are still referenced. Terms of statements evicted from
/// a partial deduplicator are released, so its memory stays proportional to its capacity.
#[derive(Debug)]
pub struct IdentityDeduplicator {
    interner: Arc<TermInterner>,
    tables: ValueTables<InternedTerm>,
}

impl IdentityDeduplicator {
    /// Creates a deduplicator that remembers every statement.
    pub fn new_total(interner: Arc<TermInterner>) -> Self {
        Self {
            interner,
            tables: ValueTables::total(),
        }
    }

    /// Creates a deduplicator that remembers about `capacity` statements.
    pub fn new_partial(interner: Arc<TermInterner>, capacity: NonZeroUsize) -> Self {
        Self {
            interner,
            tables: ValueTables::partial(capacity),
        }
    }

    /// Returns the interner used to canonicalize statements.
    pub fn interner(&self) -> &Arc<TermInterner> {
        &self.interner
    }

    /// Records `quad` as seen and returns true if it was new.
    pub fn add_interned(&self, quad: &InternedQuad) -> bool {
        self.tables.process(&quad, true)
    }

    /// Returns true if `quad` is new, without recording it.
    pub fn test_interned(&self, quad: &InternedQuad) -> bool {
        self.tables.process(&quad, false)
    }

    /// Returns the number of remembered statements.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StatementDeduplicator for IdentityDeduplicator {
    fn is_total(&self) -> bool {
        self.tables.is_total()
    }

    fn process(&self, quad: QuadRef<'_>, mark: bool) -> bool {
        let quad = &self.interner.intern_quad(quad);
        self.tables.process(&quad, mark)
    }
}
