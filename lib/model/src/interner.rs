use crate::{GraphNameRef, QuadRef, Term, TermRef};
use dashmap::DashMap;
use rustc_hash::FxHasher;
use std::fmt::{Display, Formatter};
use std::hash::{BuildHasherDefault, Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// The canonical instance of an RDF term handed out by a [TermInterner].
///
/// Two interned terms obtained from the same interner are equal values if and only if they are
/// the same instance. [InternedTerm::same_instance] and [InternedTerm::identity_hash] give access
/// to that identity without comparing the values.
#[derive(Clone, Debug)]
pub struct InternedTerm(Arc<Term>);

impl InternedTerm {
    /// Returns the interned term.
    pub fn as_term(&self) -> &Term {
        &self.0
    }

    /// Borrows the interned term.
    pub fn as_term_ref(&self) -> TermRef<'_> {
        Term::as_ref(&self.0)
    }

    /// Returns true if both handles point to the same instance.
    pub fn same_instance(&self, other: &InternedTerm) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// A hash derived from the address of the instance.
    pub fn identity_hash(&self) -> u64 {
        Arc::as_ptr(&self.0) as usize as u64
    }
}

impl Display for InternedTerm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// A quad whose positions are all canonical instances.
#[derive(Clone, Debug)]
pub struct InternedQuad {
    pub subject: InternedTerm,
    pub predicate: InternedTerm,
    pub object: InternedTerm,
    /// [None] for the default graph.
    pub graph_name: Option<InternedTerm>,
}

/// Number of stored handles below which dead handles are never swept.
const MIN_SWEEP_THRESHOLD: usize = 1024;

/// Hands out canonical instances for RDF terms.
///
/// Interning the same value twice returns the same instance, also when both calls race, as long
/// as an [InternedTerm] for that value is alive. The interner only keeps weak handles: once every
/// [InternedTerm] of a value is dropped, the value is released and interning it again creates a
/// new instance. Handles of released values are swept once their number doubles, so the memory of
/// the interner is proportional to the number of live instances.
#[derive(Debug)]
pub struct TermInterner {
    /// Weak handles on the canonical instances, keyed by the hash of their value.
    buckets: DashMap<u64, Vec<Weak<Term>>, BuildHasherDefault<FxHasher>>,
    /// Number of handles added since the last sweep, plus the handles that survived it.
    handles: AtomicUsize,
    /// Value of `handles` that triggers the next sweep. `usize::MAX` while sweeping.
    sweep_at: AtomicUsize,
}

impl Default for TermInterner {
    fn default() -> Self {
        Self {
            buckets: DashMap::with_hasher(BuildHasherDefault::default()),
            handles: AtomicUsize::new(0),
            sweep_at: AtomicUsize::new(MIN_SWEEP_THRESHOLD),
        }
    }
}

fn value_hash(term: TermRef<'_>) -> u64 {
    let mut hasher = FxHasher::default();
    term.hash(&mut hasher);
    hasher.finish()
}

impl TermInterner {
    /// Creates a new empty [TermInterner].
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the canonical instance of `term`.
    pub fn intern<'term>(&self, term: impl Into<TermRef<'term>>) -> InternedTerm {
        let term = term.into();
        let interned = {
            let mut bucket = self.buckets.entry(value_hash(term)).or_default();
            if let Some(existing) = bucket
                .iter()
                .filter_map(Weak::upgrade)
                .find(|existing| Term::as_ref(existing) == term)
            {
                return InternedTerm(existing);
            }
            bucket.retain(|handle| handle.strong_count() > 0);
            let candidate = Arc::new(term.into_owned());
            bucket.push(Arc::downgrade(&candidate));
            candidate
        };

        let handles = self.handles.fetch_add(1, Ordering::AcqRel) + 1;
        self.sweep_if_needed(handles);
        InternedTerm(interned)
    }

    fn sweep_if_needed(&self, handles: usize) {
        let threshold = self.sweep_at.load(Ordering::Acquire);
        if handles < threshold
            || self
                .sweep_at
                .compare_exchange(threshold, usize::MAX, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            return;
        }

        let mut remaining = 0;
        self.buckets.retain(|_, bucket| {
            bucket.retain(|handle| handle.strong_count() > 0);
            remaining += bucket.len();
            !bucket.is_empty()
        });
        self.handles.store(remaining, Ordering::Release);
        self.sweep_at
            .store((2 * remaining).max(MIN_SWEEP_THRESHOLD), Ordering::Release);
    }

    /// Interns every position of `quad`.
    pub fn intern_quad(&self, quad: QuadRef<'_>) -> InternedQuad {
        InternedQuad {
            subject: self.intern(quad.subject),
            predicate: self.intern(quad.predicate),
            object: self.intern(quad.object),
            graph_name: match quad.graph_name {
                GraphNameRef::NamedNode(node) => Some(self.intern(node)),
                GraphNameRef::BlankNode(node) => Some(self.intern(node)),
                GraphNameRef::DefaultGraph => None,
            },
        }
    }

    /// Returns the number of live instances. This walks every stored handle.
    pub fn len(&self) -> usize {
        self.buckets
            .iter()
            .map(|bucket| {
                bucket
                    .iter()
                    .filter(|handle| handle.strong_count() > 0)
                    .count()
            })
            .sum()
    }

    /// Returns true if no instance is alive.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Literal, NamedNode, NamedNodeRef};
    use std::thread;

    #[test]
    fn test_equal_values_share_an_instance() {
        let interner = TermInterner::new();
        let a = interner.intern(NamedNodeRef::new_unchecked("http://example.com/a"));
        let b = interner.intern(&NamedNode::new_unchecked("http://example.com/a"));
        let c = interner.intern(&Literal::new_simple_literal("http://example.com/a"));

        assert!(a.same_instance(&b));
        assert_eq!(a.identity_hash(), b.identity_hash());
        assert!(!a.same_instance(&c));
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn test_concurrent_interning_returns_one_instance() {
        let interner = &TermInterner::new();
        let terms = thread::scope(|scope| {
            let handles = (0..8)
                .map(|_| {
                    scope.spawn(move || {
                        interner.intern(NamedNodeRef::new_unchecked("http://example.com/x"))
                    })
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect::<Vec<_>>()
        });

        for term in &terms {
            assert!(term.same_instance(&terms[0]));
        }
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn test_released_terms_are_swept() {
        let interner = TermInterner::new();
        let kept = interner.intern(NamedNodeRef::new_unchecked("http://example.com/kept"));
        for i in 0..20_000 {
            interner.intern(&Literal::new_simple_literal(i.to_string()));
        }

        assert_eq!(interner.len(), 1);
        assert!(interner.buckets.len() <= MIN_SWEEP_THRESHOLD + 1);
        assert!(kept.same_instance(
            &interner.intern(NamedNodeRef::new_unchecked("http://example.com/kept"))
        ));
    }

    #[test]
    fn test_released_term_is_interned_again() {
        let interner = TermInterner::new();
        let term = Literal::new_simple_literal("value");
        drop(interner.intern(&term));
        assert!(interner.is_empty());

        let again = interner.intern(&term);
        assert_eq!(again.as_term(), &Term::from(term));
        assert_eq!(interner.len(), 1);
    }
}
