use crate::{DeduplicatorRef, StatementDeduplicator};
use rdf_flow_model::QuadRef;

/// A deduplicator that accepts a statement only if all of its components accept it.
///
/// Every component is always asked with `add` semantics, also when the chain itself is only
/// tested, and also after an earlier component rejected the statement. Cheap partial
/// deduplicators placed in front of an exact one therefore keep learning every statement.
#[derive(Debug)]
pub struct ChainedDeduplicator {
    deduplicators: Box<[DeduplicatorRef]>,
}

impl ChainedDeduplicator {
    pub fn new(deduplicators: impl IntoIterator<Item = DeduplicatorRef>) -> Self {
        Self {
            deduplicators: deduplicators.into_iter().collect(),
        }
    }

    pub fn deduplicators(&self) -> &[DeduplicatorRef] {
        &self.deduplicators
    }
}

impl StatementDeduplicator for ChainedDeduplicator {
    fn is_total(&self) -> bool {
        !self.deduplicators.is_empty() && self.deduplicators.iter().all(|d| d.is_total())
    }

    fn process(&self, quad: QuadRef<'_>, _mark: bool) -> bool {
        let mut novel = true;
        for deduplicator in &self.deduplicators {
            let accepted = deduplicator.add(quad);
            novel = novel && accepted;
        }
        novel
    }
}
