use rdf_flow_model::QuadRef;
use std::fmt::Debug;
use std::sync::Arc;

/// Remembers statements in order to tell new statements from repeated ones.
///
/// All methods may be called concurrently.
///
/// A *total* deduplicator never forgets: a statement is reported as new exactly once. A
/// *partial* deduplicator has a bounded capacity and may forget statements, reporting them as
/// new again. It never reports a statement as seen that was not added before.
pub trait StatementDeduplicator: Debug + Send + Sync {
    /// Returns true if no statement is ever forgotten.
    fn is_total(&self) -> bool;

    /// Checks whether `quad` is new and, if `mark` is set, records it as seen.
    ///
    /// Returns true if `quad` is new.
    fn process(&self, quad: QuadRef<'_>, mark: bool) -> bool;

    /// Returns true if `quad` is new, without recording it.
    fn test(&self, quad: QuadRef<'_>) -> bool {
        self.process(quad, false)
    }

    /// Records `quad` as seen and returns true if it was new.
    fn add(&self, quad: QuadRef<'_>) -> bool {
        self.process(quad, true)
    }
}

pub type DeduplicatorRef = Arc<dyn StatementDeduplicator>;
