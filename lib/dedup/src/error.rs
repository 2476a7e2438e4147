/// An error raised while building a deduplicator from a textual description.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DedupConfigError {
    #[error("Unknown comparison method '{0}', expected 'identity', 'equals' or 'hash'")]
    UnknownMethod(String),
    #[error("Unknown deduplication kind '{0}', expected 'total' or 'partial'")]
    UnknownKind(String),
    #[error("Invalid capacity '{0}', expected a positive number")]
    InvalidCapacity(String),
    #[error("Malformed deduplication strategy '{0}'")]
    Malformed(String),
}
