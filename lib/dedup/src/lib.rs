mod chain;
mod deduplicator;
mod error;
mod filter;
mod hash;
mod strategy;
mod table;
mod value;

pub use chain::ChainedDeduplicator;
pub use deduplicator::{DeduplicatorRef, StatementDeduplicator};
pub use error::DedupConfigError;
pub use filter::{wrap_as_filter, Deduplicate};
pub use hash::HashDeduplicator;
pub use strategy::{chain, new_partial, new_total, ComparisonMethod, DedupStrategy};
pub use value::{EqualsDeduplicator, IdentityDeduplicator};
