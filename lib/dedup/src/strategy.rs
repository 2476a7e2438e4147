use crate::{
    ChainedDeduplicator, DedupConfigError, DeduplicatorRef, EqualsDeduplicator, HashDeduplicator,
    IdentityDeduplicator,
};
use rdf_flow_model::TermInterner;
use std::fmt::{Display, Formatter};
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// How a deduplicator decides that two statements are the same.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ComparisonMethod {
    /// The terms are the same interned instances.
    Identity,
    /// The terms have equal values.
    Equals,
    /// The statements have the same fingerprint.
    #[default]
    Hash,
}

impl FromStr for ComparisonMethod {
    type Err = DedupConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "identity" => Ok(Self::Identity),
            "equals" => Ok(Self::Equals),
            "hash" => Ok(Self::Hash),
            _ => Err(DedupConfigError::UnknownMethod(value.to_owned())),
        }
    }
}

impl Display for ComparisonMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Identity => "identity",
            Self::Equals => "equals",
            Self::Hash => "hash",
        })
    }
}

/// A deduplicator description, usually read from configuration.
///
/// The textual form is `total[:<method>]` or `partial[:<method>]:<capacity>`, the method
/// defaulting to `hash`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DedupStrategy {
    Total(ComparisonMethod),
    Partial {
        method: ComparisonMethod,
        capacity: NonZeroUsize,
    },
}

impl DedupStrategy {
    pub fn method(self) -> ComparisonMethod {
        match self {
            Self::Total(method) | Self::Partial { method, .. } => method,
        }
    }

    pub fn is_total(self) -> bool {
        matches!(self, Self::Total(_))
    }

    /// Creates a new, empty deduplicator.
    pub fn build(self) -> DeduplicatorRef {
        match self {
            Self::Total(method) => new_total(method),
            Self::Partial { method, capacity } => new_partial(method, capacity),
        }
    }
}

impl Default for DedupStrategy {
    fn default() -> Self {
        Self::Total(ComparisonMethod::Hash)
    }
}

impl FromStr for DedupStrategy {
    type Err = DedupConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts = value.trim().split(':').collect::<Vec<_>>();
        let kind = parts
            .first()
            .map(|kind| kind.to_ascii_lowercase())
            .unwrap_or_default();
        match (kind.as_str(), parts.as_slice()) {
            ("total", [_]) => Ok(Self::Total(ComparisonMethod::default())),
            ("total", [_, method]) => Ok(Self::Total(method.parse()?)),
            ("partial", [_, capacity]) => Ok(Self::Partial {
                method: ComparisonMethod::default(),
                capacity: parse_capacity(capacity)?,
            }),
            ("partial", [_, method, capacity]) => Ok(Self::Partial {
                method: method.parse()?,
                capacity: parse_capacity(capacity)?,
            }),
            ("total" | "partial", _) => Err(DedupConfigError::Malformed(value.to_owned())),
            _ => Err(DedupConfigError::UnknownKind(kind)),
        }
    }
}

impl Display for DedupStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Total(method) => write!(f, "total:{method}"),
            Self::Partial { method, capacity } => write!(f, "partial:{method}:{capacity}"),
        }
    }
}

fn parse_capacity(value: &str) -> Result<NonZeroUsize, DedupConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| DedupConfigError::InvalidCapacity(value.to_owned()))
}

/// Creates a deduplicator that never forgets a statement.
pub fn new_total(method: ComparisonMethod) -> DeduplicatorRef {
    debug!(%method, "Creating total deduplicator");
    match method {
        ComparisonMethod::Identity => {
            Arc::new(IdentityDeduplicator::new_total(Arc::new(TermInterner::new())))
        }
        ComparisonMethod::Equals => Arc::new(EqualsDeduplicator::new_total()),
        ComparisonMethod::Hash => Arc::new(HashDeduplicator::new_total()),
    }
}

/// Creates a deduplicator that remembers about `capacity` statements.
pub fn new_partial(method: ComparisonMethod, capacity: NonZeroUsize) -> DeduplicatorRef {
    debug!(%method, capacity = capacity.get(), "Creating partial deduplicator");
    match method {
        ComparisonMethod::Identity => Arc::new(IdentityDeduplicator::new_partial(
            Arc::new(TermInterner::new()),
            capacity,
        )),
        ComparisonMethod::Equals => Arc::new(EqualsDeduplicator::new_partial(capacity)),
        ComparisonMethod::Hash => Arc::new(HashDeduplicator::new_partial(capacity)),
    }
}

/// Chains `deduplicators`. A single deduplicator is returned as is.
pub fn chain(deduplicators: impl IntoIterator<Item = DeduplicatorRef>) -> DeduplicatorRef {
    let mut deduplicators = deduplicators.into_iter().collect::<Vec<_>>();
    if deduplicators.len() == 1 {
        if let Some(deduplicator) = deduplicators.pop() {
            return deduplicator;
        }
    }
    Arc::new(ChainedDeduplicator::new(deduplicators))
}
