use thiserror::Error;

/// An error raised while parsing the textual rendering of a [Fingerprint](crate::Fingerprint).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FingerprintParseError {
    #[error("A fingerprint has exactly 22 characters, got {0}")]
    InvalidLength(usize),
    #[error("Invalid fingerprint character '{character}' at position {position}")]
    InvalidCharacter { character: char, position: usize },
    #[error("The fingerprint half starting at position {0} exceeds 64 bits")]
    Overflow(usize),
}
