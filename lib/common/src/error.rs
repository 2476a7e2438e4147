use std::any::Any;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;

pub type HandlerResult<T> = Result<T, HandlerError>;

/// An error raised while a handler processes a stream.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum HandlerError {
    /// Error from the OS I/O layer.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Several errors raised by independent handlers.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    /// A background worker panicked.
    #[error("A background worker panicked: {0}")]
    WorkerPanic(String),
    #[error("{0}")]
    Message(String),
    #[error("{0}")]
    Other(#[source] Box<dyn Error + Send + Sync + 'static>),
}

impl HandlerError {
    /// Builds an error from a printable error message.
    #[inline]
    pub fn msg(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }

    /// Wraps an arbitrary error.
    #[inline]
    pub fn new(error: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        Self::Other(error.into())
    }

    /// Builds an error from the payload of a caught panic.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_owned()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "unknown panic payload".to_owned()
        };
        Self::WorkerPanic(message)
    }
}

impl From<HandlerError> for io::Error {
    #[inline]
    fn from(error: HandlerError) -> Self {
        match error {
            HandlerError::Io(error) => error,
            HandlerError::Message(message) => Self::other(message),
            error => Self::other(error),
        }
    }
}

/// A failure that carries further failures which happened alongside it.
///
/// The primary error is the one that is reported, the suppressed errors are kept so that no
/// failure gets lost when several downstream handlers fail at the same time.
#[derive(Debug)]
pub struct AggregateError {
    primary: Box<HandlerError>,
    suppressed: Vec<HandlerError>,
}

impl AggregateError {
    pub fn primary(&self) -> &HandlerError {
        &self.primary
    }

    pub fn suppressed(&self) -> &[HandlerError] {
        &self.suppressed
    }

    /// Returns the primary and the suppressed errors.
    pub fn into_parts(self) -> (HandlerError, Vec<HandlerError>) {
        (*self.primary, self.suppressed)
    }
}

impl Display for AggregateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.primary)?;
        if !self.suppressed.is_empty() {
            write!(f, " ({} further errors suppressed)", self.suppressed.len())?;
        }
        Ok(())
    }
}

impl Error for AggregateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.primary.as_ref())
    }
}

/// Collects the errors of several independent operations.
///
/// The first error pushed becomes the primary error, the remaining ones are suppressed.
#[derive(Debug, Default)]
pub struct ErrorAggregator {
    errors: Vec<HandlerError>,
}

impl ErrorAggregator {
    pub fn push(&mut self, error: HandlerError) {
        self.errors.push(error);
    }

    /// Records the error of `result`, if any.
    pub fn record(&mut self, result: HandlerResult<()>) {
        if let Err(error) = result {
            self.push(error);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Removes the collected errors and returns them as one error.
    pub fn take(&mut self) -> Option<HandlerError> {
        let mut errors = std::mem::take(&mut self.errors);
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => {
                let primary = errors.remove(0);
                Some(HandlerError::Aggregate(AggregateError {
                    primary: Box::new(primary),
                    suppressed: errors,
                }))
            }
        }
    }

    /// Returns `Ok(())` if no error was collected.
    pub fn into_result(mut self) -> HandlerResult<()> {
        match self.take() {
            None => Ok(()),
            Some(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_aggregator_is_ok() {
        assert!(ErrorAggregator::default().into_result().is_ok());
    }

    #[test]
    fn test_single_error_is_not_wrapped() {
        let mut errors = ErrorAggregator::default();
        errors.record(Ok(()));
        errors.record(Err(HandlerError::msg("first")));

        let error = errors.into_result().unwrap_err();
        assert!(matches!(error, HandlerError::Message(message) if message == "first"));
    }

    #[test]
    fn test_first_error_wins_and_rest_is_suppressed() {
        let mut errors = ErrorAggregator::default();
        errors.push(HandlerError::msg("first"));
        errors.push(HandlerError::msg("second"));
        errors.push(HandlerError::msg("third"));

        let HandlerError::Aggregate(error) = errors.into_result().unwrap_err() else {
            panic!("expected an aggregate error");
        };
        assert_eq!(error.to_string(), "first (2 further errors suppressed)");
        assert_eq!(error.suppressed().len(), 2);
        assert_eq!(error.primary().to_string(), "first");
        assert_eq!(
            error.source().map(ToString::to_string),
            Some("first".to_owned())
        );
    }

    #[test]
    fn test_panic_payload_is_kept() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(
            HandlerError::from_panic(payload.as_ref()).to_string(),
            "A background worker panicked: boom"
        );
    }
}
