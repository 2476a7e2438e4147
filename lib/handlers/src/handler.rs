use rdf_flow_common::{HandlerError, HandlerResult};
use rdf_flow_model::QuadRef;
use std::any::Any;
use std::fmt::Debug;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, LazyLock};
use tracing::warn;

/// A consumer of a stream of RDF data.
///
/// # Lifecycle
///
/// A stream consists of one or more *passes*. Each pass is a call to [Handler::start], followed
/// by any number of calls to [Handler::statement], [Handler::comment] and [Handler::namespace],
/// followed by a call to [Handler::end]. Once the stream is finished, [Handler::close] releases
/// the resources of the handler. Calling `close` is valid at any time, also in the middle of a
/// pass.
///
/// # Concurrency
///
/// `statement`, `comment` and `namespace` may be called concurrently from multiple threads within
/// a pass. `start` and `end` are never called concurrently with anything else. Implementations
/// must therefore use interior mutability that is safe under concurrent access.
///
/// # Failures
///
/// Processing failures are reported with a [HandlerError]. Once a method fails, the pass is
/// aborted and the caller should [close](Handler::close) the handler.
pub trait Handler: Debug + Send + Sync {
    /// Returns the handler as [Any] so that combinators can recognize specific handlers.
    fn as_any(&self) -> &dyn Any;

    /// Starts a new pass.
    fn start(&self) -> HandlerResult<()> {
        Ok(())
    }

    /// Receives a statement.
    fn statement(&self, _quad: QuadRef<'_>) -> HandlerResult<()> {
        Ok(())
    }

    /// Receives a comment.
    fn comment(&self, _comment: &str) -> HandlerResult<()> {
        Ok(())
    }

    /// Receives a namespace declaration.
    fn namespace(&self, _prefix: &str, _iri: &str) -> HandlerResult<()> {
        Ok(())
    }

    /// Finishes the current pass. Buffered data must be flushed before this method returns.
    fn end(&self) -> HandlerResult<()> {
        Ok(())
    }

    /// Releases the resources of the handler. Must not fail.
    fn close(&self) {}
}

pub type HandlerRef = Arc<dyn Handler>;

/// A handler that discards everything.
#[derive(Debug, Default)]
pub struct NopHandler;

impl Handler for NopHandler {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

static NOP: LazyLock<HandlerRef> = LazyLock::new(|| Arc::new(NopHandler));

/// Returns the handler that discards everything.
pub fn nop() -> HandlerRef {
    Arc::clone(&NOP)
}

/// Returns true if `handler` discards everything.
pub fn is_nop(handler: &HandlerRef) -> bool {
    handler.as_any().is::<NopHandler>()
}

/// Closes `handler`, logging instead of propagating a panic raised by its `close` method.
pub fn close_quietly(handler: &dyn Handler) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler.close())) {
        let error = HandlerError::from_panic(payload.as_ref());
        warn!(%error, ?handler, "Ignoring failure while closing handler");
    }
}
