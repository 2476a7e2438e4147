use crate::DeduplicatorRef;
use rdf_flow_common::HandlerResult;
use rdf_flow_handlers::{is_nop, Handler, HandlerRef};
use rdf_flow_model::QuadRef;
use std::any::Any;
use std::sync::Arc;

/// Returns a handler that forwards only the statements `deduplicator` considers new.
///
/// With `mark_as_seen`, forwarded statements are recorded so that later repetitions are dropped.
/// Without it, the deduplicator is only consulted, which allows filtering one stream against the
/// statements recorded by another.
pub fn wrap_as_filter(
    deduplicator: DeduplicatorRef,
    handler: HandlerRef,
    mark_as_seen: bool,
) -> HandlerRef {
    if is_nop(&handler) {
        return handler;
    }
    Arc::new(Deduplicate {
        deduplicator,
        handler,
        mark_as_seen,
    })
}

/// The handler returned by [wrap_as_filter].
#[derive(Debug)]
pub struct Deduplicate {
    deduplicator: DeduplicatorRef,
    handler: HandlerRef,
    mark_as_seen: bool,
}

impl Deduplicate {
    pub fn deduplicator(&self) -> &DeduplicatorRef {
        &self.deduplicator
    }
}

impl Handler for Deduplicate {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn start(&self) -> HandlerResult<()> {
        self.handler.start()
    }

    fn statement(&self, quad: QuadRef<'_>) -> HandlerResult<()> {
        if self.deduplicator.process(quad, self.mark_as_seen) {
            self.handler.statement(quad)?;
        }
        Ok(())
    }

    fn comment(&self, comment: &str) -> HandlerResult<()> {
        self.handler.comment(comment)
    }

    fn namespace(&self, prefix: &str, iri: &str) -> HandlerResult<()> {
        self.handler.namespace(prefix, iri)
    }

    fn end(&self) -> HandlerResult<()> {
        self.handler.end()
    }

    fn close(&self) {
        self.handler.close();
    }
}
