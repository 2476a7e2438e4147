use crate::{close_quietly, is_nop, nop, Handler, HandlerRef};
use rdf_flow_common::{ErrorAggregator, HandlerResult};
use rdf_flow_model::QuadRef;
use std::any::Any;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Returns a handler that forwards every call to all `handlers`.
///
/// No-op handlers are skipped. If no handler remains, [nop] is returned, and a single remaining
/// handler is returned as is.
///
/// Statements, comments and namespaces are forwarded in order and the first failure aborts the
/// call. `start`, `end` and `close` reach every handler; the failures of `end` are collected and
/// reported together.
pub fn dispatch_all(handlers: impl IntoIterator<Item = HandlerRef>) -> HandlerRef {
    let mut handlers = handlers
        .into_iter()
        .filter(|handler| !is_nop(handler))
        .collect::<Vec<_>>();
    match handlers.len() {
        0 => nop(),
        1 => handlers.pop().unwrap_or_else(nop),
        2 => {
            let second = handlers.pop().unwrap_or_else(nop);
            let first = handlers.pop().unwrap_or_else(nop);
            Arc::new(DispatchTwo { first, second })
        }
        _ => Arc::new(DispatchAll {
            handlers: handlers.into_boxed_slice(),
        }),
    }
}

#[derive(Debug)]
struct DispatchTwo {
    first: HandlerRef,
    second: HandlerRef,
}

impl Handler for DispatchTwo {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn start(&self) -> HandlerResult<()> {
        self.first.start()?;
        self.second.start()
    }

    fn statement(&self, quad: QuadRef<'_>) -> HandlerResult<()> {
        self.first.statement(quad)?;
        self.second.statement(quad)
    }

    fn comment(&self, comment: &str) -> HandlerResult<()> {
        self.first.comment(comment)?;
        self.second.comment(comment)
    }

    fn namespace(&self, prefix: &str, iri: &str) -> HandlerResult<()> {
        self.first.namespace(prefix, iri)?;
        self.second.namespace(prefix, iri)
    }

    fn end(&self) -> HandlerResult<()> {
        let mut errors = ErrorAggregator::default();
        errors.record(self.first.end());
        errors.record(self.second.end());
        errors.into_result()
    }

    fn close(&self) {
        close_quietly(self.first.as_ref());
        close_quietly(self.second.as_ref());
    }
}

#[derive(Debug)]
struct DispatchAll {
    handlers: Box<[HandlerRef]>,
}

impl Handler for DispatchAll {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn start(&self) -> HandlerResult<()> {
        self.handlers.iter().try_for_each(|handler| handler.start())
    }

    fn statement(&self, quad: QuadRef<'_>) -> HandlerResult<()> {
        self.handlers
            .iter()
            .try_for_each(|handler| handler.statement(quad))
    }

    fn comment(&self, comment: &str) -> HandlerResult<()> {
        self.handlers
            .iter()
            .try_for_each(|handler| handler.comment(comment))
    }

    fn namespace(&self, prefix: &str, iri: &str) -> HandlerResult<()> {
        self.handlers
            .iter()
            .try_for_each(|handler| handler.namespace(prefix, iri))
    }

    fn end(&self) -> HandlerResult<()> {
        let mut errors = ErrorAggregator::default();
        for handler in &self.handlers {
            errors.record(handler.end());
        }
        errors.into_result()
    }

    fn close(&self) {
        for handler in &self.handlers {
            close_quietly(handler.as_ref());
        }
    }
}

/// Returns a handler that distributes statements and comments over `handlers`, one at a time.
pub fn dispatch_round_robin(handlers: impl IntoIterator<Item = HandlerRef>) -> HandlerRef {
    dispatch_round_robin_chunked(NonZeroUsize::MIN, handlers)
}

/// Returns a handler that distributes statements and comments over `handlers` in chunks of
/// `chunk_size` consecutive calls.
///
/// The `i`-th call (counted across threads) goes to handler `(i / chunk_size) % n`, so each
/// handler receives an equal share up to one chunk. `start`, `namespace`, `end` and `close`
/// reach every handler.
pub fn dispatch_round_robin_chunked(
    chunk_size: NonZeroUsize,
    handlers: impl IntoIterator<Item = HandlerRef>,
) -> HandlerRef {
    let mut handlers = handlers.into_iter().collect::<Vec<_>>();
    match handlers.len() {
        0 => nop(),
        1 => handlers.pop().unwrap_or_else(nop),
        _ => Arc::new(RoundRobin {
            handlers: handlers.into_boxed_slice(),
            chunk_size,
            counter: AtomicUsize::new(0),
        }),
    }
}

#[derive(Debug)]
struct RoundRobin {
    handlers: Box<[HandlerRef]>,
    chunk_size: NonZeroUsize,
    counter: AtomicUsize,
}

impl RoundRobin {
    fn next_handler(&self) -> &HandlerRef {
        let call = self.counter.fetch_add(1, Ordering::Relaxed);
        let index = (call / self.chunk_size.get()) % self.handlers.len();
        &self.handlers[index]
    }
}

impl Handler for RoundRobin {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn start(&self) -> HandlerResult<()> {
        self.handlers.iter().try_for_each(|handler| handler.start())
    }

    fn statement(&self, quad: QuadRef<'_>) -> HandlerResult<()> {
        self.next_handler().statement(quad)
    }

    fn comment(&self, comment: &str) -> HandlerResult<()> {
        self.next_handler().comment(comment)
    }

    fn namespace(&self, prefix: &str, iri: &str) -> HandlerResult<()> {
        self.handlers
            .iter()
            .try_for_each(|handler| handler.namespace(prefix, iri))
    }

    fn end(&self) -> HandlerResult<()> {
        let mut errors = ErrorAggregator::default();
        for handler in &self.handlers {
            errors.record(handler.end());
        }
        errors.into_result()
    }

    fn close(&self) {
        for handler in &self.handlers {
            close_quietly(handler.as_ref());
        }
    }
}
