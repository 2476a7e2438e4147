use crate::{is_nop, Handler, HandlerRef};
use rdf_flow_common::{HandlerResult, MutexExt};
use rdf_flow_model::QuadRef;
use std::any::Any;
use std::sync::{Arc, Mutex};

/// Returns a handler that forwards `statement`, `comment` and `namespace` calls one at a time.
///
/// Use this in front of handlers that cannot deal with concurrent calls.
pub fn synchronize(handler: HandlerRef) -> HandlerRef {
    if is_nop(&handler) || handler.as_any().is::<Synchronized>() {
        return handler;
    }
    Arc::new(Synchronized {
        handler,
        lock: Mutex::new(()),
    })
}

#[derive(Debug)]
struct Synchronized {
    handler: HandlerRef,
    lock: Mutex<()>,
}

impl Handler for Synchronized {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn start(&self) -> HandlerResult<()> {
        self.handler.start()
    }

    fn statement(&self, quad: QuadRef<'_>) -> HandlerResult<()> {
        let _guard = self.lock.lock_unpoisoned();
        self.handler.statement(quad)
    }

    fn comment(&self, comment: &str) -> HandlerResult<()> {
        let _guard = self.lock.lock_unpoisoned();
        self.handler.comment(comment)
    }

    fn namespace(&self, prefix: &str, iri: &str) -> HandlerResult<()> {
        let _guard = self.lock.lock_unpoisoned();
        self.handler.namespace(prefix, iri)
    }

    fn end(&self) -> HandlerResult<()> {
        self.handler.end()
    }

    fn close(&self) {
        self.handler.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Collector;
    use rdf_flow_model::{GraphNameRef, NamedNodeRef};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    /// Fails if two calls overlap.
    #[derive(Debug, Default)]
    struct ExclusiveHandler {
        busy: AtomicBool,
    }

    impl Handler for ExclusiveHandler {
        fn as_any(&self) -> &dyn Any {
            self
        }

        fn statement(&self, _quad: QuadRef<'_>) -> HandlerResult<()> {
            assert!(!self.busy.swap(true, Ordering::SeqCst), "overlapping calls");
            thread::yield_now();
            self.busy.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_synchronize_is_idempotent() {
        let handler = synchronize(Arc::new(Collector::new()));
        assert!(Arc::ptr_eq(&synchronize(Arc::clone(&handler)), &handler));
    }

    #[test]
    fn test_calls_do_not_overlap() {
        let handler = synchronize(Arc::new(ExclusiveHandler::default()));
        let node = NamedNodeRef::new_unchecked("http://example.com/a");
        let quad = QuadRef::new(node, node, node, GraphNameRef::DefaultGraph);

        thread::scope(|scope| {
            for _ in 0..4 {
                let handler = Arc::clone(&handler);
                scope.spawn(move || {
                    for _ in 0..1000 {
                        handler.statement(quad).unwrap();
                    }
                });
            }
        });
    }
}
