use crate::{is_nop, Handler, HandlerRef};
use rdf_flow_common::HandlerResult;
use rdf_flow_model::QuadRef;
use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::ops::BitOr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A set of [Handler] methods.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HandlerMethods(u8);

impl HandlerMethods {
    pub const NONE: Self = Self(0);
    pub const START: Self = Self(1);
    pub const COMMENT: Self = Self(1 << 1);
    pub const NAMESPACE: Self = Self(1 << 2);
    pub const STATEMENT: Self = Self(1 << 3);
    pub const END: Self = Self(1 << 4);
    pub const CLOSE: Self = Self(1 << 5);

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for HandlerMethods {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl Debug for HandlerMethods {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let names = [
            (Self::START, "START"),
            (Self::COMMENT, "COMMENT"),
            (Self::NAMESPACE, "NAMESPACE"),
            (Self::STATEMENT, "STATEMENT"),
            (Self::END, "END"),
            (Self::CLOSE, "CLOSE"),
        ];
        f.debug_set()
            .entries(
                names
                    .iter()
                    .filter(|(method, _)| self.contains(*method))
                    .map(|(_, name)| name),
            )
            .finish()
    }
}

/// Returns a handler that drops the calls to the `ignored` methods and forwards the rest.
pub fn ignore_methods(handler: HandlerRef, ignored: HandlerMethods) -> HandlerRef {
    if ignored.is_empty() || is_nop(&handler) {
        return handler;
    }
    Arc::new(IgnoreMethods { handler, ignored })
}

/// Returns a handler that drops `start` and `end` and forwards the rest.
///
/// Useful for running several passes against a handler that should observe a single one.
pub fn ignore_start_end(handler: HandlerRef) -> HandlerRef {
    ignore_methods(handler, HandlerMethods::START | HandlerMethods::END)
}

#[derive(Debug)]
struct IgnoreMethods {
    handler: HandlerRef,
    ignored: HandlerMethods,
}

impl IgnoreMethods {
    fn forwards(&self, method: HandlerMethods) -> bool {
        !self.ignored.contains(method)
    }
}

impl Handler for IgnoreMethods {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn start(&self) -> HandlerResult<()> {
        if self.forwards(HandlerMethods::START) {
            self.handler.start()?;
        }
        Ok(())
    }

    fn statement(&self, quad: QuadRef<'_>) -> HandlerResult<()> {
        if self.forwards(HandlerMethods::STATEMENT) {
            self.handler.statement(quad)?;
        }
        Ok(())
    }

    fn comment(&self, comment: &str) -> HandlerResult<()> {
        if self.forwards(HandlerMethods::COMMENT) {
            self.handler.comment(comment)?;
        }
        Ok(())
    }

    fn namespace(&self, prefix: &str, iri: &str) -> HandlerResult<()> {
        if self.forwards(HandlerMethods::NAMESPACE) {
            self.handler.namespace(prefix, iri)?;
        }
        Ok(())
    }

    fn end(&self) -> HandlerResult<()> {
        if self.forwards(HandlerMethods::END) {
            self.handler.end()?;
        }
        Ok(())
    }

    fn close(&self) {
        if self.forwards(HandlerMethods::CLOSE) {
            self.handler.close();
        }
    }
}

/// Returns a handler that forwards the first `max_passes` passes and drops the following ones.
///
/// `close` is always forwarded.
pub fn ignore_passes(handler: HandlerRef, max_passes: usize) -> HandlerRef {
    if is_nop(&handler) {
        return handler;
    }
    Arc::new(IgnorePasses {
        handler,
        max_passes,
        completed: AtomicUsize::new(0),
    })
}

/// Returns a handler that forwards the first pass only.
pub fn ignore_extra_passes(handler: HandlerRef) -> HandlerRef {
    ignore_passes(handler, 1)
}

#[derive(Debug)]
struct IgnorePasses {
    handler: HandlerRef,
    max_passes: usize,
    /// Number of passes that have ended.
    completed: AtomicUsize,
}

impl IgnorePasses {
    fn is_active(&self) -> bool {
        self.completed.load(Ordering::Acquire) < self.max_passes
    }
}

impl Handler for IgnorePasses {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn start(&self) -> HandlerResult<()> {
        if self.is_active() {
            self.handler.start()?;
        }
        Ok(())
    }

    fn statement(&self, quad: QuadRef<'_>) -> HandlerResult<()> {
        if self.is_active() {
            self.handler.statement(quad)?;
        }
        Ok(())
    }

    fn comment(&self, comment: &str) -> HandlerResult<()> {
        if self.is_active() {
            self.handler.comment(comment)?;
        }
        Ok(())
    }

    fn namespace(&self, prefix: &str, iri: &str) -> HandlerResult<()> {
        if self.is_active() {
            self.handler.namespace(prefix, iri)?;
        }
        Ok(())
    }

    fn end(&self) -> HandlerResult<()> {
        let result = if self.is_active() {
            self.handler.end()
        } else {
            Ok(())
        };
        self.completed.fetch_add(1, Ordering::AcqRel);
        result
    }

    fn close(&self) {
        self.handler.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{nop, Collector};
    use rdf_flow_model::{GraphNameRef, NamedNodeRef};

    #[derive(Debug, Default)]
    struct CountingHandler {
        starts: AtomicUsize,
        ends: AtomicUsize,
        closes: AtomicUsize,
    }

    impl Handler for CountingHandler {
        fn as_any(&self) -> &dyn Any {
            self
        }

        fn start(&self) -> HandlerResult<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn end(&self) -> HandlerResult<()> {
            self.ends.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn example_quad() -> QuadRef<'static> {
        let node = NamedNodeRef::new_unchecked("http://example.com/a");
        QuadRef::new(node, node, node, GraphNameRef::DefaultGraph)
    }

    #[test]
    fn test_methods_debug() {
        insta::assert_debug_snapshot!(HandlerMethods::START | HandlerMethods::END, @r#"
        {
            "START",
            "END",
        }
        "#);
    }

    #[test]
    fn test_ignore_start_end() {
        let counting = Arc::new(CountingHandler::default());
        let handler = ignore_start_end(Arc::clone(&counting) as HandlerRef);

        handler.start().unwrap();
        handler.end().unwrap();
        handler.close();

        assert_eq!(counting.starts.load(Ordering::SeqCst), 0);
        assert_eq!(counting.ends.load(Ordering::SeqCst), 0);
        assert_eq!(counting.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ignore_nothing_returns_handler() {
        let collector: HandlerRef = Arc::new(Collector::new());
        let handler = ignore_methods(Arc::clone(&collector), HandlerMethods::NONE);
        assert!(Arc::ptr_eq(&handler, &collector));
        assert!(is_nop(&ignore_start_end(nop())));
    }

    #[test]
    fn test_ignore_statements() {
        let collector = Arc::new(Collector::new());
        let handler = ignore_methods(
            Arc::clone(&collector) as HandlerRef,
            HandlerMethods::STATEMENT,
        );

        handler.statement(example_quad()).unwrap();
        handler.comment("kept").unwrap();

        assert!(collector.is_empty());
        assert_eq!(collector.comments(), vec!["kept"]);
    }

    #[test]
    fn test_ignore_extra_passes() {
        let collector = Arc::new(Collector::new());
        let handler = ignore_extra_passes(Arc::clone(&collector) as HandlerRef);

        for _ in 0..3 {
            handler.start().unwrap();
            handler.statement(example_quad()).unwrap();
            handler.end().unwrap();
        }

        assert_eq!(collector.len(), 1);
    }

    #[test]
    fn test_ignore_passes_always_closes() {
        let counting = Arc::new(CountingHandler::default());
        let handler = ignore_passes(Arc::clone(&counting) as HandlerRef, 2);

        for _ in 0..4 {
            handler.start().unwrap();
            handler.end().unwrap();
        }
        handler.close();

        assert_eq!(counting.starts.load(Ordering::SeqCst), 2);
        assert_eq!(counting.ends.load(Ordering::SeqCst), 2);
        assert_eq!(counting.closes.load(Ordering::SeqCst), 1);
    }
}
