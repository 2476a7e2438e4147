use crate::Handler;
use rdf_flow_common::{HandlerResult, MutexExt};
use rdf_flow_model::{GraphName, Quad, QuadRef};
use std::any::Any;
use std::collections::BTreeMap;
use std::mem;
use std::sync::Mutex;

/// A handler that keeps everything it receives in memory.
///
/// Statements, comments and namespace declarations accumulate over passes until they are
/// taken out.
#[derive(Debug, Default)]
pub struct Collector {
    drop_context: bool,
    quads: Mutex<Vec<Quad>>,
    comments: Mutex<Vec<String>>,
    namespaces: Mutex<BTreeMap<String, String>>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a collector that moves every statement into the default graph.
    pub fn dropping_context() -> Self {
        Self {
            drop_context: true,
            ..Self::default()
        }
    }

    /// Returns a copy of the collected statements, in the order they were received.
    pub fn quads(&self) -> Vec<Quad> {
        self.quads.lock_unpoisoned().clone()
    }

    /// Removes and returns the collected statements.
    pub fn take_quads(&self) -> Vec<Quad> {
        mem::take(&mut *self.quads.lock_unpoisoned())
    }

    /// Returns the number of collected statements.
    pub fn len(&self) -> usize {
        self.quads.lock_unpoisoned().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn comments(&self) -> Vec<String> {
        self.comments.lock_unpoisoned().clone()
    }

    /// Returns the namespace declarations, mapping prefixes to IRIs.
    pub fn namespaces(&self) -> BTreeMap<String, String> {
        self.namespaces.lock_unpoisoned().clone()
    }
}

impl Handler for Collector {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn statement(&self, quad: QuadRef<'_>) -> HandlerResult<()> {
        let mut quad = quad.into_owned();
        if self.drop_context {
            quad.graph_name = GraphName::DefaultGraph;
        }
        self.quads.lock_unpoisoned().push(quad);
        Ok(())
    }

    fn comment(&self, comment: &str) -> HandlerResult<()> {
        self.comments.lock_unpoisoned().push(comment.to_owned());
        Ok(())
    }

    fn namespace(&self, prefix: &str, iri: &str) -> HandlerResult<()> {
        self.namespaces
            .lock_unpoisoned()
            .insert(prefix.to_owned(), iri.to_owned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdf_flow_model::NamedNodeRef;

    #[test]
    fn test_collects_over_passes() {
        let s = NamedNodeRef::new_unchecked("http://example.com/s");
        let g = NamedNodeRef::new_unchecked("http://example.com/g");
        let collector = Collector::new();

        for _ in 0..2 {
            collector.start().unwrap();
            collector.statement(QuadRef::new(s, s, s, g)).unwrap();
            collector.comment("hello").unwrap();
            collector.namespace("ex", "http://example.com/").unwrap();
            collector.end().unwrap();
        }

        assert_eq!(collector.len(), 2);
        assert_eq!(collector.comments(), vec!["hello", "hello"]);
        insta::assert_debug_snapshot!(collector.namespaces(), @r#"
        {
            "ex": "http://example.com/",
        }
        "#);
        assert_eq!(collector.take_quads().len(), 2);
        assert!(collector.is_empty());
    }

    #[test]
    fn test_dropping_context() {
        let s = NamedNodeRef::new_unchecked("http://example.com/s");
        let g = NamedNodeRef::new_unchecked("http://example.com/g");
        let collector = Collector::dropping_context();

        collector.statement(QuadRef::new(s, s, s, g)).unwrap();

        assert_eq!(collector.quads()[0].graph_name, GraphName::DefaultGraph);
    }
}
