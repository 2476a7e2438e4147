use crate::{is_nop, Handler, HandlerRef};
use rdf_flow_common::HandlerResult;
use rdf_flow_model::{
    BlankNode, BlankNodeIdParseError, BlankNodeRef, GraphName, GraphNameRef, Quad, QuadRef,
    Subject, SubjectRef, Term, TermRef,
};
use std::any::Any;
use std::sync::Arc;

/// Returns a handler that appends `suffix` to the identifier of every blank node in subject,
/// object and graph name position before forwarding the statement.
///
/// Rewriting keeps blank nodes from independent sources apart when their streams are merged.
///
/// # Errors
///
/// Returns an error if `suffix` contains characters that are not allowed in a blank node
/// identifier.
pub fn rewrite_blank_nodes(
    handler: HandlerRef,
    suffix: impl Into<String>,
) -> Result<HandlerRef, BlankNodeIdParseError> {
    let suffix = suffix.into();
    BlankNode::new(format!("b{suffix}"))?;
    if suffix.is_empty() || is_nop(&handler) {
        return Ok(handler);
    }
    Ok(Arc::new(RewriteBlankNodes { handler, suffix }))
}

#[derive(Debug)]
struct RewriteBlankNodes {
    handler: HandlerRef,
    suffix: String,
}

impl RewriteBlankNodes {
    fn rewrite(&self, node: BlankNodeRef<'_>) -> BlankNode {
        BlankNode::new_unchecked(format!("{}{}", node.as_str(), self.suffix))
    }

    fn rewrite_quad(&self, quad: QuadRef<'_>) -> Quad {
        Quad {
            subject: match quad.subject {
                SubjectRef::BlankNode(node) => Subject::BlankNode(self.rewrite(node)),
                subject => subject.into_owned(),
            },
            predicate: quad.predicate.into_owned(),
            object: match quad.object {
                TermRef::BlankNode(node) => Term::BlankNode(self.rewrite(node)),
                object => object.into_owned(),
            },
            graph_name: match quad.graph_name {
                GraphNameRef::BlankNode(node) => GraphName::BlankNode(self.rewrite(node)),
                graph_name => graph_name.into_owned(),
            },
        }
    }
}

fn has_blank_node(quad: QuadRef<'_>) -> bool {
    matches!(quad.subject, SubjectRef::BlankNode(_))
        || matches!(quad.object, TermRef::BlankNode(_))
        || matches!(quad.graph_name, GraphNameRef::BlankNode(_))
}

impl Handler for RewriteBlankNodes {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn start(&self) -> HandlerResult<()> {
        self.handler.start()
    }

    fn statement(&self, quad: QuadRef<'_>) -> HandlerResult<()> {
        if has_blank_node(quad) {
            self.handler.statement(self.rewrite_quad(quad).as_ref())
        } else {
            self.handler.statement(quad)
        }
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
