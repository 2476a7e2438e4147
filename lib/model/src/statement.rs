use crate::vocab::xsd;
use crate::{Fingerprint, GraphNameRef, LiteralRef, QuadRef, TermRef};
use std::sync::LazyLock;

const IRI_TAG: &str = "\u{1}";
const BLANK_NODE_TAG: &str = "\u{2}";
const LANGUAGE_LITERAL_TAG: &str = "\u{3}";
const TYPED_LITERAL_TAG: &str = "\u{4}";
const PLAIN_LITERAL_TAG: &str = "\u{5}";
const LABEL_SEPARATOR: &str = "\u{6}";

/// The fingerprint used for the context position of a quad in the default graph.
pub static NIL_FINGERPRINT: LazyLock<Fingerprint> =
    LazyLock::new(|| Fingerprint::murmur3(&[IRI_TAG]));

/// Computes the fingerprint of a single RDF term.
///
/// Every term kind is tagged with its own prefix, so an IRI and a literal with the same text do
/// not share a fingerprint.
pub fn fingerprint_term<'term>(term: impl Into<TermRef<'term>>) -> Fingerprint {
    match term.into() {
        TermRef::NamedNode(node) => Fingerprint::murmur3(&[IRI_TAG, node.as_str()]),
        TermRef::BlankNode(node) => Fingerprint::murmur3(&[BLANK_NODE_TAG, node.as_str()]),
        TermRef::Literal(literal) => fingerprint_literal(literal),
    }
}

fn fingerprint_literal(literal: LiteralRef<'_>) -> Fingerprint {
    if let Some(language) = literal.language() {
        Fingerprint::murmur3(&[
            LANGUAGE_LITERAL_TAG,
            language,
            LABEL_SEPARATOR,
            literal.value(),
        ])
    } else if literal.datatype() == xsd::STRING {
        Fingerprint::murmur3(&[PLAIN_LITERAL_TAG, literal.value()])
    } else {
        Fingerprint::murmur3(&[
            TYPED_LITERAL_TAG,
            literal.datatype().as_str(),
            LABEL_SEPARATOR,
            literal.value(),
        ])
    }
}

/// Computes the fingerprint of a graph name. The default graph maps to [NIL_FINGERPRINT].
pub fn fingerprint_graph_name(graph_name: GraphNameRef<'_>) -> Fingerprint {
    match graph_name {
        GraphNameRef::NamedNode(node) => fingerprint_term(node),
        GraphNameRef::BlankNode(node) => fingerprint_term(node),
        GraphNameRef::DefaultGraph => *NIL_FINGERPRINT,
    }
}

/// Computes the fingerprint of a quad by combining the fingerprints of subject, predicate, object
/// and graph name, in this order.
pub fn fingerprint_quad(quad: QuadRef<'_>) -> Fingerprint {
    Fingerprint::combine(&[
        fingerprint_term(quad.subject),
        fingerprint_term(quad.predicate),
        fingerprint_term(quad.object),
        fingerprint_graph_name(quad.graph_name),
    ])
}
