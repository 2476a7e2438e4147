mod error;
mod fingerprint;
mod interner;
mod statement;

pub use error::*;
pub use fingerprint::*;
pub use interner::*;
pub use statement::*;

// Re-export some oxrdf types.
pub use oxrdf::vocab;
pub use oxrdf::{
    BlankNode, BlankNodeIdParseError, BlankNodeRef, GraphName, GraphNameRef, Literal,
    LiteralRef, NamedNode, NamedNodeRef, NamedOrBlankNode, NamedOrBlankNodeRef, Quad, QuadRef,
    Subject, SubjectRef, Term, TermRef, Triple, TripleRef,
};
