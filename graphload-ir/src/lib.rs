//! Graph statement intermediate representation for the graphload pipeline
//!
//! This crate provides the canonical term and statement types produced by
//! document parsers and consumed by the ingestion pipeline, independent of the
//! serialization format the documents arrive in.
//!
//! # Key Design Principles
//!
//! 1. **Expanded IRIs only** - All IRIs are stored in expanded form. Prefix
//!    handling belongs to parsers.
//!
//! 2. **Explicit datatypes** - Literals always have an explicit datatype,
//!    never optional. Plain strings use `xsd:string`, language-tagged strings
//!    use `rdf:langString`.
//!
//! 3. **Parsers push, they do not collect** - A parser drives a
//!    [`StatementSink`] callback once per statement, so arbitrarily large
//!    documents stream through without an intermediate graph materialization.
//!
//! # Example
//!
//! ```
//! use graphload_ir::{Statement, Term};
//!
//! let stmt = Statement::explicit(
//!     Term::iri("http://example.org/alice"),
//!     Term::iri("http://xmlns.com/foaf/0.1/name"),
//!     Term::string("Alice"),
//!     None,
//! );
//! assert!(stmt.graph.is_none());
//! ```

pub mod datatype;
mod error;
mod nquads;
mod parser;
mod statement;
mod term;

pub use datatype::Datatype;
pub use error::{IrError, Result};
pub use nquads::NQuadsParser;
pub use parser::{DocumentParser, FnSink, StatementSink};
pub use statement::{Provenance, Statement};
pub use term::{BlankId, LiteralValue, Term};
