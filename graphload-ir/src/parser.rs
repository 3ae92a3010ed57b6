//! Parser-facing interfaces
//!
//! A [`DocumentParser`] reads one document and drives a [`StatementSink`]
//! once per parsed statement. The sink owns all buffering; parsers never
//! materialize the document.

use crate::{Result, Statement};
use std::io::BufRead;

/// Callback driven by a parser, once per statement, in document order.
///
/// Returning an error aborts the parse; the parser propagates it unchanged.
pub trait StatementSink {
    fn handle_statement(&mut self, statement: Statement) -> Result<()>;
}

/// Closure adapter so tests and small tools can sink into a function.
pub struct FnSink<F>(pub F);

impl<F> StatementSink for FnSink<F>
where
    F: FnMut(Statement) -> Result<()>,
{
    fn handle_statement(&mut self, statement: Statement) -> Result<()> {
        (self.0)(statement)
    }
}

/// A streaming document parser for one serialization format.
///
/// `default_graph`, when given, is the expanded IRI assigned as the graph of
/// every statement the document does not explicitly place in a named graph.
pub trait DocumentParser: Send + Sync {
    fn parse(
        &self,
        reader: &mut dyn BufRead,
        default_graph: Option<&str>,
        sink: &mut dyn StatementSink,
    ) -> Result<()>;
}
