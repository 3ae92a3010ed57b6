//! Key and value encodings for the index sinks
//!
//! Term keys are content keys: byte-wise equality means term equality, so
//! sinks can eliminate duplicates across documents on the key alone.
//! Statement keys concatenate big-endian identifiers in the order's position
//! sequence, giving each statement index its clustering.

use graphload_ir::Term;

use crate::canonical::{CanonicalStatement, TermId};
use crate::error::Result;

const TAG_IRI: u8 = 0x01;
const TAG_BLANK: u8 = 0x02;
const TAG_LITERAL: u8 = 0x03;

/// Identifier encoding for the default graph in context positions.
pub const DEFAULT_GRAPH_ID: TermId = TermId::reserved(0);

/// Sort/content key for a term in the identifier sinks.
pub fn term_sort_key(term: &Term) -> Vec<u8> {
    let mut key = Vec::with_capacity(term.lexical_len() + 8);
    match term {
        Term::Iri(iri) => {
            key.push(TAG_IRI);
            key.extend_from_slice(iri.as_bytes());
        }
        Term::BlankNode(id) => {
            key.push(TAG_BLANK);
            key.extend_from_slice(id.as_str().as_bytes());
        }
        Term::Literal {
            value,
            datatype,
            language,
        } => {
            key.push(TAG_LITERAL);
            key.extend_from_slice(datatype.as_iri().as_bytes());
            key.push(0);
            if let Some(lang) = language {
                key.extend_from_slice(lang.as_bytes());
            }
            key.push(0);
            key.extend_from_slice(value.lexical().as_bytes());
        }
    }
    key
}

/// Value bytes for the reverse (id-to-term) index: the term's lexical
/// serialization.
pub fn term_value_bytes(term: &Term) -> Vec<u8> {
    term.to_string().into_bytes()
}

/// Statement index key orderings. Triple stores use the first three; quad
/// stores add the context orderings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyOrder {
    Spo,
    Pos,
    Osp,
    Spoc,
    Posc,
    Ospc,
    Cspo,
}

#[derive(Clone, Copy)]
enum Position {
    S,
    P,
    O,
    C,
}

impl KeyOrder {
    pub const TRIPLE_ORDERS: [KeyOrder; 3] = [KeyOrder::Spo, KeyOrder::Pos, KeyOrder::Osp];
    pub const QUAD_ORDERS: [KeyOrder; 4] = [
        KeyOrder::Spoc,
        KeyOrder::Posc,
        KeyOrder::Ospc,
        KeyOrder::Cspo,
    ];

    pub fn name(self) -> &'static str {
        match self {
            KeyOrder::Spo => "spo",
            KeyOrder::Pos => "pos",
            KeyOrder::Osp => "osp",
            KeyOrder::Spoc => "spoc",
            KeyOrder::Posc => "posc",
            KeyOrder::Ospc => "ospc",
            KeyOrder::Cspo => "cspo",
        }
    }

    fn positions(self) -> &'static [Position] {
        use Position::*;
        match self {
            KeyOrder::Spo => &[S, P, O],
            KeyOrder::Pos => &[P, O, S],
            KeyOrder::Osp => &[O, S, P],
            KeyOrder::Spoc => &[S, P, O, C],
            KeyOrder::Posc => &[P, O, S, C],
            KeyOrder::Ospc => &[O, S, P, C],
            KeyOrder::Cspo => &[C, S, P, O],
        }
    }
}

/// Key for one statement under one ordering. Errors if any referenced term
/// never received an identifier.
pub fn statement_key(statement: &CanonicalStatement, order: KeyOrder) -> Result<Vec<u8>> {
    let positions = order.positions();
    let mut key = Vec::with_capacity(positions.len() * 8);
    for position in positions {
        let id = match position {
            Position::S => statement.subject.require_id()?,
            Position::P => statement.predicate.require_id()?,
            Position::O => statement.object.require_id()?,
            Position::C => match &statement.graph {
                Some(graph) => graph.require_id()?,
                None => DEFAULT_GRAPH_ID,
            },
        };
        key.extend_from_slice(&id.to_be_bytes());
    }
    Ok(key)
}
