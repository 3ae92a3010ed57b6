//! Per-document fan-out write scans
//!
//! Each scan holds the document's stage latch for its own duration (RAII
//! hold) and tags every produced entry with the same latch, so the latch
//! counts scan + outstanding entries and can only reach zero once the scan
//! ended and every entry was acknowledged or abandoned.
//!
//! Batches are sorted by key before submission; sinks rely on sorted input
//! for sequential index writes.

use std::sync::Arc;

use tracing::trace;

use crate::canonical::{CanonicalStatement, CanonicalTerm};
use crate::classify::{Placement, TermClassifier};
use crate::codec::{statement_key, term_sort_key, term_value_bytes, KeyOrder};
use crate::error::Result;
use crate::latch::{Latch, LatchHold};
use crate::sink::{IndexSink, SinkEntry};

async fn flush(sink: &dyn IndexSink, mut batch: Vec<SinkEntry>) -> Result<()> {
    if batch.is_empty() {
        return Ok(());
    }
    batch.sort_by(|a, b| a.key().cmp(b.key()));
    sink.submit(batch).await
}

/// Identifier assignment: classify every distinct term, resolve inline
/// values immediately, and send the rest to the direct or overflow sink.
pub(crate) async fn write_term_assignments(
    terms: &[Arc<CanonicalTerm>],
    classifier: &dyn TermClassifier,
    direct: &dyn IndexSink,
    overflow: &dyn IndexSink,
    latch: &Arc<Latch>,
    chunk_size: usize,
) -> Result<()> {
    let _scan = LatchHold::new(latch);
    let mut direct_batch = Vec::new();
    let mut overflow_batch = Vec::new();

    for term in terms {
        match classifier.classify(term.term()) {
            Placement::Inline(id) => {
                term.assign_id(id);
            }
            Placement::Direct => {
                direct_batch.push(SinkEntry::assigning(
                    term_sort_key(term.term()),
                    Vec::new(),
                    Arc::clone(term),
                    latch,
                ));
                if direct_batch.len() >= chunk_size {
                    flush(direct, std::mem::take(&mut direct_batch)).await?;
                }
            }
            Placement::Overflow => {
                overflow_batch.push(SinkEntry::assigning(
                    term_sort_key(term.term()),
                    term_value_bytes(term.term()),
                    Arc::clone(term),
                    latch,
                ));
                if overflow_batch.len() >= chunk_size {
                    flush(overflow, std::mem::take(&mut overflow_batch)).await?;
                }
            }
        }
    }
    flush(direct, direct_batch).await?;
    flush(overflow, overflow_batch).await?;
    trace!(terms = terms.len(), "term assignment scan complete");
    Ok(())
}

/// Reverse (id-to-term) index: blank nodes carry no lexical identity worth
/// reversing, inline identifiers decode themselves, and overflow values live
/// in the overflow sink already, so only direct terms are written.
pub(crate) async fn write_reverse_index(
    terms: &[Arc<CanonicalTerm>],
    classifier: &dyn TermClassifier,
    sink: &dyn IndexSink,
    latch: &Arc<Latch>,
    chunk_size: usize,
) -> Result<()> {
    let _scan = LatchHold::new(latch);
    let mut batch = Vec::new();
    for term in terms {
        if term.term().is_blank() {
            continue;
        }
        if classifier.classify(term.term()) != Placement::Direct {
            continue;
        }
        let id = term.require_id()?;
        batch.push(SinkEntry::new(
            id.to_be_bytes().to_vec(),
            term_value_bytes(term.term()),
            latch,
        ));
        if batch.len() >= chunk_size {
            flush(sink, std::mem::take(&mut batch)).await?;
        }
    }
    flush(sink, batch).await
}

/// Full-text index over literal text. Key layout: text bytes, NUL, the
/// term's identifier, so equal texts from distinct terms stay distinct.
pub(crate) async fn write_fulltext_index(
    terms: &[Arc<CanonicalTerm>],
    sink: &dyn IndexSink,
    latch: &Arc<Latch>,
    chunk_size: usize,
    include_typed: bool,
) -> Result<()> {
    let _scan = LatchHold::new(latch);
    let mut batch = Vec::new();
    for term in terms {
        let Some((value, datatype, _)) = term.term().as_literal() else {
            continue;
        };
        if !datatype.is_plain_text() && !include_typed {
            continue;
        }
        let id = term.require_id()?;
        let text = value.lexical();
        let mut key = Vec::with_capacity(text.len() + 9);
        key.extend_from_slice(text.as_bytes());
        key.push(0);
        key.extend_from_slice(&id.to_be_bytes());
        batch.push(SinkEntry::new(key, Vec::new(), latch));
        if batch.len() >= chunk_size {
            flush(sink, std::mem::take(&mut batch)).await?;
        }
    }
    flush(sink, batch).await
}

/// One statement index under one key ordering.
pub(crate) async fn write_statement_order(
    chunks: &[Vec<CanonicalStatement>],
    order: KeyOrder,
    sink: &dyn IndexSink,
    latch: &Arc<Latch>,
    chunk_size: usize,
) -> Result<()> {
    let _scan = LatchHold::new(latch);
    let mut batch = Vec::new();
    for statement in chunks.iter().flatten() {
        let key = statement_key(statement, order)?;
        batch.push(SinkEntry::new(
            key,
            vec![statement.provenance.code()],
            latch,
        ));
        if batch.len() >= chunk_size {
            flush(sink, std::mem::take(&mut batch)).await?;
        }
    }
    flush(sink, batch).await?;
    trace!(order = order.name(), "statement scan complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ByteThresholdClassifier;
    use crate::sink::MemorySink;
    use graphload_ir::{Provenance, Term};

    fn canonical(term: Term) -> Arc<CanonicalTerm> {
        Arc::new(CanonicalTerm::new(term))
    }

    #[tokio::test]
    async fn test_term_assignment_partitions() {
        let classifier = ByteThresholdClassifier::new(20);
        let direct = MemorySink::assigning("direct");
        let overflow = MemorySink::assigning("overflow");
        let latch = Arc::new(Latch::new("ids"));

        let terms = vec![
            canonical(Term::iri("http://e.org/a")), // direct
            canonical(Term::integer(7)),            // inline
            canonical(Term::string("a string value well past twenty bytes")), // overflow
        ];
        write_term_assignments(&terms, &classifier, &*direct, &*overflow, &latch, 16)
            .await
            .unwrap();

        assert_eq!(direct.len(), 1);
        assert_eq!(overflow.len(), 1);
        assert_eq!(latch.value(), 0);
        // Every term resolved, the inline one without any sink involvement.
        assert!(terms.iter().all(|t| t.id().is_some()));
        assert!(terms[1].id().unwrap().is_inline());
    }

    #[tokio::test]
    async fn test_reverse_index_filters() {
        let classifier = ByteThresholdClassifier::new(20);
        let direct = MemorySink::assigning("direct");
        let overflow = MemorySink::assigning("overflow");
        let reverse = MemorySink::keyed("reverse");
        let latch = Arc::new(Latch::new("other"));

        let terms = vec![
            canonical(Term::iri("http://e.org/a")),
            canonical(Term::blank("b0")),
            canonical(Term::integer(3)),
            canonical(Term::string("a string value well past twenty bytes")),
        ];
        let ids_latch = Arc::new(Latch::new("ids"));
        write_term_assignments(&terms, &classifier, &*direct, &*overflow, &ids_latch, 16)
            .await
            .unwrap();

        write_reverse_index(&terms, &classifier, &*reverse, &latch, 16)
            .await
            .unwrap();
        // Only the direct, non-blank IRI gets a reverse entry.
        assert_eq!(reverse.len(), 1);
        assert_eq!(latch.value(), 0);
    }

    #[tokio::test]
    async fn test_fulltext_filters_typed_literals() {
        let sink = MemorySink::keyed("text");
        let latch = Arc::new(Latch::new("other"));
        let plain = canonical(Term::string("hello"));
        let lang = canonical(Term::lang_string("bonjour", "fr"));
        let typed = canonical(Term::typed("2024-01-01", graphload_ir::Datatype::xsd_date_time()));
        let iri = canonical(Term::iri("http://e.org/a"));
        for (n, t) in [&plain, &lang, &typed, &iri].iter().enumerate() {
            t.assign_id(crate::canonical::TermId::assigned(n as u64 + 1));
        }

        let terms = vec![plain.clone(), lang.clone(), typed.clone(), iri.clone()];
        write_fulltext_index(&terms, &*sink, &latch, 16, false)
            .await
            .unwrap();
        assert_eq!(sink.len(), 2);

        let sink_all = MemorySink::keyed("text");
        write_fulltext_index(&terms, &*sink_all, &latch, 16, true)
            .await
            .unwrap();
        assert_eq!(sink_all.len(), 3);
    }

    #[tokio::test]
    async fn test_statement_order_writes_every_statement() {
        let ids = |n: u64| {
            let t = canonical(Term::iri(format!("http://e.org/{n}")));
            t.assign_id(crate::canonical::TermId::assigned(n));
            t
        };
        let chunks = vec![
            vec![
                CanonicalStatement {
                    subject: ids(1),
                    predicate: ids(2),
                    object: ids(3),
                    graph: None,
                    provenance: Provenance::Explicit,
                },
                CanonicalStatement {
                    subject: ids(4),
                    predicate: ids(5),
                    object: ids(6),
                    graph: None,
                    provenance: Provenance::Explicit,
                },
            ],
        ];
        let sink = MemorySink::keyed("spo");
        let latch = Arc::new(Latch::new("other"));
        write_statement_order(&chunks, KeyOrder::Spo, &*sink, &latch, 1)
            .await
            .unwrap();
        assert_eq!(sink.len(), 2);
        assert_eq!(latch.value(), 0);
    }

    #[tokio::test]
    async fn test_failed_scan_still_drains_latch() {
        let classifier = ByteThresholdClassifier::default();
        let direct = MemorySink::assigning("direct");
        direct.set_failing(true);
        let overflow = MemorySink::assigning("overflow");
        let latch = Arc::new(Latch::new("ids"));

        let terms = vec![canonical(Term::iri("http://e.org/a"))];
        let res =
            write_term_assignments(&terms, &classifier, &*direct, &*overflow, &latch, 16).await;
        assert!(res.is_err());
        assert_eq!(latch.value(), 0);
    }
}
