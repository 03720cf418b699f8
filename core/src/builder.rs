//! Bounded-memory construction of partial indexes.

use crate::extract::{extract_document, ExtractedDocument, RawRecord};
use crate::tokenizer::term_frequencies;
use crate::{DocId, DocMeta, PartialIndex, Posting};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuilderConfig {
    /// Flush after this many documents have been buffered.
    pub flush_every_docs: usize,
    /// Also flush once the buffered posting count reaches this bound.
    pub max_buffered_postings: Option<usize>,
    /// Batches built concurrently; bounds how many raw records are held at once.
    pub batches_in_flight: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            flush_every_docs: 10_000,
            max_buffered_postings: None,
            batches_in_flight: rayon::current_num_threads(),
        }
    }
}

impl BuilderConfig {
    fn batch_size(&self) -> usize { self.flush_every_docs.max(1) }
    fn wave_size(&self) -> usize { self.batches_in_flight.max(1) }
}

/// Accumulates postings for the documents seen since the last flush.
///
/// Document IDs are handed out monotonically and keep counting across
/// flushes, so no two partial indexes from one builder share an ID.
pub struct IndexBuilder {
    config: BuilderConfig,
    next_doc_id: DocId,
    postings: HashMap<String, Vec<Posting>>,
    docs: BTreeMap<DocId, DocMeta>,
    buffered_postings: usize,
}

impl IndexBuilder {
    pub fn new(config: BuilderConfig) -> Self { Self::starting_at(config, 0) }

    pub fn starting_at(config: BuilderConfig, first_doc_id: DocId) -> Self {
        Self {
            config,
            next_doc_id: first_doc_id,
            postings: HashMap::new(),
            docs: BTreeMap::new(),
            buffered_postings: 0,
        }
    }

    pub fn next_doc_id(&self) -> DocId { self.next_doc_id }

    pub fn buffered_docs(&self) -> usize { self.docs.len() }

    /// Add one fully extracted document. Returns its ID and, when a flush
    /// threshold was reached, the partial index that was cut.
    pub fn add(&mut self, doc: ExtractedDocument) -> (DocId, Option<PartialIndex>) {
        let doc_id = self.next_doc_id;
        self.next_doc_id += 1;

        for (stem, tf) in term_frequencies(&doc.stems) {
            self.postings.entry(stem).or_default().push(Posting { doc_id, tf });
            self.buffered_postings += 1;
        }
        self.docs.insert(doc_id, DocMeta { url: doc.url, title: doc.title });

        let flushed = if self.should_flush() { self.flush() } else { None };
        (doc_id, flushed)
    }

    fn should_flush(&self) -> bool {
        self.docs.len() >= self.config.batch_size()
            || self.config.max_buffered_postings.is_some_and(|max| self.buffered_postings >= max)
    }

    /// Cut a partial index from everything buffered and reset in-memory state.
    pub fn flush(&mut self) -> Option<PartialIndex> {
        if self.docs.is_empty() {
            return None;
        }
        let postings: BTreeMap<String, Vec<Posting>> = std::mem::take(&mut self.postings)
            .into_iter()
            .map(|(stem, mut plist)| {
                plist.sort_by_key(|p| p.doc_id);
                (stem, plist)
            })
            .collect();
        let docs = std::mem::take(&mut self.docs);
        self.buffered_postings = 0;

        tracing::debug!(docs = docs.len(), terms = postings.len(), next_doc_id = self.next_doc_id, "flushed partial index");
        Some(PartialIndex { postings, docs })
    }

    pub fn finish(mut self) -> Option<PartialIndex> { self.flush() }
}

/// Stream `records` through the builder and hand every partial index to
/// `sink` as soon as its wave of batches is done.
///
/// Records are pulled in waves of `batches_in_flight` batches of
/// `flush_every_docs` each, so at most one wave of raw records and its
/// partials are in memory. Batch `i` owns document IDs starting at
/// `i * flush_every_docs`, so the assignment depends only on record order.
/// Each worker owns its builder outright. Returns the number of records
/// consumed.
pub fn build_partials_into<I, F, E>(records: I, config: BuilderConfig, mut sink: F) -> Result<usize, E>
where
    I: IntoIterator<Item = RawRecord>,
    F: FnMut(PartialIndex) -> Result<(), E>,
{
    let batch = config.batch_size();
    let mut records = records.into_iter();
    let mut next_batch = 0usize;
    let mut consumed = 0usize;
    let mut written = 0usize;

    loop {
        let wave: Vec<RawRecord> = records.by_ref().take(batch * config.wave_size()).collect();
        if wave.is_empty() {
            break;
        }
        consumed += wave.len();

        let first_batch = next_batch;
        let parts: Vec<Vec<PartialIndex>> = wave
            .par_chunks(batch)
            .enumerate()
            .map(|(i, chunk)| build_batch(chunk, config, ((first_batch + i) * batch) as DocId))
            .collect();
        next_batch += wave.len().div_ceil(batch);
        drop(wave);

        for part in parts.into_iter().flatten() {
            written += 1;
            sink(part)?;
        }
    }

    tracing::info!(records = consumed, partials = written, "built partial indexes");
    Ok(consumed)
}

fn build_batch(chunk: &[RawRecord], config: BuilderConfig, first_doc_id: DocId) -> Vec<PartialIndex> {
    let mut builder = IndexBuilder::starting_at(config, first_doc_id);
    let mut out = Vec::new();
    for record in chunk {
        if let (_, Some(part)) = builder.add(extract_document(record)) {
            out.push(part);
        }
    }
    out.extend(builder.finish());
    out
}

/// Build every partial index for an in-memory slice of records.
pub fn build_partials(records: &[RawRecord], config: BuilderConfig) -> Vec<PartialIndex> {
    let mut parts = Vec::new();
    let result: Result<usize, Infallible> = build_partials_into(records.iter().cloned(), config, |part| {
        parts.push(part);
        Ok(())
    });
    match result {
        Ok(_) => parts,
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn doc(url: &str, stems: &[&str]) -> ExtractedDocument {
        ExtractedDocument { url: url.into(), title: None, stems: stems.iter().map(|s| s.to_string()).collect() }
    }

    #[test]
    fn flushes_every_n_docs_and_keeps_counting() {
        let mut b = IndexBuilder::new(BuilderConfig { flush_every_docs: 2, ..BuilderConfig::default() });
        let (id0, p) = b.add(doc("a", &["cat"]));
        assert_eq!(id0, 0);
        assert!(p.is_none());
        let (id1, p) = b.add(doc("b", &["cat", "dog"]));
        assert_eq!(id1, 1);
        let first = p.expect("flush after two docs");
        assert_eq!(first.num_docs(), 2);
        assert_eq!(first.postings["cat"], vec![Posting { doc_id: 0, tf: 1 }, Posting { doc_id: 1, tf: 1 }]);

        let (id2, p) = b.add(doc("c", &["dog", "dog"]));
        assert_eq!(id2, 2);
        assert!(p.is_none());
        let last = b.finish().expect("trailing partial");
        assert_eq!(last.postings["dog"], vec![Posting { doc_id: 2, tf: 2 }]);
        assert!(last.docs.contains_key(&2));
    }

    #[test]
    fn empty_document_takes_an_id_without_postings() {
        let mut b = IndexBuilder::new(BuilderConfig::default());
        let (id, _) = b.add(doc("empty", &[]));
        assert_eq!(id, 0);
        let part = b.finish().expect("one doc buffered");
        assert_eq!(part.num_docs(), 1);
        assert_eq!(part.num_terms(), 0);
    }

    #[test]
    fn posting_bound_triggers_flush() {
        let cfg = BuilderConfig { flush_every_docs: 100, max_buffered_postings: Some(3), ..BuilderConfig::default() };
        let mut b = IndexBuilder::new(cfg);
        assert!(b.add(doc("a", &["x", "y"])).1.is_none());
        assert!(b.add(doc("b", &["z"])).1.is_some());
        assert_eq!(b.buffered_docs(), 0);
    }

    #[test]
    fn finish_on_empty_builder_is_none() {
        assert!(IndexBuilder::new(BuilderConfig::default()).finish().is_none());
    }

    #[test]
    fn parallel_ids_follow_record_order() {
        let records: Vec<RawRecord> = (0..7).map(|i| RawRecord::new(format!("u{i}"), format!("word{i} shared"))).collect();
        let parts = build_partials(&records, BuilderConfig { flush_every_docs: 3, ..BuilderConfig::default() });
        assert_eq!(parts.len(), 3);
        let mut seen: Vec<(DocId, String)> = parts.iter().flat_map(|p| p.docs.iter().map(|(id, m)| (*id, m.url.clone()))).collect();
        seen.sort();
        let expected: Vec<(DocId, String)> = (0..7).map(|i| (i as DocId, format!("u{i}"))).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn partials_reach_the_sink_before_input_runs_out() {
        let pulled = Cell::new(0usize);
        let records = (0..6).map(|i| {
            pulled.set(pulled.get() + 1);
            RawRecord::new(format!("u{i}"), format!("word{i}"))
        });
        let cfg = BuilderConfig { flush_every_docs: 2, max_buffered_postings: None, batches_in_flight: 1 };

        let mut pulled_at_sink = Vec::new();
        let mut first_ids = Vec::new();
        let consumed = build_partials_into(records, cfg, |part| {
            pulled_at_sink.push(pulled.get());
            first_ids.push(*part.docs.keys().next().unwrap());
            Ok::<(), Infallible>(())
        })
        .unwrap();

        assert_eq!(consumed, 6);
        assert_eq!(pulled_at_sink, vec![2, 4, 6]);
        assert_eq!(first_ids, vec![0, 2, 4]);
    }

    #[test]
    fn sink_errors_stop_the_build() {
        let records = (0..10).map(|i| RawRecord::new(format!("u{i}"), "text"));
        let cfg = BuilderConfig { flush_every_docs: 2, max_buffered_postings: None, batches_in_flight: 1 };
        let mut calls = 0;
        let err = build_partials_into(records, cfg, |_| {
            calls += 1;
            Err("disk full")
        })
        .unwrap_err();
        assert_eq!(err, "disk full");
        assert_eq!(calls, 1);
    }
}
