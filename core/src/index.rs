use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type DocId = u32;

/// Metadata recorded for a document while it is being indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMeta {
    pub url: String,
    pub title: Option<String>,
}

/// Per-document entry of the final index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocRecord {
    pub url: String,
    pub title: Option<String>,
    /// Total number of stems in the document (sum of its term frequencies).
    pub length: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub tf: u32, // always >= 1
}

/// Postings for a bounded batch of documents, produced by one builder flush.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialIndex {
    pub postings: BTreeMap<String, Vec<Posting>>, // postings sorted by doc_id
    pub docs: BTreeMap<DocId, DocMeta>,
}

impl PartialIndex {
    pub fn num_docs(&self) -> usize { self.docs.len() }
    pub fn num_terms(&self) -> usize { self.postings.len() }
}

/// Merged inverted index. Immutable once built; the query engine only reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalIndex {
    pub postings: BTreeMap<String, Vec<Posting>>, // postings sorted by doc_id, no duplicates
    pub docs: BTreeMap<DocId, DocRecord>,
    pub num_docs: u32,
}

impl FinalIndex {
    pub fn postings(&self, stem: &str) -> Option<&[Posting]> {
        self.postings.get(stem).map(Vec::as_slice)
    }

    /// Number of documents containing `stem`.
    pub fn document_frequency(&self, stem: &str) -> usize {
        self.postings.get(stem).map_or(0, Vec::len)
    }

    pub fn doc(&self, doc_id: DocId) -> Option<&DocRecord> { self.docs.get(&doc_id) }

    pub fn num_terms(&self) -> usize { self.postings.len() }

    /// Canonical encoding. Equal indexes always produce identical bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }
}
