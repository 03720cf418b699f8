use crate::error::Result;
use crate::persist::{load_final, IndexPaths};
use crate::tokenizer::tokenize;
use crate::{DocId, FinalIndex, Posting};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

/// Number of results the front end asks for when the caller gives none.
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub url: String,
    pub title: Option<String>,
    pub score: f64,
}

/// One page of results plus the size of the full match set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchPage {
    pub hits: Vec<SearchHit>,
    pub total_hits: usize,
}

/// `1 + ln(tf)`; `tf` is at least 1 for anything stored in the index.
pub fn tf_weight(tf: u32) -> f64 {
    1.0 + (tf as f64).ln()
}

/// `ln(N / df)`. Zero when the stem occurs in every document.
pub fn idf_weight(num_docs: u32, df: usize) -> f64 {
    (num_docs as f64 / df as f64).ln()
}

impl FinalIndex {
    /// Distinct query stems in first-seen order.
    pub fn query_stems(query: &str) -> Vec<String> {
        let mut seen = BTreeSet::new();
        tokenize(query).into_iter().filter(|s| seen.insert(s.clone())).collect()
    }

    /// Documents containing every stem in `stems`, ascending by ID.
    pub fn matching_documents(&self, stems: &[String]) -> Vec<DocId> {
        let Some(lists) = self.postings_for_all(stems) else { return Vec::new() };
        intersect(&lists)
    }

    /// Boolean AND over the query stems, TF-IDF scored, top `k` by score
    /// with ties going to the lower document ID.
    pub fn search(&self, query: &str, k: usize) -> Vec<SearchHit> {
        self.search_page(query, k).hits
    }

    /// Like [`FinalIndex::search`], but also reports how many documents
    /// matched before the top-`k` cut.
    pub fn search_page(&self, query: &str, k: usize) -> SearchPage {
        let stems = Self::query_stems(query);
        let Some(lists) = self.postings_for_all(&stems) else { return SearchPage::default() };
        let matched = intersect(&lists);
        let total_hits = matched.len();
        if k == 0 {
            return SearchPage { hits: Vec::new(), total_hits };
        }

        let idfs: Vec<f64> = lists.iter().map(|l| idf_weight(self.num_docs, l.len())).collect();
        let mut scored: Vec<(DocId, f64)> = matched
            .into_iter()
            .map(|doc_id| {
                let score: f64 = lists
                    .iter()
                    .zip(&idfs)
                    .filter_map(|(plist, idf)| find(plist, doc_id).map(|p| tf_weight(p.tf) * idf))
                    .sum();
                (doc_id, score)
            })
            .collect();

        scored.sort_by(|a, b| rank_order(*a, *b));
        scored.truncate(k);

        let hits = scored
            .into_iter()
            .filter_map(|(doc_id, score)| {
                let doc = self.docs.get(&doc_id)?;
                Some(SearchHit { doc_id, url: doc.url.clone(), title: doc.title.clone(), score })
            })
            .collect();
        SearchPage { hits, total_hits }
    }

    // None if the query is empty or any stem is missing from the index.
    fn postings_for_all(&self, stems: &[String]) -> Option<Vec<&[Posting]>> {
        if stems.is_empty() {
            return None;
        }
        stems.iter().map(|s| self.postings(s)).collect()
    }
}

/// Descending score, then ascending document ID.
fn rank_order(a: (DocId, f64), b: (DocId, f64)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}

fn find(plist: &[Posting], doc_id: DocId) -> Option<&Posting> {
    plist.binary_search_by_key(&doc_id, |p| p.doc_id).ok().map(|i| &plist[i])
}

// Walk the shortest list and binary-search the rest.
fn intersect(lists: &[&[Posting]]) -> Vec<DocId> {
    let Some(shortest) = lists.iter().min_by_key(|l| l.len()) else { return Vec::new() };
    shortest
        .iter()
        .map(|p| p.doc_id)
        .filter(|&doc_id| lists.iter().all(|l| find(l, doc_id).is_some()))
        .collect()
}

/// Read-only handle on a final index, cheap to clone across request handlers.
#[derive(Clone)]
pub struct QueryEngine {
    index: Arc<FinalIndex>,
}

impl QueryEngine {
    pub fn new(index: FinalIndex) -> Self {
        Self { index: Arc::new(index) }
    }

    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let index = load_final(&IndexPaths::new(dir))?;
        Ok(Self::new(index))
    }

    pub fn search(&self, query: &str, k: usize) -> Vec<SearchHit> {
        self.index.search(query, k)
    }

    pub fn search_page(&self, query: &str, k: usize) -> SearchPage {
        self.index.search_page(query, k)
    }

    pub fn index(&self) -> &FinalIndex { &self.index }
}
