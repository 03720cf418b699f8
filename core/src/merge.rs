use crate::error::{IndexError, Result};
use crate::{DocId, DocMeta, DocRecord, FinalIndex, PartialIndex, Posting};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Combine partial indexes into one final index.
///
/// Frequencies are accumulated per (stem, document) and summed, so the
/// same document showing up in several partials is merged rather than
/// duplicated. The result does not depend on the order of `parts`.
pub fn merge_partials<'a, I>(parts: I) -> Result<FinalIndex>
where
    I: IntoIterator<Item = &'a PartialIndex>,
{
    let mut acc: BTreeMap<String, BTreeMap<DocId, u32>> = BTreeMap::new();
    let mut metas: BTreeMap<DocId, DocMeta> = BTreeMap::new();
    let mut num_parts = 0usize;

    for part in parts {
        num_parts += 1;
        for (doc_id, meta) in &part.docs {
            match metas.entry(*doc_id) {
                Entry::Vacant(slot) => {
                    slot.insert(meta.clone());
                }
                Entry::Occupied(mut slot) => {
                    let existing = slot.get_mut();
                    if existing.url != meta.url {
                        let (first, second) = ordered(&existing.url, &meta.url);
                        return Err(IndexError::ConflictingDocument { doc_id: *doc_id, first, second });
                    }
                    existing.title = existing.title.take().max(meta.title.clone());
                }
            }
        }
        for (stem, plist) in &part.postings {
            let merged = acc.entry(stem.clone()).or_default();
            for p in plist {
                *merged.entry(p.doc_id).or_insert(0) += p.tf;
            }
        }
    }

    let mut lengths: BTreeMap<DocId, u32> = BTreeMap::new();
    let mut postings: BTreeMap<String, Vec<Posting>> = BTreeMap::new();
    for (stem, per_doc) in acc {
        let mut plist = Vec::with_capacity(per_doc.len());
        for (doc_id, tf) in per_doc {
            if tf == 0 {
                continue;
            }
            if !metas.contains_key(&doc_id) {
                return Err(IndexError::DanglingPosting { term: stem, doc_id });
            }
            *lengths.entry(doc_id).or_insert(0) += tf;
            plist.push(Posting { doc_id, tf });
        }
        if !plist.is_empty() {
            postings.insert(stem, plist);
        }
    }

    let docs: BTreeMap<DocId, DocRecord> = metas
        .into_iter()
        .map(|(doc_id, meta)| {
            let length = lengths.get(&doc_id).copied().unwrap_or(0);
            (doc_id, DocRecord { url: meta.url, title: meta.title, length })
        })
        .collect();

    let num_docs = docs.len() as u32;
    tracing::info!(partials = num_parts, num_docs, num_terms = postings.len(), "merged partial indexes");
    Ok(FinalIndex { postings, docs, num_docs })
}

// Keeps the reported pair stable whichever partial is seen first.
fn ordered(a: &str, b: &str) -> (String, String) {
    if a <= b { (a.to_string(), b.to_string()) } else { (b.to_string(), a.to_string()) }
}
