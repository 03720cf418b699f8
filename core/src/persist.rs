use crate::error::{IndexError, Result};
use crate::{DocId, DocRecord, FinalIndex, PartialIndex, Posting};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: u32,
    pub created_at: String,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn postings(&self) -> PathBuf { self.root.join("postings.bin") }
    pub fn docs(&self) -> PathBuf { self.root.join("docs.bin") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn partials_dir(&self) -> PathBuf { self.root.join("partials") }
    pub fn partial(&self, part_num: usize) -> PathBuf {
        self.partials_dir().join(format!("segment_{part_num:05}.bin"))
    }
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent() {
        create_dir_all(dir)?;
    }
    let mut f = File::create(path)?;
    f.write_all(bytes)?;
    Ok(())
}

fn read_bincode<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let mut f = File::open(path).map_err(|e| IndexError::unavailable(path, e))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf).map_err(|e| IndexError::unavailable(path, e))?;
    bincode::deserialize(&buf).map_err(|e| IndexError::unavailable(path, e))
}

/// Write one partial index segment.
pub fn save_partial(path: &Path, part: &PartialIndex) -> Result<()> {
    let bytes = bincode::serialize(part)?;
    write_bytes(path, &bytes)
}

pub fn load_partial(path: &Path) -> Result<PartialIndex> {
    let part: PartialIndex = read_bincode(path)?;
    for (stem, plist) in &part.postings {
        check_postings(stem, plist, |id| part.docs.contains_key(&id)).map_err(|reason| IndexError::unavailable(path, reason))?;
    }
    Ok(part)
}

/// Segment files under `partials/`, in name order.
pub fn list_partials(paths: &IndexPaths) -> Result<Vec<PathBuf>> {
    let dir = paths.partials_dir();
    let entries = fs::read_dir(&dir).map_err(|e| IndexError::unavailable(&dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let p = entry?.path();
        if p.is_file() && p.extension().and_then(|s| s.to_str()) == Some("bin") {
            files.push(p);
        }
    }
    files.sort();
    Ok(files)
}

pub fn save_final(paths: &IndexPaths, index: &FinalIndex, created_at: &str) -> Result<()> {
    create_dir_all(&paths.root)?;
    write_bytes(&paths.postings(), &bincode::serialize(&index.postings)?)?;
    write_bytes(&paths.docs(), &bincode::serialize(&index.docs)?)?;
    let meta = MetaFile { num_docs: index.num_docs, num_terms: index.num_terms() as u32, created_at: created_at.to_string() };
    write_bytes(&paths.meta(), serde_json::to_string_pretty(&meta)?.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let path = paths.meta();
    let mut buf = String::new();
    File::open(&path)
        .and_then(|mut f| f.read_to_string(&mut buf))
        .map_err(|e| IndexError::unavailable(&path, e))?;
    serde_json::from_str(&buf).map_err(|e| IndexError::unavailable(&path, e))
}

/// Load and validate the final index. Anything missing or inconsistent is
/// reported as `CorpusUnavailable`; there is no partial load.
pub fn load_final(paths: &IndexPaths) -> Result<FinalIndex> {
    let meta = load_meta(paths)?;
    let postings: BTreeMap<String, Vec<Posting>> = read_bincode(&paths.postings())?;
    let docs: BTreeMap<DocId, DocRecord> = read_bincode(&paths.docs())?;

    if meta.num_docs as usize != docs.len() {
        return Err(IndexError::unavailable(
            paths.meta(),
            format!("meta records {} documents but the doc table has {}", meta.num_docs, docs.len()),
        ));
    }
    let mut lengths: BTreeMap<DocId, u64> = BTreeMap::new();
    for (stem, plist) in &postings {
        check_postings(stem, plist, |id| docs.contains_key(&id)).map_err(|reason| IndexError::unavailable(paths.postings(), reason))?;
        for p in plist {
            *lengths.entry(p.doc_id).or_default() += u64::from(p.tf);
        }
    }
    for (doc_id, doc) in &docs {
        let summed = lengths.get(doc_id).copied().unwrap_or(0);
        if u64::from(doc.length) != summed {
            return Err(IndexError::unavailable(
                paths.docs(),
                format!("document {doc_id} records length {} but its postings sum to {summed}", doc.length),
            ));
        }
    }

    tracing::info!(root = %paths.root.display(), num_docs = meta.num_docs, num_terms = postings.len(), "loaded index");
    Ok(FinalIndex { postings, docs, num_docs: meta.num_docs })
}

// Postings must be strictly ascending by doc_id, non-zero, and point at known documents.
fn check_postings(stem: &str, plist: &[Posting], known: impl Fn(DocId) -> bool) -> Result<(), String> {
    if plist.is_empty() {
        return Err(format!("term {stem:?} has an empty postings list"));
    }
    let mut prev: Option<DocId> = None;
    for p in plist {
        if p.tf == 0 {
            return Err(format!("term {stem:?} has zero frequency for document {}", p.doc_id));
        }
        if prev.is_some_and(|prev| prev >= p.doc_id) {
            return Err(format!("postings for term {stem:?} are not strictly sorted"));
        }
        if !known(p.doc_id) {
            return Err(format!("term {stem:?} references unknown document {}", p.doc_id));
        }
        prev = Some(p.doc_id);
    }
    Ok(())
}

/// Total size in bytes of the persisted final index files.
pub fn index_size_bytes(paths: &IndexPaths) -> Result<u64> {
    let mut total = 0;
    for path in [paths.postings(), paths.docs(), paths.meta()] {
        total += fs::metadata(&path).map_err(|e| IndexError::unavailable(&path, e))?.len();
    }
    Ok(total)
}
