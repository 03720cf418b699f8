use pagesearch_core::RawRecord;
use std::fs::File;
use std::io::{BufRead, BufReader, Split};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Collect `.json` and `.jsonl` files under `input` in a stable order.
pub fn find_inputs(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }
    files
}

struct JsonlFile {
    path: PathBuf,
    lines: Split<BufReader<File>>,
    lineno: usize,
}

/// Lazily yields crawl records from every input file. A `.json` file holds
/// one crawled page, a `.jsonl` file one page per line. Unreadable files,
/// undecodable lines, and malformed JSON are skipped with a warning and
/// counted; they never end the stream.
pub struct CorpusReader {
    files: std::vec::IntoIter<PathBuf>,
    current: Option<JsonlFile>,
    read: usize,
    skipped: usize,
}

impl CorpusReader {
    pub fn open(input: &Path) -> Self {
        Self { files: find_inputs(input).into_iter(), current: None, read: 0, skipped: 0 }
    }

    pub fn read(&self) -> usize { self.read }

    pub fn skipped(&self) -> usize { self.skipped }

    fn next_from_jsonl(&mut self) -> Option<RawRecord> {
        while let Some(file) = self.current.as_mut() {
            match file.lines.next() {
                None => self.current = None,
                Some(Err(err)) => {
                    tracing::warn!(file = %file.path.display(), line = file.lineno + 1, %err, "stopping at unreadable line");
                    self.skipped += 1;
                    self.current = None;
                }
                Some(Ok(line)) => {
                    file.lineno += 1;
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    match serde_json::from_slice::<RawRecord>(&line) {
                        Ok(record) => return Some(record),
                        Err(err) => {
                            tracing::warn!(file = %file.path.display(), line = file.lineno, %err, "skipping malformed record");
                            self.skipped += 1;
                        }
                    }
                }
            }
        }
        None
    }
}

impl Iterator for CorpusReader {
    type Item = RawRecord;

    fn next(&mut self) -> Option<RawRecord> {
        loop {
            if let Some(record) = self.next_from_jsonl() {
                self.read += 1;
                return Some(record);
            }
            let path = self.files.next()?;
            let file = match File::open(&path) {
                Ok(f) => f,
                Err(err) => {
                    tracing::warn!(file = %path.display(), %err, "skipping unreadable file");
                    self.skipped += 1;
                    continue;
                }
            };
            if path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
                self.current = Some(JsonlFile { path, lines: BufReader::new(file).split(b'\n'), lineno: 0 });
                continue;
            }
            match serde_json::from_reader::<_, RawRecord>(BufReader::new(file)) {
                Ok(record) => {
                    self.read += 1;
                    return Some(record);
                }
                Err(err) => {
                    tracing::warn!(file = %path.display(), %err, "skipping unreadable record");
                    self.skipped += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn reads_json_and_jsonl_and_skips_bad_input() {
        let dir = tempdir().unwrap();
        let site = dir.path().join("site_a");
        fs::create_dir_all(&site).unwrap();
        fs::write(site.join("0001.json"), r#"{"url":"http://a/1","content":"<p>hello</p>","encoding":"utf-8"}"#).unwrap();
        fs::write(site.join("0002.json"), "not json").unwrap();
        fs::write(
            dir.path().join("batch.jsonl"),
            "{\"url\":\"http://b/1\",\"content\":\"one\"}\n\n{broken\n{\"url\":\"http://b/2\"}\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut reader = CorpusReader::open(dir.path());
        let records: Vec<RawRecord> = reader.by_ref().collect();
        let urls: Vec<&str> = records.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["http://b/1", "http://b/2", "http://a/1"]);
        assert_eq!(reader.skipped(), 2);
        assert_eq!(reader.read(), 3);
        assert_eq!(records[1].content, "");
    }

    #[test]
    fn non_utf8_line_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let mut bytes = b"{\"url\":\"http://c/1\",\"content\":\"first\"}\n".to_vec();
        bytes.extend_from_slice(b"{\"url\":\"http://c/2\",\"content\":\"\xff\xfe\"}\n");
        bytes.extend_from_slice(b"{\"url\":\"http://c/3\",\"content\":\"third\"}\n");
        fs::write(dir.path().join("crawl.jsonl"), bytes).unwrap();

        let mut reader = CorpusReader::open(dir.path());
        let urls: Vec<String> = reader.by_ref().map(|r| r.url).collect();
        assert_eq!(urls, vec!["http://c/1", "http://c/3"]);
        assert_eq!(reader.skipped(), 1);
    }

    #[test]
    fn records_are_pulled_lazily() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.jsonl"), "{\"url\":\"u1\"}\n{\"url\":\"u2\"}\n").unwrap();
        let mut reader = CorpusReader::open(dir.path());
        assert_eq!(reader.next().map(|r| r.url), Some("u1".to_string()));
        assert_eq!(reader.read(), 1);
    }
}
