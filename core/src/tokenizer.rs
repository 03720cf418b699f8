use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::BTreeMap;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"[\p{L}\p{N}]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

/// Tokenize text into stems using NFKC normalization, lowercase, and stemming.
///
/// Tokens are maximal runs of letters and digits; everything else separates
/// them. No stopwords are removed: common terms are discounted by IDF at
/// query time instead. Documents and queries must both go through this
/// function.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    RE.find_iter(&normalized)
        .map(|mat| STEMMER.stem(mat.as_str()).into_owned())
        .filter(|stem| !stem.is_empty())
        .collect()
}

/// Count occurrences of each stem. Every count is at least 1.
pub fn term_frequencies<S: AsRef<str>>(stems: &[S]) -> BTreeMap<String, u32> {
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    for stem in stems {
        *counts.entry(stem.as_ref().to_string()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("Running, runs! run");
        assert_eq!(t, vec!["run", "run", "run"]);
    }

    #[test]
    fn splits_on_non_alphanumeric() {
        let t = tokenize("foo-bar_baz/42");
        assert_eq!(t, vec!["foo", "bar", "baz", "42"]);
    }

    #[test]
    fn counts_frequencies() {
        let tf = term_frequencies(&tokenize("cats cat dog"));
        assert_eq!(tf.get("cat"), Some(&2));
        assert_eq!(tf.get("dog"), Some(&1));
        assert_eq!(tf.len(), 2);
    }
}
