use std::collections::HashMap;

use crate::analysis::stemmer;
use crate::analysis::stopwords::is_stop_word;

/// Pipeline (§4.1): strip any byte not in `[A-Za-z0-9\s]` to a single space,
/// lowercase, split on whitespace runs, drop stop words, stem survivors.
/// Positions are dense 0-based indices into the post-filter, post-stem
/// stream, matching `tokenize_group`'s contract.
fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c.is_whitespace() {
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(' ');
        }
    }
    out
}

/// Tokenize a document, returning the tokens in stream order (no stop-word
/// positions counted — positions are dense over surviving tokens only).
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .filter(|w| !is_stop_word(w))
        .map(stemmer::stem)
        .collect()
}

/// Normalizes a single query word the same way an indexed document's
/// tokens are produced (lowercase/fold, stop-word drop, stem), so a query
/// term compares against the dictionary on equal footing with what was
/// actually inserted into it. Returns `None` if the word is a stop word
/// or normalizes to nothing — there is no dictionary entry to match
/// against in that case.
pub fn normalize_term(word: &str) -> Option<String> {
    tokenize(word).into_iter().next()
}

/// `tokenize_group(doc)`: returns `(N, term -> ascending positions)`.
pub fn tokenize_group(text: &str) -> (u32, HashMap<String, Vec<u32>>) {
    let tokens = tokenize(text);
    let mut groups: HashMap<String, Vec<u32>> = HashMap::new();
    for (position, term) in tokens.iter().enumerate() {
        groups.entry(term.clone()).or_default().push(position as u32);
    }
    (tokens.len() as u32, groups)
}
