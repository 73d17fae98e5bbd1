use std::fs;
use std::path::Path;

use crate::core::config::LogCompression;
use crate::core::error::Result;
use crate::storage::segment::{self, MutableSegment, Segment};

/// Folds several segments into one (§4.10): tombstoned documents are
/// dropped for good, live documents are re-inserted into a fresh mutable
/// segment (which recomputes dictionary, postings, and stats from scratch),
/// then flushed with the same temp-file-and-rename atomicity as a regular
/// flush. Inputs are only deleted once the merged segment is safely on
/// disk; on any failure they are left untouched.
pub fn merge(inputs: &[&Segment], output_path: &Path, compression: LogCompression) -> Result<MutableSegment> {
    let mut merged = MutableSegment::new();
    for segment in inputs {
        let mut postings_by_doc = segment.live_doc_postings();
        for (doc_id, text, length) in segment.live_documents() {
            let postings = postings_by_doc.remove(&doc_id).unwrap_or_default();
            merged.add(doc_id, text.to_string(), length, postings);
        }
    }
    segment::flush(output_path, &merged, compression)?;
    Ok(merged)
}

/// Removes the now-superseded input segment files. Call only after the
/// merged segment has been durably registered (e.g. in `meta.bin`).
pub fn remove_inputs(paths: &[&Path]) -> Result<()> {
    for path in paths {
        fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DocId;
    use crate::storage::segment::{flush, load};
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn segment_with(dir: &Path, name: &str, docs: &[(u128, &str, u32, &[(&str, &[u32])])]) -> Segment {
        let mut mutable = MutableSegment::new();
        for &(id, text, len, terms) in docs {
            let mut postings = HashMap::new();
            for &(term, positions) in terms {
                postings.insert(term.to_string(), positions.to_vec());
            }
            mutable.add(DocId(id), text.to_string(), len, postings);
        }
        let path = dir.join(name);
        flush(&path, &mutable, LogCompression::None).unwrap();
        load(&path).unwrap()
    }

    #[test]
    fn merge_combines_live_documents_from_both_segments() {
        let dir = tempdir().unwrap();
        let seg_a = segment_with(
            dir.path(),
            "a.seg",
            &[(1, "your father", 2, &[("father", &[1])]), (2, "no i am your father", 5, &[("father", &[4])])],
        );
        let seg_b = segment_with(dir.path(), "b.seg", &[(3, "these are not the droids", 5, &[("droids", &[4])])]);

        let out_path = dir.path().join("merged.seg");
        merge(&[&seg_a, &seg_b], &out_path, LogCompression::None).unwrap();
        let merged = load(&out_path).unwrap();

        assert_eq!(merged.live_doc_count(), 3);
        let father = merged.posting_list("father").unwrap();
        assert_eq!(father.doc_freq(), 2);
        let droids = merged.posting_list("droids").unwrap();
        assert_eq!(droids.doc_freq(), 1);
    }

    #[test]
    fn merge_drops_tombstoned_documents_for_good() {
        let dir = tempdir().unwrap();
        let mut mutable = MutableSegment::new();
        let mut postings = HashMap::new();
        postings.insert("father".to_string(), vec![1]);
        mutable.add(DocId(1), "your father".to_string(), 2, postings);
        mutable.delete(DocId(1));
        let path = dir.path().join("a.seg");
        flush(&path, &mutable, LogCompression::None).unwrap();
        let seg = load(&path).unwrap();
        assert_eq!(seg.live_doc_count(), 0);

        let out_path = dir.path().join("merged.seg");
        merge(&[&seg], &out_path, LogCompression::None).unwrap();
        let merged = load(&out_path).unwrap();
        assert_eq!(merged.live_doc_count(), 0);
        assert!(merged.posting_list("father").is_none());
    }
}
