//! A document living in an already-flushed segment must stop being
//! counted everywhere the moment it's deleted — not just at the
//! `get`/`lookup` stage, but in other live documents' `doc_freq`-derived
//! scores too, during the window before the next `merge()` physically
//! rewrites the segment.

use snowdex::core::config::{Config, LogCompression};
use snowdex::Index;
use tempfile::tempdir;

fn config(dir: &std::path::Path) -> Config {
    Config {
        storage_path: dir.to_path_buf(),
        flush_doc_threshold: 1_000_000,
        compression: LogCompression::None,
        merge_max_segments: 8,
    }
}

fn scores_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

#[test]
fn deleting_a_flushed_document_fixes_other_documents_idf_before_any_merge() {
    let dir_a = tempdir().unwrap();
    let mut with_delete = Index::open(config(dir_a.path())).unwrap();
    with_delete.add("your father is here").unwrap();
    let doomed = with_delete.add("my father is gone").unwrap();
    with_delete.flush().unwrap();
    assert!(with_delete.delete(doomed).unwrap());

    let dir_b = tempdir().unwrap();
    let mut clean = Index::open(config(dir_b.path())).unwrap();
    clean.add("your father is here").unwrap();
    clean.flush().unwrap();

    assert_eq!(with_delete.stats().live_doc_count, clean.stats().live_doc_count);
    assert_eq!(with_delete.stats().avg_doc_len, clean.stats().avg_doc_len);

    let scored_with_delete = with_delete.search("father", 0).unwrap();
    let scored_clean = clean.search("father", 0).unwrap();

    assert_eq!(scored_with_delete.len(), 1);
    assert_eq!(scored_clean.len(), 1);
    assert!(
        scores_close(scored_with_delete[0].score, scored_clean[0].score),
        "a still-live document's score must not be skewed by a tombstoned document's posting entries: {} vs {}",
        scored_with_delete[0].score,
        scored_clean[0].score
    );
}
