//! Property 9 (§8): searching against several segments and searching
//! against their merge must agree as sets and as scores (within a tiny
//! relative tolerance), and S7's guarantee that a tombstoned document's
//! text is no longer recoverable once its segment has been merged away.

use snowdex::core::config::{Config, LogCompression};
use snowdex::Index;
use tempfile::tempdir;

fn config(dir: &std::path::Path) -> Config {
    Config {
        storage_path: dir.to_path_buf(),
        flush_doc_threshold: 2,
        compression: LogCompression::None,
        merge_max_segments: 8,
    }
}

const CORPUS: &[&str] = &[
    "Obi-Wan never told you what happened to your father.",
    "No. I am your father.",
    "These are not the droids you are looking for.",
    "Help me Obi-Wan Kenobi, you're my only hope.",
    "Do or do not, there is no try.",
];

fn scores_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

#[test]
fn merge_preserves_search_results_as_sets_and_scores() {
    let dir = tempdir().unwrap();
    let mut index = Index::open(config(dir.path())).unwrap();
    for doc in CORPUS {
        index.add(doc).unwrap();
    }
    // `flush_doc_threshold = 2` guarantees several distinct segments exist
    // by the time we're done, rather than one.
    index.flush().unwrap();
    assert!(index.stats().segment_count >= 2, "need multiple segments to exercise merge");

    let before = index.search("father", 0).unwrap();
    assert!(!before.is_empty());

    index.merge().unwrap();
    assert_eq!(index.stats().segment_count, 1);

    let after = index.search("father", 0).unwrap();

    assert_eq!(before.len(), after.len());
    for b in &before {
        let a = after.iter().find(|r| r.doc_id == b.doc_id).expect("doc_id present after merge");
        assert!(scores_close(a.score, b.score), "score drifted: {} vs {}", a.score, b.score);
    }
}

#[test]
fn merge_physically_drops_tombstoned_document_text() {
    let dir = tempdir().unwrap();
    let mut index = Index::open(config(dir.path())).unwrap();
    let mut target = None;
    for doc in CORPUS {
        let id = index.add(doc).unwrap();
        if target.is_none() {
            target = Some(id);
        }
    }
    index.flush().unwrap();
    let target = target.unwrap();
    assert!(index.delete(target).unwrap());

    index.merge().unwrap();
    assert_eq!(index.stats().segment_count, 1);
    assert!(index.get(target).is_err());
    assert_eq!(index.stats().tombstoned_doc_count, 0, "merge drops tombstones for good, not just hides them");
}
