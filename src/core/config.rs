use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Payload compression for write-log records and segment sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogCompression {
    None,
    Lz4,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage_path: PathBuf,
    /// Mutable-segment size (live doc count) that triggers an automatic
    /// flush on `add`.
    pub flush_doc_threshold: usize,
    pub compression: LogCompression,
    /// Segment count above which `merge` is worth calling; not enforced
    /// automatically since merges are explicit-only (see §5).
    pub merge_max_segments: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_path: PathBuf::from("./data"),
            flush_doc_threshold: 1000,
            compression: LogCompression::None,
            merge_max_segments: 8,
        }
    }
}
