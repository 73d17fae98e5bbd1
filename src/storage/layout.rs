use std::fs;
use std::path::PathBuf;

use crate::core::error::Result;

/// On-disk directory layout (§6):
///
///   dir/
///     segments/NNNNNNNN.seg
///     log/current.wal
///     meta.bin
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,
    pub segments_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        let segments_dir = base_dir.join("segments");
        let log_dir = base_dir.join("log");
        fs::create_dir_all(&segments_dir)?;
        fs::create_dir_all(&log_dir)?;
        Ok(StorageLayout { base_dir, segments_dir, log_dir })
    }

    pub fn segment_path(&self, id: u32) -> PathBuf {
        self.segments_dir.join(format!("{id:08}.seg"))
    }

    pub fn wal_path(&self) -> PathBuf {
        self.log_dir.join("current.wal")
    }

    pub fn meta_path(&self) -> PathBuf {
        self.base_dir.join("meta.bin")
    }

    /// Every `.seg` file currently present, sorted by segment id (the
    /// registry in `meta.bin` is the authoritative ordering; this is a
    /// filesystem-derived fallback for recovery/inspection).
    pub fn existing_segment_ids(&self) -> Result<Vec<u32>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.segments_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".seg") {
                if let Ok(id) = stem.parse::<u32>() {
                    ids.push(id);
                }
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }
}
