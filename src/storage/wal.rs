use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use serde::{Deserialize, Serialize};

use crate::core::config::LogCompression;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::DocId;

const TAG_ADD: u8 = 1;
const TAG_DELETE: u8 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddRecord {
    pub doc_id: DocId,
    pub text: String,
    pub token_count: u32,
    pub postings: HashMap<String, Vec<u32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRecord {
    pub doc_id: DocId,
}

#[derive(Debug, Clone)]
pub enum WalRecord {
    Add(AddRecord),
    Delete(DeleteRecord),
}

/// Append-only log backing the mutable segment (§4.6). Each record is
/// framed as `(u8 tag, u32 big-endian payload length, payload)`, with the
/// payload optionally compressed as a whole.
pub struct Wal {
    file: File,
    compression: LogCompression,
}

impl Wal {
    pub fn open(path: &Path, compression: LogCompression) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).read(true).open(path)?;
        Ok(Wal { file, compression })
    }

    pub fn append_add(&mut self, record: &AddRecord) -> Result<()> {
        self.append(TAG_ADD, record)
    }

    pub fn append_delete(&mut self, record: &DeleteRecord) -> Result<()> {
        self.append(TAG_DELETE, record)
    }

    fn append<T: Serialize>(&mut self, tag: u8, record: &T) -> Result<()> {
        let payload = bincode::serialize(record)?;
        let payload = self.compress(payload);
        let len = payload.len() as u32;
        self.file.write_all(&[tag])?;
        self.file.write_all(&len.to_be_bytes())?;
        self.file.write_all(&payload)?;
        self.file.sync_all()?;
        Ok(())
    }

    fn compress(&self, payload: Vec<u8>) -> Vec<u8> {
        match self.compression {
            LogCompression::None => payload,
            LogCompression::Lz4 => compress_prepend_size(&payload),
        }
    }

    pub fn truncate(&mut self, path: &Path) -> Result<()> {
        self.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .read(true)
            .append(true)
            .open(path)?;
        Ok(())
    }
}

/// Replay every record in `path`, in order. Returns an empty list if the
/// log does not exist yet (fresh index). An unknown tag byte aborts replay
/// entirely — corruption must be explicit, never silently truncated.
pub fn replay(path: &Path, compression: LogCompression) -> Result<Vec<WalRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut file = File::open(path)?;
    let mut records = Vec::new();

    loop {
        let mut tag_buf = [0u8; 1];
        match file.read_exact(&mut tag_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        let mut len_buf = [0u8; 4];
        file.read_exact(&mut len_buf)?;
        let len = u32::from_be_bytes(len_buf) as usize;

        let mut payload = vec![0u8; len];
        file.read_exact(&mut payload)?;
        let payload = decompress(&payload, compression)?;

        let record = match tag_buf[0] {
            TAG_ADD => WalRecord::Add(bincode::deserialize(&payload)?),
            TAG_DELETE => WalRecord::Delete(bincode::deserialize(&payload)?),
            other => {
                return Err(Error::new(
                    ErrorKind::IndexInit,
                    format!("unknown log operation tag: {other}"),
                ))
            }
        };
        records.push(record);
    }

    Ok(records)
}

fn decompress(payload: &[u8], compression: LogCompression) -> Result<Vec<u8>> {
    match compression {
        LogCompression::None => Ok(payload.to_vec()),
        LogCompression::Lz4 => decompress_size_prepended(payload)
            .map_err(|e| Error::new(ErrorKind::IndexInit, format!("log decompression failed: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_then_replay_round_trips_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("current.wal");

        {
            let mut wal = Wal::open(&path, LogCompression::None).unwrap();
            let mut postings = HashMap::new();
            postings.insert("father".to_string(), vec![0, 3]);
            wal.append_add(&AddRecord {
                doc_id: DocId(1),
                text: "your father".to_string(),
                token_count: 2,
                postings,
            })
            .unwrap();
            wal.append_delete(&DeleteRecord { doc_id: DocId(1) }).unwrap();
        }

        let records = replay(&path, LogCompression::None).unwrap();
        assert_eq!(records.len(), 2);
        assert!(matches!(&records[0], WalRecord::Add(r) if r.doc_id == DocId(1)));
        assert!(matches!(&records[1], WalRecord::Delete(r) if r.doc_id == DocId(1)));
    }

    #[test]
    fn compressed_log_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("current.wal");
        {
            let mut wal = Wal::open(&path, LogCompression::Lz4).unwrap();
            wal.append_delete(&DeleteRecord { doc_id: DocId(42) }).unwrap();
        }
        let records = replay(&path, LogCompression::Lz4).unwrap();
        assert_eq!(records.len(), 1);
        assert!(matches!(&records[0], WalRecord::Delete(r) if r.doc_id == DocId(42)));
    }

    #[test]
    fn unknown_tag_aborts_replay() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("current.wal");
        {
            let mut f = OpenOptions::new().create(true).append(true).open(&path).unwrap();
            f.write_all(&[99u8]).unwrap();
            f.write_all(&0u32.to_be_bytes()).unwrap();
        }
        let err = replay(&path, LogCompression::None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IndexInit);
    }

    #[test]
    fn missing_log_replays_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("current.wal");
        assert!(replay(&path, LogCompression::None).unwrap().is_empty());
    }
}
