use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use serde::{Deserialize, Serialize};

use crate::compression::delta::DeltaEncoder;
use crate::core::config::LogCompression;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::DocId;
use crate::index::posting::{Posting, PostingList};
use crate::index::trie::Trie;

const MAGIC: &[u8; 4] = b"MSSG";
const VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId(pub u32);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocTableEntry {
    doc_id: DocId,
    length_tokens: u32,
    text: String,
    deleted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct TermPostingsRecord {
    term: String,
    df: u32,
    // Delta+vbyte encoded local doc-table ordinals (§4.5), ascending.
    ordinals: Vec<u8>,
    term_freqs: Vec<u32>,
    // One delta+vbyte encoded position list per posting, aligned with `ordinals`.
    positions: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct SegmentStats {
    live_doc_count: u32,
    total_tokens: u64,
}

/// The in-memory write path: accumulates adds/deletes, write-through to the
/// WAL by the caller, until `flush` seals it into an immutable `.seg` file.
#[derive(Default)]
pub struct MutableSegment {
    doc_table: Vec<DocTableEntry>,
    doc_index: HashMap<DocId, usize>,
    dictionary: Trie,
    postings: HashMap<String, Vec<Posting>>,
}

impl MutableSegment {
    pub fn new() -> Self {
        MutableSegment::default()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_table.is_empty()
    }

    pub fn add(&mut self, doc_id: DocId, text: String, token_count: u32, postings: HashMap<String, Vec<u32>>) {
        let ordinal = self.doc_table.len();
        self.doc_table.push(DocTableEntry {
            doc_id,
            length_tokens: token_count,
            text,
            deleted: false,
        });
        self.doc_index.insert(doc_id, ordinal);

        for (term, positions) in postings {
            self.dictionary.insert(&term);
            let entry = self.postings.entry(term).or_default();
            entry.push(Posting::new(doc_id, positions));
        }
    }

    /// Returns true if `doc_id` was live and is now tombstoned.
    pub fn delete(&mut self, doc_id: DocId) -> bool {
        match self.doc_index.get(&doc_id) {
            Some(&ordinal) if !self.doc_table[ordinal].deleted => {
                self.doc_table[ordinal].deleted = true;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, doc_id: DocId) -> Option<(&str, u32)> {
        let &ordinal = self.doc_index.get(&doc_id)?;
        let entry = &self.doc_table[ordinal];
        if entry.deleted {
            None
        } else {
            Some((entry.text.as_str(), entry.length_tokens))
        }
    }

    pub fn dictionary(&self) -> &Trie {
        &self.dictionary
    }

    pub fn posting_list(&self, term: &str) -> Option<PostingList> {
        let raw = self.postings.get(term)?;
        let mut live: Vec<Posting> = raw
            .iter()
            .filter(|p| {
                self.doc_index
                    .get(&p.doc_id)
                    .map(|&ord| !self.doc_table[ord].deleted)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        live.sort_by_key(|p| p.doc_id);
        Some(PostingList::new(live))
    }

    pub fn live_doc_count(&self) -> u64 {
        self.doc_table.iter().filter(|d| !d.deleted).count() as u64
    }

    pub fn total_tokens(&self) -> u64 {
        self.doc_table
            .iter()
            .filter(|d| !d.deleted)
            .map(|d| d.length_tokens as u64)
            .sum()
    }

    pub fn tombstoned_doc_count(&self) -> u64 {
        self.doc_table.iter().filter(|d| d.deleted).count() as u64
    }

    /// Highest doc_id ever seen, live or tombstoned — used to seed the id
    /// generator so a restart never reissues a smaller id.
    pub fn max_doc_id(&self) -> Option<DocId> {
        self.doc_table.iter().map(|e| e.doc_id).max()
    }
}

/// An immutable, on-disk segment, fully decoded into memory on load
/// (§9 trades lazy mmap access for a simpler, fully in-memory read path).
pub struct Segment {
    doc_table: Vec<DocTableEntry>,
    dictionary: Trie,
    postings: HashMap<String, PostingList>,
    stats: SegmentStats,
}

impl Segment {
    pub fn get(&self, doc_id: DocId) -> Option<(&str, u32)> {
        let ordinal = self.find_ordinal(doc_id)?;
        let entry = &self.doc_table[ordinal];
        if entry.deleted {
            None
        } else {
            Some((entry.text.as_str(), entry.length_tokens))
        }
    }

    fn find_ordinal(&self, doc_id: DocId) -> Option<usize> {
        self.doc_table.binary_search_by_key(&doc_id, |e| e.doc_id).ok()
    }

    /// Marks a document dead in memory without rewriting the segment file
    /// (segments are immutable on disk; only `merge` physically drops
    /// tombstones). Returns false if already tombstoned or not present.
    pub(crate) fn tombstone(&mut self, doc_id: DocId) -> bool {
        let Some(ordinal) = self.find_ordinal(doc_id) else {
            return false;
        };
        let entry = &mut self.doc_table[ordinal];
        if entry.deleted {
            return false;
        }
        entry.deleted = true;
        self.stats.live_doc_count -= 1;
        self.stats.total_tokens -= entry.length_tokens as u64;
        true
    }

    pub fn tombstoned_doc_count(&self) -> u64 {
        self.doc_table.len() as u64 - self.stats.live_doc_count as u64
    }

    /// The doc table is sorted by doc_id, so the last entry is the max,
    /// live or tombstoned.
    pub fn max_doc_id(&self) -> Option<DocId> {
        self.doc_table.last().map(|e| e.doc_id)
    }

    pub fn dictionary(&self) -> &Trie {
        &self.dictionary
    }

    /// Filters out tombstoned documents on every call, the same as
    /// `MutableSegment::posting_list` — a segment file retains a
    /// tombstoned document's posting entries physically until the next
    /// `merge`, but nothing computed from this list (doc_freq, term_freq
    /// sums, IDF) should count a document `tombstone` has already marked
    /// dead in `doc_table`.
    pub fn posting_list(&self, term: &str) -> Option<PostingList> {
        let raw = self.postings.get(term)?;
        let live: Vec<Posting> = raw
            .postings()
            .iter()
            .filter(|p| self.get(p.doc_id).is_some())
            .cloned()
            .collect();
        Some(PostingList::new(live))
    }

    pub fn live_doc_count(&self) -> u64 {
        self.stats.live_doc_count as u64
    }

    pub fn total_tokens(&self) -> u64 {
        self.stats.total_tokens
    }

    pub fn live_documents(&self) -> impl Iterator<Item = (DocId, &str, u32)> {
        self.doc_table
            .iter()
            .filter(|e| !e.deleted)
            .map(|e| (e.doc_id, e.text.as_str(), e.length_tokens))
    }

    /// Reconstructs each live document's per-term position lists from the
    /// term-keyed postings section, for feeding back into a fresh
    /// `MutableSegment` (merge's only use so far).
    pub(crate) fn live_doc_postings(&self) -> HashMap<DocId, HashMap<String, Vec<u32>>> {
        let mut by_doc: HashMap<DocId, HashMap<String, Vec<u32>>> = HashMap::new();
        for (term, list) in &self.postings {
            for posting in list.postings() {
                if self.get(posting.doc_id).is_some() {
                    by_doc
                        .entry(posting.doc_id)
                        .or_default()
                        .insert(term.clone(), posting.positions.clone());
                }
            }
        }
        by_doc
    }
}

fn encode_section<T: Serialize>(value: &T, compression: LogCompression) -> Result<Vec<u8>> {
    let bytes = bincode::serialize(value)?;
    Ok(match compression {
        LogCompression::None => bytes,
        LogCompression::Lz4 => compress_prepend_size(&bytes),
    })
}

fn decode_section<T: for<'de> Deserialize<'de>>(bytes: &[u8], compression: LogCompression) -> Result<T> {
    let bytes = match compression {
        LogCompression::None => bytes.to_vec(),
        LogCompression::Lz4 => decompress_size_prepended(bytes)
            .map_err(|e| Error::new(ErrorKind::IndexInit, format!("segment decompression failed: {e}")))?,
    };
    Ok(bincode::deserialize(&bytes)?)
}

fn write_framed(file: &mut File, bytes: &[u8]) -> Result<()> {
    file.write_all(&(bytes.len() as u32).to_le_bytes())?;
    file.write_all(bytes)?;
    Ok(())
}

fn read_framed(file: &mut File) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    file.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;
    let mut bytes = vec![0u8; len];
    file.read_exact(&mut bytes)?;
    Ok(bytes)
}

/// Write `mutable` to `path` as an immutable `.seg` file (§6), via a
/// temp-file-then-rename so a crash mid-write can never leave a partially
/// written segment at its final path.
pub fn flush(path: &Path, mutable: &MutableSegment, compression: LogCompression) -> Result<()> {
    let tmp_path = path.with_extension("seg.tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(MAGIC)?;
        file.write_all(&VERSION.to_le_bytes())?;
        let compression_flag: u8 = match compression {
            LogCompression::None => 0,
            LogCompression::Lz4 => 1,
        };
        file.write_all(&[compression_flag])?;

        // Persisted doc table is sorted by doc_id (§4.5); postings reference
        // documents by their position in that sorted table (local ordinal),
        // which is generally not the order documents were added in.
        let mut sorted_table = mutable.doc_table.clone();
        sorted_table.sort_by_key(|e| e.doc_id);
        let ordinal_of: HashMap<DocId, u32> = sorted_table
            .iter()
            .enumerate()
            .map(|(ord, e)| (e.doc_id, ord as u32))
            .collect();

        write_framed(&mut file, &encode_section(&sorted_table, compression)?)?;
        write_framed(&mut file, &encode_section(&mutable.dictionary, compression)?)?;
        write_framed(
            &mut file,
            &encode_section(&encode_postings(mutable, &ordinal_of), compression)?,
        )?;
        write_framed(
            &mut file,
            &encode_section(
                &SegmentStats {
                    live_doc_count: mutable.live_doc_count() as u32,
                    total_tokens: mutable.total_tokens(),
                },
                compression,
            )?,
        )?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn encode_postings(mutable: &MutableSegment, ordinal_of: &HashMap<DocId, u32>) -> Vec<TermPostingsRecord> {
    mutable
        .dictionary
        .terms()
        .into_iter()
        .map(|term| {
            let mut postings: Vec<&Posting> = mutable.postings.get(&term).map(Vec::as_slice).unwrap_or(&[]).iter().collect();
            postings.sort_by_key(|p| ordinal_of[&p.doc_id]);
            let ordinals: Vec<u32> = postings.iter().map(|p| ordinal_of[&p.doc_id]).collect();
            TermPostingsRecord {
                term,
                df: postings.len() as u32,
                ordinals: DeltaEncoder::encode(&ordinals),
                term_freqs: postings.iter().map(|p| p.term_freq).collect(),
                positions: postings.iter().map(|p| DeltaEncoder::encode(&p.positions)).collect(),
            }
        })
        .collect()
}

pub fn load(path: &Path) -> Result<Segment> {
    let mut file = File::open(path)?;

    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(Error::new(ErrorKind::IndexInit, "bad segment magic".to_string()));
    }
    let mut version_buf = [0u8; 4];
    file.read_exact(&mut version_buf)?;
    let version = u32::from_le_bytes(version_buf);
    if version != VERSION {
        return Err(Error::new(ErrorKind::IndexInit, format!("unsupported segment version {version}")));
    }
    let mut flag_buf = [0u8; 1];
    file.read_exact(&mut flag_buf)?;
    let compression = match flag_buf[0] {
        0 => LogCompression::None,
        1 => LogCompression::Lz4,
        other => return Err(Error::new(ErrorKind::IndexInit, format!("unknown compression flag {other}"))),
    };

    let doc_table: Vec<DocTableEntry> = decode_section(&read_framed(&mut file)?, compression)?;
    let dictionary: Trie = decode_section(&read_framed(&mut file)?, compression)?;
    let records: Vec<TermPostingsRecord> = decode_section(&read_framed(&mut file)?, compression)?;
    let stats: SegmentStats = decode_section(&read_framed(&mut file)?, compression)?;

    let mut postings = HashMap::with_capacity(records.len());
    for record in records {
        let ordinals = DeltaEncoder::decode(&record.ordinals)?;
        if ordinals.len() != record.term_freqs.len() || ordinals.len() != record.positions.len() {
            return Err(Error::new(
                ErrorKind::IndexInit,
                format!("malformed postings for term {}", record.term),
            ));
        }
        let mut list = Vec::with_capacity(ordinals.len());
        for ((ordinal, tf), positions) in ordinals.into_iter().zip(record.term_freqs).zip(record.positions) {
            let doc_id = doc_table
                .get(ordinal as usize)
                .ok_or_else(|| Error::new(ErrorKind::IndexInit, "posting ordinal out of range".to_string()))?
                .doc_id;
            let positions = DeltaEncoder::decode(&positions)?;
            let mut posting = Posting::new(doc_id, positions);
            posting.term_freq = tf;
            list.push(posting);
        }
        postings.insert(record.term, PostingList::new(list));
    }

    Ok(Segment { doc_table, dictionary, postings, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> MutableSegment {
        let mut seg = MutableSegment::new();
        let mut postings = HashMap::new();
        postings.insert("father".to_string(), vec![3, 7]);
        postings.insert("your".to_string(), vec![2]);
        seg.add(DocId(1), "your father is here".to_string(), 4, postings);

        let mut postings2 = HashMap::new();
        postings2.insert("father".to_string(), vec![1]);
        seg.add(DocId(2), "my father".to_string(), 2, postings2);
        seg
    }

    #[test]
    fn flush_then_load_round_trips_postings_and_doc_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("00000001.seg");
        let mutable = sample();
        flush(&path, &mutable, LogCompression::None).unwrap();

        let segment = load(&path).unwrap();
        assert_eq!(segment.live_doc_count(), 2);
        assert_eq!(segment.total_tokens(), 6);

        let list = segment.posting_list("father").unwrap();
        assert_eq!(list.doc_freq(), 2);
        assert_eq!(list.get(0).unwrap().doc_id, DocId(1));
        assert_eq!(list.get(0).unwrap().positions, vec![3, 7]);
        assert_eq!(list.get(1).unwrap().doc_id, DocId(2));
        assert_eq!(list.get(1).unwrap().positions, vec![1]);

        let (text, len) = segment.get(DocId(1)).unwrap();
        assert_eq!(text, "your father is here");
        assert_eq!(len, 4);
    }

    #[test]
    fn flush_then_load_round_trips_with_compression() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("00000001.seg");
        let mutable = sample();
        flush(&path, &mutable, LogCompression::Lz4).unwrap();

        let segment = load(&path).unwrap();
        assert_eq!(segment.live_doc_count(), 2);
        assert_eq!(segment.posting_list("your").unwrap().doc_freq(), 1);
    }

    #[test]
    fn tombstoned_docs_are_excluded_from_stats_but_retained_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("00000001.seg");
        let mut mutable = sample();
        mutable.delete(DocId(1));
        flush(&path, &mutable, LogCompression::None).unwrap();

        let segment = load(&path).unwrap();
        assert_eq!(segment.live_doc_count(), 1);
        assert!(segment.get(DocId(1)).is_none());
        // Still physically present for a later merge to drop.
        assert_eq!(segment.live_documents().count(), 1);
    }

    #[test]
    fn tombstone_on_a_loaded_segment_excludes_the_document_from_posting_lists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("00000001.seg");
        flush(&path, &sample(), LogCompression::None).unwrap();

        let mut segment = load(&path).unwrap();
        let before = segment.posting_list("father").unwrap();
        assert_eq!(before.doc_freq(), 2);

        assert!(segment.tombstone(DocId(1)));
        let after = segment.posting_list("father").unwrap();
        assert_eq!(after.doc_freq(), 1);
        assert_eq!(after.get(0).unwrap().doc_id, DocId(2));

        // "your" only ever occurred in doc 1 — now it has no live postings.
        assert!(segment.posting_list("your").unwrap().is_empty());
    }

    #[test]
    fn bad_magic_fails_to_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("00000001.seg");
        fs::write(&path, b"nope").unwrap();
        let err = load(&path).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IndexInit);
    }
}
