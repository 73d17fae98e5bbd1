use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::analysis::tokenizer;
use crate::core::config::{Config, LogCompression};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocId, DocumentView};
use crate::core::ulid::MonotonicGenerator;
use crate::index::trie::{AutomatonSet, MAX_AUTOMATON_DISTANCE};
use crate::query::ast::Fuzziness;
use crate::query::intersection::{Bundle, Intersection, Variant};
use crate::query::parser;
use crate::query::proximity::match_windows;
use crate::scoring::bm25::{BM25Scorer, CorpusStats, TopK};
use crate::storage::layout::StorageLayout;
use crate::storage::merge;
use crate::storage::segment::{self, MutableSegment, Segment};
use crate::storage::wal::{self, AddRecord, DeleteRecord, Wal, WalRecord};

/// Durable registry at `meta.bin`: the ordered segment list and the
/// compression mode fixed at index creation. `last_doc_id` from the
/// on-disk layout isn't stored separately — it's always recoverable as
/// the max doc_id across loaded segments and a replayed log, so there's
/// nothing to keep in sync on every `add`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Meta {
    segments: Vec<u32>,
    next_segment_id: u32,
    compression: LogCompression,
}

impl Meta {
    fn fresh(compression: LogCompression) -> Self {
        Meta { segments: Vec::new(), next_segment_id: 1, compression }
    }
}

fn load_meta(path: &std::path::Path, default_compression: LogCompression) -> Result<Meta> {
    if !path.exists() {
        return Ok(Meta::fresh(default_compression));
    }
    let bytes = fs::read(path)?;
    Ok(bincode::deserialize(&bytes)?)
}

fn persist_meta(path: &std::path::Path, meta: &Meta) -> Result<()> {
    let bytes = bincode::serialize(meta)?;
    let tmp_path = path.with_extension("bin.tmp");
    fs::write(&tmp_path, &bytes)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub struct IndexStats {
    pub segment_count: usize,
    pub live_doc_count: u64,
    pub tombstoned_doc_count: u64,
    pub avg_doc_len: f64,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub doc_id: DocId,
    pub document: DocumentView,
    pub score: f64,
}

/// The public embedded-search-engine handle (§6). Not safe for concurrent
/// writers — single-threaded cooperative use within one process, per §5.
pub struct Index {
    storage: StorageLayout,
    config: Config,
    meta: Meta,
    mutable: MutableSegment,
    segments: Vec<(u32, Segment)>,
    wal: Wal,
    id_gen: MonotonicGenerator,
    automata: AutomatonSet,
}

impl Index {
    pub fn open(config: Config) -> Result<Self> {
        let storage = StorageLayout::new(config.storage_path.clone())?;
        let meta = load_meta(&storage.meta_path(), config.compression)?;

        let mut segments = Vec::with_capacity(meta.segments.len());
        for &id in &meta.segments {
            let segment = segment::load(&storage.segment_path(id))?;
            segments.push((id, segment));
        }

        let mut mutable = MutableSegment::new();
        let records = wal::replay(&storage.wal_path(), meta.compression)?;
        let replayed = records.len();
        for record in records {
            match record {
                WalRecord::Add(r) => mutable.add(r.doc_id, r.text, r.token_count, r.postings),
                WalRecord::Delete(r) => {
                    if !mutable.delete(r.doc_id) {
                        for (_, segment) in segments.iter_mut() {
                            if segment.tombstone(r.doc_id) {
                                break;
                            }
                        }
                    }
                }
            }
        }

        let max_doc_id = segments
            .iter()
            .filter_map(|(_, s)| s.max_doc_id())
            .chain(mutable.max_doc_id())
            .max();
        let id_gen = match max_doc_id {
            Some(doc_id) => MonotonicGenerator::seeded(doc_id.as_u128()),
            None => MonotonicGenerator::new(),
        };

        let wal = Wal::open(&storage.wal_path(), meta.compression)?;
        info!(segments = segments.len(), wal_records_replayed = replayed, "index opened");

        Ok(Index {
            storage,
            config,
            meta,
            mutable,
            segments,
            wal,
            id_gen,
            automata: AutomatonSet::new(),
        })
    }

    pub fn add(&mut self, text: &str) -> Result<DocId> {
        let doc_id = DocId(self.id_gen.next()?);
        let (token_count, postings) = tokenizer::tokenize_group(text);

        let record = AddRecord {
            doc_id,
            text: text.to_string(),
            token_count,
            postings: postings.clone(),
        };
        self.wal
            .append_add(&record)
            .map_err(|e| Error::new(ErrorKind::IndexAdd, e.context))?;
        self.mutable.add(doc_id, text.to_string(), token_count, postings);
        trace!(%doc_id, tokens = token_count, "document added");

        if self.config.flush_doc_threshold > 0
            && self.mutable.live_doc_count() as usize >= self.config.flush_doc_threshold
        {
            self.flush()?;
        }

        Ok(doc_id)
    }

    pub fn delete(&mut self, doc_id: DocId) -> Result<bool> {
        self.wal
            .append_delete(&DeleteRecord { doc_id })
            .map_err(|e| Error::new(ErrorKind::IndexDelete, e.context))?;

        if self.mutable.delete(doc_id) {
            return Ok(true);
        }
        for (_, segment) in self.segments.iter_mut() {
            if segment.tombstone(doc_id) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn get(&self, doc_id: DocId) -> Result<DocumentView> {
        self.lookup(doc_id)
            .map(|(content, length)| DocumentView { content: content.to_string(), length })
            .ok_or_else(|| Error::new(ErrorKind::IndexGet, format!("no live document with id {doc_id}")))
    }

    fn lookup(&self, doc_id: DocId) -> Option<(&str, u32)> {
        if let Some(hit) = self.mutable.get(doc_id) {
            return Some(hit);
        }
        self.segments.iter().find_map(|(_, s)| s.get(doc_id))
    }

    fn live_doc_count(&self) -> u64 {
        self.mutable.live_doc_count() + self.segments.iter().map(|(_, s)| s.live_doc_count()).sum::<u64>()
    }

    fn total_tokens(&self) -> u64 {
        self.mutable.total_tokens() + self.segments.iter().map(|(_, s)| s.total_tokens()).sum::<u64>()
    }

    fn avg_doc_len(&self) -> f64 {
        let n = self.live_doc_count();
        if n == 0 {
            0.0
        } else {
            self.total_tokens() as f64 / n as f64
        }
    }

    pub fn stats(&self) -> IndexStats {
        let tombstoned = self.mutable.tombstoned_doc_count()
            + self.segments.iter().map(|(_, s)| s.tombstoned_doc_count()).sum::<u64>();
        IndexStats {
            segment_count: self.segments.len(),
            live_doc_count: self.live_doc_count(),
            tombstoned_doc_count: tombstoned,
            avg_doc_len: self.avg_doc_len(),
        }
    }

    /// Expands one query token to every (term, actual_distance) pair within
    /// its requested fuzziness, across the mutable dictionary and every
    /// segment's dictionary (§4.4). `word` is run through the same
    /// normalize/stem pipeline indexed terms went through before it ever
    /// reaches the trie, so e.g. `"Running"` compares against the `"run"`
    /// actually stored, matching the Parser → Tokenizer → Trie+Automata
    /// pipeline (§2).
    fn expand_term(&self, word: &str, fuzziness: Fuzziness) -> Vec<(String, u8)> {
        let Some(normalized) = tokenizer::normalize_term(word) else {
            return Vec::new();
        };

        let distance = match fuzziness {
            Fuzziness::Exact => 0,
            Fuzziness::Distance(d) => d,
            Fuzziness::MaxAvailable => MAX_AUTOMATON_DISTANCE,
        };

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut absorb = |hits: Vec<(u8, String)>| {
            for (actual, term) in hits {
                if seen.insert(term.clone()) {
                    out.push((term, actual));
                }
            }
        };
        absorb(self.mutable.dictionary().search(&self.automata, distance, &normalized));
        for (_, segment) in &self.segments {
            absorb(segment.dictionary().search(&self.automata, distance, &normalized));
        }
        out
    }

    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let parsed = parser::parse(query)?;
        debug!(terms = parsed.terms.len(), slop = ?parsed.slop, "parsed query");

        let corpus = CorpusStats {
            live_doc_count: self.live_doc_count(),
            avg_doc_len: self.avg_doc_len(),
        };
        if corpus.live_doc_count == 0 {
            return Ok(Vec::new());
        }

        // Materialize owned posting lists per expanded (term, source) pair
        // before building `Bundle`s, since `Variant` borrows into them.
        let mut token_sources = Vec::with_capacity(parsed.terms.len());
        for term in &parsed.terms {
            let expanded = self.expand_term(&term.word, term.fuzziness);
            let mut sources = Vec::new();
            for (expanded_term, distance) in &expanded {
                if let Some(list) = self.mutable.posting_list(expanded_term) {
                    if !list.is_empty() {
                        sources.push((expanded_term.clone(), *distance, list));
                    }
                }
                for (_, segment) in &self.segments {
                    if let Some(list) = segment.posting_list(expanded_term) {
                        if !list.is_empty() {
                            sources.push((expanded_term.clone(), *distance, list));
                        }
                    }
                }
            }
            if sources.is_empty() {
                // A conjunctive query with one unmatched token has no results.
                return Ok(Vec::new());
            }
            token_sources.push(sources);
        }

        let bundles: Vec<Bundle> = token_sources
            .iter()
            .map(|sources| {
                Bundle::new(
                    sources
                        .iter()
                        .map(|(term, distance, list)| Variant {
                            term: term.clone(),
                            fuzzy_distance: *distance,
                            postings: list,
                        })
                        .collect(),
                )
            })
            .collect();

        let scorer = BM25Scorer::default();
        let mut topk = TopK::new(if top_k == 0 { None } else { Some(top_k) });
        let mut candidate_count = 0u64;
        let mut skipped_by_bound = 0u64;

        for candidate in Intersection::new(bundles) {
            candidate_count += 1;
            let Some((_, doc_len)) = self.lookup(candidate.doc_id) else {
                continue;
            };

            // Top-k early exit (§4.9): once the heap is full, a candidate
            // whose best-possible score (the per-token-group max upper
            // bound, summed) can't beat the current floor is skipped
            // before paying for window enumeration and scoring.
            if let Some(min_score) = topk.min_score() {
                let bound: f64 = candidate
                    .groups
                    .iter()
                    .map(|group| {
                        group
                            .iter()
                            .map(|entry| scorer.upper_bound(entry, doc_len, &corpus))
                            .fold(0.0, f64::max)
                    })
                    .sum();
                if bound <= min_score {
                    skipped_by_bound += 1;
                    continue;
                }
            }

            let windows = match_windows(&candidate.groups, parsed.slop);
            if windows.is_empty() {
                continue;
            }
            let score = scorer.document_score(&candidate.groups, &windows, doc_len, &corpus);
            topk.offer(candidate.doc_id, score);
        }
        debug!(candidates = candidate_count, skipped_by_bound, "intersection driver candidates");

        let mut results = Vec::new();
        for scored in topk.into_sorted() {
            if let Some((content, length)) = self.lookup(scored.doc_id) {
                results.push(SearchResult {
                    doc_id: scored.doc_id,
                    document: DocumentView { content: content.to_string(), length },
                    score: scored.score,
                });
            }
        }
        Ok(results)
    }

    pub fn flush(&mut self) -> Result<()> {
        if self.mutable.is_empty() {
            return Ok(());
        }

        let id = self.meta.next_segment_id;
        let path = self.storage.segment_path(id);
        segment::flush(&path, &self.mutable, self.meta.compression)
            .map_err(|e| Error::new(ErrorKind::IndexFlush, e.context))?;
        let loaded = segment::load(&path).map_err(|e| Error::new(ErrorKind::IndexFlush, e.context))?;

        self.meta.segments.push(id);
        self.meta.next_segment_id += 1;
        persist_meta(&self.storage.meta_path(), &self.meta)
            .map_err(|e| Error::new(ErrorKind::IndexFlush, e.context))?;

        self.wal
            .truncate(&self.storage.wal_path())
            .map_err(|e| Error::new(ErrorKind::IndexFlush, e.context))?;

        self.segments.push((id, loaded));
        self.mutable = MutableSegment::new();
        info!(segment_id = id, "flush completed");
        Ok(())
    }

    /// Seals the mutable segment, then folds every on-disk segment into
    /// one, physically dropping tombstoned documents for good (§4.10, S7).
    pub fn merge(&mut self) -> Result<()> {
        self.flush()?;
        if self.segments.len() <= 1 {
            return Ok(());
        }

        let refs: Vec<&Segment> = self.segments.iter().map(|(_, s)| s).collect();
        let new_id = self.meta.next_segment_id;
        let out_path = self.storage.segment_path(new_id);
        merge::merge(&refs, &out_path, self.meta.compression)?;
        let merged = segment::load(&out_path)?;

        let old_paths: Vec<PathBuf> = self.segments.iter().map(|(id, _)| self.storage.segment_path(*id)).collect();

        self.meta.segments = vec![new_id];
        self.meta.next_segment_id += 1;
        persist_meta(&self.storage.meta_path(), &self.meta)?;

        let old_refs: Vec<&std::path::Path> = old_paths.iter().map(PathBuf::as_path).collect();
        if let Err(e) = merge::remove_inputs(&old_refs) {
            warn!(error = %e, "failed to remove superseded segment files after merge");
        }

        self.segments = vec![(new_id, merged)];
        info!(segment_id = new_id, "merge completed");
        Ok(())
    }

    /// Runs `f` against this index, then flushes unconditionally on scope
    /// exit — even if `f` returned an error. `f`'s error always takes
    /// priority; a flush failure is only surfaced when `f` itself
    /// succeeded (§4.6).
    pub fn session<F, T>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Index) -> Result<T>,
    {
        let outcome = f(self);
        let flushed = self.flush();
        match (outcome, flushed) {
            (Ok(value), Ok(())) => Ok(value),
            (Err(e), _) => Err(e),
            (Ok(_), Err(e)) => Err(Error::new(
                ErrorKind::IndexSession,
                format!("flush on session exit failed: {e}"),
            )),
        }
    }
}
