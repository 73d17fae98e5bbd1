use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::core::types::DocId;
use crate::query::intersection::MatchEntry;
use crate::query::proximity::ProximityMatch;

/// Okapi BM25 with the fuzzy/slop penalties from §4.9. The constants are
/// fixed, not tunable — there is exactly one scoring policy callers get.
pub struct BM25Scorer {
    k1: f64,
    b: f64,
    eps: f64,
    phi: f64,
}

impl Default for BM25Scorer {
    fn default() -> Self {
        BM25Scorer { k1: 1.5, b: 0.75, eps: 0.5, phi: 0.8 }
    }
}

/// Corpus-wide quantities a scorer needs that no single posting carries.
#[derive(Debug, Clone, Copy)]
pub struct CorpusStats {
    pub live_doc_count: u64,
    pub avg_doc_len: f64,
}

impl BM25Scorer {
    pub fn idf(&self, n: u64, df: u32) -> f64 {
        let n = n as f64;
        let df = df as f64;
        (((n - df + self.eps) / (df + self.eps)) + 1.0).ln()
    }

    fn norm(&self, idf: f64, tf: u32, doc_len: u32, avg_doc_len: f64) -> f64 {
        let tf = tf as f64;
        let doc_len = doc_len as f64;
        idf * tf * (self.k1 + 1.0)
            / (tf + self.k1 * (1.0 - self.b + self.b * doc_len / avg_doc_len))
    }

    /// The best-case contribution a single variant entry could make to any
    /// window score: its norm at distance-0 slop (divisor 1). Used for the
    /// top-k early-exit shortcut (§4.9) — an upper bound, not an actual
    /// window score.
    pub fn upper_bound(&self, entry: &MatchEntry, doc_len: u32, corpus: &CorpusStats) -> f64 {
        let idf = self.idf(corpus.live_doc_count, entry.doc_freq);
        self.norm(idf, entry.term_freq, doc_len, corpus.avg_doc_len)
            * self.phi.powi(entry.fuzzy_distance as i32)
    }

    /// Score one emitted window: the sum of each matched token's norm
    /// (scaled by its fuzzy penalty), divided by `slop + 1`.
    pub fn window_score(
        &self,
        groups: &[Vec<MatchEntry>],
        window: &ProximityMatch,
        doc_len: u32,
        corpus: &CorpusStats,
    ) -> f64 {
        let sum: f64 = window
            .sources
            .iter()
            .enumerate()
            .map(|(slot, &source)| {
                let entry = &groups[slot][source];
                let idf = self.idf(corpus.live_doc_count, entry.doc_freq);
                self.norm(idf, entry.term_freq, doc_len, corpus.avg_doc_len)
                    * self.phi.powi(entry.fuzzy_distance as i32)
            })
            .sum();
        sum / (window.total_slop as f64 + 1.0)
    }

    /// Document score: the max across every emitted window — multiple
    /// matches in one document do not stack.
    pub fn document_score(
        &self,
        groups: &[Vec<MatchEntry>],
        windows: &[ProximityMatch],
        doc_len: u32,
        corpus: &CorpusStats,
    ) -> f64 {
        windows
            .iter()
            .map(|w| self.window_score(groups, w, doc_len, corpus))
            .fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ScoreKey(f64);
impl Eq for ScoreKey {}
impl PartialOrd for ScoreKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ScoreKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScoredDoc {
    pub doc_id: DocId,
    pub score: f64,
}

/// A bounded min-heap of the best `capacity` scores seen so far. `capacity
/// = None` keeps everything offered (the `top_k == 0` case). Insertion
/// order is ascending doc_id (candidates arrive that way from the
/// intersection driver), which is also the tie-break rule (§4.9, §8 P7).
pub struct TopK {
    capacity: Option<usize>,
    heap: BinaryHeap<Reverse<(ScoreKey, u64, DocId)>>,
    next_seq: u64,
}

impl TopK {
    pub fn new(capacity: Option<usize>) -> Self {
        TopK { capacity, heap: BinaryHeap::new(), next_seq: 0 }
    }

    /// The score an incoming candidate must exceed to be worth scoring at
    /// all. `None` means "not full yet" or "unbounded" — no skip possible.
    pub fn min_score(&self) -> Option<f64> {
        match self.capacity {
            Some(cap) if cap > 0 && self.heap.len() >= cap => {
                self.heap.peek().map(|Reverse((ScoreKey(s), _, _))| *s)
            }
            _ => None,
        }
    }

    pub fn offer(&mut self, doc_id: DocId, score: f64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        match self.capacity {
            None => self.heap.push(Reverse((ScoreKey(score), seq, doc_id))),
            Some(0) => {}
            Some(cap) => {
                if self.heap.len() < cap {
                    self.heap.push(Reverse((ScoreKey(score), seq, doc_id)));
                } else if let Some(&Reverse((ScoreKey(min), _, _))) = self.heap.peek() {
                    if score > min {
                        self.heap.pop();
                        self.heap.push(Reverse((ScoreKey(score), seq, doc_id)));
                    }
                }
            }
        }
    }

    /// Final output: descending score, ties broken by ascending insertion
    /// order (equivalently ascending doc_id, per the driver's ordering
    /// guarantee).
    pub fn into_sorted(self) -> Vec<ScoredDoc> {
        let mut items: Vec<(ScoreKey, u64, DocId)> =
            self.heap.into_iter().map(|Reverse(t)| t).collect();
        items.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        items
            .into_iter()
            .map(|(ScoreKey(score), _, doc_id)| ScoredDoc { doc_id, score })
            .collect()
    }
}
