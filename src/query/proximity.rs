use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::query::intersection::MatchEntry;

struct HeapEntry {
    position: u32,
    cursor: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    // Reversed so `BinaryHeap` (a max-heap) behaves as a min-heap on position.
    fn cmp(&self, other: &Self) -> Ordering {
        other.position.cmp(&self.position)
    }
}

/// A merge of a token group's variant position lists, deduplicated on
/// value, via a min-heap (§4.8). Yields `(position, entry_index)` so the
/// caller can trace a matched position back to the variant that produced
/// it — `entry_index` indexes into the `group` slice passed to `new`.
pub struct TokensIterator<'a> {
    cursors: Vec<&'a [u32]>,
    idxs: Vec<usize>,
    heap: BinaryHeap<HeapEntry>,
}

impl<'a> TokensIterator<'a> {
    pub fn new(group: &'a [MatchEntry]) -> Self {
        let cursors: Vec<&[u32]> = group.iter().map(|e| e.positions.as_slice()).collect();
        let idxs = vec![0usize; cursors.len()];
        let mut heap = BinaryHeap::new();
        for (cursor, positions) in cursors.iter().enumerate() {
            if let Some(&position) = positions.first() {
                heap.push(HeapEntry { position, cursor });
            }
        }
        TokensIterator { cursors, idxs, heap }
    }

    pub fn peek(&self) -> Option<(u32, usize)> {
        self.heap.peek().map(|e| (e.position, e.cursor))
    }

    pub fn next(&mut self) -> Option<(u32, usize)> {
        let (min, source) = self.peek()?;
        while let Some(top) = self.heap.peek() {
            if top.position != min {
                break;
            }
            let top = self.heap.pop().unwrap();
            self.idxs[top.cursor] += 1;
            if let Some(&position) = self.cursors[top.cursor].get(self.idxs[top.cursor]) {
                self.heap.push(HeapEntry { position, cursor: top.cursor });
            }
        }
        Some((min, source))
    }

    /// Advance to the smallest position strictly greater than `target`.
    pub fn closest(&mut self, target: u32) -> Option<(u32, usize)> {
        loop {
            let (v, source) = self.peek()?;
            if v > target {
                return Some((v, source));
            }
            self.next();
        }
    }
}

/// One valid placement of the K query tokens in a document. `sources[i]`
/// indexes into `groups[i]`, identifying which variant's posting produced
/// `positions[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProximityMatch {
    pub positions: Vec<u32>,
    pub sources: Vec<usize>,
    pub total_slop: u32,
}

fn slop_between(p: u32, q: u32) -> u32 {
    (p as i64 - (q as i64 - 1)).unsigned_abs() as u32
}

/// Greedy left-anchored scan (§4.8). `slop_bound = None` means unbounded
/// (the bare-query proximity-unconstrained case).
pub fn match_windows(groups: &[Vec<MatchEntry>], slop_bound: Option<u32>) -> Vec<ProximityMatch> {
    let k = groups.len();
    if k == 0 {
        return Vec::new();
    }

    let mut iters: Vec<TokensIterator> = groups.iter().map(|g| TokensIterator::new(g)).collect();

    let mut window = Vec::with_capacity(k);
    let mut sources = vec![0usize; k];
    for (slot, it) in iters.iter().enumerate() {
        match it.peek() {
            Some((p, src)) => {
                window.push(p);
                sources[slot] = src;
            }
            None => return Vec::new(),
        }
    }
    let mut slops = vec![0u32; k];
    let mut results = Vec::new();

    loop {
        let mut i = 1usize;
        let mut exhausted = false;
        while i <= k - 1 {
            let (v, src) = match iters[i].closest(window[i - 1]) {
                Some(pair) => pair,
                None => {
                    exhausted = true;
                    break;
                }
            };
            window[i] = v;
            sources[i] = src;
            let s = slops[i - 1] + slop_between(window[i - 1], window[i]);
            if let Some(bound) = slop_bound {
                if s > bound {
                    break;
                }
            }
            slops[i] = s;
            i += 1;
        }
        if exhausted {
            break;
        }
        if i > k - 1 {
            results.push(ProximityMatch {
                positions: window.clone(),
                sources: sources.clone(),
                total_slop: if k > 1 { slops[k - 1] } else { 0 },
            });
        }
        match iters[0].next() {
            Some((v, src)) => {
                window[0] = v;
                sources[0] = src;
            }
            None => break,
        }
    }

    results
}
