use std::collections::BTreeMap;

use levenshtein_automata::{Distance, LevenshteinAutomatonBuilder, DFA};
use serde::{Deserialize, Serialize};

/// The highest edit distance a precompiled automaton supports (§4.4).
pub const MAX_AUTOMATON_DISTANCE: u8 = 3;

/// One `LevenshteinAutomatonBuilder` per supported distance, built once and
/// reused across every `search` call — building the builder itself is the
/// expensive part; `build_dfa` against a specific query term is cheap.
pub struct AutomatonSet {
    builders: [LevenshteinAutomatonBuilder; (MAX_AUTOMATON_DISTANCE + 1) as usize],
}

impl AutomatonSet {
    pub fn new() -> Self {
        AutomatonSet {
            builders: [
                LevenshteinAutomatonBuilder::new(0, false),
                LevenshteinAutomatonBuilder::new(1, false),
                LevenshteinAutomatonBuilder::new(2, false),
                LevenshteinAutomatonBuilder::new(3, false),
            ],
        }
    }

    fn build_dfa(&self, distance: u8, query: &str) -> Option<DFA> {
        self.builders
            .get(distance as usize)
            .map(|b| b.build_dfa(query))
    }
}

impl Default for AutomatonSet {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize, Deserialize)]
struct TrieNode {
    children: BTreeMap<u8, usize>,
    is_term: bool,
}

/// A trie over UTF-8 bytes holding the set of indexed terms. Insert is
/// idempotent; `search` expands a query within a bounded edit distance by
/// walking the trie and a Levenshtein DFA in lockstep, pruning subtrees the
/// DFA has already proven dead.
#[derive(Serialize, Deserialize)]
pub struct Trie {
    nodes: Vec<TrieNode>,
}

impl Trie {
    pub fn new() -> Self {
        Trie {
            nodes: vec![TrieNode {
                children: BTreeMap::new(),
                is_term: false,
            }],
        }
    }

    pub fn insert(&mut self, term: &str) {
        let mut node = 0usize;
        for &b in term.as_bytes() {
            node = match self.nodes[node].children.get(&b) {
                Some(&next) => next,
                None => {
                    self.nodes.push(TrieNode {
                        children: BTreeMap::new(),
                        is_term: false,
                    });
                    let new_idx = self.nodes.len() - 1;
                    self.nodes[node].children.insert(b, new_idx);
                    new_idx
                }
            };
        }
        self.nodes[node].is_term = true;
    }

    pub fn contains(&self, term: &str) -> bool {
        let mut node = 0usize;
        for &b in term.as_bytes() {
            match self.nodes[node].children.get(&b) {
                Some(&next) => node = next,
                None => return false,
            }
        }
        self.nodes[node].is_term
    }

    /// All terms currently stored, in trie (lexicographic byte) order.
    pub fn terms(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut buf = Vec::new();
        self.collect_terms(0, &mut buf, &mut out);
        out
    }

    fn collect_terms(&self, node: usize, buf: &mut Vec<u8>, out: &mut Vec<String>) {
        if self.nodes[node].is_term {
            out.push(String::from_utf8(buf.clone()).expect("trie only holds valid utf-8 terms"));
        }
        for (&b, &child) in &self.nodes[node].children {
            buf.push(b);
            self.collect_terms(child, buf, out);
            buf.pop();
        }
    }

    /// `search(d, q)`: returns `{(actual_distance, term) : edit(term, q) <= d}`,
    /// after applying the §4.4 short-word guard. `d` must be `<=
    /// MAX_AUTOMATON_DISTANCE`, checked by the query layer before this is
    /// called (§4.3's `InvalidQuery`).
    pub fn search(&self, automata: &AutomatonSet, distance: u8, query: &str) -> Vec<(u8, String)> {
        let Some(dfa) = automata.build_dfa(distance, query) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut buf = Vec::new();
        self.walk(0, dfa.initial_state(), &dfa, distance, query, &mut buf, &mut out);
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn walk(
        &self,
        node: usize,
        state: u32,
        dfa: &DFA,
        distance: u8,
        query: &str,
        buf: &mut Vec<u8>,
        out: &mut Vec<(u8, String)>,
    ) {
        if self.nodes[node].is_term {
            if let Distance::Exact(actual) = dfa.distance(state) {
                if actual <= distance {
                    let term =
                        String::from_utf8(buf.clone()).expect("trie only holds valid utf-8 terms");
                    if term == query
                        || (term.len() > distance as usize && query.len() > distance as usize)
                    {
                        out.push((actual, term));
                    }
                }
            }
        }

        for (&b, &child) in &self.nodes[node].children {
            let next_state = dfa.transition(state, b);
            // A DFA state beyond the compiled distance can never recover:
            // the automaton's sink state is absorbing by construction.
            if matches!(dfa.distance(next_state), Distance::AtLeast(_)) {
                continue;
            }
            buf.push(b);
            self.walk(child, next_state, dfa, distance, query, buf, out);
            buf.pop();
        }
    }
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}
