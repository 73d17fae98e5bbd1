use crate::core::types::DocId;
use crate::index::posting::PostingList;

/// One indexed term and its posting list, standing in for a query token's
/// fuzzy-expansion variant (§4.7).
pub struct Variant<'a> {
    pub term: String,
    pub fuzzy_distance: u8,
    pub postings: &'a PostingList,
}

/// A single variant's contribution to a candidate document: enough for the
/// proximity matcher (positions) and the scorer (term, tf, distance) to do
/// their work without reaching back into the posting lists.
#[derive(Debug, Clone)]
pub struct MatchEntry {
    pub doc_id: DocId,
    pub variant_term: String,
    pub fuzzy_distance: u8,
    pub term_freq: u32,
    pub doc_freq: u32,
    pub positions: Vec<u32>,
}

/// All variants sharing one query-token position, advanced together.
pub struct Bundle<'a> {
    variants: Vec<Variant<'a>>,
    cursors: Vec<usize>,
}

impl<'a> Bundle<'a> {
    pub fn new(variants: Vec<Variant<'a>>) -> Self {
        let cursors = vec![0; variants.len()];
        Bundle { variants, cursors }
    }

    fn doc_id_at(&self, vi: usize) -> Option<DocId> {
        self.variants[vi]
            .postings
            .get(self.cursors[vi])
            .map(|p| p.doc_id)
    }

    pub fn current_min(&self) -> Option<DocId> {
        (0..self.variants.len()).filter_map(|vi| self.doc_id_at(vi)).min()
    }

    /// Advance past the current minimum doc_id, returning it along with
    /// every variant entry that shared it.
    pub fn next_doc_index(&mut self) -> Option<(DocId, Vec<MatchEntry>)> {
        let target = self.current_min()?;
        let mut group = Vec::new();
        for vi in 0..self.variants.len() {
            if self.doc_id_at(vi) == Some(target) {
                let posting = self.variants[vi].postings.get(self.cursors[vi]).unwrap();
                group.push(MatchEntry {
                    doc_id: target,
                    variant_term: self.variants[vi].term.clone(),
                    fuzzy_distance: self.variants[vi].fuzzy_distance,
                    term_freq: posting.term_freq,
                    doc_freq: self.variants[vi].postings.doc_freq(),
                    positions: posting.positions.clone(),
                });
                self.cursors[vi] += 1;
            }
        }
        Some((target, group))
    }

    /// Binary-search every variant's posting list to the first doc_id >=
    /// target, then behave like `next_doc_index`.
    pub fn geq_doc_index(&mut self, target: DocId) -> Option<(DocId, Vec<MatchEntry>)> {
        for vi in 0..self.variants.len() {
            let skip = self.variants[vi].postings.skip_to(target);
            self.cursors[vi] = self.cursors[vi].max(skip);
        }
        self.next_doc_index()
    }
}

/// A candidate document: the doc_id plus one token group per query
/// position, ready for the proximity matcher.
pub struct Candidate {
    pub doc_id: DocId,
    pub groups: Vec<Vec<MatchEntry>>,
}

/// Streams candidate doc_ids in ascending order: documents containing at
/// least one variant for every query token (§4.7).
pub struct Intersection<'a> {
    bundles: Vec<Bundle<'a>>,
}

impl<'a> Intersection<'a> {
    pub fn new(bundles: Vec<Bundle<'a>>) -> Self {
        Intersection { bundles }
    }
}

impl<'a> Iterator for Intersection<'a> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        loop {
            let mut target: Option<DocId> = None;
            for bundle in &self.bundles {
                let d = bundle.current_min()?;
                target = Some(target.map_or(d, |t| t.max(d)));
            }
            let target = target?;

            if self.bundles.iter().all(|b| b.current_min() == Some(target)) {
                let groups = self
                    .bundles
                    .iter_mut()
                    .map(|b| b.next_doc_index().expect("bundle agreed on target").1)
                    .collect();
                return Some(Candidate { doc_id: target, groups });
            }

            for bundle in self.bundles.iter_mut() {
                if bundle.current_min() != Some(target) {
                    bundle.geq_doc_index(target);
                }
            }
        }
    }
}
