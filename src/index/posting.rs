use crate::core::types::DocId;

/// A single term's occurrence within one document.
#[derive(Debug, Clone)]
pub struct Posting {
    pub doc_id: DocId,
    pub term_freq: u32,
    /// Strictly increasing 0-based token positions.
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn new(doc_id: DocId, positions: Vec<u32>) -> Self {
        let term_freq = positions.len() as u32;
        Posting {
            doc_id,
            term_freq,
            positions,
        }
    }
}

/// Sequence of postings for one term, sorted by `doc_id` (§3 invariant).
#[derive(Debug, Clone, Default)]
pub struct PostingList {
    postings: Vec<Posting>,
}

impl PostingList {
    pub fn new(postings: Vec<Posting>) -> Self {
        debug_assert!(
            postings.windows(2).all(|w| w[0].doc_id < w[1].doc_id),
            "posting list must be strictly sorted by doc_id"
        );
        PostingList { postings }
    }

    pub fn postings(&self) -> &[Posting] {
        &self.postings
    }

    pub fn doc_freq(&self) -> u32 {
        self.postings.len() as u32
    }

    pub fn total_freq(&self) -> u64 {
        self.postings.iter().map(|p| p.term_freq as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn get(&self, index: usize) -> Option<&Posting> {
        self.postings.get(index)
    }

    /// `bisect_left`: first index whose doc_id is >= target.
    pub fn skip_to(&self, target: DocId) -> usize {
        self.postings.partition_point(|p| p.doc_id < target)
    }

    pub fn find_doc(&self, target: DocId) -> Option<usize> {
        self.postings.binary_search_by_key(&target, |p| p.doc_id).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting(id: u128, positions: &[u32]) -> Posting {
        Posting::new(DocId(id), positions.to_vec())
    }

    #[test]
    fn skip_to_finds_first_doc_id_geq_target() {
        let list = PostingList::new(vec![
            posting(1, &[0]),
            posting(5, &[1]),
            posting(9, &[2]),
        ]);
        assert_eq!(list.skip_to(DocId(5)), 1);
        assert_eq!(list.skip_to(DocId(6)), 2);
        assert_eq!(list.skip_to(DocId(100)), 3);
        assert_eq!(list.skip_to(DocId(0)), 0);
    }

    #[test]
    fn find_doc_binary_searches() {
        let list = PostingList::new(vec![posting(1, &[0]), posting(5, &[1])]);
        assert_eq!(list.find_doc(DocId(5)), Some(1));
        assert_eq!(list.find_doc(DocId(2)), None);
    }
}
