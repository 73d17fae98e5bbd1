/// A single query token's fuzziness, per §4.3:
///   - `word` (no `~`)  → `Exact`
///   - `word~N`         → `Distance(N)`
///   - `word~` (no N)   → `MaxAvailable`, the "use the highest compiled
///     automaton distance" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fuzziness {
    Exact,
    Distance(u8),
    MaxAvailable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryTerm {
    pub word: String,
    pub fuzziness: Fuzziness,
}

/// The total query: an ordered list of terms plus a slop bound. `slop =
/// None` means unbounded proximity — the behavior of a bare (unquoted)
/// query, equivalent to `phrase_slop` with `S = +∞` (§4.3).
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub terms: Vec<QueryTerm>,
    pub slop: Option<u32>,
}

impl Query {
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}
