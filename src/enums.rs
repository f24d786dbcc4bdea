/// Which measure drives the pairwise analysis between group
/// representatives.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DistanceKind {
    /// Weighted normalized edit distance over the configured fields.
    #[default]
    Levenshtein,
    /// All-or-nothing equality over the configured fields.
    Exact,
}
