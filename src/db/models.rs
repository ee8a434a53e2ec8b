use crate::parser::TuneRecord;
use serde::Serialize;

/// A tune row read back from the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredTune {
    pub id: i64,
    #[serde(flatten)]
    pub tune: TuneRecord,
    pub loaded_at: String,
}

/// Which rows a query should return.
///
/// Substring filters are case-insensitive (ASCII) and treat the user's text
/// literally, including `%` and `_`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TuneFilter {
    All,
    TitleContains(String),
    /// Exact match on the book identifier.
    Book(String),
    TypeContains(String),
    KeyContains(String),
}

/// Result of a bulk insert.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    pub inserted: u64,
    pub failed: u64,
}

/// Corpus statistics.
#[derive(Debug, Serialize)]
pub struct CorpusStats {
    pub total_tunes: i64,
    pub book_count: i64,
    pub books: Vec<(String, i64)>,
    pub tune_types: Vec<(String, i64)>,
    pub keys: Vec<(String, i64)>,
}
