//! Plain-text tables for query results.

use crate::db::models::{CorpusStats, StoredTune};
use std::io::{self, Write};

/// A column of the tune table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Title,
    AltTitle,
    Book,
    Reference,
    TuneType,
    Key,
}

impl Column {
    fn header(self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::AltTitle => "Also known as",
            Self::Book => "Book",
            Self::Reference => "X",
            Self::TuneType => "Type",
            Self::Key => "Key",
        }
    }

    fn width(self) -> usize {
        match self {
            Self::Title => 32,
            Self::AltTitle => 24,
            Self::Book => 6,
            Self::Reference => 6,
            Self::TuneType => 14,
            Self::Key => 10,
        }
    }

    fn value(self, t: &StoredTune) -> &str {
        match self {
            Self::Title => &t.tune.title,
            Self::AltTitle => &t.tune.alt_title,
            Self::Book => &t.tune.book_number,
            Self::Reference => &t.tune.reference,
            Self::TuneType => &t.tune.rhythm,
            Self::Key => &t.tune.key,
        }
    }
}

/// Columns shown by the listing.
pub const LIST_COLUMNS: &[Column] = &[Column::Title, Column::Book, Column::TuneType, Column::Key];
/// Title search also shows the second title.
pub const SEARCH_COLUMNS: &[Column] = &[
    Column::Title,
    Column::AltTitle,
    Column::Book,
    Column::TuneType,
    Column::Key,
];
/// Book filter: the book is already known.
pub const BOOK_COLUMNS: &[Column] = &[Column::Title, Column::Reference, Column::TuneType, Column::Key];
/// Type filter.
pub const TYPE_COLUMNS: &[Column] = &[Column::Title, Column::Book, Column::Key];
/// Key filter.
pub const KEY_COLUMNS: &[Column] = &[Column::Title, Column::Book, Column::TuneType];

/// Write a table of tunes with the given columns.
pub fn write_tune_table<W: Write>(out: &mut W, tunes: &[StoredTune], columns: &[Column]) -> io::Result<()> {
    let header: Vec<String> = columns
        .iter()
        .map(|c| format!("{:<width$}", c.header(), width = c.width()))
        .collect();
    writeln!(out, "{}", header.join(" ").trim_end())?;

    let total_width: usize = columns.iter().map(|c| c.width()).sum::<usize>() + columns.len().saturating_sub(1);
    writeln!(out, "{}", "-".repeat(total_width))?;

    for t in tunes {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| format!("{:<width$}", truncate(c.value(t), c.width()), width = c.width()))
            .collect();
        writeln!(out, "{}", cells.join(" ").trim_end())?;
    }
    Ok(())
}

/// Write corpus statistics.
pub fn write_stats<W: Write>(out: &mut W, stats: &CorpusStats) -> io::Result<()> {
    writeln!(out, "Corpus Statistics")?;
    writeln!(out, "=================")?;
    writeln!(out, "Total tunes:  {}", stats.total_tunes)?;
    writeln!(out, "Books:        {}", stats.book_count)?;

    if !stats.books.is_empty() {
        writeln!(out)?;
        writeln!(out, "Tunes per book:")?;
        for (book, count) in &stats.books {
            writeln!(out, "  {:<8} {}", book, count)?;
        }
    }

    if !stats.tune_types.is_empty() {
        writeln!(out)?;
        writeln!(out, "Tune types:")?;
        for (tune_type, count) in &stats.tune_types {
            writeln!(out, "  {:<20} {}", truncate(tune_type, 20), count)?;
        }
    }

    if !stats.keys.is_empty() {
        writeln!(out)?;
        writeln!(out, "Keys:")?;
        for (key, count) in &stats.keys {
            writeln!(out, "  {:<20} {}", truncate(key, 20), count)?;
        }
    }
    Ok(())
}

/// Shorten to at most `width` characters, ending in "..." when cut.
fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let keep = width.saturating_sub(3);
    let mut cut: String = s.chars().take(keep).collect();
    cut.push_str("...");
    cut
}
