use super::models::{CorpusStats, InsertOutcome, StoredTune, TuneFilter};
use super::{Database, Result};
use crate::parser::TuneRecord;
use rusqlite::{params, params_from_iter, Row};

/// How many entries the type/key breakdowns in `stats` keep.
const STATS_TOP_N: usize = 15;

impl Database {
    /// Insert parsed tunes in a single transaction.
    ///
    /// A row that fails to insert is logged and counted; the rest still go in.
    pub fn insert_batch(&self, tunes: &[TuneRecord]) -> Result<InsertOutcome> {
        let mut outcome = InsertOutcome::default();
        if tunes.is_empty() {
            log::info!("No tunes to insert");
            return Ok(outcome);
        }

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO tunes (
                    book_number, tune_id, title, alt_title, tune_type, key_signature, notation
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for t in tunes {
                match stmt.execute(params![
                    t.book_number, t.reference, t.title, t.alt_title, t.rhythm, t.key, t.notes,
                ]) {
                    Ok(_) => outcome.inserted += 1,
                    Err(e) => {
                        log::warn!(
                            "Error inserting '{}' (book {}, X:{}): {}",
                            t.title, t.book_number, t.reference, e
                        );
                        outcome.failed += 1;
                    }
                }
            }
        }
        tx.commit()?;

        log::info!("Inserted {} tunes ({} failed)", outcome.inserted, outcome.failed);
        Ok(outcome)
    }

    /// Delete every tune. Returns the number of rows removed.
    pub fn clear_tunes(&self) -> Result<usize> {
        let removed = self.conn.execute("DELETE FROM tunes", [])?;
        log::info!("Cleared {removed} tunes");
        Ok(removed)
    }

    pub fn count_tunes(&self) -> Result<i64> {
        let n = self.conn.query_row("SELECT COUNT(*) FROM tunes", [], |row| row.get(0))?;
        Ok(n)
    }

    /// Fetch tunes matching `filter` in load order, optionally capped at `limit`.
    pub fn query_tunes(&self, filter: &TuneFilter, limit: Option<usize>) -> Result<Vec<StoredTune>> {
        let (clause, arg) = match filter {
            TuneFilter::All => ("", None),
            TuneFilter::TitleContains(s) => ("WHERE title LIKE ?1 ESCAPE '\\'", Some(like_pattern(s))),
            TuneFilter::Book(b) => ("WHERE book_number = ?1", Some(b.trim().to_string())),
            TuneFilter::TypeContains(s) => ("WHERE tune_type LIKE ?1 ESCAPE '\\'", Some(like_pattern(s))),
            TuneFilter::KeyContains(s) => ("WHERE key_signature LIKE ?1 ESCAPE '\\'", Some(like_pattern(s))),
        };
        let limit_sql = limit.map(|n| format!(" LIMIT {n}")).unwrap_or_default();

        let sql = format!(
            "SELECT id, book_number, tune_id, title, alt_title, tune_type, key_signature,
                    notation, loaded_at
             FROM tunes
             {clause}
             ORDER BY id{limit_sql}"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let tunes = stmt
            .query_map(params_from_iter(arg.iter()), row_to_stored_tune)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(tunes)
    }

    /// Corpus statistics: totals plus per-book, per-type and per-key counts.
    pub fn stats(&self) -> Result<CorpusStats> {
        let total_tunes = self.count_tunes()?;

        let book_count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT book_number) FROM tunes",
            [],
            |row| row.get(0),
        )?;

        let mut book_stmt = self.conn.prepare(
            "SELECT book_number, COUNT(*) FROM tunes
             GROUP BY book_number
             ORDER BY CAST(book_number AS INTEGER), book_number",
        )?;
        let books: Vec<(String, i64)> = book_stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let tune_types = self.top_values("tune_type")?;
        let keys = self.top_values("key_signature")?;

        Ok(CorpusStats {
            total_tunes,
            book_count,
            books,
            tune_types,
            keys,
        })
    }

    /// Most frequent non-empty values of a column, case-folded.
    fn top_values(&self, column: &str) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT lower({column}), COUNT(*) FROM tunes
             WHERE {column} != ''
             GROUP BY lower({column})
             ORDER BY COUNT(*) DESC, lower({column})
             LIMIT {STATS_TOP_N}"
        ))?;
        let values = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(values)
    }
}

fn row_to_stored_tune(row: &Row<'_>) -> rusqlite::Result<StoredTune> {
    Ok(StoredTune {
        id: row.get(0)?,
        tune: TuneRecord {
            book_number: row.get(1)?,
            reference: row.get(2)?,
            title: row.get(3)?,
            alt_title: row.get(4)?,
            rhythm: row.get(5)?,
            key: row.get(6)?,
            notes: row.get(7)?,
        },
        loaded_at: row.get(8)?,
    })
}

/// `%needle%` with LIKE wildcards in the needle escaped by `\`.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.trim().chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
