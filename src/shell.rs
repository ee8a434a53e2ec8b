//! Interactive text menu over the tune database.
//!
//! Generic over input and output so the whole dialogue can be scripted in
//! tests. Errors from a single menu action are printed and the menu carries on.

use crate::db::models::{StoredTune, TuneFilter};
use crate::db::Database;
use crate::display::{self, Column};
use crate::{loader, scanner};
use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Settings the menu needs from config/CLI.
#[derive(Debug, Clone)]
pub struct ShellOptions {
    pub abc_root: PathBuf,
    pub workers: usize,
    pub list_limit: usize,
    pub filter_limit: usize,
}

pub struct QueryShell<'a, R, W> {
    db: &'a Database,
    opts: ShellOptions,
    input: R,
    out: W,
}

impl<'a, R: BufRead, W: Write> QueryShell<'a, R, W> {
    pub fn new(db: &'a Database, opts: ShellOptions, input: R, out: W) -> Self {
        Self { db, opts, input, out }
    }

    /// Run until the user picks 0 or input ends.
    pub fn run(&mut self) -> Result<()> {
        let rule = "=".repeat(50);
        writeln!(self.out, "{rule}")?;
        writeln!(self.out, "ABC TUNE BOOK DATABASE")?;
        writeln!(self.out, "{rule}")?;

        loop {
            self.print_menu()?;
            let Some(choice) = self.prompt("\nEnter choice: ")? else {
                writeln!(self.out)?;
                break;
            };

            let action = match choice.as_str() {
                "0" => break,
                "1" => self.load_files(),
                "2" => self.view_first(),
                "3" => self.search_by_title(),
                "4" => self.filter_by_book(),
                "5" => self.filter_by_type(),
                "6" => self.filter_by_key(),
                "7" => self.show_stats(),
                _ => {
                    writeln!(self.out, "Invalid choice")?;
                    Ok(())
                }
            };

            if let Err(e) = action {
                log::debug!("Menu action failed: {e:?}");
                writeln!(self.out, "Error: {e:#}")?;
            }
        }

        writeln!(self.out, "Goodbye!")?;
        self.out.flush()?;
        Ok(())
    }

    fn print_menu(&mut self) -> Result<()> {
        let rule = "=".repeat(50);
        writeln!(self.out, "\n{rule}")?;
        writeln!(self.out, "ABC TUNE BOOK MENU")?;
        writeln!(self.out, "{rule}")?;
        writeln!(self.out, "1. Load ABC files into database")?;
        writeln!(self.out, "2. View the first {} tunes", self.opts.list_limit)?;
        writeln!(self.out, "3. Search by title")?;
        writeln!(self.out, "4. Filter by book number")?;
        writeln!(self.out, "5. Filter by tune type")?;
        writeln!(self.out, "6. Filter by key")?;
        writeln!(self.out, "7. Show statistics")?;
        writeln!(self.out, "0. Exit")?;
        writeln!(self.out, "{rule}")?;
        Ok(())
    }

    /// Print `message`, read one line. `None` at end of input.
    fn prompt(&mut self, message: &str) -> Result<Option<String>> {
        write!(self.out, "{message}")?;
        self.out.flush()?;

        let mut line = String::new();
        let n = self
            .input
            .read_line(&mut line)
            .context("Failed to read input")?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn load_files(&mut self) -> Result<()> {
        let root = self.opts.abc_root.clone();
        writeln!(self.out, "\nLoading ABC files from {}...", root.display())?;

        let files = scanner::discover(&root)?;
        if files.is_empty() {
            writeln!(self.out, "No files found!")?;
            return Ok(());
        }
        writeln!(self.out, "Found {} files", files.len())?;

        let batch = loader::parse_batch(&files, self.opts.workers, None)?;
        for failure in &batch.failures {
            writeln!(self.out, "  Skipped {}: {}", failure.file.path.display(), failure.error)?;
        }
        writeln!(self.out, "Total tunes parsed: {}", batch.records.len())?;
        if batch.records.is_empty() {
            return Ok(());
        }

        let clear = self
            .prompt("\nClear existing data first? (y/n): ")?
            .is_some_and(|answer| answer.eq_ignore_ascii_case("y"));

        let result = loader::persist(self.db, &batch, clear)?;
        if clear {
            writeln!(self.out, "Cleared {} existing tunes", result.cleared)?;
        }
        writeln!(
            self.out,
            "Inserted {} tunes into database ({} failed)",
            result.tunes_inserted, result.insert_errors
        )?;
        Ok(())
    }

    fn view_first(&mut self) -> Result<()> {
        let total = self.db.count_tunes()?;
        if total == 0 {
            return self.print_empty_hint();
        }
        let tunes = self
            .db
            .query_tunes(&TuneFilter::All, Some(self.opts.list_limit))?;

        writeln!(self.out, "\nTotal tunes: {total}")?;
        writeln!(self.out, "\nFirst {} tunes:", tunes.len())?;
        display::write_tune_table(&mut self.out, &tunes, display::LIST_COLUMNS)?;
        Ok(())
    }

    fn search_by_title(&mut self) -> Result<()> {
        let Some(needle) = self.ask_if_loaded("\nEnter title to search: ")? else {
            return Ok(());
        };
        let tunes = self.db.query_tunes(&TuneFilter::TitleContains(needle), None)?;
        writeln!(self.out, "\nFound {} results:", tunes.len())?;
        self.print_results(&tunes, display::SEARCH_COLUMNS)
    }

    fn filter_by_book(&mut self) -> Result<()> {
        let Some(book) = self.ask_if_loaded("\nEnter book number: ")? else {
            return Ok(());
        };
        let tunes = self
            .db
            .query_tunes(&TuneFilter::Book(book.clone()), Some(self.opts.filter_limit))?;
        writeln!(self.out, "\nFound {} tunes in book {}:", tunes.len(), book)?;
        self.print_results(&tunes, display::BOOK_COLUMNS)
    }

    fn filter_by_type(&mut self) -> Result<()> {
        let Some(tune_type) = self.ask_if_loaded("\nEnter tune type (e.g., jig, reel): ")? else {
            return Ok(());
        };
        let tunes = self
            .db
            .query_tunes(&TuneFilter::TypeContains(tune_type), Some(self.opts.filter_limit))?;
        writeln!(self.out, "\nFound {} tunes:", tunes.len())?;
        self.print_results(&tunes, display::TYPE_COLUMNS)
    }

    fn filter_by_key(&mut self) -> Result<()> {
        let Some(key) = self.ask_if_loaded("\nEnter key (e.g., G, D, A): ")? else {
            return Ok(());
        };
        let tunes = self
            .db
            .query_tunes(&TuneFilter::KeyContains(key), Some(self.opts.filter_limit))?;
        writeln!(self.out, "\nFound {} tunes:", tunes.len())?;
        self.print_results(&tunes, display::KEY_COLUMNS)
    }

    fn show_stats(&mut self) -> Result<()> {
        let stats = self.db.stats()?;
        writeln!(self.out)?;
        display::write_stats(&mut self.out, &stats)?;
        Ok(())
    }

    /// Prompt for a search term, unless the database is empty.
    fn ask_if_loaded(&mut self, message: &str) -> Result<Option<String>> {
        if self.db.count_tunes()? == 0 {
            self.print_empty_hint()?;
            return Ok(None);
        }
        self.prompt(message)
    }

    fn print_empty_hint(&mut self) -> Result<()> {
        writeln!(self.out, "No tunes in the database. Load ABC files first (option 1).")?;
        Ok(())
    }

    fn print_results(&mut self, tunes: &[StoredTune], columns: &[Column]) -> Result<()> {
        if !tunes.is_empty() {
            display::write_tune_table(&mut self.out, tunes, columns)?;
        }
        Ok(())
    }
}
