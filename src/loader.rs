//! Batch loading: discover book files, parse them in parallel, store the tunes.
//!
//! Output order is discovery order, then file order, whatever order the
//! workers finish in. A file that can't be read is reported and skipped;
//! it never stops the batch.

use crate::db::{Database, DbError};
use crate::parser::{self, ParseError, TuneRecord};
use crate::scanner::{self, ScanError, SourceFile};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Discovery failed: {0}")]
    Scan(#[from] ScanError),
    #[error("Database error: {0}")]
    Db(#[from] DbError),
    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// A file that could not be parsed.
#[derive(Debug)]
pub struct FileFailure {
    pub file: SourceFile,
    pub error: ParseError,
}

/// Everything parsed from one batch of files.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub records: Vec<TuneRecord>,
    pub failures: Vec<FileFailure>,
    pub files_total: usize,
    pub files_parsed: usize,
    /// Files never started because the batch was cancelled.
    pub files_skipped: usize,
}

/// Options for [`load_books`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LoadOptions<'a> {
    /// Delete existing tunes before inserting (only if anything was parsed).
    pub clear_existing: bool,
    pub workers: usize,
    pub cancel: Option<&'a AtomicBool>,
}

/// Summary counts for one load run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadResult {
    pub files_found: usize,
    pub files_failed: usize,
    pub files_skipped: usize,
    pub tunes_parsed: usize,
    pub tunes_inserted: u64,
    pub insert_errors: u64,
    pub cleared: usize,
}

enum FileOutcome {
    Parsed(Vec<TuneRecord>),
    Failed(ParseError),
    Skipped,
}

/// Discover, parse and store every tune under `root`.
pub fn load_books(db: &Database, root: &Path, opts: &LoadOptions<'_>) -> Result<LoadResult, LoadError> {
    let files = scanner::discover(root)?;
    log::info!("Found {} files under {}", files.len(), root.display());

    let batch = parse_batch(&files, opts.workers, opts.cancel)?;
    persist(db, &batch, opts.clear_existing)
}

/// Parse `files` on a pool of `workers` threads.
///
/// If `cancel` is set while the batch runs, files not yet started are
/// skipped; tunes from files already parsed are kept.
pub fn parse_batch(
    files: &[SourceFile],
    workers: usize,
    cancel: Option<&AtomicBool>,
) -> Result<BatchOutcome, LoadError> {
    parse_batch_with(files, workers, cancel, parser::read_tune_file)
}

fn parse_batch_with<F>(
    files: &[SourceFile],
    workers: usize,
    cancel: Option<&AtomicBool>,
    read_file: F,
) -> Result<BatchOutcome, LoadError>
where
    F: Fn(&SourceFile) -> Result<Vec<TuneRecord>, ParseError> + Sync,
{
    if files.is_empty() {
        log::info!("No files to parse");
        return Ok(BatchOutcome::default());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()?;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} files ({per_sec}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-"),
    );
    pb.set_message("Parsing...");

    // Indexed collect keeps results in input order.
    let outcomes: Vec<FileOutcome> = pool.install(|| {
        files
            .par_iter()
            .map(|file| {
                let outcome = if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                    FileOutcome::Skipped
                } else {
                    match read_file(file) {
                        Ok(tunes) => FileOutcome::Parsed(tunes),
                        Err(e) => FileOutcome::Failed(e),
                    }
                };
                pb.inc(1);
                outcome
            })
            .collect()
    });

    let batch = collect_outcomes(files, outcomes);

    pb.finish_with_message(format!(
        "Done: {} tunes from {} files, {} failed, {} skipped",
        batch.records.len(),
        batch.files_parsed,
        batch.failures.len(),
        batch.files_skipped
    ));

    Ok(batch)
}

fn collect_outcomes(files: &[SourceFile], outcomes: Vec<FileOutcome>) -> BatchOutcome {
    let mut batch = BatchOutcome {
        files_total: files.len(),
        ..Default::default()
    };

    for (file, outcome) in files.iter().zip(outcomes) {
        match outcome {
            FileOutcome::Parsed(tunes) => {
                batch.files_parsed += 1;
                batch.records.extend(tunes);
            }
            FileOutcome::Failed(error) => {
                log::warn!("Error parsing {}: {}", file.path.display(), error);
                batch.failures.push(FileFailure {
                    file: file.clone(),
                    error,
                });
            }
            FileOutcome::Skipped => batch.files_skipped += 1,
        }
    }

    batch
}

/// Store a parsed batch, optionally clearing the table first.
///
/// Nothing is cleared when the batch produced no tunes.
pub fn persist(db: &Database, batch: &BatchOutcome, clear_existing: bool) -> Result<LoadResult, LoadError> {
    let mut result = LoadResult {
        files_found: batch.files_total,
        files_failed: batch.failures.len(),
        files_skipped: batch.files_skipped,
        tunes_parsed: batch.records.len(),
        ..Default::default()
    };

    if batch.records.is_empty() {
        return Ok(result);
    }

    if clear_existing {
        result.cleared = db.clear_tunes()?;
    }

    let outcome = db.insert_batch(&batch.records)?;
    result.tunes_inserted = outcome.inserted;
    result.insert_errors = outcome.failed;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::TuneFilter;
    use std::fs;
    use std::path::PathBuf;

    fn write_file(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, body).unwrap();
        path
    }

    fn source(path: PathBuf, book: &str) -> SourceFile {
        SourceFile {
            path,
            book_number: book.to_string(),
        }
    }

    fn refs(records: &[TuneRecord]) -> Vec<String> {
        records
            .iter()
            .map(|t| format!("{}/{}", t.book_number, t.reference))
            .collect()
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            source(write_file(dir.path(), "one.abc", "X:1\nT:A\nX:2\nT:B\n"), "1"),
            source(dir.path().join("missing.abc"), "1"),
            source(write_file(dir.path(), "three.abc", "X:3\nT:C\n"), "2"),
        ];

        let batch = parse_batch(&files, 2, None).unwrap();
        assert_eq!(refs(&batch.records), ["1/1", "1/2", "2/3"]);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].file, files[1]);
        assert_eq!(batch.files_parsed, 2);
        assert_eq!(batch.files_total, 3);
    }

    #[test]
    fn test_order_is_discovery_then_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = Vec::new();
        for i in 0..24 {
            let body = format!("X:{i}a\nT:First\nX:{i}b\nT:Second\n");
            files.push(source(write_file(dir.path(), &format!("f{i:02}.abc"), &body), "1"));
        }

        let batch = parse_batch(&files, 4, None).unwrap();
        let expected: Vec<String> = (0..24)
            .flat_map(|i| [format!("1/{i}a"), format!("1/{i}b")])
            .collect();
        assert_eq!(refs(&batch.records), expected);
    }

    #[test]
    fn test_empty_batch() {
        let batch = parse_batch(&[], 4, None).unwrap();
        assert!(batch.records.is_empty());
        assert_eq!(batch.files_total, 0);
    }

    #[test]
    fn test_cancelled_before_start_skips_everything() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            source(write_file(dir.path(), "a.abc", "X:1\n"), "1"),
            source(write_file(dir.path(), "b.abc", "X:2\n"), "1"),
        ];
        let cancel = AtomicBool::new(true);

        let batch = parse_batch(&files, 2, Some(&cancel)).unwrap();
        assert!(batch.records.is_empty());
        assert!(batch.failures.is_empty());
        assert_eq!(batch.files_skipped, 2);
    }

    #[test]
    fn test_cancellation_keeps_completed_files() {
        let files = vec![
            source(PathBuf::from("a.abc"), "1"),
            source(PathBuf::from("b.abc"), "1"),
            source(PathBuf::from("c.abc"), "1"),
        ];
        let cancel = AtomicBool::new(false);
        let reads = std::sync::atomic::AtomicUsize::new(0);

        // One worker runs files one at a time; the first read cancels the rest.
        let batch = parse_batch_with(&files, 1, Some(&cancel), |file| {
            reads.fetch_add(1, Ordering::SeqCst);
            cancel.store(true, Ordering::SeqCst);
            Ok(parser::parse("X:1\nT:Kept\n", &file.book_number))
        })
        .unwrap();

        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert_eq!(batch.files_parsed, 1);
        assert_eq!(batch.files_skipped, 2);
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].title, "Kept");
        assert!(batch.failures.is_empty());
    }

    #[test]
    fn test_collect_outcomes_counts_skipped() {
        let files = vec![
            source(PathBuf::from("a.abc"), "1"),
            source(PathBuf::from("b.abc"), "1"),
        ];
        let done = parser::parse("X:1\nT:Kept\n", "1");
        let outcomes = vec![FileOutcome::Parsed(done.clone()), FileOutcome::Skipped];

        let batch = collect_outcomes(&files, outcomes);
        assert_eq!(batch.records, done);
        assert_eq!(batch.files_parsed, 1);
        assert_eq!(batch.files_skipped, 1);
    }

    #[test]
    fn test_load_books_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_file(
            root,
            "1/jigs.abc",
            "% Book one\nX:1\nT:The Kesh\nT:Kesh Jig\nR:jig\nK:G\n|:GAG GAB:|\n\nX:2\nT:Out on the Ocean\nR:jig\nK:G\n",
        );
        write_file(root, "2/reels.abc", "X:1\nT:Drowsy Maggie\nR:reel\nK:Edor\n|:E2BE dEBE:|\n");
        write_file(root, "notes/readme.abc", "X:99\nT:Not a book\n");

        let db = Database::open_in_memory().unwrap();
        let opts = LoadOptions {
            workers: 2,
            ..Default::default()
        };
        let result = load_books(&db, root, &opts).unwrap();

        assert_eq!(result.files_found, 2);
        assert_eq!(result.files_failed, 0);
        assert_eq!(result.tunes_parsed, 3);
        assert_eq!(result.tunes_inserted, 3);

        let rows = db.query_tunes(&TuneFilter::All, None).unwrap();
        assert_eq!(rows[0].tune.title, "The Kesh");
        assert_eq!(rows[0].tune.alt_title, "Kesh Jig");
        assert_eq!(rows[0].tune.notes, "|:GAG GAB:| ");
        assert_eq!(rows[2].tune.book_number, "2");

        // Re-loading without clearing duplicates, with clearing replaces
        load_books(&db, root, &opts).unwrap();
        assert_eq!(db.count_tunes().unwrap(), 6);

        let opts = LoadOptions {
            clear_existing: true,
            ..opts
        };
        let result = load_books(&db, root, &opts).unwrap();
        assert_eq!(result.cleared, 6);
        assert_eq!(db.count_tunes().unwrap(), 3);
    }

    #[test]
    fn test_nothing_parsed_does_not_clear() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        db.insert_batch(&parser::parse("X:1\nT:Existing\n", "1")).unwrap();

        let opts = LoadOptions {
            clear_existing: true,
            workers: 1,
            cancel: None,
        };
        let result = load_books(&db, dir.path(), &opts).unwrap();
        assert_eq!(result, LoadResult::default());
        assert_eq!(db.count_tunes().unwrap(), 1);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        let err = load_books(&db, Path::new("/no/such/root"), &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::Scan(ScanError::RootNotFound(_))));
    }
}
