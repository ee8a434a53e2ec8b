use crate::ABC_EXTENSION;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory '{0}' not found")]
    RootNotFound(PathBuf),
}

/// An ABC file to parse, tagged with the book it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub book_number: String,
}

/// Find every `.abc` file under `root/<book>/`, where `<book>` is a folder
/// named only with digits. Books come back in numeric order, files within a
/// book in file-name order.
pub fn discover(root: &Path) -> Result<Vec<SourceFile>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::RootNotFound(root.to_path_buf()));
    }

    let mut books: Vec<(String, PathBuf)> = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::warn!("Skipping unreadable entry in {}: {}", root.display(), err);
                None
            }
        })
        .filter(|entry| entry.file_type().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            is_book_folder(&name).then(|| (name, entry.into_path()))
        })
        .collect();

    books.sort_by(|a, b| compare_book_numbers(&a.0, &b.0));

    let mut files = Vec::new();
    for (book_number, book_dir) in books {
        log::info!("Found book: {book_number}");
        let before = files.len();

        for entry in WalkDir::new(&book_dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    log::warn!("Skipping unreadable entry in {}: {}", book_dir.display(), err);
                    continue;
                }
            };
            if entry.file_type().is_file() && has_abc_extension(entry.path()) {
                log::debug!("  Found: {}", entry.path().display());
                files.push(SourceFile {
                    path: entry.into_path(),
                    book_number: book_number.clone(),
                });
            }
        }

        if files.len() == before {
            log::debug!("Book {book_number} has no .abc files");
        }
    }

    Ok(files)
}

/// Book folders are named with ASCII digits only ("1", "02", "117").
pub fn is_book_folder(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit())
}

fn has_abc_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ABC_EXTENSION))
}

/// Numeric comparison on digit strings of any length ("9" < "10"), ties
/// broken by the raw string so "01" and "1" stay distinct and stable.
fn compare_book_numbers(a: &str, b: &str) -> Ordering {
    let a_trim = a.trim_start_matches('0');
    let b_trim = b.trim_start_matches('0');
    a_trim
        .len()
        .cmp(&b_trim.len())
        .then_with(|| a_trim.cmp(b_trim))
        .then_with(|| a.cmp(b))
}
