//! ABC tune-book parser.
//!
//! Turns the text of one `.abc` file into an ordered list of [`TuneRecord`]s.
//! A tune runs from an `X:` line up to the next `X:` line or end of input.
//! Only a handful of header fields are kept (`T:`, `K:`, `R:`); every other
//! header is dropped and body lines are concatenated into `notes`.
//!
//! [`parse`] is pure. [`read_tune_file`] adds the disk read and lossy decode.

pub mod line;

pub use line::{classify_line, LineKind};

use crate::scanner::SourceFile;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One tune extracted from an ABC file. Missing fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TuneRecord {
    pub book_number: String,
    /// Text after `X:`. Unique within a file only.
    pub reference: String,
    pub title: String,
    pub alt_title: String,
    pub key: String,
    pub rhythm: String,
    /// Body lines, each followed by a single space.
    pub notes: String,
}

impl TuneRecord {
    fn open(book_number: &str, reference: &str) -> Self {
        Self {
            book_number: book_number.to_string(),
            reference: reference.to_string(),
            ..Default::default()
        }
    }

    /// First title fills `title`, second fills `alt_title`, later ones are dropped.
    fn add_title(&mut self, value: &str) {
        if self.title.is_empty() {
            self.title = value.to_string();
        } else if self.alt_title.is_empty() {
            self.alt_title = value.to_string();
        }
    }

    fn push_notation(&mut self, text: &str) {
        self.notes.push_str(text);
        self.notes.push(' ');
    }
}

/// Input to [`TuneParser::step`].
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    Line(&'a str),
    EndOfInput,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    NoOpenRecord,
    RecordOpen(TuneRecord),
}

/// Two-state reducer over the lines of one file.
///
/// Each [`Event`] may complete at most one tune, which `step` hands back.
/// Feeding [`Event::EndOfInput`] flushes the tune still open, if any.
#[derive(Debug)]
pub struct TuneParser<'b> {
    book_number: &'b str,
    state: State,
}

impl<'b> TuneParser<'b> {
    pub fn new(book_number: &'b str) -> Self {
        Self {
            book_number,
            state: State::NoOpenRecord,
        }
    }

    pub fn has_open_record(&self) -> bool {
        matches!(self.state, State::RecordOpen(_))
    }

    pub fn step(&mut self, event: Event<'_>) -> Option<TuneRecord> {
        let kind = match event {
            Event::EndOfInput => return self.finalize(),
            Event::Line(raw) => classify_line(raw),
        };

        match kind {
            LineKind::Blank | LineKind::Comment => None,
            LineKind::RecordStart(reference) => {
                let finished = self.finalize();
                self.state = State::RecordOpen(TuneRecord::open(self.book_number, reference));
                finished
            }
            _ => {
                // Anything before the first X: is discarded
                let State::RecordOpen(tune) = &mut self.state else {
                    return None;
                };
                match kind {
                    LineKind::Title(v) => tune.add_title(v),
                    LineKind::Key(v) => tune.key = v.to_string(),
                    LineKind::Rhythm(v) => tune.rhythm = v.to_string(),
                    LineKind::Notation(text) => tune.push_notation(text),
                    LineKind::OtherField(letter) => {
                        log::trace!("Ignoring {letter}: field in tune {}", tune.reference);
                    }
                    LineKind::Blank | LineKind::Comment | LineKind::RecordStart(_) => {}
                }
                None
            }
        }
    }

    fn finalize(&mut self) -> Option<TuneRecord> {
        match std::mem::take(&mut self.state) {
            State::RecordOpen(tune) => Some(tune),
            State::NoOpenRecord => None,
        }
    }
}

/// Parse the full text of one ABC file into tunes, in file order.
pub fn parse(raw_text: &str, book_number: &str) -> Vec<TuneRecord> {
    let mut parser = TuneParser::new(book_number);
    // \r\n, \n and a lone \r all end a line; the empty piece inside \r\n is a blank line.
    raw_text
        .split(['\r', '\n'])
        .map(Event::Line)
        .chain(std::iter::once(Event::EndOfInput))
        .filter_map(|event| parser.step(event))
        .collect()
}

/// Decode file bytes permissively: invalid UTF-8 sequences are dropped, as is a BOM.
pub fn decode_lossy(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text
}

/// Read and parse one discovered file. Either every tune is returned or the
/// read error is; a file is never partially parsed.
pub fn read_tune_file(file: &SourceFile) -> Result<Vec<TuneRecord>, ParseError> {
    let bytes = std::fs::read(&file.path).map_err(|source| ParseError::Read {
        path: file.path.clone(),
        source,
    })?;
    let tunes = parse(&decode_lossy(&bytes), &file.book_number);
    log::debug!("Parsed {} tunes from {}", tunes.len(), file.path.display());
    Ok(tunes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(ls: &[&str]) -> String {
        ls.join("\n")
    }

    #[test]
    fn test_no_record_start_yields_nothing() {
        assert!(parse("", "1").is_empty());
        assert!(parse("T:Orphan\nK:G\nabc|def|\n% comment\n", "1").is_empty());
    }

    #[test]
    fn test_record_count_matches_markers() {
        let text = lines(&[
            "% header comment",
            "",
            "X:1",
            "T:One",
            "",
            "% between",
            "X:2",
            "X:3",
            "",
            "",
            "X:4",
            "abc",
        ]);
        let tunes = parse(&text, "7");
        assert_eq!(tunes.len(), 4);
        let refs: Vec<&str> = tunes.iter().map(|t| t.reference.as_str()).collect();
        assert_eq!(refs, ["1", "2", "3", "4"]);
        assert!(tunes.iter().all(|t| t.book_number == "7"));
    }

    #[test]
    fn test_empty_reference_still_opens_a_record() {
        let tunes = parse("X:\nT:Nameless\nX:2\n", "1");
        assert_eq!(tunes.len(), 2);
        assert_eq!(tunes[0].reference, "");
        assert_eq!(tunes[0].title, "Nameless");
    }

    #[test]
    fn test_title_precedence() {
        let tunes = parse(&lines(&["X:1", "T:Cooley's", "T:Kohler's", "T:Extra"]), "1");
        assert_eq!(tunes.len(), 1);
        assert_eq!(tunes[0].title, "Cooley's");
        assert_eq!(tunes[0].alt_title, "Kohler's");
        assert!(!tunes[0].notes.contains("Extra"));
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let tunes = parse("X:9\n", "3");
        assert_eq!(
            tunes,
            vec![TuneRecord {
                book_number: "3".into(),
                reference: "9".into(),
                ..Default::default()
            }]
        );
    }

    #[test]
    fn test_key_and_rhythm_last_wins() {
        let tunes = parse(&lines(&["X:2", "K:G", "R:jig", "K:D", "R:slide"]), "1");
        assert_eq!(tunes[0].key, "D");
        assert_eq!(tunes[0].rhythm, "slide");
    }

    #[test]
    fn test_notation_joined_with_trailing_space() {
        let tunes = parse(&lines(&["X:3", "abc", "def"]), "1");
        assert_eq!(tunes[0].notes, "abc def ");
    }

    #[test]
    fn test_other_fields_are_not_notation() {
        let tunes = parse(&lines(&["X:1", "M:6/8", "L:1/8", "|:GAB:|", "Z:someone"]), "1");
        assert_eq!(tunes[0].notes, "|:GAB:| ");
    }

    #[test]
    fn test_whitespace_around_fields_is_ignored() {
        let tight = parse(&lines(&["X:1", "T:Drowsy Maggie", "K:Edor", "R:reel", "abc"]), "1");
        let loose = parse(
            &lines(&[
                "   X:  1   ",
                "\tT:   Drowsy Maggie  ",
                "  K: Edor",
                "R:reel   ",
                "    abc   ",
            ]),
            "1",
        );
        assert_eq!(tight, loose);
    }

    #[test]
    fn test_comments_and_blanks_never_reach_fields() {
        let text = lines(&[
            "%this is ignored",
            "X:1",
            "%this is ignored",
            "",
            "T:Title",
            "   ",
            "abc",
            "%this is ignored",
            "def",
        ]);
        let tunes = parse(&text, "1");
        assert_eq!(tunes.len(), 1);
        let t = &tunes[0];
        for field in [&t.reference, &t.title, &t.alt_title, &t.key, &t.rhythm, &t.notes] {
            assert!(!field.contains("ignored"));
        }
        assert_eq!(t.notes, "abc def ");
    }

    #[test]
    fn test_pre_header_content_is_discarded() {
        let text = lines(&["Some book intro text", "T:Not a tune", "|abc|", "X:1", "T:Real"]);
        let tunes = parse(&text, "1");
        assert_eq!(tunes.len(), 1);
        assert_eq!(tunes[0].title, "Real");
        assert_eq!(tunes[0].notes, "");
    }

    #[test]
    fn test_tunes_come_back_in_file_order() {
        let text = lines(&["X:10", "T:B", "X:2", "T:A", "X:7", "T:C"]);
        let titles: Vec<String> = parse(&text, "1").into_iter().map(|t| t.title).collect();
        assert_eq!(titles, ["B", "A", "C"]);
    }

    #[test]
    fn test_fields_do_not_leak_between_tunes() {
        let text = lines(&["X:1", "T:First", "T:Alt", "K:G", "R:reel", "abc", "X:2", "T:Second"]);
        let tunes = parse(&text, "1");
        assert_eq!(tunes[1].title, "Second");
        assert_eq!(tunes[1].alt_title, "");
        assert_eq!(tunes[1].key, "");
        assert_eq!(tunes[1].rhythm, "");
        assert_eq!(tunes[1].notes, "");
    }

    #[test]
    fn test_crlf_line_endings() {
        let tunes = parse("X:1\r\nT:Windows\r\nK:A\r\nabc\r\n", "1");
        assert_eq!(tunes[0].title, "Windows");
        assert_eq!(tunes[0].key, "A");
        assert_eq!(tunes[0].notes, "abc ");
    }

    #[test]
    fn test_lone_cr_line_endings() {
        let tunes = parse("X:1\rT:Old Mac\rK:G\rabc\rX:2\rT:Second\r", "1");
        assert_eq!(tunes.len(), 2);
        assert_eq!(tunes[0].reference, "1");
        assert_eq!(tunes[0].title, "Old Mac");
        assert_eq!(tunes[0].key, "G");
        assert_eq!(tunes[0].notes, "abc ");
        assert_eq!(tunes[1].title, "Second");
    }

    #[test]
    fn test_mixed_line_endings() {
        let tunes = parse("X:1\r\nT:A\rX:2\nT:B\r\n\r\nabc", "1");
        assert_eq!(tunes.len(), 2);
        assert_eq!(tunes[0].title, "A");
        assert_eq!(tunes[1].title, "B");
        assert_eq!(tunes[1].notes, "abc ");
    }

    #[test]
    fn test_reducer_flushes_only_on_boundaries() {
        let mut parser = TuneParser::new("5");
        assert!(!parser.has_open_record());
        assert!(parser.step(Event::Line("stray")).is_none());
        assert!(parser.step(Event::Line("X:1")).is_none());
        assert!(parser.has_open_record());
        assert!(parser.step(Event::Line("T:A")).is_none());

        let first = parser.step(Event::Line("X:2")).unwrap();
        assert_eq!(first.title, "A");
        assert!(parser.has_open_record());

        let second = parser.step(Event::EndOfInput).unwrap();
        assert_eq!(second.reference, "2");
        assert!(!parser.has_open_record());
        assert!(parser.step(Event::EndOfInput).is_none());
    }

    #[test]
    fn test_decode_lossy_drops_invalid_bytes() {
        let bytes = b"X:1\nT:Caf\xe9\nabc\n";
        let tunes = parse(&decode_lossy(bytes), "1");
        assert_eq!(tunes.len(), 1);
        assert_eq!(tunes[0].title, "Caf");
    }

    #[test]
    fn test_invalid_byte_before_marker_keeps_the_tune() {
        let tunes = parse(&decode_lossy(b"\xffX:1\nT:A\n"), "1");
        assert_eq!(tunes.len(), 1);
        assert_eq!(tunes[0].reference, "1");
        assert_eq!(tunes[0].title, "A");
    }

    #[test]
    fn test_decode_lossy_strips_bom() {
        let bytes = b"\xEF\xBB\xBFX:1\nT:Bom\n";
        let tunes = parse(&decode_lossy(bytes), "1");
        assert_eq!(tunes[0].reference, "1");
    }

    #[test]
    fn test_read_tune_file_reports_missing_file() {
        let file = SourceFile {
            path: PathBuf::from("/definitely/not/here.abc"),
            book_number: "1".into(),
        };
        let err = read_tune_file(&file).unwrap_err();
        assert!(matches!(err, ParseError::Read { ref path, .. } if path == &file.path));
    }

    #[test]
    fn test_read_tune_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tunes.abc");
        std::fs::write(&path, "X:1\nT:Tarbolton\nR:reel\nK:Edor\n|:efe dBA:|\n").unwrap();

        let file = SourceFile { path, book_number: "2".into() };
        let tunes = read_tune_file(&file).unwrap();
        assert_eq!(tunes.len(), 1);
        assert_eq!(tunes[0].book_number, "2");
        assert_eq!(tunes[0].rhythm, "reel");
        assert_eq!(tunes[0].notes, "|:efe dBA:| ");
    }
}
