use regex::Regex;
use std::sync::LazyLock;

/// Comment sigil: a trimmed line starting with this is ignored entirely.
pub const COMMENT_SIGIL: char = '%';

// Field marker: one uppercase letter followed by a colon, at line start.
static FIELD_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<letter>[A-Z]):").unwrap());

/// How a single line of an ABC file is treated by the parser.
///
/// Borrowed values are already trimmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    Blank,
    Comment,
    /// `X:` starts a new tune; carries the reference number text.
    RecordStart(&'a str),
    /// `T:`
    Title(&'a str),
    /// `K:`
    Key(&'a str),
    /// `R:`
    Rhythm(&'a str),
    /// Any other `<A-Z>:` header (composer, meter, note length, ...). Not stored.
    OtherField(char),
    /// Tune body: bars, notes, lyrics, anything not matching a marker.
    Notation(&'a str),
}

/// Classify one raw line. Leading/trailing whitespace is ignored.
pub fn classify_line(raw: &str) -> LineKind<'_> {
    let line = raw.trim();

    if line.is_empty() {
        return LineKind::Blank;
    }
    if line.starts_with(COMMENT_SIGIL) {
        return LineKind::Comment;
    }

    let Some(caps) = FIELD_MARKER_RE.captures(line) else {
        return LineKind::Notation(line);
    };

    // Marker is always two ASCII bytes, so slicing at 2 is on a char boundary.
    let value = line[2..].trim();
    match &caps["letter"] {
        "X" => LineKind::RecordStart(value),
        "T" => LineKind::Title(value),
        "K" => LineKind::Key(value),
        "R" => LineKind::Rhythm(value),
        other => LineKind::OtherField(other.chars().next().unwrap_or('?')),
    }
}
