use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::parser::inline::format_text;

/// A body of text together with the formatting spans found in it.
///
/// `body` is the unescaped text: escape backslashes are gone, but every
/// delimiter character is still present. Spans point at the delimiters
/// themselves, so rendering is a matter of replacing them with markup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Text {
    pub body: String,
    pub formats: Vec<Format>,
}

impl Text {
    /// A body with no formatting applied (not yet scanned for delimiters).
    pub fn plain(body: impl Into<String>) -> Self {
        Text {
            body: body.into(),
            formats: Vec::new(),
        }
    }

    /// Run the inline formatter over escaped source text.
    pub fn parse(raw: &str) -> Self {
        format_text(raw)
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Length of the body in code points, the unit of every `Format` offset.
    pub fn char_len(&self) -> usize {
        self.body.chars().count()
    }

    /// The part of the body covered by `format`, both delimiters included.
    /// Returns `None` if the span does not fit the body.
    pub fn slice(&self, format: &Format) -> Option<&str> {
        let start = byte_offset(&self.body, format.begin)?;
        let last = byte_offset(&self.body, format.end)?;
        let end = last + self.body[last..].chars().next()?.len_utf8();
        Some(&self.body[start..end])
    }

    pub fn formats_of(&self, kind: FormatKind) -> impl Iterator<Item = &Format> {
        self.formats.iter().filter(move |f| f.kind == kind)
    }
}

fn byte_offset(body: &str, char_pos: usize) -> Option<usize> {
    body.char_indices().nth(char_pos).map(|(i, _)| i)
}

/// A formatting span over a `Text` body.
///
/// `begin` is the position of the opening delimiter and `end` the position of
/// the closing one, both in code points. For multi-character delimiters
/// (`**`, `***`, `--`) the position is that of the delimiter's last
/// character. Spans of different kinds may overlap without nesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Format {
    pub kind: FormatKind,
    pub begin: usize,
    pub end: usize,
}

impl Format {
    pub fn new(kind: FormatKind, begin: usize, end: usize) -> Self {
        Format { kind, begin, end }
    }

    /// True when the two spans share a position but neither encloses the other.
    pub fn overlaps(&self, other: &Format) -> bool {
        let disjoint = self.end < other.begin || other.end < self.begin;
        let nested = (self.begin <= other.begin && other.end <= self.end)
            || (other.begin <= self.begin && self.end <= other.end);
        !disjoint && !nested
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}..{}", self.kind, self.begin, self.end)
    }
}

/// The kinds of inline formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    /// `[label]` or `[label](source)`
    Cite,
    /// `*text*`
    Italic,
    /// `**text**`
    Bold,
    /// `***text***`
    BoldItalic,
    /// `_text_`
    Underline,
    /// `--text--`
    Strikethrough,
    /// `` `text` ``
    Raw,
}

impl FormatKind {
    pub const ALL: [FormatKind; 7] = [
        FormatKind::Cite,
        FormatKind::Italic,
        FormatKind::Bold,
        FormatKind::BoldItalic,
        FormatKind::Underline,
        FormatKind::Strikethrough,
        FormatKind::Raw,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FormatKind::Cite => "cite",
            FormatKind::Italic => "italic",
            FormatKind::Bold => "bold",
            FormatKind::BoldItalic => "bold_italic",
            FormatKind::Underline => "underline",
            FormatKind::Strikethrough => "strikethrough",
            FormatKind::Raw => "raw",
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown format kind: {0}")]
pub struct UnknownFormatKind(pub String);

impl FromStr for FormatKind {
    type Err = UnknownFormatKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        FormatKind::ALL
            .into_iter()
            .find(|kind| kind.name() == normalized)
            .ok_or_else(|| UnknownFormatKind(s.to_string()))
    }
}
