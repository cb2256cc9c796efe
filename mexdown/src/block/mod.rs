pub mod list;

use serde::Serialize;

use crate::inline::Text;

/// Deepest header that maps onto a section level. Deeper headers are still
/// parsed; consumers usually treat them as plain paragraphs.
pub const MAX_HEADER_DEPTH: usize = 6;

/// A section heading: one or more leading `#` followed by inline text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Header {
    /// Number of leading `#` characters, at least 1.
    pub depth: usize,
    /// Everything after the `#` run up to the end of the line.
    pub text: Text,
}

impl Header {
    /// The section level (1-6), or `None` past `MAX_HEADER_DEPTH`.
    pub fn level(&self) -> Option<u8> {
        if (1..=MAX_HEADER_DEPTH).contains(&self.depth) {
            u8::try_from(self.depth).ok()
        } else {
            None
        }
    }
}

/// A fenced block of raw text, optionally paired with a command that an
/// external runner feeds the text to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Directive {
    /// The opening fence's line, trimmed, unless it was blank.
    pub command: Option<String>,
    /// Body lines, verbatim, each terminated by `\n`.
    pub raw: String,
}

impl Directive {
    /// A directive without a command is preformatted text.
    pub fn is_preformatted(&self) -> bool {
        self.command.is_none()
    }
}

/// A citation definition, `[label]: source`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    pub label: String,
    pub source: String,
}
