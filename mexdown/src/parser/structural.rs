use std::collections::BTreeMap;
use std::ops::Range;

use tracing::{debug, trace};

use crate::block::list::{List, ListItem};
use crate::block::{Citation, Directive, Header};
use crate::document::{Document, Statement};
use crate::inline::Text;
use crate::parser::cursor::Cursor;
use crate::parser::error::ParseError;

/// Minimum backtick run that opens a directive.
const FENCE_MIN: usize = 3;

/// How much of an unterminated directive body is quoted in the error.
const EXCERPT_LEN: usize = 24;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Segment source text into statements and assemble the document.
/// Recoverable problems are collected; the document is always produced.
pub fn parse_document(source: &str, file_id: usize) -> (Document, Vec<ParseError>) {
    let mut state = ParseState::new(source, file_id);
    while !state.cursor.at_end() {
        let statement = state.statement();
        trace!(kind = statement.kind_name(), "statement");
        state.statements.push(statement);
    }
    state.finalize()
}

// ---------------------------------------------------------------------------
// Parse state
// ---------------------------------------------------------------------------

struct ParseState<'a> {
    cursor: Cursor<'a>,
    file_id: usize,
    citations: BTreeMap<String, String>,
    statements: Vec<Statement>,
    errors: Vec<ParseError>,
}

/// One source line. `content` excludes the newline and a `\r` before it.
struct Line {
    content: String,
    terminated: bool,
    start: usize,
}

impl Line {
    fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// The line as it should be fed back to the cursor.
    fn replay_text(&self) -> String {
        if self.terminated {
            format!("{}\n", self.content)
        } else {
            self.content.clone()
        }
    }
}

/// A `[label]` read from the source.
struct Bracketed {
    /// Label with `\\` and `\]` unescaped.
    text: String,
    /// Exactly what was consumed after the `[`, closing bracket excluded.
    raw: String,
    closed: bool,
}

enum ItemOutcome {
    Item(ListItem),
    /// The line is not a list item. `prefix` is what was consumed of it.
    Rejected { prefix: String, origin: usize },
}

impl<'a> ParseState<'a> {
    fn new(source: &'a str, file_id: usize) -> Self {
        ParseState {
            cursor: Cursor::new(source),
            file_id,
            citations: BTreeMap::new(),
            statements: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn error(&self, message: impl Into<String>, span: Range<usize>) -> ParseError {
        ParseError::new(message, span, self.file_id)
    }

    fn statement(&mut self) -> Statement {
        match self.cursor.peek() {
            Some('#') => self.header(),
            Some('`') => self.directive(),
            Some('[') => self.citation(),
            Some('-') => match self.list() {
                Some(list) => Statement::List(list),
                None => self.paragraph(),
            },
            _ => self.paragraph(),
        }
    }

    // ---- lines ----

    /// Consume through the end of the current line.
    fn read_line(&mut self) -> Line {
        let start = self.cursor.offset();
        let mut content = String::new();
        let mut terminated = false;
        while let Some(c) = self.cursor.peek() {
            self.cursor.advance();
            if c == '\n' {
                terminated = true;
                break;
            }
            content.push(c);
        }
        if terminated && content.ends_with('\r') {
            content.pop();
        }
        Line {
            content,
            terminated,
            start,
        }
    }

    /// Read a label after an already consumed `[`, stopping at an unescaped
    /// `]` (consumed) or at the end of the line (not consumed).
    fn bracketed(&mut self) -> Bracketed {
        let mut text = String::new();
        let mut raw = String::new();
        while let Some(c) = self.cursor.peek() {
            match c {
                ']' => {
                    self.cursor.advance();
                    return Bracketed {
                        text,
                        raw,
                        closed: true,
                    };
                }
                '\n' => break,
                '\\' => {
                    raw.push(c);
                    match self.cursor.advance() {
                        Some(next @ ('\\' | ']')) => {
                            raw.push(next);
                            text.push(next);
                            self.cursor.advance();
                        }
                        _ => text.push(c),
                    }
                }
                _ => {
                    raw.push(c);
                    text.push(c);
                    self.cursor.advance();
                }
            }
        }
        Bracketed {
            text,
            raw,
            closed: false,
        }
    }

    // ---- statements ----

    fn header(&mut self) -> Statement {
        let mut depth = 0;
        while self.cursor.peek() == Some('#') {
            depth += 1;
            self.cursor.advance();
        }
        let line = self.read_line();
        Statement::Header(Header {
            depth,
            text: Text::parse(&line.content),
        })
    }

    fn directive(&mut self) -> Statement {
        let fence_start = self.cursor.offset();
        let mut fence = 0;
        while self.cursor.peek() == Some('`') {
            fence += 1;
            self.cursor.advance();
        }
        if fence < FENCE_MIN {
            debug!(fence, "backtick run too short for a directive");
            self.cursor.replay(&"`".repeat(fence), fence_start);
            return self.paragraph();
        }

        let opening = self.read_line();
        let command = Some(opening.content.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let mut raw = String::new();
        loop {
            let line = self.read_line();
            let run = line.content.chars().take_while(|&c| c == '`').count();
            if run >= fence {
                let trailing = line.content[run..].trim();
                if !trailing.is_empty() {
                    let span = line.start..line.start + line.content.len();
                    let error = self
                        .error(
                            format!(
                                "cannot have text on the same line that a directive is terminated: {}",
                                line.content
                            ),
                            span,
                        )
                        .with_note(format!("`{}` follows the closing fence", trailing));
                    self.errors.push(error);
                }
                break;
            }
            if !line.content.is_empty() || line.terminated {
                raw.push_str(&line.content);
                raw.push('\n');
            }
            if !line.terminated {
                let excerpt = excerpt(&raw);
                let span = fence_start..self.cursor.offset();
                let error = self
                    .error(format!("directive is not terminated: {}", excerpt), span)
                    .with_note(format!("expected a closing fence of {} backticks", fence));
                self.errors.push(error);
                break;
            }
        }

        Statement::Directive(Directive { command, raw })
    }

    fn citation(&mut self) -> Statement {
        let start = self.cursor.offset();
        self.cursor.advance();
        let label = self.bracketed();
        if !label.closed {
            debug!(label = %label.raw, "unclosed bracket, reading as paragraph");
            self.cursor.replay(&format!("[{}", label.raw), start);
            return self.paragraph();
        }
        if self.cursor.peek() != Some(':') {
            debug!(label = %label.raw, "bracket without a colon, reading as paragraph");
            self.cursor.replay(&format!("[{}]", label.raw), start);
            return self.paragraph();
        }
        self.cursor.advance();

        let source = self.read_line().content;
        if let Some(previous) = self.citations.insert(label.text.clone(), source.clone()) {
            debug!(label = %label.text, %previous, "citation label redefined");
        }
        Statement::Citation(Citation {
            label: label.text,
            source,
        })
    }

    /// Parse consecutive list items. Returns `None` when the very first line
    /// is not an item, after pushing back what it consumed.
    fn list(&mut self) -> Option<List> {
        let mut items = Vec::new();
        loop {
            match self.list_item() {
                ItemOutcome::Item(item) => items.push(item),
                ItemOutcome::Rejected { prefix, origin } => {
                    self.cursor.replay(&prefix, origin);
                    break;
                }
            }
        }
        if items.is_empty() {
            None
        } else {
            Some(List { items })
        }
    }

    fn list_item(&mut self) -> ItemOutcome {
        let origin = self.cursor.offset();
        let mut indent = 0;
        while self.cursor.peek() == Some('\t') {
            indent += 1;
            self.cursor.advance();
        }
        let tabs = "\t".repeat(indent);
        if self.cursor.peek() != Some('-') {
            return ItemOutcome::Rejected {
                prefix: tabs,
                origin,
            };
        }
        self.cursor.advance();
        if self.cursor.peek() == Some('-') {
            trace!(indent, "double hyphen is not a list item");
            return ItemOutcome::Rejected {
                prefix: tabs + "-",
                origin,
            };
        }

        let mut label = None;
        if self.cursor.peek() == Some('[') {
            let label_start = self.cursor.offset();
            self.cursor.advance();
            let bracketed = self.bracketed();
            if !bracketed.closed {
                let span = label_start..self.cursor.offset();
                let error = self.error(
                    format!(
                        "list item label does not have a closing bracket: [{}",
                        bracketed.text
                    ),
                    span,
                );
                self.errors.push(error);
            }
            label = Some(bracketed.text);
        }

        let mut body = self.read_line().content;
        loop {
            let line = self.read_line();
            if line.is_blank() || line.content.trim_start().starts_with('-') {
                let text = line.replay_text();
                self.cursor.replay(&text, line.start);
                break;
            }
            body.push(' ');
            body.push_str(&line.content);
        }

        ItemOutcome::Item(ListItem {
            indent,
            label,
            text: Text::parse(&body),
        })
    }

    fn paragraph(&mut self) -> Statement {
        let line = self.read_line();
        Statement::Paragraph(Text::plain(line.content))
    }

    // ---- assembly ----

    /// Drop blank paragraphs, join runs of adjacent paragraphs line by line,
    /// then run the inline formatter over each joined paragraph.
    fn finalize(self) -> (Document, Vec<ParseError>) {
        let mut statements: Vec<Statement> = Vec::with_capacity(self.statements.len());
        for statement in self.statements {
            if let Statement::Paragraph(text) = &statement {
                if text.body.trim().is_empty() {
                    continue;
                }
                if let Some(Statement::Paragraph(previous)) = statements.last_mut() {
                    previous.body.push('\n');
                    previous.body.push_str(&text.body);
                    continue;
                }
            }
            statements.push(statement);
        }

        for statement in &mut statements {
            if let Statement::Paragraph(text) = statement {
                *text = Text::parse(&text.body);
            }
        }

        debug!(
            statements = statements.len(),
            citations = self.citations.len(),
            errors = self.errors.len(),
            "document assembled"
        );

        let document = Document {
            statements,
            citations: self.citations,
        };
        (document, self.errors)
    }
}

/// The start of `body` on a single line.
fn excerpt(body: &str) -> String {
    let flat = body.trim_end().replace('\n', " ");
    let mut chars = flat.chars();
    let head: String = chars.by_ref().take(EXCERPT_LEN).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
