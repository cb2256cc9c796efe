use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};

use crate::document::Document;

/// Parse errors with source location information.
///
/// Spans are byte ranges into the source, the unit codespan expects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Range<usize>,
    pub file_id: usize,
    pub notes: Vec<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Range<usize>, file_id: usize) -> Self {
        ParseError {
            message: message.into(),
            span,
            file_id,
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        Diagnostic::new(Severity::Error)
            .with_message(&self.message)
            .with_labels(vec![Label::primary(self.file_id, self.span.clone())])
            .with_notes(self.notes.clone())
    }
}

/// Every error a strict parse ran into. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", one_per_line(.errors))]
pub struct ParseFailure {
    pub errors: Vec<ParseError>,
}

fn one_per_line(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// The outcome of a lenient parse: the document as far as it could be
/// built, plus the errors met along the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parsed {
    pub document: Document,
    pub errors: Vec<ParseError>,
}

impl Parsed {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Discard the partial document if anything went wrong.
    pub fn into_result(self) -> Result<Document, ParseFailure> {
        if self.errors.is_empty() {
            Ok(self.document)
        } else {
            Err(ParseFailure {
                errors: self.errors,
            })
        }
    }
}
