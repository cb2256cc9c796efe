use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::block::list::List;
use crate::block::{Citation, Directive, Header};
use crate::inline::Text;

/// A parsed mexdown source file.
///
/// Statements appear in source order. Citation labels defined anywhere in
/// the file are collected into `citations`, where a later definition of a
/// label replaces an earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Document {
    pub statements: Vec<Statement>,
    pub citations: BTreeMap<String, String>,
}

impl Document {
    pub fn empty() -> Self {
        Document::default()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Look up the source registered for a citation label.
    pub fn citation(&self, label: &str) -> Option<&str> {
        self.citations.get(label).map(String::as_str)
    }

    pub fn paragraphs(&self) -> impl Iterator<Item = &Text> {
        self.statements.iter().filter_map(|s| match s {
            Statement::Paragraph(text) => Some(text),
            _ => None,
        })
    }
}

/// A single top-level statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Statement {
    Header(Header),
    Directive(Directive),
    List(List),
    Citation(Citation),
    Paragraph(Text),
}

impl Statement {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Statement::Header(_) => "header",
            Statement::Directive(_) => "directive",
            Statement::List(_) => "list",
            Statement::Citation(_) => "citation",
            Statement::Paragraph(_) => "paragraph",
        }
    }

    /// The formatted text carried directly by this statement, if any.
    /// Lists carry their text per item.
    pub fn text(&self) -> Option<&Text> {
        match self {
            Statement::Header(header) => Some(&header.text),
            Statement::Paragraph(text) => Some(text),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Outline display
// ---------------------------------------------------------------------------

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            write!(f, "{}", statement)?;
        }
        if !self.citations.is_empty() {
            writeln!(f, "citations")?;
            for (label, source) in &self.citations {
                writeln!(f, "  [{}] {:?}", label, source)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Header(header) => {
                writeln!(f, "header depth={} {:?}", header.depth, header.text.body)?;
                write_formats(f, &header.text, 1)
            }
            Statement::Directive(directive) => {
                match &directive.command {
                    Some(command) => writeln!(f, "directive command={:?}", command)?,
                    None => writeln!(f, "directive")?,
                }
                for line in directive.raw.lines() {
                    writeln!(f, "  | {}", line)?;
                }
                Ok(())
            }
            Statement::List(list) => {
                writeln!(f, "list")?;
                for item in &list.items {
                    let pad = "  ".repeat(item.indent + 1);
                    match &item.label {
                        Some(label) => writeln!(f, "{}- [{}] {:?}", pad, label, item.text.body)?,
                        None => writeln!(f, "{}- {:?}", pad, item.text.body)?,
                    }
                    write_formats(f, &item.text, item.indent + 2)?;
                }
                Ok(())
            }
            Statement::Citation(citation) => {
                writeln!(f, "citation [{}] {:?}", citation.label, citation.source)
            }
            Statement::Paragraph(text) => {
                writeln!(f, "paragraph {:?}", text.body)?;
                write_formats(f, text, 1)
            }
        }
    }
}

fn write_formats(f: &mut fmt::Formatter<'_>, text: &Text, depth: usize) -> fmt::Result {
    let pad = "  ".repeat(depth);
    for format in &text.formats {
        writeln!(f, "{}{}", pad, format)?;
    }
    Ok(())
}
