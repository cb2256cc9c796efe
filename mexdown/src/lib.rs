pub mod block;
pub mod document;
pub mod inline;
pub mod parser;

pub use block::list::{List, ListItem};
pub use block::{Citation, Directive, Header, MAX_HEADER_DEPTH};
pub use document::{Document, Statement};
pub use inline::{Format, FormatKind, Text, UnknownFormatKind};
pub use parser::{ParseError, ParseFailure, Parsed, Parser};

/// Parse `source` strictly, as file 0.
pub fn parse(source: &str) -> Result<Document, ParseFailure> {
    Parser::new(source.to_string(), 0).parse()
}

/// Parse `source` as file 0, returning the document alongside any errors.
pub fn parse_lenient(source: &str) -> Parsed {
    Parser::new(source.to_string(), 0).parse_lenient()
}
