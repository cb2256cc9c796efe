mod cursor;
pub mod error;
pub(crate) mod inline;
mod structural;

use std::io::{self, Read};

use tracing::warn;

pub use error::{ParseError, ParseFailure, Parsed};

use crate::document::Document;

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Decode `bytes` as UTF-8. Input after the first invalid sequence is
    /// dropped and the document ends at the last valid character.
    pub fn from_bytes(bytes: Vec<u8>, file_id: usize) -> Self {
        let source = match String::from_utf8(bytes) {
            Ok(source) => source,
            Err(err) => {
                let valid = err.utf8_error().valid_up_to();
                let bytes = err.as_bytes();
                warn!(
                    file_id,
                    offset = valid,
                    dropped = bytes.len() - valid,
                    "invalid UTF-8, truncating input"
                );
                String::from_utf8_lossy(&bytes[..valid]).into_owned()
            }
        };
        Parser { source, file_id }
    }

    /// Drain `reader` and decode it like [`Parser::from_bytes`].
    pub fn from_reader(mut reader: impl Read, file_id: usize) -> io::Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(Parser::from_bytes(bytes, file_id))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn file_id(&self) -> usize {
        self.file_id
    }

    /// Parse the whole source, keeping the document even when errors were
    /// recorded.
    pub fn parse_lenient(&self) -> Parsed {
        let (document, errors) = structural::parse_document(&self.source, self.file_id);
        Parsed { document, errors }
    }

    /// Parse the whole source, failing if anything was malformed.
    pub fn parse(&self) -> Result<Document, ParseFailure> {
        self.parse_lenient().into_result()
    }
}
