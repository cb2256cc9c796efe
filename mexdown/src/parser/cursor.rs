use std::collections::VecDeque;
use std::str::CharIndices;

/// Character reader over the source with support for pushing text back.
///
/// Block parsing commits to a statement kind from its first character and
/// sometimes has to hand what it consumed to a different kind. Replayed
/// characters are read again before the rest of the source.
pub(crate) struct Cursor<'a> {
    source: &'a str,
    chars: CharIndices<'a>,
    pushback: VecDeque<(usize, char)>,
    current: Option<(usize, char)>,
}

impl<'a> Cursor<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut cursor = Cursor {
            source,
            chars: source.char_indices(),
            pushback: VecDeque::new(),
            current: None,
        };
        cursor.advance();
        cursor
    }

    pub fn peek(&self) -> Option<char> {
        self.current.map(|(_, c)| c)
    }

    /// Move to the next character and return it.
    pub fn advance(&mut self) -> Option<char> {
        self.current = self.pushback.pop_front().or_else(|| self.chars.next());
        self.peek()
    }

    /// Byte offset of the current character in the source.
    pub fn offset(&self) -> usize {
        self.current.map_or(self.source.len(), |(i, _)| i)
    }

    pub fn at_end(&self) -> bool {
        self.current.is_none()
    }

    /// Push `text` back so it is read next, ahead of the current character.
    /// Offsets of the replayed characters are reported from `origin` onward.
    pub fn replay(&mut self, text: &str, origin: usize) {
        if text.is_empty() {
            return;
        }
        if let Some(current) = self.current.take() {
            self.pushback.push_front(current);
        }
        for (i, c) in text.char_indices().collect::<Vec<_>>().into_iter().rev() {
            self.pushback.push_front((origin + i, c));
        }
        self.advance();
    }
}
