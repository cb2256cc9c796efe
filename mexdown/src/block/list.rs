use serde::Serialize;

use crate::inline::Text;

/// A run of list items not interrupted by a blank line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct List {
    pub items: Vec<ListItem>,
}

impl List {
    pub fn max_indent(&self) -> usize {
        self.items.iter().map(|item| item.indent).max().unwrap_or(0)
    }
}

/// `{tab} - [label] text`, with soft-wrapped continuation lines folded in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListItem {
    /// Number of leading tab characters.
    pub indent: usize,
    /// Present when the item used `-[label]` syntax (possibly empty).
    pub label: Option<String>,
    pub text: Text,
}
