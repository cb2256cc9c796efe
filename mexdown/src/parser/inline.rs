use tracing::trace;

use crate::inline::{Format, FormatKind, Text};

/// Characters a backslash may escape outside of a raw span.
const ESCAPABLE: &[char] = &['\\', '#', '`', '-', '*', '[', ']', '(', ')', '_'];

/// Scan escaped source text, returning the unescaped body with every
/// formatting span found in it, sorted by opening position.
pub fn format_text(raw: &str) -> Text {
    let (body, mut tokens) = tokenize(raw);
    trace!(tokens = tokens.len(), "tokenized inline text");

    let mut formats = resolve_raw(&mut tokens);
    trace!(spans = formats.len(), remaining = tokens.len(), "raw pass");
    let cites = resolve_citations(&mut tokens);
    trace!(spans = cites.len(), remaining = tokens.len(), "citation pass");
    formats.extend(cites);
    let emphasis = resolve_emphasis(&tokens);
    trace!(spans = emphasis.len(), "emphasis pass");
    formats.extend(emphasis);
    formats.sort_by_key(|f| f.begin);

    Text { body, formats }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delim {
    Star,
    DoubleStar,
    TripleStar,
    Dash,
    DoubleDash,
    Underscore,
    OpenBracket,
    CloseBracket,
    /// `](`, positioned at the parenthesis.
    SourceOpen,
    CloseParen,
    Backtick,
}

impl Delim {
    fn emphasis(self) -> Option<FormatKind> {
        match self {
            Delim::Star => Some(FormatKind::Italic),
            Delim::DoubleStar => Some(FormatKind::Bold),
            Delim::TripleStar => Some(FormatKind::BoldItalic),
            Delim::DoubleDash => Some(FormatKind::Strikethrough),
            Delim::Underscore => Some(FormatKind::Underline),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Token {
    delim: Delim,
    /// Code point offset into the unescaped body.
    pos: usize,
}

/// Produce the unescaped body and the delimiter tokens in it.
///
/// Adjacent `*` merge into `**` and `***`, adjacent `-` merge into `--`.
/// A lone `-` followed by ordinary text is dropped, as is a `(` that does not
/// directly follow a `]`.
fn tokenize(raw: &str) -> (String, Vec<Token>) {
    let mut body = String::with_capacity(raw.len());
    let mut tokens: Vec<Token> = Vec::new();
    let mut pos = 0usize;
    let mut in_raw = false;
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        let adjacent = |tokens: &[Token], delim: Delim| {
            tokens
                .last()
                .is_some_and(|t| t.delim == delim && t.pos + 1 == pos)
        };

        match c {
            '*' => {
                let delim = if adjacent(&tokens, Delim::Star) {
                    tokens.pop();
                    Delim::DoubleStar
                } else if adjacent(&tokens, Delim::DoubleStar) {
                    tokens.pop();
                    Delim::TripleStar
                } else {
                    Delim::Star
                };
                tokens.push(Token { delim, pos });
            }
            '-' => {
                let delim = if adjacent(&tokens, Delim::Dash) {
                    tokens.pop();
                    Delim::DoubleDash
                } else {
                    Delim::Dash
                };
                tokens.push(Token { delim, pos });
            }
            '_' => tokens.push(Token { delim: Delim::Underscore, pos }),
            '[' => tokens.push(Token { delim: Delim::OpenBracket, pos }),
            ']' => tokens.push(Token { delim: Delim::CloseBracket, pos }),
            ')' => tokens.push(Token { delim: Delim::CloseParen, pos }),
            '(' => {
                if adjacent(&tokens, Delim::CloseBracket) {
                    if let Some(last) = tokens.last_mut() {
                        *last = Token { delim: Delim::SourceOpen, pos };
                    }
                }
            }
            '`' => {
                tokens.push(Token { delim: Delim::Backtick, pos });
                in_raw = !in_raw;
            }
            '\\' => match chars.next() {
                Some(next) if !in_raw && ESCAPABLE.contains(&next) => {
                    body.push(next);
                    pos += 1;
                    continue;
                }
                Some(next) => {
                    body.push('\\');
                    body.push(next);
                    pos += 2;
                    continue;
                }
                None => {
                    body.push('\\');
                    pos += 1;
                    continue;
                }
            },
            _ => {
                if tokens.last().is_some_and(|t| t.delim == Delim::Dash) {
                    tokens.pop();
                }
            }
        }

        body.push(c);
        pos += 1;
    }

    (body, tokens)
}

// ---------------------------------------------------------------------------
// Resolution passes
// ---------------------------------------------------------------------------

/// Pair backticks into raw spans. Everything between a pair is literal, so
/// the tokens inside are discarded along with the pair. An unmatched
/// backtick is dropped.
fn resolve_raw(tokens: &mut Vec<Token>) -> Vec<Format> {
    let mut formats = Vec::new();
    let mut open: Option<usize> = None;
    let mut i = 0;

    while i < tokens.len() {
        if tokens[i].delim == Delim::Backtick {
            match open {
                None => open = Some(i),
                Some(o) => {
                    formats.push(Format::new(FormatKind::Raw, tokens[o].pos, tokens[i].pos));
                    tokens.drain(o..=i);
                    i = o;
                    open = None;
                    continue;
                }
            }
        }
        i += 1;
    }

    if let Some(o) = open {
        tokens.remove(o);
    }
    formats
}

/// Pair brackets into citation spans, resolving emphasis inside each label
/// on its own. A `[label](source` left open at the end of the text still
/// cites, ending just before the parenthesis.
fn resolve_citations(tokens: &mut Vec<Token>) -> Vec<Format> {
    let mut formats = Vec::new();
    let mut open: Option<usize> = None;
    let mut paren: Option<usize> = None;
    let mut i = 0;

    while i < tokens.len() {
        match (tokens[i].delim, open) {
            (Delim::OpenBracket, _) => {
                open = Some(i);
                paren = None;
            }
            (Delim::CloseBracket, Some(o)) => {
                formats.push(Format::new(FormatKind::Cite, tokens[o].pos, tokens[i].pos));
                formats.extend(resolve_emphasis(&tokens[o..=i]));
                tokens.drain(o..=i);
                i = o;
                open = None;
                paren = None;
                continue;
            }
            (Delim::SourceOpen, None) => paren = None,
            (Delim::SourceOpen, Some(_)) => {
                if paren.is_none() {
                    paren = Some(i);
                }
            }
            (Delim::CloseParen, Some(o)) => {
                if let Some(p) = paren {
                    formats.push(Format::new(FormatKind::Cite, tokens[o].pos, tokens[i].pos));
                    formats.extend(resolve_emphasis(&tokens[o..=p]));
                    tokens.drain(o..=i);
                    i = o;
                    open = None;
                    paren = None;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }

    if let (Some(o), Some(p)) = (open, paren) {
        formats.push(Format::new(
            FormatKind::Cite,
            tokens[o].pos,
            tokens[p].pos - 1,
        ));
    }
    formats
}

/// Pair emphasis delimiters. Each kind pairs the first unmatched occurrence
/// with the next one. Closing any asterisk span forgets every open asterisk
/// delimiter, so `*`, `**` and `***` never cross one another.
fn resolve_emphasis(tokens: &[Token]) -> Vec<Format> {
    let mut formats = Vec::new();
    let mut star: Option<usize> = None;
    let mut double_star: Option<usize> = None;
    let mut triple_star: Option<usize> = None;
    let mut double_dash: Option<usize> = None;
    let mut underscore: Option<usize> = None;

    for token in tokens {
        let Some(kind) = token.delim.emphasis() else {
            continue;
        };
        let slot = match token.delim {
            Delim::Star => &mut star,
            Delim::DoubleStar => &mut double_star,
            Delim::TripleStar => &mut triple_star,
            Delim::DoubleDash => &mut double_dash,
            _ => &mut underscore,
        };
        match slot.take() {
            None => *slot = Some(token.pos),
            Some(begin) => {
                formats.push(Format::new(kind, begin, token.pos));
                if matches!(kind, FormatKind::Italic | FormatKind::Bold | FormatKind::BoldItalic) {
                    star = None;
                    double_star = None;
                    triple_star = None;
                }
            }
        }
    }
    formats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delims(raw: &str) -> Vec<(Delim, usize)> {
        tokenize(raw).1.into_iter().map(|t| (t.delim, t.pos)).collect()
    }

    #[test]
    fn merges_adjacent_asterisks() {
        assert_eq!(
            delims("*a** b***"),
            vec![(Delim::Star, 0), (Delim::DoubleStar, 3), (Delim::TripleStar, 8)]
        );
    }

    #[test]
    fn four_asterisks_split_into_triple_and_single() {
        assert_eq!(
            delims("****"),
            vec![(Delim::TripleStar, 2), (Delim::Star, 3)]
        );
    }

    #[test]
    fn lone_dash_is_dropped_by_following_text() {
        assert_eq!(delims("a - b"), vec![]);
        assert_eq!(delims("--"), vec![(Delim::DoubleDash, 1)]);
    }

    #[test]
    fn paren_only_counts_after_bracket() {
        assert_eq!(
            delims("[a](b)"),
            vec![
                (Delim::OpenBracket, 0),
                (Delim::SourceOpen, 3),
                (Delim::CloseParen, 5)
            ]
        );
        assert_eq!(delims("(b)"), vec![(Delim::CloseParen, 2)]);
    }

    #[test]
    fn escapes_are_removed_from_body() {
        let (body, tokens) = tokenize(r"\*not\* \q");
        assert_eq!(body, r"*not* \q");
        assert!(tokens.is_empty());
    }

    #[test]
    fn escapes_are_kept_inside_raw() {
        let (body, _) = tokenize(r"`\*`");
        assert_eq!(body, r"`\*`");
    }

    #[test]
    fn trailing_backslash_is_literal() {
        let (body, tokens) = tokenize("end\\");
        assert_eq!(body, "end\\");
        assert!(tokens.is_empty());
    }

    #[test]
    fn unmatched_backtick_is_dropped() {
        let mut tokens = tokenize("`a*").1;
        assert!(resolve_raw(&mut tokens).is_empty());
        assert_eq!(tokens, vec![Token { delim: Delim::Star, pos: 2 }]);
    }

    #[test]
    fn asterisk_kinds_do_not_cross() {
        let tokens = tokenize("*aa**bbb***c*dddd**ee***").1;
        assert_eq!(
            resolve_emphasis(&tokens),
            vec![Format::new(FormatKind::Italic, 0, 12)]
        );
    }

    #[test]
    fn unclosed_source_still_cites() {
        let text = format_text("see [a](b");
        assert_eq!(text.formats, vec![Format::new(FormatKind::Cite, 4, 6)]);
    }
}
