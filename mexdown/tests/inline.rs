use std::collections::BTreeSet;

use pretty_assertions::assert_eq;
use rstest::rstest;

use mexdown::{Format, FormatKind, Statement, Text};

use FormatKind::*;

fn spans(list: &[(FormatKind, usize, usize)]) -> Vec<Format> {
    list.iter()
        .map(|&(kind, begin, end)| Format::new(kind, begin, end))
        .collect()
}

/// Parse a single-paragraph document and return its text.
fn paragraph(source: &str) -> Text {
    let document = mexdown::parse(source).expect("parse failed");
    assert_eq!(document.statements.len(), 1, "in {:?}", source);
    match &document.statements[0] {
        Statement::Paragraph(text) => text.clone(),
        other => panic!("expected paragraph, got {}", other.kind_name()),
    }
}

#[rstest]
#[case::bold_italic_over_underline("abc***def_ghi***jkl_", &[(BoldItalic, 5, 15), (Underline, 9, 19)])]
#[case::asterisk_kinds_never_cross("*aa**bbb***c*dddd**ee***", &[(Italic, 0, 12)])]
#[case::three_way_interleave(
    "**a_bbb--cc**dddd_e--",
    &[(Bold, 1, 12), (Underline, 3, 17), (Strikethrough, 8, 20)]
)]
#[case::raw_hides_delimiters("*a`b*c`d*", &[(Italic, 0, 8), (Raw, 2, 6)])]
#[case::emphasis_inside_cite(
    "*a[*a`b*c`d*]b*",
    &[(Italic, 0, 14), (Cite, 2, 12), (Italic, 3, 11), (Raw, 5, 9)]
)]
#[case::sourced_cite(
    "*a[*a`b*c`d*](url)b*",
    &[(Italic, 0, 19), (Cite, 2, 17), (Italic, 3, 11), (Raw, 5, 9)]
)]
#[case::brackets_inside_raw("`[`]`", &[(Raw, 0, 2)])]
#[case::underline_inside_cite(
    "_hi[_hello_]bye_",
    &[(Underline, 0, 15), (Cite, 3, 11), (Underline, 4, 10)]
)]
fn overlapping_spans(#[case] source: &str, #[case] expected: &[(FormatKind, usize, usize)]) {
    let text = paragraph(source);
    assert_eq!(text.body, source);
    assert_eq!(text.formats, spans(expected));
}

#[rstest]
#[case::unknown_escape_kept(r"No \tab", r"No \tab", &[])]
#[case::backtick(r"\`Not Raw`", "`Not Raw`", &[])]
#[case::backslash(r"\\`Raw`", r"\`Raw`", &[(Raw, 1, 5)])]
#[case::octothorpe(r"\#Not Header", "#Not Header", &[])]
#[case::hyphen(r"\--Not Strikethrough--", "--Not Strikethrough--", &[])]
#[case::asterisk(r"\***No Format***", "***No Format***", &[])]
#[case::open_bracket(r"\[Not Cite]", "[Not Cite]", &[])]
#[case::close_bracket(r"[Not Cite\]", "[Not Cite]", &[])]
#[case::open_paren(r"[Direct Cite]\(Not Sourced)", "[Direct Cite](Not Sourced)", &[(Cite, 0, 12)])]
#[case::close_paren(r"[Direct Cite](Not Sourced\)", "[Direct Cite](Not Sourced)", &[(Cite, 0, 12)])]
#[case::underscore(r"\_Not underlined_", "_Not underlined_", &[])]
fn escapes(
    #[case] source: &str,
    #[case] body: &str,
    #[case] expected: &[(FormatKind, usize, usize)],
) {
    let text = paragraph(source);
    assert_eq!(text.body, body);
    assert_eq!(text.formats, spans(expected));
}

/// Characters the formatter treats as escapable outside raw spans.
const ESCAPABLE: &[char] = &['\\', '#', '`', '-', '*', '[', ']', '(', ')', '_'];

/// Positions in a body, split by the role the formatter gave them.
struct Marks {
    chars: Vec<char>,
    delimiters: BTreeSet<usize>,
    sources: BTreeSet<usize>,
    raw: BTreeSet<usize>,
}

fn marks(text: &Text) -> Marks {
    let chars: Vec<char> = text.body.chars().collect();
    let mut delimiters = BTreeSet::new();
    let mut sources = BTreeSet::new();
    let mut raw = BTreeSet::new();

    for format in &text.formats {
        let (begin, end) = (format.begin, format.end);
        let width = match format.kind {
            Cite => {
                delimiters.extend([begin, end]);
                if chars[end] == ')' {
                    let paren = (begin + 1..end)
                        .find(|&i| chars[i] == ']' && chars[i + 1] == '(')
                        .expect("sourced cite without `](`");
                    delimiters.extend([paren, paren + 1]);
                    sources.extend(paren + 2..end);
                }
                continue;
            }
            Bold | Strikethrough => 2,
            BoldItalic => 3,
            Italic | Underline | Raw => 1,
        };
        delimiters.extend(begin + 1 - width..=begin);
        delimiters.extend(end + 1 - width..=end);
        if format.kind == Raw {
            raw.extend(begin + 1..end);
        }
    }

    Marks {
        chars,
        delimiters,
        sources,
        raw,
    }
}

/// Render a body without markup: delimiters and citation sources removed.
fn strip(text: &Text) -> String {
    let marks = marks(text);
    marks
        .chars
        .iter()
        .enumerate()
        .filter(|(i, _)| !marks.delimiters.contains(i) && !marks.sources.contains(i))
        .map(|(_, &c)| c)
        .collect()
}

/// Turn a body back into source: every escapable character that is not a
/// delimiter and not inside a raw span gets a backslash.
fn escape(text: &Text) -> String {
    let marks = marks(text);
    let mut out = String::new();
    for (i, &c) in marks.chars.iter().enumerate() {
        let literal = !marks.delimiters.contains(&i) && !marks.raw.contains(&i);
        if literal && ESCAPABLE.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[rstest]
#[case::bold_italic_over_underline("abc***def_ghi***jkl_", "abcdefghijkl")]
#[case::asterisk_kinds_never_cross("*aa**bbb***c*dddd**ee***", "aa**bbb***cdddd**ee***")]
#[case::three_way_interleave("**a_bbb--cc**dddd_e--", "abbbccdddde")]
#[case::raw_hides_delimiters("*a`b*c`d*", "ab*cd")]
#[case::emphasis_inside_cite("*a[*a`b*c`d*]b*", "aab*cdb")]
#[case::sourced_cite("*a[*a`b*c`d*](url)b*", "aab*cdb")]
#[case::brackets_inside_raw("`[`]`", "[]`")]
#[case::underline_inside_cite("_hi[_hello_]bye_", "hihellobye")]
#[case::unknown_escape_kept(r"No \tab", r"No \tab")]
#[case::backtick(r"\`Not Raw`", "`Not Raw`")]
#[case::backslash(r"\\`Raw`", r"\Raw")]
#[case::octothorpe(r"\#Not Header", "#Not Header")]
#[case::hyphen(r"\--Not Strikethrough--", "--Not Strikethrough--")]
#[case::asterisk(r"\***No Format***", "***No Format***")]
#[case::open_bracket(r"\[Not Cite]", "[Not Cite]")]
#[case::close_bracket(r"[Not Cite\]", "[Not Cite]")]
#[case::open_paren(r"[Direct Cite]\(Not Sourced)", "Direct Cite(Not Sourced)")]
#[case::close_paren(r"[Direct Cite](Not Sourced\)", "Direct Cite(Not Sourced)")]
#[case::underscore(r"\_Not underlined_", "_Not underlined_")]
fn reformatting_is_stable(#[case] source: &str, #[case] plain: &str) {
    let text = Text::parse(source);
    assert_eq!(strip(&text), plain);

    let again = Text::parse(&escape(&text));
    assert_eq!(again.body, text.body);
    assert_eq!(again.formats, text.formats);
}

#[rstest]
#[case::lone_hyphen_is_text("a - b --c--", &[(Strikethrough, 7, 10)])]
#[case::escape_inside_raw_is_literal(r"`a\`b`", &[(Raw, 0, 5)])]
#[case::second_source_closes("[a](b](c)", &[(Cite, 0, 8)])]
#[case::bare_and_sourced_cites("[x] and [y](z) *q*", &[(Cite, 0, 2), (Cite, 8, 13), (Italic, 15, 17)])]
#[case::unclosed_source("see [a](b", &[(Cite, 4, 6)])]
#[case::unpaired_delimiters("*one _two --three `four", &[])]
fn inline_edge_cases(#[case] source: &str, #[case] expected: &[(FormatKind, usize, usize)]) {
    assert_eq!(Text::parse(source).formats, spans(expected));
}

#[test]
fn offsets_count_code_points() {
    let source = "这是第一行。\n这是第二行。\n这里是一[个引用]。\n*这个文本是斜体。*\n**这个文本加粗。**\n***本课文既是粗体和斜体。***\n_这有下划线。_\n--这个文本有删除线。--\n`这是一个原始字符串。`";
    let text = paragraph(source);
    assert_eq!(text.body, source);
    assert_eq!(
        text.formats,
        spans(&[
            (Cite, 18, 22),
            (Italic, 25, 34),
            (Bold, 37, 46),
            (BoldItalic, 50, 64),
            (Underline, 66, 73),
            (Strikethrough, 76, 87),
            (Raw, 89, 100),
        ])
    );
}

#[test]
fn escaped_math_symbols() {
    let text = paragraph("∀x ∈ ∑\\*, (y)");
    assert_eq!(text.body, "∀x ∈ ∑*, (y)");
    assert!(text.formats.is_empty());
    assert!(Text::parse("").is_empty());
}

#[test]
fn slice_returns_delimited_text() {
    let text = Text::parse("这是*斜体*和**粗**");
    assert_eq!(text.char_len(), 12);
    let italic = text.formats_of(Italic).next().expect("italic span");
    assert_eq!(text.slice(italic), Some("*斜体*"));
    let bold = text.formats_of(Bold).next().expect("bold span");
    assert_eq!(text.slice(bold), Some("*粗**"));
    assert_eq!(text.slice(&Format::new(Raw, 3, 99)), None);
}

#[test]
fn overlap_excludes_nesting() {
    let outer = Format::new(Italic, 0, 10);
    let inner = Format::new(Bold, 2, 5);
    let crossing = Format::new(Underline, 8, 12);
    let apart = Format::new(Raw, 11, 14);
    assert!(!outer.overlaps(&inner));
    assert!(outer.overlaps(&crossing));
    assert!(crossing.overlaps(&outer));
    assert!(!outer.overlaps(&apart));
}

#[rstest]
#[case("italic", Italic)]
#[case("bold_italic", BoldItalic)]
#[case("Bold-Italic", BoldItalic)]
#[case(" strikethrough ", Strikethrough)]
fn format_kind_names(#[case] name: &str, #[case] kind: FormatKind) {
    assert_eq!(name.parse::<FormatKind>(), Ok(kind));
}

#[test]
fn unknown_format_kind() {
    let err = "blink".parse::<FormatKind>().unwrap_err();
    assert_eq!(err.to_string(), "unknown format kind: blink");
}
