use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use mexdown::{Document, FormatKind, ParseError, Statement, Text};

#[derive(Debug, Deserialize)]
pub struct ExpectedError {
    /// Substring that must appear in the error message.
    pub contains: String,

    /// If set, the error's span must start on this 1-based source line.
    #[serde(default)]
    pub line: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ExpectedText {
    /// 0-based statement index.
    pub statement: usize,

    /// 0-based item index, required when the statement is a list.
    #[serde(default)]
    pub item: Option<usize>,

    /// Expected unescaped body.
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct ExpectedSpan {
    pub statement: usize,

    #[serde(default)]
    pub item: Option<usize>,

    /// Format kind name, e.g. "italic" or "bold_italic".
    pub kind: String,

    pub begin: usize,
    pub end: usize,
}

#[derive(Debug, Deserialize)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Expected statement kinds, in order.
    #[serde(default)]
    pub statements: Option<Vec<String>>,

    /// Expected parse errors. If present (even empty), error count and content are checked.
    #[serde(default)]
    pub errors: Option<Vec<ExpectedError>>,

    /// If true, the test expects the strict parse to fail.
    #[serde(default)]
    pub expect_parse_error: bool,

    /// Expected citation map. If present, it must match exactly.
    #[serde(default)]
    pub citations: Option<BTreeMap<String, String>>,

    #[serde(default)]
    pub texts: Vec<ExpectedText>,

    /// Formatting spans that must be present.
    #[serde(default)]
    pub spans: Vec<ExpectedSpan>,
}

/// Parse a `.test.mx` file into its TOML config and mexdown source.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}'); // strip BOM

    if !content.starts_with("---") {
        return Err("missing opening --- frontmatter delimiter".into());
    }

    let after_open = &content[3..];
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close_pos = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;

    let toml_str = after_open[..close_pos].trim_end_matches('\r');
    let rest_start = close_pos + 4; // skip \n---
    let source = after_open[rest_start..]
        .strip_prefix("\r\n")
        .or_else(|| after_open[rest_start..].strip_prefix('\n'))
        .unwrap_or(&after_open[rest_start..]);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, source))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

fn run_single_test(path: &Path) -> TestResult {
    // 1. Read file
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("cannot read file: {}", e)),
            };
        }
    };

    // 2. Parse frontmatter
    let (config, source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("frontmatter error: {}", e)),
            };
        }
    };

    let description = config.description.clone();
    let outcome = match check(&config, source) {
        None => TestOutcome::Pass,
        Some(reason) => TestOutcome::Fail(reason),
    };

    TestResult {
        path: path.to_path_buf(),
        description,
        outcome,
    }
}

/// Parse `source` and compare against every expectation in `config`.
/// Returns `Some(reason)` on the first mismatch.
fn check(config: &TestConfig, source: &str) -> Option<String> {
    let parser = mexdown::Parser::new(source.to_string(), 0);
    let parsed = parser.parse_lenient();

    if config.expect_parse_error {
        if !parsed.has_errors() {
            return Some("expected parse error, but parsing succeeded".into());
        }
    } else if parsed.has_errors() && config.errors.is_none() {
        let msgs: Vec<&str> = parsed.errors.iter().map(|e| e.message.as_str()).collect();
        return Some(format!("unexpected parse error: {}", msgs.join("; ")));
    }

    if let Some(expected_errors) = &config.errors {
        if let Some(reason) = check_errors(source, &parsed.errors, expected_errors) {
            return Some(reason);
        }
    }

    let document = &parsed.document;

    if let Some(expected) = &config.statements {
        let actual: Vec<&str> = document.statements.iter().map(Statement::kind_name).collect();
        if actual != *expected {
            return Some(format!(
                "statement mismatch\n  expected: [{}]\n  actual:   [{}]",
                expected.join(", "),
                actual.join(", ")
            ));
        }
    }

    if let Some(expected) = &config.citations {
        if document.citations != *expected {
            return Some(format!(
                "citation mismatch\n  expected: {:?}\n  actual:   {:?}",
                expected, document.citations
            ));
        }
    }

    for expected in &config.texts {
        let text = match text_at(document, expected.statement, expected.item) {
            Ok(text) => text,
            Err(reason) => return Some(reason),
        };
        if text.body != expected.body {
            return Some(format!(
                "body mismatch in statement {}\n  expected: {:?}\n  actual:   {:?}",
                expected.statement, expected.body, text.body
            ));
        }
    }

    for expected in &config.spans {
        let kind: FormatKind = match expected.kind.parse() {
            Ok(kind) => kind,
            Err(e) => return Some(format!("bad span expectation: {}", e)),
        };
        let text = match text_at(document, expected.statement, expected.item) {
            Ok(text) => text,
            Err(reason) => return Some(reason),
        };
        let found = text
            .formats_of(kind)
            .any(|f| f.begin == expected.begin && f.end == expected.end);
        if !found {
            let actual: Vec<String> = text.formats.iter().map(|f| f.to_string()).collect();
            return Some(format!(
                "missing span {} {}..{} in statement {}\n  actual spans: [{}]",
                kind,
                expected.begin,
                expected.end,
                expected.statement,
                actual.join(", ")
            ));
        }
    }

    None
}

/// Locate the formatted text a `texts`/`spans` expectation refers to.
fn text_at(document: &Document, statement: usize, item: Option<usize>) -> Result<&Text, String> {
    let Some(found) = document.statements.get(statement) else {
        return Err(format!(
            "statement {} does not exist ({} statements)",
            statement,
            document.statements.len()
        ));
    };
    match (found, item) {
        (Statement::List(list), Some(item)) => list
            .items
            .get(item)
            .map(|i| &i.text)
            .ok_or_else(|| format!("statement {} has no item {}", statement, item)),
        (Statement::List(_), None) => {
            Err(format!("statement {} is a list; an item index is required", statement))
        }
        (other, None) => other.text().ok_or_else(|| {
            format!("statement {} is a {} and has no text", statement, other.kind_name())
        }),
        (other, Some(_)) => Err(format!(
            "statement {} is a {}, not a list",
            statement,
            other.kind_name()
        )),
    }
}

/// Convert a byte offset in `source` to a 1-based line number.
fn byte_offset_to_line(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())]
        .bytes()
        .filter(|&b| b == b'\n')
        .count()
        + 1
}

/// Check that actual errors match expectations. Returns `Some(reason)` on mismatch.
fn check_errors(source: &str, errors: &[ParseError], expected: &[ExpectedError]) -> Option<String> {
    if errors.len() != expected.len() {
        let actual_msgs: Vec<String> = errors.iter().map(|e| format!("  - {}", e)).collect();
        return Some(format!(
            "expected {} error(s), got {}\n  actual errors:\n{}",
            expected.len(),
            errors.len(),
            if actual_msgs.is_empty() {
                "    (none)".to_string()
            } else {
                actual_msgs.join("\n")
            }
        ));
    }

    for (i, (actual, expected)) in errors.iter().zip(expected.iter()).enumerate() {
        let msg = actual.to_string();

        if !msg.contains(&expected.contains) {
            return Some(format!(
                "error[{}]: expected message containing \"{}\", got: {}",
                i, expected.contains, msg
            ));
        }

        if let Some(expected_line) = expected.line {
            let actual_line = byte_offset_to_line(source, actual.span.start);
            if actual_line != expected_line {
                return Some(format!(
                    "error[{}]: expected on line {}, but span is on line {}",
                    i, expected_line, actual_line
                ));
            }
        }
    }

    None
}

/// Discover `.test.mx` files grouped by category, the sub-directory relative
/// to `root` ("" for files directly inside it). Categories and files sort.
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|entry| entry.path()) {
        if path.is_dir() {
            collect_tests(&path, root, out);
            continue;
        }
        let is_fixture = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".test.mx"));
        if is_fixture {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no .test.mx files found in {}", path.display());
        return;
    }

    eprintln!("available categories:");
    for (category, files) in &categories {
        eprintln!("  {} ({} tests)", category_label(category), files.len());
    }
}

/// Terminal styling for the report.
struct Style {
    no_color: bool,
}

impl Style {
    fn paint(&self, code: &str, s: &str) -> String {
        if self.no_color {
            s.to_string()
        } else {
            format!("\x1b[{}m{}\x1b[0m", code, s)
        }
    }

    fn pass(&self) -> String {
        self.paint("32", "PASS")
    }

    fn fail(&self) -> String {
        self.paint("31", "FAIL")
    }

    fn bold(&self, s: &str) -> String {
        self.paint("1", s)
    }
}

/// Tally of a run, printed once every file has been checked.
#[derive(Default)]
struct Report {
    passed: usize,
    failures: Vec<TestResult>,
}

impl Report {
    fn record(&mut self, result: TestResult, style: &Style) {
        let label = result.description.clone().unwrap_or_else(|| {
            result
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("?")
                .to_string()
        });
        if matches!(result.outcome, TestOutcome::Pass) {
            self.passed += 1;
            eprintln!("  {}  {}", style.pass(), label);
        } else {
            eprintln!("  {}  {}", style.fail(), label);
            self.failures.push(result);
        }
    }

    /// Print failure details and the summary line; returns the exit code.
    fn finish(self, style: &Style) -> i32 {
        if !self.failures.is_empty() {
            eprintln!();
            eprintln!("failures:");
            for failure in &self.failures {
                eprintln!();
                eprintln!("  --- {} ---", failure.path.display());
                if let TestOutcome::Fail(reason) = &failure.outcome {
                    for line in reason.lines() {
                        eprintln!("  {}", line);
                    }
                }
            }
        }

        eprintln!();
        let failed = self.failures.len();
        if failed == 0 {
            eprintln!("test result: {}. {} passed, 0 failed", style.paint("32", "ok"), self.passed);
            0
        } else {
            eprintln!(
                "test result: {}. {} passed, {} failed (of {})",
                style.paint("31", "FAILED"),
                self.passed,
                failed,
                self.passed + failed
            );
            1
        }
    }
}

/// Run all `.test.mx` files under `path` (or a single file).
/// If `categories` is non-empty, only run tests in those categories.
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let style = Style { no_color };
    let mut report = Report::default();

    // Single file mode: categories do not apply
    if path.is_file() {
        report.record(run_single_test(path), &style);
        return report.finish(&style);
    }

    let all_categories = discover_categorized(path);
    if all_categories.is_empty() {
        eprintln!("no .test.mx files found in {}", path.display());
        return 1;
    }

    let selected: BTreeMap<&str, &Vec<PathBuf>> = if categories.is_empty() {
        all_categories.iter().map(|(k, v)| (k.as_str(), v)).collect()
    } else {
        let mut filtered = BTreeMap::new();
        for requested in categories {
            let requested = requested.trim_matches('/');
            let nested = format!("{}/", requested);
            let mut found = false;
            for (category, files) in &all_categories {
                if category == requested || category.starts_with(&nested) {
                    filtered.insert(category.as_str(), files);
                    found = true;
                }
            }
            if !found {
                let available: Vec<&str> =
                    all_categories.keys().map(|k| category_label(k)).collect();
                eprintln!(
                    "warning: category '{}' not found (available: {})",
                    requested,
                    available.join(", ")
                );
            }
        }
        filtered
    };

    if selected.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    for (category, files) in &selected {
        eprintln!();
        eprintln!("{}", style.bold(category_label(category)));
        for file in *files {
            report.record(run_single_test(file), &style);
        }
    }

    report.finish(&style)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_front_matter_from_source() {
        let (config, source) =
            parse_test_file("---\ndescription = \"x\"\nstatements = [\"header\"]\n---\n# Title\n")
                .unwrap();
        assert_eq!(config.description.as_deref(), Some("x"));
        assert_eq!(source, "# Title\n");
    }

    #[test]
    fn missing_front_matter_is_reported() {
        assert!(parse_test_file("# Title").is_err());
    }

    #[test]
    fn line_numbers_are_one_based() {
        assert_eq!(byte_offset_to_line("a\nb\nc", 0), 1);
        assert_eq!(byte_offset_to_line("a\nb\nc", 4), 3);
    }

    #[test]
    fn fixture_tree_passes() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../tests");
        assert_eq!(run_tests(&root, true, &[]), 0);
    }
}
