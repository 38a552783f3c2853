use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use procsql::Procedure;
use procsql::block::BlockId;
use validator::{DiagnosticError, Validator, ValidatorConfig};

use crate::parent_dir;

#[derive(Debug, Deserialize)]
pub struct ExpectedResolution {
    /// Pre-order index of the block the label should resolve to; omitted
    /// when the label should not resolve.
    #[serde(default)]
    pub block: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Expectations {
    /// Substrings of the expected errors, in order. No entry means no errors.
    #[serde(default)]
    pub errors: Vec<String>,

    /// Expected warnings. If present (even empty), warning count and content are checked.
    #[serde(default)]
    pub warnings: Option<Vec<String>>,

    /// Expected outcome of every LEAVE/ITERATE, in source order.
    #[serde(default)]
    pub resolutions: Option<Vec<ExpectedResolution>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestFile {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub config: ValidatorConfig,

    #[serde(default)]
    pub expect: Expectations,

    /// The procedure under test, inline.
    #[serde(default)]
    pub procedure: Option<Procedure>,

    /// The procedure under test, as a document relative to the test file.
    #[serde(default)]
    pub procedure_file: Option<PathBuf>,
}

impl TestFile {
    fn into_procedure(self, test_path: &Path) -> Result<(Procedure, ValidatorConfig, Expectations), String> {
        let procedure = match (self.procedure, self.procedure_file) {
            (Some(procedure), None) => procedure,
            (None, Some(file)) => {
                Procedure::load(parent_dir(test_path).join(file)).map_err(|e| e.to_string())?
            }
            (Some(_), Some(_)) => {
                return Err("both [procedure] and procedure-file are given".into());
            }
            (None, None) => return Err("missing [procedure] or procedure-file".into()),
        };
        Ok((procedure, self.config, self.expect))
    }
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

impl TestResult {
    fn label(&self) -> &str {
        self.description.as_deref().unwrap_or_else(|| {
            self.path
                .file_name()
                .and_then(|s| s.to_str())
                .and_then(|s| s.strip_suffix(".test.toml"))
                .unwrap_or("?")
        })
    }
}

fn run_single_test(path: &Path) -> TestResult {
    let mut description = None;
    let outcome = match check_test_file(path, &mut description) {
        Ok(()) => TestOutcome::Pass,
        Err(reason) => TestOutcome::Fail(reason),
    };
    TestResult {
        path: path.to_path_buf(),
        description,
        outcome,
    }
}

fn check_test_file(path: &Path, description: &mut Option<String>) -> Result<(), String> {
    let content =
        std::fs::read_to_string(path).map_err(|e| format!("cannot read file: {}", e))?;
    let test: TestFile = toml::from_str(&content).map_err(|e| format!("TOML parse error: {}", e))?;
    *description = test.description.clone();

    let (mut procedure, config, expect) = test.into_procedure(path)?;

    let (errors, warnings) = match Validator::new(config).validate(&mut procedure) {
        Ok(warnings) => (Vec::new(), warnings),
        Err(diagnostics) => diagnostics.into_iter().partition(|d| !d.is_warning),
    };

    check_messages("error", &errors, &expect.errors)?;
    if let Some(expected) = &expect.warnings {
        check_messages("warning", &warnings, expected)?;
    }
    if let Some(expected) = &expect.resolutions {
        check_resolutions(&procedure, expected)?;
    }
    Ok(())
}

/// Check that diagnostics match the expected message substrings, in order.
fn check_messages(kind: &str, actual: &[DiagnosticError], expected: &[String]) -> Result<(), String> {
    if actual.len() != expected.len() {
        let actual_msgs: Vec<String> = actual.iter().map(|d| format!("  - {}", d)).collect();
        return Err(format!(
            "expected {} {}(s), got {}\n  actual {}s:\n{}",
            expected.len(),
            kind,
            actual.len(),
            kind,
            if actual_msgs.is_empty() {
                "    (none)".to_string()
            } else {
                actual_msgs.join("\n")
            }
        ));
    }

    for (i, (diag, want)) in actual.iter().zip(expected).enumerate() {
        let msg = diag.to_string();
        if !msg.contains(want.as_str()) {
            return Err(format!(
                "{}[{}]: expected message containing \"{}\", got: {}",
                kind, i, want, msg
            ));
        }
    }
    Ok(())
}

fn check_resolutions(procedure: &Procedure, expected: &[ExpectedResolution]) -> Result<(), String> {
    let actual = Validator::resolutions(procedure);
    if actual.len() != expected.len() {
        return Err(format!(
            "expected {} LEAVE/ITERATE statement(s), found {}",
            expected.len(),
            actual.len()
        ));
    }
    for (i, ((kind, target, resolution), want)) in actual.iter().zip(expected).enumerate() {
        let want = want.block.map(BlockId::new);
        if resolution.block() != want {
            let show = |id: Option<BlockId>| id.map_or("not found".to_string(), |id| id.to_string());
            return Err(format!(
                "resolution[{}]: {} {} expected {}, got {}",
                i,
                kind,
                target,
                show(want),
                show(resolution.block())
            ));
        }
    }
    Ok(())
}

/// Discover `.test.toml` files grouped by category (subfolder relative to root).
/// Files directly in `root` get category "" (uncategorized).
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    if root.is_file() {
        categories.insert(String::new(), vec![root.to_path_buf()]);
        return categories;
    }
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
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.ends_with(".test.toml"))
        {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no .test.toml files found in {}", path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        let label = if cat.is_empty() { "(root)" } else { cat.as_str() };
        eprintln!("  {} ({} tests)", label, files.len());
    }
}

fn paint(text: &str, code: &str, no_color: bool) -> String {
    if no_color {
        text.to_string()
    } else {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    }
}

/// Keep the categories named in `requested` (and their subfolders), or all
/// of them when nothing was requested.
fn select_categories<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a Vec<PathBuf>> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v)).collect();
    }
    let mut selected = BTreeMap::new();
    for req in requested {
        let req = req.trim_matches('/');
        let before = selected.len();
        for (cat, files) in all {
            if cat == req || cat.starts_with(&format!("{}/", req)) {
                selected.insert(cat.as_str(), files);
            }
        }
        if selected.len() == before {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                req,
                all.keys()
                    .map(|k| if k.is_empty() { "(root)" } else { k.as_str() })
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    selected
}

/// Outcome of a test run, printed once every selected case has run.
#[derive(Default)]
struct Report {
    passed: usize,
    failures: Vec<TestResult>,
}

impl Report {
    fn record(&mut self, result: TestResult, no_color: bool) {
        match result.outcome {
            TestOutcome::Pass => {
                eprintln!("  {}  {}", paint("PASS", "32", no_color), result.label());
                self.passed += 1;
            }
            TestOutcome::Fail(_) => {
                eprintln!("  {}  {}", paint("FAIL", "31", no_color), result.label());
                self.failures.push(result);
            }
        }
    }

    /// Print failure details and the summary line; returns the exit code.
    fn finish(self, no_color: bool) -> i32 {
        for failure in &self.failures {
            let TestOutcome::Fail(reason) = &failure.outcome else {
                continue;
            };
            eprintln!();
            eprintln!("{} {}", paint("failed:", "31", no_color), failure.path.display());
            reason.lines().for_each(|line| eprintln!("    {}", line));
        }

        eprintln!();
        let failed = self.failures.len();
        let status = if failed == 0 {
            paint("ok", "32", no_color)
        } else {
            paint("FAILED", "31", no_color)
        };
        eprintln!("test result: {}. {} passed, {} failed", status, self.passed, failed);
        if failed == 0 { 0 } else { 1 }
    }
}

/// Run the `.test.toml` cases under `path` (a directory or a single file),
/// limited to `categories` when any are given. Returns the process exit code.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let discovered = discover_categorized(path);
    if discovered.is_empty() {
        eprintln!("no .test.toml files found in {}", path.display());
        return 1;
    }

    let single_file = path.is_file();
    let requested: &[String] = if single_file { &[] } else { categories };
    let selected = select_categories(&discovered, requested);
    if selected.is_empty() {
        eprintln!("none of the requested categories exist");
        return 1;
    }

    let mut report = Report::default();
    for (category, files) in selected {
        if !single_file {
            let heading = if category.is_empty() { "(root)" } else { category };
            eprintln!("\n{}", paint(heading, "1", no_color));
        }
        for file in files {
            report.record(run_single_test(file), no_color);
        }
    }
    report.finish(no_color)
}
