//! Test-repair helpers for the Fixer.
//!
//! Two deterministic generators plus the syntax-validation seam:
//! - a placeholder test module for files with no companion tests, and
//! - an import/setup scaffold regenerated from a scan of the module's public
//!   symbols, used after a collection error so the scaffold can never import
//!   a symbol unrelated to the real module.
//!
//! Generated files carry a marker comment so a later pass can tell our own
//! scaffolds from hand-written test files; hand-written, syntactically valid
//! test files are never overwritten.

use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;

/// First line of every file this module generates.
pub const GENERATED_MARKER: &str = "# generated by refactor-swarm";

/// Syntax gate for generated Python code. Malformed generated code is
/// discarded before any write reaches the filesystem.
pub trait SourceValidator: Send + Sync {
    fn is_valid(&self, source: &str) -> bool;
}

/// Validates by byte-compiling with the system Python.
pub struct PyCompileValidator;

impl SourceValidator for PyCompileValidator {
    fn is_valid(&self, source: &str) -> bool {
        let Ok(dir) = tempfile_dir() else {
            return false;
        };
        let path = dir.join("candidate.py");
        if std::fs::write(&path, source).is_err() {
            return false;
        }
        let result = Command::new("python3")
            .args(["-m", "py_compile"])
            .arg(&path)
            .output();
        let _ = std::fs::remove_file(&path);
        matches!(result, Ok(output) if output.status.success())
    }
}

fn tempfile_dir() -> std::io::Result<std::path::PathBuf> {
    let dir = std::env::temp_dir().join(format!("refactor-swarm-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Whether existing content was generated by us.
pub fn is_generated(content: &str) -> bool {
    content.lines().next().is_some_and(|l| l.trim() == GENERATED_MARKER)
}

/// Whether a test module would collect anything under pytest.
pub fn has_collected_tests(content: &str) -> bool {
    content
        .lines()
        .any(|line| line.trim_start().starts_with("def test_"))
}

fn symbol_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(?:def|class)\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap())
}

/// Top-level public `def`/`class` names of a module, in declaration order.
///
/// Only column-zero definitions count (methods and nested helpers are
/// indented) and leading-underscore names are private by convention.
pub fn public_symbols(module_source: &str) -> Vec<String> {
    symbol_regex()
        .captures_iter(module_source)
        .map(|cap| cap[1].to_string())
        .filter(|name| !name.starts_with('_'))
        .collect()
}

fn module_name(module: &Path) -> String {
    module
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Minimal placeholder test module: imports the target and asserts the import
/// held. Guarantees the next test run collects at least one test, so the loop
/// can never see `no_tests_collected` twice for the same file without a write
/// in between.
pub fn placeholder_test_module(module: &Path) -> String {
    let name = module_name(module);
    format!(
        "{GENERATED_MARKER}\n\
         \"\"\"Placeholder tests for {name}.py — replaced once real tests exist.\"\"\"\n\
         import {name}\n\
         \n\
         \n\
         def test_{name}_imports():\n\
         \x20\x20\x20\x20assert {name} is not None\n"
    )
}

/// Regenerate the import/setup scaffold from the module's actual public
/// symbols. Deterministic by construction, never free-form generation.
pub fn scaffold_test_module(module: &Path, module_source: &str) -> String {
    let name = module_name(module);
    let symbols = public_symbols(module_source);
    if symbols.is_empty() {
        return placeholder_test_module(module);
    }

    let mut out = format!(
        "{GENERATED_MARKER}\n\
         \"\"\"Import scaffold for {name}.py, regenerated from its public symbols.\"\"\"\n\
         from {name} import {}\n",
        symbols.join(", ")
    );
    for symbol in &symbols {
        out.push_str(&format!(
            "\n\ndef test_{symbol}_is_defined():\n\x20\x20\x20\x20assert {symbol} is not None\n"
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn public_symbols_top_level_only() {
        let source = "import os\n\
                      def add(a, b):\n    return a + b\n\
                      class Calculator:\n\
                      \x20\x20\x20\x20def multiply(self, a, b):\n\
                      \x20\x20\x20\x20\x20\x20\x20\x20return a * b\n\
                      def _helper():\n    pass\n";
        assert_eq!(public_symbols(source), vec!["add", "Calculator"]);
    }

    #[test]
    fn placeholder_imports_module_and_collects() {
        let module = PathBuf::from("sandbox/calc.py");
        let placeholder = placeholder_test_module(&module);
        assert!(placeholder.starts_with(GENERATED_MARKER));
        assert!(placeholder.contains("import calc"));
        assert!(has_collected_tests(&placeholder));
    }

    #[test]
    fn scaffold_imports_exactly_the_public_symbols() {
        let module = PathBuf::from("calc.py");
        let source = "def add(a, b): ...\nclass Calc: ...\ndef _private(): ...\n";
        let scaffold = scaffold_test_module(&module, source);
        assert!(scaffold.contains("from calc import add, Calc"));
        assert!(!scaffold.contains("_private"));
        assert!(has_collected_tests(&scaffold));
    }

    #[test]
    fn scaffold_without_symbols_falls_back_to_placeholder() {
        let module = PathBuf::from("empty.py");
        let scaffold = scaffold_test_module(&module, "# nothing here\n");
        assert!(scaffold.contains("import empty"));
    }

    #[test]
    fn generated_marker_detection() {
        assert!(is_generated(&placeholder_test_module(Path::new("m.py"))));
        assert!(!is_generated("import pytest\n"));
    }

    #[test]
    fn collected_test_detection() {
        assert!(has_collected_tests("def test_x():\n    pass\n"));
        assert!(!has_collected_tests("def helper():\n    pass\n"));
        assert!(!has_collected_tests(""));
    }
}
