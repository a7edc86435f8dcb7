//! Prompt builders for the Fixer's provider calls.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever preamble content
//! changes, so a trace record can be tied to the prompt that produced it.

pub const PROMPT_VERSION: &str = "1.2.0";

/// System preamble for the source-rewrite call.
pub const FIXER_PREAMBLE: &str = "\
You are an expert senior software engineer repairing a buggy Python module. \
You will receive the module's current source and a static-analysis summary. \
Rewrite the module so the reported defects are fixed while preserving its \
public API (function and class names and signatures). \
Return ONLY the complete corrected Python source for the module — no prose, \
no explanations, no markdown fences.";

/// System preamble for the test-generation call.
pub const TESTGEN_PREAMBLE: &str = "\
You are an expert Python test engineer. You will receive a Python module's \
source. Write a pytest test module for it that imports the module's public \
functions and classes and exercises their core behavior. Call the functions \
under test — never redefine them. \
Return ONLY the complete Python test source — no prose, no markdown fences.";

/// User prompt for a source rewrite.
pub fn rewrite_prompt(file_name: &str, source: &str, lint_summary: &str) -> String {
    let mut prompt = format!("# File: {file_name}\n\n");
    if !lint_summary.is_empty() {
        prompt.push_str("## Static analysis\n");
        prompt.push_str(lint_summary);
        prompt.push_str("\n\n");
    }
    prompt.push_str("## Current source\n");
    prompt.push_str(source);
    prompt
}

/// User prompt for a companion test module.
pub fn testgen_prompt(file_name: &str, source: &str) -> String {
    format!("# Module: {file_name}\n\n## Source\n{source}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrite_prompt_includes_lint_when_present() {
        let with = rewrite_prompt("calc.py", "def add(): ...", "score 4.0/10");
        assert!(with.contains("## Static analysis"));
        assert!(with.contains("score 4.0/10"));

        let without = rewrite_prompt("calc.py", "def add(): ...", "");
        assert!(!without.contains("## Static analysis"));
        assert!(without.contains("def add"));
    }
}
