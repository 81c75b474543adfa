use super::*;
use crate::kernel::buffer::BufferId;
use ropey::Rope;
use tree_sitter::Tree;

fn python(text: &str) -> BufferSnapshot {
    BufferSnapshot::new(BufferId::new(1), LanguageId::Python, text)
}

fn plain(text: &str) -> BufferSnapshot {
    BufferSnapshot::new(BufferId::new(1), LanguageId::PlainText, text)
}

fn engine() -> DiagnosticsEngine {
    DiagnosticsEngine::new(DiagnosticsConfig::default())
}

fn with_code<'a>(diagnostics: &'a [Diagnostic], code: &str) -> Vec<&'a Diagnostic> {
    diagnostics.iter().filter(|d| d.code == code).collect()
}

fn anchored(snapshot: &BufferSnapshot, diagnostics: &[&Diagnostic]) -> Vec<String> {
    diagnostics
        .iter()
        .map(|d| snapshot.slice(&d.span).unwrap())
        .collect()
}

#[test]
fn test_syntax_error_is_a_diagnostic_not_a_failure() {
    let snapshot = python("def broken(:\n    value = 1   \n");
    let diagnostics = engine().analyze(&snapshot).unwrap();

    let errors = with_code(&diagnostics, "syntax-error");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].severity, Severity::Error);
    assert!(!errors[0].fix.is_empty());
    let pos = snapshot.index().offset_to_position(errors[0].span.start).unwrap();
    assert_eq!(pos.line, 0);

    // Tree checks are skipped, line checks still run.
    assert!(with_code(&diagnostics, "unused-variable").is_empty());
    assert_eq!(with_code(&diagnostics, "trailing-whitespace").len(), 1);
}

#[test]
fn test_syntax_error_in_other_grammars() {
    let snapshot = BufferSnapshot::new(BufferId::new(2), LanguageId::Rust, "fn main( {}\n");
    let diagnostics = engine().analyze(&snapshot).unwrap();
    assert_eq!(with_code(&diagnostics, "syntax-error").len(), 1);
}

#[test]
fn test_plain_text_gets_line_checks_only() {
    let snapshot = plain("def broken(:\nimport os\n");
    let diagnostics = engine().analyze(&snapshot).unwrap();
    assert!(diagnostics.is_empty());
}

#[test]
fn test_unused_variables_and_imports() {
    let snapshot = python(concat!(
        "from __future__ import annotations\n",
        "import os\n",
        "import sys as system\n",
        "import os.path as osp\n",
        "from collections import OrderedDict, defaultdict\n",
        "from typing import *\n",
        "\n",
        "def main():\n",
        "    unused = 1\n",
        "    used = 2\n",
        "    _ = 3\n",
        "    return used + len(defaultdict.__name__) + len(osp.sep)\n",
    ));
    let diagnostics = engine().analyze(&snapshot).unwrap();

    let imports = with_code(&diagnostics, "unused-import");
    assert_eq!(
        anchored(&snapshot, &imports),
        vec!["os", "sys as system", "OrderedDict"]
    );
    assert!(imports.iter().all(|d| d.severity == Severity::Warning));
    assert_eq!(imports[1].message, "`sys as system` imported but never used");

    let variables = with_code(&diagnostics, "unused-variable");
    assert_eq!(anchored(&snapshot, &variables), vec!["unused"]);
}

#[test]
fn test_unused_import_fix_removes_single_name_statement() {
    let snapshot = python("import os\nimport json, re\nprint(re)\n");
    let diagnostics = engine().analyze(&snapshot).unwrap();
    let imports = with_code(&diagnostics, "unused-import");
    assert_eq!(anchored(&snapshot, &imports), vec!["os", "json"]);

    let (span, text) = imports[0].fix[0].edit.clone().unwrap();
    assert_eq!(snapshot.slice(&span).unwrap(), "import os");
    assert_eq!(text, "");
    assert!(imports[1].fix[0].edit.is_none());
}

#[test]
fn test_attribute_access_counts_as_use() {
    let snapshot = python(concat!(
        "class Point:\n",
        "    x = 0\n",
        "\n",
        "def show(p):\n",
        "    return p.x\n",
    ));
    let diagnostics = engine().analyze(&snapshot).unwrap();
    assert!(with_code(&diagnostics, "unused-variable").is_empty());
}

#[test]
fn test_ignored_names_are_not_reported() {
    let config = DiagnosticsConfig {
        ignored_names: vec!["scratch".to_string()],
        ..DiagnosticsConfig::default()
    };
    let snapshot = python("scratch = 1\n__all__ = []\n");
    let diagnostics = DiagnosticsEngine::new(config).analyze(&snapshot).unwrap();
    assert!(with_code(&diagnostics, "unused-variable").is_empty());
}

#[test]
fn test_while_true_without_break() {
    let snapshot = python(concat!(
        "while True:\n",
        "    for item in range(3):\n",
        "        break\n",
        "while True:\n",
        "    break\n",
        "def serve():\n",
        "    while True:\n",
        "        return 1\n",
    ));
    let diagnostics = engine().analyze(&snapshot).unwrap();
    let loops = with_code(&diagnostics, "infinite-loop");
    assert_eq!(anchored(&snapshot, &loops), vec!["while True"]);
    assert_eq!(loops[0].span.start, 0);
    assert_eq!(loops[0].severity, Severity::Warning);
}

#[test]
fn test_python2_print_statement() {
    let snapshot = python("print 'hello'\n");
    let diagnostics = engine().analyze(&snapshot).unwrap();
    let prints = with_code(&diagnostics, "print-statement");
    assert_eq!(prints.len(), 1);
    assert_eq!(prints[0].severity, Severity::Error);

    let (span, text) = prints[0].fix[0].edit.clone().unwrap();
    assert_eq!(snapshot.slice(&span).unwrap(), "print 'hello'");
    assert_eq!(text, "print('hello')");
}

#[test]
fn test_print_call_is_fine() {
    let diagnostics = engine().analyze(&python("print('hello')\n")).unwrap();
    assert!(with_code(&diagnostics, "print-statement").is_empty());
}

#[test]
fn test_singleton_comparisons() {
    let snapshot = python(concat!(
        "value = None\n",
        "if value == None:\n",
        "    pass\n",
        "if value != True:\n",
        "    pass\n",
    ));
    let diagnostics = engine().analyze(&snapshot).unwrap();
    let comparisons = with_code(&diagnostics, "singleton-comparison");
    assert_eq!(
        anchored(&snapshot, &comparisons),
        vec!["value == None", "value != True"]
    );
    assert!(comparisons
        .iter()
        .all(|d| d.severity == Severity::Suggestion));

    let (span, text) = comparisons[0].fix[0].edit.clone().unwrap();
    assert_eq!(snapshot.slice(&span).unwrap(), "==");
    assert_eq!(text, "is");
    assert!(comparisons[1].fix[0].edit.is_none());
}

#[test]
fn test_naming_conventions() {
    let snapshot = python(concat!(
        "def doThing():\n",
        "    pass\n",
        "class my_class:\n",
        "    def __init__(self):\n",
        "        pass\n",
    ));
    let diagnostics = engine().analyze(&snapshot).unwrap();

    let functions = with_code(&diagnostics, "function-naming");
    assert_eq!(anchored(&snapshot, &functions), vec!["doThing"]);
    assert_eq!(functions[0].fix[0].message, "rename to `do_thing`");

    let classes = with_code(&diagnostics, "class-naming");
    assert_eq!(anchored(&snapshot, &classes), vec!["my_class"]);
    assert_eq!(classes[0].fix[0].message, "rename to `MyClass`");
}

#[test]
fn test_missing_docstring_is_opt_in() {
    let text = concat!(
        "def documented():\n",
        "    \"\"\"Says hi.\"\"\"\n",
        "    return 1\n",
        "def bare():\n",
        "    return 2\n",
    );
    let snapshot = python(text);
    assert!(with_code(&engine().analyze(&snapshot).unwrap(), "missing-docstring").is_empty());

    let config = DiagnosticsConfig {
        missing_docstring: true,
        ..DiagnosticsConfig::default()
    };
    let diagnostics = DiagnosticsEngine::new(config).analyze(&snapshot).unwrap();
    let docs = with_code(&diagnostics, "missing-docstring");
    assert_eq!(anchored(&snapshot, &docs), vec!["bare"]);
}

#[test]
fn test_input_without_prompt() {
    let snapshot = python("name = input()
age = input(\"Age: \")
print(name, age)
");
    let diagnostics = engine().analyze(&snapshot).unwrap();
    let prompts = with_code(&diagnostics, "input-without-prompt");
    assert_eq!(anchored(&snapshot, &prompts), vec!["input()"]);
    assert_eq!(prompts[0].severity, Severity::Suggestion);
    assert!(prompts[0].fix[0].message.contains("prompt"));
}

#[test]
fn test_old_style_formatting_suggests_fstring() {
    let snapshot = python(concat!(
        "who = \"world\"\n",
        "print(\"hello {}\".format(who))\n",
        "print(\"hello %s\" % who)\n",
        "print(f\"hello {who}\")\n",
        "print(7 % 3)\n",
    ));
    let diagnostics = engine().analyze(&snapshot).unwrap();
    let fstrings = with_code(&diagnostics, "prefer-fstring");
    assert_eq!(
        anchored(&snapshot, &fstrings),
        vec!["\"hello {}\".format(who)", "\"hello %s\" % who"]
    );

    let config = DiagnosticsConfig {
        prefer_fstring: false,
        ..DiagnosticsConfig::default()
    };
    let diagnostics = DiagnosticsEngine::new(config).analyze(&snapshot).unwrap();
    assert!(with_code(&diagnostics, "prefer-fstring").is_empty());
}

#[test]
fn test_long_function_is_reported_at_its_name() {
    let mut text = String::from("def long_one():\n");
    for i in 0..21 {
        text.push_str(&format!("    value_{i} = {i}\n\n"));
    }
    text.push_str("    return 0\ndef short_one():\n    return 1\n");
    let snapshot = python(&text);
    let diagnostics = engine().analyze(&snapshot).unwrap();

    let long = with_code(&diagnostics, "long-function");
    assert_eq!(anchored(&snapshot, &long), vec!["long_one"]);
    assert_eq!(long[0].message, "function `long_one` is 22 lines long (limit 20)");

    let config = DiagnosticsConfig {
        max_function_lines: 0,
        ..DiagnosticsConfig::default()
    };
    let diagnostics = DiagnosticsEngine::new(config).analyze(&snapshot).unwrap();
    assert!(with_code(&diagnostics, "long-function").is_empty());
}

#[test]
fn test_single_letter_names_outside_allowlist() {
    let snapshot = python("a = 1\nx = 2\nq, n = 3, 4\ntotal = a + x + q + n\nprint(total)\n");
    let diagnostics = engine().analyze(&snapshot).unwrap();
    let names = with_code(&diagnostics, "non-descriptive-name");
    assert_eq!(anchored(&snapshot, &names), vec!["a", "q"]);
    assert_eq!(names[0].severity, Severity::Warning);

    let config = DiagnosticsConfig {
        short_name_allowlist: vec!["a".to_string(), "q".to_string()],
        ..DiagnosticsConfig::default()
    };
    let diagnostics = DiagnosticsEngine::new(config).analyze(&snapshot).unwrap();
    let names = with_code(&diagnostics, "non-descriptive-name");
    assert_eq!(anchored(&snapshot, &names), vec!["x", "n"]);
}

#[test]
fn test_line_length() {
    let long = "x".repeat(100);
    let snapshot = plain(&format!("short\n{long}\n"));
    let diagnostics = engine().analyze(&snapshot).unwrap();

    let lines = with_code(&diagnostics, "line-too-long");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].span.start, 6 + 88);
    assert_eq!(lines[0].span.end, 6 + 100);
    assert_eq!(lines[0].message, "line too long (100 > 88 characters)");

    let config = DiagnosticsConfig {
        max_line_length: 0,
        ..DiagnosticsConfig::default()
    };
    let diagnostics = DiagnosticsEngine::new(config).analyze(&snapshot).unwrap();
    assert!(diagnostics.is_empty());
}

#[test]
fn test_trailing_whitespace_fix_deletes_it() {
    let snapshot = plain("a  \nb\t\r\nc");
    let diagnostics = engine().analyze(&snapshot).unwrap();
    let trailing = with_code(&diagnostics, "trailing-whitespace");
    assert_eq!(anchored(&snapshot, &trailing), vec!["  ", "\t"]);
    let (span, text) = trailing[0].fix[0].edit.clone().unwrap();
    assert_eq!(span, trailing[0].span);
    assert!(text.is_empty());
}

#[test]
fn test_mixed_indentation() {
    let snapshot = plain("a\n    b\n\tc\n \td\n");
    let diagnostics = engine().analyze(&snapshot).unwrap();
    let mixed = with_code(&diagnostics, "mixed-indentation");
    assert_eq!(anchored(&snapshot, &mixed), vec!["\t", " \t"]);
    assert!(mixed[0].message.contains("spaces"));
    assert_eq!(mixed[1].message, "indentation mixes tabs and spaces");
}

#[test]
fn test_diagnostics_are_ordered_by_offset_then_severity() {
    let snapshot = python(concat!(
        "import os   \n",
        "def badName():\n",
        "    temp = 1\n",
        "    return None\n",
    ));
    let diagnostics = engine().analyze(&snapshot).unwrap();
    assert!(diagnostics.len() >= 4);
    for pair in diagnostics.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!((a.span.start, a.severity) <= (b.span.start, b.severity));
    }
}

#[test]
fn test_analysis_is_deterministic() {
    let snapshot = python(concat!(
        "import os, sys\n",
        "def f():\n",
        "    a, b = 1, 2\n",
        "    while True:\n",
        "        pass\n",
    ));
    let engine = engine();
    let first = engine.analyze(&snapshot).unwrap();
    let second = engine.analyze(&snapshot).unwrap();
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn test_diagnostic_shifts_with_inserted_text() {
    let base = python("value = 1\nimport os\n");
    let engine = engine();
    let before = engine.analyze(&base).unwrap();
    let import = with_code(&before, "unused-import")[0].clone();

    let prefix = "# header\n";
    let edited = base.edit(&base.span(0, 0).unwrap(), prefix).unwrap();
    let after = engine.analyze(&edited).unwrap();
    let moved = with_code(&after, "unused-import")[0].clone();

    let shift = prefix.chars().count();
    assert_eq!(moved.span.revision, edited.revision());
    assert_eq!(moved.span.start, import.span.start + shift);
    assert_eq!(moved.span.end, import.span.end + shift);

    let index = edited.index();
    let pos = index.offset_to_position(moved.span.start).unwrap();
    assert_eq!((pos.line, pos.column), (2, 7));
    assert_eq!(index.position_to_offset(pos.line, pos.column).unwrap(), moved.span.start);
    assert_eq!(edited.slice(&moved.span).unwrap(), "os");
}

#[test]
fn test_cancelled_pass_yields_nothing() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = engine()
        .analyze_cancellable(&python("import os\n"), &cancel)
        .unwrap_err();
    assert_eq!(err, AnalysisError::Cancelled);
}

struct BrokenParser;

impl ParseCapability for BrokenParser {
    fn parse(&self, _language: LanguageId, _rope: &Rope) -> Result<Option<Tree>> {
        Err(AnalysisError::Failed("grammar crashed".to_string()))
    }
}

#[test]
fn test_parser_fault_is_analysis_failure() {
    let engine = DiagnosticsEngine::with_parser(DiagnosticsConfig::default(), Arc::new(BrokenParser));
    let err = engine.analyze(&python("x = 1\n")).unwrap_err();
    assert_eq!(err, AnalysisError::Failed("grammar crashed".to_string()));
}
