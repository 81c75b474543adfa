//! Python 结构检查
//!
//! 只在语法树完整时运行。名字按文件整体统计，不区分作用域：绑定过但从未被读取的变量、
//! 从未被引用的 import 都算作未使用

use super::util::{for_each_descendant, has_ancestor, node_chars, node_is_field, node_text};
use super::{AnalysisError, Diagnostic, Findings, FixHint, Result, Severity};
use crate::kernel::services::ports::DiagnosticsConfig;
use crate::kernel::task::CancelToken;
use rustc_hash::{FxHashMap, FxHashSet};
use tree_sitter::Node;

const IMPORT_KINDS: &[&str] = &[
    "import_statement",
    "import_from_statement",
    "future_import_statement",
];

struct Binding {
    name: String,
    start: usize,
    end: usize,
}

struct ImportBinding {
    bound: String,
    display: String,
    start: usize,
    end: usize,
    /// Statement range when this is its only name, so the whole line can go.
    statement: Option<(usize, usize)>,
}

struct Collector<'f, 'a> {
    config: &'f DiagnosticsConfig,
    findings: &'f mut Findings<'a>,
    bindings: Vec<Binding>,
    bound: FxHashMap<String, usize>,
    imports: Vec<ImportBinding>,
    reads: FxHashSet<String>,
    attributes: FxHashSet<String>,
}

pub(super) fn check(
    root: Node<'_>,
    config: &DiagnosticsConfig,
    findings: &mut Findings<'_>,
    cancel: &CancelToken,
) -> Result<()> {
    let mut collector = Collector {
        config,
        findings,
        bindings: Vec::new(),
        bound: FxHashMap::default(),
        imports: Vec::new(),
        reads: FxHashSet::default(),
        attributes: FxHashSet::default(),
    };

    let mut cursor = root.walk();
    for top in root.named_children(&mut cursor) {
        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        for_each_descendant(top, |node| collector.visit(node));
    }

    collector.report_unused();
    Ok(())
}

impl<'f, 'a> Collector<'f, 'a> {
    fn text(&self, node: Node<'_>) -> String {
        node_text(self.findings.snapshot().rope(), node).unwrap_or_default()
    }

    fn range(&self, node: Node<'_>) -> (usize, usize) {
        node_chars(self.findings.snapshot().rope(), node)
    }

    fn visit(&mut self, node: Node<'_>) {
        match node.kind() {
            "identifier" => self.visit_identifier(node),
            "assignment" => self.visit_assignment(node),
            "import_statement" | "import_from_statement" => self.visit_import(node),
            "while_statement" if self.config.infinite_loop => self.check_while(node),
            "print_statement" if self.config.python2_print => self.check_print(node),
            "comparison_operator" if self.config.singleton_comparison => {
                self.check_comparison(node)
            }
            "function_definition" => self.check_function(node),
            "call" => self.check_call(node),
            "binary_operator" if self.config.prefer_fstring => self.check_percent_format(node),
            "class_definition" if self.config.naming => self.check_class(node),
            _ => {}
        }
    }

    fn visit_identifier(&mut self, node: Node<'_>) {
        if has_ancestor(node, IMPORT_KINDS) {
            return;
        }
        if let Some(parent) = node.parent() {
            if parent.kind() == "attribute" && node_is_field(parent, "attribute", node) {
                let name = self.text(node);
                self.attributes.insert(name);
                return;
            }
        }
        if is_declaration(node) {
            return;
        }
        let name = self.text(node);
        self.reads.insert(name);
    }

    fn visit_assignment(&mut self, node: Node<'_>) {
        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        match left.kind() {
            "identifier" => self.bind(left),
            "pattern_list" | "tuple_pattern" => {
                let mut cursor = left.walk();
                let targets: Vec<_> = left
                    .named_children(&mut cursor)
                    .filter(|n| n.kind() == "identifier")
                    .collect();
                for target in targets {
                    self.bind(target);
                }
            }
            _ => {}
        }
    }

    fn bind(&mut self, target: Node<'_>) {
        let name = self.text(target);
        if self.bound.contains_key(&name) {
            return;
        }
        let (start, end) = self.range(target);
        if self.config.descriptive_names
            && is_short_name(&name)
            && !self.config.is_short_name_allowed(&name)
        {
            let span = self.findings.span(start, end);
            self.findings.push(
                Diagnostic::new(
                    Severity::Warning,
                    "non-descriptive-name",
                    span,
                    format!("variable name `{name}` is not descriptive"),
                )
                .with_fix(FixHint::advice("use a name that says what the value holds")),
            );
        }
        self.bound.insert(name.clone(), self.bindings.len());
        self.bindings.push(Binding { name, start, end });
    }

    fn visit_import(&mut self, node: Node<'_>) {
        if node.kind() == "import_from_statement" {
            let module = node
                .child_by_field_name("module_name")
                .map(|m| self.text(m))
                .unwrap_or_default();
            if module == "__future__" {
                return;
            }
            let mut cursor = node.walk();
            if node
                .named_children(&mut cursor)
                .any(|c| c.kind() == "wildcard_import")
            {
                return;
            }
        }

        let mut cursor = node.walk();
        let names: Vec<_> = node.children_by_field_name("name", &mut cursor).collect();
        let statement = (names.len() == 1).then(|| self.range(node));

        for name in names {
            let (bound, display) = match name.kind() {
                "aliased_import" => {
                    let alias = name
                        .child_by_field_name("alias")
                        .map(|a| self.text(a))
                        .unwrap_or_default();
                    (alias, self.text(name))
                }
                _ => {
                    let full = self.text(name);
                    // `import os.path` binds `os`.
                    let head = full.split('.').next().unwrap_or_default().trim().to_string();
                    (head, full)
                }
            };
            if bound.is_empty() {
                continue;
            }
            let (start, end) = self.range(name);
            self.imports.push(ImportBinding {
                bound,
                display,
                start,
                end,
                statement,
            });
        }
    }

    fn check_while(&mut self, node: Node<'_>) {
        let Some(condition) = node.child_by_field_name("condition") else {
            return;
        };
        if condition.kind() != "true" {
            return;
        }
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        if has_loop_exit(body, false) {
            return;
        }
        let (start, _) = self.range(node);
        let (_, end) = self.range(condition);
        let span = self.findings.span(start, end);
        self.findings.push(
            Diagnostic::new(
                Severity::Warning,
                "infinite-loop",
                span,
                "possible infinite loop: `while True` without `break`",
            )
            .with_fix(FixHint::advice(
                "add a `break`, `return` or `raise` that ends the loop",
            )),
        );
    }

    fn check_print(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();
        let Some(keyword) = children.first() else {
            return;
        };
        let Some(first_arg) = children.get(1) else {
            return;
        };
        if matches!(first_arg.kind(), "parenthesized_expression" | "tuple") {
            return;
        }

        let (start, end) = self.range(node);
        let (_, args_start) = self.range(*keyword);
        let args = self
            .findings
            .snapshot()
            .rope()
            .slice(args_start..end)
            .to_string();
        let args = args.trim();
        let span = self.findings.span(start, end);

        let mut diagnostic = Diagnostic::new(
            Severity::Error,
            "print-statement",
            span,
            "missing parentheses in call to `print`",
        );
        diagnostic = if first_arg.kind() == "chevron" {
            diagnostic.with_fix(FixHint::advice("use `print(..., file=stream)`"))
        } else {
            diagnostic.with_fix(FixHint::edit(
                format!("change to `print({args})`"),
                span,
                format!("print({args})"),
            ))
        };
        self.findings.push(diagnostic);
    }

    fn check_comparison(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        let operators: Vec<_> = node
            .children(&mut cursor)
            .filter(|c| matches!(c.kind(), "==" | "!="))
            .collect();

        for op in operators {
            let singleton = [op.prev_named_sibling(), op.next_named_sibling()]
                .into_iter()
                .flatten()
                .find(|n| matches!(n.kind(), "true" | "false" | "none"));
            let Some(singleton) = singleton else {
                continue;
            };

            let negated = op.kind() == "!=";
            let literal = self.text(singleton);
            let (start, end) = self.range(node);
            let span = self.findings.span(start, end);
            let diagnostic = if singleton.kind() == "none" {
                let (op_start, op_end) = self.range(op);
                let replacement = if negated { "is not" } else { "is" };
                Diagnostic::new(
                    Severity::Suggestion,
                    "singleton-comparison",
                    span,
                    format!("comparison to None should use `{replacement}`"),
                )
                .with_fix(FixHint::edit(
                    format!("use `{replacement}`"),
                    self.findings.span(op_start, op_end),
                    replacement,
                ))
            } else {
                Diagnostic::new(
                    Severity::Suggestion,
                    "singleton-comparison",
                    span,
                    format!("explicit comparison to {literal}"),
                )
                .with_fix(FixHint::advice(
                    "use the value directly, as in `if cond:` or `if not cond:`",
                ))
            };
            self.findings.push(diagnostic);
            return;
        }
    }

    fn check_function(&mut self, node: Node<'_>) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node);
        let (start, end) = self.range(name_node);

        if self.config.naming && !is_snake_case(&name) {
            let span = self.findings.span(start, end);
            let suggested = to_snake_case(&name);
            self.findings.push(
                Diagnostic::new(
                    Severity::Suggestion,
                    "function-naming",
                    span,
                    format!("function name `{name}` should be snake_case"),
                )
                .with_fix(FixHint::advice(format!("rename to `{suggested}`"))),
            );
        }

        if self.config.missing_docstring && !has_docstring(node) {
            let span = self.findings.span(start, end);
            self.findings.push(
                Diagnostic::new(
                    Severity::Suggestion,
                    "missing-docstring",
                    span,
                    format!("function `{name}` has no docstring"),
                )
                .with_fix(FixHint::advice("document the function with a docstring")),
            );
        }

        self.check_length(node, &name, start, end);
    }

    fn check_call(&mut self, node: Node<'_>) {
        let (Some(function), Some(arguments)) = (
            node.child_by_field_name("function"),
            node.child_by_field_name("arguments"),
        ) else {
            return;
        };
        match function.kind() {
            "identifier" if self.config.input_prompt => {
                if arguments.named_child_count() > 0 || self.text(function) != "input" {
                    return;
                }
                let (start, end) = self.range(node);
                let span = self.findings.span(start, end);
                self.findings.push(
                    Diagnostic::new(
                        Severity::Suggestion,
                        "input-without-prompt",
                        span,
                        "`input()` called without a prompt",
                    )
                    .with_fix(FixHint::advice(
                        "pass a prompt, as in `input(\"Enter a value: \")`",
                    )),
                );
            }
            "attribute" if self.config.prefer_fstring => {
                let on_string = function
                    .child_by_field_name("object")
                    .is_some_and(|o| o.kind() == "string");
                let is_format = function
                    .child_by_field_name("attribute")
                    .is_some_and(|a| self.text(a) == "format");
                if on_string && is_format {
                    self.push_prefer_fstring(node, "`str.format`");
                }
            }
            _ => {}
        }
    }

    fn check_percent_format(&mut self, node: Node<'_>) {
        let is_percent = node
            .child_by_field_name("operator")
            .is_some_and(|op| op.kind() == "%");
        let on_string = node
            .child_by_field_name("left")
            .is_some_and(|left| left.kind() == "string");
        if is_percent && on_string {
            self.push_prefer_fstring(node, "`%` formatting");
        }
    }

    fn push_prefer_fstring(&mut self, node: Node<'_>, style: &str) {
        let (start, end) = self.range(node);
        let span = self.findings.span(start, end);
        self.findings.push(
            Diagnostic::new(
                Severity::Suggestion,
                "prefer-fstring",
                span,
                format!("{style} can be written as an f-string"),
            )
            .with_fix(FixHint::advice("use an f-string, as in `f\"{name} is {age}\"`")),
        );
    }

    fn check_length(&mut self, node: Node<'_>, name: &str, start: usize, end: usize) {
        let limit = self.config.max_function_lines;
        if limit == 0 {
            return;
        }
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let rope = self.findings.snapshot().rope();
        let last = body.end_position().row.min(rope.len_lines().saturating_sub(1));
        let lines = (body.start_position().row..=last)
            .filter(|&row| rope.line(row).chars().any(|c| !c.is_whitespace()))
            .count();
        if lines <= limit {
            return;
        }
        let span = self.findings.span(start, end);
        self.findings.push(
            Diagnostic::new(
                Severity::Suggestion,
                "long-function",
                span,
                format!("function `{name}` is {lines} lines long (limit {limit})"),
            )
            .with_fix(FixHint::advice("split it into smaller functions")),
        );
    }

    fn check_class(&mut self, node: Node<'_>) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node);
        if is_cap_words(&name) {
            return;
        }
        let (start, end) = self.range(name_node);
        let span = self.findings.span(start, end);
        let suggested = to_cap_words(&name);
        self.findings.push(
            Diagnostic::new(
                Severity::Suggestion,
                "class-naming",
                span,
                format!("class name `{name}` should be CapWords"),
            )
            .with_fix(FixHint::advice(format!("rename to `{suggested}`"))),
        );
    }

    fn report_unused(&mut self) {
        if self.config.unused_variables {
            let unused: Vec<_> = self
                .bindings
                .iter()
                .filter(|b| {
                    !self.reads.contains(&b.name)
                        && !self.attributes.contains(&b.name)
                        && !self.config.is_ignored_name(&b.name)
                })
                .map(|b| (b.name.clone(), b.start, b.end))
                .collect();
            for (name, start, end) in unused {
                let span = self.findings.span(start, end);
                self.findings.push(
                    Diagnostic::new(
                        Severity::Warning,
                        "unused-variable",
                        span,
                        format!("variable `{name}` is assigned but never used"),
                    )
                    .with_fix(FixHint::advice(format!(
                        "remove `{name}` or use it"
                    ))),
                );
            }
        }

        if self.config.unused_imports {
            let unused: Vec<_> = self
                .imports
                .iter()
                .filter(|i| {
                    !self.reads.contains(&i.bound) && !self.config.is_ignored_name(&i.bound)
                })
                .map(|i| (i.display.clone(), i.start, i.end, i.statement))
                .collect();
            for (display, start, end, statement) in unused {
                let span = self.findings.span(start, end);
                let fix = match statement {
                    Some((s, e)) => FixHint::edit(
                        format!("remove `import {display}`"),
                        self.findings.span(s, e),
                        "",
                    ),
                    None => FixHint::advice(format!("remove `{display}` from the import list")),
                };
                self.findings.push(
                    Diagnostic::new(
                        Severity::Warning,
                        "unused-import",
                        span,
                        format!("`{display}` imported but never used"),
                    )
                    .with_fix(fix),
                );
            }
        }
    }
}

/// Identifiers that introduce a name rather than read one.
fn is_declaration(node: Node<'_>) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    match parent.kind() {
        "assignment" => node_is_field(parent, "left", node),
        "pattern_list" | "tuple_pattern" => parent.parent().is_some_and(|grand| {
            grand.kind() == "assignment" && node_is_field(grand, "left", parent)
        }),
        "keyword_argument" => node_is_field(parent, "name", node),
        "function_definition" | "class_definition" => node_is_field(parent, "name", node),
        "default_parameter" | "typed_default_parameter" => node_is_field(parent, "name", node),
        "parameters" | "lambda_parameters" | "typed_parameter" => true,
        "list_splat_pattern" | "dictionary_splat_pattern" => parent
            .parent()
            .is_some_and(|grand| matches!(grand.kind(), "parameters" | "lambda_parameters")),
        "global_statement" | "nonlocal_statement" => true,
        _ => false,
    }
}

fn has_loop_exit(node: Node<'_>, nested_loop: bool) -> bool {
    let mut cursor = node.walk();
    let children: Vec<_> = node.named_children(&mut cursor).collect();
    children.into_iter().any(|child| match child.kind() {
        "break_statement" => !nested_loop,
        "return_statement" | "raise_statement" => true,
        "function_definition" | "class_definition" | "lambda" => false,
        "while_statement" | "for_statement" => has_loop_exit(child, true),
        _ => has_loop_exit(child, nested_loop),
    })
}

fn has_docstring(function: Node<'_>) -> bool {
    let Some(body) = function.child_by_field_name("body") else {
        return false;
    };
    let mut cursor = body.walk();
    let first = body
        .named_children(&mut cursor)
        .find(|n| n.kind() != "comment");
    first.is_some_and(|stmt| {
        stmt.kind() == "expression_statement"
            && stmt
                .named_child(0)
                .is_some_and(|expr| expr.kind() == "string")
    })
}

/// One alphabetic character, like `a` or `Q`.
fn is_short_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(char::is_alphabetic) && chars.next().is_none()
}

pub(super) fn is_snake_case(name: &str) -> bool {
    name.chars().all(|c| !c.is_uppercase())
}

pub(super) fn is_cap_words(name: &str) -> bool {
    let core = name.trim_start_matches('_');
    core.chars().next().is_some_and(char::is_uppercase) && !core.contains('_')
}

pub(super) fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

pub(super) fn to_cap_words(name: &str) -> String {
    let leading = name.len() - name.trim_start_matches('_').len();
    let mut out = name[..leading].to_string();
    for part in name[leading..].split('_').filter(|p| !p.is_empty()) {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

#[cfg(test)]
#[path = "../../../tests/unit/kernel/diagnostics/python.rs"]
mod tests;
