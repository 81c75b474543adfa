use super::util::node_chars;
use super::{Diagnostic, Findings, FixHint, Severity};
use crate::kernel::buffer::TextCoordinateIndex;
use crate::kernel::language::LanguageId;
use ropey::Rope;
use tree_sitter::Node;

const CODE: &str = "syntax-error";

/// Reasons a parse can stop, each with its own hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum SyntaxFault {
    Missing(String),
    UnexpectedEof,
    Unmatched(char),
    InvalidCharacter(char),
    UnexpectedIndent,
    InvalidDecimal,
    Invalid,
}

impl SyntaxFault {
    fn message(&self, found: &str) -> String {
        match self {
            Self::Missing(token) => format!("syntax error: expected `{token}`"),
            Self::UnexpectedEof => "syntax error: unexpected end of input".to_string(),
            Self::Unmatched(ch) => format!("syntax error: unmatched `{ch}`"),
            Self::InvalidCharacter(ch) => format!("syntax error: invalid character `{ch}`"),
            Self::UnexpectedIndent => "syntax error: unexpected indent".to_string(),
            Self::InvalidDecimal => "syntax error: invalid decimal literal".to_string(),
            Self::Invalid if found.is_empty() => "syntax error: invalid syntax".to_string(),
            Self::Invalid => format!("syntax error: unexpected `{found}`"),
        }
    }

    pub(super) fn hint(&self) -> &'static str {
        match self {
            Self::Missing(token) if token == ":" => {
                "add `:` at the end of the `if`, `for`, `while`, `def` or `class` header"
            }
            Self::Missing(_) => "insert the missing token",
            Self::UnexpectedEof => "close the open parenthesis, bracket, brace or quote",
            Self::Unmatched(_) => "every closing symbol needs a matching opening one",
            Self::InvalidCharacter(_) => "remove the character or move it into a string",
            Self::UnexpectedIndent => "indent consistently with the enclosing block",
            Self::InvalidDecimal => "use `.` as the decimal separator, not `,`",
            Self::Invalid => "check that parentheses, brackets and braces are balanced",
        }
    }
}

/// First node, in document order, that is an `ERROR` or a `MISSING` placeholder.
fn first_error(root: Node<'_>) -> Option<Node<'_>> {
    let mut node = root;
    'descend: loop {
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.has_error() || child.is_missing() {
                node = child;
                continue 'descend;
            }
        }
        return None;
    }
}

pub(super) fn report_first_error(root: Node<'_>, findings: &mut Findings<'_>) {
    let snapshot = findings.snapshot();
    let rope = snapshot.rope();

    let Some(node) = first_error(root) else {
        // `has_error` was set but no concrete node carries it; anchor at the end.
        let end = snapshot.len_chars();
        let span = findings.span(end, end);
        let fault = SyntaxFault::Invalid;
        findings.push(
            Diagnostic::new(Severity::Error, CODE, span, fault.message(""))
                .with_fix(FixHint::advice(fault.hint())),
        );
        return;
    };

    let (start, end) = node_chars(rope, node);
    // Keep the anchor on the line where the fault starts.
    let line_end = snapshot
        .index()
        .offset_to_position(start)
        .ok()
        .and_then(|pos| snapshot.index().line_span(pos.line))
        .map_or(end, |(_, line_end)| line_end);
    let end = end.min(line_end.max(start));
    let found: String = rope.slice(start..end).chars().take(32).collect();
    let found = found.trim().to_string();

    let fault = if node.is_missing() {
        SyntaxFault::Missing(node.kind().to_string())
    } else {
        classify(findings, start, &found)
    };

    let span = findings.span(start, end);
    let mut diagnostic = Diagnostic::new(Severity::Error, CODE, span, fault.message(&found));
    diagnostic = match &fault {
        // Named placeholders (`identifier`, ...) have no literal text to insert.
        SyntaxFault::Missing(token) if !node.is_named() => diagnostic.with_fix(FixHint::edit(
            format!("insert `{token}`"),
            findings.span(start, start),
            token.clone(),
        )),
        _ => diagnostic.with_fix(FixHint::advice(fault.hint())),
    };
    findings.push(diagnostic);
}

fn classify(findings: &Findings<'_>, start: usize, found: &str) -> SyntaxFault {
    let snapshot = findings.snapshot();
    let rope = snapshot.rope();

    if let Some(ch) = found.chars().next() {
        if matches!(ch, ')' | ']' | '}') {
            return SyntaxFault::Unmatched(ch);
        }
        if !ch.is_ascii() && !ch.is_alphanumeric() && !ch.is_whitespace() {
            return SyntaxFault::InvalidCharacter(ch);
        }
    }

    if has_unclosed_delimiter(&snapshot.text()) {
        return SyntaxFault::UnexpectedEof;
    }

    if snapshot.language() == LanguageId::Python {
        if looks_like_decimal_comma(found) {
            return SyntaxFault::InvalidDecimal;
        }
        if let Ok(pos) = snapshot.index().offset_to_position(start) {
            if is_unexpected_indent(rope, snapshot.index(), pos.line) {
                return SyntaxFault::UnexpectedIndent;
            }
        }
    }

    SyntaxFault::Invalid
}

/// Whether a bracket or a quote is still open at the end of the text.
///
/// `#` and `//` comments are skipped; string contents are not inspected for brackets.
fn has_unclosed_delimiter(text: &str) -> bool {
    let mut stack: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if let Some(q) = quote {
            match ch {
                '\\' => {
                    chars.next();
                }
                '\n' if q != '`' => quote = None,
                c if c == q => quote = None,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' | '\'' | '`' => quote = Some(ch),
            '#' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '(' | '[' | '{' => stack.push(ch),
            ')' | ']' | '}' => {
                stack.pop();
            }
            _ => {}
        }
    }
    quote.is_some() || !stack.is_empty()
}

fn looks_like_decimal_comma(found: &str) -> bool {
    let mut parts = found.splitn(2, ',');
    let (Some(left), Some(right)) = (parts.next(), parts.next()) else {
        return false;
    };
    !left.is_empty()
        && left.chars().all(|c| c.is_ascii_digit())
        && right.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn leading_indent(rope: &Rope, start: usize, end: usize) -> Option<usize> {
    let line = rope.slice(start..end);
    let indent = line.chars().take_while(|c| *c == ' ' || *c == '\t').count();
    (indent < end - start).then_some(indent)
}

fn is_unexpected_indent(rope: &Rope, index: &TextCoordinateIndex, line: usize) -> bool {
    let Some((start, end)) = index.line_span(line) else {
        return false;
    };
    let Some(indent) = leading_indent(rope, start, end) else {
        return false;
    };
    if indent == 0 {
        return false;
    }

    for prev in (0..line).rev() {
        let Some((p_start, p_end)) = index.line_span(prev) else {
            continue;
        };
        let Some(p_indent) = leading_indent(rope, p_start, p_end) else {
            continue;
        };
        let opens_block = rope
            .slice(p_start..p_end)
            .to_string()
            .trim_end()
            .ends_with(':');
        return indent > p_indent && !opens_block;
    }
    true
}
