use super::{AnalysisError, Diagnostic, Findings, FixHint, Result, Severity};
use crate::kernel::services::ports::DiagnosticsConfig;
use crate::kernel::task::CancelToken;

const LINE_BATCH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndentStyle {
    Spaces,
    Tabs,
}

/// Per-line style checks; they need no syntax tree and run for every language.
pub(super) fn check(
    config: &DiagnosticsConfig,
    findings: &mut Findings<'_>,
    cancel: &CancelToken,
) -> Result<()> {
    let snapshot = findings.snapshot();
    let index = snapshot.index();
    let rope = snapshot.rope();
    let mut file_style: Option<IndentStyle> = None;

    for line in 0..index.line_count() {
        if line % LINE_BATCH == 0 && cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        let Some((start, end)) = index.line_span(line) else {
            break;
        };
        let text = rope.slice(start..end).to_string();
        let len = end - start;

        if config.max_line_length > 0 && len > config.max_line_length {
            let span = findings.span(start + config.max_line_length, end);
            findings.push(
                Diagnostic::new(
                    Severity::Suggestion,
                    "line-too-long",
                    span,
                    format!("line too long ({len} > {} characters)", config.max_line_length),
                )
                .with_fix(FixHint::advice("split the line")),
            );
        }

        if config.trailing_whitespace {
            let trailing = text
                .chars()
                .rev()
                .take_while(|c| *c == ' ' || *c == '\t')
                .count();
            if trailing > 0 {
                let span = findings.span(end - trailing, end);
                findings.push(
                    Diagnostic::new(
                        Severity::Suggestion,
                        "trailing-whitespace",
                        span,
                        "trailing whitespace",
                    )
                    .with_fix(FixHint::edit("remove trailing whitespace", span, "")),
                );
            }
        }

        if config.mixed_indentation {
            let indent = text.len() - text.trim_start_matches([' ', '\t']).len();
            // Blank lines carry no indentation.
            if indent == 0 || indent == text.len() {
                continue;
            }
            let has_tab = text[..indent].contains('\t');
            let has_space = text[..indent].contains(' ');
            let span = findings.span(start, start + indent);

            if has_tab && has_space {
                findings.push(
                    Diagnostic::new(
                        Severity::Warning,
                        "mixed-indentation",
                        span,
                        "indentation mixes tabs and spaces",
                    )
                    .with_fix(FixHint::advice("indent with spaces only")),
                );
                continue;
            }

            let style = if has_tab {
                IndentStyle::Tabs
            } else {
                IndentStyle::Spaces
            };
            match file_style {
                None => file_style = Some(style),
                Some(expected) if expected != style => {
                    let expected = match expected {
                        IndentStyle::Spaces => "spaces",
                        IndentStyle::Tabs => "tabs",
                    };
                    findings.push(
                        Diagnostic::new(
                            Severity::Warning,
                            "mixed-indentation",
                            span,
                            format!("inconsistent indentation, the file indents with {expected}"),
                        )
                        .with_fix(FixHint::advice(format!("indent with {expected}"))),
                    );
                }
                Some(_) => {}
            }
        }
    }
    Ok(())
}
