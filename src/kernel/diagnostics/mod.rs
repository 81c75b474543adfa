//! Syntax and style diagnostics over one buffer snapshot.
//!
//! A pass parses the snapshot, reports the first syntax error if there is one, and otherwise
//! walks the tree for structural findings. Line checks run on every pass. The result is a
//! complete, ordered set for that revision; a cancelled pass yields nothing.

mod lines;
mod parse;
mod python;
mod syntax;
mod util;

pub use parse::{ParseCapability, TreeSitterParser};

use crate::kernel::buffer::{BufferSnapshot, Span};
use crate::kernel::language::LanguageId;
use crate::kernel::services::ports::DiagnosticsConfig;
use crate::kernel::task::CancelToken;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Ordered most to least severe; ties in diagnostic order are broken by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Suggestion,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Suggestion => "suggestion",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixHint {
    pub message: String,
    /// Replacement of `span` by the text; `None` when the hint is advice only.
    pub edit: Option<(Span, String)>,
}

impl FixHint {
    pub fn advice(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            edit: None,
        }
    }

    pub fn edit(message: impl Into<String>, span: Span, text: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            edit: Some((span, text.into())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
    /// Stable identifier of the check that produced it (`"unused-import"`, ...).
    pub code: &'static str,
    pub fix: Vec<FixHint>,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        code: &'static str,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            message: message.into(),
            span,
            code,
            fix: Vec::new(),
        }
    }

    pub fn with_fix(mut self, hint: FixHint) -> Self {
        self.fix.push(hint);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("analysis failed: {0}")]
    Failed(String),
    #[error("analysis cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Collects findings for one pass, bound to the snapshot they are anchored in.
pub(crate) struct Findings<'a> {
    snapshot: &'a BufferSnapshot,
    items: Vec<Diagnostic>,
}

impl<'a> Findings<'a> {
    fn new(snapshot: &'a BufferSnapshot) -> Self {
        Self {
            snapshot,
            items: Vec::new(),
        }
    }

    pub(crate) fn snapshot(&self) -> &'a BufferSnapshot {
        self.snapshot
    }

    pub(crate) fn span(&self, start: usize, end: usize) -> Span {
        Span::new(self.snapshot.revision(), start, end.max(start))
    }

    pub(crate) fn push(&mut self, diagnostic: Diagnostic) {
        debug_assert!(diagnostic.span.is_valid_for(self.snapshot));
        self.items.push(diagnostic);
    }

    fn finish(mut self) -> Vec<Diagnostic> {
        self.items.sort_by(|a, b| {
            (a.span.start, a.severity, a.span.end, &a.message).cmp(&(
                b.span.start,
                b.severity,
                b.span.end,
                &b.message,
            ))
        });
        self.items
    }
}

#[derive(Clone)]
pub struct DiagnosticsEngine {
    config: DiagnosticsConfig,
    parser: Arc<dyn ParseCapability>,
}

impl fmt::Debug for DiagnosticsEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticsEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DiagnosticsEngine {
    pub fn new(config: DiagnosticsConfig) -> Self {
        Self::with_parser(config, Arc::new(TreeSitterParser))
    }

    pub fn with_parser(config: DiagnosticsConfig, parser: Arc<dyn ParseCapability>) -> Self {
        Self { config, parser }
    }

    pub fn config(&self) -> &DiagnosticsConfig {
        &self.config
    }

    pub fn analyze(&self, snapshot: &BufferSnapshot) -> Result<Vec<Diagnostic>> {
        self.analyze_cancellable(snapshot, &CancelToken::new())
    }

    /// Runs one pass. Returns `Err(Cancelled)` as soon as `cancel` is observed; the token
    /// is polled once per top-level syntax node and once per line batch.
    pub fn analyze_cancellable(
        &self,
        snapshot: &BufferSnapshot,
        cancel: &CancelToken,
    ) -> Result<Vec<Diagnostic>> {
        let started = Instant::now();
        let mut findings = Findings::new(snapshot);

        let tree = self.parser.parse(snapshot.language(), snapshot.rope())?;
        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        if let Some(tree) = tree.as_ref() {
            let root = tree.root_node();
            if root.has_error() {
                syntax::report_first_error(root, &mut findings);
            } else if snapshot.language() == LanguageId::Python {
                python::check(root, &self.config, &mut findings, cancel)?;
            }
        }

        lines::check(&self.config, &mut findings, cancel)?;

        let diagnostics = findings.finish();
        tracing::debug!(
            buffer = %snapshot.buffer(),
            revision = snapshot.revision(),
            count = diagnostics.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "analysis pass finished"
        );
        Ok(diagnostics)
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/kernel/diagnostics/mod.rs"]
mod tests;
