use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub runtime: RuntimeSettings,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    #[serde(default)]
    pub search: SearchSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub quiet_interval_ms: u64,
    pub search_quiet_interval_ms: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            quiet_interval_ms: 300,
            search_quiet_interval_ms: 150,
        }
    }
}

impl SchedulerSettings {
    pub fn quiet_interval(&self) -> Duration {
        Duration::from_millis(self.quiet_interval_ms)
    }

    pub fn search_quiet_interval(&self) -> Duration {
        Duration::from_millis(self.search_quiet_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub worker_threads: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self { worker_threads: 2 }
    }
}

/// Which checks run and with which thresholds.
///
/// Syntax errors are always reported; everything else can be switched off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// `0` disables the check.
    pub max_line_length: usize,
    pub unused_variables: bool,
    pub unused_imports: bool,
    pub naming: bool,
    pub trailing_whitespace: bool,
    pub mixed_indentation: bool,
    pub singleton_comparison: bool,
    pub infinite_loop: bool,
    pub missing_docstring: bool,
    pub python2_print: bool,
    /// `input()` without a prompt string.
    pub input_prompt: bool,
    /// `"...".format(...)` and `"..." % args`, where an f-string reads better.
    pub prefer_fstring: bool,
    /// Non-blank lines allowed in a function body; `0` disables the check.
    pub max_function_lines: usize,
    /// Single-letter variable names outside `short_name_allowlist`.
    pub descriptive_names: bool,
    pub short_name_allowlist: Vec<String>,
    /// Names never reported as unused (`_` and dunder names are always skipped).
    pub ignored_names: Vec<String>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            max_line_length: 88,
            unused_variables: true,
            unused_imports: true,
            naming: true,
            trailing_whitespace: true,
            mixed_indentation: true,
            singleton_comparison: true,
            infinite_loop: true,
            missing_docstring: false,
            python2_print: true,
            input_prompt: true,
            prefer_fstring: true,
            max_function_lines: 20,
            descriptive_names: true,
            short_name_allowlist: ["x", "y", "i", "j", "n"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            ignored_names: Vec::new(),
        }
    }
}

impl DiagnosticsConfig {
    pub fn is_ignored_name(&self, name: &str) -> bool {
        name == "_"
            || (name.starts_with("__") && name.ends_with("__"))
            || self.ignored_names.iter().any(|n| n == name)
    }

    /// Single-letter names are compared case-insensitively against the allowlist.
    pub fn is_short_name_allowed(&self, name: &str) -> bool {
        self.short_name_allowlist
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(name))
    }
}

pub const DEFAULT_MAX_FILE_SIZE: u64 = 4 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Characters treated as word constituents in addition to identifier characters.
    pub extra_word_chars: String,
    pub include: Vec<String>,
    pub exclude_dirs: Vec<String>,
    pub respect_gitignore: bool,
    pub max_file_size: u64,
    pub skip_binary: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            extra_word_chars: String::new(),
            include: vec!["*".to_string()],
            exclude_dirs: [".git", "__pycache__", ".venv", "node_modules", "target"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            respect_gitignore: true,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            skip_binary: true,
        }
    }
}

impl SearchSettings {
    pub fn is_word_char(&self, ch: char) -> bool {
        is_word_char(ch, &self.extra_word_chars)
    }
}

/// Identifier characters (XID_Continue) plus `extra`.
pub fn is_word_char(ch: char, extra: &str) -> bool {
    unicode_xid::UnicodeXID::is_xid_continue(ch) || extra.contains(ch)
}

#[cfg(test)]
#[path = "../../../../tests/unit/kernel/services/ports/settings.rs"]
mod tests;
