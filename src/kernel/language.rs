use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum LanguageId {
    Rust,
    Go,
    Python,
    JavaScript,
    TypeScript,
    C,
    Cpp,
    Java,
    Json,
    Toml,
    Bash,
    PlainText,
}

impl LanguageId {
    pub fn from_path(path: &Path) -> Self {
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
            return Self::PlainText;
        };
        match ext {
            "rs" => Self::Rust,
            "go" => Self::Go,
            "py" | "pyi" | "pyw" => Self::Python,
            "js" | "mjs" | "cjs" | "jsx" => Self::JavaScript,
            "ts" | "mts" | "cts" => Self::TypeScript,
            "c" => Self::C,
            "cc" | "cpp" | "cxx" | "c++" | "hpp" | "hh" | "hxx" | "h++" | "h" => Self::Cpp,
            "java" => Self::Java,
            "json" => Self::Json,
            "toml" => Self::Toml,
            "sh" | "bash" => Self::Bash,
            _ => Self::PlainText,
        }
    }

    pub fn language_id(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Go => "go",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::Java => "java",
            Self::Json => "json",
            Self::Toml => "toml",
            Self::Bash => "shellscript",
            Self::PlainText => "plaintext",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Rust => "Rust",
            Self::Go => "Go",
            Self::Python => "Python",
            Self::JavaScript => "JavaScript",
            Self::TypeScript => "TypeScript",
            Self::C => "C",
            Self::Cpp => "C++",
            Self::Java => "Java",
            Self::Json => "JSON",
            Self::Toml => "TOML",
            Self::Bash => "Bash",
            Self::PlainText => "Plain Text",
        }
    }

    /// Whether a tree-sitter grammar is bundled for this language.
    pub fn has_grammar(self) -> bool {
        !matches!(self, Self::PlainText)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/kernel/language.rs"]
mod tests;
