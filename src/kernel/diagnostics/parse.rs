use super::{AnalysisError, Result};
use crate::kernel::language::LanguageId;
use ropey::Rope;
use tree_sitter::{Language, Parser, Tree};

/// Turns source text into a syntax tree.
///
/// `Ok(None)` means no grammar is available for the language; only line checks run then.
/// An `Err` is a fault of the capability itself, not of the source being parsed.
pub trait ParseCapability: Send + Sync {
    fn parse(&self, language: LanguageId, rope: &Rope) -> Result<Option<Tree>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TreeSitterParser;

impl TreeSitterParser {
    fn grammar(language: LanguageId) -> Option<Language> {
        let grammar = match language {
            LanguageId::Rust => tree_sitter_rust::language(),
            LanguageId::Go => tree_sitter_go::language(),
            LanguageId::Python => tree_sitter_python::language(),
            LanguageId::C => tree_sitter_c::language(),
            LanguageId::Cpp => tree_sitter_cpp::language(),
            LanguageId::Java => tree_sitter_java::language(),
            LanguageId::JavaScript => tree_sitter_javascript::language(),
            LanguageId::TypeScript => tree_sitter_typescript::language_typescript(),
            LanguageId::Json => tree_sitter_json::language(),
            LanguageId::Toml => tree_sitter_toml::language(),
            LanguageId::Bash => tree_sitter_bash::language(),
            LanguageId::PlainText => return None,
        };
        Some(grammar)
    }
}

impl ParseCapability for TreeSitterParser {
    fn parse(&self, language: LanguageId, rope: &Rope) -> Result<Option<Tree>> {
        let Some(grammar) = Self::grammar(language) else {
            return Ok(None);
        };

        let mut parser = Parser::new();
        parser.set_language(grammar).map_err(|e| {
            AnalysisError::Failed(format!("{} grammar rejected: {e}", language.display_name()))
        })?;

        parse_rope(&mut parser, rope)
            .map(Some)
            .ok_or_else(|| AnalysisError::Failed("parser returned no tree".to_string()))
    }
}

fn parse_rope(parser: &mut Parser, rope: &Rope) -> Option<Tree> {
    let mut cache = RopeChunkCache::new(rope);
    parser.parse_with(&mut |byte_offset, _| cache.bytes_from(byte_offset), None)
}

struct RopeChunkCache<'a> {
    rope: &'a Rope,
    chunk: &'a str,
    start: usize,
    end: usize,
}

impl<'a> RopeChunkCache<'a> {
    fn new(rope: &'a Rope) -> Self {
        Self {
            rope,
            chunk: "",
            start: 0,
            end: 0,
        }
    }

    fn bytes_from(&mut self, byte_offset: usize) -> &'a [u8] {
        if byte_offset >= self.rope.len_bytes() {
            return &[];
        }

        if byte_offset < self.start || byte_offset >= self.end {
            let (chunk, chunk_start, _, _) = self.rope.chunk_at_byte(byte_offset);
            self.chunk = chunk;
            self.start = chunk_start;
            self.end = chunk_start + chunk.len();
        }

        &self.chunk.as_bytes()[byte_offset - self.start..]
    }
}
