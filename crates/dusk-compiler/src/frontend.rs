//! The parser collaborator boundary.
//!
//! Lexing and parsing are outside the core: the assembly is handed a
//! [`Frontend`] that turns a queued path into a parsed tree plus any
//! lex/parse diagnostics. Files with parse errors never enter the semantic
//! pipeline.

use std::io;
use std::path::{Path, PathBuf};

use dusk_core::{Ast, Diagnostic};
use rustc_hash::FxHashMap;

/// One parsed source file.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    /// The parsed tree.
    pub ast: Ast,
    /// Lex and parse errors, already structured for the diagnostic sink.
    pub errors: Vec<Diagnostic>,
}

impl ParsedFile {
    /// Wrap a clean tree.
    pub fn clean(ast: Ast) -> Self {
        Self {
            ast,
            errors: Vec::new(),
        }
    }
}

/// Produces parsed trees for queued paths.
pub trait Frontend {
    /// Parse one file. I/O failures are returned as errors; syntax
    /// failures come back inside [`ParsedFile::errors`].
    fn parse_file(&mut self, path: &Path) -> io::Result<ParsedFile>;
}

/// A frontend serving pre-built trees, keyed by path.
///
/// Used by embedders that parse elsewhere, and by tests.
#[derive(Debug, Default)]
pub struct PrebuiltFrontend {
    files: FxHashMap<PathBuf, ParsedFile>,
}

impl PrebuiltFrontend {
    /// Create an empty frontend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parsed file under a path.
    pub fn insert(&mut self, path: impl Into<PathBuf>, file: ParsedFile) {
        self.files.insert(path.into(), file);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, path: impl Into<PathBuf>, file: ParsedFile) -> Self {
        self.insert(path, file);
        self
    }
}

impl Frontend for PrebuiltFrontend {
    fn parse_file(&mut self, path: &Path) -> io::Result<ParsedFile> {
        self.files.remove(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no parsed file registered for {}", path.display()),
            )
        })
    }
}
