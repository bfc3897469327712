//! Core data model for the Dusk bootstrap compiler.
//!
//! This crate defines everything the semantic pipeline and its external
//! collaborators share:
//!
//! - [`ast`]: the tree of tagged node variants handed over by the parser
//! - [`span`]: source positions for error reporting
//! - [`types`]: the nominal type model with primitive widenings
//! - [`error`]: the compile error taxonomy and the diagnostic surface
//!
//! The pipeline itself lives in `dusk-compiler`.

pub mod ast;
pub mod error;
pub mod span;
pub mod types;

pub use ast::{AffixType, Ast, AstKind, AstNode, NodeId, NodeKind, NumberValue};
pub use error::{CollectingSink, CompileError, Diagnostic, DiagnosticSink, ErrorKind};
pub use span::Span;
pub use types::{Primitive, TypeRef, primitive, PRIMITIVES};
