//! The pass driver.
//!
//! [`DuskAssembly`] owns the queued files, the adopted trees, the scope
//! context, and the IL emitter. `compile_write` runs the pipeline:
//!
//! 1. parse every queued file through the injected frontend;
//! 2. run N semantic passes (N derived from the handler tables), each
//!    interleaving generation and analysis per tree;
//! 3. if the error list is clean, run code generation once per tree;
//! 4. back-patch labels and hand the finished IL buffer to the sink.
//!
//! Scope depth is asserted balanced at every phase boundary.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use dusk_core::{Ast, AstKind, AstNode, DiagnosticSink, NodeId};
use log::{debug, warn};
use thiserror::Error;

use crate::emit::IlEmitter;
use crate::errors::{CompileOptions, ErrorList};
use crate::frontend::Frontend;
use crate::passes::codegen::CodeGenContext;
use crate::passes::{run_analysers, run_generators, PassContext};
use crate::registry::Registry;
use crate::scope::ScopeContext;

/// Why a build did not produce an artifact.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Reading a source or writing the artifact failed.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Lex, parse, or semantic errors were reported to the sink.
    #[error("compilation failed with {errors} error(s)")]
    CompilationFailed { errors: usize },

    /// A compiler bug surfaced.
    #[error("internal error: {0}")]
    Internal(String),
}

/// The driver aggregate.
pub struct DuskAssembly<F: Frontend> {
    frontend: F,
    options: CompileOptions,
    registry: Registry,
    queued_files: Vec<PathBuf>,
    asts: Vec<Ast>,
    scopes: ScopeContext,
    errors: ErrorList,
    emitter: IlEmitter,
    next_node_id: u32,
}

impl<F: Frontend> DuskAssembly<F> {
    /// Create an assembly with default options and the built-in handler
    /// tables.
    pub fn new(frontend: F) -> Self {
        Self::with_options(frontend, CompileOptions::default())
    }

    /// Create an assembly with explicit options.
    pub fn with_options(frontend: F, options: CompileOptions) -> Self {
        let errors = ErrorList::new(options.max_errors);
        Self {
            frontend,
            options,
            registry: Registry::builtin(),
            queued_files: Vec::new(),
            asts: Vec::new(),
            scopes: ScopeContext::new(),
            errors,
            emitter: IlEmitter::new(),
            next_node_id: 1,
        }
    }

    /// The options in effect.
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Record a source path for later parsing.
    pub fn queue_file(&mut self, path: impl Into<PathBuf>) {
        self.queued_files.push(path.into());
    }

    /// Run the pipeline and write the IL artifact to a file.
    pub fn compile_write_binary(
        &mut self,
        out_file: impl AsRef<Path>,
        diagnostics: &mut dyn DiagnosticSink,
    ) -> Result<(), BuildError> {
        let mut file = File::create(out_file.as_ref())?;
        self.compile_write(&mut file, diagnostics)
    }

    /// Run the pipeline and hand the IL buffer to the sink.
    pub fn compile_write(
        &mut self,
        sink: &mut dyn Write,
        diagnostics: &mut dyn DiagnosticSink,
    ) -> Result<(), BuildError> {
        let mut parse_errors = 0usize;

        for path in std::mem::take(&mut self.queued_files) {
            let parsed = self.frontend.parse_file(&path)?;
            if parsed.errors.is_empty() {
                let mut ast = parsed.ast;
                assign_node_ids(&mut ast.root, &mut self.next_node_id);
                self.asts.push(ast);
            } else {
                // Files with parse errors never enter the pipeline.
                warn!(
                    "{}: {} parse error(s), skipping semantic analysis",
                    path.display(),
                    parsed.errors.len()
                );
                parse_errors += parsed.errors.len();
                for error in parsed.errors {
                    diagnostics.report(error);
                }
            }
        }

        let total_passes = self.registry.total_passes();
        debug!(
            "compiling {} tree(s) over {} semantic pass(es)",
            self.asts.len(),
            total_passes
        );

        for pass in 0..total_passes {
            self.check_balanced(&format!("entry to pass {}", pass))?;
            for ast in &mut self.asts {
                let mut ctx = PassContext {
                    scopes: &mut self.scopes,
                    errors: &mut self.errors,
                    pass,
                };
                run_generators(&mut ctx, &self.registry, &mut ast.root);
                let mut ctx = PassContext {
                    scopes: &mut self.scopes,
                    errors: &mut self.errors,
                    pass,
                };
                run_analysers(&mut ctx, &self.registry, &mut ast.root);
            }
        }
        self.check_balanced("end of semantic passes")?;

        if !self.errors.is_empty() || parse_errors > 0 {
            let total = self.errors.total() + parse_errors;
            debug!("skipping code generation: {} error(s)", total);
            self.report(diagnostics);
            return Err(BuildError::CompilationFailed { errors: total });
        }

        self.emitter = IlEmitter::new();
        {
            let mut ctx = CodeGenContext::new(
                &mut self.scopes,
                &mut self.emitter,
                &mut self.errors,
                &self.registry,
            );
            for ast in &self.asts {
                ctx.emit_node(&ast.root);
            }
        }
        self.check_balanced("end of code generation")?;

        if !self.errors.is_empty() {
            let total = self.errors.total();
            self.report(diagnostics);
            return Err(BuildError::CompilationFailed { errors: total });
        }

        let bytes = std::mem::take(&mut self.emitter)
            .finish()
            .map_err(|e| BuildError::Internal(e.to_string()))?;
        sink.write_all(&bytes)?;
        debug!("wrote {} IL byte(s)", bytes.len());
        Ok(())
    }

    fn report(&mut self, diagnostics: &mut dyn DiagnosticSink) {
        for error in self.errors.take() {
            diagnostics.report(error.to_diagnostic());
        }
    }

    fn check_balanced(&self, at: &str) -> Result<(), BuildError> {
        if self.scopes.depth() == 1 {
            Ok(())
        } else {
            Err(BuildError::Internal(format!(
                "scope stack depth {} at {}",
                self.scopes.depth(),
                at
            )))
        }
    }
}

/// Number every node of an adopted tree, depth-first, so scope frames and
/// symbol records can refer to nodes without owning them.
pub(crate) fn assign_node_ids(node: &mut AstNode, next: &mut u32) {
    node.id = NodeId(*next);
    *next += 1;
    for attribute in &mut node.attributes {
        assign_node_ids(attribute, next);
    }
    match &mut node.kind {
        AstKind::Block { statements } => {
            for statement in statements {
                assign_node_ids(statement, next);
            }
        }
        AstKind::Array { elements, .. } => {
            for element in elements {
                assign_node_ids(element, next);
            }
        }
        AstKind::Dec { value, .. } => {
            if let Some(value) = value {
                assign_node_ids(value, next);
            }
        }
        AstKind::If {
            condition,
            true_block,
            false_block,
        } => {
            assign_node_ids(condition, next);
            assign_node_ids(true_block, next);
            if let Some(false_block) = false_block {
                assign_node_ids(false_block, next);
            }
        }
        AstKind::Fn { params, body, .. } => {
            for param in params {
                assign_node_ids(param, next);
            }
            if let Some(body) = body {
                assign_node_ids(body, next);
            }
        }
        AstKind::FnCall { args, .. } => {
            for arg in args {
                assign_node_ids(arg, next);
            }
        }
        AstKind::Loop { body, expr, .. } => {
            if let Some(expr) = expr {
                assign_node_ids(expr, next);
            }
            assign_node_ids(body, next);
        }
        AstKind::Struct { block, .. } | AstKind::Impl { block, .. } => {
            assign_node_ids(block, next);
        }
        AstKind::Attribute { args, .. } => {
            for arg in args {
                assign_node_ids(arg, next);
            }
        }
        AstKind::Affix { params, body, .. } => {
            for param in params {
                assign_node_ids(param, next);
            }
            if let Some(body) = body {
                assign_node_ids(body, next);
            }
        }
        AstKind::UnaryExpr { expr, .. } => assign_node_ids(expr, next),
        AstKind::BinaryExpr { lhs, rhs, .. } => {
            assign_node_ids(lhs, next);
            assign_node_ids(rhs, next);
        }
        AstKind::Index { array, index } => {
            assign_node_ids(array, next);
            assign_node_ids(index, next);
        }
        AstKind::Return { expr } => {
            if let Some(expr) = expr {
                assign_node_ids(expr, next);
            }
        }
        AstKind::Extern { decls } => {
            for decl in decls {
                assign_node_ids(decl, next);
            }
        }
        AstKind::Namespace { block, .. } => assign_node_ids(block, next),
        AstKind::String { .. }
        | AstKind::Number { .. }
        | AstKind::Boolean { .. }
        | AstKind::Symbol { .. }
        | AstKind::Type { .. }
        | AstKind::Continue
        | AstKind::Break
        | AstKind::Use { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_unique_and_dense() {
        let mut root = AstNode::block(
            vec![
                AstNode::int(1, 1, 1),
                AstNode::new(
                    AstKind::If {
                        condition: Box::new(AstNode::boolean(true, 2, 4)),
                        true_block: Box::new(AstNode::block(
                            vec![AstNode::symbol("x", 2, 10)],
                            2,
                            8,
                        )),
                        false_block: None,
                    },
                    2,
                    1,
                ),
            ],
            1,
            1,
        );
        let mut next = 1;
        assign_node_ids(&mut root, &mut next);

        // Root block, literal, if, condition, true block, symbol.
        let mut seen = Vec::new();
        collect_ids(&root, &mut seen);
        assert_eq!(seen.len(), 6);
        let mut sorted = seen.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), seen.len(), "duplicate node ids");
        assert_eq!(next as usize, seen.len() + 1);
    }

    fn collect_ids(node: &AstNode, out: &mut Vec<u32>) {
        out.push(node.id.0);
        match &node.kind {
            AstKind::Block { statements } => {
                for s in statements {
                    collect_ids(s, out);
                }
            }
            AstKind::If {
                condition,
                true_block,
                false_block,
            } => {
                collect_ids(condition, out);
                collect_ids(true_block, out);
                if let Some(f) = false_block {
                    collect_ids(f, out);
                }
            }
            _ => {}
        }
    }
}
