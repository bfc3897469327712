//! Handler registries.
//!
//! Three parallel tables keyed by AST variant tag: semantic generators,
//! semantic analysers, and code generators. The tables are compile-time
//! fixed lists; the driver holds references to them, so there is no mutable
//! global state. Generators and analysers declare the pass index they run
//! in, and the pass count is derived from the tables rather than
//! hard-coded, so a new phase is added by registering handlers at a new
//! index.
//!
//! Exactly one handler exists per (family, kind); a kind with no handler
//! reached during a walk is a compiler bug and asserts.

use dusk_core::{AstNode, NodeKind};

use crate::passes::analysis;
use crate::passes::codegen::{self, CodeGenContext};
use crate::passes::generation;
use crate::passes::PassContext;

/// Handler that populates scopes for one node kind.
pub struct SemanticGenerator {
    /// The variant tag this handler covers.
    pub kind: NodeKind,
    /// Pass index the handler runs in.
    pub pass: u32,
    /// The operation.
    pub generate: fn(&mut PassContext<'_>, &mut AstNode),
}

/// Handler that validates one node kind.
pub struct SemanticAnalyser {
    /// The variant tag this handler covers.
    pub kind: NodeKind,
    /// Pass index the handler runs in.
    pub pass: u32,
    /// Structural and contextual legality.
    pub validate_semantics: fn(&mut PassContext<'_>, &mut AstNode),
    /// Type compatibility.
    pub validate_types: fn(&mut PassContext<'_>, &mut AstNode),
}

/// Handler that emits IL for one node kind.
pub struct CodeGenerator {
    /// The variant tag this handler covers.
    pub kind: NodeKind,
    /// The operation. Compound nodes emit around their own children.
    pub generate: fn(&mut CodeGenContext<'_>, &AstNode),
}

/// The three handler tables used by the driver.
pub struct Registry {
    pub generators: &'static [SemanticGenerator],
    pub analysers: &'static [SemanticAnalyser],
    pub code_generators: &'static [CodeGenerator],
}

impl Registry {
    /// The built-in handler tables.
    pub fn builtin() -> Self {
        Self {
            generators: generation::HANDLERS,
            analysers: analysis::HANDLERS,
            code_generators: codegen::HANDLERS,
        }
    }

    /// Number of semantic passes: one past the highest declared index
    /// across generators and analysers.
    pub fn total_passes(&self) -> u32 {
        let gen_max = self.generators.iter().map(|h| h.pass).max().unwrap_or(0);
        let ana_max = self.analysers.iter().map(|h| h.pass).max().unwrap_or(0);
        gen_max.max(ana_max) + 1
    }

    /// The semantic generator for a kind. Tables are small and cache-hot,
    /// so lookup is a linear scan.
    pub fn generator_for(&self, kind: NodeKind) -> &SemanticGenerator {
        self.generators
            .iter()
            .find(|h| h.kind == kind)
            .unwrap_or_else(|| panic!("no semantic generator for {}", kind.name()))
    }

    /// The semantic analyser for a kind.
    pub fn analyser_for(&self, kind: NodeKind) -> &SemanticAnalyser {
        self.analysers
            .iter()
            .find(|h| h.kind == kind)
            .unwrap_or_else(|| panic!("no semantic analyser for {}", kind.name()))
    }

    /// The code generator for a kind.
    pub fn code_generator_for(&self, kind: NodeKind) -> &CodeGenerator {
        self.code_generators
            .iter()
            .find(|h| h.kind == kind)
            .unwrap_or_else(|| panic!("no code generator for {}", kind.name()))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_all_three_handlers() {
        let registry = Registry::builtin();
        for kind in NodeKind::ALL {
            // Lookups panic on a missing handler.
            let _ = registry.generator_for(*kind);
            let _ = registry.analyser_for(*kind);
            let _ = registry.code_generator_for(*kind);
        }
    }

    #[test]
    fn one_handler_per_kind_per_family() {
        let registry = Registry::builtin();
        for kind in NodeKind::ALL {
            assert_eq!(
                registry.generators.iter().filter(|h| h.kind == *kind).count(),
                1
            );
            assert_eq!(
                registry.analysers.iter().filter(|h| h.kind == *kind).count(),
                1
            );
            assert_eq!(
                registry
                    .code_generators
                    .iter()
                    .filter(|h| h.kind == *kind)
                    .count(),
                1
            );
        }
    }

    #[test]
    fn pass_count_is_derived() {
        let registry = Registry::builtin();
        let gen_max = registry.generators.iter().map(|h| h.pass).max().unwrap();
        let ana_max = registry.analysers.iter().map(|h| h.pass).max().unwrap();
        assert_eq!(registry.total_passes(), gen_max.max(ana_max) + 1);
        assert!(registry.total_passes() >= 2);
    }

    #[test]
    fn resolution_runs_after_declaration() {
        // Handlers that resolve names must not run before the passes that
        // declare them.
        let registry = Registry::builtin();
        let decl_max = registry
            .generators
            .iter()
            .filter(|h| {
                matches!(
                    h.kind,
                    NodeKind::Fn | NodeKind::Affix | NodeKind::Dec | NodeKind::Struct
                )
            })
            .map(|h| h.pass)
            .max()
            .unwrap();
        for kind in [
            NodeKind::Symbol,
            NodeKind::FnCall,
            NodeKind::BinaryExpr,
            NodeKind::UnaryExpr,
            NodeKind::Index,
            NodeKind::Return,
        ] {
            assert!(
                registry.analyser_for(kind).pass > decl_max,
                "{} resolves names before they are declared",
                kind.name()
            );
        }
    }
}
