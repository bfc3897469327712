//! The semantic passes and their shared tree walker.
//!
//! Generation and analysis use a central depth-first walk: each node is
//! dispatched to its registered handler pre-order, then the walker recurses
//! into scope-introducing children inside an `enter`/`leave` pair. The
//! bracketing is identical in both phases, which is what lets scope frames
//! created early be re-entered later.
//!
//! Code generation walks differently (compound nodes emit around their own
//! children) and lives in [`codegen`].

pub mod analysis;
pub mod codegen;
pub mod generation;

use dusk_core::{AstKind, AstNode};
use log::trace;

use crate::errors::ErrorList;
use crate::registry::Registry;
use crate::scope::{FrameKind, ScopeContext};

/// Mutable state handed to generator and analyser handlers.
pub struct PassContext<'a> {
    /// The scope tree and cursor stack.
    pub scopes: &'a mut ScopeContext,
    /// The assembly error list.
    pub errors: &'a mut ErrorList,
    /// Index of the pass currently running.
    pub pass: u32,
}

/// Run the semantic generators for one pass over a tree.
pub fn run_generators(ctx: &mut PassContext<'_>, registry: &Registry, root: &mut AstNode) {
    walk(ctx, root, &mut |ctx, node| {
        let handler = registry.generator_for(node.tag());
        if handler.pass == ctx.pass {
            trace!("generate {} at {}:{}", node.tag().name(), node.line, node.column);
            (handler.generate)(ctx, node);
        }
    });
}

/// Run the semantic analysers for one pass over a tree.
pub fn run_analysers(ctx: &mut PassContext<'_>, registry: &Registry, root: &mut AstNode) {
    walk(ctx, root, &mut |ctx, node| {
        let handler = registry.analyser_for(node.tag());
        if handler.pass == ctx.pass {
            trace!("analyse {} at {}:{}", node.tag().name(), node.line, node.column);
            (handler.validate_semantics)(ctx, node);
            (handler.validate_types)(ctx, node);
        }
    });
}

/// Depth-first walk with scope bracketing.
///
/// Leaf and expression nodes recurse inside their handlers, not here.
fn walk<F>(ctx: &mut PassContext<'_>, node: &mut AstNode, visit: &mut F)
where
    F: FnMut(&mut PassContext<'_>, &mut AstNode),
{
    visit(ctx, node);

    let id = node.id;
    match &mut node.kind {
        AstKind::Block { statements } => {
            for statement in statements {
                walk(ctx, statement, visit);
            }
        }
        AstKind::If {
            true_block,
            false_block,
            ..
        } => {
            ctx.scopes.enter(id, FrameKind::If, "if");
            walk(ctx, true_block, visit);
            if let Some(false_block) = false_block {
                walk(ctx, false_block, visit);
            }
            ctx.scopes.leave();
        }
        AstKind::Fn { name, body, .. } => {
            let label = name.clone();
            ctx.scopes.enter(id, FrameKind::Fn, &label);
            if let Some(body) = body {
                walk(ctx, body, visit);
            }
            ctx.scopes.leave();
        }
        AstKind::Loop { body, .. } => {
            ctx.scopes.enter(id, FrameKind::Loop, "loop");
            walk(ctx, body, visit);
            ctx.scopes.leave();
        }
        AstKind::Impl { name, block } => {
            let label = name.clone();
            ctx.scopes.enter(id, FrameKind::Impl, &label);
            walk(ctx, block, visit);
            ctx.scopes.leave();
        }
        AstKind::Affix { name, body, .. } => {
            let label = name.clone();
            ctx.scopes.enter(id, FrameKind::Affix, &label);
            if let Some(body) = body {
                walk(ctx, body, visit);
            }
            ctx.scopes.leave();
        }
        AstKind::Extern { decls } => {
            ctx.scopes.enter(id, FrameKind::Extern, "extern");
            for decl in decls {
                walk(ctx, decl, visit);
            }
            ctx.scopes.leave();
        }
        AstKind::Namespace { name, block } => {
            let label = name.clone();
            ctx.scopes.enter_namespace(&label);
            walk(ctx, block, visit);
            ctx.scopes.leave();
        }
        _ => {}
    }
}
