//! Code generators: the IL emission phase.
//!
//! Runs once, after all semantic passes succeeded. Unlike the semantic
//! walker, compound nodes emit *around* their children: `If` interleaves
//! branch fixups with its blocks, `Loop` binds head/exit labels around its
//! body, `Fn` wraps the body in a prologue record and a trailing return.
//! Handlers descend through [`CodeGenContext::emit_node`], keeping the same
//! scope bracketing as the semantic phases so slot lookups resolve.
//!
//! Analysis has already rejected invalid programs; anything inconsistent
//! found here is an internal error.

use dusk_core::{AstKind, AstNode, CompileError, NodeKind};

use crate::emit::{binary_opcode, unary_opcode, IlEmitter, LoopStack};
use crate::errors::ErrorList;
use crate::registry::{CodeGenerator, Registry};
use crate::scope::{FrameKind, ScopeContext};

use super::analysis::expr_type;

/// Mutable state handed to code generator handlers.
pub struct CodeGenContext<'a> {
    /// The scope tree, re-entered with the same bracketing as analysis.
    pub scopes: &'a mut ScopeContext,
    /// The IL emitter.
    pub emitter: &'a mut IlEmitter,
    /// The assembly error list (internal errors only at this stage).
    pub errors: &'a mut ErrorList,
    /// Active loops for break/continue targets.
    pub loops: LoopStack,
    registry: &'a Registry,
}

impl<'a> CodeGenContext<'a> {
    /// Create a context for one code generation run.
    pub fn new(
        scopes: &'a mut ScopeContext,
        emitter: &'a mut IlEmitter,
        errors: &'a mut ErrorList,
        registry: &'a Registry,
    ) -> Self {
        Self {
            scopes,
            emitter,
            errors,
            loops: LoopStack::new(),
            registry,
        }
    }

    /// Dispatch a node to its code generator. Nodes with the emit flag
    /// cleared are skipped.
    pub fn emit_node(&mut self, node: &AstNode) {
        if !node.emit {
            return;
        }
        let registry = self.registry;
        let handler = registry.code_generator_for(node.tag());
        (handler.generate)(self, node);
    }

    fn internal(&mut self, message: impl Into<String>) {
        self.errors.push(CompileError::Internal {
            message: message.into(),
        });
    }
}

/// The code generator table, one entry per node kind.
pub(crate) static HANDLERS: &[CodeGenerator] = &[
    CodeGenerator { kind: NodeKind::Block, generate: block_code },
    CodeGenerator { kind: NodeKind::String, generate: string_code },
    CodeGenerator { kind: NodeKind::Number, generate: number_code },
    CodeGenerator { kind: NodeKind::Boolean, generate: boolean_code },
    CodeGenerator { kind: NodeKind::Array, generate: array_code },
    CodeGenerator { kind: NodeKind::Symbol, generate: symbol_code },
    CodeGenerator { kind: NodeKind::Type, generate: no_op },
    CodeGenerator { kind: NodeKind::Dec, generate: dec_code },
    CodeGenerator { kind: NodeKind::If, generate: if_code },
    CodeGenerator { kind: NodeKind::Fn, generate: fn_code },
    CodeGenerator { kind: NodeKind::FnCall, generate: fn_call_code },
    CodeGenerator { kind: NodeKind::Loop, generate: loop_code },
    CodeGenerator { kind: NodeKind::Continue, generate: continue_code },
    CodeGenerator { kind: NodeKind::Break, generate: break_code },
    CodeGenerator { kind: NodeKind::Struct, generate: no_op },
    CodeGenerator { kind: NodeKind::Impl, generate: impl_code },
    CodeGenerator { kind: NodeKind::Attribute, generate: no_op },
    CodeGenerator { kind: NodeKind::Affix, generate: affix_code },
    CodeGenerator { kind: NodeKind::UnaryExpr, generate: unary_code },
    CodeGenerator { kind: NodeKind::BinaryExpr, generate: binary_code },
    CodeGenerator { kind: NodeKind::Index, generate: index_code },
    CodeGenerator { kind: NodeKind::Return, generate: return_code },
    CodeGenerator { kind: NodeKind::Extern, generate: extern_code },
    CodeGenerator { kind: NodeKind::Use, generate: no_op },
    CodeGenerator { kind: NodeKind::Namespace, generate: namespace_code },
];

fn no_op(_ctx: &mut CodeGenContext<'_>, _node: &AstNode) {}

/// Sequence the statements.
fn block_code(ctx: &mut CodeGenContext<'_>, node: &AstNode) {
    if let AstKind::Block { statements } = &node.kind {
        for statement in statements {
            ctx.emit_node(statement);
        }
    }
}

fn string_code(ctx: &mut CodeGenContext<'_>, node: &AstNode) {
    if let AstKind::String { value } = &node.kind {
        ctx.emitter.push_const_str(value);
    }
}

fn number_code(ctx: &mut CodeGenContext<'_>, node: &AstNode) {
    if let AstKind::Number {
        value,
        is_signed,
        bits,
    } = &node.kind
    {
        ctx.emitter.push_const_number(*value, *is_signed, *bits);
    }
}

fn boolean_code(ctx: &mut CodeGenContext<'_>, node: &AstNode) {
    if let AstKind::Boolean { value } = &node.kind {
        ctx.emitter.push_const_bool(*value);
    }
}

/// Evaluate the elements, then collect them.
fn array_code(ctx: &mut CodeGenContext<'_>, node: &AstNode) {
    if let AstKind::Array { elements, .. } = &node.kind {
        for element in elements {
            ctx.emit_node(element);
        }
        ctx.emitter.build_array(elements.len() as u16);
    }
}

/// Load the symbol's slot.
fn symbol_code(ctx: &mut CodeGenContext<'_>, node: &AstNode) {
    if let AstKind::Symbol { name } = &node.kind {
        match ctx.scopes.lookup(name).and_then(|r| r.slot) {
            Some(slot) => ctx.emitter.load(slot),
            None => ctx.internal(format!("symbol '{}' has no slot at code generation", name)),
        }
    }
}

/// Evaluate the initialiser and store it into the declaration's slot.
fn dec_code(ctx: &mut CodeGenContext<'_>, node: &AstNode) {
    if let AstKind::Dec { name, value, .. } = &node.kind {
        let value = match value {
            Some(value) => value,
            None => return,
        };
        ctx.emit_node(value);
        match ctx.scopes.lookup(name).and_then(|r| r.slot) {
            Some(slot) => ctx.emitter.store(slot),
            None => ctx.internal(format!("declaration '{}' has no slot", name)),
        }
    }
}

/// Condition, conditional branch over the true block, optional else with a
/// jump-over. Without an else block no jump-over is emitted.
fn if_code(ctx: &mut CodeGenContext<'_>, node: &AstNode) {
    if let AstKind::If {
        condition,
        true_block,
        false_block,
    } = &node.kind
    {
        ctx.emit_node(condition);
        ctx.scopes.enter(node.id, FrameKind::If, "if");
        match false_block {
            Some(false_block) => {
                let l_else = ctx.emitter.new_label();
                let l_end = ctx.emitter.new_label();
                ctx.emitter.branch_if_false(l_else);
                ctx.emit_node(true_block);
                ctx.emitter.jump(l_end);
                ctx.emitter.bind(l_else);
                ctx.emit_node(false_block);
                ctx.emitter.bind(l_end);
            }
            None => {
                let l_end = ctx.emitter.new_label();
                ctx.emitter.branch_if_false(l_end);
                ctx.emit_node(true_block);
                ctx.emitter.bind(l_end);
            }
        }
        ctx.scopes.leave();
    }
}

/// Function prologue record, body, and an unconditional trailing return.
fn fn_code(ctx: &mut CodeGenContext<'_>, node: &AstNode) {
    if let AstKind::Fn {
        name,
        mangled,
        body,
        ..
    } = &node.kind
    {
        let body = match body {
            Some(body) => body,
            None => return,
        };
        let mangled = match mangled {
            Some(mangled) => mangled.clone(),
            None => {
                ctx.internal(format!("function '{}' was never mangled", name));
                return;
            }
        };
        ctx.emitter.func(&mangled);
        ctx.scopes.enter(node.id, FrameKind::Fn, name);
        ctx.emit_node(body);
        // Trailing return, even after a structurally guaranteed one.
        ctx.emitter.ret();
        ctx.scopes.leave();
    }
}

/// Affix bodies emit like functions, under their mangled name.
fn affix_code(ctx: &mut CodeGenContext<'_>, node: &AstNode) {
    if let AstKind::Affix {
        name,
        mangled,
        body,
        ..
    } = &node.kind
    {
        let body = match body {
            Some(body) => body,
            None => return,
        };
        let mangled = match mangled {
            Some(mangled) => mangled.clone(),
            None => {
                ctx.internal(format!("affix '{}' was never mangled", name));
                return;
            }
        };
        ctx.emitter.func(&mangled);
        ctx.scopes.enter(node.id, FrameKind::Affix, name);
        ctx.emit_node(body);
        ctx.emitter.ret();
        ctx.scopes.leave();
    }
}

/// Arguments left to right, then a call by the resolved mangled name.
fn fn_call_code(ctx: &mut CodeGenContext<'_>, node: &AstNode) {
    if let AstKind::FnCall {
        name,
        args,
        mangled_name,
        ..
    } = &node.kind
    {
        for arg in args {
            ctx.emit_node(arg);
        }
        match mangled_name {
            Some(mangled_name) => ctx.emitter.call(mangled_name, args.len() as u8),
            None => ctx.internal(format!("call to '{}' was never resolved", name)),
        }
    }
}

/// Operand, then a primitive opcode or a call to the resolved affix.
fn unary_code(ctx: &mut CodeGenContext<'_>, node: &AstNode) {
    if let AstKind::UnaryExpr {
        op,
        expr,
        mangled,
        mangled_name,
    } = &node.kind
    {
        ctx.emit_node(expr);
        if *mangled {
            match mangled_name {
                Some(mangled_name) => ctx.emitter.call(mangled_name, 1),
                None => ctx.internal(format!("operator '{}' marked mangled without a name", op)),
            }
            return;
        }
        let operand = expr_type(ctx.scopes, expr);
        match operand.as_ref().and_then(|t| unary_opcode(op, t)) {
            Some(opcode) => ctx.emitter.op(opcode),
            None => ctx.internal(format!("no opcode for unary '{}' at code generation", op)),
        }
    }
}

/// Operands, then a primitive opcode or a call to the resolved affix.
/// Assignments store instead of pushing.
fn binary_code(ctx: &mut CodeGenContext<'_>, node: &AstNode) {
    if let AstKind::BinaryExpr {
        op,
        lhs,
        rhs,
        mangled,
        mangled_name,
    } = &node.kind
    {
        if op.as_str() == "=" {
            emit_assignment(ctx, lhs, rhs);
            return;
        }
        ctx.emit_node(lhs);
        ctx.emit_node(rhs);
        if *mangled {
            match mangled_name {
                Some(mangled_name) => ctx.emitter.call(mangled_name, 2),
                None => ctx.internal(format!("operator '{}' marked mangled without a name", op)),
            }
            return;
        }
        let operand = match (expr_type(ctx.scopes, lhs), expr_type(ctx.scopes, rhs)) {
            (Some(lt), Some(rt)) => {
                if rt.conforms_to(&lt) {
                    lt
                } else {
                    rt
                }
            }
            _ => {
                ctx.internal(format!("untyped operands for '{}' at code generation", op));
                return;
            }
        };
        match binary_opcode(op, &operand) {
            Some(opcode) => ctx.emitter.op(opcode),
            None => ctx.internal(format!("no opcode for binary '{}' at code generation", op)),
        }
    }
}

fn emit_assignment(ctx: &mut CodeGenContext<'_>, lhs: &AstNode, rhs: &AstNode) {
    match &lhs.kind {
        AstKind::Symbol { name } => {
            ctx.emit_node(rhs);
            match ctx.scopes.lookup(name).and_then(|r| r.slot) {
                Some(slot) => ctx.emitter.store(slot),
                None => ctx.internal(format!("assignment target '{}' has no slot", name)),
            }
        }
        AstKind::Index { array, index } => {
            ctx.emit_node(array);
            ctx.emit_node(index);
            ctx.emit_node(rhs);
            ctx.emitter.store_index();
        }
        _ => ctx.internal("invalid assignment target at code generation"),
    }
}

/// Array expression, index expression, element load.
fn index_code(ctx: &mut CodeGenContext<'_>, node: &AstNode) {
    if let AstKind::Index { array, index } = &node.kind {
        ctx.emit_node(array);
        ctx.emit_node(index);
        ctx.emitter.load_index();
    }
}

/// Head label, optional condition test, body, back-jump, exit label. The
/// foreach form iterates over hidden index/array slots.
fn loop_code(ctx: &mut CodeGenContext<'_>, node: &AstNode) {
    if let AstKind::Loop {
        body,
        expr,
        is_foreach,
        induction_slot,
        index_slot,
        array_slot,
        ..
    } = &node.kind
    {
        if *is_foreach {
            let (expr, index_slot, array_slot) = match (expr, index_slot, array_slot) {
                (Some(expr), Some(index_slot), Some(array_slot)) => {
                    (expr, *index_slot, *array_slot)
                }
                _ => {
                    ctx.internal("foreach loop missing iteration slots");
                    return;
                }
            };

            ctx.emit_node(expr);
            ctx.emitter.store(array_slot);
            ctx.emitter.push_const_i32(0);
            ctx.emitter.store(index_slot);

            let l_head = ctx.emitter.new_label();
            let l_incr = ctx.emitter.new_label();
            let l_exit = ctx.emitter.new_label();

            ctx.emitter.bind(l_head);
            ctx.emitter.load(index_slot);
            ctx.emitter.load(array_slot);
            ctx.emitter.array_len();
            ctx.emitter.op(crate::il::OpCode::LtI32);
            ctx.emitter.branch_if_false(l_exit);

            if let Some(induction_slot) = induction_slot {
                ctx.emitter.load(array_slot);
                ctx.emitter.load(index_slot);
                ctx.emitter.load_index();
                ctx.emitter.store(*induction_slot);
            }

            ctx.scopes.enter(node.id, FrameKind::Loop, "loop");
            ctx.loops.enter(l_incr, l_exit);
            ctx.emit_node(body);
            ctx.loops.leave();
            ctx.scopes.leave();

            ctx.emitter.bind(l_incr);
            ctx.emitter.load(index_slot);
            ctx.emitter.push_const_i32(1);
            ctx.emitter.op(crate::il::OpCode::AddI32);
            ctx.emitter.store(index_slot);
            ctx.emitter.jump(l_head);
            ctx.emitter.bind(l_exit);
        } else {
            let l_head = ctx.emitter.new_label();
            let l_exit = ctx.emitter.new_label();

            ctx.emitter.bind(l_head);
            if let Some(expr) = expr {
                ctx.emit_node(expr);
                ctx.emitter.branch_if_false(l_exit);
            }

            ctx.scopes.enter(node.id, FrameKind::Loop, "loop");
            ctx.loops.enter(l_head, l_exit);
            ctx.emit_node(body);
            ctx.loops.leave();
            ctx.scopes.leave();

            ctx.emitter.jump(l_head);
            ctx.emitter.bind(l_exit);
        }
    }
}

/// Jump to the innermost loop's exit.
fn break_code(ctx: &mut CodeGenContext<'_>, _node: &AstNode) {
    match ctx.loops.current() {
        Some(labels) => ctx.emitter.jump(labels.exit),
        None => ctx.internal("'break' survived analysis outside a loop"),
    }
}

/// Jump to the innermost loop's continue target.
fn continue_code(ctx: &mut CodeGenContext<'_>, _node: &AstNode) {
    match ctx.loops.current() {
        Some(labels) => ctx.emitter.jump(labels.continue_target),
        None => ctx.internal("'continue' survived analysis outside a loop"),
    }
}

/// Optional value, then return.
fn return_code(ctx: &mut CodeGenContext<'_>, node: &AstNode) {
    if let AstKind::Return { expr } = &node.kind {
        if let Some(expr) = expr {
            ctx.emit_node(expr);
        }
        ctx.emitter.ret();
    }
}

/// Symbol reference records for the linker consumer; no executable IL.
fn extern_code(ctx: &mut CodeGenContext<'_>, node: &AstNode) {
    if let AstKind::Extern { decls } = &node.kind {
        ctx.scopes.enter(node.id, FrameKind::Extern, "extern");
        for decl in decls {
            if let AstKind::Fn { name, mangled, .. } = &decl.kind {
                let name = mangled.as_deref().unwrap_or(name);
                ctx.emitter.extern_func(name);
            }
        }
        ctx.scopes.leave();
    }
}

/// Methods emit inside the impl frame.
fn impl_code(ctx: &mut CodeGenContext<'_>, node: &AstNode) {
    if let AstKind::Impl { name, block } = &node.kind {
        ctx.scopes.enter(node.id, FrameKind::Impl, name);
        ctx.emit_node(block);
        ctx.scopes.leave();
    }
}

/// Declarations emit inside the namespace frame.
fn namespace_code(ctx: &mut CodeGenContext<'_>, node: &AstNode) {
    if let AstKind::Namespace { name, block } = &node.kind {
        ctx.scopes.enter_namespace(name);
        ctx.emit_node(block);
        ctx.scopes.leave();
    }
}

// ============================================================================
// Tests
// ============================================================================
