//! Semantic analysers: the validation phase.
//!
//! Each handler splits into `validate_semantics` (structural and contextual
//! legality) and `validate_types` (type compatibility). Context checks run
//! at pass 1, once declarations exist; name resolution and type checks run
//! at pass 2.
//!
//! Expression trees are handler-internal: the central walker stops at
//! statement granularity, and statement handlers type and validate their
//! expressions through [`check_expr`], which recurses, accumulates errors,
//! and fills resolved fields (mangled call targets, inferred types, array
//! element types) in place.

use dusk_core::{
    AffixType, AstKind, AstNode, CompileError, NodeKind, NumberValue, Span, TypeRef,
};

use crate::emit::{binary_opcode, is_comparison, unary_opcode};
use crate::registry::SemanticAnalyser;
use crate::scope::{FrameKind, ScopeContext};

use super::PassContext;

/// The analyser table, one entry per node kind.
pub(crate) static HANDLERS: &[SemanticAnalyser] = &[
    SemanticAnalyser { kind: NodeKind::Block, pass: 1, validate_semantics: no_op, validate_types: no_op },
    SemanticAnalyser { kind: NodeKind::String, pass: 1, validate_semantics: no_op, validate_types: no_op },
    SemanticAnalyser { kind: NodeKind::Number, pass: 1, validate_semantics: no_op, validate_types: no_op },
    SemanticAnalyser { kind: NodeKind::Boolean, pass: 1, validate_semantics: no_op, validate_types: no_op },
    SemanticAnalyser { kind: NodeKind::Array, pass: 2, validate_semantics: no_op, validate_types: expr_statement },
    SemanticAnalyser { kind: NodeKind::Symbol, pass: 2, validate_semantics: expr_statement, validate_types: no_op },
    SemanticAnalyser { kind: NodeKind::Type, pass: 1, validate_semantics: no_op, validate_types: no_op },
    SemanticAnalyser { kind: NodeKind::Dec, pass: 2, validate_semantics: no_op, validate_types: dec_types },
    SemanticAnalyser { kind: NodeKind::If, pass: 2, validate_semantics: no_op, validate_types: if_types },
    SemanticAnalyser { kind: NodeKind::Fn, pass: 1, validate_semantics: no_op, validate_types: no_op },
    SemanticAnalyser { kind: NodeKind::FnCall, pass: 2, validate_semantics: no_op, validate_types: expr_statement },
    SemanticAnalyser { kind: NodeKind::Loop, pass: 2, validate_semantics: no_op, validate_types: loop_types },
    SemanticAnalyser { kind: NodeKind::Continue, pass: 1, validate_semantics: continue_semantics, validate_types: no_op },
    SemanticAnalyser { kind: NodeKind::Break, pass: 1, validate_semantics: break_semantics, validate_types: no_op },
    SemanticAnalyser { kind: NodeKind::Struct, pass: 1, validate_semantics: no_op, validate_types: no_op },
    SemanticAnalyser { kind: NodeKind::Impl, pass: 1, validate_semantics: impl_semantics, validate_types: no_op },
    SemanticAnalyser { kind: NodeKind::Attribute, pass: 1, validate_semantics: no_op, validate_types: no_op },
    SemanticAnalyser { kind: NodeKind::Affix, pass: 1, validate_semantics: no_op, validate_types: no_op },
    SemanticAnalyser { kind: NodeKind::UnaryExpr, pass: 2, validate_semantics: no_op, validate_types: expr_statement },
    SemanticAnalyser { kind: NodeKind::BinaryExpr, pass: 2, validate_semantics: no_op, validate_types: expr_statement },
    SemanticAnalyser { kind: NodeKind::Index, pass: 2, validate_semantics: no_op, validate_types: expr_statement },
    SemanticAnalyser { kind: NodeKind::Return, pass: 2, validate_semantics: return_semantics, validate_types: return_types },
    SemanticAnalyser { kind: NodeKind::Extern, pass: 1, validate_semantics: extern_semantics, validate_types: no_op },
    SemanticAnalyser { kind: NodeKind::Use, pass: 1, validate_semantics: no_op, validate_types: no_op },
    SemanticAnalyser { kind: NodeKind::Namespace, pass: 1, validate_semantics: no_op, validate_types: no_op },
];

fn no_op(_ctx: &mut PassContext<'_>, _node: &mut AstNode) {}

/// Validate an expression appearing in statement position.
fn expr_statement(ctx: &mut PassContext<'_>, node: &mut AstNode) {
    check_expr(ctx, node);
}

// ============================================================================
// Statement analysers
// ============================================================================

/// Declared and initialiser types must conform; with no declared type the
/// initialiser type is inferred into the symbol record.
fn dec_types(ctx: &mut PassContext<'_>, node: &mut AstNode) {
    let span = node.span();
    if let AstKind::Dec {
        name,
        declared_type,
        value,
        ..
    } = &mut node.kind
    {
        match (declared_type.as_ref(), value.as_mut()) {
            (Some(expected), Some(value)) => {
                let vspan = value.span();
                if let Some(found) = check_expr(ctx, value) {
                    if !found.conforms_to(expected) {
                        ctx.errors.push(CompileError::TypeMismatch {
                            expected: expected.to_string(),
                            found: found.to_string(),
                            span: vspan,
                        });
                    }
                }
            }
            (None, Some(value)) => {
                if let Some(found) = check_expr(ctx, value) {
                    if let Some(record) = ctx.scopes.lookup_mut(name) {
                        record.ty = Some(found);
                    }
                }
            }
            (Some(_), None) => {}
            (None, None) => ctx.errors.push(CompileError::CannotInfer {
                name: name.clone(),
                span,
            }),
        }
    }
}

/// The condition must resolve to `bool`.
fn if_types(ctx: &mut PassContext<'_>, node: &mut AstNode) {
    if let AstKind::If { condition, .. } = &mut node.kind {
        let span = condition.span();
        if let Some(found) = check_expr(ctx, condition) {
            if !found.is_bool() {
                ctx.errors.push(CompileError::NonBooleanCondition {
                    found: found.to_string(),
                    span,
                });
            }
        }
    }
}

/// Conditional loops need a boolean expression; foreach loops need an
/// array, whose element type becomes the induction variable's type.
fn loop_types(ctx: &mut PassContext<'_>, node: &mut AstNode) {
    let id = node.id;
    if let AstKind::Loop {
        induction,
        expr,
        is_foreach,
        ..
    } = &mut node.kind
    {
        let expr = match expr {
            Some(expr) => expr,
            None => return,
        };
        let span = expr.span();
        let found = check_expr(ctx, expr);

        if *is_foreach {
            match found {
                Some(TypeRef::Array(elem)) => {
                    if let Some(name) = induction {
                        ctx.scopes.enter(id, FrameKind::Loop, "loop");
                        if let Some(record) = ctx.scopes.lookup_mut(name) {
                            record.ty = Some((*elem).clone());
                        }
                        ctx.scopes.leave();
                    }
                }
                Some(other) => ctx.errors.push(CompileError::NotIterable {
                    found: other.to_string(),
                    span,
                }),
                None => {}
            }
        } else if let Some(found) = found {
            if !found.is_bool() {
                ctx.errors.push(CompileError::NonBooleanCondition {
                    found: found.to_string(),
                    span,
                });
            }
        }
    }
}

/// `break` must sit inside a loop of the current function.
fn break_semantics(ctx: &mut PassContext<'_>, node: &mut AstNode) {
    if !ctx.scopes.in_loop() {
        ctx.errors.push(CompileError::BreakOutsideLoop { span: node.span() });
    }
}

/// `continue` must sit inside a loop of the current function.
fn continue_semantics(ctx: &mut PassContext<'_>, node: &mut AstNode) {
    if !ctx.scopes.in_loop() {
        ctx.errors
            .push(CompileError::ContinueOutsideLoop { span: node.span() });
    }
}

/// `return` must sit inside a function or affix body.
fn return_semantics(ctx: &mut PassContext<'_>, node: &mut AstNode) {
    if ctx.scopes.enclosing_return().is_none() {
        ctx.errors
            .push(CompileError::ReturnOutsideFunction { span: node.span() });
    }
}

/// The returned value must conform to the enclosing return type; a bare
/// `return` is `void`.
fn return_types(ctx: &mut PassContext<'_>, node: &mut AstNode) {
    let span = node.span();
    let expected = match ctx.scopes.enclosing_return() {
        Some(expected) => expected,
        // Already reported by validate_semantics.
        None => return,
    };
    if let AstKind::Return { expr } = &mut node.kind {
        let found = match expr {
            Some(expr) => match check_expr(ctx, expr) {
                Some(found) => found,
                None => return,
            },
            None => TypeRef::void(),
        };
        if !found.conforms_to(&expected) {
            ctx.errors.push(CompileError::TypeMismatch {
                expected: expected.to_string(),
                found: found.to_string(),
                span,
            });
        }
    }
}

/// Extern declarations must not carry bodies.
fn extern_semantics(ctx: &mut PassContext<'_>, node: &mut AstNode) {
    if let AstKind::Extern { decls } = &node.kind {
        for decl in decls {
            if let AstKind::Fn {
                name,
                body: Some(_),
                ..
            } = &decl.kind
            {
                ctx.errors.push(CompileError::ExternWithBody {
                    name: name.clone(),
                    span: decl.span(),
                });
            }
        }
    }
}

/// The impl target type must exist.
fn impl_semantics(ctx: &mut PassContext<'_>, node: &mut AstNode) {
    let span = node.span();
    if let AstKind::Impl { name, .. } = &node.kind {
        if ctx.scopes.lookup_type(name).is_none() {
            ctx.errors.push(CompileError::UnknownType {
                name: name.clone(),
                span,
            });
        }
    }
}

// ============================================================================
// Expression checking
// ============================================================================

/// The type of a number literal, from its width and signedness.
pub(crate) fn number_type(value: NumberValue, is_signed: bool, bits: u8) -> TypeRef {
    match value {
        NumberValue::Float(_) => {
            TypeRef::named(if bits == 64 { "f64" } else { "f32" })
        }
        NumberValue::Int(_) | NumberValue::Uint(_) => {
            let bits = if bits == 0 { 32 } else { bits };
            TypeRef::named(format!("{}{}", if is_signed { "i" } else { "u" }, bits))
        }
    }
}

/// The type both operands of a binary operator are brought to, if the
/// widening rules allow one.
fn common_type(lhs: &TypeRef, rhs: &TypeRef) -> Option<TypeRef> {
    if rhs.conforms_to(lhs) {
        Some(lhs.clone())
    } else if lhs.conforms_to(rhs) {
        Some(rhs.clone())
    } else {
        None
    }
}

/// Recursively validate and type an expression.
///
/// Errors are accumulated; `None` means the expression (or a child) was
/// already diagnosed, so callers stay silent to avoid cascades.
fn check_expr(ctx: &mut PassContext<'_>, node: &mut AstNode) -> Option<TypeRef> {
    let span = node.span();
    match &mut node.kind {
        AstKind::String { .. } => Some(TypeRef::named("str")),
        AstKind::Number {
            value,
            is_signed,
            bits,
        } => Some(number_type(*value, *is_signed, *bits)),
        AstKind::Boolean { .. } => Some(TypeRef::bool()),

        AstKind::Array {
            elements,
            element_type,
        } => {
            let mut first: Option<TypeRef> = None;
            for element in elements.iter_mut() {
                let espan = element.span();
                let found = check_expr(ctx, element);
                match (&first, found) {
                    (None, Some(found)) => first = Some(found),
                    (Some(expected), Some(found)) => {
                        if !found.conforms_to(expected) {
                            ctx.errors.push(CompileError::TypeMismatch {
                                expected: expected.to_string(),
                                found: found.to_string(),
                                span: espan,
                            });
                        }
                    }
                    _ => {}
                }
            }
            let elem = first.unwrap_or_else(TypeRef::void);
            *element_type = Some(elem.clone());
            Some(TypeRef::array_of(elem))
        }

        AstKind::Symbol { name } => match ctx.scopes.lookup(name) {
            Some(record) => record.ty.clone(),
            None => {
                ctx.errors.push(CompileError::UnknownSymbol {
                    name: name.clone(),
                    span,
                });
                None
            }
        },

        AstKind::FnCall {
            name,
            args,
            mangled,
            mangled_name,
        } => {
            let mut arg_types = Vec::with_capacity(args.len());
            let mut arg_spans = Vec::with_capacity(args.len());
            for arg in args.iter_mut() {
                arg_spans.push(arg.span());
                arg_types.push(check_expr(ctx, arg));
            }

            let record = match ctx.scopes.lookup(name) {
                Some(record) => record.clone(),
                None => {
                    ctx.errors.push(CompileError::UnknownFunction {
                        name: name.clone(),
                        span,
                    });
                    return None;
                }
            };
            let signature = match &record.signature {
                Some(signature) => signature,
                None => {
                    ctx.errors.push(CompileError::TypeMismatch {
                        expected: "function".into(),
                        found: record
                            .ty
                            .as_ref()
                            .map(|t| t.to_string())
                            .unwrap_or_else(|| "symbol".into()),
                        span,
                    });
                    return None;
                }
            };

            if arg_types.len() != signature.params.len() {
                ctx.errors.push(CompileError::WrongArity {
                    name: name.clone(),
                    expected: signature.params.len(),
                    got: arg_types.len(),
                    span,
                });
            } else {
                for ((found, param), aspan) in
                    arg_types.iter().zip(&signature.params).zip(&arg_spans)
                {
                    if let Some(found) = found {
                        if !found.conforms_to(param) {
                            ctx.errors.push(CompileError::TypeMismatch {
                                expected: param.to_string(),
                                found: found.to_string(),
                                span: *aspan,
                            });
                        }
                    }
                }
            }

            *mangled = true;
            *mangled_name = record.mangled.clone();
            Some(signature.ret.clone())
        }

        AstKind::UnaryExpr {
            op,
            expr,
            mangled,
            mangled_name,
        } => {
            let operand = check_expr(ctx, expr)?;
            if unary_opcode(op, &operand).is_some() {
                return Some(if op.as_str() == "!" {
                    TypeRef::bool()
                } else {
                    operand
                });
            }
            for affix_type in [AffixType::Prefix, AffixType::Suffix] {
                if let Some(record) = ctx.scopes.lookup_affix(affix_type, op) {
                    let record = record.clone();
                    if let Some(signature) = &record.signature {
                        if signature.params.len() == 1
                            && operand.conforms_to(&signature.params[0])
                        {
                            *mangled = true;
                            *mangled_name = record.mangled.clone();
                            return Some(signature.ret.clone());
                        }
                    }
                }
            }
            ctx.errors.push(CompileError::NoUnaryOperator {
                op: op.clone(),
                operand: operand.to_string(),
                span,
            });
            None
        }

        AstKind::BinaryExpr {
            op,
            lhs,
            rhs,
            mangled,
            mangled_name,
        } => {
            if op.as_str() == "=" {
                return check_assignment(ctx, span, lhs, rhs);
            }

            let lt = check_expr(ctx, lhs)?;
            let rt = check_expr(ctx, rhs)?;

            if let Some(common) = common_type(&lt, &rt) {
                if binary_opcode(op, &common).is_some() {
                    let result = if is_comparison(op) || op.as_str() == "&&" || op.as_str() == "||"
                    {
                        TypeRef::bool()
                    } else {
                        common
                    };
                    return Some(result);
                }
            }

            if let Some(record) = ctx.scopes.lookup_affix(AffixType::Infix, op) {
                let record = record.clone();
                if let Some(signature) = &record.signature {
                    if signature.params.len() == 2
                        && lt.conforms_to(&signature.params[0])
                        && rt.conforms_to(&signature.params[1])
                    {
                        *mangled = true;
                        *mangled_name = record.mangled.clone();
                        return Some(signature.ret.clone());
                    }
                }
            }

            ctx.errors.push(CompileError::NoBinaryOperator {
                op: op.clone(),
                lhs: lt.to_string(),
                rhs: rt.to_string(),
                span,
            });
            None
        }

        AstKind::Index { array, index } => {
            let ispan = index.span();
            let array_type = check_expr(ctx, array);
            let index_type = check_expr(ctx, index);

            if let Some(index_type) = index_type {
                if !index_type.is_integer() {
                    ctx.errors.push(CompileError::NonIntegerIndex {
                        found: index_type.to_string(),
                        span: ispan,
                    });
                }
            }
            match array_type {
                Some(TypeRef::Array(elem)) => Some(*elem),
                Some(other) => {
                    ctx.errors.push(CompileError::NotAnArray {
                        found: other.to_string(),
                        span,
                    });
                    None
                }
                None => None,
            }
        }

        // Not expression kinds.
        _ => None,
    }
}

/// Validate `lhs = rhs`: the target must be a mutable symbol or an array
/// element, and the value must conform. Assignments yield `void`.
fn check_assignment(
    ctx: &mut PassContext<'_>,
    span: Span,
    lhs: &mut AstNode,
    rhs: &mut AstNode,
) -> Option<TypeRef> {
    let rspan = rhs.span();
    let value_type = check_expr(ctx, rhs);

    match lhs.tag() {
        NodeKind::Symbol => {
            let name = match &lhs.kind {
                AstKind::Symbol { name } => name.clone(),
                _ => unreachable!(),
            };
            let record = match ctx.scopes.lookup(&name) {
                Some(record) => record.clone(),
                None => {
                    ctx.errors.push(CompileError::UnknownSymbol {
                        name,
                        span: lhs.span(),
                    });
                    return Some(TypeRef::void());
                }
            };
            if !record.mutable {
                ctx.errors.push(CompileError::AssignToImmutable {
                    name: name.clone(),
                    span,
                });
            }
            match (&record.ty, &value_type) {
                (Some(expected), Some(found)) => {
                    if !found.conforms_to(expected) {
                        ctx.errors.push(CompileError::TypeMismatch {
                            expected: expected.to_string(),
                            found: found.to_string(),
                            span: rspan,
                        });
                    }
                }
                (None, Some(found)) => {
                    if let Some(record) = ctx.scopes.lookup_mut(&name) {
                        record.ty = Some(found.clone());
                    }
                }
                _ => {}
            }
        }
        NodeKind::Index => {
            let element_type = check_expr(ctx, lhs);
            if let (Some(expected), Some(found)) = (element_type, &value_type) {
                if !found.conforms_to(&expected) {
                    ctx.errors.push(CompileError::TypeMismatch {
                        expected: expected.to_string(),
                        found: found.to_string(),
                        span: rspan,
                    });
                }
            }
        }
        _ => ctx
            .errors
            .push(CompileError::InvalidAssignmentTarget { span }),
    }
    Some(TypeRef::void())
}

// ============================================================================
// Post-analysis typing
// ============================================================================

/// The type of an already-analysed expression, without diagnostics.
///
/// Code generation uses this to pick typed opcodes; the filled-in fields
/// (array element types, resolved affixes) are assumed present.
pub(crate) fn expr_type(scopes: &ScopeContext, node: &AstNode) -> Option<TypeRef> {
    match &node.kind {
        AstKind::String { .. } => Some(TypeRef::named("str")),
        AstKind::Number {
            value,
            is_signed,
            bits,
        } => Some(number_type(*value, *is_signed, *bits)),
        AstKind::Boolean { .. } => Some(TypeRef::bool()),
        AstKind::Array { element_type, .. } => element_type
            .clone()
            .map(TypeRef::array_of),
        AstKind::Symbol { name } => scopes.lookup(name).and_then(|r| r.ty.clone()),
        AstKind::FnCall { name, .. } => scopes
            .lookup(name)
            .and_then(|r| r.signature.as_ref())
            .map(|s| s.ret.clone()),
        AstKind::UnaryExpr { op, expr, .. } => {
            if op == "!" {
                Some(TypeRef::bool())
            } else {
                expr_type(scopes, expr)
            }
        }
        AstKind::BinaryExpr { op, lhs, rhs, .. } => {
            if op == "=" {
                Some(TypeRef::void())
            } else if is_comparison(op) || op == "&&" || op == "||" {
                Some(TypeRef::bool())
            } else {
                let lt = expr_type(scopes, lhs)?;
                let rt = expr_type(scopes, rhs)?;
                common_type(&lt, &rt)
            }
        }
        AstKind::Index { array, .. } => match expr_type(scopes, array)? {
            TypeRef::Array(elem) => Some(*elem),
            _ => None,
        },
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
