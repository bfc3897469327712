//! Semantic generators: the scope-populating phase.
//!
//! Pass 0 registers the declarations other handlers depend on: struct type
//! records, extern symbols, namespace frames. Pass 1 registers callables
//! (with mangled names and parameter bindings), variable declarations, and
//! `use` links. Literal and expression kinds have no declarations and are
//! no-ops.

use dusk_core::{AstKind, AstNode, CompileError, NodeKind, TypeRef};

use crate::mangle::mangle;
use crate::registry::SemanticGenerator;
use crate::scope::{FieldRecord, FrameKind, Linkage, Signature, SymbolRecord, TypeRecord};

use super::PassContext;

/// The generator table, one entry per node kind.
pub(crate) static HANDLERS: &[SemanticGenerator] = &[
    SemanticGenerator { kind: NodeKind::Block, pass: 0, generate: no_op },
    SemanticGenerator { kind: NodeKind::String, pass: 0, generate: no_op },
    SemanticGenerator { kind: NodeKind::Number, pass: 0, generate: no_op },
    SemanticGenerator { kind: NodeKind::Boolean, pass: 0, generate: no_op },
    SemanticGenerator { kind: NodeKind::Array, pass: 0, generate: no_op },
    SemanticGenerator { kind: NodeKind::Symbol, pass: 0, generate: no_op },
    SemanticGenerator { kind: NodeKind::Type, pass: 0, generate: no_op },
    SemanticGenerator { kind: NodeKind::Dec, pass: 1, generate: dec_generator },
    SemanticGenerator { kind: NodeKind::If, pass: 0, generate: no_op },
    SemanticGenerator { kind: NodeKind::Fn, pass: 1, generate: fn_generator },
    SemanticGenerator { kind: NodeKind::FnCall, pass: 0, generate: no_op },
    SemanticGenerator { kind: NodeKind::Loop, pass: 1, generate: loop_generator },
    SemanticGenerator { kind: NodeKind::Continue, pass: 0, generate: no_op },
    SemanticGenerator { kind: NodeKind::Break, pass: 0, generate: no_op },
    SemanticGenerator { kind: NodeKind::Struct, pass: 0, generate: struct_generator },
    SemanticGenerator { kind: NodeKind::Impl, pass: 1, generate: no_op },
    SemanticGenerator { kind: NodeKind::Attribute, pass: 0, generate: no_op },
    SemanticGenerator { kind: NodeKind::Affix, pass: 1, generate: affix_generator },
    SemanticGenerator { kind: NodeKind::UnaryExpr, pass: 0, generate: no_op },
    SemanticGenerator { kind: NodeKind::BinaryExpr, pass: 0, generate: no_op },
    SemanticGenerator { kind: NodeKind::Index, pass: 0, generate: no_op },
    SemanticGenerator { kind: NodeKind::Return, pass: 0, generate: no_op },
    SemanticGenerator { kind: NodeKind::Extern, pass: 0, generate: extern_generator },
    SemanticGenerator { kind: NodeKind::Use, pass: 1, generate: use_generator },
    SemanticGenerator { kind: NodeKind::Namespace, pass: 0, generate: no_op },
];

fn no_op(_ctx: &mut PassContext<'_>, _node: &mut AstNode) {}

/// Collect the declared parameter types of a callable, erroring on any
/// parameter without a type annotation.
fn param_types(ctx: &mut PassContext<'_>, params: &[AstNode]) -> Vec<TypeRef> {
    let mut types = Vec::with_capacity(params.len());
    for param in params {
        if let AstKind::Dec {
            name,
            declared_type,
            ..
        } = &param.kind
        {
            match declared_type {
                Some(ty) => types.push(ty.clone()),
                None => {
                    ctx.errors.push(CompileError::CannotInfer {
                        name: name.clone(),
                        span: param.span(),
                    });
                    types.push(TypeRef::void());
                }
            }
        }
    }
    types
}

/// Bind the parameters of a callable inside its own frame, assigning slots
/// in declaration order.
fn bind_params(ctx: &mut PassContext<'_>, params: &[AstNode]) {
    for param in params {
        if let AstKind::Dec {
            name,
            declared_type,
            immutable,
            ..
        } = &param.kind
        {
            let slot = ctx.scopes.allocate_slot();
            let record = SymbolRecord {
                decl: param.id,
                span: param.span(),
                ty: declared_type.clone(),
                mutable: !immutable,
                linkage: Linkage::Param,
                slot: Some(slot),
                mangled: None,
                signature: None,
                call_conv: None,
            };
            if let Err(err) = ctx.scopes.declare(name, record) {
                ctx.errors.push(err);
            }
        }
    }
}

/// Bind an identifier in the current scope with its declared type and a
/// fresh slot. Inference for untyped declarations runs in analysis.
fn dec_generator(ctx: &mut PassContext<'_>, node: &mut AstNode) {
    let id = node.id;
    let span = node.span();
    if let AstKind::Dec {
        name,
        declared_type,
        immutable,
        ..
    } = &node.kind
    {
        let linkage = match ctx.scopes.current_kind() {
            FrameKind::Root | FrameKind::Namespace => Linkage::Global,
            _ => Linkage::Local,
        };
        let slot = ctx.scopes.allocate_slot();
        let record = SymbolRecord {
            decl: id,
            span,
            ty: declared_type.clone(),
            mutable: !immutable,
            linkage,
            slot: Some(slot),
            mangled: None,
            signature: None,
            call_conv: None,
        };
        if let Err(err) = ctx.scopes.declare(name, record) {
            ctx.errors.push(err);
        }
    }
}

/// Mangle and bind a function in the enclosing scope; bind its parameters
/// inside its own frame. Inside an `impl`, the function becomes a method of
/// the target type and carries `type_self`. Extern declarations are
/// registered by the extern generator instead.
fn fn_generator(ctx: &mut PassContext<'_>, node: &mut AstNode) {
    if ctx.scopes.current_kind() == FrameKind::Extern {
        return;
    }
    let id = node.id;
    let span = node.span();
    if let AstKind::Fn {
        name,
        mangled,
        type_self,
        params,
        return_type,
        ..
    } = &mut node.kind
    {
        let types = param_types(ctx, params);
        let ret = return_type
            .clone()
            .unwrap_or_else(TypeRef::void);

        let in_impl = ctx.scopes.current_kind() == FrameKind::Impl;
        if in_impl {
            *type_self = Some(ctx.scopes.current_label().to_string());
        }

        let chain = ctx.scopes.chain_labels();
        let mangled_name = mangle(&chain, name, &types, return_type.as_ref());
        *mangled = Some(mangled_name.clone());

        let record = SymbolRecord {
            decl: id,
            span,
            ty: Some(ret.clone()),
            mutable: false,
            linkage: if in_impl {
                Linkage::Method
            } else {
                Linkage::Function
            },
            slot: None,
            mangled: Some(mangled_name.clone()),
            signature: Some(Signature {
                params: types,
                ret: ret.clone(),
            }),
            call_conv: None,
        };
        if let Err(err) = ctx.scopes.declare(name, record) {
            ctx.errors.push(err);
        }

        if in_impl {
            let target = ctx.scopes.current_label().to_string();
            if let Some(ty) = ctx.scopes.lookup_type_mut(&target) {
                ty.methods.push(mangled_name);
            }
        }

        let label = name.clone();
        ctx.scopes.enter(id, FrameKind::Fn, &label);
        ctx.scopes.set_return_type(ret);
        bind_params(ctx, params);
        ctx.scopes.leave();
    }
}

/// Mangle and register a user-defined operator, keyed by fixity and token.
fn affix_generator(ctx: &mut PassContext<'_>, node: &mut AstNode) {
    let id = node.id;
    let span = node.span();
    if let AstKind::Affix {
        affix_type,
        name,
        mangled,
        params,
        return_type,
        ..
    } = &mut node.kind
    {
        let types = param_types(ctx, params);
        let ret = return_type.clone().unwrap_or_else(TypeRef::void);

        let chain = ctx.scopes.chain_labels();
        let mangled_name = mangle(&chain, name, &types, return_type.as_ref());
        *mangled = Some(mangled_name.clone());

        let record = SymbolRecord {
            decl: id,
            span,
            ty: Some(ret.clone()),
            mutable: false,
            linkage: Linkage::Affix,
            slot: None,
            mangled: Some(mangled_name),
            signature: Some(Signature {
                params: types,
                ret: ret.clone(),
            }),
            call_conv: None,
        };
        if let Err(err) = ctx.scopes.declare_affix(*affix_type, name, record) {
            ctx.errors.push(err);
        }

        let label = name.clone();
        ctx.scopes.enter(id, FrameKind::Affix, &label);
        ctx.scopes.set_return_type(ret);
        bind_params(ctx, params);
        ctx.scopes.leave();
    }
}

/// Register a struct type record with field descriptors and running byte
/// offsets. Fields live in the member block and must carry type
/// annotations.
fn struct_generator(ctx: &mut PassContext<'_>, node: &mut AstNode) {
    let id = node.id;
    let span = node.span();
    if let AstKind::Struct { name, block } = &node.kind {
        let mut fields = Vec::new();
        let mut offset = 0u32;
        if let AstKind::Block { statements } = &block.kind {
            for field in statements {
                if let AstKind::Dec {
                    name: field_name,
                    declared_type,
                    ..
                } = &field.kind
                {
                    match declared_type {
                        Some(ty) => {
                            fields.push(FieldRecord {
                                name: field_name.clone(),
                                ty: ty.clone(),
                                offset,
                            });
                            offset += ty.size_in_bytes();
                        }
                        None => ctx.errors.push(CompileError::CannotInfer {
                            name: field_name.clone(),
                            span: field.span(),
                        }),
                    }
                }
            }
        }
        let record = TypeRecord {
            decl: id,
            span,
            name: name.clone(),
            fields,
            methods: Vec::new(),
        };
        if let Err(err) = ctx.scopes.declare_type(record) {
            ctx.errors.push(err);
        }
    }
}

/// Register each contained function as an externally linked symbol. Extern
/// names are not mangled. A `call_conv` attribute on the block is recorded
/// on every symbol it covers.
fn extern_generator(ctx: &mut PassContext<'_>, node: &mut AstNode) {
    let call_conv = node.attributes.iter().find_map(|attr| match &attr.kind {
        AstKind::Attribute { name, args } if name == "call_conv" => {
            args.first().and_then(|arg| match &arg.kind {
                AstKind::String { value } => Some(value.clone()),
                _ => None,
            })
        }
        _ => None,
    });

    if let AstKind::Extern { decls } = &mut node.kind {
        for decl in decls.iter_mut() {
            let decl_id = decl.id;
            let decl_span = decl.span();
            if let AstKind::Fn {
                name,
                mangled,
                params,
                return_type,
                ..
            } = &mut decl.kind
            {
                let types = param_types(ctx, params);
                let ret = return_type.clone().unwrap_or_else(TypeRef::void);
                *mangled = Some(name.clone());

                let record = SymbolRecord {
                    decl: decl_id,
                    span: decl_span,
                    ty: Some(ret.clone()),
                    mutable: false,
                    linkage: Linkage::Extern,
                    slot: None,
                    mangled: Some(name.clone()),
                    signature: Some(Signature { params: types, ret }),
                    call_conv: call_conv.clone(),
                };
                if let Err(err) = ctx.scopes.declare(name, record) {
                    ctx.errors.push(err);
                }
            }
        }
    }
}

/// Bind the foreach induction variable and the hidden iteration slots in
/// the loop frame. The induction type is filled by analysis once the
/// iterated expression is typed.
fn loop_generator(ctx: &mut PassContext<'_>, node: &mut AstNode) {
    let id = node.id;
    let span = node.span();
    if let AstKind::Loop {
        induction,
        is_foreach,
        induction_slot,
        index_slot,
        array_slot,
        ..
    } = &mut node.kind
    {
        if !*is_foreach {
            return;
        }
        ctx.scopes.enter(id, FrameKind::Loop, "loop");
        if let Some(name) = induction {
            let slot = ctx.scopes.allocate_slot();
            let record = SymbolRecord {
                decl: id,
                span,
                ty: None,
                mutable: false,
                linkage: Linkage::Local,
                slot: Some(slot),
                mangled: None,
                signature: None,
                call_conv: None,
            };
            if let Err(err) = ctx.scopes.declare(name, record) {
                ctx.errors.push(err);
            }
            *induction_slot = Some(slot);
        }
        *index_slot = Some(ctx.scopes.allocate_slot());
        *array_slot = Some(ctx.scopes.allocate_slot());
        ctx.scopes.leave();
    }
}

/// Link a previously declared namespace into the current scope.
fn use_generator(ctx: &mut PassContext<'_>, node: &mut AstNode) {
    let span = node.span();
    if let AstKind::Use { name } = &node.kind {
        match ctx.scopes.find_namespace(name) {
            Some(ns) => ctx.scopes.add_use(ns),
            None => ctx.errors.push(CompileError::UnknownNamespace {
                name: name.clone(),
                span,
            }),
        }
    }
}
