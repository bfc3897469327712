//! Lexical scope management for the semantic pipeline.
//!
//! Scopes form a tree of frames that persists across passes: `enter` finds
//! the frame previously created for a node and re-enters it, so bindings
//! made by an early pass are visible to later passes walking the same tree.
//! A cursor stack tracks the frames of the walk in progress; name lookup
//! tries the top of the stack first and walks down.
//!
//! The root frame exists from construction until the assembly is dropped.
//! Namespace frames are anchored at the root regardless of where the
//! declaration appears, so `use` can find them from any file.

use dusk_core::{AffixType, CompileError, NodeId, Span, TypeRef};
use rustc_hash::FxHashMap;

// ============================================================================
// Records
// ============================================================================

/// Identifier of a frame in the scope tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

/// What kind of construct a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Root,
    If,
    Fn,
    Affix,
    Loop,
    Impl,
    Extern,
    Namespace,
}

impl FrameKind {
    /// Whether bindings in this frame draw slots from their own counter.
    fn owns_slots(&self) -> bool {
        matches!(self, FrameKind::Root | FrameKind::Fn | FrameKind::Affix)
    }
}

/// How a symbol is linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    /// Local binding inside a function body.
    Local,
    /// Function or affix parameter.
    Param,
    /// Binding at file or namespace level.
    Global,
    /// Externally linked, no body.
    Extern,
    /// Free function declared in this assembly.
    Function,
    /// Function bound to a type through an `impl`.
    Method,
    /// User-defined operator.
    Affix,
}

/// Parameter and return types of a callable.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub params: Vec<TypeRef>,
    pub ret: TypeRef,
}

/// One symbol binding.
///
/// Holds a non-owning handle to the declaring node plus everything later
/// passes need without touching the tree again.
#[derive(Debug, Clone)]
pub struct SymbolRecord {
    /// Declaring node.
    pub decl: NodeId,
    /// Declaration site, for duplicate reporting.
    pub span: Span,
    /// Resolved type. `None` until inference runs for untyped declarations.
    pub ty: Option<TypeRef>,
    /// Whether assignment is allowed.
    pub mutable: bool,
    /// Linkage class.
    pub linkage: Linkage,
    /// Slot index for storable bindings.
    pub slot: Option<u16>,
    /// Callable identity in the IL.
    pub mangled: Option<String>,
    /// Parameter/return types for callables.
    pub signature: Option<Signature>,
    /// Calling convention recorded from an attribute, for extern symbols.
    pub call_conv: Option<String>,
}

/// One struct field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRecord {
    pub name: String,
    pub ty: TypeRef,
    pub offset: u32,
}

/// One declared type.
#[derive(Debug, Clone)]
pub struct TypeRecord {
    /// Declaring node.
    pub decl: NodeId,
    /// Declaration site.
    pub span: Span,
    /// Type name.
    pub name: String,
    /// Ordered fields with byte offsets.
    pub fields: Vec<FieldRecord>,
    /// Mangled names of methods bound through `impl`.
    pub methods: Vec<String>,
}

// ============================================================================
// Frames
// ============================================================================

#[derive(Debug)]
struct Frame {
    owner: Option<NodeId>,
    kind: FrameKind,
    label: String,
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    symbols: FxHashMap<String, SymbolRecord>,
    types: FxHashMap<String, TypeRecord>,
    affixes: FxHashMap<(AffixType, String), SymbolRecord>,
    uses: Vec<ScopeId>,
    next_slot: u32,
    ret: Option<TypeRef>,
}

impl Frame {
    fn new(owner: Option<NodeId>, kind: FrameKind, label: String, parent: Option<ScopeId>) -> Self {
        Self {
            owner,
            kind,
            label,
            parent,
            children: Vec::new(),
            symbols: FxHashMap::default(),
            types: FxHashMap::default(),
            affixes: FxHashMap::default(),
            uses: Vec::new(),
            next_slot: 0,
            ret: None,
        }
    }
}

// ============================================================================
// ScopeContext
// ============================================================================

/// The scope tree plus the cursor stack of the walk in progress.
#[derive(Debug)]
pub struct ScopeContext {
    frames: Vec<Frame>,
    stack: Vec<ScopeId>,
}

impl ScopeContext {
    /// Create a context containing only the root frame.
    pub fn new() -> Self {
        let root = Frame::new(None, FrameKind::Root, "root".into(), None);
        Self {
            frames: vec![root],
            stack: vec![ScopeId(0)],
        }
    }

    /// The root frame id.
    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Current cursor depth. One means only the root is active.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// The frame at the top of the cursor stack.
    pub fn current(&self) -> ScopeId {
        *self.stack.last().expect("scope stack never empty")
    }

    /// Kind of the current frame.
    pub fn current_kind(&self) -> FrameKind {
        self.frames[self.current().0 as usize].kind
    }

    /// Label of the current frame.
    pub fn current_label(&self) -> &str {
        &self.frames[self.current().0 as usize].label
    }

    // ==========================================================================
    // Enter / leave
    // ==========================================================================

    /// Enter the frame owned by `owner`, creating it on first entry.
    ///
    /// Every phase walking the same tree re-enters the same frame, which is
    /// what keeps bindings alive between passes.
    pub fn enter(&mut self, owner: NodeId, kind: FrameKind, label: &str) -> ScopeId {
        let current = self.current();
        let existing = self.frames[current.0 as usize]
            .children
            .iter()
            .copied()
            .find(|id| self.frames[id.0 as usize].owner == Some(owner));

        let id = match existing {
            Some(id) => id,
            None => {
                let id = ScopeId(self.frames.len() as u32);
                self.frames
                    .push(Frame::new(Some(owner), kind, label.to_string(), Some(current)));
                self.frames[current.0 as usize].children.push(id);
                id
            }
        };
        self.stack.push(id);
        id
    }

    /// Enter the namespace frame called `name`, anchored at the root.
    ///
    /// Multiple files entering the same name share one frame.
    pub fn enter_namespace(&mut self, name: &str) -> ScopeId {
        let id = match self.find_namespace(name) {
            Some(id) => id,
            None => {
                let id = ScopeId(self.frames.len() as u32);
                self.frames.push(Frame::new(
                    None,
                    FrameKind::Namespace,
                    name.to_string(),
                    Some(self.root()),
                ));
                let root = self.root();
                self.frames[root.0 as usize].children.push(id);
                id
            }
        };
        self.stack.push(id);
        id
    }

    /// Leave the current frame. The root can never be left.
    pub fn leave(&mut self) {
        debug_assert!(self.stack.len() > 1, "leave() without matching enter()");
        self.stack.pop();
    }

    /// Find a namespace frame by name among the root's children.
    pub fn find_namespace(&self, name: &str) -> Option<ScopeId> {
        self.frames[self.root().0 as usize]
            .children
            .iter()
            .copied()
            .find(|id| {
                let frame = &self.frames[id.0 as usize];
                frame.kind == FrameKind::Namespace && frame.label == name
            })
    }

    // ==========================================================================
    // Declarations
    // ==========================================================================

    /// Bind a symbol in the current frame.
    pub fn declare(&mut self, name: &str, record: SymbolRecord) -> Result<(), CompileError> {
        let idx = self.current().0 as usize;
        let frame = &mut self.frames[idx];
        if let Some(existing) = frame.symbols.get(name) {
            return Err(CompileError::DuplicateDeclaration {
                name: name.to_string(),
                original: existing.span,
                span: record.span,
            });
        }
        frame.symbols.insert(name.to_string(), record);
        Ok(())
    }

    /// Register a type in the current frame.
    pub fn declare_type(&mut self, record: TypeRecord) -> Result<(), CompileError> {
        let idx = self.current().0 as usize;
        let frame = &mut self.frames[idx];
        if let Some(existing) = frame.types.get(&record.name) {
            return Err(CompileError::DuplicateDeclaration {
                name: record.name.clone(),
                original: existing.span,
                span: record.span,
            });
        }
        frame.types.insert(record.name.clone(), record);
        Ok(())
    }

    /// Register an affix operator in the current frame.
    pub fn declare_affix(
        &mut self,
        affix_type: AffixType,
        op: &str,
        record: SymbolRecord,
    ) -> Result<(), CompileError> {
        let idx = self.current().0 as usize;
        let frame = &mut self.frames[idx];
        let key = (affix_type, op.to_string());
        if let Some(existing) = frame.affixes.get(&key) {
            return Err(CompileError::DuplicateDeclaration {
                name: op.to_string(),
                original: existing.span,
                span: record.span,
            });
        }
        frame.affixes.insert(key, record);
        Ok(())
    }

    /// Link a namespace frame into the current frame's lookup path.
    pub fn add_use(&mut self, namespace: ScopeId) {
        let idx = self.current().0 as usize;
        let frame = &mut self.frames[idx];
        if !frame.uses.contains(&namespace) {
            frame.uses.push(namespace);
        }
    }

    /// Allocate the next slot from the nearest slot-owning frame on the
    /// cursor stack (function, affix, or root).
    pub fn allocate_slot(&mut self) -> u16 {
        for id in self.stack.iter().rev() {
            let frame = &mut self.frames[id.0 as usize];
            if frame.kind.owns_slots() {
                let slot = frame.next_slot;
                frame.next_slot += 1;
                return slot as u16;
            }
        }
        unreachable!("root frame owns slots");
    }

    /// Record the return type of the current function frame.
    pub fn set_return_type(&mut self, ty: TypeRef) {
        let idx = self.current().0 as usize;
        let frame = &mut self.frames[idx];
        debug_assert!(matches!(frame.kind, FrameKind::Fn | FrameKind::Affix));
        frame.ret = Some(ty);
    }

    // ==========================================================================
    // Lookup
    // ==========================================================================

    /// Resolve a symbol by walking the cursor stack top-down. Each frame's
    /// own bindings are tried before its `use`-linked namespaces.
    pub fn lookup(&self, name: &str) -> Option<&SymbolRecord> {
        for id in self.stack.iter().rev() {
            let frame = &self.frames[id.0 as usize];
            if let Some(record) = frame.symbols.get(name) {
                return Some(record);
            }
            for used in &frame.uses {
                if let Some(record) = self.frames[used.0 as usize].symbols.get(name) {
                    return Some(record);
                }
            }
        }
        None
    }

    /// Mutable variant of [`lookup`](Self::lookup), used by analysis to
    /// fill inferred types into existing records.
    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut SymbolRecord> {
        let mut found: Option<ScopeId> = None;
        'outer: for id in self.stack.iter().rev() {
            let frame = &self.frames[id.0 as usize];
            if frame.symbols.contains_key(name) {
                found = Some(*id);
                break;
            }
            for used in &frame.uses {
                if self.frames[used.0 as usize].symbols.contains_key(name) {
                    found = Some(*used);
                    break 'outer;
                }
            }
        }
        let id = found?;
        self.frames[id.0 as usize].symbols.get_mut(name)
    }

    /// Resolve a type name along the cursor stack.
    pub fn lookup_type(&self, name: &str) -> Option<&TypeRecord> {
        for id in self.stack.iter().rev() {
            let frame = &self.frames[id.0 as usize];
            if let Some(record) = frame.types.get(name) {
                return Some(record);
            }
            for used in &frame.uses {
                if let Some(record) = self.frames[used.0 as usize].types.get(name) {
                    return Some(record);
                }
            }
        }
        None
    }

    /// Mutable variant of [`lookup_type`](Self::lookup_type).
    pub fn lookup_type_mut(&mut self, name: &str) -> Option<&mut TypeRecord> {
        let mut found: Option<ScopeId> = None;
        for id in self.stack.iter().rev() {
            if self.frames[id.0 as usize].types.contains_key(name) {
                found = Some(*id);
                break;
            }
        }
        let id = found?;
        self.frames[id.0 as usize].types.get_mut(name)
    }

    /// Resolve an affix operator along the cursor stack.
    pub fn lookup_affix(&self, affix_type: AffixType, op: &str) -> Option<&SymbolRecord> {
        let key = (affix_type, op.to_string());
        for id in self.stack.iter().rev() {
            let frame = &self.frames[id.0 as usize];
            if let Some(record) = frame.affixes.get(&key) {
                return Some(record);
            }
            for used in &frame.uses {
                if let Some(record) = self.frames[used.0 as usize].affixes.get(&key) {
                    return Some(record);
                }
            }
        }
        None
    }

    // ==========================================================================
    // Context queries
    // ==========================================================================

    /// Whether the cursor is inside a loop, without crossing a function
    /// boundary.
    pub fn in_loop(&self) -> bool {
        for id in self.stack.iter().rev() {
            match self.frames[id.0 as usize].kind {
                FrameKind::Loop => return true,
                FrameKind::Fn | FrameKind::Affix => return false,
                _ => {}
            }
        }
        false
    }

    /// The declared return type of the enclosing function or affix, or
    /// `None` when the cursor is outside any.
    pub fn enclosing_return(&self) -> Option<TypeRef> {
        for id in self.stack.iter().rev() {
            let frame = &self.frames[id.0 as usize];
            if matches!(frame.kind, FrameKind::Fn | FrameKind::Affix) {
                return Some(frame.ret.clone().unwrap_or_else(TypeRef::void));
            }
        }
        None
    }

    /// Labels of the naming frames on the cursor stack, outermost first.
    /// Used to build mangled names; `if`/`loop`/`extern` frames do not
    /// contribute.
    pub fn chain_labels(&self) -> Vec<String> {
        self.stack
            .iter()
            .filter(|id| {
                matches!(
                    self.frames[id.0 as usize].kind,
                    FrameKind::Namespace | FrameKind::Impl | FrameKind::Fn | FrameKind::Affix
                )
            })
            .map(|id| self.frames[id.0 as usize].label.clone())
            .collect()
    }
}

impl Default for ScopeContext {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn local(ty: &str, span: Span) -> SymbolRecord {
        SymbolRecord {
            decl: NodeId(1),
            span,
            ty: Some(TypeRef::named(ty)),
            mutable: true,
            linkage: Linkage::Local,
            slot: Some(0),
            mangled: None,
            signature: None,
            call_conv: None,
        }
    }

    #[test]
    fn root_is_permanent() {
        let scopes = ScopeContext::new();
        assert_eq!(scopes.depth(), 1);
        assert_eq!(scopes.current_kind(), FrameKind::Root);
    }

    #[test]
    fn enter_reuses_frame_across_walks() {
        let mut scopes = ScopeContext::new();
        let owner = NodeId(7);

        let first = scopes.enter(owner, FrameKind::Fn, "main");
        scopes
            .declare("x", local("i32", Span::point(1, 5)))
            .unwrap();
        scopes.leave();

        // A later pass enters the same node and sees the binding.
        let second = scopes.enter(owner, FrameKind::Fn, "main");
        assert_eq!(first, second);
        assert!(scopes.lookup("x").is_some());
        scopes.leave();
    }

    #[test]
    fn lookup_walks_down_the_stack() {
        let mut scopes = ScopeContext::new();
        scopes
            .declare("outer", local("i32", Span::point(1, 1)))
            .unwrap();

        scopes.enter(NodeId(1), FrameKind::Fn, "f");
        scopes
            .declare("inner", local("bool", Span::point(2, 1)))
            .unwrap();

        assert!(scopes.lookup("inner").is_some());
        assert!(scopes.lookup("outer").is_some());
        scopes.leave();
        assert!(scopes.lookup("inner").is_none());
    }

    #[test]
    fn duplicate_in_same_frame_rejected() {
        let mut scopes = ScopeContext::new();
        scopes.declare("x", local("i32", Span::point(1, 1))).unwrap();
        let err = scopes
            .declare("x", local("i32", Span::point(2, 1)))
            .unwrap_err();
        assert!(matches!(err, CompileError::DuplicateDeclaration { .. }));
    }

    #[test]
    fn shadowing_in_inner_frame_allowed() {
        let mut scopes = ScopeContext::new();
        scopes.declare("x", local("i32", Span::point(1, 1))).unwrap();
        scopes.enter(NodeId(1), FrameKind::If, "if");
        assert!(scopes.declare("x", local("bool", Span::point(2, 1))).is_ok());
        assert_eq!(
            scopes.lookup("x").unwrap().ty,
            Some(TypeRef::named("bool"))
        );
        scopes.leave();
        assert_eq!(scopes.lookup("x").unwrap().ty, Some(TypeRef::named("i32")));
    }

    #[test]
    fn slots_come_from_nearest_function() {
        let mut scopes = ScopeContext::new();
        assert_eq!(scopes.allocate_slot(), 0); // root
        assert_eq!(scopes.allocate_slot(), 1);

        scopes.enter(NodeId(1), FrameKind::Fn, "f");
        assert_eq!(scopes.allocate_slot(), 0); // fresh counter
        scopes.enter(NodeId(2), FrameKind::If, "if");
        // Block scopes draw from the enclosing function.
        assert_eq!(scopes.allocate_slot(), 1);
        scopes.leave();
        scopes.leave();

        assert_eq!(scopes.allocate_slot(), 2); // root counter resumed
    }

    #[test]
    fn namespaces_anchor_at_root() {
        let mut scopes = ScopeContext::new();
        scopes.enter(NodeId(1), FrameKind::Fn, "f");
        let ns = scopes.enter_namespace("A");
        scopes.leave();
        scopes.leave();

        assert_eq!(scopes.find_namespace("A"), Some(ns));
        // Re-entering by name reuses the frame.
        let again = scopes.enter_namespace("A");
        assert_eq!(ns, again);
        scopes.leave();
    }

    #[test]
    fn use_links_namespace_bindings() {
        let mut scopes = ScopeContext::new();
        let ns = scopes.enter_namespace("A");
        scopes
            .declare("f", local("i32", Span::point(1, 1)))
            .unwrap();
        scopes.leave();

        assert!(scopes.lookup("f").is_none());
        scopes.add_use(ns);
        assert!(scopes.lookup("f").is_some());
    }

    #[test]
    fn in_loop_stops_at_function_boundary() {
        let mut scopes = ScopeContext::new();
        scopes.enter(NodeId(1), FrameKind::Loop, "loop");
        assert!(scopes.in_loop());

        scopes.enter(NodeId(2), FrameKind::Fn, "nested");
        assert!(!scopes.in_loop());
        scopes.leave();
        scopes.leave();
        assert!(!scopes.in_loop());
    }

    #[test]
    fn enclosing_return_finds_function() {
        let mut scopes = ScopeContext::new();
        assert_eq!(scopes.enclosing_return(), None);

        scopes.enter(NodeId(1), FrameKind::Fn, "f");
        scopes.set_return_type(TypeRef::named("i32"));
        scopes.enter(NodeId(2), FrameKind::If, "if");
        assert_eq!(scopes.enclosing_return(), Some(TypeRef::named("i32")));
        scopes.leave();
        scopes.leave();
    }

    #[test]
    fn chain_labels_skip_anonymous_frames() {
        let mut scopes = ScopeContext::new();
        scopes.enter_namespace("A");
        scopes.enter(NodeId(1), FrameKind::Fn, "f");
        scopes.enter(NodeId(2), FrameKind::If, "if");
        assert_eq!(scopes.chain_labels(), vec!["A".to_string(), "f".to_string()]);
        scopes.leave();
        scopes.leave();
        scopes.leave();
    }
}
