//! The IL emitter.
//!
//! [`IlEmitter`] provides typed opcode helpers over the raw [`IlStream`]:
//! constants, slot loads/stores, calls by mangled name, and the label +
//! fixup discipline for control flow. Opcode selection for built-in
//! operators lives here too, keyed by operand type.

mod loops;

pub use loops::{LoopLabels, LoopStack};

use dusk_core::{CompileError, NumberValue, TypeRef};

use crate::il::{IlStream, LabelId, OpCode};

/// Typed append-only emitter over an [`IlStream`].
#[derive(Debug, Default)]
pub struct IlEmitter {
    stream: IlStream,
}

impl IlEmitter {
    /// Create an emitter with an empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current byte offset in the stream.
    pub fn offset(&self) -> u32 {
        self.stream.offset()
    }

    /// Number of fixups awaiting back-patching.
    pub fn pending_fixups(&self) -> usize {
        self.stream.pending_fixups()
    }

    /// Whether any label is still unbound.
    pub fn has_unbound_labels(&self) -> bool {
        self.stream.has_unbound_labels()
    }

    // ==========================================================================
    // Constants
    // ==========================================================================

    /// Push a number literal, encoded by its width and signedness.
    pub fn push_const_number(&mut self, value: NumberValue, is_signed: bool, bits: u8) {
        match value {
            NumberValue::Float(f) => {
                if bits == 64 {
                    self.stream.write_op(OpCode::PushF64);
                    self.stream.write_f64(f);
                } else {
                    self.stream.write_op(OpCode::PushF32);
                    self.stream.write_f32(f as f32);
                }
            }
            NumberValue::Int(i) => {
                if bits == 64 {
                    self.stream.write_op(OpCode::PushI64);
                    self.stream.write_i64(i);
                } else {
                    self.stream.write_op(OpCode::PushI32);
                    self.stream.write_i32(i as i32);
                }
            }
            NumberValue::Uint(u) => {
                if !is_signed && bits == 64 {
                    self.stream.write_op(OpCode::PushU64);
                    self.stream.write_u64(u);
                } else if bits == 64 {
                    self.stream.write_op(OpCode::PushI64);
                    self.stream.write_i64(u as i64);
                } else if is_signed {
                    self.stream.write_op(OpCode::PushI32);
                    self.stream.write_i32(u as i32);
                } else {
                    self.stream.write_op(OpCode::PushU32);
                    self.stream.write_u32(u as u32);
                }
            }
        }
    }

    /// Push a boolean constant.
    pub fn push_const_bool(&mut self, value: bool) {
        self.stream.write_op(if value {
            OpCode::PushTrue
        } else {
            OpCode::PushFalse
        });
    }

    /// Push a string constant.
    pub fn push_const_str(&mut self, value: &str) {
        self.stream.write_op(OpCode::PushStr);
        self.stream.write_name(value);
    }

    /// Push a signed 32-bit constant.
    pub fn push_const_i32(&mut self, value: i32) {
        self.stream.write_op(OpCode::PushI32);
        self.stream.write_i32(value);
    }

    // ==========================================================================
    // Slots and arrays
    // ==========================================================================

    /// Load a slot.
    pub fn load(&mut self, slot: u16) {
        self.stream.write_op(OpCode::Load);
        self.stream.write_u16(slot);
    }

    /// Store into a slot.
    pub fn store(&mut self, slot: u16) {
        self.stream.write_op(OpCode::Store);
        self.stream.write_u16(slot);
    }

    /// Collect the top `count` values into an array.
    pub fn build_array(&mut self, count: u16) {
        self.stream.write_op(OpCode::BuildArray);
        self.stream.write_u16(count);
    }

    /// Load an array element.
    pub fn load_index(&mut self) {
        self.stream.write_op(OpCode::LoadIndex);
    }

    /// Store an array element.
    pub fn store_index(&mut self) {
        self.stream.write_op(OpCode::StoreIndex);
    }

    /// Push the length of an array.
    pub fn array_len(&mut self) {
        self.stream.write_op(OpCode::ArrayLen);
    }

    // ==========================================================================
    // Operators
    // ==========================================================================

    /// Emit a bare opcode.
    pub fn op(&mut self, op: OpCode) {
        self.stream.write_op(op);
    }

    // ==========================================================================
    // Control flow
    // ==========================================================================

    /// Allocate a fresh label.
    pub fn new_label(&mut self) -> LabelId {
        self.stream.new_label()
    }

    /// Bind a label to the current offset.
    pub fn bind(&mut self, label: LabelId) {
        self.stream.bind(label);
    }

    /// Unconditional jump.
    pub fn jump(&mut self, label: LabelId) {
        self.stream.write_op(OpCode::Jump);
        self.stream.write_label_ref(label);
    }

    /// Jump when the popped condition is false.
    pub fn branch_if_false(&mut self, label: LabelId) {
        self.stream.write_op(OpCode::BranchIfFalse);
        self.stream.write_label_ref(label);
    }

    /// Call a function by mangled name.
    pub fn call(&mut self, mangled_name: &str, argc: u8) {
        self.stream.write_op(OpCode::Call);
        self.stream.write_name(mangled_name);
        self.stream.write_u8(argc);
    }

    /// Return from the current function.
    pub fn ret(&mut self) {
        self.stream.write_op(OpCode::Ret);
    }

    // ==========================================================================
    // Declaration records
    // ==========================================================================

    /// Function prologue record.
    pub fn func(&mut self, mangled_name: &str) {
        self.stream.write_op(OpCode::Func);
        self.stream.write_name(mangled_name);
    }

    /// External symbol record.
    pub fn extern_func(&mut self, name: &str) {
        self.stream.write_op(OpCode::ExternFunc);
        self.stream.write_name(name);
    }

    // ==========================================================================
    // Finishing
    // ==========================================================================

    /// Back-patch fixups and produce the final artifact bytes.
    pub fn finish(self) -> Result<Vec<u8>, CompileError> {
        self.stream.finish()
    }
}

/// Opcode family of a primitive operand type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    I32,
    I64,
    F32,
    F64,
}

fn family(ty: &TypeRef) -> Option<Family> {
    let p = ty.primitive()?;
    if p.name == "str" || p.name == "void" {
        return None;
    }
    Some(match (p.float, p.bits) {
        (true, 64) => Family::F64,
        (true, _) => Family::F32,
        (false, 64) => Family::I64,
        (false, _) => Family::I32,
    })
}

/// The built-in opcode for a binary operator over `ty` operands, if one
/// exists. Comparison opcodes produce `bool`.
pub fn binary_opcode(op: &str, ty: &TypeRef) -> Option<OpCode> {
    use Family::*;
    if ty.is_bool() {
        return match op {
            "&&" => Some(OpCode::AndBool),
            "||" => Some(OpCode::OrBool),
            "==" => Some(OpCode::EqI32),
            "!=" => Some(OpCode::NeI32),
            _ => None,
        };
    }
    let fam = family(ty)?;
    let opcode = match (op, fam) {
        ("+", I32) => OpCode::AddI32,
        ("-", I32) => OpCode::SubI32,
        ("*", I32) => OpCode::MulI32,
        ("/", I32) => OpCode::DivI32,
        ("%", I32) => OpCode::ModI32,
        ("+", I64) => OpCode::AddI64,
        ("-", I64) => OpCode::SubI64,
        ("*", I64) => OpCode::MulI64,
        ("/", I64) => OpCode::DivI64,
        ("%", I64) => OpCode::ModI64,
        ("+", F32) => OpCode::AddF32,
        ("-", F32) => OpCode::SubF32,
        ("*", F32) => OpCode::MulF32,
        ("/", F32) => OpCode::DivF32,
        ("+", F64) => OpCode::AddF64,
        ("-", F64) => OpCode::SubF64,
        ("*", F64) => OpCode::MulF64,
        ("/", F64) => OpCode::DivF64,
        ("==", I32) => OpCode::EqI32,
        ("!=", I32) => OpCode::NeI32,
        ("<", I32) => OpCode::LtI32,
        ("<=", I32) => OpCode::LeI32,
        (">", I32) => OpCode::GtI32,
        (">=", I32) => OpCode::GeI32,
        ("==", I64) => OpCode::EqI64,
        ("!=", I64) => OpCode::NeI64,
        ("<", I64) => OpCode::LtI64,
        ("<=", I64) => OpCode::LeI64,
        (">", I64) => OpCode::GtI64,
        (">=", I64) => OpCode::GeI64,
        ("==", F32) => OpCode::EqF32,
        ("!=", F32) => OpCode::NeF32,
        ("<", F32) => OpCode::LtF32,
        ("<=", F32) => OpCode::LeF32,
        (">", F32) => OpCode::GtF32,
        (">=", F32) => OpCode::GeF32,
        ("==", F64) => OpCode::EqF64,
        ("!=", F64) => OpCode::NeF64,
        ("<", F64) => OpCode::LtF64,
        ("<=", F64) => OpCode::LeF64,
        (">", F64) => OpCode::GtF64,
        (">=", F64) => OpCode::GeF64,
        _ => return None,
    };
    Some(opcode)
}

/// Whether a built-in binary operator produces `bool`.
pub fn is_comparison(op: &str) -> bool {
    matches!(op, "==" | "!=" | "<" | "<=" | ">" | ">=")
}

/// The built-in opcode for a unary operator over a `ty` operand.
pub fn unary_opcode(op: &str, ty: &TypeRef) -> Option<OpCode> {
    use Family::*;
    if op == "!" {
        return ty.is_bool().then_some(OpCode::Not);
    }
    if op != "-" {
        return None;
    }
    // Negation only applies to signed and float operands.
    let p = ty.primitive()?;
    if !p.signed {
        return None;
    }
    Some(match family(ty)? {
        I32 => OpCode::NegI32,
        I64 => OpCode::NegI64,
        F32 => OpCode::NegF32,
        F64 => OpCode::NegF64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::il::artifact_opcodes;

    #[test]
    fn dec_initialiser_sequence() {
        // let x: i32 = 41 + 1;
        let mut emitter = IlEmitter::new();
        emitter.push_const_i32(41);
        emitter.push_const_i32(1);
        emitter.op(OpCode::AddI32);
        emitter.store(0);

        let artifact = emitter.finish().unwrap();
        assert_eq!(
            artifact_opcodes(&artifact),
            vec![OpCode::PushI32, OpCode::PushI32, OpCode::AddI32, OpCode::Store]
        );
    }

    #[test]
    fn opcode_selection_by_type() {
        let i32_ty = TypeRef::named("i32");
        let i64_ty = TypeRef::named("i64");
        let f64_ty = TypeRef::named("f64");
        assert_eq!(binary_opcode("+", &i32_ty), Some(OpCode::AddI32));
        assert_eq!(binary_opcode("+", &i64_ty), Some(OpCode::AddI64));
        assert_eq!(binary_opcode("<", &f64_ty), Some(OpCode::LtF64));
        assert_eq!(binary_opcode("%", &f64_ty), None);
        assert_eq!(binary_opcode("&&", &TypeRef::bool()), Some(OpCode::AndBool));
        assert_eq!(binary_opcode("+", &TypeRef::named("Point")), None);
    }

    #[test]
    fn unary_selection() {
        assert_eq!(unary_opcode("-", &TypeRef::named("i32")), Some(OpCode::NegI32));
        assert_eq!(unary_opcode("-", &TypeRef::named("u32")), None);
        assert_eq!(unary_opcode("!", &TypeRef::bool()), Some(OpCode::Not));
        assert_eq!(unary_opcode("!", &TypeRef::named("i32")), None);
    }

    #[test]
    fn small_unsigned_numbers_use_u32() {
        let mut emitter = IlEmitter::new();
        emitter.push_const_number(NumberValue::Uint(7), false, 32);
        let artifact = emitter.finish().unwrap();
        assert_eq!(artifact_opcodes(&artifact), vec![OpCode::PushU32]);
    }
}
