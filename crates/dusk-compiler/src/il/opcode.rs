//! IL operation codes.
//!
//! The IL is a stack machine. Each opcode is a single byte; operands follow
//! inline, little-endian. Names (call targets, function records) are inline
//! length-prefixed UTF-8.

/// IL operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    // =========================================================================
    // Constants
    // =========================================================================
    /// Push a signed 32-bit constant. Operand: i32.
    PushI32 = 0,
    /// Push a signed 64-bit constant. Operand: i64.
    PushI64,
    /// Push an unsigned 32-bit constant. Operand: u32.
    PushU32,
    /// Push an unsigned 64-bit constant. Operand: u64.
    PushU64,
    /// Push a 32-bit float constant. Operand: f32.
    PushF32,
    /// Push a 64-bit float constant. Operand: f64.
    PushF64,
    /// Push boolean true.
    PushTrue,
    /// Push boolean false.
    PushFalse,
    /// Push a string constant. Operand: name.
    PushStr,

    // =========================================================================
    // Slots
    // =========================================================================
    /// Load a slot onto the stack. Operand: u16 slot.
    Load,
    /// Store the top of stack into a slot. Operand: u16 slot.
    Store,

    // =========================================================================
    // Arrays
    // =========================================================================
    /// Collect the top N values into an array. Operand: u16 count.
    BuildArray,
    /// Pop index and array, push the element.
    LoadIndex,
    /// Pop value, index and array, store the element.
    StoreIndex,
    /// Pop an array, push its length as i32.
    ArrayLen,

    // =========================================================================
    // Arithmetic
    // =========================================================================
    AddI32,
    SubI32,
    MulI32,
    DivI32,
    ModI32,
    AddI64,
    SubI64,
    MulI64,
    DivI64,
    ModI64,
    AddF32,
    SubF32,
    MulF32,
    DivF32,
    AddF64,
    SubF64,
    MulF64,
    DivF64,

    /// Negate a signed 32-bit value.
    NegI32,
    NegI64,
    NegF32,
    NegF64,

    // =========================================================================
    // Comparisons (produce bool)
    // =========================================================================
    EqI32,
    NeI32,
    LtI32,
    LeI32,
    GtI32,
    GeI32,
    EqI64,
    NeI64,
    LtI64,
    LeI64,
    GtI64,
    GeI64,
    EqF32,
    NeF32,
    LtF32,
    LeF32,
    GtF32,
    GeF32,
    EqF64,
    NeF64,
    LtF64,
    LeF64,
    GtF64,
    GeF64,

    // =========================================================================
    // Logic
    // =========================================================================
    /// Boolean not.
    Not,
    /// Boolean and.
    AndBool,
    /// Boolean or.
    OrBool,

    // =========================================================================
    // Control flow
    // =========================================================================
    /// Unconditional jump. Operand: u32 absolute target.
    Jump,
    /// Jump when the popped condition is false. Operand: u32 absolute target.
    BranchIfFalse,
    /// Call a function by mangled name. Operands: name, u8 arg count.
    Call,
    /// Return from the current function.
    Ret,

    // =========================================================================
    // Declaration records
    // =========================================================================
    /// Function prologue record. Operand: name (mangled).
    Func,
    /// External symbol record for the linker consumer. Operand: name.
    ExternFunc,
}

/// Inline operand layout of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operands {
    /// No operands.
    None,
    /// One u16.
    U16,
    /// One u32.
    U32,
    /// One i32.
    I32,
    /// One i64.
    I64,
    /// One u64.
    U64,
    /// One f32.
    F32,
    /// One f64.
    F64,
    /// A u16-length-prefixed UTF-8 name.
    Name,
    /// A name followed by a u8 argument count.
    NameArgc,
}

impl OpCode {
    /// Every opcode, in encoding order.
    pub const ALL: &'static [OpCode] = &[
        OpCode::PushI32,
        OpCode::PushI64,
        OpCode::PushU32,
        OpCode::PushU64,
        OpCode::PushF32,
        OpCode::PushF64,
        OpCode::PushTrue,
        OpCode::PushFalse,
        OpCode::PushStr,
        OpCode::Load,
        OpCode::Store,
        OpCode::BuildArray,
        OpCode::LoadIndex,
        OpCode::StoreIndex,
        OpCode::ArrayLen,
        OpCode::AddI32,
        OpCode::SubI32,
        OpCode::MulI32,
        OpCode::DivI32,
        OpCode::ModI32,
        OpCode::AddI64,
        OpCode::SubI64,
        OpCode::MulI64,
        OpCode::DivI64,
        OpCode::ModI64,
        OpCode::AddF32,
        OpCode::SubF32,
        OpCode::MulF32,
        OpCode::DivF32,
        OpCode::AddF64,
        OpCode::SubF64,
        OpCode::MulF64,
        OpCode::DivF64,
        OpCode::NegI32,
        OpCode::NegI64,
        OpCode::NegF32,
        OpCode::NegF64,
        OpCode::EqI32,
        OpCode::NeI32,
        OpCode::LtI32,
        OpCode::LeI32,
        OpCode::GtI32,
        OpCode::GeI32,
        OpCode::EqI64,
        OpCode::NeI64,
        OpCode::LtI64,
        OpCode::LeI64,
        OpCode::GtI64,
        OpCode::GeI64,
        OpCode::EqF32,
        OpCode::NeF32,
        OpCode::LtF32,
        OpCode::LeF32,
        OpCode::GtF32,
        OpCode::GeF32,
        OpCode::EqF64,
        OpCode::NeF64,
        OpCode::LtF64,
        OpCode::LeF64,
        OpCode::GtF64,
        OpCode::GeF64,
        OpCode::Not,
        OpCode::AndBool,
        OpCode::OrBool,
        OpCode::Jump,
        OpCode::BranchIfFalse,
        OpCode::Call,
        OpCode::Ret,
        OpCode::Func,
        OpCode::ExternFunc,
    ];

    /// Decode a byte into an opcode.
    pub fn from_u8(byte: u8) -> Option<OpCode> {
        OpCode::ALL.get(byte as usize).copied()
    }

    /// The inline operand layout.
    pub fn operands(&self) -> Operands {
        match self {
            OpCode::PushI32 => Operands::I32,
            OpCode::PushI64 => Operands::I64,
            OpCode::PushU32 => Operands::U32,
            OpCode::PushU64 => Operands::U64,
            OpCode::PushF32 => Operands::F32,
            OpCode::PushF64 => Operands::F64,
            OpCode::PushStr => Operands::Name,
            OpCode::Load | OpCode::Store | OpCode::BuildArray => Operands::U16,
            OpCode::Jump | OpCode::BranchIfFalse => Operands::U32,
            OpCode::Call => Operands::NameArgc,
            OpCode::Func | OpCode::ExternFunc => Operands::Name,
            _ => Operands::None,
        }
    }

    /// Opcode mnemonic for debugging and test output.
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::PushI32 => "push_i32",
            OpCode::PushI64 => "push_i64",
            OpCode::PushU32 => "push_u32",
            OpCode::PushU64 => "push_u64",
            OpCode::PushF32 => "push_f32",
            OpCode::PushF64 => "push_f64",
            OpCode::PushTrue => "push_true",
            OpCode::PushFalse => "push_false",
            OpCode::PushStr => "push_str",
            OpCode::Load => "load",
            OpCode::Store => "store",
            OpCode::BuildArray => "build_array",
            OpCode::LoadIndex => "load_index",
            OpCode::StoreIndex => "store_index",
            OpCode::ArrayLen => "array_len",
            OpCode::AddI32 => "add_i32",
            OpCode::SubI32 => "sub_i32",
            OpCode::MulI32 => "mul_i32",
            OpCode::DivI32 => "div_i32",
            OpCode::ModI32 => "mod_i32",
            OpCode::AddI64 => "add_i64",
            OpCode::SubI64 => "sub_i64",
            OpCode::MulI64 => "mul_i64",
            OpCode::DivI64 => "div_i64",
            OpCode::ModI64 => "mod_i64",
            OpCode::AddF32 => "add_f32",
            OpCode::SubF32 => "sub_f32",
            OpCode::MulF32 => "mul_f32",
            OpCode::DivF32 => "div_f32",
            OpCode::AddF64 => "add_f64",
            OpCode::SubF64 => "sub_f64",
            OpCode::MulF64 => "mul_f64",
            OpCode::DivF64 => "div_f64",
            OpCode::NegI32 => "neg_i32",
            OpCode::NegI64 => "neg_i64",
            OpCode::NegF32 => "neg_f32",
            OpCode::NegF64 => "neg_f64",
            OpCode::EqI32 => "eq_i32",
            OpCode::NeI32 => "ne_i32",
            OpCode::LtI32 => "lt_i32",
            OpCode::LeI32 => "le_i32",
            OpCode::GtI32 => "gt_i32",
            OpCode::GeI32 => "ge_i32",
            OpCode::EqI64 => "eq_i64",
            OpCode::NeI64 => "ne_i64",
            OpCode::LtI64 => "lt_i64",
            OpCode::LeI64 => "le_i64",
            OpCode::GtI64 => "gt_i64",
            OpCode::GeI64 => "ge_i64",
            OpCode::EqF32 => "eq_f32",
            OpCode::NeF32 => "ne_f32",
            OpCode::LtF32 => "lt_f32",
            OpCode::LeF32 => "le_f32",
            OpCode::GtF32 => "gt_f32",
            OpCode::GeF32 => "ge_f32",
            OpCode::EqF64 => "eq_f64",
            OpCode::NeF64 => "ne_f64",
            OpCode::LtF64 => "lt_f64",
            OpCode::LeF64 => "le_f64",
            OpCode::GtF64 => "gt_f64",
            OpCode::GeF64 => "ge_f64",
            OpCode::Not => "not",
            OpCode::AndBool => "and_bool",
            OpCode::OrBool => "or_bool",
            OpCode::Jump => "jump",
            OpCode::BranchIfFalse => "branch_if_false",
            OpCode::Call => "call",
            OpCode::Ret => "ret",
            OpCode::Func => "func",
            OpCode::ExternFunc => "extern_func",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_round_trips() {
        for (index, op) in OpCode::ALL.iter().enumerate() {
            assert_eq!(*op as u8 as usize, index, "{} out of order", op.name());
            assert_eq!(OpCode::from_u8(*op as u8), Some(*op));
        }
    }

    #[test]
    fn unknown_byte_rejected() {
        assert_eq!(OpCode::from_u8(0xFF), None);
    }

    #[test]
    fn operand_layouts() {
        assert_eq!(OpCode::PushI32.operands(), Operands::I32);
        assert_eq!(OpCode::Load.operands(), Operands::U16);
        assert_eq!(OpCode::Jump.operands(), Operands::U32);
        assert_eq!(OpCode::Call.operands(), Operands::NameArgc);
        assert_eq!(OpCode::Func.operands(), Operands::Name);
        assert_eq!(OpCode::AddI32.operands(), Operands::None);
    }
}
