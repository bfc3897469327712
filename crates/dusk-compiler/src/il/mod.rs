//! IL types: opcodes and the byte stream.
//!
//! Also provides stream-inspection helpers used by tests to assert opcode
//! sequences without caring about operand values.

mod opcode;
mod stream;

pub use opcode::{OpCode, Operands};
pub use stream::{IlStream, LabelId, MAGIC};

/// Slice the payload out of a finished artifact, checking the header.
pub fn payload(artifact: &[u8]) -> Option<&[u8]> {
    if artifact.len() < 8 || &artifact[0..4] != MAGIC {
        return None;
    }
    let len = u32::from_le_bytes(artifact[4..8].try_into().ok()?) as usize;
    artifact.get(8..8 + len)
}

/// Extract the opcode sequence from a payload, skipping operands.
pub fn opcodes(payload: &[u8]) -> Vec<OpCode> {
    let mut ops = Vec::new();
    let mut at = 0;
    while at < payload.len() {
        let op = match OpCode::from_u8(payload[at]) {
            Some(op) => op,
            None => break,
        };
        ops.push(op);
        at += 1;
        at += match op.operands() {
            Operands::None => 0,
            Operands::U16 => 2,
            Operands::U32 | Operands::I32 | Operands::F32 => 4,
            Operands::I64 | Operands::U64 | Operands::F64 => 8,
            Operands::Name | Operands::NameArgc => {
                let len = payload
                    .get(at..at + 2)
                    .map(|b| u16::from_le_bytes(b.try_into().unwrap()) as usize)
                    .unwrap_or(0);
                2 + len + if op.operands() == Operands::NameArgc { 1 } else { 0 }
            }
        };
    }
    ops
}

/// Extract the opcode sequence from a finished artifact.
pub fn artifact_opcodes(artifact: &[u8]) -> Vec<OpCode> {
    payload(artifact).map(opcodes).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_extraction_skips_operands() {
        let mut stream = IlStream::new();
        stream.write_op(OpCode::PushI32);
        stream.write_i32(41);
        stream.write_op(OpCode::PushI32);
        stream.write_i32(1);
        stream.write_op(OpCode::AddI32);
        stream.write_op(OpCode::Store);
        stream.write_u16(0);

        let artifact = stream.finish().unwrap();
        assert_eq!(
            artifact_opcodes(&artifact),
            vec![OpCode::PushI32, OpCode::PushI32, OpCode::AddI32, OpCode::Store]
        );
    }

    #[test]
    fn opcode_extraction_skips_names() {
        let mut stream = IlStream::new();
        stream.write_op(OpCode::Func);
        stream.write_name("main__i32");
        stream.write_op(OpCode::Call);
        stream.write_name("f__i32");
        stream.write_u8(0);
        stream.write_op(OpCode::Ret);

        let artifact = stream.finish().unwrap();
        assert_eq!(
            artifact_opcodes(&artifact),
            vec![OpCode::Func, OpCode::Call, OpCode::Ret]
        );
    }

    #[test]
    fn bad_header_rejected() {
        assert!(payload(b"XXXX\0\0\0\0").is_none());
        assert!(payload(b"DS").is_none());
    }
}
