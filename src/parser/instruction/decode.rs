//! Instruction decoding from binary format

use super::{BlockType, ByteRange, Instruction, InstructionKind, MemArg};
use crate::parser::encoding;
use crate::parser::error::{check_limit, ParseError};
use crate::parser::limits;
use crate::parser::reader::Reader;
use crate::parser::types::{FunctionBody, Locals, ValueType};

impl MemArg {
    pub fn decode(reader: &mut Reader) -> Result<Self, ParseError> {
        let align = reader.read_vu32()?;
        let offset = reader.read_vu32()?;
        Ok(MemArg { align, offset })
    }
}

impl BlockType {
    pub fn decode(reader: &mut Reader) -> Result<Self, ParseError> {
        let b = reader.read_byte()?;
        if b == encoding::BLOCK_TYPE_EMPTY {
            Ok(BlockType::Empty)
        } else if ValueType::is_value_type_byte(b) {
            Ok(BlockType::Value(ValueType::decode(b)?))
        } else {
            Err(ParseError::InvalidBlockType(b))
        }
    }
}

/// Reserved varuint1 that must be zero (memory index, table index).
fn read_reserved(reader: &mut Reader, mnemonic: &'static str) -> Result<(), ParseError> {
    if reader.read_vu1()? != 0 {
        return Err(ParseError::ReservedNotZero { mnemonic });
    }
    Ok(())
}

impl Instruction {
    /// Decode one instruction: opcode byte plus its immediates.
    pub fn decode(reader: &mut Reader) -> Result<Self, ParseError> {
        let offset = reader.offset();
        let opcode = reader.read_byte()?;
        let kind = InstructionKind::decode(opcode, offset, reader)?;
        Ok(Instruction {
            opcode,
            kind,
            position: ByteRange {
                offset,
                length: reader.offset() - offset,
            },
        })
    }
}

impl InstructionKind {
    /// Decode the immediates that follow `opcode`. `offset` is where the
    /// opcode byte was read, for error reporting.
    pub fn decode(opcode: u8, offset: usize, reader: &mut Reader) -> Result<Self, ParseError> {
        use InstructionKind::*;
        match opcode {
            // Control instructions (0x00-0x11)
            0x00 => Ok(Unreachable),
            0x01 => Ok(Nop),
            0x02 => Ok(Block {
                block_type: BlockType::decode(reader)?,
            }),
            0x03 => Ok(Loop {
                block_type: BlockType::decode(reader)?,
            }),
            0x04 => Ok(If {
                block_type: BlockType::decode(reader)?,
            }),
            0x05 => Ok(Else),
            0x0b => Ok(End),
            0x0c => Ok(Br {
                label_idx: reader.read_vu32()?,
            }),
            0x0d => Ok(BrIf {
                label_idx: reader.read_vu32()?,
            }),
            0x0e => {
                let count = reader.read_vu32()?;
                check_limit("br_table label", count, limits::MAX_BR_TABLE_LABELS)?;
                reader.validate_item_count(count)?;
                let mut labels = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    labels.push(reader.read_vu32()?);
                }
                let default = reader.read_vu32()?;
                Ok(BrTable { labels, default })
            }
            0x0f => Ok(Return),
            0x10 => Ok(Call {
                func_idx: reader.read_vu32()?,
            }),
            0x11 => {
                let type_idx = reader.read_vu32()?;
                read_reserved(reader, "call_indirect")?;
                Ok(CallIndirect { type_idx })
            }

            // Parametric instructions (0x1a-0x1b)
            0x1a => Ok(Drop),
            0x1b => Ok(Select),

            // Variable instructions (0x20-0x24)
            0x20 => Ok(LocalGet {
                local_idx: reader.read_vu32()?,
            }),
            0x21 => Ok(LocalSet {
                local_idx: reader.read_vu32()?,
            }),
            0x22 => Ok(LocalTee {
                local_idx: reader.read_vu32()?,
            }),
            0x23 => Ok(GlobalGet {
                global_idx: reader.read_vu32()?,
            }),
            0x24 => Ok(GlobalSet {
                global_idx: reader.read_vu32()?,
            }),

            // Memory instructions (0x28-0x40)
            0x28 => Ok(I32Load { memarg: MemArg::decode(reader)? }),
            0x29 => Ok(I64Load { memarg: MemArg::decode(reader)? }),
            0x2a => Ok(F32Load { memarg: MemArg::decode(reader)? }),
            0x2b => Ok(F64Load { memarg: MemArg::decode(reader)? }),
            0x2c => Ok(I32Load8S { memarg: MemArg::decode(reader)? }),
            0x2d => Ok(I32Load8U { memarg: MemArg::decode(reader)? }),
            0x2e => Ok(I32Load16S { memarg: MemArg::decode(reader)? }),
            0x2f => Ok(I32Load16U { memarg: MemArg::decode(reader)? }),
            0x30 => Ok(I64Load8S { memarg: MemArg::decode(reader)? }),
            0x31 => Ok(I64Load8U { memarg: MemArg::decode(reader)? }),
            0x32 => Ok(I64Load16S { memarg: MemArg::decode(reader)? }),
            0x33 => Ok(I64Load16U { memarg: MemArg::decode(reader)? }),
            0x34 => Ok(I64Load32S { memarg: MemArg::decode(reader)? }),
            0x35 => Ok(I64Load32U { memarg: MemArg::decode(reader)? }),
            0x36 => Ok(I32Store { memarg: MemArg::decode(reader)? }),
            0x37 => Ok(I64Store { memarg: MemArg::decode(reader)? }),
            0x38 => Ok(F32Store { memarg: MemArg::decode(reader)? }),
            0x39 => Ok(F64Store { memarg: MemArg::decode(reader)? }),
            0x3a => Ok(I32Store8 { memarg: MemArg::decode(reader)? }),
            0x3b => Ok(I32Store16 { memarg: MemArg::decode(reader)? }),
            0x3c => Ok(I64Store8 { memarg: MemArg::decode(reader)? }),
            0x3d => Ok(I64Store16 { memarg: MemArg::decode(reader)? }),
            0x3e => Ok(I64Store32 { memarg: MemArg::decode(reader)? }),
            0x3f => {
                read_reserved(reader, "memory.size")?;
                Ok(MemorySize)
            }
            0x40 => {
                read_reserved(reader, "memory.grow")?;
                Ok(MemoryGrow)
            }

            // Numeric constants (0x41-0x44); floats arrive as raw bit patterns
            0x41 => Ok(I32Const {
                value: reader.read_vs32()?,
            }),
            0x42 => Ok(I64Const {
                value: reader.read_vs64()?,
            }),
            0x43 => Ok(F32Const {
                value: reader.read_f32()?,
            }),
            0x44 => Ok(F64Const {
                value: reader.read_f64()?,
            }),

            // Comparison operators (0x45-0x66)
            0x45 => Ok(I32Eqz),
            0x46 => Ok(I32Eq),
            0x47 => Ok(I32Ne),
            0x48 => Ok(I32LtS),
            0x49 => Ok(I32LtU),
            0x4a => Ok(I32GtS),
            0x4b => Ok(I32GtU),
            0x4c => Ok(I32LeS),
            0x4d => Ok(I32LeU),
            0x4e => Ok(I32GeS),
            0x4f => Ok(I32GeU),
            0x50 => Ok(I64Eqz),
            0x51 => Ok(I64Eq),
            0x52 => Ok(I64Ne),
            0x53 => Ok(I64LtS),
            0x54 => Ok(I64LtU),
            0x55 => Ok(I64GtS),
            0x56 => Ok(I64GtU),
            0x57 => Ok(I64LeS),
            0x58 => Ok(I64LeU),
            0x59 => Ok(I64GeS),
            0x5a => Ok(I64GeU),
            0x5b => Ok(F32Eq),
            0x5c => Ok(F32Ne),
            0x5d => Ok(F32Lt),
            0x5e => Ok(F32Gt),
            0x5f => Ok(F32Le),
            0x60 => Ok(F32Ge),
            0x61 => Ok(F64Eq),
            0x62 => Ok(F64Ne),
            0x63 => Ok(F64Lt),
            0x64 => Ok(F64Gt),
            0x65 => Ok(F64Le),
            0x66 => Ok(F64Ge),

            // Numeric operators (0x67-0xa6)
            0x67 => Ok(I32Clz),
            0x68 => Ok(I32Ctz),
            0x69 => Ok(I32Popcnt),
            0x6a => Ok(I32Add),
            0x6b => Ok(I32Sub),
            0x6c => Ok(I32Mul),
            0x6d => Ok(I32DivS),
            0x6e => Ok(I32DivU),
            0x6f => Ok(I32RemS),
            0x70 => Ok(I32RemU),
            0x71 => Ok(I32And),
            0x72 => Ok(I32Or),
            0x73 => Ok(I32Xor),
            0x74 => Ok(I32Shl),
            0x75 => Ok(I32ShrS),
            0x76 => Ok(I32ShrU),
            0x77 => Ok(I32Rotl),
            0x78 => Ok(I32Rotr),
            0x79 => Ok(I64Clz),
            0x7a => Ok(I64Ctz),
            0x7b => Ok(I64Popcnt),
            0x7c => Ok(I64Add),
            0x7d => Ok(I64Sub),
            0x7e => Ok(I64Mul),
            0x7f => Ok(I64DivS),
            0x80 => Ok(I64DivU),
            0x81 => Ok(I64RemS),
            0x82 => Ok(I64RemU),
            0x83 => Ok(I64And),
            0x84 => Ok(I64Or),
            0x85 => Ok(I64Xor),
            0x86 => Ok(I64Shl),
            0x87 => Ok(I64ShrS),
            0x88 => Ok(I64ShrU),
            0x89 => Ok(I64Rotl),
            0x8a => Ok(I64Rotr),
            0x8b => Ok(F32Abs),
            0x8c => Ok(F32Neg),
            0x8d => Ok(F32Ceil),
            0x8e => Ok(F32Floor),
            0x8f => Ok(F32Trunc),
            0x90 => Ok(F32Nearest),
            0x91 => Ok(F32Sqrt),
            0x92 => Ok(F32Add),
            0x93 => Ok(F32Sub),
            0x94 => Ok(F32Mul),
            0x95 => Ok(F32Div),
            0x96 => Ok(F32Min),
            0x97 => Ok(F32Max),
            0x98 => Ok(F32Copysign),
            0x99 => Ok(F64Abs),
            0x9a => Ok(F64Neg),
            0x9b => Ok(F64Ceil),
            0x9c => Ok(F64Floor),
            0x9d => Ok(F64Trunc),
            0x9e => Ok(F64Nearest),
            0x9f => Ok(F64Sqrt),
            0xa0 => Ok(F64Add),
            0xa1 => Ok(F64Sub),
            0xa2 => Ok(F64Mul),
            0xa3 => Ok(F64Div),
            0xa4 => Ok(F64Min),
            0xa5 => Ok(F64Max),
            0xa6 => Ok(F64Copysign),

            // Conversions (0xa7-0xbb)
            0xa7 => Ok(I32WrapI64),
            0xa8 => Ok(I32TruncF32S),
            0xa9 => Ok(I32TruncF32U),
            0xaa => Ok(I32TruncF64S),
            0xab => Ok(I32TruncF64U),
            0xac => Ok(I64ExtendI32S),
            0xad => Ok(I64ExtendI32U),
            0xae => Ok(I64TruncF32S),
            0xaf => Ok(I64TruncF32U),
            0xb0 => Ok(I64TruncF64S),
            0xb1 => Ok(I64TruncF64U),
            0xb2 => Ok(F32ConvertI32S),
            0xb3 => Ok(F32ConvertI32U),
            0xb4 => Ok(F32ConvertI64S),
            0xb5 => Ok(F32ConvertI64U),
            0xb6 => Ok(F32DemoteF64),
            0xb7 => Ok(F64ConvertI32S),
            0xb8 => Ok(F64ConvertI32U),
            0xb9 => Ok(F64ConvertI64S),
            0xba => Ok(F64ConvertI64U),
            0xbb => Ok(F64PromoteF32),

            // Reinterpretations (0xbc-0xbf)
            0xbc => Ok(I32ReinterpretF32),
            0xbd => Ok(I64ReinterpretF64),
            0xbe => Ok(F32ReinterpretI32),
            0xbf => Ok(F64ReinterpretI64),

            _ => Err(ParseError::UnknownOpcode { opcode, offset }),
        }
    }
}

/// Decode instructions up to and including the first `end`.
pub fn read_expression(reader: &mut Reader) -> Result<Vec<Instruction>, ParseError> {
    let mut instructions = Vec::new();
    loop {
        let instruction = Instruction::decode(reader)?;
        let done = instruction.is_end();
        instructions.push(instruction);
        if done {
            return Ok(instructions);
        }
    }
}

/// Decode an initializer expression.
///
/// Only `i32.const`, `i64.const`, `f32.const`, `f64.const` and `global.get`
/// may appear before the terminating `end`, and exactly one of them, so the
/// expression always produces a single value.
pub fn read_constant_expression(reader: &mut Reader) -> Result<Vec<Instruction>, ParseError> {
    let instructions = read_expression(reader)?;
    let body = &instructions[..instructions.len() - 1];

    if let Some(bad) = body.iter().find(|inst| !is_constant_instruction(inst)) {
        return Err(ParseError::InvalidConstantExpression(format!(
            "{} at offset {}",
            bad.mnemonic(),
            bad.position.offset
        )));
    }
    if body.len() != 1 {
        return Err(ParseError::InvalidConstantExpression(format!(
            "expected exactly one value, found {}",
            body.len()
        )));
    }
    Ok(instructions)
}

fn is_constant_instruction(instruction: &Instruction) -> bool {
    matches!(
        instruction.kind,
        InstructionKind::I32Const { .. }
            | InstructionKind::I64Const { .. }
            | InstructionKind::F32Const { .. }
            | InstructionKind::F64Const { .. }
            | InstructionKind::GlobalGet { .. }
    )
}

/// Decode one code section entry: size prefix, local declarations, then
/// instructions until the `end` that closes the function itself.
pub fn read_function_body(reader: &mut Reader) -> Result<FunctionBody, ParseError> {
    let start = reader.offset();
    let declared = reader.read_vu32()?;
    check_limit("function body size", declared, limits::MAX_FUNCTION_SIZE)?;
    let body_start = reader.pos();

    let group_count = reader.read_vu32()?;
    reader.validate_item_count(group_count)?;
    let mut entries = Vec::with_capacity(group_count as usize);
    let mut total: u64 = 0;
    for _ in 0..group_count {
        let count = reader.read_vu32()?;
        let value_type = ValueType::decode(reader.read_byte()?)?;
        total += count as u64;
        if total > limits::MAX_FUNCTION_LOCALS as u64 {
            return Err(ParseError::LimitExceeded {
                what: "local",
                count: total,
                limit: limits::MAX_FUNCTION_LOCALS as u64,
            });
        }
        entries.push((count, value_type));
    }

    let mut instructions = Vec::new();
    let mut depth: i64 = 0;
    while depth >= 0 {
        let instruction = Instruction::decode(reader)?;
        if instruction.opens_block() {
            depth += 1;
        } else if instruction.is_end() {
            depth -= 1;
        }
        instructions.push(instruction);
    }

    let consumed = reader.pos() - body_start;
    if consumed != declared as usize {
        return Err(ParseError::FunctionBodySizeMismatch { declared, consumed });
    }

    Ok(FunctionBody {
        locals: Locals::new(entries),
        instructions,
        position: ByteRange {
            offset: start,
            length: reader.offset() - start,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn decode_one(bytes: &[u8]) -> Result<Instruction, ParseError> {
        let mut reader = Reader::new(bytes);
        let inst = Instruction::decode(&mut reader)?;
        assert_eq!(reader.remaining(), 0, "trailing bytes after {inst}");
        Ok(inst)
    }

    #[rstest]
    #[case(&[0x41, 0x2a], InstructionKind::I32Const { value: 42 })]
    #[case(&[0x41, 0x7f], InstructionKind::I32Const { value: -1 })]
    #[case(&[0x42, 0x80, 0x7f], InstructionKind::I64Const { value: -128 })]
    #[case(&[0x20, 0x00], InstructionKind::LocalGet { local_idx: 0 })]
    #[case(&[0x23, 0x81, 0x01], InstructionKind::GlobalGet { global_idx: 129 })]
    #[case(&[0x10, 0x03], InstructionKind::Call { func_idx: 3 })]
    #[case(&[0x11, 0x01, 0x00], InstructionKind::CallIndirect { type_idx: 1 })]
    #[case(&[0x28, 0x02, 0x10], InstructionKind::I32Load { memarg: MemArg { align: 2, offset: 16 } })]
    #[case(&[0x3e, 0x02, 0x00], InstructionKind::I64Store32 { memarg: MemArg { align: 2, offset: 0 } })]
    #[case(&[0x3f, 0x00], InstructionKind::MemorySize)]
    #[case(&[0x40, 0x00], InstructionKind::MemoryGrow)]
    #[case(&[0x02, 0x40], InstructionKind::Block { block_type: BlockType::Empty })]
    #[case(&[0x04, 0x7f], InstructionKind::If { block_type: BlockType::Value(ValueType::I32) })]
    #[case(&[0x0e, 0x02, 0x00, 0x01, 0x02], InstructionKind::BrTable { labels: vec![0, 1], default: 2 })]
    #[case(&[0x6a], InstructionKind::I32Add)]
    #[case(&[0xbf], InstructionKind::F64ReinterpretI64)]
    fn test_decode_immediates(#[case] bytes: &[u8], #[case] expected: InstructionKind) {
        let inst = decode_one(bytes).unwrap();
        assert_eq!(inst.kind, expected);
        assert_eq!(inst.opcode, bytes[0]);
        assert_eq!(inst.position.length, bytes.len());
    }

    #[test]
    fn test_float_constants_are_reinterpreted() {
        let inst = decode_one(&[0x43, 0x00, 0x00, 0x80, 0x3f]).unwrap();
        assert_eq!(inst.kind, InstructionKind::F32Const { value: 1.0 });

        let inst = decode_one(&[0x44, 0, 0, 0, 0, 0, 0, 0xf0, 0xbf]).unwrap();
        assert_eq!(inst.kind, InstructionKind::F64Const { value: -1.0 });
    }

    #[test]
    fn test_every_table_opcode_decodes() {
        // every opcode in the name table must be accepted by the decoder,
        // given enough zero bytes to satisfy its immediates
        for opcode in 0u8..=0xff {
            let mut bytes = vec![opcode];
            let filler = match opcode {
                0x02..=0x04 => vec![0x40],
                0x43 => vec![0; 4],
                0x44 => vec![0; 8],
                _ => vec![0; 2],
            };
            bytes.extend(filler);
            let mut reader = Reader::new(&bytes);
            let result = Instruction::decode(&mut reader);
            match super::super::opcode_name(opcode) {
                Some(name) => {
                    let inst = result.unwrap_or_else(|e| panic!("{name} failed: {e}"));
                    assert_eq!(inst.mnemonic(), name);
                }
                None => assert!(matches!(
                    result,
                    Err(ParseError::UnknownOpcode { opcode: o, offset: 0 }) if o == opcode
                )),
            }
        }
    }

    #[test]
    fn test_reserved_byte_must_be_zero() {
        assert_eq!(
            decode_one(&[0x40, 0x01]).unwrap_err(),
            ParseError::ReservedNotZero { mnemonic: "memory.grow" }
        );
    }

    #[test]
    fn test_invalid_block_type() {
        assert_eq!(decode_one(&[0x02, 0x55]).unwrap_err(), ParseError::InvalidBlockType(0x55));
    }

    #[test]
    fn test_read_expression_includes_end() {
        let bytes = [0x41, 0x01, 0x41, 0x02, 0x6a, 0x0b, 0xff];
        let mut reader = Reader::new(&bytes);
        let expr = read_expression(&mut reader).unwrap();
        assert_eq!(expr.len(), 4);
        assert!(expr[3].is_end());
        assert_eq!(reader.remaining(), 1);
    }

    #[test]
    fn test_read_expression_without_end() {
        let mut reader = Reader::new(&[0x41, 0x01]);
        assert!(matches!(
            read_expression(&mut reader),
            Err(ParseError::UnexpectedEof { .. })
        ));
    }

    #[rstest]
    #[case(&[0x41, 0x2a, 0x0b])]
    #[case(&[0x23, 0x00, 0x0b])]
    #[case(&[0x44, 0, 0, 0, 0, 0, 0, 0, 0, 0x0b])]
    fn test_constant_expression_accepted(#[case] bytes: &[u8]) {
        let mut reader = Reader::new(bytes);
        assert_eq!(read_constant_expression(&mut reader).unwrap().len(), 2);
    }

    #[rstest]
    #[case(&[0x0b])]
    #[case(&[0x41, 0x01, 0x41, 0x02, 0x0b])]
    #[case(&[0x41, 0x01, 0x41, 0x02, 0x6a, 0x0b])]
    #[case(&[0x20, 0x00, 0x0b])]
    fn test_constant_expression_rejected(#[case] bytes: &[u8]) {
        let mut reader = Reader::new(bytes);
        assert!(matches!(
            read_constant_expression(&mut reader),
            Err(ParseError::InvalidConstantExpression(_))
        ));
    }

    #[test]
    fn test_read_function_body() {
        // size 9: one local group (2 x i32), block (empty) ... end, end
        let bytes = [
            0x09, 0x01, 0x02, 0x7f, 0x02, 0x40, 0x01, 0x0b, 0x20, 0x00, 0x0b,
        ];
        let mut reader = Reader::new(&bytes);
        let body = read_function_body(&mut reader).unwrap();
        assert_eq!(body.locals.len(), 2);
        assert_eq!(body.locals.get(1), Some(&ValueType::I32));
        assert_eq!(body.instructions.len(), 5);
        assert!(body.instructions.last().unwrap().is_end());
        assert_eq!(body.position, ByteRange { offset: 0, length: 11 });
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_function_body_size_mismatch() {
        // declares 4 bytes but the body is 3
        let bytes = [0x04, 0x00, 0x01, 0x0b, 0x01];
        let mut reader = Reader::new(&bytes);
        assert_eq!(
            read_function_body(&mut reader).unwrap_err(),
            ParseError::FunctionBodySizeMismatch {
                declared: 4,
                consumed: 3
            }
        );
    }
}
