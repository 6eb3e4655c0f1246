//! Instruction representation and opcode names
//!
//! Every MVP opcode (0x00 to 0xbf) has an [`InstructionKind`] variant carrying
//! its immediates. Mnemonics live in one static table from which two
//! read-only maps are derived on first use: opcode to name and name to
//! opcode.

pub mod decode;

pub use decode::{read_constant_expression, read_expression, read_function_body};

use super::types::ValueType;
use fhex::ToHex;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

/// Memory argument for load and store instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemArg {
    /// Alignment hint, as a power of 2
    pub align: u32,
    pub offset: u32,
}

/// Result type of a structured control instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Empty,
    Value(ValueType),
}

/// Where an instruction sits in the module binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: u8,
    pub kind: InstructionKind,
    pub position: ByteRange,
}

impl Instruction {
    pub fn mnemonic(&self) -> &'static str {
        opcode_name(self.opcode).unwrap_or("<unknown>")
    }

    pub fn is_end(&self) -> bool {
        self.kind == InstructionKind::End
    }

    /// block, loop and if open a nesting level that a matching end closes.
    pub fn opens_block(&self) -> bool {
        matches!(
            self.kind,
            InstructionKind::Block { .. } | InstructionKind::Loop { .. } | InstructionKind::If { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstructionKind {
    // Control instructions
    Unreachable,
    Nop,
    Block { block_type: BlockType },
    Loop { block_type: BlockType },
    If { block_type: BlockType },
    Else,
    End,
    Br { label_idx: u32 },
    BrIf { label_idx: u32 },
    BrTable { labels: Vec<u32>, default: u32 },
    Return,
    Call { func_idx: u32 },
    CallIndirect { type_idx: u32 },

    // Parametric instructions
    Drop,
    Select,

    // Variable instructions
    LocalGet { local_idx: u32 },
    LocalSet { local_idx: u32 },
    LocalTee { local_idx: u32 },
    GlobalGet { global_idx: u32 },
    GlobalSet { global_idx: u32 },

    // Memory instructions
    I32Load { memarg: MemArg },
    I64Load { memarg: MemArg },
    F32Load { memarg: MemArg },
    F64Load { memarg: MemArg },
    I32Load8S { memarg: MemArg },
    I32Load8U { memarg: MemArg },
    I32Load16S { memarg: MemArg },
    I32Load16U { memarg: MemArg },
    I64Load8S { memarg: MemArg },
    I64Load8U { memarg: MemArg },
    I64Load16S { memarg: MemArg },
    I64Load16U { memarg: MemArg },
    I64Load32S { memarg: MemArg },
    I64Load32U { memarg: MemArg },
    I32Store { memarg: MemArg },
    I64Store { memarg: MemArg },
    F32Store { memarg: MemArg },
    F64Store { memarg: MemArg },
    I32Store8 { memarg: MemArg },
    I32Store16 { memarg: MemArg },
    I64Store8 { memarg: MemArg },
    I64Store16 { memarg: MemArg },
    I64Store32 { memarg: MemArg },
    MemorySize,
    MemoryGrow,

    // Numeric constants
    I32Const { value: i32 },
    I64Const { value: i64 },
    F32Const { value: f32 },
    F64Const { value: f64 },

    // Comparison operators
    I32Eqz,
    I32Eq,
    I32Ne,
    I32LtS,
    I32LtU,
    I32GtS,
    I32GtU,
    I32LeS,
    I32LeU,
    I32GeS,
    I32GeU,
    I64Eqz,
    I64Eq,
    I64Ne,
    I64LtS,
    I64LtU,
    I64GtS,
    I64GtU,
    I64LeS,
    I64LeU,
    I64GeS,
    I64GeU,
    F32Eq,
    F32Ne,
    F32Lt,
    F32Gt,
    F32Le,
    F32Ge,
    F64Eq,
    F64Ne,
    F64Lt,
    F64Gt,
    F64Le,
    F64Ge,

    // Numeric operators
    I32Clz,
    I32Ctz,
    I32Popcnt,
    I32Add,
    I32Sub,
    I32Mul,
    I32DivS,
    I32DivU,
    I32RemS,
    I32RemU,
    I32And,
    I32Or,
    I32Xor,
    I32Shl,
    I32ShrS,
    I32ShrU,
    I32Rotl,
    I32Rotr,
    I64Clz,
    I64Ctz,
    I64Popcnt,
    I64Add,
    I64Sub,
    I64Mul,
    I64DivS,
    I64DivU,
    I64RemS,
    I64RemU,
    I64And,
    I64Or,
    I64Xor,
    I64Shl,
    I64ShrS,
    I64ShrU,
    I64Rotl,
    I64Rotr,
    F32Abs,
    F32Neg,
    F32Ceil,
    F32Floor,
    F32Trunc,
    F32Nearest,
    F32Sqrt,
    F32Add,
    F32Sub,
    F32Mul,
    F32Div,
    F32Min,
    F32Max,
    F32Copysign,
    F64Abs,
    F64Neg,
    F64Ceil,
    F64Floor,
    F64Trunc,
    F64Nearest,
    F64Sqrt,
    F64Add,
    F64Sub,
    F64Mul,
    F64Div,
    F64Min,
    F64Max,
    F64Copysign,

    // Conversions
    I32WrapI64,
    I32TruncF32S,
    I32TruncF32U,
    I32TruncF64S,
    I32TruncF64U,
    I64ExtendI32S,
    I64ExtendI32U,
    I64TruncF32S,
    I64TruncF32U,
    I64TruncF64S,
    I64TruncF64U,
    F32ConvertI32S,
    F32ConvertI32U,
    F32ConvertI64S,
    F32ConvertI64U,
    F32DemoteF64,
    F64ConvertI32S,
    F64ConvertI32U,
    F64ConvertI64S,
    F64ConvertI64U,
    F64PromoteF32,

    // Reinterpretations
    I32ReinterpretF32,
    I64ReinterpretF64,
    F32ReinterpretI32,
    F64ReinterpretI64,
}

/// Opcode byte and mnemonic for every instruction the decoder accepts.
static OPCODES: &[(u8, &str)] = &[
    (0x00, "unreachable"),
    (0x01, "nop"),
    (0x02, "block"),
    (0x03, "loop"),
    (0x04, "if"),
    (0x05, "else"),
    (0x0b, "end"),
    (0x0c, "br"),
    (0x0d, "br_if"),
    (0x0e, "br_table"),
    (0x0f, "return"),
    (0x10, "call"),
    (0x11, "call_indirect"),
    (0x1a, "drop"),
    (0x1b, "select"),
    (0x20, "local.get"),
    (0x21, "local.set"),
    (0x22, "local.tee"),
    (0x23, "global.get"),
    (0x24, "global.set"),
    (0x28, "i32.load"),
    (0x29, "i64.load"),
    (0x2a, "f32.load"),
    (0x2b, "f64.load"),
    (0x2c, "i32.load8_s"),
    (0x2d, "i32.load8_u"),
    (0x2e, "i32.load16_s"),
    (0x2f, "i32.load16_u"),
    (0x30, "i64.load8_s"),
    (0x31, "i64.load8_u"),
    (0x32, "i64.load16_s"),
    (0x33, "i64.load16_u"),
    (0x34, "i64.load32_s"),
    (0x35, "i64.load32_u"),
    (0x36, "i32.store"),
    (0x37, "i64.store"),
    (0x38, "f32.store"),
    (0x39, "f64.store"),
    (0x3a, "i32.store8"),
    (0x3b, "i32.store16"),
    (0x3c, "i64.store8"),
    (0x3d, "i64.store16"),
    (0x3e, "i64.store32"),
    (0x3f, "memory.size"),
    (0x40, "memory.grow"),
    (0x41, "i32.const"),
    (0x42, "i64.const"),
    (0x43, "f32.const"),
    (0x44, "f64.const"),
    (0x45, "i32.eqz"),
    (0x46, "i32.eq"),
    (0x47, "i32.ne"),
    (0x48, "i32.lt_s"),
    (0x49, "i32.lt_u"),
    (0x4a, "i32.gt_s"),
    (0x4b, "i32.gt_u"),
    (0x4c, "i32.le_s"),
    (0x4d, "i32.le_u"),
    (0x4e, "i32.ge_s"),
    (0x4f, "i32.ge_u"),
    (0x50, "i64.eqz"),
    (0x51, "i64.eq"),
    (0x52, "i64.ne"),
    (0x53, "i64.lt_s"),
    (0x54, "i64.lt_u"),
    (0x55, "i64.gt_s"),
    (0x56, "i64.gt_u"),
    (0x57, "i64.le_s"),
    (0x58, "i64.le_u"),
    (0x59, "i64.ge_s"),
    (0x5a, "i64.ge_u"),
    (0x5b, "f32.eq"),
    (0x5c, "f32.ne"),
    (0x5d, "f32.lt"),
    (0x5e, "f32.gt"),
    (0x5f, "f32.le"),
    (0x60, "f32.ge"),
    (0x61, "f64.eq"),
    (0x62, "f64.ne"),
    (0x63, "f64.lt"),
    (0x64, "f64.gt"),
    (0x65, "f64.le"),
    (0x66, "f64.ge"),
    (0x67, "i32.clz"),
    (0x68, "i32.ctz"),
    (0x69, "i32.popcnt"),
    (0x6a, "i32.add"),
    (0x6b, "i32.sub"),
    (0x6c, "i32.mul"),
    (0x6d, "i32.div_s"),
    (0x6e, "i32.div_u"),
    (0x6f, "i32.rem_s"),
    (0x70, "i32.rem_u"),
    (0x71, "i32.and"),
    (0x72, "i32.or"),
    (0x73, "i32.xor"),
    (0x74, "i32.shl"),
    (0x75, "i32.shr_s"),
    (0x76, "i32.shr_u"),
    (0x77, "i32.rotl"),
    (0x78, "i32.rotr"),
    (0x79, "i64.clz"),
    (0x7a, "i64.ctz"),
    (0x7b, "i64.popcnt"),
    (0x7c, "i64.add"),
    (0x7d, "i64.sub"),
    (0x7e, "i64.mul"),
    (0x7f, "i64.div_s"),
    (0x80, "i64.div_u"),
    (0x81, "i64.rem_s"),
    (0x82, "i64.rem_u"),
    (0x83, "i64.and"),
    (0x84, "i64.or"),
    (0x85, "i64.xor"),
    (0x86, "i64.shl"),
    (0x87, "i64.shr_s"),
    (0x88, "i64.shr_u"),
    (0x89, "i64.rotl"),
    (0x8a, "i64.rotr"),
    (0x8b, "f32.abs"),
    (0x8c, "f32.neg"),
    (0x8d, "f32.ceil"),
    (0x8e, "f32.floor"),
    (0x8f, "f32.trunc"),
    (0x90, "f32.nearest"),
    (0x91, "f32.sqrt"),
    (0x92, "f32.add"),
    (0x93, "f32.sub"),
    (0x94, "f32.mul"),
    (0x95, "f32.div"),
    (0x96, "f32.min"),
    (0x97, "f32.max"),
    (0x98, "f32.copysign"),
    (0x99, "f64.abs"),
    (0x9a, "f64.neg"),
    (0x9b, "f64.ceil"),
    (0x9c, "f64.floor"),
    (0x9d, "f64.trunc"),
    (0x9e, "f64.nearest"),
    (0x9f, "f64.sqrt"),
    (0xa0, "f64.add"),
    (0xa1, "f64.sub"),
    (0xa2, "f64.mul"),
    (0xa3, "f64.div"),
    (0xa4, "f64.min"),
    (0xa5, "f64.max"),
    (0xa6, "f64.copysign"),
    (0xa7, "i32.wrap_i64"),
    (0xa8, "i32.trunc_f32_s"),
    (0xa9, "i32.trunc_f32_u"),
    (0xaa, "i32.trunc_f64_s"),
    (0xab, "i32.trunc_f64_u"),
    (0xac, "i64.extend_i32_s"),
    (0xad, "i64.extend_i32_u"),
    (0xae, "i64.trunc_f32_s"),
    (0xaf, "i64.trunc_f32_u"),
    (0xb0, "i64.trunc_f64_s"),
    (0xb1, "i64.trunc_f64_u"),
    (0xb2, "f32.convert_i32_s"),
    (0xb3, "f32.convert_i32_u"),
    (0xb4, "f32.convert_i64_s"),
    (0xb5, "f32.convert_i64_u"),
    (0xb6, "f32.demote_f64"),
    (0xb7, "f64.convert_i32_s"),
    (0xb8, "f64.convert_i32_u"),
    (0xb9, "f64.convert_i64_s"),
    (0xba, "f64.convert_i64_u"),
    (0xbb, "f64.promote_f32"),
    (0xbc, "i32.reinterpret_f32"),
    (0xbd, "i64.reinterpret_f64"),
    (0xbe, "f32.reinterpret_i32"),
    (0xbf, "f64.reinterpret_i64"),
];

static NAMES_BY_OPCODE: Lazy<HashMap<u8, &'static str>> =
    Lazy::new(|| OPCODES.iter().map(|&(op, name)| (op, name)).collect());

static OPCODES_BY_NAME: Lazy<HashMap<&'static str, u8>> =
    Lazy::new(|| OPCODES.iter().map(|&(op, name)| (name, op)).collect());

/// Mnemonic for an opcode byte, `None` if the decoder does not know it.
pub fn opcode_name(opcode: u8) -> Option<&'static str> {
    NAMES_BY_OPCODE.get(&opcode).copied()
}

/// Opcode byte for a mnemonic.
pub fn opcode_by_name(name: &str) -> Option<u8> {
    OPCODES_BY_NAME.get(name).copied()
}

/// Number of opcodes the decoder accepts.
pub fn opcode_count() -> usize {
    OPCODES.len()
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use InstructionKind::*;

        write!(f, "{}", self.mnemonic())?;

        match &self.kind {
            Block { block_type } | Loop { block_type } | If { block_type } => {
                write!(f, "{block_type}")
            }
            Br { label_idx } | BrIf { label_idx } => write!(f, " {label_idx}"),
            BrTable { labels, default } => {
                for label in labels {
                    write!(f, " {label}")?;
                }
                write!(f, " {default}")
            }
            Call { func_idx } => write!(f, " {func_idx}"),
            CallIndirect { type_idx } => write!(f, " (type {type_idx})"),
            LocalGet { local_idx } | LocalSet { local_idx } | LocalTee { local_idx } => {
                write!(f, " {local_idx}")
            }
            GlobalGet { global_idx } | GlobalSet { global_idx } => write!(f, " {global_idx}"),
            I32Const { value } => write!(f, " {value}"),
            I64Const { value } => write!(f, " {value}"),
            F32Const { value } => write!(f, " {}", value.to_hex()),
            F64Const { value } => write!(f, " {}", value.to_hex()),
            I32Load { memarg }
            | I64Load { memarg }
            | F32Load { memarg }
            | F64Load { memarg }
            | I32Load8S { memarg }
            | I32Load8U { memarg }
            | I32Load16S { memarg }
            | I32Load16U { memarg }
            | I64Load8S { memarg }
            | I64Load8U { memarg }
            | I64Load16S { memarg }
            | I64Load16U { memarg }
            | I64Load32S { memarg }
            | I64Load32U { memarg }
            | I32Store { memarg }
            | I64Store { memarg }
            | F32Store { memarg }
            | F64Store { memarg }
            | I32Store8 { memarg }
            | I32Store16 { memarg }
            | I64Store8 { memarg }
            | I64Store16 { memarg }
            | I64Store32 { memarg } => write!(f, " {} {}", memarg.align, memarg.offset),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockType::Empty => Ok(()),
            BlockType::Value(vt) => write!(f, " {vt}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_opcode_table_is_complete() {
        assert_eq!(opcode_count(), 172);
        assert_eq!(NAMES_BY_OPCODE.len(), 172);
        assert_eq!(OPCODES_BY_NAME.len(), 172);
    }

    #[rstest]
    #[case(0x00, "unreachable")]
    #[case(0x0b, "end")]
    #[case(0x23, "global.get")]
    #[case(0x41, "i32.const")]
    #[case(0x6a, "i32.add")]
    #[case(0xbf, "f64.reinterpret_i64")]
    fn test_forward_and_reverse_names(#[case] opcode: u8, #[case] name: &str) {
        assert_eq!(opcode_name(opcode), Some(name));
        assert_eq!(opcode_by_name(name), Some(opcode));
    }

    #[rstest]
    #[case(0x06)]
    #[case(0x12)]
    #[case(0x25)]
    #[case(0xc0)]
    #[case(0xfc)]
    fn test_unknown_opcodes(#[case] opcode: u8) {
        assert_eq!(opcode_name(opcode), None);
    }

    #[test]
    fn test_display() {
        let inst = |opcode, kind| Instruction {
            opcode,
            kind,
            position: ByteRange { offset: 0, length: 1 },
        };

        assert_eq!(
            inst(0x41, InstructionKind::I32Const { value: -1 }).to_string(),
            "i32.const -1"
        );
        assert_eq!(
            inst(0x28, InstructionKind::I32Load { memarg: MemArg { align: 2, offset: 8 } }).to_string(),
            "i32.load 2 8"
        );
        assert_eq!(
            inst(0x0e, InstructionKind::BrTable { labels: vec![0, 1], default: 2 }).to_string(),
            "br_table 0 1 2"
        );
        assert_eq!(
            inst(0x02, InstructionKind::Block { block_type: BlockType::Value(ValueType::I32) }).to_string(),
            "block i32"
        );
        assert_eq!(inst(0x0b, InstructionKind::End).to_string(), "end");
    }
}
