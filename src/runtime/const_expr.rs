//! Evaluation of initializer expressions (global initializers and segment
//! offsets).

use super::stack::Stack;
use super::{RuntimeError, SharedGlobal, Value};
use crate::parser::instruction::{Instruction, InstructionKind};
use crate::parser::types::ValueType;

/// Evaluate `expr` against the globals bound so far. `global.get` of an
/// index at or past `globals.len()` fails, so an initializer can only read
/// globals that come before it (in practice, imports).
pub fn evaluate(expr: &[Instruction], globals: &[SharedGlobal]) -> Result<Value, RuntimeError> {
    let mut stack = Stack::new();

    for instruction in expr {
        match &instruction.kind {
            InstructionKind::I32Const { value } => stack.push(Value::I32(*value)),
            InstructionKind::I64Const { value } => stack.push(Value::I64(*value)),
            InstructionKind::F32Const { value } => stack.push(Value::F32(*value)),
            InstructionKind::F64Const { value } => stack.push(Value::F64(*value)),
            InstructionKind::GlobalGet { global_idx } => {
                let global = globals
                    .get(*global_idx as usize)
                    .ok_or(RuntimeError::GlobalIndexOutOfBounds(*global_idx))?;
                stack.push(global.get());
            }
            InstructionKind::End => break,
            other => unreachable!("{other:?} in a constant expression that passed decoding"),
        }
    }

    if stack.depth() != 1 {
        return Err(RuntimeError::InvalidConstExpr(format!(
            "expected exactly one value, found {}",
            stack.depth()
        )));
    }
    stack.pop()
}

/// Evaluate `expr` and require a result of type `expected`.
pub fn evaluate_typed(
    expr: &[Instruction],
    globals: &[SharedGlobal],
    expected: ValueType,
) -> Result<Value, RuntimeError> {
    let value = evaluate(expr, globals)?;
    if value.typ() != expected {
        return Err(RuntimeError::TypeMismatch {
            expected: expected.to_string(),
            actual: value.typ().to_string(),
        });
    }
    Ok(value)
}
