//! Structural instruction keys for token interning.

use smallvec::SmallVec;

use crate::ir::{Instruction, LitId, Opcode, Value};

/// Identity of an instruction's outlinable shape: the variety, the operand
/// count, and the literal operands at their positions. Non-literal operands
/// are intentionally ignored here; their dataflow shape is checked later by
/// instruction numbering. Positions are part of the key so that two
/// instructions carrying the same literals in different slots do not
/// collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstructionKey {
    variety: Opcode,
    operand_count: u32,
    literals: SmallVec<[(u32, LitId); 4]>,
}

impl InstructionKey {
    pub fn of(inst: &Instruction) -> Self {
        let mut literals = SmallVec::new();
        for (i, op) in inst.operands.iter().enumerate() {
            if let Value::Literal(lit) = op {
                literals.push((i as u32, *lit));
            }
        }
        InstructionKey {
            variety: inst.opcode,
            operand_count: inst.operands.len() as u32,
            literals,
        }
    }
}
