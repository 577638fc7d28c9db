//! Canonical instruction numbering over a basic-block range.
//!
//! `InstructionNumbering` walks a contiguous range of instructions and emits
//! one [`Expression`] per instruction. Expression operands abstract away
//! concrete value identities so that two ranges with the same dataflow shape
//! produce equal expression streams:
//!
//! - `Internal(i)` — the operand is the result of the i-th earlier
//!   instruction in the same range.
//! - `External(i)` — the operand is defined outside the range (an outside
//!   instruction, or a function parameter), numbered densely from 0 in order
//!   of first appearance across the whole stream.
//! - `Value(v)` — anything else (literals, captured variables, function
//!   references) carried verbatim; equality is identity equality because
//!   literals are interned.
//!
//! Expression operands are positionally 1:1 with the underlying
//! instruction's operands: the k-th expression operand always describes
//! `inst.operands[k]`. Consumers rely on this to map an `External` operand
//! back to the concrete value at a call site.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::ir::{InstId, Module, Opcode, Value};

/// Which value kinds are abstracted into `External` operands. Kinds not
/// covered stay as verbatim `Value` operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberingFlags {
    pub include_instructions: bool,
    pub include_parameters: bool,
}

impl NumberingFlags {
    /// The configuration the outliner uses: outside instructions and
    /// parameters both become externals (and thus, parameters of the
    /// outlined function).
    pub const INSTRUCTIONS_AND_PARAMETERS: NumberingFlags = NumberingFlags {
        include_instructions: true,
        include_parameters: true,
    };
}

/// One operand of an [`Expression`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprOperand {
    Internal(u32),
    External(u32),
    Value(Value),
}

/// The canonical form of one instruction inside a range.
///
/// Equality compares the dataflow shape only (variety + operands); the
/// underlying instruction id is carried for consumers but deliberately
/// excluded, so expressions from different ranges compare equal when the
/// ranges are structurally equivalent.
#[derive(Debug, Clone)]
pub struct Expression {
    pub inst: InstId,
    pub variety: Opcode,
    pub operands: SmallVec<[ExprOperand; 4]>,
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.variety == other.variety && self.operands == other.operands
    }
}

impl Eq for Expression {}

/// Iterator yielding the expression stream of a range.
///
/// External numbering state lives in the iterator, so a fresh iterator must
/// be constructed per range. Comparing two ranges in lockstep is
/// `a.zip(b).take_while(|(x, y)| x == y)`.
pub struct InstructionNumbering<'m> {
    module: &'m Module,
    range: &'m [InstId],
    flags: NumberingFlags,
    index_of: FxHashMap<InstId, u32>,
    externals: FxHashMap<Value, u32>,
    pos: usize,
}

impl<'m> InstructionNumbering<'m> {
    pub fn new(module: &'m Module, range: &'m [InstId], flags: NumberingFlags) -> Self {
        let index_of = range
            .iter()
            .enumerate()
            .map(|(i, &inst)| (inst, i as u32))
            .collect();
        InstructionNumbering {
            module,
            range,
            flags,
            index_of,
            externals: FxHashMap::default(),
            pos: 0,
        }
    }

    fn classify(&mut self, operand: Value, pos: usize) -> ExprOperand {
        if let Value::Inst(inst) = operand {
            if let Some(&index) = self.index_of.get(&inst) {
                assert!(
                    (index as usize) < pos,
                    "operand refers forward within the range"
                );
                return ExprOperand::Internal(index);
            }
        }
        let externalize = match operand {
            Value::Inst(_) => self.flags.include_instructions,
            Value::Param(_, _) => self.flags.include_parameters,
            _ => false,
        };
        if externalize {
            let next = self.externals.len() as u32;
            let index = *self.externals.entry(operand).or_insert(next);
            ExprOperand::External(index)
        } else {
            ExprOperand::Value(operand)
        }
    }
}

impl<'m> Iterator for InstructionNumbering<'m> {
    type Item = Expression;

    fn next(&mut self) -> Option<Expression> {
        if self.pos >= self.range.len() {
            return None;
        }
        let pos = self.pos;
        let inst = self.range[pos];
        let (variety, operand_values) = {
            let data = self.module.inst(inst);
            (data.opcode, data.operands.clone())
        };
        let operands = operand_values
            .into_iter()
            .map(|op| self.classify(op, pos))
            .collect();
        self.pos += 1;
        Some(Expression {
            inst,
            variety,
            operands,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, Builder, Module};

    const FLAGS: NumberingFlags = NumberingFlags::INSTRUCTIONS_AND_PARAMETERS;

    /// One function, one block: v0 = p0 + 1; v1 = v0 + p1; v2 = v1 + v0.
    fn sample_module() -> (Module, Vec<InstId>) {
        let mut m = Module::new();
        let f = m.add_function("f", false);
        let b = m.add_block(f);
        let mut builder = Builder::new(&mut m);
        let p0 = builder.create_parameter(f, "a");
        let p1 = builder.create_parameter(f, "b");
        builder.set_insertion_block(b);
        let one = builder.literal_number(1.0);
        let v0 = builder.create_binary(BinaryOp::Add, p0, one);
        let v1 = builder.create_binary(BinaryOp::Add, Value::Inst(v0), p1);
        let v2 = builder.create_binary(BinaryOp::Add, Value::Inst(v1), Value::Inst(v0));
        (m, vec![v0, v1, v2])
    }

    #[test]
    fn classifies_internal_external_value() {
        let (m, insts) = sample_module();
        let exprs: Vec<_> = InstructionNumbering::new(&m, &insts, FLAGS).collect();
        assert_eq!(exprs.len(), 3);
        // v0 = p0 + 1: param externalized, literal verbatim.
        assert!(matches!(exprs[0].operands[0], ExprOperand::External(0)));
        assert!(matches!(exprs[0].operands[1], ExprOperand::Value(Value::Literal(_))));
        // v1 = v0 + p1: in-range result, second distinct external.
        assert_eq!(exprs[1].operands[0], ExprOperand::Internal(0));
        assert_eq!(exprs[1].operands[1], ExprOperand::External(1));
        // v2 = v1 + v0.
        assert_eq!(exprs[2].operands[0], ExprOperand::Internal(1));
        assert_eq!(exprs[2].operands[1], ExprOperand::Internal(0));
    }

    #[test]
    fn suffix_range_turns_internal_into_external() {
        let (m, insts) = sample_module();
        // Range excluding v0: its uses become externals.
        let exprs: Vec<_> = InstructionNumbering::new(&m, &insts[1..], FLAGS).collect();
        assert_eq!(exprs[0].operands[0], ExprOperand::External(0)); // v0
        assert_eq!(exprs[0].operands[1], ExprOperand::External(1)); // p1
        assert_eq!(exprs[1].operands[0], ExprOperand::Internal(0));
        assert_eq!(exprs[1].operands[1], ExprOperand::External(0)); // v0 again
    }

    #[test]
    fn equal_shapes_compare_equal_across_ranges() {
        // Two functions computing the same shape over different literals?
        // No -- literals are part of the shape. Same literals, different
        // parameter identities: shapes must still match.
        let mut m = Module::new();
        let f = m.add_function("f", false);
        let g = m.add_function("g", false);
        let fb = m.add_block(f);
        let gb = m.add_block(g);
        let mut builder = Builder::new(&mut m);
        let fp = builder.create_parameter(f, "x");
        let gp = builder.create_parameter(g, "y");
        builder.set_insertion_block(fb);
        let two = builder.literal_number(2.0);
        let f0 = builder.create_binary(BinaryOp::Mul, fp, two);
        let f1 = builder.create_unary(crate::ir::UnaryOp::Minus, Value::Inst(f0));
        builder.set_insertion_block(gb);
        let g0 = builder.create_binary(BinaryOp::Mul, gp, two);
        let g1 = builder.create_unary(crate::ir::UnaryOp::Minus, Value::Inst(g0));
        let fr = [f0, f1];
        let gr = [g0, g1];
        let fe: Vec<_> = InstructionNumbering::new(&m, &fr, FLAGS).collect();
        let ge: Vec<_> = InstructionNumbering::new(&m, &gr, FLAGS).collect();
        assert_eq!(fe, ge);
    }

    #[test]
    fn lockstep_divergence_position() {
        // Same first instruction, different second operator.
        let mut m = Module::new();
        let f = m.add_function("f", false);
        let b = m.add_block(f);
        let mut builder = Builder::new(&mut m);
        builder.set_insertion_block(b);
        let one = builder.literal_number(1.0);
        let a0 = builder.create_binary(BinaryOp::Add, one, one);
        let a1 = builder.create_binary(BinaryOp::Sub, Value::Inst(a0), one);
        let b0 = builder.create_binary(BinaryOp::Add, one, one);
        let b1 = builder.create_binary(BinaryOp::Mul, Value::Inst(b0), one);
        let ra = [a0, a1];
        let rb = [b0, b1];
        let na = InstructionNumbering::new(&m, &ra, FLAGS);
        let nb = InstructionNumbering::new(&m, &rb, FLAGS);
        let common: Vec<_> = na.zip(nb).take_while(|(x, y)| x == y).collect();
        assert_eq!(common.len(), 1);
    }
}
