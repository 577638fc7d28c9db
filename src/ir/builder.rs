//! Builder for constructing and rewriting IR.
//!
//! The builder is a thin mutable view over a [`Module`] holding an insertion
//! point: a block plus an optional position inside it. With no position set,
//! new instructions append to the block; with a position set (see
//! [`Builder::set_insertion_point`]), they insert before it, and consecutive
//! creations stay in program order.

use smallvec::{smallvec, SmallVec};

use super::instruction::{
    BinaryOp, BlockId, FuncId, InstId, LitId, Opcode, UnaryOp, Value, VarId,
};
use super::module::{LiteralValue, Module};

pub struct Builder<'a> {
    module: &'a mut Module,
    block: Option<BlockId>,
    /// Position within the insertion block, or None to append.
    insert_at: Option<usize>,
}

impl<'a> Builder<'a> {
    pub fn new(module: &'a mut Module) -> Self {
        Builder {
            module,
            block: None,
            insert_at: None,
        }
    }

    #[inline]
    pub fn module(&mut self) -> &mut Module {
        self.module
    }

    // === Insertion point ===

    /// Append subsequent instructions at the end of `block`.
    pub fn set_insertion_block(&mut self, block: BlockId) {
        self.block = Some(block);
        self.insert_at = None;
    }

    /// Insert subsequent instructions immediately before `inst`.
    pub fn set_insertion_point(&mut self, inst: InstId) {
        let block = self.module.inst(inst).block();
        let pos = self.module.position_in_block(inst);
        self.block = Some(block);
        self.insert_at = Some(pos);
    }

    // === Functions, blocks, parameters ===

    /// Create a function. When `insert_before` is set, the function is placed
    /// immediately before it in module declaration order; otherwise it is
    /// appended.
    pub fn create_function(
        &mut self,
        name: impl Into<String>,
        strict: bool,
        insert_before: Option<FuncId>,
    ) -> FuncId {
        match insert_before {
            Some(before) => self.module.add_function_before(name, strict, before),
            None => self.module.add_function(name, strict),
        }
    }

    pub fn create_basic_block(&mut self, func: FuncId) -> BlockId {
        self.module.add_block(func)
    }

    /// Append a parameter to `func`, returning the value that references it.
    pub fn create_parameter(&mut self, func: FuncId, name: impl Into<String>) -> Value {
        let params = &mut self.module.func_mut(func).params;
        let index = params.len() as u32;
        params.push(name.into());
        Value::Param(func, index)
    }

    // === Literals and variables ===

    pub fn literal_undefined(&mut self) -> Value {
        Value::Literal(self.module.intern_literal(LiteralValue::Undefined))
    }

    pub fn literal_null(&mut self) -> Value {
        Value::Literal(self.module.intern_literal(LiteralValue::Null))
    }

    pub fn literal_bool(&mut self, b: bool) -> Value {
        Value::Literal(self.module.intern_literal(LiteralValue::Bool(b)))
    }

    pub fn literal_number(&mut self, n: f64) -> Value {
        Value::Literal(self.module.intern_literal(LiteralValue::number(n)))
    }

    pub fn literal_str(&mut self, s: impl Into<String>) -> Value {
        Value::Literal(self.module.intern_literal(LiteralValue::Str(s.into())))
    }

    pub fn literal(&mut self, value: LiteralValue) -> LitId {
        self.module.intern_literal(value)
    }

    pub fn variable(&mut self, name: impl Into<String>) -> Value {
        Value::Var(self.module.add_variable(name))
    }

    // === Instructions ===

    fn insert(
        &mut self,
        opcode: Opcode,
        operands: Vec<Value>,
        targets: SmallVec<[BlockId; 2]>,
    ) -> InstId {
        let block = self.block.expect("no insertion block set");
        let id = self.module.alloc_inst(opcode, operands, targets, block);
        let insts = self.module.block_mut_insts(block);
        match self.insert_at {
            Some(pos) => {
                insts.insert(pos, id);
                self.insert_at = Some(pos + 1);
            }
            None => insts.push(id),
        }
        id
    }

    pub fn create_mov(&mut self, src: Value) -> InstId {
        self.insert(Opcode::Mov, vec![src], smallvec![])
    }

    pub fn create_unary(&mut self, op: UnaryOp, src: Value) -> InstId {
        self.insert(Opcode::Unary(op), vec![src], smallvec![])
    }

    pub fn create_binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> InstId {
        self.insert(Opcode::Binary(op), vec![lhs, rhs], smallvec![])
    }

    pub fn create_load_property(&mut self, object: Value, name: Value) -> InstId {
        self.insert(Opcode::LoadProperty, vec![object, name], smallvec![])
    }

    pub fn create_store_property(&mut self, value: Value, object: Value, name: Value) -> InstId {
        self.insert(Opcode::StoreProperty, vec![value, object, name], smallvec![])
    }

    /// Create a direct call. Operand order is `[callee, this, args...]`.
    pub fn create_direct_call(&mut self, callee: FuncId, this: Value, args: &[Value]) -> InstId {
        let mut operands = Vec::with_capacity(2 + args.len());
        operands.push(Value::Func(callee));
        operands.push(this);
        operands.extend_from_slice(args);
        self.insert(Opcode::CallDirect, operands, smallvec![])
    }

    pub fn create_create_arguments(&mut self) -> InstId {
        self.insert(Opcode::CreateArguments, vec![], smallvec![])
    }

    pub fn create_alloc_stack(&mut self) -> InstId {
        self.insert(Opcode::AllocStack, vec![], smallvec![])
    }

    pub fn create_load_stack(&mut self, slot: InstId) -> InstId {
        self.insert(Opcode::LoadStack, vec![Value::Inst(slot)], smallvec![])
    }

    pub fn create_store_stack(&mut self, value: Value, slot: InstId) -> InstId {
        self.insert(
            Opcode::StoreStack,
            vec![value, Value::Inst(slot)],
            smallvec![],
        )
    }

    /// Create a phi from `(value, incoming block)` pairs.
    pub fn create_phi(&mut self, incoming: &[(Value, BlockId)]) -> InstId {
        let operands = incoming.iter().map(|&(v, _)| v).collect();
        let targets = incoming.iter().map(|&(_, b)| b).collect();
        self.insert(Opcode::Phi, operands, targets)
    }

    pub fn create_ret(&mut self, value: Value) -> InstId {
        self.insert(Opcode::Ret, vec![value], smallvec![])
    }

    pub fn create_branch(&mut self, target: BlockId) -> InstId {
        self.insert(Opcode::Branch, vec![], smallvec![target])
    }

    pub fn create_cond_branch(
        &mut self,
        cond: Value,
        if_true: BlockId,
        if_false: BlockId,
    ) -> InstId {
        self.insert(Opcode::CondBranch, vec![cond], smallvec![if_true, if_false])
    }

    /// Clone `src` with a fresh operand list, inserting at the current
    /// insertion point. The opcode and branch targets are copied verbatim.
    pub fn clone_inst(&mut self, src: InstId, new_operands: Vec<Value>) -> InstId {
        let (opcode, targets) = {
            let inst = self.module.inst(src);
            (inst.opcode, inst.targets.clone())
        };
        self.insert(opcode, new_operands, targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_point_keeps_program_order() {
        let mut m = Module::new();
        let f = m.add_function("f", false);
        let b = m.add_block(f);
        let mut builder = Builder::new(&mut m);
        builder.set_insertion_block(b);
        let one = builder.literal_number(1.0);
        let first = builder.create_mov(one);
        let last = builder.create_mov(one);
        // Insert two instructions before `last`; they must land in order.
        builder.set_insertion_point(last);
        let mid1 = builder.create_mov(one);
        let mid2 = builder.create_mov(one);
        assert_eq!(m.block(b).insts, vec![first, mid1, mid2, last]);
    }

    #[test]
    fn direct_call_operand_layout() {
        let mut m = Module::new();
        let callee = m.add_function("callee", true);
        let f = m.add_function("f", false);
        let b = m.add_block(f);
        let mut builder = Builder::new(&mut m);
        builder.set_insertion_block(b);
        let undef = builder.literal_undefined();
        let arg = builder.literal_number(7.0);
        let call = builder.create_direct_call(callee, undef, &[arg]);
        let inst = m.inst(call);
        assert_eq!(inst.operands[0], Value::Func(callee));
        assert_eq!(inst.operands[1], undef);
        assert_eq!(inst.operands[2], arg);
    }

    #[test]
    fn parameters_number_in_order() {
        let mut m = Module::new();
        let f = m.add_function("f", false);
        let mut builder = Builder::new(&mut m);
        let p0 = builder.create_parameter(f, "p0");
        let p1 = builder.create_parameter(f, "p1");
        assert_eq!(p0, Value::Param(f, 0));
        assert_eq!(p1, Value::Param(f, 1));
        assert_eq!(m.func(f).params, vec!["p0", "p1"]);
    }

    #[test]
    fn clone_inst_copies_opcode_only() {
        let mut m = Module::new();
        let f = m.add_function("f", false);
        let b = m.add_block(f);
        let mut builder = Builder::new(&mut m);
        builder.set_insertion_block(b);
        let one = builder.literal_number(1.0);
        let two = builder.literal_number(2.0);
        let add = builder.create_binary(BinaryOp::Add, one, two);
        let clone = builder.clone_inst(add, vec![two, two]);
        assert_eq!(m.inst(clone).opcode, m.inst(add).opcode);
        assert_eq!(m.inst(clone).operands, vec![two, two]);
    }
}
