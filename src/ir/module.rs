//! IR module, function, basic block, and literal definitions.
//!
//! `Module` is the top-level compilation unit. It owns every function, block,
//! and instruction in flat arenas, interns literals by value, and maintains
//! instruction use-lists across creation, operand replacement, and erasure.
//! Function order is declaration order and is observable: passes iterate
//! functions in this order, and a new function can be inserted immediately
//! before an existing one.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::instruction::{BlockId, FuncId, InstId, Instruction, LitId, Opcode, Value, VarId};

/// An interned literal value. `Number` stores the IEEE-754 bit pattern so
/// that interning distinguishes `0.0` from `-0.0` and NaN payloads, and so
/// the type can derive `Eq`/`Hash`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LiteralValue {
    Undefined,
    Null,
    Bool(bool),
    Number(u64),
    Str(String),
}

impl LiteralValue {
    /// Build a number literal from an `f64`.
    #[inline]
    pub fn number(n: f64) -> Self {
        LiteralValue::Number(n.to_bits())
    }

    /// The numeric value, if this is a number literal.
    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            LiteralValue::Number(bits) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }
}

/// A basic block: an ordered list of instruction ids. The last instruction is
/// the block terminator once the block is complete.
#[derive(Debug, Default)]
pub struct BasicBlock {
    pub insts: Vec<InstId>,
}

impl BasicBlock {
    /// Number of instructions currently in the block.
    #[inline]
    pub fn size(&self) -> usize {
        self.insts.len()
    }
}

/// An IR function.
#[derive(Debug)]
pub struct Function {
    pub name: String,
    /// JavaScript strict-mode flag. Preserved across call boundaries: a
    /// caller and callee with different strictness cannot share outlined
    /// code.
    pub strict: bool,
    /// Parameter names, in order. `Value::Param(func, i)` references the
    /// i-th entry.
    pub params: Vec<String>,
    /// Blocks in declaration order.
    pub blocks: Vec<BlockId>,
}

/// A compilation unit.
#[derive(Debug, Default)]
pub struct Module {
    /// Functions in declaration order. This order is observable.
    pub functions: Vec<FuncId>,
    funcs: Vec<Function>,
    blocks: Vec<BasicBlock>,
    insts: Vec<Instruction>,
    literals: Vec<LiteralValue>,
    literal_map: FxHashMap<LiteralValue, LitId>,
    variables: Vec<String>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    // === Accessors ===

    #[inline]
    pub fn func(&self, id: FuncId) -> &Function {
        &self.funcs[id.0 as usize]
    }

    #[inline]
    pub fn func_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.funcs[id.0 as usize]
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0 as usize]
    }

    #[inline]
    pub(crate) fn block_mut_insts(&mut self, id: BlockId) -> &mut Vec<InstId> {
        &mut self.blocks[id.0 as usize].insts
    }

    #[inline]
    pub fn inst(&self, id: InstId) -> &Instruction {
        &self.insts[id.0 as usize]
    }

    #[inline]
    pub fn literal(&self, id: LitId) -> &LiteralValue {
        &self.literals[id.0 as usize]
    }

    #[inline]
    pub fn variable(&self, id: VarId) -> &str {
        &self.variables[id.0 as usize]
    }

    /// The function that owns `block`.
    pub fn block_function(&self, block: BlockId) -> FuncId {
        for (i, f) in self.funcs.iter().enumerate() {
            if f.blocks.contains(&block) {
                return FuncId(i as u32);
            }
        }
        panic!("block {:?} not owned by any function", block);
    }

    /// Current position of `inst` within its block.
    pub fn position_in_block(&self, inst: InstId) -> usize {
        let block = self.inst(inst).block;
        self.blocks[block.0 as usize]
            .insts
            .iter()
            .position(|&i| i == inst)
            .expect("instruction not found in its block")
    }

    // === Construction ===

    /// Create a function appended at the end of declaration order.
    pub fn add_function(&mut self, name: impl Into<String>, strict: bool) -> FuncId {
        let id = self.alloc_function(name.into(), strict);
        self.functions.push(id);
        id
    }

    /// Create a function inserted immediately before `before` in declaration
    /// order.
    pub fn add_function_before(
        &mut self,
        name: impl Into<String>,
        strict: bool,
        before: FuncId,
    ) -> FuncId {
        let id = self.alloc_function(name.into(), strict);
        let pos = self
            .functions
            .iter()
            .position(|&f| f == before)
            .expect("insert-before target not in module");
        self.functions.insert(pos, id);
        id
    }

    fn alloc_function(&mut self, name: String, strict: bool) -> FuncId {
        let id = FuncId(self.funcs.len() as u32);
        self.funcs.push(Function {
            name,
            strict,
            params: Vec::new(),
            blocks: Vec::new(),
        });
        id
    }

    /// Create an empty block at the end of `func`.
    pub fn add_block(&mut self, func: FuncId) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock::default());
        self.funcs[func.0 as usize].blocks.push(id);
        id
    }

    /// Intern a literal, returning its identity.
    pub fn intern_literal(&mut self, value: LiteralValue) -> LitId {
        if let Some(&id) = self.literal_map.get(&value) {
            return id;
        }
        let id = LitId(self.literals.len() as u32);
        self.literals.push(value.clone());
        self.literal_map.insert(value, id);
        id
    }

    /// Register a captured variable.
    pub fn add_variable(&mut self, name: impl Into<String>) -> VarId {
        let id = VarId(self.variables.len() as u32);
        self.variables.push(name.into());
        id
    }

    /// Derive a module-unique function name from `base`: `base` itself if
    /// free, otherwise `base_1`, `base_2`, ...
    pub fn derive_unique_name(&self, base: &str) -> String {
        let taken = |name: &str| self.funcs.iter().any(|f| f.name == name);
        if !taken(base) {
            return base.to_string();
        }
        let mut n = 1usize;
        loop {
            let candidate = format!("{}_{}", base, n);
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Allocate an instruction in the arena, registering operand uses. The
    /// caller (the builder) is responsible for placing the id into a block's
    /// instruction list.
    pub(crate) fn alloc_inst(
        &mut self,
        opcode: Opcode,
        operands: Vec<Value>,
        targets: SmallVec<[BlockId; 2]>,
        block: BlockId,
    ) -> InstId {
        let id = InstId(self.insts.len() as u32);
        for op in &operands {
            if let Value::Inst(src) = op {
                self.insts[src.0 as usize].users.push(id);
            }
        }
        self.insts.push(Instruction {
            opcode,
            operands,
            targets,
            block,
            users: Vec::new(),
            erased: false,
        });
        id
    }

    // === Rewriting ===

    /// Replace every use of `old`'s result with `new`, updating use-lists on
    /// both sides. `old` has zero users afterwards.
    pub fn replace_all_uses_with(&mut self, old: InstId, new: Value) {
        let users = std::mem::take(&mut self.insts[old.0 as usize].users);
        for user in users {
            let mut replaced = 0usize;
            for op in &mut self.insts[user.0 as usize].operands {
                if *op == Value::Inst(old) {
                    *op = new;
                    replaced += 1;
                }
            }
            // A user appearing with multiplicity k in the use-list is visited
            // k times; slots are all rewritten on the first visit.
            if replaced == 0 {
                continue;
            }
            if let Value::Inst(new_inst) = new {
                for _ in 0..replaced {
                    self.insts[new_inst.0 as usize].users.push(user);
                }
            }
        }
    }

    /// Erase `inst` from its block. The instruction must have zero remaining
    /// users; this is asserted, not silently tolerated.
    pub fn erase_instruction(&mut self, inst: InstId) {
        let idx = inst.0 as usize;
        assert!(!self.insts[idx].erased, "instruction erased twice");
        assert!(
            self.insts[idx].users.is_empty(),
            "instruction about to be erased still has users"
        );
        let operands = std::mem::take(&mut self.insts[idx].operands);
        for op in &operands {
            if let Value::Inst(src) = op {
                let users = &mut self.insts[src.0 as usize].users;
                let pos = users
                    .iter()
                    .position(|&u| u == inst)
                    .expect("use-list missing an operand use");
                users.swap_remove(pos);
            }
        }
        let block = self.insts[idx].block;
        let pos = self.blocks[block.0 as usize]
            .insts
            .iter()
            .position(|&i| i == inst)
            .expect("erased instruction not found in its block");
        self.blocks[block.0 as usize].insts.remove(pos);
        self.insts[idx].erased = true;
    }
}
