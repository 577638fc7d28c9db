//! IR instruction definitions: the core SSA instruction set.
//!
//! Instructions are stored in a module-owned arena and referenced by
//! [`InstId`]. An instruction carries its opcode (the *variety*), an ordered
//! operand list, its parent block, branch targets (terminators and phis
//! only), and a use-list maintained by the module.
//!
//! Key types:
//! - `FuncId` / `BlockId` / `InstId` / `LitId` / `VarId`: u32 arena indices
//! - `Value`: an SSA operand (instruction result, literal, parameter,
//!   captured variable, or function reference)
//! - `Opcode`: the instruction variety, with operators folded in so that
//!   `Binary(Add)` and `Binary(Sub)` are distinct varieties
//! - `Instruction`: opcode + operands + targets + use-list

use smallvec::SmallVec;

/// A function identifier. Index into the module's function arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub u32);

/// A basic block identifier. Index into the module's block arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

/// An instruction identifier. Index into the module's instruction arena.
/// Stable for the lifetime of the module: erasing an instruction removes it
/// from its block but never reuses or invalidates ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(pub u32);

/// An interned literal identifier. Literals are interned per module, so two
/// equal `LitId`s always denote the same literal value and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LitId(pub u32);

/// A captured-variable identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

/// A JavaScript binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    InstanceOf,
}

/// A JavaScript unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Minus,
    Not,
    BitNot,
    TypeOf,
    Void,
}

/// The instruction variety. Operand conventions:
///
/// - `Mov`: `[src]`
/// - `Unary(op)`: `[src]`
/// - `Binary(op)`: `[lhs, rhs]`
/// - `LoadProperty`: `[object, name]`
/// - `StoreProperty`: `[value, object, name]`
/// - `CallDirect`: `[callee (Value::Func), this, arg0, arg1, ...]`
/// - `CreateArguments`: `[]`
/// - `AllocStack`: `[]` (the result is the slot)
/// - `LoadStack`: `[slot]`
/// - `StoreStack`: `[value, slot]`
/// - `Phi`: `[v0, v1, ...]` with `targets` listing the incoming block per
///   operand, parallel
/// - `Ret`: `[value]`
/// - `Branch`: `[]` with `targets = [dest]`
/// - `CondBranch`: `[cond]` with `targets = [if_true, if_false]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Mov,
    Unary(UnaryOp),
    Binary(BinaryOp),
    LoadProperty,
    StoreProperty,
    CallDirect,
    CreateArguments,
    AllocStack,
    LoadStack,
    StoreStack,
    Phi,
    Ret,
    Branch,
    CondBranch,
}

impl Opcode {
    /// True for block terminators. A terminator occupies the last slot of its
    /// block and never appears anywhere else.
    #[inline]
    pub fn is_terminator(self) -> bool {
        matches!(self, Opcode::Ret | Opcode::Branch | Opcode::CondBranch)
    }

    /// True if instructions of this variety produce an SSA value that other
    /// instructions may reference via `Value::Inst`.
    #[inline]
    pub fn has_result(self) -> bool {
        matches!(
            self,
            Opcode::Mov
                | Opcode::Unary(_)
                | Opcode::Binary(_)
                | Opcode::LoadProperty
                | Opcode::CallDirect
                | Opcode::CreateArguments
                | Opcode::AllocStack
                | Opcode::LoadStack
                | Opcode::Phi
        )
    }
}

/// An SSA operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    /// The result of another instruction.
    Inst(InstId),
    /// An interned literal.
    Literal(LitId),
    /// The n-th parameter of a function.
    Param(FuncId, u32),
    /// A captured binding from an enclosing scope.
    Var(VarId),
    /// A direct reference to a function (callee of `CallDirect`).
    Func(FuncId),
}

impl Value {
    /// The instruction id if this operand is an instruction result.
    #[inline]
    pub fn as_inst(self) -> Option<InstId> {
        match self {
            Value::Inst(id) => Some(id),
            _ => None,
        }
    }

    /// The literal id if this operand is a literal.
    #[inline]
    pub fn as_literal(self) -> Option<LitId> {
        match self {
            Value::Literal(id) => Some(id),
            _ => None,
        }
    }
}

/// An IR instruction. Owned by the module arena; fields that must stay
/// consistent with the rest of the module (parent block, use-list) are
/// mutated only through [`crate::ir::Module`] and [`crate::ir::Builder`].
#[derive(Debug)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: Vec<Value>,
    /// Branch targets (terminators) or incoming blocks (phis). Empty for
    /// everything else.
    pub targets: SmallVec<[BlockId; 2]>,
    pub(crate) block: BlockId,
    /// Instructions using this one's result, with multiplicity: an
    /// instruction referencing this value in two operand slots appears twice.
    pub(crate) users: Vec<InstId>,
    pub(crate) erased: bool,
}

impl Instruction {
    /// The block this instruction currently belongs to.
    #[inline]
    pub fn block(&self) -> BlockId {
        self.block
    }

    /// The instructions using this one's result (with multiplicity).
    #[inline]
    pub fn users(&self) -> &[InstId] {
        &self.users
    }

    #[inline]
    pub fn num_users(&self) -> usize {
        self.users.len()
    }

    /// Whether this instruction has been erased from its block.
    #[inline]
    pub fn is_erased(&self) -> bool {
        self.erased
    }

    #[inline]
    pub fn operand(&self, index: usize) -> Value {
        self.operands[index]
    }
}
