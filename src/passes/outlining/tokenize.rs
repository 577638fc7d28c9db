//! Module linearization for the repeat finder.
//!
//! Each legal instruction maps to a stable legal token, interned by
//! [`InstructionKey`] so that shape-equal instructions share a token. Legal
//! tokens count up from 0. Instructions that are illegal to outline act as
//! separators: each emitted separator gets a fresh token counting down from
//! `u32::MAX - 2`, so no separator ever matches anything, and runs of
//! illegal instructions collapse into a single separator. Blocks smaller
//! than `min_length` are not worth scanning and are skipped entirely.

use rustc_hash::FxHashMap;

use super::key::InstructionKey;
use super::OutliningSettings;
use crate::ir::{InstId, Module, Opcode, Value};

/// Reserved by downstream hash structures as the empty key; never emitted.
pub const EMPTY_TOKEN: u32 = u32::MAX;
/// Reserved by downstream hash structures as the tombstone key; never
/// emitted.
pub const TOMBSTONE_TOKEN: u32 = u32::MAX - 1;
/// Highest separator token; separators count downward from here.
const FIRST_ILLEGAL_TOKEN: u32 = u32::MAX - 2;

/// Parallel arrays: `tokens[i]` is the token of `insts[i]`. Separator
/// positions carry the illegal instruction for boundary bookkeeping; they
/// can never start a candidate because their tokens are unique.
pub struct TokenStream {
    pub tokens: Vec<u32>,
    pub insts: Vec<InstId>,
}

/// True if `inst` is safe to move into an outlined function: not a phi,
/// terminator, arguments object creation, or stack-slot operation, and no
/// operand is a captured variable.
pub fn instruction_is_legal_to_outline(module: &Module, inst: InstId) -> bool {
    let data = module.inst(inst);
    if matches!(
        data.opcode,
        Opcode::Phi
            | Opcode::Ret
            | Opcode::Branch
            | Opcode::CondBranch
            | Opcode::CreateArguments
            | Opcode::AllocStack
            | Opcode::LoadStack
            | Opcode::StoreStack
    ) {
        return false;
    }
    !data.operands.iter().any(|op| matches!(op, Value::Var(_)))
}

/// Linearize `module` into a token stream suitable for the repeat finder.
/// Iteration order is module declaration order throughout and is
/// observable: it determines token assignment and therefore every
/// downstream outlining decision.
pub fn tokenize(module: &Module, settings: &OutliningSettings) -> TokenStream {
    let mut tokens: Vec<u32> = Vec::new();
    let mut insts: Vec<InstId> = Vec::new();

    let mut map: FxHashMap<InstructionKey, u32> = FxHashMap::default();
    let mut next_legal: u32 = 0;
    let mut next_illegal: u32 = FIRST_ILLEGAL_TOKEN;
    // Starts true so a separator never leads off the stream.
    let mut last_was_illegal = true;

    for &func in &module.functions {
        for &block in &module.func(func).blocks {
            if module.block(block).size() < settings.min_length {
                continue;
            }
            for &inst in &module.block(block).insts {
                assert!(
                    next_legal < next_illegal,
                    "legal and illegal token ranges collided"
                );
                if instruction_is_legal_to_outline(module, inst) {
                    let key = InstructionKey::of(module.inst(inst));
                    let token = *map.entry(key).or_insert_with(|| {
                        let t = next_legal;
                        next_legal += 1;
                        t
                    });
                    tokens.push(token);
                    insts.push(inst);
                    last_was_illegal = false;
                } else if !last_was_illegal {
                    tokens.push(next_illegal);
                    insts.push(inst);
                    next_illegal -= 1;
                    last_was_illegal = true;
                }
            }
        }
    }

    assert_eq!(
        tokens.len(),
        insts.len(),
        "token and instruction arrays diverged"
    );
    TokenStream { tokens, insts }
}
