//! Function synthesis and call-site rewriting.
//!
//! Synthesis clones the prototype candidate (the first live one) into a
//! fresh single-block function, promoting External operands to parameters
//! `p0..pN-1` in first-use order, appending the receiver parameter `this`,
//! and returning either the escaping value or `undefined`. Rewriting
//! replaces each surviving candidate with a direct call, splices the call's
//! result into the escaping value's uses, and erases the original
//! instructions in reverse order so every erased instruction has zero
//! remaining uses at the moment of erasure.

use crate::analysis::{
    ExprOperand, Expression, InstructionEscapeAnalysis, InstructionNumbering, NumberingFlags,
};
use crate::ir::{Builder, FuncId, InstId, Module, Value};
use crate::support::{Candidate, OutlinedFunction};

use super::OutliningSettings;

const NUMBERING_FLAGS: NumberingFlags = NumberingFlags::INSTRUCTIONS_AND_PARAMETERS;

/// Base name for synthesized functions; uniquified per module.
pub(crate) const FUNCTION_NAME: &str = "OUTLINED_FUNCTION";

/// Name of an outlined function's n-th parameter.
fn parameter_name(n: u32) -> String {
    assert!(n <= 999, "too many parameters");
    format!("p{}", n)
}

/// Map one expression operand to a value in the function being built.
fn build_outlined_operand(
    builder: &mut Builder,
    function: FuncId,
    operand: ExprOperand,
    cloned: &[InstId],
) -> Value {
    match operand {
        // Internal operand: the corresponding cloned instruction.
        ExprOperand::Internal(index) => {
            assert!((index as usize) < cloned.len(), "use before definition");
            Value::Inst(cloned[index as usize])
        }
        // External operand: the matching parameter, created on first use.
        // Externals are numbered densely, so an index can exceed the
        // current parameter count by at most zero.
        ExprOperand::External(index) => {
            let param_count = builder.module().func(function).params.len();
            if index as usize >= param_count {
                assert!(
                    index as usize == param_count,
                    "external index skipped a number"
                );
                builder.create_parameter(function, parameter_name(index));
            }
            Value::Param(function, index)
        }
        // Value operand: carried verbatim.
        ExprOperand::Value(value) => value,
    }
}

/// Build the shared function for `descriptor` by cloning its prototype
/// candidate.
pub(crate) fn build_outlined_function(
    module: &mut Module,
    descriptor: &OutlinedFunction,
    instructions: &[InstId],
    settings: &OutliningSettings,
) -> FuncId {
    let prototype = descriptor
        .candidates
        .iter()
        .find(|c| !c.deleted)
        .expect("descriptor has no live candidate");
    let range = &instructions[prototype.start_idx..=prototype.end_idx()];

    // Re-verify that exactly the candidate's length survives escape
    // analysis; a shorter prefix here means the grouping stage was wrong.
    let mut escape = InstructionEscapeAnalysis::new();
    escape.add_range(module, range);
    let prefix = escape.longest_prefix();
    assert!(
        prefix.length == prototype.length,
        "candidate has more than one escaping value"
    );

    let caller = module.block_function(module.inst(range[0]).block());
    let strict = module.func(caller).strict;
    let name = module.derive_unique_name(FUNCTION_NAME);
    let insert_before = if settings.place_near_caller {
        Some(caller)
    } else {
        None
    };

    let expressions: Vec<Expression> =
        InstructionNumbering::new(module, range, NUMBERING_FLAGS).collect();

    let mut builder = Builder::new(module);
    let function = builder.create_function(name, strict, insert_before);
    let block = builder.create_basic_block(function);
    builder.set_insertion_block(block);

    let mut cloned: Vec<InstId> = Vec::with_capacity(expressions.len());
    for expr in &expressions {
        let mut new_operands = Vec::with_capacity(expr.operands.len());
        for &operand in &expr.operands {
            new_operands.push(build_outlined_operand(&mut builder, function, operand, &cloned));
        }
        cloned.push(builder.clone_inst(expr.inst, new_operands));
    }

    // Receiver parameter, after the value parameters.
    builder.create_parameter(function, "this");

    let return_value = match prefix.offset {
        Some(offset) => Value::Inst(cloned[offset]),
        None => builder.literal_undefined(),
    };
    builder.create_ret(return_value);

    function
}

/// Try to replace `candidate` with a call to `function`.
///
/// Returns false without touching the IR when the candidate's enclosing
/// function disagrees with `function` on strict mode.
pub(crate) fn outline_candidate(
    module: &mut Module,
    candidate: &Candidate,
    function: FuncId,
    instructions: &[InstId],
) -> bool {
    let range = &instructions[candidate.start_idx..=candidate.end_idx()];

    let caller = module.block_function(module.inst(range[0]).block());
    if module.func(caller).strict != module.func(function).strict {
        return false;
    }

    let mut escape = InstructionEscapeAnalysis::new();
    escape.add_range(module, range);
    let prefix = escape.longest_prefix();
    assert!(
        prefix.length == candidate.length,
        "candidate has more than one escaping value"
    );

    // Collect call arguments in External first-use order, and locate the
    // instruction whose uses the call result will absorb. Expression
    // operands are positionally 1:1 with instruction operands, so the
    // enumerate index addresses the concrete operand directly.
    let mut arguments: Vec<Value> = Vec::new();
    let mut escape_inst: Option<InstId> = None;
    for (expr_index, expr) in
        InstructionNumbering::new(module, range, NUMBERING_FLAGS).enumerate()
    {
        for (op_index, operand) in expr.operands.iter().enumerate() {
            if let ExprOperand::External(external) = operand {
                if *external as usize >= arguments.len() {
                    assert!(
                        *external as usize == arguments.len(),
                        "external index skipped a number"
                    );
                    arguments.push(module.inst(expr.inst).operand(op_index));
                }
            }
        }
        if prefix.offset == Some(expr_index) {
            escape_inst = Some(expr.inst);
        }
    }
    debug_assert_eq!(escape_inst.is_some(), prefix.offset.is_some());

    // Insert the call before the first instruction of the range.
    let mut builder = Builder::new(module);
    builder.set_insertion_point(range[0]);
    let undefined = builder.literal_undefined();
    let call = builder.create_direct_call(function, undefined, &arguments);

    if let Some(inst) = escape_inst {
        module.replace_all_uses_with(inst, Value::Inst(call));
    }

    // Erase in reverse order so every use of an in-range instruction is
    // gone before the instruction itself; erase_instruction asserts the
    // zero-user invariant.
    for &inst in range.iter().rev() {
        module.erase_instruction(inst);
    }

    true
}
