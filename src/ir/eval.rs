//! Reference interpreter for straight-line IR.
//!
//! Evaluates single-block functions built from movs, unary/binary numeric
//! operators, direct calls, and returns. This is deliberately tiny: it
//! exists so transformation tests can execute a function before and after a
//! rewrite and compare observable results, not to model the full language.

use rustc_hash::FxHashMap;

use super::instruction::{BinaryOp, FuncId, InstId, Opcode, UnaryOp, Value};
use super::module::{LiteralValue, Module};

/// A runtime value. Only what the test modules produce.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JsValue {
    Undefined,
    Bool(bool),
    Number(f64),
}

impl JsValue {
    fn as_number(self) -> f64 {
        match self {
            JsValue::Number(n) => n,
            JsValue::Bool(true) => 1.0,
            JsValue::Bool(false) => 0.0,
            JsValue::Undefined => f64::NAN,
        }
    }
}

/// Call `func` with `args`, returning what its `Ret` produces.
///
/// Panics on constructs outside the supported subset (control flow, stack
/// slots, property access); test modules stay within it.
pub fn call_function(module: &Module, func: FuncId, args: &[JsValue]) -> JsValue {
    let function = module.func(func);
    assert_eq!(
        function.blocks.len(),
        1,
        "interpreter supports single-block functions only"
    );
    let block = function.blocks[0];
    let mut env: FxHashMap<InstId, JsValue> = FxHashMap::default();

    let operand = |env: &FxHashMap<InstId, JsValue>, value: Value| -> JsValue {
        match value {
            Value::Inst(id) => *env.get(&id).expect("use of unevaluated instruction"),
            Value::Literal(lit) => match module.literal(lit) {
                LiteralValue::Undefined => JsValue::Undefined,
                LiteralValue::Null => JsValue::Undefined,
                LiteralValue::Bool(b) => JsValue::Bool(*b),
                LiteralValue::Number(bits) => JsValue::Number(f64::from_bits(*bits)),
                LiteralValue::Str(_) => panic!("string values are not supported"),
            },
            Value::Param(f, index) => {
                assert_eq!(f, func, "parameter of a different function");
                args.get(index as usize).copied().unwrap_or(JsValue::Undefined)
            }
            Value::Var(_) | Value::Func(_) => panic!("unsupported operand kind"),
        }
    };

    for &inst in &module.block(block).insts {
        let data = module.inst(inst);
        let result = match data.opcode {
            Opcode::Mov => operand(&env, data.operands[0]),
            Opcode::Unary(op) => {
                let v = operand(&env, data.operands[0]);
                match op {
                    UnaryOp::Minus => JsValue::Number(-v.as_number()),
                    UnaryOp::Not => JsValue::Bool(v.as_number() == 0.0),
                    UnaryOp::BitNot => JsValue::Number(!(v.as_number() as i64) as f64),
                    UnaryOp::Void => JsValue::Undefined,
                    UnaryOp::TypeOf => panic!("typeof is not supported"),
                }
            }
            Opcode::Binary(op) => {
                let l = operand(&env, data.operands[0]).as_number();
                let r = operand(&env, data.operands[1]).as_number();
                match op {
                    BinaryOp::Add => JsValue::Number(l + r),
                    BinaryOp::Sub => JsValue::Number(l - r),
                    BinaryOp::Mul => JsValue::Number(l * r),
                    BinaryOp::Div => JsValue::Number(l / r),
                    BinaryOp::Mod => JsValue::Number(l % r),
                    BinaryOp::BitAnd => JsValue::Number(((l as i64) & (r as i64)) as f64),
                    BinaryOp::BitOr => JsValue::Number(((l as i64) | (r as i64)) as f64),
                    BinaryOp::BitXor => JsValue::Number(((l as i64) ^ (r as i64)) as f64),
                    BinaryOp::Shl => JsValue::Number(((l as i64) << (r as i64 & 63)) as f64),
                    BinaryOp::Shr => JsValue::Number(((l as i64) >> (r as i64 & 63)) as f64),
                    BinaryOp::UShr => {
                        JsValue::Number(((l as u64) >> (r as i64 & 63)) as f64)
                    }
                    BinaryOp::Lt => JsValue::Bool(l < r),
                    BinaryOp::Le => JsValue::Bool(l <= r),
                    BinaryOp::Gt => JsValue::Bool(l > r),
                    BinaryOp::Ge => JsValue::Bool(l >= r),
                    BinaryOp::Eq | BinaryOp::StrictEq => JsValue::Bool(l == r),
                    BinaryOp::Ne | BinaryOp::StrictNe => JsValue::Bool(l != r),
                    BinaryOp::In | BinaryOp::InstanceOf => {
                        panic!("object operators are not supported")
                    }
                }
            }
            Opcode::CallDirect => {
                let callee = match data.operands[0] {
                    Value::Func(f) => f,
                    _ => panic!("direct call without a function callee"),
                };
                let call_args: Vec<JsValue> = data.operands[2..]
                    .iter()
                    .map(|&v| operand(&env, v))
                    .collect();
                call_function(module, callee, &call_args)
            }
            Opcode::Ret => return operand(&env, data.operands[0]),
            other => panic!("unsupported opcode {:?}", other),
        };
        env.insert(inst, result);
    }
    JsValue::Undefined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Builder;

    #[test]
    fn evaluates_arithmetic_and_calls() {
        let mut m = Module::new();
        // callee(p0) = p0 * 3
        let callee = m.add_function("triple", false);
        let cb = m.add_block(callee);
        let mut builder = Builder::new(&mut m);
        let p0 = builder.create_parameter(callee, "p0");
        builder.set_insertion_block(cb);
        let three = builder.literal_number(3.0);
        let mul = builder.create_binary(BinaryOp::Mul, p0, three);
        builder.create_ret(Value::Inst(mul));
        // caller() = triple(7) + 1
        let caller = m.add_function("caller", false);
        let b = m.add_block(caller);
        let mut builder = Builder::new(&mut m);
        builder.set_insertion_block(b);
        let undef = builder.literal_undefined();
        let seven = builder.literal_number(7.0);
        let call = builder.create_direct_call(callee, undef, &[seven]);
        let one = builder.literal_number(1.0);
        let sum = builder.create_binary(BinaryOp::Add, Value::Inst(call), one);
        builder.create_ret(Value::Inst(sum));

        assert_eq!(call_function(&m, caller, &[]), JsValue::Number(22.0));
    }
}
