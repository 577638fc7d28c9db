//! Per-range analyses consumed by the outliner: canonical instruction
//! numbering and escape analysis.

pub mod escape;
pub mod numbering;

pub use escape::{InstructionEscapeAnalysis, Prefix};
pub use numbering::{ExprOperand, Expression, InstructionNumbering, NumberingFlags};
