//! Candidate grouping: turning raw repeated-token groups into
//! outlined-function descriptors.
//!
//! The repeat finder guarantees only token equality, which is weaker than
//! outlinability. Each raw group is refined by a greedy prefix-peeling
//! loop: take the first two occurrences, find their longest structurally
//! equal prefix (lockstep instruction numbering), shorten it until at most
//! one value escapes, check the parameter-count window, then try to extend
//! the resulting descriptor with every remaining occurrence. What is left
//! of the window after a peel is processed the same way.

use super::OutliningSettings;
use crate::analysis::{
    ExprOperand, Expression, InstructionEscapeAnalysis, InstructionNumbering, NumberingFlags,
};
use crate::ir::{InstId, Module};
use crate::support::{Candidate, OutlinedFunction, OutlinerTarget};

const NUMBERING_FLAGS: NumberingFlags = NumberingFlags::INSTRUCTIONS_AND_PARAMETERS;

/// The IR-specific outliner target: candidate selection and the cost model.
pub struct IrOutlinerTarget<'a> {
    settings: &'a OutliningSettings,
    module: &'a Module,
    /// Instructions corresponding to elements of the token stream.
    instructions: &'a [InstId],
}

impl<'a> IrOutlinerTarget<'a> {
    pub fn new(
        settings: &'a OutliningSettings,
        module: &'a Module,
        instructions: &'a [InstId],
    ) -> Self {
        IrOutlinerTarget {
            settings,
            module,
            instructions,
        }
    }

    /// The instruction range for a token-stream substring.
    fn range(&self, start_idx: usize, len: usize) -> &'a [InstId] {
        assert!(len > 0, "empty range");
        &self.instructions[start_idx..start_idx + len]
    }

    /// Longest outlinable common prefix of the ranges starting at `start0`
    /// and `start1`: structurally equal under lockstep numbering, then
    /// shortened until at most one value escapes. Returns the prefix
    /// expressions (possibly empty). On return, `escape` holds both ranges
    /// at their pre-truncation common length, ready for extension checks.
    fn outlinable_common_prefix(
        &self,
        escape: &mut InstructionEscapeAnalysis,
        start0: usize,
        start1: usize,
        length: usize,
    ) -> Vec<Expression> {
        let numbering0 =
            InstructionNumbering::new(self.module, self.range(start0, length), NUMBERING_FLAGS);
        let numbering1 =
            InstructionNumbering::new(self.module, self.range(start1, length), NUMBERING_FLAGS);
        let mut expressions: Vec<Expression> = numbering0
            .zip(numbering1)
            .take_while(|(a, b)| a == b)
            .map(|(a, _)| a)
            .collect();

        let common_len = expressions.len();
        if common_len > 0 {
            escape.add_range(self.module, self.range(start0, common_len));
            escape.add_range(self.module, self.range(start1, common_len));
            expressions.truncate(escape.longest_prefix().length);
        }
        expressions
    }

    /// Whether the range at `start_idx` matches the chosen prefix: same
    /// expression stream, and adding it to the escape accumulation keeps the
    /// full prefix length. On rejection the escape analysis is restored, so
    /// subsequent extension checks see clean state.
    fn matches_common_prefix(
        &self,
        expressions: &[Expression],
        escape: &mut InstructionEscapeAnalysis,
        start_idx: usize,
    ) -> bool {
        let length = expressions.len();
        let range = self.range(start_idx, length);
        let numbering = InstructionNumbering::new(self.module, range, NUMBERING_FLAGS);
        if expressions.iter().zip(numbering).all(|(a, b)| *a == b) {
            escape.add_range(self.module, range);
            if escape.longest_prefix().length == length {
                return true;
            }
            escape.remove_last_range();
        }
        false
    }
}

/// Number of distinct External operands in `expressions`. Externals are
/// numbered densely from 0, so the count is the highest index plus one.
fn distinct_external_operand_count(expressions: &[Expression]) -> usize {
    let mut count = 0usize;
    for expr in expressions {
        for operand in &expr.operands {
            if let ExprOperand::External(index) = operand {
                count = count.max(*index as usize + 1);
            }
        }
    }
    count
}

impl OutlinerTarget for IrOutlinerTarget<'_> {
    fn min_candidate_length(&self) -> usize {
        self.settings.min_length
    }

    fn create_outlined_functions(
        &mut self,
        out: &mut Vec<OutlinedFunction>,
        start_indices: &[usize],
        candidate_length: usize,
    ) {
        assert!(start_indices.len() >= 2, "too few candidates in group");
        assert!(
            candidate_length >= self.settings.min_length,
            "candidate group shorter than the minimum length"
        );
        let max_offset = candidate_length - self.settings.min_length;

        let mut offset = 0usize;
        while offset <= max_offset {
            let mut escape = InstructionEscapeAnalysis::new();
            let index0 = start_indices[0] + offset;
            let index1 = start_indices[1] + offset;
            let remaining = candidate_length - offset;
            let expressions =
                self.outlinable_common_prefix(&mut escape, index0, index1, remaining);
            let common_len = expressions.len();

            if common_len < self.settings.min_length {
                // Too short to outline here; skip one token and retry.
                offset += 1;
                continue;
            }

            let parameters = distinct_external_operand_count(&expressions);
            if parameters < self.settings.min_parameters
                || parameters > self.settings.max_parameters
            {
                offset += common_len + 1;
                continue;
            }

            // Rough cost model: call and frame overheads are linear in the
            // parameter count.
            let call_overhead = 2 + parameters;
            let frame_overhead = 5 + parameters;
            let mut candidates = vec![
                Candidate::new(index0, common_len, call_overhead),
                Candidate::new(index1, common_len, call_overhead),
            ];

            // Try to include the occurrences beyond the first two.
            for &start in &start_indices[2..] {
                let start_idx = start + offset;
                if self.matches_common_prefix(&expressions, &mut escape, start_idx) {
                    candidates.push(Candidate::new(start_idx, common_len, call_overhead));
                }
            }

            out.push(OutlinedFunction::new(candidates, common_len, frame_overhead));
            // Peel off the accepted prefix plus the position that diverged.
            offset += common_len + 1;
        }
    }
}
