//! Escape analysis over instruction ranges.
//!
//! A value defined at offset `j` of a range *escapes a prefix of length `l`*
//! when `j < l` and some user of the value sits outside that prefix: at an
//! in-range position `>= l`, in another block, or anywhere after the range.
//! An outlined region may have at most one escaping value (it becomes the
//! return value), and when several ranges are outlined into one function,
//! every range must agree on the escape's offset, because the synthesized
//! function returns the value at a single fixed position.
//!
//! Ranges accumulate; `longest_prefix` reflects their intersection. The
//! extension loop in the grouping target speculatively adds ranges and backs
//! out with `remove_last_range`, so the two operations are exactly
//! symmetric.

use rustc_hash::FxHashMap;

use crate::ir::{InstId, Module};

/// Result of [`InstructionEscapeAnalysis::longest_prefix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefix {
    /// Longest prefix length with at most one (offset-consistent) escape.
    pub length: usize,
    /// In-range offset of the escaping instruction, if any range escapes.
    pub offset: Option<usize>,
}

/// Per-range use summary. For each offset `j`: the latest in-range position
/// using `j`'s value, and whether any user lies outside the range.
struct RangeProfile {
    len: usize,
    last_use_in_range: Vec<usize>,
    used_outside: Vec<bool>,
}

impl RangeProfile {
    fn build(module: &Module, range: &[InstId]) -> Self {
        let index_of: FxHashMap<InstId, usize> = range
            .iter()
            .enumerate()
            .map(|(i, &inst)| (inst, i))
            .collect();
        let len = range.len();
        let mut last_use_in_range = vec![0usize; len];
        let mut used_outside = vec![false; len];
        for (j, &inst) in range.iter().enumerate() {
            last_use_in_range[j] = j;
            for &user in module.inst(inst).users() {
                match index_of.get(&user) {
                    Some(&k) => {
                        debug_assert!(k > j, "use-list contains a backwards use");
                        if k > last_use_in_range[j] {
                            last_use_in_range[j] = k;
                        }
                    }
                    None => used_outside[j] = true,
                }
            }
        }
        RangeProfile {
            len,
            last_use_in_range,
            used_outside,
        }
    }

    /// Whether the value defined at `j` escapes the `l`-prefix.
    #[inline]
    fn escapes(&self, j: usize, l: usize) -> bool {
        j < l && (self.used_outside[j] || self.last_use_in_range[j] >= l)
    }

    /// Escape count for the `l`-prefix, plus the offset of the last escape
    /// seen. The offset is only meaningful when the count is exactly one.
    fn escape_profile(&self, l: usize) -> (usize, Option<usize>) {
        let mut count = 0;
        let mut offset = None;
        for j in 0..l {
            if self.escapes(j, l) {
                count += 1;
                offset = Some(j);
            }
        }
        (count, offset)
    }
}

/// Accumulating escape analysis over one or more ranges.
#[derive(Default)]
pub struct InstructionEscapeAnalysis {
    ranges: Vec<RangeProfile>,
}

impl InstructionEscapeAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a range to the accumulation. The range must be nonempty.
    pub fn add_range(&mut self, module: &Module, range: &[InstId]) {
        assert!(!range.is_empty(), "empty range");
        self.ranges.push(RangeProfile::build(module, range));
    }

    /// Back out the most recently added range.
    pub fn remove_last_range(&mut self) {
        self.ranges
            .pop()
            .expect("remove_last_range without a matching add_range");
    }

    /// Longest prefix of the accumulated ranges such that every range has at
    /// most one escaping value and all escapes sit at the same offset. A
    /// range with no escape is compatible with any offset.
    pub fn longest_prefix(&self) -> Prefix {
        assert!(!self.ranges.is_empty(), "longest_prefix with no ranges");
        let min_len = self.ranges.iter().map(|r| r.len).min().unwrap();
        for l in (1..=min_len).rev() {
            let mut common_offset: Option<usize> = None;
            let mut ok = true;
            for range in &self.ranges {
                let (count, offset) = range.escape_profile(l);
                if count > 1 {
                    ok = false;
                    break;
                }
                if let Some(j) = offset {
                    match common_offset {
                        None => common_offset = Some(j),
                        Some(existing) if existing != j => {
                            ok = false;
                            break;
                        }
                        Some(_) => {}
                    }
                }
            }
            if ok {
                return Prefix {
                    length: l,
                    offset: common_offset,
                };
            }
        }
        Prefix {
            length: 0,
            offset: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, Builder, Module, Value};

    /// Straight-line block of `n` adds chained head-to-tail, returning the
    /// instruction ids. Each instruction uses the previous one.
    fn chain(n: usize) -> (Module, Vec<InstId>) {
        let mut m = Module::new();
        let f = m.add_function("f", false);
        let b = m.add_block(f);
        let mut builder = Builder::new(&mut m);
        builder.set_insertion_block(b);
        let one = builder.literal_number(1.0);
        let mut insts = Vec::new();
        let mut prev = one;
        for _ in 0..n {
            let i = builder.create_binary(BinaryOp::Add, prev, one);
            prev = Value::Inst(i);
            insts.push(i);
        }
        (m, insts)
    }

    #[test]
    fn no_outside_uses_full_length_no_offset() {
        // Chained uses are all internal to the full range, and the last
        // value is dead, so nothing escapes the full prefix.
        let (m, insts) = chain(4);
        let mut ea = InstructionEscapeAnalysis::new();
        ea.add_range(&m, &insts);
        assert_eq!(
            ea.longest_prefix(),
            Prefix {
                length: 4,
                offset: None
            }
        );
    }

    #[test]
    fn chain_truncation_keeps_single_escape() {
        // For a prefix of length 3 of a 4-chain, the value at offset 2 is
        // used at offset 3 (outside the prefix): exactly one escape.
        let (m, insts) = chain(4);
        let mut ea = InstructionEscapeAnalysis::new();
        ea.add_range(&m, &insts[..3]);
        // Range of length 3: offset 2's value is used by the 4th add, which
        // is outside the range.
        assert_eq!(
            ea.longest_prefix(),
            Prefix {
                length: 3,
                offset: Some(2)
            }
        );
    }

    #[test]
    fn two_escapes_truncate() {
        // v0 and v1 both used after the range: the longest prefix with at
        // most one escape excludes one of them.
        let mut m = Module::new();
        let f = m.add_function("f", false);
        let b = m.add_block(f);
        let mut builder = Builder::new(&mut m);
        builder.set_insertion_block(b);
        let one = builder.literal_number(1.0);
        let v0 = builder.create_binary(BinaryOp::Add, one, one);
        let v1 = builder.create_binary(BinaryOp::Sub, one, one);
        let v2 = builder.create_binary(BinaryOp::Mul, one, one);
        // Users after the range-of-interest:
        let _u0 = builder.create_binary(BinaryOp::Add, Value::Inst(v0), one);
        let _u1 = builder.create_binary(BinaryOp::Add, Value::Inst(v1), one);
        let range = [v0, v1, v2];
        let mut ea = InstructionEscapeAnalysis::new();
        ea.add_range(&m, &range);
        // l=3: v0 and v1 escape (2) -> reject. l=2: both escape -> reject.
        // l=1: only v0 escapes.
        assert_eq!(
            ea.longest_prefix(),
            Prefix {
                length: 1,
                offset: Some(0)
            }
        );
    }

    #[test]
    fn accumulated_ranges_must_agree_on_offset() {
        // Range A escapes at offset 0, range B at offset 1; the intersection
        // must shrink until the disagreement disappears.
        let mut m = Module::new();
        let f = m.add_function("f", false);
        let b = m.add_block(f);
        let mut builder = Builder::new(&mut m);
        builder.set_insertion_block(b);
        let one = builder.literal_number(1.0);
        // Range A: a0 escapes (used later), a1 dead.
        let a0 = builder.create_binary(BinaryOp::Add, one, one);
        let a1 = builder.create_binary(BinaryOp::Sub, one, one);
        let _ua = builder.create_binary(BinaryOp::Mul, Value::Inst(a0), one);
        // Range B: b0 dead, b1 escapes.
        let b0 = builder.create_binary(BinaryOp::Add, one, one);
        let b1 = builder.create_binary(BinaryOp::Sub, one, one);
        let _ub = builder.create_binary(BinaryOp::Mul, Value::Inst(b1), one);
        let ra = [a0, a1];
        let rb = [b0, b1];
        let mut ea = InstructionEscapeAnalysis::new();
        ea.add_range(&m, &ra);
        assert_eq!(
            ea.longest_prefix(),
            Prefix {
                length: 2,
                offset: Some(0)
            }
        );
        ea.add_range(&m, &rb);
        // l=2: A escapes at 0, B at 1 -> disagree. l=1: A escapes at 0, B
        // has no escape in its 1-prefix (b0 is dead).
        assert_eq!(
            ea.longest_prefix(),
            Prefix {
                length: 1,
                offset: Some(0)
            }
        );
        ea.remove_last_range();
        assert_eq!(
            ea.longest_prefix(),
            Prefix {
                length: 2,
                offset: Some(0)
            }
        );
    }

    #[test]
    fn no_escape_range_is_compatible_with_any_offset() {
        let mut m = Module::new();
        let f = m.add_function("f", false);
        let b = m.add_block(f);
        let mut builder = Builder::new(&mut m);
        builder.set_insertion_block(b);
        let one = builder.literal_number(1.0);
        let a0 = builder.create_binary(BinaryOp::Add, one, one);
        let _ua = builder.create_binary(BinaryOp::Mul, Value::Inst(a0), one);
        let b0 = builder.create_binary(BinaryOp::Add, one, one);
        let ra = [a0];
        let rb = [b0];
        let mut ea = InstructionEscapeAnalysis::new();
        ea.add_range(&m, &ra); // escapes at 0
        ea.add_range(&m, &rb); // no escape
        assert_eq!(
            ea.longest_prefix(),
            Prefix {
                length: 1,
                offset: Some(0)
            }
        );
    }

    #[test]
    #[should_panic(expected = "empty range")]
    fn empty_range_asserts() {
        let m = Module::new();
        let mut ea = InstructionEscapeAnalysis::new();
        ea.add_range(&m, &[]);
    }
}
