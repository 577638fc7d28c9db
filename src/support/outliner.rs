//! Generic outliner driver: candidate and descriptor types, the cost model,
//! the target interface, and overlap pruning.
//!
//! The driver is IR-agnostic: it sees only the token stream and a
//! [`OutlinerTarget`] that knows how to turn raw repeated-token groups into
//! outlined-function descriptors. Candidate windows accepted for outlining
//! must be pairwise disjoint in the token stream; the pruning step enforces
//! that by visiting descriptors in decreasing-benefit order and deleting
//! candidates whose windows are already claimed.

use super::repeats::find_repeated_substrings;

/// One occurrence of an outlinable sequence in the token stream.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub start_idx: usize,
    pub length: usize,
    /// Per-call-site cost of calling the outlined function, in instructions.
    pub call_overhead: usize,
    /// Set by overlap pruning; deleted candidates are never rewritten.
    pub deleted: bool,
}

impl Candidate {
    pub fn new(start_idx: usize, length: usize, call_overhead: usize) -> Self {
        Candidate {
            start_idx,
            length,
            call_overhead,
            deleted: false,
        }
    }

    /// Index of the last token of this candidate (inclusive).
    #[inline]
    pub fn end_idx(&self) -> usize {
        self.start_idx + self.length - 1
    }
}

/// A group of candidates that can share one outlined function.
#[derive(Debug, Clone)]
pub struct OutlinedFunction {
    /// Prototype first: the first live candidate is the cloning source.
    pub candidates: Vec<Candidate>,
    /// Length of the outlined sequence, in instructions.
    pub sequence_size: usize,
    /// One-time cost of the outlined function's frame, in instructions.
    pub frame_overhead: usize,
}

impl OutlinedFunction {
    pub fn new(candidates: Vec<Candidate>, sequence_size: usize, frame_overhead: usize) -> Self {
        OutlinedFunction {
            candidates,
            sequence_size,
            frame_overhead,
        }
    }

    /// Number of candidates not deleted by pruning.
    pub fn alive_count(&self) -> usize {
        self.candidates.iter().filter(|c| !c.deleted).count()
    }

    /// Instructions saved by outlining the live candidates:
    /// `sequence_size * (alive - 1) - frame_overhead - sum(call_overhead)`.
    /// Non-positive when fewer than two candidates are alive.
    pub fn benefit(&self) -> i64 {
        let alive: Vec<&Candidate> = self.candidates.iter().filter(|c| !c.deleted).collect();
        let call_total: i64 = alive.iter().map(|c| c.call_overhead as i64).sum();
        self.sequence_size as i64 * (alive.len() as i64 - 1)
            - self.frame_overhead as i64
            - call_total
    }
}

/// The IR-specific half of the outliner: supplies the minimum interesting
/// repeat length and converts raw repeated-token groups into descriptors.
pub trait OutlinerTarget {
    fn min_candidate_length(&self) -> usize;

    /// Turn one raw candidate group (start indices of a repeated token
    /// substring of `candidate_length` tokens) into zero or more
    /// descriptors, appended to `out`.
    fn create_outlined_functions(
        &mut self,
        out: &mut Vec<OutlinedFunction>,
        start_indices: &[usize],
        candidate_length: usize,
    );
}

/// Run the repeat finder over `tokens`, hand every raw group to `target`,
/// and prune overlapping candidates from the resulting descriptors.
pub fn get_functions_to_outline(
    out: &mut Vec<OutlinedFunction>,
    tokens: &[u32],
    target: &mut dyn OutlinerTarget,
) {
    let min_length = target.min_candidate_length();
    for repeat in find_repeated_substrings(tokens, min_length) {
        target.create_outlined_functions(out, &repeat.start_indices, repeat.length);
    }
    prune_overlapping_candidates(out, tokens.len());
}

/// Enforce disjointness of accepted candidate windows. Descriptors are
/// visited in decreasing-benefit order (stable on ties); each claims the
/// windows of its surviving candidates. A descriptor left with fewer than
/// two live candidates is abandoned entirely and releases its claims.
fn prune_overlapping_candidates(functions: &mut [OutlinedFunction], stream_len: usize) {
    let mut order: Vec<usize> = (0..functions.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(functions[i].benefit()));

    let mut claimed = vec![false; stream_len];
    for &fi in &order {
        let func = &mut functions[fi];
        let mut tentative: Vec<usize> = Vec::new();
        let mut survivors: Vec<usize> = Vec::new();
        for (ci, cand) in func.candidates.iter().enumerate() {
            if cand.deleted {
                continue;
            }
            let window = cand.start_idx..cand.start_idx + cand.length;
            if window.clone().all(|t| !claimed[t]) {
                for t in window {
                    claimed[t] = true;
                    tentative.push(t);
                }
                survivors.push(ci);
            }
        }
        if survivors.len() < 2 {
            for t in tentative {
                claimed[t] = false;
            }
            for cand in &mut func.candidates {
                cand.deleted = true;
            }
        } else {
            for (ci, cand) in func.candidates.iter_mut().enumerate() {
                if !survivors.contains(&ci) {
                    cand.deleted = true;
                }
            }
        }
    }
}
