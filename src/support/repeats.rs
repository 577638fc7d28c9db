//! Repeated-substring discovery over a token stream.
//!
//! Built on a suffix array plus Kasai LCP computation. Repeats are
//! enumerated as lcp-intervals: maximal suffix-array intervals whose
//! suffixes share a common prefix of a given length. The lcp-interval tree
//! is exactly the internal-node set of the suffix tree, so every repeated
//! substring that branches (occurs with at least two distinct
//! continuations) is reported exactly once, with all of its occurrences.
//!
//! Output is deterministic for a given input: longest repeats first, ties
//! broken by leftmost first occurrence.

/// A substring of the token stream occurring at two or more positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatedSubstring {
    /// Length of the repeated substring, in tokens.
    pub length: usize,
    /// All start positions, sorted ascending. Always at least two.
    pub start_indices: Vec<usize>,
}

/// Find every branching repeated substring of `tokens` with length at least
/// `min_length`.
pub fn find_repeated_substrings(tokens: &[u32], min_length: usize) -> Vec<RepeatedSubstring> {
    assert!(min_length > 0, "min_length must be positive");
    let n = tokens.len();
    if n < 2 {
        return Vec::new();
    }

    let sa = suffix_array(tokens);
    let lcp = lcp_array(tokens, &sa);

    // Bottom-up lcp-interval enumeration. The stack holds (lcp, left
    // boundary) pairs of intervals still open at the current position.
    let mut out: Vec<RepeatedSubstring> = Vec::new();
    let mut emit = |length: usize, sa_slice: &[usize]| {
        if length < min_length {
            return;
        }
        let mut starts = sa_slice.to_vec();
        starts.sort_unstable();
        out.push(RepeatedSubstring {
            length,
            start_indices: starts,
        });
    };

    let mut stack: Vec<(usize, usize)> = vec![(0, 0)];
    for i in 1..n {
        let mut lb = i - 1;
        while stack.last().unwrap().0 > lcp[i] {
            let (interval_lcp, left) = stack.pop().unwrap();
            emit(interval_lcp, &sa[left..i]);
            lb = left;
        }
        if stack.last().unwrap().0 < lcp[i] {
            stack.push((lcp[i], lb));
        }
    }
    while let Some((interval_lcp, left)) = stack.pop() {
        emit(interval_lcp, &sa[left..n]);
    }

    out.sort_by(|a, b| {
        b.length
            .cmp(&a.length)
            .then(a.start_indices[0].cmp(&b.start_indices[0]))
    });
    out
}

/// Suffix array by comparison sort. Token streams here are per-round module
/// linearizations, small enough that the simple construction wins on
/// clarity.
fn suffix_array(tokens: &[u32]) -> Vec<usize> {
    let mut sa: Vec<usize> = (0..tokens.len()).collect();
    sa.sort_unstable_by(|&a, &b| tokens[a..].cmp(&tokens[b..]));
    sa
}

/// Kasai's LCP construction: `lcp[i]` is the longest common prefix of the
/// suffixes at `sa[i - 1]` and `sa[i]`; `lcp[0]` is 0.
fn lcp_array(tokens: &[u32], sa: &[usize]) -> Vec<usize> {
    let n = tokens.len();
    let mut rank = vec![0usize; n];
    for (i, &s) in sa.iter().enumerate() {
        rank[s] = i;
    }
    let mut lcp = vec![0usize; n];
    let mut h = 0usize;
    for i in 0..n {
        if rank[i] == 0 {
            h = 0;
            continue;
        }
        let j = sa[rank[i] - 1];
        while i + h < n && j + h < n && tokens[i + h] == tokens[j + h] {
            h += 1;
        }
        lcp[rank[i]] = h;
        h = h.saturating_sub(1);
    }
    lcp
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn finds_three_way_repeat_with_separators() {
        // "abc X abc Y abc" over u32 tokens.
        let tokens = [1, 2, 3, 9, 1, 2, 3, 8, 1, 2, 3];
        let repeats = find_repeated_substrings(&tokens, 2);
        assert!(repeats.contains(&RepeatedSubstring {
            length: 3,
            start_indices: vec![0, 4, 8],
        }));
        assert!(repeats.contains(&RepeatedSubstring {
            length: 2,
            start_indices: vec![1, 5, 9],
        }));
        // Nothing of length 1 with min_length = 2.
        assert!(repeats.iter().all(|r| r.length >= 2));
    }

    #[test]
    fn tandem_repeats_report_overlapping_occurrences() {
        let tokens = [7, 7, 7, 7];
        let repeats = find_repeated_substrings(&tokens, 1);
        assert!(repeats.contains(&RepeatedSubstring {
            length: 3,
            start_indices: vec![0, 1],
        }));
        assert!(repeats.contains(&RepeatedSubstring {
            length: 2,
            start_indices: vec![0, 1, 2],
        }));
        assert!(repeats.contains(&RepeatedSubstring {
            length: 1,
            start_indices: vec![0, 1, 2, 3],
        }));
    }

    #[test]
    fn unique_tokens_have_no_repeats() {
        let tokens = [5, 4, 3, 2, 1];
        assert!(find_repeated_substrings(&tokens, 1).is_empty());
    }

    #[test]
    fn output_is_longest_first() {
        let tokens = [1, 2, 3, 9, 1, 2, 3, 8, 2, 3];
        let repeats = find_repeated_substrings(&tokens, 1);
        for w in repeats.windows(2) {
            assert!(w[0].length >= w[1].length);
        }
    }

    fn naive_lcp(tokens: &[u32], i: usize, j: usize) -> usize {
        let mut l = 0;
        while i + l < tokens.len() && j + l < tokens.len() && tokens[i + l] == tokens[j + l] {
            l += 1;
        }
        l
    }

    proptest! {
        #[test]
        fn every_reported_repeat_actually_repeats(
            tokens in proptest::collection::vec(0u32..4, 0..60),
            min_length in 1usize..4,
        ) {
            let repeats = find_repeated_substrings(&tokens, min_length);
            for r in &repeats {
                prop_assert!(r.length >= min_length);
                prop_assert!(r.start_indices.len() >= 2);
                prop_assert!(r.start_indices.windows(2).all(|w| w[0] < w[1]));
                let first = r.start_indices[0];
                prop_assert!(first + r.length <= tokens.len());
                let expected = &tokens[first..first + r.length];
                for &s in &r.start_indices[1..] {
                    prop_assert!(s + r.length <= tokens.len());
                    prop_assert_eq!(&tokens[s..s + r.length], expected);
                }
            }
        }

        #[test]
        fn every_matching_pair_is_covered(
            tokens in proptest::collection::vec(0u32..3, 0..40),
            min_length in 1usize..4,
        ) {
            // Any two positions sharing a prefix of at least min_length must
            // appear together in some reported repeat.
            let repeats = find_repeated_substrings(&tokens, min_length);
            for i in 0..tokens.len() {
                for j in (i + 1)..tokens.len() {
                    if naive_lcp(&tokens, i, j) >= min_length {
                        let covered = repeats.iter().any(|r| {
                            r.start_indices.contains(&i) && r.start_indices.contains(&j)
                        });
                        prop_assert!(covered, "pair ({}, {}) not covered", i, j);
                    }
                }
            }
        }
    }
}
