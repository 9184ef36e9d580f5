//! Longest increasing subsequence.

/// Positions in `seq` forming a longest strictly increasing subsequence.
///
/// Zeros mark "no value" and never take part. The result is sorted by
/// position. Runs in `O(n log n)`.
pub fn longest_increasing_subsequence(seq: &[usize]) -> Vec<usize> {
    // tails[k] = position of the smallest tail of an increasing run of length k + 1
    let mut tails: Vec<usize> = Vec::with_capacity(seq.len());
    let mut predecessors: Vec<Option<usize>> = vec![None; seq.len()];

    for (i, &value) in seq.iter().enumerate() {
        if value == 0 {
            continue;
        }
        let len = tails.partition_point(|&t| seq[t] < value);
        if len > 0 {
            predecessors[i] = Some(tails[len - 1]);
        }
        if len == tails.len() {
            tails.push(i);
        } else {
            tails[len] = i;
        }
    }

    let mut result = vec![0; tails.len()];
    let mut cursor = tails.last().copied();
    for slot in result.iter_mut().rev() {
        let Some(i) = cursor else { break };
        *slot = i;
        cursor = predecessors[i];
    }
    result
}
