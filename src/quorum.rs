/*!
Per-source vote accounting.

Accumulators are keyed by source, so a later message from the same node
*overwrites* its earlier one: a node equivocating within a single message
type casts at most one counted vote. Both queries are monotone in the map;
adding a fresh source can only grow a value's support.
*/

use std::collections::BTreeMap;

use crate::peer::NodeId;

/// The number of sources currently voting for `value`.
pub fn support(votes: &BTreeMap<NodeId, i64>, value: i64) -> usize {
    votes.values().filter(|&&v| v == value).count()
}

/// The smallest value whose support reaches `threshold`, if any.
pub fn reaching(votes: &BTreeMap<NodeId, i64>, threshold: usize) -> Option<i64> {
    let mut counts = BTreeMap::new();
    for &value in votes.values() {
        *counts.entry(value).or_insert(0usize) += 1;
    }
    counts
        .into_iter()
        .find(|&(_, count)| count >= threshold)
        .map(|(value, _)| value)
}
