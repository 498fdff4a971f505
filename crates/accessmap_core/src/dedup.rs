//! Duplicate-cluster resolution.
//!
//! # Responsibility
//! - Pick one canonical tag out of a group of mutual duplicates.
//! - Reduce a whole collection so no duplicate pair remains.
//!
//! # Invariants
//! - Higher confidence wins when both tags carry one; otherwise the more
//!   recent timestamp wins; exact ties keep the earlier tag.
//! - The winner is kept wholesale; losing records contribute nothing.
//! - `deduplicate_tags` is idempotent and never places one tag in two
//!   clusters.

use crate::model::tag::Tag;
use crate::validation::is_duplicate;
use std::cmp::Ordering;

/// Selects the canonical tag of a duplicate group.
///
/// Returns `None` only for an empty group.
pub fn merge_duplicate_tags(group: &[Tag]) -> Option<Tag> {
    let mut iter = group.iter();
    let first = iter.next()?;
    let winner = iter.fold(first, |best, candidate| {
        if ranks_above(candidate, best) {
            candidate
        } else {
            best
        }
    });
    Some(winner.clone())
}

/// Collapses duplicate clusters of `tags` into their canonical tags.
///
/// Clusters are built greedily: the first unassigned tag seeds a cluster and
/// claims every later unassigned tag that duplicates it. Because the
/// duplicate predicate is not transitive, a winner may still sit within the
/// threshold of another cluster's winner; the pass is therefore repeated
/// until it removes nothing. The result holds no duplicate pair, which makes
/// the function idempotent.
///
/// Output keeps the relative order of the cluster seeds.
pub fn deduplicate_tags(tags: &[Tag], threshold_m: f64) -> Vec<Tag> {
    let mut current = tags.to_vec();
    loop {
        let reduced = greedy_pass(&current, threshold_m);
        if reduced.len() == current.len() {
            return reduced;
        }
        current = reduced;
    }
}

fn greedy_pass(tags: &[Tag], threshold_m: f64) -> Vec<Tag> {
    let mut assigned = vec![false; tags.len()];
    let mut reduced = Vec::with_capacity(tags.len());

    for seed_index in 0..tags.len() {
        if assigned[seed_index] {
            continue;
        }
        assigned[seed_index] = true;

        let seed = &tags[seed_index];
        let mut cluster = vec![seed.clone()];
        for other_index in (seed_index + 1)..tags.len() {
            if !assigned[other_index] && is_duplicate(seed, &tags[other_index], threshold_m) {
                assigned[other_index] = true;
                cluster.push(tags[other_index].clone());
            }
        }

        if let Some(winner) = merge_duplicate_tags(&cluster) {
            reduced.push(winner);
        }
    }

    reduced
}

/// Whether `candidate` should replace `incumbent` as the canonical tag.
fn ranks_above(candidate: &Tag, incumbent: &Tag) -> bool {
    if let (Some(a), Some(b)) = (candidate.confidence(), incumbent.confidence()) {
        match a.partial_cmp(&b) {
            Some(Ordering::Greater) => return true,
            Some(Ordering::Less) => return false,
            _ => {}
        }
    }
    candidate.timestamp > incumbent.timestamp
}
