//! Dense 1-based ranking over ordered lists.
//!
//! # Responsibility
//! - Define the `Ranked` contract shared by chapters, modules and test items.
//! - Provide pure list transforms used by the reorder service.
//!
//! # Invariants
//! - After `rerank`, ranks are exactly `1..=n` in iteration order.
//! - Transforms never touch payload fields, only position and rank.

use std::fmt::{Debug, Display};
use std::hash::Hash;

/// First rank of any ordered list.
pub const FIRST_RANK: i64 = 1;

/// One item of an ordered list.
pub trait Ranked {
    /// Opaque identity, unique within one list.
    type Id: Clone + Eq + Ord + Hash + Debug + Display;

    /// Returns stable item id.
    fn id(&self) -> &Self::Id;
    /// Returns current 1-based rank.
    fn rank(&self) -> i64;
    /// Overwrites rank. Only ordering helpers should call this.
    fn set_rank(&mut self, rank: i64);
}

/// One `(id, rank)` assignment sent to a rank store.
pub type RankAssignment<Id> = (Id, i64);

/// Returns the index of `id`, if present.
pub fn position_of<T: Ranked>(items: &[T], id: &T::Id) -> Option<usize> {
    items.iter().position(|item| item.id() == id)
}

/// Moves the element at `from` to index `to`, shifting the items between.
///
/// Moving down lands the item after the element previously at `to`, moving
/// up lands it before; both equal "take the target's slot".
pub fn move_within<T>(items: &mut Vec<T>, from: usize, to: usize) {
    if from == to || from >= items.len() || to >= items.len() {
        return;
    }
    let item = items.remove(from);
    items.insert(to, item);
}

/// Assigns `rank = position + 1` to every item.
///
/// Returns the assignments whose rank actually changed, in list order.
pub fn rerank<T: Ranked>(items: &mut [T]) -> Vec<RankAssignment<T::Id>> {
    let mut changed = Vec::new();
    for (index, item) in items.iter_mut().enumerate() {
        let rank = FIRST_RANK + index as i64;
        if item.rank() != rank {
            item.set_rank(rank);
            changed.push((item.id().clone(), rank));
        }
    }
    changed
}

/// Sorts freshly loaded rows by `rank ASC, id ASC` and re-ranks them.
///
/// Remote rows may carry gaps or duplicates after a partially applied
/// write; the returned assignments are what must be written back to heal.
pub fn normalize<T: Ranked>(items: &mut [T]) -> Vec<RankAssignment<T::Id>> {
    items.sort_by(|left, right| {
        left.rank()
            .cmp(&right.rank())
            .then_with(|| left.id().cmp(right.id()))
    });
    rerank(items)
}

/// Returns whether ranks are exactly `1..=n` in iteration order.
pub fn is_dense<T: Ranked>(items: &[T]) -> bool {
    items
        .iter()
        .enumerate()
        .all(|(index, item)| item.rank() == FIRST_RANK + index as i64)
}
