//! Dense ranking of sibling items (sections of a page, pages of a site).
//!
//! Every function takes the siblings as a slice sorted by `order_index`,
//! mutates it in memory and returns the `(id, order_index)` rewrites the
//! caller has to persist. Stores apply the rewrites as one batched write while
//! holding the parent lock, so the `order_index` sequence of a parent is
//! always exactly `0..len`.

use std::collections::HashMap;

use thiserror::Error;
use uuid::Uuid;

/// Something positioned among its siblings by a zero-based `order_index`.
pub trait Ranked {
    fn id(&self) -> Uuid;
    fn order_index(&self) -> i32;
    fn set_order_index(&mut self, index: i32);
}

/// A single `order_index` rewrite to persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reindex {
    pub id: Uuid,
    pub order_index: i32,
}

/// Result of inserting an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Index the new item landed at, after clamping.
    pub index: i32,
    /// Rewrites for the siblings that were shifted up.
    pub shifted: Vec<Reindex>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderingError {
    #[error("item not found among its siblings")]
    MissingItem,

    #[error("no item at index {0}")]
    MissingTarget(i32),

    #[error("order_index must be non-negative, got {0}")]
    NegativeIndex(i32),

    #[error("order must list every item exactly once")]
    NotAPermutation,
}

pub fn sort_by_rank<T: Ranked>(items: &mut [T]) {
    items.sort_by_key(T::order_index);
}

/// Index for an item appended after every existing sibling.
pub fn append_index<T: Ranked>(items: &[T]) -> i32 {
    items
        .iter()
        .map(T::order_index)
        .max()
        .map_or(0, |max| max + 1)
}

/// True when the indices are exactly `0..len` with no gaps or duplicates.
pub fn is_contiguous<T: Ranked>(items: &[T]) -> bool {
    let mut indices: Vec<i32> = items.iter().map(T::order_index).collect();
    indices.sort_unstable();
    indices
        .iter()
        .enumerate()
        .all(|(position, index)| i32::try_from(position).is_ok_and(|p| p == *index))
}

/// Insert `item` at `requested`, shifting every sibling at or after it by one.
///
/// A request past the end appends.
pub fn insert_at<T: Ranked>(
    items: &mut Vec<T>,
    requested: i32,
    mut item: T,
) -> Result<Placement, OrderingError> {
    let requested_position =
        usize::try_from(requested).map_err(|_| OrderingError::NegativeIndex(requested))?;
    let position = requested_position.min(items.len());
    let index = to_index(position);

    let new_id = item.id();
    item.set_order_index(index);
    items.insert(position, item);

    let shifted = renumber(items)
        .into_iter()
        .filter(|r| r.id != new_id)
        .collect();

    Ok(Placement { index, shifted })
}

/// Exchange the positions of `id` and whichever sibling currently sits at
/// `new_index`. Nothing else moves.
pub fn swap_with_occupant<T: Ranked>(
    items: &mut [T],
    id: Uuid,
    new_index: i32,
) -> Result<Vec<Reindex>, OrderingError> {
    let from = position_of(items, id).ok_or(OrderingError::MissingItem)?;
    let to = items
        .iter()
        .position(|item| item.order_index() == new_index)
        .ok_or(OrderingError::MissingTarget(new_index))?;

    if from == to {
        return Ok(Vec::new());
    }

    let old_index = items[from].order_index();
    items[from].set_order_index(new_index);
    items[to].set_order_index(old_index);
    items.swap(from, to);

    Ok(vec![
        Reindex {
            id: items[to].id(),
            order_index: new_index,
        },
        Reindex {
            id: items[from].id(),
            order_index: old_index,
        },
    ])
}

/// Remove `id` and close the gap it leaves.
pub fn remove<T: Ranked>(items: &mut Vec<T>, id: Uuid) -> Result<(T, Vec<Reindex>), OrderingError> {
    let position = position_of(items, id).ok_or(OrderingError::MissingItem)?;
    let removed = items.remove(position);
    let shifted = renumber(items);
    Ok((removed, shifted))
}

/// Rank items in exactly the order given by `order`.
pub fn reorder<T: Ranked>(items: &mut [T], order: &[Uuid]) -> Result<Vec<Reindex>, OrderingError> {
    let rank: HashMap<Uuid, usize> = order
        .iter()
        .enumerate()
        .map(|(position, id)| (*id, position))
        .collect();

    if rank.len() != order.len()
        || order.len() != items.len()
        || items.iter().any(|item| !rank.contains_key(&item.id()))
    {
        return Err(OrderingError::NotAPermutation);
    }

    items.sort_by_key(|item| rank[&item.id()]);
    Ok(renumber(items))
}

/// Set each item's index to its position, returning the items that changed.
fn renumber<T: Ranked>(items: &mut [T]) -> Vec<Reindex> {
    let mut changed = Vec::new();
    for (position, item) in items.iter_mut().enumerate() {
        let index = to_index(position);
        if item.order_index() != index {
            item.set_order_index(index);
            changed.push(Reindex {
                id: item.id(),
                order_index: index,
            });
        }
    }
    changed
}

fn position_of<T: Ranked>(items: &[T], id: Uuid) -> Option<usize> {
    items.iter().position(|item| item.id() == id)
}

fn to_index(position: usize) -> i32 {
    i32::try_from(position).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[derive(Debug, Clone)]
    struct Block {
        id: Uuid,
        name: &'static str,
        order_index: i32,
    }

    impl Ranked for Block {
        fn id(&self) -> Uuid {
            self.id
        }
        fn order_index(&self) -> i32 {
            self.order_index
        }
        fn set_order_index(&mut self, index: i32) {
            self.order_index = index;
        }
    }

    fn block(name: &'static str) -> Block {
        Block {
            id: Uuid::new_v4(),
            name,
            order_index: -1,
        }
    }

    fn page(names: &[&'static str]) -> Vec<Block> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Block {
                order_index: i as i32,
                ..block(name)
            })
            .collect()
    }

    fn layout(items: &[Block]) -> Vec<(&'static str, i32)> {
        let mut sorted = items.to_vec();
        sort_by_rank(&mut sorted);
        sorted.iter().map(|b| (b.name, b.order_index)).collect()
    }

    fn find(items: &[Block], name: &str) -> Uuid {
        items.iter().find(|b| b.name == name).map(|b| b.id).unwrap()
    }

    #[test]
    fn test_insert_shifts_tail_and_keeps_head() {
        let mut items = page(&["heading", "hero", "cta"]);
        let placement = insert_at(&mut items, 1, block("testimonials")).unwrap();

        assert_eq!(placement.index, 1);
        assert_eq!(placement.shifted.len(), 2);
        assert_eq!(
            layout(&items),
            vec![("heading", 0), ("testimonials", 1), ("hero", 2), ("cta", 3)]
        );
    }

    #[test]
    fn test_insert_past_end_appends() {
        let mut items = page(&["a", "b"]);
        let placement = insert_at(&mut items, 40, block("c")).unwrap();

        assert_eq!(placement.index, 2);
        assert!(placement.shifted.is_empty());
        assert_eq!(layout(&items), vec![("a", 0), ("b", 1), ("c", 2)]);
    }

    #[test]
    fn test_insert_rejects_negative_index() {
        let mut items = page(&["a"]);
        let err = insert_at(&mut items, -1, block("b")).unwrap_err();
        assert_eq!(err, OrderingError::NegativeIndex(-1));
        assert_eq!(layout(&items), vec![("a", 0)]);
    }

    #[test]
    fn test_insert_into_empty_page() {
        let mut items = Vec::new();
        let placement = insert_at(&mut items, 0, block("only")).unwrap();
        assert_eq!(placement.index, 0);
        assert_eq!(layout(&items), vec![("only", 0)]);
    }

    #[test]
    fn test_move_is_pairwise_swap() {
        let mut items = page(&["A", "B", "C", "D", "E"]);
        let a = find(&items, "A");
        let rewrites = swap_with_occupant(&mut items, a, 3).unwrap();

        assert_eq!(rewrites.len(), 2);
        assert_eq!(
            layout(&items),
            vec![("D", 0), ("B", 1), ("C", 2), ("A", 3), ("E", 4)]
        );
    }

    #[test]
    fn test_move_to_own_index_is_noop() {
        let mut items = page(&["A", "B"]);
        let b = find(&items, "B");
        assert!(swap_with_occupant(&mut items, b, 1).unwrap().is_empty());
        assert_eq!(layout(&items), vec![("A", 0), ("B", 1)]);
    }

    #[test]
    fn test_move_to_empty_slot_fails_without_changes() {
        let mut items = page(&["A", "B"]);
        let a = find(&items, "A");
        let err = swap_with_occupant(&mut items, a, 5).unwrap_err();

        assert_eq!(err, OrderingError::MissingTarget(5));
        assert_eq!(layout(&items), vec![("A", 0), ("B", 1)]);
    }

    #[test]
    fn test_move_unknown_item() {
        let mut items = page(&["A"]);
        let err = swap_with_occupant(&mut items, Uuid::new_v4(), 0).unwrap_err();
        assert_eq!(err, OrderingError::MissingItem);
    }

    #[test]
    fn test_remove_compacts_survivors() {
        let mut items = page(&["a", "b", "c", "d"]);
        let b = find(&items, "b");
        let (removed, shifted) = remove(&mut items, b).unwrap();

        assert_eq!(removed.name, "b");
        assert_eq!(shifted.len(), 2);
        assert_eq!(layout(&items), vec![("a", 0), ("c", 1), ("d", 2)]);
    }

    #[test]
    fn test_remove_last_needs_no_rewrites() {
        let mut items = page(&["a", "b"]);
        let b = find(&items, "b");
        let (_, shifted) = remove(&mut items, b).unwrap();
        assert!(shifted.is_empty());
    }

    #[test]
    fn test_append_index() {
        assert_eq!(append_index::<Block>(&[]), 0);
        assert_eq!(append_index(&page(&["a", "b", "c"])), 3);
    }

    #[test]
    fn test_reorder_requires_permutation() {
        let mut items = page(&["a", "b", "c"]);
        let (a, b, c) = (find(&items, "a"), find(&items, "b"), find(&items, "c"));

        assert_eq!(
            reorder(&mut items, &[a, b]),
            Err(OrderingError::NotAPermutation)
        );
        assert_eq!(
            reorder(&mut items, &[a, a, b]),
            Err(OrderingError::NotAPermutation)
        );
        assert_eq!(
            reorder(&mut items, &[a, b, Uuid::new_v4()]),
            Err(OrderingError::NotAPermutation)
        );

        let rewrites = reorder(&mut items, &[c, a, b]).unwrap();
        assert_eq!(rewrites.len(), 3);
        assert_eq!(layout(&items), vec![("c", 0), ("a", 1), ("b", 2)]);
    }

    #[test]
    fn test_contiguity_detects_gaps_and_duplicates() {
        let mut items = page(&["a", "b", "c"]);
        assert!(is_contiguous(&items));

        items[2].order_index = 5;
        assert!(!is_contiguous(&items));

        items[2].order_index = 1;
        assert!(!is_contiguous(&items));
    }

    #[test]
    fn test_random_operation_sequences_stay_contiguous() {
        const NAMES: [&str; 4] = ["hero", "cta", "news", "video"];

        let mut rng = StdRng::seed_from_u64(0x2545_f491_4f6c_dd1d);

        let mut items: Vec<Block> = Vec::new();
        for _ in 0..500 {
            match rng.random_range(0..4) {
                0 => {
                    let index = rng.random_range(0..items.len() as i32 + 3);
                    let name = NAMES[rng.random_range(0..NAMES.len())];
                    insert_at(&mut items, index, block(name)).unwrap();
                }
                1 if !items.is_empty() => {
                    let id = items[rng.random_range(0..items.len())].id;
                    let target = rng.random_range(0..items.len() as i32);
                    swap_with_occupant(&mut items, id, target).unwrap();
                }
                2 if !items.is_empty() => {
                    let id = items[rng.random_range(0..items.len())].id;
                    remove(&mut items, id).unwrap();
                }
                _ => {
                    let mut copy = block("copy");
                    copy.order_index = append_index(&items);
                    items.push(copy);
                }
            }
            assert!(is_contiguous(&items), "broken ranks: {:?}", layout(&items));
        }
    }
}
