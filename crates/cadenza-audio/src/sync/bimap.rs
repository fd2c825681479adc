//! Two-way unique mapping between two key domains.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::collections::HashMap;
use std::hash::Hash;
use thiserror::Error;

/// Failures of the non-overwriting insert path.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    #[error("left key is already associated with another value")]
    LeftOccupied,

    #[error("right key is already associated with another value")]
    RightOccupied,
}

/// Bidirectional map where every left key pairs with exactly one right key.
///
/// Both directions are updated by the same mutating call, so for every
/// stored pair `(l, r)`, `get_left(l) == Some(r)` and `get_right(r) == Some(l)`.
#[derive(Debug, Clone)]
pub struct BiMap<L, R> {
    left_to_right: HashMap<L, R>,
    right_to_left: HashMap<R, L>,
}

impl<L, R> Default for BiMap<L, R> {
    fn default() -> Self {
        Self {
            left_to_right: HashMap::new(),
            right_to_left: HashMap::new(),
        }
    }
}

impl<L, R> BiMap<L, R>
where
    L: Eq + Hash + Clone,
    R: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `left` with `right`, or remove `left` when `right` is `None`.
    ///
    /// Any stale association held by either key is dropped first.
    pub fn set_left(&mut self, left: L, right: Option<R>) {
        match right {
            Some(right) => self.insert(left, right),
            None => {
                self.remove_left(&left);
            }
        }
    }

    /// Associate `right` with `left`, or remove `right` when `left` is `None`.
    pub fn set_right(&mut self, right: R, left: Option<L>) {
        match left {
            Some(left) => self.insert(left, right),
            None => {
                self.remove_right(&right);
            }
        }
    }

    /// Store the pair, replacing whatever either key mapped to before.
    pub fn insert(&mut self, left: L, right: R) {
        self.remove_left(&left);
        self.remove_right(&right);
        self.left_to_right.insert(left.clone(), right.clone());
        self.right_to_left.insert(right, left);
    }

    /// Store the pair only if neither key is already mapped elsewhere.
    pub fn try_insert(&mut self, left: L, right: R) -> Result<(), MapError> {
        match (self.left_to_right.get(&left), self.right_to_left.get(&right)) {
            (Some(existing), _) if *existing != right => Err(MapError::LeftOccupied),
            (_, Some(existing)) if *existing != left => Err(MapError::RightOccupied),
            _ => {
                self.insert(left, right);
                Ok(())
            }
        }
    }

    pub fn get_left(&self, left: &L) -> Option<&R> {
        self.left_to_right.get(left)
    }

    pub fn get_right(&self, right: &R) -> Option<&L> {
        self.right_to_left.get(right)
    }

    /// Remove `left` and its partner, returning the partner.
    pub fn remove_left(&mut self, left: &L) -> Option<R> {
        let right = self.left_to_right.remove(left)?;
        self.right_to_left.remove(&right);
        Some(right)
    }

    /// Remove `right` and its partner, returning the partner.
    pub fn remove_right(&mut self, right: &R) -> Option<L> {
        let left = self.right_to_left.remove(right)?;
        self.left_to_right.remove(&left);
        Some(left)
    }

    pub fn contains_left(&self, left: &L) -> bool {
        self.left_to_right.contains_key(left)
    }

    pub fn contains_right(&self, right: &R) -> bool {
        self.right_to_left.contains_key(right)
    }

    /// Current left domain, in no particular order.
    pub fn left_values(&self) -> Vec<L> {
        self.left_to_right.keys().cloned().collect()
    }

    /// Current right domain, in no particular order.
    pub fn right_values(&self) -> Vec<R> {
        self.right_to_left.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.left_to_right.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left_to_right.is_empty()
    }

    pub fn clear(&mut self) {
        self.left_to_right.clear();
        self.right_to_left.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&L, &R)> {
        self.left_to_right.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Decoder(u32);

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Entry(u32);

    #[test]
    fn test_store_and_retrieve_both_ways() {
        let mut map = BiMap::new();
        map.set_left(Decoder(0), Some(Entry(0)));

        assert_eq!(map.get_left(&Decoder(0)), Some(&Entry(0)));
        assert_eq!(map.get_right(&Entry(0)), Some(&Decoder(0)));
        assert_eq!(map.left_values(), vec![Decoder(0)]);
        assert_eq!(map.right_values(), vec![Entry(0)]);
    }

    #[test]
    fn test_store_using_either_side_as_key() {
        let mut map = BiMap::new();
        map.set_right(Entry(0), Some(Decoder(0)));
        map.set_left(Decoder(0), Some(Entry(0)));

        assert_eq!(map.get_right(&Entry(0)), Some(&Decoder(0)));
        assert_eq!(map.get_left(&Decoder(0)), Some(&Entry(0)));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_setting_none_removes_both_directions() {
        let mut map = BiMap::new();
        map.set_right(Entry(0), Some(Decoder(0)));
        map.set_left(Decoder(0), None);

        assert!(map.left_values().is_empty());
        assert!(map.right_values().is_empty());
        assert!(map.is_empty());
    }

    #[test]
    fn test_overwrite_drops_stale_inverse() {
        let mut map = BiMap::new();
        map.insert(Decoder(1), Entry(1));
        map.insert(Decoder(1), Entry(2));

        assert_eq!(map.get_left(&Decoder(1)), Some(&Entry(2)));
        assert!(!map.contains_right(&Entry(1)));

        map.insert(Decoder(3), Entry(2));
        assert!(!map.contains_left(&Decoder(1)));
        assert_eq!(map.get_right(&Entry(2)), Some(&Decoder(3)));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_try_insert_rejects_conflicts() {
        let mut map = BiMap::new();
        map.try_insert(Decoder(1), Entry(1)).unwrap();
        assert!(map.try_insert(Decoder(1), Entry(1)).is_ok());
        assert_eq!(
            map.try_insert(Decoder(1), Entry(2)),
            Err(MapError::LeftOccupied)
        );
        assert_eq!(
            map.try_insert(Decoder(2), Entry(1)),
            Err(MapError::RightOccupied)
        );
        assert_eq!(map.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_directions_stay_consistent(ops in prop::collection::vec((0u8..8, 0u8..8, any::<bool>()), 0..64)) {
            let mut map = BiMap::new();
            for (l, r, remove) in ops {
                if remove {
                    map.set_left(l, None);
                } else {
                    map.insert(l, r);
                }
            }

            prop_assert_eq!(map.left_values().len(), map.right_values().len());
            for (l, r) in map.iter() {
                prop_assert_eq!(map.get_right(r), Some(l));
            }
        }
    }
}
