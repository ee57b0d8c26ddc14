// SPDX-License-Identifier: MIT

//! Growable slot table with stable indices.
//!
//! A slot is either occupied or empty. Allocation reuses the first empty
//! slot, scanning from index 0, and the table never shrinks, so an index
//! handed out by [`SlotTable::insert`] stays valid until it is freed with
//! [`SlotTable::take`]. The linear scan trades O(n) allocation for stable
//! indices under concurrent bookkeeping.

pub struct SlotTable<T> {
    slots: Vec<Option<T>>,
}

impl<T> SlotTable<T> {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Place `value` in the first empty slot and return its index.
    pub fn insert(&mut self, value: T) -> usize {
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(value);
                return idx;
            }
        }
        self.slots.push(Some(value));
        self.slots.len() - 1
    }

    /// Place `value` at `idx`, growing the table as needed.
    ///
    /// Used to keep a parallel table aligned with the index handed out by
    /// [`SlotTable::insert`] on its sibling.
    pub fn put(&mut self, idx: usize, value: T) {
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }
        self.slots[idx] = Some(value);
    }

    /// Empty the slot at `idx`, returning its previous occupant.
    pub fn take(&mut self, idx: usize) -> Option<T> {
        self.slots.get_mut(idx).and_then(Option::take)
    }

    /// Number of slots, occupied or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterate over occupied slots in index order.
    pub fn occupied(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Drop every entry. Only meant for disposal of the owning structure.
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

impl<T> Default for SlotTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::SlotTable;

    #[test]
    fn insert_reuses_first_empty_slot() {
        let mut table = SlotTable::new();
        assert_eq!(table.insert("a"), 0);
        assert_eq!(table.insert("b"), 1);
        assert_eq!(table.insert("c"), 2);

        assert_eq!(table.take(1), Some("b"));
        assert_eq!(table.occupied_count(), 2);

        // Freed slot 1 is the first empty one, so it gets reused.
        assert_eq!(table.insert("d"), 1);
        assert_eq!(table.occupied_count(), 3);
    }

    #[test]
    fn table_never_shrinks() {
        let mut table = SlotTable::new();
        for i in 0..4 {
            table.insert(i);
        }
        for i in 0..4 {
            table.take(i);
        }
        assert_eq!(table.len(), 4);
        assert_eq!(table.occupied_count(), 0);
    }

    #[test]
    fn put_grows_to_requested_index() {
        let mut table = SlotTable::new();
        table.put(3, "x");
        assert_eq!(table.len(), 4);
        assert_eq!(table.occupied_count(), 1);
        assert_eq!(table.take(3), Some("x"));
        assert_eq!(table.take(0), None);
    }

    #[test]
    fn take_out_of_range_is_none() {
        let mut table: SlotTable<u8> = SlotTable::new();
        assert_eq!(table.take(7), None);
    }
}
