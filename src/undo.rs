//! Undo/redo history for terrain edits.
//!
//! Each entry is the [`Transaction`] a stroke produced: snapshots of the
//! components (and selection state) it touched, taken before the first
//! write. Restoring a transaction hands back the snapshots it replaced,
//! which become the entry for the opposite direction.

use crate::terrain_data::{TerrainData, Transaction};

/// Bounded past/future stacks of stroke transactions.
pub struct UndoHistory {
    /// Stack of previous states (most recent at the end)
    past: Vec<Transaction>,
    /// Stack of undone states available for redo (most recent at the end)
    future: Vec<Transaction>,
    /// Maximum number of undo entries to keep
    max_entries: usize,
}

impl UndoHistory {
    pub fn new(max_entries: usize) -> Self {
        Self {
            past: Vec::new(),
            future: Vec::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Record a finished stroke. Clears the redo stack.
    pub fn push(&mut self, transaction: Transaction) {
        self.future.clear();
        self.past.push(transaction);
        while self.past.len() > self.max_entries {
            self.past.remove(0);
        }
    }

    /// Restore the most recent stroke's snapshots. Returns the description
    /// of the undone stroke, or None if there is nothing to undo.
    pub fn undo(&mut self, terrain: &mut TerrainData) -> Option<String> {
        let transaction = self.past.pop()?;
        let description = transaction.description.clone();
        let redo = terrain.restore(transaction);
        self.future.push(redo);
        log::info!("Undo: {description}");
        Some(description)
    }

    pub fn redo(&mut self, terrain: &mut TerrainData) -> Option<String> {
        let transaction = self.future.pop()?;
        let description = transaction.description.clone();
        let undo = terrain.restore(transaction);
        self.past.push(undo);
        log::info!("Redo: {description}");
        Some(description)
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }

    pub fn undo_count(&self) -> usize {
        self.past.len()
    }

    pub fn redo_count(&self) -> usize {
        self.future.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridCoord, Region};
    use crate::terrain_data::DataKind;

    /// Set one vertex inside a transaction and return it.
    fn edit(terrain: &mut TerrainData, height: u16) -> Transaction {
        terrain.begin_transaction("Sculpt");
        terrain.write_heights(Region::from_coord(GridCoord::new(2, 2)), &[height]);
        terrain.commit(DataKind::Height);
        terrain.end_transaction().expect("modified")
    }

    fn height(terrain: &TerrainData) -> u16 {
        terrain.height_at(GridCoord::new(2, 2)).unwrap_or_default()
    }

    #[test]
    fn test_new_history_empty() {
        let history = UndoHistory::new(10);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.undo_count(), 0);
        assert_eq!(history.redo_count(), 0);
    }

    #[test]
    fn test_undo_redo_cycle() {
        let mut terrain = TerrainData::flat(1, 1, 7, 100);
        let mut history = UndoHistory::new(10);
        let tx = edit(&mut terrain, 200);
        history.push(tx);
        let tx = edit(&mut terrain, 300);
        history.push(tx);
        assert_eq!(height(&terrain), 300);

        assert_eq!(history.undo(&mut terrain).as_deref(), Some("Sculpt"));
        assert_eq!(height(&terrain), 200);
        assert_eq!(history.undo(&mut terrain).as_deref(), Some("Sculpt"));
        assert_eq!(height(&terrain), 100);
        assert!(history.undo(&mut terrain).is_none());

        history.redo(&mut terrain);
        assert_eq!(height(&terrain), 200);
        history.redo(&mut terrain);
        assert_eq!(height(&terrain), 300);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_new_action_clears_redo() {
        let mut terrain = TerrainData::flat(1, 1, 7, 100);
        let mut history = UndoHistory::new(10);
        let tx = edit(&mut terrain, 200);
        history.push(tx);
        history.undo(&mut terrain);
        assert!(history.can_redo());

        let tx = edit(&mut terrain, 250);
        history.push(tx);
        assert!(!history.can_redo());
        assert_eq!(history.undo_count(), 1);
    }

    #[test]
    fn test_max_entries_trims_oldest() {
        let mut terrain = TerrainData::flat(1, 1, 7, 0);
        let mut history = UndoHistory::new(2);
        for h in [10, 20, 30] {
            let tx = edit(&mut terrain, h);
            history.push(tx);
        }
        assert_eq!(history.undo_count(), 2);
        history.undo(&mut terrain);
        history.undo(&mut terrain);
        assert_eq!(height(&terrain), 10, "The oldest entry was dropped");
    }

    #[test]
    fn test_clear() {
        let mut terrain = TerrainData::flat(1, 1, 7, 0);
        let mut history = UndoHistory::new(10);
        let tx = edit(&mut terrain, 5);
        history.push(tx);
        history.undo(&mut terrain);
        history.clear();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }
}
