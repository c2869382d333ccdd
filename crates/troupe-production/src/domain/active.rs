//! Active-leaf markers.
//!
//! Which branch tip new turns attach to is client-session state, kept apart
//! from persistence: one marker per production.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use uuid::Uuid;

/// Per-session map of production → active turn.
#[derive(Debug, Default)]
pub struct ActiveTurns {
    markers: Mutex<HashMap<Uuid, Uuid>>,
}

impl ActiveTurns {
    /// Creates an empty marker set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The marked turn of `production_id`, if any. The marker may reference
    /// a turn that has since been deleted; resolve it through
    /// [`TurnTree::active_leaf`](super::branch::TurnTree::active_leaf).
    #[must_use]
    pub fn get(&self, production_id: Uuid) -> Option<Uuid> {
        self.markers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&production_id)
            .copied()
    }

    /// Point `production_id` at `turn_id`.
    pub fn set(&self, production_id: Uuid, turn_id: Uuid) {
        self.markers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(production_id, turn_id);
    }

    /// Remove the marker of `production_id` when it points at one of
    /// `turn_ids`. Returns whether a marker was removed.
    pub fn forget_any(&self, production_id: Uuid, turn_ids: &[Uuid]) -> bool {
        let mut markers = self.markers.lock().unwrap_or_else(PoisonError::into_inner);
        match markers.get(&production_id) {
            Some(current) if turn_ids.contains(current) => {
                markers.remove(&production_id);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers_are_kept_per_production() {
        let markers = ActiveTurns::new();
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        let turn = Uuid::new_v4();

        markers.set(first, turn);

        assert_eq!(markers.get(first), Some(turn));
        assert_eq!(markers.get(second), None);
    }

    #[test]
    fn test_forget_any_only_clears_matching_marker() {
        let markers = ActiveTurns::new();
        let production = Uuid::new_v4();
        let turn = Uuid::new_v4();
        markers.set(production, turn);

        assert!(!markers.forget_any(production, &[Uuid::new_v4()]));
        assert_eq!(markers.get(production), Some(turn));
        assert!(markers.forget_any(production, &[turn]));
        assert_eq!(markers.get(production), None);
    }
}
