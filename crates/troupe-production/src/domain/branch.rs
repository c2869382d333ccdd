//! Branch navigator.
//!
//! Turns are stored flat, keyed by id, each pointing at its parent. A
//! [`TurnTree`] indexes one production's turns and answers the structural
//! questions: the root→leaf chain of a turn, the children of a turn, its
//! latest descendant and the active leaf. All traversals are iterative.

use std::collections::{HashMap, HashSet};

use troupe_core::entity::EntityKind;
use troupe_core::error::DomainError;
use uuid::Uuid;

use super::turn::Turn;

/// Read-only index over the turns of one production.
#[derive(Debug, Default)]
pub struct TurnTree<'a> {
    by_id: HashMap<Uuid, &'a Turn>,
    children: HashMap<Option<Uuid>, Vec<&'a Turn>>,
}

impl<'a> TurnTree<'a> {
    /// Index `turns`. Children are ordered by creation time.
    pub fn new(turns: impl IntoIterator<Item = &'a Turn>) -> Self {
        let mut by_id = HashMap::new();
        let mut children: HashMap<Option<Uuid>, Vec<&'a Turn>> = HashMap::new();
        for turn in turns {
            by_id.insert(turn.id, turn);
            children.entry(turn.parent_id).or_default().push(turn);
        }
        for siblings in children.values_mut() {
            siblings.sort_by_key(|turn| (turn.created_at, turn.id));
        }
        Self { by_id, children }
    }

    /// Index only the turns belonging to `production_id`.
    pub fn for_production(turns: impl IntoIterator<Item = &'a Turn>, production_id: Uuid) -> Self {
        Self::new(
            turns
                .into_iter()
                .filter(|turn| turn.production_id == production_id),
        )
    }

    /// Number of indexed turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True when no turn is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Look up a turn.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&'a Turn> {
        self.by_id.get(&id).copied()
    }

    /// Walk parent pointers from `leaf` to its root and return the chain in
    /// chronological (root→leaf) order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if `leaf` is not indexed.
    /// Returns `DomainError::Integrity` if the walk revisits a turn (a
    /// cycle) or reaches a parent that does not exist.
    pub fn ancestor_chain(&self, leaf: Uuid) -> Result<Vec<&'a Turn>, DomainError> {
        let mut current = self
            .get(leaf)
            .ok_or_else(|| DomainError::not_found(EntityKind::Turn, leaf))?;
        let mut seen = HashSet::from([current.id]);
        let mut chain = vec![current];

        while let Some(parent_id) = current.parent_id {
            if !seen.insert(parent_id) {
                return Err(DomainError::Integrity(format!(
                    "turn {parent_id} is its own ancestor"
                )));
            }
            current = self.get(parent_id).ok_or_else(|| {
                DomainError::Integrity(format!(
                    "turn {} points at missing parent {parent_id}",
                    current.id
                ))
            })?;
            chain.push(current);
        }

        chain.reverse();
        Ok(chain)
    }

    /// Turns whose parent is `parent`; `None` selects the roots.
    #[must_use]
    pub fn children(&self, parent: Option<Uuid>) -> &[&'a Turn] {
        self.children
            .get(&parent)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every turn below `id`, in depth-first order, excluding `id` itself.
    #[must_use]
    pub fn descendants(&self, id: Uuid) -> Vec<&'a Turn> {
        let mut found = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut stack: Vec<&'a Turn> = self.children(Some(id)).iter().rev().copied().collect();
        while let Some(turn) = stack.pop() {
            if !seen.insert(turn.id) {
                continue;
            }
            found.push(turn);
            stack.extend(self.children(Some(turn.id)).iter().rev().copied());
        }
        found
    }

    /// The most recently created descendant of `id`, or the turn itself when
    /// it has none.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if `id` is not indexed.
    pub fn latest_descendant(&self, id: Uuid) -> Result<&'a Turn, DomainError> {
        let turn = self
            .get(id)
            .ok_or_else(|| DomainError::not_found(EntityKind::Turn, id))?;
        Ok(self
            .descendants(id)
            .into_iter()
            .max_by_key(|turn| (turn.created_at, turn.id))
            .unwrap_or(turn))
    }

    /// The most recently created turn overall.
    #[must_use]
    pub fn latest(&self) -> Option<&'a Turn> {
        self.by_id
            .values()
            .copied()
            .max_by_key(|turn| (turn.created_at, turn.id))
    }

    /// The turn new turns attach to: the explicit `marker` when it still
    /// exists, otherwise the most recently created turn.
    #[must_use]
    pub fn active_leaf(&self, marker: Option<Uuid>) -> Option<&'a Turn> {
        marker
            .and_then(|id| self.get(id))
            .or_else(|| self.latest())
    }
}

/// Drop directive turns from a chain, except a directive that is the
/// chain's final element.
#[must_use]
pub fn without_stale_directives<'a>(chain: &[&'a Turn]) -> Vec<&'a Turn> {
    let last = chain.len().saturating_sub(1);
    chain
        .iter()
        .enumerate()
        .filter(|(index, turn)| !turn.directive || *index == last)
        .map(|(_, turn)| *turn)
        .collect()
}
