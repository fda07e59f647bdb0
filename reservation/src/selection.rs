//! The guest's in-progress beverage choice.

use crate::error::SelectionError;
use serde::{Deserialize, Serialize};

/// Maximum number of beverages a guest may pick
pub const MAX_SELECTIONS: usize = 2;

/// What a successful toggle did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggle {
    /// Item added to the selection
    Selected,
    /// Item removed from the selection
    Deselected,
}

/// Ordered set of selected item names, capped at `max`.
///
/// Deselecting is always allowed. Selecting fails with
/// [`SelectionError::LimitExceeded`] once the cap is reached, leaving the set
/// unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    max: usize,
    items: Vec<String>,
}

impl SelectionState {
    /// Empty selection with a custom cap
    #[must_use]
    pub const fn with_max(max: usize) -> Self {
        Self {
            max,
            items: Vec::new(),
        }
    }

    /// Selects `item` if absent, deselects it if present.
    ///
    /// # Errors
    ///
    /// [`SelectionError::LimitExceeded`] when selecting past the cap.
    pub fn toggle(&mut self, item: &str) -> Result<Toggle, SelectionError> {
        if let Some(index) = self.items.iter().position(|selected| selected == item) {
            self.items.remove(index);
            return Ok(Toggle::Deselected);
        }

        if self.items.len() >= self.max {
            return Err(SelectionError::LimitExceeded { max: self.max });
        }

        self.items.push(item.to_string());
        Ok(Toggle::Selected)
    }

    /// Selected items, in selection order
    #[must_use]
    pub fn current(&self) -> &[String] {
        &self.items
    }

    /// Whether `item` is selected
    #[must_use]
    pub fn is_selected(&self, item: &str) -> bool {
        self.items.iter().any(|selected| selected == item)
    }

    /// The cap
    #[must_use]
    pub const fn max(&self) -> usize {
        self.max
    }

    /// Drops the selection
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl Default for SelectionState {
    fn default() -> Self {
        Self::with_max(MAX_SELECTIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn third_pick_is_refused() {
        let mut selection = SelectionState::default();
        assert_eq!(selection.toggle("Coca"), Ok(Toggle::Selected));
        assert_eq!(selection.toggle("Champagne"), Ok(Toggle::Selected));
        assert_eq!(
            selection.toggle("Fanta"),
            Err(SelectionError::LimitExceeded { max: 2 })
        );
        assert_eq!(selection.current(), ["Coca", "Champagne"]);
    }

    #[test]
    fn deselect_is_allowed_at_the_cap() {
        let mut selection = SelectionState::default();
        selection.toggle("Coca").ok();
        selection.toggle("Champagne").ok();

        assert_eq!(selection.toggle("Coca"), Ok(Toggle::Deselected));
        assert_eq!(selection.toggle("Fanta"), Ok(Toggle::Selected));
        assert_eq!(selection.current(), ["Champagne", "Fanta"]);
    }

    #[test]
    fn clear_empties_the_selection() {
        let mut selection = SelectionState::default();
        selection.toggle("Eau").ok();
        selection.clear();
        assert!(selection.current().is_empty());
        assert!(!selection.is_selected("Eau"));
    }

    proptest! {
        #[test]
        fn never_exceeds_the_cap(
            max in 0usize..4,
            picks in proptest::collection::vec(0usize..6, 0..40),
        ) {
            let names = ["Champagne", "Vin rouge", "Bière", "Coca", "Fanta", "Eau"];
            let mut selection = SelectionState::with_max(max);
            for pick in picks {
                let before = selection.clone();
                match selection.toggle(names[pick]) {
                    Ok(_) => {},
                    Err(SelectionError::LimitExceeded { .. }) => prop_assert_eq!(&selection, &before),
                    Err(other) => prop_assert!(false, "unexpected error {other:?}"),
                }
                prop_assert!(selection.current().len() <= max);
            }
        }

        #[test]
        fn selection_has_no_duplicates(picks in proptest::collection::vec(0usize..3, 0..30)) {
            let names = ["Coca", "Fanta", "Eau"];
            let mut selection = SelectionState::with_max(3);
            for pick in picks {
                let _ = selection.toggle(names[pick]);
            }
            let mut sorted = selection.current().to_vec();
            sorted.sort();
            sorted.dedup();
            prop_assert_eq!(sorted.len(), selection.current().len());
        }
    }
}
