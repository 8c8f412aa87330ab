// Slot selection state for the picking surface. The one invariant that
// matters: an unavailable slot can never become the selection.

use crate::api::Slot;

#[derive(Debug, Default)]
pub struct SlotPicker {
    // Nothing is pre-selected.
    selected: Option<Slot>,
}

impl SlotPicker {
    pub fn new() -> Self {
        Self::default()
    }

    // Selects the slot and reports whether the selection happened. Returns
    // false for an unavailable slot, leaving any prior selection intact;
    // the UI only fires its callback on true.
    pub fn select(&mut self, slot: &Slot) -> bool {
        if !slot.available {
            return false;
        }
        self.selected = Some(slot.clone());
        true
    }

    // Two slots are the same iff start and end both match exactly. Range
    // overlap does not count.
    pub fn is_selected(&self, slot: &Slot) -> bool {
        self.selected
            .as_ref()
            .map_or(false, |s| s.start == slot.start && s.end == slot.end)
    }

    pub fn selected(&self) -> Option<&Slot> {
        self.selected.as_ref()
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }
}
