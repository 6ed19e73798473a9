use std::collections::HashSet;

use crate::util::{next_u24, u24_before, u24_distance};

/// The number of reliable indices accepted ahead of the window start.
pub const RELIABLE_WINDOW_SIZE: u32 = 2048;

/// Suppresses duplicate reliable frames.
///
/// Every reliable index is accepted once. The window start is the lowest index
/// not received yet; indices before it are duplicates and indices further than
/// [`RELIABLE_WINDOW_SIZE`] ahead of it are rejected until it moves.
#[derive(Debug, Clone)]
pub struct ReliableWindow {
    start: u32,
    size: u32,
    received: HashSet<u32>,
}

impl ReliableWindow {
    pub fn new() -> Self {
        Self {
            start: 0,
            size: RELIABLE_WINDOW_SIZE,
            received: HashSet::new(),
        }
    }

    /// Returns `true` the first time `index` is seen within the window.
    pub fn insert(&mut self, index: u32) -> bool {
        if u24_before(index, self.start)
            || u24_distance(self.start, index) >= self.size
            || !self.received.insert(index)
        {
            return false;
        }

        // we need to update the window to check if the index is within it.
        while self.received.remove(&self.start) {
            self.start = next_u24(self.start);
        }
        true
    }

    /// Whether `index` lies beyond the window and cannot be accepted yet.
    /// Indices before the start are duplicates, not out of range.
    pub fn is_ahead(&self, index: u32) -> bool {
        !u24_before(index, self.start) && u24_distance(self.start, index) >= self.size
    }

    /// Returns the current window as `(start, end)`.
    pub fn range(&self) -> (u32, u32) {
        (self.start, self.start.wrapping_add(self.size))
    }
}

impl Default for ReliableWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_rejected() {
        let mut window = ReliableWindow::new();
        assert!(window.insert(1));
        assert!(!window.insert(1));
        assert_eq!(window.range().0, 0);
        assert!(window.insert(0));
        assert_eq!(window.range().0, 2);
        assert!(!window.insert(0));
    }

    #[test]
    fn far_ahead_indices_wait_for_the_window() {
        let mut window = ReliableWindow::new();
        assert!(window.is_ahead(RELIABLE_WINDOW_SIZE));
        assert!(!window.insert(RELIABLE_WINDOW_SIZE));
        assert!(window.insert(RELIABLE_WINDOW_SIZE - 1));
        assert!(window.insert(0));
        assert!(!window.is_ahead(RELIABLE_WINDOW_SIZE));
        // a duplicate is behind the window, never ahead of it
        assert!(!window.is_ahead(0));
    }
}
