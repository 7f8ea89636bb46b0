//! Page navigation state

use serde::Serialize;

/// Current page and page count for a list view.
///
/// The page count is never below 1 and the current page is kept inside
/// `1..=total`, so an out-of-range request (page 7 of 3) still renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pager {
    current: u32,
    total: u32,
}

impl Default for Pager {
    fn default() -> Self {
        Self { current: 1, total: 1 }
    }
}

impl Pager {
    pub fn new(current: u32, total: u32) -> Self {
        let total = total.max(1);
        Self {
            current: current.clamp(1, total),
            total,
        }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// `Next` is disabled on the last page
    pub fn has_next(&self) -> bool {
        self.current < self.total
    }

    /// `Prev` is disabled on the first page
    pub fn has_prev(&self) -> bool {
        self.current > 1
    }

    pub fn next(&self) -> Option<u32> {
        self.has_next().then(|| self.current + 1)
    }

    pub fn prev(&self) -> Option<u32> {
        self.has_prev().then(|| self.current - 1)
    }

    /// Every page number, for numbered page links
    pub fn pages(&self) -> impl Iterator<Item = u32> {
        1..=self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_and_last_page() {
        let pager = Pager::new(1, 3);
        assert!(!pager.has_prev());
        assert!(pager.has_next());
        assert_eq!(pager.next(), Some(2));
        assert_eq!(pager.prev(), None);

        let pager = Pager::new(3, 3);
        assert!(pager.has_prev());
        assert!(!pager.has_next());
        assert_eq!(pager.next(), None);
    }

    #[test]
    fn test_out_of_range_page() {
        let pager = Pager::new(9, 4);
        assert_eq!(pager.current(), 4);
        assert!(!pager.has_next());
        assert_eq!(pager.pages().collect::<Vec<_>>(), vec![1, 2, 3, 4]);

        let pager = Pager::new(0, 0);
        assert_eq!(pager.current(), 1);
        assert_eq!(pager.total(), 1);
        assert!(!pager.has_next());
        assert!(!pager.has_prev());
    }
}
