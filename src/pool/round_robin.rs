//! Round-robin slot selection.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Rotating cursor over `len` slots.
/// The cursor only grows; the slot is taken modulo the pool size.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next slot in `0..len`, or `None` for an empty pool.
    pub fn next_index(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(self.cursor.fetch_add(1, Ordering::Relaxed) % len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin() {
        let rr = RoundRobin::new();
        let picks: Vec<_> = (0..8).map(|_| rr.next_index(4).unwrap()).collect();
        assert_eq!(picks, vec![0, 1, 2, 3, 0, 1, 2, 3]);
    }

    #[test]
    fn test_empty_pool() {
        assert_eq!(RoundRobin::new().next_index(0), None);
    }

    #[test]
    fn test_cursor_wraps() {
        let rr = RoundRobin {
            cursor: AtomicUsize::new(usize::MAX),
        };
        assert_eq!(rr.next_index(4), Some(usize::MAX % 4));
        assert_eq!(rr.next_index(4), Some(0));
    }
}
