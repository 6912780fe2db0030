use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

/// Strategy for choosing one item out of a candidate list.
///
/// Used for node placement, scale-down victims and request routing. The
/// controller defaults to [`RandomSelection`]; tests plug in deterministic
/// policies.
pub trait SelectionPolicy: Send + Sync {
    /// Returns an index in `0..len`, or `None` when `len` is zero.
    fn select(&self, len: usize) -> Option<usize>;
}

/// Picks a reference to one of `items` using `policy`.
pub fn pick<'a, T>(policy: &dyn SelectionPolicy, items: &'a [T]) -> Option<&'a T> {
    policy.select(items.len()).and_then(|index| items.get(index))
}

/// Uniform random selection.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSelection;

impl SelectionPolicy for RandomSelection {
    fn select(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(rand::thread_rng().gen_range(0..len))
    }
}

/// Round-robin selection over whatever list is presented.
#[derive(Debug, Default)]
pub struct RoundRobinSelection {
    next: AtomicUsize,
}

impl RoundRobinSelection {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionPolicy for RoundRobinSelection {
    fn select(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(self.next.fetch_add(1, Ordering::Relaxed) % len)
    }
}

/// Always picks the first candidate.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstSelection;

impl SelectionPolicy for FirstSelection {
    fn select(&self, len: usize) -> Option<usize> {
        (len > 0).then_some(0)
    }
}
