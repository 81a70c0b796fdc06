// Failover pool of interchangeable TMDB-addon mirrors.
//
// The mirror list is immutable after startup; only the cursor mutates.
// The cursor is process-wide shared state and advances are allowed to race:
// correctness only requires that it always names a valid pool member, since
// failover depends on eventually trying a working mirror, not on which
// concurrent caller's advance wins.

use std::sync::atomic::{AtomicUsize, Ordering};

pub struct AddonPool {
    mirrors: Vec<String>,
    cursor: AtomicUsize,
}

impl AddonPool {
    /// Build a pool from the configured mirror list. An empty list yields
    /// `None`; callers fall back to their defaults.
    pub fn new(mirrors: Vec<String>) -> Option<Self> {
        if mirrors.is_empty() {
            return None;
        }
        Some(Self {
            mirrors,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }

    /// The mirror the cursor currently points at.
    pub fn current(&self) -> &str {
        let idx = self.cursor.load(Ordering::Relaxed) % self.mirrors.len();
        &self.mirrors[idx]
    }

    /// Move the cursor to the next mirror (wrapping) and return it.
    /// Called exactly when a call against `current()` failed.
    pub fn advance(&self) -> &str {
        let idx = self.cursor.load(Ordering::Relaxed);
        let next = (idx + 1) % self.mirrors.len();
        self.cursor.store(next, Ordering::Relaxed);
        tracing::warn!(mirror = %self.mirrors[next], "switching addon mirror");
        &self.mirrors[next]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_of(n: usize) -> AddonPool {
        AddonPool::new((0..n).map(|i| format!("https://mirror-{i}.example")).collect()).unwrap()
    }

    #[test]
    fn test_empty_pool_rejected() {
        assert!(AddonPool::new(Vec::new()).is_none());
    }

    #[test]
    fn test_advance_wraps_around() {
        let pool = pool_of(3);
        assert_eq!(pool.current(), "https://mirror-0.example");
        assert_eq!(pool.advance(), "https://mirror-1.example");
        assert_eq!(pool.advance(), "https://mirror-2.example");
        assert_eq!(pool.advance(), "https://mirror-0.example");
    }

    #[test]
    fn test_cursor_sticks_between_requests() {
        let pool = pool_of(3);
        pool.advance();
        assert_eq!(pool.current(), "https://mirror-1.example");
        assert_eq!(pool.current(), "https://mirror-1.example");
    }

    #[test]
    fn test_concurrent_advances_keep_cursor_valid() {
        use std::sync::Arc;
        let pool = Arc::new(pool_of(3));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let url = pool.advance().to_string();
                        assert!(url.starts_with("https://mirror-"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        // Whatever the interleaving, the cursor names a valid member.
        assert!(pool.current().starts_with("https://mirror-"));
    }
}
