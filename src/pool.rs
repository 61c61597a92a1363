//! Shared dispenser of unconsumed primary electrons.
//!
//! The pool borrows the primaries and tags the orchestrator loaded and hands
//! out consecutive runs of them to any number of concurrent workers. The
//! only mutable state is an atomic cursor; a compare-and-swap loop reserves
//! runs, so every primary is delivered to exactly once and the pool never
//! blocks.

use crate::particle::Particle;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One reservation handed to a worker: parallel particle and tag slices of
/// equal length, possibly empty when the pool has drained.
#[derive(Debug, Clone, Copy)]
pub struct WorkItem<'a> {
    pub particles: &'a [Particle],
    pub tags: &'a [u32],
}

impl WorkItem<'_> {
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
}

/// Thread-safe work pool over borrowed primaries.
#[derive(Debug)]
pub struct WorkPool<'a> {
    particles: &'a [Particle],
    tags: &'a [u32],
    cursor: AtomicUsize,
}

impl<'a> WorkPool<'a> {
    /// Wraps the primaries and their tags. Both slices must be the same
    /// length; the pool borrows them for its whole lifetime.
    pub fn new(particles: &'a [Particle], tags: &'a [u32]) -> Self {
        assert_eq!(
            particles.len(),
            tags.len(),
            "primaries and tags must pair up"
        );
        WorkPool {
            particles,
            tags,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Atomically reserves up to `max_n` consecutive primaries.
    ///
    /// The returned item is empty exactly when the pool is exhausted. The
    /// reservation order between concurrent callers is unspecified, but no
    /// primary is ever handed out twice. Relaxed ordering suffices: the
    /// slices are immutable and only the cursor is contended.
    pub fn get_work(&self, max_n: usize) -> WorkItem<'a> {
        let total = self.particles.len();
        let start = self
            .cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |cursor| {
                if cursor < total && max_n > 0 {
                    Some(cursor.saturating_add(max_n).min(total))
                } else {
                    None
                }
            });
        match start {
            Ok(start) => {
                let end = start.saturating_add(max_n).min(total);
                WorkItem {
                    particles: &self.particles[start..end],
                    tags: &self.tags[start..end],
                }
            }
            Err(_) => WorkItem {
                particles: &self.particles[0..0],
                tags: &self.tags[0..0],
            },
        }
    }

    /// Primaries not yet reserved. Observational: it may lag a concurrent
    /// reservation but never reports zero while unclaimed work remains.
    pub fn primaries_to_go(&self) -> usize {
        self.particles
            .len()
            .saturating_sub(self.cursor.load(Ordering::Relaxed))
    }

    /// Total number of primaries behind this pool.
    pub fn total(&self) -> usize {
        self.particles.len()
    }

    /// True once no further reservation can succeed.
    pub fn done(&self) -> bool {
        self.cursor.load(Ordering::Relaxed) >= self.particles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::Particle;

    fn primaries(n: usize) -> (Vec<Particle>, Vec<u32>) {
        (vec![Particle::default(); n], (0..n as u32).collect())
    }

    #[test]
    fn reservations_are_consecutive_and_exact() {
        let (particles, tags) = primaries(10);
        let pool = WorkPool::new(&particles, &tags);

        let first = pool.get_work(4);
        assert_eq!(first.tags, &[0, 1, 2, 3]);
        assert_eq!(pool.primaries_to_go(), 6);

        let second = pool.get_work(100);
        assert_eq!(second.len(), 6);
        assert_eq!(second.tags[0], 4);

        assert!(pool.done());
        assert!(pool.get_work(1).is_empty());
        assert_eq!(pool.primaries_to_go(), 0);
    }

    #[test]
    fn zero_request_never_reserves() {
        let (particles, tags) = primaries(3);
        let pool = WorkPool::new(&particles, &tags);
        assert!(pool.get_work(0).is_empty());
        assert_eq!(pool.primaries_to_go(), 3);
        assert!(!pool.done());
    }

    #[test]
    fn empty_pool_is_born_done() {
        let (particles, tags) = primaries(0);
        let pool = WorkPool::new(&particles, &tags);
        assert!(pool.done());
        assert!(pool.get_work(8).is_empty());
    }
}
