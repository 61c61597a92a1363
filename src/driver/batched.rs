//! Device-style driver: staging buffers plus a bulk-parallel inner loop.
//!
//! The batched driver mirrors the compute/transfer overlap of an
//! accelerator pipeline. Detected records are first *buffered* out of the
//! slab into a staging region, fresh work is *staged* from the pool, and a
//! later `push_to_simulation` completes the transfer into empty slots. One
//! worker owns one batched driver; the iteration itself fans out over the
//! slab with rayon.

use super::{Driver, step_slot};
use crate::geometry::Scene;
use crate::particle::Particle;
use crate::pool::WorkPool;
use crate::scatter::PhysicsModel;
use rayon::prelude::*;

/// Bulk-parallel driver with input/output staging.
pub struct BatchedDriver<'a, P: PhysicsModel> {
    inner: Driver<'a, P>,
    staged_in: Vec<(Particle, u32)>,
    staged_out: Vec<(Particle, u32)>,
    batch_size: usize,
}

impl<'a, P: PhysicsModel> BatchedDriver<'a, P> {
    pub fn new(
        capacity: usize,
        scene: &'a Scene,
        physics: &'a P,
        threshold: f32,
        seed: u64,
    ) -> Self {
        BatchedDriver {
            inner: Driver::new(capacity, scene, physics, threshold, seed),
            staged_in: Vec::new(),
            staged_out: Vec::new(),
            batch_size: 0,
        }
    }

    /// Sizes the input staging region. Until this is called the driver
    /// stages no pool work, which is what the prescan phase relies on.
    pub fn allocate_input_buffers(&mut self, batch_size: usize) {
        self.batch_size = batch_size;
        self.staged_in.reserve(batch_size);
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// Direct injection, bypassing the staging region. The prescan pilot
    /// uses this; the steady-state pipeline goes through `push_to_buffer`.
    pub fn push(&mut self, particles: &[Particle], tags: &[u32]) -> usize {
        self.inner.push(particles, tags)
    }

    /// Advances every alive slot by one physics event as one bulk pass.
    ///
    /// Slots own disjoint state and their own RNG streams, so the pass is
    /// embarrassingly parallel; spawned secondaries are collected and placed
    /// after the sweep.
    pub fn do_iteration(&mut self) {
        let scene = self.inner.scene;
        let physics = self.inner.physics;
        let threshold = self.inner.threshold;
        let secondaries: Vec<(Particle, u32)> = self
            .inner
            .store
            .slots
            .par_iter_mut()
            .zip(self.inner.rngs.par_iter_mut())
            .filter_map(|(slot, rng)| step_slot(slot, rng, scene, physics, threshold))
            .collect();
        self.inner.store.recount();
        self.inner.store.absorb_secondaries(secondaries);
    }

    pub fn get_running_count(&self) -> u32 {
        self.inner.get_running_count()
    }

    pub fn get_detected_count(&self) -> u32 {
        self.inner.get_detected_count()
    }

    /// Synchronous drain of detected slots; the prescan pilot and tests use
    /// this, the pipeline prefers `buffer_detected`/`flush_buffered`.
    pub fn flush_detected(&mut self, callback: impl FnMut(&Particle, u32)) -> u32 {
        self.inner.flush_detected(callback)
    }

    /// Moves every detected record out of the slab into the output staging
    /// region, freeing the slots for the next push.
    pub fn buffer_detected(&mut self) {
        self.inner.store.drain_detected_into(&mut self.staged_out);
    }

    /// Reserves up to one batch of pool work into the input staging region.
    ///
    /// The reservation is capped by the free slots not already spoken for,
    /// so staged work is never claimed without room to place it.
    pub fn push_to_buffer(&mut self, pool: &WorkPool<'_>) {
        let uncommitted = self.inner.store.free().saturating_sub(self.staged_in.len());
        let want = self.batch_size.min(uncommitted);
        if want == 0 {
            return;
        }
        let work = pool.get_work(want);
        self.staged_in.extend(
            work.particles
                .iter()
                .copied()
                .zip(work.tags.iter().copied()),
        );
    }

    /// Completes a staged transfer: moves staged particles into empty
    /// slots. Particles that do not fit (secondaries may have claimed slots
    /// since staging) stay staged for the next round. Returns the number
    /// placed.
    pub fn push_to_simulation(&mut self) -> usize {
        let staged = std::mem::take(&mut self.staged_in);
        let mut placed = 0;
        for (particle, tag) in staged {
            if self.inner.store.place(particle, tag) {
                placed += 1;
            } else {
                self.staged_in.push((particle, tag));
            }
        }
        placed
    }

    /// Drains the output staging region through the callback; returns the
    /// number of records handed over.
    pub fn flush_buffered(&mut self, mut callback: impl FnMut(&Particle, u32)) -> usize {
        let drained = self.staged_out.len();
        for (particle, tag) in self.staged_out.drain(..) {
            callback(&particle, tag);
        }
        drained
    }

    /// Staged particles not yet moved into the slab. Work claimed from the
    /// pool lives here between `push_to_buffer` and `push_to_simulation`,
    /// so the shutdown predicate must see it drained.
    pub fn staged_input(&self) -> usize {
        self.staged_in.len()
    }
}
