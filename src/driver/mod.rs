//! # Driver Module - Throughput-Oriented Simulation Core
//!
//! This module owns the in-flight electron population and the hot loop that
//! advances it. The [`ParticleStore`] is a fixed-capacity slab of slots; the
//! scalar [`Driver`] advances it one physics event per slot per call, and
//! the [`batched::BatchedDriver`] layers staging buffers and a rayon bulk
//! pass on top for the device-style pipeline.
//!
//! Slot life cycle: a slot goes empty→alive only through `push`,
//! alive→detected or alive→empty (termination) only through `do_iteration`,
//! and detected→empty only through a flush. Terminated slots free
//! immediately; detected slots persist until their record is drained.
//!
//! Each slot carries its own small RNG stream seeded from the driver seed,
//! so an iteration's outcome does not depend on how the bulk pass is
//! scheduled across threads.
//!
//! ## Submodules
//!
//! - [`batched`]: staging-buffer variant with the bulk-parallel inner loop
//! - [`prescan`]: pilot run deriving `frame_size` and `batch_size`
//! - [`tests`]: unit tests for the store, the step function and tuning

pub mod batched;
pub mod prescan;
// Unit tests
pub mod tests;

use crate::geometry::Scene;
use crate::particle::{Particle, VACUUM};
use crate::scatter::PhysicsModel;
use rand::prelude::*;
use rand::rngs::SmallRng;

/// Stream-splitting constant for per-slot RNG seeding (the golden-gamma
/// increment of splitmix64).
const SEED_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

/// State of one slab slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Empty,
    Alive,
    Detected,
}

/// One slab slot: a particle, the tag it was injected under, and the
/// triangle it is currently sitting on (excluded from the next boundary
/// query so surfaces are not re-hit at distance zero).
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub(crate) particle: Particle,
    pub(crate) tag: u32,
    pub(crate) status: SlotStatus,
    pub(crate) last_hit: Option<u32>,
}

impl Slot {
    fn empty() -> Self {
        Slot {
            particle: Particle::default(),
            tag: 0,
            status: SlotStatus::Empty,
            last_hit: None,
        }
    }
}

/// Fixed-capacity population of in-flight electrons.
///
/// The slab is allocated once at construction and never resized; occupancy
/// is bounded by the capacity for the whole run.
pub struct ParticleStore {
    pub(crate) slots: Vec<Slot>,
    running: usize,
    detected: usize,
    scan: usize,
}

impl ParticleStore {
    pub fn new(capacity: usize) -> Self {
        ParticleStore {
            slots: vec![Slot::empty(); capacity],
            running: 0,
            detected: 0,
            scan: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn running(&self) -> usize {
        self.running
    }

    pub fn detected(&self) -> usize {
        self.detected
    }

    /// Slots available for injection.
    pub fn free(&self) -> usize {
        self.slots.len() - self.running - self.detected
    }

    /// Injects particles into empty slots and returns how many were placed.
    ///
    /// Placement scans the slab from a ring cursor so repeated pushes do not
    /// rescan the densely occupied front. No scattering happens here; the
    /// placed particles are alive immediately.
    pub fn push(&mut self, particles: &[Particle], tags: &[u32]) -> usize {
        assert_eq!(particles.len(), tags.len(), "particles and tags must pair up");
        let capacity = self.slots.len();
        if capacity == 0 {
            return 0;
        }
        let mut placed = 0;
        let mut examined = 0;
        while placed < particles.len() && examined < capacity {
            if self.slots[self.scan].status == SlotStatus::Empty {
                self.slots[self.scan] = Slot {
                    particle: particles[placed],
                    tag: tags[placed],
                    status: SlotStatus::Alive,
                    last_hit: None,
                };
                self.running += 1;
                placed += 1;
            }
            self.scan = (self.scan + 1) % capacity;
            examined += 1;
        }
        placed
    }

    /// Places one particle into an empty slot, if any. Used for secondaries
    /// spawned mid-cascade; a full slab drops them.
    pub(crate) fn place(&mut self, particle: Particle, tag: u32) -> bool {
        self.push(std::slice::from_ref(&particle), std::slice::from_ref(&tag)) == 1
    }

    /// Inserts the secondaries an iteration spawned, dropping overflow.
    pub(crate) fn absorb_secondaries(&mut self, secondaries: Vec<(Particle, u32)>) {
        for (particle, tag) in secondaries {
            if !self.place(particle, tag) {
                break;
            }
        }
    }

    /// Invokes the callback on every detected slot, empties it, and returns
    /// the post-flush running count.
    pub fn flush_detected(&mut self, mut callback: impl FnMut(&Particle, u32)) -> u32 {
        for slot in &mut self.slots {
            if slot.status == SlotStatus::Detected {
                callback(&slot.particle, slot.tag);
                *slot = Slot::empty();
            }
        }
        self.detected = 0;
        self.running as u32
    }

    /// Moves every detected slot's record into `out`, emptying the slots.
    pub(crate) fn drain_detected_into(&mut self, out: &mut Vec<(Particle, u32)>) {
        for slot in &mut self.slots {
            if slot.status == SlotStatus::Detected {
                out.push((slot.particle, slot.tag));
                *slot = Slot::empty();
            }
        }
        self.detected = 0;
    }

    /// Re-derives the occupancy counters after an iteration sweep.
    pub(crate) fn recount(&mut self) {
        let mut running = 0;
        let mut detected = 0;
        for slot in &self.slots {
            match slot.status {
                SlotStatus::Alive => running += 1,
                SlotStatus::Detected => detected += 1,
                SlotStatus::Empty => {}
            }
        }
        self.running = running;
        self.detected = detected;
    }
}

/// Builds the per-slot RNG streams for a driver seed.
pub(crate) fn slot_rngs(seed: u64, capacity: usize) -> Vec<SmallRng> {
    (0..capacity as u64)
        .map(|slot| SmallRng::seed_from_u64(seed.wrapping_add((slot + 1).wrapping_mul(SEED_GAMMA))))
        .collect()
}

/// Advances one slot by exactly one physics event.
///
/// The event is either the nearest boundary crossing within the sampled
/// free flight, or the bulk scatter at the end of it. Returns a spawned
/// secondary (with the parent's tag) for the caller to place; secondaries
/// below the absorption threshold are dropped at birth.
pub(crate) fn step_slot<P: PhysicsModel>(
    slot: &mut Slot,
    rng: &mut SmallRng,
    scene: &Scene,
    physics: &P,
    threshold: f32,
) -> Option<(Particle, u32)> {
    if slot.status != SlotStatus::Alive {
        return None;
    }

    let flight = physics.free_flight(slot.particle.material, slot.particle.energy, rng);
    let step = flight.map_or(f32::INFINITY, |f| f.distance);
    let mut spawned = None;

    match scene.trace(slot.particle.position, slot.particle.direction, step, slot.last_hit) {
        Some(hit) => {
            let particle = &mut slot.particle;
            particle.position += particle.direction * hit.distance;
            slot.last_hit = Some(hit.triangle);

            let triangle = scene.triangle(hit.triangle);
            let outward = triangle.normal();
            let target = if particle.direction.dot(&outward) >= 0.0 {
                triangle.material_out
            } else {
                triangle.material_in
            };

            if target == VACUUM
                && !particle.in_vacuum()
                && particle.energy <= physics.barrier(particle.material)
            {
                // Below the barrier the surface is a mirror
                particle.direction = particle.direction.reflect(&outward);
            } else if triangle.detector {
                slot.status = SlotStatus::Detected;
            } else {
                particle.material = target;
            }
        }
        None => match flight {
            Some(flight) => {
                let particle = &mut slot.particle;
                particle.position += particle.direction * flight.distance;
                slot.last_hit = None;
                if let Some(secondary) = physics.scatter(flight.kind, particle, rng) {
                    if secondary.energy >= threshold && secondary.energy > 0.0 {
                        spawned = Some((secondary, slot.tag));
                    }
                }
            }
            // Unbounded flight with nothing ahead: the electron left the domain
            None => slot.status = SlotStatus::Empty,
        },
    }

    if slot.status == SlotStatus::Alive && slot.particle.energy < threshold {
        // Absorbed; terminated slots free immediately
        slot.status = SlotStatus::Empty;
    }
    spawned
}

/// Scalar simulation driver: one worker thread advancing its own slab.
///
/// Construction takes the slab capacity, the geometry handle (which is also
/// the intersector), the physics bundle, the absorption threshold and the
/// RNG seed. The public operations are total over valid inputs and
/// single-threaded per instance.
pub struct Driver<'a, P: PhysicsModel> {
    pub(crate) store: ParticleStore,
    pub(crate) rngs: Vec<SmallRng>,
    pub(crate) scene: &'a Scene,
    pub(crate) physics: &'a P,
    pub(crate) threshold: f32,
}

impl<'a, P: PhysicsModel> Driver<'a, P> {
    pub fn new(capacity: usize, scene: &'a Scene, physics: &'a P, threshold: f32, seed: u64) -> Self {
        Driver {
            store: ParticleStore::new(capacity),
            rngs: slot_rngs(seed, capacity),
            scene,
            physics,
            threshold,
        }
    }

    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Injects up to `n` particles into empty slots; returns the count
    /// actually placed.
    pub fn push(&mut self, particles: &[Particle], tags: &[u32]) -> usize {
        self.store.push(particles, tags)
    }

    /// Advances every alive slot by exactly one physics event.
    pub fn do_iteration(&mut self) {
        let mut secondaries: Vec<(Particle, u32)> = Vec::new();
        for (slot, rng) in self.store.slots.iter_mut().zip(self.rngs.iter_mut()) {
            if let Some(spawn) = step_slot(slot, rng, self.scene, self.physics, self.threshold) {
                secondaries.push(spawn);
            }
        }
        self.store.recount();
        self.store.absorb_secondaries(secondaries);
    }

    /// Number of alive slots.
    pub fn get_running_count(&self) -> u32 {
        self.store.running() as u32
    }

    /// Number of detected-but-not-flushed slots.
    pub fn get_detected_count(&self) -> u32 {
        self.store.detected() as u32
    }

    /// Drains every detected slot through the callback; returns the
    /// post-flush running count.
    pub fn flush_detected(&mut self, callback: impl FnMut(&Particle, u32)) -> u32 {
        self.store.flush_detected(callback)
    }
}
