//! Prescan: a pilot run that tunes the steady-state pipeline.
//!
//! The pilot pushes a small population into an empty driver and iterates it
//! to extinction, sampling the running and pending-detected counts after
//! every iteration. The depth of the population peak gives `frame_size`
//! (iterations between drains); the occupancy accumulator estimates how
//! many simultaneous cohorts the slab hosts at equilibrium and sizes
//! `batch_size` so occupancy peaks near `batch_factor × capacity` without
//! overflowing.

use super::batched::BatchedDriver;
use crate::pool::WorkPool;
use crate::scatter::PhysicsModel;
use log::debug;

/// The tuned pipeline parameters every worker consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tuning {
    /// Iterations executed between drain boundaries.
    pub frame_size: usize,
    /// Particles injected per drain boundary.
    pub batch_size: usize,
}

/// One `(running, detected)` sample per pilot iteration; index 0 is the
/// state right after the pilot push.
pub type PrescanSample = (u32, u32);

/// Runs the pilot population to extinction and derives the tuning.
///
/// The pilot consumes real work from the pool; its detections stay in the
/// driver for the caller to flush. Termination relies on the physics
/// driving every cascade below the threshold or out of the domain.
pub fn run_prescan<P: PhysicsModel>(
    driver: &mut BatchedDriver<'_, P>,
    pool: &WorkPool<'_>,
    prescan_size: usize,
    batch_factor: f64,
) -> Tuning {
    let work = pool.get_work(prescan_size);
    let pushed = driver.push(work.particles, work.tags);

    let mut samples: Vec<PrescanSample> = vec![(pushed as u32, 0)];
    while driver.get_running_count() > 0 {
        driver.do_iteration();
        samples.push((driver.get_running_count(), driver.get_detected_count()));
    }

    let tuning = derive_tuning(&samples, pushed, driver.capacity(), batch_factor);
    debug!(
        "prescan: pilot {} over {} iterations, peak {} running -> frame {} batch {}",
        pushed,
        samples.len() - 1,
        samples.iter().map(|s| s.0).max().unwrap_or(0),
        tuning.frame_size,
        tuning.batch_size,
    );
    tuning
}

/// Derives `(frame_size, batch_size)` from pilot samples.
///
/// `frame_size` is one past the index of the running-count peak: the depth
/// of the typical cascade. The accumulator doubles the peak-index terms to
/// account for the pilot's ramp-up, then adds the running fraction at every
/// further multiple of the peak index; dividing the capacity headroom by it
/// estimates the sustainable batch. The result is clamped to the slab.
pub fn derive_tuning(
    samples: &[PrescanSample],
    pushed: usize,
    capacity: usize,
    batch_factor: f64,
) -> Tuning {
    if samples.is_empty() {
        return Tuning {
            frame_size: 1,
            batch_size: capacity.max(1),
        };
    }
    let population = pushed.max(1) as f64;
    // First index attaining the peak, so ties resolve to the shallower frame
    let mut peak = 0;
    for (i, sample) in samples.iter().enumerate() {
        if sample.0 > samples[peak].0 {
            peak = i;
        }
    }
    let frame_size = peak + 1;

    let (running_at, detected_at) = samples
        .get(frame_size)
        .copied()
        .unwrap_or((0, 0));
    let mut accumulator =
        2.0 * running_at as f64 / population + 2.0 * detected_at as f64 / population;
    let mut index = 2 * frame_size;
    while index < samples.len() {
        accumulator += samples[index].0 as f64 / population;
        index += frame_size;
    }

    let batch_size = if accumulator > 0.0 {
        (batch_factor * capacity as f64 / accumulator).floor() as usize
    } else {
        capacity
    };
    Tuning {
        frame_size,
        batch_size: batch_size.clamp(1, capacity.max(1)),
    }
}
