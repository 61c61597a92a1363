//! Primary-electron files and the in-memory primary set.
//!
//! A `.pri` file is a bincode list of `(particle, pixel)` pairs. The loader
//! drops particles whose position lies outside the geometry bounding box;
//! they could never interact with the sample and would only dilute the
//! prescan statistics.

use crate::error::SimError;
use crate::geometry::Aabb;
use crate::particle::{Particle, Pixel};
use log::warn;
use rand::prelude::*;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// The loaded primaries of a run, still paired with their pixels.
///
/// Order matters: once the orchestrator has sorted and shuffled the set,
/// the index of an entry becomes its injection tag, and the split-off pixel
/// vector is the tag-indexed map the output stage reads.
#[derive(Debug, Clone, Default)]
pub struct PrimarySet {
    entries: Vec<(Particle, Pixel)>,
}

impl PrimarySet {
    pub fn new(entries: Vec<(Particle, Pixel)>) -> Self {
        PrimarySet { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(Particle, Pixel)] {
        &self.entries
    }

    /// Orders the set by scan position, row-major.
    pub fn sort_by_pixel(&mut self) {
        self.entries.sort_by_key(|(_, pixel)| (pixel.y, pixel.x));
    }

    /// Moves a uniform sample of `pilot` entries to the front (partial
    /// Fisher–Yates, seeded) so the prescan pilot is representative even on
    /// sorted input.
    pub fn prescan_shuffle(&mut self, pilot: usize, seed: u64) {
        let n = self.entries.len();
        let mut rng = StdRng::seed_from_u64(seed);
        for i in 0..pilot.min(n) {
            let j = rng.random_range(i..n);
            self.entries.swap(i, j);
        }
    }

    /// Splits into the particle array the work pool serves and the
    /// tag-indexed pixel map.
    pub fn split(self) -> (Vec<Particle>, Vec<Pixel>) {
        self.entries.into_iter().unzip()
    }
}

/// Loads a `.pri` file, keeping only primaries that start inside `bounds`.
pub fn load_primaries(path: &Path, bounds: &Aabb) -> Result<PrimarySet, SimError> {
    let bytes = super::read_input(path)?;
    let entries: Vec<(Particle, Pixel)> = bincode::deserialize(&bytes)?;
    let total = entries.len();

    let kept: Vec<(Particle, Pixel)> = entries
        .into_iter()
        .filter(|(particle, _)| bounds.contains(&particle.position))
        .collect();
    if kept.len() < total {
        warn!(
            "{}: dropped {} of {} primaries outside the geometry bounds",
            path.display(),
            total - kept.len(),
            total
        );
    }
    if kept.is_empty() {
        return Err(SimError::InputMissing(format!(
            "{} holds no primaries inside the geometry bounds",
            path.display()
        )));
    }
    Ok(PrimarySet::new(kept))
}

/// Writes a primary list in the format `load_primaries` reads.
pub fn save_primaries(path: &Path, entries: &[(Particle, Pixel)]) -> Result<(), SimError> {
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, entries)?;
    Ok(())
}
