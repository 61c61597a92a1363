//! # IO Module - Input Loading
//!
//! Loaders for the three input kinds of a run:
//!
//! 1. **Geometry** (`.tri`) → [`geometry`]
//! 2. **Primaries** (`.pri`) → [`primaries`]
//! 3. **Materials** (legacy binary or hierarchical JSON) → [`material`]
//!
//! Binary payloads are bincode; the hierarchical material format is JSON.
//! Each loader also offers a save counterpart so tooling and tests can
//! produce inputs without leaving the crate.

pub mod geometry;
pub mod material;
pub mod primaries;

use crate::error::SimError;
use std::fs;
use std::path::Path;

/// Reads a whole input file, mapping absence and emptiness to
/// [`SimError::InputMissing`].
pub(crate) fn read_input(path: &Path) -> Result<Vec<u8>, SimError> {
    let bytes = fs::read(path)
        .map_err(|e| SimError::InputMissing(format!("{}: {}", path.display(), e)))?;
    if bytes.is_empty() {
        return Err(SimError::InputMissing(format!(
            "{} is empty",
            path.display()
        )));
    }
    Ok(bytes)
}
