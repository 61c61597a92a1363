//! Material files in their two accepted formats.
//!
//! Dispatch is by filename suffix: an extension ending in `t` (the legacy
//! convention, e.g. `.mat`) is the packed bincode form; anything else is
//! the hierarchical self-describing JSON form. Both decode to the same
//! in-memory [`Material`].

use crate::error::SimError;
use crate::material::Material;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Whether a path selects the legacy packed format.
fn is_legacy(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.ends_with('t'))
}

/// Loads one material file, dispatching on the suffix.
pub fn load_material(path: &Path) -> Result<Material, SimError> {
    let bytes = super::read_input(path)?;
    let material: Material = if is_legacy(path) {
        bincode::deserialize(&bytes)?
    } else {
        serde_json::from_slice(&bytes)?
    };
    if !material.is_consistent() {
        return Err(SimError::InputInconsistent(format!(
            "{}: scatter tables are malformed",
            path.display()
        )));
    }
    Ok(material)
}

/// Loads the material table in id order: the file at position `i` becomes
/// material id `i`.
pub fn load_materials(paths: &[PathBuf]) -> Result<Vec<Material>, SimError> {
    paths.iter().map(|path| load_material(path)).collect()
}

/// Writes a material in the legacy packed format.
pub fn save_material_legacy(path: &Path, material: &Material) -> Result<(), SimError> {
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, material)?;
    Ok(())
}

/// Writes a material in the hierarchical JSON format.
pub fn save_material(path: &Path, material: &Material) -> Result<(), SimError> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, material)?;
    Ok(())
}
