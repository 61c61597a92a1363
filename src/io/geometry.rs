//! Triangle-list geometry files.

use crate::error::SimError;
use crate::geometry::Triangle;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Loads the triangle list of a `.tri` file.
///
/// A missing or empty file, and a file decoding to zero triangles, are all
/// [`SimError::InputMissing`]: there is nothing to simulate against.
pub fn load_triangles(path: &Path) -> Result<Vec<Triangle>, SimError> {
    let bytes = super::read_input(path)?;
    let triangles: Vec<Triangle> = bincode::deserialize(&bytes)?;
    if triangles.is_empty() {
        return Err(SimError::InputMissing(format!(
            "{} holds no triangles",
            path.display()
        )));
    }
    Ok(triangles)
}

/// Writes a triangle list in the format `load_triangles` reads.
pub fn save_triangles(path: &Path, triangles: &[Triangle]) -> Result<(), SimError> {
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, triangles)?;
    Ok(())
}
