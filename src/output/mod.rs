//! # Output Module - Detected-Electron Stream
//!
//! Two-level sink. The bottom level is one serialised writer (file or
//! stdout) shared by every worker through a mutex. The top level is a
//! per-worker buffer of fixed byte capacity that appends records locally
//! and pushes a whole buffer through the mutex at a time, so records from
//! different workers interleave only at buffer boundaries, never mid-record.
//!
//! A record is 7 little-endian f32s (position, direction, energy) followed
//! by 2 little-endian i32s (pixel coordinates): 36 bytes, no framing.
//! bincode's fixed-width little-endian layout of [`DetectedRecord`] is
//! exactly this wire format.


use crate::particle::{Particle, Pixel};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Bytes of one detected-electron record on the wire.
pub const RECORD_BYTES: usize = 7 * size_of::<f32>() + 2 * size_of::<i32>();

/// Records a per-worker buffer holds before it flushes to the sink.
pub const BUFFER_RECORDS: usize = 1024;

/// One detected electron as written to the output stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectedRecord {
    pub position: [f32; 3],
    pub direction: [f32; 3],
    pub energy: f32,
    pub pixel: [i32; 2],
}

impl DetectedRecord {
    pub fn new(particle: &Particle, pixel: Pixel) -> Self {
        DetectedRecord {
            position: [particle.position.x, particle.position.y, particle.position.z],
            direction: [
                particle.direction.x,
                particle.direction.y,
                particle.direction.z,
            ],
            energy: particle.energy,
            pixel: [pixel.x, pixel.y],
        }
    }
}

/// Cloneable handle to the serialised bottom-level writer.
///
/// All clones share one writer; `write_all` takes the lock for exactly one
/// buffer, which is the interleaving guarantee of the output contract.
#[derive(Clone)]
pub struct OutputSink {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl OutputSink {
    /// Sink over an arbitrary writer.
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        OutputSink {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Sink writing to standard output.
    pub fn stdout() -> Self {
        Self::new(Box::new(BufWriter::new(io::stdout())))
    }

    /// Sink writing to a freshly created file.
    pub fn create(path: &Path) -> io::Result<Self> {
        Ok(Self::new(Box::new(BufWriter::new(File::create(path)?))))
    }

    /// In-memory sink for tests; the returned handle observes every byte
    /// flushed through the sink.
    pub fn memory() -> (Self, Arc<Mutex<Vec<u8>>>) {
        struct Shared(Arc<Mutex<Vec<u8>>>);
        impl Write for Shared {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let bytes = Arc::new(Mutex::new(Vec::new()));
        (Self::new(Box::new(Shared(Arc::clone(&bytes)))), bytes)
    }

    /// Appends one complete buffer under the writer lock.
    fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap();
        writer.write_all(bytes)
    }

    /// Flushes the underlying writer. Called once after all workers have
    /// drained their buffers.
    pub fn flush(&self) -> io::Result<()> {
        self.writer.lock().unwrap().flush()
    }
}

/// Per-worker append buffer in front of an [`OutputSink`].
pub struct OutputBuffer {
    sink: OutputSink,
    bytes: Vec<u8>,
}

impl OutputBuffer {
    pub fn new(sink: OutputSink) -> Self {
        OutputBuffer {
            sink,
            bytes: Vec::with_capacity(BUFFER_RECORDS * RECORD_BYTES),
        }
    }

    /// Appends one record, pushing the whole buffer to the sink when it
    /// reaches capacity.
    pub fn add(&mut self, record: &DetectedRecord) -> io::Result<()> {
        bincode::serialize_into(&mut self.bytes, record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        debug_assert_eq!(self.bytes.len() % RECORD_BYTES, 0);
        if self.bytes.len() >= BUFFER_RECORDS * RECORD_BYTES {
            self.flush()?;
        }
        Ok(())
    }

    /// Forces the buffered records out to the sink.
    pub fn flush(&mut self) -> io::Result<()> {
        if !self.bytes.is_empty() {
            self.sink.write_all(&self.bytes)?;
            self.bytes.clear();
        }
        Ok(())
    }

    /// Records currently buffered locally.
    pub fn pending(&self) -> usize {
        self.bytes.len() / RECORD_BYTES
    }
}

impl Drop for OutputBuffer {
    /// Best-effort drain so records survive early unwinds; workers still
    /// flush explicitly on the shutdown path where errors can be reported.
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
