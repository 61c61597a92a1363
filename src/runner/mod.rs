//! # Runner Module - Orchestration of a Simulation Run
//!
//! The orchestrator loads the inputs, publishes them to a pool of workers,
//! drives the phase ladder, probes progress once a second, and joins
//! everything at the end. Two variants share the scaffolding:
//!
//! - **batched** (`execute_batched` / `simulate_batched`): one bulk-parallel
//!   [`BatchedDriver`] per configured device, tuned by the prescan pilot on
//!   worker 0 and running the staged steady-state pipeline.
//! - **cpu** (`execute_cpu` / `simulate_cpu`): one scalar [`Driver`] per
//!   hardware thread with a small slab, pushing and draining every
//!   iteration.
//!
//! The `simulate_*` entry points take already-loaded inputs and are generic
//! over the physics bundle, which is how the integration tests drive the
//! whole pipeline with deterministic stand-in physics.
//!
//! ## Submodules
//!
//! - [`phase`]: the monotone phase broadcast
//! - [`tests`]: unit tests for configuration validation and phases

pub mod phase;

use crate::driver::Driver;
use crate::driver::batched::BatchedDriver;
use crate::driver::prescan::{Tuning, run_prescan};
use crate::error::SimError;
use crate::geometry::Scene;
use crate::io;
use crate::io::primaries::PrimarySet;
use crate::material::Material;
use crate::output::{DetectedRecord, OutputBuffer, OutputSink};
use crate::particle::{Particle, Pixel};
use crate::pool::WorkPool;
use crate::runner::phase::{Phase, PhaseBoard};
use crate::scatter::{MaterialPhysics, PhysicsModel};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Stream-splitting constant for per-worker seeds.
const SEED_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

/// Slab capacity of one scalar cpu worker.
const CPU_SLAB: usize = 4096;
/// Primaries a cpu worker pulls from the pool per iteration, at most.
const CPU_CHUNK: usize = 256;

/// Everything the command line configures about a run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Kinetic energy (eV) below which electrons are absorbed.
    pub energy_threshold: f32,
    /// Slab capacity of each batched driver.
    pub capacity: usize,
    /// Pilot population for the tuning prescan.
    pub prescan_size: usize,
    /// Headroom fraction for steady-state slab occupancy.
    pub batch_factor: f64,
    /// Master RNG seed; workers and slots derive their streams from it.
    pub seed: u64,
    /// Sort primaries by pixel before tags are assigned.
    pub sort_primaries: bool,
    /// Batched workers to boot.
    pub devices: usize,
    /// Scalar cpu workers to boot; 0 means one per hardware thread.
    pub threads: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            energy_threshold: 0.0,
            capacity: 1_000_000,
            prescan_size: 1000,
            batch_factor: 0.9,
            seed: 0x14f8_214e_78c7_e39b,
            sort_primaries: false,
            devices: 1,
            threads: 0,
        }
    }
}

impl RunConfig {
    /// Checks the knobs the batched pipeline depends on.
    pub fn validate_batched(&self) -> Result<(), SimError> {
        self.validate_common()?;
        if self.capacity == 0 {
            return Err(SimError::BadArgs("capacity must be positive".into()));
        }
        if self.prescan_size == 0 {
            return Err(SimError::BadArgs("prescan size must be positive".into()));
        }
        if !(self.batch_factor > 0.0) {
            return Err(SimError::BadArgs("batch factor must be positive".into()));
        }
        if self.batch_factor > 1.0 {
            warn!(
                "batch factor {} leaves no headroom; the slab may saturate",
                self.batch_factor
            );
        }
        if self.devices == 0 {
            return Err(SimError::BadArgs("at least one device is required".into()));
        }
        Ok(())
    }

    /// Checks the knobs the scalar variant depends on.
    pub fn validate_cpu(&self) -> Result<(), SimError> {
        self.validate_common()
    }

    fn validate_common(&self) -> Result<(), SimError> {
        if !self.energy_threshold.is_finite() || self.energy_threshold < 0.0 {
            return Err(SimError::BadArgs(
                "energy threshold must be finite and non-negative".into(),
            ));
        }
        Ok(())
    }

    fn worker_seed(&self, worker: usize) -> u64 {
        self.seed
            .wrapping_add((worker as u64 + 1).wrapping_mul(SEED_GAMMA))
    }
}

/// What a finished run did.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub primaries: usize,
    pub detected: u64,
    pub workers: usize,
    pub elapsed: Duration,
}

/// Funnels flushed records into a per-worker output buffer, pairing each
/// tag with its pixel. Driver flush callbacks cannot return errors, so the
/// first write failure is parked here and reported by `finish`.
struct RecordWriter<'a> {
    buffer: OutputBuffer,
    pixels: &'a [Pixel],
    detected: u64,
    error: Option<std::io::Error>,
}

impl<'a> RecordWriter<'a> {
    fn new(buffer: OutputBuffer, pixels: &'a [Pixel]) -> Self {
        RecordWriter {
            buffer,
            pixels,
            detected: 0,
            error: None,
        }
    }

    fn write(&mut self, particle: &Particle, tag: u32) {
        if self.error.is_some() {
            return;
        }
        let record = DetectedRecord::new(particle, self.pixels[tag as usize]);
        match self.buffer.add(&record) {
            Ok(()) => self.detected += 1,
            Err(e) => self.error = Some(e),
        }
    }

    fn finish(mut self) -> Result<u64, SimError> {
        if let Some(error) = self.error.take() {
            return Err(error.into());
        }
        self.buffer.flush()?;
        Ok(self.detected)
    }
}

/// Verifies that every material id the geometry references has a loaded
/// material. Surplus materials are only worth a warning.
pub fn check_material_coverage(scene: &Scene, materials: &[Material]) -> Result<(), SimError> {
    match scene.max_material_id() {
        Some(max_id) => {
            let needed = max_id as usize + 1;
            if materials.len() < needed {
                return Err(SimError::InputInconsistent(format!(
                    "geometry references material id {} but only {} materials were loaded",
                    max_id,
                    materials.len()
                )));
            }
            if materials.len() > needed {
                warn!(
                    "{} materials loaded but the geometry uses only {}",
                    materials.len(),
                    needed
                );
            }
        }
        None => {
            if !materials.is_empty() {
                warn!("geometry is vacuum-only; loaded materials are unused");
            }
        }
    }
    Ok(())
}

/// Loads all inputs for a run and builds the acceleration structure.
fn load_inputs(
    geometry: &Path,
    primaries: &Path,
    materials: &[PathBuf],
    board: &PhaseBoard,
) -> Result<(Scene, Vec<Material>, PrimarySet), SimError> {
    let started = Instant::now();
    let triangles = io::geometry::load_triangles(geometry)?;
    let scene = Scene::new(triangles);
    board.advance(Phase::GeometryLoaded);
    info!(
        "geometry: {} triangles loaded in {:.2?}",
        scene.triangles().len(),
        started.elapsed()
    );

    let materials = io::material::load_materials(materials)?;
    check_material_coverage(&scene, &materials)?;
    board.advance(Phase::MaterialsLoaded);
    info!("materials: {} regions", materials.len());

    let primaries = io::primaries::load_primaries(primaries, scene.bounds())?;
    info!("primaries: {} loaded", primaries.len());
    Ok((scene, materials, primaries))
}

/// Loads inputs and runs the batched (device-style) pipeline.
pub fn execute_batched(
    config: &RunConfig,
    geometry: &Path,
    primaries: &Path,
    materials: &[PathBuf],
    sink: OutputSink,
) -> Result<RunSummary, SimError> {
    config.validate_batched()?;
    let board = PhaseBoard::new();
    let (scene, materials, primaries) = load_inputs(geometry, primaries, materials, &board)?;
    let physics = MaterialPhysics::new(materials);
    let summary = simulate_batched_on(config, &scene, &physics, primaries, sink, board)?;
    info!(
        "detected {} of {} primaries with {} device(s) in {:.2?}",
        summary.detected, summary.primaries, summary.workers, summary.elapsed
    );
    Ok(summary)
}

/// Loads inputs and runs the scalar per-thread pipeline.
pub fn execute_cpu(
    config: &RunConfig,
    geometry: &Path,
    primaries: &Path,
    materials: &[PathBuf],
    sink: OutputSink,
) -> Result<RunSummary, SimError> {
    config.validate_cpu()?;
    let board = PhaseBoard::new();
    let (scene, materials, primaries) = load_inputs(geometry, primaries, materials, &board)?;
    let physics = MaterialPhysics::new(materials);
    let summary = simulate_cpu_on(config, &scene, &physics, primaries, sink, board)?;
    info!(
        "detected {} of {} primaries with {} thread(s) in {:.2?}",
        summary.detected, summary.primaries, summary.workers, summary.elapsed
    );
    Ok(summary)
}

/// Runs the batched pipeline over already-loaded inputs.
pub fn simulate_batched<P: PhysicsModel>(
    config: &RunConfig,
    scene: &Scene,
    physics: &P,
    primaries: PrimarySet,
    sink: OutputSink,
) -> Result<RunSummary, SimError> {
    config.validate_batched()?;
    let board = PhaseBoard::new();
    board.advance(Phase::MaterialsLoaded);
    simulate_batched_on(config, scene, physics, primaries, sink, board)
}

fn simulate_batched_on<P: PhysicsModel>(
    config: &RunConfig,
    scene: &Scene,
    physics: &P,
    mut primaries: PrimarySet,
    sink: OutputSink,
    board: PhaseBoard,
) -> Result<RunSummary, SimError> {
    if primaries.is_empty() {
        return Err(SimError::InputMissing("no primaries to simulate".into()));
    }
    if config.sort_primaries {
        primaries.sort_by_pixel();
    }
    // Pull a representative pilot to the front so the prescan is unbiased
    primaries.prescan_shuffle(config.prescan_size, config.seed);

    let total = primaries.len();
    let (particles, pixels) = primaries.split();
    let tags: Vec<u32> = (0..total as u32).collect();
    let pool = WorkPool::new(&particles, &tags);
    board.advance(Phase::PrimariesLoaded);

    let tuning: Mutex<Option<Tuning>> = Mutex::new(None);
    let started = Instant::now();
    let detected = fan_out(config.devices, &pool, |worker, probe| {
        board.wait_for(Phase::PrimariesLoaded);
        batched_worker(
            worker, config, scene, physics, &pool, &pixels, &sink, &board, &tuning, probe,
        )
    })?;
    sink.flush()?;

    Ok(RunSummary {
        primaries: total,
        detected,
        workers: config.devices,
        elapsed: started.elapsed(),
    })
}

/// Runs the scalar pipeline over already-loaded inputs.
pub fn simulate_cpu<P: PhysicsModel>(
    config: &RunConfig,
    scene: &Scene,
    physics: &P,
    primaries: PrimarySet,
    sink: OutputSink,
) -> Result<RunSummary, SimError> {
    config.validate_cpu()?;
    let board = PhaseBoard::new();
    board.advance(Phase::MaterialsLoaded);
    simulate_cpu_on(config, scene, physics, primaries, sink, board)
}

fn simulate_cpu_on<P: PhysicsModel>(
    config: &RunConfig,
    scene: &Scene,
    physics: &P,
    primaries: PrimarySet,
    sink: OutputSink,
    board: PhaseBoard,
) -> Result<RunSummary, SimError> {
    if primaries.is_empty() {
        return Err(SimError::InputMissing("no primaries to simulate".into()));
    }
    let workers = if config.threads == 0 {
        thread::available_parallelism().map_or(1, |n| n.get())
    } else {
        config.threads
    };

    let total = primaries.len();
    let (particles, pixels) = primaries.split();
    let tags: Vec<u32> = (0..total as u32).collect();
    let pool = WorkPool::new(&particles, &tags);
    board.advance(Phase::PrimariesLoaded);
    // No prescan phase in the scalar variant; release waiters immediately
    board.advance(Phase::PrescanDone);

    let started = Instant::now();
    let detected = fan_out(workers, &pool, |worker, probe| {
        board.wait_for(Phase::PrescanDone);
        cpu_worker(worker, config, scene, physics, &pool, &pixels, &sink, probe)
    })?;
    sink.flush()?;

    Ok(RunSummary {
        primaries: total,
        detected,
        workers,
        elapsed: started.elapsed(),
    })
}

/// Spawns the workers and the progress probe, joins them all, and folds the
/// per-worker detection counts. A panicking worker surfaces as a device
/// failure after every other worker has been joined.
fn fan_out<F>(workers: usize, pool: &WorkPool<'_>, worker_fn: F) -> Result<u64, SimError>
where
    F: Fn(usize, &AtomicU32) -> Result<u64, SimError> + Sync,
{
    let running: Vec<AtomicU32> = (0..workers).map(|_| AtomicU32::new(0)).collect();
    let stop_probe = AtomicBool::new(false);
    let worker_fn = &worker_fn;

    thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let probe = &running[worker];
                scope.spawn(move || worker_fn(worker, probe))
            })
            .collect();
        let probe_handle = scope.spawn(|| progress_probe(pool, &running, &stop_probe));

        let mut detected = 0u64;
        let mut first_error: Option<SimError> = None;
        for (worker, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(Ok(count)) => detected += count,
                Ok(Err(error)) => {
                    first_error.get_or_insert(error);
                }
                Err(_) => {
                    first_error
                        .get_or_insert(SimError::Device(format!("worker {worker} panicked")));
                }
            }
        }
        stop_probe.store(true, Ordering::Relaxed);
        let _ = probe_handle.join();

        first_error.map_or(Ok(detected), Err)
    })
}

/// Logs completion percentage and per-worker running counts once a second.
///
/// The counts are loose-consistency telemetry written by the owning workers;
/// nothing here participates in correctness.
fn progress_probe(pool: &WorkPool<'_>, running: &[AtomicU32], stop: &AtomicBool) {
    let total = pool.total().max(1) as f64;
    'report: loop {
        // One-second cadence, but wake often enough to exit promptly
        for _ in 0..10 {
            if stop.load(Ordering::Relaxed) {
                break 'report;
            }
            thread::sleep(Duration::from_millis(100));
        }
        let percent = 100.0 * (1.0 - pool.primaries_to_go() as f64 / total);
        let counts: Vec<u32> = running.iter().map(|c| c.load(Ordering::Relaxed)).collect();
        info!("progress {:5.1}% | running {:?}", percent, counts);
    }
}

/// The steady-state pipeline of one batched worker.
///
/// Worker 0 runs the prescan pilot and publishes the tuning; everyone else
/// blocks on the phase board until it lands. The loop then interleaves
/// draining detected records, completing staged pushes, a frame of
/// iterations, and staging the next batch, until the pool is drained and
/// the slab and staging regions are empty.
#[allow(clippy::too_many_arguments)]
fn batched_worker<P: PhysicsModel>(
    worker: usize,
    config: &RunConfig,
    scene: &Scene,
    physics: &P,
    pool: &WorkPool<'_>,
    pixels: &[Pixel],
    sink: &OutputSink,
    board: &PhaseBoard,
    shared_tuning: &Mutex<Option<Tuning>>,
    probe: &AtomicU32,
) -> Result<u64, SimError> {
    let mut driver = BatchedDriver::new(
        config.capacity,
        scene,
        physics,
        config.energy_threshold,
        config.worker_seed(worker),
    );
    let mut writer = RecordWriter::new(OutputBuffer::new(sink.clone()), pixels);

    let tuning = if worker == 0 {
        let tuning = run_prescan(&mut driver, pool, config.prescan_size, config.batch_factor);
        // Pilot detections are real detections
        driver.flush_detected(|particle, tag| writer.write(particle, tag));
        *shared_tuning.lock().unwrap() = Some(tuning);
        board.advance(Phase::PrescanDone);
        info!(
            "prescan: frame size {} batch size {}",
            tuning.frame_size, tuning.batch_size
        );
        tuning
    } else {
        board.wait_for(Phase::PrescanDone);
        shared_tuning
            .lock()
            .unwrap()
            .expect("tuning is published before the prescan phase advances")
    };

    driver.allocate_input_buffers(tuning.batch_size);
    loop {
        driver.buffer_detected();
        driver.push_to_simulation();
        for _ in 0..tuning.frame_size {
            driver.do_iteration();
        }
        driver.push_to_buffer(pool);
        driver.flush_buffered(|particle, tag| writer.write(particle, tag));
        probe.store(driver.get_running_count(), Ordering::Relaxed);

        if driver.get_running_count() == 0 && pool.done() && driver.staged_input() == 0 {
            break;
        }
    }
    // The final frame's detections are still in the slab
    driver.buffer_detected();
    driver.flush_buffered(|particle, tag| writer.write(particle, tag));
    probe.store(0, Ordering::Relaxed);
    writer.finish()
}

/// The loop of one scalar cpu worker: top up from the pool, advance one
/// event, drain detections, until the pool is dry and the slab is empty.
fn cpu_worker<P: PhysicsModel>(
    worker: usize,
    config: &RunConfig,
    scene: &Scene,
    physics: &P,
    pool: &WorkPool<'_>,
    pixels: &[Pixel],
    sink: &OutputSink,
    probe: &AtomicU32,
) -> Result<u64, SimError> {
    let mut driver = Driver::new(
        CPU_SLAB,
        scene,
        physics,
        config.energy_threshold,
        config.worker_seed(worker),
    );
    let mut writer = RecordWriter::new(OutputBuffer::new(sink.clone()), pixels);

    loop {
        let occupied = (driver.get_running_count() + driver.get_detected_count()) as usize;
        let want = CPU_CHUNK.min(CPU_SLAB - occupied);
        if want > 0 {
            let work = pool.get_work(want);
            if !work.is_empty() {
                let placed = driver.push(work.particles, work.tags);
                debug_assert_eq!(placed, work.len());
            }
        }

        driver.do_iteration();
        driver.flush_detected(|particle, tag| writer.write(particle, tag));
        probe.store(driver.get_running_count(), Ordering::Relaxed);

        if driver.get_running_count() == 0 && pool.done() {
            break;
        }
    }
    writer.finish()
}
