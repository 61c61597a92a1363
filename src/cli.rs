//! # CLI Module - Command Line Interfaces of the Two Simulator Binaries
//!
//! Both binaries share the positional contract
//! `<geometry.tri> <primaries.pri> <material0> [material1…]` and differ in
//! their tuning knobs:
//!
//! - `emcsim` runs the batched device-style pipeline: a large slab per
//!   device, tuned by a prescan pilot.
//! - `emcsim-cpu` runs one scalar driver per hardware thread with a small
//!   slab and no prescan.
//!
//! Everything funnels into a [`RunConfig`]; validation failures surface as
//! `BadArgs` before any input file is touched.

use crate::error::SimError;
use crate::runner::RunConfig;
use clap::Parser;
use std::path::PathBuf;

/// Arguments of the batched (device-style) simulator.
#[derive(Parser, Debug)]
#[command(name = "emcsim", version, about = "Monte Carlo electron-transport simulator")]
pub struct BatchedArgs {
    /// Kinetic energy (eV) below which electrons are absorbed
    #[arg(long = "energy-threshold", default_value_t = 0.0)]
    pub energy_threshold: f32,

    /// Particle slab capacity per device
    #[arg(long, default_value_t = 1_000_000)]
    pub capacity: usize,

    /// Pilot population for the tuning prescan
    #[arg(long = "prescan-size", default_value_t = 1000)]
    pub prescan_size: usize,

    /// Headroom fraction for steady-state slab occupancy
    #[arg(long = "batch-factor", default_value_t = 0.9)]
    pub batch_factor: f64,

    /// Master RNG seed
    #[arg(long, default_value_t = 0x14f8_214e_78c7_e39b)]
    pub seed: u64,

    /// Sort primaries by pixel before tags are assigned
    #[arg(long = "sort-primaries", default_value_t = false)]
    pub sort_primaries: bool,

    /// Number of device workers to boot
    #[arg(long, default_value_t = 1)]
    pub devices: usize,

    /// Write detected records here instead of stdout
    #[arg(long = "detect-filename")]
    pub detect_filename: Option<PathBuf>,

    /// Triangle geometry file
    pub geometry: PathBuf,

    /// Primary electron file
    pub primaries: PathBuf,

    /// Material files, one per material id in file order
    #[arg(required = true)]
    pub materials: Vec<PathBuf>,
}

impl BatchedArgs {
    /// Validated run configuration for the batched pipeline.
    pub fn run_config(&self) -> Result<RunConfig, SimError> {
        let config = RunConfig {
            energy_threshold: self.energy_threshold,
            capacity: self.capacity,
            prescan_size: self.prescan_size,
            batch_factor: self.batch_factor,
            seed: self.seed,
            sort_primaries: self.sort_primaries,
            devices: self.devices,
            ..RunConfig::default()
        };
        config.validate_batched()?;
        Ok(config)
    }
}

/// Arguments of the scalar per-thread simulator.
#[derive(Parser, Debug)]
#[command(
    name = "emcsim-cpu",
    version,
    about = "Monte Carlo electron-transport simulator (scalar per-thread variant)"
)]
pub struct CpuArgs {
    /// Kinetic energy (eV) below which electrons are absorbed
    #[arg(long = "energy-threshold", default_value_t = 0.0)]
    pub energy_threshold: f32,

    /// Master RNG seed
    #[arg(long, default_value_t = 0x14f8_214e_78c7_e39b)]
    pub seed: u64,

    /// Write detected records here instead of stdout
    #[arg(long = "detect-filename")]
    pub detect_filename: Option<PathBuf>,

    /// Worker threads; 0 means one per hardware thread
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    /// Triangle geometry file
    pub geometry: PathBuf,

    /// Primary electron file
    pub primaries: PathBuf,

    /// Material files, one per material id in file order
    #[arg(required = true)]
    pub materials: Vec<PathBuf>,
}

impl CpuArgs {
    /// Validated run configuration for the scalar pipeline.
    pub fn run_config(&self) -> Result<RunConfig, SimError> {
        let config = RunConfig {
            energy_threshold: self.energy_threshold,
            seed: self.seed,
            threads: self.threads,
            ..RunConfig::default()
        };
        config.validate_cpu()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batched_defaults_match_the_contract() {
        let args =
            BatchedArgs::parse_from(["emcsim", "sample.tri", "beam.pri", "silicon.mat"]);
        assert_eq!(args.energy_threshold, 0.0);
        assert_eq!(args.capacity, 1_000_000);
        assert_eq!(args.prescan_size, 1000);
        assert_eq!(args.batch_factor, 0.9);
        assert_eq!(args.seed, 0x14f8_214e_78c7_e39b);
        assert!(!args.sort_primaries);
        assert_eq!(args.devices, 1);
        assert_eq!(args.materials.len(), 1);
        assert!(args.run_config().is_ok());
    }

    #[test]
    fn materials_are_required() {
        assert!(BatchedArgs::try_parse_from(["emcsim", "sample.tri", "beam.pri"]).is_err());
        assert!(CpuArgs::try_parse_from(["emcsim-cpu", "sample.tri", "beam.pri"]).is_err());
    }

    #[test]
    fn bad_tuning_knobs_become_bad_args() {
        let args = BatchedArgs::parse_from([
            "emcsim",
            "--prescan-size",
            "0",
            "sample.tri",
            "beam.pri",
            "silicon.mat",
        ]);
        assert!(matches!(args.run_config(), Err(SimError::BadArgs(_))));
    }

    #[test]
    fn cpu_variant_parses_its_reduced_option_set() {
        let args = CpuArgs::parse_from([
            "emcsim-cpu",
            "--energy-threshold",
            "50",
            "--threads",
            "2",
            "sample.tri",
            "beam.pri",
            "a.mat",
            "b.json",
        ]);
        assert_eq!(args.energy_threshold, 50.0);
        assert_eq!(args.materials.len(), 2);
        let config = args.run_config().unwrap();
        assert_eq!(config.threads, 2);
    }
}
