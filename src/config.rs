use crate::system::ParticleSystem;
use color_eyre::eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Boltzmann constant in SI units.
const BOLTZMANN: f64 = 1.380_648_52e-23;

/// User-facing simulation parameters in SI units.
///
/// Reduced (Lennard-Jones) units for the engine are derived from these via
/// [`McConfig::reduced`]. Defaults reproduce liquid argon.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct McConfig {
    /// Temperature in Kelvin
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Particle mass in kilograms
    #[serde(default = "default_mass")]
    pub mass: f64,
    /// Density in kg / m^3
    #[serde(default = "default_density")]
    pub density: f64,
    /// Lennard-Jones collision diameter in meters
    #[serde(default = "default_sigma")]
    pub sigma: f64,
    /// Lennard-Jones well depth in Joules
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    /// Potential cutoff as a multiple of sigma
    #[serde(default = "default_cutoff_multiplier")]
    pub cutoff_multiplier: f64,
    /// Initial maximum trial displacement as a multiple of sigma
    #[serde(default = "default_displacement_multiplier")]
    pub displacement_multiplier: f64,
    /// Number of Monte Carlo steps
    #[serde(default = "default_n_steps")]
    pub n_steps: usize,
    /// Reporting (and tuning) interval in steps
    #[serde(default = "default_freq")]
    pub freq: usize,
    /// Number of particles
    #[serde(default = "default_num_particles")]
    pub num_particles: usize,
    /// Whether to tune the maximum displacement during the run
    #[serde(default = "default_tune_displacement")]
    pub tune_displacement: bool,
    /// Seed for the coordinator's single random stream
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// How the initial configuration is built
    #[serde(default)]
    pub initial_state: InitialState,
}

/// Initial-configuration source.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "method")]
pub enum InitialState {
    /// Seeded uniform placement inside the box
    #[serde(rename = "random")]
    Random,
    /// Fixed-column coordinate file (two-line header, columns 1..4)
    #[serde(rename = "file")]
    File { path: PathBuf },
}

impl Default for InitialState {
    fn default() -> Self {
        InitialState::Random
    }
}

fn default_temperature() -> f64 {
    120.0
}
fn default_mass() -> f64 {
    39.948 * 1.66054e-27
}
fn default_density() -> f64 {
    1500.0
}
fn default_sigma() -> f64 {
    3.4e-10
}
fn default_epsilon() -> f64 {
    1.65e-21
}
fn default_cutoff_multiplier() -> f64 {
    3.0
}
fn default_displacement_multiplier() -> f64 {
    0.1
}
fn default_n_steps() -> usize {
    100
}
fn default_freq() -> usize {
    10
}
fn default_num_particles() -> usize {
    100
}
fn default_tune_displacement() -> bool {
    true
}
fn default_seed() -> u64 {
    1
}

impl Default for McConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            mass: default_mass(),
            density: default_density(),
            sigma: default_sigma(),
            epsilon: default_epsilon(),
            cutoff_multiplier: default_cutoff_multiplier(),
            displacement_multiplier: default_displacement_multiplier(),
            n_steps: default_n_steps(),
            freq: default_freq(),
            num_particles: default_num_particles(),
            tune_displacement: default_tune_displacement(),
            seed: default_seed(),
            initial_state: InitialState::default(),
        }
    }
}

impl McConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).wrap_err_with(|| {
            format!(
                "unable to read configuration file: {}",
                path.as_ref().display()
            )
        })?;
        let config: McConfig =
            serde_yml::from_str(&content).wrap_err("failed to parse configuration file")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject parameter values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.temperature <= 0.0 {
            return Err(eyre!("temperature must be positive"));
        }
        if self.mass <= 0.0 {
            return Err(eyre!("mass must be positive"));
        }
        if self.density <= 0.0 {
            return Err(eyre!("density must be positive"));
        }
        if self.sigma <= 0.0 {
            return Err(eyre!("sigma must be positive"));
        }
        if self.epsilon <= 0.0 {
            return Err(eyre!("epsilon must be positive"));
        }
        if self.cutoff_multiplier <= 0.0 {
            return Err(eyre!("cutoff multiplier must be positive"));
        }
        if self.displacement_multiplier <= 0.0 {
            return Err(eyre!("displacement multiplier must be positive"));
        }
        if self.num_particles < 2 {
            return Err(eyre!("at least two particles are required"));
        }
        if self.n_steps == 0 {
            return Err(eyre!("number of steps must be positive"));
        }
        if self.freq == 0 {
            return Err(eyre!("reporting frequency must be positive"));
        }
        Ok(())
    }

    /// Derive the reduced-unit parameters the engine consumes.
    pub fn reduced(&self) -> ReducedParameters {
        let reduced_temperature = self.temperature / (self.epsilon / BOLTZMANN);
        let reduced_density = self.density / (self.mass / self.sigma.powi(3));
        let box_length = (self.num_particles as f64 / reduced_density).cbrt();
        // With lengths measured in sigma, the reduced cutoff is the multiplier.
        let cutoff = self.cutoff_multiplier;

        ReducedParameters {
            reduced_temperature,
            beta: 1.0 / reduced_temperature,
            cutoff,
            cutoff2: cutoff * cutoff,
            box_length,
            num_particles: self.num_particles,
            n_steps: self.n_steps,
            freq: self.freq,
            tune_displacement: self.tune_displacement,
            max_displacement: self.displacement_multiplier,
        }
    }

    /// Build the initial configuration on the coordinating rank.
    pub fn build_system(&self, params: &ReducedParameters) -> Result<ParticleSystem> {
        match &self.initial_state {
            InitialState::Random => Ok(ParticleSystem::random(
                self.num_particles,
                params.box_length,
                self.seed,
            )),
            InitialState::File { path } => {
                let system = ParticleSystem::from_file(path, params.box_length)?;
                if system.n_particles() != self.num_particles {
                    return Err(eyre!(
                        "coordinate file holds {} particles but num_particles is {}",
                        system.n_particles(),
                        self.num_particles
                    ));
                }
                Ok(system)
            }
        }
    }
}

/// Per-run parameters in reduced units (sigma = epsilon = k_B = 1).
///
/// Immutable for the lifetime of the run except `max_displacement`, which is
/// updated only by the displacement tuner.
#[derive(Debug, Clone)]
pub struct ReducedParameters {
    pub reduced_temperature: f64,
    pub beta: f64,
    pub cutoff: f64,
    pub cutoff2: f64,
    pub box_length: f64,
    pub num_particles: usize,
    pub n_steps: usize,
    pub freq: usize,
    pub tune_displacement: bool,
    pub max_displacement: f64,
}
