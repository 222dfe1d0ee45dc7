use color_eyre::eyre::{eyre, Result, WrapErr};
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::Path;

/// A periodic cubic box of Lennard-Jones particles in reduced units.
///
/// The coordinates are owned authoritatively by the coordinating rank and
/// re-broadcast to the rest of the group every step; every other rank only
/// ever holds a receive buffer of the same shape.
#[derive(Debug, Clone)]
pub struct ParticleSystem {
    /// Particle positions, kept wrapped to [-L/2, L/2) on every axis.
    pub positions: Vec<Vector3<f64>>,
    /// Edge length of the cubic box.
    pub box_length: f64,
}

impl ParticleSystem {
    /// Build a system from seeded uniform random positions inside the box.
    pub fn random(num_particles: usize, box_length: f64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let positions = (0..num_particles)
            .map(|_| {
                Vector3::new(
                    (rng.gen::<f64>() - 0.5) * box_length,
                    (rng.gen::<f64>() - 0.5) * box_length,
                    (rng.gen::<f64>() - 0.5) * box_length,
                )
            })
            .collect();
        Self {
            positions,
            box_length,
        }
    }

    /// Build a system from a fixed-column coordinate file.
    ///
    /// The format is the NIST LJ-fluid configuration layout: a two-line
    /// header, then one particle per line with the position in whitespace
    /// columns 1..4 (column 0 is an atom label).
    pub fn from_file<P: AsRef<Path>>(path: P, box_length: f64) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).wrap_err_with(|| {
            format!(
                "unable to read coordinate file: {}",
                path.as_ref().display()
            )
        })?;

        let mut positions = Vec::new();
        for (lineno, line) in content.lines().enumerate().skip(2) {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return Err(eyre!(
                    "coordinate file line {}: expected 4 columns, found {}",
                    lineno + 1,
                    fields.len()
                ));
            }
            let mut coords = [0.0; 3];
            for (k, field) in fields[1..4].iter().enumerate() {
                coords[k] = field.parse::<f64>().wrap_err_with(|| {
                    format!("coordinate file line {}: malformed number", lineno + 1)
                })?;
            }
            positions.push(Vector3::new(coords[0], coords[1], coords[2]));
        }

        if positions.is_empty() {
            return Err(eyre!("coordinate file contains no particles"));
        }

        Ok(Self {
            positions,
            box_length,
        })
    }

    /// An all-zero configuration used as a receive buffer on non-root ranks.
    pub fn empty(num_particles: usize, box_length: f64) -> Self {
        Self {
            positions: vec![Vector3::zeros(); num_particles],
            box_length,
        }
    }

    pub fn n_particles(&self) -> usize {
        self.positions.len()
    }

    /// Wrap one coordinate to [-L/2, L/2).
    fn wrap_component(x: f64, box_length: f64) -> f64 {
        x - box_length * (x / box_length + 0.5).floor()
    }

    /// Wrap a position to the primary box image.
    pub fn wrap_position(pos: Vector3<f64>, box_length: f64) -> Vector3<f64> {
        Vector3::new(
            Self::wrap_component(pos.x, box_length),
            Self::wrap_component(pos.y, box_length),
            Self::wrap_component(pos.z, box_length),
        )
    }

    /// Re-wrap every position into the primary box image.
    pub fn wrap_all(&mut self) {
        let box_length = self.box_length;
        for pos in &mut self.positions {
            *pos = Self::wrap_position(*pos, box_length);
        }
    }

    /// Displace one particle and re-wrap it into the box.
    pub fn displace(&mut self, index: usize, displacement: Vector3<f64>) {
        let moved = self.positions[index] + displacement;
        self.positions[index] = Self::wrap_position(moved, self.box_length);
    }

    /// Flatten the coordinates into a broadcast buffer of length 3N.
    pub fn write_flat(&self, buf: &mut [f64]) {
        debug_assert_eq!(buf.len(), 3 * self.positions.len());
        for (chunk, pos) in buf.chunks_exact_mut(3).zip(&self.positions) {
            chunk[0] = pos.x;
            chunk[1] = pos.y;
            chunk[2] = pos.z;
        }
    }

    /// Overwrite the coordinates from a broadcast buffer of length 3N.
    pub fn read_flat(&mut self, buf: &[f64]) {
        debug_assert_eq!(buf.len(), 3 * self.positions.len());
        for (chunk, pos) in buf.chunks_exact(3).zip(&mut self.positions) {
            *pos = Vector3::new(chunk[0], chunk[1], chunk[2]);
        }
    }
}
