use anyhow::{Result, ensure};

use crate::Point;
use crate::sim::crystal::CrystalParameters;
use crate::sim::engine::sensors::SensorPanel;
use crate::sim::sampling::SpectrumConfig;
use crate::sim::velocity::FieldConfig;

/// Process-wide simulation parameters, set once before the run.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    // Physics
    pub crystal: CrystalParameters,
    pub field: FieldConfig,
    /// Ambient temperature (K). Required input with no default: `None` is a
    /// configuration error.
    pub temperature: Option<f64>,
    pub spectrum: SpectrumConfig,

    // Geometry
    /// Cube half-extent per axis (m).
    pub half_extents: [f64; 3],
    /// Phonon point source.
    pub source: Point,
    pub sensors: Vec<SensorPanel>,

    // Ensemble
    pub num_particles: usize,
    /// Fraction of particles per branch (ST, FT, L); must sum to ~1.
    pub branch_fractions: [f64; 3],

    // Time stepping
    /// Frame duration (s).
    pub dt: f64,
    pub num_frames: usize,

    // Engine
    pub seed: u64,
    pub max_reflection_iters: usize,
    /// If `true`, store per-frame (x, y) projections of live particles in
    /// the result for the external animation collaborator.
    pub store_history: bool,
}

impl SimulationConfig {
    pub fn new() -> Self {
        Self {
            crystal: CrystalParameters::silicon(),
            field: FieldConfig::new(),
            temperature: None,
            spectrum: SpectrumConfig::new(),
            half_extents: [0.05; 3],
            source: Point::new(0.0, 0.0, 0.0),
            sensors: Vec::new(),
            num_particles: 5000,
            branch_fractions: [0.6, 0.3, 0.1],
            dt: 1e-7,
            num_frames: 500,
            seed: 42,
            max_reflection_iters: 10_000,
            store_history: false,
        }
    }

    /// Checks everything that must hold before the simulation starts.
    /// Sensor placement is validated separately when the sensor geometry is
    /// built; a negative Christoffel eigenvalue surfaces during velocity
    /// field construction.
    pub fn validate(&self) -> Result<()> {
        let Some(temperature) = self.temperature else {
            anyhow::bail!("ambient temperature is required configuration and has no default");
        };
        ensure!(temperature > 0.0, "ambient temperature must be positive (K)");
        ensure!(self.dt > 0.0, "frame duration must be positive");
        ensure!(self.num_frames > 0, "at least one frame is required");
        ensure!(self.num_particles > 0, "at least one particle is required");
        ensure!(
            self.half_extents.iter().all(|&h| h > 0.0),
            "cube half-extents must be positive, got {:?}",
            self.half_extents
        );
        ensure!(
            !crate::sim::engine::walls::WallBox::new(self.half_extents)
                .would_exit(self.source),
            "source {} lies outside the cube",
            self.source
        );

        let sum: f64 = self.branch_fractions.iter().sum();
        ensure!(
            self.branch_fractions.iter().all(|&f| f >= 0.0) && (sum - 1.0).abs() < 1e-6,
            "branch fractions must be non-negative and sum to 1, got {:?}",
            self.branch_fractions
        );
        ensure!(
            self.max_reflection_iters > 0,
            "reflection iteration cap must be positive"
        );
        Ok(())
    }

    /// Particle count per branch. Each branch gets `round(fraction * n)`;
    /// the rounding remainder is added to branch 0 (ST) so the counts sum
    /// to `num_particles` exactly.
    pub fn branch_counts(&self) -> [usize; 3] {
        let n = self.num_particles as f64;
        let mut counts = [0i64; 3];
        for (count, &fraction) in counts.iter_mut().zip(&self.branch_fractions) {
            *count = (fraction * n).round() as i64;
        }
        counts[0] += self.num_particles as i64 - counts.iter().sum::<i64>();
        [
            counts[0].max(0) as usize,
            counts[1] as usize,
            counts[2] as usize,
        ]
    }

    /// Linear size of the simulated volume (m), used by the
    /// density-of-states normalization. Defined by the x half-extent.
    pub fn edge_length(&self) -> f64 {
        2.0 * self.half_extents[0]
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new()
    }
}
