pub mod spline;

use anyhow::{Result, ensure};
use ndarray as nd;
use std::f64::consts::{PI, TAU};

use crate::Vector;
use crate::geom::rotation::{orientation_matrix, rotate_vector, rotate_vectors};
use crate::sim::crystal::{Branch, CrystalParameters};
use crate::vecutils::{linspace, mean};

use self::spline::Bicubic2d;

/// Angular grid and finite-difference settings for the velocity field.
#[derive(Debug, Clone, Copy)]
pub struct FieldConfig {
    /// Azimuth samples over [0, 2*pi), periodic.
    pub n_azimuth: usize,
    /// Polar-angle samples over [0, pi], poles included.
    pub n_polar: usize,
    /// Finite-difference stencil size per axis (odd, >= 3).
    pub stencil_points: usize,
    /// Half-width of the wavevector perturbation per axis (1/m scale units).
    pub stencil_half_width: f64,
    /// Crystal orientation offsets relative to the lab frame:
    /// rotation about z (azimuth), then about y (polar), radians.
    pub orientation: (f64, f64),
}

impl FieldConfig {
    pub fn new() -> Self {
        Self {
            n_azimuth: 400,
            n_polar: 60,
            stencil_points: 5,
            stencil_half_width: 1e-3,
            orientation: (0.0, 0.0),
        }
    }
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Unit propagation direction for spherical angles (phi azimuth, theta polar).
pub fn unit_direction(phi: f64, theta: f64) -> Vector {
    Vector::new(
        theta.sin() * phi.cos(),
        theta.sin() * phi.sin(),
        theta.cos(),
    )
}

/// Spherical angles (phi in [0, 2*pi), theta in [0, pi]) of a direction vector.
pub fn direction_angles(dir: Vector) -> (f64, f64) {
    let phi = dir.dy.atan2(dir.dx).rem_euclid(TAU);
    let theta = (dir.dz / dir.length()).clamp(-1.0, 1.0).acos();
    (phi, theta)
}

/// Direction-dependent group velocities of the three phonon branches.
///
/// Built once at startup by sampling the Christoffel eigenfrequencies on an
/// angular grid: at each node the unit direction is perturbed along one
/// Cartesian axis at a time (off the unit sphere, no re-normalization) and a
/// centered finite difference of omega over the stencil midpoint gives that
/// axis's group-velocity component (Vg = grad_k omega). One bicubic
/// interpolant is stored per (branch, axis) pair; queries rotate the
/// interpolated vector by the configured crystal orientation.
pub struct GroupVelocityField {
    /// Row-major (branch, axis) interpolants, 9 total.
    splines: Vec<Bicubic2d>,
    rotation: nd::Array2<f64>,
    n_azimuth: usize,
    n_polar: usize,
}

impl GroupVelocityField {
    pub fn build(crystal: &CrystalParameters, config: &FieldConfig) -> Result<Self> {
        let n_phi = config.n_azimuth;
        let n_theta = config.n_polar;
        let n_stencil = config.stencil_points;

        ensure!(
            n_phi >= 4 && n_theta >= 4,
            "velocity field grid must be at least 4x4, got {n_phi}x{n_theta}"
        );
        ensure!(
            n_stencil >= 3 && n_stencil % 2 == 1,
            "finite-difference stencil must be odd and >= 3, got {n_stencil}"
        );
        ensure!(
            config.stencil_half_width > 0.0,
            "stencil half-width must be positive"
        );

        let phi_step = TAU / n_phi as f64;
        let theta_step = PI / (n_theta - 1) as f64;

        // Each axis differentiates against its own perturbation abscissas.
        let offsets = linspace(
            -config.stencil_half_width,
            config.stencil_half_width,
            n_stencil,
        );
        let spacing = offsets[1] - offsets[0];
        let mid = n_stencil / 2;

        let mut grids: Vec<nd::Array2<f64>> =
            (0..9).map(|_| nd::Array2::zeros((n_phi, n_theta))).collect();

        let mut omegas: Vec<[f64; 3]> = Vec::with_capacity(n_stencil);
        for i in 0..n_phi {
            let phi = i as f64 * phi_step;
            for j in 0..n_theta {
                let theta = j as f64 * theta_step;
                let n = unit_direction(phi, theta);

                for axis in 0..3 {
                    omegas.clear();
                    for &off in &offsets {
                        let mut k = n;
                        k.set_component(axis, k.component(axis) + off);
                        omegas.push(crystal.eigenfrequencies(k, k.length())?);
                    }
                    for branch in 0..3 {
                        // Centered difference at the stencil midpoint
                        let slope =
                            (omegas[mid + 1][branch] - omegas[mid - 1][branch]) / (2.0 * spacing);
                        grids[branch * 3 + axis][[i, j]] = slope;
                    }
                }
            }
        }

        let splines = grids
            .into_iter()
            .map(|grid| Bicubic2d::new(grid, phi_step, 0.0, theta_step))
            .collect::<Result<Vec<_>>>()?;

        let (phi_off, theta_off) = config.orientation;
        Ok(Self {
            splines,
            rotation: orientation_matrix(phi_off, theta_off),
            n_azimuth: n_phi,
            n_polar: n_theta,
        })
    }

    fn spline(&self, branch: Branch, axis: usize) -> &Bicubic2d {
        &self.splines[branch.index() * 3 + axis]
    }

    /// Group-velocity vector (m/s, lab frame) for one direction and branch.
    pub fn velocity(&self, phi: f64, theta: f64, branch: Branch) -> Vector {
        let v = Vector::new(
            self.spline(branch, 0).eval(phi, theta),
            self.spline(branch, 1).eval(phi, theta),
            self.spline(branch, 2).eval(phi, theta),
        );
        rotate_vector(v, &self.rotation)
    }

    /// Batch query for many (phi, theta) pairs of a single branch.
    ///
    /// The per-axis interpolants are evaluated for the whole batch and the
    /// orientation rotation is applied once over the assembled vectors; this
    /// is the throughput path used when seeding a particle ensemble.
    pub fn velocities(&self, angles: &[(f64, f64)], branch: Branch) -> Vec<Vector> {
        let sx = self.spline(branch, 0);
        let sy = self.spline(branch, 1);
        let sz = self.spline(branch, 2);
        let mut out: Vec<Vector> = angles
            .iter()
            .map(|&(phi, theta)| {
                Vector::new(
                    sx.eval(phi, theta),
                    sy.eval(phi, theta),
                    sz.eval(phi, theta),
                )
            })
            .collect();
        rotate_vectors(&mut out, &self.rotation);
        out
    }

    /// Mean group speed of a branch, averaged over a finer angular grid.
    ///
    /// Parametrizes the density-of-states normalization of the frequency
    /// sampler; a consistent deterministic average is all that is needed.
    pub fn average_speed(&self, branch: Branch) -> f64 {
        let n_phi = 2 * self.n_azimuth;
        let n_theta = 4 * self.n_polar;
        let phi_step = TAU / n_phi as f64;
        let theta_step = PI / (n_theta - 1) as f64;

        let mut speeds = Vec::with_capacity(n_phi * n_theta);
        for i in 0..n_phi {
            let phi = i as f64 * phi_step;
            for j in 0..n_theta {
                let theta = j as f64 * theta_step;
                speeds.push(self.velocity(phi, theta, branch).length());
            }
        }
        mean(&speeds)
    }
}
