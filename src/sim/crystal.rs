use anyhow::{Result, bail};
use nalgebra::Matrix3;

use crate::Vector;

/// Polarization branch of an elastic wave in a cubic crystal.
///
/// Ordered by ascending phase velocity: the two transverse branches first,
/// then the longitudinal one. The ordering comes from the eigenvalue sort
/// in [`CrystalParameters::eigenfrequencies`] and is relied upon everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Branch {
    /// Slow transverse (lowest phase velocity).
    SlowTransverse,
    /// Fast transverse.
    FastTransverse,
    /// Longitudinal (highest phase velocity).
    Longitudinal,
}

impl Branch {
    pub const ALL: [Branch; 3] = [
        Branch::SlowTransverse,
        Branch::FastTransverse,
        Branch::Longitudinal,
    ];

    /// Index into eigenvalue-sorted arrays (0 = ST, 1 = FT, 2 = L).
    pub fn index(self) -> usize {
        match self {
            Branch::SlowTransverse => 0,
            Branch::FastTransverse => 1,
            Branch::Longitudinal => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Branch> {
        Branch::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            Branch::SlowTransverse => "ST",
            Branch::FastTransverse => "FT",
            Branch::Longitudinal => "L",
        }
    }
}

/// Elastic constants and mass density of a cubic crystal.
///
/// Cubic symmetry leaves three independent stiffness entries (c11, c12, c44).
/// Set once at startup and shared read-only by the whole simulation.
#[derive(Debug, Clone, Copy)]
pub struct CrystalParameters {
    /// Stiffness constant c11 (Pa).
    pub c11: f64,
    /// Stiffness constant c12 (Pa).
    pub c12: f64,
    /// Stiffness constant c44 (Pa).
    pub c44: f64,
    /// Mass density (kg/m3).
    pub density: f64,
}

impl CrystalParameters {
    pub fn new(c11: f64, c12: f64, c44: f64, density: f64) -> Self {
        Self {
            c11,
            c12,
            c44,
            density,
        }
    }

    /// Room-temperature elastic constants of silicon.
    pub fn silicon() -> Self {
        Self {
            c11: 165.7e9,
            c12: 63.9e9,
            c44: 79.6e9,
            density: 2330.0,
        }
    }

    /// Builds the Christoffel tensor for a unit propagation direction `n`.
    ///
    /// For cubic symmetry:
    /// - diagonal:     `(c11 * ni^2 + c44 * (1 - ni^2)) / rho`
    /// - off-diagonal: `(c12 + c44) * ni * nj / rho`
    ///
    /// Eigenvalues of this matrix are squared phase velocities.
    pub fn christoffel_tensor(&self, n: Vector) -> Matrix3<f64> {
        let rho = self.density;
        let k = [n.dx, n.dy, n.dz];
        let mut d = Matrix3::zeros();
        for i in 0..3 {
            for j in 0..3 {
                d[(i, j)] = if i == j {
                    (self.c11 * k[i] * k[i] + self.c44 * (1.0 - k[i] * k[i])) / rho
                } else {
                    (self.c12 + self.c44) * k[i] * k[j] / rho
                };
            }
        }
        d
    }

    /// Angular eigenfrequencies of the three branches for a propagation
    /// direction, ordered ascending (ST, FT, L).
    ///
    /// `direction` is normalized internally; `k_mag` is the wavevector
    /// magnitude the frequencies are scaled by. Callers probing the local
    /// slope of the dispersion pass a small offset magnitude here, not a
    /// physical wavevector scale.
    ///
    /// A negative eigenvalue means an unphysical stiffness/direction
    /// combination and is a fatal configuration error.
    pub fn eigenfrequencies(&self, direction: Vector, k_mag: f64) -> Result<[f64; 3]> {
        let Some(n) = direction.normalize() else {
            bail!("eigenfrequencies() requires a non-zero direction vector");
        };

        let d = self.christoffel_tensor(n);
        let eig = d.symmetric_eigen();

        let mut lambdas = [eig.eigenvalues[0], eig.eigenvalues[1], eig.eigenvalues[2]];
        lambdas.sort_by(f64::total_cmp);

        for &lambda in &lambdas {
            if lambda < 0.0 {
                bail!(
                    "negative Christoffel eigenvalue {lambda:.3e} for direction {n}: \
                     unphysical stiffness tensor"
                );
            }
        }

        Ok([
            k_mag * lambdas[0].sqrt(),
            k_mag * lambdas[1].sqrt(),
            k_mag * lambdas[2].sqrt(),
        ])
    }
}

impl Default for CrystalParameters {
    fn default() -> Self {
        Self::silicon()
    }
}
