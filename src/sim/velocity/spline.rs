use anyhow::{Result, ensure};
use ndarray as nd;
use std::f64::consts::TAU;

/// Bicubic (Catmull-Rom tensor product) interpolant on a uniform
/// (azimuth, polar angle) grid.
///
/// The azimuth axis is periodic with period 2*pi and sampled without the
/// duplicate endpoint; the polar axis spans [0, pi] inclusive and is
/// clamped at the poles. Queries cost O(1) (a 4x4 stencil).
pub struct Bicubic2d {
    /// Grid values, shape (n_phi, n_theta).
    values: nd::Array2<f64>,
    phi_step: f64,
    theta0: f64,
    theta_step: f64,
}

impl Bicubic2d {
    /// Creates an interpolant over `values` sampled at
    /// `phi_i = i * phi_step` (periodic) and `theta_j = theta0 + j * theta_step`.
    pub fn new(values: nd::Array2<f64>, phi_step: f64, theta0: f64, theta_step: f64) -> Result<Self> {
        let (n_phi, n_theta) = values.dim();
        ensure!(
            n_phi >= 4 && n_theta >= 4,
            "bicubic interpolation needs at least a 4x4 grid, got {n_phi}x{n_theta}"
        );
        ensure!(
            phi_step > 0.0 && theta_step > 0.0,
            "grid steps must be positive"
        );
        Ok(Self {
            values,
            phi_step,
            theta0,
            theta_step,
        })
    }

    /// Interpolated value at (phi, theta). Azimuth wraps; polar clamps.
    pub fn eval(&self, phi: f64, theta: f64) -> f64 {
        let (n_phi, n_theta) = self.values.dim();

        let u = phi.rem_euclid(TAU) / self.phi_step;
        let i = u.floor() as i64;
        let tu = u - i as f64;

        let v = (theta - self.theta0) / self.theta_step;
        let v = v.clamp(0.0, (n_theta - 1) as f64);
        let j = (v.floor() as usize).min(n_theta - 2);
        let tv = v - j as f64;

        let wu = catmull_rom_weights(tu);
        let wv = catmull_rom_weights(tv);

        let mut acc = 0.0;
        for (a, &wa) in wu.iter().enumerate() {
            // Azimuth index wraps around the full circle
            let row = (i + a as i64 - 1).rem_euclid(n_phi as i64) as usize;
            for (b, &wb) in wv.iter().enumerate() {
                // Polar index clamps at the poles
                let col = (j + b).saturating_sub(1).min(n_theta - 1);
                acc += wa * wb * self.values[[row, col]];
            }
        }
        acc
    }
}

/// Catmull-Rom kernel weights for the 4 nodes around local coordinate `t` in [0, 1].
fn catmull_rom_weights(t: f64) -> [f64; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        0.5 * (-t + 2.0 * t2 - t3),
        0.5 * (2.0 - 5.0 * t2 + 3.0 * t3),
        0.5 * (t + 4.0 * t2 - 3.0 * t3),
        0.5 * (-t2 + t3),
    ]
}
