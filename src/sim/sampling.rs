use anyhow::{Result, ensure};
use rand::Rng;

use crate::vecutils::linspace;

/// Planck constant (J s).
pub const PLANCK: f64 = 6.62607015e-34;
/// Boltzmann constant (J/K).
pub const BOLTZMANN: f64 = 1.380649e-23;

/// Frequency range and resolution of the sampled phonon spectrum.
#[derive(Debug, Clone, Copy)]
pub struct SpectrumConfig {
    /// Lower frequency bound (Hz).
    pub freq_min: f64,
    /// Upper frequency bound (Hz).
    pub freq_max: f64,
    /// Number of integration abscissas for the cumulative distribution.
    pub n_abscissae: usize,
}

impl SpectrumConfig {
    pub fn new() -> Self {
        Self {
            freq_min: 1e9,
            freq_max: 1e12,
            n_abscissae: 10_000,
        }
    }
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Draws random phonon frequencies from the Bose-Einstein occupation
/// spectrum of one branch.
///
/// The unnormalized density is `C * f^2 / (exp(h*f / (kB*T)) - 1)` with
/// `C = 3*L^3 / (2*pi^2 * v_s^3)` (L = cube edge length, v_s = branch sound
/// speed). The density is integrated to a cumulative distribution by the
/// trapezoid rule, normalized to [0, 1] and inverted by monotone linear
/// interpolation. Draws outside the tabulated cumulative range clamp to the
/// spectrum bounds.
pub struct FrequencySampler {
    freqs: Vec<f64>,
    cdf: Vec<f64>,
}

impl FrequencySampler {
    /// Builds the inverse-CDF table for one branch.
    ///
    /// - `temperature`: ambient temperature (K), required and positive
    /// - `sound_speed`: branch-averaged group speed (m/s)
    /// - `edge_length`: linear size of the simulated volume (m)
    pub fn new(
        temperature: f64,
        sound_speed: f64,
        edge_length: f64,
        spectrum: &SpectrumConfig,
    ) -> Result<Self> {
        ensure!(temperature > 0.0, "temperature must be positive (K)");
        ensure!(sound_speed > 0.0, "sound speed must be positive");
        ensure!(edge_length > 0.0, "edge length must be positive");
        ensure!(
            spectrum.freq_min > 0.0 && spectrum.freq_max > spectrum.freq_min,
            "spectrum bounds must satisfy 0 < freq_min < freq_max"
        );
        ensure!(
            spectrum.n_abscissae >= 2,
            "spectrum needs at least 2 abscissas"
        );

        // Density-of-states normalization. The normalization cancels when the
        // cumulative distribution is rescaled to [0, 1] but is kept so the
        // intermediate density is the physical occupation spectrum.
        let c = 3.0 * edge_length.powi(3)
            / (2.0 * std::f64::consts::PI.powi(2) * sound_speed.powi(3));
        let beta = PLANCK / (BOLTZMANN * temperature);

        let freqs = linspace(spectrum.freq_min, spectrum.freq_max, spectrum.n_abscissae);
        let density: Vec<f64> = freqs
            .iter()
            .map(|&f| c * f * f / (beta * f).exp_m1())
            .collect();

        // Cumulative trapezoid
        let mut cdf = Vec::with_capacity(freqs.len());
        cdf.push(0.0);
        for i in 1..freqs.len() {
            let df = freqs[i] - freqs[i - 1];
            let area = 0.5 * (density[i] + density[i - 1]) * df;
            cdf.push(cdf[i - 1] + area);
        }

        let total = *cdf.last().unwrap_or(&0.0);
        ensure!(
            total > 0.0 && total.is_finite(),
            "degenerate phonon spectrum: cumulative density is {total}"
        );
        for value in cdf.iter_mut() {
            *value /= total;
        }

        Ok(Self { freqs, cdf })
    }

    /// Cumulative probability at frequency `f` (clamped to the spectrum range).
    pub fn cdf(&self, f: f64) -> f64 {
        if f <= self.freqs[0] {
            return 0.0;
        }
        if f >= self.freqs[self.freqs.len() - 1] {
            return 1.0;
        }
        let i = self.freqs.partition_point(|&x| x < f);
        let (f0, f1) = (self.freqs[i - 1], self.freqs[i]);
        let (c0, c1) = (self.cdf[i - 1], self.cdf[i]);
        c0 + (f - f0) / (f1 - f0) * (c1 - c0)
    }

    /// Frequency at cumulative probability `u`.
    ///
    /// Values outside the tabulated cumulative range (underflow at the
    /// support boundary) clamp to the min/max abscissa.
    pub fn quantile(&self, u: f64) -> f64 {
        let n = self.cdf.len();
        if u <= self.cdf[0] {
            return self.freqs[0];
        }
        if u >= self.cdf[n - 1] {
            return self.freqs[n - 1];
        }
        let i = self.cdf.partition_point(|&c| c < u);
        let (c0, c1) = (self.cdf[i - 1], self.cdf[i]);
        if c1 <= c0 {
            return self.freqs[i];
        }
        let (f0, f1) = (self.freqs[i - 1], self.freqs[i]);
        f0 + (u - c0) / (c1 - c0) * (f1 - f0)
    }

    /// Draws `count` independent frequencies.
    pub fn sample(&self, rng: &mut impl Rng, count: usize) -> Vec<f64> {
        (0..count)
            .map(|_| self.quantile(rng.r#gen::<f64>()))
            .collect()
    }
}
