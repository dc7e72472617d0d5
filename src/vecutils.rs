//! Vector utility functions like linspace() and mean()

/// Returns `num` evenly spaced values from `start` to `stop` (inclusive).
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    if num == 0 {
        return Vec::new();
    }
    if num == 1 {
        return vec![start];
    }
    let step = (stop - start) / (num - 1) as f64;
    let mut v: Vec<f64> = (0..num).map(|i| start + step * i as f64).collect();
    // The endpoint is exact regardless of rounding in the increments
    v[num - 1] = stop;
    v
}

/// Arithmetic mean of a slice. Returns 0.0 for an empty slice.
pub fn mean(vec: &[f64]) -> f64 {
    if vec.is_empty() {
        return 0.0;
    }
    vec.iter().sum::<f64>() / vec.len() as f64
}
