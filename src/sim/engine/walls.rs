use crate::{Point, Vector};

/// Absolute tolerance for deciding that a coordinate sits on a wall.
/// Scale-appropriate for cube half-extents on the order of centimeters.
pub const WALL_EPS: f64 = 1e-13;

/// The axis-aligned bounding cube of the simulated volume, centered at the
/// origin. Walls reflect specularly; sensor panels embedded in them absorb.
#[derive(Debug, Clone, Copy)]
pub struct WallBox {
    /// Half-extent per axis (m).
    pub half_extents: [f64; 3],
}

impl WallBox {
    pub fn new(half_extents: [f64; 3]) -> Self {
        Self { half_extents }
    }

    /// True if the position is outside the cube or exactly on a wall.
    pub fn would_exit(&self, p: Point) -> bool {
        (0..3).any(|axis| p.coord(axis).abs() >= self.half_extents[axis])
    }

    /// First wall intercept of a ray starting at `p` with velocity `v`.
    ///
    /// The time to reach the outward wall is computed independently per axis
    /// (given the velocity sign); the minimum identifies which wall is struck
    /// first. Intercept coordinates that land on a wall within [`WALL_EPS`]
    /// are snapped exactly onto it, so corner and edge strikes are exact.
    ///
    /// Returns `None` when the velocity is zero (the ray never exits).
    pub fn first_intercept(&self, p: Point, v: Vector) -> Option<(f64, Point)> {
        let mut t_min = f64::INFINITY;
        for axis in 0..3 {
            let vel = v.component(axis);
            if vel == 0.0 {
                continue;
            }
            let wall = self.half_extents[axis].copysign(vel);
            let t = (wall - p.coord(axis)) / vel;
            if t >= 0.0 && t < t_min {
                t_min = t;
            }
        }
        if !t_min.is_finite() {
            return None;
        }

        let mut hit = p + v * t_min;
        for axis in 0..3 {
            let he = self.half_extents[axis];
            let coord = hit.coord(axis);
            if (coord.abs() - he).abs() <= WALL_EPS {
                hit.set_coord(axis, he.copysign(coord));
            }
        }
        Some((t_min, hit))
    }

    /// Specular reflection at a wall position: negates exactly the velocity
    /// components whose coordinates sit on a wall and point outward. Corner
    /// and edge strikes flip several components.
    pub fn reflect(&self, p: Point, mut v: Vector) -> Vector {
        for axis in 0..3 {
            let coord = p.coord(axis);
            let at_wall = (coord.abs() - self.half_extents[axis]).abs() <= WALL_EPS;
            let outward = v.component(axis) * coord > 0.0;
            if at_wall && outward {
                v.flip_component(axis);
            }
        }
        v
    }
}
