use anyhow::{Result, ensure};

use crate::Point;
use crate::sim::engine::walls::WALL_EPS;

/// An absorbing rectangular detector lying flat on one cube face.
///
/// Exactly one half-extent must be zero; that axis is the face normal and
/// the panel center must sit on the corresponding wall.
#[derive(Debug, Clone, Copy)]
pub struct SensorPanel {
    pub center: Point,
    pub half_extents: [f64; 3],
}

impl SensorPanel {
    pub fn new(center: Point, half_extents: [f64; 3]) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    /// The face-normal axis, if exactly one half-extent is zero.
    pub fn normal_axis(&self) -> Option<usize> {
        let zeros: Vec<usize> = (0..3).filter(|&a| self.half_extents[a] == 0.0).collect();
        match zeros.as_slice() {
            [axis] => Some(*axis),
            _ => None,
        }
    }
}

/// The ordered sensor list with hit queries against wall intercepts.
pub struct SensorGeometry {
    panels: Vec<SensorPanel>,
    /// Face-normal axis per panel, precomputed at validation time.
    axes: Vec<usize>,
}

impl SensorGeometry {
    /// Validates panels against the cube geometry.
    ///
    /// Each panel must be degenerate in exactly one dimension and its center
    /// must lie on the matching cube wall.
    pub fn new(panels: Vec<SensorPanel>, cube_half_extents: [f64; 3]) -> Result<Self> {
        let mut axes = Vec::with_capacity(panels.len());
        for (i, panel) in panels.iter().enumerate() {
            let Some(axis) = panel.normal_axis() else {
                anyhow::bail!(
                    "sensor {i}: exactly one half-extent must be zero, got {:?}",
                    panel.half_extents
                );
            };
            let face = cube_half_extents[axis];
            ensure!(
                (panel.center.coord(axis).abs() - face).abs() <= WALL_EPS.max(1e-9 * face),
                "sensor {i}: center {} does not lie on a cube face (axis {axis}, \
                 half-extent {face})",
                panel.center
            );
            axes.push(axis);
        }
        Ok(Self { panels, axes })
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    /// Index of the sensor absorbing a particle at `p`, or `None`.
    ///
    /// The face-normal axis is tested by sign match against the panel's
    /// face; the in-plane axes by inclusive range membership. Panels are
    /// tested in list order and the last match wins: aggregate statistics
    /// depend on this precedence if panels ever overlap.
    pub fn hit_test(&self, p: Point) -> Option<usize> {
        let mut hit = None;
        for (i, (panel, &axis)) in self.panels.iter().zip(&self.axes).enumerate() {
            let face_side = panel.center.coord(axis);
            if p.coord(axis) * face_side <= 0.0 {
                continue;
            }
            let in_plane = (0..3).filter(|&a| a != axis).all(|a| {
                (p.coord(a) - panel.center.coord(a)).abs() <= panel.half_extents[a]
            });
            if in_plane {
                hit = Some(i);
            }
        }
        hit
    }
}
