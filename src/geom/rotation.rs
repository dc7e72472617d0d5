use crate::Vector;
use crate::geom::IsClose;
use ndarray as nd;

/// Calculate rotation matrix for a unit vector `u` and angle `phi`.
///
/// A rotation in 3D can be described with an axis and angle around that axis.
/// The axis is described with a unit vector `u` `(ux**2 + uy**2 + uz**2 == 1)`
/// and an angle `phi` (in radians).
///
/// Uses the Rodrigues form, which is more stable numerically than composing
/// the basic rotation matrices directly:
/// https://en.wikipedia.org/wiki/Rodrigues%27_rotation_formula
pub fn rotation_matrix(u: &Vector, phi: f64) -> nd::Array2<f64> {
    if !u.length().is_close(1.) {
        panic!("rotation_matrix() requires u to be a unit vector");
    }

    let w: nd::Array2<f64> = nd::arr2(&[[0., -u.dz, u.dy], [u.dz, 0., -u.dx], [-u.dy, u.dx, 0.]]);

    nd::Array::eye(3) + phi.sin() * &w + (2. * (phi / 2.).sin().powi(2)) * w.dot(&w)
}

/// Combined rotation for the crystal orientation offsets: first about the
/// z axis by `phi` (azimuth), then about the y axis by `theta` (polar).
pub fn orientation_matrix(phi: f64, theta: f64) -> nd::Array2<f64> {
    let rz = rotation_matrix(&Vector::new(0., 0., 1.), phi);
    let ry = rotation_matrix(&Vector::new(0., 1., 0.), theta);
    ry.dot(&rz)
}

/// Rotate a single vector using the rotation matrix `rot`.
pub fn rotate_vector(v: Vector, rot: &nd::Array2<f64>) -> Vector {
    Vector::new(
        rot[[0, 0]] * v.dx + rot[[0, 1]] * v.dy + rot[[0, 2]] * v.dz,
        rot[[1, 0]] * v.dx + rot[[1, 1]] * v.dy + rot[[1, 2]] * v.dz,
        rot[[2, 0]] * v.dx + rot[[2, 1]] * v.dy + rot[[2, 2]] * v.dz,
    )
}

/// Rotate vectors in-place using the rotation matrix `rot`.
pub fn rotate_vectors(vecs: &mut [Vector], rot: &nd::Array2<f64>) {
    for v in vecs.iter_mut() {
        *v = rotate_vector(*v, rot);
    }
}
