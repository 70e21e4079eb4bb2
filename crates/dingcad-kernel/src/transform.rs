//! Affine transforms and plane trimming.

use glam::{DAffine3, DMat3, DVec3};

use crate::boolean::OpType;
use crate::solid::Solid;

/// `(sin, cos)` of an angle in degrees, exact at multiples of 90
fn sin_cos_degrees(degrees: f64) -> (f64, f64) {
    let reduced = degrees.rem_euclid(360.0);
    if reduced % 90.0 == 0.0 {
        match (reduced / 90.0) as u32 {
            0 => (0.0, 1.0),
            1 => (1.0, 0.0),
            2 => (0.0, -1.0),
            _ => (-1.0, 0.0),
        }
    } else {
        reduced.to_radians().sin_cos()
    }
}

/// Rotation about X, then Y, then Z, in degrees
pub fn rotation_degrees(angles: DVec3) -> DMat3 {
    let (sx, cx) = sin_cos_degrees(angles.x);
    let (sy, cy) = sin_cos_degrees(angles.y);
    let (sz, cz) = sin_cos_degrees(angles.z);
    let rx = DMat3::from_cols(
        DVec3::new(1.0, 0.0, 0.0),
        DVec3::new(0.0, cx, sx),
        DVec3::new(0.0, -sx, cx),
    );
    let ry = DMat3::from_cols(
        DVec3::new(cy, 0.0, -sy),
        DVec3::new(0.0, 1.0, 0.0),
        DVec3::new(sy, 0.0, cy),
    );
    let rz = DMat3::from_cols(
        DVec3::new(cz, sz, 0.0),
        DVec3::new(-sz, cz, 0.0),
        DVec3::new(0.0, 0.0, 1.0),
    );
    rz * ry * rx
}

/// Affine transform from a row-major 3x4 matrix
pub fn affine_from_rows(m: &[f64; 12]) -> DAffine3 {
    DAffine3::from_mat3_translation(
        DMat3::from_cols(
            DVec3::new(m[0], m[4], m[8]),
            DVec3::new(m[1], m[5], m[9]),
            DVec3::new(m[2], m[6], m[10]),
        ),
        DVec3::new(m[3], m[7], m[11]),
    )
}

impl Solid {
    /// Apply an affine map. Mirroring maps reverse triangle winding;
    /// singular or non-finite maps give an empty solid.
    pub fn transform(&self, affine: &DAffine3) -> Solid {
        if !self.status.is_ok() {
            return Solid::invalid(self.status);
        }
        let det = affine.matrix3.determinant();
        if det == 0.0 || !det.is_finite() || !affine.translation.is_finite() {
            return Solid::empty();
        }
        let vertices = self
            .vertices
            .iter()
            .map(|v| affine.transform_point3(*v))
            .collect();
        let mut solid = self.with_vertices(vertices);
        if det < 0.0 {
            for tri in &mut solid.triangles {
                tri.swap(1, 2);
            }
            if let Some(props) = solid.properties.as_mut() {
                for tri in &mut props.tri_verts {
                    tri.swap(1, 2);
                }
            }
        }
        solid
    }

    pub fn translate(&self, offset: DVec3) -> Solid {
        self.transform(&DAffine3::from_translation(offset))
    }

    pub fn scale(&self, factors: DVec3) -> Solid {
        self.transform(&DAffine3::from_scale(factors))
    }

    /// Rotate by Euler angles in degrees: X first, then Y, then Z
    pub fn rotate(&self, degrees: DVec3) -> Solid {
        self.transform(&DAffine3::from_mat3(rotation_degrees(degrees)))
    }

    /// Reflect across the plane through the origin with this normal.
    /// A zero normal gives an empty solid.
    pub fn mirror(&self, normal: DVec3) -> Solid {
        let len = normal.length();
        if len == 0.0 || !len.is_finite() {
            return Solid::empty();
        }
        let n = normal / len;
        let reflect = DMat3::IDENTITY - 2.0 * DMat3::from_cols(n * n.x, n * n.y, n * n.z);
        self.transform(&DAffine3::from_mat3(reflect))
    }

    /// Keep the part of the solid where `dot(normal, p) <= offset`.
    ///
    /// The normal is normalized first; a zero normal leaves the solid as is.
    pub fn trim_by_plane(&self, normal: DVec3, offset: f64) -> Solid {
        if !self.status.is_ok() {
            return Solid::invalid(self.status);
        }
        let len = normal.length();
        if self.is_empty() || len == 0.0 || !len.is_finite() {
            return self.clone();
        }
        let n = normal / len;
        let u = n.any_orthonormal_vector();
        let v = n.cross(u);

        let reach = self.extent() * 2.0 + offset.abs() + 1.0;
        let half_space = Solid::cube(DVec3::splat(4.0 * reach), false)
            .translate(DVec3::new(-2.0 * reach, -2.0 * reach, -4.0 * reach))
            .transform(&DAffine3::from_mat3_translation(
                DMat3::from_cols(u, v, n),
                n * offset,
            ));
        self.boolean(&half_space, OpType::Intersect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Status;
    use approx::assert_relative_eq;

    #[test]
    fn test_exact_quarter_turns() {
        let m = rotation_degrees(DVec3::new(0.0, 0.0, 90.0));
        assert_eq!(m * DVec3::X, DVec3::Y);
        let m = rotation_degrees(DVec3::new(-90.0, 0.0, 0.0));
        assert_eq!(m * DVec3::Y, -DVec3::Z);
    }

    #[test]
    fn test_rotate_swaps_extents() {
        let block = Solid::cube(DVec3::new(10.0, 20.0, 5.0), false);
        let turned = block.rotate(DVec3::new(0.0, 0.0, 90.0));
        let size = turned.bounding_box().size();
        assert_relative_eq!(size.x, 20.0, epsilon = 1e-12);
        assert_relative_eq!(size.y, 10.0, epsilon = 1e-12);
        assert_relative_eq!(turned.volume(), 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_translate_keeps_identity() {
        let cube = Solid::cube(DVec3::splat(10.0), true);
        let moved = cube.translate(DVec3::new(5.0, 0.0, 0.0));
        let bb = moved.bounding_box();
        assert_relative_eq!(bb.min.x, 0.0);
        assert_relative_eq!(bb.max.x, 10.0);
        assert_eq!(moved.original_id(), cube.original_id());
    }

    #[test]
    fn test_mirror_reverses_winding() {
        let cube = Solid::cube(DVec3::splat(2.0), true).translate(DVec3::new(5.0, 0.0, 0.0));
        let mirrored = cube.mirror(DVec3::X);
        let bb = mirrored.bounding_box();
        assert_relative_eq!(bb.min.x, -6.0);
        assert_relative_eq!(bb.max.x, -4.0);
        assert_relative_eq!(mirrored.volume(), 8.0, epsilon = 1e-9);
        assert!(cube.mirror(DVec3::ZERO).is_empty());
    }

    #[test]
    fn test_row_major_matrix() {
        let m = [1.0, 0.0, 0.0, 3.0, 0.0, 1.0, 0.0, -2.0, 0.0, 0.0, 1.0, 5.0];
        let cube = Solid::cube(DVec3::ONE, false).transform(&affine_from_rows(&m));
        assert_eq!(cube.bounding_box().min, DVec3::new(3.0, -2.0, 5.0));
    }

    #[test]
    fn test_negative_scale_stays_positive_volume() {
        let cube = Solid::cube(DVec3::ONE, false).scale(DVec3::new(-2.0, 1.0, 1.0));
        assert_relative_eq!(cube.volume(), 2.0, epsilon = 1e-12);
        assert!(Solid::cube(DVec3::ONE, false).scale(DVec3::new(0.0, 1.0, 1.0)).is_empty());
    }

    #[test]
    fn test_trim_by_plane() {
        let cube = Solid::cube(DVec3::splat(10.0), true);
        let trimmed = cube.trim_by_plane(DVec3::X, 1.5);
        let bb = trimmed.bounding_box();
        assert!(bb.max.x <= 1.5 + 1e-9);
        assert_relative_eq!(bb.min.x, -5.0, epsilon = 1e-9);
        assert_relative_eq!(trimmed.volume(), 650.0, epsilon = 1e-6);
        assert_eq!(trimmed.status(), Status::NoError);
    }
}
