//! Primitive solids.

use std::collections::HashMap;
use std::f64::consts::TAU;

use glam::DVec3;

use crate::solid::Solid;

/// Smallest angle, in degrees, between neighbouring circle segments
const MIN_CIRCULAR_ANGLE: f64 = 10.0;

/// Smallest circle segment length
const MIN_CIRCULAR_EDGE_LENGTH: f64 = 1.0;

/// Default segment count for a circle of the given radius.
///
/// Always a multiple of four and at least four, so circles keep their
/// quadrant points.
pub fn circular_segments(radius: f64) -> usize {
    let by_angle = (360.0 / MIN_CIRCULAR_ANGLE) as usize;
    let by_length = (TAU * radius.abs() / MIN_CIRCULAR_EDGE_LENGTH) as usize;
    let n = by_angle.min(by_length) + 3;
    (n - n % 4).max(4)
}

/// Unit cube corners: the bottom ring counter-clockwise, then the top ring
const CUBE_CORNERS: [[f64; 3]; 8] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [1.0, 1.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [1.0, 0.0, 1.0],
    [1.0, 1.0, 1.0],
    [0.0, 1.0, 1.0],
];

const CUBE_TRIANGLES: [[u32; 3]; 12] = [
    [0, 2, 1],
    [0, 3, 2],
    [4, 5, 6],
    [4, 6, 7],
    [0, 1, 5],
    [0, 5, 4],
    [3, 7, 6],
    [3, 6, 2],
    [0, 4, 7],
    [0, 7, 3],
    [1, 2, 6],
    [1, 6, 5],
];

impl Solid {
    /// Axis-aligned box with one corner at the origin, or centered on it.
    ///
    /// A size with any non-positive component gives an empty solid.
    pub fn cube(size: DVec3, center: bool) -> Self {
        if size.min_element() <= 0.0 || !size.is_finite() {
            return Self::empty();
        }
        let offset = if center { size * 0.5 } else { DVec3::ZERO };
        let vertices = CUBE_CORNERS
            .iter()
            .map(|c| DVec3::from_array(*c) * size - offset)
            .collect();
        Self::from_raw(vertices, CUBE_TRIANGLES.to_vec()).into_original()
    }

    /// Regular tetrahedron inscribed in the cube `[-1, 1]^3`
    pub fn tetrahedron() -> Self {
        let vertices = vec![
            DVec3::new(-1.0, -1.0, 1.0),
            DVec3::new(-1.0, 1.0, -1.0),
            DVec3::new(1.0, -1.0, -1.0),
            DVec3::new(1.0, 1.0, 1.0),
        ];
        let triangles = vec![[2, 0, 1], [0, 3, 1], [2, 3, 0], [3, 2, 1]];
        Self::from_raw(vertices, triangles).into_original()
    }

    /// Geodesic sphere built by subdividing an octahedron.
    ///
    /// `segments` is the number of edges around the equator; zero picks
    /// [`circular_segments`]. It is rounded up to a multiple of four.
    pub fn sphere(radius: f64, segments: usize) -> Self {
        if radius <= 0.0 || !radius.is_finite() {
            return Self::empty();
        }
        let segments = if segments == 0 {
            circular_segments(radius)
        } else {
            segments.max(4)
        };
        let n = segments.div_ceil(4) as i32;

        let mut index: HashMap<(i32, i32, i32), u32> = HashMap::new();
        let mut vertices = Vec::new();
        let mut vertex = |key: (i32, i32, i32)| -> u32 {
            *index.entry(key).or_insert_with(|| {
                let p = DVec3::new(key.0 as f64, key.1 as f64, key.2 as f64).normalize() * radius;
                vertices.push(p);
                (vertices.len() - 1) as u32
            })
        };

        let mut triangles = Vec::with_capacity(8 * (n * n) as usize);
        for octant in 0..8 {
            let sx = if octant & 1 == 0 { 1 } else { -1 };
            let sy = if octant & 2 == 0 { 1 } else { -1 };
            let sz = if octant & 4 == 0 { 1 } else { -1 };
            // Grid point (i, j) on this face has barycentric (i, j, n - i - j)
            let mut at = |i: i32, j: i32| vertex((sx * i, sy * j, sz * (n - i - j)));
            for i in 0..n {
                for j in 0..n - i {
                    let a = at(i, j);
                    let b = at(i + 1, j);
                    let c = at(i, j + 1);
                    triangles.push([a, b, c]);
                    if i + j + 1 < n {
                        let d = at(i + 1, j + 1);
                        triangles.push([b, d, c]);
                    }
                }
            }
        }

        orient_outward(&vertices, &mut triangles, DVec3::ZERO);
        Self::from_raw(vertices, triangles).into_original()
    }

    /// Cylinder or cone along +Z.
    ///
    /// `radius_top` of zero builds a cone. `segments` of zero picks
    /// [`circular_segments`] for the larger radius.
    pub fn cylinder(height: f64, radius: f64, radius_top: f64, segments: usize, center: bool) -> Self {
        if height <= 0.0
            || radius < 0.0
            || radius_top < 0.0
            || (radius <= 0.0 && radius_top <= 0.0)
            || !height.is_finite()
        {
            return Self::empty();
        }
        let n = if segments == 0 {
            circular_segments(radius.max(radius_top))
        } else {
            segments.max(3)
        };
        let z0 = if center { -height * 0.5 } else { 0.0 };
        let z1 = z0 + height;

        let ring = |r: f64, z: f64| -> Vec<DVec3> {
            (0..n)
                .map(|i| {
                    let theta = TAU * i as f64 / n as f64;
                    DVec3::new(r * theta.cos(), r * theta.sin(), z)
                })
                .collect()
        };

        let mut vertices = Vec::with_capacity(2 * n);
        let mut triangles = Vec::new();
        let n32 = n as u32;

        let bottom: Vec<u32> = if radius > 0.0 {
            vertices.extend(ring(radius, z0));
            (0..n32).collect()
        } else {
            vertices.push(DVec3::new(0.0, 0.0, z0));
            vec![0; n]
        };
        let base = vertices.len() as u32;
        let top: Vec<u32> = if radius_top > 0.0 {
            vertices.extend(ring(radius_top, z1));
            (base..base + n32).collect()
        } else {
            vertices.push(DVec3::new(0.0, 0.0, z1));
            vec![base; n]
        };

        for i in 0..n {
            let j = (i + 1) % n;
            let (b0, b1, t0, t1) = (bottom[i], bottom[j], top[i], top[j]);
            if b0 != b1 {
                triangles.push([b0, b1, t1]);
            }
            if t0 != t1 {
                triangles.push([b0, t1, t0]);
            }
        }
        if radius > 0.0 {
            for i in 1..n32 - 1 {
                triangles.push([0, i + 1, i]);
            }
        }
        if radius_top > 0.0 {
            for i in 1..n32 - 1 {
                triangles.push([base, base + i, base + i + 1]);
            }
        }

        Self::from_raw(vertices, triangles).into_original()
    }
}

/// Flip triangles whose normal points toward `center`
fn orient_outward(vertices: &[DVec3], triangles: &mut [[u32; 3]], center: DVec3) {
    for tri in triangles.iter_mut() {
        let [a, b, c] = tri.map(|i| vertices[i as usize]);
        let normal = (b - a).cross(c - a);
        if normal.dot((a + b + c) / 3.0 - center) < 0.0 {
            tri.swap(1, 2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Status;
    use crate::solid::is_edge_manifold;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_circular_segments() {
        assert_eq!(circular_segments(1.0), 8);
        assert_eq!(circular_segments(100.0), 36);
        assert_eq!(circular_segments(0.01), 4);
    }

    #[test]
    fn test_cube_counts() {
        let cube = Solid::cube(DVec3::splat(10.0), true);
        assert_eq!(cube.num_vert(), 8);
        assert_eq!(cube.num_tri(), 12);
        assert!(is_edge_manifold(cube.triangles()));
        assert_relative_eq!(cube.bounding_box().min.x, -5.0);
    }

    #[test]
    fn test_degenerate_cube_is_empty() {
        let cube = Solid::cube(DVec3::new(1.0, 0.0, 1.0), false);
        assert!(cube.is_empty());
        assert_eq!(cube.status(), Status::NoError);
    }

    #[test]
    fn test_sphere_is_closed_and_round() {
        let sphere = Solid::sphere(2.0, 32);
        assert!(is_edge_manifold(sphere.triangles()));
        assert_eq!(sphere.num_vert(), 4 * 8 * 8 + 2);
        assert_eq!(sphere.genus(), 0);
        let exact = 4.0 / 3.0 * PI * 8.0;
        assert!(sphere.volume() < exact);
        assert!(sphere.volume() > exact * 0.9);
        for v in sphere.vertices() {
            assert_relative_eq!(v.length(), 2.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_cylinder_volume_and_cone() {
        let cyl = Solid::cylinder(10.0, 1.0, 1.0, 4, false);
        // A square of circumradius 1 has area 2
        assert_relative_eq!(cyl.volume(), 20.0, epsilon = 1e-9);
        assert!(is_edge_manifold(cyl.triangles()));

        let cone = Solid::cylinder(3.0, 1.0, 0.0, 4, true);
        assert_relative_eq!(cone.volume(), 2.0, epsilon = 1e-9);
        assert!(is_edge_manifold(cone.triangles()));
        assert_relative_eq!(cone.bounding_box().min.z, -1.5);
    }

    #[test]
    fn test_tetrahedron_volume() {
        let tet = Solid::tetrahedron();
        assert_relative_eq!(tet.volume(), 8.0 / 3.0, epsilon = 1e-9);
    }
}
