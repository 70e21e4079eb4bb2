//! Incremental 3D convex hull.
//!
//! 1. Pick four extreme, non-coplanar points as the seed tetrahedron
//! 2. For each remaining point, find the faces that can see it
//! 3. Replace the visible faces with a fan from the point to the horizon
//!
//! Degenerate input (fewer than four points, or all coplanar) gives an
//! empty solid.

use std::collections::HashSet;

use glam::DVec3;

use crate::solid::{PRECISION, Solid};

#[derive(Debug, Clone, Copy)]
struct Face {
    v: [usize; 3],
    normal: DVec3,
    offset: f64,
    alive: bool,
}

impl Face {
    fn new(points: &[DVec3], v: [usize; 3]) -> Self {
        let [a, b, c] = v.map(|i| points[i]);
        let normal = (b - a).cross(c - a).normalize_or_zero();
        Self {
            v,
            normal,
            offset: normal.dot(a),
            alive: true,
        }
    }

    fn height(&self, p: DVec3) -> f64 {
        self.normal.dot(p) - self.offset
    }
}

fn seed(points: &[DVec3], eps: f64) -> Option<[usize; 4]> {
    let p0 = (0..points.len()).min_by(|&a, &b| points[a].x.total_cmp(&points[b].x))?;
    let p1 = (0..points.len())
        .max_by(|&a, &b| points[a].distance_squared(points[p0]).total_cmp(&points[b].distance_squared(points[p0])))?;
    if points[p0].distance(points[p1]) <= eps {
        return None;
    }
    let dir = (points[p1] - points[p0]).normalize();
    let line_dist = |i: usize| (points[i] - points[p0]).cross(dir).length();
    let p2 = (0..points.len()).max_by(|&a, &b| line_dist(a).total_cmp(&line_dist(b)))?;
    if line_dist(p2) <= eps {
        return None;
    }
    let normal = (points[p1] - points[p0]).cross(points[p2] - points[p0]).normalize();
    let plane_dist = |i: usize| normal.dot(points[i] - points[p0]).abs();
    let p3 = (0..points.len()).max_by(|&a, &b| plane_dist(a).total_cmp(&plane_dist(b)))?;
    if plane_dist(p3) <= eps {
        return None;
    }
    Some([p0, p1, p2, p3])
}

/// Convex hull of a point cloud as an indexed mesh
pub(crate) fn hull_mesh(points: &[DVec3]) -> Option<(Vec<DVec3>, Vec<[u32; 3]>)> {
    let scale = points.iter().fold(1.0_f64, |acc, p| acc.max(p.abs().max_element()));
    let eps = PRECISION * 1000.0 * scale;
    let [a, b, c, d] = seed(points, eps)?;
    let centroid = (points[a] + points[b] + points[c] + points[d]) / 4.0;

    let mut faces: Vec<Face> = Vec::new();
    for tri in [[a, b, c], [a, c, d], [a, d, b], [b, d, c]] {
        let mut face = Face::new(points, tri);
        if face.height(centroid) > 0.0 {
            face = Face::new(points, [tri[0], tri[2], tri[1]]);
        }
        faces.push(face);
    }

    for (i, &p) in points.iter().enumerate() {
        if [a, b, c, d].contains(&i) {
            continue;
        }
        let visible: Vec<usize> = faces
            .iter()
            .enumerate()
            .filter(|(_, f)| f.alive && f.height(p) > eps)
            .map(|(k, _)| k)
            .collect();
        if visible.is_empty() {
            continue;
        }

        let mut edges: HashSet<(usize, usize)> = HashSet::new();
        for &k in &visible {
            let v = faces[k].v;
            for e in 0..3 {
                edges.insert((v[e], v[(e + 1) % 3]));
            }
            faces[k].alive = false;
        }
        let horizon: Vec<(usize, usize)> = edges
            .iter()
            .copied()
            .filter(|&(x, y)| !edges.contains(&(y, x)))
            .collect();
        for (x, y) in horizon {
            faces.push(Face::new(points, [x, y, i]));
        }
        if faces.len() > 64 && faces.iter().filter(|f| f.alive).count() * 2 < faces.len() {
            faces.retain(|f| f.alive);
        }
    }

    let triangles: Vec<[u32; 3]> = faces
        .iter()
        .filter(|f| f.alive)
        .map(|f| f.v.map(|i| i as u32))
        .collect();
    Some((points.to_vec(), triangles))
}

impl Solid {
    /// Convex hull of a point cloud
    pub fn hull_points(points: &[DVec3]) -> Solid {
        if points.iter().any(|p| !p.is_finite()) {
            return Solid::empty();
        }
        match hull_mesh(points) {
            Some((vertices, triangles)) => Solid::from_raw(vertices, triangles),
            None => Solid::empty(),
        }
    }

    /// Convex hull of one or more solids
    pub fn hull(solids: &[&Solid]) -> Solid {
        if let Some(bad) = solids.iter().find(|s| !s.status.is_ok()) {
            return Solid::invalid(bad.status);
        }
        let points: Vec<DVec3> = solids.iter().flat_map(|s| s.vertices.iter().copied()).collect();
        Solid::hull_points(&points)
    }

    /// Convex hull of this solid alone
    pub fn convex_hull(&self) -> Solid {
        Solid::hull(&[self])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solid::is_edge_manifold;
    use approx::assert_relative_eq;

    #[test]
    fn test_hull_of_tetrahedron_points() {
        let points = [
            DVec3::ZERO,
            DVec3::X * 2.0,
            DVec3::Y * 2.0,
            DVec3::Z * 2.0,
        ];
        let hull = Solid::hull_points(&points);
        assert_relative_eq!(hull.volume(), 4.0 / 3.0, epsilon = 1e-12);
        assert_eq!(hull.num_vert(), 4);
    }

    #[test]
    fn test_interior_points_are_dropped() {
        let mut points: Vec<DVec3> = Solid::cube(DVec3::splat(2.0), true).vertices().to_vec();
        points.push(DVec3::ZERO);
        points.push(DVec3::splat(0.5));
        let hull = Solid::hull_points(&points);
        assert_eq!(hull.num_vert(), 8);
        assert_relative_eq!(hull.volume(), 8.0, epsilon = 1e-9);
        assert!(is_edge_manifold(hull.triangles()));
    }

    #[test]
    fn test_hull_of_two_spheres() {
        let a = Solid::sphere(1.0, 16).translate(DVec3::new(-3.0, 0.0, 0.0));
        let b = Solid::sphere(1.0, 16).translate(DVec3::new(3.0, 0.0, 0.0));
        let hull = Solid::hull(&[&a, &b]);
        let bb = hull.bounding_box();
        assert_relative_eq!(bb.min.x, -4.0, epsilon = 1e-9);
        assert_relative_eq!(bb.max.x, 4.0, epsilon = 1e-9);
        assert!(hull.volume() > a.volume() + b.volume());
        assert!(hull.original_id().is_none());
    }

    #[test]
    fn test_coplanar_points_are_degenerate() {
        let points = [DVec3::ZERO, DVec3::X, DVec3::Y, DVec3::new(1.0, 1.0, 0.0)];
        assert!(Solid::hull_points(&points).is_empty());
    }
}
