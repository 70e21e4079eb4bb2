//! Mesh refinement: uniform subdivision and edge-length splitting.
//!
//! Refinement adds vertices without moving existing ones, so the shape and
//! the original id are unchanged. Property channels are dropped.

use std::collections::HashMap;

use glam::DVec3;

use crate::solid::Solid;
use crate::status::Status;

const MAX_TRIANGLES: usize = i32::MAX as usize;
const MAX_LENGTH_PASSES: usize = 32;

impl Solid {
    fn refined(&self, vertices: Vec<DVec3>, triangles: Vec<[u32; 3]>) -> Solid {
        Solid {
            vertices,
            triangles,
            status: self.status,
            tolerance: self.tolerance,
            original_id: self.original_id,
            properties: None,
        }
    }

    /// Split every edge into `n` pieces, replacing each triangle with `n²`
    pub fn refine(&self, n: usize) -> Solid {
        if !self.status.is_ok() {
            return Solid::invalid(self.status);
        }
        if n <= 1 || self.is_empty() {
            return self.clone();
        }
        match n
            .checked_mul(n)
            .and_then(|n2| n2.checked_mul(self.num_tri()))
        {
            Some(count) if count <= MAX_TRIANGLES => {}
            _ => return Solid::invalid(Status::ResultTooLarge),
        }

        let mut vertices = self.vertices.clone();
        let mut edge_points: HashMap<(u32, u32), u32> = HashMap::new();
        let nf = n as f64;

        // First of the n - 1 points on edge (lo, hi), ordered from lo to hi
        let mut edge_start = |u: u32, v: u32, vertices: &mut Vec<DVec3>| -> (u32, bool) {
            let (lo, hi) = (u.min(v), u.max(v));
            let start = *edge_points.entry((lo, hi)).or_insert_with(|| {
                let (a, b) = (vertices[lo as usize], vertices[hi as usize]);
                let start = vertices.len() as u32;
                for s in 1..n {
                    vertices.push(a.lerp(b, s as f64 / nf));
                }
                start
            });
            (start, u == lo)
        };

        let mut triangles = Vec::with_capacity(self.num_tri() * n * n);
        for &[a, b, c] in &self.triangles {
            let ab = edge_start(a, b, &mut vertices);
            let ac = edge_start(a, c, &mut vertices);
            let bc = edge_start(b, c, &mut vertices);
            let on_edge = |(start, forward): (u32, bool), s: usize| -> u32 {
                if forward {
                    start + (s - 1) as u32
                } else {
                    start + (n - 1 - s) as u32
                }
            };

            let (pa, pb, pc) = (self.vertices[a as usize], self.vertices[b as usize], self.vertices[c as usize]);
            let mut interior = HashMap::new();
            for i in 1..n {
                for j in 1..n - i {
                    interior.insert((i, j), vertices.len() as u32);
                    vertices.push(pa + (pb - pa) * (i as f64 / nf) + (pc - pa) * (j as f64 / nf));
                }
            }

            let lattice = |i: usize, j: usize| -> u32 {
                match (i, j) {
                    (0, 0) => a,
                    (i, 0) if i == n => b,
                    (0, j) if j == n => c,
                    (i, 0) => on_edge(ab, i),
                    (0, j) => on_edge(ac, j),
                    (i, j) if i + j == n => on_edge(bc, j),
                    _ => interior[&(i, j)],
                }
            };

            for i in 0..n {
                for j in 0..n - i {
                    triangles.push([lattice(i, j), lattice(i + 1, j), lattice(i, j + 1)]);
                    if i + j + 1 < n {
                        triangles.push([lattice(i + 1, j), lattice(i + 1, j + 1), lattice(i, j + 1)]);
                    }
                }
            }
        }

        self.refined(vertices, triangles)
    }

    /// Split edges at their midpoints until none is longer than `length`
    pub fn refine_to_length(&self, length: f64) -> Solid {
        if !self.status.is_ok() {
            return Solid::invalid(self.status);
        }
        if !length.is_finite() || length <= 0.0 || self.is_empty() {
            return self.clone();
        }

        let mut vertices = self.vertices.clone();
        let mut triangles = self.triangles.clone();
        for _ in 0..MAX_LENGTH_PASSES {
            let long = |u: u32, v: u32, vertices: &[DVec3]| {
                vertices[u as usize].distance(vertices[v as usize]) > length
            };
            if !triangles
                .iter()
                .any(|t| (0..3).any(|e| long(t[e], t[(e + 1) % 3], &vertices)))
            {
                break;
            }

            let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
            let mut next = Vec::with_capacity(triangles.len() * 2);
            for tri in &triangles {
                let marked = [0, 1, 2].map(|e| long(tri[e], tri[(e + 1) % 3], &vertices));
                let mut mid = |e: usize, vertices: &mut Vec<DVec3>| -> u32 {
                    let (u, v) = (tri[e], tri[(e + 1) % 3]);
                    *midpoints.entry((u.min(v), u.max(v))).or_insert_with(|| {
                        let p = (vertices[u as usize] + vertices[v as usize]) * 0.5;
                        vertices.push(p);
                        vertices.len() as u32 - 1
                    })
                };
                match marked.iter().filter(|&&m| m).count() {
                    0 => next.push(*tri),
                    1 => {
                        let e = marked.iter().position(|&m| m).unwrap_or(0);
                        let m = mid(e, &mut vertices);
                        let [a, b, c] = rotated(*tri, e);
                        next.push([a, m, c]);
                        next.push([m, b, c]);
                    }
                    2 => {
                        // Rotate so the unmarked edge runs c -> a
                        let skip = marked.iter().position(|&m| !m).unwrap_or(0);
                        let e = (skip + 1) % 3;
                        let m1 = mid(e, &mut vertices);
                        let m2 = mid((e + 1) % 3, &mut vertices);
                        let [a, b, c] = rotated(*tri, e);
                        next.push([m1, b, m2]);
                        next.push([a, m1, m2]);
                        next.push([a, m2, c]);
                    }
                    _ => {
                        let [a, b, c] = *tri;
                        let (mab, mbc, mca) = (mid(0, &mut vertices), mid(1, &mut vertices), mid(2, &mut vertices));
                        next.push([a, mab, mca]);
                        next.push([mab, b, mbc]);
                        next.push([mca, mbc, c]);
                        next.push([mab, mbc, mca]);
                    }
                }
            }
            if next.len() > MAX_TRIANGLES {
                return Solid::invalid(Status::ResultTooLarge);
            }
            triangles = next;
        }

        self.refined(vertices, triangles)
    }

    /// Refine until the mesh is within `tolerance` of its smooth surface.
    ///
    /// Solids carry no tangent data, so their smooth surface is the mesh
    /// itself and this leaves the geometry as is.
    pub fn refine_to_tolerance(&self, _tolerance: f64) -> Solid {
        if !self.status.is_ok() {
            return Solid::invalid(self.status);
        }
        self.clone()
    }
}

/// Rotate a triangle so that edge `e` becomes edge 0
fn rotated(tri: [u32; 3], e: usize) -> [u32; 3] {
    [tri[e], tri[(e + 1) % 3], tri[(e + 2) % 3]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solid::is_edge_manifold;
    use approx::assert_relative_eq;

    #[test]
    fn test_refine_cube() {
        let cube = Solid::cube(DVec3::splat(10.0), true);
        let fine = cube.refine(3);
        assert_eq!(fine.num_tri(), 12 * 9);
        // 8 corners, 18 edges with 2 points each, 12 faces with 1 interior point
        assert_eq!(fine.num_vert(), 8 + 18 * 2 + 12);
        assert!(is_edge_manifold(fine.triangles()));
        assert_relative_eq!(fine.volume(), 1000.0, epsilon = 1e-9);
        assert_eq!(fine.original_id(), cube.original_id());
    }

    #[test]
    fn test_refine_one_is_identity() {
        let cube = Solid::cube(DVec3::ONE, false);
        assert_eq!(cube.refine(1).num_tri(), 12);
        assert_eq!(cube.refine(0).num_tri(), 12);
    }

    #[test]
    fn test_refine_to_length() {
        let cube = Solid::cube(DVec3::splat(4.0), false);
        let fine = cube.refine_to_length(1.0);
        assert!(is_edge_manifold(fine.triangles()));
        assert_relative_eq!(fine.volume(), 64.0, epsilon = 1e-9);
        for t in fine.triangles() {
            for e in 0..3 {
                let (a, b) = (fine.vertices()[t[e] as usize], fine.vertices()[t[(e + 1) % 3] as usize]);
                assert!(a.distance(b) <= 1.0 + 1e-12);
            }
        }
    }

    #[test]
    fn test_refine_to_tolerance_keeps_flat_mesh() {
        let cube = Solid::cube(DVec3::ONE, false);
        assert_eq!(cube.refine_to_tolerance(0.01).num_tri(), 12);
    }

    #[test]
    fn test_refine_propagates_status() {
        let bad = Solid::invalid(Status::NotManifold);
        assert_eq!(bad.refine(4).status(), Status::NotManifold);
        assert_eq!(bad.refine_to_length(1.0).status(), Status::NotManifold);
    }
}
