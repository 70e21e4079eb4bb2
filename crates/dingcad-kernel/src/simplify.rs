//! Edge-collapse simplification within a distance tolerance.

use std::collections::HashSet;

use glam::DVec3;

use crate::solid::{Solid, compact};

const MAX_PASSES: usize = 16;

/// Mutable triangle soup with vertex-to-triangle incidence
struct CollapseMesh {
    vertices: Vec<DVec3>,
    triangles: Vec<Option<[u32; 3]>>,
    incident: Vec<Vec<usize>>,
}

impl CollapseMesh {
    fn new(vertices: &[DVec3], triangles: &[[u32; 3]]) -> Self {
        let mut incident = vec![Vec::new(); vertices.len()];
        for (t, tri) in triangles.iter().enumerate() {
            for &v in tri {
                incident[v as usize].push(t);
            }
        }
        Self {
            vertices: vertices.to_vec(),
            triangles: triangles.iter().copied().map(Some).collect(),
            incident,
        }
    }

    fn neighbors(&self, v: u32) -> HashSet<u32> {
        self.incident[v as usize]
            .iter()
            .filter_map(|&t| self.triangles[t])
            .flatten()
            .filter(|&w| w != v)
            .collect()
    }

    fn normal(&self, tri: [u32; 3]) -> DVec3 {
        let [a, b, c] = tri.map(|i| self.vertices[i as usize]);
        (b - a).cross(c - a)
    }

    /// Move `u` onto `v` if the surface stays within `tol` and no face flips
    fn try_collapse(&mut self, u: u32, v: u32, tol: f64) -> bool {
        let around_u: Vec<usize> = self.incident[u as usize]
            .iter()
            .copied()
            .filter(|&t| self.triangles[t].is_some())
            .collect();
        let (shared, moved): (Vec<usize>, Vec<usize>) = around_u
            .iter()
            .partition(|&&t| self.triangles[t].is_some_and(|tri| tri.contains(&v)));
        if shared.len() != 2 {
            return false;
        }

        // Link condition: u and v may only share the two opposite vertices
        let nu = self.neighbors(u);
        let nv = self.neighbors(v);
        let common = nu.intersection(&nv).count();
        if common != 2 || nu.union(&nv).count() <= 4 {
            return false;
        }

        let (pu, pv) = (self.vertices[u as usize], self.vertices[v as usize]);
        for &t in &moved {
            let Some(old) = self.triangles[t] else { continue };
            let new = old.map(|i| if i == u { v } else { i });
            let (n_old, n_new) = (self.normal(old), self.normal(new));
            let (len_old, len_new) = (n_old.length(), n_new.length());
            let scale = pv.abs().max_element().max(1.0);
            if len_new <= f64::EPSILON * scale * scale {
                return false;
            }
            if len_old > 0.0 {
                if n_old.dot(n_new) <= 0.0 {
                    return false;
                }
                if (n_old / len_old).dot(pv - pu).abs() > tol {
                    return false;
                }
            }
            let anchor = self.vertices[new[0] as usize];
            if (n_new / len_new).dot(pu - anchor).abs() > tol {
                return false;
            }
        }

        for &t in &shared {
            self.triangles[t] = None;
        }
        for &t in &moved {
            if let Some(tri) = self.triangles[t].as_mut() {
                for i in tri.iter_mut() {
                    if *i == u {
                        *i = v;
                    }
                }
            }
            self.incident[v as usize].push(t);
        }
        self.incident[u as usize].clear();
        true
    }

    fn pass(&mut self, tol: f64) -> usize {
        let mut collapsed = 0;
        for t in 0..self.triangles.len() {
            let Some(tri) = self.triangles[t] else { continue };
            for e in 0..3 {
                let (u, v) = (tri[e], tri[(e + 1) % 3]);
                if self.vertices[u as usize].distance(self.vertices[v as usize]) > 2.0 * tol
                    && !self.is_flat(u, tol)
                {
                    continue;
                }
                if self.try_collapse(u, v, tol) {
                    collapsed += 1;
                    break;
                }
            }
        }
        collapsed
    }

    /// Whether every face around `v` lies within `tol` of one plane
    fn is_flat(&self, v: u32, tol: f64) -> bool {
        let faces: Vec<[u32; 3]> = self.incident[v as usize]
            .iter()
            .filter_map(|&t| self.triangles[t])
            .collect();
        let Some(reference) = faces
            .iter()
            .map(|&f| self.normal(f))
            .find(|n| n.length() > 0.0)
            .map(DVec3::normalize)
        else {
            return true;
        };
        let origin = self.vertices[v as usize];
        faces
            .iter()
            .flatten()
            .all(|&w| reference.dot(self.vertices[w as usize] - origin).abs() <= tol)
    }

    fn into_mesh(self) -> (Vec<DVec3>, Vec<[u32; 3]>) {
        compact(self.vertices, self.triangles.into_iter().flatten().collect())
    }
}

impl Solid {
    /// Collapse edges whose removal moves the surface by at most `tolerance`.
    ///
    /// A tolerance of zero (or anything below the solid's own tolerance)
    /// uses the solid's own tolerance.
    pub fn simplify(&self, tolerance: f64) -> Solid {
        if !self.status.is_ok() {
            return Solid::invalid(self.status);
        }
        if self.is_empty() {
            return self.clone();
        }
        let tol = if tolerance.is_finite() {
            tolerance.max(self.tolerance)
        } else {
            self.tolerance
        };

        let mut mesh = CollapseMesh::new(&self.vertices, &self.triangles);
        for _ in 0..MAX_PASSES {
            if mesh.pass(tol) == 0 {
                break;
            }
        }
        let (vertices, triangles) = mesh.into_mesh();
        let unchanged = triangles.len() == self.triangles.len();
        Solid {
            vertices,
            triangles,
            status: self.status,
            tolerance: tol,
            original_id: self.original_id,
            properties: if unchanged { self.properties.clone() } else { None },
        }
    }

    /// Set the tolerance, simplifying first when it grows
    pub fn set_tolerance(&self, tolerance: f64) -> Solid {
        if !self.status.is_ok() {
            return Solid::invalid(self.status);
        }
        let tolerance = tolerance.max(self.epsilon());
        let mut solid = if tolerance > self.tolerance {
            self.simplify(tolerance)
        } else {
            self.clone()
        };
        solid.tolerance = tolerance;
        solid
    }
}
