//! Per-vertex property channels: normals and curvature.

use std::collections::HashMap;

use glam::DVec3;

use crate::solid::{Properties, Solid};

/// Map from directed edge to the triangle that owns it
fn edge_owners(triangles: &[[u32; 3]]) -> HashMap<(u32, u32), usize> {
    let mut owners = HashMap::with_capacity(triangles.len() * 3);
    for (t, tri) in triangles.iter().enumerate() {
        for e in 0..3 {
            owners.insert((tri[e], tri[(e + 1) % 3]), t);
        }
    }
    owners
}

fn corner_angle(a: DVec3, b: DVec3, c: DVec3) -> f64 {
    (b - a).angle_between(c - a)
}

impl Solid {
    fn face_normal(&self, t: usize) -> DVec3 {
        let [a, b, c] = self.triangle_positions(t);
        (b - a).cross(c - a).normalize_or_zero()
    }

    /// Existing channel values of the property vertex at one corner
    fn corner_channels(&self, t: usize, corner: usize) -> &[f64] {
        match &self.properties {
            Some(props) => {
                let pv = props.tri_verts[t][corner] as usize;
                &props.values[pv * props.num_prop..(pv + 1) * props.num_prop]
            }
            None => &[],
        }
    }

    /// Store angle-weighted vertex normals in channels
    /// `normal_idx..normal_idx + 3`.
    ///
    /// Edges whose faces meet at more than `min_sharp_angle` degrees are
    /// sharp: the vertices along them get one property vertex per smooth
    /// fan, so a cube corner carries three normals.
    pub fn calculate_normals(&self, normal_idx: usize, min_sharp_angle: f64) -> Solid {
        if !self.status.is_ok() {
            return Solid::invalid(self.status);
        }
        if self.is_empty() {
            return self.clone();
        }
        let normals: Vec<DVec3> = (0..self.num_tri()).map(|t| self.face_normal(t)).collect();
        let owners = edge_owners(&self.triangles);
        let sharp_cos = min_sharp_angle.to_radians().cos();

        // Union corners around each vertex across smooth edges
        let corners = self.num_tri() * 3;
        let mut parent: Vec<usize> = (0..corners).collect();
        for (t, tri) in self.triangles.iter().enumerate() {
            for e in 0..3 {
                let (u, v) = (tri[e], tri[(e + 1) % 3]);
                let Some(&other) = owners.get(&(v, u)) else { continue };
                if normals[t].dot(normals[other]) < sharp_cos {
                    continue;
                }
                let other_tri = self.triangles[other];
                for (vertex, here) in [(u, e), (v, (e + 1) % 3)] {
                    if let Some(there) = other_tri.iter().position(|&w| w == vertex) {
                        union(&mut parent, t * 3 + here, other * 3 + there);
                    }
                }
            }
        }

        let mut group_normal: HashMap<usize, DVec3> = HashMap::new();
        for t in 0..self.num_tri() {
            let [a, b, c] = self.triangle_positions(t);
            let angles = [corner_angle(a, b, c), corner_angle(b, c, a), corner_angle(c, a, b)];
            for corner in 0..3 {
                let root = find(&mut parent, t * 3 + corner);
                *group_normal.entry(root).or_insert(DVec3::ZERO) += normals[t] * angles[corner];
            }
        }

        let num_prop = self.num_prop().max(normal_idx + 3);
        let mut values = Vec::new();
        let mut tri_verts = vec![[0_u32; 3]; self.num_tri()];
        let mut slots: HashMap<(usize, usize), u32> = HashMap::new();
        for t in 0..self.num_tri() {
            for corner in 0..3 {
                let root = find(&mut parent, t * 3 + corner);
                let old = self.properties.as_ref().map_or(self.triangles[t][corner] as usize, |p| {
                    p.tri_verts[t][corner] as usize
                });
                let slot = *slots.entry((old, root)).or_insert_with(|| {
                    let start = values.len();
                    values.resize(start + num_prop, 0.0);
                    let channels = self.corner_channels(t, corner);
                    values[start..start + channels.len()].copy_from_slice(channels);
                    let n = group_normal.get(&root).copied().unwrap_or(DVec3::ZERO).normalize_or_zero();
                    values[start + normal_idx..start + normal_idx + 3].copy_from_slice(&n.to_array());
                    (start / num_prop) as u32
                });
                tri_verts[t][corner] = slot;
            }
        }

        let mut solid = self.clone();
        solid.properties = Some(Properties {
            num_prop,
            values,
            tri_verts,
        });
        solid
    }

    /// Store per-vertex Gaussian and mean curvature.
    ///
    /// A negative index skips that channel; with both negative the solid is
    /// returned unchanged.
    pub fn calculate_curvature(&self, gaussian_idx: i64, mean_idx: i64) -> Solid {
        if !self.status.is_ok() {
            return Solid::invalid(self.status);
        }
        let gaussian_idx = usize::try_from(gaussian_idx).ok();
        let mean_idx = usize::try_from(mean_idx).ok();
        if self.is_empty() || (gaussian_idx.is_none() && mean_idx.is_none()) {
            return self.clone();
        }

        let n = self.num_vert();
        let mut area = vec![0.0; n];
        let mut angle_sum = vec![0.0; n];
        let mut mean = vec![0.0; n];
        let owners = edge_owners(&self.triangles);
        for (t, tri) in self.triangles.iter().enumerate() {
            let [a, b, c] = self.triangle_positions(t);
            let third = (b - a).cross(c - a).length() / 6.0;
            let angles = [corner_angle(a, b, c), corner_angle(b, c, a), corner_angle(c, a, b)];
            for corner in 0..3 {
                let v = tri[corner] as usize;
                area[v] += third;
                angle_sum[v] += angles[corner];
            }
            // Each undirected edge once, from the triangle owning u -> v with u < v
            let normal = self.face_normal(t);
            for e in 0..3 {
                let (u, v) = (tri[e], tri[(e + 1) % 3]);
                if u > v {
                    continue;
                }
                let Some(&other) = owners.get(&(v, u)) else { continue };
                let opposite = self.triangles[other]
                    .iter()
                    .copied()
                    .find(|&w| w != u && w != v)
                    .unwrap_or(u);
                let (pu, pv) = (self.vertices[u as usize], self.vertices[v as usize]);
                let mut dihedral = normal.angle_between(self.face_normal(other));
                if normal.dot(self.vertices[opposite as usize] - pu) > 0.0 {
                    dihedral = -dihedral;
                }
                let share = pu.distance(pv) * dihedral / 4.0;
                mean[u as usize] += share;
                mean[v as usize] += share;
            }
        }

        let gaussian: Vec<f64> = (0..n)
            .map(|v| {
                if area[v] > 0.0 {
                    (std::f64::consts::TAU - angle_sum[v]) / area[v]
                } else {
                    0.0
                }
            })
            .collect();
        let mean: Vec<f64> = (0..n)
            .map(|v| if area[v] > 0.0 { mean[v] / area[v] } else { 0.0 })
            .collect();

        let top = [gaussian_idx, mean_idx].into_iter().flatten().max().unwrap_or(0);
        let num_prop = self.num_prop().max(top + 1);
        let (prop_count, tri_verts) = match &self.properties {
            Some(props) => (props.num_prop_vert(), props.tri_verts.clone()),
            None => (n, self.triangles.clone()),
        };

        let mut values = vec![0.0; prop_count * num_prop];
        let mut owner_vertex = vec![usize::MAX; prop_count];
        for (t, pv) in tri_verts.iter().enumerate() {
            for corner in 0..3 {
                owner_vertex[pv[corner] as usize] = self.triangles[t][corner] as usize;
            }
        }
        for (pv, &v) in owner_vertex.iter().enumerate() {
            let start = pv * num_prop;
            if let Some(props) = &self.properties {
                let old = &props.values[pv * props.num_prop..(pv + 1) * props.num_prop];
                values[start..start + old.len()].copy_from_slice(old);
            }
            if v == usize::MAX {
                continue;
            }
            if let Some(g) = gaussian_idx {
                values[start + g] = gaussian[v];
            }
            if let Some(m) = mean_idx {
                values[start + m] = mean[v];
            }
        }

        let mut solid = self.clone();
        solid.properties = Some(Properties {
            num_prop,
            values,
            tri_verts,
        });
        solid
    }
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let (ra, rb) = (find(parent, a), find(parent, b));
    if ra != rb {
        parent[rb] = ra;
    }
}
