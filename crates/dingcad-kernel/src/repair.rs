//! Turning polygon soup back into an indexed, edge-manifold mesh.
//!
//! BSP output is a set of convex polygons that share positions only
//! approximately and meet in T-junctions. Welding merges positions within
//! `eps`, T-junction repair inserts every welded vertex that lies on a
//! polygon edge into that edge, and the result is triangulated without
//! creating zero-area slivers.

use std::collections::HashMap;

use glam::DVec3;

use crate::measure::BoundingBox;

type Cell = (i64, i64, i64);

fn cell_of(p: DVec3, size: f64) -> Cell {
    let q = (p / size).floor();
    (q.x as i64, q.y as i64, q.z as i64)
}

/// Merges positions closer than `eps` into one vertex index
pub(crate) struct Welder {
    eps: f64,
    cells: HashMap<Cell, Vec<u32>>,
    pub vertices: Vec<DVec3>,
}

impl Welder {
    pub fn new(eps: f64) -> Self {
        Self {
            eps: eps.max(f64::MIN_POSITIVE),
            cells: HashMap::new(),
            vertices: Vec::new(),
        }
    }

    pub fn insert(&mut self, p: DVec3) -> u32 {
        let (cx, cy, cz) = cell_of(p, self.eps);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    if let Some(ids) = self.cells.get(&(cx + dx, cy + dy, cz + dz)) {
                        for &id in ids {
                            if self.vertices[id as usize].distance(p) <= self.eps {
                                return id;
                            }
                        }
                    }
                }
            }
        }
        let id = self.vertices.len() as u32;
        self.vertices.push(p);
        self.cells.entry((cx, cy, cz)).or_default().push(id);
        id
    }
}

/// Uniform grid over vertex positions for segment proximity queries
struct PointGrid {
    size: f64,
    cells: HashMap<Cell, Vec<u32>>,
}

impl PointGrid {
    fn new(points: &[DVec3], eps: f64) -> Self {
        let extent = BoundingBox::from_points(points).size().max_element();
        let per_axis = (points.len() as f64).cbrt().max(1.0);
        let size = (extent / per_axis).max(eps * 4.0).max(f64::MIN_POSITIVE);
        let mut cells: HashMap<Cell, Vec<u32>> = HashMap::new();
        for (i, p) in points.iter().enumerate() {
            cells.entry(cell_of(*p, size)).or_default().push(i as u32);
        }
        Self { size, cells }
    }

    /// Indices of points that may lie within `eps` of segment `ab`
    fn near_segment(&self, a: DVec3, b: DVec3, eps: f64, total: usize) -> Vec<u32> {
        let lo = cell_of(a.min(b) - DVec3::splat(eps), self.size);
        let hi = cell_of(a.max(b) + DVec3::splat(eps), self.size);
        let span = (hi.0 - lo.0 + 1) * (hi.1 - lo.1 + 1) * (hi.2 - lo.2 + 1);
        if span as usize > total.max(64) {
            return (0..total as u32).collect();
        }
        let mut out = Vec::new();
        for x in lo.0..=hi.0 {
            for y in lo.1..=hi.1 {
                for z in lo.2..=hi.2 {
                    if let Some(ids) = self.cells.get(&(x, y, z)) {
                        out.extend_from_slice(ids);
                    }
                }
            }
        }
        out
    }
}

/// Weld, repair T-junctions and triangulate a set of convex polygons.
pub(crate) fn mesh_from_polygons(polygons: &[Vec<DVec3>], eps: f64) -> (Vec<DVec3>, Vec<[u32; 3]>) {
    let mut welder = Welder::new(eps);
    let mut loops: Vec<Vec<u32>> = Vec::with_capacity(polygons.len());
    for polygon in polygons {
        let mut ids: Vec<u32> = polygon.iter().map(|&p| welder.insert(p)).collect();
        ids.dedup();
        while ids.len() > 1 && ids.first() == ids.last() {
            ids.pop();
        }
        if ids.len() >= 3 {
            loops.push(ids);
        }
    }
    let vertices = welder.vertices;

    let grid = PointGrid::new(&vertices, eps);
    let mut splits: HashMap<(u32, u32), Vec<u32>> = HashMap::new();
    let mut triangles = Vec::new();
    let mut extra = Vec::new();

    for ids in &loops {
        let mut ring = Vec::with_capacity(ids.len());
        for k in 0..ids.len() {
            let (a, b) = (ids[k], ids[(k + 1) % ids.len()]);
            ring.push(a);
            let key = (a.min(b), a.max(b));
            let inner = splits
                .entry(key)
                .or_insert_with(|| points_on_edge(&vertices, &grid, key.0, key.1, eps));
            if a < b {
                ring.extend_from_slice(inner);
            } else {
                ring.extend(inner.iter().rev());
            }
        }
        triangulate_convex(&vertices, &ring, eps, &mut extra, &mut triangles);
    }

    let mut vertices = vertices;
    vertices.extend(extra);
    triangles.retain(|t: &[u32; 3]| t[0] != t[1] && t[1] != t[2] && t[2] != t[0]);
    (vertices, triangles)
}

/// Vertices strictly inside segment `ab`, ordered from `a` to `b`
fn points_on_edge(vertices: &[DVec3], grid: &PointGrid, a: u32, b: u32, eps: f64) -> Vec<u32> {
    let pa = vertices[a as usize];
    let pb = vertices[b as usize];
    let dir = pb - pa;
    let len2 = dir.length_squared();
    if len2 <= eps * eps {
        return Vec::new();
    }
    let len = len2.sqrt();
    let mut hits: Vec<(f64, u32)> = grid
        .near_segment(pa, pb, eps, vertices.len())
        .into_iter()
        .filter(|&c| c != a && c != b)
        .filter_map(|c| {
            let p = vertices[c as usize];
            let t = (p - pa).dot(dir) / len2;
            let along = t * len;
            if along <= eps || along >= len - eps {
                return None;
            }
            ((pa + dir * t).distance(p) <= eps).then_some((t, c))
        })
        .collect();
    hits.sort_by(|x, y| x.0.total_cmp(&y.0));
    hits.into_iter().map(|(_, c)| c).collect()
}

/// Triangulate a convex ring that may contain points on its sides.
fn triangulate_convex(
    vertices: &[DVec3],
    ring: &[u32],
    eps: f64,
    extra: &mut Vec<DVec3>,
    out: &mut Vec<[u32; 3]>,
) {
    let n = ring.len();
    let pos = |i: usize| vertices[ring[i % n] as usize];
    let is_corner: Vec<bool> = (0..n)
        .map(|i| {
            let prev = pos(i + n - 1);
            let cur = pos(i);
            let next = pos(i + 1);
            let edge = (next - prev).length().max(f64::MIN_POSITIVE);
            (cur - prev).cross(next - cur).length() / edge > eps
        })
        .collect();

    // A corner with unsplit sides on both hands can fan the whole ring
    let apex = (0..n).find(|&i| is_corner[i] && is_corner[(i + n - 1) % n] && is_corner[(i + 1) % n]);
    if let Some(apex) = apex {
        for k in 1..n - 1 {
            out.push([ring[apex], ring[(apex + k) % n], ring[(apex + k + 1) % n]]);
        }
        return;
    }
    if n == 3 {
        out.push([ring[0], ring[1], ring[2]]);
        return;
    }

    let centroid = ring.iter().map(|&i| vertices[i as usize]).sum::<DVec3>() / n as f64;
    let center = (vertices.len() + extra.len()) as u32;
    extra.push(centroid);
    for k in 0..n {
        out.push([center, ring[k], ring[(k + 1) % n]]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welder_merges_close_points() {
        let mut welder = Welder::new(1e-6);
        let a = welder.insert(DVec3::new(1.0, 1.0, 1.0));
        let b = welder.insert(DVec3::new(1.0 + 1e-9, 1.0, 1.0));
        let c = welder.insert(DVec3::new(1.1, 1.0, 1.0));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_t_junction_is_split() {
        // Two squares on the left share an edge with one tall rectangle
        let polygons = vec![
            vec![
                DVec3::new(0.0, 0.0, 0.0),
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(1.0, 1.0, 0.0),
                DVec3::new(0.0, 1.0, 0.0),
            ],
            vec![
                DVec3::new(0.0, 1.0, 0.0),
                DVec3::new(1.0, 1.0, 0.0),
                DVec3::new(1.0, 2.0, 0.0),
                DVec3::new(0.0, 2.0, 0.0),
            ],
            vec![
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(2.0, 0.0, 0.0),
                DVec3::new(2.0, 2.0, 0.0),
                DVec3::new(1.0, 2.0, 0.0),
            ],
        ];
        let (vertices, triangles) = mesh_from_polygons(&polygons, 1e-9);
        let mid = vertices
            .iter()
            .position(|v| v.distance(DVec3::new(1.0, 1.0, 0.0)) < 1e-12)
            .unwrap_or_else(|| panic!("shared vertex")) as u32;
        // The rectangle must now reference the T-junction vertex too
        let users = triangles.iter().filter(|t| t.contains(&mid)).count();
        assert!(users >= 3);
        let area: f64 = triangles
            .iter()
            .map(|t| {
                let [a, b, c] = t.map(|i| vertices[i as usize]);
                (b - a).cross(c - a).z * 0.5
            })
            .sum();
        assert!((area - 4.0).abs() < 1e-9);
    }
}
