//! Planar polygon sets: triangulation, slicing and projection.
//!
//! A [`Polygons`] value is a list of closed loops with no repeated closing
//! point. Counter-clockwise loops are filled; clockwise loops are holes in
//! the smallest counter-clockwise loop that contains them.

use std::collections::{HashMap, HashSet};

use glam::{DVec2, DVec3};

use crate::solid::Solid;

/// One closed loop
pub type Polygon = Vec<DVec2>;

/// A set of loops
pub type Polygons = Vec<Polygon>;

/// Signed area, positive for counter-clockwise loops
pub fn signed_area(points: &[DVec2]) -> f64 {
    let n = points.len();
    (0..n)
        .map(|i| points[i].perp_dot(points[(i + 1) % n]))
        .sum::<f64>()
        * 0.5
}

fn cross(o: DVec2, a: DVec2, b: DVec2) -> f64 {
    (a - o).perp_dot(b - o)
}

/// Point-in-polygon by crossing count
pub(crate) fn contains(points: &[DVec2], p: DVec2) -> bool {
    let mut inside = false;
    let n = points.len();
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let (a, b) = (points[i], points[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Drop repeated and collinear points; loops left with fewer than three
/// points vanish.
pub(crate) fn simplify_loop(points: &[DVec2], eps: f64) -> Option<Polygon> {
    let mut pts: Polygon = Vec::with_capacity(points.len());
    for &p in points {
        if pts.last().is_none_or(|last: &DVec2| last.distance(p) > eps) {
            pts.push(p);
        }
    }
    while pts.len() > 1 && pts[0].distance(pts[pts.len() - 1]) <= eps {
        pts.pop();
    }

    let mut changed = true;
    while changed && pts.len() >= 3 {
        changed = false;
        let n = pts.len();
        for i in 0..n {
            let prev = pts[(i + n - 1) % n];
            let next = pts[(i + 1) % n];
            let span = prev.distance(next).max(f64::MIN_POSITIVE);
            if cross(prev, pts[i], next).abs() / span <= eps {
                pts.remove(i);
                changed = true;
                break;
            }
        }
    }
    (pts.len() >= 3).then_some(pts)
}

/// An outer loop with the holes it contains, as indices into a shared
/// point list.
#[derive(Debug, Clone)]
pub(crate) struct Region {
    pub outer: Vec<u32>,
    pub holes: Vec<Vec<u32>>,
}

/// Group loops into regions. Clockwise loops outside every
/// counter-clockwise loop are reversed and treated as outers.
pub(crate) fn regions(points: &[DVec2], loops: &[Vec<u32>]) -> Vec<Region> {
    let pos = |l: &[u32]| -> Vec<DVec2> { l.iter().map(|&i| points[i as usize]).collect() };
    let areas: Vec<f64> = loops.iter().map(|l| signed_area(&pos(l))).collect();

    let mut outers: Vec<(usize, Vec<u32>)> = Vec::new();
    let mut holes: Vec<(usize, Vec<u32>)> = Vec::new();
    for (i, l) in loops.iter().enumerate() {
        if areas[i] > 0.0 {
            outers.push((i, l.clone()));
        } else if areas[i] < 0.0 {
            holes.push((i, l.clone()));
        }
    }

    let mut result: Vec<Region> = outers
        .iter()
        .map(|(_, l)| Region {
            outer: l.clone(),
            holes: Vec::new(),
        })
        .collect();

    for (_, hole) in holes {
        let probe = points[hole[0] as usize];
        let owner = outers
            .iter()
            .enumerate()
            .filter(|(_, (_, outer))| contains(&pos(outer), probe))
            .min_by(|a, b| areas[a.1.0].total_cmp(&areas[b.1.0]))
            .map(|(k, _)| k);
        match owner {
            Some(k) => result[k].holes.push(hole),
            None => {
                let mut outer = hole;
                outer.reverse();
                result.push(Region {
                    outer,
                    holes: Vec::new(),
                });
            }
        }
    }
    result
}

fn segments_cross(a: DVec2, b: DVec2, c: DVec2, d: DVec2) -> bool {
    let d1 = cross(c, d, a);
    let d2 = cross(c, d, b);
    let d3 = cross(a, b, c);
    let d4 = cross(a, b, d);
    (d1 > 0.0) != (d2 > 0.0) && (d3 > 0.0) != (d4 > 0.0) && d1 != 0.0 && d2 != 0.0 && d3 != 0.0 && d4 != 0.0
}

/// Splice each hole into the outer ring through a visible bridge
fn bridge_holes(points: &[DVec2], region: &Region) -> Vec<u32> {
    let mut ring = region.outer.clone();
    let mut holes = region.holes.clone();
    let max_x = |h: &Vec<u32>| {
        h.iter()
            .map(|&i| points[i as usize].x)
            .fold(f64::NEG_INFINITY, f64::max)
    };
    holes.sort_by(|a, b| max_x(b).total_cmp(&max_x(a)));

    for (hi, hole) in holes.iter().enumerate() {
        let mi = (0..hole.len())
            .max_by(|&a, &b| points[hole[a] as usize].x.total_cmp(&points[hole[b] as usize].x))
            .unwrap_or(0);
        let m = points[hole[mi] as usize];

        let mut candidates: Vec<usize> = (0..ring.len()).collect();
        candidates.sort_by(|&a, &b| {
            let da = points[ring[a] as usize].distance_squared(m);
            let db = points[ring[b] as usize].distance_squared(m);
            da.total_cmp(&db)
        });

        let edges_of = |l: &[u32]| -> Vec<(DVec2, DVec2)> {
            (0..l.len())
                .map(|k| (points[l[k] as usize], points[l[(k + 1) % l.len()] as usize]))
                .collect()
        };
        let mut blockers = edges_of(&ring);
        for other in &holes[hi..] {
            blockers.extend(edges_of(other));
        }

        let chosen = candidates
            .iter()
            .copied()
            .find(|&c| {
                let v = points[ring[c] as usize];
                blockers.iter().all(|&(p, q)| !segments_cross(m, v, p, q))
            })
            .unwrap_or(candidates[0]);

        let mut merged = Vec::with_capacity(ring.len() + hole.len() + 2);
        merged.extend_from_slice(&ring[..=chosen]);
        merged.extend_from_slice(&hole[mi..]);
        merged.extend_from_slice(&hole[..=mi]);
        merged.extend_from_slice(&ring[chosen..]);
        ring = merged;
    }
    ring
}

fn point_in_triangle(p: DVec2, a: DVec2, b: DVec2, c: DVec2) -> bool {
    cross(a, b, p) >= 0.0 && cross(b, c, p) >= 0.0 && cross(c, a, p) >= 0.0
}

/// Ear-clip a simple counter-clockwise ring of point indices.
pub(crate) fn ear_clip(points: &[DVec2], ring: &[u32], out: &mut Vec<[u32; 3]>) {
    let mut ring = ring.to_vec();
    let at = |i: u32| points[i as usize];

    while ring.len() > 3 {
        let n = ring.len();
        let mut ear = None;
        let mut best_convex: Option<(usize, f64)> = None;
        for i in 0..n {
            let (p, c, q) = (ring[(i + n - 1) % n], ring[i], ring[(i + 1) % n]);
            let turn = cross(at(p), at(c), at(q));
            if turn <= 0.0 {
                continue;
            }
            if best_convex.is_none_or(|(_, t)| turn > t) {
                best_convex = Some((i, turn));
            }
            let blocked = ring.iter().any(|&k| {
                k != p
                    && k != c
                    && k != q
                    && at(k) != at(p)
                    && at(k) != at(c)
                    && at(k) != at(q)
                    && point_in_triangle(at(k), at(p), at(c), at(q))
            });
            if !blocked {
                ear = Some(i);
                break;
            }
        }

        match ear.or(best_convex.map(|(i, _)| i)) {
            Some(i) => {
                let n = ring.len();
                out.push([ring[(i + n - 1) % n], ring[i], ring[(i + 1) % n]]);
                ring.remove(i);
            }
            // Only reflex or flat corners remain; drop one flat corner
            None => {
                let n = ring.len();
                let flat = (0..n)
                    .find(|&i| {
                        cross(at(ring[(i + n - 1) % n]), at(ring[i]), at(ring[(i + 1) % n])).abs()
                            <= f64::EPSILON
                    })
                    .unwrap_or(0);
                ring.remove(flat);
            }
        }
    }
    if ring.len() == 3 && cross(at(ring[0]), at(ring[1]), at(ring[2])) > 0.0 {
        out.push([ring[0], ring[1], ring[2]]);
    }
}

/// Triangulate loops given as index lists into `points`.
///
/// Triangles are counter-clockwise and reference the original indices.
pub(crate) fn triangulate_loops(points: &[DVec2], loops: &[Vec<u32>]) -> Vec<[u32; 3]> {
    let mut out = Vec::new();
    for region in regions(points, loops) {
        let ring = bridge_holes(points, &region);
        ear_clip(points, &ring, &mut out);
    }
    out
}

/// Clean a polygon set and triangulate it.
///
/// Returns the points that survive cleaning, the loops as index lists and
/// counter-clockwise triangles over those points.
pub fn triangulate(polygons: &Polygons, eps: f64) -> (Vec<DVec2>, Vec<Vec<u32>>, Vec<[u32; 3]>) {
    let mut points = Vec::new();
    let mut loops = Vec::new();
    for poly in polygons {
        if let Some(clean) = simplify_loop(poly, eps) {
            let start = points.len() as u32;
            loops.push((start..start + clean.len() as u32).collect());
            points.extend(clean);
        }
    }
    let triangles = triangulate_loops(&points, &loops);
    (points, loops, triangles)
}

/// Total filled area under the counter-clockwise-filled convention
pub fn area(polygons: &Polygons) -> f64 {
    polygons.iter().map(|p| signed_area(p)).sum()
}

impl Solid {
    fn planar_eps(&self) -> f64 {
        1e-9 * self.extent().max(1.0)
    }

    /// Cross-section at `z = height`.
    ///
    /// Vertices exactly at the height count as above it. Outer loops are
    /// counter-clockwise and holes clockwise.
    pub fn slice(&self, height: f64) -> Polygons {
        if self.is_empty() {
            return Vec::new();
        }
        let above = |v: u32| self.vertices[v as usize].z >= height;
        let crossing = |a: u32, b: u32| -> DVec2 {
            let (lo, hi) = (a.min(b), a.max(b));
            let (p, q) = (self.vertices[lo as usize], self.vertices[hi as usize]);
            let t = (height - p.z) / (q.z - p.z);
            p.lerp(q, t).truncate()
        };

        let mut points: HashMap<(u32, u32), DVec2> = HashMap::new();
        let mut next: HashMap<(u32, u32), (u32, u32)> = HashMap::new();
        for (ti, tri) in self.triangles.iter().enumerate() {
            let flags = tri.map(above);
            if flags[0] == flags[1] && flags[1] == flags[2] {
                continue;
            }
            let mut keys = Vec::with_capacity(2);
            for k in 0..3 {
                let (a, b) = (tri[k], tri[(k + 1) % 3]);
                if flags[k] != flags[(k + 1) % 3] {
                    let key = (a.min(b), a.max(b));
                    points.entry(key).or_insert_with(|| crossing(a, b));
                    keys.push(key);
                }
            }
            let [p0, p1, p2] = self.triangle_positions(ti);
            let dir = DVec3::Z.cross((p1 - p0).cross(p2 - p0)).truncate();
            let (s, e) = (keys[0], keys[1]);
            if (points[&e] - points[&s]).dot(dir) >= 0.0 {
                next.insert(s, e);
            } else {
                next.insert(e, s);
            }
        }
        chain_loops(&next, |k| points[k], self.planar_eps())
    }

    /// Outline of the shadow on the XY plane.
    ///
    /// Loops are the boundaries of the upward-facing surface, so
    /// overlapping loops may appear for solids with overhangs; the set is
    /// exact under a positive fill rule.
    pub fn project(&self) -> Polygons {
        let up: Vec<usize> = (0..self.num_tri())
            .filter(|&i| {
                let [a, b, c] = self.triangle_positions(i);
                (b - a).cross(c - a).z > 0.0
            })
            .collect();
        let mut directed: HashSet<(u32, u32)> = HashSet::new();
        for &i in &up {
            let t = self.triangles[i];
            for k in 0..3 {
                directed.insert((t[k], t[(k + 1) % 3]));
            }
        }
        let mut next: HashMap<(u32, u32), (u32, u32)> = HashMap::new();
        let mut outgoing: HashMap<u32, Vec<u32>> = HashMap::new();
        for &(a, b) in &directed {
            if !directed.contains(&(b, a)) {
                outgoing.entry(a).or_default().push(b);
            }
        }
        // Vertex-keyed chain: edge (a, b) is followed by an edge leaving b
        let mut used: HashMap<u32, usize> = HashMap::new();
        for (&a, targets) in &outgoing {
            for &b in targets {
                if let Some(list) = outgoing.get(&b) {
                    let slot = used.entry(b).or_insert(0);
                    let c = list[*slot % list.len()];
                    *slot += 1;
                    next.insert((a, b), (b, c));
                }
            }
        }
        chain_loops(
            &next,
            |k| self.vertices[k.1 as usize].truncate(),
            self.planar_eps(),
        )
    }
}

/// Follow `next` links into closed loops of positions
fn chain_loops(
    next: &HashMap<(u32, u32), (u32, u32)>,
    position: impl Fn(&(u32, u32)) -> DVec2,
    eps: f64,
) -> Polygons {
    let mut starts: Vec<&(u32, u32)> = next.keys().collect();
    starts.sort_unstable();
    let mut visited: HashSet<(u32, u32)> = HashSet::new();
    let mut result = Vec::new();

    for start in starts {
        if visited.contains(start) {
            continue;
        }
        let mut ring = Vec::new();
        let mut key = *start;
        loop {
            if !visited.insert(key) {
                break;
            }
            ring.push(position(&key));
            match next.get(&key) {
                Some(&k) => key = k,
                None => break,
            }
        }
        if let Some(clean) = simplify_loop(&ring, eps) {
            result.push(clean);
        }
    }
    result
}
