//! Level-set meshing by marching tetrahedra.
//!
//! The bounds are sampled on a regular grid. Each grid cell is split into six
//! tetrahedra that share the cell diagonal, so neighbouring cells agree on
//! every face and the output is closed without a lookup table.

use std::collections::HashMap;

use glam::DVec3;
use rayon::prelude::*;

use crate::measure::BoundingBox;
use crate::solid::Solid;
use crate::status::Status;

/// Largest sample grid a level set may allocate
pub const LEVEL_SET_MAX_SAMPLES: usize = 1 << 27;

/// Corner offsets of the six tetrahedra in a cell, as `x | y << 1 | z << 2`.
/// Each is listed with positive orientation.
const CELL_TETS: [[usize; 4]; 6] = [
    [0, 1, 3, 7],
    [0, 1, 7, 5],
    [0, 2, 7, 3],
    [0, 2, 6, 7],
    [0, 4, 5, 7],
    [0, 4, 7, 6],
];

/// Bisection steps per crossing before settling on the bracket midpoint
const MAX_BISECTION_STEPS: usize = 64;

/// Regular sample grid over a bounding box
#[derive(Debug, Clone, Copy)]
struct Grid {
    origin: DVec3,
    step: DVec3,
    cells: [usize; 3],
}

impl Grid {
    fn new(bounds: &BoundingBox, edge_length: f64) -> Option<Self> {
        let size = bounds.max - bounds.min;
        if edge_length.is_nan() || edge_length <= 0.0 || !size.is_finite() || size.min_element() <= 0.0 {
            return None;
        }
        let cells = size.to_array().map(|s| ((s / edge_length).ceil() as usize).max(1));
        Some(Self {
            origin: bounds.min,
            step: size / DVec3::new(cells[0] as f64, cells[1] as f64, cells[2] as f64),
            cells,
        })
    }

    fn samples(&self) -> Option<usize> {
        self.cells
            .iter()
            .try_fold(1_usize, |acc, &c| acc.checked_mul(c + 1))
    }

    fn index(&self, i: usize, j: usize, k: usize) -> usize {
        i + (self.cells[0] + 1) * (j + (self.cells[1] + 1) * k)
    }

    fn coords(&self, index: usize) -> [usize; 3] {
        let nx = self.cells[0] + 1;
        let ny = self.cells[1] + 1;
        [index % nx, (index / nx) % ny, index / (nx * ny)]
    }

    fn position(&self, index: usize) -> DVec3 {
        let [i, j, k] = self.coords(index);
        self.origin + self.step * DVec3::new(i as f64, j as f64, k as f64)
    }

    fn on_boundary(&self, index: usize) -> bool {
        let c = self.coords(index);
        (0..3).any(|a| c[a] == 0 || c[a] == self.cells[a])
    }
}

impl Solid {
    /// Mesh the region where `sdf(p) > level` inside `bounds`.
    ///
    /// Samples are taken serially in grid order, so `sdf` may carry state.
    /// A positive `tolerance` refines each surface crossing by bisection
    /// until its bracket is shorter than the tolerance; otherwise crossings
    /// are linearly interpolated.
    pub fn level_set<F>(mut sdf: F, bounds: BoundingBox, edge_length: f64, level: f64, tolerance: f64) -> Solid
    where
        F: FnMut(DVec3) -> f64,
    {
        let Some(grid) = Grid::new(&bounds, edge_length) else {
            return Solid::empty();
        };
        let Some(total) = grid.samples().filter(|&n| n <= LEVEL_SET_MAX_SAMPLES) else {
            return Solid::invalid(Status::ResultTooLarge);
        };
        let values: Vec<f64> = (0..total).map(|i| sdf(grid.position(i))).collect();
        march(&grid, values, level, tolerance, edge_length, sdf)
    }

    /// Parallel variant of [`Solid::level_set`] for thread-safe samplers
    pub fn level_set_par<F>(sdf: F, bounds: BoundingBox, edge_length: f64, level: f64, tolerance: f64) -> Solid
    where
        F: Fn(DVec3) -> f64 + Sync,
    {
        let Some(grid) = Grid::new(&bounds, edge_length) else {
            return Solid::empty();
        };
        let Some(total) = grid.samples().filter(|&n| n <= LEVEL_SET_MAX_SAMPLES) else {
            return Solid::invalid(Status::ResultTooLarge);
        };
        let values: Vec<f64> = (0..total)
            .into_par_iter()
            .map(|i| sdf(grid.position(i)))
            .collect();
        march(&grid, values, level, tolerance, edge_length, sdf)
    }
}

fn march<F>(grid: &Grid, mut values: Vec<f64>, level: f64, tolerance: f64, edge_length: f64, mut sdf: F) -> Solid
where
    F: FnMut(DVec3) -> f64,
{
    // Close the surface at the bounds
    let outside = level - edge_length * 1e-3;
    for (i, v) in values.iter_mut().enumerate() {
        if !v.is_finite() || (grid.on_boundary(i) && *v > outside) {
            *v = outside;
        }
    }

    let mut vertices: Vec<DVec3> = Vec::new();
    let mut edge_vertex: HashMap<(usize, usize), u32> = HashMap::new();
    let mut triangles: Vec<[u32; 3]> = Vec::new();

    let mut crossing = |a: usize, b: usize, vertices: &mut Vec<DVec3>| -> u32 {
        let key = (a.min(b), a.max(b));
        if let Some(&v) = edge_vertex.get(&key) {
            return v;
        }
        // `a` is inside, `b` outside
        let (pa, pb) = (grid.position(a), grid.position(b));
        let (va, vb) = (values[a], values[b]);
        let t = ((va - level) / (va - vb)).clamp(0.0, 1.0);
        let mut p = pa.lerp(pb, t);
        if tolerance > 0.0 && !grid.on_boundary(a) && !grid.on_boundary(b) {
            p = bisect(&mut sdf, pa, pb, level, tolerance);
        }
        let index = vertices.len() as u32;
        vertices.push(p);
        edge_vertex.insert(key, index);
        index
    };

    for k in 0..grid.cells[2] {
        for j in 0..grid.cells[1] {
            for i in 0..grid.cells[0] {
                let corner = |c: usize| grid.index(i + (c & 1), j + ((c >> 1) & 1), k + ((c >> 2) & 1));
                for tet in CELL_TETS {
                    let ids = tet.map(corner);
                    let inside = ids.map(|id| values[id] > level);
                    let count = inside.iter().filter(|&&x| x).count();
                    if count == 0 || count == 4 {
                        continue;
                    }

                    let (ins, outs): (Vec<usize>, Vec<usize>) = (0..4).partition(|&c| inside[c]);
                    let order = even_order(if count == 3 { [outs, ins] } else { [ins, outs] });
                    let [a, b, c, d] = order.map(|o| ids[o]);
                    let mut cross = |from: usize, to: usize| crossing(from, to, &mut vertices);

                    match count {
                        // Lone inside corner: the cap faces away from it
                        1 => triangles.push([cross(a, b), cross(a, c), cross(a, d)]),
                        // Lone outside corner: the cap faces toward it
                        3 => triangles.push([cross(b, a), cross(d, a), cross(c, a)]),
                        _ => {
                            let ring = [cross(a, c), cross(a, d), cross(b, d), cross(b, c)];
                            triangles.push([ring[0], ring[1], ring[2]]);
                            triangles.push([ring[0], ring[2], ring[3]]);
                        }
                    }
                }
            }
        }
    }

    Solid::from_generated(vertices, triangles).into_original()
}

/// Concatenate the two corner groups into an even permutation of the tet.
/// The last group always holds at least two corners, so the parity swap
/// stays inside it.
fn even_order(groups: [Vec<usize>; 2]) -> [usize; 4] {
    let mut order = [0; 4];
    for (slot, c) in order.iter_mut().zip(groups.into_iter().flatten()) {
        *slot = c;
    }
    let inversions = (0..4)
        .flat_map(|i| (i + 1..4).map(move |j| (i, j)))
        .filter(|&(i, j)| order[i] > order[j])
        .count();
    if inversions % 2 == 1 {
        order.swap(2, 3);
    }
    order
}

/// Narrow the crossing between inside `lo` and outside `hi`
fn bisect<F>(sdf: &mut F, mut lo: DVec3, mut hi: DVec3, level: f64, tolerance: f64) -> DVec3
where
    F: FnMut(DVec3) -> f64,
{
    for _ in 0..MAX_BISECTION_STEPS {
        if lo.distance(hi) <= tolerance {
            break;
        }
        let mid = (lo + hi) * 0.5;
        if mid == lo || mid == hi {
            break;
        }
        if sdf(mid) > level {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (lo + hi) * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solid::is_edge_manifold;
    use approx::assert_relative_eq;

    fn unit_bounds(half: f64) -> BoundingBox {
        BoundingBox::new(DVec3::splat(-half), DVec3::splat(half))
    }

    #[test]
    fn test_sphere_level_set() {
        let solid = Solid::level_set(|p| 1.0 - p.length(), unit_bounds(1.5), 0.1, 0.0, -1.0);
        assert!(is_edge_manifold(solid.triangles()));
        let exact = 4.0 / 3.0 * std::f64::consts::PI;
        assert_relative_eq!(solid.volume(), exact, max_relative = 0.05);
        assert_eq!(solid.genus(), 0);
        assert!(solid.original_id().is_some());
    }

    #[test]
    fn test_parallel_matches_serial() {
        let sdf = |p: DVec3| 0.8 - p.length();
        let a = Solid::level_set(sdf, unit_bounds(1.0), 0.2, 0.0, -1.0);
        let b = Solid::level_set_par(sdf, unit_bounds(1.0), 0.2, 0.0, -1.0);
        assert_eq!(a.num_tri(), b.num_tri());
        assert_relative_eq!(a.volume(), b.volume(), epsilon = 1e-9);
    }

    #[test]
    fn test_result_is_clipped_to_bounds() {
        let solid = Solid::level_set(|_| 1.0, unit_bounds(1.0), 0.5, 0.0, -1.0);
        assert!(is_edge_manifold(solid.triangles()));
        let bb = solid.bounding_box();
        assert!(bb.min.min_element() >= -1.0 - 1e-12);
        assert!(bb.max.max_element() <= 1.0 + 1e-12);
        assert_relative_eq!(solid.volume(), 8.0, max_relative = 0.01);
    }

    #[test]
    fn test_bisection_tightens_crossings() {
        let solid = Solid::level_set(|p| 1.0 - p.length(), unit_bounds(1.5), 0.25, 0.0, 1e-4);
        for v in solid.vertices() {
            assert_relative_eq!(v.length(), 1.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_tolerance_below_float_spacing_terminates() {
        let bounds = BoundingBox::new(DVec3::ZERO, DVec3::ONE);
        let solid = Solid::level_set(|p| 0.3 - p.x, bounds, 0.25, 0.0, 1e-30);
        assert_eq!(solid.status(), Status::NoError);
        assert_relative_eq!(solid.volume(), 0.3, max_relative = 0.05);
    }

    #[test]
    fn test_uneven_crossings_stay_manifold() {
        // Crossings land at very different fractions along neighbouring edges
        let wavy = |p: DVec3| (p.x * 3.1).sin() * (p.y * 2.3).cos() + (p.z * 1.7).sin() + 0.2;
        for edge in [0.5, 0.23, 0.1] {
            let solid = Solid::level_set(wavy, unit_bounds(2.0), edge, 0.0, -1.0);
            assert_eq!(solid.status(), Status::NoError, "edge {edge}");
            assert!(is_edge_manifold(solid.triangles()), "edge {edge}");
            assert!(solid.volume() > 0.0, "edge {edge}");
        }
    }

    #[test]
    fn test_even_order_keeps_groups() {
        for count in 1..=3 {
            for mask in 0_u8..16 {
                if mask.count_ones() as usize != count {
                    continue;
                }
                let (first, last): (Vec<usize>, Vec<usize>) = (0..4).partition(|&c| (mask >> c) & 1 == 1);
                let split = first.len();
                let order = even_order([first.clone(), last]);
                let mut head = order[..split].to_vec();
                head.sort_unstable();
                assert_eq!(head, first);
                let inversions = (0..4)
                    .flat_map(|i| (i + 1..4).map(move |j| (i, j)))
                    .filter(|&(i, j)| order[i] > order[j])
                    .count();
                assert_eq!(inversions % 2, 0);
            }
        }
    }

    #[test]
    fn test_cell_tets_are_positive() {
        let corner = |c: usize| DVec3::new((c & 1) as f64, ((c >> 1) & 1) as f64, ((c >> 2) & 1) as f64);
        for tet in CELL_TETS {
            let [a, b, c, d] = tet.map(corner);
            assert!((b - a).cross(c - a).dot(d - a) > 0.0, "{tet:?}");
        }
    }

    #[test]
    fn test_sampler_sees_every_grid_point() {
        let mut calls = 0;
        let _ = Solid::level_set(
            |p| {
                calls += 1;
                0.5 - p.length()
            },
            unit_bounds(1.0),
            0.5,
            0.0,
            -1.0,
        );
        assert_eq!(calls, 125);
    }

    #[test]
    fn test_oversized_grid_is_rejected() {
        let mut calls = 0;
        let solid = Solid::level_set(
            |_| {
                calls += 1;
                0.0
            },
            unit_bounds(1000.0),
            0.001,
            0.0,
            -1.0,
        );
        assert_eq!(solid.status(), Status::ResultTooLarge);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_invalid_grid_is_empty() {
        assert!(Solid::level_set(|_| 1.0, unit_bounds(1.0), 0.0, 0.0, -1.0).is_empty());
        let flat = BoundingBox::new(DVec3::ZERO, DVec3::new(1.0, 1.0, 0.0));
        assert!(Solid::level_set(|_| 1.0, flat, 0.1, 0.0, -1.0).is_empty());
    }
}
