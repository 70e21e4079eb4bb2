//! Boolean operations on solids.
//!
//! Solids are converted to convex polygons and combined with BSP trees:
//!
//! - **Add**: keep (A outside B) and (B outside A)
//! - **Subtract**: keep (A outside B) and (B inside A, reversed)
//! - **Intersect**: keep (A inside B) and (B inside A)
//!
//! Coincident faces are resolved by order, so `a + a == a` and
//! `a - a` is empty. Results are welded and T-junction free.

mod bsp;
mod polygon;

use std::fmt;

use rayon::prelude::*;

use crate::repair::mesh_from_polygons;
use crate::solid::Solid;
use bsp::BspTree;
pub(crate) use polygon::Polygon;

/// Boolean operation selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpType {
    Add,
    Subtract,
    Intersect,
}

impl OpType {
    /// Numeric selector used by the script API (`0`, `1`, `2`)
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(OpType::Add),
            1 => Some(OpType::Subtract),
            2 => Some(OpType::Intersect),
            _ => None,
        }
    }

    /// Case-insensitive name, accepting both set and operator spellings
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "add" | "union" => Some(OpType::Add),
            "subtract" | "difference" => Some(OpType::Subtract),
            "intersect" | "intersection" => Some(OpType::Intersect),
            _ => None,
        }
    }
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OpType::Add => "add",
            OpType::Subtract => "subtract",
            OpType::Intersect => "intersect",
        })
    }
}

/// Plane epsilon relative to the largest coordinate involved
const BSP_PRECISION: f64 = 1e-9;

fn tolerances(solids: &[&Solid]) -> (f64, f64) {
    let scale = solids.iter().fold(1.0_f64, |acc, s| acc.max(s.extent()));
    let eps = BSP_PRECISION * scale;
    let tolerance = solids.iter().fold(0.0_f64, |acc, s| acc.max(s.tolerance));
    (eps, tolerance)
}

pub(crate) fn to_polygons(solid: &Solid) -> Vec<Polygon> {
    (0..solid.num_tri())
        .filter_map(|i| {
            let [a, b, c] = solid.triangle_positions(i);
            Polygon::from_triangle(a, b, c)
        })
        .collect()
}

fn from_polygons(polygons: Vec<Polygon>, eps: f64, tolerance: f64) -> Solid {
    let loops: Vec<_> = polygons.into_iter().map(|p| p.vertices).collect();
    let (vertices, triangles) = mesh_from_polygons(&loops, eps * 10.0);
    let mut solid = Solid::from_raw(vertices, triangles);
    solid.tolerance = solid.tolerance.max(tolerance);
    solid
}

fn union_polygons(a: Vec<Polygon>, b: Vec<Polygon>, eps: f64) -> Vec<Polygon> {
    let mut ta = BspTree::new(a, eps);
    let mut tb = BspTree::new(b, eps);
    ta.clip_to(&tb);
    tb.clip_to(&ta);
    tb.invert();
    tb.clip_to(&ta);
    tb.invert();
    ta.build(tb.into_polygons());
    ta.into_polygons()
}

fn subtract_polygons(a: Vec<Polygon>, b: Vec<Polygon>, eps: f64) -> Vec<Polygon> {
    let mut ta = BspTree::new(a, eps);
    let mut tb = BspTree::new(b, eps);
    ta.invert();
    ta.clip_to(&tb);
    tb.clip_to(&ta);
    tb.invert();
    tb.clip_to(&ta);
    tb.invert();
    ta.build(tb.into_polygons());
    ta.invert();
    ta.into_polygons()
}

fn intersect_polygons(a: Vec<Polygon>, b: Vec<Polygon>, eps: f64) -> Vec<Polygon> {
    let mut ta = BspTree::new(a, eps);
    let mut tb = BspTree::new(b, eps);
    ta.invert();
    tb.clip_to(&ta);
    tb.invert();
    ta.clip_to(&tb);
    tb.clip_to(&ta);
    ta.build(tb.into_polygons());
    ta.invert();
    ta.into_polygons()
}

/// Union of many polygon sets in one pass.
///
/// Each set is clipped against every other set's tree. Where faces of two
/// sets coincide, the earlier set keeps its face.
fn batch_union_polygons(sets: Vec<Vec<Polygon>>, eps: f64) -> Vec<Polygon> {
    let trees: Vec<BspTree> = sets.iter().map(|s| BspTree::new(s.clone(), eps)).collect();
    sets.into_par_iter()
        .enumerate()
        .map(|(i, mut polygons)| {
            for (j, tree) in trees.iter().enumerate() {
                if i == j {
                    continue;
                }
                polygons = tree.clip_polygons(polygons);
                if j < i {
                    polygons.iter_mut().for_each(Polygon::flip);
                    polygons = tree.clip_polygons(polygons);
                    polygons.iter_mut().for_each(Polygon::flip);
                }
            }
            polygons
        })
        .flatten()
        .collect()
}

impl Solid {
    /// Pairwise boolean.
    pub fn boolean(&self, other: &Solid, op: OpType) -> Solid {
        Solid::batch_boolean(&[self, other], op)
    }

    /// Boolean over any number of solids at once.
    ///
    /// `Add` and `Intersect` combine all inputs; `Subtract` removes every
    /// later solid from the first. The work is done at polygon level with a
    /// single weld at the end.
    pub fn batch_boolean(solids: &[&Solid], op: OpType) -> Solid {
        if let Some(bad) = solids.iter().find(|s| !s.status.is_ok()) {
            return Solid::invalid(bad.status);
        }
        let Some((first, rest)) = solids.split_first() else {
            return Solid::empty();
        };
        if rest.is_empty() {
            let mut only = (*first).clone();
            only.original_id = None;
            return only;
        }
        let (eps, tolerance) = tolerances(solids);

        let result = match op {
            OpType::Add => {
                let parts: Vec<&Solid> = solids.iter().copied().filter(|s| !s.is_empty()).collect();
                match parts.len() {
                    0 => return Solid::empty(),
                    1 => return Solid::batch_boolean(&parts, op),
                    _ => {}
                }
                if pairwise_disjoint(&parts) {
                    return Solid::compose(&parts);
                }
                if let [a, b] = parts[..] {
                    union_polygons(to_polygons(a), to_polygons(b), eps)
                } else {
                    batch_union_polygons(parts.iter().map(|s| to_polygons(s)).collect(), eps)
                }
            }
            OpType::Subtract => {
                if first.is_empty() {
                    return Solid::empty();
                }
                let first_box = first.bounding_box();
                let cutters: Vec<Vec<Polygon>> = rest
                    .iter()
                    .filter(|s| !s.is_empty() && first_box.distance(&s.bounding_box()) <= eps)
                    .map(|s| to_polygons(s))
                    .collect();
                if cutters.is_empty() {
                    let mut copy = (*first).clone();
                    copy.original_id = None;
                    return copy;
                }
                let cutter = if cutters.len() == 1 {
                    cutters.into_iter().flatten().collect()
                } else {
                    batch_union_polygons(cutters, eps)
                };
                subtract_polygons(to_polygons(first), cutter, eps)
            }
            OpType::Intersect => {
                if solids.iter().any(|s| s.is_empty()) {
                    return Solid::empty();
                }
                let mut acc = to_polygons(first);
                for s in rest {
                    if acc.is_empty() {
                        break;
                    }
                    acc = intersect_polygons(acc, to_polygons(s), eps);
                }
                acc
            }
        };

        from_polygons(result, eps, tolerance)
    }
}

fn pairwise_disjoint(solids: &[&Solid]) -> bool {
    let boxes: Vec<_> = solids.iter().map(|s| s.bounding_box()).collect();
    for i in 0..boxes.len() {
        for j in i + 1..boxes.len() {
            if boxes[i].distance(&boxes[j]) <= 0.0 {
                return false;
            }
        }
    }
    true
}
