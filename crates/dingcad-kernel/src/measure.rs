//! Measurement queries: volume, area, bounds, genus and surface gaps.

use glam::DVec3;
use rayon::prelude::*;

use crate::solid::Solid;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: DVec3,
    pub max: DVec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox {
    /// The inverted box that contains nothing
    pub fn empty() -> Self {
        Self {
            min: DVec3::splat(f64::INFINITY),
            max: DVec3::splat(f64::NEG_INFINITY),
        }
    }

    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a DVec3>) -> Self {
        points.into_iter().fold(Self::empty(), |mut b, p| {
            b.min = b.min.min(*p);
            b.max = b.max.max(*p);
            b
        })
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    pub fn size(&self) -> DVec3 {
        if self.is_empty() {
            DVec3::ZERO
        } else {
            self.max - self.min
        }
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn expand(&self, margin: f64) -> Self {
        Self {
            min: self.min - DVec3::splat(margin),
            max: self.max + DVec3::splat(margin),
        }
    }

    /// Distance between two boxes, zero when they overlap
    pub fn distance(&self, other: &BoundingBox) -> f64 {
        let gap = (other.min - self.max).max(self.min - other.max).max(DVec3::ZERO);
        gap.length()
    }
}

impl Solid {
    /// Enclosed volume by the divergence theorem
    pub fn volume(&self) -> f64 {
        (0..self.triangles.len())
            .into_par_iter()
            .map(|i| {
                let [a, b, c] = self.triangle_positions(i);
                a.dot(b.cross(c))
            })
            .sum::<f64>()
            / 6.0
    }

    pub fn surface_area(&self) -> f64 {
        (0..self.triangles.len())
            .into_par_iter()
            .map(|i| {
                let [a, b, c] = self.triangle_positions(i);
                (b - a).cross(c - a).length()
            })
            .sum::<f64>()
            * 0.5
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(&self.vertices)
    }

    /// Topological genus from the Euler characteristic.
    ///
    /// For a multi-component solid this is `1 - chi/2` over the whole mesh.
    pub fn genus(&self) -> i64 {
        let chi = self.num_vert() as i64 - self.num_edge() as i64 + self.num_tri() as i64;
        1 - chi / 2
    }

    /// Smallest distance between the surfaces of two solids, capped at
    /// `search_length`. Overlapping surfaces report zero.
    pub fn min_gap(&self, other: &Solid, search_length: f64) -> f64 {
        if self.is_empty() || other.is_empty() || search_length <= 0.0 {
            return search_length.max(0.0);
        }
        let boxes_a: Vec<_> = (0..self.num_tri()).map(|i| tri_box(self, i)).collect();
        let boxes_b: Vec<_> = (0..other.num_tri()).map(|i| tri_box(other, i)).collect();
        let other_box = other.bounding_box();

        (0..self.num_tri())
            .into_par_iter()
            .filter(|&i| boxes_a[i].distance(&other_box) < search_length)
            .map(|i| {
                let ta = self.triangle_positions(i);
                let mut best = search_length;
                for (j, bb) in boxes_b.iter().enumerate() {
                    if boxes_a[i].distance(bb) >= best {
                        continue;
                    }
                    best = best.min(triangle_distance(&ta, &other.triangle_positions(j)));
                }
                best
            })
            .reduce(|| search_length, f64::min)
    }
}

fn tri_box(solid: &Solid, tri: usize) -> BoundingBox {
    BoundingBox::from_points(&solid.triangle_positions(tri))
}

pub(crate) fn closest_point_on_triangle(p: DVec3, [a, b, c]: &[DVec3; 3]) -> DVec3 {
    let ab = *b - *a;
    let ac = *c - *a;
    let ap = p - *a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return *a;
    }
    let bp = p - *b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return *b;
    }
    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        return *a + ab * (d1 / (d1 - d3));
    }
    let cp = p - *c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return *c;
    }
    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        return *a + ac * (d2 / (d2 - d6));
    }
    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        return *b + (*c - *b) * ((d4 - d3) / ((d4 - d3) + (d5 - d6)));
    }
    let denom = va + vb + vc;
    if denom.abs() < f64::MIN_POSITIVE {
        return *a;
    }
    *a + ab * (vb / denom) + ac * (vc / denom)
}

/// Closest distance between two segments
fn segment_distance(p1: DVec3, q1: DVec3, p2: DVec3, q2: DVec3) -> f64 {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);
    let (s, t) = if a <= f64::EPSILON && e <= f64::EPSILON {
        (0.0, 0.0)
    } else if a <= f64::EPSILON {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(r);
        if e <= f64::EPSILON {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            let mut s = if denom > 0.0 {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };
    ((p1 + d1 * s) - (p2 + d2 * t)).length()
}

fn segment_hits_triangle(p: DVec3, q: DVec3, tri: &[DVec3; 3]) -> bool {
    let [a, b, c] = *tri;
    let n = (b - a).cross(c - a);
    let dp = n.dot(p - a);
    let dq = n.dot(q - a);
    if dp * dq > 0.0 || (dp - dq).abs() < f64::MIN_POSITIVE {
        return false;
    }
    let x = p + (q - p) * (dp / (dp - dq));
    let inside = |u: DVec3, v: DVec3| n.dot((v - u).cross(x - u)) >= 0.0;
    inside(a, b) && inside(b, c) && inside(c, a)
}

pub(crate) fn triangle_distance(ta: &[DVec3; 3], tb: &[DVec3; 3]) -> f64 {
    for k in 0..3 {
        if segment_hits_triangle(ta[k], ta[(k + 1) % 3], tb)
            || segment_hits_triangle(tb[k], tb[(k + 1) % 3], ta)
        {
            return 0.0;
        }
    }
    let mut best = f64::INFINITY;
    for k in 0..3 {
        best = best.min((ta[k] - closest_point_on_triangle(ta[k], tb)).length());
        best = best.min((tb[k] - closest_point_on_triangle(tb[k], ta)).length());
        for m in 0..3 {
            best = best.min(segment_distance(
                ta[k],
                ta[(k + 1) % 3],
                tb[m],
                tb[(m + 1) % 3],
            ));
        }
    }
    best
}
