//! Extrusion and revolution of polygon sets.

use glam::{DVec2, DVec3};

use crate::cross_section::{Polygons, regions, simplify_loop, triangulate_loops};
use crate::primitives::circular_segments;
use crate::solid::Solid;

/// Clean loops and orient them so outers wind counter-clockwise
fn prepare(polygons: &Polygons, eps: f64) -> (Vec<DVec2>, Vec<Vec<u32>>) {
    let mut points = Vec::new();
    let mut loops = Vec::new();
    for poly in polygons {
        if let Some(clean) = simplify_loop(poly, eps) {
            let start = points.len() as u32;
            loops.push((start..start + clean.len() as u32).collect());
            points.extend(clean);
        }
    }
    // Normalize so that wall generation can assume outers CCW, holes CW
    let oriented = regions(&points, &loops)
        .into_iter()
        .flat_map(|r| std::iter::once(r.outer).chain(r.holes))
        .collect();
    (points, oriented)
}

fn polygons_eps(polygons: &Polygons) -> f64 {
    let scale = polygons
        .iter()
        .flatten()
        .fold(1.0_f64, |acc, p| acc.max(p.abs().max_element()));
    1e-9 * scale
}

impl Solid {
    /// Extrude along +Z from `z = 0` to `z = height`.
    ///
    /// `divisions` adds intermediate layers, `twist_degrees` rotates the top
    /// relative to the bottom, and `scale_top` scales it. A zero `scale_top`
    /// collapses the top to a point.
    pub fn extrude(
        polygons: &Polygons,
        height: f64,
        divisions: usize,
        twist_degrees: f64,
        scale_top: DVec2,
    ) -> Solid {
        if height <= 0.0 || !height.is_finite() || polygons.is_empty() {
            return Solid::empty();
        }
        let (points, loops) = prepare(polygons, polygons_eps(polygons));
        if loops.is_empty() {
            return Solid::empty();
        }
        let cap = triangulate_loops(&points, &loops);
        let n = points.len() as u32;
        let layers = divisions + 1;
        let apex = scale_top.x == 0.0 && scale_top.y == 0.0;

        let mut vertices = Vec::with_capacity(points.len() * (layers + 1));
        let full_layers = if apex { layers } else { layers + 1 };
        for layer in 0..full_layers {
            let t = layer as f64 / layers as f64;
            let s = DVec2::ONE.lerp(scale_top, t);
            let (sin, cos) = (twist_degrees * t).to_radians().sin_cos();
            for p in &points {
                let q = *p * s;
                vertices.push(DVec3::new(q.x * cos - q.y * sin, q.x * sin + q.y * cos, height * t));
            }
        }
        let apex_index = vertices.len() as u32;
        if apex {
            vertices.push(DVec3::new(0.0, 0.0, height));
        }
        let at = |layer: usize, i: u32| -> u32 {
            if apex && layer == layers {
                apex_index
            } else {
                layer as u32 * n + i
            }
        };

        let mut triangles = Vec::new();
        for l in &loops {
            let m = l.len();
            for layer in 0..layers {
                for k in 0..m {
                    let (i, j) = (l[k], l[(k + 1) % m]);
                    let (b0, b1) = (at(layer, i), at(layer, j));
                    let (t0, t1) = (at(layer + 1, i), at(layer + 1, j));
                    triangles.push([b0, b1, t1]);
                    if t0 != t1 {
                        triangles.push([b0, t1, t0]);
                    }
                }
            }
        }
        for tri in &cap {
            triangles.push([tri[0], tri[2], tri[1]]);
            if !apex {
                triangles.push(tri.map(|i| at(layers, i)));
            }
        }

        Solid::from_raw(vertices, triangles).into_original()
    }

    /// Revolve a profile around the Z axis.
    ///
    /// Profile x is the radius and y the height; anything at x < 0 is clipped
    /// away. `segments` of zero picks a count from the largest radius.
    /// Revolutions short of 360 degrees are capped at both ends.
    pub fn revolve(polygons: &Polygons, segments: usize, degrees: f64) -> Solid {
        if degrees <= 0.0 || !degrees.is_finite() {
            return Solid::empty();
        }
        let degrees = degrees.min(360.0);
        let eps = polygons_eps(polygons);
        let clipped: Polygons = polygons.iter().map(|p| clip_to_right_half(p)).collect();
        let (points, loops) = prepare(&clipped, eps);
        if loops.is_empty() {
            return Solid::empty();
        }

        let radius = points.iter().fold(0.0_f64, |acc, p| acc.max(p.x));
        let full = degrees >= 360.0;
        let base_segments = if segments == 0 {
            circular_segments(radius)
        } else {
            segments.max(3)
        };
        let steps = if full {
            base_segments
        } else {
            ((base_segments as f64 * degrees / 360.0).ceil() as usize).max(1)
        };
        let rings = if full { steps } else { steps + 1 };

        // Each profile point maps to one axis vertex or one vertex per ring
        let on_axis: Vec<bool> = points.iter().map(|p| p.x <= eps).collect();
        let mut first = Vec::with_capacity(points.len());
        let mut vertices = Vec::new();
        for (i, p) in points.iter().enumerate() {
            first.push(vertices.len() as u32);
            if on_axis[i] {
                vertices.push(DVec3::new(0.0, 0.0, p.y));
            } else {
                for r in 0..rings {
                    let theta = (degrees * r as f64 / steps as f64).to_radians();
                    vertices.push(DVec3::new(p.x * theta.cos(), p.x * theta.sin(), p.y));
                }
            }
        }
        let at = |i: u32, ring: usize| -> u32 {
            let i = i as usize;
            if on_axis[i] {
                first[i]
            } else {
                first[i] + (ring % rings) as u32
            }
        };

        let mut triangles = Vec::new();
        for l in &loops {
            let m = l.len();
            for k in 0..m {
                let (i, j) = (l[k], l[(k + 1) % m]);
                if on_axis[i as usize] && on_axis[j as usize] {
                    continue;
                }
                for s in 0..steps {
                    let quad = [at(i, s), at(i, s + 1), at(j, s + 1), at(j, s)];
                    let mut ring: Vec<u32> = Vec::with_capacity(4);
                    for v in quad {
                        if ring.last() != Some(&v) && ring.first() != Some(&v) {
                            ring.push(v);
                        }
                    }
                    match ring.len() {
                        3 => triangles.push([ring[0], ring[1], ring[2]]),
                        4 => {
                            triangles.push([ring[0], ring[1], ring[2]]);
                            triangles.push([ring[0], ring[2], ring[3]]);
                        }
                        _ => {}
                    }
                }
            }
        }

        if !full {
            for tri in triangulate_loops(&points, &loops) {
                triangles.push(tri.map(|i| at(i, 0)));
                let end = tri.map(|i| at(i, steps));
                triangles.push([end[0], end[2], end[1]]);
            }
        }

        Solid::from_raw(vertices, triangles).into_original()
    }
}

/// Sutherland-Hodgman clip of one loop against `x >= 0`
fn clip_to_right_half(points: &[DVec2]) -> Vec<DVec2> {
    let n = points.len();
    let mut out = Vec::with_capacity(n + 2);
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        let (ina, inb) = (a.x >= 0.0, b.x >= 0.0);
        if ina {
            out.push(a);
        }
        if ina != inb {
            let t = a.x / (a.x - b.x);
            out.push(DVec2::new(0.0, a.y + (b.y - a.y) * t));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solid::is_edge_manifold;
    use approx::assert_relative_eq;

    fn triangle() -> Polygons {
        vec![vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(20.0, 0.0),
            DVec2::new(0.0, 20.0),
        ]]
    }

    fn rectangle() -> Polygons {
        vec![vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(5.0, 0.0),
            DVec2::new(5.0, 10.0),
            DVec2::new(0.0, 10.0),
        ]]
    }

    #[test]
    fn test_extrude_triangle() {
        let prism = Solid::extrude(&triangle(), 5.0, 0, 0.0, DVec2::ONE);
        assert_relative_eq!(prism.volume(), 1000.0, epsilon = 1e-9);
        assert!(is_edge_manifold(prism.triangles()));
        assert_eq!(prism.num_vert(), 6);
    }

    #[test]
    fn test_extrude_with_hole_and_divisions() {
        let ring = vec![
            DVec2::new(-2.0, -2.0),
            DVec2::new(2.0, -2.0),
            DVec2::new(2.0, 2.0),
            DVec2::new(-2.0, 2.0),
        ];
        let hole: Vec<DVec2> = ring.iter().rev().map(|p| *p * 0.5).collect();
        let solid = Solid::extrude(&vec![ring, hole], 2.0, 3, 0.0, DVec2::ONE);
        assert_relative_eq!(solid.volume(), 24.0, epsilon = 1e-9);
        assert!(is_edge_manifold(solid.triangles()));
        assert_eq!(solid.genus(), 1);
    }

    #[test]
    fn test_twisted_extrude_stays_closed() {
        let solid = Solid::extrude(&triangle(), 5.0, 4, 90.0, DVec2::splat(0.5));
        assert!(is_edge_manifold(solid.triangles()));
        assert!(solid.volume() > 0.0);
        assert_relative_eq!(solid.bounding_box().max.z, 5.0);
    }

    #[test]
    fn test_extrude_to_apex() {
        let square = vec![vec![
            DVec2::new(-1.0, -1.0),
            DVec2::new(1.0, -1.0),
            DVec2::new(1.0, 1.0),
            DVec2::new(-1.0, 1.0),
        ]];
        let pyramid = Solid::extrude(&square, 3.0, 0, 0.0, DVec2::ZERO);
        assert_relative_eq!(pyramid.volume(), 4.0, epsilon = 1e-9);
        assert!(is_edge_manifold(pyramid.triangles()));
    }

    #[test]
    fn test_extrude_degenerate_inputs() {
        assert!(Solid::extrude(&triangle(), 0.0, 0, 0.0, DVec2::ONE).is_empty());
        assert!(Solid::extrude(&Vec::new(), 1.0, 0, 0.0, DVec2::ONE).is_empty());
    }

    #[test]
    fn test_revolve_rectangle() {
        let solid = Solid::revolve(&rectangle(), 32, 360.0);
        let expected = 0.5 * 32.0 * 25.0 * (std::f64::consts::TAU / 32.0).sin() * 10.0;
        assert_relative_eq!(solid.volume(), expected, epsilon = 1e-9);
        assert!(is_edge_manifold(solid.triangles()));
        assert_relative_eq!(solid.volume(), 780.4, epsilon = 0.1);
    }

    #[test]
    fn test_partial_revolve_is_closed() {
        let solid = Solid::revolve(&rectangle(), 32, 90.0);
        assert!(is_edge_manifold(solid.triangles()));
        assert!(solid.volume() > 0.0);
        let bb = solid.bounding_box();
        assert!(bb.min.x >= -1e-9 && bb.min.y >= -1e-9);
    }

    #[test]
    fn test_revolve_clips_negative_x() {
        let wide = vec![vec![
            DVec2::new(-5.0, 0.0),
            DVec2::new(5.0, 0.0),
            DVec2::new(5.0, 10.0),
            DVec2::new(-5.0, 10.0),
        ]];
        let a = Solid::revolve(&wide, 32, 360.0);
        let b = Solid::revolve(&rectangle(), 32, 360.0);
        assert_relative_eq!(a.volume(), b.volume(), epsilon = 1e-9);
    }
}
