//! Convex polygons and the plane split that drives the BSP.

use glam::DVec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Plane {
    pub normal: DVec3,
    pub w: f64,
}

impl Plane {
    /// Plane through three points, `None` when they are collinear
    pub fn from_points(a: DVec3, b: DVec3, c: DVec3) -> Option<Self> {
        let n = (b - a).cross(c - a);
        let len = n.length();
        if len <= f64::EPSILON * (b - a).length().max((c - a).length()).powi(2) || !len.is_finite() {
            return None;
        }
        let normal = n / len;
        Some(Self {
            normal,
            w: normal.dot(a),
        })
    }

    pub fn flip(&mut self) {
        self.normal = -self.normal;
        self.w = -self.w;
    }

    pub fn distance(&self, p: DVec3) -> f64 {
        self.normal.dot(p) - self.w
    }

    /// Classify a polygon against this plane, splitting it if it spans.
    pub fn split(&self, polygon: Polygon, eps: f64) -> Split {
        let sides: Vec<Side> = polygon
            .vertices
            .iter()
            .map(|&v| Side::of(self.distance(v), eps))
            .collect();
        let combined = sides.iter().fold(Side::Coplanar, |acc, &s| acc.union(s));

        match combined {
            Side::Coplanar => {
                if self.normal.dot(polygon.plane.normal) > 0.0 {
                    Split::CoplanarFront(polygon)
                } else {
                    Split::CoplanarBack(polygon)
                }
            }
            Side::Front => Split::Front(polygon),
            Side::Back => Split::Back(polygon),
            Side::Spanning => {
                let n = polygon.vertices.len();
                let mut front = Vec::with_capacity(n + 1);
                let mut back = Vec::with_capacity(n + 1);
                for i in 0..n {
                    let j = (i + 1) % n;
                    let (vi, vj) = (polygon.vertices[i], polygon.vertices[j]);
                    let (si, sj) = (sides[i], sides[j]);
                    if si != Side::Back {
                        front.push(vi);
                    }
                    if si != Side::Front {
                        back.push(vi);
                    }
                    if si.union(sj) == Side::Spanning {
                        let t = (self.w - self.normal.dot(vi)) / self.normal.dot(vj - vi);
                        let v = vi.lerp(vj, t);
                        front.push(v);
                        back.push(v);
                    }
                }
                let piece = |vertices: Vec<DVec3>| {
                    (vertices.len() >= 3).then_some(Polygon {
                        vertices,
                        plane: polygon.plane,
                    })
                };
                Split::Spanning {
                    front: piece(front),
                    back: piece(back),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Coplanar,
    Front,
    Back,
    Spanning,
}

impl Side {
    fn of(distance: f64, eps: f64) -> Self {
        if distance > eps {
            Side::Front
        } else if distance < -eps {
            Side::Back
        } else {
            Side::Coplanar
        }
    }

    fn union(self, other: Side) -> Side {
        match (self, other) {
            (Side::Coplanar, s) | (s, Side::Coplanar) => s,
            (a, b) if a == b => a,
            _ => Side::Spanning,
        }
    }
}

/// Outcome of splitting one polygon by a plane
#[derive(Debug)]
pub(crate) enum Split {
    CoplanarFront(Polygon),
    CoplanarBack(Polygon),
    Front(Polygon),
    Back(Polygon),
    Spanning {
        front: Option<Polygon>,
        back: Option<Polygon>,
    },
}

/// Convex planar polygon, counter-clockwise around `plane.normal`
#[derive(Debug, Clone)]
pub(crate) struct Polygon {
    pub vertices: Vec<DVec3>,
    pub plane: Plane,
}

impl Polygon {
    pub fn from_triangle(a: DVec3, b: DVec3, c: DVec3) -> Option<Self> {
        Plane::from_points(a, b, c).map(|plane| Self {
            vertices: vec![a, b, c],
            plane,
        })
    }

    pub fn flip(&mut self) {
        self.vertices.reverse();
        self.plane.flip();
    }
}
