//! Arena-backed BSP tree over convex polygons.
//!
//! Nodes live in a flat `Vec` and refer to children by index, so building,
//! clipping and inverting are all loops over a work list. Deep trees (a
//! finely tessellated convex solid degenerates into a chain) never touch
//! the call stack.

use super::polygon::{Plane, Polygon, Split};

#[derive(Debug, Default)]
struct Node {
    plane: Option<Plane>,
    polygons: Vec<Polygon>,
    front: Option<usize>,
    back: Option<usize>,
}

#[derive(Debug)]
pub(crate) struct BspTree {
    nodes: Vec<Node>,
    eps: f64,
}

impl BspTree {
    pub fn new(polygons: Vec<Polygon>, eps: f64) -> Self {
        let mut tree = Self {
            nodes: vec![Node::default()],
            eps,
        };
        tree.build(polygons);
        tree
    }

    fn child(&mut self, node: usize, front: bool) -> usize {
        let existing = if front {
            self.nodes[node].front
        } else {
            self.nodes[node].back
        };
        if let Some(idx) = existing {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(Node::default());
        if front {
            self.nodes[node].front = Some(idx);
        } else {
            self.nodes[node].back = Some(idx);
        }
        idx
    }

    /// Insert polygons, extending the tree where they land in empty space
    pub fn build(&mut self, polygons: Vec<Polygon>) {
        let mut work = vec![(0usize, polygons)];
        while let Some((node, polygons)) = work.pop() {
            if polygons.is_empty() {
                continue;
            }
            let plane = match self.nodes[node].plane {
                Some(plane) => plane,
                None => {
                    let plane = polygons[0].plane;
                    self.nodes[node].plane = Some(plane);
                    plane
                }
            };

            let mut front = Vec::new();
            let mut back = Vec::new();
            for polygon in polygons {
                match plane.split(polygon, self.eps) {
                    Split::CoplanarFront(p) | Split::CoplanarBack(p) => {
                        self.nodes[node].polygons.push(p);
                    }
                    Split::Front(p) => front.push(p),
                    Split::Back(p) => back.push(p),
                    Split::Spanning { front: f, back: b } => {
                        front.extend(f);
                        back.extend(b);
                    }
                }
            }
            if !front.is_empty() {
                let idx = self.child(node, true);
                work.push((idx, front));
            }
            if !back.is_empty() {
                let idx = self.child(node, false);
                work.push((idx, back));
            }
        }
    }

    /// Remove the parts of `polygons` that lie inside this tree's solid
    pub fn clip_polygons(&self, polygons: Vec<Polygon>) -> Vec<Polygon> {
        let mut kept = Vec::new();
        let mut work = vec![(0usize, polygons)];
        while let Some((idx, polygons)) = work.pop() {
            let node = &self.nodes[idx];
            let Some(plane) = node.plane else {
                kept.extend(polygons);
                continue;
            };

            let mut front = Vec::new();
            let mut back = Vec::new();
            for polygon in polygons {
                match plane.split(polygon, self.eps) {
                    Split::CoplanarFront(p) | Split::Front(p) => front.push(p),
                    Split::CoplanarBack(p) | Split::Back(p) => back.push(p),
                    Split::Spanning { front: f, back: b } => {
                        front.extend(f);
                        back.extend(b);
                    }
                }
            }
            match node.front {
                Some(child) => work.push((child, front)),
                None => kept.extend(front),
            }
            if let Some(child) = node.back {
                work.push((child, back));
            }
        }
        kept
    }

    /// Clip every polygon stored in this tree against `other`
    pub fn clip_to(&mut self, other: &BspTree) {
        for node in &mut self.nodes {
            let polygons = std::mem::take(&mut node.polygons);
            node.polygons = other.clip_polygons(polygons);
        }
    }

    /// Swap solid and empty space
    pub fn invert(&mut self) {
        for node in &mut self.nodes {
            for polygon in &mut node.polygons {
                polygon.flip();
            }
            if let Some(plane) = node.plane.as_mut() {
                plane.flip();
            }
            std::mem::swap(&mut node.front, &mut node.back);
        }
    }

    pub fn into_polygons(self) -> Vec<Polygon> {
        self.nodes.into_iter().flat_map(|node| node.polygons).collect()
    }
}
