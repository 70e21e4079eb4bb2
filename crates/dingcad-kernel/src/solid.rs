//! The immutable solid type and its bookkeeping.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use glam::DVec3;

use crate::status::Status;

/// Relative precision used to derive a solid's epsilon from its scale
pub(crate) const PRECISION: f64 = 1e-12;

static NEXT_ORIGINAL_ID: AtomicU32 = AtomicU32::new(1);

fn next_original_id() -> u32 {
    NEXT_ORIGINAL_ID.fetch_add(1, Ordering::Relaxed)
}

/// Reserve `count` consecutive original ids and return the first one.
///
/// Ids handed out here never collide with ids later assigned by
/// [`Solid::as_original`] or by primitive constructors.
pub fn reserve_ids(count: u32) -> u32 {
    NEXT_ORIGINAL_ID.fetch_add(count, Ordering::Relaxed)
}

/// Per-corner property channels attached to a solid.
///
/// `tri_verts` mirrors `triangles` but indexes property vertices, so one mesh
/// vertex can carry several property vertices (a cube corner with three
/// sharp normals, for example).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Properties {
    pub num_prop: usize,
    pub values: Vec<f64>,
    pub tri_verts: Vec<[u32; 3]>,
}

impl Properties {
    pub fn num_prop_vert(&self) -> usize {
        if self.num_prop == 0 {
            0
        } else {
            self.values.len() / self.num_prop
        }
    }
}

/// A closed, oriented triangle mesh.
///
/// Solids are immutable: every operation returns a new solid. Cloning is a
/// deep copy, so callers that share solids wrap them in an `Arc`.
#[derive(Debug, Clone)]
pub struct Solid {
    pub(crate) vertices: Vec<DVec3>,
    pub(crate) triangles: Vec<[u32; 3]>,
    pub(crate) status: Status,
    pub(crate) tolerance: f64,
    pub(crate) original_id: Option<u32>,
    pub(crate) properties: Option<Properties>,
}

impl Default for Solid {
    fn default() -> Self {
        Self::empty()
    }
}

impl Solid {
    // ========================================================================
    // Construction
    // ========================================================================

    /// An empty, valid solid
    pub fn empty() -> Self {
        Self {
            vertices: Vec::new(),
            triangles: Vec::new(),
            status: Status::NoError,
            tolerance: 0.0,
            original_id: None,
            properties: None,
        }
    }

    /// An empty solid carrying an error status
    pub fn invalid(status: Status) -> Self {
        Self {
            status,
            ..Self::empty()
        }
    }

    /// Build a solid from raw mesh data, validating it first.
    ///
    /// Invalid input yields an empty solid whose status names the problem:
    /// non-finite coordinates, out-of-range indices, or directed edges that
    /// are not paired exactly once with their reverse.
    pub fn from_mesh(vertices: Vec<DVec3>, triangles: Vec<[u32; 3]>) -> Self {
        if let Some(status) = validate(&vertices, &triangles) {
            return Self::invalid(status);
        }
        if triangles.is_empty() {
            return Self::empty();
        }
        Self::from_raw(vertices, triangles).into_original()
    }

    /// Geometry known to be valid; unreferenced vertices are dropped.
    pub(crate) fn from_raw(vertices: Vec<DVec3>, triangles: Vec<[u32; 3]>) -> Self {
        let (vertices, triangles) = compact(vertices, triangles);
        let mut solid = Self {
            vertices,
            triangles,
            ..Self::empty()
        };
        solid.tolerance = solid.epsilon();
        solid
    }

    /// Generated geometry that was not validated on the way in.
    ///
    /// A mesh whose edges do not pair up yields an empty `NotManifold` solid.
    pub(crate) fn from_generated(vertices: Vec<DVec3>, triangles: Vec<[u32; 3]>) -> Self {
        if !is_edge_manifold(&triangles) {
            return Self::invalid(Status::NotManifold);
        }
        Self::from_raw(vertices, triangles)
    }

    /// Same geometry under a fresh original id
    pub(crate) fn into_original(mut self) -> Self {
        if self.status.is_ok() && !self.triangles.is_empty() {
            self.original_id = Some(next_original_id());
        }
        self
    }

    /// Copy of this solid with new vertex positions and the same topology
    pub(crate) fn with_vertices(&self, vertices: Vec<DVec3>) -> Self {
        let mut solid = Self {
            vertices,
            triangles: self.triangles.clone(),
            status: self.status,
            tolerance: 0.0,
            original_id: self.original_id,
            properties: self.properties.clone(),
        };
        solid.tolerance = self.tolerance.max(solid.epsilon());
        solid
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn vertices(&self) -> &[DVec3] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Id of the original mesh this solid still is, if any
    pub fn original_id(&self) -> Option<u32> {
        self.original_id
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn num_vert(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_tri(&self) -> usize {
        self.triangles.len()
    }

    pub fn num_edge(&self) -> usize {
        self.triangles.len() * 3 / 2
    }

    /// Number of property channels per property vertex
    pub fn num_prop(&self) -> usize {
        self.properties.as_ref().map_or(0, |p| p.num_prop)
    }

    /// Number of property vertices; equals the vertex count without properties
    pub fn num_prop_vert(&self) -> usize {
        self.properties
            .as_ref()
            .map_or(self.vertices.len(), Properties::num_prop_vert)
    }

    /// Property values of one property vertex
    pub fn property(&self, prop_vert: usize) -> Option<&[f64]> {
        let props = self.properties.as_ref()?;
        let start = prop_vert.checked_mul(props.num_prop)?;
        props.values.get(start..start + props.num_prop)
    }

    /// Property vertex indices of each triangle corner
    pub fn property_triangles(&self) -> Option<&[[u32; 3]]> {
        self.properties.as_ref().map(|p| p.tri_verts.as_slice())
    }

    /// Largest absolute coordinate, used to scale precision
    pub(crate) fn extent(&self) -> f64 {
        self.vertices
            .iter()
            .fold(0.0_f64, |acc, v| acc.max(v.abs().max_element()))
    }

    /// Smallest meaningful distance for this solid
    pub fn epsilon(&self) -> f64 {
        PRECISION * self.extent()
    }

    pub(crate) fn triangle_positions(&self, tri: usize) -> [DVec3; 3] {
        let [a, b, c] = self.triangles[tri];
        [
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        ]
    }

    // ========================================================================
    // Identity
    // ========================================================================

    /// This geometry under a fresh original id
    pub fn as_original(&self) -> Self {
        let mut solid = self.clone();
        solid.original_id = None;
        solid.into_original()
    }

    // ========================================================================
    // Compositing
    // ========================================================================

    /// Concatenate solids without any boolean evaluation.
    ///
    /// Overlapping inputs produce a self-intersecting result; callers use this
    /// for parts known to be disjoint.
    pub fn compose(solids: &[&Solid]) -> Self {
        if let Some(bad) = solids.iter().find(|s| !s.status.is_ok()) {
            return Self::invalid(bad.status);
        }
        let mut vertices = Vec::new();
        let mut triangles = Vec::new();
        for solid in solids {
            let offset = vertices.len() as u32;
            vertices.extend_from_slice(&solid.vertices);
            triangles.extend(
                solid
                    .triangles
                    .iter()
                    .map(|t| [t[0] + offset, t[1] + offset, t[2] + offset]),
            );
        }
        let mut composed = Self::from_raw(vertices, triangles);
        let tol = solids.iter().fold(0.0_f64, |acc, s| acc.max(s.tolerance));
        composed.tolerance = composed.tolerance.max(tol);
        composed
    }

    /// Split into connected components, largest first by triangle count.
    pub fn decompose(&self) -> Vec<Solid> {
        if !self.status.is_ok() || self.is_empty() {
            return Vec::new();
        }

        let mut parent: Vec<usize> = (0..self.vertices.len()).collect();
        for tri in &self.triangles {
            let a = find(&mut parent, tri[0] as usize);
            for &v in &tri[1..] {
                let b = find(&mut parent, v as usize);
                if a != b {
                    parent[b] = a;
                }
            }
        }

        let mut groups: HashMap<usize, Vec<[u32; 3]>> = HashMap::new();
        let mut order = Vec::new();
        for tri in &self.triangles {
            let root = find(&mut parent, tri[0] as usize);
            groups
                .entry(root)
                .or_insert_with(|| {
                    order.push(root);
                    Vec::new()
                })
                .push(*tri);
        }

        let mut parts: Vec<Solid> = order
            .into_iter()
            .filter_map(|root| groups.remove(&root))
            .map(|tris| {
                let mut part = Self::from_raw(self.vertices.clone(), tris);
                part.tolerance = part.tolerance.max(self.tolerance);
                part
            })
            .collect();
        parts.sort_by(|a, b| b.num_tri().cmp(&a.num_tri()));
        parts
    }
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Check raw mesh data, returning the first problem found
pub(crate) fn validate(vertices: &[DVec3], triangles: &[[u32; 3]]) -> Option<Status> {
    if vertices.iter().any(|v| !v.is_finite()) {
        return Some(Status::NonFiniteVertex);
    }
    let n = vertices.len() as u32;
    if triangles.iter().flatten().any(|&i| i >= n) {
        return Some(Status::VertexOutOfBounds);
    }
    if !is_edge_manifold(triangles) {
        return Some(Status::NotManifold);
    }
    None
}

/// Every directed edge must appear once, paired with its reverse once.
pub(crate) fn is_edge_manifold(triangles: &[[u32; 3]]) -> bool {
    let mut edges: HashMap<(u32, u32), u32> = HashMap::with_capacity(triangles.len() * 3);
    for tri in triangles {
        if tri[0] == tri[1] || tri[1] == tri[2] || tri[2] == tri[0] {
            return false;
        }
        for k in 0..3 {
            let count = edges.entry((tri[k], tri[(k + 1) % 3])).or_insert(0);
            *count += 1;
            if *count > 1 {
                return false;
            }
        }
    }
    edges.keys().all(|&(a, b)| edges.contains_key(&(b, a)))
}

/// Drop vertices no triangle references and renumber.
pub(crate) fn compact(vertices: Vec<DVec3>, triangles: Vec<[u32; 3]>) -> (Vec<DVec3>, Vec<[u32; 3]>) {
    let mut remap = vec![u32::MAX; vertices.len()];
    let mut kept = Vec::new();
    let triangles = triangles
        .into_iter()
        .map(|tri| {
            tri.map(|v| {
                let slot = &mut remap[v as usize];
                if *slot == u32::MAX {
                    *slot = kept.len() as u32;
                    kept.push(vertices[v as usize]);
                }
                *slot
            })
        })
        .collect();
    (kept, triangles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_tetra() -> (Vec<DVec3>, Vec<[u32; 3]>) {
        let vertices = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(0.0, 0.0, 1.0),
        ];
        let triangles = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [0, 3, 2]];
        (vertices, triangles)
    }

    #[test]
    fn test_from_mesh_valid() {
        let (v, t) = quad_tetra();
        let solid = Solid::from_mesh(v, t);
        assert_eq!(solid.status(), Status::NoError);
        assert_eq!(solid.num_tri(), 4);
        assert!(solid.original_id().is_some());
    }

    #[test]
    fn test_from_mesh_rejects_open_surface() {
        let (v, mut t) = quad_tetra();
        t.pop();
        let solid = Solid::from_mesh(v, t);
        assert_eq!(solid.status(), Status::NotManifold);
        assert!(solid.is_empty());
    }

    #[test]
    fn test_generated_open_surface_is_flagged() {
        let (v, mut t) = quad_tetra();
        assert_eq!(Solid::from_generated(v.clone(), t.clone()).status(), Status::NoError);
        t[1] = [0, 3, 1];
        let solid = Solid::from_generated(v, t);
        assert_eq!(solid.status(), Status::NotManifold);
        assert!(solid.is_empty());
    }

    #[test]
    fn test_from_mesh_rejects_bad_index_and_nan() {
        let (v, mut t) = quad_tetra();
        t[0] = [0, 2, 9];
        assert_eq!(Solid::from_mesh(v, t).status(), Status::VertexOutOfBounds);

        let (mut v, t) = quad_tetra();
        v[1].x = f64::NAN;
        assert_eq!(Solid::from_mesh(v, t).status(), Status::NonFiniteVertex);
    }

    #[test]
    fn test_compact_drops_unused() {
        let (mut v, t) = quad_tetra();
        v.insert(0, DVec3::splat(5.0));
        let t: Vec<_> = t.into_iter().map(|tri| tri.map(|i| i + 1)).collect();
        let (v, t) = compact(v, t);
        assert_eq!(v.len(), 4);
        assert!(t.iter().flatten().all(|&i| i < 4));
    }

    #[test]
    fn test_reserve_ids_are_consecutive() {
        let first = reserve_ids(5);
        let next = reserve_ids(1);
        assert!(next >= first + 5);
    }

    #[test]
    fn test_compose_then_decompose() {
        let (v, t) = quad_tetra();
        let a = Solid::from_mesh(v.clone(), t.clone());
        let shifted = v.iter().map(|p| *p + DVec3::X * 5.0).collect();
        let b = Solid::from_mesh(shifted, t);
        let both = Solid::compose(&[&a, &b]);
        assert_eq!(both.num_tri(), 8);
        assert!(both.original_id().is_none());
        assert_eq!(both.decompose().len(), 2);
    }
}
