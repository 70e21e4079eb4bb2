//! Mesh file import and binary STL export

mod obj;
mod stl;

use std::collections::HashSet;
use std::path::Path;

use glam::DVec3;

use crate::repair::Welder;
use crate::solid::Solid;
use crate::{Error, Result};

pub use stl::DEFAULT_STL_HEADER;

/// Mesh formats understood by [`Solid::import_mesh`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    /// Binary or ASCII STL
    Stl,
    /// Wavefront OBJ, positions and faces only
    Obj,
}

impl MeshFormat {
    /// Detect format from file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "stl" => Some(Self::Stl),
            "obj" => Some(Self::Obj),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Stl => "STL",
            Self::Obj => "OBJ",
        }
    }
}

impl Solid {
    /// Read a mesh file and validate it as a solid.
    ///
    /// Parse failures and unknown extensions are errors. A mesh that parses
    /// but is not a closed manifold is returned as an empty solid whose
    /// status says why. `force_cleanup` welds near-coincident vertices and
    /// drops degenerate or repeated triangles before validation.
    pub fn import_mesh(path: &Path, force_cleanup: bool) -> Result<Solid> {
        let format = MeshFormat::from_extension(path)
            .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))?;
        let (vertices, triangles) = match format {
            MeshFormat::Stl => stl::read_stl(path)?,
            MeshFormat::Obj => obj::read_obj(path)?,
        };
        if triangles.is_empty() {
            return Ok(Solid::empty());
        }
        let (vertices, triangles) = if force_cleanup {
            cleanup(&vertices, &triangles)
        } else {
            (vertices, triangles)
        };
        Ok(Solid::from_mesh(vertices, triangles))
    }
}

fn cleanup(vertices: &[DVec3], triangles: &[[u32; 3]]) -> (Vec<DVec3>, Vec<[u32; 3]>) {
    let scale = vertices
        .iter()
        .fold(1.0_f64, |acc, v| acc.max(v.abs().max_element()));
    let mut welder = Welder::new(1e-9 * scale);
    let remap: Vec<u32> = vertices.iter().map(|v| welder.insert(*v)).collect();

    let mut seen = HashSet::new();
    let triangles = triangles
        .iter()
        .filter(|tri| tri.iter().all(|&i| (i as usize) < remap.len()))
        .map(|tri| tri.map(|i| remap[i as usize]))
        .filter(|[a, b, c]| a != b && b != c && c != a)
        .filter(|tri| {
            // Same corners in any rotation count as a repeat
            let lowest = (0..3).min_by_key(|&k| tri[k]).unwrap_or(0);
            seen.insert([tri[lowest], tri[(lowest + 1) % 3], tri[(lowest + 2) % 3]])
        })
        .collect();
    (welder.vertices, triangles)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Status;
    use approx::assert_relative_eq;
    use std::io::Write;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(MeshFormat::from_extension(Path::new("a.STL")), Some(MeshFormat::Stl));
        assert_eq!(MeshFormat::from_extension(Path::new("a.obj")), Some(MeshFormat::Obj));
        assert_eq!(MeshFormat::from_extension(Path::new("a.3mf")), None);
        assert_eq!(MeshFormat::from_extension(Path::new("noext")), None);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = Solid::import_mesh(Path::new("part.3mf"), false).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn test_cleanup_welds_split_vertices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("split.obj");
        // Tetrahedron whose last face uses duplicated positions
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 0 0 1").unwrap();
        writeln!(file, "v 0 0 0\nv 0 0 1\nv 0 1 0").unwrap();
        writeln!(file, "f 1 3 2\nf 1 2 4\nf 2 3 4\nf 5 6 7").unwrap();
        drop(file);

        let raw = Solid::import_mesh(&path, false).unwrap();
        assert_eq!(raw.status(), Status::NotManifold);
        let clean = Solid::import_mesh(&path, true).unwrap();
        assert_eq!(clean.status(), Status::NoError);
        assert_relative_eq!(clean.volume(), 1.0 / 6.0, epsilon = 1e-12);
    }
}
