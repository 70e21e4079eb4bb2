//! STL export for the dingcad engine

use anyhow::{Context, Result};
use dingcad_kernel::Solid;
use dingcad_kernel::io::DEFAULT_STL_HEADER;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// File extension written by [`export_solid`]
pub const STL_EXTENSION: &str = "stl";

/// Options for mesh export
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Output file path
    pub path: PathBuf,

    /// Text for the 80-byte STL header
    pub header: String,
}

impl ExportOptions {
    /// Create export options for a given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            header: DEFAULT_STL_HEADER.to_string(),
        }
    }

    /// Set the header text
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    /// The path that will be written: `.stl` is appended when there is no extension
    pub fn effective_path(&self) -> PathBuf {
        let mut path = self.path.clone();
        if path.extension().is_none() {
            path.set_extension(STL_EXTENSION);
        }
        path
    }
}

/// Result of a successful export operation
#[derive(Debug, Clone)]
pub struct ExportResult {
    /// Path where the file was written
    pub path: PathBuf,

    /// Number of vertices in the mesh
    pub vertex_count: usize,

    /// Number of triangles in the mesh
    pub triangle_count: usize,

    /// Bytes written
    pub bytes: u64,
}

impl std::fmt::Display for ExportResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Exported {} ({} vertices, {} triangles)",
            self.path.display(),
            self.vertex_count,
            self.triangle_count
        )
    }
}

/// Export a solid as binary STL
pub fn export_solid(solid: &Solid, options: &ExportOptions) -> Result<ExportResult> {
    let path = options.effective_path();

    // Serialize first so an empty solid leaves no file behind
    let mut buffer = Vec::with_capacity(84 + 50 * solid.num_tri());
    solid.write_binary_stl(&mut buffer, &options.header)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create export directory {}", parent.display()))?;
    }
    let mut writer = BufWriter::new(
        File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?,
    );
    writer.write_all(&buffer)?;
    writer.flush()?;

    let result = ExportResult {
        path,
        vertex_count: solid.num_vert(),
        triangle_count: solid.num_tri(),
        bytes: buffer.len() as u64,
    };
    tracing::info!(path = %result.path.display(), triangles = result.triangle_count, "export written");
    Ok(result)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use dingcad_kernel::prelude::*;

    #[test]
    fn test_effective_path() {
        assert_eq!(ExportOptions::new("part").effective_path(), PathBuf::from("part.stl"));
        assert_eq!(ExportOptions::new("part.STL").effective_path(), PathBuf::from("part.STL"));
    }

    #[test]
    fn test_export_layout() {
        let dir = tempfile::tempdir().unwrap();
        let cube = Solid::cube(DVec3::ONE, false);
        let result = export_solid(&cube, &ExportOptions::new(dir.path().join("out/cube"))).unwrap();

        let bytes = fs::read(&result.path).unwrap();
        assert_eq!(result.triangle_count, 12);
        assert_eq!(bytes.len(), 84 + 50 * 12);
        assert_eq!(result.bytes, bytes.len() as u64);
        assert!(bytes.starts_with(b"dingcad export"));
        assert_eq!(u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]), 12);
    }

    #[test]
    fn test_empty_solid_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.stl");
        let err = export_solid(&Solid::empty(), &ExportOptions::new(&path)).unwrap_err();
        assert_eq!(err.to_string(), "Export failed: mesh is empty");
        assert!(!path.exists());
    }
}
