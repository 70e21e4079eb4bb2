//! STL import (via `stl_io`) and binary STL export
//!
//! Binary STL layout:
//! - 80 bytes: header text, padded with spaces
//! - 4 bytes: number of triangles (u32 little-endian)
//! - For each triangle (50 bytes):
//!   - 12 bytes: face normal (3 x f32 little-endian)
//!   - 36 bytes: 3 vertices (9 x f32 little-endian)
//!   - 2 bytes: attribute byte count (0)

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use glam::DVec3;

use crate::solid::Solid;
use crate::{Error, Result};

/// Header text written by [`Solid::export_stl`]
pub const DEFAULT_STL_HEADER: &str = "dingcad export";

pub(super) fn read_stl(path: &Path) -> Result<(Vec<DVec3>, Vec<[u32; 3]>)> {
    let mut reader = BufReader::new(File::open(path)?);
    let mesh = stl_io::read_stl(&mut reader).map_err(|e| Error::Import(format!("{}: {e}", path.display())))?;

    let vertices = mesh
        .vertices
        .iter()
        .map(|v| DVec3::new(f64::from(v[0]), f64::from(v[1]), f64::from(v[2])))
        .collect();
    let triangles = mesh
        .faces
        .iter()
        .map(|f| f.vertices.map(|i| i as u32))
        .collect();
    Ok((vertices, triangles))
}

impl Solid {
    /// Write this solid as binary STL.
    ///
    /// Fails with [`Error::Export`] when the solid has no triangles.
    pub fn write_binary_stl<W: Write>(&self, writer: &mut W, header: &str) -> Result<()> {
        if self.is_empty() {
            return Err(Error::Export("mesh is empty".to_string()));
        }

        let mut header_bytes = [b' '; 80];
        let header_len = header.len().min(80);
        header_bytes[..header_len].copy_from_slice(&header.as_bytes()[..header_len]);
        writer.write_all(&header_bytes)?;

        let num_triangles = u32::try_from(self.num_tri())
            .map_err(|_| Error::Export("too many triangles for STL".to_string()))?;
        writer.write_all(&num_triangles.to_le_bytes())?;

        for t in 0..self.num_tri() {
            let [a, b, c] = self.triangle_positions(t);
            let normal = (b - a).cross(c - a).try_normalize().unwrap_or(DVec3::Z);
            for v in [normal, a, b, c] {
                for x in v.to_array() {
                    writer.write_all(&(x as f32).to_le_bytes())?;
                }
            }
            writer.write_all(&0u16.to_le_bytes())?;
        }
        Ok(())
    }

    /// Write binary STL to a file with the default header
    pub fn export_stl(&self, path: &Path) -> Result<()> {
        // Check before creating the file so a failed export leaves nothing behind
        if self.is_empty() {
            return Err(Error::Export("mesh is empty".to_string()));
        }
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_binary_stl(&mut writer, DEFAULT_STL_HEADER)?;
        writer.flush()?;
        Ok(())
    }
}
