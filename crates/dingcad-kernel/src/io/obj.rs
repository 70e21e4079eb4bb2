//! Wavefront OBJ import: `v` and `f` records only

use std::fs;
use std::path::Path;

use glam::DVec3;

use crate::{Error, Result};

pub(super) fn read_obj(path: &Path) -> Result<(Vec<DVec3>, Vec<[u32; 3]>)> {
    let text = fs::read_to_string(path)?;
    parse_obj(&text).map_err(|msg| Error::Import(format!("{}: {msg}", path.display())))
}

fn parse_obj(text: &str) -> std::result::Result<(Vec<DVec3>, Vec<[u32; 3]>), String> {
    let mut vertices = Vec::new();
    let mut triangles = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line_no = line_no + 1;
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("v") => {
                let coords: Vec<f64> = tokens
                    .take(3)
                    .map(|t| t.parse::<f64>().map_err(|_| format!("line {line_no}: bad coordinate '{t}'")))
                    .collect::<std::result::Result<_, _>>()?;
                if coords.len() != 3 {
                    return Err(format!("line {line_no}: vertex needs three coordinates"));
                }
                vertices.push(DVec3::new(coords[0], coords[1], coords[2]));
            }
            Some("f") => {
                let mut corners = Vec::new();
                for token in tokens {
                    let index = token.split('/').next().unwrap_or_default();
                    let index: i64 = index
                        .parse()
                        .map_err(|_| format!("line {line_no}: bad face index '{token}'"))?;
                    // 1-based, negative counts back from the latest vertex
                    let resolved = if index > 0 {
                        index - 1
                    } else {
                        vertices.len() as i64 + index
                    };
                    if index == 0 || resolved < 0 || resolved >= vertices.len() as i64 {
                        return Err(format!("line {line_no}: face index {index} out of range"));
                    }
                    corners.push(resolved as u32);
                }
                if corners.len() < 3 {
                    return Err(format!("line {line_no}: face needs at least three vertices"));
                }
                for k in 1..corners.len() - 1 {
                    triangles.push([corners[0], corners[k], corners[k + 1]]);
                }
            }
            _ => {}
        }
    }
    Ok((vertices, triangles))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_quads_and_slashes() {
        let text = "# quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nvn 0 0 1\nf 1/1/1 2/2/1 3/3/1 4/4/1\n";
        let (vertices, triangles) = parse_obj(text).unwrap();
        assert_eq!(vertices.len(), 4);
        assert_eq!(triangles, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn test_negative_indices() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let (_, triangles) = parse_obj(text).unwrap();
        assert_eq!(triangles, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_bad_records() {
        assert!(parse_obj("v 0 0\n").unwrap_err().contains("three coordinates"));
        assert!(parse_obj("v 0 0 0\nf 1 2 3\n").unwrap_err().contains("out of range"));
        assert!(parse_obj("v 0 0 x\n").unwrap_err().contains("bad coordinate"));
    }
}
