//! STL serialization of triangle meshes.
//!
//! ASCII layout:
//!
//! ```text
//! solid <name>
//!   facet normal nx ny nz
//!     outer loop
//!       vertex x y z
//!       vertex x y z
//!       vertex x y z
//!     endloop
//!   endfacet
//! endsolid <name>
//! ```
//!
//! Floats are written with `Display`, which prints the shortest text that
//! parses back to the same `f64`, so ASCII export followed by
//! [`parse_ascii_stl`] reproduces coordinates exactly.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{LensError, Result};
use crate::mesh::Mesh;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const HEADER_SIZE: usize = 80;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StlFormat {
    #[default]
    Ascii,
    Binary,
}

/// Unit normal of the triangle `(p1, p2, p3)`, or zero when it has no area.
pub fn facet_normal(p1: [f64; 3], p2: [f64; 3], p3: [f64; 3]) -> [f64; 3] {
    let a = Vector3::from(p1);
    let normal = (Vector3::from(p2) - a).cross(&(Vector3::from(p3) - a));
    let length = normal.norm();
    if length > 0.0 {
        (normal / length).into()
    } else {
        [0.0; 3]
    }
}

pub fn write_ascii_stl<W: Write>(mut writer: W, mesh: &Mesh, name: &str) -> Result<()> {
    mesh.validate()?;
    let mut degenerate = 0usize;

    writeln!(writer, "solid {name}")?;
    for t in 0..mesh.triangle_count() {
        let corners = mesh.corners(t);
        let [nx, ny, nz] = facet_normal(corners[0], corners[1], corners[2]);
        if nx == 0.0 && ny == 0.0 && nz == 0.0 {
            degenerate += 1;
        }
        writeln!(writer, "  facet normal {nx} {ny} {nz}")?;
        writeln!(writer, "    outer loop")?;
        for [x, y, z] in corners {
            writeln!(writer, "      vertex {x} {y} {z}")?;
        }
        writeln!(writer, "    endloop")?;
        writeln!(writer, "  endfacet")?;
    }
    writeln!(writer, "endsolid {name}")?;

    if degenerate > 0 {
        warn!(degenerate, "zero-area facets written with zero normals");
    }
    Ok(())
}

pub fn to_ascii_stl(mesh: &Mesh, name: &str) -> Result<String> {
    let mut buffer = Vec::with_capacity(mesh.triangle_count() * 256);
    write_ascii_stl(&mut buffer, mesh, name)?;
    String::from_utf8(buffer).map_err(|err| LensError::config(err.to_string()))
}

/// Binary STL: 80-byte header, `u32` facet count, then 50 bytes per facet.
pub fn write_binary_stl<W: Write>(mut writer: W, mesh: &Mesh, name: &str) -> Result<()> {
    mesh.validate()?;
    let count = u32::try_from(mesh.triangle_count())
        .map_err(|_| LensError::config("too many triangles for binary STL"))?;

    let mut header = [0u8; HEADER_SIZE];
    let text = format!("binary STL: {name}");
    let len = text.len().min(HEADER_SIZE);
    header[..len].copy_from_slice(&text.as_bytes()[..len]);
    writer.write_all(&header)?;
    writer.write_all(&count.to_le_bytes())?;

    for t in 0..mesh.triangle_count() {
        let corners = mesh.corners(t);
        let normal = facet_normal(corners[0], corners[1], corners[2]);
        for value in normal.iter().chain(corners.iter().flatten()) {
            writer.write_all(&(*value as f32).to_le_bytes())?;
        }
        writer.write_all(&0u16.to_le_bytes())?;
    }
    Ok(())
}

/// Writes `mesh` to `path` in one buffered pass.
pub fn save_stl<P: AsRef<Path>>(path: P, mesh: &Mesh, name: &str, format: StlFormat) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    match format {
        StlFormat::Ascii => write_ascii_stl(&mut writer, mesh, name)?,
        StlFormat::Binary => write_binary_stl(&mut writer, mesh, name)?,
    }
    writer.flush()?;
    info!(path = %path.display(), triangles = mesh.triangle_count(), ?format, "STL file written");
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StlFacet {
    pub normal: [f64; 3],
    pub vertices: [[f64; 3]; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StlDocument {
    pub name: String,
    pub facets: Vec<StlFacet>,
}

impl StlDocument {
    /// Rebuilds an indexed mesh, merging bit-identical vertices.
    pub fn to_mesh(&self) -> Mesh {
        let mut mesh = Mesh::default();
        let mut seen: HashMap<[u64; 3], u32> = HashMap::new();
        for facet in &self.facets {
            let triangle = facet.vertices.map(|v| {
                *seen.entry(v.map(f64::to_bits)).or_insert_with(|| {
                    mesh.vertices.push(v);
                    (mesh.vertices.len() - 1) as u32
                })
            });
            mesh.triangles.push(triangle);
        }
        mesh
    }
}

struct LineReader<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
}

impl<'a> LineReader<'a> {
    /// Next non-blank line, split into tokens, with its 1-based number.
    fn next(&mut self) -> Result<(usize, Vec<&'a str>)> {
        for (index, line) in self.lines.by_ref() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if !tokens.is_empty() {
                return Ok((index + 1, tokens));
            }
        }
        Err(LensError::StlParse {
            line: 0,
            reason: "unexpected end of input".to_string(),
        })
    }

    fn expect(&mut self, keywords: &[&str]) -> Result<(usize, Vec<&'a str>)> {
        let (number, tokens) = self.next()?;
        if tokens.len() < keywords.len() || tokens[..keywords.len()] != *keywords {
            return Err(parse_error(
                number,
                format!("expected `{}`, found `{}`", keywords.join(" "), tokens.join(" ")),
            ));
        }
        Ok((number, tokens))
    }
}

fn parse_error(line: usize, reason: impl Into<String>) -> LensError {
    LensError::StlParse {
        line,
        reason: reason.into(),
    }
}

fn parse_triple(line: usize, tokens: &[&str]) -> Result<[f64; 3]> {
    if tokens.len() != 3 {
        return Err(parse_error(
            line,
            format!("expected 3 numbers, found {}", tokens.len()),
        ));
    }
    let mut out = [0.0; 3];
    for (slot, token) in out.iter_mut().zip(tokens) {
        *slot = token
            .parse()
            .map_err(|_| parse_error(line, format!("invalid number `{token}`")))?;
    }
    Ok(out)
}

/// Parses an ASCII STL document.
pub fn parse_ascii_stl(text: &str) -> Result<StlDocument> {
    let mut reader = LineReader {
        lines: text.lines().enumerate(),
    };

    let (_, header) = reader.expect(&["solid"])?;
    let name = header[1..].join(" ");
    let mut facets = Vec::new();

    loop {
        let (number, tokens) = reader.next()?;
        match tokens[0] {
            "endsolid" => break,
            "facet" if tokens.get(1) == Some(&"normal") => {
                let normal = parse_triple(number, &tokens[2..])?;
                reader.expect(&["outer", "loop"])?;
                let mut vertices = [[0.0; 3]; 3];
                for vertex in &mut vertices {
                    let (line, tokens) = reader.expect(&["vertex"])?;
                    *vertex = parse_triple(line, &tokens[1..])?;
                }
                reader.expect(&["endloop"])?;
                reader.expect(&["endfacet"])?;
                facets.push(StlFacet { normal, vertices });
            }
            other => {
                return Err(parse_error(
                    number,
                    format!("expected `facet normal` or `endsolid`, found `{other}`"),
                ));
            }
        }
    }

    if let Ok((number, _)) = reader.next() {
        return Err(parse_error(number, "content after `endsolid`"));
    }

    Ok(StlDocument { name, facets })
}
