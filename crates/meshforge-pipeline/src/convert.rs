//! STL to OBJ conversion for the secondary download.
//!
//! Reads a cached STL artifact (binary or ASCII), deduplicates vertices, and
//! writes a Wavefront OBJ next to the source. Runs in the background relative
//! to the primary response; a failure here never rolls back the already
//! delivered display document.

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use meshforge_core::StageError;
use thiserror::Error;

/// Binary STL layout: 80-byte header, u32 facet count, 50 bytes per facet.
const BINARY_HEADER_LEN: usize = 84;
const BINARY_FACET_LEN: usize = 50;

type Vertex = [f32; 3];
type Triangle = [Vertex; 3];

/// Derives a Wavefront OBJ from an STL artifact.
///
/// The OBJ is written next to the source with the same stem. Fails when the
/// source is unreadable, truncated, or carries no representable geometry.
pub fn convert_stl_to_obj(src: &Path) -> Result<PathBuf, ConvertError> {
    let bytes = fs::read(src).map_err(|e| ConvertError::Unreadable {
        path: src.to_path_buf(),
        source: e,
    })?;

    let triangles = parse_stl(&bytes)?;
    if triangles.is_empty() {
        return Err(ConvertError::EmptyMesh);
    }

    let obj = triangles_to_obj(&triangles)?;
    let dest = src.with_extension("obj");
    fs::write(&dest, obj).map_err(|e| ConvertError::WriteFailed {
        path: dest.clone(),
        source: e,
    })?;

    tracing::debug!(src = %src.display(), dest = %dest.display(), "converted artifact to OBJ");
    Ok(dest)
}

fn parse_stl(bytes: &[u8]) -> Result<Vec<Triangle>, ConvertError> {
    if looks_ascii(bytes) {
        parse_ascii(bytes)
    } else {
        parse_binary(bytes)
    }
}

/// A binary STL may begin with "solid" in its free-form header, so the
/// ASCII check also requires a facet keyword.
fn looks_ascii(bytes: &[u8]) -> bool {
    bytes.starts_with(b"solid") && String::from_utf8_lossy(bytes).contains("facet")
}

fn parse_binary(bytes: &[u8]) -> Result<Vec<Triangle>, ConvertError> {
    if bytes.len() < BINARY_HEADER_LEN {
        return Err(ConvertError::Truncated {
            expected: BINARY_HEADER_LEN,
            actual: bytes.len(),
        });
    }

    let mut cursor = Cursor::new(&bytes[80..BINARY_HEADER_LEN]);
    let count = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| ConvertError::Truncated {
            expected: BINARY_HEADER_LEN,
            actual: bytes.len(),
        })? as usize;

    let expected = BINARY_HEADER_LEN + count * BINARY_FACET_LEN;
    if bytes.len() < expected {
        return Err(ConvertError::Truncated {
            expected,
            actual: bytes.len(),
        });
    }

    let mut triangles = Vec::with_capacity(count);
    for facet in 0..count {
        // Skip the 12-byte normal; it is recomputable from the vertices.
        let base = BINARY_HEADER_LEN + facet * BINARY_FACET_LEN + 12;
        let mut cursor = Cursor::new(&bytes[base..base + 36]);
        let mut triangle: Triangle = [[0.0; 3]; 3];
        for vertex in triangle.iter_mut() {
            for coord in vertex.iter_mut() {
                *coord = cursor
                    .read_f32::<LittleEndian>()
                    .map_err(|_| ConvertError::Truncated {
                        expected,
                        actual: bytes.len(),
                    })?;
            }
        }
        triangles.push(triangle);
    }
    Ok(triangles)
}

fn parse_ascii(bytes: &[u8]) -> Result<Vec<Triangle>, ConvertError> {
    let text = String::from_utf8_lossy(bytes);
    let mut vertices: Vec<Vertex> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("vertex") {
            let coords: Vec<f32> = rest
                .split_whitespace()
                .map(str::parse)
                .collect::<Result<_, _>>()
                .map_err(|_| ConvertError::MalformedAscii {
                    line: line.to_string(),
                })?;
            if coords.len() != 3 {
                return Err(ConvertError::MalformedAscii {
                    line: line.to_string(),
                });
            }
            vertices.push([coords[0], coords[1], coords[2]]);
        }
    }

    if vertices.len() % 3 != 0 {
        return Err(ConvertError::DanglingFacet {
            count: vertices.len(),
        });
    }

    Ok(vertices
        .chunks_exact(3)
        .map(|chunk| [chunk[0], chunk[1], chunk[2]])
        .collect())
}

/// Builds OBJ text with positionally deduplicated vertices. Triangles whose
/// vertices collapse to fewer than three distinct positions are dropped; a
/// mesh with nothing left cannot be represented.
fn triangles_to_obj(triangles: &[Triangle]) -> Result<String, ConvertError> {
    let mut index: HashMap<[u32; 3], usize> = HashMap::new();
    let mut vertices: Vec<Vertex> = Vec::new();
    let mut faces: Vec<[usize; 3]> = Vec::new();

    for triangle in triangles {
        let mut face = [0usize; 3];
        for (slot, vertex) in triangle.iter().enumerate() {
            let key = [
                vertex[0].to_bits(),
                vertex[1].to_bits(),
                vertex[2].to_bits(),
            ];
            let next = vertices.len();
            let entry = *index.entry(key).or_insert_with(|| {
                vertices.push(*vertex);
                next
            });
            face[slot] = entry + 1;
        }
        if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
            continue;
        }
        faces.push(face);
    }

    if faces.is_empty() {
        return Err(ConvertError::DegenerateGeometry);
    }

    let mut out = String::from("o model\n");
    for vertex in &vertices {
        out.push_str(&format!("v {} {} {}\n", vertex[0], vertex[1], vertex[2]));
    }
    for face in &faces {
        out.push_str(&format!("f {} {} {}\n", face[0], face[1], face[2]));
    }
    Ok(out)
}

/// Errors raised while deriving the secondary format.
///
/// Non-fatal to the primary flow; surfaced only on the secondary link.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The source artifact could not be read.
    #[error("failed to read source artifact {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The binary STL ends before its declared facets do.
    #[error("STL data truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// An ASCII STL vertex line does not parse.
    #[error("malformed ASCII STL line: {line}")]
    MalformedAscii { line: String },

    /// An ASCII STL facet has a partial vertex triple.
    #[error("ASCII STL has a dangling facet ({count} vertices)")]
    DanglingFacet { count: usize },

    /// The source declares no triangles.
    #[error("source mesh contains no triangles")]
    EmptyMesh,

    /// Every triangle collapsed during deduplication.
    #[error("source mesh has only degenerate geometry")]
    DegenerateGeometry,

    /// The cache write never completed, so there is nothing to convert.
    #[error("source artifact never became available")]
    SourceUnavailable,

    /// The derived OBJ could not be written.
    #[error("failed to write converted artifact {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StageError for ConvertError {
    fn code(&self) -> &'static str {
        match self {
            ConvertError::Unreadable { .. } => "CONVERT_001",
            ConvertError::Truncated { .. } => "CONVERT_002",
            ConvertError::MalformedAscii { .. } => "CONVERT_003",
            ConvertError::DanglingFacet { .. } => "CONVERT_004",
            ConvertError::EmptyMesh => "CONVERT_005",
            ConvertError::DegenerateGeometry => "CONVERT_006",
            ConvertError::SourceUnavailable => "CONVERT_007",
            ConvertError::WriteFailed { .. } => "CONVERT_008",
        }
    }

    fn category(&self) -> &'static str {
        "convert"
    }
}
