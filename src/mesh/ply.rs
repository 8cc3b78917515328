// SPDX-License-Identifier: MPL-2.0

//! A reader for the binary little-endian subset of PLY.
//!
//! The header is ASCII and ends with `end_header`. Only the `vertex` and `face` element counts
//! are read from it. Each vertex is three little-endian `f32` coordinates; each face is a `u8`
//! corner count, which must be 3, followed by three little-endian `i32` indices.

use std::io::{BufRead, ErrorKind, Read};

use super::{LoadError, Mesh, MeshVertexIndex};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PlyError {
    #[error("missing 'ply' magic")]
    MissingMagic,
    #[error("header ended before 'end_header'")]
    UnterminatedHeader,
    #[error("unsupported format {0:?}; only binary_little_endian is read")]
    UnsupportedFormat(String),
    #[error("invalid element count in {0:?}")]
    InvalidCount(String),
    #[error("vertex count must be positive")]
    NoVertices,
    #[error("face {face} has {corners} corners; only triangles are supported")]
    NotATriangle { face: usize, corners: u8 },
    #[error("face {face} references vertex {index}, but there are only {vertex_count}")]
    IndexOutOfRange {
        face: usize,
        index: i32,
        vertex_count: usize,
    },
    #[error("file ended before all {0} were read")]
    Truncated(&'static str),
}

/// Element counts declared by a PLY header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Header {
    pub vertices: usize,
    pub faces: usize,
}

/// Reads a whole mesh.
///
/// Nothing is returned unless every vertex and face was read and validated.
pub fn read(mut reader: impl BufRead) -> Result<Mesh, LoadError> {
    let header = read_header(&mut reader)?;
    tracing::debug!(
        "PLY header declares {} vertices and {} faces",
        header.vertices,
        header.faces,
    );

    let positions = read_vertices(&mut reader, header.vertices)?;
    let indices = read_faces(&mut reader, header.faces, header.vertices)?;

    Ok(Mesh::new(positions, indices)?)
}

/// Reads the ASCII header, leaving `reader` at the first byte of vertex data.
pub fn read_header(reader: &mut impl BufRead) -> Result<Header, LoadError> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 || !line.trim_end().starts_with("ply") {
        return Err(PlyError::MissingMagic.into());
    }

    let mut header = Header::default();
    let mut vertices = None;
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(PlyError::UnterminatedHeader.into());
        }

        let mut words = line.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (Some("end_header"), ..) => break,
            (Some("format"), Some(format), _) if format != "binary_little_endian" => {
                return Err(PlyError::UnsupportedFormat(format.to_owned()).into());
            }
            (Some("element"), Some("vertex"), count) => {
                let count = parse_count(count, &line)?;
                vertices = if count > 0 { Some(element_count(count, &line)?) } else { None };
            }
            (Some("element"), Some("face"), count) => {
                let faces = parse_count(count, &line)?;
                header.faces = element_count(faces, &line)?;
            }
            // Comments, property declarations and any other elements are not interpreted.
            _ => {}
        }
    }

    header.vertices = vertices.ok_or(PlyError::NoVertices)?;

    Ok(header)
}

fn parse_count(word: Option<&str>, line: &str) -> Result<i64, PlyError> {
    word.and_then(|word| word.parse().ok())
        .ok_or_else(|| PlyError::InvalidCount(line.trim_end().to_owned()))
}

/// Rejects negative counts and counts whose three values per element overflow a
/// [`MeshVertexIndex`].
fn element_count(count: i64, line: &str) -> Result<usize, PlyError> {
    usize::try_from(count)
        .ok()
        .filter(|count| {
            count
                .checked_mul(3)
                .map_or(false, |values| values <= MeshVertexIndex::MAX as usize)
        })
        .ok_or_else(|| PlyError::InvalidCount(line.trim_end().to_owned()))
}

/// Elements reserved before reading. Larger files grow as records actually arrive.
const MAX_RESERVED_ELEMENTS: usize = 1 << 20;

fn read_vertices(reader: &mut impl Read, count: usize) -> Result<Vec<f32>, LoadError> {
    let mut positions = Vec::with_capacity(count.min(MAX_RESERVED_ELEMENTS) * 3);
    let mut record = [0; 12];
    for _ in 0..count {
        read_record(reader, &mut record, "vertices")?;
        for coordinate in record.chunks_exact(4) {
            positions.push(f32::from_le_bytes([
                coordinate[0],
                coordinate[1],
                coordinate[2],
                coordinate[3],
            ]));
        }
    }

    Ok(positions)
}

fn read_faces(
    reader: &mut impl Read,
    count: usize,
    vertex_count: usize,
) -> Result<Vec<MeshVertexIndex>, LoadError> {
    let mut indices = Vec::with_capacity(count.min(MAX_RESERVED_ELEMENTS) * 3);
    let mut record = [0; 13];
    for face in 0..count {
        read_record(reader, &mut record, "faces")?;

        let corners = record[0];
        if corners != 3 {
            return Err(PlyError::NotATriangle { face, corners }.into());
        }

        for bytes in record[1..].chunks_exact(4) {
            let index = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            match usize::try_from(index) {
                Ok(i) if i < vertex_count => indices.push(index as MeshVertexIndex),
                _ => {
                    return Err(PlyError::IndexOutOfRange {
                        face,
                        index,
                        vertex_count,
                    }
                    .into());
                }
            }
        }
    }

    Ok(indices)
}

fn read_record(
    reader: &mut impl Read,
    record: &mut [u8],
    what: &'static str,
) -> Result<(), LoadError> {
    reader.read_exact(record).map_err(|error| match error.kind() {
        ErrorKind::UnexpectedEof => PlyError::Truncated(what).into(),
        _ => LoadError::Io(error),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;

    use glam::Vec3;

    use super::*;

    /// Encodes a binary PLY file.
    pub(crate) fn encode(positions: &[[f32; 3]], faces: &[(u8, [i32; 3])]) -> Vec<u8> {
        let mut bytes = format!(
            "ply\n\
             format binary_little_endian 1.0\n\
             comment made by hand\n\
             element vertex {}\n\
             property float x\n\
             property float y\n\
             property float z\n\
             element face {}\n\
             property list uchar int vertex_indices\n\
             end_header\n",
            positions.len(),
            faces.len(),
        )
        .into_bytes();

        for position in positions {
            for coordinate in position {
                bytes.extend_from_slice(&coordinate.to_le_bytes());
            }
        }
        for (corners, face) in faces {
            bytes.push(*corners);
            for index in face {
                bytes.extend_from_slice(&index.to_le_bytes());
            }
        }

        bytes
    }

    fn square() -> Vec<u8> {
        encode(
            &[
                [-1.0, -1.0, 0.0],
                [1.0, -1.0, 0.0],
                [1.0, 1.0, 0.0],
                [-1.0, 1.0, 0.0],
            ],
            &[(3, [0, 1, 2]), (3, [0, 2, 3])],
        )
    }

    fn read_bytes(bytes: Vec<u8>) -> Result<Mesh, LoadError> {
        read(Cursor::new(bytes))
    }

    fn ply_error(bytes: Vec<u8>) -> PlyError {
        match read_bytes(bytes) {
            Err(LoadError::Ply(error)) => error,
            other => panic!("expected a PLY error, got {other:?}"),
        }
    }

    #[test]
    fn reads_a_well_formed_file() {
        let mesh = read_bytes(square()).unwrap();

        assert_eq!(mesh.positions().len(), 3 * 4);
        assert_eq!(mesh.indices(), &[0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.normals().len(), 3 * 4);
        assert_eq!(mesh.bounds().min, Vec3::new(-1.0, -1.0, 0.0));
        assert_eq!(mesh.bounds().max, Vec3::new(1.0, 1.0, 0.0));

        for normal in mesh.normals().chunks_exact(3) {
            let length = Vec3::from_slice(normal).length();
            assert!((length - 1.0).abs() < 1e-5 || length == 0.0);
        }
    }

    #[test]
    fn header_without_faces_yields_a_point_cloud() {
        let mesh = read_bytes(encode(&[[0.0, 0.0, 0.0], [1.0, 2.0, 3.0]], &[])).unwrap();

        assert_eq!(mesh.face_count(), 0);
        assert_eq!(mesh.vertex_count(), 2);
    }

    #[test]
    fn rejects_missing_magic() {
        let mut bytes = square();
        bytes[0] = b'q';

        assert_eq!(ply_error(bytes), PlyError::MissingMagic);
    }

    #[test]
    fn rejects_empty_vertex_element() {
        assert_eq!(ply_error(encode(&[], &[])), PlyError::NoVertices);
    }

    #[test]
    fn rejects_ascii_format() {
        let bytes = b"ply\nformat ascii 1.0\nelement vertex 1\nend_header\n0 0 0\n".to_vec();

        assert_eq!(ply_error(bytes), PlyError::UnsupportedFormat("ascii".to_owned()));
    }

    #[test]
    fn rejects_unterminated_header() {
        let bytes = b"ply\nelement vertex 3\n".to_vec();

        assert_eq!(ply_error(bytes), PlyError::UnterminatedHeader);
    }

    #[test]
    fn rejects_quads() {
        let bytes = encode(&[[0.0; 3]; 4], &[(4, [0, 1, 2])]);

        assert_eq!(ply_error(bytes), PlyError::NotATriangle { face: 0, corners: 4 });
    }

    #[test]
    fn rejects_out_of_range_indices() {
        let bytes = encode(&[[0.0; 3]; 3], &[(3, [0, 1, 2]), (3, [0, -1, 2])]);

        assert_eq!(
            ply_error(bytes),
            PlyError::IndexOutOfRange { face: 1, index: -1, vertex_count: 3 },
        );
    }

    #[test]
    fn rejects_counts_that_overflow_the_index_type() {
        let bytes = b"ply\n\
            format binary_little_endian 1.0\n\
            element vertex 9223372036854775807\n\
            element face 0\n\
            end_header\n"
            .to_vec();

        assert_eq!(
            ply_error(bytes),
            PlyError::InvalidCount("element vertex 9223372036854775807".to_owned()),
        );

        let mut bytes = encode(&[[0.0; 3]; 3], &[]);
        let header = String::from_utf8_lossy(&bytes).replace(
            "element face 0",
            "element face 4611686018427387904",
        );
        bytes = header.into_bytes();

        assert_eq!(
            ply_error(bytes),
            PlyError::InvalidCount("element face 4611686018427387904".to_owned()),
        );
    }

    #[test]
    fn huge_declared_counts_fail_as_truncated() {
        let bytes = b"ply\n\
            format binary_little_endian 1.0\n\
            element vertex 1000000000\n\
            end_header\n\
            \0\0\0\0"
            .to_vec();

        assert_eq!(ply_error(bytes), PlyError::Truncated("vertices"));

        let mut bytes = encode(&[[0.0; 3]; 3], &[]);
        let header = String::from_utf8_lossy(&bytes).replace(
            "element face 0",
            "element face 1000000000",
        );
        bytes = header.into_bytes();
        bytes.extend_from_slice(&[3, 0, 0, 0, 0]);

        assert_eq!(ply_error(bytes), PlyError::Truncated("faces"));
    }

    #[test]
    fn rejects_truncated_faces() {
        let mut bytes = square();
        bytes.truncate(bytes.len() - 5);

        assert_eq!(ply_error(bytes), PlyError::Truncated("faces"));
    }
}
