// SPDX-License-Identifier: MPL-2.0

//! Triangle meshes and the files they come from.

pub mod obj;
pub mod ply;

use std::{ffi::OsStr, fs::File, io::BufReader, path::Path};

use glam::{DVec3, Vec3};

/// The integral type for indexing a mesh's vertices.
pub type MeshVertexIndex = u32;

/// Failure to build a [`Mesh`] from raw buffers.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MeshError {
    #[error("position buffer length {0} is not a multiple of 3")]
    RaggedPositions(usize),
    #[error("index buffer length {0} is not a multiple of 3")]
    RaggedIndices(usize),
    #[error("index {index} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        index: MeshVertexIndex,
        vertex_count: usize,
    },
    #[error("mesh has no vertices")]
    Empty,
}

/// Failure to load a [`Mesh`] from disk.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported mesh format {0:?}")]
    UnsupportedFormat(String),
    #[error("malformed PLY: {0}")]
    Ply(#[from] ply::PlyError),
    #[error("malformed OBJ: {0}")]
    Obj(#[from] tobj::LoadError),
    #[error("invalid mesh: {0}")]
    Mesh(#[from] MeshError),
}

/// An axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// The smallest box containing every point in `points`.
    ///
    /// Returns `None` for an empty iterator.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;

        Some(points.fold(Self::new(first, first), |bounds, point| Self {
            min: bounds.min.min(point),
            max: bounds.max.max(point),
        }))
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// The length of the longest edge.
    pub fn longest_edge(&self) -> f32 {
        self.extent().max_element()
    }
}

/// The sizes reported to the host after a mesh is loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshStats {
    pub faces: usize,
    pub vertices: usize,
}

/// An immutable, validated triangle mesh.
///
/// Buffers are flat: every three consecutive `f32`s of [`positions`](Self::positions) and
/// [`normals`](Self::normals) make up one vertex, and every three consecutive indices make up one
/// triangle.
#[derive(Clone, Debug)]
pub struct Mesh {
    positions: Vec<f32>,
    indices: Vec<MeshVertexIndex>,
    normals: Vec<f32>,
    bounds: Bounds,
}

impl Mesh {
    /// Validates the buffers, then computes vertex normals and the bounding box.
    pub fn new(positions: Vec<f32>, indices: Vec<MeshVertexIndex>) -> Result<Self, MeshError> {
        if positions.len() % 3 != 0 {
            return Err(MeshError::RaggedPositions(positions.len()));
        }
        if indices.len() % 3 != 0 {
            return Err(MeshError::RaggedIndices(indices.len()));
        }

        let vertex_count = positions.len() / 3;
        if let Some(&index) = indices.iter().find(|&&index| index as usize >= vertex_count) {
            return Err(MeshError::IndexOutOfRange { index, vertex_count });
        }

        let bounds = Bounds::from_points(positions.chunks_exact(3).map(Vec3::from_slice))
            .ok_or(MeshError::Empty)?;
        let normals = compute_vertex_normals(&positions, &indices);

        Ok(Self {
            positions,
            indices,
            normals,
            bounds,
        })
    }

    /// Loads a mesh, choosing the reader by file extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let mesh = match extension.as_str() {
            "ply" => ply::read(BufReader::new(File::open(path)?))?,
            "obj" => obj::load(path)?,
            _ => return Err(LoadError::UnsupportedFormat(extension)),
        };

        let stats = mesh.stats();
        tracing::info!(
            "Loaded {}: {} vertices, {} faces",
            path.display(),
            stats.vertices,
            stats.faces,
        );

        Ok(mesh)
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn indices(&self) -> &[MeshVertexIndex] {
        &self.indices
    }

    pub fn normals(&self) -> &[f32] {
        &self.normals
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn face_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn stats(&self) -> MeshStats {
        MeshStats {
            faces: self.face_count(),
            vertices: self.vertex_count(),
        }
    }
}

/// Face normals shorter than this are treated as degenerate.
const DEGENERATE_NORMAL: f64 = 1e-5;

/// Computes one normal per vertex by averaging the normals of adjacent faces, each weighted by
/// the angle of the face at that vertex.
///
/// Vertices touched only by degenerate faces get a zero normal.
fn compute_vertex_normals(positions: &[f32], indices: &[MeshVertexIndex]) -> Vec<f32> {
    let vertex = |index: MeshVertexIndex| {
        let i = index as usize * 3;
        DVec3::new(
            positions[i].into(),
            positions[i + 1].into(),
            positions[i + 2].into(),
        )
    };

    let mut accumulated = vec![DVec3::ZERO; positions.len() / 3];
    for triangle in indices.chunks_exact(3) {
        let corners = [vertex(triangle[0]), vertex(triangle[1]), vertex(triangle[2])];

        let face_normal = (corners[1] - corners[0]).cross(corners[2] - corners[0]);
        if face_normal.length() < DEGENERATE_NORMAL {
            continue;
        }
        let face_normal = face_normal.normalize();

        for j in 0..3 {
            let to_next = corners[(j + 1) % 3] - corners[j];
            let to_prev = corners[(j + 2) % 3] - corners[j];
            let angle = (to_next.dot(to_prev) / (to_next.length() * to_prev.length())).acos();

            if !angle.is_nan() {
                accumulated[triangle[j] as usize] += face_normal * angle;
            }
        }
    }

    accumulated
        .into_iter()
        .flat_map(|normal| {
            let normal = normal.normalize_or_zero();
            [normal.x as f32, normal.y as f32, normal.z as f32]
        })
        .collect()
}
