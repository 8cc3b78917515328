// SPDX-License-Identifier: MPL-2.0

//! Wavefront OBJ loading.
//!
//! Files are triangulated and single-indexed by `tobj`. Every model in the file is merged into one
//! mesh; materials, texture coordinates and file normals are ignored.

use std::{io::BufRead, path::Path};

use super::{LoadError, Mesh, MeshVertexIndex};

fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    }
}

/// Loads an OBJ file from disk.
pub fn load(path: &Path) -> Result<Mesh, LoadError> {
    let (models, _) = tobj::load_obj(path, &load_options())?;

    merge(models)
}

/// Reads OBJ text from memory. `mtllib` statements are not followed.
pub fn read(mut reader: impl BufRead) -> Result<Mesh, LoadError> {
    let (models, _) = tobj::load_obj_buf(&mut reader, &load_options(), |_| {
        Err(tobj::LoadError::OpenFileFailed)
    })?;

    merge(models)
}

fn merge(models: Vec<tobj::Model>) -> Result<Mesh, LoadError> {
    let mut positions = Vec::new();
    let mut indices = Vec::new();

    for model in models {
        tracing::debug!(
            "Merging OBJ model {:?} ({} vertices)",
            model.name,
            model.mesh.positions.len() / 3,
        );

        let offset = (positions.len() / 3) as MeshVertexIndex;
        indices.extend(model.mesh.indices.iter().map(|index| index + offset));
        positions.extend_from_slice(&model.mesh.positions);
    }

    Ok(Mesh::new(positions, indices)?)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use glam::Vec3;

    use super::*;
    use crate::mesh::MeshError;

    const TWO_OBJECTS: &str = "\
o first
v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3
o second
v 0 0 2
v 1 0 2
v 1 1 2
v 0 1 2
f 4 5 6 7
";

    #[test]
    fn merges_models_and_triangulates() {
        let mesh = read(Cursor::new(TWO_OBJECTS)).unwrap();

        assert_eq!(mesh.vertex_count(), 7);
        // One triangle plus a quad split in two.
        assert_eq!(mesh.face_count(), 3);
        assert!(mesh.indices().iter().all(|&i| (i as usize) < mesh.vertex_count()));
        assert!(mesh.indices()[3..].iter().all(|&i| i >= 3));
        assert_eq!(mesh.bounds().max, Vec3::new(1.0, 1.0, 2.0));
    }

    #[test]
    fn empty_file_is_an_empty_mesh() {
        let error = read(Cursor::new("# nothing here\n")).unwrap_err();

        assert!(matches!(error, LoadError::Mesh(MeshError::Empty)));
    }
}
