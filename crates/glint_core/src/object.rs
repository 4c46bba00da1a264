//! Triangle/quad mesh storage.

use glint_math::{Aabb, Mat4, Mat4Ext, Vec2, Vec3};

use crate::material::MaterialId;

/// A triangle or quad face. Only the first three corners are used for a
/// triangle; the fourth slot is ignored unless `is_quad` is set.
#[derive(Clone, Debug, PartialEq)]
pub struct Face {
    /// 0-based indices into `Object::vertices`
    pub vertices: [u32; 4],
    /// 0-based indices into `Object::texcoords`, if the corner has one
    pub texcoords: [Option<u32>; 4],
    /// 0-based indices into `Object::normals`, if the corner has one
    pub normals: [Option<u32>; 4],
    pub is_quad: bool,
    pub material: Option<MaterialId>,
}

impl Face {
    pub fn triangle(vertices: [u32; 3]) -> Self {
        Self {
            vertices: [vertices[0], vertices[1], vertices[2], 0],
            texcoords: [None; 4],
            normals: [None; 4],
            is_quad: false,
            material: None,
        }
    }

    /// Vertex normal indices of the first triangle, if every corner has one.
    pub fn triangle_normals(&self) -> Option<[u32; 3]> {
        Some([self.normals[0]?, self.normals[1]?, self.normals[2]?])
    }
}

/// One triangle handed to the intersection engine.
///
/// `indices` already include the vertex offset of the owning object inside
/// the combined vertex buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuildTriangle {
    pub indices: [u32; 3],
    pub object_id: u32,
    pub face_id: u32,
}

/// A polygon mesh with per-corner attribute indices.
#[derive(Clone, Debug, Default)]
pub struct Object {
    pub name: String,
    pub vertices: Vec<Vec3>,
    pub texcoords: Vec<Vec2>,
    pub normals: Vec<Vec3>,
    pub faces: Vec<Face>,
}

impl Object {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Number of triangles this object contributes to the intersection
    /// engine. Quads are exported as their first triangle only.
    pub fn triangle_count(&self) -> usize {
        self.faces.len()
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_point_cloud(self.vertices.iter())
    }

    /// Apply `m` to every position, and its inverse transpose to every
    /// normal. Normals are not renormalized.
    pub fn transform_by(&mut self, m: Mat4) {
        for v in &mut self.vertices {
            *v = m.transform_point3(*v);
        }
        let n = m.normal_matrix();
        for normal in &mut self.normals {
            *normal = n.transform_vector3(*normal);
        }
    }

    /// Copy positions into `vertices` and one triangle per face into
    /// `triangles`.
    ///
    /// `vertex_offset` is where this object's positions start in the
    /// combined buffer. Both slices must be exactly `vertex_count()` and
    /// `triangle_count()` long.
    pub fn export_into(
        &self,
        object_id: u32,
        vertex_offset: u32,
        vertices: &mut [Vec3],
        triangles: &mut [BuildTriangle],
    ) {
        debug_assert_eq!(vertices.len(), self.vertices.len());
        debug_assert_eq!(triangles.len(), self.faces.len());

        vertices.copy_from_slice(&self.vertices);
        for (face_id, (face, out)) in self.faces.iter().zip(triangles.iter_mut()).enumerate() {
            *out = BuildTriangle {
                indices: [
                    face.vertices[0] + vertex_offset,
                    face.vertices[1] + vertex_offset,
                    face.vertices[2] + vertex_offset,
                ],
                object_id,
                face_id: face_id as u32,
            };
        }
    }

    /// Positions of the first triangle of `face_id`.
    pub fn triangle_positions(&self, face_id: usize) -> [Vec3; 3] {
        let f = &self.faces[face_id].vertices;
        [
            self.vertices[f[0] as usize],
            self.vertices[f[1] as usize],
            self.vertices[f[2] as usize],
        ]
    }

    /// Vertex normals of the first triangle of `face_id`, when the face
    /// carries them.
    pub fn triangle_vertex_normals(&self, face_id: usize) -> Option<[Vec3; 3]> {
        let [a, b, c] = self.faces[face_id].triangle_normals()?;
        Some([
            *self.normals.get(a as usize)?,
            *self.normals.get(b as usize)?,
            *self.normals.get(c as usize)?,
        ])
    }
}
