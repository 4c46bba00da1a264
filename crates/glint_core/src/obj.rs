//! Wavefront OBJ loading.
//!
//! Supported commands: `v`, `vt`, `vn`, `f` (triangles and quads with
//! `v`, `v/t`, `v//n` or `v/t/n` corners), `mtllib`, `usemtl` and `#`
//! comments. Malformed lines are logged and skipped; they never abort a
//! load.

use std::path::{Path, PathBuf};
use std::time::Instant;

use glint_math::{Vec2, Vec3};
use thiserror::Error;

use crate::material::{MaterialId, MaterialLib};
use crate::object::{Face, Object};

/// Errors that can occur while loading a mesh file.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no faces found in {0:?}")]
    Empty(PathBuf),
}

/// Result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Bookkeeping from a single parse.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub skipped_lines: usize,
}

/// Load an OBJ file from disk.
///
/// `mtllib` references are resolved relative to the directory containing
/// `path`. A file that parses to zero faces is reported as
/// [`LoadError::Empty`] so callers can leave it out of the scene.
///
/// # Example
///
/// ```ignore
/// let mut materials = MaterialLib::new();
/// let teapot = load_obj("assets/teapot.obj", &mut materials)?;
/// ```
pub fn load_obj<P: AsRef<Path>>(path: P, materials: &mut MaterialLib) -> LoadResult<Object> {
    let path = path.as_ref();
    let start = Instant::now();

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed");
    let (object, stats) = parse_obj(name, &content, path.parent(), materials);

    if object.faces.is_empty() {
        return Err(LoadError::Empty(path.to_path_buf()));
    }

    let bounds = object.bounds();
    log::info!(
        "Loaded {:?} in {:.1}ms: {} vertices, {} faces, {} normals, {} texcoords, bounds {:?} .. {:?}",
        path,
        start.elapsed().as_secs_f64() * 1000.0,
        object.vertices.len(),
        object.faces.len(),
        object.normals.len(),
        object.texcoords.len(),
        bounds.min(),
        bounds.max()
    );
    if stats.skipped_lines > 0 {
        log::warn!("{:?}: skipped {} malformed line(s)", path, stats.skipped_lines);
    }

    Ok(object)
}

/// Parse OBJ text.
///
/// `base_dir` is used to resolve `mtllib` paths; `None` resolves them
/// against the working directory.
pub fn parse_obj(
    name: &str,
    content: &str,
    base_dir: Option<&Path>,
    materials: &mut MaterialLib,
) -> (Object, ParseStats) {
    let mut parser = ObjParser {
        object: Object::new(name),
        stats: ParseStats::default(),
        base_dir: base_dir.map(Path::to_path_buf).unwrap_or_default(),
        library: None,
        material_name: None,
        material: None,
    };

    for (line_num, line) in content.lines().enumerate() {
        if let Err(reason) = parser.parse_line(line, materials) {
            log::warn!("{}:{}: {} ({:?})", name, line_num + 1, reason, line.trim());
            parser.stats.skipped_lines += 1;
        }
    }

    (parser.object, parser.stats)
}

impl Object {
    /// Load an OBJ file. See [`load_obj`].
    pub fn load<P: AsRef<Path>>(path: P, materials: &mut MaterialLib) -> LoadResult<Object> {
        load_obj(path, materials)
    }

    /// Parse OBJ text. See [`parse_obj`].
    pub fn parse(
        name: &str,
        content: &str,
        base_dir: Option<&Path>,
        materials: &mut MaterialLib,
    ) -> (Object, ParseStats) {
        parse_obj(name, content, base_dir, materials)
    }
}

struct ObjParser {
    object: Object,
    stats: ParseStats,
    base_dir: PathBuf,
    library: Option<PathBuf>,
    material_name: Option<String>,
    /// Resolved from `library` + `material_name` whenever either changes.
    material: Option<MaterialId>,
}

impl ObjParser {
    fn parse_line(&mut self, line: &str, materials: &mut MaterialLib) -> Result<(), &'static str> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = tokens.first() else {
            return Ok(());
        };
        if command.starts_with('#') {
            return Ok(());
        }
        let args = &tokens[1..];

        match command {
            "v" => {
                // Optional w / vertex color components are ignored
                if args.len() < 3 {
                    return Err("vertex needs 3 coordinates");
                }
                let v = parse_vec3(&args[..3]).ok_or("invalid vertex coordinate")?;
                self.object.vertices.push(v);
            }
            "vn" => {
                if args.len() != 3 {
                    return Err("normal needs 3 coordinates");
                }
                let n = parse_vec3(args).ok_or("invalid normal coordinate")?;
                self.object.normals.push(n);
            }
            "vt" => {
                if args.len() < 2 || args.len() > 3 {
                    return Err("texcoord needs 2 coordinates");
                }
                let u = args[0].parse().map_err(|_| "invalid texcoord")?;
                let v = args[1].parse().map_err(|_| "invalid texcoord")?;
                self.object.texcoords.push(Vec2::new(u, v));
            }
            "f" => {
                let face = self.parse_face(args)?;
                self.object.faces.push(face);
            }
            "mtllib" => {
                if args.len() != 1 {
                    return Err("mtllib needs exactly one path");
                }
                self.library = Some(self.base_dir.join(args[0]));
                self.resolve_material(materials);
            }
            "usemtl" => {
                if args.len() != 1 {
                    return Err("usemtl needs exactly one name");
                }
                self.material_name = Some(args[0].to_string());
                self.resolve_material(materials);
            }
            other => log::debug!("{}: ignoring \"{}\"", self.object.name, other),
        }
        Ok(())
    }

    fn resolve_material(&mut self, materials: &mut MaterialLib) {
        self.material = match (&self.library, &self.material_name) {
            (Some(library), Some(name)) => materials.load(library, name),
            _ => None,
        };
    }

    fn parse_face(&self, corners: &[&str]) -> Result<Face, &'static str> {
        if corners.len() != 3 && corners.len() != 4 {
            return Err("face must have 3 or 4 corners");
        }

        let mut face = Face {
            vertices: [0; 4],
            texcoords: [None; 4],
            normals: [None; 4],
            is_quad: corners.len() == 4,
            material: self.material,
        };

        for (i, corner) in corners.iter().enumerate() {
            let mut parts = corner.split('/');
            let v = parts.next().ok_or("empty face corner")?;
            face.vertices[i] =
                resolve_index(v, self.object.vertices.len()).ok_or("vertex index out of range")?;

            if let Some(t) = parts.next().filter(|t| !t.is_empty()) {
                face.texcoords[i] = Some(
                    resolve_index(t, self.object.texcoords.len())
                        .ok_or("texcoord index out of range")?,
                );
            }
            if let Some(n) = parts.next().filter(|n| !n.is_empty()) {
                face.normals[i] = Some(
                    resolve_index(n, self.object.normals.len())
                        .ok_or("normal index out of range")?,
                );
            }
            if parts.next().is_some() {
                return Err("too many components in face corner");
            }
        }

        Ok(face)
    }
}

/// Convert a 1-based (or negative, end-relative) OBJ index into a 0-based
/// index into a list that currently holds `len` entries.
fn resolve_index(token: &str, len: usize) -> Option<u32> {
    let index: i64 = token.parse().ok()?;
    let resolved = match index {
        0 => return None,
        i if i < 0 => len as i64 + i,
        i => i - 1,
    };
    if resolved < 0 || resolved >= len as i64 {
        return None;
    }
    u32::try_from(resolved).ok()
}

fn parse_vec3(tokens: &[&str]) -> Option<Vec3> {
    let x = tokens[0].parse().ok()?;
    let y = tokens[1].parse().ok()?;
    let z = tokens[2].parse().ok()?;
    Some(Vec3::new(x, y, z))
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD_OBJ: &str = "\
# unit quad in XY
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1
f 1//1 3//1 4//1
f 1 2 3 4
";

    fn parse(content: &str) -> (Object, ParseStats) {
        let mut materials = MaterialLib::new();
        parse_obj("test", content, None, &mut materials)
    }

    #[test]
    fn test_parse_counts() {
        let (obj, stats) = parse(QUAD_OBJ);
        assert_eq!(obj.vertices.len(), 4);
        assert_eq!(obj.texcoords.len(), 3);
        assert_eq!(obj.normals.len(), 1);
        assert_eq!(obj.faces.len(), 3);
        assert_eq!(stats.skipped_lines, 0);
    }

    #[test]
    fn test_corner_formats() {
        let (obj, _) = parse(QUAD_OBJ);

        let full = &obj.faces[0];
        assert_eq!(&full.vertices[..3], &[0, 1, 2]);
        assert_eq!(&full.texcoords[..3], &[Some(0), Some(1), Some(2)]);
        assert_eq!(&full.normals[..3], &[Some(0), Some(0), Some(0)]);
        assert!(!full.is_quad);

        let no_uv = &obj.faces[1];
        assert_eq!(&no_uv.vertices[..3], &[0, 2, 3]);
        assert_eq!(no_uv.texcoords, [None; 4]);
        assert_eq!(&no_uv.normals[..3], &[Some(0), Some(0), Some(0)]);

        let quad = &obj.faces[2];
        assert!(quad.is_quad);
        assert_eq!(quad.vertices, [0, 1, 2, 3]);
        assert_eq!(quad.normals, [None; 4]);
    }

    #[test]
    fn test_negative_index_is_most_recent_vertex() {
        let (obj, stats) = parse(
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\nv 5 5 5\nf 1 2 -1\n",
        );
        assert_eq!(stats.skipped_lines, 0);
        assert_eq!(&obj.faces[0].vertices[..3], &[0, 1, 2]);
        // -1 now refers to the fourth vertex
        assert_eq!(&obj.faces[1].vertices[..3], &[0, 1, 3]);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let (obj, stats) = parse(
            "v 0 0 0\nv 1 0\nv 1 0 0\nv a b c\nv 0 1 0\n\
             f 1 2\nf 1 2 9\nf 0 1 2\nf 1 2 3 1 2\nf 1 2 3\nvn 0 0\n",
        );
        assert_eq!(obj.vertices.len(), 3);
        assert_eq!(obj.faces.len(), 1);
        assert_eq!(stats.skipped_lines, 7);
    }

    #[test]
    fn test_unknown_commands_are_ignored() {
        let (obj, stats) = parse("o thing\ng group\ns off\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n");
        assert_eq!(obj.faces.len(), 1);
        assert_eq!(stats.skipped_lines, 0);
    }

    #[test]
    fn test_face_material_uses_latest_declaration() {
        let mut materials = MaterialLib::new();
        materials.parse_str(Path::new("lib.mtl"), "newmtl red\nKd 1 0 0\nnewmtl blue\nKd 0 0 1\n");

        let (obj, _) = parse_obj(
            "test",
            "v 0 0 0\nv 1 0 0\nv 0 1 0\n\
             f 1 2 3\n\
             mtllib lib.mtl\nusemtl red\nf 1 2 3\n\
             usemtl blue\nf 1 2 3\n\
             usemtl missing\nf 1 2 3\n",
            None,
            &mut materials,
        );

        assert_eq!(obj.faces[0].material, None);
        let red = obj.faces[1].material.unwrap();
        let blue = obj.faces[2].material.unwrap();
        assert_eq!(materials[red].name, "red");
        assert_eq!(materials[blue].name, "blue");
        assert_eq!(obj.faces[3].material, None);
    }

    #[test]
    fn test_load_resolves_mtllib_next_to_obj() {
        let dir = std::env::temp_dir().join(format!("glint_obj_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("tri.mtl"), "newmtl white\nKd 1 1 1\n").unwrap();
        std::fs::write(
            dir.join("tri.obj"),
            "mtllib tri.mtl\nusemtl white\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n",
        )
        .unwrap();

        let mut materials = MaterialLib::new();
        let obj = load_obj(dir.join("tri.obj"), &mut materials).unwrap();
        assert_eq!(obj.name, "tri");
        let id = obj.faces[0].material.unwrap();
        assert_eq!(materials[id].diffuse, Vec3::ONE);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_missing_file() {
        let mut materials = MaterialLib::new();
        let result = load_obj("/definitely/not/here.obj", &mut materials);
        assert!(matches!(result, Err(LoadError::Io { .. })));
    }

    #[test]
    fn test_load_empty_file() {
        let path = std::env::temp_dir().join(format!("glint_empty_{}.obj", std::process::id()));
        std::fs::write(&path, "# nothing\nv 0 0 0\n").unwrap();

        let mut materials = MaterialLib::new();
        let result = load_obj(&path, &mut materials);
        assert!(matches!(result, Err(LoadError::Empty(_))));

        let _ = std::fs::remove_file(&path);
    }
}
