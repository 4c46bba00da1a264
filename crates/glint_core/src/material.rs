//! Material table.
//!
//! Materials are parsed from MTL files on first use and live in one flat
//! list owned by the [`MaterialLib`]. Faces refer to them by [`MaterialId`],
//! so an `Object` never borrows from the table.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glint_math::Color;

/// Stable index of a material inside a [`MaterialLib`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(u32);

impl MaterialId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Colors and opacity read from an MTL `newmtl` block.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    /// `Ka`
    pub ambient: Color,
    /// `Kd`
    pub diffuse: Color,
    /// `Ks`
    pub specular: Color,
    /// `d` (1 = opaque)
    pub alpha: f32,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ambient: Color::ZERO,
            diffuse: Color::ZERO,
            specular: Color::ZERO,
            alpha: 1.0,
        }
    }
}

enum LibraryFile {
    Loaded(HashMap<String, MaterialId>),
    /// The file could not be read. Remembered so it is reported once.
    Missing,
}

/// Path -> name -> material registry, populated on demand.
///
/// One `MaterialLib` is owned by whatever is loading a scene and handed to
/// the OBJ parser by reference; nothing is process-global.
#[derive(Default)]
pub struct MaterialLib {
    materials: Vec<Material>,
    files: HashMap<PathBuf, LibraryFile>,
}

impl MaterialLib {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up material `name` from the library at `path`, parsing the file
    /// the first time it is referenced.
    ///
    /// Returns `None` if the file cannot be read or does not define `name`.
    pub fn load(&mut self, path: &Path, name: &str) -> Option<MaterialId> {
        if !self.files.contains_key(path) {
            match std::fs::read_to_string(path) {
                Ok(content) => {
                    self.parse_str(path, &content);
                }
                Err(err) => {
                    log::warn!("Material library {:?} could not be loaded: {}", path, err);
                    self.files.insert(path.to_path_buf(), LibraryFile::Missing);
                }
            }
        }

        match self.files.get(path) {
            Some(LibraryFile::Loaded(names)) => {
                let id = names.get(name).copied();
                if id.is_none() {
                    log::warn!("Material \"{}\" not found in {:?}", name, path);
                }
                id
            }
            _ => None,
        }
    }

    /// Register the MTL text `content` under `path` and return the number of
    /// materials the file declares.
    ///
    /// A path that is already registered keeps its first contents and
    /// `content` is ignored.
    pub fn parse_str(&mut self, path: &Path, content: &str) -> usize {
        match self.files.get(path) {
            Some(LibraryFile::Loaded(names)) => return names.len(),
            Some(LibraryFile::Missing) => return 0,
            None => {}
        }

        let mut names: HashMap<String, MaterialId> = HashMap::new();
        let mut current: Option<MaterialId> = None;

        for (line_num, line) in content.lines().enumerate() {
            let line_num = line_num + 1;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let Some(&command) = tokens.first() else {
                continue;
            };
            if command.starts_with('#') {
                continue;
            }

            if command == "newmtl" {
                if tokens.len() != 2 {
                    log::warn!("{:?}:{}: newmtl needs exactly one name", path, line_num);
                    current = None;
                    continue;
                }
                let id = *names.entry(tokens[1].to_string()).or_insert_with(|| {
                    let id = MaterialId(self.materials.len() as u32);
                    self.materials.push(Material::new(tokens[1]));
                    id
                });
                current = Some(id);
                continue;
            }

            let Some(id) = current else {
                log::warn!(
                    "{:?}:{}: \"{}\" appears before any newmtl",
                    path,
                    line_num,
                    command
                );
                continue;
            };
            let material = &mut self.materials[id.index()];

            match command {
                "Ka" | "Kd" | "Ks" => match parse_color(&tokens[1..]) {
                    Some(color) => match command {
                        "Ka" => material.ambient = color,
                        "Kd" => material.diffuse = color,
                        _ => material.specular = color,
                    },
                    None => log::warn!("{:?}:{}: malformed {} line", path, line_num, command),
                },
                "d" => match tokens.get(1).and_then(|t| t.parse::<f32>().ok()) {
                    Some(alpha) if tokens.len() == 2 => material.alpha = alpha,
                    _ => log::warn!("{:?}:{}: malformed d line", path, line_num),
                },
                other => log::debug!("{:?}:{}: ignoring \"{}\"", path, line_num, other),
            }
        }

        let count = names.len();
        log::debug!("Material library {:?}: {} material(s)", path, count);
        self.files.insert(path.to_path_buf(), LibraryFile::Loaded(names));
        count
    }

    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.index())
    }

    /// Total number of materials across all parsed files.
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

impl std::ops::Index<MaterialId> for MaterialLib {
    type Output = Material;

    fn index(&self, id: MaterialId) -> &Material {
        &self.materials[id.index()]
    }
}

fn parse_color(tokens: &[&str]) -> Option<Color> {
    if tokens.len() != 3 {
        return None;
    }
    let r = tokens[0].parse().ok()?;
    let g = tokens[1].parse().ok()?;
    let b = tokens[2].parse().ok()?;
    Some(Color::new(r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORNELL_MTL: &str = "\
# two materials
newmtl white
Ka 0.1 0.1 0.1
Kd 0.8 0.8 0.8
Ks 0 0 0
d 1

newmtl red
Kd 0.6 0.05 0.05
d 0.5
illum 2
";

    #[test]
    fn test_parse_materials() {
        let mut lib = MaterialLib::new();
        let path = Path::new("cornell.mtl");
        assert_eq!(lib.parse_str(path, CORNELL_MTL), 2);

        let white = lib.load(path, "white").unwrap();
        let red = lib.load(path, "red").unwrap();
        assert_ne!(white, red);

        assert_eq!(lib[white].ambient, Color::splat(0.1));
        assert_eq!(lib[white].diffuse, Color::splat(0.8));
        assert_eq!(lib[red].diffuse, Color::new(0.6, 0.05, 0.05));
        assert_eq!(lib[red].alpha, 0.5);
    }

    #[test]
    fn test_same_name_in_different_files_is_distinct() {
        let mut lib = MaterialLib::new();
        lib.parse_str(Path::new("a.mtl"), "newmtl m\nKd 1 0 0\n");
        lib.parse_str(Path::new("b.mtl"), "newmtl m\nKd 0 1 0\n");

        let a = lib.load(Path::new("a.mtl"), "m").unwrap();
        let b = lib.load(Path::new("b.mtl"), "m").unwrap();
        assert_ne!(a, b);
        assert_eq!(lib[a].diffuse, Color::X);
        assert_eq!(lib[b].diffuse, Color::Y);
    }

    #[test]
    fn test_reparsing_a_path_keeps_first_contents() {
        let mut lib = MaterialLib::new();
        assert_eq!(lib.parse_str(Path::new("a.mtl"), "newmtl m\nKd 1 0 0\n"), 1);
        assert_eq!(lib.parse_str(Path::new("a.mtl"), "newmtl m\nnewmtl n\nKd 0 1 0\n"), 1);

        assert_eq!(lib.len(), 1);
        let m = lib.load(Path::new("a.mtl"), "m").unwrap();
        assert_eq!(lib[m].diffuse, Color::X);
        assert!(lib.load(Path::new("a.mtl"), "n").is_none());
    }

    #[test]
    fn test_missing_name_returns_none() {
        let mut lib = MaterialLib::new();
        lib.parse_str(Path::new("a.mtl"), "newmtl m\n");
        assert!(lib.load(Path::new("a.mtl"), "other").is_none());
    }

    #[test]
    fn test_missing_file_returns_none() {
        let mut lib = MaterialLib::new();
        let path = Path::new("/definitely/not/here/materials.mtl");
        assert!(lib.load(path, "m").is_none());
        assert!(lib.load(path, "m").is_none());
        assert!(lib.is_empty());
    }

    #[test]
    fn test_properties_before_newmtl_are_skipped() {
        let mut lib = MaterialLib::new();
        let count = lib.parse_str(Path::new("a.mtl"), "Kd 1 1 1\nnewmtl m\nKd 0.5 0.5\nKs 1 1 1\n");
        assert_eq!(count, 1);

        let m = lib.load(Path::new("a.mtl"), "m").unwrap();
        // Malformed Kd left the default untouched
        assert_eq!(lib[m].diffuse, Color::ZERO);
        assert_eq!(lib[m].specular, Color::ONE);
    }

    #[test]
    fn test_load_reads_file_once() {
        let dir = std::env::temp_dir().join(format!("glint_mtl_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("lib.mtl");
        std::fs::write(&path, "newmtl gold\nKd 1 0.8 0\n").unwrap();

        let mut lib = MaterialLib::new();
        let first = lib.load(&path, "gold").unwrap();
        std::fs::remove_file(&path).unwrap();
        // Cached: the file is gone but the lookup still succeeds
        let second = lib.load(&path, "gold").unwrap();
        assert_eq!(first, second);
        assert_eq!(lib.len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
