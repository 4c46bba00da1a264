//! Glint Core - geometry and material storage.
//!
//! This crate provides:
//!
//! - **Geometry store**: `Object` and `Face`, loaded from OBJ text
//! - **Material table**: `MaterialLib`, an explicit cache of MTL files keyed
//!   by (path, material name)
//!
//! # Example
//!
//! ```ignore
//! use glint_core::{load_obj, MaterialLib};
//!
//! let mut materials = MaterialLib::new();
//! let object = load_obj("bunny.obj", &mut materials)?;
//! println!("{} faces, {} materials", object.face_count(), materials.len());
//! ```

pub mod material;
pub mod obj;
pub mod object;

// Re-export commonly used types
pub use material::{Material, MaterialId, MaterialLib};
pub use obj::{load_obj, parse_obj, LoadError, LoadResult, ParseStats};
pub use object::{BuildTriangle, Face, Object};
