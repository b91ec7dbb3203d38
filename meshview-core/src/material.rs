//! Materials and the identity-keyed material library

use crate::color::Color;
use crate::error::{Error, Result};

/// Physically based surface description
#[derive(Debug, Clone, PartialEq)]
pub struct StandardMaterial {
    pub name: String,
    pub color: Color,
    pub metalness: f32,
    pub roughness: f32,
    pub opacity: f32,
    pub wireframe: bool,
}

impl StandardMaterial {
    /// Flat material with the given color, metalness and roughness
    pub fn flat(name: impl Into<String>, color: Color, metalness: f32, roughness: f32) -> Self {
        Self {
            name: name.into(),
            color,
            metalness,
            roughness,
            opacity: 1.0,
            wireframe: false,
        }
    }
}

impl Default for StandardMaterial {
    fn default() -> Self {
        Self::flat("default", Color::WHITE, 0.0, 1.0)
    }
}

/// Debug material that shades surfaces by their normal direction
#[derive(Debug, Clone, PartialEq)]
pub struct NormalMaterial {
    pub opacity: f32,
    pub transparent: bool,
    pub depth_write: bool,
    pub wireframe: bool,
}

impl NormalMaterial {
    /// Semi-transparent variant used for normal inspection: overlapping
    /// surfaces stay visible because depth writes are off.
    pub fn inspection(wireframe: bool) -> Self {
        Self {
            opacity: 0.8,
            transparent: true,
            depth_write: false,
            wireframe,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Material {
    Standard(StandardMaterial),
    Normal(NormalMaterial),
}

impl Material {
    pub fn wireframe(&self) -> bool {
        match self {
            Material::Standard(m) => m.wireframe,
            Material::Normal(m) => m.wireframe,
        }
    }

    pub fn set_wireframe(&mut self, wireframe: bool) {
        match self {
            Material::Standard(m) => m.wireframe = wireframe,
            Material::Normal(m) => m.wireframe = wireframe,
        }
    }

    /// Base color, `None` for debug materials
    pub fn color(&self) -> Option<Color> {
        match self {
            Material::Standard(m) => Some(m.color),
            Material::Normal(_) => None,
        }
    }

    pub fn is_normal_debug(&self) -> bool {
        matches!(self, Material::Normal(_))
    }
}

impl From<StandardMaterial> for Material {
    fn from(m: StandardMaterial) -> Self {
        Material::Standard(m)
    }
}

impl From<NormalMaterial> for Material {
    fn from(m: NormalMaterial) -> Self {
        Material::Normal(m)
    }
}

/// Handle to a material in a [`MaterialLibrary`]. Two meshes share a
/// material exactly when their ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(usize);

impl MaterialId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Append-only arena of materials; removed slots are never reused, so an id
/// keeps its identity for the library's lifetime.
#[derive(Debug, Default)]
pub struct MaterialLibrary {
    slots: Vec<Option<Material>>,
}

impl MaterialLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, material: impl Into<Material>) -> MaterialId {
        self.slots.push(Some(material.into()));
        MaterialId(self.slots.len() - 1)
    }

    pub fn get(&self, id: MaterialId) -> Result<&Material> {
        self.slots
            .get(id.0)
            .and_then(|m| m.as_ref())
            .ok_or(Error::UnknownMaterial(id.0))
    }

    pub fn get_mut(&mut self, id: MaterialId) -> Result<&mut Material> {
        self.slots
            .get_mut(id.0)
            .and_then(|m| m.as_mut())
            .ok_or(Error::UnknownMaterial(id.0))
    }

    pub fn remove(&mut self, id: MaterialId) -> Option<Material> {
        self.slots.get_mut(id.0).and_then(|m| m.take())
    }

    pub fn contains(&self, id: MaterialId) -> bool {
        matches!(self.slots.get(id.0), Some(Some(_)))
    }

    /// Number of live materials
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|m| m.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_identities() {
        let mut lib = MaterialLibrary::new();
        let a = lib.insert(StandardMaterial::default());
        let b = lib.insert(StandardMaterial::default());
        assert_ne!(a, b);
        assert_eq!(lib.get(a).unwrap(), lib.get(b).unwrap());
    }

    #[test]
    fn test_removed_slot_is_not_reused() {
        let mut lib = MaterialLibrary::new();
        let a = lib.insert(NormalMaterial::inspection(false));
        assert!(lib.remove(a).is_some());
        let b = lib.insert(NormalMaterial::inspection(true));
        assert_ne!(a, b);
        assert!(lib.get(a).is_err());
        assert_eq!(lib.len(), 1);
    }

    #[test]
    fn test_wireframe_applies_to_both_kinds() {
        let mut m: Material = StandardMaterial::default().into();
        m.set_wireframe(true);
        assert!(m.wireframe());
        let mut n: Material = NormalMaterial::inspection(false).into();
        n.set_wireframe(true);
        assert!(n.wireframe());
        assert!(n.color().is_none());
    }
}
