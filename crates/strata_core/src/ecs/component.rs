// component.rs - Runtime component registration
//
// Components are identified by entity ids, not Rust TypeIds. Each component
// is itself an entity carrying a `ComponentInfo` value, so byte-defined
// components from outside Rust coexist with typed ones.

use crate::ecs::{ComponentId, EntityId, StoreError, StoreResult};
use bytemuck::{Pod, Zeroable};
use std::collections::HashMap;
use std::mem::{align_of, size_of};

/// Memory layout of one component value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComponentLayout {
    pub size: usize,
    pub align: usize,
}

impl ComponentLayout {
    pub const fn of<T>() -> Self {
        Self {
            size: size_of::<T>(),
            align: align_of::<T>(),
        }
    }

    /// Check the layout rules every column relies on.
    pub fn validate(self, name: &str) -> StoreResult<Self> {
        if !self.align.is_power_of_two() || self.size % self.align != 0 {
            return Err(StoreError::InvalidLayout {
                name: name.to_owned(),
                size: self.size,
                align: self.align,
            });
        }
        Ok(self)
    }
}

/// Metadata stored on every component entity.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct ComponentInfo {
    pub size: u64,
    pub align: u64,
}

impl ComponentInfo {
    /// Id of the metadata component itself: the first id ever issued.
    pub const ID: ComponentId = EntityId::new(0, 0, EntityId::FLAG_COMPONENT);
    pub const LAYOUT: ComponentLayout = ComponentLayout::of::<ComponentInfo>();

    pub fn from_layout(layout: ComponentLayout) -> Self {
        Self {
            size: layout.size as u64,
            align: layout.align as u64,
        }
    }

    pub fn layout(&self) -> ComponentLayout {
        ComponentLayout {
            size: self.size as usize,
            align: self.align as usize,
        }
    }
}

impl Component for ComponentInfo {
    const NAME: &'static str = "ComponentInfo";
}

/// Trait for Rust-defined POD components.
///
/// The store derives size and alignment from the type and moves values as
/// raw bytes, so implementors must be plain old data.
///
/// # Example
/// ```ignore
/// #[repr(C)]
/// #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
/// struct Position { x: f32, y: f32 }
///
/// impl Component for Position {
///     const NAME: &'static str = "Position";
/// }
/// ```
pub trait Component: Pod {
    /// Registration name; also the key for `Store::component_id`.
    const NAME: &'static str;
}

/// Name lookup for registered components.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    by_name: HashMap<String, ComponentId>,
    names: HashMap<ComponentId, String>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn id_of(&self, name: &str) -> Option<ComponentId> {
        self.by_name.get(name).copied()
    }

    #[inline]
    pub fn name_of(&self, component: ComponentId) -> Option<&str> {
        self.names.get(&component).map(String::as_str)
    }

    #[inline]
    pub fn contains(&self, component: ComponentId) -> bool {
        self.names.contains_key(&component)
    }

    /// Make room for one more registration so `insert` cannot fail.
    pub fn reserve(&mut self) -> StoreResult<()> {
        self.by_name.try_reserve(1)?;
        self.names.try_reserve(1)?;
        Ok(())
    }

    pub fn insert(&mut self, name: &str, component: ComponentId) {
        debug_assert!(component.is_component(), "{component} lacks the component flag");
        self.by_name.insert(name.to_owned(), component);
        self.names.insert(component, name.to_owned());
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ComponentId)> {
        self.by_name.iter().map(|(name, &id)| (name.as_str(), id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_layout_is_fixed() {
        assert_eq!(ComponentInfo::LAYOUT, ComponentLayout { size: 16, align: 8 });
        assert_eq!(ComponentInfo::ID.index(), 0);
        assert!(ComponentInfo::ID.is_component());
    }

    #[test]
    fn layout_validation() {
        assert!(ComponentLayout { size: 12, align: 4 }.validate("ok").is_ok());
        assert!(ComponentLayout { size: 0, align: 1 }.validate("tag").is_ok());
        assert!(matches!(
            ComponentLayout { size: 6, align: 4 }.validate("odd"),
            Err(StoreError::InvalidLayout { size: 6, align: 4, .. })
        ));
        assert!(ComponentLayout { size: 6, align: 3 }.validate("npot").is_err());
    }

    #[test]
    fn registry_maps_both_ways() {
        let mut registry = ComponentRegistry::new();
        let id = EntityId::new(5, 0, EntityId::FLAG_COMPONENT);
        registry.reserve().unwrap();
        registry.insert("Position", id);
        assert_eq!(registry.id_of("Position"), Some(id));
        assert_eq!(registry.name_of(id), Some("Position"));
        assert!(registry.contains(id));
        assert_eq!(registry.id_of("Velocity"), None);
    }
}
