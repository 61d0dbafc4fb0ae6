//! Strata Core
//!
//! Archetype-based, schema-on-write entity/component storage:
//! - Generation-tagged entity identifiers with slot recycling
//! - One densely packed table per distinct component set
//! - Cached archetype transitions for add/remove
//! - Type-erased byte columns with typed access through `bytemuck`

pub mod ecs;

pub use bytemuck;
pub use ecs::{
    Component, ComponentId, ComponentLayout, EntityId, Store, StoreConfig, StoreError,
    StoreResult,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
