//! Archetype-based entity/component storage.
//!
//! Entities that share an identical set of component types live in one
//! archetype table, so iterating a component is a contiguous scan. Tables
//! are connected by a cache of add/remove transitions, entities are
//! addressed through generation-tagged ids, and component data is held in
//! type-erased byte columns.
//!
//! Components are entities too: registering one issues an id and stores
//! its layout as a `ComponentInfo` value on that id.

mod allocator;
mod archetype;
mod archetypes;
mod component;
mod config;
mod entity;
mod error;
mod index;
pub mod storage;
mod store;

pub use archetype::{Archetype, ArchetypeEdge, ArchetypeId, Transition};
pub use component::{Component, ComponentInfo, ComponentLayout};
pub(crate) use component::ComponentRegistry;
pub use config::{GenerationOverflow, StoreConfig};
pub use entity::{ComponentId, EntityId, Generation};
pub use error::{StoreError, StoreResult};
pub use store::{Store, StoreStats};
