// index.rs - Entity and component lookup tables
//
// The entity index is the only place that knows which row an entity lives
// in. The component index answers "which column holds component C in
// archetype A" without touching the archetype itself.

use crate::ecs::{ArchetypeId, ComponentId, EntityId, StoreError, StoreResult};
use std::collections::HashMap;

/// Current location of an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Record {
    pub archetype: ArchetypeId,
    pub row: usize,
}

#[derive(Debug, Default)]
pub struct EntityIndex {
    records: HashMap<EntityId, Record>,
}

impl EntityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, entity: EntityId) -> StoreResult<Record> {
        self.records
            .get(&entity)
            .copied()
            .ok_or(StoreError::EntityNotFound { entity })
    }

    /// Make room for one more record so the next `insert` cannot fail.
    pub fn reserve(&mut self) -> StoreResult<()> {
        self.records.try_reserve(1)?;
        Ok(())
    }

    pub fn insert(&mut self, entity: EntityId, record: Record) {
        let previous = self.records.insert(entity, record);
        debug_assert!(previous.is_none(), "entity {entity} indexed twice");
    }

    /// Point an indexed entity at a new location.
    pub fn relocate(&mut self, entity: EntityId, record: Record) {
        let slot = self
            .records
            .get_mut(&entity)
            .expect("relocated entity must be indexed");
        *slot = record;
    }

    pub fn remove(&mut self, entity: EntityId) -> Option<Record> {
        self.records.remove(&entity)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Maps each component to the column it occupies in every archetype that
/// carries it.
#[derive(Debug, Default)]
pub struct ComponentIndex {
    columns: HashMap<ComponentId, HashMap<ArchetypeId, usize>>,
}

impl ComponentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn column_of(&self, component: ComponentId, archetype: ArchetypeId) -> Option<usize> {
        self.columns.get(&component)?.get(&archetype).copied()
    }

    /// Archetypes holding `component`, in no particular order.
    pub fn archetypes_with(&self, component: ComponentId) -> impl Iterator<Item = ArchetypeId> + '_ {
        self.columns
            .get(&component)
            .into_iter()
            .flat_map(|by_archetype| by_archetype.keys().copied())
    }

    /// Reserve space so that `track` for an archetype of this type cannot fail.
    ///
    /// Components seen for the first time get an empty inner map here, which
    /// is harmless if the caller gives up afterwards.
    pub fn reserve(&mut self, components: &[ComponentId]) -> StoreResult<()> {
        self.columns.try_reserve(components.len())?;
        for &component in components {
            self.columns.entry(component).or_default().try_reserve(1)?;
        }
        Ok(())
    }

    /// Register every column of a freshly created archetype.
    pub fn track(&mut self, archetype: ArchetypeId, components: &[ComponentId]) {
        for (column, &component) in components.iter().enumerate() {
            self.columns
                .entry(component)
                .or_default()
                .insert(archetype, column);
        }
    }

    /// Forget every column of an archetype that is going away.
    pub fn untrack(&mut self, archetype: ArchetypeId, components: &[ComponentId]) {
        for component in components {
            if let Some(by_archetype) = self.columns.get_mut(component) {
                by_archetype.remove(&archetype);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archetype(slot: u32) -> ArchetypeId {
        ArchetypeId::from_id(EntityId::new(slot, 0, EntityId::FLAG_ARCHETYPE))
    }

    fn comp(index: u32) -> ComponentId {
        EntityId::new(index, 0, EntityId::FLAG_COMPONENT)
    }

    #[test]
    fn unknown_entity_is_not_found() {
        let index = EntityIndex::new();
        let e = EntityId::new(4, 0, 0);
        assert!(matches!(
            index.get(e),
            Err(StoreError::EntityNotFound { entity }) if entity == e
        ));
    }

    #[test]
    fn relocate_overwrites_record() {
        let mut index = EntityIndex::new();
        let e = EntityId::new(0, 0, 0);
        index.insert(e, Record { archetype: archetype(0), row: 0 });
        index.relocate(e, Record { archetype: archetype(1), row: 3 });
        assert_eq!(index.get(e).unwrap(), Record { archetype: archetype(1), row: 3 });
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn component_index_tracks_columns_per_archetype() {
        let mut index = ComponentIndex::new();
        let ty = [comp(1), comp(2)];
        index.reserve(&ty).unwrap();
        index.track(archetype(1), &ty);
        index.reserve(&ty[1..]).unwrap();
        index.track(archetype(2), &ty[1..]);

        assert_eq!(index.column_of(comp(2), archetype(1)), Some(1));
        assert_eq!(index.column_of(comp(2), archetype(2)), Some(0));
        assert_eq!(index.column_of(comp(1), archetype(2)), None);

        let mut with_two: Vec<_> = index.archetypes_with(comp(2)).collect();
        with_two.sort();
        assert_eq!(with_two, vec![archetype(1), archetype(2)]);

        index.untrack(archetype(1), &ty);
        assert_eq!(index.archetypes_with(comp(1)).count(), 0);
    }

    #[test]
    fn reserve_prepares_maps_for_unseen_components() {
        let mut index = ComponentIndex::new();
        let ty = [comp(3), comp(4)];
        index.reserve(&ty).unwrap();
        for component in ty {
            let by_archetype = index.columns.get(&component).unwrap();
            assert!(by_archetype.is_empty());
            assert!(by_archetype.capacity() >= 1);
        }
        // Nothing is reported until the archetype is tracked.
        assert_eq!(index.archetypes_with(comp(3)).count(), 0);

        index.track(archetype(1), &ty);
        assert_eq!(index.column_of(comp(4), archetype(1)), Some(1));
    }
}
