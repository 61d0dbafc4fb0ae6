// archetypes.rs - Canonical archetype index and table arena
//
// Tables live in an arena addressed by generation-tagged handles. The type
// index maps each canonical component list to exactly one table.

use crate::ecs::allocator::IdAllocator;
use crate::ecs::{
    Archetype, ArchetypeId, ComponentId, ComponentLayout, EntityId, StoreConfig, StoreResult,
    Transition,
};
use std::collections::HashMap;

pub struct Archetypes {
    ids: IdAllocator,
    tables: Vec<Option<Archetype>>,
    by_type: HashMap<Box<[ComponentId]>, ArchetypeId>,
    root: ArchetypeId,
    initial_capacity: usize,
}

impl Archetypes {
    /// Create the index holding only the empty-type archetype.
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        let mut archetypes = Self {
            ids: IdAllocator::new(config.generation_overflow),
            tables: Vec::new(),
            by_type: HashMap::new(),
            root: ArchetypeId::from_id(EntityId::new(0, 0, EntityId::FLAG_ARCHETYPE)),
            initial_capacity: config.initial_column_capacity,
        };
        archetypes.root = archetypes.insert(&[], &[])?;
        Ok(archetypes)
    }

    /// The archetype with no components, where new entities start.
    #[inline]
    pub fn root(&self) -> ArchetypeId {
        self.root
    }

    #[inline]
    pub fn get(&self, id: ArchetypeId) -> Option<&Archetype> {
        if !self.ids.is_live(id.id()) {
            return None;
        }
        self.tables.get(id.index() as usize)?.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, id: ArchetypeId) -> Option<&mut Archetype> {
        if !self.ids.is_live(id.id()) {
            return None;
        }
        self.tables.get_mut(id.index() as usize)?.as_mut()
    }

    /// Borrow two distinct tables mutably at once.
    pub fn pair_mut(
        &mut self,
        a: ArchetypeId,
        b: ArchetypeId,
    ) -> Option<(&mut Archetype, &mut Archetype)> {
        if a == b || !self.ids.is_live(a.id()) || !self.ids.is_live(b.id()) {
            return None;
        }
        let (ia, ib) = (a.index() as usize, b.index() as usize);
        if ia.max(ib) >= self.tables.len() {
            return None;
        }
        let (lo, hi) = self.tables.split_at_mut(ia.max(ib));
        let (low, high) = (lo[ia.min(ib)].as_mut()?, hi[0].as_mut()?);
        if ia < ib {
            Some((low, high))
        } else {
            Some((high, low))
        }
    }

    /// Find the table for a canonical type.
    #[inline]
    pub fn lookup(&self, components: &[ComponentId]) -> Option<ArchetypeId> {
        self.by_type.get(components).copied()
    }

    /// Create the table for a canonical type not yet present.
    ///
    /// The index and the table each key on their own copy of `components`.
    /// On failure nothing is inserted.
    pub fn insert(
        &mut self,
        components: &[ComponentId],
        layouts: &[ComponentLayout],
    ) -> StoreResult<ArchetypeId> {
        debug_assert!(self.lookup(components).is_none(), "archetype already indexed");

        let key = boxed_copy(components)?;
        let ty = boxed_copy(components)?;
        self.by_type.try_reserve(1)?;
        self.tables.try_reserve(1)?;

        let id = ArchetypeId::from_id(self.ids.create(EntityId::FLAG_ARCHETYPE)?);
        let table = match Archetype::new(id, ty, layouts, self.initial_capacity) {
            Ok(table) => table,
            Err(err) => {
                // The handle was issued just above.
                let _ = self.ids.release(id.id());
                return Err(err.into());
            }
        };

        let slot = id.index() as usize;
        if slot == self.tables.len() {
            self.tables.push(Some(table));
        } else {
            debug_assert!(self.tables[slot].is_none(), "recycled table slot still occupied");
            self.tables[slot] = Some(table);
        }
        self.by_type.insert(key, id);
        Ok(id)
    }

    /// Cache a transition in both directions.
    ///
    /// `source` gains `transition` on `component` towards `target`, and
    /// `target` gains the inverse back to `source`.
    pub fn link(
        &mut self,
        source: ArchetypeId,
        component: ComponentId,
        transition: Transition,
        target: ArchetypeId,
    ) -> StoreResult<()> {
        let (from, to) = self
            .pair_mut(source, target)
            .expect("linked archetypes must be live and distinct");
        from.reserve_edge()?;
        to.reserve_edge()?;
        from.set_edge(component, transition, target);
        to.set_edge(component, transition.inverse(), source);
        Ok(())
    }

    /// Remove an empty, non-root table.
    ///
    /// Every edge that targets it is evicted from its neighbours first, so no
    /// cached transition can reach the recycled handle.
    pub fn remove(&mut self, id: ArchetypeId) -> Option<Archetype> {
        if id == self.root || !self.ids.is_live(id.id()) {
            return None;
        }
        let table = self.tables.get_mut(id.index() as usize)?.take()?;
        assert!(table.is_empty(), "removed archetype {id} still holds rows");

        for (component, edge) in table.edges() {
            if let Some(neighbour) = edge.add.and_then(|n| self.get_mut(n)) {
                neighbour.evict_edge(component, Transition::Remove, id);
            }
            if let Some(neighbour) = edge.remove.and_then(|n| self.get_mut(n)) {
                neighbour.evict_edge(component, Transition::Add, id);
            }
        }

        self.by_type.remove(table.components());
        // The handle was checked live above.
        let _ = self.ids.release(id.id());
        Some(table)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Archetype> {
        self.tables.iter().flatten()
    }

    /// Number of live tables, the root included.
    pub fn len(&self) -> usize {
        self.by_type.len()
    }
}

fn boxed_copy(components: &[ComponentId]) -> StoreResult<Box<[ComponentId]>> {
    let mut copy = Vec::new();
    copy.try_reserve_exact(components.len())?;
    copy.extend_from_slice(components);
    Ok(copy.into_boxed_slice())
}
