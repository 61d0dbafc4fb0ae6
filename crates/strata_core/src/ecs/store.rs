// store.rs - The archetype store: entity lifecycle and component transitions

use crate::ecs::allocator::{IdAllocator, Release};
use crate::ecs::archetype::{self, Transition};
use crate::ecs::archetypes::Archetypes;
use crate::ecs::index::{ComponentIndex, EntityIndex, Record};
use crate::ecs::{
    Archetype, ArchetypeId, Component, ComponentId, ComponentInfo, ComponentLayout,
    ComponentRegistry, EntityId, StoreConfig, StoreError, StoreResult,
};
use tracing::{debug, trace, warn};

/// Counters describing how the archetype graph has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Transitions answered from an archetype's edge cache.
    pub edge_hits: u64,
    /// Transitions that had to compute the target type.
    pub edge_misses: u64,
    pub archetypes_created: u64,
    pub archetypes_swept: u64,
    /// Rows moved between archetypes by add/remove.
    pub rows_moved: u64,
}

/// Archetype-based entity/component store.
///
/// Entities start in the empty-type archetype and move between tables as
/// components are added and removed. Component data is stored as raw bytes
/// in one column per component per archetype.
///
/// The store is single-writer: every method runs to completion and there is
/// no internal locking. Wrap it in a lock to share it between threads.
///
/// # Example
/// ```
/// use strata_core::ecs::Store;
///
/// let mut store = Store::new()?;
/// let position = store.register_component("Position", 8)?;
/// let e = store.create_entity()?;
/// store.add_component(e, position)?;
/// store.set_component(e, position, &[1, 2, 3, 4, 5, 6, 7, 8])?;
/// assert_eq!(store.get_component(e, position)?, &[1, 2, 3, 4, 5, 6, 7, 8]);
/// # Ok::<(), strata_core::ecs::StoreError>(())
/// ```
pub struct Store {
    config: StoreConfig,
    ids: IdAllocator,
    entities: EntityIndex,
    archetypes: Archetypes,
    columns: ComponentIndex,
    registry: ComponentRegistry,
    stats: StoreStats,
}

impl Store {
    /// Create a store with default settings.
    pub fn new() -> StoreResult<Self> {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let mut store = Self {
            ids: IdAllocator::new(config.generation_overflow),
            entities: EntityIndex::new(),
            archetypes: Archetypes::new(&config)?,
            columns: ComponentIndex::new(),
            registry: ComponentRegistry::new(),
            stats: StoreStats::default(),
            config,
        };
        store.bootstrap()?;
        debug!(config = ?store.config, "store initialized");
        Ok(store)
    }

    /// Register the metadata component through itself.
    ///
    /// It must be the first id issued; its layout is a constant, so the
    /// usual lookup through the metadata component is skipped for it alone.
    fn bootstrap(&mut self) -> StoreResult<()> {
        let info = self.spawn(EntityId::FLAG_COMPONENT)?;
        assert_eq!(info, ComponentInfo::ID, "metadata component must be the first id issued");

        self.registry.reserve()?;
        self.registry.insert(ComponentInfo::NAME, info);
        self.attach(info, info)?;
        self.write_info(info, ComponentInfo::LAYOUT)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn stats(&self) -> StoreStats {
        self.stats
    }

    // ------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------

    /// Register a byte-defined component with alignment 1.
    pub fn register_component(&mut self, name: &str, size: usize) -> StoreResult<ComponentId> {
        self.register_component_with_layout(name, ComponentLayout { size, align: 1 })
    }

    /// Register a component with an explicit layout.
    ///
    /// Registering a name again with the same layout returns the existing id;
    /// a different layout is rejected with `DuplicateRegistration`.
    pub fn register_component_with_layout(
        &mut self,
        name: &str,
        layout: ComponentLayout,
    ) -> StoreResult<ComponentId> {
        let layout = layout.validate(name)?;

        if let Some(existing) = self.registry.id_of(name) {
            let current = self.layout_of(existing)?;
            if current == layout {
                return Ok(existing);
            }
            return Err(StoreError::DuplicateRegistration {
                name: name.to_owned(),
                existing,
                size: current.size,
            });
        }

        self.registry.reserve()?;
        let component = self.spawn(EntityId::FLAG_COMPONENT)?;
        if let Err(err) = self.attach(component, ComponentInfo::ID) {
            self.discard(component);
            return Err(err);
        }
        self.write_info(component, layout)?;
        self.registry.insert(name, component);

        debug!(%component, name, size = layout.size, align = layout.align, "registered component");
        Ok(component)
    }

    /// Register a Rust type as a component under `T::NAME`.
    pub fn register<T: Component>(&mut self) -> StoreResult<ComponentId> {
        self.register_component_with_layout(T::NAME, ComponentLayout::of::<T>())
    }

    /// Look up a component by registration name.
    pub fn component_id(&self, name: &str) -> Option<ComponentId> {
        self.registry.id_of(name)
    }

    pub fn id_of<T: Component>(&self) -> Option<ComponentId> {
        self.registry.id_of(T::NAME)
    }

    pub fn component_name(&self, component: ComponentId) -> Option<&str> {
        self.registry.name_of(component)
    }

    /// Size and alignment recorded for a registered component.
    pub fn component_layout(&self, component: ComponentId) -> StoreResult<ComponentLayout> {
        self.layout_of(component)
    }

    /// Registered components and their names, in no particular order.
    pub fn components(&self) -> impl Iterator<Item = (&str, ComponentId)> {
        self.registry.iter()
    }

    fn layout_of(&self, component: ComponentId) -> StoreResult<ComponentLayout> {
        if component == ComponentInfo::ID {
            return Ok(ComponentInfo::LAYOUT);
        }
        if !self.registry.contains(component) {
            return Err(StoreError::UnknownComponent { component });
        }
        let bytes = self.get_component(component, ComponentInfo::ID)?;
        Ok(bytemuck::pod_read_unaligned::<ComponentInfo>(bytes).layout())
    }

    fn write_info(&mut self, component: ComponentId, layout: ComponentLayout) -> StoreResult<()> {
        let info = ComponentInfo::from_layout(layout);
        self.slot_mut(component, ComponentInfo::ID)?
            .copy_from_slice(bytemuck::bytes_of(&info));
        Ok(())
    }

    fn is_protected(&self, entity: EntityId, component: ComponentId) -> bool {
        component == ComponentInfo::ID && self.registry.contains(entity)
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    /// Create an entity with no components.
    pub fn create_entity(&mut self) -> StoreResult<EntityId> {
        let entity = self.spawn(EntityId::FLAG_NONE)?;
        trace!(%entity, "created entity");
        Ok(entity)
    }

    fn spawn(&mut self, flags: u16) -> StoreResult<EntityId> {
        let root = self.archetypes.root();
        self.entities.reserve()?;
        self.table_mut(root).reserve_row()?;

        let entity = self.ids.create(flags)?;
        let row = self.table_mut(root).push_zeroed(entity)?;
        self.entities.insert(entity, Record { archetype: root, row });
        Ok(entity)
    }

    /// Destroy an entity and recycle its slot.
    ///
    /// Component identities cannot be destroyed.
    pub fn destroy_entity(&mut self, entity: EntityId) -> StoreResult<()> {
        let record = self.record(entity)?;
        if self.registry.contains(entity) {
            return Err(StoreError::ProtectedEntity { entity });
        }
        self.discard(entity);
        trace!(%entity, archetype = %record.archetype, "destroyed entity");
        Ok(())
    }

    /// Detach a live entity from its table and release its id.
    fn discard(&mut self, entity: EntityId) {
        let Some(record) = self.entities.remove(entity) else {
            return;
        };
        if let Some(displaced) = self.table_mut(record.archetype).swap_remove(record.row) {
            self.entities.relocate(displaced, record);
        }
        match self.ids.release(entity) {
            Ok(Release::Recycled(next)) => {
                trace!(%entity, %next, "slot recycled");
            }
            Ok(Release::Retired) => {
                warn!(%entity, retired = self.ids.retired(), "generation exhausted; slot retired");
            }
            Err(err) => {
                debug_assert!(false, "indexed entity {entity} was not live: {err}");
            }
        }
        debug_assert_eq!(
            self.ids.live(),
            self.entities.len(),
            "id allocator and entity index diverged"
        );
    }

    /// Whether `entity` currently addresses a live entity.
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.ids.is_live(entity)
    }

    /// Number of live entities, component identities included.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    fn record(&self, entity: EntityId) -> StoreResult<Record> {
        if !self.ids.is_live(entity) {
            return Err(StoreError::EntityNotFound { entity });
        }
        self.entities.get(entity)
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Add `component` to `entity`, moving it to the matching archetype.
    ///
    /// The new value is zero-filled. Adding a component the entity already
    /// carries does nothing.
    pub fn add_component(&mut self, entity: EntityId, component: ComponentId) -> StoreResult<()> {
        self.record(entity)?;
        self.layout_of(component)?;
        self.attach(entity, component)
    }

    fn attach(&mut self, entity: EntityId, component: ComponentId) -> StoreResult<()> {
        let record = self.record(entity)?;
        if self.table(record.archetype).contains(component) {
            return Ok(());
        }
        let target = self.transition(record.archetype, component, Transition::Add)?;
        self.relocate(entity, record, target)
    }

    /// Remove `component` from `entity`, moving it to the matching archetype.
    pub fn remove_component(
        &mut self,
        entity: EntityId,
        component: ComponentId,
    ) -> StoreResult<()> {
        let record = self.record(entity)?;
        if !self.registry.contains(component) {
            return Err(StoreError::UnknownComponent { component });
        }
        if self.is_protected(entity, component) {
            return Err(StoreError::ProtectedEntity { entity });
        }
        if !self.table(record.archetype).contains(component) {
            return Err(StoreError::ComponentNotFound { entity, component });
        }
        let target = self.transition(record.archetype, component, Transition::Remove)?;
        self.relocate(entity, record, target)
    }

    /// Resolve the archetype reached from `source` by one transition.
    ///
    /// Cached edges answer directly; otherwise the target type is computed,
    /// created if unseen, and the edge is recorded in both directions.
    fn transition(
        &mut self,
        source: ArchetypeId,
        component: ComponentId,
        transition: Transition,
    ) -> StoreResult<ArchetypeId> {
        let table = self.table(source);
        if let Some(target) = table.edge_target(component, transition) {
            self.stats.edge_hits += 1;
            trace!(%source, %target, %component, ?transition, "edge cache hit");
            return Ok(target);
        }

        let mut components = Vec::new();
        components.try_reserve_exact(table.components().len() + 1)?;
        components.extend_from_slice(table.components());
        match (transition, components.binary_search(&component)) {
            (Transition::Add, Err(at)) => components.insert(at, component),
            (Transition::Remove, Ok(at)) => {
                components.remove(at);
            }
            _ => unreachable!("{transition:?} of {component} leaves {source} unchanged"),
        }

        let target = match self.archetypes.lookup(&components) {
            Some(target) => target,
            None => self.create_archetype(&components)?,
        };
        self.archetypes.link(source, component, transition, target)?;

        self.stats.edge_misses += 1;
        trace!(%source, %target, %component, ?transition, "edge cache miss");
        Ok(target)
    }

    fn create_archetype(&mut self, components: &[ComponentId]) -> StoreResult<ArchetypeId> {
        let mut layouts = Vec::new();
        layouts.try_reserve_exact(components.len())?;
        for &component in components {
            layouts.push(self.layout_of(component)?);
        }

        self.columns.reserve(components)?;
        let archetype = self.archetypes.insert(components, &layouts)?;
        self.columns.track(archetype, components);

        self.stats.archetypes_created += 1;
        debug!(%archetype, ?components, "created archetype");
        Ok(archetype)
    }

    /// Move `entity` from its current row into a new row of `target`.
    fn relocate(&mut self, entity: EntityId, from: Record, target: ArchetypeId) -> StoreResult<()> {
        let (src, dst) = self
            .archetypes
            .pair_mut(from.archetype, target)
            .expect("transition target is a distinct live archetype");
        let moved = archetype::move_row(src, dst, from.row)?;
        let emptied = src.is_empty();

        if let Some(displaced) = moved.displaced {
            self.entities.relocate(displaced, from);
        }
        self.entities.relocate(
            entity,
            Record {
                archetype: target,
                row: moved.row,
            },
        );
        self.stats.rows_moved += 1;

        trace!(%entity, from = %from.archetype, to = %target, row = moved.row, "moved entity");
        if emptied && from.archetype != self.archetypes.root() {
            trace!(archetype = %from.archetype, "archetype emptied; kept until compaction");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Access
    // ------------------------------------------------------------------

    /// Bytes of `component` on `entity`.
    pub fn get_component(&self, entity: EntityId, component: ComponentId) -> StoreResult<&[u8]> {
        let record = self.record(entity)?;
        let column = self
            .columns
            .column_of(component, record.archetype)
            .ok_or(StoreError::ComponentNotFound { entity, component })?;
        Ok(self
            .table(record.archetype)
            .column(column)
            .and_then(|column| column.get(record.row))
            .expect("indexed column holds every row of its archetype"))
    }

    /// Mutable bytes of `component` on `entity`.
    ///
    /// A component identity's metadata cannot be borrowed mutably.
    pub fn get_component_mut(
        &mut self,
        entity: EntityId,
        component: ComponentId,
    ) -> StoreResult<&mut [u8]> {
        if self.is_protected(entity, component) {
            return Err(StoreError::ProtectedEntity { entity });
        }
        self.slot_mut(entity, component)
    }

    fn slot_mut(&mut self, entity: EntityId, component: ComponentId) -> StoreResult<&mut [u8]> {
        let record = self.record(entity)?;
        let column = self
            .columns
            .column_of(component, record.archetype)
            .ok_or(StoreError::ComponentNotFound { entity, component })?;
        Ok(self
            .table_mut(record.archetype)
            .column_mut(column)
            .and_then(|column| column.get_mut(record.row))
            .expect("indexed column holds every row of its archetype"))
    }

    /// Overwrite `component` on `entity` with `bytes`.
    ///
    /// `bytes` must be exactly the registered size.
    pub fn set_component(
        &mut self,
        entity: EntityId,
        component: ComponentId,
        bytes: &[u8],
    ) -> StoreResult<()> {
        let slot = self.get_component_mut(entity, component)?;
        if slot.len() != bytes.len() {
            return Err(StoreError::InvalidComponent {
                component,
                expected: slot.len(),
                actual: bytes.len(),
            });
        }
        slot.copy_from_slice(bytes);
        Ok(())
    }

    pub fn has_component(&self, entity: EntityId, component: ComponentId) -> StoreResult<bool> {
        let record = self.record(entity)?;
        Ok(self.columns.column_of(component, record.archetype).is_some())
    }

    // ------------------------------------------------------------------
    // Typed access
    // ------------------------------------------------------------------

    fn typed_id<T: Component>(&self) -> StoreResult<ComponentId> {
        let component = self
            .id_of::<T>()
            .ok_or_else(|| StoreError::UnknownComponentName {
                name: T::NAME.to_owned(),
            })?;
        let layout = self.layout_of(component)?;
        if layout != ComponentLayout::of::<T>() {
            return Err(StoreError::InvalidComponent {
                component,
                expected: layout.size,
                actual: std::mem::size_of::<T>(),
            });
        }
        Ok(component)
    }

    pub fn get<T: Component>(&self, entity: EntityId) -> StoreResult<&T> {
        let component = self.typed_id::<T>()?;
        let bytes = self.get_component(entity, component)?;
        bytemuck::try_from_bytes(bytes).map_err(|_| StoreError::InvalidComponent {
            component,
            expected: bytes.len(),
            actual: std::mem::size_of::<T>(),
        })
    }

    pub fn get_mut<T: Component>(&mut self, entity: EntityId) -> StoreResult<&mut T> {
        let component = self.typed_id::<T>()?;
        let bytes = self.get_component_mut(entity, component)?;
        let expected = bytes.len();
        bytemuck::try_from_bytes_mut(bytes).map_err(|_| StoreError::InvalidComponent {
            component,
            expected,
            actual: std::mem::size_of::<T>(),
        })
    }

    /// Overwrite an existing typed component.
    pub fn set<T: Component>(&mut self, entity: EntityId, value: T) -> StoreResult<()> {
        let component = self.typed_id::<T>()?;
        self.set_component(entity, component, bytemuck::bytes_of(&value))
    }

    /// Add a typed component if missing, then set its value.
    pub fn insert<T: Component>(&mut self, entity: EntityId, value: T) -> StoreResult<()> {
        let component = self.typed_id::<T>()?;
        self.add_component(entity, component)?;
        self.set_component(entity, component, bytemuck::bytes_of(&value))
    }

    // ------------------------------------------------------------------
    // Archetypes
    // ------------------------------------------------------------------

    /// The archetype with no components, where every entity starts.
    pub fn empty_archetype(&self) -> ArchetypeId {
        self.archetypes.root()
    }

    pub fn archetype_of(&self, entity: EntityId) -> StoreResult<ArchetypeId> {
        Ok(self.record(entity)?.archetype)
    }

    pub fn archetype(&self, archetype: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(archetype)
    }

    pub fn archetypes(&self) -> impl Iterator<Item = &Archetype> {
        self.archetypes.iter()
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Archetypes carrying `component`, in no particular order.
    pub fn archetypes_with(&self, component: ComponentId) -> impl Iterator<Item = ArchetypeId> + '_ {
        self.columns.archetypes_with(component)
    }

    /// Contiguous bytes of one component across every row of an archetype.
    pub fn column(&self, archetype: ArchetypeId, component: ComponentId) -> Option<&[u8]> {
        let index = self.columns.column_of(component, archetype)?;
        Some(self.archetypes.get(archetype)?.column(index)?.as_bytes())
    }

    /// Free every empty archetype except the empty-type root.
    ///
    /// Edges pointing at a swept archetype are evicted from its neighbours
    /// before it is released, so later transitions recompute and recreate
    /// it on demand. Returns the number of archetypes swept.
    pub fn compact(&mut self) -> usize {
        let root = self.archetypes.root();
        let doomed: Vec<ArchetypeId> = self
            .archetypes
            .iter()
            .filter(|table| table.is_empty() && table.id() != root)
            .map(Archetype::id)
            .collect();

        for &archetype in &doomed {
            if let Some(table) = self.archetypes.remove(archetype) {
                self.columns.untrack(archetype, table.components());
            }
        }

        self.stats.archetypes_swept += doomed.len() as u64;
        debug!(swept = doomed.len(), remaining = self.archetypes.len(), "compacted archetypes");
        doomed.len()
    }

    #[inline]
    fn table(&self, archetype: ArchetypeId) -> &Archetype {
        self.archetypes
            .get(archetype)
            .expect("records only reference live archetypes")
    }

    #[inline]
    fn table_mut(&mut self, archetype: ArchetypeId) -> &mut Archetype {
        self.archetypes
            .get_mut(archetype)
            .expect("records only reference live archetypes")
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("entities", &self.entities.len())
            .field("components", &self.registry.len())
            .field("archetypes", &self.archetypes.len())
            .field("stats", &self.stats)
            .finish()
    }
}
