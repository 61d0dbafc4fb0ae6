// archetype.rs - Archetype tables and the row move protocol
//
// An archetype is a unique set of component types. Entities with the same
// component types share one table whose columns are index-aligned with the
// sorted component list, and whose rows are index-aligned with `entities`.

use crate::ecs::storage::{Column, ColumnError};
use crate::ecs::{ComponentId, ComponentLayout, EntityId, StoreResult};
use std::collections::HashMap;
use std::fmt;

/// Stable handle to an archetype table.
///
/// Handles share the entity id layout (slot, generation, flags) and are
/// issued by a dedicated allocator, so a recycled table slot never matches a
/// handle to the table it replaced.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ArchetypeId(EntityId);

impl ArchetypeId {
    #[inline]
    pub(crate) const fn from_id(id: EntityId) -> Self {
        Self(id)
    }

    #[inline]
    pub(crate) const fn id(self) -> EntityId {
        self.0
    }

    /// Arena slot of this archetype.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0.index()
    }

    #[inline]
    pub const fn to_bits(self) -> u64 {
        self.0.to_bits()
    }
}

impl fmt::Debug for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}v{}", self.0.index(), self.0.generation())
    }
}

impl fmt::Display for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Direction of an archetype transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Add,
    Remove,
}

impl Transition {
    #[inline]
    pub fn inverse(self) -> Self {
        match self {
            Transition::Add => Transition::Remove,
            Transition::Remove => Transition::Add,
        }
    }
}

/// Cached neighbours of an archetype for one component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArchetypeEdge {
    /// Archetype reached by adding the component.
    pub add: Option<ArchetypeId>,
    /// Archetype reached by removing the component.
    pub remove: Option<ArchetypeId>,
}

impl ArchetypeEdge {
    #[inline]
    pub fn target(&self, transition: Transition) -> Option<ArchetypeId> {
        match transition {
            Transition::Add => self.add,
            Transition::Remove => self.remove,
        }
    }

    #[inline]
    fn slot_mut(&mut self, transition: Transition) -> &mut Option<ArchetypeId> {
        match transition {
            Transition::Add => &mut self.add,
            Transition::Remove => &mut self.remove,
        }
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.add.is_none() && self.remove.is_none()
    }
}

/// Storage for all entities of a single archetype.
pub struct Archetype {
    id: ArchetypeId,
    components: Box<[ComponentId]>,
    columns: Vec<Column>,
    entities: Vec<EntityId>,
    edges: HashMap<ComponentId, ArchetypeEdge>,
}

impl Archetype {
    /// Create an empty table for a canonical (sorted, duplicate-free) type.
    ///
    /// Columns allocate nothing until the first row arrives.
    pub(crate) fn new(
        id: ArchetypeId,
        components: Box<[ComponentId]>,
        layouts: &[ComponentLayout],
        initial_capacity: usize,
    ) -> Result<Self, ColumnError> {
        assert!(
            components.windows(2).all(|w| w[0] < w[1]),
            "archetype type must be sorted and duplicate-free"
        );
        assert_eq!(components.len(), layouts.len(), "one layout per component");

        let mut columns = Vec::new();
        columns.try_reserve_exact(layouts.len())?;
        for layout in layouts {
            columns.push(Column::new(layout.size, layout.align, initial_capacity));
        }

        Ok(Self {
            id,
            components,
            columns,
            entities: Vec::new(),
            edges: HashMap::new(),
        })
    }

    #[inline]
    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    /// The canonical component type of this table.
    #[inline]
    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }

    /// Entities in row order.
    #[inline]
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[inline]
    pub fn contains(&self, component: ComponentId) -> bool {
        self.column_index(component).is_some()
    }

    #[inline]
    pub fn column_index(&self, component: ComponentId) -> Option<usize> {
        self.components.binary_search(&component).ok()
    }

    #[inline]
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    #[inline]
    pub(crate) fn column_mut(&mut self, index: usize) -> Option<&mut Column> {
        self.columns.get_mut(index)
    }

    /// Cached neighbours for `component`, if any transition was recorded.
    #[inline]
    pub fn edge(&self, component: ComponentId) -> Option<&ArchetypeEdge> {
        self.edges.get(&component)
    }

    pub fn edges(&self) -> impl Iterator<Item = (ComponentId, ArchetypeEdge)> + '_ {
        self.edges.iter().map(|(&c, &e)| (c, e))
    }

    #[inline]
    pub(crate) fn edge_target(
        &self,
        component: ComponentId,
        transition: Transition,
    ) -> Option<ArchetypeId> {
        self.edges.get(&component)?.target(transition)
    }

    /// Make sure one more edge entry can be recorded without allocating.
    pub(crate) fn reserve_edge(&mut self) -> StoreResult<()> {
        self.edges.try_reserve(1)?;
        Ok(())
    }

    /// Record a transition. Call `reserve_edge` first when the entry may be new.
    pub(crate) fn set_edge(
        &mut self,
        component: ComponentId,
        transition: Transition,
        target: ArchetypeId,
    ) {
        *self.edges.entry(component).or_default().slot_mut(transition) = Some(target);
    }

    /// Forget a transition if it still points at `target`.
    pub(crate) fn evict_edge(
        &mut self,
        component: ComponentId,
        transition: Transition,
        target: ArchetypeId,
    ) {
        if let Some(edge) = self.edges.get_mut(&component) {
            let slot = edge.slot_mut(transition);
            if *slot == Some(target) {
                *slot = None;
            }
            if edge.is_empty() {
                self.edges.remove(&component);
            }
        }
    }

    /// Ensure one more row fits in every column and in the entity list.
    ///
    /// On failure nothing observable changes.
    pub(crate) fn reserve_row(&mut self) -> Result<(), ColumnError> {
        for column in &mut self.columns {
            column.reserve(1)?;
        }
        self.entities.try_reserve(1)?;
        Ok(())
    }

    /// Append `entity` with every component zero-filled.
    pub(crate) fn push_zeroed(&mut self, entity: EntityId) -> Result<usize, ColumnError> {
        self.reserve_row()?;
        for column in &mut self.columns {
            column.push_zeroed()?;
        }
        self.entities.push(entity);
        self.debug_check();
        Ok(self.entities.len() - 1)
    }

    /// Remove `row` by swapping the last row into it.
    ///
    /// Returns the entity that now occupies `row`, if one was moved.
    pub(crate) fn swap_remove(&mut self, row: usize) -> Option<EntityId> {
        for column in &mut self.columns {
            column.swap_remove(row);
        }
        self.entities.swap_remove(row);
        self.debug_check();
        self.entities.get(row).copied()
    }

    #[inline]
    fn debug_check(&self) {
        debug_assert!(
            self.columns.iter().all(|c| c.len() == self.entities.len()),
            "column row count diverged from entity list in {:?}",
            self.id
        );
    }
}

impl fmt::Debug for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archetype")
            .field("id", &self.id)
            .field("components", &self.components)
            .field("len", &self.entities.len())
            .field("edges", &self.edges.len())
            .finish()
    }
}

/// Where a moved row ended up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RowMove {
    /// Row of the moved entity in the destination table.
    pub row: usize,
    /// Entity swapped into the vacated source row, whose record must be patched.
    pub displaced: Option<EntityId>,
}

/// Move the entity at `row` of `src` into a new row of `dst`.
///
/// Components present in both tables are copied byte for byte; components
/// only in `dst` are zero-filled; components only in `src` are dropped. All
/// destination capacity is reserved before anything is written, so a failure
/// leaves both tables untouched.
pub(crate) fn move_row(
    src: &mut Archetype,
    dst: &mut Archetype,
    row: usize,
) -> Result<RowMove, ColumnError> {
    assert!(row < src.len(), "row {row} out of bounds in {:?}", src.id);
    dst.reserve_row()?;

    let entity = src.entities[row];
    let mut s = 0;
    for (d, &component) in dst.components.iter().enumerate() {
        while s < src.components.len() && src.components[s] < component {
            s += 1;
        }
        let column = &mut dst.columns[d];
        if src.components.get(s) == Some(&component) {
            let bytes = src.columns[s]
                .get(row)
                .expect("source row checked against entity count");
            column.push(bytes)?;
        } else {
            column.push_zeroed()?;
        }
    }
    dst.entities.push(entity);
    dst.debug_check();

    let displaced = src.swap_remove(row);
    Ok(RowMove {
        row: dst.entities.len() - 1,
        displaced,
    })
}
