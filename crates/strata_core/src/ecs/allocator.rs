// allocator.rs - Identifier issue and recycling
//
// Slots are handed out densely; released slots go to a LIFO graveyard and
// come back with their generation bumped.

use crate::ecs::{EntityId, GenerationOverflow, StoreError, StoreResult};

#[derive(Clone, Copy, Debug)]
struct Slot {
    /// The id most recently issued for this slot (flags included).
    current: EntityId,
    alive: bool,
}

/// Outcome of releasing an id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Release {
    /// The slot is back in the graveyard under this id.
    Recycled(EntityId),
    /// The slot's generation is exhausted; it is never issued again.
    Retired,
}

/// Issues generation-tagged identifiers and recycles released slots.
#[derive(Debug)]
pub struct IdAllocator {
    slots: Vec<Slot>,
    graveyard: Vec<u32>,
    overflow: GenerationOverflow,
    live: usize,
    retired: usize,
}

impl IdAllocator {
    pub fn new(overflow: GenerationOverflow) -> Self {
        Self {
            slots: Vec::new(),
            graveyard: Vec::new(),
            overflow,
            live: 0,
            retired: 0,
        }
    }

    /// Issue an id that no live holder currently uses.
    ///
    /// Recycled slots are preferred over fresh ones, most recently released
    /// first.
    pub fn create(&mut self, flags: u16) -> StoreResult<EntityId> {
        if let Some(index) = self.graveyard.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(!slot.alive, "graveyard held a live slot");
            slot.current = slot.current.with_flags(flags);
            slot.alive = true;
            self.live += 1;
            return Ok(slot.current);
        }

        let index = u32::try_from(self.slots.len()).map_err(|_| StoreError::IdSpaceExhausted)?;
        self.slots.try_reserve(1)?;
        // Keep room for every slot in the graveyard so `release` never allocates.
        let wanted = self.slots.len() + 1 - self.graveyard.len();
        self.graveyard.try_reserve(wanted)?;

        let id = EntityId::new(index, 0, flags);
        self.slots.push(Slot {
            current: id,
            alive: true,
        });
        self.live += 1;
        Ok(id)
    }

    /// Whether `id` is exactly the id currently issued for its slot.
    #[inline]
    pub fn is_live(&self, id: EntityId) -> bool {
        self.slots
            .get(id.index() as usize)
            .is_some_and(|slot| slot.alive && slot.current == id)
    }

    /// Invalidate `id` and queue its slot for reuse with the next generation.
    pub fn release(&mut self, id: EntityId) -> StoreResult<Release> {
        if !self.is_live(id) {
            return Err(StoreError::EntityNotFound { entity: id });
        }

        let slot = &mut self.slots[id.index() as usize];
        slot.alive = false;
        self.live -= 1;

        let next = match id.generation().checked_add(1) {
            Some(next) => next,
            None => match self.overflow {
                GenerationOverflow::Wrap => 0,
                GenerationOverflow::Retire => {
                    self.retired += 1;
                    return Ok(Release::Retired);
                }
            },
        };

        slot.current = EntityId::new(id.index(), next, EntityId::FLAG_NONE);
        self.graveyard.push(id.index());
        Ok(Release::Recycled(slot.current))
    }

    /// Number of ids currently issued.
    pub fn live(&self) -> usize {
        self.live
    }

    /// Number of slots permanently retired.
    pub fn retired(&self) -> usize {
        self.retired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_slots_are_dense() {
        let mut ids = IdAllocator::new(GenerationOverflow::Retire);
        let a = ids.create(EntityId::FLAG_NONE).unwrap();
        let b = ids.create(EntityId::FLAG_NONE).unwrap();
        assert_eq!((a.index(), a.generation()), (0, 0));
        assert_eq!((b.index(), b.generation()), (1, 0));
        assert_eq!(ids.live(), 2);
    }

    #[test]
    fn released_slot_returns_with_next_generation() {
        let mut ids = IdAllocator::new(GenerationOverflow::Retire);
        let a = ids.create(EntityId::FLAG_NONE).unwrap();
        assert_eq!(
            ids.release(a).unwrap(),
            Release::Recycled(EntityId::new(0, 1, 0))
        );
        assert!(!ids.is_live(a));

        let b = ids.create(EntityId::FLAG_NONE).unwrap();
        assert_eq!(b.index(), a.index());
        assert_eq!(b.generation(), a.generation() + 1);
        assert!(ids.is_live(b));
        assert!(!ids.is_live(a));
    }

    #[test]
    fn stale_release_is_rejected() {
        let mut ids = IdAllocator::new(GenerationOverflow::Retire);
        let a = ids.create(EntityId::FLAG_NONE).unwrap();
        ids.release(a).unwrap();
        assert!(matches!(
            ids.release(a),
            Err(StoreError::EntityNotFound { entity }) if entity == a
        ));
    }

    #[test]
    fn flags_participate_in_liveness() {
        let mut ids = IdAllocator::new(GenerationOverflow::Retire);
        let c = ids.create(EntityId::FLAG_COMPONENT).unwrap();
        assert!(ids.is_live(c));
        assert!(!ids.is_live(c.with_flags(EntityId::FLAG_NONE)));
    }

    fn exhaust_slot(ids: &mut IdAllocator) -> EntityId {
        let mut id = ids.create(EntityId::FLAG_NONE).unwrap();
        while id.generation() < u16::MAX {
            ids.release(id).unwrap();
            id = ids.create(EntityId::FLAG_NONE).unwrap();
            assert_eq!(id.index(), 0);
        }
        id
    }

    #[test]
    fn exhausted_generation_retires_slot() {
        let mut ids = IdAllocator::new(GenerationOverflow::Retire);
        let last = exhaust_slot(&mut ids);
        assert_eq!(ids.release(last).unwrap(), Release::Retired);
        assert_eq!(ids.retired(), 1);

        let next = ids.create(EntityId::FLAG_NONE).unwrap();
        assert_eq!(next.index(), 1);
    }

    #[test]
    fn exhausted_generation_wraps_when_configured() {
        let mut ids = IdAllocator::new(GenerationOverflow::Wrap);
        let last = exhaust_slot(&mut ids);
        assert_eq!(
            ids.release(last).unwrap(),
            Release::Recycled(EntityId::new(0, 0, 0))
        );
        let next = ids.create(EntityId::FLAG_NONE).unwrap();
        assert_eq!((next.index(), next.generation()), (0, 0));
    }
}
