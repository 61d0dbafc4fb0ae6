//! Entity handle with generational index
//!
//! Entities are lightweight handles (8 bytes) that address rows in the store.
//! The generation counter detects stale handles after a slot is recycled.

use std::fmt;

/// Generation counter stored in every id.
pub type Generation = u16;

/// Entity handle (generation-indexed for safety)
///
/// Format: [16-bit flags | 16-bit generation | 32-bit index]
/// - Index: slot in the identifier allocator
/// - Generation: incremented when the slot is released
/// - Flags: kind of identity (plain entity, component, archetype)
///
/// Equality always compares all 64 bits, so a recycled slot never compares
/// equal to the id it replaced.
///
/// Example:
/// ```ignore
/// let entity = store.create_entity()?;
/// store.destroy_entity(entity)?;
/// // entity handle is now invalid (generation mismatch)
/// ```
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct EntityId(u64);

/// Component ids are entities that carry component metadata.
pub type ComponentId = EntityId;

impl EntityId {
    const GENERATION_SHIFT: u32 = 32;
    const FLAGS_SHIFT: u32 = 48;

    /// No flags set: an ordinary entity.
    pub const FLAG_NONE: u16 = 0;
    /// The id names a registered component.
    pub const FLAG_COMPONENT: u16 = 1 << 0;
    /// The id names an archetype table.
    pub const FLAG_ARCHETYPE: u16 = 1 << 1;

    #[inline]
    pub const fn new(index: u32, generation: Generation, flags: u16) -> Self {
        Self(
            ((flags as u64) << Self::FLAGS_SHIFT)
                | ((generation as u64) << Self::GENERATION_SHIFT)
                | index as u64,
        )
    }

    #[inline]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    #[inline]
    pub const fn generation(self) -> Generation {
        (self.0 >> Self::GENERATION_SHIFT) as u16
    }

    #[inline]
    pub const fn flags(self) -> u16 {
        (self.0 >> Self::FLAGS_SHIFT) as u16
    }

    /// Whether this id was issued for a registered component.
    #[inline]
    pub const fn is_component(self) -> bool {
        self.flags() & Self::FLAG_COMPONENT != 0
    }

    /// Same slot and generation with a different flags field.
    #[inline]
    pub const fn with_flags(self, flags: u16) -> Self {
        Self::new(self.index(), self.generation(), flags)
    }

    /// Serialize to 64-bit integer
    #[inline]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Deserialize from 64-bit integer
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())?;
        if self.flags() != 0 {
            write!(f, "#{:x}", self.flags())?;
        }
        Ok(())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_packed_independently() {
        let id = EntityId::new(0xDEAD_BEEF, 0x1234, EntityId::FLAG_COMPONENT);
        assert_eq!(id.index(), 0xDEAD_BEEF);
        assert_eq!(id.generation(), 0x1234);
        assert_eq!(id.flags(), EntityId::FLAG_COMPONENT);
        assert!(id.is_component());
        assert_eq!(EntityId::from_bits(id.to_bits()), id);
    }

    #[test]
    fn equality_compares_the_whole_id() {
        let a = EntityId::new(7, 0, EntityId::FLAG_NONE);
        assert_ne!(a, EntityId::new(7, 1, EntityId::FLAG_NONE));
        assert_ne!(a, a.with_flags(EntityId::FLAG_COMPONENT));
        assert_eq!(a.with_flags(EntityId::FLAG_COMPONENT).index(), 7);
    }

    #[test]
    fn debug_format_shows_slot_and_generation() {
        assert_eq!(format!("{:?}", EntityId::new(3, 2, 0)), "3v2");
        assert_eq!(format!("{}", EntityId::new(3, 2, 1)), "3v2#1");
    }
}
