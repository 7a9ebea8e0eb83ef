//! # Entity — Ids, Records, and the Record Pool
//!
//! An [`Entity`] is just a number. The [`World`](super::world::World) maps it
//! to an [`EntityRecord`]: the entity's component [`Bitmask`] plus its
//! component table.
//!
//! ## Design: Never-Reused Ids
//!
//! Ids come from a counter that starts at 1 and only goes up. A destroyed id
//! is never handed out again, so a saved handle can never silently point at a
//! different entity:
//!
//! ```text
//! 1. Spawn entity 5
//! 2. Store a reference: saved = Entity(5)
//! 3. Destroy entity 5
//! 4. Spawn a new entity — gets id 6, reusing entity 5's *record*
//! 5. Use `saved` — lookups fail, World::is_alive(saved) == false
//! ```
//!
//! What does get recycled is the record allocation (mask words and table
//! slots), through [`EntityPool`]. With a `u64` counter the id space does not
//! run out in practice.
//!
//! ## Memory Layout
//!
//! ```text
//! mask:  {0, 2}                         ← bit per attached component id
//! table: [Some(Data), None, Some(Tag)]  ← indexed by component id
//! ```
//!
//! The record invariant is `mask.test(id) ⇔ table[id].is_some()`.
//!
//! ## Comparison
//!
//! - **hecs / bevy_ecs**: Generational indices; the slot is reused and a
//!   generation counter catches stale handles.
//! - **Here**: No generations needed because ids are never reissued.

use std::any::Any;
use std::fmt;

use super::bitmask::Bitmask;
use super::component::ComponentId;

/// A lightweight handle to an entity in a [`World`](super::world::World).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity(pub(crate) u64);

impl Entity {
    /// Returns the raw id.
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A component table slot.
pub(crate) enum Slot {
    Data(Box<dyn Any>),
    Tag,
}

/// Per-entity storage: which components are attached, and their instances.
pub(crate) struct EntityRecord {
    pub(crate) entity: Entity,
    mask: Bitmask,
    table: Vec<Option<Slot>>,
}

impl EntityRecord {
    fn new(entity: Entity) -> Self {
        Self {
            entity,
            mask: Bitmask::new(),
            table: Vec::new(),
        }
    }

    pub fn mask(&self) -> &Bitmask {
        &self.mask
    }

    pub fn has(&self, id: ComponentId) -> bool {
        self.mask.test(id)
    }

    /// Store `slot` under `id`. The caller guarantees the id is not attached.
    pub fn attach(&mut self, id: ComponentId, slot: Slot) {
        let idx = id as usize;
        if idx >= self.table.len() {
            self.table.resize_with(idx + 1, || None);
        }
        debug_assert!(self.table[idx].is_none(), "component {id} attached twice");
        self.table[idx] = Some(slot);
        self.mask.set(id);
        self.check(id);
    }

    /// Take the slot under `id` out of the record.
    pub fn detach(&mut self, id: ComponentId) -> Option<Slot> {
        let slot = self.table.get_mut(id as usize)?.take()?;
        self.mask.clear(id);
        self.check(id);
        Some(slot)
    }

    pub fn get(&self, id: ComponentId) -> Option<&dyn Any> {
        match self.table.get(id as usize)? {
            Some(Slot::Data(value)) => Some(value.as_ref()),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: ComponentId) -> Option<&mut dyn Any> {
        match self.table.get_mut(id as usize)? {
            Some(Slot::Data(value)) => Some(value.as_mut()),
            _ => None,
        }
    }

    /// Attached ids, ascending.
    pub fn attached_ids(&self) -> Vec<ComponentId> {
        self.mask.ones().collect()
    }

    #[inline]
    fn check(&self, id: ComponentId) {
        debug_assert_eq!(
            self.mask.test(id),
            self.table.get(id as usize).is_some_and(Option::is_some),
            "mask/table disagree for component {id}"
        );
    }
}

/// Hands out entity ids and recycles records.
///
/// ```text
/// next_id: 7            ← the next id to issue; ids 1..7 have been used
/// free:    [rec, rec]   ← cleared records waiting for reuse
/// ```
pub(crate) struct EntityPool {
    free: Vec<EntityRecord>,
    next_id: u64,
}

impl EntityPool {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Pre-allocate `capacity` empty records.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut free = Vec::with_capacity(capacity);
        free.extend((0..capacity).map(|_| EntityRecord::new(Entity(0))));
        Self { free, next_id: 1 }
    }

    /// Issue a fresh id, reusing a pooled record if one is available.
    pub fn acquire(&mut self) -> EntityRecord {
        let entity = Entity(self.next_id);
        self.next_id += 1;
        match self.free.pop() {
            Some(mut record) => {
                record.entity = entity;
                record
            }
            None => EntityRecord::new(entity),
        }
    }

    /// Return a record to the pool. Its components must already be detached.
    pub fn release(&mut self, mut record: EntityRecord) {
        debug_assert!(record.mask.is_empty(), "released record still has components");
        record.mask.clear_all();
        record.table.iter_mut().for_each(|slot| *slot = None);
        self.free.push(record);
    }

    /// Whether `entity` has ever been issued by this pool.
    pub fn issued(&self, entity: Entity) -> bool {
        entity.0 >= 1 && entity.0 < self.next_id
    }

    #[cfg(any(feature = "diagnostics", test))]
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    #[cfg(any(feature = "diagnostics", test))]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }
}

impl Default for EntityPool {
    fn default() -> Self {
        Self::new()
    }
}
