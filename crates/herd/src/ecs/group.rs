//! # Group — Incrementally Maintained Matcher Results
//!
//! A [`Group`] is the live answer to "which entities satisfy this
//! [`Matcher`]?". Instead of scanning every entity each frame, the
//! [`World`](super::world::World) tells the group whenever a watched
//! component is added to or removed from an entity, and the group re-checks
//! only that one entity.
//!
//! ## Memory Layout
//!
//! ```text
//! members.dense: [e3, e9, e4]      ← iteration order
//! members.index: {e3:0, e9:1, e4:2}
//! snapshot:      Rc<[e3, e9, e4]>  ← built on demand, dropped on change
//! observers:     [Some(diff), None] ← one slot per reactive system; detached
//!                                     slots are reused
//! ```
//!
//! Removal swaps the last member into the hole, so it is O(1) but does not
//! preserve order.
//!
//! ## Snapshots
//!
//! Systems iterate an `Rc<[Entity]>` snapshot, not the live set. A system can
//! add or remove components (and so change membership) in the middle of its
//! loop without invalidating what it is iterating.

use std::cell::OnceCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::bitmask::Bitmask;
use super::entity::Entity;
use super::matcher::Matcher;

/// Index of a group inside its world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub(crate) usize);

/// What a group was created for. Groups of different kinds are never shared,
/// even with equal matchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    /// Bound by a plain system.
    System,
    /// Bound by a system with enter/remove hooks.
    Reactive,
    /// Created by an ad hoc query.
    Query,
}

/// A dense set with O(1) insert, remove, and lookup. Order changes on
/// removal.
#[derive(Default, Clone)]
pub struct EntitySet {
    dense: Vec<Entity>,
    index: HashMap<Entity, usize>,
}

impl EntitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the entity was already present.
    pub fn insert(&mut self, entity: Entity) -> bool {
        if self.index.contains_key(&entity) {
            return false;
        }
        self.index.insert(entity, self.dense.len());
        self.dense.push(entity);
        true
    }

    /// Swap-remove. Returns false if the entity was not present.
    pub fn remove(&mut self, entity: Entity) -> bool {
        let Some(idx) = self.index.remove(&entity) else {
            return false;
        };
        self.dense.swap_remove(idx);
        if let Some(&moved) = self.dense.get(idx) {
            self.index.insert(moved, idx);
        }
        true
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.index.contains_key(&entity)
    }

    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    pub fn as_slice(&self) -> &[Entity] {
        &self.dense
    }

    pub fn clear(&mut self) {
        self.dense.clear();
        self.index.clear();
    }

    /// Move every entity out, leaving the set empty.
    pub fn take(&mut self) -> Vec<Entity> {
        self.index.clear();
        std::mem::take(&mut self.dense)
    }
}

/// Enter/remove buffers for one reactive system.
#[derive(Default)]
pub(crate) struct MembershipDiff {
    pub entered: EntitySet,
    pub removed: EntitySet,
    pub track_enter: bool,
    pub track_remove: bool,
}

impl MembershipDiff {
    pub fn new(track_enter: bool, track_remove: bool) -> Self {
        Self {
            track_enter,
            track_remove,
            ..Default::default()
        }
    }

    fn on_enter(&mut self, entity: Entity) {
        if self.track_enter {
            self.entered.insert(entity);
        }
        if self.track_remove {
            self.removed.remove(entity);
        }
    }

    fn on_leave(&mut self, entity: Entity) {
        if self.track_enter {
            self.entered.remove(entity);
        }
        if self.track_remove {
            self.removed.insert(entity);
        }
    }

    fn clear(&mut self) {
        self.entered.clear();
        self.removed.clear();
    }
}

/// Handle to an observer attached to a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverId {
    pub(crate) group: GroupId,
    pub(crate) slot: usize,
}

/// The set of entities currently matching a matcher.
pub struct Group {
    matcher: Matcher,
    kind: GroupKind,
    members: EntitySet,
    snapshot: OnceCell<Rc<[Entity]>>,
    observers: Vec<Option<MembershipDiff>>,
}

impl Group {
    pub(crate) fn new(matcher: Matcher, kind: GroupKind) -> Self {
        Self {
            matcher,
            kind,
            members: EntitySet::new(),
            snapshot: OnceCell::new(),
            observers: Vec::new(),
        }
    }

    /// Re-check one entity after a watched component changed.
    ///
    /// Only transitions matter: an entity that was and still is a member (or
    /// was not and still is not) leaves the group untouched.
    pub(crate) fn on_component_add_or_remove(&mut self, entity: Entity, mask: &Bitmask) {
        let matches = self.matcher.is_match(mask);
        let member = self.members.contains(entity);
        if matches && !member {
            self.members.insert(entity);
            self.snapshot.take();
            self.observers.iter_mut().flatten().for_each(|o| o.on_enter(entity));
        } else if !matches && member {
            self.members.remove(entity);
            self.snapshot.take();
            self.observers.iter_mut().flatten().for_each(|o| o.on_leave(entity));
        }
    }

    /// Drop a destroyed entity. Needed for matchers that accept an empty
    /// mask, since detaching the last component does not make them fail.
    pub(crate) fn evict(&mut self, entity: Entity) {
        if self.members.remove(entity) {
            self.snapshot.take();
            self.observers.iter_mut().flatten().for_each(|o| o.on_leave(entity));
        }
    }

    /// Empty membership and observer buffers.
    pub(crate) fn clear(&mut self) {
        self.members.clear();
        self.snapshot.take();
        self.observers.iter_mut().flatten().for_each(MembershipDiff::clear);
    }

    /// Store `diff` in the first free slot and return the slot index.
    pub(crate) fn attach_observer(&mut self, diff: MembershipDiff) -> usize {
        match self.observers.iter().position(Option::is_none) {
            Some(slot) => {
                self.observers[slot] = Some(diff);
                slot
            }
            None => {
                self.observers.push(Some(diff));
                self.observers.len() - 1
            }
        }
    }

    /// Free an observer slot. Returns false if it was already free.
    pub(crate) fn detach_observer(&mut self, slot: usize) -> bool {
        self.observers
            .get_mut(slot)
            .and_then(Option::take)
            .is_some()
    }

    pub(crate) fn observer_mut(&mut self, slot: usize) -> Option<&mut MembershipDiff> {
        self.observers.get_mut(slot)?.as_mut()
    }

    /// Number of attached observers.
    pub fn observer_count(&self) -> usize {
        self.observers.iter().flatten().count()
    }

    /// Shared snapshot of the current members.
    pub fn entities(&self) -> Rc<[Entity]> {
        self.snapshot
            .get_or_init(|| Rc::from(self.members.as_slice()))
            .clone()
    }

    /// The first member, if any. Handy for groups expected to hold one entity.
    pub fn first(&self) -> Option<Entity> {
        self.members.as_slice().first().copied()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.members.contains(entity)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }
}
