//! # World — The Central Container
//!
//! The [`World`] owns everything: registered component types and their pools,
//! live entities, and every [`Group`] that systems and queries have bound. It
//! is the single source of truth for the simulation.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ World                                                    │
//! │                                                          │
//! │  registry: ComponentRegistry   ids, names, free pools    │
//! │  entities: BTreeMap<Entity, EntityRecord>                │
//! │    record = { mask: Bitmask, table: [Option<Slot>] }     │
//! │  pool: EntityPool              id counter + spare records│
//! │                                                          │
//! │  groups: Vec<Group>                                      │
//! │  group_cache: (GroupKind, matcher key) → GroupId         │
//! │  subscribers[component id] → [GroupId]                   │
//! │  wildcard → [GroupId]          groups watching every id  │
//! │                                                          │
//! │  singletons: ComponentId → holder Entity                 │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dispatch
//!
//! Every `add`/`remove` finishes updating the entity's record first, then
//! notifies the groups subscribed to that component id (in subscription
//! order), then the wildcard groups. Each group re-checks only that entity.
//! Notifications are synchronous: when `add` returns, every group is current.
//!
//! ## Singletons
//!
//! A singleton component is one the game wants exactly one of (a score, the
//! camera). [`World::get_singleton`] finds the entity holding it, or creates
//! an entity to hold it the first time it is asked for.
//!
//! ## Comparison
//!
//! - **bevy_ecs**: Archetype tables and cached query states; singletons are
//!   resources that live outside the entity store.
//! - **Here**: One record per entity and incrementally maintained groups.
//!   Singletons are ordinary entities, so systems can match them too.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use super::component::{Component, ComponentId, ComponentKind, ComponentRegistry, ComponentType, Tag};
use super::entity::{Entity, EntityPool, EntityRecord, Slot};
use super::group::{Group, GroupId, GroupKind, MembershipDiff, ObserverId};
use super::matcher::Matcher;
use super::system::Hooks;
use crate::config::{AddPolicy, WorldConfig};
use crate::error::{EcsError, Result};

/// Entity pool statistics gathered by [`World::diagnostics_entity_stats`].
#[cfg(feature = "diagnostics")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityPoolStats {
    /// The id the next created entity will get.
    pub next_id: u64,
    /// Spare records waiting for reuse.
    pub free_count: usize,
    pub alive_count: usize,
    pub created_this_tick: u32,
    pub destroyed_this_tick: u32,
}

/// The central container for all simulation state.
pub struct World {
    config: WorldConfig,
    registry: ComponentRegistry,
    entities: BTreeMap<Entity, EntityRecord>,
    pool: EntityPool,
    groups: Vec<Group>,
    group_cache: HashMap<(GroupKind, String), GroupId>,
    /// Indexed by component id.
    subscribers: Vec<Vec<GroupId>>,
    wildcard: Vec<GroupId>,
    singletons: HashMap<ComponentId, Entity>,
    #[cfg(feature = "diagnostics")]
    created_this_tick: u32,
    #[cfg(feature = "diagnostics")]
    destroyed_this_tick: u32,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            pool: EntityPool::with_capacity(config.entity_capacity),
            config,
            registry: ComponentRegistry::new(),
            entities: BTreeMap::new(),
            groups: Vec::new(),
            group_cache: HashMap::new(),
            subscribers: Vec::new(),
            wildcard: Vec::new(),
            singletons: HashMap::new(),
            #[cfg(feature = "diagnostics")]
            created_this_tick: 0,
            #[cfg(feature = "diagnostics")]
            destroyed_this_tick: 0,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Register a component type the world can construct on demand.
    pub fn register_component<T: Component + Default>(
        &mut self,
        name: &str,
    ) -> Result<ComponentType<T>> {
        self.registry.register(name)
    }

    /// Register a component type that can only be attached with [`World::insert`].
    pub fn register_external<T: Component>(&mut self, name: &str) -> Result<ComponentType<T>> {
        self.registry.register_external(name)
    }

    pub fn register_tag(&mut self, name: &str) -> Result<Tag> {
        self.registry.register_tag(name)
    }

    // ── Entity Lifecycle ─────────────────────────────────────────────

    pub fn create_entity(&mut self) -> Entity {
        let record = self.pool.acquire();
        let entity = record.entity;
        // Groups that accept an empty mask pick the entity up right away.
        for group in &mut self.groups {
            group.on_component_add_or_remove(entity, record.mask());
        }
        self.entities.insert(entity, record);
        #[cfg(feature = "diagnostics")]
        {
            self.created_this_tick += 1;
        }
        entity
    }

    /// Create an entity and attach each id in order. Data components are
    /// built from their pools; tags are set.
    ///
    /// Every id is checked before the entity is created, so on error nothing
    /// has changed.
    pub fn create_entity_with(
        &mut self,
        ids: impl IntoIterator<Item = ComponentId>,
    ) -> Result<Entity> {
        let ids: Vec<ComponentId> = ids.into_iter().collect();
        for &id in &ids {
            if self.registry.kind_of(id) == Some(ComponentKind::External) {
                return Err(EcsError::NotConstructible {
                    name: self.registry.name_or_id(id),
                });
            }
            if !self.registry.is_registered(id) {
                return Err(EcsError::UnregisteredComponent { id });
            }
        }
        let entity = self.create_entity();
        for id in ids {
            self.add_id(entity, id)?;
        }
        Ok(entity)
    }

    /// Destroy an entity: detach every component (firing removals), then
    /// recycle its record.
    ///
    /// Returns `false` (with a warning) if the entity is not alive.
    pub fn destroy_entity(&mut self, entity: Entity) -> bool {
        let Some(record) = self.entities.get(&entity) else {
            if self.config.warn_on_redundant {
                log::warn!("destroy_entity: entity {entity} is not alive");
            }
            return false;
        };
        for id in record.attached_ids() {
            self.remove(entity, id);
        }
        for group in &mut self.groups {
            group.evict(entity);
        }
        if let Some(record) = self.entities.remove(&entity) {
            self.pool.release(record);
        }
        #[cfg(feature = "diagnostics")]
        {
            self.destroyed_this_tick += 1;
        }
        true
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.contains_key(&entity)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Live entities in ascending id order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.keys().copied()
    }

    /// Look up a live entity by its raw id.
    pub fn entity_from_raw(&self, id: u64) -> Option<Entity> {
        let entity = Entity(id);
        self.is_alive(entity).then_some(entity)
    }

    /// Whether `entity` was issued by this world, alive or not.
    pub fn was_issued(&self, entity: Entity) -> bool {
        self.pool.issued(entity)
    }

    // ── Per-Entity Component Access ──────────────────────────────────

    /// Attach a component built from its pool, following the configured
    /// [`AddPolicy`].
    pub fn add<T: Component>(&mut self, entity: Entity, ty: ComponentType<T>) -> Result<&mut T> {
        self.add_with_policy(entity, ty, self.config.add_policy)
    }

    /// Attach a component built from its pool.
    ///
    /// If the entity already has it, [`AddPolicy::Keep`] returns the existing
    /// instance and [`AddPolicy::Replace`] removes it (firing the removal)
    /// before attaching a fresh one.
    pub fn add_with_policy<T: Component>(
        &mut self,
        entity: Entity,
        ty: ComponentType<T>,
        policy: AddPolicy,
    ) -> Result<&mut T> {
        let id = ty.id();
        self.check_data::<T>(entity, id)?;
        if self.registry.kind_of(id) == Some(ComponentKind::External) {
            return Err(EcsError::NotConstructible {
                name: self.registry.name_or_id(id),
            });
        }
        if self.has(entity, id) {
            match policy {
                AddPolicy::Keep => {
                    if self.config.warn_on_redundant {
                        log::warn!(
                            "add: entity {entity} already has '{}'",
                            self.registry.name_or_id(id)
                        );
                    }
                    return self.data_mut(entity, id);
                }
                AddPolicy::Replace => {
                    self.remove(entity, id);
                }
            }
        }
        self.attach_from_pool(entity, id)?;
        self.data_mut(entity, id)
    }

    /// Attach a caller-built instance. Works for every data kind and always
    /// replaces an existing instance (firing its removal first).
    pub fn insert<T: Component>(
        &mut self,
        entity: Entity,
        ty: ComponentType<T>,
        value: T,
    ) -> Result<&mut T> {
        let id = ty.id();
        self.check_data::<T>(entity, id)?;
        if self.has(entity, id) {
            self.remove(entity, id);
        }
        self.attach(entity, id, Slot::Data(Box::new(value)));
        self.data_mut(entity, id)
    }

    pub fn add_tag(&mut self, entity: Entity, tag: Tag) -> Result<()> {
        self.add_id(entity, tag.id())
    }

    /// Attach by id: tags are set, pooled components built. Already-present
    /// ids are left alone.
    fn add_id(&mut self, entity: Entity, id: ComponentId) -> Result<()> {
        if !self.is_alive(entity) {
            return Err(EcsError::DeadEntity { entity });
        }
        let kind = self
            .registry
            .kind_of(id)
            .ok_or(EcsError::UnregisteredComponent { id })?;
        if self.has(entity, id) {
            if self.config.warn_on_redundant {
                log::warn!(
                    "add: entity {entity} already has '{}'",
                    self.registry.name_or_id(id)
                );
            }
            return Ok(());
        }
        match kind {
            ComponentKind::Tag => {
                self.attach(entity, id, Slot::Tag);
                Ok(())
            }
            ComponentKind::Pooled => self.attach_from_pool(entity, id),
            ComponentKind::External => Err(EcsError::NotConstructible {
                name: self.registry.name_or_id(id),
            }),
        }
    }

    /// Detach a component, reset it, and return it to its pool.
    ///
    /// Returns `false` if the entity did not have it.
    pub fn remove(&mut self, entity: Entity, id: impl Into<ComponentId>) -> bool {
        let id = id.into();
        let Some(record) = self.entities.get_mut(&entity) else {
            if self.config.warn_on_redundant {
                log::warn!("remove: entity {entity} is not alive");
            }
            return false;
        };
        let Some(slot) = record.detach(id) else {
            return false;
        };
        if let Slot::Data(instance) = slot {
            self.registry.release_instance(id, instance);
        }
        if self.singletons.get(&id) == Some(&entity) {
            self.singletons.remove(&id);
        }
        self.broadcast(entity, id);
        true
    }

    pub fn get<T: 'static>(&self, entity: Entity, ty: ComponentType<T>) -> Option<&T> {
        self.entities.get(&entity)?.get(ty.id())?.downcast_ref()
    }

    pub fn get_mut<T: 'static>(&mut self, entity: Entity, ty: ComponentType<T>) -> Option<&mut T> {
        self.entities.get_mut(&entity)?.get_mut(ty.id())?.downcast_mut()
    }

    pub fn has(&self, entity: Entity, id: impl Into<ComponentId>) -> bool {
        let id = id.into();
        self.entities.get(&entity).is_some_and(|r| r.has(id))
    }

    /// Ids attached to an entity, ascending. Empty for dead entities.
    pub fn component_ids(&self, entity: Entity) -> Vec<ComponentId> {
        self.entities
            .get(&entity)
            .map(EntityRecord::attached_ids)
            .unwrap_or_default()
    }

    fn check_data<T: 'static>(&self, entity: Entity, id: ComponentId) -> Result<()> {
        if !self.is_alive(entity) {
            return Err(EcsError::DeadEntity { entity });
        }
        match self.registry.kind_of(id) {
            None => Err(EcsError::UnregisteredComponent { id }),
            Some(ComponentKind::Tag) => Err(EcsError::WrongKind {
                name: self.registry.name_or_id(id),
            }),
            Some(_) if !self.registry.holds::<T>(id) => Err(EcsError::TypeMismatch {
                name: self.registry.name_or_id(id),
            }),
            Some(_) => Ok(()),
        }
    }

    fn attach_from_pool(&mut self, entity: Entity, id: ComponentId) -> Result<()> {
        let instance = self
            .registry
            .create_instance(id)
            .ok_or_else(|| EcsError::NotConstructible {
                name: self.registry.name_or_id(id),
            })?;
        self.attach(entity, id, Slot::Data(instance));
        Ok(())
    }

    fn attach(&mut self, entity: Entity, id: ComponentId, slot: Slot) {
        if let Some(record) = self.entities.get_mut(&entity) {
            record.attach(id, slot);
            self.broadcast(entity, id);
        }
    }

    fn data_mut<T: 'static>(&mut self, entity: Entity, id: ComponentId) -> Result<&mut T> {
        self.entities
            .get_mut(&entity)
            .and_then(|r| r.get_mut(id))
            .and_then(|v| v.downcast_mut::<T>())
            .ok_or_else(|| EcsError::TypeMismatch {
                name: self.registry.name_or_id(id),
            })
    }

    /// Tell every interested group that `id` changed on `entity`.
    fn broadcast(&mut self, entity: Entity, id: ComponentId) {
        let Some(record) = self.entities.get(&entity) else {
            return;
        };
        let mask = record.mask();
        let per_id = self
            .subscribers
            .get(id as usize)
            .map(Vec::as_slice)
            .unwrap_or_default();
        log::trace!(
            "dispatch: entity {entity} component {id} to {} groups",
            per_id.len() + self.wildcard.len()
        );
        for gid in per_id.iter().chain(&self.wildcard) {
            self.groups[gid.0].on_component_add_or_remove(entity, mask);
        }
    }

    // ── Groups & Queries ─────────────────────────────────────────────

    /// Get or build the group for `matcher`.
    ///
    /// Groups are shared per `(kind, matcher key)`. A new group subscribes to
    /// the ids its matcher watches and is seeded with every live entity that
    /// already matches.
    pub fn create_group(&mut self, matcher: Matcher, kind: GroupKind) -> Result<GroupId> {
        matcher.validate(&self.registry)?;
        let cache_key = (kind, matcher.key().to_string());
        if let Some(&id) = self.group_cache.get(&cache_key) {
            return Ok(id);
        }

        let id = GroupId(self.groups.len());
        let mut group = Group::new(matcher, kind);
        for record in self.entities.values() {
            group.on_component_add_or_remove(record.entity, record.mask());
        }

        if group.matcher().watches_all() {
            self.wildcard.push(id);
        } else {
            for &cid in group.matcher().watched_ids() {
                let idx = cid as usize;
                if idx >= self.subscribers.len() {
                    self.subscribers.resize_with(idx + 1, Vec::new);
                }
                self.subscribers[idx].push(id);
            }
        }

        log::debug!(
            "created {kind:?} group {} for '{}' with {} members",
            id.0,
            cache_key.1,
            group.len()
        );
        self.groups.push(group);
        self.group_cache.insert(cache_key, id);
        Ok(id)
    }

    /// # Panics
    ///
    /// Panics if `id` did not come from this world.
    pub fn group(&self, id: GroupId) -> &Group {
        &self.groups[id.0]
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Entities currently matching `matcher`. The backing group is kept and
    /// maintained, so repeating the query is cheap.
    pub fn query(&mut self, matcher: Matcher) -> Result<Rc<[Entity]>> {
        let id = self.create_group(matcher, GroupKind::Query)?;
        Ok(self.groups[id.0].entities())
    }

    /// Test one entity against a matcher without creating a group.
    ///
    /// Debug builds panic if the matcher is empty or names an unregistered
    /// component.
    pub fn is_match(&self, entity: Entity, matcher: &Matcher) -> bool {
        debug_assert!(
            matcher.validate(&self.registry).is_ok(),
            "invalid matcher {matcher:?}"
        );
        self.entities
            .get(&entity)
            .is_some_and(|r| matcher.is_match(r.mask()))
    }

    /// Destroy every entity and empty every group and observer buffer.
    /// Registrations, groups, and subscriptions survive.
    pub fn clear_all(&mut self) {
        let live: Vec<Entity> = self.entities.keys().copied().collect();
        for entity in live {
            self.destroy_entity(entity);
        }
        for group in &mut self.groups {
            group.clear();
        }
        self.singletons.clear();
    }

    // ── Observers ────────────────────────────────────────────────────

    /// Attach enter/remove buffers to a group. Current members start out in
    /// the entered buffer.
    pub(crate) fn attach_observer(&mut self, group: GroupId, hooks: Hooks) -> ObserverId {
        let g = &mut self.groups[group.0];
        let mut diff = MembershipDiff::new(
            hooks.contains(Hooks::ENTITY_ENTER),
            hooks.contains(Hooks::ENTITY_REMOVE),
        );
        if diff.track_enter {
            for &entity in g.entities().iter() {
                diff.entered.insert(entity);
            }
        }
        let slot = g.attach_observer(diff);
        ObserverId { group, slot }
    }

    /// Drop an observer's buffers so the group stops filling them. Returns
    /// false if it was already detached.
    pub(crate) fn detach_observer(&mut self, observer: ObserverId) -> bool {
        self.groups
            .get_mut(observer.group.0)
            .is_some_and(|g| g.detach_observer(observer.slot))
    }

    pub(crate) fn drain_entered(&mut self, observer: ObserverId) -> Vec<Entity> {
        self.groups[observer.group.0]
            .observer_mut(observer.slot)
            .map(|o| o.entered.take())
            .unwrap_or_default()
    }

    pub(crate) fn drain_removed(&mut self, observer: ObserverId) -> Vec<Entity> {
        self.groups[observer.group.0]
            .observer_mut(observer.slot)
            .map(|o| o.removed.take())
            .unwrap_or_default()
    }

    // ── Singletons ───────────────────────────────────────────────────

    /// The single instance of `ty`, creating a holder entity on first use.
    pub fn get_singleton<T: Component>(&mut self, ty: ComponentType<T>) -> Result<&mut T> {
        let id = ty.id();
        let holder = match self.singleton_entity(id) {
            Some(entity) => entity,
            None => {
                if self.registry.kind_of(id) == Some(ComponentKind::External) {
                    return Err(EcsError::NotConstructible {
                        name: self.registry.name_or_id(id),
                    });
                }
                let entity = self.create_entity();
                self.add_with_policy(entity, ty, AddPolicy::Keep)?;
                log::debug!(
                    "singleton '{}' created on entity {entity}",
                    self.registry.name_or_id(id)
                );
                entity
            }
        };
        self.singletons.insert(id, holder);
        self.data_mut(holder, id)
    }

    /// Install a caller-built singleton instance, replacing the current one.
    pub fn add_singleton<T: Component>(&mut self, ty: ComponentType<T>, value: T) -> Result<&mut T> {
        let id = ty.id();
        let holder = match self.singleton_entity(id) {
            Some(entity) => entity,
            None => self.create_entity(),
        };
        self.insert(holder, ty, value)?;
        self.singletons.insert(id, holder);
        self.data_mut(holder, id)
    }

    /// The entity holding the singleton for component `id`, if one has been
    /// created. Other entities carrying the component are never adopted.
    pub fn singleton_entity(&self, id: impl Into<ComponentId>) -> Option<Entity> {
        self.singletons.get(&id.into()).copied()
    }

    // ── Diagnostics ──────────────────────────────────────────────────

    /// Pool statistics. Resets the per-tick created/destroyed counters.
    #[cfg(feature = "diagnostics")]
    pub fn diagnostics_entity_stats(&mut self) -> EntityPoolStats {
        let stats = EntityPoolStats {
            next_id: self.pool.next_id(),
            free_count: self.pool.free_count(),
            alive_count: self.entities.len(),
            created_this_tick: self.created_this_tick,
            destroyed_this_tick: self.destroyed_this_tick,
        };
        self.created_this_tick = 0;
        self.destroyed_this_tick = 0;
        stats
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::matcher::{all_of, any_of, exclude_of, only_of};
    use proptest::prelude::*;

    #[derive(Default, Debug, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }
    impl Component for Position {
        fn reset(&mut self) {
            *self = Self::default();
        }
    }

    #[derive(Default, Debug, PartialEq)]
    struct Velocity {
        dx: f32,
    }
    impl Component for Velocity {
        fn reset(&mut self) {
            self.dx = 0.0;
        }
    }

    #[derive(Debug, PartialEq)]
    struct Sprite(String);
    impl Component for Sprite {
        fn reset(&mut self) {
            self.0.clear();
        }
    }

    #[derive(Default, Debug, PartialEq)]
    struct Score(u32);
    impl Component for Score {
        fn reset(&mut self) {
            self.0 = 0;
        }
    }

    struct Fixture {
        world: World,
        pos: ComponentType<Position>,
        vel: ComponentType<Velocity>,
        sprite: ComponentType<Sprite>,
        enemy: Tag,
    }

    fn fixture() -> Fixture {
        let mut world = World::new();
        let pos = world.register_component::<Position>("Position").unwrap();
        let vel = world.register_component::<Velocity>("Velocity").unwrap();
        let sprite = world.register_external::<Sprite>("Sprite").unwrap();
        let enemy = world.register_tag("Enemy").unwrap();
        Fixture {
            world,
            pos,
            vel,
            sprite,
            enemy,
        }
    }

    #[test]
    fn add_get_remove() {
        let Fixture {
            mut world, pos, ..
        } = fixture();
        let e = world.create_entity();
        world.add(e, pos).unwrap().x = 3.0;
        assert!(world.has(e, pos));
        assert_eq!(world.get(e, pos).unwrap().x, 3.0);
        world.get_mut(e, pos).unwrap().y = 1.0;
        assert_eq!(world.get(e, pos), Some(&Position { x: 3.0, y: 1.0 }));

        assert!(world.remove(e, pos));
        assert!(!world.has(e, pos));
        assert!(world.get(e, pos).is_none());
        assert!(!world.remove(e, pos));
    }

    #[test]
    fn removed_instance_is_reset_and_reused() {
        let Fixture {
            mut world, pos, ..
        } = fixture();
        let a = world.create_entity();
        world.add(a, pos).unwrap().x = 9.0;
        world.remove(a, pos);
        assert_eq!(world.registry().pool_len(pos.id()), 1);

        let b = world.create_entity();
        assert_eq!(world.add(b, pos).unwrap(), &Position::default());
        assert_eq!(world.registry().pool_len(pos.id()), 0);
    }

    #[test]
    fn add_keep_returns_existing() {
        let Fixture {
            mut world, pos, ..
        } = fixture();
        let e = world.create_entity();
        world.add(e, pos).unwrap().x = 5.0;
        assert_eq!(world.add(e, pos).unwrap().x, 5.0);
        assert_eq!(world.component_ids(e), vec![pos.id()]);
    }

    #[test]
    fn add_replace_fires_removal_then_enter() {
        let Fixture {
            mut world, pos, ..
        } = fixture();
        let gid = world.create_group(all_of([pos.id()]), GroupKind::Reactive).unwrap();
        let obs = world.attach_observer(gid, Hooks::ENTITY_ENTER | Hooks::ENTITY_REMOVE);
        let e = world.create_entity();
        world.add(e, pos).unwrap().x = 5.0;
        world.drain_entered(obs);

        let fresh = world.add_with_policy(e, pos, AddPolicy::Replace).unwrap();
        assert_eq!(fresh.x, 0.0);
        // Left then re-entered: net effect is an entry, no pending removal.
        assert_eq!(world.drain_entered(obs), vec![e]);
        assert!(world.drain_removed(obs).is_empty());
    }

    #[test]
    fn replace_policy_from_config() {
        let mut world = World::with_config(WorldConfig::new().add_policy(AddPolicy::Replace));
        let pos = world.register_component::<Position>("Position").unwrap();
        let e = world.create_entity();
        world.add(e, pos).unwrap().x = 2.0;
        assert_eq!(world.add(e, pos).unwrap().x, 0.0);
    }

    #[test]
    fn external_requires_insert() {
        let Fixture {
            mut world, sprite, ..
        } = fixture();
        let e = world.create_entity();
        assert!(matches!(
            world.add(e, sprite),
            Err(EcsError::NotConstructible { .. })
        ));
        world.insert(e, sprite, Sprite("ship.png".into())).unwrap();
        assert_eq!(world.get(e, sprite).unwrap().0, "ship.png");

        // Insert replaces; the old instance goes to the pool reset.
        world.insert(e, sprite, Sprite("boss.png".into())).unwrap();
        assert_eq!(world.get(e, sprite).unwrap().0, "boss.png");
        assert_eq!(world.registry().pool_len(sprite.id()), 1);
    }

    #[test]
    fn tags() {
        let Fixture {
            mut world, enemy, ..
        } = fixture();
        let e = world.create_entity();
        world.add_tag(e, enemy).unwrap();
        assert!(world.has(e, enemy));
        world.add_tag(e, enemy).unwrap();
        assert!(world.remove(e, enemy));
        assert!(!world.has(e, enemy));
    }

    #[test]
    fn errors_on_misuse() {
        let Fixture {
            mut world, pos, ..
        } = fixture();
        let e = world.create_entity();
        world.destroy_entity(e);
        assert_eq!(world.add(e, pos).unwrap_err(), EcsError::DeadEntity { entity: e });

        let bogus: ComponentType<Velocity> = ComponentType::new(pos.id());
        let f = world.create_entity();
        assert!(matches!(
            world.add(f, bogus),
            Err(EcsError::TypeMismatch { .. })
        ));
        let unknown: ComponentType<Position> = ComponentType::new(99);
        assert_eq!(
            world.add(f, unknown).unwrap_err(),
            EcsError::UnregisteredComponent { id: 99 }
        );
    }

    #[test]
    fn create_entity_with_ids() {
        let Fixture {
            mut world,
            pos,
            enemy,
            sprite,
            ..
        } = fixture();
        let e = world.create_entity_with([pos.id(), enemy.id()]).unwrap();
        assert!(world.has(e, pos));
        assert!(world.has(e, enemy));

        let before = world.entity_count();
        assert!(world.create_entity_with([pos.id(), sprite.id()]).is_err());
        assert!(world.create_entity_with([77]).is_err());
        assert_eq!(world.entity_count(), before);
    }

    #[test]
    fn destroy_is_idempotent() {
        let Fixture {
            mut world, pos, ..
        } = fixture();
        let e = world.create_entity();
        world.add(e, pos).unwrap();
        assert!(world.destroy_entity(e));
        assert!(!world.is_alive(e));
        assert!(!world.destroy_entity(e));
        assert!(!world.remove(e, pos));
        assert_eq!(world.registry().pool_len(pos.id()), 1);
    }

    #[test]
    fn ids_never_reissued() {
        let Fixture {
            mut world, pos, ..
        } = fixture();
        let a = world.create_entity_with([pos.id()]).unwrap();
        world.destroy_entity(a);
        let b = world.create_entity();
        assert_ne!(a, b);
        assert!(world.component_ids(b).is_empty());
        assert!(b.id() > a.id());
        assert!(world.was_issued(a));
        assert_eq!(world.entity_from_raw(a.id()), None);
        assert_eq!(world.entity_from_raw(b.id()), Some(b));
    }

    #[test]
    fn entities_in_id_order() {
        let mut world = World::new();
        let a = world.create_entity();
        let b = world.create_entity();
        let c = world.create_entity();
        world.destroy_entity(b);
        assert_eq!(world.entities().collect::<Vec<_>>(), vec![a, c]);
        assert_eq!(world.entity_count(), 2);
    }

    #[test]
    fn group_seeded_and_maintained() {
        let Fixture {
            mut world,
            pos,
            vel,
            ..
        } = fixture();
        let a = world.create_entity();
        world.add(a, pos).unwrap();
        world.add(a, vel).unwrap();

        let gid = world
            .create_group(all_of([pos.id(), vel.id()]), GroupKind::System)
            .unwrap();
        assert!(world.group(gid).contains(a));

        let b = world.create_entity();
        world.add(b, pos).unwrap();
        assert!(!world.group(gid).contains(b));
        world.add(b, vel).unwrap();
        assert!(world.group(gid).contains(b));

        world.remove(a, vel);
        assert!(!world.group(gid).contains(a));
        assert_eq!(&*world.group(gid).entities(), &[b]);
    }

    #[test]
    fn groups_shared_per_kind_and_key() {
        let Fixture {
            mut world,
            pos,
            vel,
            ..
        } = fixture();
        let a = world
            .create_group(all_of([pos.id()]).exclude_of([vel.id()]), GroupKind::System)
            .unwrap();
        let b = world
            .create_group(exclude_of([vel.id()]).all_of([pos.id()]), GroupKind::System)
            .unwrap();
        let c = world
            .create_group(all_of([pos.id()]).exclude_of([vel.id()]), GroupKind::Query)
            .unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(world.group_count(), 2);
    }

    #[test]
    fn create_group_validates() {
        let mut world = World::new();
        assert_eq!(
            world.create_group(Matcher::new(), GroupKind::Query).unwrap_err(),
            EcsError::EmptyMatcher
        );
        assert_eq!(
            world.query(all_of([3])).unwrap_err(),
            EcsError::UnregisteredComponent { id: 3 }
        );
    }

    #[test]
    fn only_of_sees_later_registrations() {
        let mut world = World::new();
        let pos = world.register_component::<Position>("Position").unwrap();
        let gid = world.create_group(only_of([pos.id()]), GroupKind::Query).unwrap();
        let late = world.register_tag("Late").unwrap();

        let e = world.create_entity();
        world.add(e, pos).unwrap();
        assert!(world.group(gid).contains(e));
        world.add_tag(e, late).unwrap();
        assert!(!world.group(gid).contains(e));
    }

    #[test]
    fn exclude_only_group_tracks_bare_entities() {
        let Fixture {
            mut world, pos, ..
        } = fixture();
        let gid = world.create_group(exclude_of([pos.id()]), GroupKind::Query).unwrap();
        let e = world.create_entity();
        assert!(world.group(gid).contains(e));
        world.add(e, pos).unwrap();
        assert!(!world.group(gid).contains(e));
        world.remove(e, pos);
        assert!(world.group(gid).contains(e));
        world.destroy_entity(e);
        assert!(world.group(gid).is_empty());
    }

    #[test]
    fn query_snapshot_and_is_match() {
        let Fixture {
            mut world,
            pos,
            enemy,
            ..
        } = fixture();
        let a = world.create_entity_with([pos.id()]).unwrap();
        let b = world.create_entity_with([pos.id(), enemy.id()]).unwrap();
        let hits = world.query(any_of([enemy.id()])).unwrap();
        assert_eq!(&*hits, &[b]);
        assert!(world.is_match(a, &all_of([pos.id()])));
        assert!(!world.is_match(a, &all_of([enemy.id()])));
    }

    #[test]
    fn clear_all_keeps_groups() {
        let Fixture {
            mut world, pos, ..
        } = fixture();
        let gid = world.create_group(all_of([pos.id()]), GroupKind::Reactive).unwrap();
        let obs = world.attach_observer(gid, Hooks::ENTITY_REMOVE);
        world.create_entity_with([pos.id()]).unwrap();
        world.clear_all();
        assert_eq!(world.entity_count(), 0);
        assert!(world.group(gid).is_empty());
        assert!(world.drain_removed(obs).is_empty());

        let e = world.create_entity_with([pos.id()]).unwrap();
        assert!(world.group(gid).contains(e));
    }

    #[test]
    fn observer_primed_with_members() {
        let Fixture {
            mut world, pos, ..
        } = fixture();
        let e = world.create_entity_with([pos.id()]).unwrap();
        let gid = world.create_group(all_of([pos.id()]), GroupKind::Reactive).unwrap();
        let obs = world.attach_observer(gid, Hooks::ENTITY_ENTER);
        assert_eq!(world.drain_entered(obs), vec![e]);
        assert!(world.drain_entered(obs).is_empty());
    }

    #[test]
    fn singleton_created_once() {
        let mut world = World::new();
        let score = world.register_component::<Score>("Score").unwrap();
        world.get_singleton(score).unwrap().0 = 10;
        world.get_singleton(score).unwrap().0 += 5;
        assert_eq!(world.get_singleton(score).unwrap().0, 15);
        assert_eq!(world.entity_count(), 1);

        let holder = world.singleton_entity(score).unwrap();
        world.remove(holder, score);
        assert_eq!(world.singleton_entity(score), None);
        // A fresh holder is made on the next request.
        assert_eq!(world.get_singleton(score).unwrap().0, 0);
    }

    #[test]
    fn singleton_holder_is_separate_from_carriers() {
        let mut world = World::new();
        let score = world.register_component::<Score>("Score").unwrap();
        let player = world.create_entity();
        world.add(player, score).unwrap().0 = 7;

        assert_eq!(world.get_singleton(score).unwrap().0, 0);
        let holder = world.singleton_entity(score).unwrap();
        assert_ne!(holder, player);
        assert_eq!(world.entity_count(), 2);

        world.get_singleton(score).unwrap().0 = 100;
        assert_eq!(world.get(player, score).unwrap().0, 7);
    }

    #[test]
    fn detached_observer_stops_buffering() {
        let Fixture {
            mut world, pos, ..
        } = fixture();
        let gid = world.create_group(all_of([pos.id()]), GroupKind::Reactive).unwrap();
        let obs = world.attach_observer(gid, Hooks::ENTITY_ENTER | Hooks::ENTITY_REMOVE);
        assert_eq!(world.group(gid).observer_count(), 1);

        assert!(world.detach_observer(obs));
        assert!(!world.detach_observer(obs));
        assert_eq!(world.group(gid).observer_count(), 0);

        world.create_entity_with([pos.id()]).unwrap();
        assert!(world.drain_entered(obs).is_empty());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "invalid matcher")]
    fn is_match_rejects_unregistered_ids() {
        let mut world = World::new();
        let e = world.create_entity();
        world.is_match(e, &all_of([42]));
    }

    #[test]
    fn add_singleton_replaces() {
        let Fixture {
            mut world, sprite, ..
        } = fixture();
        assert!(world.get_singleton(sprite).is_err());
        world.add_singleton(sprite, Sprite("a".into())).unwrap();
        world.add_singleton(sprite, Sprite("b".into())).unwrap();
        assert_eq!(world.get_singleton(sprite).unwrap().0, "b");
        assert_eq!(world.entity_count(), 1);
    }

    #[cfg(feature = "diagnostics")]
    #[test]
    fn entity_stats_reset_per_tick() {
        let mut world = World::with_config(WorldConfig::new().entity_capacity(2));
        let a = world.create_entity();
        world.create_entity();
        world.destroy_entity(a);
        let stats = world.diagnostics_entity_stats();
        assert_eq!(stats.created_this_tick, 2);
        assert_eq!(stats.destroyed_this_tick, 1);
        assert_eq!(stats.alive_count, 1);
        assert_eq!(stats.next_id, 3);
        assert_eq!(stats.free_count, 1);

        let stats = world.diagnostics_entity_stats();
        assert_eq!(stats.created_this_tick, 0);
        assert_eq!(stats.destroyed_this_tick, 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Create,
        Destroy(usize),
        Add(usize, u32),
        Remove(usize, u32),
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Create),
            (0usize..8).prop_map(Op::Destroy),
            (0usize..8, 0u32..3).prop_map(|(e, c)| Op::Add(e, c)),
            (0usize..8, 0u32..3).prop_map(|(e, c)| Op::Remove(e, c)),
        ]
    }

    proptest! {
        #[test]
        fn groups_equal_full_scan(ops in prop::collection::vec(arb_op(), 1..60)) {
            let mut world = World::with_config(WorldConfig::new().warn_on_redundant(false));
            let pos = world.register_component::<Position>("Position").unwrap();
            let vel = world.register_component::<Velocity>("Velocity").unwrap();
            let tag = world.register_tag("Enemy").unwrap();
            let ids = [pos.id(), vel.id(), tag.id()];

            let matchers = [
                all_of([ids[0], ids[1]]),
                any_of([ids[0], ids[2]]),
                exclude_of([ids[1]]),
                only_of([ids[0]]),
                all_of([ids[0]]).exclude_of([ids[2]]),
            ];
            let groups: Vec<GroupId> = matchers
                .iter()
                .map(|m| world.create_group(m.clone(), GroupKind::Query).unwrap())
                .collect();

            let mut spawned: Vec<Entity> = Vec::new();
            for op in ops {
                match op {
                    Op::Create => spawned.push(world.create_entity()),
                    Op::Destroy(i) => {
                        if let Some(&e) = spawned.get(i) {
                            world.destroy_entity(e);
                        }
                    }
                    Op::Add(i, c) => {
                        if let Some(&e) = spawned.get(i) {
                            if world.is_alive(e) {
                                match c {
                                    0 => { world.add(e, pos).unwrap(); }
                                    1 => { world.add(e, vel).unwrap(); }
                                    _ => world.add_tag(e, tag).unwrap(),
                                }
                            }
                        }
                    }
                    Op::Remove(i, c) => {
                        if let Some(&e) = spawned.get(i) {
                            world.remove(e, ids[c as usize]);
                        }
                    }
                }

                for (m, &gid) in matchers.iter().zip(&groups) {
                    let mut expected: Vec<Entity> =
                        world.entities().filter(|&e| world.is_match(e, m)).collect();
                    let mut actual = world.group(gid).entities().to_vec();
                    expected.sort();
                    actual.sort();
                    prop_assert_eq!(expected, actual);
                }
            }
        }

        #[test]
        fn mask_matches_table(adds in prop::collection::vec((0u32..3, any::<bool>()), 0..40)) {
            let Fixture { mut world, pos, vel, enemy, .. } = fixture();
            let e = world.create_entity();
            for (c, add) in adds {
                let id = [pos.id(), vel.id(), enemy.id()][c as usize];
                if add {
                    match c {
                        0 => { world.add(e, pos).unwrap(); }
                        1 => { world.add(e, vel).unwrap(); }
                        _ => world.add_tag(e, enemy).unwrap(),
                    }
                } else {
                    world.remove(e, id);
                }
                prop_assert_eq!(world.has(e, pos), world.get(e, pos).is_some());
                prop_assert_eq!(world.has(e, vel), world.get(e, vel).is_some());
            }
        }
    }
}
