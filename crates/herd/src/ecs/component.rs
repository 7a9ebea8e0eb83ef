//! # Component — Registration, Handles, and Reuse Pools
//!
//! Components are plain data: a `Position`, a `Velocity`, a `Health`. Before
//! an entity can carry one, its type is registered with the
//! [`ComponentRegistry`], which hands back a dense [`ComponentId`] wrapped in a
//! typed [`ComponentType<T>`] handle. The id indexes straight into each
//! entity's bitmask and component table.
//!
//! ## Why Dense Ids?
//!
//! Ids start at 0 and go up by one per registration. That keeps entity masks
//! small and lets an entity's table be a plain `Vec` indexed by id instead of
//! a map keyed by `TypeId`.
//!
//! ## Pools
//!
//! Removing a component does not drop it. The instance is [`reset`](Component::reset)
//! and pushed onto its type's free list, and the next add of that type pops it
//! back out. Pools are unbounded: their size tracks the peak number of live
//! instances.
//!
//! ## Kinds
//!
//! - **Pooled**: registered with [`register`](ComponentRegistry::register);
//!   the registry can build fresh instances from `Default`.
//! - **External**: registered with [`register_external`](ComponentRegistry::register_external);
//!   no factory, the caller always supplies the instance.
//! - **Tag**: registered with [`register_tag`](ComponentRegistry::register_tag);
//!   a bit with no payload.
//!
//! Instances are stored as `Box<dyn Any>`, the same zero-unsafe tradeoff the
//! rest of the ECS makes: one heap allocation per instance, typed access via
//! `downcast_ref`/`downcast_mut`.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use crate::error::{EcsError, Result};

/// Dense, registration-assigned component id.
pub type ComponentId = u32;

/// A component payload.
///
/// `reset` runs when the instance is detached and returned to its pool. Put
/// the instance back into its baseline state there, or the next entity to
/// receive it will see the previous owner's data.
pub trait Component: Any {
    fn reset(&mut self);
}

/// Typed handle to a registered component.
pub struct ComponentType<T> {
    id: ComponentId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ComponentType<T> {
    pub(crate) fn new(id: ComponentId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn id(self) -> ComponentId {
        self.id
    }
}

impl<T> Clone for ComponentType<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ComponentType<T> {}

impl<T> PartialEq for ComponentType<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for ComponentType<T> {}

impl<T> fmt::Debug for ComponentType<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentType<{}>({})", short_type_name(type_name::<T>()), self.id)
    }
}

impl<T> From<ComponentType<T>> for ComponentId {
    fn from(ty: ComponentType<T>) -> Self {
        ty.id
    }
}

/// Handle to a registered tag (a component id without data).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Tag {
    id: ComponentId,
}

impl Tag {
    #[inline]
    pub fn id(self) -> ComponentId {
        self.id
    }
}

impl From<Tag> for ComponentId {
    fn from(tag: Tag) -> Self {
        tag.id
    }
}

/// How instances of a component come into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Pooled,
    External,
    Tag,
}

type Factory = fn() -> Box<dyn Any>;
type Reset = fn(&mut dyn Any);

fn new_erased<T: Component + Default>() -> Box<dyn Any> {
    Box::new(T::default())
}

fn reset_erased<T: Component>(value: &mut dyn Any) {
    if let Some(value) = value.downcast_mut::<T>() {
        value.reset();
    }
}

fn reset_nothing(_: &mut dyn Any) {}

struct ComponentInfo {
    name: String,
    kind: ComponentKind,
    type_id: Option<TypeId>,
    factory: Option<Factory>,
    reset: Reset,
    pool: Vec<Box<dyn Any>>,
}

/// Assigns component ids and owns one free-list pool per component.
pub struct ComponentRegistry {
    infos: Vec<ComponentInfo>,
    by_name: HashMap<String, ComponentId>,
    by_type: HashMap<TypeId, ComponentId>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self {
            infos: Vec::new(),
            by_name: HashMap::new(),
            by_type: HashMap::new(),
        }
    }

    /// Register a component the registry can construct from `Default`.
    pub fn register<T: Component + Default>(&mut self, name: &str) -> Result<ComponentType<T>> {
        let id = self.insert(
            name,
            ComponentKind::Pooled,
            Some(TypeId::of::<T>()),
            Some(new_erased::<T>),
            reset_erased::<T>,
        )?;
        Ok(ComponentType::new(id))
    }

    /// Register a component whose instances are always supplied by the caller.
    pub fn register_external<T: Component>(&mut self, name: &str) -> Result<ComponentType<T>> {
        let id = self.insert(
            name,
            ComponentKind::External,
            Some(TypeId::of::<T>()),
            None,
            reset_erased::<T>,
        )?;
        Ok(ComponentType::new(id))
    }

    /// Register a data-less tag.
    pub fn register_tag(&mut self, name: &str) -> Result<Tag> {
        let id = self.insert(name, ComponentKind::Tag, None, None, reset_nothing)?;
        Ok(Tag { id })
    }

    fn insert(
        &mut self,
        name: &str,
        kind: ComponentKind,
        type_id: Option<TypeId>,
        factory: Option<Factory>,
        reset: Reset,
    ) -> Result<ComponentId> {
        if self.by_name.contains_key(name) {
            return Err(EcsError::DuplicateComponent {
                name: name.to_string(),
            });
        }
        if let Some(existing) = type_id.and_then(|tid| self.by_type.get(&tid)) {
            return Err(EcsError::DuplicateComponentType {
                name: name.to_string(),
                existing: self.infos[*existing as usize].name.clone(),
            });
        }

        let id = self.infos.len() as ComponentId;
        self.infos.push(ComponentInfo {
            name: name.to_string(),
            kind,
            type_id,
            factory,
            reset,
            pool: Vec::new(),
        });
        self.by_name.insert(name.to_string(), id);
        if let Some(tid) = type_id {
            self.by_type.insert(tid, id);
        }
        log::debug!("registered component '{name}' ({kind:?}) as id {id}");
        Ok(id)
    }

    /// Number of registered components. Also the next id to be assigned.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    pub fn is_registered(&self, id: ComponentId) -> bool {
        (id as usize) < self.infos.len()
    }

    pub fn id_of(&self, name: &str) -> Option<ComponentId> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, id: ComponentId) -> Option<&str> {
        self.infos.get(id as usize).map(|info| info.name.as_str())
    }

    pub fn kind_of(&self, id: ComponentId) -> Option<ComponentKind> {
        self.infos.get(id as usize).map(|info| info.kind)
    }

    /// Whether `id` stores values of type `T`.
    pub(crate) fn holds<T: 'static>(&self, id: ComponentId) -> bool {
        self.infos
            .get(id as usize)
            .is_some_and(|info| info.type_id == Some(TypeId::of::<T>()))
    }

    /// Number of detached instances waiting for reuse.
    pub fn pool_len(&self, id: ComponentId) -> usize {
        self.infos.get(id as usize).map_or(0, |info| info.pool.len())
    }

    /// Pop a pooled instance or build a fresh one.
    ///
    /// Returns `None` for tags, unregistered ids, and external components
    /// whose pool is empty.
    pub fn create_instance(&mut self, id: ComponentId) -> Option<Box<dyn Any>> {
        let info = self.infos.get_mut(id as usize)?;
        if let Some(instance) = info.pool.pop() {
            return Some(instance);
        }
        info.factory.map(|factory| factory())
    }

    /// Reset an instance and push it onto its pool.
    pub fn release_instance(&mut self, id: ComponentId, mut instance: Box<dyn Any>) {
        let Some(info) = self.infos.get_mut(id as usize) else {
            return;
        };
        (info.reset)(instance.as_mut());
        info.pool.push(instance);
    }

    pub(crate) fn name_or_id(&self, id: ComponentId) -> String {
        self.name_of(id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{id}"))
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip the module path from a fully-qualified type name
/// (e.g. `game::components::Position` → `Position`).
pub(crate) fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }
    impl Component for Position {
        fn reset(&mut self) {
            self.x = 0.0;
            self.y = 0.0;
        }
    }

    #[derive(Default)]
    struct Velocity;
    impl Component for Velocity {
        fn reset(&mut self) {}
    }

    struct Sprite(&'static str);
    impl Component for Sprite {
        fn reset(&mut self) {
            self.0 = "";
        }
    }

    #[test]
    fn ids_are_dense_in_call_order() {
        let mut reg = ComponentRegistry::new();
        let pos = reg.register::<Position>("Position").unwrap();
        let vel = reg.register::<Velocity>("Velocity").unwrap();
        let tag = reg.register_tag("Player").unwrap();
        assert_eq!(pos.id(), 0);
        assert_eq!(vel.id(), 1);
        assert_eq!(tag.id(), 2);
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.name_of(1), Some("Velocity"));
        assert_eq!(reg.id_of("Player"), Some(2));
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut reg = ComponentRegistry::new();
        reg.register::<Position>("Position").unwrap();
        let err = reg.register_tag("Position").unwrap_err();
        assert_eq!(
            err,
            EcsError::DuplicateComponent {
                name: "Position".into()
            }
        );
        // The failed registration did not consume an id.
        assert_eq!(reg.register::<Velocity>("Velocity").unwrap().id(), 1);
    }

    #[test]
    fn duplicate_type_rejected() {
        let mut reg = ComponentRegistry::new();
        reg.register::<Position>("Position").unwrap();
        let err = reg.register::<Position>("Pos2").unwrap_err();
        assert!(matches!(err, EcsError::DuplicateComponentType { .. }));
    }

    #[test]
    fn pool_reuses_reset_instances() {
        let mut reg = ComponentRegistry::new();
        let pos = reg.register::<Position>("Position").unwrap();

        let mut instance = reg.create_instance(pos.id()).unwrap();
        *instance.downcast_mut::<Position>().unwrap() = Position { x: 4.0, y: 2.0 };
        reg.release_instance(pos.id(), instance);
        assert_eq!(reg.pool_len(pos.id()), 1);

        let reused = reg.create_instance(pos.id()).unwrap();
        assert_eq!(reg.pool_len(pos.id()), 0);
        assert_eq!(reused.downcast_ref::<Position>(), Some(&Position::default()));
    }

    #[test]
    fn external_needs_pooled_instance() {
        let mut reg = ComponentRegistry::new();
        let sprite = reg.register_external::<Sprite>("Sprite").unwrap();
        assert!(reg.create_instance(sprite.id()).is_none());

        reg.release_instance(sprite.id(), Box::new(Sprite("ship.png")));
        let reused = reg.create_instance(sprite.id()).unwrap();
        assert_eq!(reused.downcast_ref::<Sprite>().unwrap().0, "");
    }

    #[test]
    fn tags_have_no_instances() {
        let mut reg = ComponentRegistry::new();
        let tag = reg.register_tag("Enemy").unwrap();
        assert_eq!(reg.kind_of(tag.id()), Some(ComponentKind::Tag));
        assert!(reg.create_instance(tag.id()).is_none());
    }

    #[test]
    fn holds_checks_type() {
        let mut reg = ComponentRegistry::new();
        let pos = reg.register::<Position>("Position").unwrap();
        assert!(reg.holds::<Position>(pos.id()));
        assert!(!reg.holds::<Velocity>(pos.id()));
        assert!(!reg.holds::<Position>(42));
    }

    #[test]
    fn handle_debug_uses_short_name() {
        let ty: ComponentType<Position> = ComponentType::new(3);
        assert_eq!(format!("{ty:?}"), "ComponentType<Position>(3)");
    }

    #[test]
    fn drop_called_on_pooled_instances() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static DROP_COUNT: AtomicUsize = AtomicUsize::new(0);

        #[derive(Default)]
        struct Tracked;
        impl Component for Tracked {
            fn reset(&mut self) {}
        }
        impl Drop for Tracked {
            fn drop(&mut self) {
                DROP_COUNT.fetch_add(1, Ordering::SeqCst);
            }
        }

        DROP_COUNT.store(0, Ordering::SeqCst);
        let mut reg = ComponentRegistry::new();
        let ty = reg.register::<Tracked>("Tracked").unwrap();
        let a = reg.create_instance(ty.id()).unwrap();
        reg.release_instance(ty.id(), a);
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 0); // pooled, not dropped
        drop(reg);
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 1);
    }
}
