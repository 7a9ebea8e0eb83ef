//! # System — Per-Frame Logic Over Matching Entities
//!
//! A [`System`] declares which entities it wants with a [`Matcher`] and
//! receives them every frame in [`update`](System::update). Systems that care
//! about entities *arriving* or *leaving* also declare [`Hooks`] and get
//! [`entity_enter`](System::entity_enter) / [`entity_remove`](System::entity_remove)
//! calls with only the entities that changed since last frame.
//!
//! ## Binding
//!
//! A system is bound to a [`World`] once, producing a [`SystemRunner`]. The
//! runner picks its [`ExecuteVariant`] from the declared hooks at bind time,
//! so there is no per-frame "does this system implement X?" check:
//!
//! | Variant | Each frame |
//! |---|---|
//! | `Plain` | skip if empty; `update` |
//! | `Enter` | skip if empty; `entity_enter(new)`; `update` |
//! | `Remove` | `entity_remove(gone)`; skip if empty; `update` |
//! | `EnterRemove` | `entity_remove(gone)`; skip if empty; `entity_enter(new)`; `update` |
//!
//! With [`Hooks::FIRST_UPDATE`], the first frame the group is non-empty also
//! calls [`first_update`](System::first_update) before the normal variant.
//!
//! ## RootSystem
//!
//! A [`RootSystem`] is an ordered list of runners. Call
//! [`execute`](RootSystem::execute) once per tick. [`SystemGroup`]s organize
//! systems by feature and are flattened into the root when added.
//!
//! ## Comparison
//!
//! - **bevy_ecs**: `Added<T>` / `RemovedComponents<T>` filters per component
//!   type, plus parallel scheduling.
//! - **Here**: Enter/remove is per *matcher*, systems run in insertion order on
//!   one thread.

use std::any::type_name;
use std::rc::Rc;

use bitflags::bitflags;

use super::component::short_type_name;
use super::entity::Entity;
use super::group::{GroupId, GroupKind, ObserverId};
use super::matcher::Matcher;
use super::world::World;
use crate::error::Result;

bitflags! {
    /// Optional callbacks a system implements.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Hooks: u8 {
        const ENTITY_ENTER = 1 << 0;
        const ENTITY_REMOVE = 1 << 1;
        const FIRST_UPDATE = 1 << 2;
    }
}

/// Logic that runs over the entities matching [`filter`](System::filter).
///
/// Only `filter` and `update` are required. The other callbacks run only if
/// the matching flag is returned from [`hooks`](System::hooks).
pub trait System {
    fn filter(&self) -> Matcher;

    fn hooks(&self) -> Hooks {
        Hooks::empty()
    }

    /// Called once by [`RootSystem::init`].
    fn init(&mut self, _world: &mut World) {}

    fn update(&mut self, world: &mut World, entities: &[Entity], dt: f32);

    /// Entities that started matching since the last frame.
    fn entity_enter(&mut self, _world: &mut World, _entities: &[Entity]) {}

    /// Entities that stopped matching (or were destroyed) since the last frame.
    fn entity_remove(&mut self, _world: &mut World, _entities: &[Entity]) {}

    /// The first frame the group has members, before `update`.
    fn first_update(&mut self, _world: &mut World, _entities: &[Entity]) {}

    fn name(&self) -> &str {
        short_type_name(type_name::<Self>())
    }
}

/// How a runner drives its system each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteVariant {
    Plain,
    Enter,
    Remove,
    EnterRemove,
}

impl ExecuteVariant {
    pub fn from_hooks(hooks: Hooks) -> Self {
        match (
            hooks.contains(Hooks::ENTITY_ENTER),
            hooks.contains(Hooks::ENTITY_REMOVE),
        ) {
            (true, true) => ExecuteVariant::EnterRemove,
            (true, false) => ExecuteVariant::Enter,
            (false, true) => ExecuteVariant::Remove,
            (false, false) => ExecuteVariant::Plain,
        }
    }
}

/// A system bound to a world's group.
pub struct SystemRunner {
    system: Box<dyn System>,
    name: String,
    group: GroupId,
    observer: Option<ObserverId>,
    variant: ExecuteVariant,
    pending_first_update: bool,
    /// Delta time of the most recent frame that ran `update`.
    dt: f32,
}

impl SystemRunner {
    /// Bind `system` to `world`: create (or share) its group and attach an
    /// observer if it declared enter/remove hooks.
    pub fn new(world: &mut World, system: Box<dyn System>) -> Result<Self> {
        let hooks = system.hooks();
        let variant = ExecuteVariant::from_hooks(hooks);
        let reactive = variant != ExecuteVariant::Plain;
        let kind = if reactive {
            GroupKind::Reactive
        } else {
            GroupKind::System
        };
        let group = world.create_group(system.filter(), kind)?;
        let observer = reactive.then(|| world.attach_observer(group, hooks));
        let name = system.name().to_string();
        log::debug!("bound system '{name}' as {variant:?} to group {}", group.0);
        Ok(Self {
            system,
            name,
            group,
            observer,
            variant,
            pending_first_update: hooks.contains(Hooks::FIRST_UPDATE),
            dt: 0.0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn variant(&self) -> ExecuteVariant {
        self.variant
    }

    pub fn last_dt(&self) -> f32 {
        self.dt
    }

    pub fn has_entity(&self, world: &World) -> bool {
        !world.group(self.group).is_empty()
    }

    pub fn init(&mut self, world: &mut World) {
        self.system.init(world);
    }

    /// Run one frame.
    ///
    /// # Panics
    ///
    /// Panics if `world` is not the world this runner was bound to.
    pub fn execute(&mut self, world: &mut World, dt: f32) {
        if self.pending_first_update {
            if !self.has_entity(world) {
                return;
            }
            self.run_enter(world);
            let members = world.group(self.group).entities();
            self.system.first_update(world, &members);
            self.pending_first_update = false;
        }

        match self.variant {
            ExecuteVariant::Plain => {
                if self.has_entity(world) {
                    self.run_update(world, dt);
                }
            }
            ExecuteVariant::Enter => {
                if self.has_entity(world) {
                    self.run_enter(world);
                    self.run_update(world, dt);
                }
            }
            ExecuteVariant::Remove => {
                self.run_remove(world);
                if self.has_entity(world) {
                    self.run_update(world, dt);
                }
            }
            ExecuteVariant::EnterRemove => {
                self.run_remove(world);
                if self.has_entity(world) {
                    self.run_enter(world);
                    self.run_update(world, dt);
                }
            }
        }
    }

    /// Detach this runner's enter/remove buffers from `world` and hand the
    /// system back. A runner dropped without unbinding leaves its buffers
    /// attached to the group.
    pub fn unbind(self, world: &mut World) -> Box<dyn System> {
        if let Some(observer) = self.observer {
            world.detach_observer(observer);
        }
        log::debug!("unbound system '{}'", self.name);
        self.system
    }

    fn run_enter(&mut self, world: &mut World) {
        let Some(observer) = self.observer else {
            return;
        };
        let entered = world.drain_entered(observer);
        if !entered.is_empty() {
            self.system.entity_enter(world, &entered);
        }
    }

    fn run_remove(&mut self, world: &mut World) {
        let Some(observer) = self.observer else {
            return;
        };
        let removed = world.drain_removed(observer);
        if !removed.is_empty() {
            self.system.entity_remove(world, &removed);
        }
    }

    fn run_update(&mut self, world: &mut World, dt: f32) {
        self.dt = dt;
        let members: Rc<[Entity]> = world.group(self.group).entities();
        self.system.update(world, &members, dt);
    }
}

/// A named bundle of unbound systems, flattened when added to a
/// [`RootSystem`] or another group.
pub struct SystemGroup {
    name: String,
    systems: Vec<Box<dyn System>>,
}

impl SystemGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            systems: Vec::new(),
        }
    }

    /// Builder-style [`add`](SystemGroup::add).
    pub fn with<S: System + 'static>(mut self, system: S) -> Self {
        self.add(system);
        self
    }

    pub fn add<S: System + 'static>(&mut self, system: S) -> &mut Self {
        self.systems.push(Box::new(system));
        self
    }

    /// Move every system of `other` to the end of this group.
    pub fn add_group(&mut self, mut other: SystemGroup) -> &mut Self {
        self.systems.append(&mut other.systems);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

/// Per-system timing recorded during a single frame.
#[cfg(feature = "diagnostics")]
#[derive(Debug, Clone)]
pub struct SystemTiming {
    pub name: String,
    pub duration_us: f64,
}

/// The ordered list of runners driven once per tick.
pub struct RootSystem {
    runners: Vec<SystemRunner>,
    /// Per-system timings from the most recent `execute()` call.
    #[cfg(feature = "diagnostics")]
    timings: Vec<SystemTiming>,
}

impl RootSystem {
    pub fn new() -> Self {
        Self {
            runners: Vec::new(),
            #[cfg(feature = "diagnostics")]
            timings: Vec::new(),
        }
    }

    /// Bind a system and append it.
    pub fn add<S: System + 'static>(&mut self, world: &mut World, system: S) -> Result<&mut Self> {
        let runner = SystemRunner::new(world, Box::new(system))?;
        self.runners.push(runner);
        Ok(self)
    }

    /// Bind every system in `group`, in order, and append them. If any system
    /// fails to bind, none are appended and nothing stays attached to the
    /// world.
    pub fn add_group(&mut self, world: &mut World, group: SystemGroup) -> Result<&mut Self> {
        log::debug!("adding system group '{}' ({} systems)", group.name, group.len());
        for system in &group.systems {
            system.filter().validate(world.registry())?;
        }
        let mut runners = Vec::with_capacity(group.systems.len());
        for system in group.systems {
            match SystemRunner::new(world, system) {
                Ok(runner) => runners.push(runner),
                Err(err) => {
                    for runner in runners {
                        runner.unbind(world);
                    }
                    return Err(err);
                }
            }
        }
        self.runners.extend(runners);
        Ok(self)
    }

    /// Unbind every runner, detaching their buffers from `world`. Call this
    /// before dropping a root that shares its world with other systems.
    pub fn teardown(&mut self, world: &mut World) {
        for runner in self.runners.drain(..) {
            runner.unbind(world);
        }
        #[cfg(feature = "diagnostics")]
        self.timings.clear();
    }

    pub fn init(&mut self, world: &mut World) {
        for runner in &mut self.runners {
            runner.init(world);
        }
    }

    /// Run every system once, in order.
    pub fn execute(&mut self, world: &mut World, dt: f32) {
        #[cfg(feature = "diagnostics")]
        {
            self.timings.clear();
            for runner in &mut self.runners {
                let start = std::time::Instant::now();
                runner.execute(world, dt);
                let elapsed = start.elapsed();
                self.timings.push(SystemTiming {
                    name: runner.name.clone(),
                    duration_us: elapsed.as_secs_f64() * 1_000_000.0,
                });
            }
        }
        #[cfg(not(feature = "diagnostics"))]
        {
            for runner in &mut self.runners {
                runner.execute(world, dt);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }

    pub fn runners(&self) -> &[SystemRunner] {
        &self.runners
    }

    #[cfg(feature = "diagnostics")]
    pub fn timings(&self) -> &[SystemTiming] {
        &self.timings
    }
}

impl Default for RootSystem {
    fn default() -> Self {
        Self::new()
    }
}
