//! Frame loop — short-lived bullets tracked by a reactive system.
//!
//! Run with `RUST_LOG=info cargo run --example frame_loop`.

use glam::Vec2;
use herd::prelude::*;

#[derive(Default)]
struct Position(Vec2);
impl Component for Position {
    fn reset(&mut self) {
        self.0 = Vec2::ZERO;
    }
}

#[derive(Default)]
struct Velocity(Vec2);
impl Component for Velocity {
    fn reset(&mut self) {
        self.0 = Vec2::ZERO;
    }
}

#[derive(Default)]
struct Lifetime {
    remaining: f32,
}
impl Component for Lifetime {
    fn reset(&mut self) {
        self.remaining = 0.0;
    }
}

#[derive(Default)]
struct Stats {
    expired: u32,
}
impl Component for Stats {
    fn reset(&mut self) {
        self.expired = 0;
    }
}

struct Movement {
    pos: ComponentType<Position>,
    vel: ComponentType<Velocity>,
}

impl System for Movement {
    fn filter(&self) -> Matcher {
        all_of([self.pos.id(), self.vel.id()])
    }

    fn update(&mut self, world: &mut World, entities: &[Entity], dt: f32) {
        for &e in entities {
            let Some(v) = world.get(e, self.vel).map(|v| v.0) else {
                continue;
            };
            if let Some(p) = world.get_mut(e, self.pos) {
                p.0 += v * dt;
            }
        }
    }
}

struct Expiry {
    life: ComponentType<Lifetime>,
}

impl System for Expiry {
    fn filter(&self) -> Matcher {
        all_of([self.life.id()])
    }

    fn update(&mut self, world: &mut World, entities: &[Entity], dt: f32) {
        for &e in entities {
            let expired = match world.get_mut(e, self.life) {
                Some(life) => {
                    life.remaining -= dt;
                    life.remaining <= 0.0
                }
                None => false,
            };
            if expired {
                world.destroy_entity(e);
            }
        }
    }
}

/// Logs bullets as they appear and disappear, and keeps the tally.
struct BulletTracker {
    pos: ComponentType<Position>,
    frozen: Tag,
    stats: ComponentType<Stats>,
}

impl System for BulletTracker {
    fn filter(&self) -> Matcher {
        all_of([self.pos.id()]).exclude_of([self.frozen.id()])
    }

    fn hooks(&self) -> Hooks {
        Hooks::ENTITY_ENTER | Hooks::ENTITY_REMOVE | Hooks::FIRST_UPDATE
    }

    fn first_update(&mut self, _world: &mut World, entities: &[Entity]) {
        log::info!("first bullets in flight: {}", entities.len());
    }

    fn entity_enter(&mut self, _world: &mut World, entities: &[Entity]) {
        log::info!("spawned: {entities:?}");
    }

    fn entity_remove(&mut self, world: &mut World, entities: &[Entity]) {
        log::info!("gone: {entities:?}");
        if let Ok(stats) = world.get_singleton(self.stats) {
            stats.expired += entities.len() as u32;
        }
    }

    fn update(&mut self, _world: &mut World, _entities: &[Entity], _dt: f32) {}
}

fn spawn_bullet(
    world: &mut World,
    pos: ComponentType<Position>,
    vel: ComponentType<Velocity>,
    life: ComponentType<Lifetime>,
    heading: Vec2,
    ttl: f32,
) -> Result<Entity> {
    let e = world.create_entity_with([pos.id(), vel.id()])?;
    if let Some(v) = world.get_mut(e, vel) {
        v.0 = heading * 120.0;
    }
    world.add(e, life)?.remaining = ttl;
    Ok(e)
}

fn main() -> Result<()> {
    env_logger::init();

    let mut world = World::with_config(WorldConfig::new().entity_capacity(16));
    let pos = world.register_component::<Position>("Position")?;
    let vel = world.register_component::<Velocity>("Velocity")?;
    let life = world.register_component::<Lifetime>("Lifetime")?;
    let stats = world.register_component::<Stats>("Stats")?;
    let frozen = world.register_tag("Frozen")?;

    let physics = SystemGroup::new("physics")
        .with(Movement { pos, vel })
        .with(Expiry { life });

    let mut root = RootSystem::new();
    root.add_group(&mut world, physics)?;
    root.add(&mut world, BulletTracker { pos, frozen, stats })?;
    root.init(&mut world);

    let dt = 1.0 / 60.0;
    for frame in 0..120u32 {
        if frame % 20 == 0 {
            let angle = frame as f32 * 0.1;
            spawn_bullet(&mut world, pos, vel, life, Vec2::from_angle(angle), 0.5)?;
        }
        if frame == 50 {
            // A frozen bullet leaves the tracker's group without being destroyed.
            if let Some(first) = world.query(all_of([life.id()]))?.first().copied() {
                world.add_tag(first, frozen)?;
            }
        }
        root.execute(&mut world, dt);

        #[cfg(feature = "diagnostics")]
        {
            if frame % 60 == 59 {
                let pool = world.diagnostics_entity_stats();
                log::info!(
                    "frame {frame}: {} alive, {} created, {} destroyed, {} spare records",
                    pool.alive_count,
                    pool.created_this_tick,
                    pool.destroyed_this_tick,
                    pool.free_count,
                );
                for timing in root.timings() {
                    log::info!("  {:<14} {:>8.1}us", timing.name, timing.duration_us);
                }
            }
        }
    }

    let expired = world.get_singleton(stats)?.expired;
    println!("{expired} bullets left the tracker, {} entities alive", world.entity_count());
    Ok(())
}
