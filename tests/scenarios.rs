//! End-to-end behaviour of the storage engine through the public API.

use secs::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Zeroable)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Zeroable)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Zeroable)]
struct Health(i32);

#[derive(Debug, Clone, Copy, PartialEq, Zeroable)]
struct Transform {
    translation: [f32; 3],
    scale: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Zeroable)]
struct Aabb {
    min: [f32; 3],
    max: [f32; 3],
}

fn world() -> World {
    let mut registry = ComponentRegistry::new();
    registry.register::<Position>("Position");
    registry.register::<Velocity>("Velocity");
    registry.register::<Health>("Health");
    registry.register::<Transform>("Transform");
    registry.register::<Aabb>("AABB");
    World::from_registry(registry)
}

#[test]
fn movement_system_integrates_velocity() -> Result<()> {
    let mut world = world();
    let pos = world.component_id::<Position>()?;
    let vel = world.component_id::<Velocity>()?;

    let e = world.create_entity(&[pos, vel])?;
    world.add_component(e, Position { x: 0.0, y: 0.0 })?;
    world.add_component(e, Velocity { dx: 1.0, dy: 2.0 })?;

    let mut movement = System::new("movement", [pos, vel], |entity, world, _| {
        let Some(v) = world.get_component::<Velocity>(entity)?.copied() else {
            return Ok(());
        };
        if let Some(p) = world.get_component_mut::<Position>(entity)? {
            p.x += v.dx;
            p.y += v.dy;
        }
        Ok(())
    });
    movement.execute(&mut world)?;

    assert_eq!(world.get_component::<Position>(e)?, Some(&Position { x: 1.0, y: 2.0 }));
    Ok(())
}

#[test]
fn adding_component_keeps_existing_values() -> Result<()> {
    let mut world = world();
    let pos = world.component_id::<Position>()?;

    let e = world.create_entity(&[pos])?;
    world.add_component(e, Position { x: 5.0, y: -3.0 })?;
    let before = world.get_component::<Position>(e)?.copied();

    world.add_component(e, Velocity { dx: 3.0, dy: 4.0 })?;

    let mut matched = Vec::new();
    world.query_chunks::<(Position, Velocity), _>(|chunk| matched.extend_from_slice(chunk.entities()))?;
    assert_eq!(matched, vec![e]);
    assert_eq!(world.get_component::<Position>(e)?.copied(), before);
    assert_eq!(world.get_component::<Velocity>(e)?, Some(&Velocity { dx: 3.0, dy: 4.0 }));
    Ok(())
}

#[test]
fn destroying_middle_entity_keeps_neighbours_intact() -> Result<()> {
    let mut world = world();
    let health = world.component_id::<Health>()?;

    let e1 = world.create_entity(&[health])?;
    let e2 = world.create_entity(&[health])?;
    let e3 = world.create_entity(&[health])?;
    world.add_component(e1, Health(100))?;
    world.add_component(e2, Health(100))?;
    world.add_component(e3, Health(100))?;

    world.destroy_entity(e2);

    let mut alive = world.all_entities();
    alive.sort();
    assert_eq!(alive, vec![e1, e3]);
    assert_eq!(world.get_component::<Health>(e1)?, Some(&Health(100)));
    assert_eq!(world.get_component::<Health>(e3)?, Some(&Health(100)));
    assert!(world.is_consistent());
    Ok(())
}

#[test]
fn reading_from_destroyed_entity_is_empty() -> Result<()> {
    let mut world = world();
    let health = world.component_id::<Health>()?;
    let e = world.create_entity(&[health])?;

    assert!(world.destroy_entity(e));
    assert!(!world.destroy_entity(e));
    assert!(!world.is_alive(e));
    assert_eq!(world.get_component::<Health>(e)?, None);
    assert!(world.component_data(e, health).is_none());
    world.remove_component::<Health>(e)?;
    Ok(())
}

#[test]
fn chunk_columns_line_up_with_entities() -> Result<()> {
    let mut world = world();
    let transform = world.component_id::<Transform>()?;
    let aabb = world.component_id::<Aabb>()?;

    for _ in 0..5 {
        let e = world.create_entity(&[transform, aabb])?;
        let f = e.id() as f32;
        world.add_component(
            e,
            Transform {
                translation: [f, 0.0, 0.0],
                scale: 1.0,
            },
        )?;
        world.add_component(
            e,
            Aabb {
                min: [f - 0.5; 3],
                max: [f + 0.5; 3],
            },
        )?;
    }

    let mut chunks = 0;
    let count = world.query_chunks::<(Transform, Aabb), _>(|chunk| {
        chunks += 1;
        assert_eq!(chunk.len(), 5);
        let (entities, (transforms, aabbs)) = chunk.into_parts();
        for i in 0..entities.len() {
            let f = entities[i].id() as f32;
            assert_eq!(transforms[i].translation[0], f);
            assert_eq!(aabbs[i].min[0], f - 0.5);
        }
    })?;

    assert_eq!(count, 5);
    assert_eq!(chunks, 1);
    Ok(())
}

#[test]
fn builder_builds_populated_entity() -> Result<()> {
    let mut world = world();
    let e = world
        .builder()
        .create_entity()?
        .set(Position { x: 1.0, y: 1.0 })?
        .set(Health(50))?
        .build()?;

    assert!(world.has_component::<Position>(e)?);
    assert!(world.has_component::<Health>(e)?);
    assert!(!world.has_component::<Velocity>(e)?);
    assert_eq!(world.get_component::<Health>(e)?, Some(&Health(50)));
    Ok(())
}

#[test]
fn signature_order_does_not_matter() -> Result<()> {
    let mut world = world();
    let pos = world.component_id::<Position>()?;
    let vel = world.component_id::<Velocity>()?;

    let a = world.create_entity(&[pos, vel])?;
    let b = world.create_entity(&[vel, pos])?;
    assert_eq!(
        world.location(a).map(|l| l.archetype_id),
        world.location(b).map(|l| l.archetype_id)
    );
    Ok(())
}

#[test]
fn registration_is_stable() {
    let mut registry = ComponentRegistry::new();
    let first = registry.register::<Position>("Position");
    let again = registry.register::<Position>("Position");
    assert_eq!(first, again);
    for _ in 0..10 {
        assert_eq!(registry.id_of::<Position>(), Ok(first));
    }
    assert_eq!(registry.size_of(first), Ok(std::mem::size_of::<Position>()));
    assert_eq!(registry.name_of(first), Ok("Position"));
}
