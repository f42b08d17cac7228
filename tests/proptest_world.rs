//! Property tests for world operations.
//!
//! Random sequences of create/destroy/add/remove are applied to a world and a
//! plain model of what every entity should hold; after each step the storage
//! must agree with the model and stay dense.

use std::collections::BTreeMap;

use proptest::prelude::*;
use secs::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Zeroable)]
struct Pos {
    x: i32,
    y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Zeroable)]
struct Vel {
    dx: i32,
    dy: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Zeroable)]
struct Tag(u32);

#[derive(Debug, Clone)]
enum EcsOp {
    Create { pos: bool, vel: bool, tag: bool },
    Destroy(usize),
    DestroyTwice(usize),
    SetPos(usize, i32, i32),
    SetVel(usize, i32, i32),
    RemovePos(usize),
    RemoveVel(usize),
    SetTag(usize, u32),
}

#[derive(Debug, Default, Clone)]
struct Model {
    pos: Option<Pos>,
    vel: Option<Vel>,
    tag: Option<Tag>,
}

fn ecs_op_strategy() -> impl Strategy<Value = EcsOp> {
    prop_oneof![
        (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(pos, vel, tag)| EcsOp::Create { pos, vel, tag }),
        (0..64usize).prop_map(EcsOp::Destroy),
        (0..64usize).prop_map(EcsOp::DestroyTwice),
        (0..64usize, -1000..1000i32, -1000..1000i32).prop_map(|(i, x, y)| EcsOp::SetPos(i, x, y)),
        (0..64usize, -1000..1000i32, -1000..1000i32).prop_map(|(i, dx, dy)| EcsOp::SetVel(i, dx, dy)),
        (0..64usize).prop_map(EcsOp::RemovePos),
        (0..64usize).prop_map(EcsOp::RemoveVel),
        (0..64usize, any::<u32>()).prop_map(|(i, t)| EcsOp::SetTag(i, t)),
    ]
}

fn world() -> World {
    let mut registry = ComponentRegistry::new();
    registry.register::<Pos>("pos");
    registry.register::<Vel>("vel");
    registry.register::<Tag>("tag");
    World::from_registry(registry)
}

fn pick(alive: &BTreeMap<Entity, Model>, idx: usize) -> Option<Entity> {
    if alive.is_empty() {
        return None;
    }
    alive.keys().nth(idx % alive.len()).copied()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn random_ops_match_model(ops in prop::collection::vec(ecs_op_strategy(), 1..60)) {
        let mut world = world();
        let pos_id = world.component_id::<Pos>().unwrap();
        let vel_id = world.component_id::<Vel>().unwrap();
        let tag_id = world.component_id::<Tag>().unwrap();

        let mut alive: BTreeMap<Entity, Model> = BTreeMap::new();

        for op in ops {
            match op {
                EcsOp::Create { pos, vel, tag } => {
                    let mut ids = Vec::new();
                    let mut model = Model::default();
                    if pos { ids.push(pos_id); model.pos = Some(Pos::zeroed()); }
                    if vel { ids.push(vel_id); model.vel = Some(Vel::zeroed()); }
                    if tag { ids.push(tag_id); model.tag = Some(Tag::zeroed()); }
                    let e = world.create_entity(&ids).unwrap();
                    prop_assert!(!alive.contains_key(&e));
                    alive.insert(e, model);
                }
                EcsOp::Destroy(idx) => {
                    if let Some(e) = pick(&alive, idx) {
                        prop_assert!(world.destroy_entity(e));
                        alive.remove(&e);
                        prop_assert!(!world.is_alive(e));
                    }
                }
                EcsOp::DestroyTwice(idx) => {
                    if let Some(e) = pick(&alive, idx) {
                        world.destroy_entity(e);
                        prop_assert!(!world.destroy_entity(e));
                        alive.remove(&e);
                    }
                }
                EcsOp::SetPos(idx, x, y) => {
                    if let Some(e) = pick(&alive, idx) {
                        world.add_component(e, Pos { x, y }).unwrap();
                        alive.get_mut(&e).unwrap().pos = Some(Pos { x, y });
                    }
                }
                EcsOp::SetVel(idx, dx, dy) => {
                    if let Some(e) = pick(&alive, idx) {
                        world.add_component(e, Vel { dx, dy }).unwrap();
                        alive.get_mut(&e).unwrap().vel = Some(Vel { dx, dy });
                    }
                }
                EcsOp::RemovePos(idx) => {
                    if let Some(e) = pick(&alive, idx) {
                        world.remove_component::<Pos>(e).unwrap();
                        alive.get_mut(&e).unwrap().pos = None;
                    }
                }
                EcsOp::RemoveVel(idx) => {
                    if let Some(e) = pick(&alive, idx) {
                        world.remove_component::<Vel>(e).unwrap();
                        alive.get_mut(&e).unwrap().vel = None;
                    }
                }
                EcsOp::SetTag(idx, t) => {
                    if let Some(e) = pick(&alive, idx) {
                        world.add_component(e, Tag(t)).unwrap();
                        alive.get_mut(&e).unwrap().tag = Some(Tag(t));
                    }
                }
            }

            prop_assert!(world.is_consistent());
            prop_assert_eq!(world.entity_count(), alive.len());
            for (e, model) in &alive {
                prop_assert_eq!(world.get_component::<Pos>(*e).unwrap().copied(), model.pos);
                prop_assert_eq!(world.get_component::<Vel>(*e).unwrap().copied(), model.vel);
                prop_assert_eq!(world.get_component::<Tag>(*e).unwrap().copied(), model.tag);
            }
        }
    }

    #[test]
    fn queries_visit_each_match_once(layout in prop::collection::vec((any::<bool>(), any::<bool>()), 0..80)) {
        let mut world = world();
        let pos_id = world.component_id::<Pos>().unwrap();
        let vel_id = world.component_id::<Vel>().unwrap();

        let mut expected = Vec::new();
        for (has_pos, has_vel) in layout {
            let mut ids = Vec::new();
            if has_pos { ids.push(pos_id); }
            if has_vel { ids.push(vel_id); }
            let e = world.create_entity(&ids).unwrap();
            if has_pos && has_vel {
                expected.push(e);
            }
        }

        let mut seen = Vec::new();
        let count = world
            .query_chunks::<(Pos, Vel), _>(|chunk| seen.extend_from_slice(chunk.entities()))
            .unwrap();

        let mut visited = Vec::new();
        let mut system = System::new("collect", [vel_id, pos_id], |_, _, _| Ok(()));
        let calls = system.execute(&mut world).unwrap();
        world
            .query_chunks_mut::<(Vel, Pos), _>(|chunk| visited.extend_from_slice(chunk.entities()))
            .unwrap();

        seen.sort();
        visited.sort();
        expected.sort();
        prop_assert_eq!(count, expected.len());
        prop_assert_eq!(calls, expected.len());
        prop_assert_eq!(&seen, &expected);
        prop_assert_eq!(&visited, &expected);
    }
}
