use tile_engine::{CollisionMode, World, WorldConfig};

use super::*;

const TILE: u32 = 32;

fn world_with(map: &str) -> World {
    let mut world = World::new(WorldConfig::default());
    world.load_map_str(map, &mut DemoLoader { tile_size: TILE });
    world
}

fn first_of(world: &World, kind: EntityKind) -> tile_engine::EntityId {
    world
        .entities()
        .iter()
        .find(|entity| entity.is_kind(kind))
        .and_then(Entity::id)
        .expect("entity of kind")
}

#[test]
fn demo_map_loads_every_symbol() {
    let world = world_with(DEMO_MAP);
    assert_eq!(world.entity_count(), 68);
    assert_eq!(world.instance_count(WALL), 60);
    assert_eq!(world.instance_count(COIN), 4);
    assert_eq!(world.instance_count(BALL), 2);
    assert_eq!(world.instance_count(PLAYER), 1);
    assert_eq!(world.instance_count(DISPENSER), 1);
    assert_eq!(world.map().tiles().count(), 140);
    assert_eq!(world.map_bounds(), tile_engine::Rect::new(0, 0, 640, 320));
}

#[test]
fn ball_bounces_off_the_floor() {
    let mut world = world_with("#####\n#o..#\n#####");
    let ball = first_of(&world, BALL);

    world.update(16);
    let body = world.find(ball).expect("ball").body();
    assert_eq!((body.x(), body.y()), (32.0, 32.0));
    assert_eq!(body.velocity_x(), BALL_SPEED.0);
    assert_eq!(body.velocity_y(), -BALL_SPEED.1);
}

#[test]
fn player_walks_to_and_collects_coin() {
    let mut world = world_with("#######\n#@..$.#\n#######");
    let player = first_of(&world, PLAYER);

    for _ in 0..60 {
        world.update(16);
    }
    assert_eq!(world.instance_count(COIN), 0);
    let body = world.find(player).expect("player").body();
    assert_eq!(body.y(), 32.0);
    assert!(body.x() > 90.0);
}

#[test]
fn player_does_not_step_into_walls() {
    let mut world = world_with("#####\n#@#$#\n#####");
    let player = first_of(&world, PLAYER);

    for _ in 0..30 {
        world.update(16);
    }
    assert_eq!(world.find(player).expect("player").body().x(), 32.0);
    assert_eq!(world.instance_count(COIN), 1);
}

#[test]
fn dispenser_stops_after_its_stock() {
    let mut world = world_with("S");
    for _ in 0..10 {
        world.update(250);
    }
    assert_eq!(world.instance_count(BALL), DISPENSE_LIMIT as usize);
}

#[test]
fn ball_pops_when_it_reaches_the_player() {
    let mut world = world_with("@o");
    let ball = first_of(&world, BALL);
    world
        .find_mut(ball)
        .expect("ball")
        .body_mut()
        .set_velocity(-3.0, 0.0);

    world.update(16);
    assert_eq!(world.instance_count(BALL), 0);
    world.update(16);
    assert!(world.find(ball).is_none());
}

#[test]
fn round_frames_only_collide_pixel_perfect_when_opaque_parts_meet() {
    let a = ball(0.0, 0.0, TILE);
    let b = ball(28.0, 28.0, TILE);
    assert!(a.is_colliding_with(&b, CollisionMode::Aabb));
    assert!(!a.is_colliding_with(&b, CollisionMode::PixelPerfect));

    let c = ball(16.0, 0.0, TILE);
    assert!(a.is_colliding_with(&c, CollisionMode::PixelPerfect));
}

#[test]
fn duplicated_dispenser_starts_with_full_stock() {
    let original = dispenser(0.0, 0.0, TILE);
    let copy = original.duplicate();
    assert_eq!(copy.kind(), DISPENSER);
    assert!(copy.body().is_collision_listener());
    assert_eq!(copy.id(), None);
    assert_eq!(copy.body().width(), TILE as i32);
}
