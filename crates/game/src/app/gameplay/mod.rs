use tile_engine::{
    AlphaMask, Behavior, Body, Collision, Entity, EntityKind, Frame, FrameCommands, FrameContext,
    MapLoader, Sprite, Surroundings, Tile,
};
use tracing::{debug, info};

pub(crate) const WALL: EntityKind = EntityKind("wall");
pub(crate) const BALL: EntityKind = EntityKind("ball");
pub(crate) const COIN: EntityKind = EntityKind("coin");
pub(crate) const PLAYER: EntityKind = EntityKind("player");
pub(crate) const DISPENSER: EntityKind = EntityKind("dispenser");

const BALL_SPEED: (f32, f32) = (3.0, 2.0);
const PLAYER_SPEED: f32 = 2.0;
const DISPENSE_INTERVAL_MS: u64 = 750;
const DISPENSE_LIMIT: u32 = 3;
const FLOOR_KEY: &str = "floor";

pub(crate) const DEMO_MAP: &str = "\
####################
#..................#
#..@.....$.....o...#
#..................#
#....####....$.....#
#..........S.......#
#..$...........o...#
#..................#
#.........$........#
####################";

pub(crate) fn solid_frame(size: u32, key: &str) -> Frame {
    Frame::sized(size, size).with_key(key)
}

/// Round frame whose transparent corners only matter with pixel-perfect
/// collisions enabled.
pub(crate) fn round_frame(size: u32, key: &str) -> Frame {
    let radius = size as f32 / 2.0;
    let mask = AlphaMask::from_fn(size, size, |x, y| {
        let dx = x as f32 + 0.5 - radius;
        let dy = y as f32 + 0.5 - radius;
        dx * dx + dy * dy <= radius * radius
    });
    Frame::masked(mask).with_key(key)
}

fn inside_map(body: &Body, nx: f32, ny: f32, env: &Surroundings<'_>) -> bool {
    let bounds = env.map_bounds();
    nx >= bounds.x as f32
        && ny >= bounds.y as f32
        && nx + body.width() as f32 <= bounds.right() as f32
        && ny + body.height() as f32 <= bounds.bottom() as f32
}

#[derive(Debug, Clone)]
pub(crate) struct Wall;

impl Behavior for Wall {
    fn kind(&self) -> EntityKind {
        WALL
    }

    fn clone_behavior(&self) -> Box<dyn Behavior> {
        Box::new(self.clone())
    }
}

pub(crate) fn wall(x: f32, y: f32, size: u32) -> Entity {
    let mut body = Body::at(Sprite::still(solid_frame(size, "wall")), x, y);
    body.set_solid(true);
    body.set_collision_listener(false);
    body.set_depth(1);
    Entity::new(body, Wall)
}

/// Bounces off solids and pops when it reaches the player.
#[derive(Debug, Clone)]
pub(crate) struct Ball;

impl Behavior for Ball {
    fn kind(&self) -> EntityKind {
        BALL
    }

    fn clone_behavior(&self) -> Box<dyn Behavior> {
        Box::new(self.clone())
    }

    fn check(&self, body: &Body, nx: f32, ny: f32, env: &Surroundings<'_>) -> bool {
        inside_map(body, nx, ny, env)
    }

    fn collision(&mut self, hit: Collision<'_>, _commands: &mut FrameCommands) {
        if hit.other_kind == PLAYER {
            hit.body.destroy();
            debug!(player = %hit.other_id, "ball_popped");
            return;
        }
        if !hit.other.is_solid() {
            return;
        }
        if hit.body.is_colliding_with(hit.other, hit.mode) {
            hit.body.align_with(hit.other);
        }
        hit.body.bounce(hit.other);
    }
}

pub(crate) fn ball(x: f32, y: f32, size: u32) -> Entity {
    let mut body = Body::at(Sprite::still(round_frame(size, "ball")), x, y);
    body.set_velocity(BALL_SPEED.0, BALL_SPEED.1);
    body.set_depth(2);
    Entity::new(body, Ball)
}

#[derive(Debug, Clone)]
pub(crate) struct Coin;

impl Behavior for Coin {
    fn kind(&self) -> EntityKind {
        COIN
    }

    fn clone_behavior(&self) -> Box<dyn Behavior> {
        Box::new(self.clone())
    }
}

pub(crate) fn coin(x: f32, y: f32, size: u32) -> Entity {
    let frames = vec![
        round_frame(size, "coin_0"),
        round_frame(size, "coin_1"),
        round_frame(size, "coin_2"),
    ];
    let mut body = Body::at(Sprite::animated(frames, 120), x, y);
    body.set_collision_listener(false);
    Entity::new(body, Coin)
}

/// Walks to the nearest coin without entering solids and collects it.
#[derive(Debug, Clone, Default)]
pub(crate) struct Player {
    collected: u32,
}

impl Behavior for Player {
    fn kind(&self) -> EntityKind {
        PLAYER
    }

    fn clone_behavior(&self) -> Box<dyn Behavior> {
        Box::new(self.clone())
    }

    fn update(&mut self, body: &mut Body, ctx: &mut FrameContext<'_>) {
        let (x, y) = (body.x(), body.y());
        let target = ctx
            .env
            .iter()
            .filter(|entity| entity.is_kind(COIN) && entity.body().is_alive())
            .map(|entity| (entity.body().x(), entity.body().y()))
            .min_by(|a, b| {
                let da = (a.0 - x).powi(2) + (a.1 - y).powi(2);
                let db = (b.0 - x).powi(2) + (b.1 - y).powi(2);
                da.total_cmp(&db)
            });
        let Some((tx, ty)) = target else {
            return;
        };
        let env = ctx.env;
        let gate = |body: &Body, nx: f32, ny: f32| {
            inside_map(body, nx, ny, &env) && env.is_position_collision_free(nx, ny, true, body)
        };
        body.move_to(tx, ty, PLAYER_SPEED, &gate);
    }

    fn collision(&mut self, hit: Collision<'_>, _commands: &mut FrameCommands) {
        if hit.other_kind == COIN && hit.other.is_alive() {
            hit.other.destroy();
            self.collected += 1;
            info!(coin = %hit.other_id, collected = self.collected, "coin_collected");
        }
    }
}

pub(crate) fn player(x: f32, y: f32, size: u32) -> Entity {
    let mut body = Body::at(Sprite::still(solid_frame(size, "player")), x, y);
    body.set_depth(3);
    Entity::new(body, Player::default())
}

/// Releases a ball on a fixed interval until its stock runs out.
#[derive(Debug, Clone)]
pub(crate) struct Dispenser {
    size: u32,
    elapsed_ms: u64,
    released: u32,
}

impl Dispenser {
    pub(crate) fn new(size: u32) -> Self {
        Self {
            size,
            elapsed_ms: 0,
            released: 0,
        }
    }
}

impl Behavior for Dispenser {
    fn kind(&self) -> EntityKind {
        DISPENSER
    }

    fn clone_behavior(&self) -> Box<dyn Behavior> {
        Box::new(Self::new(self.size))
    }

    fn update(&mut self, body: &mut Body, ctx: &mut FrameContext<'_>) {
        if self.released >= DISPENSE_LIMIT {
            return;
        }
        self.elapsed_ms += ctx.elapsed_ms;
        if self.elapsed_ms < DISPENSE_INTERVAL_MS {
            return;
        }
        self.elapsed_ms -= DISPENSE_INTERVAL_MS;
        self.released += 1;
        let mut released = ball(body.x(), body.y(), self.size);
        if self.released % 2 == 0 {
            let velocity = (-BALL_SPEED.0, BALL_SPEED.1);
            released.body_mut().set_velocity(velocity.0, velocity.1);
        }
        ctx.commands.spawn(released);
        debug!(released = self.released, "ball_dispensed");
    }
}

pub(crate) fn dispenser(x: f32, y: f32, size: u32) -> Entity {
    let mut body = Body::at(Sprite::still(solid_frame(size, "dispenser")), x, y);
    body.set_collision_listener(false);
    Entity::new(body, Dispenser::new(size))
}

/// Maps the demo symbols to entities and lays floor tiles under every
/// non-wall cell.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DemoLoader {
    pub(crate) tile_size: u32,
}

impl MapLoader for DemoLoader {
    fn object(&mut self, symbol: char, x: i32, y: i32) -> Option<Entity> {
        let (x, y, size) = (x as f32, y as f32, self.tile_size);
        match symbol {
            '#' => Some(wall(x, y, size)),
            'o' => Some(ball(x, y, size)),
            '$' => Some(coin(x, y, size)),
            '@' => Some(player(x, y, size)),
            'S' => Some(dispenser(x, y, size)),
            _ => None,
        }
    }

    fn tile(&mut self, symbol: char, x: i32, y: i32) -> Option<Tile> {
        (symbol != '#').then(|| Tile {
            x,
            y,
            key: FLOOR_KEY.to_string(),
        })
    }
}

#[cfg(test)]
mod tests;
