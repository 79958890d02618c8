use std::fmt;

use super::body::{Body, CollisionMode, MovementGate};
use super::{Entity, EntityId};
use crate::geometry::Rect;

/// Names a concrete entity kind, e.g. `EntityKind("bomb")`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityKind(pub &'static str);

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Per-kind hooks driven by the world each frame. Everything except `kind`
/// and `clone_behavior` is opt-in.
pub trait Behavior {
    fn kind(&self) -> EntityKind;

    /// Copy of this behaviour's state for `Entity::duplicate`.
    fn clone_behavior(&self) -> Box<dyn Behavior>;

    fn update(&mut self, _body: &mut Body, _ctx: &mut FrameContext<'_>) {}

    /// Movement veto for a candidate position.
    fn check(&self, _body: &Body, _nx: f32, _ny: f32, _env: &Surroundings<'_>) -> bool {
        true
    }

    /// Called once per colliding candidate. Kinds that do not override this
    /// stop listening after their first contact.
    fn collision(&mut self, hit: Collision<'_>, _commands: &mut FrameCommands) {
        hit.body.set_collision_listener(false);
    }
}

/// Contact handed to `Behavior::collision`.
pub struct Collision<'a> {
    pub body: &'a mut Body,
    pub other: &'a mut Body,
    pub other_id: EntityId,
    pub other_kind: EntityKind,
    pub mode: CollisionMode,
}

/// Mutations requested from inside a frame. Spawns join the world after the
/// purge; removals are purged at the end of the current frame.
#[derive(Default)]
pub struct FrameCommands {
    spawns: Vec<Entity>,
    removals: Vec<EntityId>,
    kind_removals: Vec<EntityKind>,
}

impl FrameCommands {
    pub fn spawn(&mut self, entity: Entity) {
        self.spawns.push(entity);
    }

    pub fn remove(&mut self, id: EntityId) {
        self.removals.push(id);
    }

    pub fn remove_kind(&mut self, kind: EntityKind) {
        self.kind_removals.push(kind);
    }

    pub fn is_empty(&self) -> bool {
        self.spawns.is_empty() && self.removals.is_empty() && self.kind_removals.is_empty()
    }

    pub(crate) fn take_spawns(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.spawns)
    }

    pub(crate) fn take_removals(&mut self) -> (Vec<EntityId>, Vec<EntityKind>) {
        (
            std::mem::take(&mut self.removals),
            std::mem::take(&mut self.kind_removals),
        )
    }
}

impl fmt::Debug for FrameCommands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameCommands")
            .field("spawns", &self.spawns.len())
            .field("removals", &self.removals)
            .field("kind_removals", &self.kind_removals)
            .finish()
    }
}

pub struct FrameContext<'a> {
    pub elapsed_ms: u64,
    pub env: Surroundings<'a>,
    pub commands: &'a mut FrameCommands,
}

/// Read-only view of every entity except the one being driven, plus the map
/// extent in pixels.
#[derive(Clone, Copy)]
pub struct Surroundings<'a> {
    before: &'a [Entity],
    after: &'a [Entity],
    mode: CollisionMode,
    map_bounds: Rect,
}

impl<'a> Surroundings<'a> {
    pub(crate) fn new(
        before: &'a [Entity],
        after: &'a [Entity],
        mode: CollisionMode,
        map_bounds: Rect,
    ) -> Self {
        Self {
            before,
            after,
            mode,
            map_bounds,
        }
    }

    /// No neighbours, box collisions and an empty map.
    pub fn empty() -> Self {
        Self::new(&[], &[], CollisionMode::Aabb, Rect::default())
    }

    pub fn with_mode(mut self, mode: CollisionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_map_bounds(mut self, map_bounds: Rect) -> Self {
        self.map_bounds = map_bounds;
        self
    }

    pub fn mode(&self) -> CollisionMode {
        self.mode
    }

    pub fn map_bounds(&self) -> Rect {
        self.map_bounds
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Entity> + 'a {
        let (before, after) = (self.before, self.after);
        before.iter().chain(after.iter())
    }

    pub fn len(&self) -> usize {
        self.before.len() + self.after.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when `subject` placed at `(x, y)` overlaps no live neighbour
    /// whose solidity equals `solid`.
    pub fn is_position_collision_free(&self, x: f32, y: f32, solid: bool, subject: &Body) -> bool {
        position_collision_free(self.iter(), x, y, solid, subject, self.mode)
    }

    /// Free of both solid and non-solid neighbours.
    pub fn is_position_free(&self, x: f32, y: f32, subject: &Body) -> bool {
        self.is_position_collision_free(x, y, true, subject)
            && self.is_position_collision_free(x, y, false, subject)
    }
}

pub(crate) fn position_collision_free<'e>(
    candidates: impl Iterator<Item = &'e Entity>,
    x: f32,
    y: f32,
    solid: bool,
    subject: &Body,
    mode: CollisionMode,
) -> bool {
    let probe = Rect::new(
        x.round() as i32,
        y.round() as i32,
        subject.width(),
        subject.height(),
    );
    for entity in candidates {
        let other = entity.body();
        if other.is_solid() != solid || !other.is_alive() || std::ptr::eq(other, subject) {
            continue;
        }
        if !probe.intersects(&other.bounds()) {
            continue;
        }
        if mode == CollisionMode::PixelPerfect {
            if let (Some(mine), Some(theirs)) = (subject.sprite().mask(), other.sprite().mask()) {
                if !mine.overlaps(x, y, theirs, other.x(), other.y()) {
                    continue;
                }
            }
        }
        return false;
    }
    true
}

/// Adapts a behaviour's `check` hook into a movement gate.
pub(crate) struct BehaviorGate<'b, 'e> {
    pub(crate) behavior: &'b dyn Behavior,
    pub(crate) env: &'b Surroundings<'e>,
}

impl MovementGate for BehaviorGate<'_, '_> {
    fn allows(&self, body: &Body, nx: f32, ny: f32) -> bool {
        self.behavior.check(body, nx, ny, self.env)
    }
}
