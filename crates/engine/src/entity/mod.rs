mod behavior;
mod body;

use std::fmt;

pub use behavior::{Behavior, Collision, EntityKind, FrameCommands, FrameContext, Surroundings};
pub(crate) use behavior::{position_collision_free, BehaviorGate};
pub use body::{Body, CollisionMode, MovementGate, Unbounded};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// A body plus the hooks of its concrete kind. The id is assigned when the
/// entity joins a world.
pub struct Entity {
    id: Option<EntityId>,
    body: Body,
    behavior: Box<dyn Behavior>,
}

impl Entity {
    pub fn new(body: Body, behavior: impl Behavior + 'static) -> Self {
        Self::from_boxed(body, Box::new(behavior))
    }

    pub fn from_boxed(body: Body, behavior: Box<dyn Behavior>) -> Self {
        Self {
            id: None,
            body,
            behavior,
        }
    }

    pub fn id(&self) -> Option<EntityId> {
        self.id
    }

    pub(crate) fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    pub fn kind(&self) -> EntityKind {
        self.behavior.kind()
    }

    pub fn is_kind(&self, kind: EntityKind) -> bool {
        self.kind() == kind
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn behavior(&self) -> &dyn Behavior {
        self.behavior.as_ref()
    }

    pub fn behavior_mut(&mut self) -> &mut dyn Behavior {
        self.behavior.as_mut()
    }

    pub fn is_colliding_with(&self, other: &Entity, mode: CollisionMode) -> bool {
        self.body.is_colliding_with(&other.body, mode)
    }

    /// Applies velocity through this kind's `check` hook.
    pub fn apply_velocity(&mut self, env: &Surroundings<'_>) {
        let gate = BehaviorGate {
            behavior: self.behavior.as_ref(),
            env,
        };
        self.body.apply_velocity(&gate);
    }

    pub fn move_to(&mut self, nx: f32, ny: f32, speed: f32, env: &Surroundings<'_>) -> bool {
        let gate = BehaviorGate {
            behavior: self.behavior.as_ref(),
            env,
        };
        self.body.move_to(nx, ny, speed, &gate)
    }

    pub(crate) fn run_update(&mut self, ctx: &mut FrameContext<'_>) {
        self.behavior.update(&mut self.body, ctx);
    }

    /// Hands `other` to this kind's collision hook. Entities that never
    /// joined a world cannot be reported and are skipped.
    pub(crate) fn run_collision(
        &mut self,
        other: &mut Entity,
        mode: CollisionMode,
        commands: &mut FrameCommands,
    ) -> bool {
        let Some(other_id) = other.id else {
            return false;
        };
        let hit = Collision {
            body: &mut self.body,
            other_kind: other.behavior.kind(),
            other: &mut other.body,
            other_id,
            mode,
        };
        self.behavior.collision(hit, commands);
        true
    }

    /// New entity of the same kind with position, velocity, depth, solidity,
    /// visibility and sprite copied. The copy is alive, listening and has no
    /// id until it is added to a world.
    pub fn duplicate(&self) -> Entity {
        let source = &self.body;
        let mut body = Body::at(source.sprite().clone(), source.x(), source.y());
        body.set_velocity(source.velocity_x(), source.velocity_y());
        body.set_depth(source.depth());
        body.set_solid(source.is_solid());
        body.set_visible(source.is_visible());
        Entity::from_boxed(body, self.behavior.clone_behavior())
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("body", &self.body)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::sprite::Sprite;

    #[derive(Clone)]
    struct Crate;

    impl Behavior for Crate {
        fn kind(&self) -> EntityKind {
            EntityKind("crate")
        }

        fn clone_behavior(&self) -> Box<dyn Behavior> {
            Box::new(self.clone())
        }

        fn check(&self, body: &Body, nx: f32, ny: f32, env: &Surroundings<'_>) -> bool {
            let bounds = env.map_bounds();
            nx >= bounds.x as f32
                && ny >= bounds.y as f32
                && nx + body.width() as f32 <= bounds.right() as f32
                && ny + body.height() as f32 <= bounds.bottom() as f32
        }
    }

    fn crate_at(x: f32, y: f32) -> Entity {
        Entity::new(Body::at(Sprite::empty(10, 10), x, y), Crate)
    }

    #[test]
    fn allocator_never_reuses_ids() {
        let mut allocator = EntityIdAllocator::default();
        let first = allocator.allocate();
        let second = allocator.allocate();
        let third = allocator.allocate();

        assert_eq!(first.0, 0);
        assert_eq!(second.0, 1);
        assert_eq!(third.0, 2);
    }

    #[test]
    fn duplicate_copies_state_and_kind_but_not_id() {
        let mut original = crate_at(4.0, 5.0);
        original.assign_id(EntityId(9));
        original.body_mut().set_velocity(1.5, -2.0);
        original.body_mut().set_depth(3);
        original.body_mut().set_solid(true);
        original.body_mut().set_visible(false);
        original.body_mut().set_collision_listener(false);

        let copy = original.duplicate();
        assert_eq!(copy.id(), None);
        assert_eq!(copy.kind(), EntityKind("crate"));
        let body = copy.body();
        assert_eq!((body.x(), body.y()), (4.0, 5.0));
        assert_eq!((body.velocity_x(), body.velocity_y()), (1.5, -2.0));
        assert_eq!(body.depth(), 3);
        assert!(body.is_solid());
        assert!(!body.is_visible());
        assert!(body.is_alive());
        assert!(body.is_collision_listener());
        assert_eq!((body.width(), body.height()), (10, 10));
    }

    #[test]
    fn apply_velocity_consults_kind_check_hook() {
        let mut entity = crate_at(85.0, 0.0);
        entity.body_mut().set_velocity(10.0, 10.0);
        let env = Surroundings::empty().with_map_bounds(Rect::new(0, 0, 100, 100));

        entity.apply_velocity(&env);
        assert_eq!((entity.body().x(), entity.body().y()), (85.0, 10.0));
    }

    #[test]
    fn move_to_is_gated_by_check_hook() {
        let mut entity = crate_at(0.0, 0.0);
        let env = Surroundings::empty().with_map_bounds(Rect::new(0, 0, 100, 100));
        assert!(!entity.move_to(-5.0, 0.0, 2.0, &env));
        assert_eq!(entity.body().x(), 0.0);
        assert!(entity.move_to(2.0, 0.0, 4.0, &env));
    }

    #[test]
    fn debug_output_names_kind() {
        let entity = crate_at(0.0, 0.0);
        let rendered = format!("{entity:?}");
        assert!(rendered.contains("crate"));
    }
}
