use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::geometry::Rect;
use crate::sprite::{Frame, Sprite};

/// How overlap between two bodies is decided once their boxes intersect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionMode {
    #[default]
    Aabb,
    /// Refine box hits with the frames' alpha masks. Frames without a mask
    /// keep the box result.
    PixelPerfect,
}

/// Decides whether a body may commit a candidate position.
pub trait MovementGate {
    fn allows(&self, body: &Body, nx: f32, ny: f32) -> bool;
}

/// Gate that accepts every position.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl MovementGate for Unbounded {
    fn allows(&self, _body: &Body, _nx: f32, _ny: f32) -> bool {
        true
    }
}

impl<F> MovementGate for F
where
    F: Fn(&Body, f32, f32) -> bool,
{
    fn allows(&self, body: &Body, nx: f32, ny: f32) -> bool {
        self(body, nx, ny)
    }
}

/// Position, motion, flags and visual of one simulated object.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    x: f32,
    y: f32,
    old_x: f32,
    old_y: f32,
    dx: f32,
    dy: f32,
    depth: i32,
    visible: bool,
    solid: bool,
    alive: bool,
    collision_listener: bool,
    sprite: Sprite,
}

impl Default for Body {
    fn default() -> Self {
        Self::new(Sprite::default())
    }
}

impl Body {
    pub fn new(sprite: Sprite) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            old_x: 0.0,
            old_y: 0.0,
            dx: 0.0,
            dy: 0.0,
            depth: 0,
            visible: true,
            solid: false,
            alive: true,
            collision_listener: true,
            sprite,
        }
    }

    pub fn at(sprite: Sprite, x: f32, y: f32) -> Self {
        let mut body = Self::new(sprite);
        body.set_x(x);
        body.set_y(y);
        body
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn old_x(&self) -> f32 {
        self.old_x
    }

    pub fn old_y(&self) -> f32 {
        self.old_y
    }

    pub fn set_x(&mut self, x: f32) {
        self.old_x = self.x;
        self.x = x;
    }

    pub fn set_y(&mut self, y: f32) {
        self.old_y = self.y;
        self.y = y;
    }

    pub fn velocity_x(&self) -> f32 {
        self.dx
    }

    pub fn velocity_y(&self) -> f32 {
        self.dy
    }

    pub fn set_velocity_x(&mut self, dx: f32) {
        self.dx = dx;
    }

    pub fn set_velocity_y(&mut self, dy: f32) {
        self.dy = dy;
    }

    pub fn set_velocity(&mut self, dx: f32, dy: f32) {
        self.dx = dx;
        self.dy = dy;
    }

    pub fn next_x(&self) -> f32 {
        self.x + self.dx
    }

    pub fn next_y(&self) -> f32 {
        self.y + self.dy
    }

    pub fn depth(&self) -> i32 {
        self.depth
    }

    pub fn set_depth(&mut self, depth: i32) {
        self.depth = depth;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn is_solid(&self) -> bool {
        self.solid
    }

    pub fn set_solid(&mut self, solid: bool) {
        self.solid = solid;
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Marks the body dead. It stays queryable until the registry purges it
    /// at the end of the frame.
    pub fn destroy(&mut self) {
        self.alive = false;
    }

    pub fn is_collision_listener(&self) -> bool {
        self.collision_listener
    }

    pub fn set_collision_listener(&mut self, listener: bool) {
        self.collision_listener = listener;
    }

    pub fn sprite(&self) -> &Sprite {
        &self.sprite
    }

    pub fn sprite_mut(&mut self) -> &mut Sprite {
        &mut self.sprite
    }

    pub fn set_sprite(&mut self, sprite: Sprite) {
        self.sprite = sprite;
    }

    pub fn width(&self) -> i32 {
        self.sprite.width() as i32
    }

    pub fn height(&self) -> i32 {
        self.sprite.height() as i32
    }

    /// The frame a renderer should draw, or `None` for dead or hidden bodies.
    pub fn visible_frame(&self) -> Option<&Frame> {
        if self.alive && self.visible {
            Some(self.sprite.frame())
        } else {
            None
        }
    }

    /// Box at the rounded position. Returned by value, so a caller holding it
    /// across a move keeps the old box.
    pub fn bounds(&self) -> Rect {
        Rect::new(
            self.x.round() as i32,
            self.y.round() as i32,
            self.width(),
            self.height(),
        )
    }

    pub fn contains_point(&self, px: i32, py: i32) -> bool {
        self.bounds().contains_point(px, py)
    }

    pub fn is_colliding_with(&self, other: &Body, mode: CollisionMode) -> bool {
        if std::ptr::eq(self, other) {
            return false;
        }
        if !self.alive || !other.alive {
            return false;
        }
        let (x1, y1) = (self.x as i32, self.y as i32);
        let (x2, y2) = (other.x as i32, other.y as i32);
        let overlap = x1 < x2.saturating_add(other.width())
            && x2 < x1.saturating_add(self.width())
            && y1 < y2.saturating_add(other.height())
            && y2 < y1.saturating_add(self.height());
        if !overlap || mode == CollisionMode::Aabb {
            return overlap;
        }
        match (self.sprite.mask(), other.sprite.mask()) {
            (Some(mine), Some(theirs)) => mine.overlaps(self.x, self.y, theirs, other.x, other.y),
            _ => overlap,
        }
    }

    // The four directional predicates compare with non-strict operators, so
    // they overlap: a diagonal hit satisfies one vertical and one horizontal
    // predicate, and equal coordinates satisfy both opposing ones.

    /// `other` touches this body from above.
    pub fn is_top_collision(&self, other: &Body, mode: CollisionMode) -> bool {
        self.is_colliding_with(other, mode) && self.y >= other.y
    }

    /// `other` touches this body from below.
    pub fn is_bottom_collision(&self, other: &Body, mode: CollisionMode) -> bool {
        self.is_colliding_with(other, mode) && self.y <= other.y
    }

    /// `other` touches this body from the left.
    pub fn is_left_collision(&self, other: &Body, mode: CollisionMode) -> bool {
        self.is_colliding_with(other, mode) && self.x >= other.x
    }

    /// `other` touches this body from the right.
    pub fn is_right_collision(&self, other: &Body, mode: CollisionMode) -> bool {
        self.is_colliding_with(other, mode) && self.x <= other.x
    }

    /// Pushes this body out of `other` along the axis with the thinner
    /// overlap. Equal positions on that axis leave the body where it is.
    pub fn align_with(&mut self, other: &Body) {
        let overlap = self.bounds().intersection(&other.bounds());
        if overlap.width > overlap.height {
            if self.y < other.y {
                self.set_y(other.y - self.height() as f32);
            } else if self.y > other.y {
                self.set_y(other.y + other.height() as f32);
            }
        } else if self.x < other.x {
            self.set_x(other.x - self.width() as f32);
        } else if self.x > other.x {
            self.set_x(other.x + other.width() as f32);
        }
    }

    pub fn align_next_to(&mut self, other: &Body) {
        let (xd, yd) = self.center_distance(other);
        if xd > yd {
            self.align_horizontally_to(other);
        } else {
            self.align_vertically_to(other);
        }
    }

    pub fn align_horizontally_to(&mut self, other: &Body) {
        if self.x > other.x {
            self.set_x(other.x + other.width() as f32);
        } else if self.x < other.x {
            self.set_x(other.x - self.width() as f32);
        }
    }

    pub fn align_vertically_to(&mut self, other: &Body) {
        if self.y > other.y {
            self.set_y(other.y + other.height() as f32);
        } else if self.y < other.y {
            self.set_y(other.y - self.height() as f32);
        }
    }

    /// Flips horizontal velocity when the centres are further apart along x
    /// than along y, vertical velocity otherwise.
    pub fn bounce(&mut self, other: &Body) {
        let (xd, yd) = self.center_distance(other);
        if xd > yd {
            self.dx = -self.dx;
        } else {
            self.dy = -self.dy;
        }
    }

    fn center_distance(&self, other: &Body) -> (i32, i32) {
        let xd = (other.x + (other.width() / 2) as f32) - (self.x + (self.width() / 2) as f32);
        let yd = (other.y + (other.height() / 2) as f32) - (self.y + (self.height() / 2) as f32);
        ((xd as i32).abs(), (yd as i32).abs())
    }

    pub fn move_horizontally(&mut self, gate: &(impl MovementGate + ?Sized)) {
        let nx = self.x + self.dx;
        if gate.allows(self, nx, self.y) {
            self.set_x(nx);
        }
    }

    pub fn move_vertically(&mut self, gate: &(impl MovementGate + ?Sized)) {
        let ny = self.y + self.dy;
        if gate.allows(self, self.x, ny) {
            self.set_y(ny);
        }
    }

    /// Applies velocity, x first, each axis committed only if the gate agrees.
    pub fn apply_velocity(&mut self, gate: &(impl MovementGate + ?Sized)) {
        self.move_horizontally(gate);
        self.move_vertically(gate);
    }

    /// Steps towards `(nx, ny)`. Each axis moves by `min(distance, speed)`,
    /// never past the target, so diagonal steps can exceed `speed`. Returns
    /// true once both coordinates equal the target.
    pub fn move_to(
        &mut self,
        nx: f32,
        ny: f32,
        speed: f32,
        gate: &(impl MovementGate + ?Sized),
    ) -> bool {
        let distance = ((self.x - nx).powi(2) + (self.y - ny).powi(2)).sqrt();
        let step = distance.min(speed.max(0.0));
        let new_x = step_toward(self.x, nx, step);
        let new_y = step_toward(self.y, ny, step);
        if gate.allows(self, new_x, new_y) {
            if new_x != self.x {
                self.set_x(new_x);
            }
            if new_y != self.y {
                self.set_y(new_y);
            }
        }
        self.x == nx && self.y == ny
    }

    /// Walks this body out of `other` one pixel at a time on the requested
    /// axes and zeroes velocity on each requested axis. Returns the number of
    /// pixel steps taken.
    pub fn move_to_contact(
        &mut self,
        other: &Body,
        horizontal: bool,
        vertical: bool,
        mode: CollisionMode,
    ) -> u32 {
        let mut steps = 0;
        if horizontal {
            if self.is_left_collision(other, mode) {
                let contact = other.x + other.width() as f32;
                steps += self.walk_out(other, mode, Axis::X, 1.0, contact);
            } else if self.is_right_collision(other, mode) {
                let contact = other.x - self.width() as f32;
                steps += self.walk_out(other, mode, Axis::X, -1.0, contact);
            }
            self.dx = 0.0;
        }
        if vertical {
            if self.is_top_collision(other, mode) {
                let contact = other.y + other.height() as f32;
                steps += self.walk_out(other, mode, Axis::Y, 1.0, contact);
            } else if self.is_bottom_collision(other, mode) {
                let contact = other.y - self.height() as f32;
                steps += self.walk_out(other, mode, Axis::Y, -1.0, contact);
            }
            self.dy = 0.0;
        }
        steps
    }

    fn walk_out(
        &mut self,
        other: &Body,
        mode: CollisionMode,
        axis: Axis,
        direction: f32,
        contact: f32,
    ) -> u32 {
        let cap = match axis {
            Axis::X => self.width() + other.width(),
            Axis::Y => self.height() + other.height(),
        }
        .max(1) as u32;

        let start = self.coordinate(axis);
        for steps in 0..cap {
            if !self.is_colliding_with(other, mode) {
                return steps;
            }
            self.place(axis, self.coordinate(axis) + direction);
        }
        if self.is_colliding_with(other, mode) {
            // The adjacent position is only kept if it really clears `other`.
            self.place(axis, contact);
            let resolved = !self.is_colliding_with(other, mode);
            if !resolved {
                self.place(axis, start);
            }
            warn!(?axis, cap, resolved, "contact_walk_capped");
        }
        cap
    }

    fn coordinate(&self, axis: Axis) -> f32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }

    fn place(&mut self, axis: Axis, value: f32) {
        match axis {
            Axis::X => self.set_x(value),
            Axis::Y => self.set_y(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

fn step_toward(current: f32, target: f32, step: f32) -> f32 {
    if current > target {
        (current - step).max(target)
    } else if current < target {
        (current + step).min(target)
    } else {
        current
    }
}
