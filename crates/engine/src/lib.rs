//! Simulation core of a 2D tile and sprite game: entities with collision
//! helpers, a per-frame quad-tree, and the world that drives them.

pub mod config;
pub mod entity;
pub mod geometry;
pub mod spatial;
pub mod sprite;
pub mod world;

pub use config::{ConfigError, MAX_TILE_SIZE, WorldConfig};
pub use entity::{
    Behavior, Body, Collision, CollisionMode, Entity, EntityId, EntityKind, FrameCommands,
    FrameContext, MovementGate, Surroundings, Unbounded,
};
pub use geometry::Rect;
pub use spatial::{QuadTree, SpatialConfig};
pub use sprite::{AlphaMask, Frame, Sprite};
pub use world::{
    FramePhase, FrameStats, Layer, LayerPolicy, MapGrid, MapLoadError, MapLoader, MapSummary,
    RenderItem, RenderLayer, StatsHandle, StatsSnapshot, Tile, World,
};
