mod layer;
mod map;
mod stats;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info, trace, warn};

use crate::config::WorldConfig;
use crate::entity::{
    position_collision_free, Body, Entity, EntityId, EntityIdAllocator, EntityKind,
    FrameCommands, FrameContext, Surroundings,
};
use crate::geometry::Rect;
use crate::spatial::QuadTree;
use crate::sprite::Frame;

pub use layer::{Layer, LayerPolicy};
pub use map::{MapGrid, MapLoadError, MapLoader, MapSummary, Tile};
pub use stats::{FrameStats, StatsHandle, StatsSnapshot};

use map::{clamp_px, tiles_to_px};

/// Rounded boxes in the index can sit one pixel off the truncated boxes the
/// collision test uses.
const ROUNDING_SLACK: i32 = 1;

/// The phases `World::update` runs through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    Rebuilding,
    Advancing,
    Colliding,
    Purging,
}

/// One depth's drawable entities, for a renderer.
#[derive(Debug)]
pub struct RenderLayer<'a> {
    pub depth: i32,
    pub items: Vec<RenderItem<'a>>,
}

#[derive(Debug)]
pub struct RenderItem<'a> {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
    pub frame: &'a Frame,
}

/// Registry of every entity in the loaded map and driver of the per-frame
/// rebuild, advance, collide and purge cycle.
///
/// Entities are kept in insertion order, which is also ascending id order.
/// Layer membership is fixed when an entity is added.
pub struct World {
    config: WorldConfig,
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
    layers: BTreeMap<i32, Layer>,
    max_depth: i32,
    index: QuadTree<usize>,
    indexed_bounds: Vec<Rect>,
    pending_removals: Vec<EntityId>,
    commands: FrameCommands,
    map: MapGrid,
    view_offset: (i32, i32),
    frame: u64,
    stats: StatsHandle,
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        let mut index = QuadTree::new(config.spatial);
        index.set_bounds(
            0,
            0,
            clamp_px(config.view_width),
            clamp_px(config.view_height),
        );
        let map = MapGrid::new(0, 0, config.tile_size);
        Self {
            config,
            allocator: EntityIdAllocator::default(),
            entities: Vec::new(),
            layers: BTreeMap::new(),
            max_depth: 0,
            index,
            indexed_bounds: Vec::new(),
            pending_removals: Vec::new(),
            commands: FrameCommands::default(),
            map,
            view_offset: (0, 0),
            frame: 0,
            stats: StatsHandle::default(),
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Cloneable read-only view of the frame counters.
    pub fn stats_handle(&self) -> StatsHandle {
        self.stats.clone()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn add_object(&mut self, mut entity: Entity) -> EntityId {
        let id = self.allocator.allocate();
        entity.assign_id(id);
        let depth = entity.body().depth();
        let key = match self.config.layer_policy {
            LayerPolicy::RunningMax => {
                self.max_depth = self.max_depth.max(depth);
                self.max_depth
            }
            LayerPolicy::OwnDepth => depth,
        };
        self.layers
            .entry(key)
            .or_insert_with(|| Layer::new(key))
            .add(id);
        trace!(id = %id, kind = %entity.kind(), depth, layer = key, "entity_added");
        self.entities.push(entity);
        id
    }

    /// Removes an entity right away. Unknown ids are ignored.
    pub fn remove_object(&mut self, id: EntityId) -> Option<Entity> {
        let slot = self.slot_of(id)?;
        let entity = self.entities.remove(slot);
        for layer in self.layers.values_mut() {
            layer.remove_sorted(&[id]);
        }
        Some(entity)
    }

    /// Removes every entity of `kind`, alive or not. Returns how many went.
    pub fn remove_objects_of_type(&mut self, kind: EntityKind) -> usize {
        let ids: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|entity| entity.is_kind(kind))
            .filter_map(Entity::id)
            .collect();
        self.purge_ids(ids)
    }

    /// Drops every entity and layer. Map data and the depth counter stay.
    pub fn clear_objects(&mut self) {
        self.entities.clear();
        self.layers.clear();
        self.indexed_bounds.clear();
        self.pending_removals.clear();
        self.commands = FrameCommands::default();
        self.index.clear();
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn find(&self, id: EntityId) -> Option<&Entity> {
        self.slot_of(id).map(|slot| &self.entities[slot])
    }

    pub fn find_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.slot_of(id).map(|slot| &mut self.entities[slot])
    }

    /// Alive entities of `kind`.
    pub fn instance_count(&self, kind: EntityKind) -> usize {
        self.count_where(|entity| entity.is_kind(kind) && entity.body().is_alive())
    }

    pub fn count_where(&self, predicate: impl Fn(&Entity) -> bool) -> usize {
        self.entities.iter().filter(|entity| predicate(entity)).count()
    }

    /// True when `subject` placed at `(x, y)` overlaps no live entity whose
    /// solidity equals `solid`. `subject` itself is skipped when it lives in
    /// this world.
    pub fn is_position_collision_free(&self, x: f32, y: f32, solid: bool, subject: &Body) -> bool {
        position_collision_free(
            self.entities.iter(),
            x,
            y,
            solid,
            subject,
            self.config.collision_mode(),
        )
    }

    /// Free of both solid and non-solid entities.
    pub fn is_position_free(&self, x: f32, y: f32, subject: &Body) -> bool {
        self.is_position_collision_free(x, y, true, subject)
            && self.is_position_collision_free(x, y, false, subject)
    }

    /// Layers in ascending depth.
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.values()
    }

    pub fn layer(&self, depth: i32) -> Option<&Layer> {
        self.layers.get(&depth)
    }

    /// Alive members of the layer at `depth`, in insertion order.
    pub fn live_members(&self, depth: i32) -> impl Iterator<Item = &Entity> {
        self.layers
            .get(&depth)
            .into_iter()
            .flat_map(|layer| layer.members().iter())
            .filter_map(move |id| self.find(*id))
            .filter(|entity| entity.body().is_alive())
    }

    /// Drawable entities grouped by layer, deepest layer first.
    pub fn render_order(&self) -> Vec<RenderLayer<'_>> {
        self.layers
            .values()
            .rev()
            .map(|layer| RenderLayer {
                depth: layer.depth(),
                items: self
                    .live_members(layer.depth())
                    .filter_map(|entity| {
                        let id = entity.id()?;
                        let body = entity.body();
                        body.visible_frame().map(|frame| RenderItem {
                            id,
                            x: body.x(),
                            y: body.y(),
                            frame,
                        })
                    })
                    .collect(),
            })
            .collect()
    }

    pub fn view_offset(&self) -> (i32, i32) {
        self.view_offset
    }

    pub fn set_view_offset(&mut self, x: i32, y: i32) {
        self.view_offset = (x, y);
    }

    pub fn map(&self) -> &MapGrid {
        &self.map
    }

    pub fn map_bounds(&self) -> Rect {
        self.map.bounds_px()
    }

    /// Region covered by the spatial index.
    pub fn index_bounds(&self) -> Rect {
        self.index.bounds()
    }

    /// Replaces the world's contents with the entities `loader` produces for
    /// each symbol. Rows shorter than the widest row are padded with empty
    /// cells.
    pub fn load_map<I, S>(&mut self, lines: I, loader: &mut impl MapLoader) -> MapSummary
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.clear_objects();
        self.view_offset = (0, 0);
        self.max_depth = 0;
        self.frame = 0;
        self.stats.reset();

        let rows: Vec<Vec<char>> = lines
            .into_iter()
            .map(|line| line.as_ref().trim_end_matches('\r').chars().collect())
            .collect();
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let padded_rows = rows.iter().filter(|row| row.len() < width).count();
        if padded_rows > 0 {
            warn!(padded_rows, width, "map_rows_padded");
        }

        let tile_size = self.config.tile_size;
        let mut grid = MapGrid::new(width as u32, rows.len() as u32, tile_size);
        let mut summary = MapSummary {
            width_tiles: grid.width(),
            height_tiles: grid.height(),
            padded_rows,
            ..MapSummary::default()
        };
        for (ty, row) in rows.iter().enumerate() {
            for (tx, symbol) in row.iter().copied().enumerate() {
                grid.set_symbol(tx as u32, ty as u32, symbol);
                let px = tiles_to_px(tx as u32, tile_size);
                let py = tiles_to_px(ty as u32, tile_size);
                if let Some(entity) = loader.object(symbol, px, py) {
                    self.add_object(entity);
                    summary.entity_count += 1;
                }
                if let Some(tile) = loader.tile(symbol, px, py) {
                    grid.set_tile(tx as u32, ty as u32, tile);
                    summary.tile_count += 1;
                }
            }
        }
        self.map = grid;

        let index_width = self.map.width_px().max(clamp_px(self.config.view_width));
        let index_height = self.map.height_px().max(clamp_px(self.config.view_height));
        self.index.set_bounds(0, 0, index_width, index_height);
        info!(
            width_tiles = summary.width_tiles,
            height_tiles = summary.height_tiles,
            entity_count = summary.entity_count,
            tile_count = summary.tile_count,
            layer_count = self.layers.len(),
            "map_loaded"
        );
        summary
    }

    pub fn load_map_str(&mut self, text: &str, loader: &mut impl MapLoader) -> MapSummary {
        self.load_map(text.lines(), loader)
    }

    pub fn load_map_file(
        &mut self,
        path: impl AsRef<Path>,
        loader: &mut impl MapLoader,
    ) -> Result<MapSummary, MapLoadError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| MapLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.load_map_str(&text, loader))
    }

    /// Runs one frame and returns its counters.
    pub fn update(&mut self, elapsed_ms: u64) -> FrameStats {
        self.frame = self.frame.saturating_add(1);
        let mut stats = FrameStats {
            frame: self.frame,
            ..FrameStats::default()
        };

        trace!(frame = self.frame, phase = ?FramePhase::Rebuilding, "frame_phase");
        self.rebuild_index();

        trace!(frame = self.frame, phase = ?FramePhase::Advancing, "frame_phase");
        let advanced = self.advance_all(elapsed_ms);
        stats.advanced = advanced.iter().filter(|advanced| **advanced).count();

        trace!(frame = self.frame, phase = ?FramePhase::Colliding, "frame_phase");
        stats.collisions = self.collide_all(&advanced);

        trace!(frame = self.frame, phase = ?FramePhase::Purging, "frame_phase");
        stats.purged = self.purge();
        let spawns = self.commands.take_spawns();
        stats.spawned = spawns.len();
        for entity in spawns {
            self.add_object(entity);
        }
        stats.live = self.entities.len();

        debug!(
            frame = stats.frame,
            advanced = stats.advanced,
            collisions = stats.collisions,
            purged = stats.purged,
            spawned = stats.spawned,
            live = stats.live,
            "frame_completed"
        );
        self.stats.publish(stats);
        stats
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        self.indexed_bounds.clear();
        self.indexed_bounds
            .extend(self.entities.iter().map(|entity| entity.body().bounds()));
        self.index
            .insert_all(self.indexed_bounds.iter().copied().enumerate());
    }

    fn advance_all(&mut self, elapsed_ms: u64) -> Vec<bool> {
        let mode = self.config.collision_mode();
        let map_bounds = self.map.bounds_px();
        let mut advanced = vec![false; self.entities.len()];
        for slot in 0..self.entities.len() {
            let (before, rest) = self.entities.split_at_mut(slot);
            let Some((entity, after)) = rest.split_first_mut() else {
                break;
            };
            if !entity.body().is_alive() {
                self.pending_removals.extend(entity.id());
                continue;
            }
            let env = Surroundings::new(before, after, mode, map_bounds);
            let mut ctx = FrameContext {
                elapsed_ms,
                env,
                commands: &mut self.commands,
            };
            entity.run_update(&mut ctx);
            entity.body_mut().sprite_mut().advance(elapsed_ms);
            entity.apply_velocity(&env);
            advanced[slot] = true;
        }
        advanced
    }

    fn collide_all(&mut self, advanced: &[bool]) -> usize {
        let mode = self.config.collision_mode();
        let (mut slack_x, mut slack_y) = (0, 0);
        for slot in 0..self.entities.len() {
            let (sx, sy) = self.displacement(slot);
            slack_x = slack_x.max(sx);
            slack_y = slack_y.max(sy);
        }

        let mut dispatched = 0;
        for slot in 0..self.entities.len() {
            if !advanced.get(slot).copied().unwrap_or(false) {
                continue;
            }
            let body = self.entities[slot].body();
            if !body.is_alive() || !body.is_collision_listener() {
                continue;
            }
            let query = body
                .bounds()
                .inflate(slack_x + ROUNDING_SLACK, slack_y + ROUNDING_SLACK);
            let mut candidates = self.index.retrieve(&query);
            candidates.sort_unstable();
            candidates.dedup();

            for candidate in candidates {
                if candidate == slot {
                    continue;
                }
                let Some((actor, other)) = pair_mut(&mut self.entities, slot, candidate) else {
                    continue;
                };
                if !other.body().is_alive() {
                    self.pending_removals.extend(other.id());
                    continue;
                }
                if !other.is_colliding_with(actor, mode) {
                    continue;
                }
                let solid = other.body().is_solid();
                if solid {
                    let body = actor.body_mut();
                    body.set_x(body.x() - body.velocity_x());
                    body.set_y(body.y() - body.velocity_y());
                }
                trace!(
                    frame = self.frame,
                    actor = ?actor.id(),
                    other = ?other.id(),
                    solid,
                    "collision_dispatched"
                );
                if actor.run_collision(other, mode, &mut self.commands) {
                    dispatched += 1;
                }

                for moved in [slot, candidate] {
                    let (sx, sy) = self.displacement(moved);
                    slack_x = slack_x.max(sx);
                    slack_y = slack_y.max(sy);
                }
            }
        }
        dispatched
    }

    /// How far an entity's box has drifted from the one it was indexed with.
    fn displacement(&self, slot: usize) -> (i32, i32) {
        let (Some(indexed), Some(entity)) = (self.indexed_bounds.get(slot), self.entities.get(slot))
        else {
            return (0, 0);
        };
        let current = entity.body().bounds();
        let dx = current
            .x
            .abs_diff(indexed.x)
            .max(current.right().abs_diff(indexed.right()));
        let dy = current
            .y
            .abs_diff(indexed.y)
            .max(current.bottom().abs_diff(indexed.bottom()));
        (clamp_px(dx), clamp_px(dy))
    }

    fn purge(&mut self) -> usize {
        let mut ids = std::mem::take(&mut self.pending_removals);
        let (removals, kinds) = self.commands.take_removals();
        ids.extend(removals);
        // Anything destroyed during this frame goes now, callbacks included.
        ids.extend(
            self.entities
                .iter()
                .filter(|entity| {
                    !entity.body().is_alive() || kinds.contains(&entity.kind())
                })
                .filter_map(Entity::id),
        );
        self.purge_ids(ids)
    }

    /// Removes the listed entities from the registry and their layers.
    /// Duplicates and unknown ids are ignored.
    fn purge_ids(&mut self, mut ids: Vec<EntityId>) -> usize {
        if ids.is_empty() {
            return 0;
        }
        ids.sort_unstable();
        ids.dedup();
        let before = self.entities.len();
        self.entities.retain(|entity| {
            entity
                .id()
                .map_or(true, |id| ids.binary_search(&id).is_err())
        });
        for layer in self.layers.values_mut() {
            layer.remove_sorted(&ids);
        }
        before - self.entities.len()
    }

    fn slot_of(&self, id: EntityId) -> Option<usize> {
        self.entities
            .binary_search_by_key(&Some(id), |entity| entity.id())
            .ok()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entities.len())
            .field("layers", &self.layers.len())
            .field("frame", &self.frame)
            .field("map", &(self.map.width(), self.map.height()))
            .finish()
    }
}

/// Two distinct mutable entries of one slice.
fn pair_mut<T>(items: &mut [T], first: usize, second: usize) -> Option<(&mut T, &mut T)> {
    if first == second || first.max(second) >= items.len() {
        return None;
    }
    if first < second {
        let (head, tail) = items.split_at_mut(second);
        Some((&mut head[first], &mut tail[0]))
    } else {
        let (head, tail) = items.split_at_mut(first);
        Some((&mut tail[0], &mut head[second]))
    }
}
