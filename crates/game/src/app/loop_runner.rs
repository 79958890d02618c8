use std::fs;
use std::path::Path;
use std::process::ExitCode;

use serde::Serialize;
use tile_engine::World;
use tracing::{error, info};

use super::bootstrap::{AppWiring, FRAME_MS};
use super::gameplay::{DemoLoader, BALL, COIN, DEMO_MAP, PLAYER, WALL};

const PROGRESS_EVERY_FRAMES: u64 = 120;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(crate) struct RunReport {
    pub(crate) frames: u64,
    pub(crate) live: usize,
    pub(crate) walls: usize,
    pub(crate) balls: usize,
    pub(crate) coins_left: usize,
    pub(crate) players: usize,
    pub(crate) total_collisions: u64,
    pub(crate) total_purged: u64,
    pub(crate) total_spawned: u64,
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let mut world = World::new(app.config.clone());
    let mut loader = DemoLoader {
        tile_size: app.config.tile_size,
    };
    match app.map_path.as_deref() {
        Some(path) => {
            if let Err(err) = world.load_map_file(path, &mut loader) {
                error!(error = %err, "map_load_failed");
                return ExitCode::FAILURE;
            }
        }
        None => {
            world.load_map_str(DEMO_MAP, &mut loader);
        }
    }

    let report = simulate(&mut world, app.frames, FRAME_MS);
    info!(
        frames = report.frames,
        live = report.live,
        coins_left = report.coins_left,
        total_collisions = report.total_collisions,
        "simulation_finished"
    );

    if let Some(path) = app.report_path.as_deref() {
        if let Err(message) = write_report(path, &report) {
            error!(error = %message, "report_write_failed");
            return ExitCode::FAILURE;
        }
        info!(path = %path.display(), "report_written");
    }
    ExitCode::SUCCESS
}

/// Steps `world` for `frames` fixed-length frames.
pub(crate) fn simulate(world: &mut World, frames: u64, frame_ms: u64) -> RunReport {
    for _ in 0..frames {
        let stats = world.update(frame_ms);
        if stats.frame % PROGRESS_EVERY_FRAMES == 0 {
            info!(
                frame = stats.frame,
                live = stats.live,
                collisions = stats.collisions,
                "simulation_progress"
            );
        }
    }

    let totals = world.stats_handle().snapshot();
    RunReport {
        frames: world.frame(),
        live: world.entity_count(),
        walls: world.instance_count(WALL),
        balls: world.instance_count(BALL),
        coins_left: world.instance_count(COIN),
        players: world.instance_count(PLAYER),
        total_collisions: totals.total_collisions,
        total_purged: totals.total_purged,
        total_spawned: totals.total_spawned,
    }
}

fn write_report(path: &Path, report: &RunReport) -> Result<(), String> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|error| format!("encode report json: {error}"))?;
    fs::write(path, json).map_err(|error| format!("write report '{}': {error}", path.display()))
}
