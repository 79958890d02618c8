use std::env;
use std::path::PathBuf;

use tile_engine::{ConfigError, WorldConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub(crate) const CONFIG_ENV_VAR: &str = "TILESIM_CONFIG";
pub(crate) const PIXEL_PERFECT_ENV_VAR: &str = "TILESIM_PIXEL_PERFECT";
pub(crate) const FRAMES_ENV_VAR: &str = "TILESIM_FRAMES";
pub(crate) const MAP_ENV_VAR: &str = "TILESIM_MAP";
pub(crate) const REPORT_ENV_VAR: &str = "TILESIM_REPORT";
pub(crate) const DEFAULT_FRAME_COUNT: u64 = 600;
pub(crate) const FRAME_MS: u64 = 16;

pub(crate) struct AppWiring {
    pub(crate) config: WorldConfig,
    pub(crate) frames: u64,
    pub(crate) map_path: Option<PathBuf>,
    pub(crate) report_path: Option<PathBuf>,
}

pub(crate) fn build_app() -> Result<AppWiring, ConfigError> {
    init_tracing();
    info!("=== Tile Sim Startup ===");

    let mut config = match env::var_os(CONFIG_ENV_VAR) {
        Some(path) => WorldConfig::load(PathBuf::from(path))?,
        None => WorldConfig::default(),
    };
    config.pixel_perfect = resolve_pixel_perfect(
        env::var(PIXEL_PERFECT_ENV_VAR).ok().as_deref(),
        config.pixel_perfect,
    );
    let frames = resolve_frame_count(env::var(FRAMES_ENV_VAR).ok().as_deref());
    info!(
        pixel_perfect = config.pixel_perfect,
        tile_size = config.tile_size,
        layer_policy = ?config.layer_policy,
        frames,
        "config_resolved"
    );

    Ok(AppWiring {
        config,
        frames,
        map_path: env::var_os(MAP_ENV_VAR).map(PathBuf::from),
        report_path: env::var_os(REPORT_ENV_VAR).map(PathBuf::from),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

pub(crate) fn resolve_pixel_perfect(raw: Option<&str>, configured: bool) -> bool {
    match raw.map(str::trim) {
        None => configured,
        Some("1") | Some("true") => true,
        Some("0") | Some("false") => false,
        Some(value) => {
            warn!(
                env_var = PIXEL_PERFECT_ENV_VAR,
                value,
                fallback = configured,
                "invalid pixel-perfect env var value; falling back to config"
            );
            configured
        }
    }
}

pub(crate) fn resolve_frame_count(raw: Option<&str>) -> u64 {
    match raw.map(str::trim) {
        None => DEFAULT_FRAME_COUNT,
        Some(value) => match value.parse::<u64>() {
            Ok(frames) => frames,
            Err(_) => {
                warn!(
                    env_var = FRAMES_ENV_VAR,
                    value,
                    fallback = DEFAULT_FRAME_COUNT,
                    "invalid frame count env var value; using default"
                );
                DEFAULT_FRAME_COUNT
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_perfect_override_accepts_flags_and_falls_back() {
        assert!(resolve_pixel_perfect(Some("1"), false));
        assert!(resolve_pixel_perfect(Some(" true "), false));
        assert!(!resolve_pixel_perfect(Some("0"), true));
        assert!(resolve_pixel_perfect(None, true));
        assert!(!resolve_pixel_perfect(Some("sometimes"), false));
    }

    #[test]
    fn frame_count_parses_or_defaults() {
        assert_eq!(resolve_frame_count(Some("120")), 120);
        assert_eq!(resolve_frame_count(None), DEFAULT_FRAME_COUNT);
        assert_eq!(resolve_frame_count(Some("-4")), DEFAULT_FRAME_COUNT);
    }
}
