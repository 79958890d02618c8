use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::CollisionMode;
use crate::spatial::SpatialConfig;
use crate::world::LayerPolicy;

const INLINE_ORIGIN: &str = "<inline>";
/// Largest tile edge a config file may ask for, in pixels.
pub const MAX_TILE_SIZE: u32 = 4096;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {origin}: {message}")]
    Parse { origin: String, message: String },
}

/// Knobs the world reads at construction and on every map load.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Refine box collisions with alpha masks.
    pub pixel_perfect: bool,
    pub tile_size: u32,
    /// Smallest region the spatial index covers, in pixels.
    pub view_width: u32,
    pub view_height: u32,
    pub layer_policy: LayerPolicy,
    pub spatial: SpatialConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            pixel_perfect: false,
            tile_size: 32,
            view_width: 640,
            view_height: 480,
            layer_policy: LayerPolicy::default(),
            spatial: SpatialConfig::default(),
        }
    }
}

impl WorldConfig {
    pub fn collision_mode(&self) -> CollisionMode {
        if self.pixel_perfect {
            CollisionMode::PixelPerfect
        } else {
            CollisionMode::Aabb
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        parse_config_json(raw, INLINE_ORIGIN)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        parse_config_json(&raw, &path.display().to_string())
    }
}

fn parse_config_json(raw: &str, origin: &str) -> Result<WorldConfig, ConfigError> {
    let config = deserialize_config(raw, origin)?;
    if !(1..=MAX_TILE_SIZE).contains(&config.tile_size) {
        return Err(ConfigError::Parse {
            origin: origin.to_string(),
            message: format!(
                "at tile_size: {} is outside 1..={MAX_TILE_SIZE}",
                config.tile_size
            ),
        });
    }
    Ok(config)
}

fn deserialize_config(raw: &str, origin: &str) -> Result<WorldConfig, ConfigError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, WorldConfig>(&mut deserializer).map_err(|error| {
        let field = error.path().to_string();
        let source = error.into_inner();
        let message = if field.is_empty() || field == "." {
            source.to_string()
        } else {
            format!("at {field}: {source}")
        };
        ConfigError::Parse {
            origin: origin.to_string(),
            message,
        }
    })
}
