//! Config file schema and defaults for the demo host.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use player_session::SessionConfig;
use player_session::sim::SimMedia;
use serde::Deserialize;

/// Optional settings loaded from TOML. Missing fields fall back to defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    /// Directory for saved session records.
    pub state_dir: Option<PathBuf>,
    /// Progress tick while an engine is live.
    pub seek_tick_ms: Option<u64>,
    /// Capacity of the error broadcast channel.
    pub event_buffer: Option<usize>,
    /// Length of the simulated media.
    pub media_duration_ms: Option<u64>,
    /// Step interval of the simulated engine.
    pub tick_ms: Option<u64>,
}

impl CliConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        toml::from_str::<CliConfig>(&raw).with_context(|| format!("parse config {:?}", path))
    }
}

/// Fully resolved settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub state_dir: PathBuf,
    pub session: SessionConfig,
    pub media: SimMedia,
}

pub fn resolve(config: CliConfig, state_dir_override: Option<PathBuf>) -> Settings {
    let state_dir = state_dir_override
        .or(config.state_dir)
        .unwrap_or_else(|| std::env::temp_dir().join("player-session"));

    let mut session = SessionConfig::default();
    if let Some(ms) = config.seek_tick_ms {
        session = session.with_seek_tick_interval(Duration::from_millis(ms));
    }
    if let Some(capacity) = config.event_buffer {
        session = session.with_event_buffer(capacity);
    }

    let mut media = SimMedia::default();
    if let Some(ms) = config.media_duration_ms {
        media.duration = Duration::from_millis(ms.max(1));
    }
    if let Some(ms) = config.tick_ms {
        media.tick = Some(Duration::from_millis(ms.max(1)));
    }

    Settings {
        state_dir,
        session,
        media,
    }
}
