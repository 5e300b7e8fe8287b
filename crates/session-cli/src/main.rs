//! Session CLI: a demo host for the player session controller.
//!
//! Drives one session at a time against the simulated backend and keeps saved state in a
//! directory of JSON records, so interrupted playback resumes on the next run.
//!
//! ## Commands
//! - `play`: create (or resume) a session and play it to the end.
//! - `inspect`: print saved records.
//! - `release`: close a session and forget its saved state.

mod cli;
mod config;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use player_session::sim::SimBackend;
use player_session::{
    EngineState, FileSessionStore, PlaybackEngine, SessionRegistry, SessionStore,
};
use tracing_subscriber::EnvFilter;

use crate::config::{CliConfig, Settings};

type Registry = SessionRegistry<SimBackend>;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,player_session=info")
        }))
        .init();

    let file_config = match &args.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    let settings = config::resolve(file_config, args.state_dir.clone());
    let store = Arc::new(FileSessionStore::open(settings.state_dir.clone())?);
    tracing::debug!(state_dir = ?store.dir(), "session store opened");

    match args.cmd {
        cli::Command::Play {
            id,
            select,
            stop_after_secs,
            status_ms,
        } => play(
            &settings,
            store,
            &id,
            select.as_deref(),
            stop_after_secs.map(Duration::from_secs),
            Duration::from_millis(status_ms.max(50)),
        ),
        cli::Command::Inspect { id } => inspect(&store, id.as_deref()),
        cli::Command::Release { id } => release(&settings, store, &id),
    }
}

fn registry(settings: &Settings, store: Arc<FileSessionStore>) -> Registry {
    SessionRegistry::new(
        SimBackend::new(settings.media.clone()),
        store,
        settings.session.clone(),
    )
}

/// Save every live session and leave without closing them, as an app killed in the
/// background would.
fn background_and_exit(registry: &Registry, code: i32) -> ! {
    let saved = registry.on_app_backgrounded();
    tracing::info!(saved, "session state saved");
    std::process::exit(code);
}

fn play(
    settings: &Settings,
    store: Arc<FileSessionStore>,
    id: &str,
    select: Option<&str>,
    stop_after: Option<Duration>,
    status_interval: Duration,
) -> Result<()> {
    let registry = Arc::new(registry(settings, store));
    let registry_for_signal = registry.clone();
    let _ = ctrlc::set_handler(move || {
        tracing::info!("interrupted");
        background_and_exit(&registry_for_signal, 130);
    });

    let controller = registry.get(id);
    let handle = controller.get_player()?;
    let resumed_at = controller.with_engine(|engine| engine.player_state())?;
    tracing::info!(
        session_id = %handle.session_id(),
        generation = handle.generation(),
        position_ms = resumed_at.position_ms,
        "playing"
    );
    controller.play()?;

    let mut errors = controller.errors();
    let mut pending_select = select;
    let started = Instant::now();
    loop {
        std::thread::sleep(status_interval);

        while let Ok(message) = errors.try_recv() {
            tracing::warn!(session_id = %id, "engine error: {message}");
        }

        if let Some(name) = pending_select {
            let tracks = controller.with_engine(|engine| engine.current_tracks())?;
            if let Some(track) = tracks
                .into_iter()
                .find(|track| track.name.as_deref() == Some(name))
            {
                tracing::info!(name, indices = ?track.indices, "selecting track");
                controller.set_track_infos(vec![track])?;
                pending_select = None;
            }
        }

        let ui = controller.ui_state();
        tracing::info!(
            position_ms = millis(ui.seek_data.position),
            buffered_ms = millis(ui.seek_data.buffered),
            duration_ms = millis(ui.seek_data.duration),
            usable = ui.is_controller_usable,
            loading = ui.show_loading,
            tracks = ?controller.tracks_state(),
            "status"
        );

        if controller.with_engine(|engine| engine.engine_state())? == EngineState::Ended {
            registry.remove(id);
            tracing::info!(session_id = %id, "finished; saved state cleared");
            return Ok(());
        }
        if stop_after.is_some_and(|limit| started.elapsed() >= limit) {
            tracing::info!(session_id = %id, "stopping early");
            background_and_exit(&registry, 0);
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn inspect(store: &FileSessionStore, id: Option<&str>) -> Result<()> {
    if let Some(id) = id {
        match store.load(id)? {
            Some(saved) => println!("{}", serde_json::to_string_pretty(&saved)?),
            None => println!("no saved state for {id}"),
        }
        return Ok(());
    }

    let ids = store.session_ids()?;
    if ids.is_empty() {
        println!("no saved sessions in {}", store.dir().display());
    }
    for id in ids {
        let Some(saved) = store.load(&id)? else {
            continue;
        };
        let state = saved.player_state.unwrap_or_default();
        println!(
            "{id}\tposition_ms={}\tis_playing={}\tmanual_tracks={}",
            state.position_ms,
            state.is_playing,
            saved.manual_tracks.len()
        );
    }
    Ok(())
}

fn release(settings: &Settings, store: Arc<FileSessionStore>, id: &str) -> Result<()> {
    let existed = store.load(id)?.is_some();
    let registry = registry(settings, store);
    registry.get(id);
    registry.remove(id);
    if existed {
        println!("released {id}");
    } else {
        println!("no saved state for {id}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_saturates_instead_of_wrapping() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
