//! Headless demo: generate one level against the in-memory scene and print
//! its snapshot as JSON.
//!
//! ```text
//! tower-levelgen [settings.ron] [--watch] [--verbose] [--log-level <level>]
//! ```
//!
//! With `--watch` the settings file is hot reloaded and every successful
//! reload generates a new level; the app keeps running.
//! `--log-level` sets the level of every crate module (`--verbose` is `debug`).

use anyhow::{bail, Context, Result};
use bevy::prelude::*;

use tower_levelgen::constants::DEFAULT_ROOM_SIZE;
use tower_levelgen::generation::plugin::drive_level_generation;
use tower_levelgen::hotreload::{
    HotReloadState, HotReloadStatus, RulesHotReloadPlugin, SettingsReloadEvent,
};
use tower_levelgen::logging::{init_tracing, LogLevel, TracingConfig};
use tower_levelgen::{
    GenerateLevelRequest, GenerationOutcome, LevelGeneratedEvent, LevelGenerationPlugin,
    LevelGenerationSettings, RoomLayout, SceneWorld,
};

#[derive(Resource)]
struct ExitOnFinish(bool);

/// Command line options
#[derive(Debug, Default, PartialEq)]
struct Args {
    path: Option<String>,
    watch: bool,
    log_level: Option<LogLevel>,
}

impl Args {
    fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self> {
        let mut parsed = Args::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--watch" => parsed.watch = true,
                "--verbose" => {
                    parsed.log_level.get_or_insert(LogLevel::Debug);
                }
                "--log-level" => {
                    let name = args.next().context("--log-level needs a value")?;
                    let level = LogLevel::parse(&name)
                        .with_context(|| format!("unknown log level '{name}'"))?;
                    parsed.log_level = Some(level);
                }
                flag if flag.starts_with("--") => bail!("unknown option {flag}"),
                _ if parsed.path.is_none() => parsed.path = Some(arg),
                _ => bail!("unexpected argument {arg}"),
            }
        }
        Ok(parsed)
    }
}

fn main() -> Result<()> {
    let Args {
        path,
        watch,
        log_level,
    } = Args::parse(std::env::args().skip(1))?;

    let tracing = match log_level {
        Some(level) => TracingConfig::verbose(level),
        None => TracingConfig::default(),
    };
    init_tracing(&tracing);

    let settings = match &path {
        Some(path) => LevelGenerationSettings::load(path)
            .with_context(|| format!("failed to load settings from {path}"))?,
        None => LevelGenerationSettings::default(),
    };

    if watch && path.is_none() {
        bail!("--watch needs a settings file");
    }

    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .insert_resource(SceneWorld::new(RoomLayout::square(DEFAULT_ROOM_SIZE)))
        .insert_resource(ExitOnFinish(!watch))
        .add_plugins(LevelGenerationPlugin::<SceneWorld>::new(settings))
        .add_systems(Startup, request_level)
        .add_systems(
            Update,
            report_level.after(drive_level_generation::<SceneWorld>),
        );

    if let Some(path) = path.filter(|_| watch) {
        app.add_plugins(RulesHotReloadPlugin::new(path))
            .add_systems(Update, regenerate_on_reload);
    }

    let exit = app.run();
    if exit.is_error() {
        bail!("level generation failed");
    }
    Ok(())
}

fn request_level(mut requests: EventWriter<GenerateLevelRequest>) {
    requests.send(GenerateLevelRequest::default());
}

fn regenerate_on_reload(
    mut reloads: EventReader<SettingsReloadEvent>,
    state: Res<HotReloadState>,
    mut requests: EventWriter<GenerateLevelRequest>,
) {
    let mut regenerate = false;
    for event in reloads.read() {
        debug!("Hot reload status: {}", HotReloadStatus::from_state(&state).to_json());
        regenerate |= event.success;
    }
    if regenerate {
        requests.send(GenerateLevelRequest::default());
    }
}

fn report_level(
    mut finished: EventReader<LevelGeneratedEvent>,
    exit_on_finish: Res<ExitOnFinish>,
    mut exit: EventWriter<AppExit>,
) {
    for event in finished.read() {
        match &event.outcome {
            GenerationOutcome::Failed(reason) => {
                error!("Generation failed: {}", reason);
                if exit_on_finish.0 {
                    exit.send(AppExit::error());
                }
            }
            outcome => {
                info!(
                    "Generated {} rooms (max depth {}, {:?})",
                    event.snapshot.room_count, event.snapshot.max_depth, outcome
                );
                println!("{}", event.snapshot.to_json());
                if exit_on_finish.0 {
                    exit.send(AppExit::Success);
                }
            }
        }
    }
}
