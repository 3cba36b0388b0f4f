//! Hot reload of the level generation settings file.
//!
//! - `notify` watches the settings file's directory
//! - every change is parsed and validated before it reaches the generator
//! - an invalid file keeps the previous settings (rollback) and is reported
//! - a run in progress picks up new settings on its next `generate_level`

use bevy::prelude::*;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Mutex;

use crate::config::LevelGenerationSettings;
use crate::error::GenerationResult;
use crate::generation::LevelGenerator;

/// Watches `path` and reloads the generator's settings when it changes
pub struct RulesHotReloadPlugin {
    pub path: PathBuf,
}

impl RulesHotReloadPlugin {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Plugin for RulesHotReloadPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(HotReloadState {
            watched_file: Some(self.path.clone()),
            ..Default::default()
        })
        .add_event::<SettingsReloadEvent>()
        .add_systems(Startup, setup_rules_watcher)
        .add_systems(Update, process_rules_changes);
    }
}

#[derive(Resource, Debug, Default)]
pub struct HotReloadState {
    pub enabled: bool,
    pub watched_file: Option<PathBuf>,
    pub reload_count: u32,
    pub last_reload_success: bool,
    pub last_error: Option<String>,
}

/// Sent after every reload attempt
#[derive(Event, Debug, Clone)]
pub struct SettingsReloadEvent {
    pub path: PathBuf,
    pub success: bool,
    pub error: Option<String>,
}

/// File watcher for one settings file
#[derive(Resource)]
pub struct RulesWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
    receiver: Mutex<Receiver<notify::Result<notify::Event>>>,
}

impl RulesWatcher {
    /// Start watching the directory that holds `path`
    pub fn watch(path: impl Into<PathBuf>) -> GenerationResult<Self> {
        let path = path.into();
        let (tx, rx) = channel();
        let mut watcher = notify::recommended_watcher(tx)?;

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        Ok(Self {
            path,
            _watcher: watcher,
            receiver: Mutex::new(rx),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read, parse and validate the watched file
    pub fn reload(&self) -> GenerationResult<LevelGenerationSettings> {
        LevelGenerationSettings::load(&self.path)
    }

    /// Drain pending filesystem events. Reloads once if any of them touched
    /// the watched file.
    pub fn poll(&self) -> Option<GenerationResult<LevelGenerationSettings>> {
        let receiver = self.receiver.lock().ok()?;
        let mut changed = false;
        while let Ok(result) = receiver.try_recv() {
            match result {
                Ok(event) => changed |= is_settings_modify_event(&event, &self.path),
                Err(e) => warn!("File watcher error: {}", e),
            }
        }
        changed.then(|| self.reload())
    }
}

/// Whether `event` modified or created the watched file
fn is_settings_modify_event(event: &notify::Event, watched: &Path) -> bool {
    let Some(name) = watched.file_name() else {
        return false;
    };
    (event.kind.is_modify() || event.kind.is_create())
        && event.paths.iter().any(|p| p.file_name() == Some(name))
}

fn setup_rules_watcher(mut commands: Commands, mut state: ResMut<HotReloadState>) {
    let Some(path) = state.watched_file.clone() else {
        return;
    };

    if !path.exists() {
        warn!("Settings file not found: {:?}", path);
        state.enabled = false;
        return;
    }

    match RulesWatcher::watch(&path) {
        Ok(watcher) => {
            state.enabled = true;
            commands.insert_resource(watcher);
            info!("Hot reload enabled for {:?}", path);
        }
        Err(e) => {
            error!("Failed to watch settings file: {}", e);
            state.enabled = false;
        }
    }
}

fn process_rules_changes(
    watcher: Option<Res<RulesWatcher>>,
    generator: Option<ResMut<LevelGenerator>>,
    mut state: ResMut<HotReloadState>,
    mut events: EventWriter<SettingsReloadEvent>,
) {
    let Some(watcher) = watcher else {
        return;
    };
    let Some(result) = watcher.poll() else {
        return;
    };

    let event = match generator {
        Some(mut generator) => apply_reload(result, &mut generator, &mut state, watcher.path()),
        None => apply_reload_status(result.map(|_| ()), &mut state, watcher.path()),
    };
    events.send(event);
}

/// Hand reloaded settings to the generator, or keep the old ones on error
fn apply_reload(
    result: GenerationResult<LevelGenerationSettings>,
    generator: &mut LevelGenerator,
    state: &mut HotReloadState,
    path: &Path,
) -> SettingsReloadEvent {
    let status = result.map(|settings| generator.replace_settings(settings));
    apply_reload_status(status, state, path)
}

fn apply_reload_status(
    status: GenerationResult<()>,
    state: &mut HotReloadState,
    path: &Path,
) -> SettingsReloadEvent {
    match status {
        Ok(()) => {
            state.reload_count += 1;
            state.last_reload_success = true;
            state.last_error = None;
            info!("Settings reloaded (count: {})", state.reload_count);
            SettingsReloadEvent {
                path: path.to_path_buf(),
                success: true,
                error: None,
            }
        }
        Err(e) => {
            let message = e.to_string();
            state.last_reload_success = false;
            state.last_error = Some(message.clone());
            error!("Settings reload failed, keeping previous settings: {}", message);
            SettingsReloadEvent {
                path: path.to_path_buf(),
                success: false,
                error: Some(message),
            }
        }
    }
}

/// Serializable view of `HotReloadState`
#[derive(Debug, Serialize, Deserialize)]
pub struct HotReloadStatus {
    pub enabled: bool,
    pub watched_file: Option<String>,
    pub reload_count: u32,
    pub last_reload_success: bool,
    pub last_error: Option<String>,
}

impl HotReloadStatus {
    pub fn from_state(state: &HotReloadState) -> Self {
        Self {
            enabled: state.enabled,
            watched_file: state.watched_file.as_ref().map(|p| p.display().to_string()),
            reload_count: state.reload_count,
            last_reload_success: state.last_reload_success,
            last_error: state.last_error.clone(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorConfig;
    use crate::error::GenerationError;
    use crate::rules::RoomTypeRules;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    const SETTINGS: &str = "(generator: (difficulty_level: 6, seed: Some(3)))";

    fn modify_event(path: &str) -> notify::Event {
        notify::Event {
            kind: notify::EventKind::Modify(notify::event::ModifyKind::Data(
                notify::event::DataChange::Any,
            )),
            paths: vec![PathBuf::from(path)],
            attrs: Default::default(),
        }
    }

    #[test]
    fn test_is_settings_modify_event() {
        let watched = Path::new("config/level_generation.ron");
        assert!(is_settings_modify_event(
            &modify_event("/abs/config/level_generation.ron"),
            watched
        ));
        assert!(!is_settings_modify_event(&modify_event("config/other.ron"), watched));

        let access = notify::Event {
            kind: notify::EventKind::Access(notify::event::AccessKind::Any),
            paths: vec![PathBuf::from("config/level_generation.ron")],
            attrs: Default::default(),
        };
        assert!(!is_settings_modify_event(&access, watched));
    }

    #[test]
    fn test_watch_and_reload() {
        let mut temp = NamedTempFile::new().unwrap();
        write!(temp, "{}", SETTINGS).unwrap();

        let watcher = RulesWatcher::watch(temp.path()).unwrap();
        assert_eq!(watcher.path(), temp.path());
        let settings = watcher.reload().unwrap();
        assert_eq!(settings.generator.difficulty_level, 6);
    }

    #[test]
    fn test_watch_missing_directory_fails() {
        let result = RulesWatcher::watch("/nonexistent/dir/level_generation.ron");
        assert!(matches!(result, Err(GenerationError::Watch(_))));
    }

    #[test]
    fn test_apply_reload_updates_generator() {
        let mut generator = LevelGenerator::new(LevelGenerationSettings::default());
        let mut state = HotReloadState::default();
        let path = Path::new("level_generation.ron");

        let reloaded = LevelGenerationSettings::from_ron(SETTINGS).unwrap();
        let event = apply_reload(Ok(reloaded), &mut generator, &mut state, path);
        assert!(event.success);
        assert_eq!(state.reload_count, 1);
        assert_eq!(generator.settings().generator.difficulty_level, 6);
        assert_eq!(generator.seed().seed, 3);
    }

    #[test]
    fn test_invalid_reload_keeps_previous_settings() {
        let original = LevelGenerationSettings::new(
            GeneratorConfig::default().with_difficulty(2),
            RoomTypeRules::default(),
        );
        let mut generator = LevelGenerator::new(original.clone());
        let mut state = HotReloadState::default();

        let broken = LevelGenerationSettings::from_ron("(generator: (difficulty_level: 0))");
        let event = apply_reload(broken, &mut generator, &mut state, Path::new("x.ron"));
        assert!(!event.success);
        assert!(event.error.is_some());
        assert!(!state.last_reload_success);
        assert_eq!(state.reload_count, 0);
        assert_eq!(generator.settings(), &original);
    }

    #[test]
    fn test_plugin_enables_watcher() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("level_generation.ron");
        std::fs::write(&path, SETTINGS).unwrap();

        let mut app = App::new();
        app.add_plugins(RulesHotReloadPlugin::new(&path));
        app.update();

        let state = app.world().resource::<HotReloadState>();
        assert!(state.enabled);
        assert!(app.world().contains_resource::<RulesWatcher>());
    }

    #[test]
    fn test_plugin_missing_file_disabled() {
        let dir = tempdir().unwrap();
        let mut app = App::new();
        app.add_plugins(RulesHotReloadPlugin::new(dir.path().join("missing.ron")));
        app.update();

        assert!(!app.world().resource::<HotReloadState>().enabled);
        assert!(!app.world().contains_resource::<RulesWatcher>());
    }

    #[test]
    fn test_status_json() {
        let state = HotReloadState {
            enabled: true,
            watched_file: Some(PathBuf::from("config/level_generation.ron")),
            reload_count: 2,
            last_reload_success: true,
            last_error: None,
        };
        let json = HotReloadStatus::from_state(&state).to_json();
        assert!(json.contains("\"enabled\":true"));
        assert!(json.contains("\"reload_count\":2"));
    }
}
