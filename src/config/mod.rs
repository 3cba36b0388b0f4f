//! Generator configuration and settings files.
//!
//! `LevelGenerationSettings` bundles the generator knobs with the room type
//! rules. Designers author it as RON (see `config/level_generation.ron`);
//! loading validates it before anything is handed to a generator.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{CONNECTOR_ALIGNMENT, DEFAULT_CHECKER_RADIUS, DEFAULT_DIFFICULTY_LEVEL};
use crate::error::{GenerationError, GenerationResult};
use crate::rules::{RoomType, RoomTypeRules};
use crate::scene::LayerMask;

/// Knobs read by every `generate_level` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Radius of every occupancy probe
    pub checker_radius: f32,
    /// Deepest level that still expands; also the ratio denominator
    pub difficulty_level: u32,
    /// Layers probed at room-side check points
    pub room_check_layer: LayerMask,
    /// Layers probed at door-side check points
    pub door_check_layer: LayerMask,
    /// Type assigned to the starting room
    pub starting_room_type: RoomType,
    /// Base seed; `None` draws a fresh one per generator
    pub seed: Option<u64>,
    /// Minimum dot product for the connecting slot search
    pub connector_alignment: f32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            checker_radius: DEFAULT_CHECKER_RADIUS,
            difficulty_level: DEFAULT_DIFFICULTY_LEVEL,
            room_check_layer: LayerMask::ROOMS,
            door_check_layer: LayerMask::DOORS,
            starting_room_type: RoomType::FourDoor,
            seed: None,
            connector_alignment: CONNECTOR_ALIGNMENT,
        }
    }
}

impl GeneratorConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_difficulty(mut self, difficulty_level: u32) -> Self {
        self.difficulty_level = difficulty_level;
        self
    }

    pub fn validate(&self) -> GenerationResult<()> {
        if self.checker_radius.is_nan() || self.checker_radius <= 0.0 {
            return Err(GenerationError::Configuration(format!(
                "checker_radius must be positive, got {}",
                self.checker_radius
            )));
        }
        if self.difficulty_level < 1 {
            return Err(GenerationError::Configuration(
                "difficulty_level must be at least 1".to_string(),
            ));
        }
        if !(-1.0..=1.0).contains(&self.connector_alignment) {
            return Err(GenerationError::Configuration(format!(
                "connector_alignment must be within [-1, 1], got {}",
                self.connector_alignment
            )));
        }
        Ok(())
    }
}

/// Generator config plus rule table, as authored on disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelGenerationSettings {
    pub generator: GeneratorConfig,
    pub rules: RoomTypeRules,
}

impl LevelGenerationSettings {
    pub fn new(generator: GeneratorConfig, rules: RoomTypeRules) -> Self {
        Self { generator, rules }
    }

    pub fn validate(&self) -> GenerationResult<()> {
        self.generator.validate()?;
        self.rules.validate()
    }

    /// Parse and validate RON text
    pub fn from_ron(text: &str) -> GenerationResult<Self> {
        let settings: Self = ron::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse and validate a RON file
    pub fn load(path: impl AsRef<Path>) -> GenerationResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    pub fn to_ron(&self) -> String {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = GeneratorConfig::default();
        assert_eq!(config.difficulty_level, 3);
        assert_eq!(config.starting_room_type, RoomType::FourDoor);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = GeneratorConfig::default();
        config.checker_radius = 0.0;
        assert!(matches!(
            config.validate(),
            Err(GenerationError::Configuration(_))
        ));

        let config = GeneratorConfig::default().with_difficulty(0);
        assert!(config.validate().is_err());

        let mut config = GeneratorConfig::default();
        config.checker_radius = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ron_roundtrip() {
        let settings = LevelGenerationSettings::new(
            GeneratorConfig::default().with_seed(99),
            RoomTypeRules::default(),
        );
        let text = settings.to_ron();
        let restored = LevelGenerationSettings::from_ron(&text).unwrap();
        assert_eq!(restored, settings);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let text = r#"(generator: (difficulty_level: 5))"#;
        let settings = LevelGenerationSettings::from_ron(text).unwrap();
        assert_eq!(settings.generator.difficulty_level, 5);
        assert_eq!(settings.generator.checker_radius, DEFAULT_CHECKER_RADIUS);
        assert_eq!(settings.rules, RoomTypeRules::default());
    }

    #[test]
    fn test_invalid_rules_rejected() {
        let text = r#"(rules: (bands: [], default_table: []))"#;
        assert!(matches!(
            LevelGenerationSettings::from_ron(text),
            Err(GenerationError::InvalidRule(_))
        ));
    }

    #[test]
    fn test_malformed_ron_rejected() {
        assert!(matches!(
            LevelGenerationSettings::from_ron("(generator: "),
            Err(GenerationError::SettingsParse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut temp = NamedTempFile::new().unwrap();
        write!(
            temp,
            r#"(
                generator: (checker_radius: 1.0, difficulty_level: 2, seed: Some(7)),
                rules: (
                    bands: [(threshold: 0.5, table: [(weight: 1, room_type: TwoDoor)])],
                    default_table: [(weight: 1, room_type: OneDoor)],
                ),
            )"#
        )
        .unwrap();

        let settings = LevelGenerationSettings::load(temp.path()).unwrap();
        assert_eq!(settings.generator.seed, Some(7));
        assert_eq!(settings.rules.bands.len(), 1);
        assert_eq!(settings.rules.bands[0].table.entries[0].room_type, RoomType::TwoDoor);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            LevelGenerationSettings::load("/nonexistent/level_generation.ron"),
            Err(GenerationError::Io(_))
        ));
    }
}
