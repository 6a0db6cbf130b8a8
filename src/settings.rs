//! Aggregate settings for the agent, loadable from a RON file.
//!
//! Every knob defaults to the values the task constructors use, so a partial
//! (or absent) settings file is always valid.

use crate::errors::Result;
use crate::tasks::beat_game::BeatGameConfig;
use crate::tasks::chunk_search::ChunkSearchConfig;
use crate::tasks::food::CollectFoodConfig;
use crate::tasks::nether::CollectBlazeRodsConfig;
use crate::tasks::safety::{FleeConfig, ProjectileDodgeConfig};
use crate::types::GameVersion;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub game_version: GameVersion,
    pub beat_game: BeatGameConfig,
    pub food: CollectFoodConfig,
    pub blaze_rods: CollectBlazeRodsConfig,
    pub projectile_dodge: ProjectileDodgeConfig,
    pub flee: FleeConfig,
    pub chunk_search: ChunkSearchConfig,
}

impl AgentSettings {
    /// Load settings from a RON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings: AgentSettings = ron::from_str(&text)?;
        info!("⚙️ Settings loaded from {}", path.display());
        Ok(settings)
    }

    /// Load from a file if given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let settings = AgentSettings::default();
        assert_eq!(settings.beat_game.target_eyes, 14);
        assert_eq!(settings.beat_game.minimum_eyes, 12);
        assert_eq!(settings.beat_game.required_beds, 10);
        assert_eq!(settings.beat_game.min_food_units, 180);
        assert_eq!(settings.food.units_needed, 20);
        assert!(settings.food.cook_food);
        assert_eq!(settings.blaze_rods.count, 7);
        assert_eq!(settings.blaze_rods.max_blaze_count, 5);
        assert_eq!(settings.chunk_search.max_chunks_to_search, 100);
        assert!((settings.projectile_dodge.reaction_time_s - 0.5).abs() < f32::EPSILON);
        assert!((settings.flee.flee_distance - 20.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_round_trips_through_ron() {
        let settings = AgentSettings::default();
        let text = ron::to_string(&settings).unwrap();
        let back: AgentSettings = ron::from_str(&text).unwrap();
        assert_eq!(back.beat_game.target_eyes, settings.beat_game.target_eyes);
        assert_eq!(back.flee.hostile_types, settings.flee.hostile_types);
    }
}
