//! Game settings
//!
//! Persisted as JSON next to the save directory. Missing or malformed files
//! fall back to defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::sim::state::Rules;

/// How the ball reacts to striking the left side of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BlockSideResponse {
    /// Left and right side hits both send the ball right
    #[default]
    Historical,
    /// Left side hits send the ball left, right side hits send it right
    Mirrored,
}

/// Whether the session clock keeps running while paused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ClockPolicy {
    /// Clock stops with the pause gate (gold status is frozen too)
    #[default]
    Pausable,
    /// Clock keeps ticking while paused
    Free,
}

/// Game settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Loop ===
    /// Logic, physics and render rate
    pub ticks_per_second: u32,
    pub clock_policy: ClockPolicy,

    // === Rules ===
    /// Reaching this level wins the game
    pub final_level: u32,
    pub starting_lives: u32,
    /// Gold status duration
    pub invincibility_ms: u64,
    pub block_side_response: BlockSideResponse,
    /// Level generation seed (random when unset)
    pub seed: Option<u64>,

    // === Persistence ===
    pub save_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            clock_policy: ClockPolicy::Pausable,

            final_level: FINAL_LEVEL,
            starting_lives: STARTING_LIVES,
            invincibility_ms: INVINCIBILITY_MS,
            block_side_response: BlockSideResponse::Historical,
            seed: None,

            save_path: PathBuf::from("saves/save.mdds"),
        }
    }
}

impl Settings {
    /// Rules handed to a new session
    pub fn rules(&self) -> Rules {
        Rules {
            final_level: self.final_level.max(1),
            starting_lives: self.starting_lives.max(1),
            invincibility_ms: self.invincibility_ms,
            block_side_response: self.block_side_response,
            clock_policy: self.clock_policy,
        }
    }

    /// Seed to use for a new session
    pub fn session_seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }

    /// Load settings from a JSON file
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str::<Settings>(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    return settings;
                }
                Err(e) => log::warn!("Ignoring malformed settings {}: {}", path.display(), e),
            },
            Err(e) => log::info!("No settings at {} ({}), using defaults", path.display(), e),
        }

        Self::default()
    }

    /// Save settings as pretty JSON
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.ticks_per_second, 120);
        assert_eq!(settings.final_level, 18);
        assert_eq!(settings.clock_policy, ClockPolicy::Pausable);
        assert_eq!(settings.rules().invincibility_ms, 5000);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "final_level": 5, "block_side_response": "Mirrored" }"#)
                .unwrap();
        assert_eq!(settings.final_level, 5);
        assert_eq!(settings.block_side_response, BlockSideResponse::Mirrored);
        assert_eq!(settings.starting_lives, 3);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("settings.json");
        let settings = Settings {
            seed: Some(42),
            ticks_per_second: 60,
            clock_policy: ClockPolicy::Free,
            ..Default::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path), settings);
    }

    #[test]
    fn test_load_missing_or_malformed() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Settings::load(&dir.path().join("missing.json")), Settings::default());

        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
    }
}
