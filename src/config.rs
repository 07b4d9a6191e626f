//! Boot-time engine configuration.
//!
//! `spec.md` §6 treats the movement/mining/building rate limits, the
//! hysteresis margin, and the expected-wear table as part of the external
//! wire contract: they must be preserved bit-exact when interoperating, so
//! they live in one `Default` impl rather than scattered literals.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Hysteresis margin added to a trigger's `enter_radius` to get its `exit_radius`.
pub const EXIT_RADIUS_MARGIN_METERS: f64 = 10.0;

/// Radius (meters) of the circle characters spawn around the avatar on trigger activation.
pub const SPAWN_CIRCLE_RADIUS_METERS: f64 = 2.0;

/// All tunable limits the engine enforces, boot-loaded once and passed by
/// reference into every component that needs them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Meters/second above which a `LocationClaim` is rejected outright.
    pub max_movement_speed: f64,
    /// Blocks/second above which a `MiningSessionClaim` is rejected.
    pub max_mining_rate: f64,
    /// Blocks/second above which a `BuildingSessionClaim` is rejected.
    pub max_building_rate: f64,
    /// Maximum distance (meters) a claimed block may be from the claim's start/end location.
    pub max_reach_meters: f64,
    /// Expected rare-ore percentage among mined blocks, used by the x-ray heuristic.
    pub expected_rare_ore_percentage: f64,
    /// Expected tool wear per block, keyed by `"{tool_ref}:{block_kind}"` (case-insensitive).
    pub expected_wear_per_block: HashMap<String, f64>,
    /// Fraction of a player's sessions allowed to exceed 90% of the theoretical max rate
    /// before the retrospective analyzer flags speed-hacking.
    pub speed_hack_session_fraction_threshold: f64,
    /// Multiple of `max_movement_speed` above which a location-pair is a teleport candidate.
    pub teleport_speed_multiplier: f64,
    /// Multiple of `expected_rare_ore_percentage` above which aggregate ore yield is suspicious.
    pub xray_ratio_threshold: f64,
    /// Minimum sample size (blocks) before the x-ray heuristic will flag a player.
    pub xray_minimum_sample_blocks: u32,
    /// Fraction of expected wear below which tool durability is flagged (e.g. 0.1 = "10x below").
    pub durability_suspicious_fraction: f64,
    /// Confidence threshold at or above which a `CheatFlag` makes a player "suspicious".
    pub suspicious_confidence_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_movement_speed: 20.0,
            max_mining_rate: 5.0,
            max_building_rate: 5.0,
            max_reach_meters: 6.0,
            expected_rare_ore_percentage: 0.02,
            expected_wear_per_block: HashMap::new(),
            speed_hack_session_fraction_threshold: 0.5,
            teleport_speed_multiplier: 2.0,
            xray_ratio_threshold: 3.0,
            xray_minimum_sample_blocks: 50,
            durability_suspicious_fraction: 0.1,
            suspicious_confidence_threshold: 0.7,
        }
    }
}

impl EngineConfig {
    /// Register (or overwrite) the expected wear-per-block for a `tool_ref`/`block_kind` pair.
    /// Keys are normalized to lowercase so lookups stay case-insensitive, matching the rest
    /// of the catalog's reference-name comparisons.
    pub fn with_expected_wear(
        mut self,
        tool_ref: impl AsRef<str>,
        block_kind: impl AsRef<str>,
        wear_per_block: f64,
    ) -> Self {
        self.expected_wear_per_block.insert(
            wear_key(tool_ref.as_ref(), block_kind.as_ref()),
            wear_per_block,
        );
        self
    }

    pub fn expected_wear_for(&self, tool_ref: &str, block_kind: &str) -> Option<f64> {
        self.expected_wear_per_block
            .get(&wear_key(tool_ref, block_kind))
            .copied()
    }
}

fn wear_key(tool_ref: &str, block_kind: &str) -> String {
    format!("{}:{}", tool_ref.to_ascii_lowercase(), block_kind.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_wear_lookup_is_case_insensitive() {
        let cfg = EngineConfig::default().with_expected_wear("IronPick", "Granite", 0.05);
        assert_eq!(cfg.expected_wear_for("ironpick", "GRANITE"), Some(0.05));
        assert_eq!(cfg.expected_wear_for("copperpick", "granite"), None);
    }

    #[test]
    fn default_matches_spec_literals() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.max_movement_speed, 20.0);
        assert_eq!(EXIT_RADIUS_MARGIN_METERS, 10.0);
    }
}
