//! Real-time claim validation: accept or reject before commit (`spec.md` §4.J).
//!
//! Every check here is a pure function of the claim plus [`EngineConfig`]'s
//! thresholds; nothing here touches a [`crate::transaction::TransactionLog`]
//! directly; the caller appends the resulting `*Claimed` transaction (or
//! doesn't, on rejection).

use chrono::{DateTime, Utc};

use crate::config::EngineConfig;
use crate::error::{SagaError, SagaResult};

/// A real-world position in meters, distinct from [`crate::proximity::ModelPoint`]
/// which is 2D model-space (`spec.md` §6 "LocationClaimed" carries X/Y/Z).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl WorldPosition {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance_to(&self, other: WorldPosition) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationClaim {
    pub position: WorldPosition,
    pub claimed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MiningSessionClaim {
    pub block_count: u32,
    pub elapsed_seconds: f64,
    pub rare_ore_count: u32,
    pub start_position: WorldPosition,
    pub end_position: WorldPosition,
}

impl MiningSessionClaim {
    pub fn rate(&self) -> f64 {
        if self.elapsed_seconds <= 0.0 {
            return f64::INFINITY;
        }
        self.block_count as f64 / self.elapsed_seconds
    }

    pub fn rare_ore_percentage(&self) -> f64 {
        if self.block_count == 0 {
            return 0.0;
        }
        self.rare_ore_count as f64 / self.block_count as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildingSessionClaim {
    pub block_count: u32,
    pub elapsed_seconds: f64,
    pub start_position: WorldPosition,
    pub end_position: WorldPosition,
}

impl BuildingSessionClaim {
    pub fn rate(&self) -> f64 {
        if self.elapsed_seconds <= 0.0 {
            return f64::INFINITY;
        }
        self.block_count as f64 / self.elapsed_seconds
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolWearClaim {
    pub tool_ref: String,
    pub block_kind: String,
    pub blocks_used: u32,
    pub wear_observed: f64,
}

impl ToolWearClaim {
    pub fn wear_per_block(&self) -> f64 {
        if self.blocks_used == 0 {
            return 0.0;
        }
        self.wear_observed / self.blocks_used as f64
    }
}

/// Baseline inventory for cross-session reconciliation (`spec.md` §4.J).
/// Recording one never fails; it's a snapshot, not a plausibility check.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InventorySnapshotClaim {
    pub item_quantities: std::collections::HashMap<String, u32>,
    pub credits: i64,
}

/// Validates claims against [`EngineConfig`]'s physical-plausibility thresholds.
pub struct ClaimValidator<'a> {
    config: &'a EngineConfig,
}

impl<'a> ClaimValidator<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Reject if the implied speed from `previous` to `claim` exceeds
    /// `MAX_MOVEMENT_SPEED` (`spec.md` §4.J). A claim with no prior location
    /// on record is always accepted.
    pub fn validate_location(
        &self,
        previous: Option<&LocationClaim>,
        claim: &LocationClaim,
    ) -> SagaResult<()> {
        let Some(previous) = previous else {
            return Ok(());
        };
        let elapsed = claim
            .claimed_at
            .signed_duration_since(previous.claimed_at)
            .num_milliseconds() as f64
            / 1000.0;
        if elapsed <= 0.0 {
            return Ok(());
        }
        let speed = previous.position.distance_to(claim.position) / elapsed;
        if speed > self.config.max_movement_speed {
            return Err(SagaError::anti_cheat_rejected(
                "LocationClaim",
                format!(
                    "speed {:.2} m/s exceeds max {:.2} m/s",
                    speed, self.config.max_movement_speed
                ),
                1.0,
            ));
        }
        Ok(())
    }

    /// Reject above `MAX_MINING_RATE`, or if the claimed path implies more
    /// reach per block than `max_reach_meters` allows (`spec.md` §4.J).
    pub fn validate_mining_session(&self, claim: &MiningSessionClaim) -> SagaResult<()> {
        let rate = claim.rate();
        if rate > self.config.max_mining_rate {
            return Err(SagaError::anti_cheat_rejected(
                "MiningSessionClaim",
                format!(
                    "rate {:.2} blocks/s exceeds max {:.2} blocks/s",
                    rate, self.config.max_mining_rate
                ),
                1.0,
            ));
        }
        self.validate_reach("MiningSessionClaim", claim.start_position, claim.end_position, claim.block_count)
    }

    /// Reject above `MAX_BUILDING_RATE`, same reach rule as mining
    /// (`spec.md` §4.J).
    pub fn validate_building_session(&self, claim: &BuildingSessionClaim) -> SagaResult<()> {
        let rate = claim.rate();
        if rate > self.config.max_building_rate {
            return Err(SagaError::anti_cheat_rejected(
                "BuildingSessionClaim",
                format!(
                    "rate {:.2} blocks/s exceeds max {:.2} blocks/s",
                    rate, self.config.max_building_rate
                ),
                1.0,
            ));
        }
        self.validate_reach("BuildingSessionClaim", claim.start_position, claim.end_position, claim.block_count)
    }

    fn validate_reach(
        &self,
        claim_type: &'static str,
        start: WorldPosition,
        end: WorldPosition,
        block_count: u32,
    ) -> SagaResult<()> {
        if block_count == 0 {
            return Ok(());
        }
        let reach_per_block = start.distance_to(end) / block_count as f64;
        if reach_per_block > self.config.max_reach_meters {
            return Err(SagaError::anti_cheat_rejected(
                claim_type,
                format!(
                    "reach {:.2} m/block exceeds max {:.2} m",
                    reach_per_block, self.config.max_reach_meters
                ),
                1.0,
            ));
        }
        Ok(())
    }

    /// Tool-wear claims never reject outright; they warn when observed wear
    /// is consistently 10x below expected (`spec.md` §4.J). Returns a
    /// human-readable warning when the threshold is crossed.
    pub fn validate_tool_wear(&self, claim: &ToolWearClaim) -> Option<String> {
        let expected = self.config.expected_wear_for(&claim.tool_ref, &claim.block_kind)?;
        if expected <= 0.0 {
            return None;
        }
        let observed = claim.wear_per_block();
        if observed < expected * self.config.durability_suspicious_fraction {
            return Some(format!(
                "observed wear {:.4}/block is {:.1}x below expected {:.4}/block for {}:{}",
                observed,
                expected / observed.max(f64::MIN_POSITIVE),
                expected,
                claim.tool_ref,
                claim.block_kind
            ));
        }
        None
    }

    /// Establishes a reconciliation baseline; always accepted (`spec.md` §4.J).
    pub fn accept_inventory_snapshot(&self, _claim: &InventorySnapshotClaim) -> SagaResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn teleport_scenario_rejects_location_claim() {
        let cfg = config();
        let validator = ClaimValidator::new(&cfg);
        let t0 = Utc::now();
        let previous = LocationClaim {
            position: WorldPosition::new(0.0, 0.0, 0.0),
            claimed_at: t0,
        };
        let claim = LocationClaim {
            position: WorldPosition::new(500.0, 0.0, 0.0),
            claimed_at: t0 + chrono::Duration::seconds(1),
        };
        let err = validator.validate_location(Some(&previous), &claim).unwrap_err();
        assert!(matches!(err, SagaError::AntiCheatRejected { .. }));
    }

    #[test]
    fn plausible_movement_is_accepted() {
        let cfg = config();
        let validator = ClaimValidator::new(&cfg);
        let t0 = Utc::now();
        let previous = LocationClaim {
            position: WorldPosition::new(0.0, 0.0, 0.0),
            claimed_at: t0,
        };
        let claim = LocationClaim {
            position: WorldPosition::new(5.0, 0.0, 0.0),
            claimed_at: t0 + chrono::Duration::seconds(1),
        };
        assert!(validator.validate_location(Some(&previous), &claim).is_ok());
    }

    #[test]
    fn mining_rate_above_max_is_rejected() {
        let cfg = config();
        let validator = ClaimValidator::new(&cfg);
        let claim = MiningSessionClaim {
            block_count: 100,
            elapsed_seconds: 1.0,
            rare_ore_count: 0,
            start_position: WorldPosition::new(0.0, 0.0, 0.0),
            end_position: WorldPosition::new(1.0, 0.0, 0.0),
        };
        assert!(validator.validate_mining_session(&claim).is_err());
    }

    #[test]
    fn excessive_reach_is_rejected() {
        let cfg = config();
        let validator = ClaimValidator::new(&cfg);
        let claim = MiningSessionClaim {
            block_count: 1,
            elapsed_seconds: 10.0,
            rare_ore_count: 0,
            start_position: WorldPosition::new(0.0, 0.0, 0.0),
            end_position: WorldPosition::new(100.0, 0.0, 0.0),
        };
        assert!(validator.validate_mining_session(&claim).is_err());
    }

    #[test]
    fn durability_claim_warns_without_rejecting() {
        let cfg = config().with_expected_wear("IronPick", "Granite", 0.10);
        let validator = ClaimValidator::new(&cfg);
        let claim = ToolWearClaim {
            tool_ref: "IronPick".into(),
            block_kind: "Granite".into(),
            blocks_used: 100,
            wear_observed: 0.5, // 0.005/block, far below the 0.10 expected
        };
        assert!(validator.validate_tool_wear(&claim).is_some());
    }
}
