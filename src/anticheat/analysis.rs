//! Retrospective statistical anti-cheat analysis (`spec.md` §4.J).
//!
//! A pure function over an already-committed transaction window: no
//! rejection, only `CheatFlag` reports. Malformed or missing claim data on
//! an individual transaction is skipped rather than treated as corruption —
//! unlike [`crate::replay`], a bad entry here degrades a statistic, it
//! doesn't invalidate a `SagaInstance`.

use chrono::{DateTime, Utc};

use crate::config::EngineConfig;
use crate::transaction::{SagaTransaction, TransactionLog, TransactionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheatType {
    SpeedHack,
    Teleportation,
    XRay,
    Durability,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheatFlag {
    pub cheat_type: CheatType,
    pub confidence: f64,
    pub evidence: String,
    pub first_occurrence: DateTime<Utc>,
    pub occurrence_count: u32,
}

impl CheatFlag {
    /// A player is "suspicious" if any flag meets the configured threshold
    /// (`spec.md` §4.J).
    pub fn is_suspicious(&self, config: &EngineConfig) -> bool {
        self.confidence >= config.suspicious_confidence_threshold
    }
}

/// Mean and population standard deviation of a sample, for z-score community
/// comparison (`spec.md` §4.J "Community comparison").
fn mean_stddev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    (mean, variance.sqrt())
}

/// A player's z-score against a population for one metric (mining rate or
/// rare-ore rate). `None` if the population has zero variance.
pub fn z_score(value: f64, population: &[f64]) -> Option<f64> {
    let (mean, stddev) = mean_stddev(population);
    if stddev == 0.0 {
        return None;
    }
    Some((value - mean) / stddev)
}

pub struct RetrospectiveAnalyzer<'a> {
    config: &'a EngineConfig,
}

impl<'a> RetrospectiveAnalyzer<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Analyze every committed transaction whose effective timestamp falls
    /// in `[t0, t1]`.
    pub fn analyze(&self, log: &TransactionLog, t0: DateTime<Utc>, t1: DateTime<Utc>) -> Vec<CheatFlag> {
        let window: Vec<&SagaTransaction> = log
            .committed()
            .filter(|tx| {
                let ts = tx.effective_timestamp();
                ts >= t0 && ts <= t1
            })
            .collect();

        let mut flags = Vec::new();
        flags.extend(self.detect_speed_hack(&window));
        flags.extend(self.detect_teleportation(&window));
        flags.extend(self.detect_xray(&window));
        flags.extend(self.detect_durability(&window));
        flags
    }

    /// Flags a player whose fraction of mining/building sessions running
    /// above 90% of the rate cap exceeds the configured threshold
    /// (`spec.md` §4.J "Speed-hack").
    fn detect_speed_hack(&self, window: &[&SagaTransaction]) -> Option<CheatFlag> {
        let mut total = 0u32;
        let mut over_threshold = 0u32;
        let mut first_occurrence = None;

        for tx in window {
            let (rate, cap) = match tx.transaction_type {
                TransactionType::MiningSessionClaimed => {
                    let Some(rate) = data_f64(tx, "MiningRate") else { continue };
                    (rate, self.config.max_mining_rate)
                }
                TransactionType::BuildingSessionClaimed => {
                    let Some(rate) = data_f64(tx, "BuildingRate") else { continue };
                    (rate, self.config.max_building_rate)
                }
                _ => continue,
            };
            total += 1;
            if rate > 0.9 * cap {
                over_threshold += 1;
                first_occurrence.get_or_insert(tx.effective_timestamp());
            }
        }

        if total == 0 {
            return None;
        }
        let fraction = over_threshold as f64 / total as f64;
        if fraction <= self.config.speed_hack_session_fraction_threshold {
            return None;
        }
        Some(CheatFlag {
            cheat_type: CheatType::SpeedHack,
            confidence: 0.85,
            evidence: format!(
                "{}/{} sessions ({:.0}%) ran above 90% of the rate cap",
                over_threshold,
                total,
                fraction * 100.0
            ),
            first_occurrence: first_occurrence.unwrap_or_else(Utc::now),
            occurrence_count: over_threshold,
        })
    }

    /// Flags location-pairs implying speed above `teleport_speed_multiplier`
    /// times `max_movement_speed` (`spec.md` §4.J "Teleportation").
    fn detect_teleportation(&self, window: &[&SagaTransaction]) -> Option<CheatFlag> {
        let mut locations: Vec<(DateTime<Utc>, f64, f64, f64)> = window
            .iter()
            .filter(|tx| tx.transaction_type == TransactionType::LocationClaimed)
            .filter_map(|tx| {
                Some((
                    tx.effective_timestamp(),
                    data_f64(tx, "PositionX")?,
                    data_f64(tx, "PositionY")?,
                    data_f64(tx, "PositionZ")?,
                ))
            })
            .collect();
        locations.sort_by_key(|(ts, ..)| *ts);

        let threshold = self.config.teleport_speed_multiplier * self.config.max_movement_speed;
        let mut occurrences = 0u32;
        let mut first_occurrence = None;

        for pair in locations.windows(2) {
            let (t0, x0, y0, z0) = pair[0];
            let (t1, x1, y1, z1) = pair[1];
            let elapsed = (t1 - t0).num_milliseconds() as f64 / 1000.0;
            if elapsed <= 0.0 {
                continue;
            }
            let distance = ((x1 - x0).powi(2) + (y1 - y0).powi(2) + (z1 - z0).powi(2)).sqrt();
            let speed = distance / elapsed;
            if speed > threshold {
                occurrences += 1;
                first_occurrence.get_or_insert(t1);
            }
        }

        if occurrences == 0 {
            return None;
        }
        let confidence = (0.85 + 0.03 * (occurrences.saturating_sub(1)) as f64).min(0.98);
        Some(CheatFlag {
            cheat_type: CheatType::Teleportation,
            confidence,
            evidence: format!("{} location pair(s) exceeded {:.1} m/s", occurrences, threshold),
            first_occurrence: first_occurrence.unwrap_or_else(Utc::now),
            occurrence_count: occurrences,
        })
    }

    /// Flags an aggregate rare-ore rate more than `xray_ratio_threshold`
    /// times expected over at least `xray_minimum_sample_blocks`
    /// (`spec.md` §4.J "X-ray").
    fn detect_xray(&self, window: &[&SagaTransaction]) -> Option<CheatFlag> {
        let mut total_blocks = 0u32;
        let mut total_rare = 0u32;
        let mut first_occurrence = None;

        for tx in window {
            if tx.transaction_type != TransactionType::MiningSessionClaimed {
                continue;
            }
            let Some(blocks) = data_u32(tx, "BlockCount") else { continue };
            let Some(rare_pct) = data_f64(tx, "RareOrePercentage") else { continue };
            total_blocks += blocks;
            total_rare += (rare_pct * blocks as f64).round() as u32;
            first_occurrence.get_or_insert(tx.effective_timestamp());
        }

        if total_blocks < self.config.xray_minimum_sample_blocks {
            return None;
        }
        let observed_rate = total_rare as f64 / total_blocks as f64;
        let expected = self.config.expected_rare_ore_percentage;
        if expected <= 0.0 {
            return None;
        }
        let ratio = observed_rate / expected;
        if ratio <= self.config.xray_ratio_threshold {
            return None;
        }
        let confidence = (0.5 + 0.1 * (ratio - self.config.xray_ratio_threshold)).min(0.95);
        Some(CheatFlag {
            cheat_type: CheatType::XRay,
            confidence,
            evidence: format!(
                "rare-ore rate {:.4} is {:.1}x expected {:.4} over {} blocks",
                observed_rate, ratio, expected, total_blocks
            ),
            first_occurrence: first_occurrence.unwrap_or_else(Utc::now),
            occurrence_count: total_blocks,
        })
    }

    /// Flags tools whose claimed wear per block is below 10% of expected
    /// (`spec.md` §4.J "Durability"), one flag per tool/block-kind pair.
    fn detect_durability(&self, window: &[&SagaTransaction]) -> Vec<CheatFlag> {
        use std::collections::HashMap;

        let mut totals: HashMap<(String, String), (f64, u32, DateTime<Utc>, u32)> = HashMap::new();
        for tx in window {
            if tx.transaction_type != TransactionType::ToolWearClaimed {
                continue;
            }
            let Some(tool_ref) = data(tx, "ToolRef") else { continue };
            let Some(block_kind) = data(tx, "BlockKind") else { continue };
            let Some(blocks_used) = data_u32(tx, "BlocksUsed") else { continue };
            let Some(wear_observed) = data_f64(tx, "WearObserved") else { continue };

            let entry = totals
                .entry((tool_ref.to_ascii_lowercase(), block_kind.to_ascii_lowercase()))
                .or_insert((0.0, 0, tx.effective_timestamp(), 0));
            entry.0 += wear_observed;
            entry.1 += blocks_used;
            entry.3 += 1;
        }

        let mut flags = Vec::new();
        for ((tool_ref, block_kind), (total_wear, total_blocks, first_occurrence, occurrences)) in totals {
            if total_blocks == 0 {
                continue;
            }
            let Some(expected) = self.config.expected_wear_for(&tool_ref, &block_kind) else {
                continue;
            };
            if expected <= 0.0 {
                continue;
            }
            let observed = total_wear / total_blocks as f64;
            if observed < expected * self.config.durability_suspicious_fraction {
                flags.push(CheatFlag {
                    cheat_type: CheatType::Durability,
                    confidence: 0.95,
                    evidence: format!(
                        "{}/{}: observed wear {:.4}/block vs expected {:.4}/block",
                        tool_ref, block_kind, observed, expected
                    ),
                    first_occurrence,
                    occurrence_count: occurrences,
                });
            }
        }
        flags
    }
}

fn data<'a>(tx: &'a SagaTransaction, key: &str) -> Option<&'a str> {
    tx.data.get(key).map(String::as_str)
}

fn data_f64(tx: &SagaTransaction, key: &str) -> Option<f64> {
    data(tx, key)?.parse().ok()
}

fn data_u32(tx: &SagaTransaction, key: &str) -> Option<u32> {
    data(tx, key)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::AvatarId;
    use crate::transaction::TransactionStatus;

    fn location_tx(avatar: AvatarId, x: f64, y: f64, z: f64, ts: DateTime<Utc>) -> SagaTransaction {
        SagaTransaction::new(TransactionType::LocationClaimed, avatar, ts)
            .with_data("PositionX", x.to_string())
            .with_data("PositionY", y.to_string())
            .with_data("PositionZ", z.to_string())
            .committed()
    }

    #[test]
    fn teleport_scenario_flags_with_high_confidence() {
        let config = EngineConfig::default();
        let analyzer = RetrospectiveAnalyzer::new(&config);
        let avatar = AvatarId::new();
        let t0 = Utc::now();
        let mut log = TransactionLog::new();
        log.append(location_tx(avatar, 0.0, 0.0, 0.0, t0));
        log.append(location_tx(avatar, 500.0, 0.0, 0.0, t0 + chrono::Duration::seconds(1)));

        let flags = analyzer.analyze(&log, t0 - chrono::Duration::seconds(1), t0 + chrono::Duration::seconds(10));
        let teleport = flags.iter().find(|f| f.cheat_type == CheatType::Teleportation).unwrap();
        assert!(teleport.confidence >= 0.85);
    }

    #[test]
    fn plausible_locations_produce_no_teleport_flag() {
        let config = EngineConfig::default();
        let analyzer = RetrospectiveAnalyzer::new(&config);
        let avatar = AvatarId::new();
        let t0 = Utc::now();
        let mut log = TransactionLog::new();
        log.append(location_tx(avatar, 0.0, 0.0, 0.0, t0));
        log.append(location_tx(avatar, 5.0, 0.0, 0.0, t0 + chrono::Duration::seconds(1)));

        let flags = analyzer.analyze(&log, t0 - chrono::Duration::seconds(1), t0 + chrono::Duration::seconds(10));
        assert!(!flags.iter().any(|f| f.cheat_type == CheatType::Teleportation));
    }

    #[test]
    fn xray_flags_sustained_excess_rare_ore_rate() {
        let config = EngineConfig::default();
        let analyzer = RetrospectiveAnalyzer::new(&config);
        let avatar = AvatarId::new();
        let t0 = Utc::now();
        let mut log = TransactionLog::new();
        let tx = SagaTransaction::new(TransactionType::MiningSessionClaimed, avatar, t0)
            .with_data("BlockCount", "100")
            .with_data("MiningRate", "1.0")
            .with_data("RareOrePercentage", "0.10") // 5x the 0.02 default
            .committed();
        log.append(tx);

        let flags = analyzer.analyze(&log, t0 - chrono::Duration::seconds(1), t0 + chrono::Duration::seconds(1));
        let xray = flags.iter().find(|f| f.cheat_type == CheatType::XRay).unwrap();
        assert!(xray.confidence > 0.0);
    }

    #[test]
    fn rejected_transactions_are_excluded_from_analysis() {
        let config = EngineConfig::default();
        let analyzer = RetrospectiveAnalyzer::new(&config);
        let avatar = AvatarId::new();
        let t0 = Utc::now();
        let mut log = TransactionLog::new();
        let mut tx = location_tx(avatar, 500.0, 0.0, 0.0, t0);
        tx.status = TransactionStatus::Rejected;
        log.append(tx);

        let flags = analyzer.analyze(&log, t0 - chrono::Duration::seconds(10), t0 + chrono::Duration::seconds(10));
        assert!(flags.is_empty());
    }
}
