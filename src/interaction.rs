//! The interaction service (`spec.md` §4.F) — the engine's main entry point.
//!
//! `update_with_avatar_position` and `interact_with_feature` are the only
//! operations that append transactions; everything else here is a
//! non-mutating query. Every mutating call validates first and appends
//! either its whole batch of transactions or none (`spec.md` §5
//! "Cancellation").

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::availability::{can_activate_trigger, can_interact_with_feature, AvailabilityCheck};
use crate::avatar::Avatar;
use crate::catalog::entries::normalize_ref;
use crate::catalog::{Catalog, CharacterSpawn};
use crate::error::{SagaError, SagaResult};
use crate::ids::CharacterInstanceId;
use crate::proximity::{self, ModelPoint};
use crate::replay::replay;
use crate::rng::SeededRng;
use crate::state::{SagaState, TriggerStatus};
use crate::transaction::{SagaTransaction, TransactionLog, TransactionType};
use crate::trigger_expander::ExpandedTrigger;

/// One Saga instance's precomputed triggers and append-only log
/// (`spec.md` §3 "SagaInstance"). All of an arc's triggers share the arc's
/// GPS-derived model-space center.
#[derive(Debug, Clone)]
pub struct SagaInstance {
    pub saga_ref: String,
    pub center: ModelPoint,
    pub triggers: Vec<ExpandedTrigger>,
    pub log: TransactionLog,
}

impl SagaInstance {
    pub fn new(saga_ref: impl Into<String>, center: ModelPoint, triggers: Vec<ExpandedTrigger>) -> Self {
        Self {
            saga_ref: saga_ref.into(),
            center,
            triggers,
            log: TransactionLog::new(),
        }
    }

    pub fn state(&self) -> SagaResult<SagaState> {
        replay(&self.log)
    }

    fn trigger(&self, trigger_ref: &str) -> Option<&ExpandedTrigger> {
        self.triggers
            .iter()
            .find(|t| t.trigger.trigger_ref.eq_ignore_ascii_case(trigger_ref))
    }
}

/// Proximity info for one trigger, returned by non-mutating queries
/// (`spec.md` §4.F.3).
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityInfo {
    pub trigger_ref: String,
    pub distance: f64,
    pub enter_radius: f64,
    pub exit_radius: f64,
    pub status: TriggerStatus,
}

/// Stateless service over one catalog; construct once and reuse across
/// instances, mirroring the teacher's application-service shape.
pub struct InteractionService<'a> {
    catalog: &'a Catalog,
}

impl<'a> InteractionService<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Phase 1 (exits) then phase 2 (enters), driven by the avatar's new
    /// position. `seed` feeds every randomized outcome this call produces
    /// (spawn jitter, archetype picks); the same `(seed, position, instance
    /// state)` always yields the same transactions (`spec.md` §4.B, §8
    /// "Spawn determinism").
    #[instrument(skip(self, instance, avatar), fields(saga_ref = %instance.saga_ref))]
    pub fn update_with_avatar_position(
        &self,
        instance: &mut SagaInstance,
        position: ModelPoint,
        avatar: &mut Avatar,
        seed: u64,
        now: DateTime<Utc>,
    ) -> SagaResult<()> {
        let mut rng = SeededRng::new(seed);

        self.run_exit_phase(instance, position, avatar, now)?;
        self.run_enter_phase(instance, position, avatar, &mut rng, seed, now)?;
        self.run_respawn_phase(instance, position, avatar, &mut rng, seed, now)?;

        avatar.position = position;
        Ok(())
    }

    fn run_exit_phase(
        &self,
        instance: &mut SagaInstance,
        position: ModelPoint,
        avatar: &Avatar,
        now: DateTime<Utc>,
    ) -> SagaResult<()> {
        let state = instance.state()?;
        let center = instance.center;

        for trigger in instance.triggers.clone() {
            let trigger_ref = &trigger.trigger.trigger_ref;
            if state.trigger(trigger_ref).status != TriggerStatus::Active {
                continue;
            }
            let distance = proximity::model_distance(center, position);
            let exit_radius = trigger.exit_radius();
            if distance <= exit_radius {
                continue;
            }

            info!(%trigger_ref, distance, exit_radius, "player exited trigger");
            instance.log.append(
                SagaTransaction::new(TransactionType::PlayerExited, avatar.avatar_id, now)
                    .with_data("TriggerRef", trigger_ref.clone())
                    .with_data("DistanceMeters", distance.to_string())
                    .with_data("ExitRadius", exit_radius.to_string())
                    .committed(),
            );

            for (instance_id, character) in &state.characters {
                if character.is_spawned
                    && character
                        .spawned_by_trigger_ref
                        .as_deref()
                        .map(normalize_ref)
                        .as_deref()
                        == Some(&normalize_ref(trigger_ref))
                {
                    instance.log.append(
                        SagaTransaction::new(TransactionType::CharacterDespawned, avatar.avatar_id, now)
                            .with_data("CharacterInstanceId", instance_id.to_string())
                            .with_data("CharacterRef", character.character_ref.clone())
                            .with_data("Reason", "PlayerExited")
                            .with_data("TriggerRef", trigger_ref.clone())
                            .committed(),
                    );
                }
            }
        }
        Ok(())
    }

    fn run_enter_phase(
        &self,
        instance: &mut SagaInstance,
        position: ModelPoint,
        avatar: &mut Avatar,
        rng: &mut SeededRng,
        seed: u64,
        now: DateTime<Utc>,
    ) -> SagaResult<()> {
        let state = instance.state()?;
        let center = instance.center;

        for trigger in instance.triggers.clone() {
            let trigger_ref = trigger.trigger.trigger_ref.clone();
            if state.trigger(&trigger_ref).status != TriggerStatus::Inactive {
                continue;
            }
            let distance = proximity::model_distance(center, position);
            if distance > trigger.trigger.enter_radius {
                continue;
            }

            let check: AvailabilityCheck = can_activate_trigger(avatar, &trigger);
            if !check.can_proceed {
                let missing = check.missing_quest_tokens.join(", ");
                debug!(%trigger_ref, %missing, "trigger gated");
                continue;
            }

            info!(%trigger_ref, distance, "player entered trigger");
            instance.log.append(
                SagaTransaction::new(TransactionType::PlayerEntered, avatar.avatar_id, now)
                    .with_data("TriggerRef", trigger_ref.clone())
                    .with_data("DistanceMeters", distance.to_string())
                    .with_data("EnterRadius", trigger.trigger.enter_radius.to_string())
                    .committed(),
            );
            instance.log.append(
                SagaTransaction::new(TransactionType::TriggerActivated, avatar.avatar_id, now)
                    .with_data("SagaTriggerRef", trigger_ref.clone())
                    .with_data("AvatarX", position.x.to_string())
                    .with_data("AvatarZ", position.z.to_string())
                    .with_data("Seed", seed.to_string())
                    .committed(),
            );

            for token in &trigger.trigger.gives_quest_tokens {
                instance.log.append(
                    SagaTransaction::new(TransactionType::QuestTokenAwarded, avatar.avatar_id, now)
                        .with_data("QuestTokenRef", token.clone())
                        .with_data("Reason", "TriggerActivated")
                        .with_data("SagaTriggerRef", trigger_ref.clone())
                        .committed(),
                );
                avatar.grant_quest_token(token);
            }

            self.spawn_characters(instance, &trigger, position, rng, avatar, now);
        }
        Ok(())
    }

    fn spawn_characters(
        &self,
        instance: &mut SagaInstance,
        trigger: &ExpandedTrigger,
        avatar_position: ModelPoint,
        rng: &mut SeededRng,
        avatar: &Avatar,
        now: DateTime<Utc>,
    ) {
        let resolved = self.resolve_spawns(&trigger.trigger.spawns, rng);
        if resolved.is_empty() {
            return;
        }
        let positions = proximity::spawn_circle_positions(avatar_position, resolved.len(), rng);

        for (character_ref, position) in resolved.into_iter().zip(positions) {
            let instance_id = CharacterInstanceId::new();
            instance.log.append(
                SagaTransaction::new(TransactionType::CharacterSpawned, avatar.avatar_id, now)
                    .with_data("CharacterInstanceId", instance_id.to_string())
                    .with_data("CharacterRef", character_ref)
                    .with_data("SagaTriggerRef", trigger.trigger.trigger_ref.clone())
                    .with_data("X", position.x.to_string())
                    .with_data("Z", position.z.to_string())
                    .with_data("SpawnHeight", "0".to_string())
                    .committed(),
            );
        }
    }

    /// Expand `CharacterSpawn`s into concrete `(character_ref)` entries,
    /// picking uniformly from an archetype's pool with `rng`
    /// (`spec.md` §4.F.1).
    fn resolve_spawns(&self, spawns: &[CharacterSpawn], rng: &mut SeededRng) -> Vec<String> {
        let mut resolved = Vec::new();
        for spawn in spawns {
            match spawn {
                CharacterSpawn::Character { character_ref, count } => {
                    for _ in 0..*count {
                        resolved.push(character_ref.clone());
                    }
                }
                CharacterSpawn::Archetype { archetype_ref, count } => {
                    let Some(archetype) = self.catalog.character_archetype(archetype_ref) else {
                        warn!(%archetype_ref, "archetype not found, skipping spawn");
                        continue;
                    };
                    if archetype.pool.is_empty() {
                        continue;
                    }
                    for _ in 0..*count {
                        let pick = rng.pick_index(archetype.pool.len());
                        resolved.push(archetype.pool[pick].clone());
                    }
                }
            }
        }
        resolved
    }

    /// Respawn characters whose defeat is old enough, for every currently
    /// `Active` trigger (`spec.md` §4.F.1).
    fn run_respawn_phase(
        &self,
        instance: &mut SagaInstance,
        avatar_position: ModelPoint,
        avatar: &Avatar,
        rng: &mut SeededRng,
        seed: u64,
        now: DateTime<Utc>,
    ) -> SagaResult<()> {
        let state = instance.state()?;

        let mut respawns = Vec::new();
        for (instance_id, character) in &state.characters {
            if character.is_alive {
                continue;
            }
            let Some(trigger_ref) = &character.spawned_by_trigger_ref else {
                continue;
            };
            if state.trigger(trigger_ref).status != TriggerStatus::Active {
                continue;
            }
            let Some(template) = self.catalog.character(&character.character_ref) else {
                continue;
            };
            if template.respawn_interval_seconds == 0 {
                continue;
            }
            let Some(defeated_at) = character.defeated_at else {
                continue;
            };
            let elapsed = now.signed_duration_since(defeated_at).num_seconds();
            if elapsed < template.respawn_interval_seconds as i64 {
                continue;
            }
            let already_replaced = state
                .characters
                .values()
                .any(|c| c.previous_instance_id == Some(*instance_id));
            if already_replaced {
                continue;
            }
            respawns.push((*instance_id, character.character_ref.clone(), trigger_ref.clone()));
        }

        for (previous_instance_id, character_ref, trigger_ref) in respawns {
            let position = proximity::jittered_spawn_position(
                avatar_position,
                crate::config::SPAWN_CIRCLE_RADIUS_METERS,
                0,
                1,
                rng,
            );
            let new_instance_id = CharacterInstanceId::new();
            info!(%character_ref, %previous_instance_id, "respawning character");
            instance.log.append(
                SagaTransaction::new(TransactionType::CharacterSpawned, avatar.avatar_id, now)
                    .with_data("CharacterInstanceId", new_instance_id.to_string())
                    .with_data("CharacterRef", character_ref)
                    .with_data("SagaTriggerRef", trigger_ref)
                    .with_data("X", position.x.to_string())
                    .with_data("Z", position.z.to_string())
                    .with_data("SpawnHeight", "0".to_string())
                    .with_data("IsRespawn", "true")
                    .with_data("PreviousInstanceId", previous_instance_id.to_string())
                    .with_data("Seed", seed.to_string())
                    .committed(),
            );
        }
        Ok(())
    }

    /// Interact with a feature at the Saga's center. Pre-validates via
    /// availability; on failure, appends nothing (`spec.md` §4.F.2).
    #[instrument(skip(self, instance, avatar), fields(saga_ref = %instance.saga_ref))]
    pub fn interact_with_feature(
        &self,
        instance: &mut SagaInstance,
        feature_ref: &str,
        avatar: &mut Avatar,
        now: DateTime<Utc>,
    ) -> SagaResult<()> {
        let feature = self
            .catalog
            .saga_feature(feature_ref)
            .ok_or_else(|| SagaError::unknown_ref("SagaFeature", feature_ref))?;

        let state = instance.state()?;
        let interaction_count = state
            .feature_interactions
            .get(&normalize_ref(feature_ref))
            .and_then(|by_avatar| by_avatar.get(&avatar.avatar_id))
            .map(|record| record.count)
            .unwrap_or(0);

        let check = can_interact_with_feature(avatar, &feature.interactable, interaction_count);
        if !check.can_proceed {
            let reason = if !check.missing_quest_tokens.is_empty() {
                format!("Missing quest tokens: {}", check.missing_quest_tokens.join(", "))
            } else {
                "maximum interactions reached".to_string()
            };
            warn!(%feature_ref, %reason, "feature interaction rejected");
            return Err(SagaError::feature_not_interactable(reason));
        }

        instance.log.append(
            SagaTransaction::new(TransactionType::EntityInteracted, avatar.avatar_id, now)
                .with_data("FeatureRef", feature_ref.to_string())
                .with_data("FeatureType", "SagaFeature")
                .committed(),
        );

        if !feature.interactable.loot.is_empty() {
            instance.log.append(
                SagaTransaction::new(TransactionType::LootAwarded, avatar.avatar_id, now)
                    .with_data("FeatureRef", feature_ref.to_string())
                    .committed(),
            );
            avatar.apply_loot(&feature.interactable.loot);
        }

        for token in &feature.interactable.gives_quest_tokens {
            instance.log.append(
                SagaTransaction::new(TransactionType::QuestTokenAwarded, avatar.avatar_id, now)
                    .with_data("QuestTokenRef", token.clone())
                    .with_data("Reason", "EntityInteracted")
                    .with_data("FeatureRef", feature_ref.to_string())
                    .committed(),
            );
            avatar.grant_quest_token(token);
        }

        for effect in &feature.interactable.effects {
            self.apply_effect(instance, effect, avatar, now);
        }

        Ok(())
    }

    fn apply_effect(
        &self,
        instance: &mut SagaInstance,
        effect: &crate::catalog::Effect,
        avatar: &Avatar,
        now: DateTime<Utc>,
    ) {
        use crate::catalog::Effect;
        match effect {
            Effect::StatusEffect {
                status_ref,
                magnitude,
                duration_seconds,
            } => {
                let mut tx = SagaTransaction::new(TransactionType::StatusEffectApplied, avatar.avatar_id, now)
                    .with_data("StatusRef", status_ref.clone())
                    .with_data("Magnitude", magnitude.to_string());
                if let Some(seconds) = duration_seconds {
                    tx = tx.with_data("DurationSeconds", seconds.to_string());
                }
                instance.log.append(tx.committed());
            }
            Effect::DamageStructure { feature_ref, amount } => {
                instance.log.append(
                    SagaTransaction::new(TransactionType::StructureDamaged, avatar.avatar_id, now)
                        .with_data("FeatureRef", feature_ref.clone())
                        .with_data("Amount", amount.to_string())
                        .committed(),
                );
            }
            Effect::RepairStructure { feature_ref, amount } => {
                instance.log.append(
                    SagaTransaction::new(TransactionType::StructureRepaired, avatar.avatar_id, now)
                        .with_data("FeatureRef", feature_ref.clone())
                        .with_data("Amount", amount.to_string())
                        .committed(),
                );
            }
        }
    }

    /// The smallest-radius trigger the position currently falls within, if any.
    pub fn peek_innermost_trigger(&self, instance: &SagaInstance, position: ModelPoint) -> Option<String> {
        instance
            .triggers
            .iter()
            .filter(|t| proximity::is_within(instance.center, t.trigger.enter_radius, position))
            .min_by(|a, b| a.trigger.enter_radius.partial_cmp(&b.trigger.enter_radius).unwrap())
            .map(|t| t.trigger.trigger_ref.clone())
    }

    /// Proximity info for every trigger in the instance, for UI/debug use.
    pub fn proximity_info(&self, instance: &SagaInstance, position: ModelPoint) -> SagaResult<Vec<ProximityInfo>> {
        let state = instance.state()?;
        Ok(instance
            .triggers
            .iter()
            .map(|t| ProximityInfo {
                trigger_ref: t.trigger.trigger_ref.clone(),
                distance: proximity::model_distance(instance.center, position),
                enter_radius: t.trigger.enter_radius,
                exit_radius: t.exit_radius(),
                status: state.trigger(&t.trigger.trigger_ref).status,
            })
            .collect())
    }

    pub fn can_activate_trigger_check(
        &self,
        instance: &SagaInstance,
        trigger_ref: &str,
        avatar: &Avatar,
    ) -> Option<AvailabilityCheck> {
        let trigger = instance.trigger(trigger_ref)?;
        Some(can_activate_trigger(avatar, trigger))
    }

    pub fn can_interact_with_feature_check(
        &self,
        instance: &SagaInstance,
        feature_ref: &str,
        avatar: &Avatar,
    ) -> SagaResult<AvailabilityCheck> {
        let feature = self
            .catalog
            .saga_feature(feature_ref)
            .ok_or_else(|| SagaError::unknown_ref("SagaFeature", feature_ref))?;
        let state = instance.state()?;
        let count = state
            .feature_interactions
            .get(&normalize_ref(feature_ref))
            .and_then(|by_avatar| by_avatar.get(&avatar.avatar_id))
            .map(|record| record.count)
            .unwrap_or(0);
        Ok(can_interact_with_feature(avatar, &feature.interactable, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, SagaTrigger};
    use crate::ids::AvatarId;

    fn avatar() -> Avatar {
        Avatar::new(AvatarId::new(), ModelPoint::new(0.0, 0.0))
    }

    fn trigger(trigger_ref: &str, enter_radius: f64) -> ExpandedTrigger {
        ExpandedTrigger {
            trigger: SagaTrigger {
                trigger_ref: trigger_ref.into(),
                enter_radius,
                requires_quest_tokens: vec![],
                gives_quest_tokens: vec![],
                spawns: vec![],
            },
            completion_token: None,
        }
    }

    #[test]
    fn hysteresis_sequence_enters_once_and_exits_past_margin() {
        let catalog = Catalog::builder().build();
        let service = InteractionService::new(&catalog);
        let mut instance = SagaInstance::new("saga1", ModelPoint::new(0.0, 0.0), vec![trigger("T", 10.0)]);
        let mut avatar = avatar();
        let now = Utc::now();

        for distance in [9.0, 10.0, 11.0, 12.0, 19.0, 20.0, 21.0] {
            service
                .update_with_avatar_position(&mut instance, ModelPoint::new(distance, 0.0), &mut avatar, 1, now)
                .unwrap();
        }

        let entered = instance
            .log
            .committed()
            .filter(|tx| tx.transaction_type == TransactionType::PlayerEntered)
            .count();
        let exited = instance
            .log
            .committed()
            .filter(|tx| tx.transaction_type == TransactionType::PlayerExited)
            .count();
        assert_eq!(entered, 1);
        assert_eq!(exited, 1);
    }

    #[test]
    fn respawn_waits_out_the_interval_then_spawns_a_fresh_instance() {
        let mut builder = Catalog::builder();
        builder
            .insert_character(
                crate::catalog::CharacterTemplate {
                    ref_name: "Goblin".into(),
                    stats: crate::catalog::CharacterStats {
                        strength: 0.5,
                        dexterity: 0.5,
                        constitution: 0.5,
                        intelligence: 0.5,
                        wisdom: 0.5,
                        charisma: 0.5,
                        luck: 0.5,
                        credits: 0,
                    },
                    capabilities: vec![],
                    interactable: None,
                    traits: crate::catalog::CharacterTraits::default(),
                    battle_dialogue_triggers: vec![],
                    respawn_interval_seconds: 30,
                },
                "Goblin",
            )
            .unwrap();
        let catalog = builder.build();
        let service = InteractionService::new(&catalog);
        let mut instance = SagaInstance::new("saga1", ModelPoint::new(0.0, 0.0), vec![trigger("T", 10.0)]);
        let mut avatar = avatar();
        let now = Utc::now();
        let original_instance_id = CharacterInstanceId::new();

        instance.log.append(
            SagaTransaction::new(TransactionType::TriggerActivated, avatar.avatar_id, now)
                .with_data("SagaTriggerRef", "T".to_string())
                .committed(),
        );
        instance.log.append(
            SagaTransaction::new(TransactionType::CharacterSpawned, avatar.avatar_id, now)
                .with_data("CharacterInstanceId", original_instance_id.to_string())
                .with_data("CharacterRef", "Goblin".to_string())
                .with_data("SagaTriggerRef", "T".to_string())
                .with_data("X", "0".to_string())
                .with_data("Z", "0".to_string())
                .committed(),
        );
        instance.log.append(
            SagaTransaction::new(TransactionType::CharacterDefeated, avatar.avatar_id, now)
                .with_data("CharacterInstanceId", original_instance_id.to_string())
                .committed(),
        );

        // Still within the respawn interval: no new spawn yet.
        service
            .update_with_avatar_position(&mut instance, ModelPoint::new(5.0, 0.0), &mut avatar, 1, now + chrono::Duration::seconds(10))
            .unwrap();
        let respawns_before = instance
            .log
            .committed()
            .filter(|tx| tx.transaction_type == TransactionType::CharacterSpawned && tx.data.get("IsRespawn").is_some())
            .count();
        assert_eq!(respawns_before, 0);

        // Interval elapsed: the engine spawns a fresh instance for the same character.
        service
            .update_with_avatar_position(&mut instance, ModelPoint::new(5.0, 0.0), &mut avatar, 2, now + chrono::Duration::seconds(31))
            .unwrap();
        let respawn_tx = instance
            .log
            .committed()
            .find(|tx| tx.transaction_type == TransactionType::CharacterSpawned && tx.data.get("IsRespawn").is_some())
            .expect("a respawn transaction was appended");
        assert_eq!(respawn_tx.data.get("PreviousInstanceId").unwrap(), &original_instance_id.to_string());
        assert_eq!(respawn_tx.data.get("CharacterRef").unwrap(), "Goblin");
    }

    #[test]
    fn feature_gate_scenario_rejects_and_appends_nothing() {
        let mut builder = Catalog::builder();
        builder
            .insert_saga_feature(
                crate::catalog::SagaFeature {
                    ref_name: "Gate".into(),
                    interactable: crate::catalog::FeatureInteractable {
                        approach_radius: 5.0,
                        requires_quest_tokens: vec!["A".into(), "B".into()],
                        gives_quest_tokens: vec![],
                        loot: vec![],
                        effects: vec![],
                        max_interactions: 0,
                    },
                },
                "Gate",
            )
            .unwrap();
        let catalog = builder.build();
        let service = InteractionService::new(&catalog);
        let mut instance = SagaInstance::new("saga1", ModelPoint::new(0.0, 0.0), vec![]);
        let mut avatar = avatar();
        avatar.grant_quest_token("A");

        let err = service
            .interact_with_feature(&mut instance, "Gate", &mut avatar, Utc::now())
            .unwrap_err();
        assert!(matches!(err, SagaError::FeatureNotInteractable { .. }));
        assert!(instance.log.is_empty());
    }
}
