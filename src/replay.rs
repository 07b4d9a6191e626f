//! Replay: fold a transaction log into [`SagaState`] (`spec.md` §4.E).
//!
//! Folding is a pure, total function over committed transactions: the same
//! log always replays to an equal state (`spec.md` §8 "Idempotent replay").
//! Only the non-obvious fold rules get a comment; the rest update the
//! obviously-named field for their transaction type.

use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::catalog::entries::normalize_ref;
use crate::error::{SagaError, SagaResult};
use crate::ids::{CharacterInstanceId, TransactionId};
use crate::proximity::ModelPoint;
use crate::state::{
    dialogue_visit_key, CharacterState, DialogueVisit, FeatureInteractionRecord, QuestState,
    QuestStatus, SagaState, StatusEffect, TriggerState, TriggerStatus,
};
use crate::transaction::{SagaTransaction, TransactionLog, TransactionType};

/// Fold every `Committed` transaction in `log`, in append order, into a
/// fresh [`SagaState`].
pub fn replay(log: &TransactionLog) -> SagaResult<SagaState> {
    let mut state = SagaState::default();
    for tx in log.committed() {
        fold(&mut state, tx)?;
    }
    Ok(state)
}

fn data<'a>(tx: &'a SagaTransaction, key: &str) -> SagaResult<&'a str> {
    tx.data.get(key).map(String::as_str).ok_or_else(|| {
        SagaError::state_corrupt(format!("{:?} transaction missing '{}'", tx.transaction_type, key))
    })
}

fn data_opt<'a>(tx: &'a SagaTransaction, key: &str) -> Option<&'a str> {
    tx.data.get(key).map(String::as_str)
}

fn data_f64(tx: &SagaTransaction, key: &str) -> SagaResult<f64> {
    data(tx, key)?
        .parse()
        .map_err(|_| SagaError::state_corrupt(format!("{:?} has non-numeric '{}'", tx.transaction_type, key)))
}

fn data_instance_id(tx: &SagaTransaction, key: &str) -> SagaResult<CharacterInstanceId> {
    CharacterInstanceId::from_str(data(tx, key)?)
        .map_err(|_| SagaError::state_corrupt(format!("{:?} has malformed '{}'", tx.transaction_type, key)))
}

fn fold(state: &mut SagaState, tx: &SagaTransaction) -> SagaResult<()> {
    let ts = tx.effective_timestamp();
    match tx.transaction_type {
        TransactionType::SagaDiscovered => {
            if let Some(saga_ref) = data_opt(tx, "SagaRef") {
                state.discoveries.insert(normalize_ref(saga_ref));
            }
        }
        TransactionType::SagaCompleted => state.saga_completed = true,

        TransactionType::TriggerActivated => {
            let trigger_ref = normalize_ref(data(tx, "SagaTriggerRef")?);
            let entry = state.triggers.entry(trigger_ref).or_default();
            entry.status = TriggerStatus::Active;
            entry.activation_count += 1;
            entry.triggered_by.insert(tx.avatar_id);
            entry.first_activated_at.get_or_insert(ts);
            entry.last_activated_at = Some(ts);
        }
        TransactionType::TriggerCompleted => {
            let trigger_ref = normalize_ref(data(tx, "SagaTriggerRef")?);
            let entry = state.triggers.entry(trigger_ref).or_default();
            entry.status = TriggerStatus::Completed;
            entry.completed_at = Some(ts);
        }

        TransactionType::PlayerEntered => {
            // Bookkeeping only; `TriggerActivated` (emitted alongside it by
            // the interaction service) carries the actual status change.
        }
        TransactionType::PlayerExited => {
            // A trigger that was active returns to `Inactive` so a later
            // re-entry can activate it again; only `TriggerCompleted`
            // permanently gates a trigger (`spec.md` §8 "Trigger
            // reactivation is impossible after status = Completed").
            let trigger_ref = normalize_ref(data(tx, "TriggerRef")?);
            if let Some(entry) = state.triggers.get_mut(&trigger_ref) {
                if entry.status == TriggerStatus::Active {
                    entry.status = TriggerStatus::Inactive;
                }
            }
            // Despawn this trigger's still-alive spawned characters.
            for character in state.characters.values_mut() {
                if character.is_spawned
                    && character
                        .spawned_by_trigger_ref
                        .as_deref()
                        .map(normalize_ref)
                        == Some(trigger_ref.clone())
                {
                    character.is_spawned = false;
                }
            }
        }

        TransactionType::CharacterSpawned => {
            let instance_id = data_instance_id(tx, "CharacterInstanceId")?;
            let character_ref = data(tx, "CharacterRef")?.to_string();
            let x: f64 = data_f64(tx, "X")?;
            let z: f64 = data_f64(tx, "Z")?;
            let previous_instance_id = match data_opt(tx, "PreviousInstanceId") {
                Some(raw) => Some(CharacterInstanceId::from_str(raw).map_err(|_| {
                    SagaError::state_corrupt("CharacterSpawned has malformed 'PreviousInstanceId'")
                })?),
                None => None,
            };
            state.characters.insert(
                instance_id,
                CharacterState {
                    instance_id,
                    character_ref,
                    spawned_by_trigger_ref: data_opt(tx, "SagaTriggerRef").map(String::from),
                    position: ModelPoint::new(x, z),
                    health: 1.0,
                    is_alive: true,
                    is_spawned: true,
                    defeated_at: None,
                    previous_instance_id,
                },
            );
        }
        TransactionType::CharacterDespawned => {
            let instance_id = data_instance_id(tx, "CharacterInstanceId")?;
            if let Some(character) = state.characters.get_mut(&instance_id) {
                character.is_spawned = false;
            }
        }
        TransactionType::CharacterDamaged => {
            let instance_id = data_instance_id(tx, "CharacterInstanceId")?;
            let amount = data_f64(tx, "Amount")?;
            if let Some(character) = state.characters.get_mut(&instance_id) {
                character.health = (character.health - amount).clamp(0.0, 1.0);
            }
        }
        TransactionType::CharacterHealed => {
            let instance_id = data_instance_id(tx, "CharacterInstanceId")?;
            let amount = data_f64(tx, "Amount")?;
            if let Some(character) = state.characters.get_mut(&instance_id) {
                character.health = (character.health + amount).clamp(0.0, 1.0);
            }
        }
        TransactionType::CharacterDefeated => {
            let instance_id = data_instance_id(tx, "CharacterInstanceId")?;
            if let Some(character) = state.characters.get_mut(&instance_id) {
                character.is_alive = false;
                character.defeated_at = Some(ts);
            }
        }

        TransactionType::EntityInteracted => {
            let feature_ref = normalize_ref(data(tx, "FeatureRef")?);
            let record = state
                .feature_interactions
                .entry(feature_ref)
                .or_default()
                .entry(tx.avatar_id)
                .or_insert(FeatureInteractionRecord { count: 0, last_at: ts });
            record.count += 1;
            record.last_at = ts;
        }

        TransactionType::DialogueStarted | TransactionType::DialogueCompleted => {
            // No state beyond what `DialogueNodeVisited` already tracks.
        }
        TransactionType::DialogueNodeVisited => {
            let character_ref = data(tx, "CharacterRef")?;
            let node_id = data(tx, "NodeId")?;
            let key = dialogue_visit_key(character_ref, node_id);
            let visit = state.dialogue_visits.entry(key).or_insert(DialogueVisit {
                visit_count: 0,
                first_visited_at: ts,
            });
            visit.visit_count += 1;
        }

        TransactionType::TraitAssigned => {
            state.traits.insert(data(tx, "TraitName")?.to_string());
        }
        TransactionType::TraitRemoved => {
            state.traits.remove(data(tx, "TraitName")?);
        }

        TransactionType::ReputationChanged => {
            let faction_ref = normalize_ref(data(tx, "FactionRef")?);
            let delta: i32 = data(tx, "Delta")?
                .parse()
                .map_err(|_| SagaError::state_corrupt("ReputationChanged has non-numeric 'Delta'"))?;
            *state.reputations.entry(faction_ref).or_insert(0) += delta;
        }

        TransactionType::ItemTraded
        | TransactionType::LootAwarded
        | TransactionType::BattleStarted
        | TransactionType::BattleTurnExecuted
        | TransactionType::BattleEnded => {
            // Avatar-side effects; this transaction's own presence in the
            // committed log is the record, there is no instance-level
            // derived field to update beyond what's above.
        }

        TransactionType::QuestTokenAwarded => {
            // Idempotent by construction: inserting an already-present ref
            // into a `HashSet` is a no-op (`spec.md` §4.E, §8).
            state
                .quest_tokens_awarded
                .insert(data(tx, "QuestTokenRef")?.to_string());
        }

        TransactionType::QuestAccepted => {
            let quest_ref = normalize_ref(data(tx, "QuestRef")?);
            let entry = state.quests.entry(quest_ref).or_default();
            entry.status = QuestStatus::Active;
            entry.current_stage = data_opt(tx, "StartStage").map(String::from);
        }
        TransactionType::QuestObjectiveCompleted => {
            let quest_ref = normalize_ref(data(tx, "QuestRef")?);
            let objective = data(tx, "Objective")?.to_string();
            state
                .quests
                .entry(quest_ref)
                .or_insert_with(QuestState::default)
                .objectives_completed
                .insert(objective);
        }
        TransactionType::QuestStageAdvanced => {
            let quest_ref = normalize_ref(data(tx, "QuestRef")?);
            let next_stage = data(tx, "NextStage")?.to_string();
            state
                .quests
                .entry(quest_ref)
                .or_insert_with(QuestState::default)
                .current_stage = Some(next_stage);
        }
        TransactionType::QuestBranchChosen => {
            let quest_ref = normalize_ref(data(tx, "QuestRef")?);
            let leads_to_stage = data(tx, "LeadsToStage")?.to_string();
            state
                .quests
                .entry(quest_ref)
                .or_insert_with(QuestState::default)
                .current_stage = Some(leads_to_stage);
        }
        TransactionType::QuestCompleted => {
            let quest_ref = normalize_ref(data(tx, "QuestRef")?);
            state.quests.entry(quest_ref).or_default().status = QuestStatus::Completed;
        }
        TransactionType::QuestFailed => {
            let quest_ref = normalize_ref(data(tx, "QuestRef")?);
            state.quests.entry(quest_ref).or_default().status = QuestStatus::Failed;
        }
        TransactionType::QuestAbandoned => {
            let quest_ref = normalize_ref(data(tx, "QuestRef")?);
            state.quests.entry(quest_ref).or_default().status = QuestStatus::Abandoned;
        }

        TransactionType::StatusEffectApplied => {
            let status_ref = data(tx, "StatusRef")?.to_string();
            let magnitude = data_f64(tx, "Magnitude")?;
            let expires_at = match data_opt(tx, "DurationSeconds") {
                Some(raw) => {
                    let seconds: i64 = raw.parse().map_err(|_| {
                        SagaError::state_corrupt("StatusEffectApplied has non-numeric 'DurationSeconds'")
                    })?;
                    Some(ts + chrono::Duration::seconds(seconds))
                }
                None => None,
            };
            state.status_effects.retain(|e| e.status_ref != status_ref);
            state.status_effects.push(StatusEffect {
                status_ref,
                magnitude,
                expires_at,
            });
        }
        TransactionType::StatusEffectRemoved => {
            let status_ref = data(tx, "StatusRef")?;
            state.status_effects.retain(|e| e.status_ref != status_ref);
        }

        TransactionType::StructureDamaged => {
            let feature_ref = normalize_ref(data(tx, "FeatureRef")?);
            let amount = data_f64(tx, "Amount")?;
            let condition = state.structure_condition.entry(feature_ref).or_insert(1.0);
            *condition = (*condition - amount).clamp(0.0, 1.0);
        }
        TransactionType::StructureRepaired => {
            let feature_ref = normalize_ref(data(tx, "FeatureRef")?);
            let amount = data_f64(tx, "Amount")?;
            let condition = state.structure_condition.entry(feature_ref).or_insert(1.0);
            *condition = (*condition + amount).clamp(0.0, 1.0);
        }

        TransactionType::LandmarkDiscovered => {
            state
                .discoveries
                .insert(normalize_ref(data(tx, "LandmarkRef")?));
        }

        TransactionType::EffectApplied => {
            // Carries a free-form effect already folded via its specific
            // transaction type (structure damage/repair, status effects);
            // present for symmetry with `crate::catalog::entries::Effect`.
        }

        TransactionType::LocationClaimed
        | TransactionType::ToolWearClaimed
        | TransactionType::MiningSessionClaimed
        | TransactionType::BuildingSessionClaimed
        | TransactionType::InventorySnapshot => {
            // Consumed directly by `crate::anticheat` from the committed
            // log; no `SagaState` field derives from these.
        }

        TransactionType::StateSnapshot => {
            state.last_state_snapshot_at = Some(ts);
        }

        TransactionType::TransactionReversed => {
            if let Some(raw) = data_opt(tx, "OriginalTransactionId") {
                if let Ok(original_id) = TransactionId::from_str(raw) {
                    state.reversed_transaction_ids.insert(original_id);
                }
            }
        }
    }

    Ok(())
}
