//! Dialogue tree interpreter (`spec.md` §4.H).
//!
//! Walks a [`crate::catalog::DialogueTree`] one node at a time against an
//! avatar and a [`SagaInstance`]'s derived state. The tree data model lives
//! in [`crate::catalog::dialogue`]; this module is the runtime that
//! evaluates conditions, executes actions, and enforces first-visit-only
//! reward idempotence.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::avatar::Avatar;
use crate::catalog::{Action, Catalog, Choice, Condition, DialogueTree};
use crate::error::{SagaError, SagaResult};
use crate::ids::CharacterInstanceId;
use crate::interaction::SagaInstance;
use crate::proximity;
use crate::rng::SeededRng;
use crate::state::{QuestStatus, SagaState};
use crate::transaction::{SagaTransaction, TransactionType};

/// What a node visit produced, for the caller to render and collect a reply.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueVisitResult {
    pub node_id: String,
    pub text: Option<String>,
    pub available_choices: Vec<Choice>,
    pub is_first_visit: bool,
}

/// Stateless interpreter over one catalog, mirroring
/// [`crate::interaction::InteractionService`]'s shape.
pub struct DialogueInterpreter<'a> {
    catalog: &'a Catalog,
}

impl<'a> DialogueInterpreter<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Visit one node: record `DialogueNodeVisited`, run its actions only on
    /// the first visit, and return its text plus choices whose conditions
    /// the avatar currently satisfies (`spec.md` §4.H).
    pub fn visit_node(
        &self,
        instance: &mut SagaInstance,
        tree: &DialogueTree,
        character_ref: &str,
        node_id: &str,
        avatar: &mut Avatar,
        rng: &mut SeededRng,
        now: DateTime<Utc>,
    ) -> SagaResult<DialogueVisitResult> {
        let node = tree
            .node(node_id)
            .ok_or_else(|| SagaError::unknown_ref("DialogueNode", node_id))?;

        let state = instance.state()?;
        let is_first_visit = state.dialogue_visit(character_ref, node_id).is_none();

        instance.log.append(
            SagaTransaction::new(TransactionType::DialogueNodeVisited, avatar.avatar_id, now)
                .with_data("CharacterRef", character_ref.to_string())
                .with_data("NodeId", node_id.to_string())
                .committed(),
        );

        let conditions_met = node.conditions.iter().all(|c| evaluate_condition(c, avatar, &state, character_ref));
        if is_first_visit && conditions_met {
            for action in node.actions.clone() {
                self.execute_action(instance, &action, avatar, character_ref, rng, now);
            }
        }

        let available_choices = node
            .choices
            .iter()
            .filter(|choice| {
                choice
                    .conditions
                    .iter()
                    .all(|c| evaluate_condition(c, avatar, &state, character_ref))
            })
            .cloned()
            .collect();

        Ok(DialogueVisitResult {
            node_id: node.node_id.clone(),
            text: node.text.clone(),
            available_choices,
            is_first_visit,
        })
    }

    /// Execute one dialogue action, mutating `avatar` and appending the
    /// transaction type that best matches it from the fixed `spec.md` §4.D
    /// enumerant. Actions without a dedicated transaction type (stance/
    /// affinity changes, spell casts, party membership, ...) record via
    /// `EffectApplied` with a `Kind` marker, the generic effect carrier.
    fn execute_action(
        &self,
        instance: &mut SagaInstance,
        action: &Action,
        avatar: &mut Avatar,
        character_ref: &str,
        rng: &mut SeededRng,
        now: DateTime<Utc>,
    ) {
        let avatar_id = avatar.avatar_id;
        match action {
            Action::GiveItem { item_kind, item_ref, quantity } => {
                avatar.inventory.give(*item_kind, item_ref, *quantity);
                instance.log.append(
                    SagaTransaction::new(TransactionType::LootAwarded, avatar_id, now)
                        .with_data("ItemRef", item_ref.clone())
                        .with_data("Quantity", quantity.to_string())
                        .committed(),
                );
            }
            Action::TakeItem { item_kind, item_ref, quantity } => {
                avatar.inventory.take(*item_kind, item_ref, *quantity);
                instance.log.append(
                    effect(avatar_id, now, "TakeItem")
                        .with_data("ItemRef", item_ref.clone())
                        .with_data("Quantity", quantity.to_string())
                        .committed(),
                );
            }
            Action::TransferCurrency { amount } => {
                avatar.transfer_currency(*amount);
                instance.log.append(
                    effect(avatar_id, now, "TransferCurrency")
                        .with_data("Amount", amount.to_string())
                        .committed(),
                );
            }
            Action::GiveQuestToken { token_ref } => {
                avatar.grant_quest_token(token_ref);
                instance.log.append(
                    SagaTransaction::new(TransactionType::QuestTokenAwarded, avatar_id, now)
                        .with_data("QuestTokenRef", token_ref.clone())
                        .with_data("Reason", "DialogueNodeVisited")
                        .committed(),
                );
            }
            Action::UnlockAchievement { achievement_ref } => {
                avatar.unlock_achievement(achievement_ref);
                instance.log.append(
                    effect(avatar_id, now, "UnlockAchievement")
                        .with_data("AchievementRef", achievement_ref.clone())
                        .committed(),
                );
            }
            Action::ChangeReputation { faction_ref, delta } => {
                instance.log.append(
                    SagaTransaction::new(TransactionType::ReputationChanged, avatar_id, now)
                        .with_data("FactionRef", faction_ref.clone())
                        .with_data("Delta", delta.to_string())
                        .committed(),
                );
            }
            Action::AcceptQuest { quest_ref } => {
                instance.log.append(
                    SagaTransaction::new(TransactionType::QuestAccepted, avatar_id, now)
                        .with_data("QuestRef", quest_ref.clone())
                        .committed(),
                );
            }
            Action::CompleteQuest { quest_ref } => {
                instance.log.append(
                    SagaTransaction::new(TransactionType::QuestCompleted, avatar_id, now)
                        .with_data("QuestRef", quest_ref.clone())
                        .committed(),
                );
            }
            Action::AbandonQuest { quest_ref } => {
                instance.log.append(
                    SagaTransaction::new(TransactionType::QuestAbandoned, avatar_id, now)
                        .with_data("QuestRef", quest_ref.clone())
                        .committed(),
                );
            }
            Action::ChangeStance { stance_ref } => {
                avatar.current_stance = Some(stance_ref.to_ascii_lowercase());
                instance.log.append(
                    effect(avatar_id, now, "ChangeStance")
                        .with_data("StanceRef", stance_ref.clone())
                        .committed(),
                );
            }
            Action::ChangeAffinity { affinity_ref } | Action::GrantAffinity { affinity_ref } => {
                avatar.current_affinity = Some(affinity_ref.to_ascii_lowercase());
                instance.log.append(
                    effect(avatar_id, now, "ChangeAffinity")
                        .with_data("AffinityRef", affinity_ref.clone())
                        .committed(),
                );
            }
            Action::HealSelf { amount } => {
                avatar.heal(*amount);
                instance
                    .log
                    .append(effect(avatar_id, now, "HealSelf").with_data("Amount", amount.to_string()).committed());
            }
            Action::CastSpell { spell_ref } => {
                instance
                    .log
                    .append(effect(avatar_id, now, "CastSpell").with_data("SpellRef", spell_ref.clone()).committed());
            }
            Action::ApplyStatusEffect { status_ref, magnitude, duration_seconds } => {
                let mut tx = SagaTransaction::new(TransactionType::StatusEffectApplied, avatar_id, now)
                    .with_data("StatusRef", status_ref.clone())
                    .with_data("Magnitude", magnitude.to_string());
                if let Some(seconds) = duration_seconds {
                    tx = tx.with_data("DurationSeconds", seconds.to_string());
                }
                instance.log.append(tx.committed());
            }
            Action::SummonAlly { character_ref: ally_ref } => {
                instance.log.append(
                    effect(avatar_id, now, "SummonAlly")
                        .with_data("CharacterRef", ally_ref.clone())
                        .committed(),
                );
            }
            Action::SpawnCharacters { spawn } => {
                self.spawn_from_dialogue(instance, spawn, avatar, character_ref, rng, now);
            }
            Action::StartCombat { character_ref: target } => {
                instance.log.append(
                    SagaTransaction::new(TransactionType::BattleStarted, avatar_id, now)
                        .with_data("CharacterRef", target.clone())
                        .committed(),
                );
            }
            Action::StartBossBattle { character_ref: target } => {
                instance.log.append(
                    SagaTransaction::new(TransactionType::BattleStarted, avatar_id, now)
                        .with_data("CharacterRef", target.clone())
                        .with_data("BossFight", "true")
                        .committed(),
                );
            }
            Action::EndBattle => {
                instance
                    .log
                    .append(SagaTransaction::new(TransactionType::BattleEnded, avatar_id, now).committed());
            }
            Action::OpenMerchantTrade { character_ref: merchant } => {
                instance.log.append(
                    effect(avatar_id, now, "OpenMerchantTrade")
                        .with_data("CharacterRef", merchant.clone())
                        .committed(),
                );
            }
            Action::AssignTrait { trait_name } => {
                avatar.assign_trait(trait_name);
                instance.log.append(
                    SagaTransaction::new(TransactionType::TraitAssigned, avatar_id, now)
                        .with_data("TraitName", trait_name.clone())
                        .committed(),
                );
            }
            Action::RemoveTrait { trait_name } => {
                avatar.remove_trait(trait_name);
                instance.log.append(
                    SagaTransaction::new(TransactionType::TraitRemoved, avatar_id, now)
                        .with_data("TraitName", trait_name.clone())
                        .committed(),
                );
            }
            Action::SetCharacterState { character_ref: target, hostile } => {
                instance.log.append(
                    effect(avatar_id, now, "SetCharacterState")
                        .with_data("CharacterRef", target.clone())
                        .with_data("Hostile", hostile.to_string())
                        .committed(),
                );
            }
            Action::JoinParty { character_ref: member } => {
                instance
                    .log
                    .append(effect(avatar_id, now, "JoinParty").with_data("CharacterRef", member.clone()).committed());
            }
            Action::LeaveParty { character_ref: member } => {
                instance.log.append(
                    effect(avatar_id, now, "LeaveParty").with_data("CharacterRef", member.clone()).committed(),
                );
            }
        }
    }

    /// Resolve and spawn one dialogue-authored [`crate::catalog::CharacterSpawn`],
    /// reusing the same spawn-circle placement the interaction service uses
    /// for trigger-driven spawns (`spec.md` §4.F.1), tagged with a synthetic
    /// `SagaTriggerRef` so despawn-on-exit bookkeeping can still find them.
    fn spawn_from_dialogue(
        &self,
        instance: &mut SagaInstance,
        spawn: &crate::catalog::CharacterSpawn,
        avatar: &Avatar,
        character_ref: &str,
        rng: &mut SeededRng,
        now: DateTime<Utc>,
    ) {
        use crate::catalog::CharacterSpawn;

        let resolved: Vec<String> = match spawn {
            CharacterSpawn::Character { character_ref: target, count } => {
                (0..*count).map(|_| target.clone()).collect()
            }
            CharacterSpawn::Archetype { archetype_ref, count } => {
                let Some(archetype) = self.catalog.character_archetype(archetype_ref) else {
                    warn!(%archetype_ref, "archetype not found, skipping dialogue spawn");
                    return;
                };
                if archetype.pool.is_empty() {
                    return;
                }
                (0..*count).map(|_| archetype.pool[rng.pick_index(archetype.pool.len())].clone()).collect()
            }
        };
        if resolved.is_empty() {
            return;
        }

        let positions = proximity::spawn_circle_positions(avatar.position, resolved.len(), rng);
        let synthetic_trigger_ref = format!("Dialogue_{}", character_ref);
        for (spawned_ref, position) in resolved.into_iter().zip(positions) {
            let instance_id = CharacterInstanceId::new();
            instance.log.append(
                SagaTransaction::new(TransactionType::CharacterSpawned, avatar.avatar_id, now)
                    .with_data("CharacterInstanceId", instance_id.to_string())
                    .with_data("CharacterRef", spawned_ref)
                    .with_data("SagaTriggerRef", synthetic_trigger_ref.clone())
                    .with_data("X", position.x.to_string())
                    .with_data("Z", position.z.to_string())
                    .with_data("SpawnHeight", "0")
                    .committed(),
            );
        }
    }
}

fn evaluate_condition(condition: &Condition, avatar: &Avatar, state: &SagaState, character_ref: &str) -> bool {
    match condition {
        Condition::HasItem { item_kind, item_ref } => avatar.inventory.has(*item_kind, item_ref),
        Condition::LacksItem { item_kind, item_ref } => !avatar.inventory.has(*item_kind, item_ref),
        Condition::HasAchievement { achievement_ref } => avatar.has_achievement(achievement_ref),
        Condition::CreditsAtLeast { amount } => avatar.credits >= *amount,
        Condition::HealthAtLeast { fraction } => avatar.vitals.health >= *fraction,
        Condition::PlayerVisitCountAtLeast { node_id, count } => state
            .dialogue_visit(character_ref, node_id)
            .map(|v| v.visit_count >= *count)
            .unwrap_or(false),
        Condition::NodeVisited { node_id } => state.dialogue_visit(character_ref, node_id).is_some(),
        Condition::QuestActive { quest_ref } => quest_status(state, quest_ref) == Some(QuestStatus::Active),
        Condition::QuestCompleted { quest_ref } => quest_status(state, quest_ref) == Some(QuestStatus::Completed),
        Condition::QuestNotStarted { quest_ref } => {
            matches!(quest_status(state, quest_ref), None | Some(QuestStatus::NotStarted))
        }
        Condition::ReputationAtLeast { faction_ref, level } => state.reputation(faction_ref) >= *level,
        Condition::TraitIs { trait_name, expected } => avatar.has_trait(trait_name) == *expected,
    }
}

fn quest_status(state: &SagaState, quest_ref: &str) -> Option<QuestStatus> {
    state.quests.get(&crate::catalog::normalize_ref(quest_ref)).map(|q| q.status)
}

fn effect(avatar_id: crate::ids::AvatarId, now: DateTime<Utc>, kind: &str) -> SagaTransaction {
    SagaTransaction::new(TransactionType::EffectApplied, avatar_id, now).with_data("Kind", kind.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DialogueNode;
    use crate::ids::AvatarId;
    use crate::proximity::ModelPoint;
    use std::collections::HashMap;

    fn reward_tree() -> DialogueTree {
        let mut nodes = HashMap::new();
        nodes.insert(
            "reward_node".to_string(),
            DialogueNode {
                node_id: "reward_node".into(),
                text: Some("Here's a reward.".into()),
                conditions: vec![],
                actions: vec![
                    Action::TransferCurrency { amount: 10 },
                    Action::GiveQuestToken { token_ref: "QT1".into() },
                ],
                choices: vec![],
            },
        );
        DialogueTree {
            tree_ref: "elder_tree".into(),
            start_node_id: "reward_node".into(),
            nodes,
        }
    }

    #[test]
    fn dialogue_reward_idempotence_scenario() {
        let tree = reward_tree();
        let catalog = Catalog::builder().build();
        let interpreter = DialogueInterpreter::new(&catalog);
        let mut instance = SagaInstance::new("saga1", ModelPoint::new(0.0, 0.0), vec![]);
        let mut avatar = Avatar::new(AvatarId::new(), ModelPoint::new(0.0, 0.0));
        let mut rng = SeededRng::new(1);
        let now = Utc::now();

        let first = interpreter
            .visit_node(&mut instance, &tree, "Elder", "reward_node", &mut avatar, &mut rng, now)
            .unwrap();
        assert!(first.is_first_visit);
        assert_eq!(avatar.credits, 10);
        assert!(avatar.has_quest_token("QT1"));

        let second = interpreter
            .visit_node(&mut instance, &tree, "Elder", "reward_node", &mut avatar, &mut rng, now)
            .unwrap();
        assert!(!second.is_first_visit);
        assert_eq!(avatar.credits, 10);

        let visits = instance
            .log
            .committed()
            .filter(|tx| tx.transaction_type == TransactionType::DialogueNodeVisited)
            .count();
        assert_eq!(visits, 2);
        let awards = instance
            .log
            .committed()
            .filter(|tx| tx.transaction_type == TransactionType::QuestTokenAwarded)
            .count();
        assert_eq!(awards, 1);
    }

    #[test]
    fn unknown_node_id_errors() {
        let tree = reward_tree();
        let catalog = Catalog::builder().build();
        let interpreter = DialogueInterpreter::new(&catalog);
        let mut instance = SagaInstance::new("saga1", ModelPoint::new(0.0, 0.0), vec![]);
        let mut avatar = Avatar::new(AvatarId::new(), ModelPoint::new(0.0, 0.0));
        let mut rng = SeededRng::new(1);
        let err = interpreter
            .visit_node(&mut instance, &tree, "Elder", "missing", &mut avatar, &mut rng, Utc::now())
            .unwrap_err();
        assert!(matches!(err, SagaError::UnknownRef { .. }));
    }
}
