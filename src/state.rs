//! Derived Saga state (`spec.md` §3 "SagaState"/"TriggerState").
//!
//! `SagaState` is never constructed directly outside [`crate::replay`]; it is
//! always the result of folding a [`crate::transaction::TransactionLog`].

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::ids::{AvatarId, CharacterInstanceId};
use crate::proximity::ModelPoint;

/// Lifecycle of one expanded trigger within a saga instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerStatus {
    Inactive,
    Active,
    /// Reserved for caller-driven cooldown bookkeeping; the core fold rules
    /// never produce this status themselves (`spec.md` §4.G: cooldowns are
    /// a caller concern).
    OnCooldown,
    Completed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerState {
    pub status: TriggerStatus,
    pub first_activated_at: Option<DateTime<Utc>>,
    pub last_activated_at: Option<DateTime<Utc>>,
    pub activation_count: u32,
    pub triggered_by: HashSet<AvatarId>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Default for TriggerState {
    fn default() -> Self {
        Self {
            status: TriggerStatus::Inactive,
            first_activated_at: None,
            last_activated_at: None,
            activation_count: 0,
            triggered_by: HashSet::new(),
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CharacterState {
    pub instance_id: CharacterInstanceId,
    pub character_ref: String,
    pub spawned_by_trigger_ref: Option<String>,
    pub position: ModelPoint,
    pub health: f64,
    pub is_alive: bool,
    pub is_spawned: bool,
    pub defeated_at: Option<DateTime<Utc>>,
    pub previous_instance_id: Option<CharacterInstanceId>,
}

/// Visit bookkeeping for one `(character_ref, node_id)` pair within this
/// instance's avatar (`spec.md` §4.E "DialogueNodeVisited").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DialogueVisit {
    pub visit_count: u32,
    pub first_visited_at: DateTime<Utc>,
}

impl DialogueVisit {
    pub fn is_first_visit(&self) -> bool {
        self.visit_count <= 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestStatus {
    NotStarted,
    Active,
    Completed,
    Failed,
    Abandoned,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestState {
    pub status: QuestStatus,
    pub current_stage: Option<String>,
    pub objectives_completed: HashSet<String>,
}

impl Default for QuestState {
    fn default() -> Self {
        Self {
            status: QuestStatus::NotStarted,
            current_stage: None,
            objectives_completed: HashSet::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureInteractionRecord {
    pub count: u32,
    pub last_at: DateTime<Utc>,
}

/// A timed status effect folded from `StatusEffectApplied`/`StatusEffectRemoved`
/// (`SPEC_FULL.md` §10 supplement).
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEffect {
    pub status_ref: String,
    pub magnitude: f64,
    pub expires_at: Option<DateTime<Utc>>,
}

/// The full derived state of one `SagaInstance`, produced by
/// [`crate::replay::replay`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SagaState {
    pub triggers: HashMap<String, TriggerState>,
    pub characters: HashMap<CharacterInstanceId, CharacterState>,
    pub feature_interactions: HashMap<String, HashMap<AvatarId, FeatureInteractionRecord>>,
    /// Keyed by `(character_ref, node_id)`, lowercased (`spec.md` §3).
    pub dialogue_visits: HashMap<(String, String), DialogueVisit>,
    pub quests: HashMap<String, QuestState>,
    pub discoveries: HashSet<String>,
    /// Faction ref -> signed reputation value (`SPEC_FULL.md` §10 supplement).
    pub reputations: HashMap<String, i32>,
    /// Quest tokens this saga instance has granted so far. Folding
    /// `QuestTokenAwarded` twice for the same ref is a no-op because
    /// `HashSet::insert` already is (`spec.md` §4.E, §8 "Monotone quest tokens").
    pub quest_tokens_awarded: HashSet<String>,
    pub traits: HashSet<String>,
    pub status_effects: Vec<StatusEffect>,
    /// Feature ref -> structural condition in `[0.0, 1.0]` (`SPEC_FULL.md` §10 supplement).
    pub structure_condition: HashMap<String, f64>,
    pub saga_completed: bool,
    pub reversed_transaction_ids: HashSet<crate::ids::TransactionId>,
    pub last_state_snapshot_at: Option<DateTime<Utc>>,
}

impl SagaState {
    pub fn trigger(&self, trigger_ref: &str) -> TriggerState {
        self.triggers
            .get(&trigger_ref.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    pub fn dialogue_visit(&self, character_ref: &str, node_id: &str) -> Option<&DialogueVisit> {
        self.dialogue_visits.get(&dialogue_visit_key(character_ref, node_id))
    }

    pub fn reputation(&self, faction_ref: &str) -> i32 {
        self.reputations
            .get(&faction_ref.to_ascii_lowercase())
            .copied()
            .unwrap_or(0)
    }

    pub fn structure_condition(&self, feature_ref: &str) -> f64 {
        self.structure_condition
            .get(&feature_ref.to_ascii_lowercase())
            .copied()
            .unwrap_or(1.0)
    }
}

pub(crate) fn dialogue_visit_key(character_ref: &str, node_id: &str) -> (String, String) {
    (
        character_ref.to_ascii_lowercase(),
        node_id.to_ascii_lowercase(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_trigger_state_is_inactive() {
        let state = SagaState::default();
        assert_eq!(state.trigger("unknown").status, TriggerStatus::Inactive);
    }

    #[test]
    fn dialogue_visit_lookup_is_case_insensitive_on_key() {
        let mut state = SagaState::default();
        state.dialogue_visits.insert(
            dialogue_visit_key("Goblin", "Greeting"),
            DialogueVisit {
                visit_count: 1,
                first_visited_at: Utc::now(),
            },
        );
        assert!(state.dialogue_visit("goblin", "GREETING").is_some());
    }
}
