//! Dialogue tree data model (`spec.md` §3 "DialogueTree", §4.H).
//!
//! The tree is stored as a flat arena keyed by node id, never as owning
//! pointers between nodes (`spec.md` §9 "Graphs"), so both the interpreter
//! and the world validator can walk it by id without fighting the borrow
//! checker.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::catalog::entries::ItemKind;

/// A condition gating a choice or guarding a node (`spec.md` §4.H).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Condition {
    HasItem { item_kind: ItemKind, item_ref: String },
    LacksItem { item_kind: ItemKind, item_ref: String },
    HasAchievement { achievement_ref: String },
    CreditsAtLeast { amount: i64 },
    HealthAtLeast { fraction: f64 },
    PlayerVisitCountAtLeast { node_id: String, count: u32 },
    NodeVisited { node_id: String },
    QuestActive { quest_ref: String },
    QuestCompleted { quest_ref: String },
    QuestNotStarted { quest_ref: String },
    ReputationAtLeast { faction_ref: String, level: i32 },
    TraitIs { trait_name: String, expected: bool },
}

/// An action executed when a node is visited (`spec.md` §4.H).
///
/// `StartCombat`, `StartBossBattle`, `EndBattle`, `AcceptQuest`,
/// `CompleteQuest`, and `OpenMerchantTrade` are terminal actions: a node
/// carrying one of them is always a valid dead end for reachability
/// purposes (`spec.md` §3 "DialogueTree").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Action {
    GiveItem { item_kind: ItemKind, item_ref: String, quantity: u32 },
    TakeItem { item_kind: ItemKind, item_ref: String, quantity: u32 },
    TransferCurrency { amount: i64 },
    GiveQuestToken { token_ref: String },
    UnlockAchievement { achievement_ref: String },
    ChangeReputation { faction_ref: String, delta: i32 },
    AcceptQuest { quest_ref: String },
    CompleteQuest { quest_ref: String },
    AbandonQuest { quest_ref: String },
    ChangeStance { stance_ref: String },
    ChangeAffinity { affinity_ref: String },
    HealSelf { amount: f64 },
    CastSpell { spell_ref: String },
    ApplyStatusEffect { status_ref: String, magnitude: f64, duration_seconds: Option<i64> },
    SummonAlly { character_ref: String },
    SpawnCharacters { spawn: crate::catalog::entries::CharacterSpawn },
    StartCombat { character_ref: String },
    StartBossBattle { character_ref: String },
    EndBattle,
    OpenMerchantTrade { character_ref: String },
    AssignTrait { trait_name: String },
    RemoveTrait { trait_name: String },
    SetCharacterState { character_ref: String, hostile: bool },
    JoinParty { character_ref: String },
    LeaveParty { character_ref: String },
    GrantAffinity { affinity_ref: String },
}

impl Action {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Action::StartCombat { .. }
                | Action::StartBossBattle { .. }
                | Action::EndBattle
                | Action::AcceptQuest { .. }
                | Action::CompleteQuest { .. }
                | Action::OpenMerchantTrade { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub conditions: Vec<Condition>,
    pub next_node_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DialogueNode {
    pub node_id: String,
    pub text: Option<String>,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    pub choices: Vec<Choice>,
}

impl DialogueNode {
    /// A node is an intentional terminal if it carries a terminal action, or
    /// its id ends in one of the spec's reserved suffixes, or it's a
    /// battle-prefixed entry point (`spec.md` §3/§4.I).
    pub fn is_intentional_terminal(&self) -> bool {
        if self.actions.iter().any(Action::is_terminal) {
            return true;
        }
        let lower = self.node_id.to_ascii_lowercase();
        lower == "end" || lower.ends_with("_end") || lower.starts_with("battle_")
    }

    pub fn is_dead_end(&self) -> bool {
        self.choices.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueTree {
    pub tree_ref: String,
    pub start_node_id: String,
    /// Keyed by lowercased node id (node ids are unique within a tree,
    /// case-insensitively, per `spec.md` §3).
    pub nodes: HashMap<String, DialogueNode>,
}

impl DialogueTree {
    pub fn node(&self, node_id: &str) -> Option<&DialogueNode> {
        self.nodes.get(&node_id.to_ascii_lowercase())
    }

    pub fn start_node(&self) -> Option<&DialogueNode> {
        self.node(&self.start_node_id)
    }

    /// Additional entry points beyond the start node: every battle-dialogue
    /// trigger's target node, for every character whose `battle_dialogue_triggers`
    /// point into this tree, plus every `*_check`/base-name pair authored
    /// under the conditional-fallback convention (`spec.md` §3 "DialogueTree").
    pub fn entry_points<'a>(
        &'a self,
        battle_entry_node_ids: impl IntoIterator<Item = &'a str>,
    ) -> Vec<String> {
        let mut entries = vec![self.start_node_id.to_ascii_lowercase()];
        for node_id in battle_entry_node_ids {
            entries.push(node_id.to_ascii_lowercase());
        }
        entries.extend(self.check_convention_entry_points());
        entries.sort();
        entries.dedup();
        entries
    }

    /// A node named `{base}_check` gates entry into its sibling `{base}`
    /// node from outside the normal choice graph: authors use the pairing
    /// to express a conditional fallback reached by game logic rather than
    /// by a `Choice`. Both halves of a pairing that actually exists in this
    /// tree count as entry points.
    fn check_convention_entry_points(&self) -> Vec<String> {
        let mut entries = Vec::new();
        for node_id in self.nodes.keys() {
            if let Some(base) = node_id.strip_suffix("_check") {
                if !base.is_empty() && self.nodes.contains_key(base) {
                    entries.push(node_id.clone());
                    entries.push(base.to_string());
                }
            }
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> DialogueNode {
        DialogueNode {
            node_id: id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn node_lookup_is_case_insensitive() {
        let mut nodes = HashMap::new();
        nodes.insert("greeting".to_string(), node("Greeting"));
        let tree = DialogueTree {
            tree_ref: "t1".into(),
            start_node_id: "Greeting".into(),
            nodes,
        };
        assert!(tree.node("GREETING").is_some());
        assert!(tree.start_node().is_some());
    }

    #[test]
    fn terminal_suffix_detection() {
        assert!(node("quest_end").is_intentional_terminal());
        assert!(node("end").is_intentional_terminal());
        assert!(node("battle_intro").is_intentional_terminal());
        assert!(!node("greeting").is_intentional_terminal());
    }

    #[test]
    fn terminal_action_marks_node_terminal() {
        let mut n = node("trade");
        n.actions.push(Action::OpenMerchantTrade {
            character_ref: "merchant".into(),
        });
        assert!(n.is_intentional_terminal());
    }

    #[test]
    fn check_sibling_pairing_becomes_entry_points() {
        let mut nodes = HashMap::new();
        nodes.insert("start".to_string(), node("start"));
        nodes.insert("reputation_check".to_string(), node("reputation_check"));
        nodes.insert("reputation".to_string(), node("reputation"));
        let tree = DialogueTree {
            tree_ref: "t1".into(),
            start_node_id: "start".into(),
            nodes,
        };
        let entries = tree.entry_points(std::iter::empty());
        assert!(entries.contains(&"reputation_check".to_string()));
        assert!(entries.contains(&"reputation".to_string()));
    }

    #[test]
    fn check_suffix_without_sibling_is_not_an_entry_point() {
        let mut nodes = HashMap::new();
        nodes.insert("start".to_string(), node("start"));
        nodes.insert("orphan_check".to_string(), node("orphan_check"));
        let tree = DialogueTree {
            tree_ref: "t1".into(),
            start_node_id: "start".into(),
            nodes,
        };
        let entries = tree.entry_points(std::iter::empty());
        assert!(!entries.contains(&"orphan_check".to_string()));
    }
}
