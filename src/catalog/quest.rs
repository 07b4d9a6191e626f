//! Quest data model (`spec.md` §3 "Quest").
//!
//! Like the dialogue tree, stages form a graph stored by id in a flat map;
//! edges (`next_stage`, branch `leads_to_stage`) hold only ids.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::catalog::entries::LootEntry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub description: String,
    pub required_quest_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Reward {
    pub loot: Vec<LootEntry>,
    pub credits: i64,
    pub quest_tokens: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub label: String,
    pub leads_to_stage: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailCondition {
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct QuestStage {
    pub stage_ref: String,
    pub objectives: Vec<Objective>,
    pub rewards: Reward,
    pub branches: Vec<Branch>,
    /// `None` means this stage is terminal: it has no outgoing successor.
    pub next_stage: Option<String>,
    pub fail_conditions: Vec<FailCondition>,
}

impl QuestStage {
    pub fn is_terminal(&self) -> bool {
        self.next_stage.is_none() && self.branches.is_empty()
    }

    pub fn successors(&self) -> impl Iterator<Item = &str> {
        self.next_stage
            .iter()
            .map(String::as_str)
            .chain(self.branches.iter().map(|b| b.leads_to_stage.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    pub quest_ref: String,
    pub start_stage: String,
    /// Keyed by lowercased stage ref.
    pub stages: HashMap<String, QuestStage>,
}

impl Quest {
    pub fn stage(&self, stage_ref: &str) -> Option<&QuestStage> {
        self.stages.get(&stage_ref.to_ascii_lowercase())
    }

    pub fn start(&self) -> Option<&QuestStage> {
        self.stage(&self.start_stage)
    }

    /// BFS from `start_stage`; returns the set of reachable stage refs
    /// (lowercased) and whether at least one terminal stage is reachable
    /// (`spec.md` §3/§4.I).
    pub fn reachability(&self) -> (std::collections::HashSet<String>, bool) {
        let mut visited = std::collections::HashSet::new();
        let mut queue = std::collections::VecDeque::new();
        let mut terminal_reachable = false;

        let start_key = self.start_stage.to_ascii_lowercase();
        queue.push_back(start_key.clone());
        visited.insert(start_key);

        while let Some(stage_key) = queue.pop_front() {
            let Some(stage) = self.stages.get(&stage_key) else {
                continue;
            };
            if stage.is_terminal() {
                terminal_reachable = true;
            }
            for successor in stage.successors() {
                let key = successor.to_ascii_lowercase();
                if visited.insert(key.clone()) {
                    queue.push_back(key);
                }
            }
        }

        (visited, terminal_reachable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(stage_ref: &str, next: Option<&str>) -> QuestStage {
        QuestStage {
            stage_ref: stage_ref.into(),
            objectives: vec![],
            rewards: Reward::default(),
            branches: vec![],
            next_stage: next.map(String::from),
            fail_conditions: vec![],
        }
    }

    #[test]
    fn reachability_finds_terminal_through_chain() {
        let mut stages = HashMap::new();
        stages.insert("start".into(), stage("start", Some("middle")));
        stages.insert("middle".into(), stage("middle", Some("end")));
        stages.insert("end".into(), stage("end", None));

        let quest = Quest {
            quest_ref: "q1".into(),
            start_stage: "start".into(),
            stages,
        };

        let (reachable, terminal_reachable) = quest.reachability();
        assert!(terminal_reachable);
        assert_eq!(reachable.len(), 3);
    }

    #[test]
    fn unreachable_terminal_is_not_found() {
        let mut stages = HashMap::new();
        stages.insert("start".into(), stage("start", None));
        stages.insert("orphan".into(), stage("orphan", None));

        let quest = Quest {
            quest_ref: "q1".into(),
            start_stage: "start".into(),
            stages,
        };

        let (reachable, terminal_reachable) = quest.reachability();
        assert!(terminal_reachable); // start itself is terminal
        assert!(!reachable.contains("orphan"));
    }
}
