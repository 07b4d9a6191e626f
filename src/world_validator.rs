//! World data validator, run once at catalog load (`spec.md` §4.I).
//!
//! Produces a flat list of human-readable errors; an empty list is a pass.
//! Every check here is read-only over a built [`Catalog`] — nothing here
//! touches a `SagaInstance` or a transaction log.

use std::collections::HashSet;

use crate::catalog::{Action, CatalogKind, Catalog, DialogueNode, DialogueTree, ItemKind, Quest};
use crate::error::SagaError;

/// Run every check and return `Ok(())` on a clean catalog, or
/// `Err(SagaError::WorldValidationFailed)` carrying every error found.
pub fn validate(catalog: &Catalog) -> Result<(), SagaError> {
    let mut errors = Vec::new();

    check_referential_integrity(catalog, &mut errors);
    for tree in catalog.dialogue_trees() {
        check_dialogue_tree(catalog, tree, &mut errors);
    }
    for quest in catalog.quests() {
        check_quest(quest, &mut errors);
    }
    for character in catalog.characters() {
        check_character_stat_ranges(character, &mut errors);
    }
    check_combat_stance_ranges(catalog, &mut errors);
    for character in catalog.characters() {
        check_dialogue_loot_consistency(catalog, character, &mut errors);
    }
    check_heuristics(catalog, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(SagaError::WorldValidationFailed { errors })
    }
}

/// Every feature/arc/pattern reference resolves in its target catalog
/// (`@self` exempt) (`spec.md` §4.I "Reference validity").
fn check_referential_integrity(catalog: &Catalog, errors: &mut Vec<String>) {
    for arc in catalog.saga_arcs() {
        if let Some(feature_ref) = &arc.feature_ref {
            if !catalog.exists(CatalogKind::SagaFeature, feature_ref) {
                errors.push(format!(
                    "SagaArc '{}' references unknown SagaFeature '{}'",
                    arc.arc_ref, feature_ref
                ));
            }
        }
        for item in &arc.items {
            if let crate::catalog::SagaArcItem::PatternRef(pattern_ref) = item {
                if !catalog.exists(CatalogKind::SagaTriggerPattern, pattern_ref) {
                    errors.push(format!(
                        "SagaArc '{}' references unknown SagaTriggerPattern '{}'",
                        arc.arc_ref, pattern_ref
                    ));
                }
            }
        }
    }

    for feature in catalog.saga_features() {
        for token_ref in feature
            .interactable
            .requires_quest_tokens
            .iter()
            .chain(&feature.interactable.gives_quest_tokens)
        {
            if !catalog.exists(CatalogKind::QuestToken, token_ref) {
                errors.push(format!(
                    "SagaFeature '{}' references unknown QuestToken '{}'",
                    feature.ref_name, token_ref
                ));
            }
        }
        for loot in &feature.interactable.loot {
            check_item_ref_exists(catalog, &feature.ref_name, "SagaFeature", loot.item_kind, &loot.item_ref, errors);
        }
    }

    for character in catalog.characters() {
        for capability in &character.capabilities {
            if !catalog.exists(CatalogKind::Equipment, capability)
                && !catalog.exists(CatalogKind::Tool, capability)
                && !catalog.exists(CatalogKind::Spell, capability)
            {
                errors.push(format!(
                    "Character '{}' capability '{}' does not resolve to any Equipment/Tool/Spell",
                    character.ref_name, capability
                ));
            }
        }
        if let Some(interactable) = &character.interactable {
            if let Some(tree_ref) = &interactable.dialogue_tree_ref {
                if !catalog.exists(CatalogKind::DialogueTree, tree_ref) {
                    errors.push(format!(
                        "Character '{}' references unknown DialogueTree '{}'",
                        character.ref_name, tree_ref
                    ));
                }
            }
            for token_ref in &interactable.gives_quest_tokens {
                if !catalog.exists(CatalogKind::QuestToken, token_ref) {
                    errors.push(format!(
                        "Character '{}' gives unknown QuestToken '{}'",
                        character.ref_name, token_ref
                    ));
                }
            }
        }
        for battle_trigger in &character.battle_dialogue_triggers {
            if !catalog.exists(CatalogKind::DialogueTree, &battle_trigger.dialogue_tree_ref) {
                errors.push(format!(
                    "Character '{}' battle dialogue trigger references unknown DialogueTree '{}'",
                    character.ref_name, battle_trigger.dialogue_tree_ref
                ));
            }
        }
    }
}

fn check_item_ref_exists(
    catalog: &Catalog,
    owner_ref: &str,
    owner_kind: &str,
    item_kind: ItemKind,
    item_ref: &str,
    errors: &mut Vec<String>,
) {
    let kind = match item_kind {
        ItemKind::Equipment => CatalogKind::Equipment,
        ItemKind::Tool => CatalogKind::Tool,
        ItemKind::Spell => CatalogKind::Spell,
        ItemKind::Consumable => CatalogKind::Consumable,
        ItemKind::BuildingMaterial => CatalogKind::BuildingMaterial,
    };
    if !catalog.exists(kind, item_ref) {
        errors.push(format!(
            "{} '{}' references unknown {:?} item '{}'",
            owner_kind, owner_ref, item_kind, item_ref
        ));
    }
}

/// `spec.md` §4.I "Dialogue trees": start node exists, ids unique, every
/// `next_node_id` resolves, every node reachable, every node is a
/// non-dead-end or an intentional terminal.
fn check_dialogue_tree(catalog: &Catalog, tree: &DialogueTree, errors: &mut Vec<String>) {
    if tree.start_node().is_none() {
        errors.push(format!(
            "DialogueTree '{}' start_node_id '{}' does not exist",
            tree.tree_ref, tree.start_node_id
        ));
        return;
    }

    for node in tree.nodes.values() {
        for choice in &node.choices {
            if tree.node(&choice.next_node_id).is_none() {
                errors.push(format!(
                    "DialogueTree '{}' node '{}' choice '{}' targets unknown node '{}'",
                    tree.tree_ref, node.node_id, choice.label, choice.next_node_id
                ));
            }
        }
        for action in &node.actions {
            check_dialogue_action_refs(catalog, tree, node, action, errors);
        }
    }

    let battle_entry_points: Vec<&str> = catalog
        .characters()
        .flat_map(|c| &c.battle_dialogue_triggers)
        .filter(|t| t.dialogue_tree_ref.eq_ignore_ascii_case(&tree.tree_ref))
        .map(|t| t.node_id.as_str())
        .collect();
    let reachable = reachable_node_ids(tree, tree.entry_points(battle_entry_points));

    for node in tree.nodes.values() {
        if !reachable.contains(&node.node_id.to_ascii_lowercase()) {
            errors.push(format!(
                "DialogueTree '{}' node '{}' is unreachable from any entry point",
                tree.tree_ref, node.node_id
            ));
        }
        if node.is_dead_end() && !node.is_intentional_terminal() {
            errors.push(format!(
                "DialogueTree '{}' node '{}' is a dead end with no choices and no terminal action",
                tree.tree_ref, node.node_id
            ));
        }
    }
}

fn check_dialogue_action_refs(
    catalog: &Catalog,
    tree: &DialogueTree,
    node: &DialogueNode,
    action: &Action,
    errors: &mut Vec<String>,
) {
    let missing_ref = |kind: CatalogKind, ref_name: &str| !catalog.exists(kind, ref_name);
    match action {
        Action::GiveItem { item_kind, item_ref, .. } | Action::TakeItem { item_kind, item_ref, .. } => {
            check_item_ref_exists(catalog, &node.node_id, "DialogueNode", *item_kind, item_ref, errors);
        }
        Action::GiveQuestToken { token_ref } => {
            if missing_ref(CatalogKind::QuestToken, token_ref) {
                errors.push(format!(
                    "DialogueTree '{}' node '{}' gives unknown QuestToken '{}'",
                    tree.tree_ref, node.node_id, token_ref
                ));
            }
        }
        Action::UnlockAchievement { achievement_ref } => {
            if missing_ref(CatalogKind::Achievement, achievement_ref) {
                errors.push(format!(
                    "DialogueTree '{}' node '{}' unlocks unknown Achievement '{}'",
                    tree.tree_ref, node.node_id, achievement_ref
                ));
            }
        }
        Action::ChangeReputation { faction_ref, .. } => {
            if missing_ref(CatalogKind::Faction, faction_ref) {
                errors.push(format!(
                    "DialogueTree '{}' node '{}' references unknown Faction '{}'",
                    tree.tree_ref, node.node_id, faction_ref
                ));
            }
        }
        Action::AcceptQuest { quest_ref } | Action::CompleteQuest { quest_ref } | Action::AbandonQuest { quest_ref } => {
            if missing_ref(CatalogKind::Quest, quest_ref) {
                errors.push(format!(
                    "DialogueTree '{}' node '{}' references unknown Quest '{}'",
                    tree.tree_ref, node.node_id, quest_ref
                ));
            }
        }
        Action::ChangeStance { stance_ref } => {
            if missing_ref(CatalogKind::CombatStance, stance_ref) {
                errors.push(format!(
                    "DialogueTree '{}' node '{}' references unknown CombatStance '{}'",
                    tree.tree_ref, node.node_id, stance_ref
                ));
            }
        }
        Action::ChangeAffinity { affinity_ref } | Action::GrantAffinity { affinity_ref } => {
            if missing_ref(CatalogKind::Affinity, affinity_ref) {
                errors.push(format!(
                    "DialogueTree '{}' node '{}' references unknown Affinity '{}'",
                    tree.tree_ref, node.node_id, affinity_ref
                ));
            }
        }
        _ => {}
    }
}

fn reachable_node_ids(tree: &DialogueTree, entry_points: Vec<String>) -> HashSet<String> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: Vec<String> = entry_points;
    while let Some(node_id) = queue.pop() {
        if !visited.insert(node_id.clone()) {
            continue;
        }
        if let Some(node) = tree.node(&node_id) {
            for choice in &node.choices {
                queue.push(choice.next_node_id.to_ascii_lowercase());
            }
        }
    }
    visited
}

/// `spec.md` §4.I "Quests": `start_stage` exists, every successor resolves,
/// a terminal stage is reachable, every stage is reachable.
fn check_quest(quest: &Quest, errors: &mut Vec<String>) {
    if quest.start().is_none() {
        errors.push(format!("Quest '{}' start_stage '{}' does not exist", quest.quest_ref, quest.start_stage));
        return;
    }

    for stage in quest.stages.values() {
        for successor in stage.successors() {
            if quest.stage(successor).is_none() {
                errors.push(format!(
                    "Quest '{}' stage '{}' references unknown successor stage '{}'",
                    quest.quest_ref, stage.stage_ref, successor
                ));
            }
        }
    }

    let (reachable, terminal_reachable) = quest.reachability();
    if !terminal_reachable {
        errors.push(format!("Quest '{}' has no terminal stage reachable from '{}'", quest.quest_ref, quest.start_stage));
    }
    for stage in quest.stages.values() {
        if !reachable.contains(&stage.stage_ref.to_ascii_lowercase()) {
            errors.push(format!(
                "Quest '{}' stage '{}' is unreachable from start_stage '{}'",
                quest.quest_ref, stage.stage_ref, quest.start_stage
            ));
        }
    }
}

/// `spec.md` §4.I "Stat ranges": character stats, credits, and traits.
fn check_character_stat_ranges(character: &crate::catalog::CharacterTemplate, errors: &mut Vec<String>) {
    let max = character.max_stat_value();
    for (name, value) in [
        ("strength", character.stats.strength),
        ("dexterity", character.stats.dexterity),
        ("constitution", character.stats.constitution),
        ("intelligence", character.stats.intelligence),
        ("wisdom", character.stats.wisdom),
        ("charisma", character.stats.charisma),
        ("luck", character.stats.luck),
    ] {
        if !(0.0..=max).contains(&value) {
            errors.push(format!(
                "Character '{}' stat '{}' = {} is out of range [0, {}]",
                character.ref_name, name, value, max
            ));
        }
    }
    if character.stats.credits < 0 {
        errors.push(format!("Character '{}' credits {} must be >= 0", character.ref_name, character.stats.credits));
    }
}

/// `spec.md` §4.I "Stat ranges": equipment/tool condition and combat-stance multiplier.
fn check_combat_stance_ranges(catalog: &Catalog, errors: &mut Vec<String>) {
    for equipment in catalog.equipment_entries() {
        if !(0.0..=1.0).contains(&equipment.condition) {
            errors.push(format!(
                "Equipment '{}' condition {} is out of range [0, 1]",
                equipment.ref_name, equipment.condition
            ));
        }
    }
    for tool in catalog.tools() {
        if !(0.0..=1.0).contains(&tool.condition) {
            errors.push(format!(
                "Tool '{}' condition {} is out of range [0, 1]",
                tool.ref_name, tool.condition
            ));
        }
    }
    for stance in catalog.combat_stances() {
        if !(0.1..=3.0).contains(&stance.multiplier) {
            errors.push(format!(
                "CombatStance '{}' multiplier {} is out of range [0.1, 3.0]",
                stance.ref_name, stance.multiplier
            ));
        }
    }
}

/// `spec.md` §4.I "Dialogue↔loot consistency".
fn check_dialogue_loot_consistency(catalog: &Catalog, character: &crate::catalog::CharacterTemplate, errors: &mut Vec<String>) {
    let Some(interactable) = &character.interactable else { return };
    let Some(tree_ref) = &interactable.dialogue_tree_ref else { return };
    let Some(tree) = catalog.dialogue_tree(tree_ref) else { return };

    let mut loot_available: std::collections::HashMap<String, u32> = std::collections::HashMap::new();
    for loot in &interactable.loot {
        *loot_available.entry(loot.item_ref.to_ascii_lowercase()).or_insert(0) += loot.quantity;
    }

    for node in tree.nodes.values() {
        for action in &node.actions {
            if let Action::GiveItem { item_ref, quantity, .. } = action {
                let key = item_ref.to_ascii_lowercase();
                let available = loot_available.get(&key).copied().unwrap_or(0);
                if available < *quantity {
                    errors.push(format!(
                        "Character '{}' dialogue node '{}' gives {} of '{}' but Interactable.Loot only provides {}",
                        character.ref_name, node.node_id, quantity, item_ref, available
                    ));
                }
            }
        }
    }
}

/// `spec.md` §4.I "Heuristics".
fn check_heuristics(catalog: &Catalog, errors: &mut Vec<String>) {
    for character in catalog.characters() {
        let Some(interactable) = &character.interactable else { continue };
        let Some(tree_ref) = &interactable.dialogue_tree_ref else { continue };
        let Some(tree) = catalog.dialogue_tree(tree_ref) else { continue };

        for node in tree.nodes.values() {
            let starts_combat = node
                .actions
                .iter()
                .any(|a| matches!(a, Action::StartCombat { .. } | Action::StartBossBattle { .. }));
            if !starts_combat {
                continue;
            }
            let sets_hostile = node
                .actions
                .iter()
                .any(|a| matches!(a, Action::SetCharacterState { hostile: true, .. }))
                || character.traits.hostile;
            if !sets_hostile {
                errors.push(format!(
                    "Character '{}' dialogue node '{}' starts combat without the character ever becoming Hostile",
                    character.ref_name, node.node_id
                ));
            }
        }
    }

    for arc in catalog.saga_arcs() {
        for item in &arc.items {
            let spawns: &[crate::catalog::CharacterSpawn] = match item {
                crate::catalog::SagaArcItem::Inline(trigger) => &trigger.spawns,
                crate::catalog::SagaArcItem::PatternRef(pattern_ref) => {
                    let Some(pattern) = catalog.saga_trigger_pattern(pattern_ref) else { continue };
                    for trigger in &pattern.triggers {
                        check_spawn_list_has_dialogue(catalog, arc, &trigger.spawns, errors);
                    }
                    continue;
                }
            };
            check_spawn_list_has_dialogue(catalog, arc, spawns, errors);
        }
    }
}

fn check_spawn_list_has_dialogue(
    catalog: &Catalog,
    arc: &crate::catalog::SagaArc,
    spawns: &[crate::catalog::CharacterSpawn],
    errors: &mut Vec<String>,
) {
    for spawn in spawns {
        let character_refs: Vec<String> = match spawn {
            crate::catalog::CharacterSpawn::Character { character_ref, .. } => vec![character_ref.clone()],
            crate::catalog::CharacterSpawn::Archetype { archetype_ref, .. } => catalog
                .character_archetype(archetype_ref)
                .map(|a| a.pool.clone())
                .unwrap_or_default(),
        };
        for character_ref in character_refs {
            let Some(character) = catalog.character(&character_ref) else { continue };
            let has_dialogue = character.interactable.as_ref().and_then(|i| i.dialogue_tree_ref.as_ref()).is_some();
            let is_ambient = !character.traits.hostile && !character.traits.boss_fight && !character.traits.friendly;
            let is_documented_boss = character.traits.boss_fight
                && character.traits.hostile
                && !character.battle_dialogue_triggers.is_empty();
            let is_purely_hostile = character.traits.hostile && !character.traits.boss_fight;
            if !has_dialogue && !is_ambient && !is_documented_boss && !is_purely_hostile {
                errors.push(format!(
                    "SagaArc '{}' spawns Character '{}' with no dialogue and no recognized exemption",
                    arc.arc_ref, character_ref
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        CharacterStats, CharacterTemplate, CharacterTraits, Choice, CombatStanceDef, Condition,
        DialogueNode, DialogueTree, EquipmentDef,
    };
    use std::collections::HashMap;

    fn stats() -> CharacterStats {
        CharacterStats {
            strength: 0.5,
            dexterity: 0.5,
            constitution: 0.5,
            intelligence: 0.5,
            wisdom: 0.5,
            charisma: 0.5,
            luck: 0.5,
            credits: 0,
        }
    }

    #[test]
    fn clean_catalog_passes() {
        let catalog = Catalog::builder().build();
        assert!(validate(&catalog).is_ok());
    }

    #[test]
    fn dead_end_node_without_terminal_action_is_flagged() {
        let mut nodes = HashMap::new();
        nodes.insert(
            "greeting".to_string(),
            DialogueNode {
                node_id: "greeting".into(),
                text: None,
                conditions: vec![],
                actions: vec![],
                choices: vec![],
            },
        );
        let tree = DialogueTree {
            tree_ref: "t1".into(),
            start_node_id: "greeting".into(),
            nodes,
        };
        let mut builder = Catalog::builder();
        builder.insert_dialogue_tree(tree, "t1").unwrap();
        let catalog = builder.build();

        let err = validate(&catalog).unwrap_err();
        let SagaError::WorldValidationFailed { errors } = err else { panic!("wrong error") };
        assert!(errors.iter().any(|e| e.contains("dead end")));
    }

    #[test]
    fn unreachable_node_is_flagged() {
        let mut nodes = HashMap::new();
        nodes.insert(
            "start".to_string(),
            DialogueNode {
                node_id: "start".into(),
                text: None,
                conditions: vec![],
                actions: vec![],
                choices: vec![Choice {
                    label: "leave".into(),
                    conditions: vec![],
                    next_node_id: "end".into(),
                }],
            },
        );
        nodes.insert(
            "end".to_string(),
            DialogueNode {
                node_id: "end".into(),
                text: None,
                conditions: vec![],
                actions: vec![],
                choices: vec![],
            },
        );
        nodes.insert(
            "orphan".to_string(),
            DialogueNode {
                node_id: "orphan".into(),
                text: None,
                conditions: vec![Condition::CreditsAtLeast { amount: 0 }],
                actions: vec![],
                choices: vec![],
            },
        );
        let tree = DialogueTree {
            tree_ref: "t1".into(),
            start_node_id: "start".into(),
            nodes,
        };
        let mut builder = Catalog::builder();
        builder.insert_dialogue_tree(tree, "t1").unwrap();
        let catalog = builder.build();

        let err = validate(&catalog).unwrap_err();
        let SagaError::WorldValidationFailed { errors } = err else { panic!("wrong error") };
        assert!(errors.iter().any(|e| e.contains("orphan") && e.contains("unreachable")));
    }

    #[test]
    fn out_of_range_stat_is_flagged() {
        let mut builder = Catalog::builder();
        builder
            .insert_character(
                CharacterTemplate {
                    ref_name: "goblin".into(),
                    stats: CharacterStats { strength: 1.5, ..stats() },
                    capabilities: vec![],
                    interactable: None,
                    traits: CharacterTraits::default(),
                    battle_dialogue_triggers: vec![],
                    respawn_interval_seconds: 0,
                },
                "goblin",
            )
            .unwrap();
        let catalog = builder.build();

        let err = validate(&catalog).unwrap_err();
        let SagaError::WorldValidationFailed { errors } = err else { panic!("wrong error") };
        assert!(errors.iter().any(|e| e.contains("strength")));
    }

    #[test]
    fn out_of_range_equipment_condition_is_flagged() {
        let mut builder = Catalog::builder();
        builder
            .insert_equipment(
                EquipmentDef {
                    ref_name: "rusty_sword".into(),
                    condition: 1.5,
                },
                "rusty_sword",
            )
            .unwrap();
        let catalog = builder.build();

        let err = validate(&catalog).unwrap_err();
        let SagaError::WorldValidationFailed { errors } = err else { panic!("wrong error") };
        assert!(errors.iter().any(|e| e.contains("rusty_sword") && e.contains("condition")));
    }

    #[test]
    fn out_of_range_combat_stance_multiplier_is_flagged() {
        let mut builder = Catalog::builder();
        builder
            .insert_combat_stance(
                CombatStanceDef {
                    ref_name: "berserk".into(),
                    multiplier: 5.0,
                },
                "berserk",
            )
            .unwrap();
        let catalog = builder.build();

        let err = validate(&catalog).unwrap_err();
        let SagaError::WorldValidationFailed { errors } = err else { panic!("wrong error") };
        assert!(errors.iter().any(|e| e.contains("berserk") && e.contains("multiplier")));
    }

    #[test]
    fn conditional_fallback_with_check_sibling_is_not_flagged_unreachable() {
        let mut nodes = HashMap::new();
        nodes.insert(
            "start".to_string(),
            DialogueNode {
                node_id: "start".into(),
                text: None,
                conditions: vec![],
                actions: vec![],
                choices: vec![],
            },
        );
        nodes.insert(
            "reputation_check".to_string(),
            DialogueNode {
                node_id: "reputation_check".into(),
                text: None,
                conditions: vec![],
                actions: vec![],
                choices: vec![],
            },
        );
        nodes.insert(
            "reputation".to_string(),
            DialogueNode {
                node_id: "reputation".into(),
                text: None,
                conditions: vec![],
                actions: vec![],
                choices: vec![],
            },
        );
        let tree = DialogueTree {
            tree_ref: "t1".into(),
            start_node_id: "start".into(),
            nodes,
        };
        let mut builder = Catalog::builder();
        builder.insert_dialogue_tree(tree, "t1").unwrap();
        let catalog = builder.build();

        let result = validate(&catalog);
        if let Err(SagaError::WorldValidationFailed { errors }) = &result {
            assert!(!errors.iter().any(|e| e.contains("reputation") && e.contains("unreachable")));
        }
    }
}
