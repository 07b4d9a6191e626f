//! Immutable world catalogs keyed by reference name (`spec.md` §4.A).
//!
//! A [`Catalog`] is built once at load time via [`CatalogBuilder`] and never
//! mutated afterwards; every lookup is a single `HashMap` hit, i.e. O(1).

pub mod dialogue;
pub mod entries;
pub mod quest;

use std::collections::HashMap;

use crate::error::SagaError;

pub use entries::{
    is_self_ref, normalize_ref, AchievementDef, AffinityDef, AvatarArchetypeDef,
    BattleDialogueTrigger, BuildingMaterialDef, CatalogKind, CharacterArchetypeDef,
    CharacterSpawn, CharacterStats, CharacterTemplate, CharacterTraits, CombatStanceDef,
    ConsumableDef, Effect, EquipmentDef, FactionDef, FeatureInteractable, GpsPoint, Interactable,
    ItemKind, LootEntry, QuestTokenDef, SagaArc, SagaArcItem, SagaFeature, SagaTrigger,
    SagaTriggerPattern, SpellDef, ToolDef,
};
pub use dialogue::{Action, Choice, Condition, DialogueNode, DialogueTree};
pub use quest::{Branch, FailCondition, Objective, Quest, QuestStage, Reward};

macro_rules! catalog_kind {
    ($field:ident, $entry_ty:ty, $kind:expr, $insert:ident, $get:ident, $exists:ident) => {
        /// Insert an entry, rejecting a duplicate (case-insensitive) key.
        pub fn $insert(&mut self, entry: $entry_ty, ref_name: &str) -> Result<(), SagaError> {
            let key = normalize_ref(ref_name);
            if self.$field.contains_key(&key) {
                return Err(SagaError::invalid_input(
                    "ref_name",
                    format!("duplicate {} key: {}", $kind.as_str(), ref_name),
                ));
            }
            self.$field.insert(key, entry);
            Ok(())
        }

        pub fn $get(&self, ref_name: &str) -> Option<&$entry_ty> {
            self.$field.get(&normalize_ref(ref_name))
        }

        pub fn $exists(&self, ref_name: &str) -> bool {
            is_self_ref(ref_name) || self.$field.contains_key(&normalize_ref(ref_name))
        }
    };
}

/// All authored content, loaded once and shared read-only across avatars.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    quest_tokens: HashMap<String, QuestTokenDef>,
    equipment: HashMap<String, EquipmentDef>,
    tools: HashMap<String, ToolDef>,
    spells: HashMap<String, SpellDef>,
    consumables: HashMap<String, ConsumableDef>,
    building_materials: HashMap<String, BuildingMaterialDef>,
    characters: HashMap<String, CharacterTemplate>,
    character_archetypes: HashMap<String, CharacterArchetypeDef>,
    avatar_archetypes: HashMap<String, AvatarArchetypeDef>,
    affinities: HashMap<String, AffinityDef>,
    combat_stances: HashMap<String, CombatStanceDef>,
    dialogue_trees: HashMap<String, DialogueTree>,
    achievements: HashMap<String, AchievementDef>,
    quests: HashMap<String, Quest>,
    factions: HashMap<String, FactionDef>,
    saga_features: HashMap<String, SagaFeature>,
    saga_arcs: HashMap<String, SagaArc>,
    saga_trigger_patterns: HashMap<String, SagaTriggerPattern>,
}

impl Catalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    catalog_kind!(
        quest_tokens,
        QuestTokenDef,
        CatalogKind::QuestToken,
        insert_quest_token,
        quest_token,
        has_quest_token
    );
    catalog_kind!(
        equipment,
        EquipmentDef,
        CatalogKind::Equipment,
        insert_equipment,
        equipment,
        has_equipment
    );
    catalog_kind!(tools, ToolDef, CatalogKind::Tool, insert_tool, tool, has_tool);
    catalog_kind!(
        spells,
        SpellDef,
        CatalogKind::Spell,
        insert_spell,
        spell,
        has_spell
    );
    catalog_kind!(
        consumables,
        ConsumableDef,
        CatalogKind::Consumable,
        insert_consumable,
        consumable,
        has_consumable
    );
    catalog_kind!(
        building_materials,
        BuildingMaterialDef,
        CatalogKind::BuildingMaterial,
        insert_building_material,
        building_material,
        has_building_material
    );
    catalog_kind!(
        characters,
        CharacterTemplate,
        CatalogKind::Character,
        insert_character,
        character,
        has_character
    );
    catalog_kind!(
        character_archetypes,
        CharacterArchetypeDef,
        CatalogKind::CharacterArchetype,
        insert_character_archetype,
        character_archetype,
        has_character_archetype
    );
    catalog_kind!(
        avatar_archetypes,
        AvatarArchetypeDef,
        CatalogKind::AvatarArchetype,
        insert_avatar_archetype,
        avatar_archetype,
        has_avatar_archetype
    );
    catalog_kind!(
        affinities,
        AffinityDef,
        CatalogKind::Affinity,
        insert_affinity,
        affinity,
        has_affinity
    );
    catalog_kind!(
        combat_stances,
        CombatStanceDef,
        CatalogKind::CombatStance,
        insert_combat_stance,
        combat_stance,
        has_combat_stance
    );
    catalog_kind!(
        dialogue_trees,
        DialogueTree,
        CatalogKind::DialogueTree,
        insert_dialogue_tree,
        dialogue_tree,
        has_dialogue_tree
    );
    catalog_kind!(
        achievements,
        AchievementDef,
        CatalogKind::Achievement,
        insert_achievement,
        achievement,
        has_achievement
    );
    catalog_kind!(quests, Quest, CatalogKind::Quest, insert_quest, quest, has_quest);
    catalog_kind!(
        factions,
        FactionDef,
        CatalogKind::Faction,
        insert_faction,
        faction,
        has_faction
    );
    catalog_kind!(
        saga_features,
        SagaFeature,
        CatalogKind::SagaFeature,
        insert_saga_feature,
        saga_feature,
        has_saga_feature
    );
    catalog_kind!(
        saga_arcs,
        SagaArc,
        CatalogKind::SagaArc,
        insert_saga_arc,
        saga_arc,
        has_saga_arc
    );
    catalog_kind!(
        saga_trigger_patterns,
        SagaTriggerPattern,
        CatalogKind::SagaTriggerPattern,
        insert_saga_trigger_pattern,
        saga_trigger_pattern,
        has_saga_trigger_pattern
    );

    pub fn saga_arcs(&self) -> impl Iterator<Item = &SagaArc> {
        self.saga_arcs.values()
    }

    pub fn characters(&self) -> impl Iterator<Item = &CharacterTemplate> {
        self.characters.values()
    }

    pub fn dialogue_trees(&self) -> impl Iterator<Item = &DialogueTree> {
        self.dialogue_trees.values()
    }

    pub fn quests(&self) -> impl Iterator<Item = &Quest> {
        self.quests.values()
    }

    pub fn saga_features(&self) -> impl Iterator<Item = &SagaFeature> {
        self.saga_features.values()
    }

    pub fn equipment_entries(&self) -> impl Iterator<Item = &EquipmentDef> {
        self.equipment.values()
    }

    pub fn tools(&self) -> impl Iterator<Item = &ToolDef> {
        self.tools.values()
    }

    pub fn combat_stances(&self) -> impl Iterator<Item = &CombatStanceDef> {
        self.combat_stances.values()
    }

    /// Resolve a general `(kind, ref)` existence check, used by the world
    /// validator's blanket referential-integrity pass.
    pub fn exists(&self, kind: CatalogKind, ref_name: &str) -> bool {
        if is_self_ref(ref_name) {
            return true;
        }
        match kind {
            CatalogKind::QuestToken => self.has_quest_token(ref_name),
            CatalogKind::Equipment => self.has_equipment(ref_name),
            CatalogKind::Tool => self.has_tool(ref_name),
            CatalogKind::Spell => self.has_spell(ref_name),
            CatalogKind::Consumable => self.has_consumable(ref_name),
            CatalogKind::BuildingMaterial => self.has_building_material(ref_name),
            CatalogKind::Character => self.has_character(ref_name),
            CatalogKind::CharacterArchetype => self.has_character_archetype(ref_name),
            CatalogKind::AvatarArchetype => self.has_avatar_archetype(ref_name),
            CatalogKind::Affinity => self.has_affinity(ref_name),
            CatalogKind::CombatStance => self.has_combat_stance(ref_name),
            CatalogKind::DialogueTree => self.has_dialogue_tree(ref_name),
            CatalogKind::Achievement => self.has_achievement(ref_name),
            CatalogKind::Quest => self.has_quest(ref_name),
            CatalogKind::Faction => self.has_faction(ref_name),
            CatalogKind::SagaFeature => self.has_saga_feature(ref_name),
            CatalogKind::SagaArc => self.has_saga_arc(ref_name),
            CatalogKind::SagaTriggerPattern => self.has_saga_trigger_pattern(ref_name),
        }
    }
}

/// Accumulates catalog entries, rejecting duplicate keys eagerly
/// (`spec.md` §4.A: "A catalog rejects duplicate keys at load time").
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    catalog: Catalog,
}

impl CatalogBuilder {
    pub fn build(self) -> Catalog {
        self.catalog
    }
}

impl std::ops::Deref for CatalogBuilder {
    type Target = Catalog;
    fn deref(&self) -> &Catalog {
        &self.catalog
    }
}

impl std::ops::DerefMut for CatalogBuilder {
    fn deref_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut builder = Catalog::builder();
        builder
            .insert_quest_token(
                QuestTokenDef {
                    ref_name: "GoblinSlain".into(),
                },
                "GoblinSlain",
            )
            .unwrap();
        let catalog = builder.build();
        assert!(catalog.has_quest_token("goblinslain"));
        assert!(catalog.has_quest_token("GOBLINSLAIN"));
        assert!(!catalog.has_quest_token("somethingelse"));
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let mut builder = Catalog::builder();
        builder
            .insert_quest_token(
                QuestTokenDef {
                    ref_name: "A".into(),
                },
                "A",
            )
            .unwrap();
        let err = builder.insert_quest_token(
            QuestTokenDef {
                ref_name: "a".into(),
            },
            "a",
        );
        assert!(err.is_err());
    }

    #[test]
    fn self_ref_always_exists() {
        let catalog = Catalog::builder().build();
        assert!(catalog.exists(CatalogKind::Character, "@self"));
        assert!(catalog.exists(CatalogKind::Character, "@SELF"));
        assert!(!catalog.exists(CatalogKind::Character, "Unknown"));
    }
}
