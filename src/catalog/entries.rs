//! Catalog entry types (`spec.md` §3 "Catalog", §4.A-C).
//!
//! Every entry kind is keyed by a case-insensitive reference name. Kinds with
//! no behavior-relevant fields beyond existing (quest tokens, spells,
//! consumables, ...) carry only what the world validator and loot/reward
//! application need; kinds that drive the state machine (characters,
//! triggers, features) carry their full shape from the spec.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Lowercase a reference name for use as a catalog key. Reference-name and
/// node-id comparisons are case-insensitive throughout (`spec.md` §3).
pub fn normalize_ref(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// The special `"@self"` reference bypasses lookup validation wherever a
/// reference appears (`spec.md` §4.A), in any case.
pub fn is_self_ref(name: &str) -> bool {
    name.eq_ignore_ascii_case("@self")
}

/// Kind of catalog entry an [`crate::error::SagaError::UnknownRef`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogKind {
    QuestToken,
    Equipment,
    Tool,
    Spell,
    Consumable,
    BuildingMaterial,
    Character,
    CharacterArchetype,
    AvatarArchetype,
    Affinity,
    CombatStance,
    DialogueTree,
    Achievement,
    Quest,
    Faction,
    SagaFeature,
    SagaArc,
    SagaTriggerPattern,
}

impl CatalogKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CatalogKind::QuestToken => "QuestToken",
            CatalogKind::Equipment => "Equipment",
            CatalogKind::Tool => "Tool",
            CatalogKind::Spell => "Spell",
            CatalogKind::Consumable => "Consumable",
            CatalogKind::BuildingMaterial => "BuildingMaterial",
            CatalogKind::Character => "Character",
            CatalogKind::CharacterArchetype => "CharacterArchetype",
            CatalogKind::AvatarArchetype => "AvatarArchetype",
            CatalogKind::Affinity => "Affinity",
            CatalogKind::CombatStance => "CombatStance",
            CatalogKind::DialogueTree => "DialogueTree",
            CatalogKind::Achievement => "Achievement",
            CatalogKind::Quest => "Quest",
            CatalogKind::Faction => "Faction",
            CatalogKind::SagaFeature => "SagaFeature",
            CatalogKind::SagaArc => "SagaArc",
            CatalogKind::SagaTriggerPattern => "SagaTriggerPattern",
        }
    }
}

/// The kind of item a piece of loot or a capability refers to, which
/// determines its stacking rule on application (`spec.md` §4.F.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Idempotent: owning one copy is the same as owning several.
    Equipment,
    Tool,
    Spell,
    /// Stacks by quantity.
    Consumable,
    BuildingMaterial,
}

impl ItemKind {
    /// Equipment/tools/spells don't duplicate; consumables and materials stack.
    pub fn stacks_by_quantity(self) -> bool {
        matches!(self, ItemKind::Consumable | ItemKind::BuildingMaterial)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestTokenDef {
    pub ref_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentDef {
    pub ref_name: String,
    /// Condition in `[0.0, 1.0]` (`spec.md` §4.I stat-range check).
    pub condition: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDef {
    pub ref_name: String,
    pub condition: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellDef {
    pub ref_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumableDef {
    pub ref_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingMaterialDef {
    pub ref_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffinityDef {
    pub ref_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatStanceDef {
    pub ref_name: String,
    /// Multiplier in `[0.1, 3.0]` (`spec.md` §4.I stat-range check).
    pub multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementDef {
    pub ref_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionDef {
    pub ref_name: String,
}

/// A random-pick pool for [`CharacterSpawn::Archetype`](crate::catalog::entries::CharacterSpawn).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterArchetypeDef {
    pub ref_name: String,
    pub pool: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarArchetypeDef {
    pub ref_name: String,
}

/// The seven normalized character attributes (`spec.md` §3 "Character").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CharacterStats {
    pub strength: f64,
    pub dexterity: f64,
    pub constitution: f64,
    pub intelligence: f64,
    pub wisdom: f64,
    pub charisma: f64,
    pub luck: f64,
    pub credits: i64,
}

impl CharacterStats {
    pub fn attributes(&self) -> [f64; 7] {
        [
            self.strength,
            self.dexterity,
            self.constitution,
            self.intelligence,
            self.wisdom,
            self.charisma,
            self.luck,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CharacterTraits {
    pub boss_fight: bool,
    pub hostile: bool,
    pub friendly: bool,
    pub willing_to_bargain: bool,
}

/// A dialogue entry point triggered by the character's health crossing a
/// threshold mid-battle (`spec.md` §3 "Character").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleDialogueTrigger {
    /// Fraction of max health (`[0.0, 1.0]`) at/below which this entry fires.
    pub health_threshold: f64,
    pub dialogue_tree_ref: String,
    pub node_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootEntry {
    pub item_kind: ItemKind,
    pub item_ref: String,
    pub quantity: u32,
}

/// An effect granted by a feature or a dialogue action
/// (`spec.md` §3 "SagaFeature", §10 supplement on status effects/structures).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Effect {
    StatusEffect {
        status_ref: String,
        magnitude: f64,
        duration_seconds: Option<i64>,
    },
    DamageStructure {
        feature_ref: String,
        amount: f64,
    },
    RepairStructure {
        feature_ref: String,
        amount: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Interactable {
    pub dialogue_tree_ref: Option<String>,
    pub loot: Vec<LootEntry>,
    pub gives_quest_tokens: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterTemplate {
    pub ref_name: String,
    pub stats: CharacterStats,
    /// Items the character starts with equipped/owned.
    pub capabilities: Vec<String>,
    pub interactable: Option<Interactable>,
    pub traits: CharacterTraits,
    pub battle_dialogue_triggers: Vec<BattleDialogueTrigger>,
    /// `0` means this character never respawns.
    pub respawn_interval_seconds: u64,
}

impl CharacterTemplate {
    pub fn max_stat_value(&self) -> f64 {
        if self.traits.boss_fight {
            2.0
        } else {
            1.0
        }
    }
}

/// An approach-radius interactable attached to a [`SagaFeature`] (`spec.md` §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureInteractable {
    pub approach_radius: f64,
    pub requires_quest_tokens: Vec<String>,
    pub gives_quest_tokens: Vec<String>,
    pub loot: Vec<LootEntry>,
    pub effects: Vec<Effect>,
    /// `0` means unlimited interactions.
    pub max_interactions: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaFeature {
    pub ref_name: String,
    pub interactable: FeatureInteractable,
}

/// Either a concrete character, or a random pick from an archetype's pool
/// (`spec.md` §3 "CharacterSpawn").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CharacterSpawn {
    Character { character_ref: String, count: u32 },
    Archetype { archetype_ref: String, count: u32 },
}

impl CharacterSpawn {
    pub fn count(&self) -> u32 {
        match self {
            CharacterSpawn::Character { count, .. } => *count,
            CharacterSpawn::Archetype { count, .. } => *count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaTrigger {
    pub trigger_ref: String,
    pub enter_radius: f64,
    pub requires_quest_tokens: Vec<String>,
    pub gives_quest_tokens: Vec<String>,
    pub spawns: Vec<CharacterSpawn>,
}

impl SagaTrigger {
    pub fn exit_radius(&self) -> f64 {
        crate::proximity::exit_radius(self.enter_radius)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaTriggerPattern {
    pub pattern_ref: String,
    pub enforce_progression: bool,
    pub triggers: Vec<SagaTrigger>,
}

/// An item in a [`SagaArc`]'s trigger list: either inline, or a reference to
/// a named, reusable [`SagaTriggerPattern`] (`spec.md` §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SagaArcItem {
    Inline(SagaTrigger),
    PatternRef(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaArc {
    pub arc_ref: String,
    pub gps_center: GpsPoint,
    pub feature_ref: Option<String>,
    pub items: Vec<SagaArcItem>,
}

/// All catalog entries for one kind, stored by lowercased reference name.
pub(crate) type EntryMap<T> = HashMap<String, T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_self_ref_is_case_insensitive() {
        assert!(is_self_ref("@self"));
        assert!(is_self_ref("@SELF"));
        assert!(!is_self_ref("self"));
    }

    #[test]
    fn item_kind_stacking_rules() {
        assert!(!ItemKind::Equipment.stacks_by_quantity());
        assert!(!ItemKind::Tool.stacks_by_quantity());
        assert!(!ItemKind::Spell.stacks_by_quantity());
        assert!(ItemKind::Consumable.stacks_by_quantity());
        assert!(ItemKind::BuildingMaterial.stacks_by_quantity());
    }

    #[test]
    fn boss_fight_doubles_max_stat() {
        let mut template = CharacterTemplate {
            ref_name: "goblin".into(),
            stats: CharacterStats {
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
            traits: CharacterTraits::default(),
            battle_dialogue_triggers: vec![],
            respawn_interval_seconds: 0,
        };
        assert_eq!(template.max_stat_value(), 1.0);
        template.traits.boss_fight = true;
        assert_eq!(template.max_stat_value(), 2.0);
    }
}
