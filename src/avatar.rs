//! The mutable runtime avatar entity (`spec.md` §3 "Avatar").
//!
//! The engine never retains a reference to an `Avatar` past the call that
//! receives it (`spec.md` §9 "Avatar ownership"); every mutating operation
//! takes `&mut Avatar` for the duration of one call and returns without
//! outstanding borrows.

use std::collections::{HashMap, HashSet};

use crate::catalog::ItemKind;
use crate::ids::AvatarId;
use crate::proximity::ModelPoint;

/// The three vitals that clamp to `[0.0, 1.0]` (`spec.md` §3, §8 "Vital clamp").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vitals {
    pub health: f64,
    pub stamina: f64,
    pub mana: f64,
}

impl Default for Vitals {
    fn default() -> Self {
        Self {
            health: 1.0,
            stamina: 1.0,
            mana: 1.0,
        }
    }
}

impl Vitals {
    fn clamp(&mut self) {
        self.health = self.health.clamp(0.0, 1.0);
        self.stamina = self.stamina.clamp(0.0, 1.0);
        self.mana = self.mana.clamp(0.0, 1.0);
    }
}

/// An item-kind-keyed inventory. Equipment/tools/spells are idempotent sets;
/// consumables/materials stack by quantity (`spec.md` §4.F.2).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    owned: HashSet<String>,
    stacks: HashMap<String, u32>,
}

impl Inventory {
    pub fn has(&self, item_kind: ItemKind, item_ref: &str) -> bool {
        let key = item_ref.to_ascii_lowercase();
        if item_kind.stacks_by_quantity() {
            self.stacks.get(&key).copied().unwrap_or(0) > 0
        } else {
            self.owned.contains(&key)
        }
    }

    pub fn quantity(&self, item_ref: &str) -> u32 {
        self.stacks
            .get(&item_ref.to_ascii_lowercase())
            .copied()
            .unwrap_or(0)
    }

    /// Add `quantity` of an item. Non-stacking kinds are granted once
    /// regardless of `quantity` (idempotent ownership).
    pub fn give(&mut self, item_kind: ItemKind, item_ref: &str, quantity: u32) {
        let key = item_ref.to_ascii_lowercase();
        if item_kind.stacks_by_quantity() {
            *self.stacks.entry(key).or_insert(0) += quantity;
        } else {
            self.owned.insert(key);
        }
    }

    /// Remove `quantity` of an item, saturating at zero. Non-stacking kinds
    /// are simply un-owned.
    pub fn take(&mut self, item_kind: ItemKind, item_ref: &str, quantity: u32) {
        let key = item_ref.to_ascii_lowercase();
        if item_kind.stacks_by_quantity() {
            if let Some(count) = self.stacks.get_mut(&key) {
                *count = count.saturating_sub(quantity);
            }
        } else {
            self.owned.remove(&key);
        }
    }
}

/// The mutable runtime entity passed by reference into every mutating
/// engine call (`spec.md` §3 "Avatar").
#[derive(Debug, Clone, PartialEq)]
pub struct Avatar {
    pub avatar_id: AvatarId,
    pub vitals: Vitals,
    /// May go negative, e.g. via a `TransferCurrency` action (`spec.md` §4.F.2).
    pub credits: i64,
    pub inventory: Inventory,
    /// Quest tokens are abstract, non-stackable progress markers
    /// (`GLOSSARY`); held as a set, never decremented by the engine itself.
    pub quest_tokens: HashSet<String>,
    pub traits: HashSet<String>,
    pub achievements: HashSet<String>,
    pub current_stance: Option<String>,
    pub current_affinity: Option<String>,
    pub position: ModelPoint,
}

impl Avatar {
    pub fn new(avatar_id: AvatarId, position: ModelPoint) -> Self {
        Self {
            avatar_id,
            vitals: Vitals::default(),
            credits: 0,
            inventory: Inventory::default(),
            quest_tokens: HashSet::new(),
            traits: HashSet::new(),
            achievements: HashSet::new(),
            current_stance: None,
            current_affinity: None,
            position,
        }
    }

    pub fn has_achievement(&self, achievement_ref: &str) -> bool {
        self.achievements.contains(&achievement_ref.to_ascii_lowercase())
    }

    pub fn unlock_achievement(&mut self, achievement_ref: &str) {
        self.achievements.insert(achievement_ref.to_ascii_lowercase());
    }

    pub fn has_quest_token(&self, token_ref: &str) -> bool {
        self.quest_tokens.contains(&token_ref.to_ascii_lowercase())
    }

    /// Quest tokens are monotone: once granted, never removed by the engine
    /// (`spec.md` §8 "Monotone quest tokens").
    pub fn grant_quest_token(&mut self, token_ref: &str) {
        self.quest_tokens.insert(token_ref.to_ascii_lowercase());
    }

    pub fn has_trait(&self, trait_name: &str) -> bool {
        self.traits.contains(&trait_name.to_ascii_lowercase())
    }

    pub fn assign_trait(&mut self, trait_name: &str) {
        self.traits.insert(trait_name.to_ascii_lowercase());
    }

    pub fn remove_trait(&mut self, trait_name: &str) {
        self.traits.remove(&trait_name.to_ascii_lowercase());
    }

    pub fn heal(&mut self, amount: f64) {
        self.vitals.health += amount;
        self.vitals.clamp();
    }

    pub fn damage(&mut self, amount: f64) {
        self.vitals.health -= amount;
        self.vitals.clamp();
    }

    pub fn transfer_currency(&mut self, amount: i64) {
        self.credits += amount;
    }

    /// Grant loot and vital/structural effects from a feature or dialogue
    /// node, applying each item's stacking rule (`spec.md` §4.F.2).
    pub fn apply_loot(&mut self, loot: &[crate::catalog::LootEntry]) {
        for entry in loot {
            self.inventory.give(entry.item_kind, &entry.item_ref, entry.quantity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vitals_clamp_to_unit_range() {
        let mut avatar = Avatar::new(AvatarId::new(), ModelPoint::new(0.0, 0.0));
        avatar.heal(5.0);
        assert_eq!(avatar.vitals.health, 1.0);
        avatar.damage(10.0);
        assert_eq!(avatar.vitals.health, 0.0);
    }

    #[test]
    fn equipment_ownership_is_idempotent() {
        let mut avatar = Avatar::new(AvatarId::new(), ModelPoint::new(0.0, 0.0));
        avatar.inventory.give(ItemKind::Equipment, "Sword", 1);
        avatar.inventory.give(ItemKind::Equipment, "sword", 5);
        assert!(avatar.inventory.has(ItemKind::Equipment, "SWORD"));
    }

    #[test]
    fn consumables_stack_by_quantity() {
        let mut avatar = Avatar::new(AvatarId::new(), ModelPoint::new(0.0, 0.0));
        avatar.inventory.give(ItemKind::Consumable, "Potion", 2);
        avatar.inventory.give(ItemKind::Consumable, "potion", 3);
        assert_eq!(avatar.inventory.quantity("POTION"), 5);
    }

    #[test]
    fn credits_may_go_negative() {
        let mut avatar = Avatar::new(AvatarId::new(), ModelPoint::new(0.0, 0.0));
        avatar.transfer_currency(-50);
        assert_eq!(avatar.credits, -50);
    }

    #[test]
    fn quest_tokens_are_monotone() {
        let mut avatar = Avatar::new(AvatarId::new(), ModelPoint::new(0.0, 0.0));
        avatar.grant_quest_token("QT1");
        avatar.grant_quest_token("qt1");
        assert_eq!(avatar.quest_tokens.len(), 1);
        assert!(avatar.has_quest_token("Qt1"));
    }
}
