//! Trigger and feature availability checks (`spec.md` §4.G).
//!
//! Pure queries over an avatar and the expanded content; no transactions,
//! no catalog lookups beyond what's passed in. Cooldowns are deliberately
//! absent here: `spec.md` §4.G makes them a caller concern over
//! `last_interacted_at` from `SagaState`.

use crate::avatar::Avatar;
use crate::catalog::{entries::is_self_ref, FeatureInteractable};
use crate::trigger_expander::ExpandedTrigger;

/// Result of an availability check: whether the action may proceed, plus the
/// missing quest tokens (if any) for UI display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityCheck {
    pub can_proceed: bool,
    pub missing_quest_tokens: Vec<String>,
}

fn missing_tokens(avatar: &Avatar, required: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|token_ref| !is_self_ref(token_ref) && !avatar.has_quest_token(token_ref))
        .cloned()
        .collect()
}

/// Whether `avatar` holds every quest token `trigger` requires
/// (`"@self"` is always satisfied).
pub fn can_activate_trigger(avatar: &Avatar, trigger: &ExpandedTrigger) -> AvailabilityCheck {
    let missing = missing_tokens(avatar, &trigger.trigger.requires_quest_tokens);
    AvailabilityCheck {
        can_proceed: missing.is_empty(),
        missing_quest_tokens: missing,
    }
}

/// Whether `avatar` may interact with a feature: the same token rule, plus
/// `interaction_count < max_interactions` when `max_interactions > 0`
/// (`spec.md` §4.G).
pub fn can_interact_with_feature(
    avatar: &Avatar,
    interactable: &FeatureInteractable,
    interaction_count: u32,
) -> AvailabilityCheck {
    let mut missing = missing_tokens(avatar, &interactable.requires_quest_tokens);
    let mut can_proceed = missing.is_empty();

    if interactable.max_interactions > 0 && interaction_count >= interactable.max_interactions {
        can_proceed = false;
    }

    missing.sort();
    AvailabilityCheck {
        can_proceed,
        missing_quest_tokens: missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CharacterSpawn, SagaTrigger};
    use crate::ids::AvatarId;
    use crate::proximity::ModelPoint;

    fn avatar_with_tokens(tokens: &[&str]) -> Avatar {
        let mut avatar = Avatar::new(AvatarId::new(), ModelPoint::new(0.0, 0.0));
        for token in tokens {
            avatar.grant_quest_token(token);
        }
        avatar
    }

    #[test]
    fn feature_gate_scenario_reports_missing_token() {
        let avatar = avatar_with_tokens(&["A"]);
        let interactable = FeatureInteractable {
            approach_radius: 5.0,
            requires_quest_tokens: vec!["A".into(), "B".into()],
            gives_quest_tokens: vec![],
            loot: vec![],
            effects: vec![],
            max_interactions: 0,
        };
        let check = can_interact_with_feature(&avatar, &interactable, 0);
        assert!(!check.can_proceed);
        assert_eq!(check.missing_quest_tokens, vec!["B".to_string()]);
    }

    #[test]
    fn max_interactions_of_zero_is_unlimited() {
        let avatar = avatar_with_tokens(&[]);
        let interactable = FeatureInteractable {
            approach_radius: 5.0,
            requires_quest_tokens: vec![],
            gives_quest_tokens: vec![],
            loot: vec![],
            effects: vec![],
            max_interactions: 0,
        };
        let check = can_interact_with_feature(&avatar, &interactable, 1_000);
        assert!(check.can_proceed);
    }

    #[test]
    fn max_interactions_blocks_once_reached() {
        let avatar = avatar_with_tokens(&[]);
        let interactable = FeatureInteractable {
            approach_radius: 5.0,
            requires_quest_tokens: vec![],
            gives_quest_tokens: vec![],
            loot: vec![],
            effects: vec![],
            max_interactions: 2,
        };
        assert!(can_interact_with_feature(&avatar, &interactable, 1).can_proceed);
        assert!(!can_interact_with_feature(&avatar, &interactable, 2).can_proceed);
    }

    #[test]
    fn self_ref_token_is_always_satisfied() {
        let avatar = avatar_with_tokens(&[]);
        let trigger = ExpandedTrigger {
            trigger: SagaTrigger {
                trigger_ref: "T".into(),
                enter_radius: 5.0,
                requires_quest_tokens: vec!["@self".into()],
                gives_quest_tokens: vec![],
                spawns: Vec::<CharacterSpawn>::new(),
            },
            completion_token: None,
        };
        assert!(can_activate_trigger(&avatar, &trigger).can_proceed);
    }
}
