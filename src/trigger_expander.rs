//! Trigger expansion (`spec.md` §4.C).
//!
//! Turns a `SagaArc`'s authored items (inline triggers and/or pattern
//! references) into the concrete, ordered trigger list the interaction
//! service and state machine actually drive against. Progression-enforcing
//! patterns get rewritten here once, at load time, so the hot proximity path
//! never has to reason about pattern chaining.

use crate::catalog::{Catalog, SagaArc, SagaArcItem, SagaTrigger, SagaTriggerPattern};
use crate::error::{SagaError, SagaResult};

/// A trigger as expanded for runtime use, plus the completion token it
/// yields when `TriggerCompleted` is folded for it (only set for triggers
/// that came from a progression-enforcing pattern).
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedTrigger {
    pub trigger: SagaTrigger,
    pub completion_token: Option<String>,
}

impl ExpandedTrigger {
    pub fn exit_radius(&self) -> f64 {
        self.trigger.exit_radius()
    }
}

/// Expand one `SagaArc` into its concrete, ordered trigger list.
///
/// Inline triggers pass through unchanged. A pattern reference is resolved
/// in the pattern catalog and fails with `UnknownPatternRef` if absent. If
/// the arc's feature has a positive approach radius, an implicit
/// `Feature_{arc_ref}` trigger is appended last.
pub fn expand_saga_arc(arc: &SagaArc, catalog: &Catalog) -> SagaResult<Vec<ExpandedTrigger>> {
    let mut expanded = Vec::new();

    for item in &arc.items {
        match item {
            SagaArcItem::Inline(trigger) => expanded.push(ExpandedTrigger {
                trigger: trigger.clone(),
                completion_token: None,
            }),
            SagaArcItem::PatternRef(pattern_ref) => {
                let pattern = catalog
                    .saga_trigger_pattern(pattern_ref)
                    .ok_or_else(|| SagaError::UnknownPatternRef(pattern_ref.clone()))?;
                expanded.extend(expand_pattern(pattern, &arc.arc_ref));
            }
        }
    }

    if let Some(feature_ref) = &arc.feature_ref {
        if let Some(feature) = catalog.saga_feature(feature_ref) {
            if feature.interactable.approach_radius > 0.0 {
                expanded.push(ExpandedTrigger {
                    trigger: SagaTrigger {
                        trigger_ref: format!("Feature_{}", arc.arc_ref),
                        enter_radius: feature.interactable.approach_radius,
                        requires_quest_tokens: Vec::new(),
                        gives_quest_tokens: Vec::new(),
                        spawns: Vec::new(),
                    },
                    completion_token: None,
                });
            }
        }
    }

    Ok(expanded)
}

/// Expand a single pattern's triggers. When `enforce_progression` is set,
/// triggers are sorted outermost-first by `enter_radius` and chained: each
/// trigger requires the previous one's auto-generated completion token and
/// yields its own (`"{arc_ref}_{trigger_ref}_Completed"`).
fn expand_pattern(pattern: &SagaTriggerPattern, arc_ref: &str) -> Vec<ExpandedTrigger> {
    let mut triggers = pattern.triggers.clone();
    if pattern.enforce_progression {
        triggers.sort_by(|a, b| {
            b.enter_radius
                .partial_cmp(&a.enter_radius)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    let mut result = Vec::with_capacity(triggers.len());
    let mut previous_completion_token: Option<String> = None;

    for mut trigger in triggers {
        if !pattern.enforce_progression {
            result.push(ExpandedTrigger {
                trigger,
                completion_token: None,
            });
            continue;
        }

        if let Some(prev) = &previous_completion_token {
            trigger.requires_quest_tokens.push(prev.clone());
        }
        let completion_token = format!("{}_{}_Completed", arc_ref, trigger.trigger_ref);
        previous_completion_token = Some(completion_token.clone());
        result.push(ExpandedTrigger {
            trigger,
            completion_token: Some(completion_token),
        });
    }

    result
}
