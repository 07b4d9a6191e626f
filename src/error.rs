//! Unified error type for the engine.
//!
//! Every fallible operation in this crate returns `Result<T, SagaError>`.
//! Variants mirror `spec.md` §7 one-to-one so callers can match on the kind
//! of failure without parsing message text.

use thiserror::Error;

/// Errors raised by the saga engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SagaError {
    /// Catalog lookup miss during validation or runtime.
    #[error("unknown {kind} reference: {reference}")]
    UnknownRef { kind: &'static str, reference: String },

    /// Null/empty required argument, or a disallowed negative amount.
    #[error("invalid input for {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// Proximity or quest-token gate failure in a mutating call.
    #[error("trigger not activatable: {reason}")]
    TriggerNotActivatable { reason: String },

    /// Not within approach radius, missing tokens, or max interactions reached.
    #[error("feature not interactable: {reason}")]
    FeatureNotInteractable { reason: String },

    /// Pattern expansion failure.
    #[error("unknown trigger pattern reference: {0}")]
    UnknownPatternRef(String),

    /// Replay encountered malformed transaction data.
    #[error("saga instance state corrupt: {detail}")]
    StateCorrupt { detail: String },

    /// A player-reported claim was rejected before commit.
    #[error("anti-cheat rejected {claim_type} claim: {reason} (confidence {confidence:.2})")]
    AntiCheatRejected {
        claim_type: &'static str,
        reason: String,
        confidence: f64,
    },

    /// Aggregate error produced by the world data validator.
    #[error("world validation failed with {} error(s)", errors.len())]
    WorldValidationFailed { errors: Vec<String> },
}

impl SagaError {
    pub fn unknown_ref(kind: &'static str, reference: impl Into<String>) -> Self {
        Self::UnknownRef {
            kind,
            reference: reference.into(),
        }
    }

    pub fn invalid_input(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    pub fn trigger_not_activatable(reason: impl Into<String>) -> Self {
        Self::TriggerNotActivatable {
            reason: reason.into(),
        }
    }

    pub fn feature_not_interactable(reason: impl Into<String>) -> Self {
        Self::FeatureNotInteractable {
            reason: reason.into(),
        }
    }

    pub fn state_corrupt(detail: impl Into<String>) -> Self {
        Self::StateCorrupt {
            detail: detail.into(),
        }
    }

    pub fn anti_cheat_rejected(
        claim_type: &'static str,
        reason: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self::AntiCheatRejected {
            claim_type,
            reason: reason.into(),
            confidence,
        }
    }
}

pub type SagaResult<T> = Result<T, SagaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_ref_message_includes_kind_and_reference() {
        let err = SagaError::unknown_ref("SagaFeature", "OldMill");
        assert_eq!(
            err.to_string(),
            "unknown SagaFeature reference: OldMill"
        );
    }

    #[test]
    fn world_validation_failed_counts_errors() {
        let err = SagaError::WorldValidationFailed {
            errors: vec!["a".into(), "b".into()],
        };
        assert!(err.to_string().contains('2'));
    }
}
