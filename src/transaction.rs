//! The append-only transaction log (`spec.md` §3 "SagaTransaction"/"SagaInstance", §4.D).
//!
//! A `SagaInstance`'s entire history is `(avatar_id, saga_ref) -> Vec<SagaTransaction>`.
//! Transactions are never deleted or edited in place; rollback is modeled as
//! a compensating `TransactionReversed` entry referencing the original id.
//! Only `Committed` transactions influence [`crate::state::SagaState`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AvatarId, TransactionId};

/// Lifecycle status of a transaction in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Committed,
    Rejected,
    Reversed,
}

/// Every kind of event the engine appends (`spec.md` §4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    SagaDiscovered,
    SagaCompleted,
    TriggerActivated,
    TriggerCompleted,
    CharacterSpawned,
    CharacterDamaged,
    CharacterHealed,
    CharacterDefeated,
    CharacterDespawned,
    PlayerEntered,
    PlayerExited,
    EntityInteracted,
    DialogueStarted,
    DialogueNodeVisited,
    DialogueCompleted,
    TraitAssigned,
    TraitRemoved,
    ReputationChanged,
    ItemTraded,
    LootAwarded,
    EffectApplied,
    QuestTokenAwarded,
    QuestAccepted,
    QuestObjectiveCompleted,
    QuestStageAdvanced,
    QuestBranchChosen,
    QuestCompleted,
    QuestFailed,
    QuestAbandoned,
    BattleStarted,
    BattleTurnExecuted,
    BattleEnded,
    StatusEffectApplied,
    StatusEffectRemoved,
    StructureDamaged,
    StructureRepaired,
    LandmarkDiscovered,
    LocationClaimed,
    ToolWearClaimed,
    MiningSessionClaimed,
    BuildingSessionClaimed,
    InventorySnapshot,
    StateSnapshot,
    TransactionReversed,
}

/// A single append-only event record (`spec.md` §6 "Transaction serialized form").
///
/// `data` is a boundary artifact only: callers read/write well-known keys
/// for their transaction type directly rather than growing a typed payload
/// per variant here (`spec.md` §9 "Transaction data bag").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaTransaction {
    pub transaction_id: TransactionId,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub avatar_id: AvatarId,
    pub status: TransactionStatus,
    pub local_timestamp: DateTime<Utc>,
    /// Defaults to `local_timestamp` until the server confirms a canonical
    /// ordering (`spec.md` §3).
    pub canonical_timestamp: Option<DateTime<Utc>>,
    pub data: HashMap<String, String>,
}

impl SagaTransaction {
    pub fn new(
        transaction_type: TransactionType,
        avatar_id: AvatarId,
        local_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id: TransactionId::new(),
            transaction_type,
            avatar_id,
            status: TransactionStatus::Pending,
            local_timestamp,
            canonical_timestamp: None,
            data: HashMap::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn committed(mut self) -> Self {
        self.status = TransactionStatus::Committed;
        self
    }

    /// The timestamp replay should treat as authoritative: canonical if
    /// confirmed, otherwise local (`spec.md` §3).
    pub fn effective_timestamp(&self) -> DateTime<Utc> {
        self.canonical_timestamp.unwrap_or(self.local_timestamp)
    }
}

/// Ordered, append-only history for one `(avatar_id, saga_ref)` pair.
#[derive(Debug, Clone, Default)]
pub struct TransactionLog {
    entries: Vec<SagaTransaction>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transaction. Total order within the log is append position;
    /// replay must respect it (`spec.md` §5 "Ordering guarantee").
    pub fn append(&mut self, transaction: SagaTransaction) {
        self.entries.push(transaction);
    }

    /// All transactions, in append order, regardless of status.
    pub fn all(&self) -> impl Iterator<Item = &SagaTransaction> {
        self.entries.iter()
    }

    /// Only `Committed` transactions, in append order. These are the only
    /// ones that influence derived state (`spec.md` §4.D).
    pub fn committed(&self) -> impl Iterator<Item = &SagaTransaction> {
        self.entries
            .iter()
            .filter(|tx| tx.status == TransactionStatus::Committed)
    }

    pub fn get_canonical_timestamp(&self, transaction_id: TransactionId) -> Option<DateTime<Utc>> {
        self.entries
            .iter()
            .find(|tx| tx.transaction_id == transaction_id)
            .map(SagaTransaction::effective_timestamp)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(tx_type: TransactionType, avatar: AvatarId, ts: DateTime<Utc>) -> SagaTransaction {
        SagaTransaction::new(tx_type, avatar, ts).committed()
    }

    #[test]
    fn committed_filters_out_pending_and_rejected() {
        let avatar = AvatarId::new();
        let now = Utc::now();
        let mut log = TransactionLog::new();
        log.append(tx(TransactionType::PlayerEntered, avatar, now));
        let mut rejected = SagaTransaction::new(TransactionType::PlayerEntered, avatar, now);
        rejected.status = TransactionStatus::Rejected;
        log.append(rejected);

        assert_eq!(log.len(), 2);
        assert_eq!(log.committed().count(), 1);
    }

    #[test]
    fn canonical_timestamp_falls_back_to_local() {
        let avatar = AvatarId::new();
        let now = Utc::now();
        let transaction = SagaTransaction::new(TransactionType::PlayerEntered, avatar, now);
        let id = transaction.transaction_id;
        let mut log = TransactionLog::new();
        log.append(transaction);

        assert_eq!(log.get_canonical_timestamp(id), Some(now));
    }

    #[test]
    fn round_trips_through_json() {
        let avatar = AvatarId::new();
        let transaction = SagaTransaction::new(TransactionType::TriggerActivated, avatar, Utc::now())
            .with_data("SagaTriggerRef", "Outer")
            .with_data("Seed", "42");

        let json = serde_json::to_string(&transaction).unwrap();
        let parsed: SagaTransaction = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, transaction);
    }
}
