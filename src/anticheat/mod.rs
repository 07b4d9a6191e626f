//! Claims-based anti-cheat (`spec.md` §4.J).
//!
//! Two paths share the same transaction surface: [`claims`] validates one
//! player-reported claim before it's committed, [`analysis`] looks back over
//! an already-committed window and produces [`analysis::CheatFlag`] reports.

pub mod analysis;
pub mod claims;

pub use analysis::{z_score, CheatFlag, CheatType, RetrospectiveAnalyzer};
pub use claims::{
    BuildingSessionClaim, ClaimValidator, InventorySnapshotClaim, LocationClaim, MiningSessionClaim,
    ToolWearClaim, WorldPosition,
};
