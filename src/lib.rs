//! An event-sourced saga engine: a transaction log for an avatar's journey
//! through a world of catalog-authored arcs, triggers, features, characters,
//! dialogue, and quests (`spec.md` §1 "Overview").
//!
//! Nothing here is mutated in place. A [`catalog::Catalog`] is built once and
//! shared read-only; an [`interaction::SagaInstance`] is an append-only log
//! of [`transaction::SagaTransaction`]s; [`state::SagaState`] is always the
//! result of [`replay::replay`]ing that log, never hand-constructed. Run
//! [`world_validator::validate`] once after building a catalog, before it's
//! handed to any [`interaction::InteractionService`].

pub mod anticheat;
pub mod availability;
pub mod avatar;
pub mod catalog;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod ids;
pub mod interaction;
pub mod proximity;
pub mod replay;
pub mod rng;
pub mod state;
pub mod transaction;
pub mod trigger_expander;
pub mod world_validator;

pub use avatar::Avatar;
pub use catalog::Catalog;
pub use config::EngineConfig;
pub use dialogue::DialogueInterpreter;
pub use error::{SagaError, SagaResult};
pub use interaction::{InteractionService, SagaInstance};
pub use rng::SeededRng;
pub use state::SagaState;
