//! Arada Bingo - round engine for chat-based numbers bingo
//!
//! Players buy into a round at a table with a numbered card, numbers 1..=90
//! are called one at a time from a committed random seed, and the first
//! completed card takes the pool minus the house cut. Money moves through an
//! injected [`Ledger`](common::traits::Ledger); events go out through an
//! injected [`Notifier`](common::traits::Notifier).

pub mod common;
pub mod config;
pub mod engine;
pub mod errors;
pub mod games;
pub mod ledger;
pub mod metrics;
pub mod notifier;

pub use common::config::ConfigLoader;
pub use common::traits::{Ledger, NotifyTarget, Notifier};
pub use common::types::{Amount, CardNumber, LedgerReason, PlayerId, RoundId, TableId, TransactionId};
pub use config::BingoConfig;
pub use engine::RoundEngine;
pub use errors::{EngineError, EngineResult};
pub use games::draw::verify_draw_sequence;
pub use games::types::*;
pub use ledger::InMemoryLedger;
pub use metrics::EngineMetrics;
pub use notifier::{BroadcastNotifier, NoopNotifier};
