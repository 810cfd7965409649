pub mod card;
pub mod draw;
pub mod leaderboard;
pub mod round;
pub mod settlement;
pub mod types;

pub use card::{call_label, column_letter, Card};
pub use draw::{DrawSeed, DrawState, RandomDraw};
pub use leaderboard::Leaderboard;
pub use round::{Participant, Round};
pub use settlement::{split_pool, Settlement, SettlementKind, SettlementStatus};
pub use types::*;
