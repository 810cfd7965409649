use crate::common::types::{Amount, PlayerId};
use crate::games::types::LeaderboardEntry;
use parking_lot::RwLock;
use std::collections::HashMap;

/// All-time wins and earnings per player.
///
/// Only completed win settlements are recorded, so a payout that is still
/// waiting on the ledger does not show up yet.
#[derive(Debug, Default)]
pub struct Leaderboard {
    entries: RwLock<HashMap<PlayerId, LeaderboardEntry>>,
}

impl Leaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_win(&self, player_id: &str, earnings: Amount) {
        let mut entries = self.entries.write();
        let entry = entries
            .entry(player_id.to_string())
            .or_insert_with(|| LeaderboardEntry {
                player_id: player_id.to_string(),
                wins: 0,
                total_earnings: 0,
            });
        entry.wins += 1;
        entry.total_earnings = entry.total_earnings.saturating_add(earnings);
    }

    /// Wins desc, then earnings desc, then player id asc
    pub fn standings(&self) -> Vec<LeaderboardEntry> {
        let mut standings: Vec<LeaderboardEntry> = self.entries.read().values().cloned().collect();
        standings.sort_by(|a, b| {
            b.wins
                .cmp(&a.wins)
                .then(b.total_earnings.cmp(&a.total_earnings))
                .then_with(|| a.player_id.cmp(&b.player_id))
        });
        standings
    }

    pub fn get(&self, player_id: &str) -> Option<LeaderboardEntry> {
        self.entries.read().get(player_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standings_ordering() {
        let board = Leaderboard::new();
        board.record_win("carol", 50);
        board.record_win("bob", 20);
        board.record_win("bob", 20);
        board.record_win("alice", 50);
        board.record_win("dave", 10);

        let order: Vec<_> = board
            .standings()
            .into_iter()
            .map(|e| (e.player_id, e.wins, e.total_earnings))
            .collect();
        assert_eq!(
            order,
            vec![
                ("bob".to_string(), 2, 40),
                ("alice".to_string(), 1, 50),
                ("carol".to_string(), 1, 50),
                ("dave".to_string(), 1, 10),
            ]
        );
    }

    #[test]
    fn test_empty_board() {
        let board = Leaderboard::new();
        assert!(board.standings().is_empty());
        assert!(board.get("nobody").is_none());
    }
}
