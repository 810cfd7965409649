//! Round state machine
//!
//! `Pending` (registration open) → `Active` (drawing) → `Finished` (won,
//! exhausted or aborted). All methods here are synchronous and in-memory;
//! money only moves when the engine executes the `Settlement` a finished
//! round hands out.

use crate::common::types::{Amount, CardNumber, PlayerId, RoundId, TableId};
use crate::config::RoundConfig;
use crate::errors::{DrawExhausted, EngineError, StateError, ValidationError};
use crate::games::card::Card;
use crate::games::draw::{DrawSeed, DrawState, RandomDraw};
use crate::games::settlement::{split_pool, Settlement, SettlementStatus};
use crate::games::types::{
    CardSelection, CardView, DrawOutcome, FinishReason, RoundStatus, RoundSummary, TableSnapshot,
    Winner,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A player's stake and cards within one round
#[derive(Debug, Clone)]
pub struct Participant {
    pub player_id: PlayerId,
    pub cards: Vec<Card>,
    /// Total paid in; one stake per card
    pub stake: Amount,
}

#[derive(Debug)]
pub struct Round {
    round_id: RoundId,
    table_id: TableId,
    status: RoundStatus,
    participants: BTreeMap<PlayerId, Participant>,
    called: Vec<u8>,
    draw: Option<DrawState>,
    rng: RandomDraw,
    seed: DrawSeed,
    pool: Amount,
    admin_cut: Amount,
    winner: Option<Winner>,
    finish_reason: Option<FinishReason>,
    settlement: Option<Settlement>,
    settlement_status: Option<SettlementStatus>,
    config: RoundConfig,
    opened_at: DateTime<Utc>,
}

impl Round {
    pub fn new(round_id: RoundId, table_id: TableId, config: RoundConfig) -> Self {
        Self::with_seed(round_id, table_id, config, DrawSeed::generate())
    }

    /// Round with a known seed (replays and benchmarks)
    pub fn with_seed(round_id: RoundId, table_id: TableId, config: RoundConfig, seed: DrawSeed) -> Self {
        Self {
            round_id,
            table_id,
            status: RoundStatus::Pending,
            participants: BTreeMap::new(),
            called: Vec::new(),
            draw: None,
            rng: RandomDraw::from_seed(&seed),
            seed,
            pool: 0,
            admin_cut: 0,
            winner: None,
            finish_reason: None,
            settlement: None,
            settlement_status: None,
            config,
            opened_at: Utc::now(),
        }
    }

    pub fn round_id(&self) -> RoundId {
        self.round_id
    }

    pub fn table_id(&self) -> &str {
        &self.table_id
    }

    pub fn status(&self) -> RoundStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status == RoundStatus::Finished
    }

    pub fn pool(&self) -> Amount {
        self.pool
    }

    pub fn admin_cut(&self) -> Amount {
        self.admin_cut
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn called_numbers(&self) -> &[u8] {
        &self.called
    }

    pub fn winner(&self) -> Option<&Winner> {
        self.winner.as_ref()
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    pub fn seed_commitment(&self) -> String {
        self.seed.commitment()
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn settlement_status(&self) -> Option<SettlementStatus> {
        self.settlement_status
    }

    fn check_admission(&self, player_id: &str, card_number: CardNumber, stake: Amount) -> Result<(), EngineError> {
        if self.status != RoundStatus::Pending {
            return Err(StateError::RegistrationClosed(self.round_id).into());
        }

        if stake < self.config.min_stake {
            return Err(ValidationError::InvalidStake {
                amount: stake,
                minimum: self.config.min_stake,
            }
            .into());
        }

        // Card numbers only need to be unique within one player's hand
        let existing = self.participants.get(player_id);
        let taken = existing.is_some_and(|p| p.cards.iter().any(|card| card.card_number() == card_number));
        if taken {
            return Err(ValidationError::DuplicateCard(card_number).into());
        }

        // A participant's stake never exceeds the pool, so checking the pool covers both
        if self.pool.checked_add(stake).is_none() {
            return Err(ValidationError::PoolOverflow {
                amount: stake,
                pool: self.pool,
            }
            .into());
        }

        let held = existing.map_or(0, |p| p.cards.len());
        if held >= self.config.max_cards_per_player {
            return Err(ValidationError::CardLimitReached {
                player_id: player_id.to_string(),
                limit: self.config.max_cards_per_player,
            }
            .into());
        }

        Ok(())
    }

    /// Validate a registration and build its card without touching the round
    pub fn prepare_card(&self, player_id: &str, selection: &CardSelection, stake: Amount) -> Result<Card, EngineError> {
        self.check_admission(player_id, selection.card_number(), stake)?;

        let card = match selection {
            CardSelection::Catalogue { card_number } => Card::from_catalogue(*card_number),
            CardSelection::Custom { card_number, numbers } => Card::register(*card_number, numbers)?,
        };
        Ok(card)
    }

    /// Seat a prepared card once its stake has been debited
    pub fn admit(&mut self, player_id: &str, card: Card, stake: Amount) -> Result<CardView, EngineError> {
        self.check_admission(player_id, card.card_number(), stake)?;

        let view = self.card_view(&card);
        let participant = self
            .participants
            .entry(player_id.to_string())
            .or_insert_with(|| Participant {
                player_id: player_id.to_string(),
                cards: Vec::new(),
                stake: 0,
            });
        participant.cards.push(card);
        participant.stake += stake;
        self.pool += stake;

        Ok(view)
    }

    /// Close registration and begin drawing. The pool is fixed from here on.
    pub fn start(&mut self) -> Result<(), StateError> {
        if self.status != RoundStatus::Pending {
            return Err(StateError::AlreadyStarted(self.round_id));
        }
        if self.participants.len() < self.config.min_players {
            return Err(StateError::NotEnoughPlayers {
                required: self.config.min_players,
                actual: self.participants.len(),
            });
        }

        let (_, admin_cut) = split_pool(self.pool, self.config.admin_cut_bps);
        self.admin_cut = admin_cut;
        self.draw = Some(DrawState::new());
        self.status = RoundStatus::Active;
        Ok(())
    }

    /// Call one number, mark every card and check for a winner.
    ///
    /// Cards are evaluated in ascending `(card_number, player_id)` order, so
    /// when several complete on the same call the smallest card number wins.
    pub fn draw_next(&mut self) -> Result<DrawOutcome, StateError> {
        let not_active = StateError::NotActive {
            round_id: self.round_id,
            status: self.status,
        };
        if self.status != RoundStatus::Active {
            return Err(not_active);
        }
        let state = self.draw.as_mut().ok_or(not_active)?;

        let number = match self.rng.next(state) {
            Ok(number) => number,
            Err(DrawExhausted) => {
                self.finish_with_refund(FinishReason::Exhausted);
                return Ok(DrawOutcome::Exhausted {
                    round_id: self.round_id,
                });
            }
        };
        self.called.push(number);

        let pattern = self.config.win_pattern;
        let mut best: Option<(CardNumber, &str, _)> = None;
        for participant in self.participants.values_mut() {
            for card in participant.cards.iter_mut() {
                card.mark(number);
            }
        }
        for participant in self.participants.values() {
            for card in &participant.cards {
                if let Some(line) = card.winning_line(pattern) {
                    let key = (card.card_number(), participant.player_id.as_str());
                    if best.as_ref().map_or(true, |(n, p, _)| key < (*n, *p)) {
                        best = Some((key.0, key.1, line));
                    }
                }
            }
        }

        let Some((card_number, player_id, line)) = best else {
            return Ok(DrawOutcome::Called {
                round_id: self.round_id,
                number,
            });
        };

        let winner = Winner {
            player_id: player_id.to_string(),
            card_number,
            line,
            payout: self.pool - self.admin_cut,
        };
        self.finish(FinishReason::Won);
        self.settlement = Some(Settlement::win(
            self.round_id,
            self.table_id.clone(),
            &winner,
            self.admin_cut,
            &self.config.house_account,
        ));
        self.settlement_status = Some(SettlementStatus::Pending);
        self.winner = Some(winner.clone());

        Ok(DrawOutcome::Won {
            round_id: self.round_id,
            number,
            winner,
        })
    }

    /// Force the round to `Finished` and refund every stake
    pub fn abort(&mut self) -> Result<(), StateError> {
        if self.is_finished() {
            return Err(StateError::AlreadyFinished(self.round_id));
        }
        self.finish_with_refund(FinishReason::Aborted);
        Ok(())
    }

    fn finish(&mut self, reason: FinishReason) {
        self.status = RoundStatus::Finished;
        self.finish_reason = Some(reason);
        self.draw = None;
    }

    fn finish_with_refund(&mut self, reason: FinishReason) {
        self.finish(reason);
        let stakes = self
            .participants
            .values()
            .map(|p| (p.player_id.clone(), p.stake));
        self.settlement = Some(Settlement::refund(
            self.round_id,
            self.table_id.clone(),
            stakes,
            reason,
        ));
        self.settlement_status = Some(SettlementStatus::Pending);
    }

    /// Hand the settlement produced by finishing to the caller (once)
    pub fn take_settlement(&mut self) -> Option<Settlement> {
        self.settlement.take()
    }

    pub fn set_settlement_status(&mut self, status: SettlementStatus) {
        self.settlement_status = Some(status);
    }

    pub fn summary(&self) -> RoundSummary {
        RoundSummary {
            table_id: self.table_id.clone(),
            round_id: self.round_id,
            status: self.status,
            participant_count: self.participants.len(),
            pool: self.pool,
            admin_cut: self.admin_cut,
            called_numbers: self.called.clone(),
            winner: self.winner.clone(),
            finish_reason: self.finish_reason,
            seed_commitment: self.seed.commitment(),
            revealed_seed: self.is_finished().then(|| self.seed.reveal()),
            settlement: self.settlement_status,
        }
    }

    fn card_view(&self, card: &Card) -> CardView {
        CardView {
            table_id: self.table_id.clone(),
            round_id: self.round_id,
            card_number: card.card_number(),
            numbers: card.numbers().to_vec(),
            marked: card.marked().iter().copied().collect(),
        }
    }

    pub fn snapshot(&self) -> TableSnapshot {
        let cards = self
            .participants
            .iter()
            .map(|(player_id, p)| (player_id.clone(), p.cards.iter().map(|card| self.card_view(card)).collect()))
            .collect();
        TableSnapshot {
            summary: self.summary(),
            cards,
        }
    }

    /// The player's cards in this round, empty if they are not seated
    pub fn cards_for(&self, player_id: &str) -> Vec<CardView> {
        self.participants
            .get(player_id)
            .map(|p| p.cards.iter().map(|card| self.card_view(card)).collect())
            .unwrap_or_default()
    }
}
