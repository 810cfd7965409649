//! Round engine
//!
//! Owns every table's current round. Mutations on one table are serialized
//! by that table's async mutex; the round itself sits behind a read/write
//! lock that is only write-locked for the in-memory part of a mutation, so
//! readers always see a consistent snapshot and no sync lock is ever held
//! across a ledger call.

use crate::common::traits::{Ledger, NotifyError, NotifyTarget, Notifier};
use crate::common::types::{Amount, LedgerReason, RoundId, TableId};
use crate::config::BingoConfig;
use crate::errors::{EngineResult, SettlementError, StateError};
use crate::games::card::call_label;
use crate::games::leaderboard::Leaderboard;
use crate::games::round::Round;
use crate::games::settlement::{Settlement, SettlementKind, SettlementStatus};
use crate::games::types::{
    CardSelection, CardView, DrawOutcome, FinishReason, LeaderboardEntry, RoundEvent, RoundSummary,
    TableSnapshot,
};
use crate::metrics::EngineMetrics;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// One chat table and its current round
#[derive(Debug)]
pub struct GameTable {
    table_id: TableId,
    /// Serializes register/start/draw/abort/settle on this table
    ops: Mutex<()>,
    round: RwLock<Option<Round>>,
}

impl GameTable {
    fn new(table_id: &str) -> Self {
        Self {
            table_id: table_id.to_string(),
            ops: Mutex::new(()),
            round: RwLock::new(None),
        }
    }

    fn no_round(&self) -> StateError {
        StateError::NoRound(self.table_id.clone())
    }
}

pub struct RoundEngine {
    config: BingoConfig,
    tables: DashMap<TableId, Arc<GameTable>>,
    unsettled: DashMap<RoundId, Settlement>,
    leaderboard: Leaderboard,
    ledger: Arc<dyn Ledger>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<EngineMetrics>,
    next_round_id: AtomicU64,
}

impl RoundEngine {
    pub fn new(config: BingoConfig, ledger: Arc<dyn Ledger>, notifier: Arc<dyn Notifier>) -> EngineResult<Self> {
        config.validate()?;

        tracing::info!(
            min_players = config.round.min_players,
            admin_cut_bps = config.round.admin_cut_bps,
            win_pattern = ?config.round.win_pattern,
            "Round engine initialized"
        );

        Ok(Self {
            config,
            tables: DashMap::new(),
            unsettled: DashMap::new(),
            leaderboard: Leaderboard::new(),
            ledger,
            notifier,
            metrics: Arc::new(EngineMetrics::new()),
            next_round_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &BingoConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.metrics)
    }

    fn table(&self, table_id: &str) -> Arc<GameTable> {
        self.tables
            .entry(table_id.to_string())
            .or_insert_with(|| Arc::new(GameTable::new(table_id)))
            .value()
            .clone()
    }

    fn existing_table(&self, table_id: &str) -> Result<Arc<GameTable>, StateError> {
        self.tables
            .get(table_id)
            .map(|t| t.value().clone())
            .ok_or_else(|| StateError::NoRound(table_id.to_string()))
    }

    fn publish(&self, target: NotifyTarget, event: RoundEvent) {
        match self.notifier.notify(target, event) {
            Ok(()) => {}
            Err(NotifyError::NoSubscribers(recipient)) => {
                tracing::trace!(?recipient, "Event dropped, nobody listening");
            }
            Err(e) => tracing::warn!(error = %e, "Failed to deliver round event"),
        }
    }

    /// Seat a player's card in the table's pending round, opening one if needed.
    ///
    /// The stake is debited before the card is seated; nothing changes if the
    /// card is rejected or the debit fails.
    pub async fn register_player(
        &self,
        table_id: &str,
        player_id: &str,
        selection: CardSelection,
        stake: Amount,
    ) -> EngineResult<CardView> {
        let table = self.table(table_id);
        let _ops = table.ops.lock().await;

        let mut fresh: Option<Round> = None;
        let (round_id, prepared) = {
            let slot = table.round.read();
            match slot.as_ref().filter(|round| !round.is_finished()) {
                Some(round) => (round.round_id(), round.prepare_card(player_id, &selection, stake)),
                None => {
                    let round_id = self.next_round_id.fetch_add(1, Ordering::SeqCst);
                    let round = Round::new(round_id, table_id.to_string(), self.config.round.clone());
                    let prepared = round.prepare_card(player_id, &selection, stake);
                    fresh = Some(round);
                    (round_id, prepared)
                }
            }
        };

        let card = prepared.map_err(|e| {
            EngineMetrics::incr(&self.metrics.registrations_rejected);
            tracing::debug!(table_id, player_id, round_id, error = %e, "Registration rejected");
            e
        })?;
        let card_number = card.card_number();

        let stake_reason = LedgerReason::Stake { round_id, card_number };
        if let Err(e) = self.ledger.debit(player_id, stake, &stake_reason).await {
            EngineMetrics::incr(&self.metrics.registrations_rejected);
            tracing::warn!(table_id, player_id, round_id, error = %e, "Stake debit failed");
            return Err(e.into());
        }

        let opened = fresh.as_ref().map(Round::seed_commitment);
        let admitted = {
            let mut slot = table.round.write();
            if let Some(round) = fresh.take() {
                *slot = Some(round);
            }
            match slot.as_mut() {
                Some(round) => round.admit(player_id, card, stake),
                None => Err(table.no_round().into()),
            }
        };

        let view = match admitted {
            Ok(view) => view,
            Err(e) => {
                let refund = LedgerReason::StakeReturn { round_id, card_number };
                if let Err(credit_err) = self.ledger.credit(player_id, stake, &refund).await {
                    tracing::error!(
                        table_id,
                        player_id,
                        round_id,
                        error = %credit_err,
                        "Failed to return stake for rejected registration"
                    );
                }
                EngineMetrics::incr(&self.metrics.registrations_rejected);
                return Err(e);
            }
        };

        if let Some(seed_commitment) = opened {
            EngineMetrics::incr(&self.metrics.rounds_opened);
            tracing::info!(table_id, round_id, %seed_commitment, "Round opened");
            self.publish(
                NotifyTarget::Table(table_id.to_string()),
                RoundEvent::RoundOpened {
                    table_id: table_id.to_string(),
                    round_id,
                    seed_commitment,
                },
            );
        }

        EngineMetrics::incr(&self.metrics.registrations_total);
        tracing::info!(table_id, player_id, round_id, card_number, stake, "Player registered");
        self.publish(
            NotifyTarget::Table(table_id.to_string()),
            RoundEvent::PlayerJoined {
                table_id: table_id.to_string(),
                round_id,
                player_id: player_id.to_string(),
                card_number,
            },
        );

        Ok(view)
    }

    /// Close registration on the table's round and begin drawing
    pub async fn start(&self, table_id: &str) -> EngineResult<RoundSummary> {
        let table = self.existing_table(table_id)?;
        let _ops = table.ops.lock().await;

        let summary = {
            let mut slot = table.round.write();
            let round = slot.as_mut().ok_or_else(|| table.no_round())?;
            round.start()?;
            round.summary()
        };

        EngineMetrics::incr(&self.metrics.rounds_started);
        tracing::info!(
            table_id,
            round_id = summary.round_id,
            participants = summary.participant_count,
            pool = summary.pool,
            "Round started"
        );
        self.publish(
            NotifyTarget::Table(table_id.to_string()),
            RoundEvent::RoundStarted {
                table_id: table_id.to_string(),
                round_id: summary.round_id,
                participant_count: summary.participant_count,
                pool: summary.pool,
            },
        );

        Ok(summary)
    }

    /// Call the next number on the table.
    ///
    /// A winning or exhausting call settles the round before returning; if
    /// the ledger fails the round stays finished and the error is returned,
    /// with the settlement kept for [`retry_settlement`](Self::retry_settlement).
    ///
    /// In that case the `DrawOutcome` itself is not returned. The final call
    /// and the winner are still in [`summary`](Self::summary), and the
    /// `NumberCalled` and `RoundWon` events go out before settlement starts.
    pub async fn draw_next(&self, table_id: &str) -> EngineResult<DrawOutcome> {
        let table = self.existing_table(table_id)?;
        let _ops = table.ops.lock().await;

        let (outcome, call_index, settlement) = {
            let mut slot = table.round.write();
            let round = slot.as_mut().ok_or_else(|| table.no_round())?;
            let outcome = round.draw_next()?;
            (outcome, round.called_numbers().len(), round.take_settlement())
        };
        let round_id = outcome.round_id();

        if let Some(number) = outcome.number() {
            EngineMetrics::incr(&self.metrics.draws_total);
            let call = call_label(number);
            tracing::debug!(table_id, round_id, number, call_index, "Number called");
            self.publish(
                NotifyTarget::Table(table_id.to_string()),
                RoundEvent::NumberCalled {
                    table_id: table_id.to_string(),
                    round_id,
                    number,
                    call,
                    call_index,
                },
            );
        }

        match &outcome {
            DrawOutcome::Called { .. } => {}
            DrawOutcome::Won { winner, .. } => {
                EngineMetrics::incr(&self.metrics.wins_total);
                EngineMetrics::incr(&self.metrics.rounds_finished);
                tracing::info!(
                    table_id,
                    round_id,
                    player_id = %winner.player_id,
                    card_number = winner.card_number,
                    payout = winner.payout,
                    calls = call_index,
                    "Round won"
                );
                let event = RoundEvent::RoundWon {
                    table_id: table_id.to_string(),
                    round_id,
                    winner: winner.clone(),
                };
                self.publish(NotifyTarget::Player(winner.player_id.clone()), event.clone());
                self.publish(NotifyTarget::Table(table_id.to_string()), event);
            }
            DrawOutcome::Exhausted { .. } => {
                EngineMetrics::incr(&self.metrics.refunds_total);
                EngineMetrics::incr(&self.metrics.rounds_finished);
                tracing::info!(table_id, round_id, "Draw exhausted without a winner, refunding");
                self.publish(
                    NotifyTarget::Table(table_id.to_string()),
                    RoundEvent::RoundRefunded {
                        table_id: table_id.to_string(),
                        round_id,
                        reason: FinishReason::Exhausted,
                    },
                );
            }
        }

        if let Some(settlement) = settlement {
            self.settle(&table, settlement).await?;
        }

        Ok(outcome)
    }

    /// Finish the table's round early and refund every stake
    pub async fn abort(&self, table_id: &str) -> EngineResult<RoundSummary> {
        let table = self.existing_table(table_id)?;
        let _ops = table.ops.lock().await;

        let (round_id, settlement) = {
            let mut slot = table.round.write();
            let round = slot.as_mut().ok_or_else(|| table.no_round())?;
            round.abort()?;
            (round.round_id(), round.take_settlement())
        };

        EngineMetrics::incr(&self.metrics.refunds_total);
        EngineMetrics::incr(&self.metrics.rounds_finished);
        tracing::info!(table_id, round_id, "Round aborted, refunding");
        self.publish(
            NotifyTarget::Table(table_id.to_string()),
            RoundEvent::RoundRefunded {
                table_id: table_id.to_string(),
                round_id,
                reason: FinishReason::Aborted,
            },
        );

        if let Some(settlement) = settlement {
            self.settle(&table, settlement).await?;
        }

        let slot = table.round.read();
        let round = slot.as_ref().ok_or_else(|| table.no_round())?;
        Ok(round.summary())
    }

    /// Apply a settlement and record the result on its round.
    /// Caller holds the table's ops lock.
    async fn settle(&self, table: &GameTable, mut settlement: Settlement) -> Result<(), SettlementError> {
        let result = settlement
            .execute(self.ledger.as_ref(), self.config.settlement.max_attempts)
            .await;

        {
            let mut slot = table.round.write();
            if let Some(round) = slot.as_mut().filter(|r| r.round_id() == settlement.round_id) {
                round.set_settlement_status(settlement.status);
            }
        }

        match result {
            Ok(()) => {
                EngineMetrics::incr(&self.metrics.settlements_completed);
                if let SettlementKind::WinPayout { winner, payout, .. } = &settlement.kind {
                    self.leaderboard.record_win(winner, *payout);
                }
                tracing::info!(
                    table_id = %settlement.table_id,
                    round_id = settlement.round_id,
                    total = settlement.total(),
                    attempts = settlement.attempts,
                    "Round settled"
                );
                self.unsettled.remove(&settlement.round_id);
                Ok(())
            }
            Err(e) => {
                EngineMetrics::incr(&self.metrics.settlement_failures);
                if settlement.status == SettlementStatus::RequiresManualIntervention {
                    tracing::error!(
                        table_id = %settlement.table_id,
                        round_id = settlement.round_id,
                        attempts = settlement.attempts,
                        error = %e,
                        "Settlement needs manual intervention"
                    );
                } else {
                    tracing::warn!(
                        table_id = %settlement.table_id,
                        round_id = settlement.round_id,
                        attempts = settlement.attempts,
                        error = %e,
                        "Settlement failed, will retry"
                    );
                }
                self.publish(
                    NotifyTarget::Table(settlement.table_id.clone()),
                    RoundEvent::SettlementFailed {
                        table_id: settlement.table_id.clone(),
                        round_id: settlement.round_id,
                        error: e.to_string(),
                    },
                );
                self.unsettled.insert(settlement.round_id, settlement);
                Err(e)
            }
        }
    }

    /// Settlements still owed, oldest round first
    pub fn pending_settlements(&self) -> Vec<Settlement> {
        let mut pending: Vec<Settlement> = self.unsettled.iter().map(|s| s.value().clone()).collect();
        pending.sort_by_key(|s| s.round_id);
        pending
    }

    /// Re-run an unsettled round's outstanding credits
    pub async fn retry_settlement(&self, round_id: RoundId) -> EngineResult<()> {
        let table_id = self
            .unsettled
            .get(&round_id)
            .map(|s| s.table_id.clone())
            .ok_or(SettlementError::NotPending(round_id))?;
        let table = self.table(&table_id);
        let _ops = table.ops.lock().await;

        let (_, settlement) = self
            .unsettled
            .remove(&round_id)
            .ok_or(SettlementError::NotPending(round_id))?;

        tracing::info!(table_id = %table_id, round_id, attempt = settlement.attempts + 1, "Retrying settlement");
        self.settle(&table, settlement).await?;
        Ok(())
    }

    /// Retry every settlement that has not been escalated; returns the rounds that settled
    pub async fn retry_pending_settlements(&self) -> Vec<RoundId> {
        let due: Vec<RoundId> = self
            .pending_settlements()
            .into_iter()
            .filter(|s| s.status != SettlementStatus::RequiresManualIntervention)
            .map(|s| s.round_id)
            .collect();

        let mut settled = Vec::new();
        for round_id in due {
            match self.retry_settlement(round_id).await {
                Ok(()) => settled.push(round_id),
                Err(e) => tracing::debug!(round_id, error = %e, "Settlement still pending"),
            }
        }
        settled
    }

    pub fn summary(&self, table_id: &str) -> EngineResult<RoundSummary> {
        let table = self.existing_table(table_id)?;
        let slot = table.round.read();
        let round = slot.as_ref().ok_or_else(|| table.no_round())?;
        Ok(round.summary())
    }

    /// Summary plus every player's cards, taken from the same read
    pub fn snapshot(&self, table_id: &str) -> EngineResult<TableSnapshot> {
        let table = self.existing_table(table_id)?;
        let slot = table.round.read();
        let round = slot.as_ref().ok_or_else(|| table.no_round())?;
        Ok(round.snapshot())
    }

    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        self.leaderboard.standings()
    }

    /// The player's cards in every table's current round
    pub fn player_summary(&self, player_id: &str) -> Vec<CardView> {
        let tables: Vec<Arc<GameTable>> = self.tables.iter().map(|t| t.value().clone()).collect();

        let mut cards: Vec<CardView> = tables
            .iter()
            .flat_map(|table| {
                table
                    .round
                    .read()
                    .as_ref()
                    .map(|round| round.cards_for(player_id))
                    .unwrap_or_default()
            })
            .collect();
        cards.sort_by(|a, b| (&a.table_id, a.card_number).cmp(&(&b.table_id, b.card_number)));
        cards
    }

    /// Ids of tables whose round is still pending or active
    pub fn open_tables(&self) -> Vec<TableId> {
        let mut open: Vec<TableId> = self
            .tables
            .iter()
            .filter(|t| {
                t.value()
                    .round
                    .read()
                    .as_ref()
                    .is_some_and(|round| !round.is_finished())
            })
            .map(|t| t.key().clone())
            .collect();
        open.sort();
        open
    }

    /// Abort every open round with refunds, concurrently across tables
    pub async fn shutdown(&self) -> Vec<RoundSummary> {
        let open = self.open_tables();
        tracing::info!(tables = open.len(), "Shutting down round engine");

        let results = futures::future::join_all(open.iter().map(|table_id| self.abort(table_id))).await;

        let mut aborted = Vec::new();
        for (table_id, result) in open.iter().zip(results) {
            match result {
                Ok(summary) => aborted.push(summary),
                Err(e) => tracing::error!(table_id = %table_id, error = %e, "Failed to abort round on shutdown"),
            }
        }
        aborted
    }
}
