//! Engine counters and Prometheus text export

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct EngineMetrics {
    start_time: Instant,
    pub rounds_opened: AtomicU64,
    pub rounds_started: AtomicU64,
    pub rounds_finished: AtomicU64,
    pub draws_total: AtomicU64,
    pub wins_total: AtomicU64,
    pub refunds_total: AtomicU64,
    pub registrations_total: AtomicU64,
    pub registrations_rejected: AtomicU64,
    pub settlements_completed: AtomicU64,
    pub settlement_failures: AtomicU64,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of every counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub rounds_opened: u64,
    pub rounds_started: u64,
    pub rounds_finished: u64,
    pub draws_total: u64,
    pub wins_total: u64,
    pub refunds_total: u64,
    pub registrations_total: u64,
    pub registrations_rejected: u64,
    pub settlements_completed: u64,
    pub settlement_failures: u64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            rounds_opened: AtomicU64::new(0),
            rounds_started: AtomicU64::new(0),
            rounds_finished: AtomicU64::new(0),
            draws_total: AtomicU64::new(0),
            wins_total: AtomicU64::new(0),
            refunds_total: AtomicU64::new(0),
            registrations_total: AtomicU64::new(0),
            registrations_rejected: AtomicU64::new(0),
            settlements_completed: AtomicU64::new(0),
            settlement_failures: AtomicU64::new(0),
        }
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rounds_opened: self.rounds_opened.load(Ordering::SeqCst),
            rounds_started: self.rounds_started.load(Ordering::SeqCst),
            rounds_finished: self.rounds_finished.load(Ordering::SeqCst),
            draws_total: self.draws_total.load(Ordering::SeqCst),
            wins_total: self.wins_total.load(Ordering::SeqCst),
            refunds_total: self.refunds_total.load(Ordering::SeqCst),
            registrations_total: self.registrations_total.load(Ordering::SeqCst),
            registrations_rejected: self.registrations_rejected.load(Ordering::SeqCst),
            settlements_completed: self.settlements_completed.load(Ordering::SeqCst),
            settlement_failures: self.settlement_failures.load(Ordering::SeqCst),
        }
    }

    /// Prometheus text exposition format
    pub fn to_prometheus_format(&self) -> String {
        let snapshot = self.snapshot();
        let counters = [
            ("bingo_rounds_opened_total", "Rounds opened", snapshot.rounds_opened),
            ("bingo_rounds_started_total", "Rounds that began drawing", snapshot.rounds_started),
            ("bingo_rounds_finished_total", "Rounds that reached finished", snapshot.rounds_finished),
            ("bingo_draws_total", "Numbers called", snapshot.draws_total),
            ("bingo_wins_total", "Rounds won", snapshot.wins_total),
            ("bingo_refunds_total", "Rounds refunded after exhaustion or abort", snapshot.refunds_total),
            ("bingo_registrations_total", "Cards registered", snapshot.registrations_total),
            ("bingo_registrations_rejected_total", "Registrations rejected", snapshot.registrations_rejected),
            ("bingo_settlements_completed_total", "Settlements fully applied", snapshot.settlements_completed),
            ("bingo_settlement_failures_total", "Settlement attempts that hit a ledger error", snapshot.settlement_failures),
        ];

        let mut output = String::new();
        for (name, help, value) in counters {
            output.push_str(&format!(
                "# HELP {name} {help}\n\
                 # TYPE {name} counter\n\
                 {name} {value}\n\n"
            ));
        }

        output.push_str(&format!(
            "# HELP bingo_uptime_seconds Engine uptime\n\
             # TYPE bingo_uptime_seconds gauge\n\
             bingo_uptime_seconds {}\n",
            self.uptime().as_secs()
        ));
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_export() {
        let metrics = EngineMetrics::new();
        EngineMetrics::incr(&metrics.draws_total);
        EngineMetrics::incr(&metrics.draws_total);
        EngineMetrics::incr(&metrics.wins_total);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.draws_total, 2);
        assert_eq!(snapshot.wins_total, 1);

        let text = metrics.to_prometheus_format();
        assert!(text.contains("# TYPE bingo_draws_total counter"));
        assert!(text.contains("bingo_draws_total 2\n"));
        assert!(text.contains("bingo_wins_total 1\n"));
    }
}
