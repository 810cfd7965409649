//! Bingo table host
//!
//! Runs demo rounds against the in-memory ledger: funds players, seats them
//! with catalogue cards, calls numbers on a timer until every table has a
//! result, then prints summaries and the leaderboard. Ctrl-C aborts open
//! rounds with refunds.

use arada_bingo::common::traits::NotifyTarget;
use arada_bingo::{
    BingoConfig, BroadcastNotifier, CardSelection, ConfigLoader, DrawOutcome, EngineError,
    InMemoryLedger, RoundEngine,
};
use clap::Parser;
use std::sync::Arc;
use tokio::task::JoinSet;

#[derive(Parser, Debug)]
#[command(name = "bingo-table")]
#[command(about = "Arada bingo round host", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<String>,

    /// Start from the quick-play preset instead of defaults
    #[arg(long)]
    quick: bool,

    /// Number of tables to run concurrently
    #[arg(long, default_value = "1")]
    tables: usize,

    /// Players seated at each table
    #[arg(long, default_value = "3")]
    players: usize,

    /// Stake per card
    #[arg(long, default_value = "10")]
    stake: u64,

    /// Opening balance for each demo player
    #[arg(long, default_value = "100")]
    balance: u64,

    /// Override the configured draw interval
    #[arg(long)]
    draw_interval_ms: Option<u64>,

    /// Wait out the configured registration window before starting
    #[arg(long)]
    registration_window: bool,

    /// Print Prometheus metrics when done
    #[arg(long)]
    metrics: bool,
}

fn load_config(args: &Args) -> Result<BingoConfig, EngineError> {
    let mut config = match (&args.config, args.quick) {
        (Some(path), _) => ConfigLoader::new().with_path(path).load()?,
        (None, true) => BingoConfig::quick_play(),
        (None, false) => ConfigLoader::new().load()?,
    };
    if let Some(interval) = args.draw_interval_ms {
        config.schedule.draw_interval_ms = interval;
    }
    config.validate()?;
    Ok(config)
}

async fn run_table(engine: Arc<RoundEngine>, table_id: String) -> Result<(), EngineError> {
    engine.start(&table_id).await?;

    let mut ticker = tokio::time::interval(engine.config().draw_interval());
    loop {
        ticker.tick().await;
        match engine.draw_next(&table_id).await {
            Ok(DrawOutcome::Called { .. }) => continue,
            Ok(_) => return Ok(()),
            Err(EngineError::Settlement(e)) => {
                tracing::warn!(table_id = %table_id, error = %e, "Round finished but not settled");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("arada_bingo={0},bingo_table={0}", config.monitoring.log_level.as_filter()).into()),
        )
        .init();

    let ledger = Arc::new(InMemoryLedger::new());
    let notifier = Arc::new(BroadcastNotifier::default());
    let engine = Arc::new(RoundEngine::new(config.clone(), ledger.clone(), notifier.clone())?);

    // Table events to the log
    let mut events = notifier.subscribe();
    let event_log = tokio::spawn(async move {
        while let Ok(notification) = events.recv().await {
            if let NotifyTarget::Table(_) = notification.target {
                if let Ok(json) = serde_json::to_string(&notification.event) {
                    tracing::debug!(event = %json, "Round event");
                }
            }
        }
    });

    let table_ids: Vec<String> = (1..=args.tables).map(|t| format!("table-{}", t)).collect();
    for (t, table_id) in table_ids.iter().enumerate() {
        for p in 0..args.players {
            let player_id = format!("player-{}-{}", t + 1, p + 1);
            ledger.deposit(&player_id, args.balance);
            let card_number = (p + 1) as u32;
            engine
                .register_player(table_id, &player_id, CardSelection::catalogue(card_number), args.stake)
                .await?;
        }
    }

    if args.registration_window && !config.registration_window().is_zero() {
        tracing::info!(window_ms = config.schedule.registration_window_ms, "Waiting for registration window");
        tokio::time::sleep(config.registration_window()).await;
    }

    // Periodic settlement retries
    let retry_engine = Arc::clone(&engine);
    let retry_interval = config.settlement_retry_interval();
    let retries = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(retry_interval);
        loop {
            ticker.tick().await;
            let settled = retry_engine.retry_pending_settlements().await;
            if !settled.is_empty() {
                tracing::info!(rounds = ?settled, "Settled on retry");
            }
        }
    });

    let mut tables = JoinSet::new();
    for table_id in &table_ids {
        tables.spawn(run_table(Arc::clone(&engine), table_id.clone()));
    }

    let all_done = async {
        while let Some(joined) = tables.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Table stopped"),
                Err(e) => tracing::error!(error = %e, "Table task panicked"),
            }
        }
    };

    tokio::select! {
        _ = all_done => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, aborting open rounds");
            let aborted = engine.shutdown().await;
            tracing::info!(rounds = aborted.len(), "Open rounds refunded");
        }
    }

    // Give pending retries one last pass
    engine.retry_pending_settlements().await;
    retries.abort();
    event_log.abort();

    for table_id in &table_ids {
        match engine.summary(table_id) {
            Ok(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
            Err(e) => tracing::warn!(table_id = %table_id, error = %e, "No summary"),
        }
    }

    println!("Leaderboard:");
    for (rank, entry) in engine.leaderboard().iter().enumerate() {
        println!(
            "  {:>2}. {:<16} wins={:<3} earnings={}",
            rank + 1,
            entry.player_id,
            entry.wins,
            entry.total_earnings
        );
    }

    let house = &config.round.house_account;
    println!("House balance ({}): {}", house, ledger.balance(house));

    let unsettled = engine.pending_settlements();
    if !unsettled.is_empty() {
        tracing::warn!(count = unsettled.len(), "Rounds still unsettled at exit");
    }

    if args.metrics && config.monitoring.enable_metrics {
        print!("{}", engine.metrics().to_prometheus_format());
    }

    Ok(())
}
