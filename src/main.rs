//! GAFFER — Automated roster-trading agent for fantasy football markets
//!
//! Entry point. Loads configuration, initialises structured logging, reads
//! a pre-fetched session snapshot from disk, and runs one trade search
//! session over it. All marketplace I/O happens outside this binary; the
//! snapshot is the full input contract.

use anyhow::{Context, Result};
use std::fs;
use tracing::{info, warn};

use gaffer::config::AppConfig;
use gaffer::learner::{OutcomeLearner, OverbidSource};
use gaffer::pricing::BidPricer;
use gaffer::search::TradeSearch;
use gaffer::types::{GafferError, SessionSnapshot};

const BANNER: &str = r#"
  ____    _    _____ _____ _____ ____
 / ___|  / \  |  ___|  ___| ____|  _ \
| |  _  / _ \ | |_  | |_  |  _| | |_) |
| |_| |/ ___ \|  _| |  _| | |___|  _ <
 \____/_/   \_\_|   |_|   |_____|_| \_\

  Roster-Trading Agent
  v0.1.0 — one session per invocation
"#;

fn main() -> Result<()> {
    let cfg = AppConfig::load_or_default("config.toml")?;

    init_logging();

    println!("{BANNER}");
    info!(agent_name = %cfg.agent.name, "GAFFER starting up");

    let snapshot_path = std::env::args()
        .nth(1)
        .context("Usage: gaffer <snapshot.json>")?;
    let contents = fs::read_to_string(&snapshot_path)
        .with_context(|| format!("Failed to read snapshot file: {snapshot_path}"))?;
    let snapshot: SessionSnapshot = serde_json::from_str(&contents)
        .map_err(|e| GafferError::Snapshot(format!("{snapshot_path}: {e}")))?;

    info!(
        squad = snapshot.squad.len(),
        market = snapshot.market.len(),
        budget = snapshot.budget,
        "Session snapshot loaded"
    );

    // A broken learning store degrades the session to rule-based pricing.
    let learner = match OutcomeLearner::open(&cfg.learner.db_path) {
        Ok(l) => Some(l),
        Err(e) => {
            warn!(
                path = %cfg.learner.db_path,
                error = %e,
                "Learning store unavailable — pricing without learned overbids"
            );
            None
        }
    };

    let search = TradeSearch::new(
        cfg.search.to_search_config(),
        cfg.squad.to_rules(),
        BidPricer::new(cfg.bidding.to_bid_config()),
    )?;

    let source = learner.as_ref().map(|l| l as &dyn OverbidSource);
    let trades = search.find_trades(&snapshot, source);

    if trades.is_empty() {
        info!("No viable trade this session");
        return Ok(());
    }

    info!(count = trades.len(), "Viable trades found");
    for (rank, trade) in trades.iter().enumerate().take(10) {
        info!(rank = rank + 1, trade = %trade, "Trade candidate");
    }

    if let Some(learner) = &learner {
        match learner.get_statistics() {
            Ok(stats) => info!(
                auctions = stats.total_auctions,
                win_rate = format!("{:.1}%", stats.win_rate),
                "Auction history"
            ),
            Err(e) => warn!(error = %e, "Failed to read auction statistics"),
        }
    }

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gaffer=info"));

    let json_logging = std::env::var("GAFFER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
