//! Auction outcome learner.
//!
//! Persists every auction and flip fact in an append-only SQLite store and
//! answers "how aggressively should we currently bid?" from the recent
//! record. The store is the one I/O boundary inside the core: the learner
//! holds only a path, and every operation opens, executes, and releases its
//! own connection.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::types::{AuctionOutcome, FlipOutcome, GafferError};

/// Rolling window consulted by `get_recommended_overbid`.
const RECENT_LIMIT: i64 = 100;
const RECENT_WINDOW_DAYS: i64 = 30;

/// Below this many samples the learner refuses to extrapolate.
const MIN_SAMPLES: usize = 5;
const HIGH_CONFIDENCE_SAMPLES: usize = 20;

/// Conservative default when history is thin.
const CONSERVATIVE_DEFAULT_PCT: f64 = 8.0;

/// Operational band for learned recommendations.
const BAND_MIN_PCT: f64 = 5.0;
const BAND_MAX_PCT: f64 = 20.0;

// ---------------------------------------------------------------------------
// Recommendation types
// ---------------------------------------------------------------------------

/// How much history backs a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceTier::Low => write!(f, "low"),
            ConfidenceTier::Medium => write!(f, "medium"),
            ConfidenceTier::High => write!(f, "high"),
        }
    }
}

/// A learned overbid recommendation, always bounded by the value ceiling.
#[derive(Debug, Clone)]
pub struct OverbidRecommendation {
    /// Recommended overbid percentage; 0 means "do not bid".
    pub pct: f64,
    pub confidence: ConfidenceTier,
    pub reason: String,
    /// The value ceiling in euros.
    pub max_bid: i64,
    /// True when the ceiling clamp actually reduced the recommendation.
    pub ceiling_applied: bool,
    /// Number of recent auctions the recommendation is based on.
    pub sample_size: usize,
}

/// Seam between the learner and the trade search. The search consumes
/// learned overbids only through this trait, so a broken store degrades to
/// rule-based pricing instead of taking the search down.
pub trait OverbidSource {
    fn recommended_overbid(
        &self,
        asking_price: i64,
        quality_score: f64,
        current_value: i64,
        predicted_future_value: Option<i64>,
    ) -> Result<OverbidRecommendation, GafferError>;
}

// ---------------------------------------------------------------------------
// Rollup types
// ---------------------------------------------------------------------------

/// Overall auction record.
#[derive(Debug, Clone, Default)]
pub struct AuctionStatistics {
    pub total_auctions: i64,
    pub wins: i64,
    pub losses: i64,
    pub win_rate: f64,
    pub avg_winning_overbid: f64,
    pub avg_losing_overbid: f64,
    pub avg_quality_wins: f64,
    pub avg_quality_losses: f64,
}

/// Overall flip record.
#[derive(Debug, Clone, Default)]
pub struct FlipStatistics {
    pub total_flips: i64,
    pub profitable: i64,
    pub unprofitable: i64,
    pub success_rate: f64,
    pub avg_profit_pct: f64,
    pub avg_loss_pct: f64,
    pub avg_hold_days_profit: f64,
    pub avg_hold_days_loss: f64,
    pub total_profit: i64,
    pub best_flip: Option<FlipSummary>,
    pub worst_flip: Option<FlipSummary>,
}

#[derive(Debug, Clone)]
pub struct FlipSummary {
    pub player_name: String,
    pub profit: i64,
    pub profit_pct: f64,
    pub hold_days: i64,
}

/// One competitor's winning-bid pattern against us.
#[derive(Debug, Clone)]
pub struct CompetitorProfile {
    pub competitor_id: String,
    pub times_beaten_us: i64,
    pub avg_overbid: Option<f64>,
    pub min_overbid: Option<f64>,
    pub max_overbid: Option<f64>,
}

impl fmt::Display for CompetitorProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.avg_overbid {
            Some(avg) => write!(
                f,
                "{}: beat us {} times, typically overbids {avg:.1}%",
                self.competitor_id, self.times_beaten_us
            ),
            None => write!(f, "{}: no data", self.competitor_id),
        }
    }
}

/// Per-group flip performance.
#[derive(Debug, Clone)]
pub struct GroupStats {
    pub count: i64,
    pub avg_profit_pct: f64,
    pub success_rate: f64,
}

/// Flip outcomes grouped along the axes that drive buy decisions.
#[derive(Debug, Clone, Default)]
pub struct FlipPatterns {
    pub by_trend: HashMap<String, GroupStats>,
    pub by_position: HashMap<String, GroupStats>,
    pub by_hold_bucket: HashMap<String, GroupStats>,
    pub by_health: HashMap<String, GroupStats>,
}

// ---------------------------------------------------------------------------
// Learner
// ---------------------------------------------------------------------------

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS auction_outcomes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    player_id TEXT NOT NULL,
    player_name TEXT NOT NULL,
    our_bid INTEGER NOT NULL,
    asking_price INTEGER NOT NULL,
    our_overbid_pct REAL NOT NULL,
    won INTEGER NOT NULL,
    winning_bid INTEGER,
    winning_overbid_pct REAL,
    winner_id TEXT,
    timestamp INTEGER NOT NULL,
    quality_score REAL,
    market_value INTEGER
);
CREATE INDEX IF NOT EXISTS idx_auction_player ON auction_outcomes(player_id);
CREATE INDEX IF NOT EXISTS idx_auction_ts ON auction_outcomes(timestamp);

CREATE TABLE IF NOT EXISTS flip_outcomes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    player_id TEXT NOT NULL,
    player_name TEXT NOT NULL,
    buy_price INTEGER NOT NULL,
    sell_price INTEGER NOT NULL,
    profit INTEGER NOT NULL,
    profit_pct REAL NOT NULL,
    hold_days INTEGER NOT NULL,
    buy_date INTEGER NOT NULL,
    sell_date INTEGER NOT NULL,
    trend_at_buy TEXT,
    average_points REAL,
    position TEXT,
    was_injured INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_flip_player ON flip_outcomes(player_id);
CREATE INDEX IF NOT EXISTS idx_flip_buy_date ON flip_outcomes(buy_date);
";

/// Append-only store of auction and flip history.
pub struct OutcomeLearner {
    db_path: PathBuf,
}

impl OutcomeLearner {
    /// Open (creating if necessary) the learning store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, GafferError> {
        let learner = Self { db_path: path.into() };
        if let Some(parent) = learner.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = learner.connect()?;
        conn.execute_batch(SCHEMA)?;
        info!(path = %learner.db_path.display(), "Learning store ready");
        Ok(learner)
    }

    fn connect(&self) -> Result<Connection, GafferError> {
        Ok(Connection::open(&self.db_path)?)
    }

    /// Append one auction outcome. Idempotency is the caller's concern.
    pub fn record_outcome(&self, outcome: &AuctionOutcome) -> Result<(), GafferError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO auction_outcomes (
                player_id, player_name, our_bid, asking_price, our_overbid_pct,
                won, winning_bid, winning_overbid_pct, winner_id, timestamp,
                quality_score, market_value
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                outcome.player_id,
                outcome.player_name,
                outcome.our_bid,
                outcome.asking_price,
                outcome.our_overbid_pct,
                outcome.won,
                outcome.winning_bid,
                outcome.winning_overbid_pct,
                outcome.winner_id,
                outcome.timestamp.timestamp(),
                outcome.quality_score,
                outcome.market_value,
            ],
        )?;
        debug!(
            player = %outcome.player_name,
            won = outcome.won,
            pct = format!("{:.1}%", outcome.our_overbid_pct),
            "Auction outcome recorded"
        );
        Ok(())
    }

    /// Append one completed buy→sell cycle.
    pub fn record_flip(&self, flip: &FlipOutcome) -> Result<(), GafferError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO flip_outcomes (
                player_id, player_name, buy_price, sell_price, profit, profit_pct,
                hold_days, buy_date, sell_date, trend_at_buy, average_points,
                position, was_injured
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                flip.player_id,
                flip.player_name,
                flip.buy_price,
                flip.sell_price,
                flip.profit,
                flip.profit_pct,
                flip.hold_days,
                flip.buy_date.timestamp(),
                flip.sell_date.timestamp(),
                flip.trend_at_buy.map(|t| t.to_string()),
                flip.average_points,
                flip.position.map(|p| p.code().to_string()),
                flip.was_injured,
            ],
        )?;
        debug!(
            player = %flip.player_name,
            profit = flip.profit,
            hold_days = flip.hold_days,
            "Flip outcome recorded"
        );
        Ok(())
    }

    /// Recommend an overbid percentage from recent auction history.
    ///
    /// The recommendation never exceeds the value ceiling, regardless of
    /// what the historical pattern suggests. When `predicted_future_value`
    /// is absent the ceiling is estimated with the same growth assumption
    /// the bid pricer defaults to.
    pub fn get_recommended_overbid(
        &self,
        asking_price: i64,
        quality_score: f64,
        current_value: i64,
        predicted_future_value: Option<i64>,
    ) -> Result<OverbidRecommendation, GafferError> {
        let ceiling = predicted_future_value
            .unwrap_or_else(|| (current_value as f64 * (1.0 + quality_score / 1000.0)) as i64);

        if ceiling <= asking_price {
            return Ok(OverbidRecommendation {
                pct: 0.0,
                confidence: ConfidenceTier::High,
                reason: format!("predicted value €{ceiling} at or below asking — skip"),
                max_bid: ceiling,
                ceiling_applied: true,
                sample_size: 0,
            });
        }

        let max_overbid_pct = (ceiling - asking_price) as f64 / asking_price as f64 * 100.0;

        let outcomes = self.recent_outcomes()?;
        let sample_size = outcomes.len();

        if sample_size < MIN_SAMPLES {
            let pct = CONSERVATIVE_DEFAULT_PCT.min(max_overbid_pct);
            return Ok(OverbidRecommendation {
                pct,
                confidence: ConfidenceTier::Low,
                reason: format!(
                    "insufficient data ({sample_size} auctions) — conservative {pct:.1}% (max {max_overbid_pct:.1}%)"
                ),
                max_bid: ceiling,
                ceiling_applied: CONSERVATIVE_DEFAULT_PCT > max_overbid_pct,
                sample_size,
            });
        }

        let wins: Vec<&RecentOutcome> = outcomes.iter().filter(|o| o.won).collect();
        let losses: Vec<&RecentOutcome> = outcomes.iter().filter(|o| !o.won).collect();

        let (raw_pct, mut reason) = if wins.is_empty() {
            // The whole sample is losses here. Escalate past our average
            // losing premium.
            let avg_losing = mean(losses.iter().map(|o| o.our_pct));
            (
                avg_losing + 5.0,
                format!("lost all {} recent auctions — escalating", losses.len()),
            )
        } else {
            let win_rate = wins.len() as f64 / sample_size as f64 * 100.0;
            let competitor_pcts: Vec<f64> =
                losses.iter().filter_map(|o| o.winning_pct).collect();

            if competitor_pcts.is_empty() {
                (
                    mean(wins.iter().map(|o| o.our_pct)),
                    format!("based on {sample_size} auctions ({win_rate:.0}% win rate)"),
                )
            } else {
                // The premiums that beat us are the competitors' minimum
                // winning bids; sit just above their average.
                let avg_competitor = mean(competitor_pcts.iter().copied());
                (
                    avg_competitor + 2.0,
                    format!(
                        "based on {sample_size} auctions ({win_rate:.0}% win rate, competitors win at {avg_competitor:.1}%)"
                    ),
                )
            }
        };

        let mut adjusted = raw_pct;
        if quality_score >= 80.0 {
            adjusted = adjusted.max(12.0);
        } else if quality_score < 50.0 {
            adjusted = adjusted.min(8.0);
        }
        let banded = adjusted.clamp(BAND_MIN_PCT, BAND_MAX_PCT);

        let ceiling_applied = banded > max_overbid_pct;
        let pct = banded.min(max_overbid_pct);
        if ceiling_applied {
            reason.push_str(&format!(" | value ceiling applied (max {max_overbid_pct:.1}%)"));
        }

        let confidence = if sample_size >= HIGH_CONFIDENCE_SAMPLES {
            ConfidenceTier::High
        } else {
            ConfidenceTier::Medium
        };

        debug!(
            asking = asking_price,
            pct = format!("{pct:.1}%"),
            confidence = %confidence,
            samples = sample_size,
            ceiling_applied,
            "Learned overbid computed"
        );

        Ok(OverbidRecommendation {
            pct,
            confidence,
            reason,
            max_bid: ceiling,
            ceiling_applied,
            sample_size,
        })
    }

    fn recent_outcomes(&self) -> Result<Vec<RecentOutcome>, GafferError> {
        let cutoff = (Utc::now() - chrono::Duration::days(RECENT_WINDOW_DAYS)).timestamp();
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT our_overbid_pct, won, winning_overbid_pct
             FROM auction_outcomes
             WHERE timestamp > ?1
             ORDER BY timestamp DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![cutoff, RECENT_LIMIT], |row| {
            Ok(RecentOutcome {
                our_pct: row.get(0)?,
                won: row.get(1)?,
                winning_pct: row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Overall win/loss rollup over the full auction log.
    pub fn get_statistics(&self) -> Result<AuctionStatistics, GafferError> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN won = 1 THEN 1 ELSE 0 END), 0),
                    AVG(CASE WHEN won = 1 THEN our_overbid_pct END),
                    AVG(CASE WHEN won = 0 THEN our_overbid_pct END),
                    AVG(CASE WHEN won = 1 THEN quality_score END),
                    AVG(CASE WHEN won = 0 THEN quality_score END)
             FROM auction_outcomes",
            [],
            |row| {
                let total: i64 = row.get(0)?;
                let wins: i64 = row.get(1)?;
                Ok(AuctionStatistics {
                    total_auctions: total,
                    wins,
                    losses: total - wins,
                    win_rate: if total > 0 {
                        wins as f64 / total as f64 * 100.0
                    } else {
                        0.0
                    },
                    avg_winning_overbid: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
                    avg_losing_overbid: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
                    avg_quality_wins: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
                    avg_quality_losses: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
                })
            },
        )
        .map_err(Into::into)
    }

    /// Overall flip rollup, including the best and worst single flips.
    pub fn get_flip_statistics(&self) -> Result<FlipStatistics, GafferError> {
        let conn = self.connect()?;
        let mut stats = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN profit > 0 THEN 1 ELSE 0 END), 0),
                    AVG(CASE WHEN profit > 0 THEN profit_pct END),
                    AVG(CASE WHEN profit <= 0 THEN profit_pct END),
                    AVG(CASE WHEN profit > 0 THEN hold_days END),
                    AVG(CASE WHEN profit <= 0 THEN hold_days END),
                    COALESCE(SUM(profit), 0)
             FROM flip_outcomes",
            [],
            |row| {
                let total: i64 = row.get(0)?;
                let profitable: i64 = row.get(1)?;
                Ok(FlipStatistics {
                    total_flips: total,
                    profitable,
                    unprofitable: total - profitable,
                    success_rate: if total > 0 {
                        profitable as f64 / total as f64 * 100.0
                    } else {
                        0.0
                    },
                    avg_profit_pct: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
                    avg_loss_pct: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
                    avg_hold_days_profit: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
                    avg_hold_days_loss: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
                    total_profit: row.get(6)?,
                    best_flip: None,
                    worst_flip: None,
                })
            },
        )?;

        if stats.total_flips > 0 {
            stats.best_flip = self.extreme_flip(&conn, "DESC")?;
            stats.worst_flip = self.extreme_flip(&conn, "ASC")?;
        }
        Ok(stats)
    }

    fn extreme_flip(
        &self,
        conn: &Connection,
        order: &str,
    ) -> Result<Option<FlipSummary>, GafferError> {
        conn.query_row(
            &format!(
                "SELECT player_name, profit, profit_pct, hold_days
                 FROM flip_outcomes ORDER BY profit_pct {order} LIMIT 1"
            ),
            [],
            |row| {
                Ok(FlipSummary {
                    player_name: row.get(0)?,
                    profit: row.get(1)?,
                    profit_pct: row.get(2)?,
                    hold_days: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(Into::into)
    }

    /// Bidding pattern of one competitor, from the auctions they won
    /// against us.
    pub fn analyze_competitor(&self, competitor_id: &str) -> Result<CompetitorProfile, GafferError> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT COUNT(*), AVG(winning_overbid_pct), MIN(winning_overbid_pct),
                    MAX(winning_overbid_pct)
             FROM auction_outcomes
             WHERE winner_id = ?1 AND winning_overbid_pct IS NOT NULL",
            params![competitor_id],
            |row| {
                Ok(CompetitorProfile {
                    competitor_id: competitor_id.to_string(),
                    times_beaten_us: row.get(0)?,
                    avg_overbid: row.get(1)?,
                    min_overbid: row.get(2)?,
                    max_overbid: row.get(3)?,
                })
            },
        )
        .map_err(Into::into)
    }

    /// Flip performance grouped by trend at purchase, position, holding
    /// duration and health flag.
    pub fn analyze_flip_patterns(&self) -> Result<FlipPatterns, GafferError> {
        let conn = self.connect()?;
        Ok(FlipPatterns {
            by_trend: grouped(
                &conn,
                "SELECT trend_at_buy, COUNT(*), AVG(profit_pct),
                        SUM(CASE WHEN profit > 0 THEN 1 ELSE 0 END)
                 FROM flip_outcomes WHERE trend_at_buy IS NOT NULL
                 GROUP BY trend_at_buy",
            )?,
            by_position: grouped(
                &conn,
                "SELECT position, COUNT(*), AVG(profit_pct),
                        SUM(CASE WHEN profit > 0 THEN 1 ELSE 0 END)
                 FROM flip_outcomes WHERE position IS NOT NULL
                 GROUP BY position",
            )?,
            by_hold_bucket: grouped(
                &conn,
                "SELECT CASE
                            WHEN hold_days <= 1 THEN '0-1 days'
                            WHEN hold_days <= 3 THEN '2-3 days'
                            WHEN hold_days <= 7 THEN '4-7 days'
                            ELSE '8+ days'
                        END AS bucket,
                        COUNT(*), AVG(profit_pct),
                        SUM(CASE WHEN profit > 0 THEN 1 ELSE 0 END)
                 FROM flip_outcomes GROUP BY bucket",
            )?,
            by_health: grouped(
                &conn,
                "SELECT CASE WHEN was_injured = 1 THEN 'injured' ELSE 'healthy' END,
                        COUNT(*), AVG(profit_pct),
                        SUM(CASE WHEN profit > 0 THEN 1 ELSE 0 END)
                 FROM flip_outcomes GROUP BY was_injured",
            )?,
        })
    }

    /// Qualitative guidance derived from the flip patterns. Advisory text
    /// only; nothing here feeds back into pricing.
    pub fn get_learning_recommendations(&self) -> Result<Vec<String>, GafferError> {
        let patterns = self.analyze_flip_patterns()?;
        let mut recommendations = Vec::new();

        if let (Some(rising), Some(falling)) = (
            patterns.by_trend.get("rising"),
            patterns.by_trend.get("falling"),
        ) {
            if rising.success_rate > falling.success_rate + 20.0 {
                recommendations.push(format!(
                    "Focus on rising-trend players (success rate {:.0}% vs {:.0}% for falling)",
                    rising.success_rate, falling.success_rate
                ));
            } else if falling.success_rate > rising.success_rate + 20.0 {
                recommendations.push(format!(
                    "Mean reversion working on falling players ({:.0}% success rate)",
                    falling.success_rate
                ));
            }
        }

        if let Some((position, stats)) = best_group(&patterns.by_position) {
            recommendations.push(format!(
                "Best position: {position} ({:.1}% avg profit, {:.0}% success)",
                stats.avg_profit_pct, stats.success_rate
            ));
        }

        if let Some((bucket, stats)) = best_group(&patterns.by_hold_bucket) {
            recommendations.push(format!(
                "Optimal hold time: {bucket} ({:.1}% avg profit)",
                stats.avg_profit_pct
            ));
        }

        if let (Some(healthy), Some(injured)) = (
            patterns.by_health.get("healthy"),
            patterns.by_health.get("injured"),
        ) {
            if healthy.success_rate > injured.success_rate + 15.0 {
                recommendations.push(format!(
                    "Avoid injured players (healthy success {:.0}% vs injured {:.0}%)",
                    healthy.success_rate, injured.success_rate
                ));
            }
        }

        if recommendations.is_empty() {
            recommendations
                .push("Not enough data yet — keep trading to build the learning log".to_string());
        }
        Ok(recommendations)
    }
}

impl OverbidSource for OutcomeLearner {
    fn recommended_overbid(
        &self,
        asking_price: i64,
        quality_score: f64,
        current_value: i64,
        predicted_future_value: Option<i64>,
    ) -> Result<OverbidRecommendation, GafferError> {
        self.get_recommended_overbid(asking_price, quality_score, current_value, predicted_future_value)
    }
}

struct RecentOutcome {
    our_pct: f64,
    won: bool,
    winning_pct: Option<f64>,
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn grouped(conn: &Connection, sql: &str) -> Result<HashMap<String, GroupStats>, GafferError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| {
        let key: String = row.get(0)?;
        let count: i64 = row.get(1)?;
        let avg_profit: Option<f64> = row.get(2)?;
        let wins: i64 = row.get(3)?;
        Ok((
            key,
            GroupStats {
                count,
                avg_profit_pct: avg_profit.unwrap_or(0.0),
                success_rate: if count > 0 {
                    wins as f64 / count as f64 * 100.0
                } else {
                    0.0
                },
            },
        ))
    })?;
    rows.collect::<Result<HashMap<_, _>, _>>().map_err(Into::into)
}

/// Best-performing group by average profit, requiring at least 3 samples.
fn best_group(groups: &HashMap<String, GroupStats>) -> Option<(&String, &GroupStats)> {
    groups
        .iter()
        .filter(|(_, s)| s.count >= 3)
        .max_by(|a, b| {
            a.1.avg_profit_pct
                .partial_cmp(&b.1.avg_profit_pct)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Position, Trend};
    use chrono::Duration;
    use tempfile::TempDir;

    fn temp_learner() -> (TempDir, OutcomeLearner) {
        let dir = tempfile::tempdir().unwrap();
        let learner = OutcomeLearner::open(dir.path().join("outcomes.db")).unwrap();
        (dir, learner)
    }

    fn outcome(won: bool, pct: f64) -> AuctionOutcome {
        AuctionOutcome {
            player_id: "p1".to_string(),
            player_name: "Player 1".to_string(),
            our_bid: 10_500_000,
            asking_price: 10_000_000,
            our_overbid_pct: pct,
            won,
            winning_bid: None,
            winning_overbid_pct: None,
            winner_id: None,
            timestamp: Utc::now(),
            quality_score: Some(60.0),
            market_value: Some(10_000_000),
        }
    }

    fn loss_to(winner: &str, winning_pct: f64) -> AuctionOutcome {
        AuctionOutcome {
            winning_bid: Some(11_200_000),
            winning_overbid_pct: Some(winning_pct),
            winner_id: Some(winner.to_string()),
            ..outcome(false, 6.0)
        }
    }

    fn flip(profit: i64, hold_days: i64) -> FlipOutcome {
        let sell_date = Utc::now();
        FlipOutcome {
            player_id: "p1".to_string(),
            player_name: "Player 1".to_string(),
            buy_price: 2_000_000,
            sell_price: 2_000_000 + profit,
            profit,
            profit_pct: profit as f64 / 2_000_000.0 * 100.0,
            hold_days,
            buy_date: sell_date - Duration::days(hold_days),
            sell_date,
            trend_at_buy: Some(Trend::Rising),
            average_points: Some(30.0),
            position: Some(Position::Midfielder),
            was_injured: false,
        }
    }

    // -- get_recommended_overbid --

    #[test]
    fn test_empty_store_conservative_default() {
        let (_dir, learner) = temp_learner();
        let rec = learner
            .get_recommended_overbid(10_000_000, 60.0, 11_000_000, Some(13_000_000))
            .unwrap();
        assert_eq!(rec.confidence, ConfidenceTier::Low);
        assert!((rec.pct - 8.0).abs() < 1e-9);
        assert_eq!(rec.sample_size, 0);
    }

    #[test]
    fn test_above_ceiling_skips() {
        let (_dir, learner) = temp_learner();
        let rec = learner
            .get_recommended_overbid(10_000_000, 60.0, 9_000_000, Some(9_500_000))
            .unwrap();
        assert_eq!(rec.pct, 0.0);
        assert!(rec.ceiling_applied);
        assert!(rec.reason.contains("skip"));
    }

    #[test]
    fn test_tight_ceiling_caps_default() {
        let (_dir, learner) = temp_learner();
        // max_overbid_pct ≈ 3.3% — below the conservative 8%.
        let rec = learner
            .get_recommended_overbid(15_000_000, 60.0, 15_000_000, Some(15_500_000))
            .unwrap();
        assert!(rec.pct <= 3.4);
        assert!(rec.pct > 3.2);
        assert!(rec.ceiling_applied);
    }

    #[test]
    fn test_derived_ceiling_when_absent() {
        let (_dir, learner) = temp_learner();
        // quality 60 → ceiling = 10M × 1.06 = 10.6M → max 6%.
        let rec = learner
            .get_recommended_overbid(10_000_000, 60.0, 10_000_000, None)
            .unwrap();
        assert_eq!(rec.max_bid, 10_600_000);
        assert!(rec.pct <= 6.0 + 1e-9);
    }

    #[test]
    fn test_all_losses_escalates() {
        let (_dir, learner) = temp_learner();
        for _ in 0..6 {
            learner.record_outcome(&outcome(false, 5.0)).unwrap();
        }
        let rec = learner
            .get_recommended_overbid(10_000_000, 60.0, 11_000_000, Some(14_000_000))
            .unwrap();
        // avg losing 5% + 5 = 10%.
        assert!((rec.pct - 10.0).abs() < 1e-9);
        assert_eq!(rec.confidence, ConfidenceTier::Medium);
        assert!(rec.reason.contains("lost all 6"));
    }

    #[test]
    fn test_competitor_informed_base() {
        let (_dir, learner) = temp_learner();
        learner.record_outcome(&outcome(true, 10.0)).unwrap();
        learner.record_outcome(&outcome(true, 10.0)).unwrap();
        for _ in 0..3 {
            learner.record_outcome(&loss_to("rival-7", 12.0)).unwrap();
        }
        let rec = learner
            .get_recommended_overbid(10_000_000, 60.0, 11_000_000, Some(14_000_000))
            .unwrap();
        // competitors win at 12% + 2 buffer = 14%.
        assert!((rec.pct - 14.0).abs() < 1e-9);
        assert!(rec.reason.contains("competitors win at 12.0%"));
    }

    #[test]
    fn test_own_winning_average_fallback() {
        let (_dir, learner) = temp_learner();
        for _ in 0..3 {
            learner.record_outcome(&outcome(true, 9.0)).unwrap();
        }
        for _ in 0..2 {
            learner.record_outcome(&outcome(false, 4.0)).unwrap();
        }
        let rec = learner
            .get_recommended_overbid(10_000_000, 60.0, 11_000_000, Some(14_000_000))
            .unwrap();
        assert!((rec.pct - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_quality_floor_and_cap() {
        let (_dir, learner) = temp_learner();
        for _ in 0..5 {
            learner.record_outcome(&outcome(true, 6.0)).unwrap();
        }
        // High quality raises the floor to 12%.
        let rec = learner
            .get_recommended_overbid(10_000_000, 85.0, 11_000_000, Some(14_000_000))
            .unwrap();
        assert!((rec.pct - 12.0).abs() < 1e-9);

        // Low quality caps at 8% even when history suggests more.
        let (_dir2, eager) = temp_learner();
        for _ in 0..5 {
            eager.record_outcome(&outcome(true, 15.0)).unwrap();
        }
        let rec = eager
            .get_recommended_overbid(10_000_000, 40.0, 11_000_000, Some(14_000_000))
            .unwrap();
        assert!((rec.pct - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_operational_band_clamp() {
        let (_dir, learner) = temp_learner();
        // Losses at 18% average push the raw escalation to 23%.
        for _ in 0..5 {
            learner.record_outcome(&outcome(false, 18.0)).unwrap();
        }
        let rec = learner
            .get_recommended_overbid(10_000_000, 60.0, 11_000_000, Some(14_000_000))
            .unwrap();
        assert!((rec.pct - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_high_confidence_at_twenty_samples() {
        let (_dir, learner) = temp_learner();
        for i in 0..20 {
            learner.record_outcome(&outcome(i % 2 == 0, 8.0)).unwrap();
        }
        let rec = learner
            .get_recommended_overbid(10_000_000, 60.0, 11_000_000, Some(14_000_000))
            .unwrap();
        assert_eq!(rec.confidence, ConfidenceTier::High);
        assert_eq!(rec.sample_size, 20);
    }

    #[test]
    fn test_clamp_invariant_never_exceeds_ceiling() {
        let (_dir, learner) = temp_learner();
        for _ in 0..10 {
            learner.record_outcome(&outcome(false, 18.0)).unwrap();
        }
        for (asking, ceiling) in [
            (10_000_000_i64, 10_300_000_i64),
            (10_000_000, 11_000_000),
            (5_000_000, 5_100_000),
        ] {
            let rec = learner
                .get_recommended_overbid(asking, 85.0, asking, Some(ceiling))
                .unwrap();
            let implied_bid = asking + (asking as f64 * rec.pct / 100.0) as i64;
            assert!(
                implied_bid <= ceiling,
                "implied bid {implied_bid} exceeds ceiling {ceiling}"
            );
        }
    }

    #[test]
    fn test_stale_outcomes_excluded() {
        let (_dir, learner) = temp_learner();
        for _ in 0..6 {
            let old = AuctionOutcome {
                timestamp: Utc::now() - Duration::days(40),
                ..outcome(false, 5.0)
            };
            learner.record_outcome(&old).unwrap();
        }
        // All history is outside the 30-day window.
        let rec = learner
            .get_recommended_overbid(10_000_000, 60.0, 11_000_000, Some(14_000_000))
            .unwrap();
        assert_eq!(rec.confidence, ConfidenceTier::Low);
        assert_eq!(rec.sample_size, 0);
    }

    // -- rollups --

    #[test]
    fn test_statistics_empty() {
        let (_dir, learner) = temp_learner();
        let stats = learner.get_statistics().unwrap();
        assert_eq!(stats.total_auctions, 0);
        assert_eq!(stats.win_rate, 0.0);
    }

    #[test]
    fn test_statistics_rollup() {
        let (_dir, learner) = temp_learner();
        learner.record_outcome(&outcome(true, 10.0)).unwrap();
        learner.record_outcome(&outcome(true, 12.0)).unwrap();
        learner.record_outcome(&outcome(false, 4.0)).unwrap();
        let stats = learner.get_statistics().unwrap();
        assert_eq!(stats.total_auctions, 3);
        assert_eq!(stats.wins, 2);
        assert_eq!(stats.losses, 1);
        assert!((stats.win_rate - 66.666).abs() < 0.01);
        assert!((stats.avg_winning_overbid - 11.0).abs() < 1e-9);
        assert!((stats.avg_losing_overbid - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_flip_statistics_rollup() {
        let (_dir, learner) = temp_learner();
        learner.record_flip(&flip(600_000, 5)).unwrap();
        learner.record_flip(&flip(200_000, 2)).unwrap();
        learner.record_flip(&flip(-100_000, 10)).unwrap();
        let stats = learner.get_flip_statistics().unwrap();
        assert_eq!(stats.total_flips, 3);
        assert_eq!(stats.profitable, 2);
        assert_eq!(stats.unprofitable, 1);
        assert!((stats.success_rate - 66.666).abs() < 0.01);
        assert_eq!(stats.total_profit, 700_000);
        assert!((stats.best_flip.as_ref().unwrap().profit_pct - 30.0).abs() < 1e-9);
        assert_eq!(stats.worst_flip.as_ref().unwrap().profit, -100_000);
    }

    #[test]
    fn test_analyze_competitor() {
        let (_dir, learner) = temp_learner();
        learner.record_outcome(&loss_to("rival-7", 12.0)).unwrap();
        learner.record_outcome(&loss_to("rival-7", 14.0)).unwrap();
        learner.record_outcome(&loss_to("rival-9", 20.0)).unwrap();

        let profile = learner.analyze_competitor("rival-7").unwrap();
        assert_eq!(profile.times_beaten_us, 2);
        assert!((profile.avg_overbid.unwrap() - 13.0).abs() < 1e-9);
        assert_eq!(profile.min_overbid, Some(12.0));
        assert_eq!(profile.max_overbid, Some(14.0));

        let unknown = learner.analyze_competitor("rival-0").unwrap();
        assert_eq!(unknown.times_beaten_us, 0);
        assert!(unknown.avg_overbid.is_none());
        assert!(format!("{unknown}").contains("no data"));
    }

    #[test]
    fn test_flip_patterns_grouping() {
        let (_dir, learner) = temp_learner();
        learner.record_flip(&flip(600_000, 1)).unwrap();
        learner.record_flip(&flip(400_000, 3)).unwrap();
        learner.record_flip(&flip(-100_000, 9)).unwrap();
        let mut falling = flip(-200_000, 5);
        falling.trend_at_buy = Some(Trend::Falling);
        falling.was_injured = true;
        learner.record_flip(&falling).unwrap();

        let patterns = learner.analyze_flip_patterns().unwrap();
        assert_eq!(patterns.by_trend.get("rising").unwrap().count, 3);
        assert_eq!(patterns.by_trend.get("falling").unwrap().count, 1);
        assert_eq!(patterns.by_position.get("MID").unwrap().count, 4);
        assert_eq!(patterns.by_hold_bucket.get("0-1 days").unwrap().count, 1);
        assert_eq!(patterns.by_hold_bucket.get("2-3 days").unwrap().count, 1);
        assert_eq!(patterns.by_hold_bucket.get("4-7 days").unwrap().count, 1);
        assert_eq!(patterns.by_hold_bucket.get("8+ days").unwrap().count, 1);
        assert_eq!(patterns.by_health.get("injured").unwrap().count, 1);
        assert_eq!(patterns.by_health.get("healthy").unwrap().count, 3);
    }

    #[test]
    fn test_learning_recommendations_flag_injuries() {
        let (_dir, learner) = temp_learner();
        for _ in 0..4 {
            learner.record_flip(&flip(300_000, 3)).unwrap();
        }
        for _ in 0..3 {
            let mut bad = flip(-200_000, 3);
            bad.was_injured = true;
            learner.record_flip(&bad).unwrap();
        }
        let recs = learner.get_learning_recommendations().unwrap();
        assert!(recs.iter().any(|r| r.contains("injured")));
    }

    #[test]
    fn test_learning_recommendations_empty_store() {
        let (_dir, learner) = temp_learner();
        let recs = learner.get_learning_recommendations().unwrap();
        assert_eq!(recs.len(), 1);
        assert!(recs[0].contains("Not enough data"));
    }
}
