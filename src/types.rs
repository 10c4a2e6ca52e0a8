//! Shared types for the GAFFER agent.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that roster, pricing, learner,
//! and search modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A tradable player — an immutable snapshot fetched once per session.
///
/// All monetary fields are whole euros; the marketplace never trades in
/// fractions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub position: Position,
    /// Current asking price on the transfer market.
    pub price: i64,
    /// Current assessed market value.
    pub market_value: i64,
    /// Points scored in the most recent matchday.
    pub points: f64,
    /// Rolling average points per matchday.
    pub average_points: f64,
    /// False when injured, suspended, or otherwise unavailable.
    pub healthy: bool,
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] (ask: €{} | value: €{} | avg: {:.1}pts{})",
            self.name,
            self.position,
            self.price,
            self.market_value,
            self.average_points,
            if self.healthy { "" } else { " | INJURED" },
        )
    }
}

impl Player {
    /// Helper to build a test player with sensible defaults.
    #[cfg(test)]
    pub fn sample(id: &str, position: Position) -> Self {
        Player {
            id: id.to_string(),
            name: format!("Player {id}"),
            position,
            price: 5_000_000,
            market_value: 5_000_000,
            points: 10.0,
            average_points: 25.0,
            healthy: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Player position — the closed set of roles a squad is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
}

impl Position {
    /// All positions (useful for iteration).
    pub const ALL: &'static [Position] = &[
        Position::Goalkeeper,
        Position::Defender,
        Position::Midfielder,
        Position::Forward,
    ];

    /// Short display code used in logs and stored records.
    pub fn code(&self) -> &'static str {
        match self {
            Position::Goalkeeper => "GK",
            Position::Defender => "DEF",
            Position::Midfielder => "MID",
            Position::Forward => "FWD",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for Position {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "goalkeeper" | "gk" => Ok(Position::Goalkeeper),
            "defender" | "def" => Ok(Position::Defender),
            "midfielder" | "mid" => Ok(Position::Midfielder),
            "forward" | "fwd" => Ok(Position::Forward),
            _ => Err(anyhow::anyhow!("Unknown position: {s}")),
        }
    }
}

/// Market-value trend direction at the time of a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trend {
    Rising,
    Falling,
    Stable,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Rising => write!(f, "rising"),
            Trend::Falling => write!(f, "falling"),
            Trend::Stable => write!(f, "stable"),
        }
    }
}

impl std::str::FromStr for Trend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rising" => Ok(Trend::Rising),
            "falling" => Ok(Trend::Falling),
            "stable" => Ok(Trend::Stable),
            _ => Err(anyhow::anyhow!("Unknown trend: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Trade types
// ---------------------------------------------------------------------------

/// A proposed N-for-M trade with computed cost and benefit.
///
/// Acquisition happens before disposal, so `required_budget` is the full
/// `total_cost` — sale proceeds are not available when bids are placed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeCandidate {
    pub players_out: Vec<Player>,
    pub players_in: Vec<Player>,
    /// Change in best-lineup total average points.
    pub improvement_points: f64,
    /// Change in best-lineup total quality score.
    pub improvement_quality: f64,
    /// Sum of recommended bids for `players_in`.
    pub total_cost: i64,
    /// Sum of current market values of `players_out`.
    pub total_proceeds: i64,
    /// `total_cost - total_proceeds`; negative means the trade frees money.
    pub net_cost: i64,
    pub required_budget: i64,
    /// Recommended bid per incoming player id.
    pub bids: HashMap<String, i64>,
    /// Human-readable shape, e.g. "2-for-1".
    pub label: String,
}

impl fmt::Display for TradeCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let out: Vec<&str> = self.players_out.iter().map(|p| p.name.as_str()).collect();
        let inn: Vec<&str> = self.players_in.iter().map(|p| p.name.as_str()).collect();
        write!(
            f,
            "{} | out: [{}] in: [{}] | +{:.1}pts +{:.1}q | cost €{} net €{}",
            self.label,
            out.join(", "),
            inn.join(", "),
            self.improvement_points,
            self.improvement_quality,
            self.total_cost,
            self.net_cost,
        )
    }
}

/// A concrete, bounded offer for one target player.
///
/// `recommended_bid == 0` signals "do not bid" — a valid terminal result,
/// not an error. The bid never exceeds `max_profitable_bid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidRecommendation {
    pub asking_price: i64,
    pub recommended_bid: i64,
    pub overbid_amount: i64,
    pub overbid_pct: f64,
    /// The value ceiling — the price beyond which the buy is unprofitable.
    pub max_profitable_bid: i64,
    /// True when the clamp to the value ceiling actually reduced the bid.
    pub ceiling_applied: bool,
    pub reasoning: String,
}

impl BidRecommendation {
    /// Whether this recommendation says to place a bid at all.
    pub fn should_bid(&self) -> bool {
        self.recommended_bid > 0
    }
}

impl fmt::Display for BidRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.should_bid() {
            write!(
                f,
                "bid €{} on ask €{} (+{:.1}%, ceiling €{}) — {}",
                self.recommended_bid,
                self.asking_price,
                self.overbid_pct,
                self.max_profitable_bid,
                self.reasoning,
            )
        } else {
            write!(f, "no bid on ask €{} — {}", self.asking_price, self.reasoning)
        }
    }
}

// ---------------------------------------------------------------------------
// Historical outcomes
// ---------------------------------------------------------------------------

/// Append-only record of one auction we bid in.
///
/// Created at bid placement (outcome unknown) or at resolution; winner
/// fields are backfilled once known, nothing else is ever updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionOutcome {
    pub player_id: String,
    pub player_name: String,
    pub our_bid: i64,
    pub asking_price: i64,
    pub our_overbid_pct: f64,
    pub won: bool,
    pub winning_bid: Option<i64>,
    pub winning_overbid_pct: Option<f64>,
    pub winner_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub quality_score: Option<f64>,
    pub market_value: Option<i64>,
}

/// Append-only record of a completed buy→sell cycle, created at sale time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlipOutcome {
    pub player_id: String,
    pub player_name: String,
    pub buy_price: i64,
    pub sell_price: i64,
    pub profit: i64,
    pub profit_pct: f64,
    pub hold_days: i64,
    pub buy_date: DateTime<Utc>,
    pub sell_date: DateTime<Utc>,
    /// Trend at purchase time, when the trend service had data.
    pub trend_at_buy: Option<Trend>,
    pub average_points: Option<f64>,
    pub position: Option<Position>,
    pub was_injured: bool,
}

// ---------------------------------------------------------------------------
// Session snapshot
// ---------------------------------------------------------------------------

/// Everything a trading session consumes, pre-fetched by the external
/// driver and passed in as plain values. The core performs no network I/O.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub squad: Vec<Player>,
    pub market: Vec<Player>,
    pub budget: i64,
    /// Injected quality oracle: player id → score in [0, 100].
    pub quality_scores: HashMap<String, f64>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for GAFFER.
#[derive(Debug, thiserror::Error)]
pub enum GafferError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid search bounds: {0}")]
    SearchBounds(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
