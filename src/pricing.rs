//! Bid pricing engine.
//!
//! Converts "I want this player" into a concrete, bounded monetary offer:
//! a rule-based (or learned) overbid percentage, rounded to a realistic
//! increment and clamped to the value ceiling. The engine never talks to
//! the outcome learner directly — a learned recommendation, when one
//! exists, arrives as a plain value inside the request.

use tracing::debug;

use crate::learner::OverbidRecommendation;
use crate::types::BidRecommendation;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Bid pricing configuration.
#[derive(Debug, Clone)]
pub struct BidConfig {
    /// Base overbid percentage applied to every bid.
    pub default_overbid_pct: f64,
    /// Cap on the rule-based overbid percentage.
    pub max_overbid_pct: f64,
    /// Quality score at or above which a player is a high-value target.
    pub high_value_threshold: f64,
    /// Bonus for high-value targets.
    pub high_value_bonus: f64,
    /// Bonus at confidence ≥ 0.9.
    pub confidence_bonus_high: f64,
    /// Bonus at confidence ≥ 0.7.
    pub confidence_bonus_mid: f64,
    /// Bonus when the buy replaces a player being sold.
    pub replacement_bonus: f64,
    /// Smallest bid increment in euros.
    pub min_bid_increment: i64,
}

impl Default for BidConfig {
    fn default() -> Self {
        Self {
            default_overbid_pct: 5.0,
            max_overbid_pct: 15.0,
            high_value_threshold: 70.0,
            high_value_bonus: 5.0,
            confidence_bonus_high: 3.0,
            confidence_bonus_mid: 1.5,
            replacement_bonus: 2.0,
            min_bid_increment: 1_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Valuation
// ---------------------------------------------------------------------------

/// Estimates the value ceiling for a player: the price beyond which an
/// acquisition is assumed unprofitable. Pluggable so the growth assumption
/// can be replaced without touching the pricing rules.
pub trait ValuationModel: Send + Sync {
    fn ceiling(&self, market_value: i64, quality_score: f64) -> i64;
}

/// Default valuation: monotone bounded growth in quality.
/// A quality score of 60 implies 6% expected appreciation.
pub struct GrowthModel;

impl ValuationModel for GrowthModel {
    fn ceiling(&self, market_value: i64, quality_score: f64) -> i64 {
        (market_value as f64 * (1.0 + quality_score / 1000.0)) as i64
    }
}

// ---------------------------------------------------------------------------
// Bid pricer
// ---------------------------------------------------------------------------

/// Inputs for a single bid computation. All values are pre-validated by
/// the caller; a non-positive asking price yields a "skip" result by
/// convention rather than an error.
#[derive(Debug, Clone, Default)]
pub struct BidRequest<'a> {
    pub asking_price: i64,
    pub market_value: i64,
    /// Quality score in [0, 100].
    pub quality_score: f64,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub is_replacement: bool,
    /// Market value freed by selling the player being replaced.
    pub replacement_sell_value: i64,
    /// Externally supplied value ceiling; derived from the valuation model
    /// when absent.
    pub predicted_future_value: Option<i64>,
    /// Learned overbid recommendation, if the outcome learner produced one.
    pub learned: Option<&'a OverbidRecommendation>,
}

pub struct BidPricer {
    config: BidConfig,
    valuation: Box<dyn ValuationModel>,
}

impl BidPricer {
    pub fn new(config: BidConfig) -> Self {
        Self {
            config,
            valuation: Box::new(GrowthModel),
        }
    }

    /// Replace the default valuation model.
    pub fn with_valuation(mut self, valuation: Box<dyn ValuationModel>) -> Self {
        self.valuation = valuation;
        self
    }

    /// Access the pricing configuration.
    pub fn config(&self) -> &BidConfig {
        &self.config
    }

    /// Compute a bounded offer for one target player.
    ///
    /// Invariant: `recommended_bid` never exceeds `max_profitable_bid`.
    /// When the ceiling sits at or below the asking price the result is
    /// "do not bid" (bid = 0) — a valid outcome, not an error.
    pub fn price(&self, req: &BidRequest<'_>) -> BidRecommendation {
        if req.asking_price <= 0 {
            return BidRecommendation {
                asking_price: req.asking_price,
                recommended_bid: 0,
                overbid_amount: 0,
                overbid_pct: 0.0,
                max_profitable_bid: 0,
                ceiling_applied: false,
                reasoning: "invalid asking price — skip".to_string(),
            };
        }

        let ceiling = req
            .predicted_future_value
            .unwrap_or_else(|| self.valuation.ceiling(req.market_value, req.quality_score));

        // Replacement buys may additionally spend up to 1.5× the value the
        // sale frees, but the value ceiling still binds.
        let max_profitable_bid = if req.is_replacement && req.replacement_sell_value > 0 {
            ceiling.min(req.replacement_sell_value + req.replacement_sell_value / 2)
        } else {
            ceiling
        };

        if max_profitable_bid <= req.asking_price {
            debug!(
                asking = req.asking_price,
                ceiling = max_profitable_bid,
                "Value ceiling at or below asking price — no bid"
            );
            return BidRecommendation {
                asking_price: req.asking_price,
                recommended_bid: 0,
                overbid_amount: 0,
                overbid_pct: 0.0,
                max_profitable_bid,
                ceiling_applied: true,
                reasoning: "value ceiling at or below asking price — do not bid".to_string(),
            };
        }

        // Learned percentage wins when present and positive; a learned zero
        // means the learner already decided to skip, so the rule-based path
        // (which the ceiling clamp bounds the same way) takes over.
        let learned_pct = req.learned.map(|l| l.pct).filter(|&p| p > 0.0);
        let overbid_pct = learned_pct.unwrap_or_else(|| self.rule_based_pct(req));

        let raw_overbid = (req.asking_price as f64 * overbid_pct / 100.0) as i64;
        let mut overbid_amount = self.round_to_increment(raw_overbid);
        let mut recommended_bid = req.asking_price + overbid_amount;

        let ceiling_applied = recommended_bid > max_profitable_bid;
        if ceiling_applied {
            recommended_bid = max_profitable_bid;
            overbid_amount = recommended_bid - req.asking_price;
        }

        if recommended_bid < req.asking_price {
            recommended_bid = 0;
            overbid_amount = 0;
        }

        let actual_pct = if recommended_bid > 0 {
            overbid_amount as f64 / req.asking_price as f64 * 100.0
        } else {
            0.0
        };

        let reasoning = self.build_reasoning(req, actual_pct, ceiling_applied);

        debug!(
            asking = req.asking_price,
            bid = recommended_bid,
            pct = format!("{actual_pct:.1}%"),
            ceiling = max_profitable_bid,
            ceiling_applied,
            "Bid priced"
        );

        BidRecommendation {
            asking_price: req.asking_price,
            recommended_bid,
            overbid_amount,
            overbid_pct: actual_pct,
            max_profitable_bid,
            ceiling_applied,
            reasoning,
        }
    }

    /// Rule-based overbid percentage: base plus quality, confidence and
    /// replacement bonuses, capped at the configured maximum.
    fn rule_based_pct(&self, req: &BidRequest<'_>) -> f64 {
        let mut pct = self.config.default_overbid_pct;

        if req.quality_score >= self.config.high_value_threshold {
            pct += self.config.high_value_bonus;
        }

        if req.confidence >= 0.9 {
            pct += self.config.confidence_bonus_high;
        } else if req.confidence >= 0.7 {
            pct += self.config.confidence_bonus_mid;
        }

        if req.is_replacement {
            pct += self.config.replacement_bonus;
        }

        pct.min(self.config.max_overbid_pct)
    }

    /// Round to a realistic bid increment: the configured minimum below
    /// €10k, €5k below €100k, €10k above.
    fn round_to_increment(&self, amount: i64) -> i64 {
        let step = if amount < 10_000 {
            self.config.min_bid_increment
        } else if amount < 100_000 {
            5_000
        } else {
            10_000
        };
        (amount + step / 2) / step * step
    }

    fn build_reasoning(&self, req: &BidRequest<'_>, pct: f64, ceiling_applied: bool) -> String {
        let mut reasons: Vec<String> = Vec::new();

        if let Some(learned) = req.learned.filter(|l| l.pct > 0.0) {
            reasons.push(format!("learned: {}", learned.reason));
        }

        if req.quality_score >= 90.0 {
            reasons.push("exceptional value".to_string());
        } else if req.quality_score >= self.config.high_value_threshold {
            reasons.push("high value".to_string());
        } else if req.quality_score >= 50.0 {
            reasons.push("good value".to_string());
        }

        if req.confidence >= 0.9 {
            reasons.push("very confident".to_string());
        } else if req.confidence >= 0.7 {
            reasons.push("confident".to_string());
        }

        if req.is_replacement {
            reasons.push("upgrade replacement".to_string());
        }

        if pct >= 10.0 {
            reasons.push(format!("aggressive +{pct:.1}% overbid"));
        } else if pct >= 5.0 {
            reasons.push(format!("competitive +{pct:.1}% overbid"));
        } else if pct > 0.0 {
            reasons.push(format!("modest +{pct:.1}% overbid"));
        }

        if ceiling_applied {
            reasons.push("at value ceiling".to_string());
        }

        if reasons.is_empty() {
            "standard bid".to_string()
        } else {
            reasons.join(" | ")
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
