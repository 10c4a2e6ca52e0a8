//! Trade search engine.
//!
//! Enumerates bounded N-for-M trades over the current squad and an
//! affordable slice of the market, prices every incoming player through the
//! bid pricing engine, and ranks the survivors by lineup improvement.
//!
//! The enumeration is combinatorial: C(starters, n_out) × C(market, m_in)
//! per shape, summed over all shapes up to the configured maxima. Unbounded
//! maxima are a correctness hazard, not just a performance one, so the
//! config enforces a hard bound of 3 per side.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::learner::OverbidSource;
use crate::pricing::{BidPricer, BidRequest};
use crate::roster::{self, SquadRules};
use crate::types::{BidRecommendation, GafferError, Player, SessionSnapshot, TradeCandidate};

/// Hard bound on players per trade side.
pub const MAX_TRADE_SIDE: usize = 3;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Ranking weights for candidate ordering.
#[derive(Debug, Clone)]
pub struct RankingWeights {
    /// Divisor applied to the quality delta before adding it to the points
    /// delta.
    pub quality_divisor: f64,
    /// Stepped bonus by average points of incoming players, as
    /// `(threshold, bonus)` pairs in ascending threshold order.
    pub starter_bonus: Vec<(f64, f64)>,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            quality_divisor: 10.0,
            starter_bonus: vec![(20.0, 0.5), (30.0, 1.0), (40.0, 1.5), (50.0, 2.0)],
        }
    }
}

impl RankingWeights {
    /// Bonus for the highest threshold strictly exceeded by `avg_points`.
    fn bonus_for(&self, avg_points: f64) -> f64 {
        self.starter_bonus
            .iter()
            .rev()
            .find(|(threshold, _)| avg_points > *threshold)
            .map(|(_, bonus)| *bonus)
            .unwrap_or(0.0)
    }
}

/// Trade search configuration.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub max_players_out: usize,
    pub max_players_in: usize,
    /// A candidate must clear at least one of the two improvement minimums.
    pub min_improvement_points: f64,
    pub min_improvement_quality: f64,
    /// Conservative confidence used when pricing multi-player trades.
    pub trade_confidence: f64,
    pub ranking: RankingWeights,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_players_out: 3,
            max_players_in: 3,
            min_improvement_points: 2.0,
            min_improvement_quality: 10.0,
            trade_confidence: 0.8,
            ranking: RankingWeights::default(),
        }
    }
}

impl SearchConfig {
    /// Reject configurations whose combination counts would explode.
    pub fn validate(&self) -> Result<(), GafferError> {
        if self.max_players_out > MAX_TRADE_SIDE {
            return Err(GafferError::SearchBounds(format!(
                "max_players_out = {} exceeds {MAX_TRADE_SIDE}",
                self.max_players_out
            )));
        }
        if self.max_players_in > MAX_TRADE_SIDE {
            return Err(GafferError::SearchBounds(format!(
                "max_players_in = {} exceeds {MAX_TRADE_SIDE}",
                self.max_players_in
            )));
        }
        if self.max_players_in < 1 {
            return Err(GafferError::SearchBounds(
                "max_players_in must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

pub struct TradeSearch {
    config: SearchConfig,
    rules: SquadRules,
    pricer: BidPricer,
}

impl TradeSearch {
    pub fn new(
        config: SearchConfig,
        rules: SquadRules,
        pricer: BidPricer,
    ) -> Result<Self, GafferError> {
        config.validate()?;
        Ok(Self {
            config,
            rules,
            pricer,
        })
    }

    /// Enumerate, evaluate, and rank viable trades for one session snapshot.
    ///
    /// Always returns a ranked (possibly empty) list; rejections are silent
    /// absences logged at debug level. A failing `overbids` source degrades
    /// to rule-based pricing, never to a search failure.
    pub fn find_trades(
        &self,
        snapshot: &SessionSnapshot,
        overbids: Option<&dyn OverbidSource>,
    ) -> Vec<TradeCandidate> {
        let current_eleven =
            roster::select_best_lineup(&snapshot.squad, &snapshot.quality_scores, &self.rules);
        let (current_points, current_quality) =
            lineup_strength(&current_eleven, &snapshot.quality_scores);

        let affordable: Vec<&Player> = snapshot
            .market
            .iter()
            .filter(|p| p.price <= snapshot.budget)
            .collect();
        debug!(
            market = snapshot.market.len(),
            affordable = affordable.len(),
            budget = snapshot.budget,
            "Market pre-filtered to affordable players"
        );

        let eleven_refs: Vec<&Player> = current_eleven.iter().collect();
        let mut bid_cache: HashMap<String, BidRecommendation> = HashMap::new();
        let mut candidates = Vec::new();

        for n_out in 0..=self.config.max_players_out {
            if n_out > snapshot.squad.len() {
                break;
            }
            for m_in in 1..=self.config.max_players_in {
                let size_after = snapshot.squad.len() - n_out + m_in;
                if size_after > self.rules.max_squad_size {
                    debug!(n_out, m_in, size_after, "Shape skipped: max squad size");
                    continue;
                }

                // Only starters are candidates for removal.
                let out_sets = if n_out == 0 {
                    vec![Vec::new()]
                } else {
                    combinations(&eleven_refs, n_out)
                };
                let in_sets = combinations(&affordable, m_in);

                for outs in &out_sets {
                    for ins in &in_sets {
                        if let Some(candidate) = self.evaluate(
                            snapshot,
                            outs,
                            ins,
                            current_points,
                            current_quality,
                            &mut bid_cache,
                            overbids,
                        ) {
                            candidates.push(candidate);
                        }
                    }
                }
            }
        }

        let ranked = self.rank(candidates);
        info!(
            candidates = ranked.len(),
            starters = eleven_refs.len(),
            "Trade search complete"
        );
        ranked
    }

    #[allow(clippy::too_many_arguments)]
    fn evaluate(
        &self,
        snapshot: &SessionSnapshot,
        outs: &[&Player],
        ins: &[&Player],
        current_points: f64,
        current_quality: f64,
        bid_cache: &mut HashMap<String, BidRecommendation>,
        overbids: Option<&dyn OverbidSource>,
    ) -> Option<TradeCandidate> {
        // Price every incoming player; one unbiddable player sinks the
        // whole candidate.
        let mut bids = HashMap::new();
        let mut total_cost = 0i64;
        for &player in ins {
            let rec = bid_cache
                .entry(player.id.clone())
                .or_insert_with(|| self.price_player(player, snapshot, overbids));
            if !rec.should_bid() {
                debug!(player = %player.name, "Candidate rejected: incoming player unbiddable");
                return None;
            }
            bids.insert(player.id.clone(), rec.recommended_bid);
            total_cost += rec.recommended_bid;
        }

        // Acquisition precedes disposal, so the full cost is needed upfront.
        let required_budget = total_cost;
        if required_budget > snapshot.budget {
            debug!(
                required = required_budget,
                budget = snapshot.budget,
                "Candidate rejected: over budget"
            );
            return None;
        }

        let players_out: Vec<Player> = outs.iter().map(|p| (*p).clone()).collect();
        let players_in: Vec<Player> = ins.iter().map(|p| (*p).clone()).collect();

        let validation =
            roster::validate_trade(&snapshot.squad, &players_out, &players_in, &self.rules);
        if !validation.valid {
            debug!(reason = ?validation.reason, "Candidate rejected: invalid trade");
            return None;
        }

        // Simulate the post-trade squad and re-pick the best lineup.
        let out_ids: std::collections::HashSet<&str> =
            players_out.iter().map(|p| p.id.as_str()).collect();
        let mut new_squad: Vec<Player> = snapshot
            .squad
            .iter()
            .filter(|p| !out_ids.contains(p.id.as_str()))
            .cloned()
            .collect();
        new_squad.extend(players_in.iter().cloned());

        let new_eleven =
            roster::select_best_lineup(&new_squad, &snapshot.quality_scores, &self.rules);
        let (new_points, new_quality) = lineup_strength(&new_eleven, &snapshot.quality_scores);

        let improvement_points = new_points - current_points;
        let improvement_quality = new_quality - current_quality;
        if improvement_points < self.config.min_improvement_points
            && improvement_quality < self.config.min_improvement_quality
        {
            debug!(
                points = format!("{improvement_points:+.1}"),
                quality = format!("{improvement_quality:+.1}"),
                "Candidate rejected: below improvement thresholds"
            );
            return None;
        }

        let total_proceeds: i64 = players_out.iter().map(|p| p.market_value).sum();
        let label = format!("{}-for-{}", players_out.len(), players_in.len());

        Some(TradeCandidate {
            players_out,
            players_in,
            improvement_points,
            improvement_quality,
            total_cost,
            total_proceeds,
            net_cost: total_cost - total_proceeds,
            required_budget,
            bids,
            label,
        })
    }

    fn price_player(
        &self,
        player: &Player,
        snapshot: &SessionSnapshot,
        overbids: Option<&dyn OverbidSource>,
    ) -> BidRecommendation {
        let quality = snapshot
            .quality_scores
            .get(&player.id)
            .copied()
            .unwrap_or(0.0);

        let learned = overbids.and_then(|source| {
            match source.recommended_overbid(player.price, quality, player.market_value, None) {
                Ok(rec) => Some(rec),
                Err(e) => {
                    warn!(
                        player = %player.name,
                        error = %e,
                        "Overbid source failed — falling back to rule-based pricing"
                    );
                    None
                }
            }
        });

        let req = BidRequest {
            asking_price: player.price,
            market_value: player.market_value,
            quality_score: quality,
            confidence: self.config.trade_confidence,
            learned: learned.as_ref(),
            ..Default::default()
        };
        self.pricer.price(&req)
    }

    /// Sort descending by score; ties go to the cheaper trade.
    fn rank(&self, candidates: Vec<TradeCandidate>) -> Vec<TradeCandidate> {
        let mut scored: Vec<(f64, TradeCandidate)> = candidates
            .into_iter()
            .map(|c| (self.score(&c), c))
            .collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.net_cost.cmp(&b.1.net_cost))
        });
        scored.into_iter().map(|(_, c)| c).collect()
    }

    fn score(&self, candidate: &TradeCandidate) -> f64 {
        let mut score = candidate.improvement_points
            + candidate.improvement_quality / self.config.ranking.quality_divisor;
        if !candidate.players_in.is_empty() {
            let avg_points = candidate
                .players_in
                .iter()
                .map(|p| p.average_points)
                .sum::<f64>()
                / candidate.players_in.len() as f64;
            score += self.config.ranking.bonus_for(avg_points);
        }
        score
    }
}

fn lineup_strength(lineup: &[Player], quality_scores: &HashMap<String, f64>) -> (f64, f64) {
    let points = lineup.iter().map(|p| p.average_points).sum();
    let quality = lineup
        .iter()
        .map(|p| quality_scores.get(&p.id).copied().unwrap_or(0.0))
        .sum();
    (points, quality)
}

/// All size-`k` combinations of `items`, in input order.
fn combinations<'a, T>(items: &[&'a T], k: usize) -> Vec<Vec<&'a T>> {
    fn recurse<'a, T>(
        items: &[&'a T],
        k: usize,
        start: usize,
        current: &mut Vec<&'a T>,
        out: &mut Vec<Vec<&'a T>>,
    ) {
        if current.len() == k {
            out.push(current.clone());
            return;
        }
        let needed = k - current.len();
        for i in start..=items.len().saturating_sub(needed) {
            current.push(items[i]);
            recurse(items, k, i + 1, current, out);
            current.pop();
        }
    }

    if k == 0 {
        return vec![Vec::new()];
    }
    if k > items.len() {
        return Vec::new();
    }
    let mut out = Vec::new();
    recurse(items, k, 0, &mut Vec::with_capacity(k), &mut out);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
