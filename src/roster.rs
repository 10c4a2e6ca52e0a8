//! Roster and formation validation.
//!
//! Pure functions over a list of players: squad-composition checks,
//! best-lineup selection, and N-for-M trade simulation. No side effects;
//! fully deterministic given inputs.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::types::{Player, Position};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Squad-composition rules. Defaults match the Bundesliga fantasy ruleset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SquadRules {
    pub min_goalkeepers: usize,
    pub min_defenders: usize,
    pub min_midfielders: usize,
    pub min_forwards: usize,
    pub min_squad_size: usize,
    pub max_squad_size: usize,
    pub lineup_size: usize,
}

impl Default for SquadRules {
    fn default() -> Self {
        Self {
            min_goalkeepers: 1,
            min_defenders: 3,
            min_midfielders: 2,
            min_forwards: 1,
            min_squad_size: 11,
            max_squad_size: 15,
            lineup_size: 11,
        }
    }
}

impl SquadRules {
    /// Configured minimum for a position.
    pub fn min_for(&self, position: Position) -> usize {
        match position {
            Position::Goalkeeper => self.min_goalkeepers,
            Position::Defender => self.min_defenders,
            Position::Midfielder => self.min_midfielders,
            Position::Forward => self.min_forwards,
        }
    }
}

// ---------------------------------------------------------------------------
// Position counts
// ---------------------------------------------------------------------------

/// Per-position player counts for a squad.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionCounts {
    pub goalkeepers: usize,
    pub defenders: usize,
    pub midfielders: usize,
    pub forwards: usize,
}

impl PositionCounts {
    pub fn count(players: &[Player]) -> Self {
        let mut counts = Self::default();
        for player in players {
            *counts.get_mut(player.position) += 1;
        }
        counts
    }

    pub fn get(&self, position: Position) -> usize {
        match position {
            Position::Goalkeeper => self.goalkeepers,
            Position::Defender => self.defenders,
            Position::Midfielder => self.midfielders,
            Position::Forward => self.forwards,
        }
    }

    fn get_mut(&mut self, position: Position) -> &mut usize {
        match position {
            Position::Goalkeeper => &mut self.goalkeepers,
            Position::Defender => &mut self.defenders,
            Position::Midfielder => &mut self.midfielders,
            Position::Forward => &mut self.forwards,
        }
    }

    pub fn total(&self) -> usize {
        self.goalkeepers + self.defenders + self.midfielders + self.forwards
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Result of a squad-composition check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterValidation {
    pub valid: bool,
    pub issues: Vec<String>,
    pub counts: PositionCounts,
    pub total: usize,
    /// True iff the squad is valid and large enough for a full lineup.
    pub can_field_lineup: bool,
}

/// Check a squad against the composition rules.
pub fn validate(squad: &[Player], rules: &SquadRules) -> RosterValidation {
    let counts = PositionCounts::count(squad);
    let total = counts.total();
    let mut issues = Vec::new();

    for &position in Position::ALL {
        let min = rules.min_for(position);
        let have = counts.get(position);
        if have < min {
            issues.push(format!("Need {min} {position}, have {have}"));
        }
    }

    if total < rules.min_squad_size {
        issues.push(format!("Squad too small: {total}/{}", rules.min_squad_size));
    }
    if total > rules.max_squad_size {
        issues.push(format!("Squad too large: {total}/{}", rules.max_squad_size));
    }

    let valid = issues.is_empty();
    RosterValidation {
        valid,
        can_field_lineup: valid && total >= rules.lineup_size,
        issues,
        counts,
        total,
    }
}

// ---------------------------------------------------------------------------
// Lineup selection
// ---------------------------------------------------------------------------

/// Select the best starting lineup from a squad by quality score.
///
/// Two-phase greedy: sort by quality descending (stable, so first-seen wins
/// on ties), admit players into position buckets until each position's
/// minimum is met, then fill the remaining spots with the best players left
/// regardless of position. Guarantees feasibility (minimums met) but is a
/// heuristic, not an exact quality optimum.
///
/// Returns fewer than `lineup_size` players only when the squad itself is
/// smaller.
pub fn select_best_lineup(
    squad: &[Player],
    quality_scores: &HashMap<String, f64>,
    rules: &SquadRules,
) -> Vec<Player> {
    let score = |p: &Player| quality_scores.get(&p.id).copied().unwrap_or(0.0);

    let mut sorted: Vec<&Player> = squad.iter().collect();
    // sort_by is stable: equal scores keep input order.
    sorted.sort_by(|a, b| {
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut selected: Vec<&Player> = Vec::with_capacity(rules.lineup_size);
    let mut counts = PositionCounts::default();

    // Phase 1: meet position minimums in quality order.
    for player in &sorted {
        if selected.len() >= rules.lineup_size {
            break;
        }
        if counts.get(player.position) < rules.min_for(player.position) {
            selected.push(player);
            *counts.get_mut(player.position) += 1;
        }
    }

    // Phase 2: fill with best remaining players regardless of position.
    if selected.len() < rules.lineup_size {
        let chosen: HashSet<&str> = selected.iter().map(|p| p.id.as_str()).collect();
        for player in &sorted {
            if selected.len() >= rules.lineup_size {
                break;
            }
            if !chosen.contains(player.id.as_str()) {
                selected.push(player);
            }
        }
    }

    selected.truncate(rules.lineup_size);
    selected.into_iter().cloned().collect()
}

// ---------------------------------------------------------------------------
// Trade validation
// ---------------------------------------------------------------------------

/// Result of simulating an N-for-M trade against the squad rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeValidation {
    pub valid: bool,
    /// Names the violated constraint when invalid.
    pub reason: Option<String>,
    pub squad_size_after: usize,
    pub counts_after: Option<PositionCounts>,
}

/// Simulate removing `players_out` and adding `players_in`, then validate
/// the resulting squad. Fails closed: any violation rejects the whole trade.
pub fn validate_trade(
    squad: &[Player],
    players_out: &[Player],
    players_in: &[Player],
    rules: &SquadRules,
) -> TradeValidation {
    let out_ids: HashSet<&str> = players_out.iter().map(|p| p.id.as_str()).collect();
    let mut after: Vec<Player> = squad
        .iter()
        .filter(|p| !out_ids.contains(p.id.as_str()))
        .cloned()
        .collect();
    after.extend(players_in.iter().cloned());

    if after.len() > rules.max_squad_size {
        debug!(
            size_after = after.len(),
            max = rules.max_squad_size,
            "Trade rejected: max squad size"
        );
        return TradeValidation {
            valid: false,
            reason: Some(format!(
                "Would exceed max squad size: {}/{}",
                after.len(),
                rules.max_squad_size
            )),
            squad_size_after: after.len(),
            counts_after: None,
        };
    }

    let validation = validate(&after, rules);
    if !validation.valid {
        debug!(issues = ?validation.issues, "Trade rejected: formation");
        return TradeValidation {
            valid: false,
            reason: Some(format!(
                "Would break formation: {}",
                validation.issues.join(", ")
            )),
            squad_size_after: validation.total,
            counts_after: Some(validation.counts),
        };
    }

    TradeValidation {
        valid: true,
        reason: None,
        squad_size_after: validation.total,
        counts_after: Some(validation.counts),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Position::*;

    // ---- helpers -----------------------------------------------------------

    /// A minimal legal squad: 1 GK, 4 DEF, 4 MID, 2 FWD = 11.
    fn legal_squad() -> Vec<Player> {
        let mut squad = Vec::new();
        squad.push(Player::sample("gk1", Goalkeeper));
        for i in 0..4 {
            squad.push(Player::sample(&format!("def{i}"), Defender));
        }
        for i in 0..4 {
            squad.push(Player::sample(&format!("mid{i}"), Midfielder));
        }
        for i in 0..2 {
            squad.push(Player::sample(&format!("fwd{i}"), Forward));
        }
        squad
    }

    fn quality_map(squad: &[Player], base: f64) -> HashMap<String, f64> {
        squad
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), base + i as f64))
            .collect()
    }

    // ---- validate ----------------------------------------------------------

    #[test]
    fn test_validate_legal_squad() {
        let squad = legal_squad();
        let result = validate(&squad, &SquadRules::default());
        assert!(result.valid);
        assert!(result.issues.is_empty());
        assert!(result.can_field_lineup);
        assert_eq!(result.total, 11);
        assert_eq!(result.counts.goalkeepers, 1);
        assert_eq!(result.counts.defenders, 4);
    }

    #[test]
    fn test_validate_missing_goalkeeper() {
        let squad: Vec<Player> = legal_squad()
            .into_iter()
            .filter(|p| p.position != Goalkeeper)
            .collect();
        let result = validate(&squad, &SquadRules::default());
        assert!(!result.valid);
        assert!(result.issues.iter().any(|i| i.contains("GK")));
        assert!(!result.can_field_lineup);
    }

    #[test]
    fn test_validate_squad_too_small() {
        let squad = vec![
            Player::sample("gk1", Goalkeeper),
            Player::sample("def1", Defender),
            Player::sample("def2", Defender),
            Player::sample("def3", Defender),
            Player::sample("mid1", Midfielder),
            Player::sample("mid2", Midfielder),
            Player::sample("fwd1", Forward),
        ];
        let result = validate(&squad, &SquadRules::default());
        assert!(!result.valid);
        assert!(result.issues.iter().any(|i| i.contains("too small")));
    }

    #[test]
    fn test_validate_squad_too_large() {
        let mut squad = legal_squad();
        for i in 0..5 {
            squad.push(Player::sample(&format!("extra{i}"), Midfielder));
        }
        // 16 players, max 15
        let result = validate(&squad, &SquadRules::default());
        assert!(!result.valid);
        assert!(result.issues.iter().any(|i| i.contains("too large")));
    }

    #[test]
    fn test_validate_is_idempotent() {
        let squad = legal_squad();
        let rules = SquadRules::default();
        let first = validate(&squad, &rules);
        let second = validate(&squad, &rules);
        assert_eq!(first.valid, second.valid);
        assert_eq!(first.issues, second.issues);
        assert_eq!(first.counts, second.counts);
        assert_eq!(first.can_field_lineup, second.can_field_lineup);
    }

    // ---- select_best_lineup ------------------------------------------------

    #[test]
    fn test_lineup_exactly_eleven() {
        let mut squad = legal_squad();
        for i in 0..4 {
            squad.push(Player::sample(&format!("bench{i}"), Midfielder));
        }
        let quality = quality_map(&squad, 10.0);
        let lineup = select_best_lineup(&squad, &quality, &SquadRules::default());
        assert_eq!(lineup.len(), 11);
    }

    #[test]
    fn test_lineup_meets_position_minimums() {
        // 2 GK, 5 DEF, 5 MID, 3 FWD = 15. Give goalkeepers the worst scores
        // so only the minimum-driven phase can pick one.
        let mut squad = Vec::new();
        for i in 0..2 {
            squad.push(Player::sample(&format!("gk{i}"), Goalkeeper));
        }
        for i in 0..5 {
            squad.push(Player::sample(&format!("def{i}"), Defender));
        }
        for i in 0..5 {
            squad.push(Player::sample(&format!("mid{i}"), Midfielder));
        }
        for i in 0..3 {
            squad.push(Player::sample(&format!("fwd{i}"), Forward));
        }
        let mut quality: HashMap<String, f64> = squad
            .iter()
            .map(|p| (p.id.clone(), 50.0))
            .collect();
        quality.insert("gk0".to_string(), 1.0);
        quality.insert("gk1".to_string(), 2.0);

        let rules = SquadRules::default();
        let lineup = select_best_lineup(&squad, &quality, &rules);
        assert_eq!(lineup.len(), 11);
        let counts = PositionCounts::count(&lineup);
        assert!(counts.goalkeepers >= rules.min_goalkeepers);
        assert!(counts.defenders >= rules.min_defenders);
        assert!(counts.midfielders >= rules.min_midfielders);
        assert!(counts.forwards >= rules.min_forwards);
        // The higher-scoring keeper gets the spot.
        assert!(lineup.iter().any(|p| p.id == "gk1"));
    }

    #[test]
    fn test_lineup_prefers_high_quality_fill() {
        let mut squad = legal_squad();
        squad.push(Player::sample("star", Forward));
        squad.push(Player::sample("scrub", Forward));
        let mut quality = quality_map(&squad, 20.0);
        quality.insert("star".to_string(), 99.0);
        quality.insert("scrub".to_string(), 1.0);

        let lineup = select_best_lineup(&squad, &quality, &SquadRules::default());
        assert!(lineup.iter().any(|p| p.id == "star"));
        assert!(!lineup.iter().any(|p| p.id == "scrub"));
    }

    #[test]
    fn test_lineup_tie_break_is_first_seen() {
        // All equal scores: lineup should be the first 11 in input order,
        // modulo the minimum-meeting phase (which also scans in order).
        let mut squad = legal_squad();
        squad.push(Player::sample("late1", Midfielder));
        squad.push(Player::sample("late2", Midfielder));
        let quality: HashMap<String, f64> =
            squad.iter().map(|p| (p.id.clone(), 42.0)).collect();

        let lineup = select_best_lineup(&squad, &quality, &SquadRules::default());
        assert_eq!(lineup.len(), 11);
        assert!(!lineup.iter().any(|p| p.id.starts_with("late")));
    }

    #[test]
    fn test_lineup_short_squad_returns_all() {
        let squad = vec![
            Player::sample("gk1", Goalkeeper),
            Player::sample("def1", Defender),
            Player::sample("mid1", Midfielder),
        ];
        let quality = quality_map(&squad, 30.0);
        let lineup = select_best_lineup(&squad, &quality, &SquadRules::default());
        assert_eq!(lineup.len(), 3);
    }

    #[test]
    fn test_lineup_unknown_quality_defaults_to_zero() {
        let squad = legal_squad();
        // Empty quality map: selection still returns a full, feasible lineup.
        let lineup = select_best_lineup(&squad, &HashMap::new(), &SquadRules::default());
        assert_eq!(lineup.len(), 11);
    }

    // ---- validate_trade ----------------------------------------------------

    #[test]
    fn test_trade_valid_swap() {
        let squad = legal_squad();
        let out = vec![squad[5].clone()]; // a midfielder
        let inn = vec![Player::sample("new-mid", Midfielder)];
        let result = validate_trade(&squad, &out, &inn, &SquadRules::default());
        assert!(result.valid);
        assert!(result.reason.is_none());
        assert_eq!(result.squad_size_after, 11);
    }

    #[test]
    fn test_trade_selling_only_goalkeeper_rejected() {
        // Full squad of 15 with exactly one GK; selling them must fail with
        // a reason naming the goalkeeper minimum.
        let mut squad = legal_squad();
        for i in 0..4 {
            squad.push(Player::sample(&format!("extra{i}"), Defender));
        }
        assert_eq!(squad.len(), 15);
        let gk = squad[0].clone();
        let inn = vec![Player::sample("new-fwd", Forward)];
        let result = validate_trade(&squad, &[gk], &inn, &SquadRules::default());
        assert!(!result.valid);
        let reason = result.reason.unwrap();
        assert!(reason.contains("GK"), "reason was: {reason}");
    }

    #[test]
    fn test_trade_exceeding_max_size_rejected() {
        let mut squad = legal_squad();
        for i in 0..4 {
            squad.push(Player::sample(&format!("extra{i}"), Midfielder));
        }
        assert_eq!(squad.len(), 15);
        let inn = vec![Player::sample("one-too-many", Forward)];
        let result = validate_trade(&squad, &[], &inn, &SquadRules::default());
        assert!(!result.valid);
        assert!(result.reason.unwrap().contains("max squad size"));
        assert_eq!(result.squad_size_after, 16);
    }

    #[test]
    fn test_trade_post_counts_respect_minimums() {
        let mut squad = legal_squad();
        squad.push(Player::sample("extra-def", Defender));
        let out = vec![squad[1].clone(), squad[5].clone()];
        let inn = vec![
            Player::sample("in-def", Defender),
            Player::sample("in-mid", Midfielder),
        ];
        let result = validate_trade(&squad, &out, &inn, &SquadRules::default());
        assert!(result.valid);
        let counts = result.counts_after.unwrap();
        let rules = SquadRules::default();
        for &pos in Position::ALL {
            assert!(counts.get(pos) >= rules.min_for(pos));
        }
        assert!(counts.total() <= rules.max_squad_size);
    }

    #[test]
    fn test_trade_buy_only_within_limits() {
        let squad = legal_squad();
        let inn = vec![Player::sample("signing", Forward)];
        let result = validate_trade(&squad, &[], &inn, &SquadRules::default());
        assert!(result.valid);
        assert_eq!(result.squad_size_after, 12);
    }
}
