//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! section and field has a default, so a partial (or absent) file yields a
//! working configuration. Components never read config ambiently; the
//! driver converts sections into the explicit config values the modules
//! take through their constructors.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::pricing::BidConfig;
use crate::roster::SquadRules;
use crate::search::SearchConfig;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub squad: SquadSection,
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub bidding: BiddingSection,
    #[serde(default)]
    pub learner: LearnerSection,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub name: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "GAFFER-001".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SquadSection {
    pub min_goalkeepers: usize,
    pub min_defenders: usize,
    pub min_midfielders: usize,
    pub min_forwards: usize,
    pub min_squad_size: usize,
    pub max_squad_size: usize,
    pub lineup_size: usize,
}

impl Default for SquadSection {
    fn default() -> Self {
        let rules = SquadRules::default();
        Self {
            min_goalkeepers: rules.min_goalkeepers,
            min_defenders: rules.min_defenders,
            min_midfielders: rules.min_midfielders,
            min_forwards: rules.min_forwards,
            min_squad_size: rules.min_squad_size,
            max_squad_size: rules.max_squad_size,
            lineup_size: rules.lineup_size,
        }
    }
}

impl SquadSection {
    pub fn to_rules(&self) -> SquadRules {
        SquadRules {
            min_goalkeepers: self.min_goalkeepers,
            min_defenders: self.min_defenders,
            min_midfielders: self.min_midfielders,
            min_forwards: self.min_forwards,
            min_squad_size: self.min_squad_size,
            max_squad_size: self.max_squad_size,
            lineup_size: self.lineup_size,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchSection {
    pub max_players_out: usize,
    pub max_players_in: usize,
    pub min_improvement_points: f64,
    pub min_improvement_quality: f64,
    pub trade_confidence: f64,
}

impl Default for SearchSection {
    fn default() -> Self {
        let config = SearchConfig::default();
        Self {
            max_players_out: config.max_players_out,
            max_players_in: config.max_players_in,
            min_improvement_points: config.min_improvement_points,
            min_improvement_quality: config.min_improvement_quality,
            trade_confidence: config.trade_confidence,
        }
    }
}

impl SearchSection {
    pub fn to_search_config(&self) -> SearchConfig {
        SearchConfig {
            max_players_out: self.max_players_out,
            max_players_in: self.max_players_in,
            min_improvement_points: self.min_improvement_points,
            min_improvement_quality: self.min_improvement_quality,
            trade_confidence: self.trade_confidence,
            ..SearchConfig::default()
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BiddingSection {
    pub default_overbid_pct: f64,
    pub max_overbid_pct: f64,
    pub high_value_threshold: f64,
    pub min_bid_increment: i64,
}

impl Default for BiddingSection {
    fn default() -> Self {
        let config = BidConfig::default();
        Self {
            default_overbid_pct: config.default_overbid_pct,
            max_overbid_pct: config.max_overbid_pct,
            high_value_threshold: config.high_value_threshold,
            min_bid_increment: config.min_bid_increment,
        }
    }
}

impl BiddingSection {
    pub fn to_bid_config(&self) -> BidConfig {
        BidConfig {
            default_overbid_pct: self.default_overbid_pct,
            max_overbid_pct: self.max_overbid_pct,
            high_value_threshold: self.high_value_threshold,
            min_bid_increment: self.min_bid_increment,
            ..BidConfig::default()
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LearnerSection {
    pub db_path: String,
}

impl Default for LearnerSection {
    fn default() -> Self {
        Self {
            db_path: "logs/outcomes.db".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is
    /// absent. A malformed file is still an error.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            warn!(path, "Config file not found — using defaults");
            Ok(Self::default())
        }
    }
}
