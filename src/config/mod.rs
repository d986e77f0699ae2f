//! Scoring configuration.
//!
//! Every weight, threshold and multiplier bound used by the risk engine lives in
//! [`RiskConfig`]. The scorer takes a validated copy at construction and never
//! reads globals, so tests can vary any knob in isolation.

use serde::{Deserialize, Serialize};
use std::env;

use crate::services::RiskError;

/// Season used when the caller does not name one.
pub const DEFAULT_SEASON: &str = "2025-2026";

/// Weighting of the four factor scores. Weights of a scheme sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorWeights {
    pub seasonal: f64,
    pub referee: f64,
    pub h2h: f64,
    pub fouls: f64,
}

impl FactorWeights {
    pub const WITH_REFEREE: Self = Self {
        seasonal: 0.35,
        referee: 0.30,
        h2h: 0.15,
        fouls: 0.20,
    };

    /// Referee weight redistributed over the remaining factors.
    pub const WITHOUT_REFEREE: Self = Self {
        seasonal: 0.45,
        referee: 0.0,
        h2h: 0.25,
        fouls: 0.30,
    };

    pub fn total(&self) -> f64 {
        self.seasonal + self.referee + self.h2h + self.fouls
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    pub season: String,
    /// Restrict season stats to one competition; `None` uses the cross-competition total.
    pub competition: Option<String>,

    pub weights_with_referee: FactorWeights,
    pub weights_without_referee: FactorWeights,

    /// Head-to-head lookups only run for players whose seasonal score is strictly above this.
    pub h2h_threshold: f64,
    /// Score given to a designated referee with no history against the player.
    pub default_referee_score: f64,
    pub roster_limit: usize,
    pub top_n: usize,
    pub h2h_concurrency: usize,

    pub home_multiplier: f64,
    pub away_multiplier: f64,
    pub derby_intensity_step: f64,
    pub derby_offset: f64,
    pub referee_delta_slope: f64,
    pub referee_adjustment_min: f64,
    pub referee_adjustment_max: f64,
    pub possession_slope: f64,
    pub possession_min: f64,
    pub possession_max: f64,

    pub fouls_team_pct_weight: f64,
    pub fouls_rate_scale: f64,
    pub fouls_rate_cap: f64,
    pub defensive_position_multiplier: f64,

    /// Multiply the home competition's normalization factor into every combined score.
    pub apply_league_baseline: bool,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            season: DEFAULT_SEASON.to_string(),
            competition: None,
            weights_with_referee: FactorWeights::WITH_REFEREE,
            weights_without_referee: FactorWeights::WITHOUT_REFEREE,
            h2h_threshold: 25.0,
            default_referee_score: 25.0,
            roster_limit: 15,
            top_n: 5,
            h2h_concurrency: 4,
            home_multiplier: 0.94,
            away_multiplier: 1.06,
            derby_intensity_step: 0.08,
            derby_offset: 0.02,
            referee_delta_slope: 0.10,
            referee_adjustment_min: 0.85,
            referee_adjustment_max: 1.15,
            possession_slope: 0.01,
            possession_min: 0.85,
            possession_max: 1.15,
            fouls_team_pct_weight: 0.5,
            fouls_rate_scale: 50.0,
            fouls_rate_cap: 50.0,
            defensive_position_multiplier: 1.2,
            apply_league_baseline: false,
        }
    }
}

impl RiskConfig {
    /// Defaults overridden by `YO_SEASON`, `YO_COMPETITION`, `YO_H2H_CONCURRENCY`
    /// and `YO_APPLY_LEAGUE_BASELINE`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(season) = env::var("YO_SEASON") {
            if !season.trim().is_empty() {
                config.season = season.trim().to_string();
            }
        }
        if let Ok(competition) = env::var("YO_COMPETITION") {
            if !competition.trim().is_empty() {
                config.competition = Some(competition.trim().to_uppercase());
            }
        }
        if let Some(n) = env::var("YO_H2H_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            config.h2h_concurrency = n;
        }
        config.apply_league_baseline = env::var("YO_APPLY_LEAGUE_BASELINE")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        config
    }

    pub fn weights_for(&self, referee_designated: bool) -> FactorWeights {
        if referee_designated {
            self.weights_with_referee
        } else {
            self.weights_without_referee
        }
    }

    pub fn validate(&self) -> Result<(), RiskError> {
        for (label, weights) in [
            ("with-referee", &self.weights_with_referee),
            ("without-referee", &self.weights_without_referee),
        ] {
            let parts = [weights.seasonal, weights.referee, weights.h2h, weights.fouls];
            if parts.iter().any(|w| *w < 0.0) {
                return Err(RiskError::InvalidConfig(format!("{} weights must be non-negative", label)));
            }
            if (weights.total() - 1.0).abs() > 1e-9 {
                return Err(RiskError::InvalidConfig(format!(
                    "{} weights sum to {:.4}, expected 1.0",
                    label,
                    weights.total()
                )));
            }
        }
        if self.weights_without_referee.referee != 0.0 {
            return Err(RiskError::InvalidConfig(
                "without-referee weights must not weight the referee factor".to_string(),
            ));
        }
        if self.referee_adjustment_min > self.referee_adjustment_max
            || self.possession_min > self.possession_max
        {
            return Err(RiskError::InvalidConfig("multiplier bounds are inverted".to_string()));
        }
        if self.roster_limit == 0 || self.top_n == 0 || self.h2h_concurrency == 0 {
            return Err(RiskError::InvalidConfig(
                "roster_limit, top_n and h2h_concurrency must be positive".to_string(),
            ));
        }
        if self.season.trim().is_empty() {
            return Err(RiskError::InvalidConfig("season must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_schemes_sum_to_one() {
        assert!((FactorWeights::WITH_REFEREE.total() - 1.0).abs() < 1e-12);
        assert!((FactorWeights::WITHOUT_REFEREE.total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(RiskConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_weights() {
        let mut config = RiskConfig::default();
        config.weights_with_referee.seasonal = 0.5;
        assert!(matches!(config.validate(), Err(RiskError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = RiskConfig {
            h2h_concurrency: 0,
            ..RiskConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_weights_for_referee_availability() {
        let config = RiskConfig::default();
        assert_eq!(config.weights_for(true), FactorWeights::WITH_REFEREE);
        assert_eq!(config.weights_for(false), FactorWeights::WITHOUT_REFEREE);
    }
}
