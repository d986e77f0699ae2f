use tracing::{debug, warn};

use crate::config::RiskConfig;
use crate::models::{
    ActiveMultipliers, DegradedSignal, RefereeLeagueProfile, RefereeSummary, Rivalry, Side,
    TeamPossessionStat,
};
use crate::services::data_source::CardDataSource;
use crate::services::referee_profile::classify_referee;

const NEUTRAL: f64 = 1.0;

/// Outcome of one optional lookup against the data source.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    Missing,
    Failed(String),
}

impl<T> Lookup<T> {
    /// Errors are logged here and nowhere else; callers only see `Failed`.
    pub fn from_result(signal: &str, result: anyhow::Result<Option<T>>) -> Self {
        match result {
            Ok(Some(value)) => Self::Found(value),
            Ok(None) => Self::Missing,
            Err(e) => {
                warn!(signal, error = %e, "lookup failed, falling back to default");
                Self::Failed(e.to_string())
            }
        }
    }

    pub fn found(&self) -> Option<&T> {
        match self {
            Self::Found(value) => Some(value),
            _ => None,
        }
    }

    /// Marker for the result. Failures always count; a missing row only when
    /// absence means a gap in the data rather than a legitimate "none".
    pub fn degraded(&self, signal: &str, missing_is_gap: bool) -> Option<DegradedSignal> {
        match self {
            Self::Found(_) => None,
            Self::Missing if !missing_is_gap => None,
            Self::Missing => Some(DegradedSignal {
                signal: signal.to_string(),
                reason: "no data".to_string(),
            }),
            Self::Failed(e) => Some(DegradedSignal {
                signal: signal.to_string(),
                reason: format!("lookup failed: {}", e),
            }),
        }
    }
}

/// 1.10 / 1.18 / 1.26 for intensity 1 / 2 / 3, neutral without a rivalry.
pub fn derby_multiplier(rivalry: &Lookup<Rivalry>, config: &RiskConfig) -> f64 {
    match rivalry.found() {
        Some(r) => {
            let intensity = r.intensity.clamp(1, 3) as f64;
            NEUTRAL + (config.derby_intensity_step * intensity + config.derby_offset)
        }
        None => NEUTRAL,
    }
}

pub fn home_away_multiplier(side: Side, config: &RiskConfig) -> f64 {
    match side {
        Side::Home => config.home_multiplier,
        Side::Away => config.away_multiplier,
    }
}

pub fn league_baseline_multiplier(baseline: &Lookup<f64>) -> f64 {
    match baseline.found() {
        Some(factor) if factor.is_finite() && *factor > 0.0 => *factor,
        _ => NEUTRAL,
    }
}

/// Every 0.5 yellows/match above league average shifts risk by 5%, within the configured bounds.
pub fn referee_adjustment_for_delta(delta: f64, config: &RiskConfig) -> f64 {
    if !delta.is_finite() {
        return NEUTRAL;
    }
    (NEUTRAL + delta * config.referee_delta_slope)
        .clamp(config.referee_adjustment_min, config.referee_adjustment_max)
}

pub fn referee_adjustment(profile: &Lookup<RefereeLeagueProfile>, config: &RiskConfig) -> f64 {
    match profile.found() {
        Some(p) => referee_adjustment_for_delta(p.delta, config),
        None => NEUTRAL,
    }
}

/// Teams below 50% possession foul more; above 50% less.
pub fn possession_factor(avg_possession: f64, config: &RiskConfig) -> f64 {
    if !avg_possession.is_finite() {
        return NEUTRAL;
    }
    (NEUTRAL + (50.0 - avg_possession) * config.possession_slope)
        .clamp(config.possession_min, config.possession_max)
}

pub fn possession_multiplier(stat: &Lookup<TeamPossessionStat>, config: &RiskConfig) -> f64 {
    match stat.found() {
        Some(s) => possession_factor(s.avg_possession, config),
        None => NEUTRAL,
    }
}

/// Player-independent signals for one match, with the multipliers already collapsed.
#[derive(Debug, Clone)]
pub struct MatchContext {
    pub rivalry: Lookup<Rivalry>,
    pub possession_home: Lookup<TeamPossessionStat>,
    pub possession_away: Lookup<TeamPossessionStat>,
    pub referee_profile: Lookup<RefereeLeagueProfile>,
    pub referee_summary: Lookup<RefereeSummary>,
    pub multipliers: ActiveMultipliers,
    pub degraded: Vec<DegradedSignal>,
}

impl MatchContext {
    pub fn possession_for(&self, side: Side) -> f64 {
        match side {
            Side::Home => self.multipliers.possession_home,
            Side::Away => self.multipliers.possession_away,
        }
    }

    pub fn home_away_for(&self, side: Side) -> f64 {
        match side {
            Side::Home => self.multipliers.home,
            Side::Away => self.multipliers.away,
        }
    }
}

/// Issue all context lookups concurrently. Never fails: each unavailable
/// signal collapses to its neutral multiplier.
pub async fn resolve_match_context<S: CardDataSource>(
    source: &S,
    home: &str,
    away: &str,
    referee: Option<&str>,
    config: &RiskConfig,
) -> MatchContext {
    let season = config.season.as_str();

    let rivalry_fut = async { Lookup::from_result("derby", source.derby_lookup(home, away).await) };

    let possession_fut = async {
        match source.team_possession(home, away, season).await {
            Ok((h, a)) => (
                h.map_or(Lookup::Missing, Lookup::Found),
                a.map_or(Lookup::Missing, Lookup::Found),
            ),
            Err(e) => {
                warn!(signal = "possession", error = %e, "lookup failed, falling back to default");
                (Lookup::Failed(e.to_string()), Lookup::Failed(e.to_string()))
            }
        }
    };

    let profile_fut = async {
        match referee {
            Some(name) => {
                let lookup = Lookup::from_result("referee_profile", source.referee_profile(name).await);
                match lookup {
                    Lookup::Found(mut profile) => {
                        profile.classification = classify_referee(profile.delta);
                        Lookup::Found(profile)
                    }
                    other => other,
                }
            }
            None => Lookup::Missing,
        }
    };

    let summary_fut = async {
        match referee {
            Some(name) => Lookup::from_result("referee_summary", source.referee_summary(name).await),
            None => Lookup::Missing,
        }
    };

    let baseline_fut = async {
        if config.apply_league_baseline {
            Lookup::from_result("league_baseline", source.league_baseline(home).await)
        } else {
            Lookup::Missing
        }
    };

    let (rivalry, (possession_home, possession_away), referee_profile, referee_summary, league_baseline) =
        tokio::join!(rivalry_fut, possession_fut, profile_fut, summary_fut, baseline_fut);

    let multipliers = ActiveMultipliers {
        derby: derby_multiplier(&rivalry, config),
        home: home_away_multiplier(Side::Home, config),
        away: home_away_multiplier(Side::Away, config),
        league_baseline: league_baseline_multiplier(&league_baseline),
        referee_adjustment: referee_adjustment(&referee_profile, config),
        possession_home: possession_multiplier(&possession_home, config),
        possession_away: possession_multiplier(&possession_away, config),
    };

    let mut degraded = Vec::new();
    degraded.extend(rivalry.degraded("derby", false));
    degraded.extend(possession_home.degraded("possession:home", true));
    degraded.extend(possession_away.degraded("possession:away", true));
    if referee.is_some() {
        degraded.extend(referee_profile.degraded("referee_profile", true));
        degraded.extend(referee_summary.degraded("referee_summary", false));
    }
    if config.apply_league_baseline {
        degraded.extend(league_baseline.degraded("league_baseline", true));
    }

    debug!(
        derby = multipliers.derby,
        referee_adjustment = multipliers.referee_adjustment,
        possession_home = multipliers.possession_home,
        possession_away = multipliers.possession_away,
        "resolved match context"
    );

    MatchContext {
        rivalry,
        possession_home,
        possession_away,
        referee_profile,
        referee_summary,
        multipliers,
        degraded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RefereeProfile, RivalryType};

    fn rivalry(intensity: u8) -> Lookup<Rivalry> {
        Lookup::Found(Rivalry {
            team_a: "Inter".to_string(),
            team_b: "Milan".to_string(),
            rivalry_type: RivalryType::Derby,
            intensity,
            name: Some("Derby della Madonnina".to_string()),
        })
    }

    fn profile(delta: f64) -> Lookup<RefereeLeagueProfile> {
        Lookup::Found(RefereeLeagueProfile {
            referee_name: "Ref".to_string(),
            competition_code: "SA".to_string(),
            matches_in_league: 20,
            ref_avg_yellows: 4.0 + delta,
            league_avg_yellows: 4.0,
            delta,
            classification: RefereeProfile::Average,
        })
    }

    #[test]
    fn test_derby_multiplier_by_intensity() {
        let config = RiskConfig::default();
        assert!((derby_multiplier(&rivalry(1), &config) - 1.10).abs() < 1e-12);
        assert!((derby_multiplier(&rivalry(2), &config) - 1.18).abs() < 1e-12);
        assert!((derby_multiplier(&rivalry(3), &config) - 1.26).abs() < 1e-12);
        assert_eq!(derby_multiplier(&Lookup::Missing, &config), 1.0);
        assert_eq!(derby_multiplier(&Lookup::Failed("timeout".into()), &config), 1.0);
    }

    #[test]
    fn test_home_away_constants() {
        let config = RiskConfig::default();
        assert_eq!(home_away_multiplier(Side::Home, &config), 0.94);
        assert_eq!(home_away_multiplier(Side::Away, &config), 1.06);
    }

    #[test]
    fn test_referee_adjustment_is_clamped() {
        let config = RiskConfig::default();
        assert!((referee_adjustment_for_delta(5.0, &config) - 1.15).abs() < 1e-12);
        assert!((referee_adjustment_for_delta(-5.0, &config) - 0.85).abs() < 1e-12);
        assert!((referee_adjustment_for_delta(1.2, &config) - 1.12).abs() < 1e-12);
        assert!((referee_adjustment(&profile(0.5), &config) - 1.05).abs() < 1e-12);
        assert_eq!(referee_adjustment(&Lookup::Missing, &config), 1.0);
    }

    #[test]
    fn test_referee_adjustment_monotonic() {
        let config = RiskConfig::default();
        let mut previous = f64::MIN;
        for step in -60..=60 {
            let adj = referee_adjustment_for_delta(step as f64 * 0.1, &config);
            assert!(adj >= previous);
            previous = adj;
        }
    }

    #[test]
    fn test_possession_factor() {
        let config = RiskConfig::default();
        assert!((possession_factor(50.0, &config) - 1.0).abs() < 1e-12);
        assert!((possession_factor(42.0, &config) - 1.08).abs() < 1e-12);
        assert!((possession_factor(58.0, &config) - 0.92).abs() < 1e-12);
        assert!((possession_factor(20.0, &config) - 1.15).abs() < 1e-12);
        assert!((possession_factor(80.0, &config) - 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_league_baseline_neutral_fallback() {
        assert_eq!(league_baseline_multiplier(&Lookup::Found(1.12)), 1.12);
        assert_eq!(league_baseline_multiplier(&Lookup::Found(0.0)), 1.0);
        assert_eq!(league_baseline_multiplier(&Lookup::Missing), 1.0);
    }

    #[test]
    fn test_degraded_markers() {
        let missing: Lookup<f64> = Lookup::Missing;
        assert!(missing.degraded("derby", false).is_none());
        assert!(missing.degraded("possession:home", true).is_some());

        let failed: Lookup<f64> = Lookup::from_result("x", Err(anyhow::anyhow!("boom")));
        let marker = failed.degraded("x", false).unwrap();
        assert!(marker.reason.contains("boom"));
    }
}
