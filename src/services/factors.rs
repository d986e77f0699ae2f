use crate::config::{FactorWeights, RiskConfig};
use crate::models::{
    FactorScore, FoulsFactor, HeadToHeadRecord, Position, RefereeFactor, RefereePlayerHistory,
    SeasonCardStat, SeasonalFactor, TeamFoulsStat,
};

const MAX_SCORE: f64 = 100.0;

fn cap(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, MAX_SCORE)
}

/// Yellows per 90 scaled to 0-100. The only factor that is always available.
pub fn seasonal_factor(stat: &SeasonCardStat) -> SeasonalFactor {
    let per_90 = stat.effective_yellows_per_90();
    let detail = if stat.minutes_played > 0 {
        Some(format!(
            "{:.2} yellows/90 ({} in {} matches, {} min)",
            per_90, stat.yellow_cards, stat.matches_played, stat.minutes_played
        ))
    } else {
        None
    };

    SeasonalFactor {
        score: cap(per_90 * 100.0),
        per_90,
        yellows: stat.yellow_cards,
        matches: stat.matches_played,
        minutes: stat.minutes_played,
        detail,
    }
}

/// `Absent` without a designated referee; the conservative prior when the
/// referee is designated but has never met the player.
pub fn referee_factor(
    referee_designated: bool,
    history: Option<&RefereePlayerHistory>,
    config: &RiskConfig,
) -> RefereeFactor {
    if !referee_designated {
        return RefereeFactor::Absent;
    }

    match history {
        Some(h) => RefereeFactor::Present {
            score: cap(h.booking_percentage),
            detail: format!(
                "booked {} times in {} matches with {} ({:.0}%)",
                h.times_booked, h.matches_with_referee, h.referee_name, h.booking_percentage
            ),
            prior: false,
        },
        None => RefereeFactor::Present {
            score: cap(config.default_referee_score),
            detail: format!(
                "no history with this referee, prior {:.0}",
                config.default_referee_score
            ),
            prior: true,
        },
    }
}

/// Whether a head-to-head lookup is worth issuing for this seasonal score.
pub fn needs_h2h_lookup(seasonal_score: f64, config: &RiskConfig) -> bool {
    seasonal_score > config.h2h_threshold
}

pub fn h2h_factor(record: Option<&HeadToHeadRecord>) -> FactorScore {
    match record {
        Some(r) if r.total_h2h_matches > 0 => FactorScore {
            score: cap(r.total_yellows as f64 / r.total_h2h_matches as f64 * 100.0),
            detail: Some(format!(
                "{} yellows in {} head-to-head matches",
                r.total_yellows, r.total_h2h_matches
            )),
        },
        _ => FactorScore {
            score: 0.0,
            detail: None,
        },
    }
}

pub fn position_multiplier(position: Option<Position>, config: &RiskConfig) -> f64 {
    match position {
        Some(Position::Defence) | Some(Position::Midfield) => config.defensive_position_multiplier,
        _ => 1.0,
    }
}

/// Team foul-to-card tendency plus the player's own rate, scaled by position.
/// Without team data the factor is zero.
pub fn fouls_factor(
    per_90: f64,
    position: Option<Position>,
    team_fouls: Option<&TeamFoulsStat>,
    config: &RiskConfig,
) -> FoulsFactor {
    let pos_mult = position_multiplier(position, config);

    let Some(team) = team_fouls else {
        return FoulsFactor {
            score: 0.0,
            team_foul_to_card_pct: None,
            position_multiplier: pos_mult,
            detail: None,
        };
    };

    let team_part = team.foul_to_card_pct.max(0.0) * config.fouls_team_pct_weight;
    let player_part = (per_90 * config.fouls_rate_scale).min(config.fouls_rate_cap);
    let score = cap((team_part + player_part) * pos_mult);

    FoulsFactor {
        score,
        team_foul_to_card_pct: Some(team.foul_to_card_pct),
        position_multiplier: pos_mult,
        detail: Some(format!(
            "team {:.1} fouls/match, {:.1}% carded, position x{:.1}",
            team.avg_fouls_per_match, team.foul_to_card_pct, pos_mult
        )),
    }
}

/// Weighted sum of the available factors. An absent referee factor contributes
/// nothing; callers pick the no-referee weights for that case.
pub fn base_score(
    seasonal: f64,
    referee: &RefereeFactor,
    h2h: f64,
    fouls: f64,
    weights: &FactorWeights,
) -> f64 {
    let referee_part = referee.score().map_or(0.0, |s| s * weights.referee);
    seasonal * weights.seasonal + referee_part + h2h * weights.h2h + fouls * weights.fouls
}

pub fn combined_score(base: f64, multiplier_product: f64) -> f64 {
    cap(base * multiplier_product)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(yellows: i32, matches: i32, minutes: i32) -> SeasonCardStat {
        SeasonCardStat {
            player_id: "p1".to_string(),
            player_name: "Test Player".to_string(),
            team_name: "Inter".to_string(),
            position: Some(Position::Midfield),
            season: "2025-2026".to_string(),
            competition_code: None,
            matches_played: matches,
            minutes_played: minutes,
            yellow_cards: yellows,
            red_cards: 0,
            yellows_per_90: None,
        }
    }

    fn team_fouls(pct: f64) -> TeamFoulsStat {
        TeamFoulsStat {
            team_name: "Inter".to_string(),
            season: "2025-2026".to_string(),
            matches_played: 10,
            avg_fouls_per_match: 12.0,
            avg_yellows_per_match: 2.0,
            foul_to_card_pct: pct,
        }
    }

    #[test]
    fn test_seasonal_zero_minutes() {
        let mut s = stat(3, 0, 0);
        s.yellows_per_90 = Some(2.0);
        let f = seasonal_factor(&s);
        assert_eq!(f.score, 0.0);
        assert_eq!(f.per_90, 0.0);
    }

    #[test]
    fn test_seasonal_scenario_rate() {
        let f = seasonal_factor(&stat(8, 18, 1600));
        assert!((f.per_90 - 0.45).abs() < 1e-9);
        assert!((f.score - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_seasonal_capped() {
        let f = seasonal_factor(&stat(10, 3, 90));
        assert_eq!(f.score, 100.0);
    }

    #[test]
    fn test_referee_absent_without_designation() {
        let config = RiskConfig::default();
        assert!(matches!(referee_factor(false, None, &config), RefereeFactor::Absent));
    }

    #[test]
    fn test_referee_prior_without_history() {
        let config = RiskConfig::default();
        match referee_factor(true, None, &config) {
            RefereeFactor::Present { score, prior, .. } => {
                assert_eq!(score, 25.0);
                assert!(prior);
            }
            RefereeFactor::Absent => panic!("expected prior"),
        }
    }

    #[test]
    fn test_referee_history_uses_booking_percentage() {
        let config = RiskConfig::default();
        let history = RefereePlayerHistory {
            referee_name: "Daniele Orsato".to_string(),
            player_id: "p1".to_string(),
            player_name: "Test Player".to_string(),
            team_name: "Inter".to_string(),
            times_booked: 3,
            matches_with_referee: 5,
            booking_percentage: RefereePlayerHistory::booking_percentage(3, 5),
            last_booking: None,
        };
        assert_eq!(referee_factor(true, Some(&history), &config).score(), Some(60.0));
    }

    #[test]
    fn test_h2h_gate_is_strict() {
        let config = RiskConfig::default();
        assert!(!needs_h2h_lookup(25.0, &config));
        assert!(!needs_h2h_lookup(10.0, &config));
        assert!(needs_h2h_lookup(25.01, &config));
    }

    #[test]
    fn test_h2h_score() {
        let record = HeadToHeadRecord {
            player_id: "p1".to_string(),
            team_a: "Inter".to_string(),
            team_b: "Milan".to_string(),
            total_h2h_matches: 4,
            total_yellows: 2,
            total_reds: 0,
        };
        assert_eq!(h2h_factor(Some(&record)).score, 50.0);

        let empty = HeadToHeadRecord {
            total_h2h_matches: 0,
            ..record
        };
        assert_eq!(h2h_factor(Some(&empty)).score, 0.0);
        assert_eq!(h2h_factor(None).score, 0.0);
    }

    #[test]
    fn test_fouls_position_multiplier_and_cap() {
        let config = RiskConfig::default();
        let team = team_fouls(20.0);

        // (20 * 0.5 + min(0.4 * 50, 50)) * 1.2 = 36
        let mid = fouls_factor(0.4, Some(Position::Midfield), Some(&team), &config);
        assert!((mid.score - 36.0).abs() < 1e-9);

        let fwd = fouls_factor(0.4, Some(Position::Offence), Some(&team), &config);
        assert!((fwd.score - 30.0).abs() < 1e-9);

        let heavy = fouls_factor(5.0, Some(Position::Defence), Some(&team_fouls(100.0)), &config);
        assert_eq!(heavy.score, 100.0);
    }

    #[test]
    fn test_fouls_without_team_data() {
        let config = RiskConfig::default();
        let f = fouls_factor(0.45, Some(Position::Defence), None, &config);
        assert_eq!(f.score, 0.0);
        assert!(f.detail.is_none());
    }

    #[test]
    fn test_referee_boundary_is_discontinuous() {
        let config = RiskConfig::default();
        let with_zero_referee = RefereeFactor::Present {
            score: 0.0,
            detail: String::new(),
            prior: false,
        };
        let with = base_score(45.0, &with_zero_referee, 0.0, 0.0, &config.weights_for(true));
        let without = base_score(45.0, &RefereeFactor::Absent, 0.0, 0.0, &config.weights_for(false));
        assert!((with - 15.75).abs() < 1e-9);
        assert!((without - 20.25).abs() < 1e-9);
    }

    #[test]
    fn test_combined_is_clamped() {
        assert_eq!(combined_score(95.0, 1.26 * 1.06 * 1.15 * 1.15), 100.0);
        assert_eq!(combined_score(0.0, 1.5), 0.0);
    }
}
