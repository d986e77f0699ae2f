use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::config::FactorWeights;
use crate::utils::{round1, round2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Goalkeeper,
    Defence,
    Midfield,
    Offence,
}

impl Position {
    /// Accepts the provider's labels ("Defence") as well as common variants ("Defender", "Centre-Back").
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "goalkeeper" | "keeper" | "gk" => Some(Self::Goalkeeper),
            "defence" | "defense" | "defender" | "centre-back" | "center-back" | "left-back"
            | "right-back" => Some(Self::Defence),
            "midfield" | "midfielder" | "central midfield" | "defensive midfield"
            | "attacking midfield" => Some(Self::Midfield),
            "offence" | "offense" | "attacker" | "forward" | "centre-forward" | "left winger"
            | "right winger" => Some(Self::Offence),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Goalkeeper => "Goalkeeper",
            Self::Defence => "Defence",
            Self::Midfield => "Midfield",
            Self::Offence => "Offence",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub short_name: Option<String>,
    pub tla: Option<String>,
    pub competition_code: Option<String>,
}

/// One aggregation row of a player's cards in a season. `competition_code = None`
/// is the across-competitions total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonCardStat {
    pub player_id: String,
    pub player_name: String,
    pub team_name: String,
    pub position: Option<Position>,
    pub season: String,
    pub competition_code: Option<String>,
    pub matches_played: i32,
    pub minutes_played: i32,
    pub yellow_cards: i32,
    pub red_cards: i32,
    pub yellows_per_90: Option<f64>,
}

impl SeasonCardStat {
    /// Upstream rate when present, otherwise derived from minutes. Zero minutes means no rate.
    pub fn effective_yellows_per_90(&self) -> f64 {
        if self.minutes_played <= 0 {
            return 0.0;
        }
        self.yellows_per_90
            .unwrap_or(self.yellow_cards as f64 / self.minutes_played as f64 * 90.0)
            .max(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefereePlayerHistory {
    pub referee_name: String,
    pub player_id: String,
    pub player_name: String,
    pub team_name: String,
    pub times_booked: i32,
    pub matches_with_referee: i32,
    pub booking_percentage: f64,
    pub last_booking: Option<String>,
}

impl RefereePlayerHistory {
    pub fn booking_percentage(times_booked: i32, matches_with_referee: i32) -> f64 {
        if matches_with_referee <= 0 {
            0.0
        } else {
            times_booked as f64 / matches_with_referee as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HeadToHeadRecord {
    pub player_id: String,
    pub team_a: String,
    pub team_b: String,
    pub total_h2h_matches: i32,
    pub total_yellows: i32,
    pub total_reds: i32,
}

/// Head-to-head record with the player it belongs to, for lookups by player name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerHeadToHead {
    pub player_name: String,
    pub team_name: String,
    #[serde(flatten)]
    pub record: HeadToHeadRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TeamFoulsStat {
    pub team_name: String,
    pub season: String,
    pub matches_played: i32,
    pub avg_fouls_per_match: f64,
    pub avg_yellows_per_match: f64,
    pub foul_to_card_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayStyle {
    PossessionHeavy,
    Balanced,
    CounterAttack,
    Defensive,
}

impl PlayStyle {
    pub fn from_possession(avg_possession: f64) -> Self {
        if avg_possession >= 55.0 {
            Self::PossessionHeavy
        } else if avg_possession >= 50.0 {
            Self::Balanced
        } else if avg_possession >= 45.0 {
            Self::CounterAttack
        } else {
            Self::Defensive
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "POSSESSION_HEAVY" => Some(Self::PossessionHeavy),
            "BALANCED" => Some(Self::Balanced),
            "COUNTER_ATTACK" => Some(Self::CounterAttack),
            "DEFENSIVE" => Some(Self::Defensive),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PossessionHeavy => "POSSESSION_HEAVY",
            Self::Balanced => "BALANCED",
            Self::CounterAttack => "COUNTER_ATTACK",
            Self::Defensive => "DEFENSIVE",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamPossessionStat {
    pub team_name: String,
    pub season: String,
    pub matches_played: i32,
    pub avg_possession: f64,
    pub avg_fouls_committed: Option<f64>,
    pub play_style: PlayStyle,
}

/// Discipline profile of one team in a season.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamStatsReport {
    pub team_name: String,
    pub season: String,
    pub fouls: Option<TeamFoulsStat>,
    pub possession: Option<TeamPossessionStat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RivalryType {
    Derby,
    Historic,
    Regional,
}

impl RivalryType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "DERBY" => Some(Self::Derby),
            "HISTORIC" => Some(Self::Historic),
            "REGIONAL" => Some(Self::Regional),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Derby => "DERBY",
            Self::Historic => "HISTORIC",
            Self::Regional => "REGIONAL",
        }
    }
}

/// Symmetric: (a, b) and (b, a) describe the same rivalry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rivalry {
    pub team_a: String,
    pub team_b: String,
    pub rivalry_type: RivalryType,
    pub intensity: u8,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefereeProfile {
    StrictOutlier,
    AboveAverage,
    Average,
    BelowAverage,
    LenientOutlier,
}

impl RefereeProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StrictOutlier => "STRICT_OUTLIER",
            Self::AboveAverage => "ABOVE_AVERAGE",
            Self::Average => "AVERAGE",
            Self::BelowAverage => "BELOW_AVERAGE",
            Self::LenientOutlier => "LENIENT_OUTLIER",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefereeLeagueProfile {
    pub referee_name: String,
    pub competition_code: String,
    pub matches_in_league: i32,
    pub ref_avg_yellows: f64,
    pub league_avg_yellows: f64,
    pub delta: f64,
    pub classification: RefereeProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RefereeSummary {
    pub name: String,
    pub nationality: Option<String>,
    pub total_matches: i32,
    pub total_yellows: i32,
    pub total_reds: i32,
    pub avg_yellows_per_match: f64,
}

// Risk analysis output

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorScore {
    pub score: f64,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonalFactor {
    pub score: f64,
    pub per_90: f64,
    pub yellows: i32,
    pub matches: i32,
    pub minutes: i32,
    pub detail: Option<String>,
}

/// The referee factor is either computed or left out of the weighting entirely.
/// `prior` marks a designated referee with no shared history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefereeFactor {
    Present {
        score: f64,
        detail: String,
        prior: bool,
    },
    Absent,
}

impl RefereeFactor {
    pub fn score(&self) -> Option<f64> {
        match self {
            Self::Present { score, .. } => Some(*score),
            Self::Absent => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoulsFactor {
    pub score: f64,
    pub team_foul_to_card_pct: Option<f64>,
    pub position_multiplier: f64,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AppliedMultipliers {
    pub derby: f64,
    pub home_away: f64,
    pub referee_adjustment: f64,
    pub possession: f64,
    pub league_baseline: f64,
}

impl AppliedMultipliers {
    pub fn product(&self) -> f64 {
        self.derby * self.home_away * self.referee_adjustment * self.possession * self.league_baseline
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskBreakdown {
    pub seasonal: SeasonalFactor,
    pub referee: RefereeFactor,
    pub h2h: FactorScore,
    pub fouls: FoulsFactor,
    pub multipliers: AppliedMultipliers,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRisk {
    pub player_id: String,
    pub name: String,
    pub team: String,
    pub side: Side,
    pub position: Option<Position>,
    pub season_yellows: i32,
    pub base_score: f64,
    pub combined_score: f64,
    pub breakdown: RiskBreakdown,
}

impl PlayerRisk {
    /// Display copy: scores to one decimal, rates and multipliers to two.
    pub fn rounded(&self) -> Self {
        let mut out = self.clone();
        out.base_score = round1(out.base_score);
        out.combined_score = round1(out.combined_score);

        let b = &mut out.breakdown;
        b.seasonal.score = round1(b.seasonal.score);
        b.seasonal.per_90 = round2(b.seasonal.per_90);
        if let RefereeFactor::Present { score, .. } = &mut b.referee {
            *score = round1(*score);
        }
        b.h2h.score = round1(b.h2h.score);
        b.fouls.score = round1(b.fouls.score);
        b.fouls.team_foul_to_card_pct = b.fouls.team_foul_to_card_pct.map(round1);

        let m = &mut b.multipliers;
        m.derby = round2(m.derby);
        m.home_away = round2(m.home_away);
        m.referee_adjustment = round2(m.referee_adjustment);
        m.possession = round2(m.possession);
        m.league_baseline = round2(m.league_baseline);
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerbyInfo {
    pub is_derby: bool,
    pub name: Option<String>,
    pub rivalry_type: Option<RivalryType>,
    pub intensity: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PossessionInfo {
    pub home_avg: Option<f64>,
    pub away_avg: Option<f64>,
    pub home_style: Option<PlayStyle>,
    pub away_style: Option<PlayStyle>,
    pub home_factor: f64,
    pub away_factor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefereeContext {
    pub name: String,
    pub summary: Option<RefereeSummary>,
    pub profile: Option<RefereeLeagueProfile>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActiveMultipliers {
    pub derby: f64,
    pub home: f64,
    pub away: f64,
    pub league_baseline: f64,
    pub referee_adjustment: f64,
    pub possession_home: f64,
    pub possession_away: f64,
}

/// A signal that fell back to its default or neutral value during one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradedSignal {
    pub signal: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRiskAnalysis {
    pub analysis_id: String,
    pub generated_at: DateTime<Utc>,
    pub match_label: String,
    pub home_team: String,
    pub away_team: String,
    pub season: String,
    pub referee: Option<RefereeContext>,
    pub referee_note: Option<String>,
    pub derby: DerbyInfo,
    pub possession: PossessionInfo,
    pub multipliers: ActiveMultipliers,
    pub weights: FactorWeights,
    pub players_evaluated: usize,
    pub overall_top5: Vec<PlayerRisk>,
    pub home_team_top5: Vec<PlayerRisk>,
    pub away_team_top5: Vec<PlayerRisk>,
    pub degraded: Vec<DegradedSignal>,
}

// API Response types
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_position_parse_variants() {
        assert_eq!(Position::parse("Centre-Back"), Some(Position::Defence));
        assert_eq!(Position::parse(" forward "), Some(Position::Offence));
        assert_eq!(Position::parse("Coach"), None);
    }

    #[test]
    fn test_play_style_bands() {
        assert_eq!(PlayStyle::from_possession(55.0), PlayStyle::PossessionHeavy);
        assert_eq!(PlayStyle::from_possession(50.0), PlayStyle::Balanced);
        assert_eq!(PlayStyle::from_possession(45.0), PlayStyle::CounterAttack);
        assert_eq!(PlayStyle::from_possession(44.9), PlayStyle::Defensive);
    }

    #[test]
    fn test_referee_factor_wire_shape() {
        let present = RefereeFactor::Present { score: 44.4, detail: "4/9".to_string(), prior: false };
        assert_eq!(
            serde_json::to_value(&present).unwrap(),
            json!({"status": "present", "score": 44.4, "detail": "4/9", "prior": false})
        );
        assert_eq!(serde_json::to_value(RefereeFactor::Absent).unwrap(), json!({"status": "absent"}));
        assert_eq!(serde_json::to_value(Side::Away).unwrap(), json!("away"));
        assert_eq!(
            serde_json::to_value(RefereeProfile::StrictOutlier).unwrap(),
            json!("STRICT_OUTLIER")
        );
    }

    #[test]
    fn test_multiplier_product() {
        let m = AppliedMultipliers {
            derby: 1.26,
            home_away: 1.06,
            referee_adjustment: 1.0,
            possession: 1.0,
            league_baseline: 1.0,
        };
        assert!((m.product() - 1.3356).abs() < 1e-12);
    }
}
