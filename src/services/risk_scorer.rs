use chrono::Utc;
use futures_util::{stream, StreamExt};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{FactorWeights, RiskConfig};
use crate::models::{
    ActiveMultipliers, AppliedMultipliers, DegradedSignal, DerbyInfo, HeadToHeadRecord, MatchRiskAnalysis,
    PlayerRisk, PossessionInfo, RefereeContext, RefereePlayerHistory, RiskBreakdown,
    SeasonCardStat, SeasonalFactor, Side, TeamFoulsStat,
};
use crate::services::data_source::CardDataSource;
use crate::services::error::{RiskError, RiskResult};
use crate::services::factors::{
    base_score, combined_score, fouls_factor, h2h_factor, needs_h2h_lookup, referee_factor,
    seasonal_factor,
};
use crate::services::multipliers::{resolve_match_context, Lookup, MatchContext};
use crate::utils::{round1, round2};

#[derive(Debug, Clone)]
pub struct MatchRequest {
    pub home_team: String,
    pub away_team: String,
    pub referee: Option<String>,
}

impl MatchRequest {
    pub fn new(home_team: &str, away_team: &str, referee: Option<&str>) -> Self {
        Self {
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            referee: referee.map(str::to_string),
        }
    }
}

struct RosterEntry {
    side: Side,
    stat: SeasonCardStat,
    seasonal: SeasonalFactor,
}

/// Ranks the players of both teams by their risk of being booked.
///
/// Each call is independent and recomputes everything from the data source.
pub struct RiskScorer<S> {
    source: S,
    config: RiskConfig,
}

impl<S: CardDataSource> RiskScorer<S> {
    pub fn new(source: S, config: RiskConfig) -> RiskResult<Self> {
        config.validate()?;
        Ok(Self { source, config })
    }

    pub async fn analyze_match(&self, request: &MatchRequest) -> RiskResult<MatchRiskAnalysis> {
        let (home, away, referee) = validate_request(request)?;
        let config = &self.config;
        let season = config.season.as_str();
        let mut degraded = Vec::new();

        let ((home_roster, home_note), (away_roster, away_note)) = tokio::join!(
            self.load_roster(home, Side::Home),
            self.load_roster(away, Side::Away)
        );
        degraded.extend(home_note);
        degraded.extend(away_note);

        if home_roster.is_empty() && away_roster.is_empty() {
            warn!(home, away, season, "no roster data for either team");
            return Err(RiskError::InsufficientData {
                home: home.to_string(),
                away: away.to_string(),
            });
        }

        let (context, home_fouls, away_fouls, referee_history) = tokio::join!(
            resolve_match_context(&self.source, home, away, referee, config),
            async { Lookup::from_result("team_fouls:home", self.source.team_fouls(home, season).await) },
            async { Lookup::from_result("team_fouls:away", self.source.team_fouls(away, season).await) },
            async {
                match referee {
                    Some(name) => Lookup::from_result(
                        "referee_history",
                        self.source.referee_vs_players(name, home, away).await.map(Some),
                    ),
                    None => Lookup::Missing,
                }
            }
        );

        degraded.extend(context.degraded.iter().cloned());
        degraded.extend(home_fouls.degraded("team_fouls:home", true));
        degraded.extend(away_fouls.degraded("team_fouls:away", true));
        degraded.extend(referee_history.degraded("referee_history", false));

        let history_by_player: HashMap<&str, &RefereePlayerHistory> = referee_history
            .found()
            .map(|rows| rows.iter().map(|h| (h.player_id.as_str(), h)).collect())
            .unwrap_or_default();

        let entries: Vec<RosterEntry> = home_roster
            .into_iter()
            .map(|stat| (Side::Home, stat))
            .chain(away_roster.into_iter().map(|stat| (Side::Away, stat)))
            .map(|(side, stat)| {
                let seasonal = seasonal_factor(&stat);
                RosterEntry { side, stat, seasonal }
            })
            .collect();

        let h2h = self.fetch_head_to_head(&entries, home, away).await;
        let h2h_failures = h2h
            .values()
            .filter(|lookup| matches!(lookup, Lookup::Failed(_)))
            .count();
        if h2h_failures > 0 {
            degraded.push(DegradedSignal {
                signal: "h2h".to_string(),
                reason: format!("{} head-to-head lookups failed", h2h_failures),
            });
        }

        let weights = config.weights_for(referee.is_some());
        let mut players: Vec<PlayerRisk> = entries
            .into_iter()
            .map(|entry| {
                let team_fouls = match entry.side {
                    Side::Home => home_fouls.found(),
                    Side::Away => away_fouls.found(),
                };
                self.score_player(
                    entry,
                    &context,
                    team_fouls,
                    referee.is_some(),
                    &history_by_player,
                    &h2h,
                    &weights,
                )
            })
            .collect();

        // Stable: ties keep roster order (season yellows descending).
        players.sort_by(|a, b| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(Ordering::Equal)
        });

        let top_n = config.top_n;
        let top_for = |side: Option<Side>| -> Vec<PlayerRisk> {
            players
                .iter()
                .filter(|p| side.map_or(true, |s| p.side == s))
                .take(top_n)
                .map(PlayerRisk::rounded)
                .collect()
        };
        let overall_top5 = top_for(None);
        let home_team_top5 = top_for(Some(Side::Home));
        let away_team_top5 = top_for(Some(Side::Away));

        info!(
            home,
            away,
            referee = referee.unwrap_or("-"),
            players = players.len(),
            top_score = players.first().map_or(0.0, |p| p.combined_score),
            degraded = degraded.len(),
            "match risk analysis complete"
        );

        Ok(MatchRiskAnalysis {
            analysis_id: Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            match_label: format!("{} vs {}", home, away),
            home_team: home.to_string(),
            away_team: away.to_string(),
            season: season.to_string(),
            referee: referee.map(|name| referee_context(name, &context)),
            referee_note: if referee.is_none() {
                Some(format!(
                    "No referee designated: referee factor omitted, weights rebalanced to seasonal {:.0}% / head-to-head {:.0}% / fouls {:.0}%",
                    weights.seasonal * 100.0,
                    weights.h2h * 100.0,
                    weights.fouls * 100.0
                ))
            } else {
                None
            },
            derby: derby_info(&context),
            possession: possession_info(&context),
            multipliers: rounded_multipliers(&context),
            weights,
            players_evaluated: players.len(),
            overall_top5,
            home_team_top5,
            away_team_top5,
            degraded,
        })
    }

    async fn load_roster(&self, team: &str, side: Side) -> (Vec<SeasonCardStat>, Option<DegradedSignal>) {
        let config = &self.config;
        let signal = match side {
            Side::Home => "roster:home",
            Side::Away => "roster:away",
        };

        match self
            .source
            .roster_with_season_stats(team, &config.season, config.competition.as_deref(), config.roster_limit)
            .await
        {
            Ok(mut rows) => {
                rows.sort_by(|a, b| b.yellow_cards.cmp(&a.yellow_cards));
                rows.truncate(config.roster_limit);
                let note = rows.is_empty().then(|| DegradedSignal {
                    signal: signal.to_string(),
                    reason: format!("no season statistics for {}", team),
                });
                (rows, note)
            }
            Err(e) => {
                warn!(signal, team, error = %e, "roster lookup failed");
                (
                    Vec::new(),
                    Some(DegradedSignal {
                        signal: signal.to_string(),
                        reason: format!("lookup failed: {}", e),
                    }),
                )
            }
        }
    }

    /// Fan out head-to-head lookups for players above the seasonal threshold.
    /// Arrival order is irrelevant; results are keyed by player id.
    async fn fetch_head_to_head(
        &self,
        entries: &[RosterEntry],
        home: &str,
        away: &str,
    ) -> HashMap<String, Lookup<HeadToHeadRecord>> {
        let candidates: Vec<String> = entries
            .iter()
            .filter(|e| needs_h2h_lookup(e.seasonal.score, &self.config))
            .map(|e| e.stat.player_id.clone())
            .collect();

        stream::iter(candidates)
            .map(|player_id: String| async move {
                let lookup = Lookup::from_result("h2h", self.source.head_to_head(&player_id, home, away).await);
                (player_id, lookup)
            })
            .buffer_unordered(self.config.h2h_concurrency)
            .collect::<HashMap<_, _>>()
            .await
    }

    #[allow(clippy::too_many_arguments)]
    fn score_player(
        &self,
        entry: RosterEntry,
        context: &MatchContext,
        team_fouls: Option<&TeamFoulsStat>,
        referee_designated: bool,
        history: &HashMap<&str, &RefereePlayerHistory>,
        h2h: &HashMap<String, Lookup<HeadToHeadRecord>>,
        weights: &FactorWeights,
    ) -> PlayerRisk {
        let config = &self.config;
        let RosterEntry { side, stat, seasonal } = entry;

        let referee = referee_factor(
            referee_designated,
            history.get(stat.player_id.as_str()).copied(),
            config,
        );
        let h2h_score = h2h_factor(h2h.get(&stat.player_id).and_then(|l| l.found()));
        let fouls = fouls_factor(seasonal.per_90, stat.position, team_fouls, config);

        let multipliers = AppliedMultipliers {
            derby: context.multipliers.derby,
            home_away: context.home_away_for(side),
            referee_adjustment: context.multipliers.referee_adjustment,
            possession: context.possession_for(side),
            league_baseline: context.multipliers.league_baseline,
        };

        let base = base_score(seasonal.score, &referee, h2h_score.score, fouls.score, weights);
        let combined = combined_score(base, multipliers.product());

        PlayerRisk {
            player_id: stat.player_id,
            name: stat.player_name,
            team: stat.team_name,
            side,
            position: stat.position,
            season_yellows: stat.yellow_cards,
            base_score: base,
            combined_score: combined,
            breakdown: RiskBreakdown {
                seasonal,
                referee,
                h2h: h2h_score,
                fouls,
                multipliers,
            },
        }
    }
}

fn validate_request(request: &MatchRequest) -> RiskResult<(&str, &str, Option<&str>)> {
    let home = request.home_team.trim();
    let away = request.away_team.trim();
    if home.is_empty() {
        return Err(RiskError::MissingTeam("home"));
    }
    if away.is_empty() {
        return Err(RiskError::MissingTeam("away"));
    }
    if home.eq_ignore_ascii_case(away) {
        return Err(RiskError::SameTeam(home.to_string()));
    }
    let referee = request
        .referee
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());
    Ok((home, away, referee))
}

fn referee_context(name: &str, context: &MatchContext) -> RefereeContext {
    let profile = context.referee_profile.found().cloned().map(|mut p| {
        p.ref_avg_yellows = round2(p.ref_avg_yellows);
        p.league_avg_yellows = round2(p.league_avg_yellows);
        p.delta = round2(p.delta);
        p
    });
    let summary = context.referee_summary.found().cloned().map(|mut s| {
        s.avg_yellows_per_match = round2(s.avg_yellows_per_match);
        s
    });
    RefereeContext {
        name: name.to_string(),
        summary,
        profile,
    }
}

fn derby_info(context: &MatchContext) -> DerbyInfo {
    match context.rivalry.found() {
        Some(r) => DerbyInfo {
            is_derby: true,
            name: r.name.clone(),
            rivalry_type: Some(r.rivalry_type),
            intensity: Some(r.intensity),
        },
        None => DerbyInfo {
            is_derby: false,
            name: None,
            rivalry_type: None,
            intensity: None,
        },
    }
}

fn possession_info(context: &MatchContext) -> PossessionInfo {
    let home = context.possession_home.found();
    let away = context.possession_away.found();
    PossessionInfo {
        home_avg: home.map(|p| round1(p.avg_possession)),
        away_avg: away.map(|p| round1(p.avg_possession)),
        home_style: home.map(|p| p.play_style),
        away_style: away.map(|p| p.play_style),
        home_factor: round2(context.multipliers.possession_home),
        away_factor: round2(context.multipliers.possession_away),
    }
}

fn rounded_multipliers(context: &MatchContext) -> ActiveMultipliers {
    let m = context.multipliers;
    ActiveMultipliers {
        derby: round2(m.derby),
        home: round2(m.home),
        away: round2(m.away),
        league_baseline: round2(m.league_baseline),
        referee_adjustment: round2(m.referee_adjustment),
        possession_home: round2(m.possession_home),
        possession_away: round2(m.possession_away),
    }
}
