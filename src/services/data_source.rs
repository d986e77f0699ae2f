use anyhow::Result;

use crate::models::{
    HeadToHeadRecord, RefereeLeagueProfile, RefereePlayerHistory, RefereeSummary, Rivalry,
    SeasonCardStat, TeamFoulsStat, TeamPossessionStat,
};

/// Read surface the risk engine needs from the card-statistics store.
///
/// Every method is a read against a snapshot; implementations never mutate.
/// `Ok(None)` / empty vectors mean "no data", `Err` means the lookup itself
/// failed. The engine treats both as unavailable but reports them differently.
#[allow(async_fn_in_trait)]
pub trait CardDataSource {
    /// Season rows for a team, ordered by yellow cards descending, at most `limit` rows.
    async fn roster_with_season_stats(
        &self,
        team: &str,
        season: &str,
        competition: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SeasonCardStat>>;

    async fn referee_vs_players(
        &self,
        referee: &str,
        team_a: &str,
        team_b: &str,
    ) -> Result<Vec<RefereePlayerHistory>>;

    async fn head_to_head(
        &self,
        player_id: &str,
        team_a: &str,
        team_b: &str,
    ) -> Result<Option<HeadToHeadRecord>>;

    async fn team_fouls(&self, team: &str, season: &str) -> Result<Option<TeamFoulsStat>>;

    /// Possession rows for both sides, in argument order.
    async fn team_possession(
        &self,
        team_a: &str,
        team_b: &str,
        season: &str,
    ) -> Result<(Option<TeamPossessionStat>, Option<TeamPossessionStat>)>;

    /// Rivalry for the unordered pair.
    async fn derby_lookup(&self, team_a: &str, team_b: &str) -> Result<Option<Rivalry>>;

    async fn referee_profile(&self, referee: &str) -> Result<Option<RefereeLeagueProfile>>;

    /// Normalization factor of the competition `team` plays in.
    async fn league_baseline(&self, team: &str) -> Result<Option<f64>>;

    async fn referee_summary(&self, referee: &str) -> Result<Option<RefereeSummary>>;
}
