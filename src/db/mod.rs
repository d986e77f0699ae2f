pub mod seed;
pub use seed::seed_data;

use anyhow::{anyhow, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{FromRow, Row, SqlitePool};
use std::env;
use std::str::FromStr;

use crate::models::*;
use crate::services::{classify_referee, CardDataSource};
use crate::utils::normalize_name;

/// Matches a team by full name or short name, case-insensitively. Binds the name twice.
const TEAM_MATCH: &str = "(LOWER(t.name) = LOWER(?) OR LOWER(t.short_name) = LOWER(?))";

/// Unordered team pair over aliases `ta` and `tb`, each side matched like `TEAM_MATCH`.
/// Bind with `pair_binds`.
const PAIR_MATCH: &str = r#"
    ((LOWER(ta.name) = LOWER(?) OR LOWER(ta.short_name) = LOWER(?))
        AND (LOWER(tb.name) = LOWER(?) OR LOWER(tb.short_name) = LOWER(?)))
    OR ((LOWER(ta.name) = LOWER(?) OR LOWER(ta.short_name) = LOWER(?))
        AND (LOWER(tb.name) = LOWER(?) OR LOWER(tb.short_name) = LOWER(?)))
"#;

fn pair_binds<'a>(team_a: &'a str, team_b: &'a str) -> [&'a str; 8] {
    [team_a, team_a, team_b, team_b, team_b, team_b, team_a, team_a]
}

/// Season rows without a competition are stored under this code.
const TOTAL_COMPETITION: &str = "TOTAL";

const FUZZY_MATCH_THRESHOLD: f64 = 0.85;

pub async fn create_pool() -> Result<SqlitePool> {
    let database_url = env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:data/yelloworacle.db".to_string());

    // Strip the "sqlite:" prefix to get the file path, create parent dir if needed
    let file_path = database_url
        .strip_prefix("sqlite:///")
        .or_else(|| database_url.strip_prefix("sqlite://"))
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(&database_url);

    if let Some(parent) = std::path::Path::new(file_path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.ok();
        }
    }

    let options = SqliteConnectOptions::from_str(&database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePool::connect_with(options).await?;
    Ok(pool)
}

/// Called from the CLI where no pool exists yet.
pub async fn init_database() -> Result<()> {
    let pool = create_pool().await?;
    init_database_with_pool(&pool).await
}

/// Called from the server and tests so schema creation shares the main pool.
pub async fn init_database_with_pool(pool: &SqlitePool) -> Result<()> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS teams (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            short_name TEXT,
            tla TEXT,
            competition_code TEXT
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS players (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            team_id TEXT NOT NULL,
            position TEXT,
            FOREIGN KEY (team_id) REFERENCES teams (id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS player_season_cards (
            player_id TEXT NOT NULL,
            season TEXT NOT NULL,
            competition_code TEXT NOT NULL DEFAULT 'TOTAL',
            matches_played INTEGER NOT NULL DEFAULT 0,
            minutes_played INTEGER NOT NULL DEFAULT 0,
            yellow_cards INTEGER NOT NULL DEFAULT 0,
            red_cards INTEGER NOT NULL DEFAULT 0,
            yellows_per_90 REAL,
            PRIMARY KEY (player_id, season, competition_code),
            FOREIGN KEY (player_id) REFERENCES players (id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS referees (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            nationality TEXT,
            total_matches INTEGER NOT NULL DEFAULT 0,
            total_yellows INTEGER NOT NULL DEFAULT 0,
            total_reds INTEGER NOT NULL DEFAULT 0
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS referee_player_history (
            referee_id TEXT NOT NULL,
            player_id TEXT NOT NULL,
            times_booked INTEGER NOT NULL DEFAULT 0,
            matches_with_referee INTEGER NOT NULL DEFAULT 0,
            last_booking TEXT,
            PRIMARY KEY (referee_id, player_id),
            FOREIGN KEY (referee_id) REFERENCES referees (id),
            FOREIGN KEY (player_id) REFERENCES players (id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS head_to_head_cards (
            player_id TEXT NOT NULL,
            team_a_id TEXT NOT NULL,
            team_b_id TEXT NOT NULL,
            total_h2h_matches INTEGER NOT NULL DEFAULT 0,
            total_yellows INTEGER NOT NULL DEFAULT 0,
            total_reds INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (player_id, team_a_id, team_b_id),
            FOREIGN KEY (player_id) REFERENCES players (id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS team_fouls_stats (
            team_id TEXT NOT NULL,
            season TEXT NOT NULL,
            matches_played INTEGER NOT NULL DEFAULT 0,
            avg_fouls_per_match REAL NOT NULL,
            avg_yellows_per_match REAL NOT NULL,
            foul_to_card_pct REAL NOT NULL,
            PRIMARY KEY (team_id, season),
            FOREIGN KEY (team_id) REFERENCES teams (id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS team_possession_stats (
            team_id TEXT NOT NULL,
            season TEXT NOT NULL,
            matches_played INTEGER NOT NULL DEFAULT 0,
            avg_possession REAL NOT NULL,
            avg_fouls_committed REAL,
            play_style TEXT,
            PRIMARY KEY (team_id, season),
            FOREIGN KEY (team_id) REFERENCES teams (id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS rivalries (
            team_a_id TEXT NOT NULL,
            team_b_id TEXT NOT NULL,
            rivalry_type TEXT NOT NULL,
            intensity INTEGER NOT NULL CHECK (intensity BETWEEN 1 AND 3),
            name TEXT,
            PRIMARY KEY (team_a_id, team_b_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS league_baselines (
            competition_code TEXT PRIMARY KEY,
            avg_yellows_per_match REAL NOT NULL,
            normalization_factor REAL NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS referee_league_stats (
            referee_id TEXT NOT NULL,
            competition_code TEXT NOT NULL,
            matches_in_league INTEGER NOT NULL DEFAULT 0,
            ref_avg_yellows REAL NOT NULL,
            PRIMARY KEY (referee_id, competition_code),
            FOREIGN KEY (referee_id) REFERENCES referees (id)
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_players_team ON players(team_id)",
        "CREATE INDEX IF NOT EXISTS idx_season_cards_season ON player_season_cards(season, competition_code)",
        "CREATE INDEX IF NOT EXISTS idx_teams_name ON teams(name)",
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!("Database initialized successfully");
    Ok(())
}

fn season_stat_from_row(row: &SqliteRow) -> SeasonCardStat {
    let competition: String = row.get("competition_code");
    SeasonCardStat {
        player_id: row.get("player_id"),
        player_name: row.get("player_name"),
        team_name: row.get("team_name"),
        position: row
            .get::<Option<String>, _>("position")
            .as_deref()
            .and_then(Position::parse),
        season: row.get("season"),
        competition_code: (competition != TOTAL_COMPETITION).then_some(competition),
        matches_played: row.get("matches_played"),
        minutes_played: row.get("minutes_played"),
        yellow_cards: row.get("yellow_cards"),
        red_cards: row.get("red_cards"),
        yellows_per_90: row.get("yellows_per_90"),
    }
}

const SEASON_STAT_COLUMNS: &str = r#"
    p.id AS player_id, p.name AS player_name, t.name AS team_name, p.position,
    c.season, c.competition_code, c.matches_played, c.minutes_played,
    c.yellow_cards, c.red_cards, c.yellows_per_90
"#;

pub async fn clear_all_data(pool: &SqlitePool) -> Result<()> {
    for table in [
        "referee_player_history",
        "head_to_head_cards",
        "player_season_cards",
        "team_fouls_stats",
        "team_possession_stats",
        "rivalries",
        "referee_league_stats",
        "league_baselines",
        "referees",
        "players",
        "teams",
    ] {
        sqlx::query(&format!("DELETE FROM {}", table)).execute(pool).await?;
    }
    tracing::info!("All data cleared");
    Ok(())
}

// Team operations

pub async fn get_all_teams(pool: &SqlitePool) -> Result<Vec<Team>> {
    let teams = sqlx::query_as::<_, Team>(
        "SELECT id, name, short_name, tla, competition_code FROM teams ORDER BY competition_code, name",
    )
    .fetch_all(pool)
    .await?;
    Ok(teams)
}

/// Resolve user input to a team: exact name/short name/TLA first, then substring,
/// then the closest Jaro-Winkler match above the threshold.
pub async fn find_team(pool: &SqlitePool, query: &str) -> Result<Option<Team>> {
    let wanted = normalize_name(query);
    if wanted.is_empty() {
        return Ok(None);
    }

    let teams = get_all_teams(pool).await?;

    let names = |team: &Team| -> Vec<String> {
        [Some(&team.name), team.short_name.as_ref(), team.tla.as_ref()]
            .into_iter()
            .flatten()
            .map(|n| normalize_name(n))
            .collect()
    };

    if let Some(team) = teams.iter().find(|t| names(t).iter().any(|n| *n == wanted)) {
        return Ok(Some(team.clone()));
    }

    if let Some(team) = teams
        .iter()
        .find(|t| names(t).iter().any(|n| n.contains(&wanted) && wanted.len() >= 3))
    {
        return Ok(Some(team.clone()));
    }

    let best = teams
        .iter()
        .map(|t| {
            let score = names(t)
                .iter()
                .map(|n| strsim::jaro_winkler(n, &wanted))
                .fold(0.0_f64, f64::max);
            (t, score)
        })
        .filter(|(_, score)| *score >= FUZZY_MATCH_THRESHOLD)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    if let Some((team, score)) = best {
        tracing::debug!("Fuzzy matched '{}' to '{}' ({:.2})", query, team.name, score);
        return Ok(Some(team.clone()));
    }

    Ok(None)
}

/// Full season roster of a team, most-booked first.
pub async fn get_team_players(pool: &SqlitePool, team: &str, season: &str) -> Result<Vec<SeasonCardStat>> {
    let query = format!(
        r#"
        SELECT {SEASON_STAT_COLUMNS}
        FROM player_season_cards c
        JOIN players p ON p.id = c.player_id
        JOIN teams t ON t.id = p.team_id
        WHERE {TEAM_MATCH} AND c.season = ? AND c.competition_code = ?
        ORDER BY c.yellow_cards DESC, p.name
        "#
    );
    let rows = sqlx::query(&query)
        .bind(team)
        .bind(team)
        .bind(season)
        .bind(TOTAL_COMPETITION)
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(season_stat_from_row).collect())
}

/// Season rows of every player whose name contains `player_name`.
pub async fn get_player_season_stats(
    pool: &SqlitePool,
    player_name: &str,
    season: Option<&str>,
) -> Result<Vec<SeasonCardStat>> {
    let query = format!(
        r#"
        SELECT {SEASON_STAT_COLUMNS}
        FROM player_season_cards c
        JOIN players p ON p.id = c.player_id
        JOIN teams t ON t.id = p.team_id
        WHERE LOWER(p.name) LIKE LOWER(?) AND (? IS NULL OR c.season = ?)
        ORDER BY c.season DESC, p.name, c.competition_code
        "#
    );
    let rows = sqlx::query(&query)
        .bind(format!("%{}%", player_name.trim()))
        .bind(season)
        .bind(season)
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(season_stat_from_row).collect())
}

// Referee operations

const REFEREE_SUMMARY_COLUMNS: &str = r#"
    name, nationality, total_matches, total_yellows, total_reds,
    CASE WHEN total_matches > 0 THEN CAST(total_yellows AS REAL) / total_matches ELSE 0.0 END
        AS avg_yellows_per_match
"#;

pub async fn get_referees(pool: &SqlitePool) -> Result<Vec<RefereeSummary>> {
    let query = format!(
        "SELECT {REFEREE_SUMMARY_COLUMNS} FROM referees WHERE total_matches > 0 ORDER BY avg_yellows_per_match DESC"
    );
    let referees = sqlx::query_as::<_, RefereeSummary>(&query).fetch_all(pool).await?;
    Ok(referees)
}

fn referee_profile_from_row(row: &SqliteRow) -> RefereeLeagueProfile {
    let ref_avg: f64 = row.get("ref_avg_yellows");
    let league_avg: f64 = row.get("league_avg_yellows");
    let delta = ref_avg - league_avg;
    RefereeLeagueProfile {
        referee_name: row.get("referee_name"),
        competition_code: row.get("competition_code"),
        matches_in_league: row.get("matches_in_league"),
        ref_avg_yellows: ref_avg,
        league_avg_yellows: league_avg,
        delta,
        classification: classify_referee(delta),
    }
}

const REFEREE_PROFILE_QUERY: &str = r#"
    SELECT r.name AS referee_name, s.competition_code, s.matches_in_league,
           s.ref_avg_yellows, b.avg_yellows_per_match AS league_avg_yellows
    FROM referee_league_stats s
    JOIN referees r ON r.id = s.referee_id
    JOIN league_baselines b ON b.competition_code = s.competition_code
"#;

/// Referees compared with their league average, strictest first.
pub async fn get_referee_rankings(
    pool: &SqlitePool,
    competition: Option<&str>,
) -> Result<Vec<RefereeLeagueProfile>> {
    let query = format!(
        "{REFEREE_PROFILE_QUERY} WHERE (? IS NULL OR UPPER(s.competition_code) = UPPER(?))"
    );
    let rows = sqlx::query(&query)
        .bind(competition)
        .bind(competition)
        .fetch_all(pool)
        .await?;

    let mut profiles: Vec<RefereeLeagueProfile> = rows.iter().map(referee_profile_from_row).collect();
    profiles.sort_by(|a, b| b.delta.partial_cmp(&a.delta).unwrap_or(std::cmp::Ordering::Equal));
    Ok(profiles)
}

// Rivalry operations

const RIVALRY_QUERY: &str = r#"
    SELECT ta.name AS team_a, tb.name AS team_b, rv.rivalry_type, rv.intensity, rv.name
    FROM rivalries rv
    JOIN teams ta ON ta.id = rv.team_a_id
    JOIN teams tb ON tb.id = rv.team_b_id
"#;

fn rivalry_from_row(row: &SqliteRow) -> Result<Rivalry> {
    let raw_type: String = row.get("rivalry_type");
    let rivalry_type = RivalryType::parse(&raw_type)
        .ok_or_else(|| anyhow!("Unknown rivalry type: {}", raw_type))?;
    let intensity: i64 = row.get("intensity");
    Ok(Rivalry {
        team_a: row.get("team_a"),
        team_b: row.get("team_b"),
        rivalry_type,
        intensity: intensity.clamp(1, 3) as u8,
        name: row.get("name"),
    })
}

pub async fn get_rivalries(pool: &SqlitePool) -> Result<Vec<Rivalry>> {
    let query = format!("{RIVALRY_QUERY} ORDER BY rv.intensity DESC, rv.name");
    let rows = sqlx::query(&query).fetch_all(pool).await?;
    rows.iter().map(rivalry_from_row).collect()
}

/// Head-to-head rows of every player whose name contains `player_name`, for the given pair.
pub async fn get_player_head_to_head(
    pool: &SqlitePool,
    player_name: &str,
    team_a: &str,
    team_b: &str,
) -> Result<Vec<PlayerHeadToHead>> {
    let query = format!(
        r#"
        SELECT h.player_id, ta.name AS team_a, tb.name AS team_b,
               h.total_h2h_matches, h.total_yellows, h.total_reds,
               p.name AS player_name, pt.name AS team_name
        FROM head_to_head_cards h
        JOIN players p ON p.id = h.player_id
        JOIN teams pt ON pt.id = p.team_id
        JOIN teams ta ON ta.id = h.team_a_id
        JOIN teams tb ON tb.id = h.team_b_id
        WHERE LOWER(p.name) LIKE LOWER(?) AND ({PAIR_MATCH})
        ORDER BY h.total_yellows DESC, p.name
        "#
    );
    let mut q = sqlx::query(&query).bind(format!("%{}%", player_name.trim()));
    for value in pair_binds(team_a, team_b) {
        q = q.bind(value);
    }
    let rows = q.fetch_all(pool).await?;

    rows.iter()
        .map(|row| {
            Ok(PlayerHeadToHead {
                player_name: row.get("player_name"),
                team_name: row.get("team_name"),
                record: HeadToHeadRecord::from_row(row)?,
            })
        })
        .collect()
}

/// `CardDataSource` backed by the SQLite card-statistics database.
#[derive(Clone)]
pub struct SqliteCardStore {
    pool: SqlitePool,
}

impl SqliteCardStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fouls and possession profile of a team in one season.
    pub async fn team_stats(&self, team: &str, season: &str) -> Result<TeamStatsReport> {
        let (fouls, possession) =
            tokio::try_join!(self.team_fouls(team, season), self.possession_for(team, season))?;
        Ok(TeamStatsReport {
            team_name: team.to_string(),
            season: season.to_string(),
            fouls,
            possession,
        })
    }

    async fn possession_for(&self, team: &str, season: &str) -> Result<Option<TeamPossessionStat>> {
        let query = format!(
            r#"
            SELECT t.name AS team_name, s.season, s.matches_played, s.avg_possession,
                   s.avg_fouls_committed, s.play_style
            FROM team_possession_stats s
            JOIN teams t ON t.id = s.team_id
            WHERE {TEAM_MATCH} AND s.season = ?
            "#
        );
        let row = sqlx::query(&query)
            .bind(team)
            .bind(team)
            .bind(season)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| {
            let avg_possession: f64 = row.get("avg_possession");
            let play_style = row
                .get::<Option<String>, _>("play_style")
                .as_deref()
                .and_then(PlayStyle::parse)
                .unwrap_or_else(|| PlayStyle::from_possession(avg_possession));
            TeamPossessionStat {
                team_name: row.get("team_name"),
                season: row.get("season"),
                matches_played: row.get("matches_played"),
                avg_possession,
                avg_fouls_committed: row.get("avg_fouls_committed"),
                play_style,
            }
        }))
    }
}

impl CardDataSource for SqliteCardStore {
    async fn roster_with_season_stats(
        &self,
        team: &str,
        season: &str,
        competition: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SeasonCardStat>> {
        let query = format!(
            r#"
            SELECT {SEASON_STAT_COLUMNS}
            FROM player_season_cards c
            JOIN players p ON p.id = c.player_id
            JOIN teams t ON t.id = p.team_id
            WHERE {TEAM_MATCH} AND c.season = ? AND c.competition_code = ?
            ORDER BY c.yellow_cards DESC, c.minutes_played ASC
            LIMIT ?
            "#
        );
        let rows = sqlx::query(&query)
            .bind(team)
            .bind(team)
            .bind(season)
            .bind(competition.unwrap_or(TOTAL_COMPETITION))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(season_stat_from_row).collect())
    }

    async fn referee_vs_players(
        &self,
        referee: &str,
        team_a: &str,
        team_b: &str,
    ) -> Result<Vec<RefereePlayerHistory>> {
        let query = format!(
            r#"
            SELECT r.name AS referee_name, p.id AS player_id, p.name AS player_name,
                   t.name AS team_name, h.times_booked, h.matches_with_referee, h.last_booking
            FROM referee_player_history h
            JOIN referees r ON r.id = h.referee_id
            JOIN players p ON p.id = h.player_id
            JOIN teams t ON t.id = p.team_id
            WHERE LOWER(r.name) = LOWER(?) AND ({TEAM_MATCH} OR {TEAM_MATCH})
            ORDER BY h.times_booked DESC
            "#
        );
        let rows = sqlx::query(&query)
            .bind(referee)
            .bind(team_a)
            .bind(team_a)
            .bind(team_b)
            .bind(team_b)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let times_booked: i32 = row.get("times_booked");
                let matches_with_referee: i32 = row.get("matches_with_referee");
                RefereePlayerHistory {
                    referee_name: row.get("referee_name"),
                    player_id: row.get("player_id"),
                    player_name: row.get("player_name"),
                    team_name: row.get("team_name"),
                    times_booked,
                    matches_with_referee,
                    booking_percentage: RefereePlayerHistory::booking_percentage(
                        times_booked,
                        matches_with_referee,
                    ),
                    last_booking: row.get("last_booking"),
                }
            })
            .collect())
    }

    async fn head_to_head(
        &self,
        player_id: &str,
        team_a: &str,
        team_b: &str,
    ) -> Result<Option<HeadToHeadRecord>> {
        let query = format!(
            r#"
            SELECT h.player_id, ta.name AS team_a, tb.name AS team_b,
                   h.total_h2h_matches, h.total_yellows, h.total_reds
            FROM head_to_head_cards h
            JOIN teams ta ON ta.id = h.team_a_id
            JOIN teams tb ON tb.id = h.team_b_id
            WHERE h.player_id = ? AND ({PAIR_MATCH})
            LIMIT 1
            "#
        );
        let mut q = sqlx::query_as::<_, HeadToHeadRecord>(&query).bind(player_id);
        for value in pair_binds(team_a, team_b) {
            q = q.bind(value);
        }
        let record = q.fetch_optional(&self.pool).await?;
        Ok(record)
    }

    async fn team_fouls(&self, team: &str, season: &str) -> Result<Option<TeamFoulsStat>> {
        let query = format!(
            r#"
            SELECT t.name AS team_name, f.season, f.matches_played, f.avg_fouls_per_match,
                   f.avg_yellows_per_match, f.foul_to_card_pct
            FROM team_fouls_stats f
            JOIN teams t ON t.id = f.team_id
            WHERE {TEAM_MATCH} AND f.season = ?
            "#
        );
        let stat = sqlx::query_as::<_, TeamFoulsStat>(&query)
            .bind(team)
            .bind(team)
            .bind(season)
            .fetch_optional(&self.pool)
            .await?;
        Ok(stat)
    }

    async fn team_possession(
        &self,
        team_a: &str,
        team_b: &str,
        season: &str,
    ) -> Result<(Option<TeamPossessionStat>, Option<TeamPossessionStat>)> {
        tokio::try_join!(self.possession_for(team_a, season), self.possession_for(team_b, season))
    }

    async fn derby_lookup(&self, team_a: &str, team_b: &str) -> Result<Option<Rivalry>> {
        let query = format!("{RIVALRY_QUERY} WHERE {PAIR_MATCH} LIMIT 1");
        let mut q = sqlx::query(&query);
        for value in pair_binds(team_a, team_b) {
            q = q.bind(value);
        }
        let row = q.fetch_optional(&self.pool).await?;
        row.as_ref().map(rivalry_from_row).transpose()
    }

    async fn referee_profile(&self, referee: &str) -> Result<Option<RefereeLeagueProfile>> {
        let query = format!(
            "{REFEREE_PROFILE_QUERY} WHERE LOWER(r.name) = LOWER(?) ORDER BY s.matches_in_league DESC LIMIT 1"
        );
        let row = sqlx::query(&query)
            .bind(referee)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(referee_profile_from_row))
    }

    async fn league_baseline(&self, team: &str) -> Result<Option<f64>> {
        let query = format!(
            r#"
            SELECT b.normalization_factor
            FROM teams t
            JOIN league_baselines b ON b.competition_code = t.competition_code
            WHERE {TEAM_MATCH}
            LIMIT 1
            "#
        );
        let factor: Option<f64> = sqlx::query_scalar(&query)
            .bind(team)
            .bind(team)
            .fetch_optional(&self.pool)
            .await?;
        Ok(factor)
    }

    async fn referee_summary(&self, referee: &str) -> Result<Option<RefereeSummary>> {
        let query = format!("SELECT {REFEREE_SUMMARY_COLUMNS} FROM referees WHERE LOWER(name) = LOWER(?)");
        let summary = sqlx::query_as::<_, RefereeSummary>(&query)
            .bind(referee)
            .fetch_optional(&self.pool)
            .await?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RiskConfig;
    use crate::services::{MatchRequest, RiskScorer};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn seeded_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_database_with_pool(&pool).await.unwrap();
        seed_data(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_find_team_variants() {
        let pool = seeded_pool().await;

        let exact = find_team(&pool, "inter").await.unwrap().unwrap();
        assert_eq!(exact.name, "FC Internazionale Milano");

        let tla = find_team(&pool, "JUV").await.unwrap().unwrap();
        assert_eq!(tla.name, "Juventus FC");

        let fuzzy = find_team(&pool, "Tottenham Hotspurs").await.unwrap().unwrap();
        assert_eq!(fuzzy.name, "Tottenham Hotspur FC");

        assert!(find_team(&pool, "zzzz qqqq").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_roster_ordered_and_limited() {
        let pool = seeded_pool().await;
        let store = SqliteCardStore::new(pool);

        let roster = store
            .roster_with_season_stats("Inter", "2025-2026", None, 3)
            .await
            .unwrap();
        assert_eq!(roster.len(), 3);
        assert!(roster.windows(2).all(|w| w[0].yellow_cards >= w[1].yellow_cards));
        assert!(roster.iter().all(|s| s.competition_code.is_none()));
    }

    #[tokio::test]
    async fn test_derby_lookup_is_symmetric() {
        let pool = seeded_pool().await;
        let store = SqliteCardStore::new(pool);

        let forward = store.derby_lookup("AC Milan", "FC Internazionale Milano").await.unwrap();
        let backward = store.derby_lookup("FC Internazionale Milano", "AC Milan").await.unwrap();
        assert_eq!(forward.unwrap().intensity, 3);
        assert_eq!(backward.unwrap().rivalry_type, RivalryType::Derby);

        assert!(store.derby_lookup("AS Roma", "AC Milan").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pair_lookups_accept_short_names() {
        let pool = seeded_pool().await;
        let store = SqliteCardStore::new(pool);

        let rivalry = store.derby_lookup("Inter", "Milan").await.unwrap().unwrap();
        assert_eq!(rivalry.intensity, 3);
        assert!(store.derby_lookup("milan", "FC Internazionale Milano").await.unwrap().is_some());

        let short = store.head_to_head("inter_barella", "Milan", "Inter").await.unwrap().unwrap();
        assert_eq!(short.total_yellows, 5);
        assert!(store
            .head_to_head("inter_barella", "FC Internazionale Milano", "AC Milan")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_analysis_with_short_team_names() {
        let pool = seeded_pool().await;
        let scorer = RiskScorer::new(SqliteCardStore::new(pool), RiskConfig::default()).unwrap();

        let analysis = scorer
            .analyze_match(&MatchRequest::new("Inter", "Milan", None))
            .await
            .unwrap();

        assert!(analysis.derby.is_derby);
        assert_eq!(analysis.multipliers.derby, 1.26);
        // 0.30 yellows/90 clears the head-to-head gate; 2 yellows in 4 derbies.
        let fofana = analysis
            .away_team_top5
            .iter()
            .find(|p| p.player_id == "milan_fofana")
            .unwrap();
        assert_eq!(fofana.breakdown.h2h.score, 50.0);
    }

    #[tokio::test]
    async fn test_player_head_to_head_by_name() {
        let pool = seeded_pool().await;

        let rows = get_player_head_to_head(&pool, "mancini", "Lazio", "Roma").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].player_name, "Gianluca Mancini");
        assert_eq!(rows[0].team_name, "AS Roma");
        assert_eq!(rows[0].record.total_yellows, 6);

        assert!(get_player_head_to_head(&pool, "mancini", "Inter", "Milan")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_team_stats_report() {
        let pool = seeded_pool().await;
        let store = SqliteCardStore::new(pool);

        let report = store.team_stats("Lazio", "2025-2026").await.unwrap();
        assert_eq!(report.fouls.unwrap().foul_to_card_pct, 18.9);
        // No stored label: derived from 49.4% possession.
        assert_eq!(report.possession.unwrap().play_style, PlayStyle::CounterAttack);

        let empty = store.team_stats("Lazio", "1999-2000").await.unwrap();
        assert!(empty.fouls.is_none() && empty.possession.is_none());
    }

    #[tokio::test]
    async fn test_referee_history_for_pair() {
        let pool = seeded_pool().await;
        let store = SqliteCardStore::new(pool);

        let history = store.referee_vs_players("daniele orsato", "Inter", "Milan").await.unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].player_name, "Nicolò Barella");
        assert!((history[0].booking_percentage - 44.444).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_referee_profile_classified_from_delta() {
        let pool = seeded_pool().await;
        let store = SqliteCardStore::new(pool.clone());

        let profile = store.referee_profile("Daniele Orsato").await.unwrap().unwrap();
        assert!(profile.delta >= 1.0);
        assert_eq!(profile.classification, RefereeProfile::StrictOutlier);

        let rankings = get_referee_rankings(&pool, Some("SA")).await.unwrap();
        assert!(rankings.windows(2).all(|w| w[0].delta >= w[1].delta));
        assert!(rankings.iter().all(|p| p.competition_code == "SA"));
    }

    #[tokio::test]
    async fn test_referee_summaries_and_player_search() {
        let pool = seeded_pool().await;

        let referees = get_referees(&pool).await.unwrap();
        assert_eq!(referees.len(), 6);
        assert!(referees
            .windows(2)
            .all(|w| w[0].avg_yellows_per_match >= w[1].avg_yellows_per_match));

        let rows = get_player_season_stats(&pool, "barella", None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].team_name, "FC Internazionale Milano");
        assert_eq!(rows[0].position, Some(Position::Midfield));

        let none = get_player_season_stats(&pool, "barella", Some("1999-2000")).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_league_baseline_by_team_competition() {
        let pool = seeded_pool().await;
        let store = SqliteCardStore::new(pool);
        let factor = store.league_baseline("Lazio").await.unwrap().unwrap();
        assert!((0.89..=1.30).contains(&factor));
        assert!(store.league_baseline("Unknown FC").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_analysis_against_seeded_store() {
        let pool = seeded_pool().await;
        let scorer = RiskScorer::new(SqliteCardStore::new(pool), RiskConfig::default()).unwrap();

        let analysis = scorer
            .analyze_match(&MatchRequest::new(
                "FC Internazionale Milano",
                "AC Milan",
                Some("Daniele Orsato"),
            ))
            .await
            .unwrap();

        assert!(analysis.derby.is_derby);
        assert_eq!(analysis.multipliers.derby, 1.26);
        assert_eq!(analysis.overall_top5.len(), 5);
        assert!(!analysis.home_team_top5.is_empty());
        assert!(!analysis.away_team_top5.is_empty());
        assert!(analysis.possession.home_style.is_some());

        let referee = analysis.referee.unwrap();
        assert_eq!(referee.profile.unwrap().classification, RefereeProfile::StrictOutlier);
        assert!(referee.summary.is_some());
        assert!(analysis.degraded.is_empty(), "unexpected degraded signals: {:?}", analysis.degraded);
    }

    #[tokio::test]
    async fn test_unknown_teams_are_insufficient_data() {
        let pool = seeded_pool().await;
        let scorer = RiskScorer::new(SqliteCardStore::new(pool), RiskConfig::default()).unwrap();
        let result = scorer
            .analyze_match(&MatchRequest::new("Nowhere United", "Atlantis FC", None))
            .await;
        assert!(matches!(
            result,
            Err(crate::services::RiskError::InsufficientData { .. })
        ));
    }
}
