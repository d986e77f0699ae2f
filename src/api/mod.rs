use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::RiskConfig;
use crate::db::{
    create_pool, find_team, get_all_teams, get_player_head_to_head, get_player_season_stats,
    get_referee_rankings, get_rivalries, get_team_players, init_database_with_pool, SqliteCardStore,
};
use crate::models::{
    ApiResponse, MatchRiskAnalysis, PlayerHeadToHead, RefereeLeagueProfile, RefereePlayerHistory,
    Rivalry, SeasonCardStat, Team, TeamStatsReport,
};
use crate::services::{CardDataSource, MatchRequest, RiskError, RiskScorer};
use crate::utils::{normalize_name, validate_team_name};

type ApiError = (StatusCode, Json<ApiResponse<()>>);
type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: RiskConfig,
}

pub async fn serve(port: u16) -> anyhow::Result<()> {
    let pool = create_pool().await?;
    init_database_with_pool(&pool).await?;

    let config = RiskConfig::from_env();
    config.validate()?;

    let app = create_router().with_state(AppState { pool, config });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("YellowOracle API server listening on port {}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/analysis", get(analysis_handler))
        .route("/teams", get(teams_handler))
        .route("/teams/{name}/players", get(team_players_handler))
        .route("/teams/{name}/stats", get(team_stats_handler))
        .route("/players/{name}/stats", get(player_stats_handler))
        .route("/players/{name}/h2h", get(player_h2h_handler))
        .route("/referees", get(referees_handler))
        .route("/referees/{name}/history", get(referee_history_handler))
        .route("/rivalries", get(rivalries_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ApiResponse::error(message.into())))
}

fn internal_error(context: &str, e: anyhow::Error) -> ApiError {
    tracing::error!("{}: {}", context, e);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, context)
}

fn risk_error_status(e: &RiskError) -> StatusCode {
    match e {
        RiskError::SameTeam(_) | RiskError::MissingTeam(_) => StatusCode::BAD_REQUEST,
        RiskError::InsufficientData { .. } => StatusCode::NOT_FOUND,
        RiskError::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn resolve_team_name(pool: &SqlitePool, query: &str) -> Result<String, ApiError> {
    match find_team(pool, query).await {
        Ok(Some(team)) => Ok(team.name),
        Ok(None) => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("No team found matching '{}'", query),
        )),
        Err(e) => Err(internal_error("Failed to resolve team", e)),
    }
}

async fn health_check() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("YellowOracle API is running"))
}

// GET /analysis?home=Inter&away=Milan&referee=Daniele%20Orsato
#[derive(Deserialize)]
struct AnalysisQuery {
    home: String,
    away: String,
    referee: Option<String>,
    season: Option<String>,
}

async fn analysis_handler(
    State(state): State<AppState>,
    Query(params): Query<AnalysisQuery>,
) -> ApiResult<MatchRiskAnalysis> {
    if !validate_team_name(&params.home) || !validate_team_name(&params.away) {
        return Err(error_response(StatusCode::BAD_REQUEST, "home and away must be valid team names"));
    }
    if normalize_name(&params.home) == normalize_name(&params.away) {
        let e = RiskError::SameTeam(params.home.trim().to_string());
        return Err(error_response(risk_error_status(&e), e.to_string()));
    }

    let home = resolve_team_name(&state.pool, &params.home).await?;
    let away = resolve_team_name(&state.pool, &params.away).await?;

    let mut config = state.config.clone();
    if let Some(season) = params.season.filter(|s| !s.trim().is_empty()) {
        config.season = season;
    }

    let scorer = RiskScorer::new(SqliteCardStore::new(state.pool.clone()), config)
        .map_err(|e| error_response(risk_error_status(&e), e.to_string()))?;

    let referee = params.referee.as_deref().filter(|r| !r.trim().is_empty());
    match scorer.analyze_match(&MatchRequest::new(&home, &away, referee)).await {
        Ok(analysis) => Ok(Json(ApiResponse::success(analysis))),
        Err(e) => {
            tracing::warn!("Analysis {} vs {} rejected: {}", home, away, e);
            Err(error_response(risk_error_status(&e), e.to_string()))
        }
    }
}

async fn teams_handler(State(state): State<AppState>) -> ApiResult<Vec<Team>> {
    get_all_teams(&state.pool)
        .await
        .map(|teams| Json(ApiResponse::success(teams)))
        .map_err(|e| internal_error("Failed to fetch teams", e))
}

#[derive(Deserialize)]
struct SeasonQuery {
    season: Option<String>,
}

// GET /teams/{name}/players
async fn team_players_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<SeasonQuery>,
) -> ApiResult<Vec<SeasonCardStat>> {
    let team = resolve_team_name(&state.pool, &name).await?;
    let season = params.season.unwrap_or_else(|| state.config.season.clone());

    get_team_players(&state.pool, &team, &season)
        .await
        .map(|players| Json(ApiResponse::success(players)))
        .map_err(|e| internal_error("Failed to fetch team players", e))
}

// GET /players/{name}/stats
async fn player_stats_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<SeasonQuery>,
) -> ApiResult<Vec<SeasonCardStat>> {
    match get_player_season_stats(&state.pool, &name, params.season.as_deref()).await {
        Ok(rows) if rows.is_empty() => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("No players found matching '{}'", name),
        )),
        Ok(rows) => Ok(Json(ApiResponse::success(rows))),
        Err(e) => Err(internal_error("Failed to fetch player stats", e)),
    }
}

// GET /teams/{name}/stats
async fn team_stats_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<SeasonQuery>,
) -> ApiResult<TeamStatsReport> {
    let team = resolve_team_name(&state.pool, &name).await?;
    let season = params.season.unwrap_or_else(|| state.config.season.clone());

    SqliteCardStore::new(state.pool.clone())
        .team_stats(&team, &season)
        .await
        .map(|report| Json(ApiResponse::success(report)))
        .map_err(|e| internal_error("Failed to fetch team stats", e))
}

#[derive(Deserialize)]
struct PairQuery {
    team_a: String,
    team_b: String,
}

async fn resolve_pair(pool: &SqlitePool, params: &PairQuery) -> Result<(String, String), ApiError> {
    let team_a = resolve_team_name(pool, &params.team_a).await?;
    let team_b = resolve_team_name(pool, &params.team_b).await?;
    Ok((team_a, team_b))
}

// GET /players/{name}/h2h?team_a=Roma&team_b=Lazio
async fn player_h2h_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<PairQuery>,
) -> ApiResult<Vec<PlayerHeadToHead>> {
    let (team_a, team_b) = resolve_pair(&state.pool, &params).await?;

    get_player_head_to_head(&state.pool, &name, &team_a, &team_b)
        .await
        .map(|rows| Json(ApiResponse::success(rows)))
        .map_err(|e| internal_error("Failed to fetch head-to-head cards", e))
}

// GET /referees/{name}/history?team_a=Inter&team_b=Milan
async fn referee_history_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<PairQuery>,
) -> ApiResult<Vec<RefereePlayerHistory>> {
    let (team_a, team_b) = resolve_pair(&state.pool, &params).await?;

    SqliteCardStore::new(state.pool.clone())
        .referee_vs_players(&name, &team_a, &team_b)
        .await
        .map(|rows| Json(ApiResponse::success(rows)))
        .map_err(|e| internal_error("Failed to fetch referee history", e))
}

#[derive(Deserialize)]
struct RefereesQuery {
    competition: Option<String>,
}

async fn referees_handler(
    State(state): State<AppState>,
    Query(params): Query<RefereesQuery>,
) -> ApiResult<Vec<RefereeLeagueProfile>> {
    get_referee_rankings(&state.pool, params.competition.as_deref())
        .await
        .map(|profiles| Json(ApiResponse::success(profiles)))
        .map_err(|e| internal_error("Failed to fetch referees", e))
}

async fn rivalries_handler(State(state): State<AppState>) -> ApiResult<Vec<Rivalry>> {
    get_rivalries(&state.pool)
        .await
        .map(|rivalries| Json(ApiResponse::success(rivalries)))
        .map_err(|e| internal_error("Failed to fetch rivalries", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::seed_data;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn seeded_state() -> AppState {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_database_with_pool(&pool).await.unwrap();
        seed_data(&pool).await.unwrap();
        AppState { pool, config: RiskConfig::default() }
    }

    fn analysis_query(home: &str, away: &str, referee: Option<&str>) -> Query<AnalysisQuery> {
        Query(AnalysisQuery {
            home: home.to_string(),
            away: away.to_string(),
            referee: referee.map(str::to_string),
            season: None,
        })
    }

    #[test]
    fn test_risk_error_status_mapping() {
        assert_eq!(risk_error_status(&RiskError::SameTeam("Inter".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            risk_error_status(&RiskError::InsufficientData { home: "a".into(), away: "b".into() }),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_analysis_resolves_short_names() {
        let state = seeded_state().await;
        let Json(response) = analysis_handler(State(state), analysis_query("Roma", "lazio", None))
            .await
            .unwrap();

        let analysis = response.data.unwrap();
        assert_eq!(analysis.home_team, "AS Roma");
        assert_eq!(analysis.away_team, "SS Lazio");
        assert!(analysis.derby.is_derby);
        assert!(analysis.referee_note.is_some());
    }

    #[tokio::test]
    async fn test_analysis_same_team_is_bad_request() {
        let state = seeded_state().await;
        let err = analysis_handler(State(state), analysis_query("Inter", "FC Internazionale Milano", None))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_team_is_not_found() {
        let state = seeded_state().await;
        let err = analysis_handler(State(state), analysis_query("Inter", "Qwertyuiop", None))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_router_builds() {
        let _router: Router = create_router().with_state(AppState {
            pool: SqlitePool::connect_lazy("sqlite::memory:").unwrap(),
            config: RiskConfig::default(),
        });
    }

    #[tokio::test]
    async fn test_same_team_rejected_before_store_access() {
        // No schema: any lookup would fail with a 500.
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let state = AppState { pool, config: RiskConfig::default() };
        let err = analysis_handler(State(state), analysis_query(" inter ", "INTER", None))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_team_stats_endpoint() {
        let state = seeded_state().await;
        let Json(response) = team_stats_handler(
            State(state),
            Path("inter".to_string()),
            Query(SeasonQuery { season: None }),
        )
        .await
        .unwrap();
        let report = response.data.unwrap();
        assert_eq!(report.team_name, "FC Internazionale Milano");
        assert!(report.fouls.is_some());
        assert!(report.possession.is_some());
    }

    #[tokio::test]
    async fn test_pair_lookups_resolve_team_input() {
        let state = seeded_state().await;
        let pair = || PairQuery { team_a: "milan".to_string(), team_b: "Inter".to_string() };

        let Json(history) = referee_history_handler(
            State(state.clone()),
            Path("Daniele Orsato".to_string()),
            Query(pair()),
        )
        .await
        .unwrap();
        assert_eq!(history.data.unwrap().len(), 4);

        let Json(h2h) = player_h2h_handler(State(state), Path("Barella".to_string()), Query(pair()))
            .await
            .unwrap();
        let rows = h2h.data.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].record.total_h2h_matches, 12);
    }

    #[tokio::test]
    async fn test_rivalries_listed() {
        let state = seeded_state().await;
        let Json(response) = rivalries_handler(State(state)).await.unwrap();
        let rivalries = response.data.unwrap();
        assert_eq!(rivalries.len(), 6);
        assert_eq!(rivalries[0].intensity, 3);
    }
}
