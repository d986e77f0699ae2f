use thiserror::Error;

/// Outcomes of a risk analysis that are surfaced to the caller instead of a ranking.
#[derive(Error, Debug)]
pub enum RiskError {
    #[error("home and away team are the same: {0}")]
    SameTeam(String),

    #[error("team name is required ({0})")]
    MissingTeam(&'static str),

    #[error("invalid scoring configuration: {0}")]
    InvalidConfig(String),

    #[error("insufficient data: no roster statistics for {home} or {away}")]
    InsufficientData { home: String, away: String },
}

pub type RiskResult<T> = std::result::Result<T, RiskError>;
