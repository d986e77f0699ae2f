mod api;
mod cli;
mod config;
mod db;
mod models;
mod services;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "yelloworacle")]
#[command(about = "Yellow-card risk analysis for football matches")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
    /// Rank the players most likely to be booked in a match
    Analyze {
        #[arg(long)]
        home: String,
        #[arg(long)]
        away: String,
        #[arg(short, long)]
        referee: Option<String>,
        #[arg(short, long)]
        season: Option<String>,
        /// Export the overall ranking (csv)
        #[arg(short, long)]
        export: Option<String>,
    },
    /// List a team's players with season card statistics
    Players {
        #[arg(short, long)]
        team: String,
        #[arg(short, long)]
        season: Option<String>,
    },
    /// Query a player's season card statistics
    Player {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        season: Option<String>,
    },
    /// Team fouls and possession statistics
    TeamStats {
        #[arg(short, long)]
        team: String,
        #[arg(short, long)]
        season: Option<String>,
    },
    /// A player's card record in matches between two teams
    H2h {
        #[arg(short, long)]
        player: String,
        #[arg(long)]
        team_a: String,
        #[arg(long)]
        team_b: String,
    },
    /// A referee's booking history with the players of two teams
    RefereeHistory {
        #[arg(short, long)]
        referee: String,
        #[arg(long)]
        team_a: String,
        #[arg(long)]
        team_b: String,
    },
    /// Rank referees against their league average
    Referees {
        #[arg(short, long)]
        competition: Option<String>,
    },
    /// List known rivalries
    Rivalries,
    /// Initialize the database
    InitDb,
    /// Initialize the database and load demo data
    Seed {
        /// Delete existing data before seeding
        #[arg(long)]
        reset: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { port }) => {
            tracing::info!("Starting YellowOracle API server on port {}", port);
            api::serve(port).await?;
        }
        Some(Commands::Analyze { home, away, referee, season, export }) => {
            tracing::info!("Analyzing {} vs {}", home, away);
            cli::analyze_match(
                &home,
                &away,
                referee.as_deref(),
                season.as_deref(),
                export.as_deref(),
            )
            .await?;
        }
        Some(Commands::Players { team, season }) => {
            cli::list_team_players(&team, season.as_deref()).await?;
        }
        Some(Commands::Player { name, season }) => {
            cli::query_player(&name, season.as_deref()).await?;
        }
        Some(Commands::TeamStats { team, season }) => {
            cli::team_stats(&team, season.as_deref()).await?;
        }
        Some(Commands::H2h { player, team_a, team_b }) => {
            cli::head_to_head(&player, &team_a, &team_b).await?;
        }
        Some(Commands::RefereeHistory { referee, team_a, team_b }) => {
            cli::referee_history(&referee, &team_a, &team_b).await?;
        }
        Some(Commands::Referees { competition }) => {
            cli::list_referees(competition.as_deref()).await?;
        }
        Some(Commands::Rivalries) => {
            cli::list_rivalries().await?;
        }
        Some(Commands::InitDb) => {
            tracing::info!("Initializing database...");
            db::init_database().await?;
        }
        Some(Commands::Seed { reset }) => {
            tracing::info!("Seeding demo data...");
            cli::seed_database(reset).await?;
        }
        None => {
            // Default to serving
            tracing::info!("Starting YellowOracle API server on port 3000");
            api::serve(3000).await?;
        }
    }

    Ok(())
}
