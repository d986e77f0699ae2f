use anyhow::Result;
use std::io::Write;

use crate::config::RiskConfig;
use crate::db::{
    clear_all_data, create_pool, find_team, get_all_teams, get_player_head_to_head,
    get_player_season_stats, get_referee_rankings, get_referees, get_rivalries, get_team_players,
    init_database_with_pool, seed_data, SqliteCardStore,
};
use crate::models::{MatchRiskAnalysis, PlayStyle, PlayerRisk, RefereeFactor, Side};
use crate::services::{CardDataSource, MatchRequest, RiskScorer};
use crate::utils::{format_multiplier, score_bar};

fn side_label(side: Side) -> &'static str {
    match side {
        Side::Home => "home",
        Side::Away => "away",
    }
}

/// Resolve user input to a stored team name, printing suggestions when nothing matches.
async fn resolve_team(pool: &sqlx::SqlitePool, query: &str) -> Result<Option<String>> {
    if let Some(team) = find_team(pool, query).await? {
        return Ok(Some(team.name));
    }

    println!("❌ No team found matching '{}'", query);
    println!("\n💡 Available teams:");
    for team in get_all_teams(pool).await? {
        println!(
            "   • {} ({})",
            team.name,
            team.competition_code.as_deref().unwrap_or("-")
        );
    }
    Ok(None)
}

pub async fn analyze_match(
    home: &str,
    away: &str,
    referee: Option<&str>,
    season: Option<&str>,
    export: Option<&str>,
) -> Result<()> {
    let pool = create_pool().await?;

    let Some(home_team) = resolve_team(&pool, home).await? else {
        return Ok(());
    };
    let Some(away_team) = resolve_team(&pool, away).await? else {
        return Ok(());
    };

    let mut config = RiskConfig::from_env();
    if let Some(season) = season {
        config.season = season.to_string();
    }

    println!("🟨 Analyzing {} vs {} ({})...", home_team, away_team, config.season);

    let scorer = RiskScorer::new(SqliteCardStore::new(pool), config)?;
    let analysis = scorer
        .analyze_match(&MatchRequest::new(&home_team, &away_team, referee))
        .await?;

    print_analysis(&analysis);

    if let Some(format) = export {
        if !format.eq_ignore_ascii_case("csv") {
            println!("❌ Unsupported export format: {}. Use 'csv'", format);
            return Ok(());
        }
        tokio::fs::create_dir_all("data/exports").await?;
        let file_path = format!(
            "data/exports/risk_{}_{}.csv",
            analysis.generated_at.format("%Y%m%d_%H%M%S"),
            &analysis.analysis_id[..8]
        );
        let file = std::fs::File::create(&file_path)?;
        write_ranking_csv(file, &analysis.overall_top5)?;
        println!("\n💾 Ranking exported to {}", file_path);
    }

    Ok(())
}

fn print_analysis(analysis: &MatchRiskAnalysis) {
    println!("\n📋 {} | season {}", analysis.match_label, analysis.season);

    match &analysis.referee {
        Some(referee) => {
            print!("👨‍⚖️ Referee: {}", referee.name);
            if let Some(summary) = &referee.summary {
                print!(
                    " ({} matches, {:.2} yellows/match)",
                    summary.total_matches, summary.avg_yellows_per_match
                );
            }
            println!();
            if let Some(profile) = &referee.profile {
                println!(
                    "   Profile: {} ({:+.2} vs {} average)",
                    profile.classification.as_str(),
                    profile.delta,
                    profile.competition_code
                );
            }
        }
        None => {
            if let Some(note) = &analysis.referee_note {
                println!("👨‍⚖️ {}", note);
            }
        }
    }

    if analysis.derby.is_derby {
        println!(
            "🔥 {} (intensity {}) {}",
            analysis.derby.name.as_deref().unwrap_or("Rivalry"),
            analysis.derby.intensity.unwrap_or(1),
            format_multiplier(analysis.multipliers.derby)
        );
    }

    let possession = &analysis.possession;
    println!(
        "⚽ Possession: home {} {} | away {} {}",
        possession_label(possession.home_avg, possession.home_style),
        format_multiplier(possession.home_factor),
        possession_label(possession.away_avg, possession.away_style),
        format_multiplier(possession.away_factor)
    );
    if analysis.multipliers.referee_adjustment != 1.0 {
        println!(
            "📈 Referee adjustment {}",
            format_multiplier(analysis.multipliers.referee_adjustment)
        );
    }

    println!("\n🎯 Top {} overall ({} players evaluated):", analysis.overall_top5.len(), analysis.players_evaluated);
    for (i, player) in analysis.overall_top5.iter().enumerate() {
        print_player(i + 1, player);
    }

    for (label, players) in [
        (&analysis.home_team, &analysis.home_team_top5),
        (&analysis.away_team, &analysis.away_team_top5),
    ] {
        println!("\n🏟️  {}:", label);
        for (i, player) in players.iter().enumerate() {
            print_player(i + 1, player);
        }
    }

    if !analysis.degraded.is_empty() {
        println!("\n⚠️  Degraded signals:");
        for signal in &analysis.degraded {
            println!("   • {}: {}", signal.signal, signal.reason);
        }
    }
}

fn possession_label(avg: Option<f64>, style: Option<PlayStyle>) -> String {
    match (avg, style) {
        (Some(avg), Some(style)) => format!("{:.1}% {}", avg, style.as_str()),
        (Some(avg), None) => format!("{:.1}%", avg),
        _ => "n/a".to_string(),
    }
}

fn print_player(rank: usize, player: &PlayerRisk) {
    let b = &player.breakdown;
    println!(
        "{}. {} {:>5.1}  {} ({}, {})",
        rank,
        score_bar(player.combined_score),
        player.combined_score,
        player.name,
        player.team,
        player.position.map_or("-", |p| p.as_str())
    );
    let referee = match &b.referee {
        RefereeFactor::Present { score, .. } => format!("{:.1}", score),
        RefereeFactor::Absent => "-".to_string(),
    };
    println!(
        "   seasonal {:.1} ({} yellows, {:.2}/90) | referee {} | h2h {:.1} | fouls {:.1}",
        b.seasonal.score, b.seasonal.yellows, b.seasonal.per_90, referee, b.h2h.score, b.fouls.score
    );
}

/// One CSV row per ranked player, factor scores as displayed.
pub fn write_ranking_csv<W: Write>(writer: W, players: &[PlayerRisk]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record([
        "rank",
        "player",
        "team",
        "side",
        "position",
        "season_yellows",
        "seasonal",
        "referee",
        "h2h",
        "fouls",
        "base_score",
        "combined_score",
    ])?;

    for (i, player) in players.iter().enumerate() {
        let b = &player.breakdown;
        writer.write_record([
            (i + 1).to_string(),
            player.name.clone(),
            player.team.clone(),
            side_label(player.side).to_string(),
            player.position.map_or(String::new(), |p| p.as_str().to_string()),
            player.season_yellows.to_string(),
            format!("{:.1}", b.seasonal.score),
            b.referee.score().map_or(String::new(), |s| format!("{:.1}", s)),
            format!("{:.1}", b.h2h.score),
            format!("{:.1}", b.fouls.score),
            format!("{:.1}", player.base_score),
            format!("{:.1}", player.combined_score),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub async fn list_team_players(team: &str, season: Option<&str>) -> Result<()> {
    let pool = create_pool().await?;
    let Some(team_name) = resolve_team(&pool, team).await? else {
        return Ok(());
    };
    let season = season.map_or_else(|| RiskConfig::from_env().season, str::to_string);

    let players = get_team_players(&pool, &team_name, &season).await?;
    if players.is_empty() {
        println!("📭 No season statistics for {} in {}", team_name, season);
        return Ok(());
    }

    println!("📊 {} | {} ({} players)\n", team_name, season, players.len());
    for stat in &players {
        println!(
            "   {:<26} {:<11} {:>2} 🟨 {:>1} 🟥 {:>4} min  {:.2}/90",
            stat.player_name,
            stat.position.map_or("-", |p| p.as_str()),
            stat.yellow_cards,
            stat.red_cards,
            stat.minutes_played,
            stat.effective_yellows_per_90()
        );
    }
    Ok(())
}

pub async fn query_player(name: &str, season: Option<&str>) -> Result<()> {
    let pool = create_pool().await?;

    println!("🔍 Searching for player: {}", name);
    let rows = get_player_season_stats(&pool, name, season).await?;
    if rows.is_empty() {
        println!("❌ No players found matching '{}'", name);
        return Ok(());
    }

    for stat in &rows {
        println!(
            "\n👤 {} ({}, {})",
            stat.player_name,
            stat.team_name,
            stat.position.map_or("-", |p| p.as_str())
        );
        println!(
            "   {} {}: {} matches, {} minutes",
            stat.season,
            stat.competition_code.as_deref().unwrap_or("all competitions"),
            stat.matches_played,
            stat.minutes_played
        );
        println!(
            "   Cards: {} yellow, {} red ({:.2} yellows/90)",
            stat.yellow_cards,
            stat.red_cards,
            stat.effective_yellows_per_90()
        );
    }
    Ok(())
}

pub async fn list_referees(competition: Option<&str>) -> Result<()> {
    let pool = create_pool().await?;
    let rankings = get_referee_rankings(&pool, competition).await?;

    if rankings.is_empty() {
        println!("📭 No referee comparisons found. Try seeding first with: yelloworacle seed");
        return Ok(());
    }

    println!("👨‍⚖️ Referees by strictness vs league average:\n");
    for (i, profile) in rankings.iter().enumerate() {
        println!(
            "{:>2}. {:<22} {:<4} {:>3} matches  {:.2} vs {:.2}  {:+.2}  {}",
            i + 1,
            profile.referee_name,
            profile.competition_code,
            profile.matches_in_league,
            profile.ref_avg_yellows,
            profile.league_avg_yellows,
            profile.delta,
            profile.classification.as_str()
        );
    }

    let careers = get_referees(&pool).await?;
    if !careers.is_empty() {
        println!("\n📊 Career totals:\n");
        for summary in &careers {
            println!(
                "   {:<22} {:<8} {:>3} matches  {:>3} 🟨 {:>2} 🟥  {:.2}/match",
                summary.name,
                summary.nationality.as_deref().unwrap_or("-"),
                summary.total_matches,
                summary.total_yellows,
                summary.total_reds,
                summary.avg_yellows_per_match
            );
        }
    }
    Ok(())
}

pub async fn team_stats(team: &str, season: Option<&str>) -> Result<()> {
    let pool = create_pool().await?;
    let Some(team_name) = resolve_team(&pool, team).await? else {
        return Ok(());
    };
    let season = season.map_or_else(|| RiskConfig::from_env().season, str::to_string);

    let report = SqliteCardStore::new(pool).team_stats(&team_name, &season).await?;

    println!("📊 {} | {}\n", report.team_name, report.season);
    match &report.fouls {
        Some(f) => println!(
            "   Fouls: {:.1}/match, {:.1} yellows/match, {:.1}% of fouls carded ({} matches)",
            f.avg_fouls_per_match, f.avg_yellows_per_match, f.foul_to_card_pct, f.matches_played
        ),
        None => println!("   Fouls: no data"),
    }
    match &report.possession {
        Some(p) => println!(
            "   Possession: {} ({} matches)",
            possession_label(Some(p.avg_possession), Some(p.play_style)),
            p.matches_played
        ),
        None => println!("   Possession: no data"),
    }
    Ok(())
}

pub async fn referee_history(referee: &str, team_a: &str, team_b: &str) -> Result<()> {
    let pool = create_pool().await?;
    let Some(a) = resolve_team(&pool, team_a).await? else {
        return Ok(());
    };
    let Some(b) = resolve_team(&pool, team_b).await? else {
        return Ok(());
    };

    let history = SqliteCardStore::new(pool).referee_vs_players(referee, &a, &b).await?;
    if history.is_empty() {
        println!("📭 No history for {} with {} or {} players", referee, a, b);
        return Ok(());
    }

    println!("👨‍⚖️ {} with {} / {} players:\n", referee, a, b);
    for h in &history {
        println!(
            "   {:<26} {:<26} {}/{} booked ({:.1}%)  last {}",
            h.player_name,
            h.team_name,
            h.times_booked,
            h.matches_with_referee,
            h.booking_percentage,
            h.last_booking.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

pub async fn head_to_head(player: &str, team_a: &str, team_b: &str) -> Result<()> {
    let pool = create_pool().await?;
    let Some(a) = resolve_team(&pool, team_a).await? else {
        return Ok(());
    };
    let Some(b) = resolve_team(&pool, team_b).await? else {
        return Ok(());
    };

    let rows = get_player_head_to_head(&pool, player, &a, &b).await?;
    if rows.is_empty() {
        println!("📭 No head-to-head cards for '{}' in {} vs {}", player, a, b);
        return Ok(());
    }

    for row in &rows {
        let r = &row.record;
        println!(
            "⚔️  {} ({}): {} yellows, {} reds in {} matches ({} vs {})",
            row.player_name,
            row.team_name,
            r.total_yellows,
            r.total_reds,
            r.total_h2h_matches,
            r.team_a,
            r.team_b
        );
    }
    Ok(())
}

pub async fn list_rivalries() -> Result<()> {
    let pool = create_pool().await?;
    let rivalries = get_rivalries(&pool).await?;

    if rivalries.is_empty() {
        println!("📭 No rivalries stored.");
        return Ok(());
    }

    println!("🔥 Rivalries:\n");
    for rivalry in &rivalries {
        println!(
            "   {} | {} vs {} | {} | intensity {}",
            rivalry.name.as_deref().unwrap_or("-"),
            rivalry.team_a,
            rivalry.team_b,
            rivalry.rivalry_type.as_str(),
            rivalry.intensity
        );
    }
    Ok(())
}

pub async fn seed_database(reset: bool) -> Result<()> {
    let pool = create_pool().await?;
    init_database_with_pool(&pool).await?;
    if reset {
        println!("🧹 Clearing existing data...");
        clear_all_data(&pool).await?;
    }
    seed_data(&pool).await?;
    println!("✅ Demo data ready. Try: yelloworacle analyze --home Inter --away Milan --referee \"Daniele Orsato\"");
    Ok(())
}
