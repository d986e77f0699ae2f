use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::DEFAULT_SEASON;
use crate::models::Team;
use crate::utils::round2;

/// (id, name, position, matches, minutes, yellows, reds)
type PlayerRow = (&'static str, &'static str, &'static str, i32, i32, i32, i32);

/// (team id, matches, avg fouls, avg yellows, foul-to-card %)
type FoulsRow = (&'static str, i32, f64, f64, f64);

/// (team id, matches, avg possession, avg fouls committed, stored play style)
type PossessionRow = (&'static str, i32, f64, Option<f64>, Option<&'static str>);

fn per_90(yellows: i32, minutes: i32) -> Option<f64> {
    (minutes > 0).then(|| round2(yellows as f64 * 90.0 / minutes as f64))
}

async fn insert_team_raw(pool: &SqlitePool, team: &Team) -> Result<()> {
    sqlx::query(
        r#"INSERT OR REPLACE INTO teams (id,name,short_name,tla,competition_code)
           VALUES (?,?,?,?,?)"#,
    )
    .bind(&team.id)
    .bind(&team.name)
    .bind(&team.short_name)
    .bind(&team.tla)
    .bind(&team.competition_code)
    .execute(pool)
    .await?;
    Ok(())
}

async fn insert_players_raw(pool: &SqlitePool, team_id: &str, players: &[PlayerRow]) -> Result<()> {
    for (id, name, position, matches, minutes, yellows, reds) in players {
        sqlx::query("INSERT OR REPLACE INTO players (id,name,team_id,position) VALUES (?,?,?,?)")
            .bind(id)
            .bind(name)
            .bind(team_id)
            .bind(position)
            .execute(pool)
            .await?;

        sqlx::query(
            r#"INSERT OR REPLACE INTO player_season_cards
               (player_id,season,competition_code,matches_played,minutes_played,yellow_cards,red_cards,yellows_per_90)
               VALUES (?,?,'TOTAL',?,?,?,?,?)"#,
        )
        .bind(id)
        .bind(DEFAULT_SEASON)
        .bind(matches)
        .bind(minutes)
        .bind(yellows)
        .bind(reds)
        .bind(per_90(*yellows, *minutes))
        .execute(pool)
        .await?;
    }
    Ok(())
}

async fn insert_referee_raw(
    pool: &SqlitePool,
    (id, name, nationality, matches, yellows, reds): (&str, &str, &str, i32, i32, i32),
) -> Result<()> {
    sqlx::query(
        r#"INSERT OR REPLACE INTO referees (id,name,nationality,total_matches,total_yellows,total_reds)
           VALUES (?,?,?,?,?,?)"#,
    )
    .bind(id)
    .bind(name)
    .bind(nationality)
    .bind(matches)
    .bind(yellows)
    .bind(reds)
    .execute(pool)
    .await?;
    Ok(())
}

async fn insert_referee_league_raw(
    pool: &SqlitePool,
    (referee_id, competition, matches, avg): (&str, &str, i32, f64),
) -> Result<()> {
    sqlx::query(
        r#"INSERT OR REPLACE INTO referee_league_stats (referee_id,competition_code,matches_in_league,ref_avg_yellows)
           VALUES (?,?,?,?)"#,
    )
    .bind(referee_id)
    .bind(competition)
    .bind(matches)
    .bind(avg)
    .execute(pool)
    .await?;
    Ok(())
}

async fn insert_referee_history_raw(
    pool: &SqlitePool,
    (referee_id, player_id, booked, matches, last): (&str, &str, i32, i32, Option<&str>),
) -> Result<()> {
    sqlx::query(
        r#"INSERT OR REPLACE INTO referee_player_history
           (referee_id,player_id,times_booked,matches_with_referee,last_booking)
           VALUES (?,?,?,?,?)"#,
    )
    .bind(referee_id)
    .bind(player_id)
    .bind(booked)
    .bind(matches)
    .bind(last)
    .execute(pool)
    .await?;
    Ok(())
}

async fn insert_h2h_raw(
    pool: &SqlitePool,
    (player_id, team_a, team_b, matches, yellows, reds): (&str, &str, &str, i32, i32, i32),
) -> Result<()> {
    sqlx::query(
        r#"INSERT OR REPLACE INTO head_to_head_cards
           (player_id,team_a_id,team_b_id,total_h2h_matches,total_yellows,total_reds)
           VALUES (?,?,?,?,?,?)"#,
    )
    .bind(player_id)
    .bind(team_a)
    .bind(team_b)
    .bind(matches)
    .bind(yellows)
    .bind(reds)
    .execute(pool)
    .await?;
    Ok(())
}

async fn insert_team_profiles_raw(
    pool: &SqlitePool,
    fouls: &[FoulsRow],
    possession: &[PossessionRow],
) -> Result<()> {
    for (team_id, matches, avg_fouls, avg_yellows, pct) in fouls {
        sqlx::query(
            r#"INSERT OR REPLACE INTO team_fouls_stats
               (team_id,season,matches_played,avg_fouls_per_match,avg_yellows_per_match,foul_to_card_pct)
               VALUES (?,?,?,?,?,?)"#,
        )
        .bind(team_id)
        .bind(DEFAULT_SEASON)
        .bind(matches)
        .bind(avg_fouls)
        .bind(avg_yellows)
        .bind(pct)
        .execute(pool)
        .await?;
    }

    for (team_id, matches, avg_possession, avg_fouls, style) in possession {
        sqlx::query(
            r#"INSERT OR REPLACE INTO team_possession_stats
               (team_id,season,matches_played,avg_possession,avg_fouls_committed,play_style)
               VALUES (?,?,?,?,?,?)"#,
        )
        .bind(team_id)
        .bind(DEFAULT_SEASON)
        .bind(matches)
        .bind(avg_possession)
        .bind(avg_fouls)
        .bind(style)
        .execute(pool)
        .await?;
    }
    Ok(())
}

async fn insert_rivalry_raw(
    pool: &SqlitePool,
    (team_a, team_b, rivalry_type, intensity, name): (&str, &str, &str, i32, &str),
) -> Result<()> {
    sqlx::query(
        r#"INSERT OR REPLACE INTO rivalries (team_a_id,team_b_id,rivalry_type,intensity,name)
           VALUES (?,?,?,?,?)"#,
    )
    .bind(team_a)
    .bind(team_b)
    .bind(rivalry_type)
    .bind(intensity)
    .bind(name)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn seed_data(pool: &SqlitePool) -> Result<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM teams")
        .fetch_one(pool)
        .await?;

    if count > 0 {
        tracing::info!("Database already seeded ({} teams found), skipping.", count);
        return Ok(());
    }

    tracing::info!("Seeding database with Serie A and Premier League card data...");

    seed_league_baselines(pool).await?;
    seed_serie_a(pool).await?;
    seed_premier_league(pool).await?;

    tracing::info!("Database seeded successfully.");
    Ok(())
}

async fn seed_league_baselines(pool: &SqlitePool) -> Result<()> {
    // (competition, avg yellows per match, normalization factor)
    let baselines = [("SA", 4.3, 1.12), ("PL", 3.8, 0.94), ("PD", 5.0, 1.30), ("BL1", 3.9, 0.89)];

    for (code, avg, factor) in baselines {
        sqlx::query(
            "INSERT OR REPLACE INTO league_baselines (competition_code,avg_yellows_per_match,normalization_factor) VALUES (?,?,?)",
        )
        .bind(code)
        .bind(avg)
        .bind(factor)
        .execute(pool)
        .await?;
    }
    Ok(())
}

fn team(id: &str, name: &str, short_name: &str, tla: &str, competition: &str) -> Team {
    Team {
        id: id.to_string(),
        name: name.to_string(),
        short_name: Some(short_name.to_string()),
        tla: Some(tla.to_string()),
        competition_code: Some(competition.to_string()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
//  Serie A
// ─────────────────────────────────────────────────────────────────────────────

async fn seed_serie_a(pool: &SqlitePool) -> Result<()> {
    let teams = [
        team("sa_inter", "FC Internazionale Milano", "Inter", "INT", "SA"),
        team("sa_milan", "AC Milan", "Milan", "MIL", "SA"),
        team("sa_juventus", "Juventus FC", "Juventus", "JUV", "SA"),
        team("sa_torino", "Torino FC", "Torino", "TOR", "SA"),
        team("sa_roma", "AS Roma", "Roma", "ROM", "SA"),
        team("sa_lazio", "SS Lazio", "Lazio", "LAZ", "SA"),
    ];
    for t in &teams {
        insert_team_raw(pool, t).await?;
    }

    let squads: [(&str, Vec<PlayerRow>); 6] = [
        ("sa_inter", vec![
            ("inter_barella",     "Nicolò Barella",        "Midfield",   30, 2480, 7, 0),
            ("inter_bastoni",     "Alessandro Bastoni",    "Defence",    29, 2510, 6, 0),
            ("inter_calhanoglu",  "Hakan Çalhanoğlu",      "Midfield",   27, 2190, 5, 0),
            ("inter_acerbi",      "Francesco Acerbi",      "Defence",    22, 1840, 4, 1),
            ("inter_lautaro",     "Lautaro Martínez",      "Offence",    31, 2600, 3, 0),
            ("inter_sommer",      "Yann Sommer",           "Goalkeeper", 32, 2880, 1, 0),
        ]),
        ("sa_milan", vec![
            ("milan_fofana",      "Youssouf Fofana",       "Midfield",   30, 2400, 8, 0),
            ("milan_pavlovic",    "Strahinja Pavlović",    "Defence",    26, 2150, 6, 1),
            ("milan_tomori",      "Fikayo Tomori",         "Defence",    25, 2100, 5, 0),
            ("milan_loftus",      "Ruben Loftus-Cheek",    "Midfield",   21, 1380, 4, 0),
            ("milan_leao",        "Rafael Leão",           "Offence",    29, 2300, 3, 0),
            ("milan_maignan",     "Mike Maignan",          "Goalkeeper", 31, 2790, 2, 0),
        ]),
        ("sa_juventus", vec![
            ("juve_locatelli",    "Manuel Locatelli",      "Midfield",   32, 2750, 8, 0),
            ("juve_gatti",        "Federico Gatti",        "Defence",    26, 2200, 6, 1),
            ("juve_mckennie",     "Weston McKennie",       "Midfield",   28, 1960, 5, 0),
            ("juve_vlahovic",     "Dušan Vlahović",        "Offence",    27, 1900, 5, 0),
            ("juve_bremer",       "Gleison Bremer",        "Defence",    20, 1780, 4, 0),
            ("juve_digregorio",   "Michele Di Gregorio",   "Goalkeeper", 33, 2970, 0, 0),
        ]),
        ("sa_torino", vec![
            ("toro_coco",         "Saúl Coco",             "Defence",    28, 2400, 7, 1),
            ("toro_ricci",        "Samuele Ricci",         "Midfield",   27, 2280, 7, 0),
            ("toro_ilic",         "Ivan Ilić",             "Midfield",   25, 1890, 5, 0),
            ("toro_masina",       "Adam Masina",           "Defence",    22, 1650, 4, 0),
            ("toro_zapata",       "Duván Zapata",          "Offence",    18, 1210, 3, 0),
            ("toro_milinkovic",   "Vanja Milinković-Savić","Goalkeeper", 33, 2970, 1, 0),
        ]),
        ("sa_roma", vec![
            ("roma_mancini",      "Gianluca Mancini",      "Defence",    30, 2650, 9, 0),
            ("roma_cristante",    "Bryan Cristante",       "Midfield",   31, 2420, 7, 0),
            ("roma_kone",         "Manu Koné",             "Midfield",   29, 2310, 6, 0),
            ("roma_ndicka",       "Evan Ndicka",           "Defence",    28, 2480, 4, 0),
            ("roma_dybala",       "Paulo Dybala",          "Offence",    24, 1520, 2, 0),
            ("roma_svilar",       "Mile Svilar",           "Goalkeeper", 33, 2970, 1, 0),
        ]),
        ("sa_lazio", vec![
            ("lazio_guendouzi",   "Matteo Guendouzi",      "Midfield",   32, 2760, 8, 0),
            ("lazio_romagnoli",   "Alessio Romagnoli",     "Defence",    27, 2330, 7, 1),
            ("lazio_rovella",     "Nicolò Rovella",        "Midfield",   29, 2390, 6, 0),
            ("lazio_gila",        "Mario Gila",            "Defence",    26, 2250, 5, 0),
            ("lazio_zaccagni",    "Mattia Zaccagni",       "Offence",    30, 2280, 3, 0),
            ("lazio_provedel",    "Ivan Provedel",         "Goalkeeper", 30, 2700, 1, 0),
        ]),
    ];
    for (team_id, players) in &squads {
        insert_players_raw(pool, team_id, players).await?;
    }

    let fouls: [FoulsRow; 6] = [
        ("sa_inter",    33, 11.2, 1.9, 17.0),
        ("sa_milan",    33, 12.4, 2.3, 18.5),
        ("sa_juventus", 33, 12.9, 2.4, 18.6),
        ("sa_torino",   33, 14.1, 2.7, 19.1),
        ("sa_roma",     33, 13.6, 2.6, 19.1),
        ("sa_lazio",    33, 13.2, 2.5, 18.9),
    ];
    let possession: [PossessionRow; 6] = [
        ("sa_inter",    33, 57.8, Some(11.2), Some("POSSESSION_HEAVY")),
        ("sa_milan",    33, 53.1, Some(12.4), None),
        ("sa_juventus", 33, 54.6, Some(12.9), Some("BALANCED")),
        ("sa_torino",   33, 45.9, Some(14.1), None),
        ("sa_roma",     33, 51.2, Some(13.6), None),
        ("sa_lazio",    33, 49.4, None,       None),
    ];
    insert_team_profiles_raw(pool, &fouls, &possession).await?;

    // (id, name, nationality, matches, yellows, reds)
    let referees = [
        ("ref_orsato",  "Daniele Orsato",    "Italy", 152, 790, 28),
        ("ref_guida",   "Marco Guida",       "Italy", 121, 545, 14),
        ("ref_massa",   "Davide Massa",      "Italy", 110, 418, 11),
        ("ref_mariani", "Maurizio Mariani",  "Italy",  92, 430,  9),
    ];
    for referee in referees {
        insert_referee_raw(pool, referee).await?;
    }

    for row in [
        ("ref_orsato",  "SA", 96, 5.5),
        ("ref_guida",   "SA", 88, 4.5),
        ("ref_massa",   "SA", 71, 3.7),
        ("ref_mariani", "SA", 60, 4.9),
    ] {
        insert_referee_league_raw(pool, row).await?;
    }

    for row in [
        ("ref_orsato", "inter_barella",    4, 9, Some("2025-09-21")),
        ("ref_orsato", "inter_bastoni",    2, 8, Some("2025-04-13")),
        ("ref_orsato", "milan_fofana",     3, 5, Some("2025-11-23")),
        ("ref_orsato", "milan_tomori",     1, 6, None),
        ("ref_guida",  "roma_mancini",     3, 7, Some("2025-10-05")),
        ("ref_guida",  "lazio_guendouzi",  2, 6, Some("2025-03-16")),
        ("ref_massa",  "juve_locatelli",   1, 8, Some("2024-12-07")),
        ("ref_massa",  "toro_coco",        2, 5, Some("2025-11-09")),
    ] {
        insert_referee_history_raw(pool, row).await?;
    }

    for row in [
        ("inter_barella",   "sa_inter",    "sa_milan",    12, 5, 0),
        ("inter_bastoni",   "sa_inter",    "sa_milan",    10, 3, 0),
        ("milan_fofana",    "sa_milan",    "sa_inter",     4, 2, 0),
        ("milan_tomori",    "sa_milan",    "sa_inter",     9, 3, 1),
        ("roma_mancini",    "sa_roma",     "sa_lazio",    11, 6, 0),
        ("roma_cristante",  "sa_roma",     "sa_lazio",    14, 5, 0),
        ("lazio_guendouzi", "sa_lazio",    "sa_roma",      6, 3, 0),
        ("lazio_romagnoli", "sa_lazio",    "sa_roma",      8, 4, 1),
        ("juve_locatelli",  "sa_juventus", "sa_torino",    9, 3, 0),
        ("toro_ricci",      "sa_torino",   "sa_juventus",  7, 3, 0),
    ] {
        insert_h2h_raw(pool, row).await?;
    }

    for row in [
        ("sa_inter",    "sa_milan",    "DERBY",    3, "Derby della Madonnina"),
        ("sa_juventus", "sa_torino",   "DERBY",    3, "Derby della Mole"),
        ("sa_roma",     "sa_lazio",    "DERBY",    3, "Derby della Capitale"),
        ("sa_inter",    "sa_juventus", "HISTORIC", 2, "Derby d'Italia"),
        ("sa_milan",    "sa_juventus", "HISTORIC", 1, "Milan vs Juventus"),
    ] {
        insert_rivalry_raw(pool, row).await?;
    }

    tracing::info!("Serie A data seeded: 6 teams, 36 players, 4 referees, 5 rivalries");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
//  Premier League
// ─────────────────────────────────────────────────────────────────────────────

async fn seed_premier_league(pool: &SqlitePool) -> Result<()> {
    let teams = [
        team("pl_arsenal", "Arsenal FC", "Arsenal", "ARS", "PL"),
        team("pl_tottenham", "Tottenham Hotspur FC", "Tottenham", "TOT", "PL"),
    ];
    for t in &teams {
        insert_team_raw(pool, t).await?;
    }

    let squads: [(&str, Vec<PlayerRow>); 2] = [
        ("pl_arsenal", vec![
            ("ars_gabriel",   "Gabriel Magalhães",   "Defence",    30, 2650, 6, 0),
            ("ars_rice",      "Declan Rice",         "Midfield",   32, 2780, 5, 0),
            ("ars_saliba",    "William Saliba",      "Defence",    31, 2760, 4, 0),
            ("ars_odegaard",  "Martin Ødegaard",     "Midfield",   26, 2050, 3, 0),
            ("ars_saka",      "Bukayo Saka",         "Offence",    25, 1980, 2, 0),
            ("ars_raya",      "David Raya",          "Goalkeeper", 33, 2970, 1, 0),
        ]),
        ("pl_tottenham", vec![
            ("tot_romero",    "Cristian Romero",     "Defence",    27, 2380, 9, 1),
            ("tot_bissouma",  "Yves Bissouma",       "Midfield",   24, 1720, 8, 0),
            ("tot_bentancur", "Rodrigo Bentancur",   "Midfield",   28, 2010, 6, 0),
            ("tot_vandeven",  "Micky van de Ven",    "Defence",    22, 1900, 3, 0),
            ("tot_solanke",   "Dominic Solanke",     "Offence",    26, 2100, 2, 0),
            ("tot_vicario",   "Guglielmo Vicario",   "Goalkeeper", 32, 2880, 1, 0),
        ]),
    ];
    for (team_id, players) in &squads {
        insert_players_raw(pool, team_id, players).await?;
    }

    let fouls: [FoulsRow; 2] = [
        ("pl_arsenal",   33, 9.8,  1.6, 16.3),
        ("pl_tottenham", 33, 11.5, 2.2, 19.1),
    ];
    let possession: [PossessionRow; 2] = [
        ("pl_arsenal",   33, 56.3, Some(9.8),  Some("POSSESSION_HEAVY")),
        ("pl_tottenham", 33, 52.7, Some(11.5), None),
    ];
    insert_team_profiles_raw(pool, &fouls, &possession).await?;

    let referees = [
        ("ref_oliver", "Michael Oliver", "England", 163, 578, 12),
        ("ref_taylor", "Anthony Taylor", "England", 171, 702, 10),
    ];
    for referee in referees {
        insert_referee_raw(pool, referee).await?;
    }

    for row in [("ref_oliver", "PL", 141, 3.4), ("ref_taylor", "PL", 152, 4.3)] {
        insert_referee_league_raw(pool, row).await?;
    }

    for row in [
        ("ref_taylor", "tot_romero",  3, 6, Some("2025-09-28")),
        ("ref_taylor", "ars_gabriel", 1, 7, Some("2025-01-15")),
        ("ref_oliver", "ars_rice",    1, 9, Some("2024-11-10")),
    ] {
        insert_referee_history_raw(pool, row).await?;
    }

    for row in [
        ("tot_romero",   "pl_tottenham", "pl_arsenal",  6, 4, 0),
        ("ars_gabriel",  "pl_arsenal",   "pl_tottenham", 7, 2, 0),
        ("tot_bissouma", "pl_tottenham", "pl_arsenal",  4, 2, 0),
    ] {
        insert_h2h_raw(pool, row).await?;
    }

    insert_rivalry_raw(pool, ("pl_arsenal", "pl_tottenham", "DERBY", 3, "North London Derby")).await?;

    tracing::info!("Premier League data seeded: 2 teams, 12 players, 2 referees, 1 rivalry");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database_with_pool;
    use sqlx::sqlite::SqlitePoolOptions;

    #[test]
    fn test_per_90() {
        assert_eq!(per_90(7, 2480), Some(0.25));
        assert_eq!(per_90(3, 0), None);
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_database_with_pool(&pool).await.unwrap();

        seed_data(&pool).await.unwrap();
        seed_data(&pool).await.unwrap();

        let teams: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM teams")
            .fetch_one(&pool)
            .await
            .unwrap();
        let cards: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM player_season_cards")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(teams, 8);
        assert_eq!(cards, 48);
    }
}
