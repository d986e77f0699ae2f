/// Round to one decimal place (presentation of scores)
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Round to two decimal places (presentation of rates and multipliers)
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Validate team name format
pub fn validate_team_name(name: &str) -> bool {
    !name.trim().is_empty() && name.len() <= 100
}

/// Lowercased, whitespace-collapsed form used for name comparisons
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Render a multiplier with an arrow showing its direction, e.g. "x1.08 ↑"
pub fn format_multiplier(value: f64) -> String {
    if value > 1.0 {
        format!("x{:.2} ↑", value)
    } else if value < 1.0 {
        format!("x{:.2} ↓", value)
    } else {
        format!("x{:.2}", value)
    }
}

/// Text bar for a 0-100 score, ten cells wide
pub fn score_bar(score: f64) -> String {
    let filled = (score.clamp(0.0, 100.0) / 10.0).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounding() {
        assert_eq!(round1(19.035), 19.0);
        assert_eq!(round1(24.4776), 24.5);
        assert_eq!(round2(1.2600000000000002), 1.26);
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  AC   Milan "), "ac milan");
    }

    #[test]
    fn test_validate_team_name() {
        assert!(validate_team_name("Inter"));
        assert!(!validate_team_name("   "));
    }

    #[test]
    fn test_format_multiplier() {
        assert_eq!(format_multiplier(1.08), "x1.08 ↑");
        assert_eq!(format_multiplier(0.94), "x0.94 ↓");
        assert_eq!(format_multiplier(1.0), "x1.00");
    }

    #[test]
    fn test_score_bar() {
        assert_eq!(score_bar(100.0).chars().count(), 10);
        assert_eq!(score_bar(0.0), "░".repeat(10));
    }
}
