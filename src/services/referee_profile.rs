use crate::models::RefereeProfile;

/// Classify a referee by `delta` = referee average minus league average yellows per match.
pub fn classify_referee(delta: f64) -> RefereeProfile {
    if delta >= 1.0 {
        RefereeProfile::StrictOutlier
    } else if delta >= 0.5 {
        RefereeProfile::AboveAverage
    } else if delta > -0.5 {
        RefereeProfile::Average
    } else if delta > -1.0 {
        RefereeProfile::BelowAverage
    } else {
        RefereeProfile::LenientOutlier
    }
}
