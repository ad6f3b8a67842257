use chrono::Utc;
use shared::protocol::Profile;

/// Masked display name shown to non-premium viewers: the initial of each
/// present name part followed by a fixed run of dots.
pub fn mask_name(first_name: Option<&str>, last_name: Option<&str>) -> String {
    fn mask(part: Option<&str>) -> Option<String> {
        let first = part.unwrap_or_default().trim().chars().next()?;
        Some(format!("{}.....", first.to_uppercase()))
    }

    let parts: Vec<String> = [mask(first_name), mask(last_name)]
        .into_iter()
        .flatten()
        .collect();
    if parts.is_empty() {
        "User".to_string()
    } else {
        parts.join(" ")
    }
}

/// A profile counts as premium while the flag is set and `premiumEnd`, when
/// present, has not passed.
pub fn premium_active(profile: &Profile) -> bool {
    let flagged = profile.premium == Some(true);
    let not_expired = profile.premium_end.map_or(true, |end| end > Utc::now());
    flagged && not_expired
}

/// Full name for premium viewers, masked name otherwise.
pub fn display_name(profile: &Profile, viewer_premium: bool) -> String {
    if !viewer_premium {
        return mask_name(profile.first_name.as_deref(), profile.last_name.as_deref());
    }

    let full = format!(
        "{} {}",
        profile.first_name.as_deref().unwrap_or("").trim(),
        profile.last_name.as_deref().unwrap_or("").trim()
    )
    .trim()
    .to_string();
    if full.is_empty() {
        "User".to_string()
    } else {
        full
    }
}
