//! Activity Records
//!
//! Shapes for the recent-activity and active-sites widgets, plus the
//! human-relative timestamp and excerpt helpers their rows carry.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::provider::ContentKind;

/// Site liveness classification by days since last activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Active,
    Warning,
    Inactive,
}

impl ActivityStatus {
    /// Active within 30 days, warning within 90, inactive beyond
    pub fn classify(last_activity: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let age = now.signed_duration_since(last_activity);
        if age <= Duration::days(30) {
            ActivityStatus::Active
        } else if age <= Duration::days(90) {
            ActivityStatus::Warning
        } else {
            ActivityStatus::Inactive
        }
    }
}

/// One row in the recent-network-activity feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkActivityRecord {
    pub site_id: u64,
    pub site_name: String,
    pub content_id: u64,
    pub kind: ContentKind,
    pub title: String,
    pub excerpt: String,
    pub author: String,
    pub published_at: DateTime<Utc>,
    /// Human-readable age, e.g. "3 hours ago"
    pub published_relative: String,
    pub edit_url: String,
    pub view_url: String,
}

/// One row in the active-sites widget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteActivityRecord {
    pub site_id: u64,
    pub site_name: String,
    pub domain: String,
    pub path: String,
    pub user_count: u64,
    pub last_activity: DateTime<Utc>,
    pub last_activity_relative: String,
    pub status: ActivityStatus,
}

/// Render the age of `then` relative to `now` ("just now", "5 minutes ago",
/// "2 days ago"). Future timestamps read as "just now".
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(then);
    if age < Duration::minutes(1) {
        return "just now".to_string();
    }

    let (count, unit) = if age < Duration::hours(1) {
        (age.num_minutes(), "minute")
    } else if age < Duration::days(1) {
        (age.num_hours(), "hour")
    } else if age < Duration::days(30) {
        (age.num_days(), "day")
    } else if age < Duration::days(365) {
        (age.num_days() / 30, "month")
    } else {
        (age.num_days() / 365, "year")
    };

    if count == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", count, unit)
    }
}

/// Trim an excerpt to at most `max_chars` characters, appending an ellipsis
/// when anything was cut. Counts characters, not bytes.
pub fn trim_excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}

// =============================================================================
// Tests
// =============================================================================
