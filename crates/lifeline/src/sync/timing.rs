//! Polling cadence defaults and timestamp labels
//!
//! Pure functions that can be tested without a runtime.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// How often the notification feed is polled while signed in
pub const NOTIFICATION_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// How often the open conversation is polled
pub const CONVERSATION_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Notifications requested per poll
pub const NOTIFICATION_FETCH_LIMIT: usize = 20;

/// Notifications shown in the list view
pub const NOTIFICATION_VISIBLE_LIMIT: usize = 15;

/// Short human label for how long ago something happened.
///
/// # Arguments
/// * `at` - When the event happened
/// * `now` - The reference time (usually `Utc::now()`)
///
/// # Returns
/// "just now", "5m ago", "3h ago", "2d ago", or a date for anything older
/// than a week. Future timestamps (clock skew) are treated as "just now".
pub fn relative_label(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now - at;

    if elapsed.num_minutes() < 1 {
        "just now".to_string()
    } else if elapsed.num_hours() < 1 {
        format!("{}m ago", elapsed.num_minutes())
    } else if elapsed.num_days() < 1 {
        format!("{}h ago", elapsed.num_hours())
    } else if elapsed.num_days() < 7 {
        format!("{}d ago", elapsed.num_days())
    } else {
        at.format("%b %-d, %Y").to_string()
    }
}
