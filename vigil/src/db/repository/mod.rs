mod alerts;
mod executions;
mod feedback;
mod pages;
mod recurring;
mod suppression;

pub use alerts::AlertRepository;
pub use executions::ExecutionRepository;
pub use feedback::FeedbackRepository;
pub use pages::PageRepository;
pub use recurring::RecurringSearchRepository;
pub use suppression::SuppressionRepository;

use chrono::{DateTime, Utc};

/// Parse an RFC 3339 column, falling back to now on corruption rather
/// than failing a whole row read.
pub(crate) fn parse_datetime(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn parse_datetime_opt(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}
