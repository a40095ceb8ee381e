//! Age-based cleanup of the runtime store.

use chrono::{DateTime, Duration, Utc};
use medref_core::{CachedResponse, Error, Store};

/// Parse the response `date` header (HTTP-date, RFC 2822 compatible).
fn response_date(response: &CachedResponse) -> Option<DateTime<Utc>> {
    let value = response.header("date")?;
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

/// Delete entries whose `date` header is older than `retention` at `now`.
///
/// Entries without a parseable `date` header are kept. A non-positive or
/// unrepresentable window removes nothing. Returns the number of entries
/// removed.
pub async fn clean(store: &Store, retention: Duration, now: DateTime<Utc>) -> Result<u64, Error> {
    let cutoff = match now.checked_sub_signed(retention) {
        Some(cutoff) if retention > Duration::zero() => cutoff,
        _ => {
            tracing::warn!(store = store.name(), %retention, "retention window out of range, skipping cleanup");
            return Ok(0);
        }
    };
    let mut removed = 0;

    for entry in store.entries().await? {
        let Some(date) = response_date(&entry.response) else {
            continue;
        };
        if date < cutoff && store.delete_key(&entry.key).await? {
            tracing::debug!(url = %entry.url, %date, "expired runtime entry");
            removed += 1;
        }
    }

    tracing::info!(store = store.name(), removed, "cache cleanup complete");
    Ok(removed)
}
