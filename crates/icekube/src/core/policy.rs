use chrono::DateTime;
use chrono::Utc;

use super::types::PolicyDecision;
use crate::k8s::annotations::parse_after_minutes;

/// Decide whether a revision created at `created_at` has outlived its threshold.
///
/// A missing or malformed `after-mins` annotation counts as a zero minute
/// threshold, making the workload eligible as soon as it has any age. This is
/// logged but never fails the evaluation.
pub fn evaluate(
    created_at: DateTime<Utc>,
    after_minutes: Option<&str>,
    now: DateTime<Utc>,
) -> PolicyDecision {
    let threshold_minutes = match after_minutes {
        Some(value) => parse_after_minutes(value).unwrap_or_else(|e| {
            tracing::warn!("Falling back to a zero minute threshold: {e:?}");
            0
        }),
        None => {
            tracing::debug!("No after-mins annotation, using a zero minute threshold");
            0
        }
    };

    let elapsed_minutes = (now - created_at).num_milliseconds() as f64 / 60_000.0;

    PolicyDecision {
        exceeded: elapsed_minutes > f64::from(threshold_minutes),
        elapsed_minutes,
        threshold_minutes,
    }
}
