//! General utilities: timestamps and id/slug formatting.

use std::time::{SystemTime, UNIX_EPOCH};

/// Get the current Unix timestamp in seconds.
///
/// When `FT_TEST_EPOCH` is set (by the test harness), returns that value
/// instead of the actual current time, so SSOT documents and commit
/// messages are byte-for-byte reproducible in tests.
pub fn now_unix() -> u64 {
    std::env::var("FT_TEST_EPOCH")
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
        .unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("system clock before Unix epoch")
                .as_secs()
        })
}

/// Current time formatted as RFC-3339 UTC, e.g. `2026-07-28T00:00:00Z`.
///
/// All SSOT timestamps are normalized to this format on write (spec §4.1).
pub fn now_rfc3339() -> String {
    format_rfc3339(now_unix())
}

pub fn format_rfc3339(timestamp: u64) -> String {
    let Ok(timestamp) = i64::try_from(timestamp) else {
        return "1970-01-01T00:00:00Z".to_string();
    };
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string())
}

/// Lowercase, dash-separated slug safe for branch names and paths.
pub fn slugify(input: &str) -> String {
    let sanitized = sanitize_filename::sanitize(input.trim());
    let mut out = String::with_capacity(sanitized.len());
    let mut last_was_dash = false;
    for ch in sanitized.chars() {
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_alphanumeric() {
            out.push(lower);
            last_was_dash = false;
        } else if !last_was_dash && !out.is_empty() {
            out.push('-');
            last_was_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Format a feat id: `F-<slug>-<counter>`.
pub fn format_feat_id(slug: &str, counter: u32) -> String {
    format!("F-{slug}-{counter:03}")
}

/// Format a task id: `T-NNN`, zero-padded.
pub fn format_task_id(n: u32) -> String {
    format!("T-{n:03}")
}

/// Parse the numeric suffix out of a task id (`T-003` -> `3`).
pub fn parse_task_number(task_id: &str) -> Option<u32> {
    task_id.strip_prefix("T-")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_normalizes_spaces_and_case() {
        assert_eq!(slugify("Demo Feat!!"), "demo-feat");
        assert_eq!(slugify("  leading and trailing  "), "leading-and-trailing");
    }

    #[test]
    fn feat_and_task_ids_format_as_spec() {
        assert_eq!(format_feat_id("demo-feat", 1), "F-demo-feat-001");
        assert_eq!(format_task_id(2), "T-002");
        assert_eq!(parse_task_number("T-002"), Some(2));
        assert_eq!(parse_task_number("bogus"), None);
    }

    #[test]
    fn now_unix_respects_test_epoch() {
        // SAFETY: single-threaded test process; no other test reads this var.
        unsafe {
            std::env::set_var("FT_TEST_EPOCH", "1700000000");
        }
        assert_eq!(now_unix(), 1_700_000_000);
        assert_eq!(now_rfc3339(), "2023-11-14T22:13:20Z");
        unsafe {
            std::env::remove_var("FT_TEST_EPOCH");
        }
    }
}
