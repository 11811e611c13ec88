//! Server-suggested retry delays
//!
//! Two header conventions are understood:
//! - `retry-after-ms`: milliseconds, fractional values allowed;
//! - `retry-after`: seconds, or an HTTP-date.
//!
//! `retry-after-ms` wins when both are present and valid. Nothing here caps
//! the value; callers clamp with [`MAX_RETRY_AFTER`] or their own limit.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::{ResponseHeaders, header_value};

/// Largest server-suggested delay the built-in strategies will honor.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Parse the retry delay hint from response headers, relative to the current time.
pub fn parse_retry_after(headers: Option<&ResponseHeaders>) -> Option<Duration> {
    parse_retry_after_at(headers, Utc::now())
}

/// Parse the retry delay hint from response headers, relative to `now`.
pub fn parse_retry_after_at(
    headers: Option<&ResponseHeaders>,
    now: DateTime<Utc>,
) -> Option<Duration> {
    let headers = headers?;

    if let Some(delay) = header_value(headers, "retry-after-ms").and_then(parse_millis) {
        return Some(delay);
    }

    let value = header_value(headers, "retry-after")?.trim();
    if value.is_empty() {
        return None;
    }
    if let Some(delay) = parse_seconds(value) {
        return Some(delay);
    }
    parse_http_date(value, now)
}

fn parse_non_negative(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

fn parse_millis(value: &str) -> Option<Duration> {
    parse_non_negative(value).and_then(|ms| Duration::try_from_secs_f64(ms / 1000.0).ok())
}

fn parse_seconds(value: &str) -> Option<Duration> {
    parse_non_negative(value).and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

fn parse_http_date(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    // Dates in the past mean "retry now", never a negative wait.
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn headers(pairs: &[(&str, &str)]) -> ResponseHeaders {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn millisecond_hint_wins() {
        let h = headers(&[("retry-after-ms", "3000"), ("retry-after", "10")]);
        assert_eq!(
            parse_retry_after_at(Some(&h), now()),
            Some(Duration::from_millis(3000))
        );
    }

    #[test]
    fn fractional_milliseconds_are_kept() {
        let h = headers(&[("Retry-After-Ms", "1.5")]);
        assert_eq!(
            parse_retry_after_at(Some(&h), now()),
            Some(Duration::from_micros(1500))
        );
    }

    #[test]
    fn invalid_millis_falls_back_to_seconds() {
        let h = headers(&[("retry-after-ms", "-5"), ("retry-after", "2")]);
        assert_eq!(
            parse_retry_after_at(Some(&h), now()),
            Some(Duration::from_secs(2))
        );
    }

    #[test]
    fn seconds_hint() {
        let h = headers(&[("Retry-After", " 7 ")]);
        assert_eq!(
            parse_retry_after_at(Some(&h), now()),
            Some(Duration::from_secs(7))
        );
    }

    #[test]
    fn future_http_date_is_a_delta() {
        let h = headers(&[("retry-after", "Mon, 01 Jan 2024 12:00:30 GMT")]);
        assert_eq!(
            parse_retry_after_at(Some(&h), now()),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn past_http_date_is_zero() {
        let h = headers(&[("retry-after", "Sun, 31 Dec 2023 12:00:00 GMT")]);
        assert_eq!(parse_retry_after_at(Some(&h), now()), Some(Duration::ZERO));
    }

    #[test]
    fn absent_or_garbage_is_none() {
        assert_eq!(parse_retry_after_at(None, now()), None);
        assert_eq!(parse_retry_after_at(Some(&headers(&[])), now()), None);
        for value in ["", "   ", "-1", "soon", "NaN", "inf"] {
            let h = headers(&[("retry-after", value)]);
            assert_eq!(parse_retry_after_at(Some(&h), now()), None, "value {value:?}");
        }
        let h = headers(&[("retry-after-ms", "  ")]);
        assert_eq!(parse_retry_after_at(Some(&h), now()), None);
    }
}
