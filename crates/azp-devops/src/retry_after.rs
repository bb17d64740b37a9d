//! Conversion of throttled responses into rate-limit errors.

use azp_core::Error;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

/// Parse a `Retry-After` header value: delta-seconds or an HTTP date.
///
/// Dates in the past yield a zero delay.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?;
    Some(
        (at.with_timezone(&Utc) - now)
            .to_std()
            .unwrap_or(Duration::ZERO),
    )
}

/// Build the error for a non-success response.
///
/// Only 429 and 503 responses with a usable `Retry-After` header become
/// [`Error::RateLimited`].
pub fn status_error(
    status: StatusCode,
    endpoint: &str,
    headers: &HeaderMap,
    now: DateTime<Utc>,
) -> Error {
    let throttled =
        status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE;

    let retry_after = throttled
        .then(|| headers.get(RETRY_AFTER))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_retry_after(v, now));

    match retry_after {
        Some(retry_after) => Error::RateLimited {
            status: status.as_u16(),
            endpoint: endpoint.to_string(),
            retry_after,
        },
        None => Error::Http {
            status: status.as_u16(),
            endpoint: endpoint.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reqwest::header::HeaderValue;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap()
    }

    fn retry_headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_retry_after("5", now()), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after(" 120 ", now()), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_parse_http_date() {
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:30 GMT", now()),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:27:00 GMT", now()),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_retry_after("soon", now()), None);
        assert_eq!(parse_retry_after("-3", now()), None);
    }

    #[test]
    fn test_rate_limited_statuses() {
        for status in [StatusCode::TOO_MANY_REQUESTS, StatusCode::SERVICE_UNAVAILABLE] {
            let err = status_error(status, "/_apis/x", &retry_headers("5"), now());
            assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));
        }
    }

    #[test]
    fn test_retry_after_ignored_for_other_statuses() {
        let err = status_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "/_apis/x",
            &retry_headers("5"),
            now(),
        );
        assert!(matches!(err, Error::Http { status: 500, .. }));
    }

    #[test]
    fn test_throttled_without_header_is_plain_http_error() {
        let err = status_error(
            StatusCode::TOO_MANY_REQUESTS,
            "/_apis/x",
            &HeaderMap::new(),
            now(),
        );
        assert!(matches!(err, Error::Http { status: 429, ref endpoint } if endpoint == "/_apis/x"));
    }
}
