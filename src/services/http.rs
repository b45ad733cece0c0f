use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::SyncError;
use crate::sync::types::Service;

pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// What a request was for, so failures land in the right [`SyncError`] variant.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Operation<'a> {
    Fetch(&'a str),
    Search,
    Write(&'a str),
}

impl Operation<'_> {
    pub(crate) fn error(&self, service: Service, reason: impl Into<String>) -> SyncError {
        let reason = reason.into();
        match *self {
            Operation::Fetch(playlist) => SyncError::Fetch {
                service,
                playlist: playlist.to_string(),
                reason,
            },
            Operation::Search => SyncError::Search { service, reason },
            Operation::Write(playlist) => SyncError::Write {
                service,
                playlist: playlist.to_string(),
                written: 0,
                reason,
            },
        }
    }
}

/// Send a request, turning transport errors and non-success statuses into
/// [`SyncError`]s. 401 and 403 always map to `Auth`.
pub(crate) async fn send(
    request: reqwest::RequestBuilder,
    service: Service,
    operation: Operation<'_>,
) -> Result<reqwest::Response, SyncError> {
    let response = request
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
        .map_err(|e| operation.error(service, e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let reason = describe(status, &body);
    tracing::debug!(%service, %status, body = %body, "Request failed");

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(SyncError::Auth { service, reason });
    }
    Err(operation.error(service, reason))
}

/// Send a request and decode its JSON body.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    service: Service,
    operation: Operation<'_>,
) -> Result<T, SyncError> {
    send(request, service, operation)
        .await?
        .json::<T>()
        .await
        .map_err(|e| operation.error(service, format!("Malformed response: {}", e)))
}

fn describe(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return format!("HTTP {}", status);
    }
    let snippet: String = body.chars().take(200).collect();
    format!("HTTP {}: {}", status, snippet)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_selects_error_variant() {
        let fetch = Operation::Fetch("pl1").error(Service::Spotify, "boom");
        assert!(matches!(fetch, SyncError::Fetch { ref playlist, .. } if playlist == "pl1"));

        let search = Operation::Search.error(Service::YoutubeMusic, "boom");
        assert!(matches!(search, SyncError::Search { service: Service::YoutubeMusic, .. }));

        let write = Operation::Write("pl2").error(Service::Spotify, "boom");
        assert_eq!(
            write.to_string(),
            "Failed to write to Spotify playlist pl2: boom"
        );
    }

    #[test]
    fn test_describe_truncates_long_bodies() {
        let body = "x".repeat(500);
        let described = describe(StatusCode::BAD_GATEWAY, &body);
        assert!(described.starts_with("HTTP 502 Bad Gateway: "));
        assert_eq!(described.len(), "HTTP 502 Bad Gateway: ".len() + 200);
        assert_eq!(describe(StatusCode::NOT_FOUND, "  "), "HTTP 404 Not Found");
    }
}
