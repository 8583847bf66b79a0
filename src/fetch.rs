//! HTTP access to the points, ping and alert endpoints.

use reqwest::header::IF_MODIFIED_SINCE;
use reqwest::Client;

use crate::error::{Result, TrackError};
use crate::page::Notice;

// Plain-text bodies the server answers with instead of data.
pub const LOGOUT: &str = "LOGOUT";
pub const ERROR: &str = "ERROR";
pub const PING_OK: &str = "PING:OK";
pub const PING_ERROR: &str = "PING:ERROR";

/// Sent on every request so no cache answers for the server.
const NEVER_MODIFIED: &str = "Sat, 1 Jan 2000 00:00:00 GMT";

fn sentinel(body: &str) -> String {
    body.trim().to_ascii_uppercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointsResponse {
    Logout,
    Error,
    /// A `MapData` document, or something the parser will treat as empty.
    Data(String),
}

pub fn classify_points(body: String) -> PointsResponse {
    match sentinel(&body).as_str() {
        LOGOUT => PointsResponse::Logout,
        ERROR => PointsResponse::Error,
        _ => PointsResponse::Data(body),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingResult {
    Ok,
    Failed,
    Logout,
}

impl PingResult {
    pub fn notice(self) -> Notice {
        match self {
            PingResult::Ok => Notice::PingOk,
            PingResult::Failed => Notice::PingError,
            PingResult::Logout => Notice::SessionExpired,
        }
    }
}

/// `PING:ERROR`, and anything else but `PING:OK` or `LOGOUT`, is a failed ping.
pub fn classify_ping(body: &str) -> PingResult {
    match sentinel(body).as_str() {
        LOGOUT => PingResult::Logout,
        PING_OK => PingResult::Ok,
        PING_ERROR => PingResult::Failed,
        other => {
            log::debug!("unexpected ping answer '{}'", other);
            PingResult::Failed
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrackClient {
    client: Client,
}

impl TrackClient {
    pub fn new() -> Self {
        TrackClient { client: Client::new() }
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        log::debug!("GET {}", url);
        let body = self
            .client
            .get(url)
            .header(IF_MODIFIED_SINCE, NEVER_MODIFIED)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }

    /// Fetches a points document; a logout answer is a `SessionExpired` error.
    pub async fn fetch_points(&self, url: &str) -> Result<PointsResponse> {
        let response = classify_points(self.get_text(url).await?);
        if response == PointsResponse::Logout {
            return Err(TrackError::SessionExpired);
        }
        Ok(response)
    }

    pub async fn ping(&self, url: &str) -> Result<PingResult> {
        Ok(classify_ping(&self.get_text(url).await?))
    }

    /// Raw body of the alert rule endpoint.
    pub async fn poll_alert(&self, url: &str) -> Result<String> {
        self.get_text(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_sentinels_are_trimmed_and_case_insensitive() {
        assert_eq!(classify_points(" logout\n".into()), PointsResponse::Logout);
        assert_eq!(classify_points("Error".into()), PointsResponse::Error);
        assert_eq!(
            classify_points("<MapData/>".into()),
            PointsResponse::Data("<MapData/>".into())
        );
    }

    #[test]
    fn ping_answers() {
        assert_eq!(classify_ping("PING:OK"), PingResult::Ok);
        assert_eq!(classify_ping(" ping:ok "), PingResult::Ok);
        assert_eq!(classify_ping("LOGOUT"), PingResult::Logout);
        assert_eq!(classify_ping("PING:ERROR"), PingResult::Failed);
        assert_eq!(classify_ping(" ping:error\n"), PingResult::Failed);
        assert_eq!(classify_ping("device offline"), PingResult::Failed);
        assert_eq!(PingResult::Logout.notice(), Notice::SessionExpired);
    }
}
