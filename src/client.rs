//! HTTP bidder client.
//!
//! One call is exactly one HTTP POST under a per-call deadline. Failures
//! never escape as panics or propagated errors across the pipeline; they
//! come back as [`BidderError`] values that the dispatcher and stats
//! layers treat as data.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use thiserror::Error;

use crate::openrtb::{BidRequest, BidResponse};

/// Default keep-alive pool size per endpoint host.
pub const DEFAULT_MAX_IDLE_PER_HOST: usize = 100;
/// Default response body cap. RTB responses are small; anything bigger is
/// a misbehaving endpoint.
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

/// Classified failure of a single bidder call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BidderError {
    #[error("request timed out")]
    Timeout,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("server returned status {0}")]
    Server(u16),
    #[error("decoding response: {0}")]
    Decode(String),
    #[error("dispatch cancelled")]
    Cancelled,
}

pub struct BidderClient {
    http: reqwest::Client,
    max_body_bytes: usize,
}

impl BidderClient {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_IDLE_PER_HOST, DEFAULT_MAX_BODY_BYTES)
    }

    pub fn with_limits(max_idle_per_host: usize, max_body_bytes: usize) -> Self {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client construction should not fail with static options");
        Self {
            http,
            max_body_bytes,
        }
    }

    /// POST one bid request to one endpoint and classify the result.
    ///
    /// `204 No Content` is a valid no-bid and comes back as an empty
    /// response echoing the request id. Statuses `>= 400` are server
    /// errors. Other `2xx` bodies are decoded as OpenRTB responses.
    pub async fn post(
        &self,
        url: &str,
        request: &BidRequest,
        deadline: Duration,
    ) -> Result<BidResponse, BidderError> {
        let body = serde_json::to_vec(request)
            .map_err(|err| BidderError::Decode(format!("encoding bid request: {err}")))?;

        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .timeout(deadline)
            .body(body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            // No-bid, not an error.
            return Ok(BidResponse {
                id: request.id.clone(),
                ..Default::default()
            });
        }
        if status.as_u16() >= 400 {
            return Err(BidderError::Server(status.as_u16()));
        }

        let body = self.read_capped(response).await?;
        serde_json::from_slice(&body).map_err(|err| BidderError::Decode(err.to_string()))
    }

    /// Read the response body without ever buffering more than the cap.
    async fn read_capped(&self, mut response: reqwest::Response) -> Result<Vec<u8>, BidderError> {
        if let Some(len) = response.content_length() {
            if len > self.max_body_bytes as u64 {
                return Err(oversized(len as usize, self.max_body_bytes));
            }
        }
        let mut buf = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(classify)? {
            if buf.len() + chunk.len() > self.max_body_bytes {
                return Err(oversized(buf.len() + chunk.len(), self.max_body_bytes));
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(buf)
    }
}

impl Default for BidderClient {
    fn default() -> Self {
        Self::new()
    }
}

fn classify(err: reqwest::Error) -> BidderError {
    if err.is_timeout() {
        BidderError::Timeout
    } else {
        BidderError::Transport(err.to_string())
    }
}

fn oversized(got: usize, cap: usize) -> BidderError {
    BidderError::Transport(format!("response body of {got} bytes exceeds {cap} byte cap"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openrtb::{Banner, Imp};
    use axum::http::StatusCode;
    use axum::routing::{post, MethodRouter};
    use axum::Router;

    fn request() -> BidRequest {
        BidRequest {
            id: "req-00000001".to_string(),
            imp: vec![Imp {
                id: "imp-1".to_string(),
                banner: Some(Banner::default()),
                bidfloor: 0.5,
                ..Default::default()
            }],
            tmax: 100,
            ..Default::default()
        }
    }

    async fn spawn_bidder(handler: MethodRouter) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/bid", handler);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/bid")
    }

    #[tokio::test]
    async fn post_decodes_bid_response() {
        let url = spawn_bidder(post(|| async {
            (
                [(axum::http::header::CONTENT_TYPE, "application/json")],
                r#"{"id":"req-00000001","seatbid":[{"bid":[{"id":"b1","impid":"imp-1","price":2.5}]}]}"#,
            )
        }))
        .await;

        let client = BidderClient::new();
        let response = client
            .post(&url, &request(), Duration::from_secs(5))
            .await
            .expect("should succeed");
        assert_eq!(response.id, "req-00000001");
        assert_eq!(response.seatbid[0].bid[0].price, 2.5);
        assert!(!response.is_no_bid());
    }

    #[tokio::test]
    async fn post_treats_204_as_no_bid() {
        let url = spawn_bidder(post(|| async { StatusCode::NO_CONTENT })).await;

        let client = BidderClient::new();
        let response = client
            .post(&url, &request(), Duration::from_secs(5))
            .await
            .expect("204 is not an error");
        assert_eq!(response.id, "req-00000001");
        assert!(response.is_no_bid());
    }

    #[tokio::test]
    async fn post_classifies_server_errors() {
        let url = spawn_bidder(post(|| async { StatusCode::INTERNAL_SERVER_ERROR })).await;

        let client = BidderClient::new();
        let err = client
            .post(&url, &request(), Duration::from_secs(5))
            .await
            .expect_err("5xx should be an error");
        assert_eq!(err, BidderError::Server(500));
    }

    #[tokio::test]
    async fn post_classifies_decode_failures() {
        let url = spawn_bidder(post(|| async { "not json at all" })).await;

        let client = BidderClient::new();
        let err = client
            .post(&url, &request(), Duration::from_secs(5))
            .await
            .expect_err("garbage body should fail decode");
        assert!(matches!(err, BidderError::Decode(_)));
    }

    #[tokio::test]
    async fn post_times_out_against_slow_endpoints() {
        let url = spawn_bidder(post(|| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            StatusCode::NO_CONTENT
        }))
        .await;

        let client = BidderClient::new();
        let start = std::time::Instant::now();
        let err = client
            .post(&url, &request(), Duration::from_millis(50))
            .await
            .expect_err("slow endpoint should time out");
        assert_eq!(err, BidderError::Timeout);
        assert!(start.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn post_reports_connection_refused_as_transport() {
        let client = BidderClient::new();
        // Nothing listens here.
        let err = client
            .post(
                "http://127.0.0.1:9/bid",
                &request(),
                Duration::from_millis(250),
            )
            .await
            .expect_err("refused connection should error");
        assert!(matches!(
            err,
            BidderError::Transport(_) | BidderError::Timeout
        ));
    }

    #[tokio::test]
    async fn post_caps_oversized_bodies() {
        let url = spawn_bidder(post(|| async {
            let huge = "x".repeat(DEFAULT_MAX_BODY_BYTES + 1);
            (
                [(axum::http::header::CONTENT_TYPE, "application/json")],
                format!(r#"{{"id":"{huge}"}}"#),
            )
        }))
        .await;

        let client = BidderClient::new();
        let err = client
            .post(&url, &request(), Duration::from_secs(5))
            .await
            .expect_err("oversized body should be rejected");
        assert!(matches!(err, BidderError::Transport(_)));
    }
}
