//! Request execution and outcome classification.

use crate::{
    DeliveryError, DeliveryResult, HttpRequest, HttpResponse, HttpTransport, PauseWindow,
    RetryPolicy,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Pull a human-readable error out of a response body.
///
/// The tracking API reports errors as `{"meta": {"error": "..."}}`; some
/// endpoints use a top-level `{"message": "..."}` instead. Anything else
/// falls back to the raw body.
fn parse_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value.get("message").and_then(|v| v.as_str()) {
            return message.to_string();
        }
        if let Some(message) = value
            .get("meta")
            .and_then(|meta| meta.get("error"))
            .and_then(|v| v.as_str())
        {
            return message.to_string();
        }
    }

    if body.trim().is_empty() {
        "(server did not give a response)".to_string()
    } else {
        body.to_string()
    }
}

/// Runs requests through the transport and classifies every outcome as
/// success or a [`DeliveryError`].
///
/// 5xx responses are retried in place on the backoff schedule; running
/// out of schedule, or a 401, opens the shared pause window.
pub struct RequestRunner {
    transport: Arc<dyn HttpTransport>,
    pause: PauseWindow,
    backoff: Vec<Duration>,
    pause_duration: Duration,
}

impl RequestRunner {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        pause: PauseWindow,
        backoff: Vec<Duration>,
        pause_duration: Duration,
    ) -> Self {
        Self {
            transport,
            pause,
            backoff,
            pause_duration,
        }
    }

    /// The pause window this runner consults and opens.
    pub fn pause(&self) -> &PauseWindow {
        &self.pause
    }

    /// Run one request to completion.
    ///
    /// The pause window is checked before every attempt, including
    /// attempts that follow a backoff sleep.
    pub async fn perform(&self, request: &HttpRequest) -> DeliveryResult<HttpResponse> {
        let mut policy = RetryPolicy::new(self.backoff.clone());

        loop {
            if self.pause.is_active() {
                debug!(method = %request.method, path = %request.path, "Outbound requests paused, skipping");
                return Err(DeliveryError::RequestsPaused);
            }

            let response = self.transport.execute(request).await?;

            match response.status {
                200..=299 => return Ok(response),
                500..=599 => match policy.next_sleep_time() {
                    Some(sleep) => {
                        debug!(
                            status = response.status,
                            sleep_ms = sleep.as_millis() as u64,
                            "Server error, backing off before retry"
                        );
                        tokio::time::sleep(sleep).await;
                    }
                    None => {
                        warn!(
                            status = response.status,
                            pause_secs = self.pause_duration.as_secs(),
                            "Server still failing after all retries, pausing outbound requests"
                        );
                        self.pause.pause_for(self.pause_duration);
                        return Err(DeliveryError::ServerDown);
                    }
                },
                401 => {
                    warn!(method = %request.method, path = %request.path, "Unauthorized, pausing outbound requests");
                    self.pause.pause_for(self.pause_duration);
                    return Err(DeliveryError::Unauthorized);
                }
                status => {
                    let message = parse_error_message(&response.body);
                    debug!(status, message = %message, "Request rejected by server");
                    return Err(DeliveryError::UnsuccessfulStatusCode { status, message });
                }
            }
        }
    }
}
