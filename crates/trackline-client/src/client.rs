//! High-level tracking client.
//!
//! Wires the delivery stack to the durable queue and layers profile and
//! device identity on top. Tracking calls never fail outward; anything
//! that goes wrong is logged and the call becomes a no-op, matching what
//! callers embedded in an application can actually do about it.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};
use trackline_database::AsyncDatabase;
use trackline_delivery::{
    ApiClient, DeliveryChannel, DeliveryEventBody, DeliveryEventPayload, Device, EventBody,
    EventKind, MetricKind, PauseWindow, PushMetricPayload, RequestRunner, ReqwestTransport,
    DEFAULT_BACKOFF_MS,
};
use trackline_queue::Queue;

use crate::config::ClientConfig;
use crate::dispatch::ApiTaskRunner;
use crate::error::ClientResult;
use crate::logging;

/// How long delivery stays paused after the server forces a stop.
const PAUSE_DURATION: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Default)]
struct IdentityState {
    profile: Option<String>,
    device_token: Option<String>,
}

/// Entry point for host applications.
///
/// Holds the identified profile and registered device token so tracking
/// calls only need the event itself. All calls queue durably and return
/// immediately; delivery happens in the background.
pub struct TracklineClient {
    queue: Queue,
    db: AsyncDatabase,
    identity: RwLock<IdentityState>,
}

impl TracklineClient {
    /// Open the queue database and assemble the delivery stack.
    pub async fn new(config: ClientConfig) -> ClientResult<TracklineClient> {
        logging::init_logging(&config.log_level);

        let tracking_url = config.tracking_url()?;
        let db = AsyncDatabase::open(&config.database_path()).await?;

        let transport = ReqwestTransport::new(
            tracking_url,
            &config.site_id,
            &config.api_key,
            config.request_timeout(),
        );
        let backoff = DEFAULT_BACKOFF_MS
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect();
        let runner = RequestRunner::new(
            Arc::new(transport),
            PauseWindow::new(),
            backoff,
            PAUSE_DURATION,
        );
        let api = Arc::new(ApiClient::new(runner));
        let queue = Queue::new(
            db.clone(),
            Arc::new(ApiTaskRunner::new(api)),
            config.queue_config(),
        );

        // Reap expired and orphaned tasks left over from earlier runs.
        if let Err(error) = queue.cleanup().await {
            warn!(%error, "Queue cleanup failed during startup");
        }

        info!(site_id = %config.site_id, "Trackline client ready");

        Ok(TracklineClient {
            queue,
            db,
            identity: RwLock::new(IdentityState::default()),
        })
    }

    fn identity(&self) -> RwLockReadGuard<'_, IdentityState> {
        self.identity
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn identity_mut(&self) -> RwLockWriteGuard<'_, IdentityState> {
        self.identity
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Identify the person this device tracks as.
    ///
    /// Subsequent events attach to this profile. When the profile
    /// changes, the held device token moves with it: removal from the
    /// old profile is queued before the identify, re-registration under
    /// the new profile after, so pushes never keep targeting the
    /// previous user.
    pub async fn identify(&self, identifier: &str, attributes: Value) {
        let (old_profile, held_token) = {
            let identity = self.identity();
            (identity.profile.clone(), identity.device_token.clone())
        };
        let profile_changing = old_profile.as_deref() != Some(identifier);

        if profile_changing {
            if let (Some(old), Some(token)) = (old_profile.as_deref(), held_token.as_deref()) {
                if let Err(error) = self.queue.queue_delete_device(old, token).await {
                    warn!(%error, "Failed to queue token removal from the previous profile");
                }
            }
        }

        if let Err(error) = self
            .queue
            .queue_identify_profile(identifier, old_profile.as_deref(), attributes)
            .await
        {
            warn!(%error, identifier, "Failed to queue identify");
            return;
        }

        self.identity_mut().profile = Some(identifier.to_string());

        if profile_changing {
            if let Some(token) = held_token {
                self.register_token_for(identifier, &token).await;
            }
        }
    }

    /// Forget the identified profile.
    ///
    /// Queues removal of the registered device token from the profile
    /// first, so pushes stop targeting the signed-out user. The token
    /// itself is kept for the next identify.
    pub async fn clear_identify(&self) {
        let (profile, token) = {
            let identity = self.identity();
            (identity.profile.clone(), identity.device_token.clone())
        };

        let Some(profile) = profile else {
            debug!("No profile identified, nothing to clear");
            return;
        };

        if let Some(token) = token {
            if let Err(error) = self.queue.queue_delete_device(&profile, &token).await {
                warn!(%error, "Failed to queue device token removal");
            }
        }

        self.identity_mut().profile = None;
        debug!(identifier = %profile, "Cleared identified profile");
    }

    /// Track an event for the identified profile.
    pub async fn track(&self, name: &str, data: Value) {
        self.track_with_kind(EventKind::Event, name, data).await;
    }

    /// Track a screen view for the identified profile.
    pub async fn screen(&self, title: &str, data: Value) {
        self.track_with_kind(EventKind::Screen, title, data).await;
    }

    async fn track_with_kind(&self, kind: EventKind, name: &str, data: Value) {
        let profile = self.identity().profile.clone();
        let Some(profile) = profile else {
            warn!(event = name, "Ignoring event, no profile identified");
            return;
        };

        let event = EventBody {
            name: name.to_string(),
            kind,
            data,
            timestamp: Some(Utc::now().timestamp()),
        };

        if let Err(error) = self.queue.queue_track_event(&profile, event).await {
            warn!(%error, event = name, "Failed to queue event");
        }
    }

    /// Register this device's push token.
    ///
    /// The token is held client-side and queued for registration once a
    /// profile is identified (immediately when one already is).
    pub async fn register_device_token(&self, token: &str) {
        let profile = {
            let mut identity = self.identity_mut();
            identity.device_token = Some(token.to_string());
            identity.profile.clone()
        };

        let Some(profile) = profile else {
            debug!("Holding device token until a profile is identified");
            return;
        };

        self.register_token_for(&profile, token).await;
    }

    async fn register_token_for(&self, profile: &str, token: &str) {
        let device = Device {
            token: token.to_string(),
            platform: std::env::consts::OS.to_string(),
            last_used: Some(Utc::now().timestamp()),
            attributes: None,
        };

        if let Err(error) = self.queue.queue_register_device(profile, device).await {
            warn!(%error, "Failed to queue device registration");
        }
    }

    /// Remove the registered push token from the identified profile.
    pub async fn delete_device_token(&self) {
        let (profile, token) = {
            let identity = self.identity();
            (identity.profile.clone(), identity.device_token.clone())
        };

        let Some(profile) = profile else {
            debug!("No profile identified, nothing to delete the token from");
            return;
        };
        let Some(token) = token else {
            debug!("No device token registered, nothing to delete");
            return;
        };

        if let Err(error) = self.queue.queue_delete_device(&profile, &token).await {
            warn!(%error, "Failed to queue device token removal");
        }
    }

    /// Report a push notification metric (delivered, opened, ...).
    pub async fn track_push_metric(&self, delivery_id: &str, device_token: &str, event: MetricKind) {
        let metric = PushMetricPayload {
            delivery_id: delivery_id.to_string(),
            device_token: device_token.to_string(),
            event,
            timestamp: Utc::now().timestamp(),
        };

        if let Err(error) = self.queue.queue_push_metric(metric).await {
            warn!(%error, "Failed to queue push metric");
        }
    }

    /// Report an in-app message delivery event.
    pub async fn track_in_app_metric(
        &self,
        delivery_id: &str,
        event: MetricKind,
        metadata: Option<Value>,
    ) {
        let payload = DeliveryEventPayload {
            channel: DeliveryChannel::InApp,
            payload: DeliveryEventBody {
                delivery_id: delivery_id.to_string(),
                event,
                timestamp: Utc::now().timestamp(),
                metadata,
            },
        };

        if let Err(error) = self.queue.queue_delivery_event(payload).await {
            warn!(%error, "Failed to queue in-app delivery event");
        }
    }

    /// Run a delivery pass now instead of waiting for the backlog
    /// threshold or the debounce timer.
    pub async fn flush(&self) {
        match self.queue.run_once().await {
            Ok(Some(summary)) => debug!(
                delivered = summary.delivered,
                failed = summary.failed,
                "Flush finished"
            ),
            Ok(None) => debug!("Flush skipped, a pass is already running"),
            Err(error) => warn!(%error, "Flush failed"),
        }
    }

    /// The queue backing this client.
    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Currently identified profile, if any.
    pub fn profile_identifier(&self) -> Option<String> {
        self.identity().profile.clone()
    }

    /// Close the queue database, waiting for in-flight writes.
    pub async fn shutdown(self) -> ClientResult<()> {
        self.db.close().await?;
        Ok(())
    }
}
