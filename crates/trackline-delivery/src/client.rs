//! Typed operations against the tracking API.

use crate::{
    DeliveryError, DeliveryEventPayload, DeliveryResult, Device, DeviceRequest, EventBody,
    HttpRequest, PauseWindow, PushMetricPayload, RequestRunner,
};
use serde::Serialize;

fn to_body<T: Serialize>(value: &T) -> DeliveryResult<String> {
    serde_json::to_string(value).map_err(|e| DeliveryError::MalformedPayload(e.to_string()))
}

/// One method per tracking API operation, all funneled through the same
/// [`RequestRunner`] so they share retry and pause behavior.
pub struct ApiClient {
    runner: RequestRunner,
}

impl ApiClient {
    pub fn new(runner: RequestRunner) -> Self {
        Self { runner }
    }

    /// The pause window shared by all operations.
    pub fn pause(&self) -> &PauseWindow {
        self.runner.pause()
    }

    /// Create or update a customer profile.
    pub async fn identify_profile(
        &self,
        identifier: &str,
        attributes: &serde_json::Value,
    ) -> DeliveryResult<()> {
        let request = HttpRequest::put(
            format!("api/v1/customers/{}", identifier),
            to_body(attributes)?,
        );
        self.runner.perform(&request).await?;
        Ok(())
    }

    /// Deliver an event or screen view for a profile.
    pub async fn track_event(&self, identifier: &str, event: &EventBody) -> DeliveryResult<()> {
        let request = HttpRequest::post(
            format!("api/v1/customers/{}/events", identifier),
            to_body(event)?,
        );
        self.runner.perform(&request).await?;
        Ok(())
    }

    /// Register a device (push token) under a profile.
    pub async fn register_device(&self, identifier: &str, device: &Device) -> DeliveryResult<()> {
        let body = DeviceRequest {
            device: device.clone(),
        };
        let request = HttpRequest::put(
            format!("api/v1/customers/{}/devices", identifier),
            to_body(&body)?,
        );
        self.runner.perform(&request).await?;
        Ok(())
    }

    /// Remove a device token from a profile.
    pub async fn delete_device(&self, identifier: &str, device_token: &str) -> DeliveryResult<()> {
        let request = HttpRequest::delete(format!(
            "api/v1/customers/{}/devices/{}",
            identifier, device_token
        ));
        self.runner.perform(&request).await?;
        Ok(())
    }

    /// Report a push delivery metric.
    pub async fn track_push_metric(&self, metric: &PushMetricPayload) -> DeliveryResult<()> {
        let request = HttpRequest::post("push/events", to_body(metric)?);
        self.runner.perform(&request).await?;
        Ok(())
    }

    /// Report an in-app delivery event.
    pub async fn track_delivery_event(&self, event: &DeliveryEventPayload) -> DeliveryResult<()> {
        let request = HttpRequest::post("api/v1/deliveries/events", to_body(event)?);
        self.runner.perform(&request).await?;
        Ok(())
    }
}
