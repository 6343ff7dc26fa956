//! Task payload and wire body types.
//!
//! These structs define both what gets persisted inside a queue task and
//! what goes over the wire. Field names follow the tracking API: queue
//! payloads use camelCase keys, device and metric bodies use the
//! snake_case keys the server expects.

use serde::{Deserialize, Serialize};

/// Whether a tracked event is a custom event or a screen view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Event,
    Screen,
}

/// Delivery metric reported for a push or in-app message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Delivered,
    Opened,
    Converted,
    Clicked,
}

/// A device entry as the server stores it. The push token doubles as
/// the device id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(rename = "id")]
    pub token: String,
    pub platform: String,
    /// Unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<serde_json::Value>,
}

/// Body of a tracked event or screen view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBody {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: serde_json::Value,
    /// Unix seconds; omitted when the caller did not supply one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

// ===== Stored task payloads =====

/// Payload of an identify task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifyProfilePayload {
    pub identifier: String,
    pub attributes: serde_json::Value,
}

/// Payload of a track-event task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackEventPayload {
    pub identifier: String,
    pub event: EventBody,
}

/// Payload of a register-device-token task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceTokenPayload {
    pub profile_identified: String,
    pub device: Device,
}

/// Payload of a delete-push-token task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePushTokenPayload {
    pub profile_identified: String,
    pub device_token: String,
}

/// Payload of a push-metric task. Stored and wire forms are identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMetricPayload {
    pub delivery_id: String,
    #[serde(rename = "device_id")]
    pub device_token: String,
    pub event: MetricKind,
    /// Unix seconds.
    pub timestamp: i64,
}

/// Channel an in-app delivery event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryChannel {
    InApp,
}

/// Payload of a delivery-event task. Stored and wire forms are
/// identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryEventPayload {
    #[serde(rename = "type")]
    pub channel: DeliveryChannel,
    pub payload: DeliveryEventBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryEventBody {
    pub delivery_id: String,
    pub event: MetricKind,
    /// Unix seconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

// ===== Wire-only wrappers =====

/// Request body for device registration.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceRequest {
    pub device: Device,
}
