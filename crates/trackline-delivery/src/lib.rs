//! HTTP delivery layer for the trackline SDK.
//!
//! Everything outbound flows through one [`RequestRunner`], which turns
//! raw transport results into the [`DeliveryError`] taxonomy the queue
//! schedules by. [`ApiClient`] adds one typed method per tracking API
//! operation on top of it.

pub mod client;
pub mod error;
pub mod pause;
pub mod payloads;
pub mod policy;
pub mod runner;
pub mod transport;

pub use client::ApiClient;
pub use error::{DeliveryError, DeliveryResult};
pub use pause::PauseWindow;
pub use payloads::{
    DeletePushTokenPayload, DeliveryChannel, DeliveryEventBody, DeliveryEventPayload, Device,
    DeviceRequest, EventBody, EventKind, IdentifyProfilePayload, MetricKind, PushMetricPayload,
    RegisterDeviceTokenPayload, TrackEventPayload,
};
pub use policy::{RetryPolicy, DEFAULT_BACKOFF_MS};
pub use runner::RequestRunner;
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
