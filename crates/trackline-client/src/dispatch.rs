//! Bridges stored queue tasks back into tracking API calls.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use trackline_database::{TaskRecord, TaskType};
use trackline_delivery::{
    ApiClient, DeletePushTokenPayload, DeliveryError, DeliveryEventPayload, DeliveryResult,
    IdentifyProfilePayload, PushMetricPayload, RegisterDeviceTokenPayload, TrackEventPayload,
};
use trackline_queue::TaskRunner;

fn decode<T: DeserializeOwned>(data: &str) -> DeliveryResult<T> {
    serde_json::from_str(data).map_err(|e| DeliveryError::MalformedPayload(e.to_string()))
}

/// Runs queue tasks by decoding their stored payload and calling the
/// matching [`ApiClient`] operation.
///
/// Records whose type or payload no longer decodes come back as fatal
/// errors, which makes the queue drop them instead of retrying forever.
pub struct ApiTaskRunner {
    api: Arc<ApiClient>,
}

impl ApiTaskRunner {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl TaskRunner for ApiTaskRunner {
    async fn run_task(&self, task: &TaskRecord) -> DeliveryResult<()> {
        let Some(task_type) = TaskType::from_str(&task.task_type) else {
            return Err(DeliveryError::UnknownTaskType(task.task_type.clone()));
        };

        match task_type {
            TaskType::IdentifyProfile => {
                let payload: IdentifyProfilePayload = decode(&task.data)?;
                self.api
                    .identify_profile(&payload.identifier, &payload.attributes)
                    .await
            }
            TaskType::TrackEvent => {
                let payload: TrackEventPayload = decode(&task.data)?;
                self.api
                    .track_event(&payload.identifier, &payload.event)
                    .await
            }
            TaskType::RegisterDeviceToken => {
                let payload: RegisterDeviceTokenPayload = decode(&task.data)?;
                self.api
                    .register_device(&payload.profile_identified, &payload.device)
                    .await
            }
            TaskType::DeletePushToken => {
                let payload: DeletePushTokenPayload = decode(&task.data)?;
                self.api
                    .delete_device(&payload.profile_identified, &payload.device_token)
                    .await
            }
            TaskType::TrackPushMetric => {
                let payload: PushMetricPayload = decode(&task.data)?;
                self.api.track_push_metric(&payload).await
            }
            TaskType::TrackDeliveryEvent => {
                let payload: DeliveryEventPayload = decode(&task.data)?;
                self.api.track_delivery_event(&payload).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;
    use trackline_database::TaskRunResults;
    use trackline_delivery::{
        HttpMethod, HttpRequest, HttpResponse, HttpTransport, PauseWindow, RequestRunner,
    };

    struct RecordingTransport {
        seen: Mutex<Vec<HttpRequest>>,
    }

    #[async_trait]
    impl HttpTransport for RecordingTransport {
        async fn execute(&self, request: &HttpRequest) -> DeliveryResult<HttpResponse> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(HttpResponse {
                status: 200,
                body: String::new(),
            })
        }
    }

    fn runner() -> (ApiTaskRunner, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport {
            seen: Mutex::new(Vec::new()),
        });
        let request_runner = RequestRunner::new(
            transport.clone(),
            PauseWindow::new(),
            Vec::new(),
            Duration::from_secs(300),
        );
        let api = Arc::new(ApiClient::new(request_runner));
        (ApiTaskRunner::new(api), transport)
    }

    fn record(task_type: &str, data: serde_json::Value) -> TaskRecord {
        TaskRecord {
            id: "task-1".to_string(),
            task_type: task_type.to_string(),
            data: data.to_string(),
            run_results: TaskRunResults { total_runs: 0 },
        }
    }

    #[tokio::test]
    async fn identify_record_hits_the_customers_endpoint() {
        let (runner, transport) = runner();
        let task = record(
            "identify_profile",
            json!({"identifier": "alice", "attributes": {"plan": "pro"}}),
        );

        runner.run_task(&task).await.unwrap();

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, HttpMethod::Put);
        assert_eq!(seen[0].path, "api/v1/customers/alice");
    }

    #[tokio::test]
    async fn push_metric_record_hits_push_events() {
        let (runner, transport) = runner();
        let task = record(
            "track_push_metric",
            json!({
                "delivery_id": "d-1",
                "device_id": "tok-1",
                "event": "opened",
                "timestamp": 1721299502
            }),
        );

        runner.run_task(&task).await.unwrap();

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].method, HttpMethod::Post);
        assert_eq!(seen[0].path, "push/events");
    }

    #[tokio::test]
    async fn delete_token_record_hits_the_device_path() {
        let (runner, transport) = runner();
        let task = record(
            "delete_push_token",
            json!({"profileIdentified": "alice", "deviceToken": "tok-9"}),
        );

        runner.run_task(&task).await.unwrap();

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].method, HttpMethod::Delete);
        assert_eq!(seen[0].path, "api/v1/customers/alice/devices/tok-9");
    }

    #[tokio::test]
    async fn unknown_task_type_is_fatal_without_a_request() {
        let (runner, transport) = runner();
        let task = record("sync_carts", json!({}));

        let error = runner.run_task(&task).await.unwrap_err();
        assert_eq!(error, DeliveryError::UnknownTaskType("sync_carts".to_string()));
        assert!(error.is_fatal());
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn undecodable_payload_is_fatal_without_a_request() {
        let (runner, transport) = runner();
        let task = TaskRecord {
            id: "task-2".to_string(),
            task_type: "identify_profile".to_string(),
            data: "{not json".to_string(),
            run_results: TaskRunResults { total_runs: 2 },
        };

        let error = runner.run_task(&task).await.unwrap_err();
        assert!(matches!(error, DeliveryError::MalformedPayload(_)));
        assert!(error.is_fatal());
        assert!(transport.seen.lock().unwrap().is_empty());
    }
}
