//! Device operations
//!
//! Every call goes through the [`RetryOrchestrator`]. The session is read and
//! the request signed inside the retried closure, so a refresh between
//! attempts is picked up and every attempt carries a fresh timestamp and
//! nonce.

pub mod listing;

use std::collections::BTreeMap;
use std::sync::Arc;

use mowerlink_common::Clock;
use mowerlink_domain::constants::{
    DEVICE_PAGE_SIZE, MAX_DEVICE_PAGES, PATH_IOT_DEVICE_PAGE, PATH_LIST_BINDINGS,
    PATH_PROPERTIES_GET, PATH_PROPERTIES_SET, PATH_SERVICE_INVOKE, STATUS_PROPERTY_KEYS,
};
use mowerlink_domain::{
    ClientError, DeviceRecord, DeviceStatus, MowerCommand, MowerSnapshot, Result,
};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub use listing::device_entries;

use crate::auth::{join_url, SessionManager};
use crate::http::envelope::into_data;
use crate::http::{Transport, TransportRequest};
use crate::retry::RetryOrchestrator;

/// Device listing, status, properties and commands over signed gateway calls.
pub struct DeviceService {
    sessions: Arc<SessionManager>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    retry: Arc<RetryOrchestrator>,
}

impl DeviceService {
    /// Wire the service to a session owner and retry orchestrator.
    pub fn new(
        sessions: Arc<SessionManager>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        retry: Arc<RetryOrchestrator>,
    ) -> Self {
        Self { sessions, transport, clock, retry }
    }

    /// Signed gateway call under the retry policy, returning the payload.
    async fn signed_call(
        &self,
        operation: &str,
        path: &str,
        params: BTreeMap<String, String>,
    ) -> Result<Value> {
        self.retry
            .execute(operation, || {
                let params = params.clone();
                async move {
                    let session = self.sessions.current_session().await?;
                    let nonce = Uuid::new_v4().to_string();
                    let call = self.sessions.strategy().sign(
                        path,
                        params,
                        Some(&session),
                        self.clock.millis_since_epoch(),
                        &nonce,
                    )?;
                    into_data(self.transport.execute(call.into_request()).await?)
                }
            })
            .await
    }

    /// All devices bound to the account. An empty account is not an error.
    #[instrument(skip(self))]
    pub async fn list_devices(&self) -> Result<Vec<DeviceRecord>> {
        let mut devices = Vec::new();
        for page in 1..=MAX_DEVICE_PAGES {
            let params = BTreeMap::from([
                ("pageNo".to_string(), page.to_string()),
                ("pageSize".to_string(), DEVICE_PAGE_SIZE.to_string()),
            ]);
            let payload = self.signed_call("list_devices", PATH_LIST_BINDINGS, params).await?;
            let entries = device_entries(&payload);
            devices.extend(DeviceRecord::from_values(entries));
            if entries.len() < DEVICE_PAGE_SIZE {
                break;
            }
        }

        if devices.is_empty() {
            devices = self.list_from_iot_endpoint().await?;
        }

        info!(count = devices.len(), "listed devices");
        Ok(devices)
    }

    /// Listing through the IoT endpoint captured at login, if there is one.
    async fn list_from_iot_endpoint(&self) -> Result<Vec<DeviceRecord>> {
        let Some(endpoint) = self.sessions.session().await.and_then(|s| s.iot_endpoint) else {
            return Ok(Vec::new());
        };
        let url = join_url(&endpoint, PATH_IOT_DEVICE_PAGE);
        debug!(%url, "binding list empty, trying IoT endpoint");

        let outcome = self
            .retry
            .execute("list_devices_iot", || {
                let url = url.clone();
                async move {
                    let session = self.sessions.current_session().await?;
                    let request = TransportRequest::post(url)
                        .header("Authorization", format!("Bearer {}", session.access_token))
                        .json(json!({"pageNo": 1, "pageSize": DEVICE_PAGE_SIZE}));
                    into_data(self.transport.execute(request).await?)
                }
            })
            .await;

        match outcome {
            Ok(payload) => Ok(DeviceRecord::from_values(device_entries(&payload))),
            Err(err) if err.is_auth_failure() || matches!(err, ClientError::Cancelled) => Err(err),
            Err(err) => {
                warn!(error = %err, "IoT endpoint listing failed, reporting no devices");
                Ok(Vec::new())
            }
        }
    }

    /// Fetch the given property keys. Keys the device did not report, and
    /// keys that were not asked for, are absent from the result.
    #[instrument(skip(self, keys), fields(keys = keys.len()))]
    pub async fn get_device_properties(&self, iot_id: &str, keys: &[&str]) -> Result<DeviceStatus> {
        let params = BTreeMap::from([
            ("iotId".to_string(), iot_id.to_string()),
            ("keys".to_string(), json!(keys).to_string()),
        ]);
        let payload = self
            .signed_call("get_device_properties", PATH_PROPERTIES_GET, params)
            .await
            .map_err(|e| e.with_device(iot_id))?;
        Ok(DeviceStatus::from_payload(iot_id, &payload, keys))
    }

    /// The standard status poll.
    pub async fn get_device_status(&self, iot_id: &str) -> Result<DeviceStatus> {
        debug!(version = STATUS_PROPERTY_KEYS.version, "polling status");
        self.get_device_properties(iot_id, STATUS_PROPERTY_KEYS.keys).await
    }

    /// Write properties (cutting height and the like).
    #[instrument(skip(self, items))]
    pub async fn set_device_properties(&self, iot_id: &str, items: &Value) -> Result<Value> {
        let params = BTreeMap::from([
            ("iotId".to_string(), iot_id.to_string()),
            ("items".to_string(), items.to_string()),
        ]);
        self.signed_call("set_device_properties", PATH_PROPERTIES_SET, params)
            .await
            .map_err(|e| e.with_device(iot_id))
    }

    /// Invoke the service behind `command`.
    #[instrument(skip(self, args))]
    pub async fn send_command(
        &self,
        iot_id: &str,
        command: MowerCommand,
        args: Option<Value>,
    ) -> Result<Value> {
        let args = args.unwrap_or_else(|| json!({}));
        let params = BTreeMap::from([
            ("iotId".to_string(), iot_id.to_string()),
            ("identifier".to_string(), command.service_identifier().to_string()),
            ("args".to_string(), args.to_string()),
        ]);
        let response = self
            .signed_call("send_command", PATH_SERVICE_INVOKE, params)
            .await
            .map_err(|e| e.with_device(iot_id))?;
        info!(%command, "command accepted");
        Ok(response)
    }

    /// Normalized status. An offline device yields an offline snapshot.
    pub async fn get_mower_snapshot(&self, iot_id: &str) -> Result<MowerSnapshot> {
        match self.get_device_status(iot_id).await {
            Ok(status) => Ok(MowerSnapshot::from(&status)),
            Err(ClientError::DeviceOffline { .. }) => {
                info!(iot_id, "device offline");
                Ok(MowerSnapshot::offline(iot_id))
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use mowerlink_common::testing::RecordingSleeper;
    use mowerlink_common::MockClock;
    use mowerlink_domain::{ApiGeneration, AuthState, ClientConfig, MowerState, RetrySettings};
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::auth::OAuth2Strategy;
    use crate::http::HttpTransport;
    use crate::retry::retry_config;

    async fn service(server: &MockServer, iot_endpoint: Option<String>) -> DeviceService {
        let now = Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap();
        let clock: Arc<dyn Clock> = Arc::new(MockClock::at(now));
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new().unwrap());
        let config = ClientConfig {
            generation: ApiGeneration::OAuth2,
            app_key: "app-key".into(),
            app_secret: "app-secret".into(),
            api_base_url: server.uri(),
            auth_base_url: server.uri(),
            ..ClientConfig::default()
        };
        let strategy = Arc::new(OAuth2Strategy::new(&config, transport.clone(), clock.clone()));
        let sessions = Arc::new(SessionManager::new(strategy, clock.clone()));
        sessions
            .restore_auth_state(AuthState {
                access_token: Some("iot-token".into()),
                refresh_token: Some("refresh".into()),
                expires_at: Some(now + Duration::hours(1)),
                client_id: Some("install-1".into()),
                endpoint: Some(server.uri()),
                iot_endpoint,
                ..AuthState::default()
            })
            .await
            .unwrap();

        let retry = Arc::new(RetryOrchestrator::new(
            retry_config(&RetrySettings::default()),
            Arc::new(RecordingSleeper::new()),
            sessions.clone(),
            CancellationToken::new(),
        ));
        DeviceService::new(sessions, transport, clock, retry)
    }

    fn devices(count: usize, offset: usize) -> Vec<Value> {
        (0..count).map(|i| json!({"iotId": format!("dev-{}", i + offset)})).collect()
    }

    #[tokio::test]
    async fn list_follows_pages_until_a_short_one() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PATH_LIST_BINDINGS))
            .and(body_string_contains("pageNo=1&"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200, "data": {"data": devices(DEVICE_PAGE_SIZE, 0)}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(PATH_LIST_BINDINGS))
            .and(body_string_contains("pageNo=2&"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200, "data": devices(3, DEVICE_PAGE_SIZE)
            })))
            .expect(1)
            .mount(&server)
            .await;

        let listed = service(&server, None).await.list_devices().await.unwrap();
        assert_eq!(listed.len(), DEVICE_PAGE_SIZE + 3);
        assert_eq!(listed.last().unwrap().iot_id, format!("dev-{}", DEVICE_PAGE_SIZE + 2));
    }

    #[tokio::test]
    async fn empty_binding_list_falls_back_to_iot_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PATH_LIST_BINDINGS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200, "data": {"data": [], "total": 0}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(PATH_IOT_DEVICE_PAGE))
            .and(header("Authorization", "Bearer iot-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "data": {"list": [{"deviceId": "m-1", "deviceName": "Front lawn"}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let listed = service(&server, Some(server.uri())).await.list_devices().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].iot_id, "m-1");
    }

    #[tokio::test]
    async fn empty_account_without_hint_is_an_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PATH_LIST_BINDINGS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 200, "data": []})))
            .mount(&server)
            .await;

        assert!(service(&server, None).await.list_devices().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_keeps_requested_keys_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PATH_PROPERTIES_GET))
            .and(body_string_contains("iotId=dev-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200,
                "data": {
                    "batteryPercentage": {"value": 76, "time": 1},
                    "workState": {"value": 1, "time": 1},
                    "firmwareVersion": {"value": "2.1.0", "time": 1}
                }
            })))
            .mount(&server)
            .await;

        let status = service(&server, None).await.get_device_status("dev-1").await.unwrap();
        assert_eq!(status.properties.len(), 2);
        assert!(!status.properties.contains_key("firmwareVersion"));
        assert_eq!(status.battery_level(), Some(76));
        assert_eq!(status.mower_state(), MowerState::Mowing);
    }

    #[tokio::test]
    async fn command_invokes_service_identifier() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PATH_SERVICE_INVOKE))
            .and(body_string_contains("identifier=returnToDock"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200, "data": {"accepted": true}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = service(&server, None)
            .await
            .send_command("dev-1", MowerCommand::ReturnToDock, None)
            .await
            .unwrap();
        assert_eq!(response, json!({"accepted": true}));
    }

    #[tokio::test]
    async fn offline_device_yields_offline_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PATH_PROPERTIES_GET))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 6205, "message": "device not online"
            })))
            .expect(2)
            .mount(&server)
            .await;

        let svc = service(&server, None).await;
        let err = svc.get_device_status("dev-9").await.unwrap_err();
        assert!(
            matches!(err, ClientError::DeviceOffline { device_id: Some(ref id), .. } if id == "dev-9")
        );

        let snapshot = svc.get_mower_snapshot("dev-9").await.unwrap();
        assert_eq!(snapshot.state, MowerState::Offline);
        assert!(!snapshot.online);
    }
}
