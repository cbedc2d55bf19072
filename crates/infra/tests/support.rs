//! Shared harness for client integration tests: a wiremock vendor cloud, a
//! frozen clock and a sleeper that records instead of waiting.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use mowerlink_common::testing::RecordingSleeper;
use mowerlink_common::MockClock;
use mowerlink_domain::constants::{PATH_CREATE_SESSION, PATH_REGION_GET, PATH_USER_LOGIN};
use mowerlink_domain::{ApiGeneration, ClientConfig};
use mowerlink_infra::MowerClient;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN_PATH: &str = "/oauth2/token";

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap()
}

pub struct Harness {
    pub server: MockServer,
    pub client: MowerClient,
    pub clock: MockClock,
    pub sleeper: RecordingSleeper,
}

pub fn config(server: &MockServer, generation: ApiGeneration) -> ClientConfig {
    ClientConfig {
        generation,
        app_key: "app-key".into(),
        app_secret: "app-secret".into(),
        client_id: "client-1".into(),
        client_secret: "client-secret".into(),
        api_base_url: server.uri(),
        auth_base_url: server.uri(),
        ..ClientConfig::default()
    }
}

impl Harness {
    pub async fn start(generation: ApiGeneration) -> Self {
        let server = MockServer::start().await;
        let clock = MockClock::at(now());
        let sleeper = RecordingSleeper::new();
        let client = Self::client_for(&server, generation, &clock, &sleeper);
        Self { server, client, clock, sleeper }
    }

    /// A second client against the same server, clock and sleeper.
    pub fn another_client(&self) -> MowerClient {
        Self::client_for(&self.server, self.client.generation(), &self.clock, &self.sleeper)
    }

    fn client_for(
        server: &MockServer,
        generation: ApiGeneration,
        clock: &MockClock,
        sleeper: &RecordingSleeper,
    ) -> MowerClient {
        MowerClient::builder(config(server, generation))
            .clock(Arc::new(clock.clone()))
            .sleeper(Arc::new(sleeper.clone()))
            .build()
            .expect("client should build")
    }
}

/// Password grant answering with `access-1` / `refresh-1`.
pub async fn mount_oauth_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "expires_in": 3600,
            "userInformation": {"userId": "user-42"}
        })))
        .expect(1)
        .mount(server)
        .await;
}

/// Region lookup, account login and token exchange for the legacy flow.
pub async fn mount_legacy_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(PATH_REGION_GET))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "data": {"regionId": "eu-central-1", "apiGatewayEndpoint": server.uri()}
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(PATH_USER_LOGIN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "data": {"authCode": "code-1"}
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(PATH_CREATE_SESSION))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "data": {
                "iotToken": "iot-1",
                "refreshToken": "refresh-1",
                "identity": {"identityId": "ident-1"}
            }
        })))
        .mount(server)
        .await;
}
