//! Shared fixtures for the unit tests: a mock Resi Studio server, a host that
//! remembers what it was told, and a [`Context`] wired to both.

use crate::config::{ApiSettings, ConfigStore, MemoryConfigStore, ModuleConfig, PollSettings};
use crate::context::Context;
use crate::host::{ConnectionStatus, Host};
use crate::resi_api::{DestinationStatus, ResiClient};
use crate::schedule::Schedule;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedStatus(pub ConnectionStatus, pub Option<String>);

#[derive(Debug, Default)]
pub(crate) struct RecordingHost {
    statuses: Mutex<Vec<RecordedStatus>>,
    variables: Mutex<Vec<(String, String)>>,
    feedback_checks: AtomicUsize,
}

impl RecordingHost {
    pub(crate) fn statuses(&self) -> Vec<RecordedStatus> {
        self.statuses.lock().unwrap().clone()
    }

    pub(crate) fn variables(&self) -> Vec<(String, String)> {
        self.variables.lock().unwrap().clone()
    }

    pub(crate) fn feedback_checks(&self) -> usize {
        self.feedback_checks.load(Ordering::SeqCst)
    }
}

impl Host for RecordingHost {
    fn update_status(&self, status: ConnectionStatus, message: Option<&str>) {
        self.statuses
            .lock()
            .unwrap()
            .push(RecordedStatus(status, message.map(str::to_owned)));
    }

    fn check_feedbacks(&self) {
        self.feedback_checks.fetch_add(1, Ordering::SeqCst);
    }

    fn set_variable(&self, name: &str, value: &str) {
        self.variables
            .lock()
            .unwrap()
            .push((name.to_owned(), value.to_owned()));
    }
}

/// API settings pointing at a mock server, with a quota tests never run into.
pub(crate) fn test_api_settings(base_url: &str) -> ApiSettings {
    ApiSettings {
        base_url: base_url.to_string(),
        request_timeout: Duration::from_secs(5),
        request_limit: 1000,
        ..ApiSettings::default()
    }
}

pub(crate) fn test_poll_settings() -> PollSettings {
    PollSettings {
        slow_interval: Duration::from_millis(100),
        fast_interval: Duration::from_millis(50),
        fast_max_attempts: 20,
    }
}

pub(crate) fn test_config(schedules: Vec<Schedule>) -> ModuleConfig {
    ModuleConfig {
        client_id: "client".into(),
        client_secret: "secret".into(),
        verbose: false,
        schedules,
    }
}

/// Answers every token request with `test-token`, valid for an hour.
pub(crate) async fn mock_token(server: &mut mockito::ServerGuard) -> mockito::Mock {
    server
        .mock("POST", "/oauth/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token": "test-token", "expires_in": 3600}"#)
        .create_async()
        .await
}

/// A `GET /schedules/{id}` body with one destination per status.
pub(crate) fn schedule_body(schedule_id: &str, statuses: &[DestinationStatus]) -> String {
    let destinations: Vec<_> = statuses
        .iter()
        .enumerate()
        .map(|(i, status)| {
            serde_json::json!({
                "id": format!("d{}", i + 1),
                "name": format!("Destination {}", i + 1),
                "type": "YOUTUBE",
                "status": status,
            })
        })
        .collect();
    serde_json::json!({ "id": schedule_id, "destinations": destinations }).to_string()
}

pub(crate) struct TestContext {
    pub server: mockito::ServerGuard,
    pub ctx: Arc<Context>,
    pub host: Arc<RecordingHost>,
    pub store: Arc<MemoryConfigStore>,
}

impl TestContext {
    pub(crate) async fn new() -> Self {
        Self::with_schedules(Vec::new()).await
    }

    pub(crate) async fn with_schedules(schedules: Vec<Schedule>) -> Self {
        let mut server = mockito::Server::new_async().await;
        mock_token(&mut server).await;

        let config = test_config(schedules);
        let host = Arc::new(RecordingHost::default());
        let store = Arc::new(MemoryConfigStore::new(config.clone()));
        let api = ResiClient::new(&test_api_settings(&server.url()), config.credentials()).unwrap();
        let ctx = Arc::new(Context::new(
            api,
            config,
            test_poll_settings(),
            host.clone(),
            store.clone(),
        ));

        Self {
            server,
            ctx,
            host,
            store,
        }
    }

    /// What the config store currently holds.
    pub(crate) fn persisted(&self) -> ModuleConfig {
        self.store.load().unwrap()
    }
}
