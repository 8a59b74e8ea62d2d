//! Core Resi Studio API client functionality.

use crate::config::ApiSettings;
use crate::error::ResiError;
use crate::rate_limit::RateLimiter;
use crate::resi_api::types::{
    DestinationGroup, Encoder, LiveScheduleRequest, ScheduleResponse,
};
use crate::session::{Credentials, SessionManager};
use eyre::Context;
use http::Method;
use http::header::LOCATION;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::instrument;

/// Client for the Resi Studio REST API.
///
/// Every request first waits for the shared [`RateLimiter`] and then obtains a
/// valid bearer token from the [`SessionManager`], so callers never have to think
/// about either. Cloning is cheap and clones share the token and the request log.
#[derive(Debug, Clone)]
pub struct ResiClient {
    base_url: Arc<str>,
    session: Arc<SessionManager>,
    limiter: Arc<RateLimiter>,
    client: reqwest::Client,
}

impl ResiClient {
    /// Creates a client for the API at `settings.base_url`.
    ///
    /// # Arguments
    ///
    /// * `settings` - Base URL, HTTP timeout and request quota
    /// * `credentials` - Client id and secret; without them every request fails with
    ///   [`ResiError::MissingCredentials`]
    pub fn new(settings: &ApiSettings, credentials: Option<Credentials>) -> eyre::Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .timeout(settings.request_timeout)
            .build()
            .context("build HTTP client")?;
        let base_url: Arc<str> = Arc::from(settings.base_url.trim_end_matches('/'));
        Ok(Self {
            session: Arc::new(SessionManager::new(client.clone(), &base_url, credentials)),
            limiter: Arc::new(RateLimiter::new(
                settings.request_limit,
                settings.request_window,
            )),
            base_url,
            client,
        })
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Makes an authenticated HTTP request to the Resi Studio API.
    ///
    /// This method consolidates the logic shared by all endpoints:
    /// - Waiting for, and then recording, a rate-limiter slot
    /// - Token freshness validation and re-authentication
    /// - Authorization header, query parameters and JSON body
    /// - Mapping non-2xx statuses onto [`ResiError`]
    ///
    /// Failed responses have their status, URL, `x-request-id` and body logged at
    /// debug level before the classified error is returned.
    #[instrument(skip(self, json_body), level = tracing::Level::TRACE)]
    pub(crate) async fn make_authenticated_request(
        &self,
        method: Method,
        path: &str,
        query_params: Option<&[(&str, &str)]>,
        json_body: Option<&(impl Serialize + std::fmt::Debug)>,
    ) -> Result<reqwest::Response, ResiError> {
        // The wait for a slot can outlast the token, so only check it once admitted.
        // A dropped admission is not counted.
        let admission = self.limiter.admit_request().await;
        let access_token = self.session.ensure_valid_session().await?;
        let url = self.url(path);

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header("Authorization", format!("Bearer {}", access_token));

        if let Some(params) = query_params {
            request = request.query(params);
        }

        if let Some(body) = json_body {
            request = request
                .header("Content-Type", "application/json")
                .json(body);
        }

        let sent = request.send().await;
        admission.record_request();
        let response = sent.map_err(ResiError::NetworkFailure)?;

        let status = response.status();
        if !status.is_success() {
            let request_id = response
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            tracing::debug!(
                %method,
                url,
                %status,
                request_id,
                body,
                "Resi Studio API request failed"
            );
            return Err(ResiError::from_status(status));
        }

        Ok(response)
    }

    async fn parse_json<T: DeserializeOwned>(
        response: reqwest::Response,
        what: &str,
    ) -> Result<T, ResiError> {
        let body = response.text().await.map_err(ResiError::NetworkFailure)?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::debug!(body, "unparseable Resi Studio response");
            ResiError::MalformedResponse(format!("{what}: {e}"))
        })
    }

    /// Lists the hardware encoders on the account.
    #[instrument(skip(self))]
    pub async fn list_encoders(&self) -> Result<Vec<Encoder>, ResiError> {
        let response = self
            .make_authenticated_request(
                Method::GET,
                "encoders",
                Some(&[("hardwareOnly", "true")][..]),
                None::<&()>,
            )
            .await?;
        let encoders: Vec<Encoder> = Self::parse_json(response, "encoder list").await?;
        tracing::debug!(returned_items = encoders.len(), "fetched encoders");
        Ok(encoders)
    }

    /// Lists the destination groups on the account.
    #[instrument(skip(self))]
    pub async fn list_destination_groups(&self) -> Result<Vec<DestinationGroup>, ResiError> {
        let response = self
            .make_authenticated_request(Method::GET, "destinationgroups", None, None::<&()>)
            .await?;
        let groups: Vec<DestinationGroup> =
            Self::parse_json(response, "destination group list").await?;
        tracing::debug!(returned_items = groups.len(), "fetched destination groups");
        Ok(groups)
    }

    /// Starts a live schedule for an encoder and destination group.
    ///
    /// # Returns
    ///
    /// The `Location` header of the response, which points at the new schedule, or
    /// `None` if the API did not send one.
    #[instrument(skip(self), ret)]
    pub async fn create_live_schedule(
        &self,
        request: &LiveScheduleRequest<'_>,
    ) -> Result<Option<String>, ResiError> {
        let response = self
            .make_authenticated_request(Method::POST, "schedules/live", None, Some(request))
            .await?;
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        tracing::debug!(status = %response.status(), location, "created live schedule");
        Ok(location)
    }

    /// Stops a running schedule.
    #[instrument(skip(self))]
    pub async fn stop_schedule(&self, schedule_id: &str) -> Result<(), ResiError> {
        let path = format!("schedules/{schedule_id}/stop");
        let response = self
            .make_authenticated_request(Method::POST, &path, None, None::<&()>)
            .await?;
        tracing::debug!(schedule_id, status = %response.status(), "stopped schedule");
        Ok(())
    }

    /// Fetches a schedule and the current status of each of its destinations.
    #[instrument(skip(self))]
    pub async fn get_schedule(&self, schedule_id: &str) -> Result<ScheduleResponse, ResiError> {
        let path = format!("schedules/{schedule_id}");
        let response = self
            .make_authenticated_request(Method::GET, &path, None, None::<&()>)
            .await?;
        let schedule: ScheduleResponse = Self::parse_json(response, "schedule").await?;
        tracing::trace!(
            schedule_id,
            destinations = schedule.destinations.len(),
            "fetched schedule"
        );
        Ok(schedule)
    }
}
