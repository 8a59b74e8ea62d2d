//! Request and response schemas for the Resi Studio REST API.
//!
//! Every payload is decoded into one of these structs at the edge; a response that
//! does not fit is reported as [`crate::ResiError::MalformedResponse`] rather than
//! being passed on half-populated.

use serde::{Deserialize, Serialize};

/// A hardware encoder, as listed by `GET /encoders?hardwareOnly=true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encoder {
    pub id: String,
    pub name: String,
}

/// A named set of output destinations, as listed by `GET /destinationgroups`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationGroup {
    pub id: String,
    pub name: String,
}

/// Body of `POST /schedules/live`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveScheduleRequest<'a> {
    pub encoder_id: &'a str,
    pub destination_group_id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
}

/// Response of `GET /schedules/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleResponse {
    pub id: String,
    #[serde(default)]
    pub destinations: Vec<ScheduleDestination>,
    #[serde(default)]
    pub actions: Option<ScheduleActions>,
}

/// Follow-up operations the API advertises for a schedule.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleActions {
    #[serde(default)]
    pub stop: Option<ScheduleAction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleAction {
    pub method: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleDestination {
    pub id: String,
    /// Destinations are occasionally returned without a name.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: DestinationType,
    pub status: DestinationStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DestinationType {
    Embed,
    Facebook,
    Rtmp,
    Youtube,
}

/// Lifecycle of a single destination within a schedule.
///
/// A destination normally moves `IDLE → SET_UP → STARTING → STARTED`, and later
/// `STOPPING → STOPPED`. `ABORTED` and `ERROR` are terminal failure states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DestinationStatus {
    Idle,
    SetUp,
    Starting,
    Started,
    Stopping,
    Stopped,
    Aborted,
    Error,
}
