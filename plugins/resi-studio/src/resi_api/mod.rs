//! Resi Studio REST API client library.
//!
//! # Core Concepts: Schedules vs Destinations
//!
//! ## Schedule - One Live Event
//! - **What it binds**: one encoder to one destination group
//! - **How it is created**: `POST /schedules/live`, which answers with a `Location`
//!   header whose last path segment is the new schedule's id
//! - **How it ends**: `POST /schedules/{id}/stop`, or on its own once every
//!   destination has stopped
//!
//! ## Destination - One Output Target
//! - **What it is**: a YouTube channel, a Facebook page, an RTMP endpoint, or the
//!   Resi embed player
//! - **Lifecycle**: each destination carries its own [`DestinationStatus`], so a
//!   schedule can be half started while one platform is still spinning up
//!
//! All calls go through [`ResiClient`], which attaches a fresh bearer token and
//! waits for the shared rate limiter before anything leaves the process.

pub mod client;
pub mod types;

pub use client::ResiClient;
pub use types::{
    DestinationGroup, DestinationStatus, DestinationType, Encoder, LiveScheduleRequest,
    ScheduleDestination, ScheduleResponse,
};
