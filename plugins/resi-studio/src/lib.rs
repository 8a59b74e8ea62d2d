//! Control-surface client for Resi Studio live streaming.
//!
//! A [`Connection`] authenticates against the Resi Studio API, keeps the encoder and
//! destination-group choice lists fresh, tracks the live schedules it starts, and
//! polls them until their destinations are up (and again until they are gone). The
//! hosting control surface plugs in through two traits: [`Host`] receives status,
//! feedback and variable updates, and [`ConfigStore`] persists the module config.

pub mod actions;
pub mod background;
pub mod catalog;
pub mod config;
pub mod connection;
pub mod context;
pub mod encoder_errors;
pub mod error;
pub mod feedbacks;
pub mod host;
pub mod rate_limit;
pub mod resi_api;
pub mod schedule;
pub mod session;

#[cfg(test)]
mod test_support;

pub use actions::{GoLiveOutcome, GoLiveRequest, StopLiveOutcome};
pub use config::{
    ApiSettings, ConfigStore, JsonFileConfigStore, MemoryConfigStore, ModuleConfig, PollSettings,
    Settings,
};
pub use connection::Connection;
pub use context::Context;
pub use error::ResiError;
pub use feedbacks::Feedback;
pub use host::{ConnectionStatus, Host, TracingHost};
pub use schedule::{Destination, Schedule};
