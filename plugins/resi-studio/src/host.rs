//! The seam between the streaming core and the control-surface host.
//!
//! The host owns rendering: it turns a [`ConnectionStatus`] into a coloured
//! indicator, re-evaluates button feedbacks when asked to, and displays variable
//! values. Log lines do not go through this trait; they are emitted with `tracing`
//! and the host installs whichever subscriber forwards them to its log sink.

/// Name of the single variable this module publishes.
pub const ENCODER_ERROR_STATUS: &str = "encoderErrorStatus";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Ok,
    Warning,
    Failure,
}

pub trait Host: Send + Sync {
    fn update_status(&self, status: ConnectionStatus, message: Option<&str>);

    /// Ask the host to re-evaluate every feedback, since the state they read changed.
    fn check_feedbacks(&self);

    fn set_variable(&self, name: &str, value: &str);
}

/// A host that only logs what it is told. Used by the command-line front end.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHost;

impl Host for TracingHost {
    fn update_status(&self, status: ConnectionStatus, message: Option<&str>) {
        match status {
            ConnectionStatus::Failure => {
                tracing::error!(?status, message = message.unwrap_or(""), "connection status")
            }
            ConnectionStatus::Warning => {
                tracing::warn!(?status, message = message.unwrap_or(""), "connection status")
            }
            _ => tracing::info!(?status, message = message.unwrap_or(""), "connection status"),
        }
    }

    fn check_feedbacks(&self) {
        tracing::trace!("feedbacks need re-evaluation");
    }

    fn set_variable(&self, name: &str, value: &str) {
        tracing::info!(variable = name, value, "variable updated");
    }
}
