//! State shared by the operator commands and the background pollers.

use crate::background::fast_poll::FastPolls;
use crate::catalog::{Catalog, CatalogKind};
use crate::config::{ConfigStore, ModuleConfig, PollSettings};
use crate::encoder_errors::EncoderErrors;
use crate::error::ResiError;
use crate::host::{ConnectionStatus, ENCODER_ERROR_STATUS, Host};
use crate::resi_api::ResiClient;
use crate::schedule::ScheduleRegistry;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Everything one connection to Resi Studio owns.
///
/// A `Context` lives exactly as long as the [`crate::Connection`] that built it;
/// reconfiguring the connection throws the whole thing away and starts over.
pub struct Context {
    pub(crate) api: ResiClient,
    pub(crate) encoders: Catalog,
    pub(crate) destination_groups: Catalog,
    pub(crate) schedules: ScheduleRegistry,
    pub(crate) encoder_errors: EncoderErrors,
    pub(crate) fast_polls: FastPolls,
    pub(crate) poll: PollSettings,
    pub(crate) host: Arc<dyn Host>,
    store: Arc<dyn ConfigStore>,
    /// The persisted blob; schedule changes are written back into it.
    config: Mutex<ModuleConfig>,
    /// Cancelled on teardown, or once the API tells us our token is no good.
    pub(crate) shutdown: CancellationToken,
    /// Serializes Go Live and Stop Live.
    pub(crate) command_lock: Mutex<()>,
}

impl Context {
    pub(crate) fn new(
        api: ResiClient,
        config: ModuleConfig,
        poll: PollSettings,
        host: Arc<dyn Host>,
        store: Arc<dyn ConfigStore>,
    ) -> Self {
        Self {
            api,
            encoders: Catalog::new(CatalogKind::Encoders),
            destination_groups: Catalog::new(CatalogKind::DestinationGroups),
            schedules: ScheduleRegistry::from_persisted(config.schedules.clone()),
            encoder_errors: EncoderErrors::default(),
            fast_polls: FastPolls::default(),
            poll,
            host,
            store,
            config: Mutex::new(config),
            shutdown: CancellationToken::new(),
            command_lock: Mutex::new(()),
        }
    }

    pub fn api(&self) -> &ResiClient {
        &self.api
    }

    pub fn encoders(&self) -> &Catalog {
        &self.encoders
    }

    pub fn destination_groups(&self) -> &Catalog {
        &self.destination_groups
    }

    pub fn schedules(&self) -> &ScheduleRegistry {
        &self.schedules
    }

    pub fn encoder_errors(&self) -> &EncoderErrors {
        &self.encoder_errors
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Mirrors the schedule registry into the config store.
    ///
    /// A failed write is logged; the in-memory registry stays authoritative.
    pub(crate) async fn persist_schedules(&self) {
        let mut config = self.config.lock().await;
        config.schedules = self.schedules.snapshot().await;
        if let Err(e) = self.store.save(&config) {
            tracing::warn!(error = ?e, "failed to persist schedules");
        } else {
            tracing::trace!(schedules = config.schedules.len(), "persisted schedules");
        }
    }

    pub(crate) async fn record_encoder_error(&self, encoder_id: &str, message: &str) {
        self.encoder_errors.record(encoder_id, message).await;
        self.host.set_variable(ENCODER_ERROR_STATUS, message);
        self.host.check_feedbacks();
    }

    pub(crate) async fn clear_encoder_error(&self, encoder_id: &str) {
        if self.encoder_errors.clear(encoder_id).await {
            self.host.set_variable(ENCODER_ERROR_STATUS, "");
            self.host.check_feedbacks();
        }
    }

    /// Connection-wide consequences of a failed request.
    pub(crate) fn note_failure(&self, error: &ResiError) {
        match error {
            ResiError::Unauthorized => {
                if !self.shutdown.is_cancelled() {
                    tracing::error!("Resi Studio rejected our token, stopping background polling");
                    self.shutdown.cancel();
                }
                self.host.update_status(
                    ConnectionStatus::Failure,
                    Some("Unauthorized - please re-authenticate"),
                );
            }
            ResiError::AuthenticationFailed(reason) => {
                tracing::error!(reason, "re-authentication failed");
                self.host.update_status(
                    ConnectionStatus::Failure,
                    Some("Re-authentication failed - see log for details"),
                );
            }
            _ => {}
        }
    }

    /// Human-readable names for an encoder and destination group, for log lines.
    pub(crate) async fn labels(&self, encoder_id: &str, destination_group_id: &str) -> (String, String) {
        let encoder = self
            .encoders
            .label_of(encoder_id)
            .await
            .unwrap_or_else(|| "Unknown Encoder".to_string());
        let group = self
            .destination_groups
            .label_of(destination_group_id)
            .await
            .unwrap_or_else(|| "Unknown Destination Group".to_string());
        (encoder, group)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("api", &self.api)
            .field("poll", &self.poll)
            .field("shut_down", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}
