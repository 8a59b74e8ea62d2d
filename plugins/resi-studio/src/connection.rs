use crate::actions::{self, GoLiveOutcome, GoLiveRequest, StopLiveOutcome};
use crate::background::slow_poll::spawn_slow_poll;
use crate::catalog::{refresh_destination_groups, refresh_encoders};
use crate::config::{ConfigStore, ModuleConfig, Settings};
use crate::context::Context;
use crate::host::{ConnectionStatus, Host};
use crate::resi_api::ResiClient;
use eyre::Context as _;
use std::sync::Arc;

/// Title used when the operator leaves it blank.
pub const DEFAULT_TITLE: &str = "Live Stream";

/// One configured connection to Resi Studio.
///
/// Owns the shared [`Context`] and the slow polling task. Built by [`Connection::init`]
/// and torn down by [`Connection::destroy`]; dropping it without calling `destroy`
/// still stops every background task, it just does not wait for them.
pub struct Connection {
    ctx: Arc<Context>,
    slow_poll: Option<tokio::task::JoinHandle<()>>,
    settings: Settings,
    host: Arc<dyn Host>,
    store: Arc<dyn ConfigStore>,
}

impl Connection {
    /// Connects with `config` and, if that works, loads the catalogs and starts polling.
    ///
    /// Missing or rejected credentials are not an error here: they are reported to
    /// the host as the connection status and leave a connection that does not poll.
    pub async fn init(
        config: ModuleConfig,
        settings: Settings,
        host: Arc<dyn Host>,
        store: Arc<dyn ConfigStore>,
    ) -> eyre::Result<Self> {
        host.update_status(ConnectionStatus::Connecting, Some("Connecting to Resi Studio"));

        let api = ResiClient::new(&settings.api, config.credentials())
            .context("create Resi Studio client")?;
        let ctx = Arc::new(Context::new(
            api,
            config,
            settings.poll.clone(),
            Arc::clone(&host),
            Arc::clone(&store),
        ));
        let mut connection = Self {
            ctx,
            slow_poll: None,
            settings,
            host,
            store,
        };

        if !connection.ctx.api.session().has_credentials() {
            tracing::error!("Client ID and Client Secret are required to connect to Resi Studio");
            connection.host.update_status(
                ConnectionStatus::Warning,
                Some("Client ID and Client Secret are required"),
            );
            return Ok(connection);
        }

        if let Err(e) = connection.ctx.api.session().ensure_valid_session().await {
            tracing::error!(error = %e, "failed to connect to Resi Studio");
            connection.host.update_status(
                ConnectionStatus::Failure,
                Some("Failed to connect to Resi Studio - see log for details"),
            );
            return Ok(connection);
        }
        tracing::info!("successfully connected to Resi Studio");
        connection
            .host
            .update_status(ConnectionStatus::Ok, Some("Connected to Resi Studio"));

        // failures are reported to the host inside
        let _ = refresh_encoders(&connection.ctx).await;
        let _ = refresh_destination_groups(&connection.ctx).await;

        tracing::info!(
            schedules = connection.ctx.schedules.len().await,
            "loaded schedules from config"
        );

        if !connection.ctx.is_shut_down() {
            connection.slow_poll = Some(spawn_slow_poll(Arc::clone(&connection.ctx)));
        }
        Ok(connection)
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// True while the slow loop is running.
    pub fn is_polling(&self) -> bool {
        self.slow_poll.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// The Go Live button. A blank title becomes [`DEFAULT_TITLE`].
    pub async fn go_live(
        &self,
        encoder_id: &str,
        destination_group_id: &str,
        title: &str,
        description: &str,
    ) -> GoLiveOutcome {
        let title = if title.trim().is_empty() {
            DEFAULT_TITLE
        } else {
            title
        };
        let request = GoLiveRequest {
            encoder_id: encoder_id.to_string(),
            destination_group_id: destination_group_id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
        };
        actions::go_live(&self.ctx, &request).await
    }

    /// The Stop Live button.
    pub async fn stop_live(&self, encoder_id: &str, destination_group_id: &str) -> StopLiveOutcome {
        actions::stop_live(&self.ctx, encoder_id, destination_group_id).await
    }

    /// Applies a new configuration: the old connection is torn down and a fresh one
    /// is built from `config`. Log verbosity is left to the caller's subscriber; see
    /// [`ModuleConfig::log_level`].
    pub async fn config_updated(mut self, config: ModuleConfig) -> eyre::Result<Self> {
        tracing::info!("configuration updated, reconnecting");
        self.shutdown().await?;
        self.store
            .save(&config)
            .context("persist updated configuration")?;
        Self::init(
            config,
            self.settings.clone(),
            Arc::clone(&self.host),
            Arc::clone(&self.store),
        )
        .await
    }

    /// Stops all polling and waits for the slow loop to exit.
    pub async fn destroy(mut self) -> eyre::Result<()> {
        self.shutdown().await?;
        tracing::info!("connection destroyed");
        Ok(())
    }

    async fn shutdown(&mut self) -> eyre::Result<()> {
        self.ctx.shutdown.cancel();
        if let Some(handle) = self.slow_poll.take() {
            handle.await.context("wait for slow polling to stop")?;
        }
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.ctx.shutdown.cancel();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("ctx", &self.ctx)
            .field("polling", &self.is_polling())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
