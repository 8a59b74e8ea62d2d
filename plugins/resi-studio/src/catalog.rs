//! Encoder and destination-group choice lists.
//!
//! The host offers these as dropdowns on the Go Live and Stop Live buttons, so a
//! catalog is never empty: when the API has nothing for us (or fails), the list
//! collapses to a single placeholder choice.

use crate::context::Context;
use crate::error::ResiError;
use crate::host::ConnectionStatus;
use tokio::sync::Mutex;

/// Id of the placeholder choice.
pub const PLACEHOLDER_ID: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Encoders,
    DestinationGroups,
}

impl CatalogKind {
    fn placeholder_label(self) -> &'static str {
        match self {
            Self::Encoders => "Default Encoder",
            Self::DestinationGroups => "Default Destination Group",
        }
    }

    fn display_name(self) -> &'static str {
        match self {
            Self::Encoders => "Encoders",
            Self::DestinationGroups => "Destination Groups",
        }
    }

    pub fn placeholder(self) -> Choice {
        Choice {
            id: PLACEHOLDER_ID.to_string(),
            label: self.placeholder_label().to_string(),
        }
    }
}

#[derive(Debug)]
pub struct Catalog {
    kind: CatalogKind,
    choices: Mutex<Vec<Choice>>,
}

impl Catalog {
    pub fn new(kind: CatalogKind) -> Self {
        Self {
            kind,
            choices: Mutex::new(vec![kind.placeholder()]),
        }
    }

    pub fn kind(&self) -> CatalogKind {
        self.kind
    }

    pub async fn snapshot(&self) -> Vec<Choice> {
        self.choices.lock().await.clone()
    }

    pub async fn label_of(&self, id: &str) -> Option<String> {
        self.choices
            .lock()
            .await
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.label.clone())
    }

    /// Swaps in a new list, or the placeholder if `choices` is empty.
    pub async fn replace(&self, choices: Vec<Choice>) {
        let choices = if choices.is_empty() {
            vec![self.kind.placeholder()]
        } else {
            choices
        };
        *self.choices.lock().await = choices;
    }

    async fn degrade(&self) {
        self.replace(Vec::new()).await;
    }
}

/// Reloads the encoder list.
///
/// Returns how many encoders the API reported.
pub async fn refresh_encoders(ctx: &Context) -> Result<usize, ResiError> {
    let listed = ctx.api.list_encoders().await.map(|encoders| {
        encoders
            .into_iter()
            .map(|e| Choice {
                id: e.id,
                label: e.name,
            })
            .collect::<Vec<_>>()
    });
    apply(ctx, &ctx.encoders, listed).await
}

/// Reloads the destination-group list.
///
/// This is the steady-state heartbeat of the connection: a non-empty answer marks
/// the connection healthy.
pub async fn refresh_destination_groups(ctx: &Context) -> Result<usize, ResiError> {
    let listed = ctx.api.list_destination_groups().await.map(|groups| {
        groups
            .into_iter()
            .map(|g| Choice {
                id: g.id,
                label: g.name,
            })
            .collect::<Vec<_>>()
    });
    apply(ctx, &ctx.destination_groups, listed).await
}

async fn apply(
    ctx: &Context,
    catalog: &Catalog,
    listed: Result<Vec<Choice>, ResiError>,
) -> Result<usize, ResiError> {
    let kind = catalog.kind();
    match listed {
        Ok(choices) if choices.is_empty() => {
            tracing::warn!(catalog = kind.display_name(), "none found in Resi Studio");
            catalog.degrade().await;
            let message = match kind {
                CatalogKind::Encoders => "No encoders found",
                CatalogKind::DestinationGroups => "No destination groups found",
            };
            ctx.host
                .update_status(ConnectionStatus::Warning, Some(message));
            Ok(0)
        }
        Ok(choices) => {
            let n = choices.len();
            tracing::info!(catalog = kind.display_name(), loaded = n, "catalog refreshed");
            catalog.replace(choices).await;
            if kind == CatalogKind::DestinationGroups {
                ctx.host.update_status(ConnectionStatus::Ok, None);
            }
            Ok(n)
        }
        Err(e) if e.is_session_error() => {
            ctx.note_failure(&e);
            Err(e)
        }
        Err(e) => {
            tracing::error!(catalog = kind.display_name(), error = %e, "failed to retrieve catalog");
            catalog.degrade().await;
            let message = format!("Failed to retrieve {} - see log for details", kind.display_name());
            ctx.host
                .update_status(ConnectionStatus::Failure, Some(&message));
            ctx.note_failure(&e);
            Err(e)
        }
    }
}
