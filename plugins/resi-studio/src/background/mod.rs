//! Background tasks that keep the schedule registry in step with Resi Studio.
//!
//! - [`slow_poll`]: one long-lived loop per connection that refreshes destination
//!   groups and re-fetches every tracked schedule.
//! - [`fast_poll`]: a short burst of checks right after Go Live, so the "all
//!   destinations started" feedback lights up within seconds instead of minutes.
//!
//! Both go through [`poll_schedule`], which owns what a schedule fetch means for
//! the registry.

pub mod fast_poll;
pub mod slow_poll;

use crate::context::Context;
use crate::error::ResiError;
use crate::host::ConnectionStatus;
use crate::schedule::{Destination, DestinationUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Destinations replaced; at least one is not `STARTED` yet.
    InProgress,
    /// Destinations replaced and every one of them is `STARTED`.
    AllStarted,
    /// The API no longer knows the schedule, so we dropped it.
    NotFound,
    /// Every destination stopped, so we dropped the schedule.
    AllStopped,
    /// The API answered without destinations; nothing was changed.
    NoDestinations,
    /// The schedule left the registry while we were fetching it.
    Untracked,
    Failed,
}

impl PollOutcome {
    /// True if the schedule is no longer tracked after this poll.
    pub fn is_gone(self) -> bool {
        matches!(self, Self::NotFound | Self::AllStopped | Self::Untracked)
    }
}

/// Fetches one schedule and applies the answer to the registry.
pub async fn poll_schedule(ctx: &Context, schedule_id: &str) -> PollOutcome {
    let response = match ctx.api.get_schedule(schedule_id).await {
        Ok(response) => response,
        Err(ResiError::NotFound) => {
            tracing::error!(
                schedule = %schedule_id,
                "schedule not found, does the encoder have an input?"
            );
            if ctx.schedules.remove_id(schedule_id).await.is_some() {
                ctx.persist_schedules().await;
                ctx.host.check_feedbacks();
            }
            return PollOutcome::NotFound;
        }
        Err(e) => {
            report_failure(ctx, schedule_id, &e);
            return PollOutcome::Failed;
        }
    };

    if response.destinations.is_empty() {
        tracing::warn!(schedule = %schedule_id, "no destinations found for schedule");
        return PollOutcome::NoDestinations;
    }

    let destinations: Vec<Destination> = response
        .destinations
        .into_iter()
        .map(Destination::from)
        .collect();
    let n = destinations.len();

    match ctx
        .schedules
        .replace_destinations(schedule_id, destinations)
        .await
    {
        DestinationUpdate::Missing => {
            tracing::debug!(schedule = %schedule_id, "schedule stopped tracking during fetch");
            PollOutcome::Untracked
        }
        DestinationUpdate::AllStopped => {
            tracing::info!(schedule = %schedule_id, "all destinations stopped, removed schedule");
            ctx.persist_schedules().await;
            ctx.host.check_feedbacks();
            PollOutcome::AllStopped
        }
        DestinationUpdate::Updated {
            all_started,
            changed,
        } => {
            tracing::debug!(
                schedule = %schedule_id,
                destinations = n,
                all_started,
                changed,
                "updated schedule"
            );
            if changed {
                ctx.persist_schedules().await;
                ctx.host.check_feedbacks();
            }
            if all_started {
                PollOutcome::AllStarted
            } else {
                PollOutcome::InProgress
            }
        }
    }
}

fn report_failure(ctx: &Context, schedule_id: &str, error: &ResiError) {
    match error {
        ResiError::NetworkFailure(_) | ResiError::MalformedResponse(_) => {
            tracing::error!(schedule = %schedule_id, error = %error, "failed to fetch schedule");
            ctx.host.update_status(
                ConnectionStatus::Failure,
                Some("Failed to fetch schedules - see log for details"),
            );
        }
        e if e.is_session_error() => {}
        _ => {
            tracing::error!(schedule = %schedule_id, error = %error, "failed to fetch schedule");
        }
    }
    ctx.note_failure(error);
}
