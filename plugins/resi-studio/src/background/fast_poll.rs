use crate::background::{PollOutcome, poll_schedule};
use crate::context::Context;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Schedule ids that currently have a fast poll running.
#[derive(Debug, Default)]
pub struct FastPolls {
    active: Mutex<HashSet<String>>,
}

impl FastPolls {
    async fn claim(&self, schedule_id: &str) -> bool {
        self.active.lock().await.insert(schedule_id.to_string())
    }

    async fn release(&self, schedule_id: &str) {
        self.active.lock().await.remove(schedule_id);
    }

    pub async fn is_active(&self, schedule_id: &str) -> bool {
        self.active.lock().await.contains(schedule_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastPollOutcome {
    /// Every destination reached `STARTED`.
    Started { attempts: u32 },
    /// The schedule was stopped or dropped before it finished starting.
    Gone { attempts: u32 },
    /// Ran out of attempts; the slow loop takes it from here.
    TimedOut { attempts: u32 },
    /// The connection was torn down.
    Cancelled { attempts: u32 },
}

/// Starts checking a freshly created schedule every few seconds.
///
/// Returns `None` if a fast poll for this schedule is already running.
pub async fn start_fast_poll(
    ctx: &Arc<Context>,
    schedule_id: &str,
) -> Option<tokio::task::JoinHandle<FastPollOutcome>> {
    if !ctx.fast_polls.claim(schedule_id).await {
        tracing::debug!(schedule = %schedule_id, "fast polling already running");
        return None;
    }

    let ctx = Arc::clone(ctx);
    let schedule_id = schedule_id.to_string();
    let cancel = ctx.shutdown.child_token();
    Some(tokio::spawn(async move {
        let outcome = run(&ctx, &schedule_id, &cancel).await;
        ctx.fast_polls.release(&schedule_id).await;
        outcome
    }))
}

async fn run(ctx: &Context, schedule_id: &str, cancel: &CancellationToken) -> FastPollOutcome {
    let max_attempts = ctx.poll.fast_max_attempts;
    tracing::debug!(
        schedule = %schedule_id,
        interval = ?ctx.poll.fast_interval,
        max_attempts,
        "starting fast polling"
    );

    let mut attempts = 0;
    loop {
        // The schedule is never ready the moment it is created, so wait first.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(schedule = %schedule_id, attempts, "fast polling cancelled");
                return FastPollOutcome::Cancelled { attempts };
            }
            _ = tokio::time::sleep(ctx.poll.fast_interval) => {}
        }

        if !ctx.schedules.contains_id(schedule_id).await {
            tracing::debug!(schedule = %schedule_id, attempts, "schedule no longer tracked");
            return FastPollOutcome::Gone { attempts };
        }

        attempts += 1;
        let outcome = poll_schedule(ctx, schedule_id).await;
        if outcome == PollOutcome::AllStarted {
            tracing::info!(schedule = %schedule_id, attempts, "schedule fully started, stopping fast polling");
            return FastPollOutcome::Started { attempts };
        }
        if outcome.is_gone() {
            return FastPollOutcome::Gone { attempts };
        }
        if attempts >= max_attempts {
            tracing::warn!(schedule = %schedule_id, attempts, "fast polling timed out");
            return FastPollOutcome::TimedOut { attempts };
        }
    }
}
