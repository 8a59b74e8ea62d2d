use crate::background::poll_schedule;
use crate::catalog::refresh_destination_groups;
use crate::context::Context;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;

/// One pass of the slow loop: destination groups, then every tracked schedule in turn.
pub async fn poll_once(ctx: &Context) {
    // failures are reported to the host inside
    let _ = refresh_destination_groups(ctx).await;

    for schedule in ctx.schedules.snapshot().await {
        if ctx.shutdown.is_cancelled() {
            return;
        }
        poll_schedule(ctx, &schedule.schedule_id).await;
    }
    tracing::trace!("poll pass complete");
}

/// Spawn the slow polling background task.
///
/// The first pass runs immediately. The task exits at the next iteration boundary
/// once the context's shutdown token is cancelled, which happens on teardown or
/// when the API rejects our token.
pub fn spawn_slow_poll(ctx: Arc<Context>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(interval = ?ctx.poll.slow_interval, "starting polling for data");
        let mut interval = tokio::time::interval(ctx.poll.slow_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = ctx.shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }
            poll_once(&ctx).await;
        }

        tracing::info!("stopped polling for data");
    })
}
