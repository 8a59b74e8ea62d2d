use crate::context::Context;
use crate::error::ResiError;
use crate::host::ConnectionStatus;

/// Recorded against the encoder when there is nothing to stop.
pub const NO_SCHEDULE_MESSAGE: &str = "Unable to Stop: No schedule found";

#[derive(Debug)]
pub enum StopLiveOutcome {
    Stopped { schedule_id: String },
    /// Nothing is tracked for the pair; no request was sent.
    NoSchedule,
    NotConnected(ResiError),
    /// The API refused; the schedule is kept since the stream may still be live.
    Failed(ResiError),
}

/// Stops the schedule tracked for exactly this encoder and destination group.
pub async fn stop_live(
    ctx: &Context,
    encoder_id: &str,
    destination_group_id: &str,
) -> StopLiveOutcome {
    let _command = ctx.command_lock.lock().await;
    let (encoder, group) = ctx.labels(encoder_id, destination_group_id).await;

    let Some(schedule) = ctx.schedules.find(encoder_id, destination_group_id).await else {
        tracing::error!(
            encoder,
            encoder_id,
            group,
            destination_group_id,
            "unable to stop: no schedule found"
        );
        ctx.record_encoder_error(encoder_id, NO_SCHEDULE_MESSAGE).await;
        return StopLiveOutcome::NoSchedule;
    };

    tracing::debug!(
        encoder_id,
        destination_group_id,
        schedule = %schedule.schedule_id,
        "stopping encoder"
    );

    match ctx.api.stop_schedule(&schedule.schedule_id).await {
        Ok(()) => {
            ctx.schedules
                .remove_pair(encoder_id, destination_group_id)
                .await;
            ctx.persist_schedules().await;
            ctx.host.check_feedbacks();
            tracing::info!(
                encoder,
                encoder_id,
                group,
                destination_group_id,
                schedule = %schedule.schedule_id,
                "encoder stopped successfully"
            );
            StopLiveOutcome::Stopped {
                schedule_id: schedule.schedule_id,
            }
        }
        Err(e) if e.is_session_error() => {
            ctx.note_failure(&e);
            StopLiveOutcome::NotConnected(e)
        }
        Err(e) => {
            let message = e.to_string();
            tracing::error!(encoder_id, destination_group_id, error = %e, "failed to stop encoder");
            ctx.record_encoder_error(encoder_id, &message).await;
            ctx.host
                .update_status(ConnectionStatus::Warning, Some(&message));
            ctx.note_failure(&e);
            StopLiveOutcome::Failed(e)
        }
    }
}
