//! Boolean button feedbacks.
//!
//! The host decides what "on" looks like (green for a fully started stream, red for
//! an encoder error); we only answer whether the condition holds right now.

use crate::context::Context;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    /// Every destination of the pair's schedule is `STARTED`.
    AllDestinationsStarted {
        encoder_id: String,
        destination_group_id: String,
    },
    /// The encoder's last command failed.
    EncoderError { encoder_id: String },
}

impl Feedback {
    pub async fn evaluate(&self, ctx: &Context) -> bool {
        match self {
            Self::AllDestinationsStarted {
                encoder_id,
                destination_group_id,
            } => all_destinations_started(ctx, encoder_id, destination_group_id).await,
            Self::EncoderError { encoder_id } => encoder_has_error(ctx, encoder_id).await,
        }
    }
}

/// A schedule with no destinations yet does not count as started.
pub async fn all_destinations_started(
    ctx: &Context,
    encoder_id: &str,
    destination_group_id: &str,
) -> bool {
    ctx.schedules
        .find(encoder_id, destination_group_id)
        .await
        .is_some_and(|s| s.all_started())
}

pub async fn encoder_has_error(ctx: &Context, encoder_id: &str) -> bool {
    ctx.encoder_errors.get(encoder_id).await.is_some()
}
