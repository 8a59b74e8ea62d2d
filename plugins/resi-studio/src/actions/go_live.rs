use crate::background::fast_poll::start_fast_poll;
use crate::context::Context;
use crate::error::ResiError;
use crate::host::ConnectionStatus;
use crate::resi_api::LiveScheduleRequest;
use crate::schedule::Schedule;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoLiveRequest {
    pub encoder_id: String,
    pub destination_group_id: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug)]
pub enum GoLiveOutcome {
    /// A schedule was created and is now tracked.
    Started { schedule_id: String },
    /// The API accepted the request but did not say where the schedule lives.
    StartedUntracked,
    /// The pair already has a schedule; nothing was sent.
    AlreadyLive { schedule_id: String },
    /// No usable session, so nothing was sent.
    NotConnected(ResiError),
    Failed(ResiError),
}

/// Extracts the schedule id from a `Location` header: its last path segment.
pub fn schedule_id_from_location(location: &str) -> Option<&str> {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
}

/// Starts streaming `request.encoder_id` to `request.destination_group_id`.
///
/// Pressing the button twice is harmless: while a schedule for the pair is
/// tracked, this returns [`GoLiveOutcome::AlreadyLive`] without calling the API.
pub async fn go_live(ctx: &Arc<Context>, request: &GoLiveRequest) -> GoLiveOutcome {
    let _command = ctx.command_lock.lock().await;

    if let Err(e) = ctx.api.session().ensure_valid_session().await {
        tracing::error!(error = %e, "cannot go live without a session");
        ctx.note_failure(&e);
        return GoLiveOutcome::NotConnected(e);
    }

    let encoder_id = request.encoder_id.as_str();
    let destination_group_id = request.destination_group_id.as_str();
    let (encoder, group) = ctx.labels(encoder_id, destination_group_id).await;

    if let Some(existing) = ctx.schedules.find(encoder_id, destination_group_id).await {
        tracing::info!(
            encoder,
            encoder_id,
            group,
            destination_group_id,
            schedule = %existing.schedule_id,
            "encoder is already live for destination group"
        );
        return GoLiveOutcome::AlreadyLive {
            schedule_id: existing.schedule_id,
        };
    }

    tracing::info!(
        encoder,
        encoder_id,
        group,
        destination_group_id,
        title = request.title,
        "starting encoder"
    );

    let created = ctx
        .api
        .create_live_schedule(&LiveScheduleRequest {
            encoder_id,
            destination_group_id,
            title: &request.title,
            description: &request.description,
        })
        .await;

    let location = match created {
        Ok(location) => location,
        Err(e) if e.is_session_error() => {
            ctx.note_failure(&e);
            return GoLiveOutcome::NotConnected(e);
        }
        Err(e) => {
            let message = e.to_string();
            tracing::error!(encoder_id, destination_group_id, error = %e, "failed to go live");
            ctx.record_encoder_error(encoder_id, &message).await;
            ctx.host
                .update_status(ConnectionStatus::Warning, Some(&message));
            ctx.note_failure(&e);
            return GoLiveOutcome::Failed(e);
        }
    };

    ctx.host.update_status(ConnectionStatus::Ok, None);
    ctx.clear_encoder_error(encoder_id).await;

    let Some(location) = location else {
        tracing::error!(
            encoder_id,
            destination_group_id,
            "schedule id is not available in the response headers"
        );
        return GoLiveOutcome::StartedUntracked;
    };
    let Some(schedule_id) = schedule_id_from_location(&location).map(str::to_owned) else {
        tracing::error!(location, "cannot find a schedule id in the location header");
        return GoLiveOutcome::StartedUntracked;
    };

    let schedule = Schedule::new(encoder_id, destination_group_id, &schedule_id, location);
    if !ctx.schedules.insert(schedule).await {
        tracing::warn!(
            schedule = %schedule_id,
            "pair was tracked while the schedule was being created"
        );
    }
    ctx.persist_schedules().await;
    ctx.host.check_feedbacks();

    // Detached; the task ends by itself.
    drop(start_fast_poll(ctx, &schedule_id).await);

    tracing::info!(
        encoder,
        encoder_id,
        group,
        destination_group_id,
        schedule = %schedule_id,
        "encoder started successfully"
    );
    GoLiveOutcome::Started { schedule_id }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ENCODER_ERROR_STATUS;
    use crate::test_support::{RecordedStatus, TestContext};
    use mockito::Matcher;
    use pretty_assertions::assert_eq;

    fn show() -> GoLiveRequest {
        GoLiveRequest {
            encoder_id: "enc1".into(),
            destination_group_id: "grp1".into(),
            title: "Show".into(),
            description: String::new(),
        }
    }

    async fn mock_created(t: &mut TestContext, expect: usize) -> mockito::Mock {
        t.server
            .mock("POST", "/schedules/live")
            .match_header("authorization", "Bearer test-token")
            .match_body(Matcher::Json(serde_json::json!({
                "encoderId": "enc1",
                "destinationGroupId": "grp1",
                "title": "Show",
                "description": "",
            })))
            .with_status(201)
            .with_header("location", "https://api/v1/schedules/abc123")
            .expect(expect)
            .create_async()
            .await
    }

    #[test]
    fn location_parsing() {
        assert_eq!(
            schedule_id_from_location("https://api/v1/schedules/abc123"),
            Some("abc123")
        );
        assert_eq!(
            schedule_id_from_location("https://api/v1/schedules/abc123/"),
            Some("abc123")
        );
        assert_eq!(schedule_id_from_location("abc123"), Some("abc123"));
        assert_eq!(schedule_id_from_location(""), None);
    }

    #[tokio::test]
    async fn creates_and_tracks_schedule() {
        let mut t = TestContext::new().await;
        let create = mock_created(&mut t, 1).await;

        let outcome = go_live(&t.ctx, &show()).await;
        assert!(
            matches!(&outcome, GoLiveOutcome::Started { schedule_id } if schedule_id == "abc123"),
            "{outcome:?}"
        );
        create.assert_async().await;

        let expected = vec![Schedule::new(
            "enc1",
            "grp1",
            "abc123",
            "https://api/v1/schedules/abc123",
        )];
        assert_eq!(t.ctx.schedules.snapshot().await, expected);
        assert_eq!(t.persisted().schedules, expected);
        assert!(t.ctx.fast_polls.is_active("abc123").await);
        assert_eq!(
            t.host.statuses(),
            vec![RecordedStatus(ConnectionStatus::Ok, None)]
        );
    }

    #[tokio::test]
    async fn second_press_sends_nothing() {
        let mut t = TestContext::new().await;
        let create = mock_created(&mut t, 1).await;

        go_live(&t.ctx, &show()).await;
        let again = go_live(&t.ctx, &show()).await;
        assert!(
            matches!(&again, GoLiveOutcome::AlreadyLive { schedule_id } if schedule_id == "abc123"),
            "{again:?}"
        );
        create.assert_async().await;
        assert_eq!(t.ctx.schedules.len().await, 1);
    }

    #[tokio::test]
    async fn conflict_is_recorded_then_cleared() {
        let mut t = TestContext::new().await;
        let conflict = t
            .server
            .mock("POST", "/schedules/live")
            .with_status(409)
            .expect(1)
            .create_async()
            .await;

        let outcome = go_live(&t.ctx, &show()).await;
        assert!(
            matches!(outcome, GoLiveOutcome::Failed(ResiError::Conflict)),
            "{outcome:?}"
        );
        conflict.assert_async().await;
        conflict.remove_async().await;

        let message = "Conflict: Encoder may already be live or there is an overlapping schedule.";
        assert_eq!(
            t.ctx.encoder_errors.get("enc1").await.as_deref(),
            Some(message)
        );
        assert_eq!(
            t.host.statuses(),
            vec![RecordedStatus(ConnectionStatus::Warning, Some(message.into()))]
        );
        assert!(t.ctx.schedules.is_empty().await);

        mock_created(&mut t, 1).await;
        go_live(&t.ctx, &show()).await;
        assert_eq!(t.ctx.encoder_errors.get("enc1").await, None);
        assert_eq!(
            t.host.variables(),
            vec![
                (ENCODER_ERROR_STATUS.to_string(), message.to_string()),
                (ENCODER_ERROR_STATUS.to_string(), String::new()),
            ]
        );
    }

    #[tokio::test]
    async fn missing_location_is_untracked() {
        let mut t = TestContext::new().await;
        t.server
            .mock("POST", "/schedules/live")
            .with_status(201)
            .create_async()
            .await;

        let outcome = go_live(&t.ctx, &show()).await;
        assert!(
            matches!(outcome, GoLiveOutcome::StartedUntracked),
            "{outcome:?}"
        );
        assert!(t.ctx.schedules.is_empty().await);
    }

    #[tokio::test]
    async fn rejected_token_stops_polling() {
        let mut t = TestContext::new().await;
        t.server
            .mock("POST", "/schedules/live")
            .with_status(401)
            .create_async()
            .await;

        let outcome = go_live(&t.ctx, &show()).await;
        assert!(
            matches!(outcome, GoLiveOutcome::Failed(ResiError::Unauthorized)),
            "{outcome:?}"
        );
        assert!(t.ctx.is_shut_down());
        assert_eq!(
            t.host.statuses().last(),
            Some(&RecordedStatus(
                ConnectionStatus::Failure,
                Some("Unauthorized - please re-authenticate".into())
            ))
        );
    }
}
