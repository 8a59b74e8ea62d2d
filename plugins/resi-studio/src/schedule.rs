//! Tracking of the live schedules this module has started.
//!
//! A [`Schedule`] binds one encoder to one destination group, and there is never
//! more than one per pair. The [`ScheduleRegistry`] is shared by the operator
//! commands and both pollers, so every find-then-mutate sequence happens under a
//! single lock acquisition.

use crate::resi_api::{DestinationStatus, DestinationType, ScheduleDestination};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub encoder_id: String,
    pub schedule_id: String,
    /// The `Location` the schedule was created at.
    #[serde(rename = "scheduleIdLocation")]
    pub schedule_location: String,
    pub destination_group_id: String,
    /// `None` until the first successful fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destinations: Option<Vec<Destination>>,
}

impl Schedule {
    pub fn new(
        encoder_id: impl Into<String>,
        destination_group_id: impl Into<String>,
        schedule_id: impl Into<String>,
        schedule_location: impl Into<String>,
    ) -> Self {
        Self {
            encoder_id: encoder_id.into(),
            schedule_id: schedule_id.into(),
            schedule_location: schedule_location.into(),
            destination_group_id: destination_group_id.into(),
            destinations: None,
        }
    }

    pub fn matches(&self, encoder_id: &str, destination_group_id: &str) -> bool {
        self.encoder_id == encoder_id && self.destination_group_id == destination_group_id
    }

    fn all_in(&self, status: DestinationStatus) -> bool {
        match &self.destinations {
            Some(destinations) if !destinations.is_empty() => {
                destinations.iter().all(|d| d.status == status)
            }
            _ => false,
        }
    }

    /// True once there is at least one destination and every one of them is live.
    pub fn all_started(&self) -> bool {
        self.all_in(DestinationStatus::Started)
    }

    pub fn all_stopped(&self) -> bool {
        self.all_in(DestinationStatus::Stopped)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DestinationType,
    pub status: DestinationStatus,
}

impl From<ScheduleDestination> for Destination {
    fn from(d: ScheduleDestination) -> Self {
        Self {
            id: d.id,
            name: d.name.unwrap_or_else(|| "Unknown Name".to_string()),
            kind: d.kind,
            status: d.status,
        }
    }
}

/// What happened when a fetched destination list was applied to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationUpdate {
    /// The destinations were applied; `changed` is false if they matched what was stored.
    Updated { all_started: bool, changed: bool },
    /// Every destination had stopped, so the schedule was dropped.
    AllStopped,
    /// No schedule with that id is tracked (any more).
    Missing,
}

#[derive(Debug, Default)]
pub struct ScheduleRegistry {
    schedules: Mutex<Vec<Schedule>>,
}

impl ScheduleRegistry {
    /// Loads schedules as they were persisted, without checking them against the API.
    ///
    /// Should the stored list hold more than one schedule for a pair, only the first
    /// is kept.
    pub fn from_persisted(schedules: Vec<Schedule>) -> Self {
        let mut unique: Vec<Schedule> = Vec::with_capacity(schedules.len());
        for schedule in schedules {
            if unique
                .iter()
                .any(|s| s.matches(&schedule.encoder_id, &schedule.destination_group_id))
            {
                tracing::warn!(
                    encoder = %schedule.encoder_id,
                    destination_group = %schedule.destination_group_id,
                    schedule = %schedule.schedule_id,
                    "dropping duplicate persisted schedule"
                );
                continue;
            }
            unique.push(schedule);
        }
        Self {
            schedules: Mutex::new(unique),
        }
    }

    pub async fn snapshot(&self) -> Vec<Schedule> {
        self.schedules.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.schedules.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.schedules.lock().await.is_empty()
    }

    /// The schedule tracked for an encoder and destination group, if any.
    pub async fn find(&self, encoder_id: &str, destination_group_id: &str) -> Option<Schedule> {
        self.schedules
            .lock()
            .await
            .iter()
            .find(|s| s.matches(encoder_id, destination_group_id))
            .cloned()
    }

    pub async fn get(&self, schedule_id: &str) -> Option<Schedule> {
        self.schedules
            .lock()
            .await
            .iter()
            .find(|s| s.schedule_id == schedule_id)
            .cloned()
    }

    pub async fn contains_id(&self, schedule_id: &str) -> bool {
        self.schedules
            .lock()
            .await
            .iter()
            .any(|s| s.schedule_id == schedule_id)
    }

    /// Adds a schedule unless its pair is already tracked.
    ///
    /// Returns `false`, leaving the registry untouched, if it was.
    pub async fn insert(&self, schedule: Schedule) -> bool {
        let mut schedules = self.schedules.lock().await;
        if schedules
            .iter()
            .any(|s| s.matches(&schedule.encoder_id, &schedule.destination_group_id))
        {
            return false;
        }
        schedules.push(schedule);
        true
    }

    /// Removes the schedule tracked for exactly this pair.
    pub async fn remove_pair(
        &self,
        encoder_id: &str,
        destination_group_id: &str,
    ) -> Option<Schedule> {
        let mut schedules = self.schedules.lock().await;
        let at = schedules
            .iter()
            .position(|s| s.matches(encoder_id, destination_group_id))?;
        Some(schedules.remove(at))
    }

    pub async fn remove_id(&self, schedule_id: &str) -> Option<Schedule> {
        let mut schedules = self.schedules.lock().await;
        let at = schedules.iter().position(|s| s.schedule_id == schedule_id)?;
        Some(schedules.remove(at))
    }

    /// Applies a freshly fetched destination list to a tracked schedule.
    ///
    /// A non-empty list in which every destination is `STOPPED` removes the
    /// schedule; anything else replaces its destinations wholesale.
    pub async fn replace_destinations(
        &self,
        schedule_id: &str,
        destinations: Vec<Destination>,
    ) -> DestinationUpdate {
        let mut schedules = self.schedules.lock().await;
        let Some(at) = schedules.iter().position(|s| s.schedule_id == schedule_id) else {
            return DestinationUpdate::Missing;
        };

        let schedule = &mut schedules[at];
        let changed = schedule.destinations.as_ref() != Some(&destinations);
        schedule.destinations = Some(destinations);
        if schedule.all_stopped() {
            schedules.remove(at);
            return DestinationUpdate::AllStopped;
        }
        DestinationUpdate::Updated {
            all_started: schedule.all_started(),
            changed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn destination(id: &str, status: DestinationStatus) -> Destination {
        Destination {
            id: id.into(),
            name: format!("dest {id}"),
            kind: DestinationType::Rtmp,
            status,
        }
    }

    fn schedule(encoder: &str, group: &str, id: &str) -> Schedule {
        Schedule::new(encoder, group, id, format!("https://api/v1/schedules/{id}"))
    }

    #[test]
    fn started_needs_destinations() {
        let mut s = schedule("enc1", "grp1", "s1");
        assert!(!s.all_started());
        s.destinations = Some(vec![]);
        assert!(!s.all_started());
        assert!(!s.all_stopped());
        s.destinations = Some(vec![
            destination("d1", DestinationStatus::Started),
            destination("d2", DestinationStatus::Starting),
        ]);
        assert!(!s.all_started());
        s.destinations = Some(vec![
            destination("d1", DestinationStatus::Started),
            destination("d2", DestinationStatus::Started),
        ]);
        assert!(s.all_started());
    }

    #[test]
    fn unnamed_destination() {
        let d: Destination = ScheduleDestination {
            id: "d1".into(),
            name: None,
            kind: DestinationType::Embed,
            status: DestinationStatus::Idle,
        }
        .into();
        assert_eq!(d.name, "Unknown Name");
    }

    #[test]
    fn serializes_without_destinations() {
        assert_eq!(
            serde_json::to_value(schedule("enc1", "grp1", "abc123")).unwrap(),
            serde_json::json!({
                "encoderId": "enc1",
                "scheduleId": "abc123",
                "scheduleIdLocation": "https://api/v1/schedules/abc123",
                "destinationGroupId": "grp1",
            })
        );
    }

    #[tokio::test]
    async fn one_schedule_per_pair() {
        let registry = ScheduleRegistry::default();
        assert!(registry.insert(schedule("enc1", "grp1", "s1")).await);
        assert!(!registry.insert(schedule("enc1", "grp1", "s2")).await);
        assert!(registry.insert(schedule("enc1", "grp2", "s3")).await);
        assert_eq!(registry.len().await, 2);
        assert_eq!(
            registry.find("enc1", "grp1").await.map(|s| s.schedule_id),
            Some("s1".to_string())
        );
    }

    #[tokio::test]
    async fn remove_pair_is_exact() {
        let registry = ScheduleRegistry::from_persisted(vec![
            schedule("enc1", "grp1", "s1"),
            schedule("enc1", "grp2", "s2"),
            schedule("enc2", "grp1", "s3"),
        ]);
        let removed = registry.remove_pair("enc1", "grp1").await;
        assert_eq!(removed.map(|s| s.schedule_id), Some("s1".to_string()));

        let left: Vec<_> = registry
            .snapshot()
            .await
            .into_iter()
            .map(|s| s.schedule_id)
            .collect();
        assert_eq!(left, vec!["s2", "s3"]);
        assert!(registry.remove_pair("enc1", "grp1").await.is_none());
    }

    #[tokio::test]
    async fn persisted_duplicates_collapse() {
        let registry = ScheduleRegistry::from_persisted(vec![
            schedule("enc1", "grp1", "s1"),
            schedule("enc1", "grp1", "s2"),
        ]);
        assert_eq!(registry.len().await, 1);
        assert!(registry.contains_id("s1").await);
        assert!(!registry.contains_id("s2").await);
    }

    #[tokio::test]
    async fn destination_updates() {
        let registry = ScheduleRegistry::from_persisted(vec![schedule("enc1", "grp1", "s1")]);

        assert_eq!(
            registry
                .replace_destinations("s1", vec![destination("d1", DestinationStatus::Starting)])
                .await,
            DestinationUpdate::Updated {
                all_started: false,
                changed: true
            }
        );
        assert_eq!(
            registry
                .replace_destinations("s1", vec![destination("d1", DestinationStatus::Started)])
                .await,
            DestinationUpdate::Updated {
                all_started: true,
                changed: true
            }
        );
        assert_eq!(
            registry
                .replace_destinations("s1", vec![destination("d1", DestinationStatus::Started)])
                .await,
            DestinationUpdate::Updated {
                all_started: true,
                changed: false
            }
        );
        assert_eq!(
            registry.get("s1").await.and_then(|s| s.destinations),
            Some(vec![destination("d1", DestinationStatus::Started)])
        );
        assert_eq!(
            registry
                .replace_destinations(
                    "s1",
                    vec![
                        destination("d1", DestinationStatus::Stopped),
                        destination("d2", DestinationStatus::Stopped),
                    ]
                )
                .await,
            DestinationUpdate::AllStopped
        );
        assert!(registry.is_empty().await);
        assert_eq!(
            registry.replace_destinations("s1", vec![]).await,
            DestinationUpdate::Missing
        );
    }
}
