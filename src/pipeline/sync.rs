// src/pipeline/sync.rs

//! Ingestion orchestrator.
//!
//! Drives one sync cycle end to end:
//! fetch -> store bulletin -> process regions -> compute statuses ->
//! detect changes -> queue notifications.
//!
//! A fetch failure aborts the cycle; everything after the bulletin is
//! stored follows a partial-success policy where per-item failures are
//! logged, collected, and never abort the rest of the cycle.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::danger;
use crate::dispatch::{DispatchJob, DispatchQueue, Dispatcher, Notification, message};
use crate::error::Result;
use crate::geo;
use crate::models::{
    Bulletin, ChangeEvent, DangerScore, Geometry, LocationStatus, MonitoredLocation,
    NotificationKind, Subscriber, SyncConfig, WarningRegion,
};
use crate::pipeline::changes::compare_recent;
use crate::provider::{BulletinSource, FeedDocument};
use crate::rules;
use crate::storage::Store;
use crate::utils::time::validity_window;

/// Structured result of one sync cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub success: bool,
    pub bulletin_id: Option<String>,
    pub regions_processed: usize,
    pub locations_updated: usize,
    pub changes_detected: usize,
    pub notifications_queued: usize,
    pub errors: Vec<String>,
}

impl SyncReport {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            errors: vec![error.into()],
            ..Self::default()
        }
    }
}

/// Structured result of one historical back-fill run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HistoricalReport {
    pub success: bool,
    pub bulletin_id: Option<String>,
    pub regions_processed: usize,
    pub locations_updated: usize,
    pub errors: Vec<String>,
}

impl HistoricalReport {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            errors: vec![error.into()],
            ..Self::default()
        }
    }
}

/// Pipeline controller for sync cycles and reminder dispatch.
pub struct SyncRunner {
    store: Arc<dyn Store>,
    source: Arc<dyn BulletinSource>,
    dispatcher: Arc<Dispatcher>,
    queue: DispatchQueue,
    config: SyncConfig,

    /// Single-flight guard: held for the whole cycle, so an overlapping
    /// invocation is skipped instead of queued.
    running: Mutex<()>,
}

impl SyncRunner {
    pub fn new(
        store: Arc<dyn Store>,
        source: Arc<dyn BulletinSource>,
        dispatcher: Arc<Dispatcher>,
        queue: DispatchQueue,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            source,
            dispatcher,
            queue,
            config,
            running: Mutex::new(()),
        }
    }

    /// Run one full sync cycle for a language.
    ///
    /// Expected failure modes (no bulletin published, overlapping cycle,
    /// store rejection of the bulletin) come back as a report with
    /// `success = false`; only programming errors propagate as `Err`.
    pub async fn run_sync(&self, language: &str) -> Result<SyncReport> {
        let Ok(_guard) = self.running.try_lock() else {
            log::warn!("Sync cycle skipped: previous cycle still running");
            return Ok(SyncReport::failure("sync skipped: previous cycle still running"));
        };

        log::info!("Sync cycle starting: lang={language}");

        // Fetching
        let document = match self.source.fetch(language).await {
            Ok(Some(document)) => document,
            Ok(None) => {
                log::warn!("Sync cycle aborted: no bulletin available for lang={language}");
                return Ok(SyncReport::failure("no bulletin available"));
            }
            Err(e) => {
                log::error!("Sync cycle aborted: bulletin fetch failed: {e}");
                return Ok(SyncReport::failure(format!("bulletin fetch failed: {e}")));
            }
        };

        let now = Utc::now();
        let bulletin = build_bulletin(&document, language, now);

        // Storing Bulletin
        if let Err(e) = self.store.upsert_bulletin(&bulletin).await {
            log::error!("Sync cycle aborted: bulletin store failed: {e}");
            return Ok(SyncReport::failure(format!("bulletin store failed: {e}")));
        }

        let mut report = SyncReport {
            bulletin_id: Some(bulletin.external_id.clone()),
            ..SyncReport::default()
        };

        // Processing Regions
        let regions = self
            .process_regions(&document, &bulletin.external_id, &mut report.errors)
            .await;
        report.regions_processed = regions.len();

        // Computing Statuses
        let updated = self
            .compute_statuses(&document, &regions, &bulletin.external_id, now, &mut report.errors)
            .await;
        report.locations_updated = updated.len();

        // Detecting Changes
        let events = self.detect_changes(&updated, &mut report.errors).await;
        report.changes_detected = events.len();

        // Queuing Notifications
        report.notifications_queued = self.queue_notifications(&events, &mut report.errors).await;

        report.success = true;
        log::info!(
            "Sync cycle done: bulletin={} regions={} locations={} changes={} queued={} errors={}",
            bulletin.external_id,
            report.regions_processed,
            report.locations_updated,
            report.changes_detected,
            report.notifications_queued,
            report.errors.len()
        );
        Ok(report)
    }

    /// Back-fill one historical bulletin.
    ///
    /// Runs the storage steps only: no change detection and no
    /// notifications. Status snapshots are stamped with the bulletin's
    /// `valid_from` so a back-filled batch stays ordered by content time
    /// rather than ingestion time.
    pub async fn run_historical_sync(
        &self,
        at: DateTime<Utc>,
        language: &str,
    ) -> Result<HistoricalReport> {
        let Ok(_guard) = self.running.try_lock() else {
            log::warn!("Historical sync skipped: a sync cycle is running");
            return Ok(HistoricalReport::failure(
                "historical sync skipped: a sync cycle is running",
            ));
        };

        log::info!("Historical sync starting: at={at} lang={language}");

        let document = match self.source.fetch_for_date(at, language).await {
            Ok(Some(document)) => document,
            Ok(None) => {
                log::warn!("Historical sync aborted: no bulletin for {at}");
                return Ok(HistoricalReport::failure("no bulletin available"));
            }
            Err(e) => {
                log::error!("Historical sync aborted: bulletin fetch failed: {e}");
                return Ok(HistoricalReport::failure(format!(
                    "bulletin fetch failed: {e}"
                )));
            }
        };

        let bulletin = build_bulletin(&document, language, at);
        if let Err(e) = self.store.upsert_bulletin(&bulletin).await {
            log::error!("Historical sync aborted: bulletin store failed: {e}");
            return Ok(HistoricalReport::failure(format!(
                "bulletin store failed: {e}"
            )));
        }

        let mut report = HistoricalReport {
            bulletin_id: Some(bulletin.external_id.clone()),
            ..HistoricalReport::default()
        };

        let regions = self
            .process_regions(&document, &bulletin.external_id, &mut report.errors)
            .await;
        report.regions_processed = regions.len();

        let updated = self
            .compute_statuses(
                &document,
                &regions,
                &bulletin.external_id,
                bulletin.valid_from,
                &mut report.errors,
            )
            .await;
        report.locations_updated = updated.len();

        report.success = true;
        Ok(report)
    }

    /// Evaluate rules against externally supplied change events and queue
    /// one notification per matched rule. Returns the queued count.
    ///
    /// The sync cycle uses the same path internally; this entry point
    /// exists for callers that detect changes on their own.
    pub async fn evaluate_changes_and_notify(&self, events: &[ChangeEvent]) -> Result<usize> {
        let mut errors = Vec::new();
        let queued = self.queue_notifications(events, &mut errors).await;
        for error in &errors {
            log::warn!("Notification queuing: {error}");
        }
        Ok(queued)
    }

    /// Dispatch reminders due at `now`. Returns the dispatch count.
    pub async fn dispatch_due_reminders(&self, now: DateTime<Utc>) -> Result<usize> {
        let rules_list = self.store.load_rules().await?;
        let subscribers = self.store.load_subscribers().await?;
        let locations = self.store.load_locations().await?;

        let due = rules::due_reminders(&rules_list, &subscribers, now);
        if due.is_empty() {
            return Ok(0);
        }

        let subscriber_index: HashMap<&str, &Subscriber> =
            subscribers.iter().map(|s| (s.id.as_str(), s)).collect();
        let location_index: HashMap<&str, &MonitoredLocation> =
            locations.iter().map(|l| (l.id.as_str(), l)).collect();

        let mut dispatched = 0usize;
        for rule in due {
            let Some(subscriber) = subscriber_index.get(rule.subscriber_id.as_str()) else {
                continue;
            };

            let Some(notification) = self
                .build_reminder(rule.location_id.as_deref(), subscriber, &location_index, &locations)
                .await?
            else {
                log::warn!(
                    "Reminder for rule {} skipped: no status to summarize",
                    rule.id
                );
                continue;
            };

            self.dispatcher
                .dispatch_reminder(subscriber, &notification)
                .await?;
            dispatched += 1;
        }

        log::info!("Reminder dispatch done: {dispatched} sent at {now}");
        Ok(dispatched)
    }

    /// Upsert a warning region per named region of every feature.
    ///
    /// Returns the upserted regions, all linked to the current bulletin.
    async fn process_regions(
        &self,
        document: &FeedDocument,
        bulletin_id: &str,
        errors: &mut Vec<String>,
    ) -> Vec<WarningRegion> {
        let mut regions = Vec::new();

        for feature in &document.features {
            if feature.regions.is_empty() {
                continue;
            }
            let context = feature.regions[0].id.as_str();

            let Some(raw_geometry) = &feature.geometry else {
                log::warn!("Feature for region {context} has no geometry, skipping");
                errors.push(format!("region {context}: missing geometry"));
                continue;
            };

            let geometry = match Geometry::from_geojson(
                context,
                &raw_geometry.kind,
                &raw_geometry.coordinates,
            ) {
                Ok(geometry) => geometry,
                Err(e) => {
                    log::warn!("Feature for region {context} has broken geometry: {e}");
                    errors.push(e.to_string());
                    continue;
                }
            };

            for region_ref in &feature.regions {
                let region = WarningRegion {
                    region_id: region_ref.id.clone(),
                    name: region_ref.name.clone(),
                    geometry: geometry.clone(),
                    bulletin_id: bulletin_id.to_string(),
                };
                match self.store.upsert_region(&region).await {
                    Ok(()) => regions.push(region),
                    Err(e) => {
                        log::warn!("Region {} upsert failed: {e}", region_ref.id);
                        errors.push(format!("region {}: {e}", region_ref.id));
                    }
                }
            }
        }

        regions
    }

    /// Compute and persist one status snapshot per monitored location.
    ///
    /// Returns the ids of locations that received a snapshot. Locations
    /// are processed concurrently, bounded by `sync.max_concurrent`;
    /// one location's failure never blocks another's.
    async fn compute_statuses(
        &self,
        document: &FeedDocument,
        regions: &[WarningRegion],
        bulletin_id: &str,
        created_at: DateTime<Utc>,
        errors: &mut Vec<String>,
    ) -> Vec<String> {
        let locations = match self.store.load_locations().await {
            Ok(locations) => locations,
            Err(e) => {
                log::error!("Loading monitored locations failed: {e}");
                errors.push(format!("locations: {e}"));
                return Vec::new();
            }
        };

        if regions.is_empty() {
            log::warn!("Bulletin {bulletin_id} resolved zero regions; no statuses computed");
            return Vec::new();
        }
        if locations.is_empty() {
            log::warn!("No monitored locations configured");
            return Vec::new();
        }

        let concurrency = self.config.max_concurrent.max(1);
        let results: Vec<(String, Result<()>)> = stream::iter(locations.iter())
            .map(|location| async move {
                let result = self
                    .compute_one_status(location, document, regions, bulletin_id, created_at)
                    .await;
                (location.id.clone(), result)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut updated = Vec::new();
        for (location_id, result) in results {
            match result {
                Ok(()) => updated.push(location_id),
                Err(e) => {
                    log::warn!("Status computation failed for location {location_id}: {e}");
                    errors.push(format!("location {location_id}: {e}"));
                }
            }
        }

        updated
    }

    async fn compute_one_status(
        &self,
        location: &MonitoredLocation,
        document: &FeedDocument,
        regions: &[WarningRegion],
        bulletin_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let region = geo::find_containing(location.lat, location.lng, regions)
            .or_else(|| geo::find_nearest(location.lat, location.lng, regions));

        let feature = region.and_then(|region| {
            document
                .features
                .iter()
                .find(|feature| feature.covers(&region.region_id))
        });

        // A resolved region without a matching feature still yields a
        // snapshot, at the default level.
        let (danger, problems) = match feature {
            Some(feature) => {
                let rating = danger::extract(feature);
                let score =
                    danger::project(&rating.bands, location.elevation_min, location.elevation_max);
                (score, rating.problems)
            }
            None => {
                log::warn!(
                    "No bulletin feature for location {} (region {:?})",
                    location.id,
                    region.map(|r| r.region_id.as_str())
                );
                (DangerScore::default(), Vec::new())
            }
        };

        let status = LocationStatus {
            location_id: location.id.clone(),
            bulletin_id: bulletin_id.to_string(),
            region_id: region.map(|r| r.region_id.clone()),
            danger,
            problems,
            created_at,
        };
        self.store.append_status(&status).await
    }

    /// Compare the two most recent snapshots of every updated location.
    async fn detect_changes(
        &self,
        updated_locations: &[String],
        errors: &mut Vec<String>,
    ) -> Vec<ChangeEvent> {
        let mut events = Vec::new();

        for location_id in updated_locations {
            match self.store.recent_statuses(location_id, 2).await {
                Ok(statuses) => {
                    if let Some(event) = compare_recent(&statuses) {
                        log::info!(
                            "Change detected for {}: {} -> {}",
                            location_id,
                            event.old_level,
                            event.new_level
                        );
                        events.push(event);
                    }
                }
                Err(e) => {
                    log::warn!("Change detection failed for location {location_id}: {e}");
                    errors.push(format!("location {location_id}: {e}"));
                }
            }
        }

        events
    }

    /// Evaluate rules against the change events and enqueue one dispatch
    /// job per matched rule.
    async fn queue_notifications(
        &self,
        events: &[ChangeEvent],
        errors: &mut Vec<String>,
    ) -> usize {
        if events.is_empty() {
            return 0;
        }

        let (rules_list, subscribers, locations) = match (
            self.store.load_rules().await,
            self.store.load_subscribers().await,
            self.store.load_locations().await,
        ) {
            (Ok(r), Ok(s), Ok(l)) => (r, s, l),
            (r, s, l) => {
                for e in [r.err(), s.err(), l.err()].into_iter().flatten() {
                    log::error!("Loading notification inputs failed: {e}");
                    errors.push(format!("notifications: {e}"));
                }
                return 0;
            }
        };

        let matches = rules::evaluate_changes(&rules_list, &subscribers, events);

        let subscriber_index: HashMap<&str, &Subscriber> =
            subscribers.iter().map(|s| (s.id.as_str(), s)).collect();
        let location_names: HashMap<&str, &str> = locations
            .iter()
            .map(|l| (l.id.as_str(), l.name.as_str()))
            .collect();

        let mut queued = 0usize;
        for rule_match in matches {
            let Some(subscriber) = subscriber_index.get(rule_match.rule.subscriber_id.as_str())
            else {
                continue;
            };

            let location_name = location_names
                .get(rule_match.event.location_id.as_str())
                .copied()
                .unwrap_or(rule_match.event.location_id.as_str());
            let (title, body) = message::change_message(location_name, &rule_match.event);

            let job = DispatchJob {
                rule_id: rule_match.rule.id.clone(),
                subscriber: (*subscriber).clone(),
                notification: Notification {
                    subscriber_id: subscriber.id.clone(),
                    location_id: Some(rule_match.event.location_id.clone()),
                    kind: NotificationKind::Change,
                    title,
                    body,
                    data: serde_json::json!({
                        "type": "change",
                        "location_id": rule_match.event.location_id,
                        "old_level": rule_match.event.old_level,
                        "new_level": rule_match.event.new_level,
                    }),
                },
            };

            if self.queue.enqueue(job) {
                queued += 1;
            } else {
                log::error!("Dispatch queue is gone; dropping notification");
                errors.push("notifications: dispatch queue unavailable".to_string());
            }
        }

        queued
    }

    /// Build a reminder notification for one rule.
    ///
    /// Location-scoped rules summarize that location's latest snapshot;
    /// global rules get a digest over every monitored location.
    async fn build_reminder(
        &self,
        location_id: Option<&str>,
        subscriber: &Subscriber,
        location_index: &HashMap<&str, &MonitoredLocation>,
        locations: &[MonitoredLocation],
    ) -> Result<Option<Notification>> {
        let (title, body, location_id) = match location_id {
            Some(location_id) => {
                let statuses = self.store.recent_statuses(location_id, 1).await?;
                let Some(status) = statuses.first() else {
                    return Ok(None);
                };
                let name = location_index
                    .get(location_id)
                    .map(|l| l.name.as_str())
                    .unwrap_or(location_id);
                let (title, body) = message::reminder_message(name, status);
                (title, body, Some(location_id.to_string()))
            }
            None => {
                let mut entries = Vec::new();
                for location in locations {
                    let statuses = self.store.recent_statuses(&location.id, 1).await?;
                    if let Some(status) = statuses.first() {
                        entries.push((location.name.clone(), status.danger.max));
                    }
                }
                if entries.is_empty() {
                    return Ok(None);
                }
                let (title, body) = message::reminder_digest_message(&entries);
                (title, body, None)
            }
        };

        Ok(Some(Notification {
            subscriber_id: subscriber.id.clone(),
            location_id,
            kind: NotificationKind::Reminder,
            title,
            body,
            data: serde_json::json!({"type": "reminder"}),
        }))
    }
}

/// Build the bulletin entity for a fetched document.
///
/// The external id falls back to a digest of the payload when the
/// provider omits one, so the `(external_id, language)` upsert invariant
/// holds for id-less feeds too.
fn build_bulletin(document: &FeedDocument, language: &str, now: DateTime<Utc>) -> Bulletin {
    let external_id = document
        .bulletin_id
        .clone()
        .unwrap_or_else(|| synthesize_id(&document.raw));

    let (valid_from_raw, valid_until_raw) = document.validity_fields();
    let (valid_from, valid_until) = validity_window(valid_from_raw, valid_until_raw, now);

    Bulletin {
        external_id,
        language: language.to_string(),
        valid_from,
        valid_until,
        payload: document.raw.clone(),
        fetched_at: now,
    }
}

fn synthesize_id(payload: &serde_json::Value) -> String {
    let bytes = serde_json::to_vec(payload).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    format!("gen-{}", &hex::encode(digest)[..16])
}
