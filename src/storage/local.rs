// src/storage/local.rs

//! Local filesystem storage implementation.
//!
//! JSON files under one root directory, written atomically (temp file,
//! then rename). Reads of missing files yield empty collections so a
//! fresh store works without seeding every file.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Datelike;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{
    AlertRule, Bulletin, LocationStatus, MonitoredLocation, NotificationRecord, Subscriber,
    WarningRegion,
};
use crate::storage::{LatestPointer, Store};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root_dir: PathBuf,
}

impl LocalStore {
    /// Create a new LocalStore rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Replace path-hostile characters in provider-supplied identifiers.
    fn sanitize(id: &str) -> String {
        id.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    fn bulletin_key(language: &str, external_id: &str) -> String {
        format!(
            "bulletins/{}/{}.json",
            Self::sanitize(language),
            Self::sanitize(external_id)
        )
    }

    fn pointer_key(language: &str) -> String {
        format!("bulletins/{}/latest.json", Self::sanitize(language))
    }

    fn region_key(region_id: &str) -> String {
        format!("regions/{}.json", Self::sanitize(region_id))
    }

    fn status_key(location_id: &str) -> String {
        format!("statuses/{}.json", Self::sanitize(location_id))
    }

    /// Audit-log key for a given year/month.
    fn notification_key(year: i32, month: u32) -> String {
        format!("notifications/{}/{:02}.json", year, month)
    }
}

#[async_trait]
impl Store for LocalStore {
    async fn upsert_bulletin(&self, bulletin: &Bulletin) -> Result<()> {
        let key = Self::bulletin_key(&bulletin.language, &bulletin.external_id);
        self.write_json(&key, bulletin).await?;

        let pointer = LatestPointer {
            external_id: bulletin.external_id.clone(),
            updated_at: bulletin.fetched_at,
        };
        self.write_json(&Self::pointer_key(&bulletin.language), &pointer)
            .await?;

        log::info!(
            "Bulletin upserted: id={} lang={}",
            bulletin.external_id,
            bulletin.language
        );
        Ok(())
    }

    async fn latest_bulletin(&self, language: &str) -> Result<Option<Bulletin>> {
        let Some(pointer) = self
            .read_json::<LatestPointer>(&Self::pointer_key(language))
            .await?
        else {
            return Ok(None);
        };
        self.read_json(&Self::bulletin_key(language, &pointer.external_id))
            .await
    }

    async fn upsert_region(&self, region: &WarningRegion) -> Result<()> {
        self.write_json(&Self::region_key(&region.region_id), region)
            .await
    }

    async fn load_regions(&self) -> Result<Vec<WarningRegion>> {
        let dir = self.path("regions");
        let mut regions = Vec::new();

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(regions),
            Err(e) => return Err(AppError::Io(e)),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<WarningRegion>(&bytes) {
                Ok(region) => regions.push(region),
                Err(e) => log::warn!("Skipping unreadable region file {:?}: {}", path, e),
            }
        }

        // Directory iteration order is platform-dependent.
        regions.sort_by(|a, b| a.region_id.cmp(&b.region_id));
        Ok(regions)
    }

    async fn load_locations(&self) -> Result<Vec<MonitoredLocation>> {
        Ok(self.read_json("locations.json").await?.unwrap_or_default())
    }

    async fn append_status(&self, status: &LocationStatus) -> Result<()> {
        let key = Self::status_key(&status.location_id);
        let mut statuses: Vec<LocationStatus> = self.read_json(&key).await?.unwrap_or_default();
        statuses.push(status.clone());
        self.write_json(&key, &statuses).await
    }

    async fn recent_statuses(
        &self,
        location_id: &str,
        limit: usize,
    ) -> Result<Vec<LocationStatus>> {
        let key = Self::status_key(location_id);
        let statuses: Vec<LocationStatus> = self.read_json(&key).await?.unwrap_or_default();

        // Creation-time order, append order breaking ties; newest first.
        let mut indexed: Vec<(usize, LocationStatus)> = statuses.into_iter().enumerate().collect();
        indexed.sort_by(|(ai, a), (bi, b)| {
            (b.created_at, bi).cmp(&(a.created_at, ai))
        });

        Ok(indexed
            .into_iter()
            .take(limit)
            .map(|(_, status)| status)
            .collect())
    }

    async fn load_rules(&self) -> Result<Vec<AlertRule>> {
        Ok(self.read_json("rules.json").await?.unwrap_or_default())
    }

    async fn load_subscribers(&self) -> Result<Vec<Subscriber>> {
        Ok(self.read_json("subscribers.json").await?.unwrap_or_default())
    }

    async fn append_notification(&self, record: &NotificationRecord) -> Result<()> {
        let key = Self::notification_key(record.created_at.year(), record.created_at.month());
        let mut records: Vec<NotificationRecord> = self.read_json(&key).await?.unwrap_or_default();
        records.push(record.clone());
        self.write_json(&key, &records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DangerScore, DeliveryOutcome, Geometry, NotificationKind, Point, PolygonRings};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn make_bulletin(external_id: &str, language: &str) -> Bulletin {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 17, 0, 0).unwrap();
        Bulletin {
            external_id: external_id.to_string(),
            language: language.to_string(),
            valid_from: now,
            valid_until: now + chrono::Duration::days(1),
            payload: serde_json::json!({"regions": {"features": []}}),
            fetched_at: now,
        }
    }

    fn make_status(location_id: &str, hour: u32) -> LocationStatus {
        LocationStatus {
            location_id: location_id.to_string(),
            bulletin_id: format!("b{hour}"),
            region_id: Some("R1".to_string()),
            danger: DangerScore::default(),
            problems: Vec::new(),
            created_at: Utc.with_ymd_and_hms(2026, 1, 15, hour, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn write_and_read_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        store.write_bytes("test.txt", b"hello").await.unwrap();
        let data = store.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn read_nonexistent_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        assert!(store.read_bytes("nope.txt").await.unwrap().is_none());
        assert!(store.latest_bulletin("de").await.unwrap().is_none());
        assert!(store.load_regions().await.unwrap().is_empty());
        assert!(store.load_locations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bulletin_upsert_updates_in_place() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        store
            .upsert_bulletin(&make_bulletin("2026-01-15", "de"))
            .await
            .unwrap();

        let mut updated = make_bulletin("2026-01-15", "de");
        updated.payload = serde_json::json!({"regions": {"features": [{"regions": []}]}});
        store.upsert_bulletin(&updated).await.unwrap();

        // Same key: one file, updated content.
        let dir = tmp.path().join("bulletins/de");
        let files: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "latest.json")
            .collect();
        assert_eq!(files.len(), 1);

        let loaded = store.latest_bulletin("de").await.unwrap().unwrap();
        assert_eq!(loaded.payload, updated.payload);
    }

    #[tokio::test]
    async fn bulletins_are_keyed_per_language() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        store
            .upsert_bulletin(&make_bulletin("2026-01-15", "de"))
            .await
            .unwrap();
        store
            .upsert_bulletin(&make_bulletin("2026-01-15", "fr"))
            .await
            .unwrap();

        assert!(store.latest_bulletin("de").await.unwrap().is_some());
        assert!(store.latest_bulletin("fr").await.unwrap().is_some());
        assert!(store.latest_bulletin("it").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn region_upsert_keeps_only_latest_shape() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        let ring = |lat: f64| PolygonRings {
            outer: vec![
                Point::new(lat, 9.0),
                Point::new(lat, 10.0),
                Point::new(lat + 1.0, 9.5),
            ],
            holes: Vec::new(),
        };

        let region = WarningRegion {
            region_id: "CH-7221".to_string(),
            name: Some("Engadin".to_string()),
            geometry: Geometry::Polygon(ring(46.0)),
            bulletin_id: "b1".to_string(),
        };
        store.upsert_region(&region).await.unwrap();

        let replaced = WarningRegion {
            geometry: Geometry::Polygon(ring(47.0)),
            bulletin_id: "b2".to_string(),
            ..region
        };
        store.upsert_region(&replaced).await.unwrap();

        let regions = store.load_regions().await.unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].bulletin_id, "b2");
        assert_eq!(regions[0].geometry, Geometry::Polygon(ring(47.0)));
    }

    #[tokio::test]
    async fn recent_statuses_orders_by_creation_time() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        store.append_status(&make_status("loc1", 8)).await.unwrap();
        store.append_status(&make_status("loc1", 12)).await.unwrap();
        store.append_status(&make_status("loc1", 10)).await.unwrap();

        let recent = store.recent_statuses("loc1", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].bulletin_id, "b12");
        assert_eq!(recent[1].bulletin_id, "b10");
    }

    #[tokio::test]
    async fn statuses_are_separate_per_location() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        store.append_status(&make_status("loc1", 8)).await.unwrap();
        store.append_status(&make_status("loc2", 9)).await.unwrap();

        assert_eq!(store.recent_statuses("loc1", 10).await.unwrap().len(), 1);
        assert_eq!(store.recent_statuses("loc2", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn notifications_append_to_monthly_files() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        let record = NotificationRecord {
            subscriber_id: "sub1".to_string(),
            location_id: None,
            kind: NotificationKind::Change,
            title: "Danger level changed".to_string(),
            body: "2 -> 3".to_string(),
            outcome: DeliveryOutcome::Sent,
            created_at: Utc.with_ymd_and_hms(2026, 1, 15, 17, 0, 0).unwrap(),
        };
        store.append_notification(&record).await.unwrap();
        store.append_notification(&record).await.unwrap();

        let records: Vec<NotificationRecord> = store
            .read_json("notifications/2026/01.json")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn hostile_identifiers_are_sanitized() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        store
            .upsert_bulletin(&make_bulletin("2026/01/15#17:00", "de"))
            .await
            .unwrap();
        let loaded = store.latest_bulletin("de").await.unwrap().unwrap();
        assert_eq!(loaded.external_id, "2026/01/15#17:00");
    }
}
