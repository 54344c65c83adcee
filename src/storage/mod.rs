// src/storage/mod.rs

//! Storage abstractions for pipeline entities.
//!
//! The pipeline reads and writes five entity families:
//! bulletins (upsert per external id and language), warning regions
//! (latest geometry only), location statuses (append-only snapshots),
//! alert rules and subscribers (read-only seeds), and the append-only
//! notification audit log.
//!
//! ## Directory Structure (local backend)
//!
//! ```text
//! storage/
//! ├── config.toml
//! ├── locations.json            # Monitored locations (read-only seed)
//! ├── rules.json                # Alert rules (read-only seed)
//! ├── subscribers.json          # Subscribers (read-only seed)
//! ├── bulletins/
//! │   └── {lang}/
//! │       ├── latest.json       # Pointer to the latest external id
//! │       └── {external_id}.json
//! ├── regions/
//! │   └── {region_id}.json      # Latest geometry per provider region
//! ├── statuses/
//! │   └── {location_id}.json    # Append-ordered snapshots
//! └── notifications/            # Append-only audit log
//!     └── YYYY/
//!         └── MM.json
//! ```

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{
    AlertRule, Bulletin, LocationStatus, MonitoredLocation, NotificationRecord, Subscriber,
    WarningRegion,
};

// Re-export for convenience
pub use local::LocalStore;

/// Pointer to the most recently ingested bulletin for a language.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestPointer {
    pub external_id: String,
    pub updated_at: DateTime<Utc>,
}

/// Trait for pipeline storage backends.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert or update a bulletin, keyed by `(external_id, language)`.
    /// Re-ingesting the same key updates in place; it never duplicates.
    async fn upsert_bulletin(&self, bulletin: &Bulletin) -> Result<()>;

    /// Load the most recently ingested bulletin for a language.
    async fn latest_bulletin(&self, language: &str) -> Result<Option<Bulletin>>;

    /// Insert or overwrite a warning region, keyed by provider region id.
    /// Only the latest geometry and bulletin link are kept.
    async fn upsert_region(&self, region: &WarningRegion) -> Result<()>;

    /// Load all known warning regions.
    async fn load_regions(&self) -> Result<Vec<WarningRegion>>;

    /// Load the monitored locations. Read-only to the pipeline.
    async fn load_locations(&self) -> Result<Vec<MonitoredLocation>>;

    /// Append one immutable status snapshot.
    async fn append_status(&self, status: &LocationStatus) -> Result<()>;

    /// Load up to `limit` most recent snapshots for a location, newest
    /// first, ordered by creation time.
    async fn recent_statuses(&self, location_id: &str, limit: usize)
    -> Result<Vec<LocationStatus>>;

    /// Load all alert rules. Read-only to the pipeline.
    async fn load_rules(&self) -> Result<Vec<AlertRule>>;

    /// Load all subscribers. Read-only to the pipeline.
    async fn load_subscribers(&self) -> Result<Vec<Subscriber>>;

    /// Append one audit entry to the notification log.
    async fn append_notification(&self, record: &NotificationRecord) -> Result<()>;
}
