// src/models/mod.rs

//! Data model for the bulletin pipeline.

pub mod bulletin;
pub mod config;
pub mod location;
pub mod region;
pub mod rule;

pub use bulletin::{Aspect, AvalancheProblem, Bulletin, DangerLevel, ElevationBand, RatingBand};
pub use config::{Config, ProviderConfig, PushConfig, RetryConfig, SyncConfig};
pub use location::{ChangeDirection, ChangeEvent, DangerScore, LocationStatus, MonitoredLocation};
pub use region::{Geometry, Point, PolygonRings, WarningRegion};
pub use rule::{AlertRule, DeliveryOutcome, NotificationKind, NotificationRecord, Subscriber};
