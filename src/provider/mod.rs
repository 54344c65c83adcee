// src/provider/mod.rs

//! External bulletin provider integration.

pub mod client;
pub mod feed;

pub use client::{BulletinClient, BulletinSource};
pub use feed::{FeedDocument, Feature, RawLevel, RegionRef};
