// src/dispatch/mod.rs

//! Notification dispatch: push delivery, audit logging, retry worker.

pub mod dispatcher;
pub mod message;
pub mod push;
pub mod worker;

pub use dispatcher::{Dispatcher, Notification};
pub use push::{FcmChannel, PushChannel, PushReceipt};
pub use worker::{DispatchJob, DispatchQueue};
