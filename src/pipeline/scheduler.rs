// src/pipeline/scheduler.rs

//! Time-driven pipeline triggers.
//!
//! Two loops: the full sync cycle on a fixed interval and the
//! reminder-due check once per minute. Both are single-flight; a tick
//! arriving while the previous invocation is still running is skipped
//! entirely, never queued.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;

use crate::models::SyncConfig;
use crate::pipeline::sync::SyncRunner;

/// Run the scheduler until the surrounding task is cancelled.
pub async fn run_scheduler(runner: Arc<SyncRunner>, config: &SyncConfig, language: &str) {
    let mut sync_tick = tokio::time::interval(Duration::from_secs(config.interval_mins * 60));
    let mut reminder_tick =
        tokio::time::interval(Duration::from_secs(config.reminder_tick_secs.max(1)));

    // A tick that fires while the loop is busy is dropped, not queued.
    sync_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    reminder_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    log::info!(
        "Scheduler starting: sync every {} min, reminders every {} s",
        config.interval_mins,
        config.reminder_tick_secs
    );

    loop {
        tokio::select! {
            _ = sync_tick.tick() => {
                match runner.run_sync(language).await {
                    Ok(report) if report.success => {
                        log::info!(
                            "Scheduled sync done: regions={} locations={} changes={} queued={}",
                            report.regions_processed,
                            report.locations_updated,
                            report.changes_detected,
                            report.notifications_queued
                        );
                    }
                    Ok(report) => {
                        log::warn!("Scheduled sync failed: {}", report.errors.join("; "));
                    }
                    Err(e) => {
                        log::error!("Scheduled sync raised: {e}");
                    }
                }
            }
            _ = reminder_tick.tick() => {
                match runner.dispatch_due_reminders(Utc::now()).await {
                    Ok(0) => {}
                    Ok(count) => log::info!("Dispatched {count} due reminders"),
                    Err(e) => log::error!("Reminder dispatch raised: {e}"),
                }
            }
        }
    }
}
