//! Background notification scheduler.
//!
//! Runs a fixed-interval loop that delegates each tick to the engine's
//! notifier logic and fans out whatever it produces.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use tempo_engine::notifier::{self, NotifierState};

use crate::metrics::get_metrics;
use crate::state::AppState;

/// Spawn the notifier loop. Returns immediately; the loop stops when a
/// shutdown signal arrives.
pub fn spawn_notifier(state: Arc<AppState>, mut shutdown_rx: broadcast::Receiver<()>) {
    let config = state.engine.config.notifier.clone();
    if !config.enabled {
        tracing::info!("notification scheduler disabled by config");
        return;
    }

    let interval_secs = config.interval_secs.max(1);
    tracing::info!(interval_secs, "notification scheduler started");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut notifier_state = NotifierState::default();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("notification scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    get_metrics().incr_scheduler_tick();
                    if let Err(err) = run_once(&state, &config, &mut notifier_state).await {
                        tracing::warn!(error = %err, "notification tick failed");
                    }
                }
            }
        }
    });
}

async fn run_once(
    state: &AppState,
    config: &tempo_engine::config::NotifierConfig,
    notifier_state: &mut NotifierState,
) -> tempo_core::TempoResult<()> {
    let settings = state.engine.notification_settings().await?;
    let (hour, today) = notifier::local_clock();
    let notifications = notifier::run_tick(
        state.engine.store.as_ref(),
        config,
        &settings,
        chrono::Utc::now(),
        hour,
        today,
        notifier_state,
    )
    .await?;

    for notification in notifications {
        state.notify_notification(notification);
    }
    Ok(())
}
