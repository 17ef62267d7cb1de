use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use vault_core::{parse_interval, Trigger};

use super::{now_millis, Coordinator};
use crate::notify::Audience;

/// Periodic trigger loop: polls once a second and fires a scheduled run when
/// backups are enabled, the host reports itself started, and the interval
/// has elapsed. The loop itself never dies because one iteration went wrong;
/// it exits only on `stop()`.
pub(crate) async fn run(coordinator: Arc<Coordinator>) {
    info!("backup scheduler started");
    loop {
        sleep(Duration::from_secs(1)).await;
        if coordinator.stop_requested() {
            info!("backup scheduler stopped");
            return;
        }

        let config = coordinator.config_snapshot();
        if !config.enabled {
            continue;
        }
        if !coordinator.host().is_started().await {
            continue;
        }

        let interval_ms = parse_interval(&config.interval).saturating_mul(1000);
        let now = now_millis();
        if now.saturating_sub(coordinator.last_scheduled_ms()) <= interval_ms {
            continue;
        }

        // Stamped at trigger time, not completion time, so a slow run does
        // not push the following one further out.
        coordinator.mark_scheduled(now);
        coordinator.report(&Audience::Broadcast, "starting scheduled backup");

        // The run gets its own task; the scheduler keeps ticking while the
        // archive streams.
        let runner = Arc::clone(&coordinator);
        tokio::spawn(async move {
            match runner.run_once(Trigger::Scheduled, None).await {
                Ok(_) => {
                    let message = format!("next backup: {}", runner.next_backup_message());
                    runner.report(&Audience::Broadcast, &message);
                }
                Err(err) => warn!("scheduled backup rejected: {err}"),
            }
        });
    }
}
