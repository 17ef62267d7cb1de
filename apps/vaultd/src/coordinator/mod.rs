mod scheduler;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Local, TimeZone};
use tokio::sync::{oneshot, watch};
use tokio::task;
use tokio::time::timeout;
use tracing::{info, warn};

use vault_archive::{select_files, write_archive};
use vault_core::{format_bytes, parse_interval, parse_rules, BackupConfig, RunOutcome, Trigger};

use crate::config::ConfigStore;
use crate::host::HostBridge;
use crate::notify::{Audience, StatusSink};

const STATUS_PREFIX: &str = "[backup]";

/// Where the current run is. This one value is also the single-flight guard:
/// a run may begin only by moving it off `Idle`, and "a backup is in
/// progress" is exactly `phase != Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    SaveAwaiting,
    Packaging,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CoordinatorError {
    #[error("a backup is already running")]
    AlreadyRunning,
}

/// Owns all backup scheduling state and drives the save-pause / acknowledge /
/// package / resume protocol. Constructed once at startup; every entry point
/// goes through a shared handle, there is no ambient global.
pub struct Coordinator {
    config: RwLock<BackupConfig>,
    store: ConfigStore,
    host: Arc<dyn HostBridge>,
    sink: Arc<dyn StatusSink>,
    server_root: PathBuf,
    phase: watch::Sender<RunPhase>,
    save_ack: Mutex<Option<oneshot::Sender<()>>>,
    last_scheduled_ms: AtomicU64,
    stop: AtomicBool,
    loop_started: AtomicBool,
}

impl Coordinator {
    pub fn new(
        config: BackupConfig,
        store: ConfigStore,
        host: Arc<dyn HostBridge>,
        sink: Arc<dyn StatusSink>,
        server_root: PathBuf,
    ) -> Self {
        let (phase, _) = watch::channel(RunPhase::Idle);
        Self {
            config: RwLock::new(config),
            store,
            host,
            sink,
            server_root,
            phase,
            save_ack: Mutex::new(None),
            last_scheduled_ms: AtomicU64::new(now_millis()),
            stop: AtomicBool::new(false),
            loop_started: AtomicBool::new(false),
        }
    }

    /// Runs one backup to completion. Rejected while another run holds the
    /// guard; a silent no-op while backups are disabled, for manual and
    /// scheduled triggers alike.
    pub async fn run_once(
        &self,
        trigger: Trigger,
        comment: Option<&str>,
    ) -> Result<RunOutcome, CoordinatorError> {
        let config = self.config_snapshot();
        if !config.enabled {
            return Ok(RunOutcome::Disabled);
        }

        self.acquire_guard()?;
        // Arm the per-run acknowledgment before the flush request goes out so
        // the confirmation cannot slip past us; anything delivered before
        // this instant belongs to no run and was already dropped.
        let ack = self.arm_save_ack();
        let started = Instant::now();
        info!(?trigger, "backup run starting");
        self.report(&Audience::Broadcast, "backup starting, this can take a while");

        let outcome = self.execute(&config, comment, started, ack).await;

        // Central safety invariant: every exit path out of the run resumes
        // the host's own persistence and releases the guard exactly once.
        if let Err(err) = self.host.resume_autosave().await {
            warn!("failed to re-enable autosave: {err}");
        }
        self.release_guard();

        match &outcome {
            RunOutcome::Completed { bytes, elapsed, .. } => {
                self.report(
                    &Audience::Broadcast,
                    &format!(
                        "backup finished in {:.1} s\ntotal size {}",
                        elapsed.as_secs_f64(),
                        format_bytes(*bytes)
                    ),
                );
            }
            RunOutcome::SaveTimeout => {
                self.report(
                    &Audience::Broadcast,
                    "world save was not confirmed in time, backup aborted",
                );
            }
            RunOutcome::Failed(reason) => {
                warn!("backup run failed: {reason}");
                self.report(&Audience::Broadcast, "backup failed, see the daemon log");
            }
            RunOutcome::Disabled => {}
        }

        Ok(outcome)
    }

    async fn execute(
        &self,
        config: &BackupConfig,
        comment: Option<&str>,
        started: Instant,
        ack: oneshot::Receiver<()>,
    ) -> RunOutcome {
        if let Err(err) = self.host.pause_autosave().await {
            return RunOutcome::Failed(format!("could not pause autosave: {err}"));
        }
        if let Err(err) = self.host.flush_save().await {
            return RunOutcome::Failed(format!("could not request a world flush: {err}"));
        }

        let acknowledged = if config.save_timeout_secs < 0 {
            ack.await.is_ok()
        } else {
            matches!(
                timeout(Duration::from_secs(config.save_timeout_secs as u64), ack).await,
                Ok(Ok(()))
            )
        };
        if !acknowledged {
            return RunOutcome::SaveTimeout;
        }

        self.set_phase(RunPhase::Packaging);

        let base_name = archive_base_name(Local::now(), comment);
        let root = self.server_root.clone();
        let dest = if config.backup_path.is_absolute() {
            config.backup_path.clone()
        } else {
            self.server_root.join(&config.backup_path)
        };
        let rules = parse_rules(&config.file_rules);
        let format = config.archive_format;
        let sink = Arc::clone(&self.sink);

        // The selection walk and the archive stream are blocking disk I/O;
        // they hold no lock beyond the run guard.
        let build = task::spawn_blocking(move || {
            let files = select_files(&root, &rules).map_err(|err| err.to_string())?;
            let mut on_progress = |total: usize, done: usize| {
                let step = (total / 8).max(1);
                if done % step == 0 || done == total {
                    sink.deliver(
                        &Audience::Broadcast,
                        &format!("{STATUS_PREFIX} {}", progress_bar(total, done)),
                    );
                }
            };
            write_archive(&dest, &base_name, format, &root, &files, Some(&mut on_progress))
                .map_err(|err| err.to_string())
        })
        .await;

        match build {
            Ok(Ok(summary)) => {
                for warning in &summary.warnings {
                    self.report(&Audience::Broadcast, warning);
                }
                info!(
                    archive = %summary.path.display(),
                    added = summary.added,
                    skipped = summary.skipped,
                    "backup archive written"
                );
                RunOutcome::Completed {
                    archive: summary.path,
                    bytes: summary.bytes,
                    elapsed: started.elapsed(),
                }
            }
            Ok(Err(reason)) => RunOutcome::Failed(reason),
            Err(err) => RunOutcome::Failed(format!("backup task panicked: {err}")),
        }
    }

    /// Feeds one console line into the coordinator. Only honored while a run
    /// is actively waiting for its save confirmation; the first matching
    /// line fires the acknowledgment, later ones are no-ops.
    pub fn on_console_line(&self, line: &str) {
        if *self.phase.borrow() != RunPhase::SaveAwaiting {
            return;
        }
        let matched = {
            let config = self.config.read().expect("config lock poisoned");
            config
                .saved_world_keywords
                .iter()
                .any(|keyword| line.contains(keyword.as_str()))
        };
        if !matched {
            return;
        }
        if let Some(tx) = self
            .save_ack
            .lock()
            .expect("save ack lock poisoned")
            .take()
        {
            let _ = tx.send(());
            info!("world save acknowledged by the host");
        }
    }

    /// Flips the enabled flag and round-trips it through the config store.
    pub fn set_enabled(&self, enabled: bool) -> Result<(), String> {
        let snapshot = {
            let mut config = self.config.write().expect("config lock poisoned");
            config.enabled = enabled;
            config.clone()
        };
        self.store.persist(&snapshot)?;
        info!(enabled, "automatic backups toggled");
        Ok(())
    }

    pub fn in_progress(&self) -> bool {
        *self.phase.borrow() != RunPhase::Idle
    }

    /// When the next scheduled backup is expected, for status displays.
    pub fn next_backup_message(&self) -> String {
        let config = self.config_snapshot();
        if !config.enabled {
            return "none (automatic backups are disabled)".to_string();
        }
        let interval_ms = parse_interval(&config.interval).saturating_mul(1000);
        let at_ms = self
            .last_scheduled_ms
            .load(Ordering::Relaxed)
            .saturating_add(interval_ms);
        match Local.timestamp_millis_opt(at_ms as i64) {
            chrono::LocalResult::Single(at) => at.format("%Y/%m/%d %H:%M:%S").to_string(),
            _ => "unknown".to_string(),
        }
    }

    /// Launches the periodic trigger loop. Subsequent calls are no-ops.
    pub fn start(self: &Arc<Self>) {
        if self.loop_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let coordinator = Arc::clone(self);
        tokio::spawn(scheduler::run(coordinator));
    }

    /// Signals the loop to exit at its next tick. Idempotent, safe before
    /// `start`, and never preempts an in-flight run.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Bounded wait for an in-flight run to finish during shutdown. Expiry
    /// proceeds anyway; this is best effort, not a durability guarantee.
    pub async fn drain(&self, max_wait: Duration) {
        if !self.in_progress() {
            return;
        }
        info!(
            "waiting up to {} s for the in-flight backup to finish",
            max_wait.as_secs()
        );
        let mut watcher = self.phase.subscribe();
        let idle = watcher.wait_for(|phase| *phase == RunPhase::Idle);
        if timeout(max_wait, idle).await.is_err() {
            warn!("backup still running after the drain window, shutting down anyway");
        }
    }

    pub fn last_scheduled_ms(&self) -> u64 {
        self.last_scheduled_ms.load(Ordering::SeqCst)
    }

    /// Stamps the scheduling clock. Monotonic: the timestamp only ever moves
    /// forward.
    pub(crate) fn mark_scheduled(&self, at_ms: u64) {
        self.last_scheduled_ms.fetch_max(at_ms, Ordering::SeqCst);
    }

    pub(crate) fn config_snapshot(&self) -> BackupConfig {
        self.config.read().expect("config lock poisoned").clone()
    }

    pub(crate) fn host(&self) -> &Arc<dyn HostBridge> {
        &self.host
    }

    pub(crate) fn report(&self, audience: &Audience, message: &str) {
        for line in message.lines() {
            self.sink.deliver(audience, &format!("{STATUS_PREFIX} {line}"));
        }
    }

    fn acquire_guard(&self) -> Result<(), CoordinatorError> {
        let mut acquired = false;
        self.phase.send_if_modified(|phase| {
            if *phase == RunPhase::Idle {
                *phase = RunPhase::SaveAwaiting;
                acquired = true;
                true
            } else {
                false
            }
        });
        if acquired {
            Ok(())
        } else {
            Err(CoordinatorError::AlreadyRunning)
        }
    }

    fn release_guard(&self) {
        // Disarm any unfired acknowledgment so it cannot leak into the next
        // run, then go idle and wake anyone draining.
        self.save_ack.lock().expect("save ack lock poisoned").take();
        self.phase.send_replace(RunPhase::Idle);
    }

    fn set_phase(&self, phase: RunPhase) {
        self.phase.send_replace(phase);
    }

    fn arm_save_ack(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        *self.save_ack.lock().expect("save ack lock poisoned") = Some(tx);
        rx
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn archive_base_name(now: DateTime<Local>, comment: Option<&str>) -> String {
    let mut name = now.format("%Y-%m-%d_%H-%M-%S").to_string();
    if let Some(comment) = comment.filter(|c| !c.is_empty()) {
        name.push('_');
        name.push_str(&sanitize_file_name(comment));
    }
    name
}

/// Path-hostile characters in a player-supplied comment become underscores.
fn sanitize_file_name(raw: &str) -> String {
    raw.chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '|' | '<' | '>' => '_',
            other => other,
        })
        .collect()
}

fn progress_bar(total: usize, done: usize) -> String {
    let percent = if total == 0 {
        100.0
    } else {
        done as f64 * 100.0 / total as f64
    };
    let filled = ((percent / 10.0) as usize).min(10);
    format!(
        "[{}{}] {percent:5.1}% ({done}/{total})",
        "\u{2588}".repeat(filled),
        " ".repeat(10 - filled)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_is_sanitized_into_the_archive_name() {
        let at = Local.with_ymd_and_hms(2026, 8, 8, 12, 30, 0).unwrap();
        assert_eq!(
            archive_base_name(at, Some("pre/wipe: keep?")),
            "2026-08-08_12-30-00_pre_wipe_ keep_"
        );
        assert_eq!(archive_base_name(at, None), "2026-08-08_12-30-00");
        assert_eq!(archive_base_name(at, Some("")), "2026-08-08_12-30-00");
    }

    #[test]
    fn progress_bar_tracks_completion() {
        assert_eq!(progress_bar(8, 4), "[█████     ]  50.0% (4/8)");
        assert_eq!(progress_bar(8, 8), "[██████████] 100.0% (8/8)");
        assert!(progress_bar(0, 0).contains("100.0%"));
    }
}
