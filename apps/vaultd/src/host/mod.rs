pub mod rcon;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("rcon is not configured for this server")]
    NotConfigured,
    #[error("rcon command failed: {0}")]
    Command(String),
}

/// The slice of the host the coordinator needs: pause/resume the host's own
/// periodic persistence around a snapshot, force a flush, and tell whether
/// the server has finished starting.
#[async_trait]
pub trait HostBridge: Send + Sync {
    /// Stop the host's periodic world autosave while the snapshot streams.
    async fn pause_autosave(&self) -> Result<(), HostError>;

    /// Request an immediate full flush of world state to disk. Completion is
    /// signaled out of band, through the console acknowledgment line.
    async fn flush_save(&self) -> Result<(), HostError>;

    /// Restore the host's periodic autosave.
    async fn resume_autosave(&self) -> Result<(), HostError>;

    async fn is_started(&self) -> bool;
}
