use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Container format for a finished backup archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveFormat {
    #[serde(rename = "zip")]
    Zip,
    #[serde(rename = "tar")]
    Tar,
    #[serde(rename = "tar.gz")]
    TarGz,
}

impl ArchiveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::TarGz => "tar.gz",
        }
    }
}

impl Default for ArchiveFormat {
    fn default() -> Self {
        ArchiveFormat::Zip
    }
}

/// Persisted backup settings. Loaded once at startup and held as an immutable
/// snapshot per run; the only write path is `set_enabled`, which round-trips
/// through the config store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Human-readable interval, e.g. "2d" or "1h30m".
    #[serde(default = "default_interval")]
    pub interval: String,
    /// Console lines containing any of these confirm a completed world save.
    #[serde(default = "default_saved_world_keywords")]
    pub saved_world_keywords: Vec<String>,
    #[serde(default = "default_backup_path")]
    pub backup_path: PathBuf,
    /// Ordered include/exclude rules; a leading `!` marks an exclude.
    #[serde(default = "default_file_rules")]
    pub file_rules: Vec<String>,
    /// Seconds to wait for the save acknowledgment; negative waits forever.
    #[serde(default = "default_save_timeout_secs")]
    pub save_timeout_secs: i64,
    #[serde(default)]
    pub archive_format: ArchiveFormat,
    /// Minimum host permission level required to drive backups. Enforcement
    /// happens in the host's command layer; kept here so the persisted file
    /// is the single source of truth.
    #[serde(default = "default_permission_requirement")]
    pub permission_requirement: u8,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval: default_interval(),
            saved_world_keywords: default_saved_world_keywords(),
            backup_path: default_backup_path(),
            file_rules: default_file_rules(),
            save_timeout_secs: default_save_timeout_secs(),
            archive_format: ArchiveFormat::default(),
            permission_requirement: default_permission_requirement(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_interval() -> String {
    "2d".to_string()
}

fn default_saved_world_keywords() -> Vec<String> {
    vec![
        "Saved the game".to_string(), // 1.13+
        "Saved the world".to_string(), // 1.12-
    ]
}

fn default_backup_path() -> PathBuf {
    PathBuf::from("./permanent_backup")
}

fn default_file_rules() -> Vec<String> {
    vec!["server/**/*".to_string(), "!server/logs/**".to_string()]
}

fn default_save_timeout_secs() -> i64 {
    -1
}

fn default_permission_requirement() -> u8 {
    2
}
