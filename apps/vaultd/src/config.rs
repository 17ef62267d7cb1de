use std::fs;
use std::path::{Path, PathBuf};

use vault_core::BackupConfig;

/// Load/persist for the one persisted artifact: the backup config file.
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the config, seeding the file with defaults when it is missing.
    pub fn load(&self) -> Result<BackupConfig, String> {
        let content = match fs::read_to_string(&self.path) {
            Ok(value) => value,
            Err(_) => {
                let defaults = BackupConfig::default();
                self.persist(&defaults)?;
                return Ok(defaults);
            }
        };

        serde_json::from_str(&content)
            .map_err(|err| format!("Failed to parse backup config: {err}"))
    }

    /// Writes the config through a temp file so a crash mid-write never
    /// leaves a truncated config behind.
    pub fn persist(&self, config: &BackupConfig) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|err| format!("Failed to create config dir: {err}"))?;
            }
        }

        let payload = serde_json::to_string_pretty(config)
            .map_err(|err| format!("Failed to serialize backup config: {err}"))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, payload).map_err(|err| format!("Failed to write backup config: {err}"))?;
        fs::rename(&tmp, &self.path).map_err(|err| {
            let _ = fs::remove_file(&tmp);
            format!("Failed to persist backup config: {err}")
        })
    }
}
