use async_trait::async_trait;
use minecraft_client_rs::Client;
use std::path::PathBuf;
use tokio::fs;
use tokio::task::spawn_blocking;

use super::{HostBridge, HostError};

/// Drives the save protocol over the server's own RCON interface, using the
/// credentials the server itself publishes in `server.properties`.
pub struct RconBridge {
    server_root: PathBuf,
}

struct RconSettings {
    address: String,
    password: String,
}

impl RconBridge {
    pub fn new(server_root: PathBuf) -> Self {
        Self { server_root }
    }

    async fn settings(&self) -> Result<RconSettings, HostError> {
        let properties_path = self.server_root.join("server.properties");
        let content = match fs::read_to_string(&properties_path).await {
            Ok(value) => value,
            Err(_) => return Err(HostError::NotConfigured),
        };

        let mut enabled = false;
        let mut port: Option<u16> = None;
        let mut password: Option<String> = None;

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                continue;
            };
            match key.trim() {
                "enable-rcon" => enabled = value.trim().eq_ignore_ascii_case("true"),
                "rcon.port" => port = value.trim().parse::<u16>().ok(),
                "rcon.password" => {
                    let value = value.trim();
                    if !value.is_empty() {
                        password = Some(value.to_string());
                    }
                }
                _ => {}
            }
        }

        if !enabled {
            return Err(HostError::NotConfigured);
        }
        let password = password.ok_or(HostError::NotConfigured)?;
        Ok(RconSettings {
            address: format!("127.0.0.1:{}", port.unwrap_or(25575)),
            password,
        })
    }

    async fn execute(&self, command: &str) -> Result<String, HostError> {
        let settings = self.settings().await?;
        let command = command.to_string();

        spawn_blocking(move || {
            let mut client = Client::new(settings.address)
                .map_err(|err| HostError::Command(err.to_string()))?;
            client
                .authenticate(settings.password)
                .map_err(|err| HostError::Command(err.to_string()))?;
            let response = client
                .send_command(command)
                .map_err(|err| HostError::Command(err.to_string()))?;
            let _ = client.close();
            Ok(response.body)
        })
        .await
        .map_err(|err| HostError::Command(format!("rcon task failed: {err}")))?
    }
}

#[async_trait]
impl HostBridge for RconBridge {
    async fn pause_autosave(&self) -> Result<(), HostError> {
        self.execute("save-off").await.map(|_| ())
    }

    async fn flush_save(&self) -> Result<(), HostError> {
        self.execute("save-all flush").await.map(|_| ())
    }

    async fn resume_autosave(&self) -> Result<(), HostError> {
        self.execute("save-on").await.map(|_| ())
    }

    async fn is_started(&self) -> bool {
        // An authenticated round trip only succeeds once the server is
        // accepting commands.
        self.execute("list").await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        std::env::temp_dir().join(format!("vaultd-rcon-{prefix}-{nanos}"))
    }

    #[tokio::test]
    async fn missing_properties_file_means_not_configured() {
        let root = unique_temp_dir("missing");
        std::fs::create_dir_all(&root).expect("create root");

        let bridge = RconBridge::new(root.clone());
        assert!(matches!(
            bridge.settings().await,
            Err(HostError::NotConfigured)
        ));
        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn disabled_rcon_means_not_configured() {
        let root = unique_temp_dir("disabled");
        std::fs::create_dir_all(&root).expect("create root");
        std::fs::write(
            root.join("server.properties"),
            "enable-rcon=false\nrcon.port=25575\nrcon.password=hunter2\n",
        )
        .expect("write properties");

        let bridge = RconBridge::new(root.clone());
        assert!(matches!(
            bridge.settings().await,
            Err(HostError::NotConfigured)
        ));
        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn enabled_rcon_yields_address_and_password() {
        let root = unique_temp_dir("enabled");
        std::fs::create_dir_all(&root).expect("create root");
        std::fs::write(
            root.join("server.properties"),
            "# settings\nenable-rcon=true\nrcon.port=25599\nrcon.password=hunter2\n",
        )
        .expect("write properties");

        let bridge = RconBridge::new(root.clone());
        let settings = bridge.settings().await.expect("settings");
        assert_eq!(settings.address, "127.0.0.1:25599");
        assert_eq!(settings.password, "hunter2");
        let _ = std::fs::remove_dir_all(root);
    }
}
