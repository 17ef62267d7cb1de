use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::time::{sleep, Duration};
use tracing::debug;

use crate::coordinator::Coordinator;

/// Follows the server's console log and feeds each completed line to the
/// coordinator. Starts at end-of-file so only lines written after the daemon
/// came up are observed; a shrinking file (log rotation) rewinds to the
/// start. Exits with the daemon stop flag.
pub async fn tail_console(path: PathBuf, coordinator: Arc<Coordinator>) {
    let mut position = match tokio::fs::metadata(&path).await {
        Ok(meta) => meta.len(),
        Err(_) => 0,
    };

    loop {
        sleep(Duration::from_millis(500)).await;
        if coordinator.stop_requested() {
            debug!("console tailer stopping");
            return;
        }

        let len = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            // Not created yet, or mid-rotation.
            Err(_) => continue,
        };
        if len < position {
            position = 0;
        }
        if len == position {
            continue;
        }

        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(err) => {
                debug!("console log unavailable: {err}");
                continue;
            }
        };
        let mut reader = BufReader::new(file);
        if reader.seek(SeekFrom::Start(position)).await.is_err() {
            continue;
        }

        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => break,
                Ok(read) => {
                    if !line.ends_with('\n') {
                        // Partial line still being written; retry next poll.
                        break;
                    }
                    position += read as u64;
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        coordinator.on_console_line(trimmed);
                    }
                }
                Err(err) => {
                    debug!("console read failed: {err}");
                    break;
                }
            }
        }
    }
}
