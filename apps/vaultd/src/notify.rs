use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::info;

/// Where a status line goes: everyone watching, or one requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    Broadcast,
    Requester(String),
}

/// Sink for the single-line status messages the coordinator emits. Delivery
/// must never block or fail the sender; a slow observer is the observer's
/// problem.
pub trait StatusSink: Send + Sync {
    fn deliver(&self, audience: &Audience, line: &str);
}

/// Default sink: keeps a bounded ring of recent lines, fans out to live
/// subscribers over a broadcast channel, and mirrors everything into the
/// daemon log.
#[derive(Clone)]
pub struct StatusHub {
    inner: Arc<Mutex<HubState>>,
}

struct HubState {
    recent: VecDeque<String>,
    tx: broadcast::Sender<String>,
    max_lines: usize,
}

impl StatusHub {
    pub fn new(max_lines: usize) -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(Mutex::new(HubState {
                recent: VecDeque::with_capacity(max_lines.min(1024)),
                tx,
                max_lines: max_lines.max(16),
            })),
        }
    }

    pub fn recent(&self, lines: usize) -> Vec<String> {
        let guard = self.inner.lock().expect("status lock poisoned");
        let count = lines.min(guard.recent.len());
        guard
            .recent
            .iter()
            .skip(guard.recent.len() - count)
            .cloned()
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        let guard = self.inner.lock().expect("status lock poisoned");
        guard.tx.subscribe()
    }
}

impl StatusSink for StatusHub {
    fn deliver(&self, audience: &Audience, line: &str) {
        let rendered = match audience {
            Audience::Broadcast => line.to_string(),
            Audience::Requester(who) => format!("@{who} {line}"),
        };
        info!(target: "status", "{rendered}");

        let mut guard = self.inner.lock().expect("status lock poisoned");
        while guard.recent.len() >= guard.max_lines {
            guard.recent.pop_front();
        }
        guard.recent.push_back(rendered.clone());
        // Nobody subscribed yet is not an error.
        let _ = guard.tx.send(rendered);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_is_bounded_and_keeps_the_newest_lines() {
        let hub = StatusHub::new(16);
        for i in 0..40 {
            hub.deliver(&Audience::Broadcast, &format!("line {i}"));
        }

        let recent = hub.recent(100);
        assert_eq!(recent.len(), 16);
        assert_eq!(recent.last().expect("non-empty"), "line 39");
    }

    #[tokio::test]
    async fn subscribers_receive_new_lines() {
        let hub = StatusHub::new(16);
        let mut rx = hub.subscribe();

        hub.deliver(&Audience::Broadcast, "hello");
        assert_eq!(rx.recv().await.expect("line"), "hello");

        hub.deliver(&Audience::Requester("ops".to_string()), "done");
        assert_eq!(rx.recv().await.expect("line"), "@ops done");
    }
}
