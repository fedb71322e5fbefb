//! Fire-and-forget security audit log
//!
//! Callers record events without ever blocking or failing the request:
//! entries go into a bounded in-process queue and a background task drains
//! the queue to the structured log on a fixed interval. Delivery is
//! at-least-once from the queue's point of view, but entries buffered and
//! not yet flushed are lost on crash, and the queue drops new entries when
//! full. Process-local; a multi-instance deployment needs a shared backing
//! store instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// One security-relevant event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEvent {
    pub timestamp: DateTime<Utc>,
    pub tenant_id: Option<String>,
    pub actor: Option<String>,
    pub action: String,
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SecurityEvent {
    pub fn new(action: impl Into<String>, outcome: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            tenant_id: None,
            actor: None,
            action: action.into(),
            outcome: outcome.into(),
            detail: None,
        }
    }

    pub fn tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Handle for recording audit events.
#[derive(Clone)]
pub struct AuditLog {
    tx: mpsc::Sender<SecurityEvent>,
}

impl AuditLog {
    /// Spawn the drain task and return the recording handle.
    ///
    /// The task flushes buffered entries every `flush_interval` and exits
    /// after the last handle is dropped, flushing what remains.
    pub fn start(capacity: usize, flush_interval: Duration) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity);
        let handle = tokio::spawn(drain(rx, flush_interval));
        (Self { tx }, handle)
    }

    /// Queue an event. Never blocks; a full queue drops the entry.
    pub fn record(&self, event: SecurityEvent) {
        let _ = self.tx.try_send(event);
    }
}

async fn drain(mut rx: mpsc::Receiver<SecurityEvent>, flush_interval: Duration) {
    let mut buffer: Vec<SecurityEvent> = Vec::new();
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => buffer.push(event),
                None => break,
            },
            _ = ticker.tick() => flush(&mut buffer),
        }
    }

    flush(&mut buffer);
}

fn flush(buffer: &mut Vec<SecurityEvent>) {
    for event in buffer.drain(..) {
        info!(
            target: "omnicast::audit",
            timestamp = %event.timestamp,
            tenant_id = event.tenant_id.as_deref().unwrap_or("-"),
            actor = event.actor.as_deref().unwrap_or("-"),
            action = %event.action,
            outcome = %event.outcome,
            detail = event.detail.as_deref().unwrap_or(""),
            "audit"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_builder() {
        let event = SecurityEvent::new("publish", "allowed")
            .tenant("t1")
            .actor("ops@example.com")
            .detail("connection tg-1");

        assert_eq!(event.action, "publish");
        assert_eq!(event.outcome, "allowed");
        assert_eq!(event.tenant_id.as_deref(), Some("t1"));
        assert_eq!(event.actor.as_deref(), Some("ops@example.com"));
        assert_eq!(event.detail.as_deref(), Some("connection tg-1"));
    }

    #[tokio::test]
    async fn test_record_never_blocks_when_queue_full() {
        let (log, handle) = AuditLog::start(2, Duration::from_secs(3600));

        // Far more events than capacity; record must not block or panic
        for i in 0..50 {
            log.record(SecurityEvent::new(format!("action-{i}"), "allowed"));
        }

        drop(log);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_drain_task_exits_after_last_handle_drops() {
        let (log, handle) = AuditLog::start(16, Duration::from_millis(10));
        log.record(SecurityEvent::new("test", "allowed"));
        drop(log);

        // Completes rather than hanging on the interval
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("drain task should exit")
            .unwrap();
    }
}
