//! # Audit Recorder
//!
//! Best-effort, append-only audit trail for every mutating operation.
//!
//! ## Delivery
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Audit Delivery Modes                                 │
//! │                                                                         │
//! │  Service operation commits                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  recorder.record(event).await                                          │
//! │       │                                                                 │
//! │       ├── Inline ──────► INSERT INTO audit_logs   (caller waits)       │
//! │       │                                                                 │
//! │       └── Background ──► mpsc ──► worker task ──► INSERT INTO audit_logs│
//! │                          (caller returns at once)                       │
//! │                                                                         │
//! │  flush().await: resolves once every event recorded before the call     │
//! │  has been written (or has failed).                                     │
//! │                                                                         │
//! │  A failed write is logged with tracing::error! and dropped. It never   │
//! │  reaches the caller and never undoes the operation it describes.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};
use uuid::Uuid;

use crate::repository::audit::AuditLogRepository;
use tally_core::{AuditAction, AuditEntityType, AuditLogEntry};

// =============================================================================
// Mode
// =============================================================================

/// How audit entries are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditMode {
    /// Queue to a worker task; callers never wait on the audit write.
    #[default]
    Background,

    /// Write before returning to the caller.
    Inline,
}

impl fmt::Display for AuditMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditMode::Background => f.write_str("background"),
            AuditMode::Inline => f.write_str("inline"),
        }
    }
}

impl FromStr for AuditMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "background" => Ok(AuditMode::Background),
            "inline" => Ok(AuditMode::Inline),
            other => Err(format!(
                "unknown audit mode '{}', expected 'background' or 'inline'",
                other
            )),
        }
    }
}

// =============================================================================
// Event
// =============================================================================

/// One auditable fact, before it gets an id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub user_id: Option<String>,
    pub action: AuditAction,
    pub entity_type: AuditEntityType,
    pub entity_id: String,
    pub changes: Option<Value>,
    pub ip_address: Option<String>,
}

impl AuditEvent {
    /// An entity create/update/delete with `{old, new}` snapshots.
    ///
    /// Creates have no `old`, deletes have the soft-deleted row as `new`.
    pub fn entity_change<T: Serialize>(
        action: AuditAction,
        entity_type: AuditEntityType,
        entity_id: impl Into<String>,
        old: Option<&T>,
        new: Option<&T>,
    ) -> Self {
        AuditEvent {
            user_id: None,
            action,
            entity_type,
            entity_id: entity_id.into(),
            changes: Some(json!({ "old": snapshot(old), "new": snapshot(new) })),
            ip_address: None,
        }
    }

    /// A ledger transaction, recorded as `{data: <transaction>}`.
    pub fn ledger<T: Serialize>(
        action: AuditAction,
        entity_type: AuditEntityType,
        entity_id: impl Into<String>,
        data: &T,
    ) -> Self {
        AuditEvent {
            user_id: None,
            action,
            entity_type,
            entity_id: entity_id.into(),
            changes: Some(json!({ "data": snapshot(Some(data)) })),
            ip_address: None,
        }
    }

    /// Attributes the event to a user.
    pub fn by(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Records the originating client address.
    pub fn from_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    fn into_entry(self) -> AuditLogEntry {
        AuditLogEntry {
            id: Uuid::new_v4().to_string(),
            user_id: self.user_id,
            action: self.action,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            changes: self.changes.map(|v| v.to_string()),
            ip_address: self.ip_address,
            created_at: Utc::now(),
        }
    }
}

fn snapshot<T: Serialize>(value: Option<&T>) -> Value {
    match value.map(serde_json::to_value) {
        Some(Ok(v)) => v,
        Some(Err(e)) => {
            error!(error = %e, "Failed to serialize audit snapshot");
            Value::Null
        }
        None => Value::Null,
    }
}

// =============================================================================
// Recorder
// =============================================================================

enum Message {
    Record(AuditLogEntry),
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
enum Delivery {
    Inline(AuditLogRepository),
    Background(mpsc::UnboundedSender<Message>),
}

/// Appends audit entries without ever failing the caller.
///
/// ## Usage
/// ```rust,ignore
/// let recorder = AuditRecorder::new(db.audit_logs(), AuditMode::Background);
///
/// recorder
///     .record(AuditEvent::ledger(AuditAction::Transaction, AuditEntityType::CustomerTransaction, &tx.id, &tx)
///         .by(&user.id)
///         .from_ip(client_ip))
///     .await;
/// ```
#[derive(Clone)]
pub struct AuditRecorder {
    delivery: Delivery,
    mode: AuditMode,
}

impl fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditRecorder").field("mode", &self.mode).finish()
    }
}

impl AuditRecorder {
    /// Creates a recorder. `Background` spawns the worker task, so this must
    /// be called inside a tokio runtime.
    pub fn new(repo: AuditLogRepository, mode: AuditMode) -> Self {
        let delivery = match mode {
            AuditMode::Inline => Delivery::Inline(repo),
            AuditMode::Background => {
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(run_worker(repo, rx));
                Delivery::Background(tx)
            }
        };

        debug!(mode = %mode, "Audit recorder started");
        AuditRecorder { delivery, mode }
    }

    pub fn mode(&self) -> AuditMode {
        self.mode
    }

    /// Records one event. Never fails.
    pub async fn record(&self, event: AuditEvent) {
        let entry = event.into_entry();

        match &self.delivery {
            Delivery::Inline(repo) => write_entry(repo, &entry).await,
            Delivery::Background(tx) => {
                if let Err(mpsc::error::SendError(Message::Record(entry))) =
                    tx.send(Message::Record(entry))
                {
                    error!(
                        action = %entry.action,
                        entity_type = %entry.entity_type,
                        entity_id = %entry.entity_id,
                        "Audit worker stopped, entry dropped"
                    );
                }
            }
        }
    }

    /// Waits until every event recorded so far has been handled.
    ///
    /// Returns immediately in inline mode.
    pub async fn flush(&self) {
        if let Delivery::Background(tx) = &self.delivery {
            let (done_tx, done_rx) = oneshot::channel();
            if tx.send(Message::Flush(done_tx)).is_ok() {
                let _ = done_rx.await;
            }
        }
    }
}

async fn run_worker(repo: AuditLogRepository, mut rx: mpsc::UnboundedReceiver<Message>) {
    while let Some(message) = rx.recv().await {
        match message {
            Message::Record(entry) => write_entry(&repo, &entry).await,
            Message::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    debug!("Audit worker stopped");
}

async fn write_entry(repo: &AuditLogRepository, entry: &AuditLogEntry) {
    if let Err(e) = repo.insert(entry).await {
        error!(
            error = %e,
            action = %entry.action,
            entity_type = %entry.entity_type,
            entity_id = %entry.entity_id,
            "Failed to write audit log entry"
        );
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
