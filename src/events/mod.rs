use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use uuid::Uuid;

pub mod loggable;
pub use loggable::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: Uuid,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub severity: Severity,
    pub payload: Value,
}

impl DomainEvent {
    pub fn new(name: String, actor_id: Option<Uuid>, subject_id: Option<Uuid>, severity: Severity, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            occurred_at: Utc::now(),
            actor_id,
            subject_id,
            severity,
            payload,
        }
    }
}

pub type EventBus = broadcast::Sender<DomainEvent>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<DomainEvent>) {
    broadcast::channel(1024)
}

/// Publishes `<entity_type>.<action>` for `entity`.
///
/// Fire and forget: a bus without subscribers, or a full one, never fails the
/// mutation that produced the event.
pub fn log_activity<T: Loggable>(event_bus: &EventBus, action: &str, actor_id: Option<Uuid>, entity: &T) {
    let name = format!("{}.{}", T::entity_type(), action);
    let severity = entity.severity_for_action(action);
    let payload = serde_json::to_value(entity).unwrap_or_default();

    let event = DomainEvent::new(name, actor_id, Some(entity.subject_id()), severity, payload);
    tracing::debug!(event = %event.name, subject_id = ?event.subject_id, "audit event published");

    let _ = event_bus.send(event);
}

/// Drains the bus into the `audit_log` table until every sender is dropped.
pub async fn start_audit_listener(mut rx: broadcast::Receiver<DomainEvent>, pool: SqlitePool) {
    tracing::info!("Audit listener started");
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "audit listener lagged; events dropped");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let payload = serde_json::json!({
            "severity": event.severity,
            "data": event.payload,
        });

        let result = sqlx::query(
            "INSERT INTO audit_log (id, event_name, actor_id, subject_id, occurred_at, payload) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(event.id.to_string())
        .bind(&event.name)
        .bind(event.actor_id.map(|u| u.to_string()))
        .bind(event.subject_id.map(|u| u.to_string()))
        .bind(event.occurred_at.to_rfc3339())
        .bind(payload.to_string())
        .execute(&pool)
        .await;

        if let Err(e) = result {
            tracing::error!("Failed to save audit log: {}", e);
        }
    }
    tracing::info!("Audit listener stopped");
}
