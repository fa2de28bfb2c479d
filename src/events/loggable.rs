use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity levels for audit records.
/// Controls retention policies and log filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Permission-affecting changes: long-term retention, never auto-delete
    Critical,
    /// Default retention
    #[default]
    Important,
    /// Aggressively trimmed
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

/// Entities whose mutations are recorded in the audit log.
pub trait Loggable: Serialize + Send + Sync {
    /// Prefix of the event name, e.g. "assignment" in "assignment.created"
    fn entity_type() -> &'static str;

    /// The subject the event is about (the affected user, usually)
    fn subject_id(&self) -> Uuid;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    /// Removals are always critical; everything else uses the entity's severity.
    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "removed" | "deleted" => Severity::Critical,
            _ => self.severity(),
        }
    }
}
