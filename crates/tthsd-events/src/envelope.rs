//! Envelope half of a callback invocation.

use serde::{Deserialize, Serialize};

/// Event types emitted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EventKind {
    /// The session started processing its task list.
    #[serde(rename = "start")]
    Start,
    /// A single task started downloading.
    #[serde(rename = "startOne")]
    StartOne,
    /// Periodic progress report.
    #[serde(rename = "update")]
    Update,
    /// A single task finished (successfully or not).
    #[serde(rename = "endOne")]
    EndOne,
    /// The session finished its task list.
    #[serde(rename = "end")]
    End,
    /// Informational message such as a pause or stop notice.
    #[serde(rename = "msg")]
    Msg,
    /// A task failed.
    #[serde(rename = "err")]
    Err,
    /// Any type this binding does not recognise, including a missing `Type`.
    #[default]
    #[serde(rename = "unknown")]
    #[serde(other)]
    Unknown,
}

impl EventKind {
    /// Wire name of the event type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::StartOne => "startOne",
            Self::Update => "update",
            Self::EndOne => "endOne",
            Self::End => "end",
            Self::Msg => "msg",
            Self::Err => "err",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the event marks the end of the whole session.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::End)
    }
}

/// Event metadata delivered as the first JSON argument of a callback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Event type discriminator.
    #[serde(rename = "Type", default)]
    pub kind: EventKind,
    /// Human readable event label chosen by the engine.
    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Display name of the task, or a session-wide label.
    #[serde(rename = "ShowName", default, skip_serializing_if = "Option::is_none")]
    pub show_name: Option<String>,
    /// Task identifier; empty for session-wide events.
    #[serde(rename = "ID", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// One-based task position within the batch.
    #[serde(rename = "Index", default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
    /// Number of tasks in the batch.
    #[serde(rename = "Total", default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl EventEnvelope {
    /// Task identifier, treating the engine's empty string as absent.
    #[must_use]
    pub fn task_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Display name, treating the engine's empty string as absent.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.show_name.as_deref().filter(|name| !name.is_empty())
    }
}
