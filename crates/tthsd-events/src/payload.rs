//! Payload half of a callback invocation.
//!
//! # Design
//! - The payload shape is selected by the envelope's event kind.
//! - Fields are read leniently: unknown keys are ignored and missing ones stay `None`,
//!   because engine releases disagree on field names.

use serde_json::{Map, Value};

use crate::envelope::EventKind;

/// Progress counters reported by `update` events.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProgressSnapshot {
    /// Bytes written so far.
    pub downloaded_bytes: Option<u64>,
    /// Bytes expected in total, when the engine knows it.
    pub total_bytes: Option<u64>,
    /// Current throughput in megabytes per second.
    pub speed_mbps: Option<f64>,
}

impl ProgressSnapshot {
    /// Fraction of the download completed, in `0.0..=1.0` for well-behaved engines.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn ratio(&self) -> Option<f64> {
        match (self.downloaded_bytes, self.total_bytes) {
            (Some(downloaded), Some(total)) if total > 0 => {
                Some(downloaded as f64 / total as f64)
            }
            _ => None,
        }
    }

    /// Completion percentage, when both counters are known.
    #[must_use]
    pub fn percent_complete(&self) -> Option<f64> {
        self.ratio().map(|ratio| ratio * 100.0)
    }

    fn from_fields(fields: &Map<String, Value>) -> Self {
        // Newer engines report the running byte counter as `total_bytes` and mirror it
        // into `Downloaded`; `total_bytes` only means the expected size when an explicit
        // `downloaded_bytes` counter sits next to it.
        let explicit_downloaded = read_u64(fields, "downloaded_bytes");
        let legacy_total = read_u64(fields, "total_bytes");
        let downloaded_bytes = read_u64(fields, "Downloaded")
            .or(explicit_downloaded)
            .or_else(|| legacy_total.filter(|_| explicit_downloaded.is_none()));
        let total_bytes = read_u64(fields, "Total")
            .or_else(|| legacy_total.filter(|_| explicit_downloaded.is_some()));
        Self {
            downloaded_bytes,
            total_bytes,
            speed_mbps: read_f64(fields, "current_speed_mbps"),
        }
    }
}

/// Task boundary data carried by `startOne` and `endOne` events.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskMarker {
    /// Source URL of the task.
    pub url: Option<String>,
    /// Destination path of the task.
    pub save_path: Option<String>,
    /// Display name of the task.
    pub show_name: Option<String>,
    /// One-based position of the task in the batch.
    pub index: Option<u64>,
    /// Number of tasks in the batch.
    pub total: Option<u64>,
}

impl TaskMarker {
    fn from_fields(fields: &Map<String, Value>) -> Self {
        Self {
            url: read_string(fields, "URL"),
            save_path: read_string(fields, "SavePath"),
            show_name: read_string(fields, "ShowName"),
            index: read_u64(fields, "Index"),
            total: read_u64(fields, "Total"),
        }
    }
}

/// Event-specific data, keyed by the envelope's event kind.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// `start`: the session began processing.
    Started,
    /// `startOne`: a task began downloading.
    TaskStarted(TaskMarker),
    /// `update`: progress counters.
    Progress(ProgressSnapshot),
    /// `endOne`: a task finished.
    TaskFinished(TaskMarker),
    /// `end`: every task finished.
    Finished,
    /// `msg`: informational text.
    Message {
        /// Message text; empty when the engine sent none.
        text: String,
    },
    /// `err`: a task failure.
    Error {
        /// Error description; empty when the engine sent none.
        message: String,
    },
    /// Event kind this binding does not model; the raw fields are kept.
    Unknown(Map<String, Value>),
}

impl EventPayload {
    /// Project the raw payload fields onto the variant selected by `kind`.
    #[must_use]
    pub fn from_fields(kind: EventKind, fields: Map<String, Value>) -> Self {
        match kind {
            EventKind::Start => Self::Started,
            EventKind::StartOne => Self::TaskStarted(TaskMarker::from_fields(&fields)),
            EventKind::Update => Self::Progress(ProgressSnapshot::from_fields(&fields)),
            EventKind::EndOne => Self::TaskFinished(TaskMarker::from_fields(&fields)),
            EventKind::End => Self::Finished,
            EventKind::Msg => Self::Message {
                text: read_string(&fields, "Text").unwrap_or_default(),
            },
            EventKind::Err => Self::Error {
                message: read_string(&fields, "Error").unwrap_or_default(),
            },
            EventKind::Unknown => Self::Unknown(fields),
        }
    }

    /// Progress counters when this is an `update` payload.
    #[must_use]
    pub const fn progress(&self) -> Option<&ProgressSnapshot> {
        match self {
            Self::Progress(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}

fn read_string(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_owned)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn read_u64(fields: &Map<String, Value>, key: &str) -> Option<u64> {
    let value = fields.get(key)?;
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|number| number.is_finite() && *number >= 0.0)
            .map(|number| number as u64)
    })
}

fn read_f64(fields: &Map<String, Value>, key: &str) -> Option<f64> {
    fields.get(key).and_then(Value::as_f64)
}
