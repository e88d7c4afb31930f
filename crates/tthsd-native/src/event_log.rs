//! Ready-made handler writing every engine event to the `tracing` log.

use tracing::{debug, error, info, warn};
use tthsd_events::{DecodedEvent, EventPayload};

use crate::trampoline::EventHandler;

/// Logs each event with the task's display name and id.
///
/// Progress goes to `debug`, session and task boundaries and messages to `info`,
/// engine errors to `error` and unrecognised events to `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventLogger;

impl EventLogger {
    /// Create the logger.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EventHandler for EventLogger {
    fn handle(&self, event: DecodedEvent) {
        let task = event.envelope.display_name().unwrap_or_default();
        let id = event.envelope.task_id().unwrap_or_default();
        match &event.payload {
            EventPayload::Started => info!(task, id, "download session started"),
            EventPayload::TaskStarted(marker) => info!(
                task,
                id,
                url = marker.url.as_deref().unwrap_or_default(),
                index = marker.index.unwrap_or_default(),
                total = marker.total.unwrap_or_default(),
                "task started"
            ),
            EventPayload::Progress(progress) => {
                // Engines report unknown sizes as zero; nothing useful to print then.
                if let Some(percent) = progress.percent_complete() {
                    debug!(
                        task,
                        id,
                        downloaded = progress.downloaded_bytes.unwrap_or_default(),
                        total = progress.total_bytes.unwrap_or_default(),
                        percent,
                        "task progress"
                    );
                }
            }
            EventPayload::TaskFinished(marker) => info!(
                task,
                id,
                url = marker.url.as_deref().unwrap_or_default(),
                index = marker.index.unwrap_or_default(),
                total = marker.total.unwrap_or_default(),
                "task finished"
            ),
            EventPayload::Finished => info!(task, id, "all downloads finished"),
            EventPayload::Message { text } => info!(task, id, text = %text, "engine message"),
            EventPayload::Error { message } => {
                error!(task, id, error = %message, "engine reported an error");
            }
            EventPayload::Unknown(fields) => warn!(
                task,
                id,
                kind = event.envelope.name.as_deref().unwrap_or_default(),
                fields = %serde_json::Value::Object(fields.clone()),
                "unrecognised engine event"
            ),
        }
    }
}
