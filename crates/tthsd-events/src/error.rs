//! Decode failure primitives.

use std::fmt::{self, Display, Formatter};

use thiserror::Error;

/// Which of the two callback documents a failure concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentSide {
    /// The first argument (event type and metadata).
    Envelope,
    /// The second argument (event-specific data).
    Payload,
}

impl Display for DocumentSide {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Envelope => "envelope",
            Self::Payload => "payload",
        })
    }
}

/// Error produced when a callback document cannot be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The document was not valid JSON (or not valid UTF-8).
    #[error("event document malformed")]
    Malformed {
        /// Document that failed to parse.
        side: DocumentSide,
        /// Parser error detail.
        #[source]
        source: serde_json::Error,
    },
    /// The document parsed but was not a JSON object.
    #[error("event document is not an object")]
    NotAnObject {
        /// Document with the unexpected shape.
        side: DocumentSide,
        /// JSON type that was found instead.
        found: &'static str,
    },
    /// A known envelope field carried a value of the wrong type.
    #[error("event envelope fields invalid")]
    Envelope {
        /// Field-level deserialization error.
        #[source]
        source: serde_json::Error,
    },
}

impl DecodeError {
    /// Document the failure concerns.
    #[must_use]
    pub const fn side(&self) -> DocumentSide {
        match self {
            Self::Malformed { side, .. } | Self::NotAnObject { side, .. } => *side,
            Self::Envelope { .. } => DocumentSide::Envelope,
        }
    }
}

/// Result wrapper for decode operations.
pub type DecodeResult<T> = Result<T, DecodeError>;
