//! Common error types used across all ChartGPU crates
//! Provides consistent error handling and reporting

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Base error type for all ChartGPU operations
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", content = "details")]
pub enum ChartError {
    /// No adapter, device, or surface could be obtained.
    #[error("graphics initialization failed: {message}")]
    GraphicsInitFailed { message: String },

    /// The device was lost. Terminal for the owning chart instance.
    #[error("device lost ({reason}): {message}")]
    DeviceLost {
        reason: DeviceLostKind,
        message: String,
    },

    /// Validation or submission failure in a single frame.
    #[error("render failed: {message}")]
    Render { message: String },

    /// Invalid series index, stride/count mismatch, or non-finite values.
    #[error("data error: {message}")]
    Data { message: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Operation on a disposed chart instance.
    #[error("chart instance is disposed")]
    Disposed,

    /// A correlated request was not answered within the deadline.
    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// Transport failure on the worker bridge.
    #[error("bridge communication failed: {message}")]
    Communication { message: String },
}

impl ChartError {
    pub fn data(message: impl Into<String>) -> Self {
        ChartError::Data {
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        ChartError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn render(message: impl Into<String>) -> Self {
        ChartError::Render {
            message: message.into(),
        }
    }

    /// Whether the error is terminal for the chart instance.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChartError::DeviceLost { .. } | ChartError::Disposed)
    }
}

/// Result type alias for ChartGPU operations
pub type ChartResult<T> = Result<T, ChartError>;

/// Why a device was lost, as forwarded by the graphics context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceLostKind {
    /// `destroy()` was called on the device.
    Destroyed,
    /// The driver reported a loss outside our control.
    Unknown,
}

impl std::fmt::Display for DeviceLostKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceLostKind::Destroyed => write!(f, "destroyed"),
            DeviceLostKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Classification of uncaptured device errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GpuErrorClass {
    Validation,
    OutOfMemory,
    Other,
}

/// Error report surfaced through the `error` callback / outbound message.
///
/// The coordinator never propagates an error across a frame boundary;
/// every failure becomes one of these with an operation tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub error: ChartError,
    /// The public operation that failed, e.g. `"render"` or `"append_data"`.
    pub operation: String,
    /// Correlation id when the failure answers a bridge request.
    pub message_id: Option<u64>,
}

impl ErrorEvent {
    pub fn new(error: ChartError, operation: impl Into<String>) -> Self {
        Self {
            error,
            operation: operation.into(),
            message_id: None,
        }
    }

    pub fn with_message_id(mut self, message_id: u64) -> Self {
        self.message_id = Some(message_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_serialization_is_tagged() {
        let error = ChartError::Data {
            message: "stride mismatch".to_string(),
        };
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("\"code\":\"Data\""));
        assert!(json.contains("stride mismatch"));

        let back: ChartError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, error);
    }

    #[test]
    fn device_lost_is_terminal() {
        let lost = ChartError::DeviceLost {
            reason: DeviceLostKind::Unknown,
            message: "gone".into(),
        };
        assert!(lost.is_terminal());
        assert!(ChartError::Disposed.is_terminal());
        assert!(!ChartError::render("oops").is_terminal());
    }

    #[test]
    fn error_event_carries_operation_tag() {
        let event = ErrorEvent::new(ChartError::Disposed, "append_data").with_message_id(7);
        assert_eq!(event.operation, "append_data");
        assert_eq!(event.message_id, Some(7));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("append_data"));
    }
}
