//! Backend-agnostic semantic events emitted during one generation.
//!
//! Events are pure data. Ordering rules (no second text start before a
//! complete, one stream start per stream, paired steps) are enforced by the
//! producer through [`crate::state::StreamState`], not by these types.

use serde::{Deserialize, Serialize};

use crate::errors::RunFailure;
use crate::state::Usage;

/// One semantic occurrence during a generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Opaque event id.
    pub id: String,
    /// Producer-chosen timestamp. [`Event::new`] uses Unix nanoseconds.
    pub timestamp: i64,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Status reported for provider-native tool activity (web search, code
/// interpreter, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderToolStatus {
    Started,
    ResultReceived,
    #[serde(untagged)]
    Other(String),
}

/// Closed set of event payloads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    StreamStart {},
    StepStart {},
    StepFinish {},
    TextStart {
        #[serde(rename = "textId")]
        text_id: String,
    },
    TextDelta {
        #[serde(rename = "textId")]
        text_id: String,
        delta: String,
    },
    TextComplete {
        #[serde(rename = "textId")]
        text_id: String,
    },
    ThinkingStart {
        #[serde(rename = "reasoningId")]
        reasoning_id: String,
    },
    ThinkingDelta {
        #[serde(rename = "reasoningId")]
        reasoning_id: String,
        delta: String,
    },
    ThinkingComplete {
        #[serde(rename = "reasoningId")]
        reasoning_id: String,
    },
    ToolCall {
        #[serde(rename = "callId")]
        call_id: String,
        name: String,
        arguments: serde_json::Value,
    },
    ToolResult {
        #[serde(rename = "callId")]
        call_id: String,
        result: serde_json::Value,
    },
    ProviderToolEvent {
        #[serde(rename = "itemId")]
        item_id: String,
        #[serde(rename = "toolType")]
        tool_type: String,
        status: ProviderToolStatus,
        data: serde_json::Value,
    },
    Error {
        #[serde(rename = "errorType")]
        error_type: String,
        message: String,
        recoverable: bool,
        #[serde(default)]
        metadata: serde_json::Map<String, serde_json::Value>,
    },
    StreamEnd {
        #[serde(rename = "finishReason")]
        finish_reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
    /// Application-defined event without a dedicated wire frame.
    Custom {
        name: String,
        data: serde_json::Value,
    },
}

impl EventKind {
    /// Stable discriminant used for dispatch and for the `data-*` fallback frame.
    pub fn event_type(&self) -> &str {
        match self {
            Self::StreamStart {} => "stream_start",
            Self::StepStart {} => "step_start",
            Self::StepFinish {} => "step_finish",
            Self::TextStart { .. } => "text_start",
            Self::TextDelta { .. } => "text_delta",
            Self::TextComplete { .. } => "text_complete",
            Self::ThinkingStart { .. } => "thinking_start",
            Self::ThinkingDelta { .. } => "thinking_delta",
            Self::ThinkingComplete { .. } => "thinking_complete",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::ProviderToolEvent { .. } => "provider_tool_event",
            Self::Error { .. } => "error",
            Self::StreamEnd { .. } => "stream_end",
            Self::Custom { name, .. } => name,
        }
    }
}

fn now_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

impl Event {
    /// Creates an event with a fresh id and the current time.
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: now_nanos(),
            kind,
        }
    }

    /// Creates an event with explicit id and timestamp.
    pub fn with_meta(id: impl Into<String>, timestamp: i64, kind: EventKind) -> Self {
        Self {
            id: id.into(),
            timestamp,
            kind,
        }
    }

    pub fn event_type(&self) -> &str {
        self.kind.event_type()
    }

    pub fn stream_start() -> Self {
        Self::new(EventKind::StreamStart {})
    }

    pub fn step_start() -> Self {
        Self::new(EventKind::StepStart {})
    }

    pub fn step_finish() -> Self {
        Self::new(EventKind::StepFinish {})
    }

    pub fn text_start(text_id: impl Into<String>) -> Self {
        Self::new(EventKind::TextStart {
            text_id: text_id.into(),
        })
    }

    pub fn text_delta(text_id: impl Into<String>, delta: impl Into<String>) -> Self {
        Self::new(EventKind::TextDelta {
            text_id: text_id.into(),
            delta: delta.into(),
        })
    }

    pub fn text_complete(text_id: impl Into<String>) -> Self {
        Self::new(EventKind::TextComplete {
            text_id: text_id.into(),
        })
    }

    pub fn thinking_start(reasoning_id: impl Into<String>) -> Self {
        Self::new(EventKind::ThinkingStart {
            reasoning_id: reasoning_id.into(),
        })
    }

    pub fn thinking_delta(reasoning_id: impl Into<String>, delta: impl Into<String>) -> Self {
        Self::new(EventKind::ThinkingDelta {
            reasoning_id: reasoning_id.into(),
            delta: delta.into(),
        })
    }

    pub fn thinking_complete(reasoning_id: impl Into<String>) -> Self {
        Self::new(EventKind::ThinkingComplete {
            reasoning_id: reasoning_id.into(),
        })
    }

    pub fn tool_call(
        call_id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self::new(EventKind::ToolCall {
            call_id: call_id.into(),
            name: name.into(),
            arguments,
        })
    }

    pub fn tool_result(call_id: impl Into<String>, result: serde_json::Value) -> Self {
        Self::new(EventKind::ToolResult {
            call_id: call_id.into(),
            result,
        })
    }

    pub fn provider_tool(
        item_id: impl Into<String>,
        tool_type: impl Into<String>,
        status: ProviderToolStatus,
        data: serde_json::Value,
    ) -> Self {
        Self::new(EventKind::ProviderToolEvent {
            item_id: item_id.into(),
            tool_type: tool_type.into(),
            status,
            data,
        })
    }

    pub fn stream_end(finish_reason: impl Into<String>, usage: Option<Usage>) -> Self {
        Self::new(EventKind::StreamEnd {
            finish_reason: finish_reason.into(),
            usage,
        })
    }

    pub fn custom(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self::new(EventKind::Custom {
            name: name.into(),
            data,
        })
    }

    /// Builds the non-recoverable error event reported for a terminal failure.
    pub fn from_failure(failure: &RunFailure) -> Self {
        Self::new(EventKind::Error {
            error_type: failure.error_type().to_string(),
            message: failure.to_string(),
            recoverable: false,
            metadata: failure.metadata(),
        })
    }

    /// Returns true for events after which a producer emits nothing else.
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, EventKind::StreamEnd { .. })
    }
}
