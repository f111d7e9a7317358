use std::collections::HashSet;

use serde_json::{Value, json};

use super::frame::{FrameUsage, MessageMetadata, UiFrame};
use crate::event::{Event, EventKind, ProviderToolStatus};

/// Converts events into frames for one streaming response.
///
/// Holds the ids of tool calls whose input frame was already emitted, so a
/// result without a matching call is dropped instead of producing an orphan
/// output frame. Create one per response.
#[derive(Debug, Default)]
pub struct FrameTranslator {
    message_id: Option<String>,
    started_tool_calls: HashSet<String>,
}

impl FrameTranslator {
    /// `message_id` is reported in the `start` frame; the stream start event
    /// id is used when none is configured.
    pub fn new(message_id: Option<String>) -> Self {
        Self {
            message_id,
            started_tool_calls: HashSet::new(),
        }
    }

    pub fn is_tool_call_started(&self, id: &str) -> bool {
        self.started_tool_calls.contains(id)
    }

    /// Returns `Ok(None)` for events that are deliberately suppressed.
    pub fn translate(&mut self, event: &Event) -> Result<Option<UiFrame>, serde_json::Error> {
        let frame = match &event.kind {
            EventKind::StreamStart {} => UiFrame::Start {
                message_id: self.message_id.clone().unwrap_or_else(|| event.id.clone()),
            },
            EventKind::StepStart {} => UiFrame::StartStep,
            EventKind::TextStart { text_id } => UiFrame::TextStart {
                id: text_id.clone(),
            },
            EventKind::TextDelta { text_id, delta } => UiFrame::TextDelta {
                id: text_id.clone(),
                delta: delta.clone(),
            },
            EventKind::TextComplete { text_id } => UiFrame::TextEnd {
                id: text_id.clone(),
            },
            EventKind::ThinkingStart { reasoning_id } => UiFrame::ReasoningStart {
                id: reasoning_id.clone(),
            },
            EventKind::ThinkingDelta {
                reasoning_id,
                delta,
            } => UiFrame::ReasoningDelta {
                id: reasoning_id.clone(),
                delta: delta.clone(),
            },
            EventKind::ThinkingComplete { reasoning_id } => UiFrame::ReasoningEnd {
                id: reasoning_id.clone(),
            },
            EventKind::ToolCall {
                call_id,
                name,
                arguments,
            } => {
                self.started_tool_calls.insert(call_id.clone());
                UiFrame::ToolInputAvailable {
                    tool_call_id: call_id.clone(),
                    tool_name: name.clone(),
                    input: arguments.clone(),
                }
            }
            EventKind::ToolResult { call_id, result } => {
                if !self.started_tool_calls.contains(call_id) {
                    return Ok(None);
                }
                UiFrame::ToolOutputAvailable {
                    tool_call_id: call_id.clone(),
                    output: result.clone(),
                }
            }
            EventKind::ProviderToolEvent {
                item_id,
                tool_type,
                status,
                data,
            } => match status {
                ProviderToolStatus::Started => {
                    self.started_tool_calls.insert(item_id.clone());
                    UiFrame::ToolInputAvailable {
                        tool_call_id: item_id.clone(),
                        tool_name: tool_type.clone(),
                        input: data.get("input").cloned().unwrap_or_else(|| json!({})),
                    }
                }
                ProviderToolStatus::ResultReceived => {
                    if !self.started_tool_calls.contains(item_id) {
                        return Ok(None);
                    }
                    let content = data.get("content").unwrap_or(data);
                    UiFrame::ToolOutputAvailable {
                        tool_call_id: item_id.clone(),
                        output: Value::String(serde_json::to_string(content)?),
                    }
                }
                ProviderToolStatus::Other(_) => return Ok(None),
            },
            EventKind::StepFinish {} => UiFrame::FinishStep,
            EventKind::StreamEnd {
                finish_reason,
                usage,
            } => UiFrame::Finish {
                message_metadata: MessageMetadata {
                    finish_reason: finish_reason.clone(),
                    usage: usage.as_ref().map(FrameUsage::from),
                },
            },
            EventKind::Error { message, .. } => UiFrame::Error {
                error_text: message.clone(),
            },
            EventKind::Custom { .. } => UiFrame::Data {
                slug: slug(event.event_type()),
                data: serde_json::to_value(event)?,
            },
        };
        Ok(Some(frame))
    }
}

/// Lowercase kebab-case form of an event type (`citationBatch`,
/// `citation_batch` and `Citation Batch` all become `citation-batch`).
pub fn slug(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 4);
    let mut prev_lower_or_digit = false;
    for ch in value.chars() {
        if ch.is_alphanumeric() {
            if ch.is_uppercase() && prev_lower_or_digit && !out.ends_with('-') {
                out.push('-');
            }
            out.extend(ch.to_lowercase());
            prev_lower_or_digit = ch.is_lowercase() || ch.is_numeric();
        } else {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            prev_lower_or_digit = false;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}
