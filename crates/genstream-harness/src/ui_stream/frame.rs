use bytes::Bytes;
use serde::Serialize;

use crate::state::Usage;

/// Terminal frame closing every UI message stream.
pub const DONE_FRAME: &[u8] = b"data: [DONE]\n\n";

/// One wire frame of the UI message stream protocol.
///
/// Field names and casing are part of the client contract.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiFrame {
    Start {
        #[serde(rename = "messageId")]
        message_id: String,
    },
    StartStep,
    TextStart {
        id: String,
    },
    TextDelta {
        id: String,
        delta: String,
    },
    TextEnd {
        id: String,
    },
    ReasoningStart {
        id: String,
    },
    ReasoningDelta {
        id: String,
        delta: String,
    },
    ReasoningEnd {
        id: String,
    },
    ToolInputAvailable {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        input: serde_json::Value,
    },
    ToolOutputAvailable {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        output: serde_json::Value,
    },
    FinishStep,
    Finish {
        #[serde(rename = "messageMetadata")]
        message_metadata: MessageMetadata,
    },
    Error {
        #[serde(rename = "errorText")]
        error_text: String,
    },
    /// `data-<slug>` frame; its type tag is dynamic, see [`UiFrame::to_json`].
    #[serde(skip_serializing)]
    Data {
        slug: String,
        data: serde_json::Value,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MessageMetadata {
    #[serde(rename = "finishReason")]
    pub finish_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<FrameUsage>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameUsage {
    #[serde(rename = "promptTokens")]
    pub prompt_tokens: u64,
    #[serde(rename = "completionTokens")]
    pub completion_tokens: u64,
}

impl From<&Usage> for FrameUsage {
    fn from(usage: &Usage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        }
    }
}

#[derive(Serialize)]
struct DataFrameRef<'a> {
    #[serde(rename = "type")]
    kind: String,
    data: &'a serde_json::Value,
}

impl UiFrame {
    /// Wire `type` tag of this frame.
    pub fn frame_type(&self) -> String {
        let tag = match self {
            Self::Start { .. } => "start",
            Self::StartStep => "start-step",
            Self::TextStart { .. } => "text-start",
            Self::TextDelta { .. } => "text-delta",
            Self::TextEnd { .. } => "text-end",
            Self::ReasoningStart { .. } => "reasoning-start",
            Self::ReasoningDelta { .. } => "reasoning-delta",
            Self::ReasoningEnd { .. } => "reasoning-end",
            Self::ToolInputAvailable { .. } => "tool-input-available",
            Self::ToolOutputAvailable { .. } => "tool-output-available",
            Self::FinishStep => "finish-step",
            Self::Finish { .. } => "finish",
            Self::Error { .. } => "error",
            Self::Data { slug, .. } => return format!("data-{slug}"),
        };
        tag.to_string()
    }

    /// Compact JSON payload of this frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Data { data, .. } => serde_json::to_string(&DataFrameRef {
                kind: self.frame_type(),
                data,
            }),
            _ => serde_json::to_string(self),
        }
    }

    /// `data: <json>\n\n` bytes ready for the transport.
    pub fn encode(&self) -> Result<Bytes, serde_json::Error> {
        let json = self.to_json()?;
        let mut out = String::with_capacity(json.len() + 8);
        out.push_str("data: ");
        out.push_str(&json);
        out.push_str("\n\n");
        Ok(Bytes::from(out))
    }
}
