use crate::event::{Event, EventKind};
use crate::state::Usage;

/// Input content sent to a generation.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[non_exhaustive]
pub enum InputPart {
    /// Plain text input.
    Text(String),
    /// Structured JSON input.
    Json(serde_json::Value),
}

/// One piece of a finished generation, in production order.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[non_exhaustive]
pub enum OutputPart {
    Text(String),
    Reasoning(String),
    ToolCall {
        call_id: String,
        name: String,
        arguments: serde_json::Value,
    },
    ToolResult {
        call_id: String,
        result: serde_json::Value,
    },
}

/// Single-value result of a completed generation.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize, Default)]
pub struct RunOutput {
    pub parts: Vec<OutputPart>,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}

impl RunOutput {
    /// Concatenates all text parts in order and ignores other parts.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            if let OutputPart::Text(text) = part {
                out.push_str(text);
            }
        }
        out
    }

    pub fn reasoning(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            if let OutputPart::Reasoning(text) = part {
                out.push_str(text);
            }
        }
        out
    }

    /// Folds one event into the output. Consecutive deltas of the same kind
    /// are merged into a single part.
    pub(crate) fn apply(&mut self, event: &Event) {
        match &event.kind {
            EventKind::TextDelta { delta, .. } => match self.parts.last_mut() {
                Some(OutputPart::Text(text)) => text.push_str(delta),
                _ => self.parts.push(OutputPart::Text(delta.clone())),
            },
            EventKind::ThinkingDelta { delta, .. } => match self.parts.last_mut() {
                Some(OutputPart::Reasoning(text)) => text.push_str(delta),
                _ => self.parts.push(OutputPart::Reasoning(delta.clone())),
            },
            EventKind::ToolCall {
                call_id,
                name,
                arguments,
            } => self.parts.push(OutputPart::ToolCall {
                call_id: call_id.clone(),
                name: name.clone(),
                arguments: arguments.clone(),
            }),
            EventKind::ToolResult { call_id, result } => self.parts.push(OutputPart::ToolResult {
                call_id: call_id.clone(),
                result: result.clone(),
            }),
            EventKind::StreamEnd {
                finish_reason,
                usage,
            } => {
                self.finish_reason = Some(finish_reason.clone());
                self.usage = usage.clone();
            }
            EventKind::StreamStart {}
            | EventKind::StepStart {}
            | EventKind::StepFinish {}
            | EventKind::TextStart { .. }
            | EventKind::TextComplete { .. }
            | EventKind::ThinkingStart { .. }
            | EventKind::ThinkingComplete { .. }
            | EventKind::ProviderToolEvent { .. }
            | EventKind::Error { .. }
            | EventKind::Custom { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_concatenates_text_parts_only() {
        let output = RunOutput {
            parts: vec![
                OutputPart::Text("hello".into()),
                OutputPart::Reasoning("thinking".into()),
                OutputPart::Text(" world".into()),
            ],
            ..RunOutput::default()
        };
        assert_eq!(output.text(), "hello world");
        assert_eq!(output.reasoning(), "thinking");
    }

    #[test]
    fn apply_merges_adjacent_deltas_and_records_end() {
        let mut output = RunOutput::default();
        for event in [
            Event::text_delta("a", "Hi"),
            Event::text_delta("a", " there"),
            Event::tool_call("t1", "lookup", serde_json::json!({"q": 1})),
            Event::text_delta("b", "!"),
            Event::stream_end("stop", Some(Usage::new(10, 5))),
        ] {
            output.apply(&event);
        }
        assert_eq!(output.parts.len(), 3);
        assert_eq!(output.text(), "Hi there!");
        assert_eq!(output.finish_reason.as_deref(), Some("stop"));
        assert_eq!(output.usage, Some(Usage::new(10, 5)));
    }
}
