use serde_json::Value;

use crate::errors::ProviderError;
use crate::event::{Event, ProviderToolStatus};
use crate::model::ProviderId;
use crate::state::{StreamState, Usage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental `text/event-stream` decoder tolerant of arbitrary chunk
/// boundaries.
#[derive(Default)]
pub(crate) struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some((idx, delim_len)) = find_frame_delimiter(&self.buf) {
            let frame = parse_sse_frame(&self.buf[..idx]);
            self.buf.drain(..idx + delim_len);
            frames.extend(frame);
        }
        frames
    }
}

fn find_frame_delimiter(buf: &[u8]) -> Option<(usize, usize)> {
    (0..buf.len()).find_map(|i| {
        let rest = &buf[i..];
        if rest.starts_with(b"\n\n") {
            Some((i, 2))
        } else if rest.starts_with(b"\r\n\r\n") {
            Some((i, 4))
        } else {
            None
        }
    })
}

fn parse_sse_frame(bytes: &[u8]) -> Option<SseFrame> {
    let text = String::from_utf8_lossy(bytes);
    let mut event = None;
    let mut data_lines = Vec::new();
    for line in text.split('\n').map(|l| l.trim_end_matches('\r')) {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim_start().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.trim_start());
        }
    }
    if event.is_none() && data_lines.is_empty() {
        return None;
    }
    Some(SseFrame {
        event,
        data: data_lines.join("\n"),
    })
}

/// Maps Responses API stream frames to normalized events.
///
/// Owns the [`StreamState`] for one HTTP stream, so start/complete pairs are
/// balanced and the stream start is emitted once even across several
/// responses.
pub(crate) struct ResponsesEventMapper {
    provider: ProviderId,
    state: StreamState,
    saw_tool_call: bool,
    finished: bool,
}

impl ResponsesEventMapper {
    pub fn new(provider: ProviderId) -> Self {
        Self {
            provider,
            state: StreamState::new(),
            saw_tool_call: false,
            finished: false,
        }
    }

    /// Whether a `StreamEnd` has been produced.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn map_frame(&mut self, frame: &SseFrame) -> Result<Vec<Event>, ProviderError> {
        let data = frame.data.trim();
        if data.is_empty() || data == "[DONE]" {
            return Ok(Vec::new());
        }
        let value: Value = serde_json::from_str(data).map_err(|e| {
            ProviderError::protocol(self.provider.clone(), format!("invalid SSE JSON frame: {e}"))
        })?;
        self.map_json(&value)
    }

    pub fn map_json(&mut self, value: &Value) -> Result<Vec<Event>, ProviderError> {
        let Some(event_type) = value.get("type").and_then(Value::as_str) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        match event_type {
            "response.created" => {
                let response = value.get("response").unwrap_or(value);
                if self.state.has_stream_started() {
                    self.close_text(&mut out);
                    self.close_thinking(&mut out);
                    self.state.reset();
                    self.saw_tool_call = false;
                }
                if let Some(model) = str_field(response, "model") {
                    self.state.with_model(model);
                }
                self.open_step(&mut out);
            }
            "response.output_text.delta" => {
                let delta = str_field(value, "delta").unwrap_or_default();
                self.open_text(value, &mut out);
                self.state.append_text(delta);
                out.push(Event::text_delta(self.state.message_id(), delta));
            }
            "response.output_text.done" => {
                if !self.state.has_text_started()
                    && let Some(text) = str_field(value, "text").filter(|t| !t.is_empty())
                {
                    self.open_text(value, &mut out);
                    self.state.append_text(text);
                    out.push(Event::text_delta(self.state.message_id(), text));
                }
                self.close_text(&mut out);
            }
            "response.reasoning_summary_text.delta" => {
                let delta = str_field(value, "delta").unwrap_or_default();
                self.open_thinking(value, &mut out);
                self.state.append_thinking(delta);
                out.push(Event::thinking_delta(self.state.reasoning_id(), delta));
            }
            "response.reasoning_summary_text.done" => self.close_thinking(&mut out),
            "response.output_item.added" => {
                if let Some(item) = value.get("item")
                    && str_field(item, "type") == Some("web_search_call")
                {
                    self.open_step(&mut out);
                    out.push(Event::provider_tool(
                        str_field(item, "id").unwrap_or_default(),
                        "web_search",
                        ProviderToolStatus::Started,
                        item.clone(),
                    ));
                }
            }
            "response.output_item.done" => {
                let Some(item) = value.get("item") else {
                    return Ok(out);
                };
                match str_field(item, "type") {
                    Some("function_call") => {
                        self.open_step(&mut out);
                        self.saw_tool_call = true;
                        out.push(Event::tool_call(
                            str_field(item, "call_id")
                                .or_else(|| str_field(item, "id"))
                                .unwrap_or_default(),
                            str_field(item, "name").unwrap_or_default(),
                            parse_arguments(item.get("arguments")),
                        ));
                    }
                    Some("web_search_call") => {
                        self.open_step(&mut out);
                        out.push(Event::provider_tool(
                            str_field(item, "id").unwrap_or_default(),
                            "web_search",
                            ProviderToolStatus::ResultReceived,
                            item.clone(),
                        ));
                    }
                    _ => {}
                }
            }
            "response.completed" | "response.incomplete" => {
                let response = value.get("response").unwrap_or(value);
                if let Some(usage) = response.get("usage").and_then(parse_usage) {
                    self.state.add_usage(usage);
                }
                self.close_text(&mut out);
                self.close_thinking(&mut out);
                if self.state.is_step_open() {
                    self.state.mark_step_finished();
                    out.push(Event::step_finish());
                }
                let finish_reason = self.finish_reason(event_type, response);
                out.push(Event::stream_end(finish_reason, self.state.usage().cloned()));
                self.finished = true;
            }
            "response.failed" | "error" => {
                let message = value
                    .pointer("/response/error/message")
                    .or_else(|| value.pointer("/error/message"))
                    .or_else(|| value.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("OpenAI stream error");
                return Err(ProviderError::provider(self.provider.clone(), message, None));
            }
            _ => {}
        }
        Ok(out)
    }

    fn open_step(&mut self, out: &mut Vec<Event>) {
        if self.state.should_emit_stream_start() {
            self.state.mark_stream_started();
            out.push(Event::stream_start());
        }
        if self.state.should_emit_step_start() {
            self.state.mark_step_started();
            out.push(Event::step_start());
        }
    }

    /// A delta for a different output item closes the current text part.
    fn open_text(&mut self, value: &Value, out: &mut Vec<Event>) {
        self.open_step(out);
        if self.state.has_text_started()
            && str_field(value, "item_id").is_some_and(|id| id != self.state.message_id())
        {
            self.close_text(out);
        }
        if self.state.should_emit_text_start() {
            let id = str_field(value, "item_id").unwrap_or("text");
            self.state.with_message_id(id).mark_text_started();
            out.push(Event::text_start(id));
        }
    }

    fn close_text(&mut self, out: &mut Vec<Event>) {
        if self.state.has_text_started() {
            out.push(Event::text_complete(self.state.message_id()));
            self.state.mark_text_completed();
        }
    }

    fn open_thinking(&mut self, value: &Value, out: &mut Vec<Event>) {
        self.open_step(out);
        if self.state.has_thinking_started()
            && str_field(value, "item_id").is_some_and(|id| id != self.state.reasoning_id())
        {
            self.close_thinking(out);
        }
        if self.state.should_emit_thinking_start() {
            let id = str_field(value, "item_id").unwrap_or("reasoning");
            self.state.with_reasoning_id(id).mark_thinking_started();
            out.push(Event::thinking_start(id));
        }
    }

    fn close_thinking(&mut self, out: &mut Vec<Event>) {
        if self.state.has_thinking_started() {
            out.push(Event::thinking_complete(self.state.reasoning_id()));
            self.state.mark_thinking_completed();
        }
    }

    fn finish_reason(&self, event_type: &str, response: &Value) -> &'static str {
        if event_type == "response.incomplete" {
            return match response
                .pointer("/incomplete_details/reason")
                .and_then(Value::as_str)
            {
                Some("max_output_tokens") => "length",
                Some("content_filter") => "content-filter",
                _ => "other",
            };
        }
        if self.saw_tool_call {
            "tool-calls"
        } else {
            "stop"
        }
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// Function call arguments arrive as a JSON-encoded string.
fn parse_arguments(raw: Option<&Value>) -> Value {
    match raw {
        Some(Value::String(text)) => {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))
        }
        Some(other) => other.clone(),
        None => Value::Object(Default::default()),
    }
}

fn parse_usage(value: &Value) -> Option<Usage> {
    let prompt = value.get("input_tokens").and_then(Value::as_u64)?;
    let completion = value
        .get("output_tokens")
        .and_then(Value::as_u64)
        .unwrap_or_default();
    let mut usage = Usage::new(prompt, completion);
    if let Some(cached) = value
        .pointer("/input_tokens_details/cached_tokens")
        .and_then(Value::as_u64)
    {
        usage = usage.cache_read_input_tokens(cached);
    }
    if let Some(reasoning) = value
        .pointer("/output_tokens_details/reasoning_tokens")
        .and_then(Value::as_u64)
    {
        usage = usage.thought_tokens(reasoning);
    }
    Some(usage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use serde_json::json;

    fn mapper() -> ResponsesEventMapper {
        ResponsesEventMapper::new(ProviderId::new("openai"))
    }

    fn types(events: &[Event]) -> Vec<&str> {
        events.iter().map(Event::event_type).collect()
    }

    fn map_all(mapper: &mut ResponsesEventMapper, frames: &[Value]) -> Vec<Event> {
        frames
            .iter()
            .flat_map(|frame| mapper.map_json(frame).expect("map"))
            .collect()
    }

    #[test]
    fn sse_decoder_handles_partial_chunk_boundaries() {
        let mut decoder = SseDecoder::default();
        let part1 =
            b"event: message\ndata: {\"type\":\"response.output_text.delta\",\"delta\":\"hel";
        let part2 = b"lo\"}\r\n\r\n: keep-alive\n\n";
        assert!(decoder.push_chunk(part1).is_empty());
        let frames = decoder.push_chunk(part2);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("message"));
        assert!(frames[0].data.ends_with("\"hello\"}"));
    }

    #[test]
    fn text_generation_produces_balanced_lifecycle() {
        let mut mapper = mapper();
        let events = map_all(
            &mut mapper,
            &[
                json!({"type": "response.created", "response": {"id": "resp_1", "model": "gpt-5-nano"}}),
                json!({"type": "response.output_text.delta", "item_id": "msg_1", "delta": "Hel"}),
                json!({"type": "response.output_text.delta", "item_id": "msg_1", "delta": "lo"}),
                json!({"type": "response.output_text.done", "item_id": "msg_1", "text": "Hello"}),
                json!({"type": "response.completed", "response": {
                    "status": "completed",
                    "usage": {"input_tokens": 12, "output_tokens": 3,
                              "input_tokens_details": {"cached_tokens": 4}}
                }}),
            ],
        );
        assert_eq!(
            types(&events),
            vec![
                "stream_start",
                "step_start",
                "text_start",
                "text_delta",
                "text_delta",
                "text_complete",
                "step_finish",
                "stream_end"
            ]
        );
        assert!(matches!(&events[2].kind, EventKind::TextStart { text_id } if text_id == "msg_1"));
        let EventKind::StreamEnd { finish_reason, usage } = &events[7].kind else {
            panic!("expected stream end");
        };
        assert_eq!(finish_reason, "stop");
        assert_eq!(
            usage.as_ref(),
            Some(&Usage::new(12, 3).cache_read_input_tokens(4))
        );
        assert!(mapper.is_finished());
    }

    #[test]
    fn completion_closes_open_text_and_thinking() {
        let mut mapper = mapper();
        let events = map_all(
            &mut mapper,
            &[
                json!({"type": "response.created", "response": {}}),
                json!({"type": "response.reasoning_summary_text.delta", "item_id": "rs_1", "delta": "plan"}),
                json!({"type": "response.output_text.delta", "item_id": "msg_1", "delta": "answer"}),
                json!({"type": "response.incomplete", "response": {"incomplete_details": {"reason": "max_output_tokens"}}}),
            ],
        );
        assert_eq!(
            types(&events),
            vec![
                "stream_start",
                "step_start",
                "thinking_start",
                "thinking_delta",
                "text_start",
                "text_delta",
                "text_complete",
                "thinking_complete",
                "step_finish",
                "stream_end"
            ]
        );
        assert!(matches!(
            &events[9].kind,
            EventKind::StreamEnd { finish_reason, usage: None } if finish_reason == "length"
        ));
    }

    #[test]
    fn function_call_and_web_search_items_map_to_tool_events() {
        let mut mapper = mapper();
        let events = map_all(
            &mut mapper,
            &[
                json!({"type": "response.created", "response": {}}),
                json!({"type": "response.output_item.added", "item": {"type": "web_search_call", "id": "ws_1"}}),
                json!({"type": "response.output_item.done", "item": {"type": "web_search_call", "id": "ws_1", "status": "completed"}}),
                json!({"type": "response.output_item.done", "item": {
                    "type": "function_call", "call_id": "call_1", "name": "get_weather",
                    "arguments": "{\"city\":\"Paris\"}"
                }}),
                json!({"type": "response.completed", "response": {}}),
            ],
        );
        assert!(matches!(
            &events[2].kind,
            EventKind::ProviderToolEvent { item_id, status: ProviderToolStatus::Started, .. } if item_id == "ws_1"
        ));
        assert!(matches!(
            &events[3].kind,
            EventKind::ProviderToolEvent { status: ProviderToolStatus::ResultReceived, .. }
        ));
        let EventKind::ToolCall { call_id, name, arguments } = &events[4].kind else {
            panic!("expected tool call");
        };
        assert_eq!(call_id, "call_1");
        assert_eq!(name, "get_weather");
        assert_eq!(arguments, &json!({"city": "Paris"}));
        assert!(matches!(
            &events[6].kind,
            EventKind::StreamEnd { finish_reason, .. } if finish_reason == "tool-calls"
        ));
    }

    #[test]
    fn new_output_item_switches_text_and_reasoning_parts() {
        let mut mapper = mapper();
        let events = map_all(
            &mut mapper,
            &[
                json!({"type": "response.created", "response": {}}),
                json!({"type": "response.reasoning_summary_text.delta", "item_id": "rs_1", "delta": "a"}),
                json!({"type": "response.reasoning_summary_text.delta", "item_id": "rs_2", "delta": "b"}),
                json!({"type": "response.output_text.delta", "item_id": "msg_1", "delta": "x"}),
                json!({"type": "response.output_text.delta", "item_id": "msg_1", "delta": "y"}),
                json!({"type": "response.output_text.delta", "item_id": "msg_2", "delta": "z"}),
            ],
        );
        assert_eq!(
            &types(&events)[2..],
            &[
                "thinking_start",
                "thinking_delta",
                "thinking_complete",
                "thinking_start",
                "thinking_delta",
                "text_start",
                "text_delta",
                "text_delta",
                "text_complete",
                "text_start",
                "text_delta"
            ]
        );
        assert!(matches!(&events[10].kind, EventKind::TextComplete { text_id } if text_id == "msg_1"));
        assert!(matches!(
            &events[12].kind,
            EventKind::TextDelta { text_id, delta } if text_id == "msg_2" && delta == "z"
        ));
        assert!(matches!(&events[5].kind, EventKind::ThinkingStart { reasoning_id } if reasoning_id == "rs_2"));
    }

    #[test]
    fn second_response_resets_turn_but_not_stream_start() {
        let mut mapper = mapper();
        let first = map_all(
            &mut mapper,
            &[
                json!({"type": "response.created", "response": {}}),
                json!({"type": "response.output_text.delta", "item_id": "msg_1", "delta": "a"}),
            ],
        );
        let second = map_all(
            &mut mapper,
            &[
                json!({"type": "response.created", "response": {}}),
                json!({"type": "response.output_text.delta", "item_id": "msg_2", "delta": "b"}),
            ],
        );
        assert_eq!(types(&first)[0], "stream_start");
        assert_eq!(
            types(&second),
            vec!["text_complete", "text_start", "text_delta"]
        );
        assert!(matches!(&second[0].kind, EventKind::TextComplete { text_id } if text_id == "msg_1"));
        assert!(matches!(&second[1].kind, EventKind::TextStart { text_id } if text_id == "msg_2"));
    }

    #[test]
    fn failure_frames_become_provider_errors() {
        let mut mapper = mapper();
        let err = mapper
            .map_json(&json!({"type": "response.failed", "response": {"error": {"message": "quota exceeded"}}}))
            .expect_err("should fail");
        assert!(matches!(err, ProviderError::Provider { .. }));
        assert_eq!(err.message(), "quota exceeded");

        let frame = SseFrame {
            event: None,
            data: "not json".into(),
        };
        assert!(matches!(
            mapper.map_frame(&frame),
            Err(ProviderError::Protocol { .. })
        ));
    }

    #[test]
    fn done_marker_and_unknown_types_are_ignored() {
        let mut mapper = mapper();
        let done = SseFrame {
            event: None,
            data: "[DONE]".into(),
        };
        assert!(mapper.map_frame(&done).expect("done").is_empty());
        assert!(
            mapper
                .map_json(&json!({"type": "response.in_progress"}))
                .expect("ignored")
                .is_empty()
        );
    }
}
