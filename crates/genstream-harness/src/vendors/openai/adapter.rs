use std::collections::VecDeque;
use std::pin::Pin;

use futures::StreamExt as _;
use futures::stream;
use tracing::debug;

use crate::content::InputPart;
use crate::errors::{HarnessError, ProviderError};
use crate::event::Event;
use crate::model::ProviderId;
use crate::provider::{ProviderAdapter, ProviderRequest, ProviderResponseMeta, ProviderStreamHandle};

use super::config::OpenAiClientConfig;
use super::options::OpenAiRequestOptions;
use super::transport::{ResponsesEventMapper, SseDecoder};

pub(crate) const OPENAI_PROVIDER: &str = "openai";

type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static>>;

/// Provider adapter for OpenAI's Responses API (streaming).
pub struct OpenAiProvider {
    client: reqwest::Client,
    config: OpenAiClientConfig,
}

impl OpenAiProvider {
    /// Creates a provider from explicit client configuration.
    pub fn new(config: OpenAiClientConfig) -> Result<Self, HarnessError> {
        if config.api_key.trim().is_empty() {
            return Err(HarnessError::Config(
                "OpenAI client config api_key must not be empty".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| HarnessError::Config(format!("failed to build OpenAI client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a provider using `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self, HarnessError> {
        Self::new(OpenAiClientConfig::from_env()?)
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for OpenAiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::new(OPENAI_PROVIDER)
    }

    async fn start_stream(
        &self,
        req: ProviderRequest,
    ) -> Result<ProviderStreamHandle, ProviderError> {
        let provider_id = ProviderId::new(OPENAI_PROVIDER);
        let request_options = read_openai_options(&req, &provider_id)?;
        let body = build_request_body(&req, &request_options)?;
        debug!(run_id = %req.run_id, session_id = %req.session_id, model = %req.model.model, "starting OpenAI responses stream");

        let mut http_req = self
            .client
            .post(self.config.responses_url())
            .bearer_auth(&self.config.api_key)
            .json(&body);
        if let Some(timeout) = req.options.timeout {
            http_req = http_req.timeout(timeout);
        }

        let response = http_req.send().await.map_err(|e| {
            ProviderError::transport(provider_id.clone(), format!("OpenAI request failed: {e}"))
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::provider(
                provider_id,
                format!("OpenAI responses request failed with status {status}: {body}"),
                Some(status.as_u16()),
            ));
        }

        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned);
        debug!(run_id = %req.run_id, request_id = request_id.as_deref().unwrap_or("-"), "OpenAI responses stream opened");

        let bytes_stream: ByteStream = Box::pin(response.bytes_stream());
        let stream = openai_event_stream(provider_id, bytes_stream);

        Ok(ProviderStreamHandle {
            stream: Box::pin(stream),
            metadata: ProviderResponseMeta { request_id },
        })
    }
}

fn read_openai_options(
    req: &ProviderRequest,
    provider_id: &ProviderId,
) -> Result<OpenAiRequestOptions, ProviderError> {
    match req.vendor_options.get(provider_id) {
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            ProviderError::protocol(provider_id.clone(), format!("invalid OpenAI options: {e}"))
        }),
        None => Ok(OpenAiRequestOptions::default()),
    }
}

pub(crate) fn build_request_body(
    req: &ProviderRequest,
    options: &OpenAiRequestOptions,
) -> Result<serde_json::Value, ProviderError> {
    let provider_id = ProviderId::new(OPENAI_PROVIDER);
    let user_payload = render_user_input(&req.input_parts).map_err(|e| {
        ProviderError::protocol(
            provider_id.clone(),
            format!("failed to serialize input parts: {e}"),
        )
    })?;

    let mut input = Vec::new();
    if let Some(system_prompt) = req
        .system_prompt
        .as_ref()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
    {
        input.push(serde_json::json!({
            "role": "system",
            "content": system_prompt,
        }));
    }
    input.push(serde_json::json!({
        "role": "user",
        "content": user_payload,
    }));

    let mut body = serde_json::json!({
        "model": req.model.model,
        "input": input,
        "stream": true,
        "store": options.store.unwrap_or(false),
    });

    if let Some(tokens) = options.max_output_tokens {
        body["max_output_tokens"] = serde_json::json!(tokens);
    }
    if let Some(effort) = options.reasoning_effort.as_ref() {
        body["reasoning"] = serde_json::json!({ "effort": effort, "summary": "auto" });
    }

    Ok(body)
}

fn render_user_input(parts: &[InputPart]) -> Result<String, serde_json::Error> {
    let mut segments = Vec::with_capacity(parts.len());
    for part in parts {
        match part {
            InputPart::Text(text) => segments.push(text.clone()),
            InputPart::Json(value) => segments.push(serde_json::to_string(value)?),
        }
    }
    Ok(segments.join("\n"))
}

fn openai_event_stream(
    provider_id: ProviderId,
    bytes_stream: ByteStream,
) -> impl futures::Stream<Item = Result<Event, ProviderError>> + Send {
    struct State {
        provider_id: ProviderId,
        bytes_stream: ByteStream,
        decoder: SseDecoder,
        mapper: ResponsesEventMapper,
        pending: VecDeque<Event>,
        done: bool,
    }

    stream::try_unfold(
        State {
            mapper: ResponsesEventMapper::new(provider_id.clone()),
            provider_id,
            bytes_stream,
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Ok(Some((event, state)));
                }
                if state.done || state.mapper.is_finished() {
                    return Ok(None);
                }

                match state.bytes_stream.next().await {
                    Some(Ok(chunk)) => {
                        for frame in state.decoder.push_chunk(&chunk) {
                            let events = state.mapper.map_frame(&frame)?;
                            state.pending.extend(events);
                        }
                    }
                    Some(Err(e)) => {
                        return Err(ProviderError::transport(
                            state.provider_id,
                            format!("OpenAI streaming read failed: {e}"),
                        ));
                    }
                    None => state.done = true,
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::model::{ModelRef, RunOptions};
    use crate::vendors::openai::OpenAiReasoningEffort;
    use std::collections::HashMap;

    fn request_with_parts(parts: Vec<InputPart>) -> ProviderRequest {
        ProviderRequest {
            run_id: uuid::Uuid::new_v4(),
            session_id: uuid::Uuid::new_v4(),
            model: ModelRef::new("openai", "gpt-5-nano"),
            system_prompt: Some("sys".into()),
            input_parts: parts,
            options: RunOptions::default(),
            vendor_options: HashMap::new(),
        }
    }

    fn chunked(chunks: &[&'static str]) -> ByteStream {
        let items: Vec<Result<bytes::Bytes, reqwest::Error>> = chunks
            .iter()
            .map(|c| Ok(bytes::Bytes::from_static(c.as_bytes())))
            .collect();
        Box::pin(stream::iter(items))
    }

    #[test]
    fn request_serialization_has_stream_and_store_defaults() {
        let req = request_with_parts(vec![InputPart::Text("hello".into())]);
        let body = build_request_body(&req, &OpenAiRequestOptions::default()).expect("body");
        assert_eq!(body["stream"], true);
        assert_eq!(body["store"], false);
        assert_eq!(body["model"], "gpt-5-nano");
        assert_eq!(body["input"][0]["role"], "system");
        assert_eq!(body["input"][1]["content"], "hello");
    }

    #[test]
    fn vendor_options_are_applied_when_present() {
        let req = request_with_parts(vec![InputPart::Json(serde_json::json!({"a":1}))]);
        let body = build_request_body(
            &req,
            &OpenAiRequestOptions::default()
                .store(true)
                .reasoning_effort(OpenAiReasoningEffort::Low)
                .max_output_tokens(256),
        )
        .expect("body");
        assert_eq!(body["store"], true);
        assert_eq!(body["max_output_tokens"], 256);
        assert_eq!(body["reasoning"]["effort"], "low");
        assert_eq!(body["reasoning"]["summary"], "auto");
        assert_eq!(body["input"][1]["content"], "{\"a\":1}");
    }

    #[tokio::test]
    async fn event_stream_decodes_split_frames_and_stops_at_stream_end() {
        let bytes = chunked(&[
            "data: {\"type\":\"response.created\",\"response\":{}}\n\n",
            "data: {\"type\":\"response.output_text.delta\",\"item_id\":\"m\",\"del",
            "ta\":\"Hi\"}\n\ndata: {\"type\":\"response.completed\",\"response\":{}}\n\n",
            "data: {\"type\":\"response.output_text.delta\",\"delta\":\"late\"}\n\n",
        ]);
        let events: Vec<Event> = openai_event_stream(ProviderId::new("openai"), bytes)
            .map(|item| item.expect("event"))
            .collect()
            .await;
        let types: Vec<&str> = events.iter().map(Event::event_type).collect();
        assert_eq!(
            types,
            vec![
                "stream_start",
                "step_start",
                "text_start",
                "text_delta",
                "text_complete",
                "step_finish",
                "stream_end"
            ]
        );
        assert!(matches!(&events[3].kind, EventKind::TextDelta { delta, .. } if delta == "Hi"));
    }

    #[tokio::test]
    async fn event_stream_surfaces_failed_response_as_provider_error() {
        let bytes = chunked(&[
            "data: {\"type\":\"response.created\",\"response\":{}}\n\n",
            "data: {\"type\":\"error\",\"message\":\"rate limited\"}\n\n",
        ]);
        let items: Vec<Result<Event, ProviderError>> =
            openai_event_stream(ProviderId::new("openai"), bytes).collect().await;
        assert_eq!(items.len(), 3);
        assert!(matches!(
            items.last(),
            Some(Err(ProviderError::Provider { message, .. })) if message == "rate limited"
        ));
    }

    #[tokio::test]
    async fn env_gated_smoke_stream_ends_with_terminal_item_if_key_present() {
        if std::env::var("OPENAI_API_KEY")
            .unwrap_or_default()
            .trim()
            .is_empty()
        {
            eprintln!("skipping OpenAI stream smoke test (OPENAI_API_KEY missing)");
            return;
        }

        let harness = crate::Harness::builder()
            .register_provider(std::sync::Arc::new(
                OpenAiProvider::from_env().expect("provider"),
            ))
            .build()
            .expect("harness");

        let mut run = harness
            .session(crate::SessionConfig::named("smoke-stream"))
            .run(crate::ModelRef::new("openai", "gpt-5-nano"))
            .timeout(std::time::Duration::from_secs(30))
            .system_prompt("Reply with a short greeting.")
            .user_text("hello")
            .start_stream()
            .await
            .expect("start stream");

        let mut saw_start = false;
        let mut saw_terminal = false;
        while let Some(item) = run.next_event().await {
            match item {
                Ok(event) if event.is_terminal() => {
                    saw_terminal = true;
                    break;
                }
                Ok(event) => saw_start |= event.event_type() == "stream_start",
                Err(_) => {
                    saw_terminal = true;
                    break;
                }
            }
        }

        let _ = run.finish().await;
        assert!(saw_start, "expected stream_start event");
        assert!(saw_terminal, "expected terminal item");
    }
}
