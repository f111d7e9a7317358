use std::convert::Infallible;

use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use futures::{Stream, StreamExt as _};
use tokio_stream::wrappers::ReceiverStream;

use super::adapter::UiStreamAdapter;
use super::sink::ChannelSink;
use crate::errors::RunFailure;
use crate::event::Event;

/// Header announcing the UI message stream protocol version.
pub const UI_MESSAGE_STREAM_HEADER: &str = "x-vercel-ai-ui-message-stream";
/// Protocol version implemented by this crate.
pub const UI_MESSAGE_STREAM_VERSION: &str = "v1";

const DEFAULT_FRAME_BUFFER: usize = 32;

/// Response headers for a UI message stream.
pub fn ui_stream_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-transform"),
    );
    headers.insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );
    headers.insert(
        HeaderName::from_static(UI_MESSAGE_STREAM_HEADER),
        HeaderValue::from_static(UI_MESSAGE_STREAM_VERSION),
    );
    headers
}

impl<C: Send + 'static> UiStreamAdapter<C> {
    /// Spawns the adapter on the current runtime and returns a streaming
    /// response fed frame by frame from it.
    ///
    /// The body ends after the `[DONE]` sentinel. Dropping the body (client
    /// disconnect) is observed by the adapter before its next event.
    pub fn into_response<S, E>(self, source: S) -> Response
    where
        S: Stream<Item = Result<Event, E>> + Send + 'static,
        E: Into<RunFailure> + Send + 'static,
    {
        self.into_response_with_buffer(source, DEFAULT_FRAME_BUFFER)
    }

    pub fn into_response_with_buffer<S, E>(self, source: S, frame_buffer: usize) -> Response
    where
        S: Stream<Item = Result<Event, E>> + Send + 'static,
        E: Into<RunFailure> + Send + 'static,
    {
        let (mut sink, rx) = ChannelSink::channel(frame_buffer);
        tokio::spawn(async move {
            self.run(source, &mut sink).await;
        });

        let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>));
        (ui_stream_headers(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProviderError;
    use crate::state::Usage;
    use futures::stream;

    #[test]
    fn headers_disable_buffering_and_announce_version() {
        let headers = ui_stream_headers();
        assert_eq!(headers[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(headers[CACHE_CONTROL], "no-cache, no-transform");
        assert_eq!(headers["x-accel-buffering"], "no");
        assert_eq!(headers[UI_MESSAGE_STREAM_HEADER], "v1");
    }

    #[tokio::test]
    async fn response_body_streams_frames_then_done() {
        let source = stream::iter(vec![
            Ok::<_, ProviderError>(Event::stream_start()),
            Ok(Event::text_start("a")),
            Ok(Event::text_delta("a", "Hi")),
            Ok(Event::text_complete("a")),
            Ok(Event::stream_end("stop", Some(Usage::new(1, 1)))),
        ]);
        let response = UiStreamAdapter::<()>::new()
            .message_id("msg_1")
            .into_response(source);
        assert_eq!(response.headers()[UI_MESSAGE_STREAM_HEADER], "v1");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let text = std::str::from_utf8(&body).expect("utf8");
        assert!(text.starts_with("data: {\"type\":\"start\",\"messageId\":\"msg_1\"}\n\n"));
        assert!(text.ends_with("data: [DONE]\n\n"));
        assert_eq!(text.matches("data: ").count(), 6);
    }
}
