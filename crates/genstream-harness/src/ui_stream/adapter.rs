use bytes::Bytes;
use futures::{Stream, StreamExt as _};
use tracing::{debug, info, warn};

use super::frame::DONE_FRAME;
use super::sink::{FrameSink, SinkClosed};
use super::translate::FrameTranslator;
use crate::errors::RunFailure;
use crate::event::{Event, EventKind};

/// Receives the request context and every event the adapter saw, including
/// a synthesized error event.
pub type CompletionCallback<C> = Box<dyn FnOnce(Option<C>, Vec<Event>) + Send>;

/// How one adapter invocation ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdapterOutcome {
    /// The source was drained.
    Completed,
    /// Pulling or encoding failed; an error frame was emitted.
    Failed(RunFailure),
    /// The client went away; pulling stopped early.
    Disconnected,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdapterReport {
    pub events: usize,
    pub frames_written: usize,
    pub sentinel_written: bool,
    pub outcome: AdapterOutcome,
}

#[derive(Clone, Copy, Debug)]
enum FailureStage {
    Pull,
    Encode,
}

impl FailureStage {
    fn as_str(self) -> &'static str {
        match self {
            Self::Pull => "pull",
            Self::Encode => "encode",
        }
    }
}

/// Drives an event source into UI message stream frames.
///
/// One adapter serves exactly one response: it owns the tool-call bookkeeping
/// and the collected event list for that response only.
pub struct UiStreamAdapter<C = ()> {
    message_id: Option<String>,
    context: Option<C>,
    on_complete: Option<CompletionCallback<C>>,
}

impl<C> Default for UiStreamAdapter<C> {
    fn default() -> Self {
        Self {
            message_id: None,
            context: None,
            on_complete: None,
        }
    }
}

impl<C: Send + 'static> UiStreamAdapter<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Message id reported in the `start` frame.
    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Request context handed back to the completion callback.
    pub fn context(mut self, context: C) -> Self {
        self.context = Some(context);
        self
    }

    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(Option<C>, Vec<Event>) + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Pulls `source` to completion, writing one frame per translated event
    /// and always ending with the `[DONE]` sentinel.
    ///
    /// Errors from the source or from encoding never escape: they become a
    /// single `error` frame followed by the sentinel.
    pub async fn run<S, E, K>(self, source: S, sink: &mut K) -> AdapterReport
    where
        S: Stream<Item = Result<Event, E>>,
        E: Into<RunFailure>,
        K: FrameSink + ?Sized,
    {
        let Self {
            message_id,
            context,
            on_complete,
        } = self;
        let mut translator = FrameTranslator::new(message_id);
        let mut collected: Vec<Event> = Vec::new();
        let mut frames_written = 0_usize;
        let mut outcome = AdapterOutcome::Completed;
        let mut source = std::pin::pin!(source);

        while let Some(item) = source.next().await {
            if !sink.is_connected() {
                debug!(events = collected.len(), "client disconnected, stop pulling events");
                outcome = AdapterOutcome::Disconnected;
                break;
            }

            let (failure, stage) = match item {
                Ok(event) => {
                    let encoded = encode_event(&mut translator, &event);
                    collected.push(event);
                    match encoded {
                        Ok(None) => continue,
                        Ok(Some(frame)) => match write_frame(sink, frame).await {
                            Ok(()) => {
                                frames_written += 1;
                                continue;
                            }
                            Err(SinkClosed) => {
                                debug!("frame write failed, client disconnected");
                                outcome = AdapterOutcome::Disconnected;
                                break;
                            }
                        },
                        Err(failure) => (failure, FailureStage::Encode),
                    }
                }
                Err(err) => (err.into(), FailureStage::Pull),
            };

            warn!(
                stage = stage.as_str(),
                error_type = failure.error_type(),
                error = %failure,
                "ui stream failed, emitting error frame"
            );
            let error_event = synthesize_error(&failure, stage);
            if let Ok(Some(frame)) = encode_event(&mut translator, &error_event)
                && write_frame(sink, frame).await.is_ok()
            {
                frames_written += 1;
            }
            collected.push(error_event);
            outcome = AdapterOutcome::Failed(failure);
            break;
        }

        let sentinel_written = write_frame(sink, Bytes::from_static(DONE_FRAME))
            .await
            .is_ok();
        if sentinel_written {
            frames_written += 1;
        }

        let report = AdapterReport {
            events: collected.len(),
            frames_written,
            sentinel_written,
            outcome,
        };
        info!(
            events = report.events,
            frames = report.frames_written,
            sentinel = report.sentinel_written,
            outcome = ?report.outcome,
            "ui stream finished"
        );

        if let Some(callback) = on_complete {
            callback(context, collected);
        }
        report
    }
}

fn encode_event(
    translator: &mut FrameTranslator,
    event: &Event,
) -> Result<Option<Bytes>, RunFailure> {
    match translator.translate(event)? {
        Some(frame) => Ok(Some(frame.encode()?)),
        None => Ok(None),
    }
}

async fn write_frame<K>(sink: &mut K, frame: Bytes) -> Result<(), SinkClosed>
where
    K: FrameSink + ?Sized,
{
    sink.write(frame).await?;
    sink.flush().await
}

fn synthesize_error(failure: &RunFailure, stage: FailureStage) -> Event {
    let mut event = Event::from_failure(failure);
    if let EventKind::Error { metadata, .. } = &mut event.kind {
        metadata.insert("stage".into(), stage.as_str().into());
        metadata.insert("origin".into(), module_path!().into());
    }
    event
}
