use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{Stream, StreamExt as _, stream};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

use crate::content::{InputPart, RunOutput};
use crate::errors::{HarnessError, RunFailure};
use crate::event::Event;
use crate::harness::HarnessInner;
use crate::model::{ModelRef, ProviderId, RunOptions};
use crate::provider::{ProviderAdapter, ProviderRequest};
use crate::telemetry::{OperationInfo, OperationOutcome, TelemetrySink};

/// Handle used to request cancellation of a running generation.
#[derive(Clone)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// Cancellation is best-effort and becomes visible as a terminal
    /// `Err(RunFailure::Cancelled)` item on the run stream.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

/// Builder for configuring and starting a single generation.
pub struct RunBuilder {
    harness: Arc<HarnessInner>,
    session_id: uuid::Uuid,
    session_name: String,
    model: ModelRef,
    system_prompt: Option<String>,
    input_parts: Vec<InputPart>,
    options: RunOptions,
    vendor_options: HashMap<ProviderId, serde_json::Value>,
}

impl RunBuilder {
    pub(crate) fn new(
        harness: Arc<HarnessInner>,
        session_id: uuid::Uuid,
        session_name: String,
        model: ModelRef,
    ) -> Self {
        Self {
            harness,
            session_id,
            session_name,
            model,
            system_prompt: None,
            input_parts: Vec::new(),
            options: RunOptions::default(),
            vendor_options: HashMap::new(),
        }
    }

    pub fn system_prompt(mut self, text: impl Into<String>) -> Self {
        self.system_prompt = Some(text.into());
        self
    }

    /// Appends a plain text user input part.
    pub fn user_text(mut self, text: impl Into<String>) -> Self {
        self.input_parts.push(InputPart::Text(text.into()));
        self
    }

    /// Appends a JSON user input part.
    pub fn user_json(mut self, value: serde_json::Value) -> Self {
        self.input_parts.push(InputPart::Json(value));
        self
    }

    /// Replaces all input parts with the provided list.
    pub fn input_parts(mut self, parts: Vec<InputPart>) -> Self {
        self.input_parts = parts;
        self
    }

    /// Deadline for the whole generation, enforced by the run task.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    pub fn stream_buffer_capacity(mut self, capacity: usize) -> Self {
        self.options.stream_buffer_capacity = capacity;
        self
    }

    pub(crate) fn set_vendor_options_json(
        mut self,
        provider: ProviderId,
        value: serde_json::Value,
    ) -> Self {
        self.vendor_options.insert(provider, value);
        self
    }

    #[cfg(test)]
    pub(crate) fn vendor_options_value(&self, provider: &ProviderId) -> Option<&serde_json::Value> {
        self.vendor_options.get(provider)
    }

    /// Validates the builder state and starts a streaming generation.
    pub async fn start_stream(self) -> Result<RunStream, HarnessError> {
        let harness = self.harness.clone();
        let session_name = self.session_name.clone();
        let request = self.validate_and_build_request()?;
        let provider = harness.provider(&request.model.provider).ok_or_else(|| {
            HarnessError::ProviderNotFound {
                provider: request.model.provider.clone(),
            }
        })?;

        let (tx, rx) = mpsc::channel(request.options.stream_buffer_capacity);
        let (final_tx, final_rx) = oneshot::channel();
        let (abort_tx, abort_rx) = watch::channel(false);

        let info = OperationInfo {
            run_id: request.run_id,
            session_id: request.session_id,
            session_name,
            model: request.model.clone(),
            request_id: None,
        };
        let run_id = request.run_id;
        let session_id = request.session_id;
        let model = request.model.clone();
        tokio::spawn(run_task(
            provider,
            request,
            OperationTelemetry::new(harness.telemetry(), info),
            tx,
            final_tx,
            abort_rx,
        ));

        Ok(RunStream {
            run_id,
            session_id,
            model,
            rx,
            final_rx,
            abort_handle: AbortHandle { tx: abort_tx },
            saw_terminal: false,
        })
    }

    /// Runs to completion and returns the single-value result.
    pub async fn collect_output(self) -> Result<RunOutput, HarnessError> {
        let stream = self.start_stream().await?;
        stream.finish().await
    }

    /// Runs to completion and returns concatenated text output.
    pub async fn collect_text(self) -> Result<String, HarnessError> {
        Ok(self.collect_output().await?.text())
    }

    fn validate_and_build_request(self) -> Result<ProviderRequest, HarnessError> {
        if self.model.provider.as_str().trim().is_empty() {
            return Err(HarnessError::Validation(
                "model provider must not be empty".into(),
            ));
        }
        if self.model.model.trim().is_empty() {
            return Err(HarnessError::Validation("model must not be empty".into()));
        }
        if self.options.stream_buffer_capacity == 0 {
            return Err(HarnessError::Validation(
                "stream_buffer_capacity must be greater than 0".into(),
            ));
        }
        if self.input_parts.is_empty() {
            return Err(HarnessError::Validation(
                "at least one input part is required".into(),
            ));
        }
        for part in &self.input_parts {
            if let InputPart::Text(text) = part
                && text.trim().is_empty()
            {
                return Err(HarnessError::Validation(
                    "text input must not be empty".into(),
                ));
            }
        }

        Ok(ProviderRequest {
            run_id: uuid::Uuid::new_v4(),
            session_id: self.session_id,
            model: self.model,
            system_prompt: self.system_prompt.filter(|s| !s.trim().is_empty()),
            input_parts: self.input_parts,
            options: self.options,
            vendor_options: self.vendor_options,
        })
    }
}

/// Streaming handle returned by `RunBuilder::start_stream`.
///
/// Yields provider events in order. A failure arrives as one final `Err`
/// item; a successful generation ends with a `StreamEnd` event.
pub struct RunStream {
    run_id: uuid::Uuid,
    session_id: uuid::Uuid,
    model: ModelRef,
    rx: mpsc::Receiver<Result<Event, RunFailure>>,
    final_rx: oneshot::Receiver<Result<RunOutput, HarnessError>>,
    abort_handle: AbortHandle,
    saw_terminal: bool,
}

impl RunStream {
    pub fn run_id(&self) -> uuid::Uuid {
        self.run_id
    }

    pub fn session_id(&self) -> uuid::Uuid {
        self.session_id
    }

    pub fn model(&self) -> &ModelRef {
        &self.model
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Waits for the next event. Returns `None` once the run task is done.
    pub async fn next_event(&mut self) -> Option<Result<Event, RunFailure>> {
        let item = self.rx.recv().await;
        match &item {
            Some(Ok(event)) if event.is_terminal() => self.saw_terminal = true,
            Some(Err(_)) => self.saw_terminal = true,
            _ => {}
        }
        item
    }

    /// Converts the handle into a forward-only event stream, e.g. for
    /// [`crate::ui_stream::UiStreamAdapter`]. Dropping the stream stops the
    /// run task at its next send.
    pub fn into_events(self) -> impl Stream<Item = Result<Event, RunFailure>> + Send + 'static {
        stream::unfold(self, |mut run| async move {
            run.next_event().await.map(|item| (item, run))
        })
    }

    /// Drains the stream (if needed) and returns the single-value result.
    ///
    /// Safe to call after consuming events manually with `next_event()`.
    pub async fn finish(mut self) -> Result<RunOutput, HarnessError> {
        while !self.saw_terminal {
            if self.next_event().await.is_none() {
                break;
            }
        }

        match self.final_rx.await {
            Ok(result) => result,
            Err(_) => Err(HarnessError::protocol_msg(format!(
                "run task ended without final result ({})",
                self.model
            ))),
        }
    }
}

/// Sends the started/completed notifications for one generation, each at
/// most once.
struct OperationTelemetry {
    sink: Arc<dyn TelemetrySink>,
    info: OperationInfo,
    began: Instant,
    started: bool,
    events: u64,
}

impl OperationTelemetry {
    fn new(sink: Arc<dyn TelemetrySink>, info: OperationInfo) -> Self {
        Self {
            sink,
            info,
            began: Instant::now(),
            started: false,
            events: 0,
        }
    }

    fn observe_item(&mut self) {
        if !self.started {
            self.started = true;
            self.sink.operation_started(&self.info);
        }
        self.events += 1;
    }

    fn completed(mut self, output: &RunOutput) {
        self.ensure_started();
        self.sink.operation_completed(
            &self.info,
            &OperationOutcome::Completed {
                finish_reason: output.finish_reason.clone(),
                usage: output.usage.clone(),
                events: self.events,
                elapsed: self.began.elapsed(),
            },
        );
    }

    fn failed(mut self, failure: &RunFailure) {
        self.ensure_started();
        self.sink.operation_completed(
            &self.info,
            &OperationOutcome::Failed {
                failure: failure.clone(),
                events: self.events,
                elapsed: self.began.elapsed(),
            },
        );
    }

    fn ensure_started(&mut self) {
        if !self.started {
            self.started = true;
            self.sink.operation_started(&self.info);
        }
    }
}

async fn run_task(
    provider: Arc<dyn ProviderAdapter>,
    request: ProviderRequest,
    mut telemetry: OperationTelemetry,
    tx: mpsc::Sender<Result<Event, RunFailure>>,
    final_tx: oneshot::Sender<Result<RunOutput, HarnessError>>,
    abort_rx: watch::Receiver<bool>,
) {
    let run_id = request.run_id;
    let model = request.model.clone();
    let deadline = request.options.timeout;

    let timeout = async move {
        match deadline {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(timeout);
    let abort = abort_requested(abort_rx);
    tokio::pin!(abort);

    let start = provider.start_stream(request);
    tokio::pin!(start);
    let started = tokio::select! {
        () = &mut abort => Err(RunFailure::Cancelled),
        () = &mut timeout => Err(timeout_failure(deadline)),
        result = &mut start => result.map_err(|err| RunFailure::from(&err)),
    };
    let mut handle = match started {
        Ok(handle) => handle,
        Err(failure) => {
            debug!(
                run_id = %run_id,
                model = %model,
                error_type = failure.error_type(),
                "generation failed before streaming"
            );
            fail_run(&tx, final_tx, telemetry, failure).await;
            return;
        }
    };
    telemetry.info.request_id = handle.metadata.request_id.take();

    let mut output = RunOutput::default();
    loop {
        tokio::select! {
            () = &mut abort => {
                debug!(run_id = %run_id, model = %model, "generation aborted");
                fail_run(&tx, final_tx, telemetry, RunFailure::Cancelled).await;
                return;
            }
            () = &mut timeout => {
                fail_run(&tx, final_tx, telemetry, timeout_failure(deadline)).await;
                return;
            }
            next = handle.stream.next() => {
                match next {
                    Some(Ok(event)) => {
                        telemetry.observe_item();
                        output.apply(&event);
                        let terminal = event.is_terminal();
                        if tx.send(Ok(event)).await.is_err() {
                            debug!(run_id = %run_id, "run stream receiver dropped");
                            telemetry.failed(&RunFailure::Cancelled);
                            let _ = final_tx.send(Err(HarnessError::protocol_msg(
                                "run stream receiver dropped during output",
                            )));
                            return;
                        }
                        if terminal {
                            telemetry.completed(&output);
                            let _ = final_tx.send(Ok(output));
                            return;
                        }
                    }
                    Some(Err(err)) => {
                        telemetry.observe_item();
                        fail_run(&tx, final_tx, telemetry, RunFailure::from(&err)).await;
                        return;
                    }
                    None => {
                        let failure = RunFailure::Protocol {
                            message: format!("provider stream ended without stream end ({model})"),
                        };
                        fail_run(&tx, final_tx, telemetry, failure).await;
                        return;
                    }
                }
            }
        }
    }
}

/// Resolves once cancellation is requested; never resolves if the handle
/// is dropped without aborting.
async fn abort_requested(mut abort_rx: watch::Receiver<bool>) {
    if abort_rx.wait_for(|aborted| *aborted).await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn timeout_failure(deadline: Option<Duration>) -> RunFailure {
    let millis = deadline
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default();
    RunFailure::Timeout { millis }
}

async fn fail_run(
    tx: &mpsc::Sender<Result<Event, RunFailure>>,
    final_tx: oneshot::Sender<Result<RunOutput, HarnessError>>,
    telemetry: OperationTelemetry,
    failure: RunFailure,
) {
    telemetry.failed(&failure);
    let _ = tx.send(Err(failure.clone())).await;
    let _ = final_tx.send(Err(HarnessError::RunFailed(failure)));
}
