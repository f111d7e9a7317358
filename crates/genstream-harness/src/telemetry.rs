//! Operation started/completed notifications bracketing a generation.
//!
//! Span construction and export live outside this crate; sinks only receive
//! the two boundary notifications.

use std::time::Duration;

use tracing::{info, warn};

use crate::errors::RunFailure;
use crate::model::ModelRef;
use crate::state::Usage;

/// Identity of one generation as seen by telemetry.
#[derive(Clone, Debug)]
pub struct OperationInfo {
    pub run_id: uuid::Uuid,
    pub session_id: uuid::Uuid,
    pub session_name: String,
    pub model: ModelRef,
    pub request_id: Option<String>,
}

/// How a generation ended.
#[derive(Clone, Debug)]
pub enum OperationOutcome {
    Completed {
        finish_reason: Option<String>,
        usage: Option<Usage>,
        events: u64,
        elapsed: Duration,
    },
    Failed {
        failure: RunFailure,
        events: u64,
        elapsed: Duration,
    },
}

pub trait TelemetrySink: Send + Sync {
    /// Called once, when the first event of a generation arrives.
    fn operation_started(&self, info: &OperationInfo);

    /// Called exactly once per generation that reached the provider.
    fn operation_completed(&self, info: &OperationInfo, outcome: &OperationOutcome);
}

/// Default sink that records both notifications as `tracing` events.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn operation_started(&self, info: &OperationInfo) {
        info!(
            run_id = %info.run_id,
            session_id = %info.session_id,
            session = %info.session_name,
            model = %info.model,
            request_id = info.request_id.as_deref().unwrap_or(""),
            "generation started"
        );
    }

    fn operation_completed(&self, info: &OperationInfo, outcome: &OperationOutcome) {
        match outcome {
            OperationOutcome::Completed {
                finish_reason,
                usage,
                events,
                elapsed,
            } => info!(
                run_id = %info.run_id,
                model = %info.model,
                finish_reason = finish_reason.as_deref().unwrap_or(""),
                prompt_tokens = usage.as_ref().map(|u| u.prompt_tokens).unwrap_or(0),
                completion_tokens = usage.as_ref().map(|u| u.completion_tokens).unwrap_or(0),
                events,
                elapsed_ms = elapsed.as_millis() as u64,
                "generation completed"
            ),
            OperationOutcome::Failed {
                failure,
                events,
                elapsed,
            } => warn!(
                run_id = %info.run_id,
                model = %info.model,
                error_type = failure.error_type(),
                error = %failure,
                events,
                elapsed_ms = elapsed.as_millis() as u64,
                "generation failed"
            ),
        }
    }
}
