//! Common imports for typical harness usage.
pub use crate::{
    AbortHandle, Event, EventKind, Harness, HarnessBuilder, HarnessError, InputPart, ModelRef,
    OutputPart, ProviderId, RunBuilder, RunFailure, RunOutput, RunStream, Session, SessionConfig,
    StreamState, UiStreamAdapter, Usage,
};
