//! Streaming generation harness with a UI message stream adapter.
//!
//! Providers produce ordered [`Event`]s; [`StreamState`] tracks per-stream
//! lifecycle and usage for producers; [`UiStreamAdapter`] turns an event
//! stream into `data: <json>\n\n` frames for a chat UI client.
//!
//! Vendor-specific APIs are namespaced under `vendors::*`.
//!
//! # Streaming a generation to an HTTP response
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use genstream_harness::prelude::*;
//! use genstream_harness::vendors::openai::{
//!     OpenAiProvider, OpenAiRequestOptions, OpenAiRunBuilderExt,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), HarnessError> {
//! let harness = Harness::builder()
//!     .register_provider(Arc::new(OpenAiProvider::from_env()?))
//!     .build()?;
//!
//! let run = harness
//!     .session(SessionConfig::named("demo"))
//!     .run(ModelRef::new("openai", "gpt-5-nano"))
//!     .system_prompt("Answer briefly.")
//!     .user_text("Say hello")
//!     .openai_options(OpenAiRequestOptions::default().store(false))
//!     .start_stream()
//!     .await?;
//!
//! let message_id = run.run_id().to_string();
//! let response = UiStreamAdapter::<()>::new()
//!     .message_id(message_id)
//!     .into_response(run.into_events());
//! # drop(response);
//! # Ok(())
//! # }
//! ```

/// Input/output content types and final run output helpers.
pub mod content;
/// Public error types used by the harness API.
pub mod errors;
/// Normalized generation events.
pub mod event;
/// Harness entry point and builder.
pub mod harness;
/// Model and provider identifiers plus generic run options.
pub mod model;
pub mod observability;
pub mod prelude;
/// Provider adapter contracts used by vendor integrations.
pub mod provider;
/// Run builder, streaming handle, and cancellation handle.
pub mod run;
pub mod session;
/// Per-stream lifecycle flags, buffers and usage accumulation.
pub mod state;
pub mod telemetry;
pub mod ui_stream;
/// Vendor-specific integrations and extension traits.
pub mod vendors;

pub use content::{InputPart, OutputPart, RunOutput};
pub use errors::{HarnessError, ProviderError, RunFailure};
pub use event::{Event, EventKind, ProviderToolStatus};
pub use harness::{Harness, HarnessBuilder};
pub use model::{ModelRef, ProviderId, RunOptions};
pub use observability::init_observability;
pub use provider::{EventStream, ProviderAdapter, ProviderRequest, ProviderResponseMeta, ProviderStreamHandle};
pub use run::{AbortHandle, RunBuilder, RunStream};
pub use session::{Session, SessionConfig};
pub use state::{StreamState, Usage};
pub use telemetry::{OperationInfo, OperationOutcome, TelemetrySink, TracingTelemetry};
pub use ui_stream::{AdapterOutcome, AdapterReport, FrameSink, UiStreamAdapter};
