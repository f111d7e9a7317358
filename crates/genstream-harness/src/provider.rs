use std::collections::HashMap;
use std::pin::Pin;

use crate::content::InputPart;
use crate::errors::ProviderError;
use crate::event::Event;
use crate::model::{ModelRef, ProviderId, RunOptions};

/// Ordered events produced by one backend generation.
pub type EventStream = Pin<Box<dyn futures::Stream<Item = Result<Event, ProviderError>> + Send>>;

/// Everything a provider needs to start one generation.
#[derive(Clone, Debug)]
pub struct ProviderRequest {
    pub run_id: uuid::Uuid,
    pub session_id: uuid::Uuid,
    pub model: ModelRef,
    pub system_prompt: Option<String>,
    pub input_parts: Vec<InputPart>,
    pub options: RunOptions,
    /// Opaque per-provider options keyed by provider id.
    pub vendor_options: HashMap<ProviderId, serde_json::Value>,
}

/// Response metadata known once the backend accepted the request.
#[derive(Clone, Debug, Default)]
pub struct ProviderResponseMeta {
    pub request_id: Option<String>,
}

/// Started backend generation.
pub struct ProviderStreamHandle {
    pub stream: EventStream,
    pub metadata: ProviderResponseMeta,
}

/// Event producer contract implemented per backend.
///
/// Implementations decode raw backend deltas and emit [`Event`]s while
/// driving a single [`crate::state::StreamState`] per generation: a stream
/// start at most once, paired text/thinking start and complete, paired step
/// start and finish, and a final `StreamEnd`.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn id(&self) -> ProviderId;

    async fn start_stream(&self, req: ProviderRequest)
    -> Result<ProviderStreamHandle, ProviderError>;
}
