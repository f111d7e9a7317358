use crate::model::ProviderId;

/// Errors returned by a provider adapter before they are normalized for the
/// public run stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Provider returned an application-level failure (HTTP status, auth, etc.).
    #[error("provider error ({provider}): {message}")]
    Provider {
        provider: ProviderId,
        message: String,
        status_code: Option<u16>,
    },
    /// Transport or stream I/O failed.
    #[error("transport error ({provider}): {message}")]
    Transport {
        provider: ProviderId,
        message: String,
    },
    /// Provider response shape or event sequencing was invalid.
    #[error("protocol error ({provider}): {message}")]
    Protocol {
        provider: ProviderId,
        message: String,
    },
}

impl ProviderError {
    /// Creates a provider-level error.
    pub fn provider(
        provider: impl Into<ProviderId>,
        message: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            status_code,
        }
    }

    /// Creates a transport-level error.
    pub fn transport(provider: impl Into<ProviderId>, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates a protocol-level error.
    pub fn protocol(provider: impl Into<ProviderId>, message: impl Into<String>) -> Self {
        Self::Protocol {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Returns the provider associated with this error.
    pub fn provider_id(&self) -> &ProviderId {
        match self {
            Self::Provider { provider, .. }
            | Self::Transport { provider, .. }
            | Self::Protocol { provider, .. } => provider,
        }
    }

    /// Returns the human-readable message for this error.
    pub fn message(&self) -> &str {
        match self {
            Self::Provider { message, .. }
            | Self::Transport { message, .. }
            | Self::Protocol { message, .. } => message,
        }
    }
}

/// Terminal failure of a run or of a stream being encoded for a client.
///
/// Mid-stream failures never surface as panics or raw errors to a client; the
/// UI stream adapter turns them into a single `error` frame via
/// [`crate::event::Event::from_failure`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum RunFailure {
    /// Provider returned a non-retryable or terminal failure.
    #[error("provider failure ({provider}): {message}")]
    Provider {
        provider: String,
        message: String,
        status_code: Option<u16>,
    },
    /// Network/stream transport failed.
    #[error("transport failure ({provider}): {message}")]
    Transport { provider: String, message: String },
    /// The harness detected a protocol or invariant error.
    #[error("protocol failure: {message}")]
    Protocol { message: String },
    /// A frame payload could not be serialized.
    #[error("encoding failure: {message}")]
    Encoding { message: String },
    /// The per-run deadline elapsed before the provider finished.
    #[error("run timed out after {millis}ms")]
    Timeout { millis: u64 },
    /// The run was cancelled by the caller.
    #[error("run cancelled")]
    Cancelled,
}

impl RunFailure {
    /// Stable error type reported in synthesized error events.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Provider { .. } => "provider_error",
            Self::Transport { .. } => "transport_error",
            Self::Protocol { .. } => "protocol_error",
            Self::Encoding { .. } => "encoding_error",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled => "cancelled",
        }
    }

    /// Diagnostic metadata attached to synthesized error events.
    pub fn metadata(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut meta = serde_json::Map::new();
        meta.insert("errorType".into(), self.error_type().into());
        match self {
            Self::Provider {
                provider,
                status_code,
                ..
            } => {
                meta.insert("provider".into(), provider.as_str().into());
                if let Some(code) = status_code {
                    meta.insert("statusCode".into(), (*code).into());
                }
            }
            Self::Transport { provider, .. } => {
                meta.insert("provider".into(), provider.as_str().into());
            }
            Self::Timeout { millis } => {
                meta.insert("timeoutMillis".into(), (*millis).into());
            }
            Self::Protocol { .. } | Self::Encoding { .. } | Self::Cancelled => {}
        }
        meta
    }
}

impl From<ProviderError> for RunFailure {
    fn from(value: ProviderError) -> Self {
        Self::from(&value)
    }
}

impl From<&ProviderError> for RunFailure {
    fn from(err: &ProviderError) -> Self {
        match err {
            ProviderError::Provider {
                provider,
                message,
                status_code,
            } => RunFailure::Provider {
                provider: provider.to_string(),
                message: message.clone(),
                status_code: *status_code,
            },
            ProviderError::Transport { provider, message } => RunFailure::Transport {
                provider: provider.to_string(),
                message: message.clone(),
            },
            ProviderError::Protocol { provider, message } => RunFailure::Protocol {
                message: format!("provider={provider}: {message}"),
            },
        }
    }
}

impl From<serde_json::Error> for RunFailure {
    fn from(value: serde_json::Error) -> Self {
        RunFailure::Encoding {
            message: value.to_string(),
        }
    }
}

/// Top-level error type for the public harness API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HarnessError {
    /// Invalid harness/provider configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid user input to the builder API.
    #[error("validation error: {0}")]
    Validation(String),
    /// Requested provider is not registered in the harness.
    #[error("provider not found: {provider}")]
    ProviderNotFound { provider: ProviderId },
    /// Provider startup/request error before the run stream is established.
    #[error(transparent)]
    Provider(ProviderError),
    /// Terminal failure returned from a started run.
    #[error(transparent)]
    RunFailed(RunFailure),
    /// Internal protocol misuse or invariant violation.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl HarnessError {
    pub(crate) fn protocol_msg(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

impl From<RunFailure> for HarnessError {
    fn from(value: RunFailure) -> Self {
        HarnessError::RunFailed(value)
    }
}
