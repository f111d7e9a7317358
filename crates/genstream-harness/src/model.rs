use std::fmt;
use std::time::Duration;

/// Stable identifier for a backend implementation (for example `openai`).
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ProviderId(pub String);

impl ProviderId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProviderId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Backend and model selected for a generation.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelRef {
    pub provider: ProviderId,
    /// Provider-specific model name (for example `gpt-5-nano`).
    pub model: String,
}

impl ModelRef {
    pub fn new(provider: impl Into<ProviderId>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// Parses `provider/model`, falling back to `default_provider` when the
    /// value carries no provider prefix.
    pub fn parse(value: &str, default_provider: &str) -> Self {
        match value.split_once('/') {
            Some((provider, model)) if !provider.trim().is_empty() => {
                Self::new(provider.trim(), model.trim())
            }
            _ => Self::new(default_provider, value.trim()),
        }
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// Generic run behavior options.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RunOptions {
    /// Optional deadline for the whole generation.
    pub timeout: Option<Duration>,
    /// Bounded event buffer size used between the run task and the consumer.
    pub stream_buffer_capacity: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            stream_buffer_capacity: 128,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_options_default_buffer_capacity() {
        assert_eq!(RunOptions::default().stream_buffer_capacity, 128);
    }

    #[test]
    fn parse_model_ref_with_and_without_provider() {
        let explicit = ModelRef::parse("openai/gpt-5-nano", "fake");
        assert_eq!(explicit, ModelRef::new("openai", "gpt-5-nano"));
        let bare = ModelRef::parse("gpt-5-nano", "openai");
        assert_eq!(bare.to_string(), "openai/gpt-5-nano");
    }
}
