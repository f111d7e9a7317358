use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::HarnessError;
use crate::model::ProviderId;
use crate::provider::ProviderAdapter;
use crate::session::{Session, SessionConfig};
use crate::telemetry::{TelemetrySink, TracingTelemetry};

pub(crate) struct HarnessInner {
    providers: HashMap<ProviderId, Arc<dyn ProviderAdapter>>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl HarnessInner {
    pub(crate) fn provider(&self, id: &ProviderId) -> Option<Arc<dyn ProviderAdapter>> {
        self.providers.get(id).cloned()
    }

    pub(crate) fn telemetry(&self) -> Arc<dyn TelemetrySink> {
        self.telemetry.clone()
    }
}

/// Entry point for creating sessions and starting generations.
#[derive(Clone)]
pub struct Harness {
    pub(crate) inner: Arc<HarnessInner>,
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    /// Creates a logical session for grouping related generations.
    pub fn session(&self, config: SessionConfig) -> Session {
        Session::new(self.inner.clone(), config)
    }

    /// Whether a provider with this id is registered.
    pub fn has_provider(&self, id: &ProviderId) -> bool {
        self.inner.providers.contains_key(id)
    }
}

/// Builder used to register provider adapters before creating a `Harness`.
#[derive(Default)]
pub struct HarnessBuilder {
    providers: Vec<Arc<dyn ProviderAdapter>>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
}

impl HarnessBuilder {
    /// Registers a provider adapter. One adapter per provider id.
    pub fn register_provider(mut self, provider: Arc<dyn ProviderAdapter>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Replaces the default [`TracingTelemetry`] sink.
    pub fn telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    /// Builds the harness, rejecting duplicate provider ids.
    pub fn build(self) -> Result<Harness, HarnessError> {
        let mut providers: HashMap<ProviderId, Arc<dyn ProviderAdapter>> = HashMap::new();
        for provider in self.providers {
            let id = provider.id();
            if providers.contains_key(&id) {
                return Err(HarnessError::Config(format!(
                    "duplicate provider registration: {id}"
                )));
            }
            providers.insert(id, provider);
        }
        let telemetry = self
            .telemetry
            .unwrap_or_else(|| Arc::new(TracingTelemetry));
        Ok(Harness {
            inner: Arc::new(HarnessInner {
                providers,
                telemetry,
            }),
        })
    }
}
