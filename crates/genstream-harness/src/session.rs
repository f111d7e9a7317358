use std::sync::Arc;

use crate::harness::HarnessInner;
use crate::model::ModelRef;
use crate::run::RunBuilder;

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Human-readable name, reported with every generation's telemetry.
    pub name: String,
}

impl SessionConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Logical grouping for generations. In-memory only.
#[derive(Clone)]
pub struct Session {
    harness: Arc<HarnessInner>,
    session_id: uuid::Uuid,
    config: SessionConfig,
}

impl Session {
    pub(crate) fn new(harness: Arc<HarnessInner>, config: SessionConfig) -> Self {
        Self {
            harness,
            session_id: uuid::Uuid::new_v4(),
            config,
        }
    }

    pub fn id(&self) -> uuid::Uuid {
        self.session_id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Starts building a generation against the given model.
    pub fn run(&self, model: ModelRef) -> RunBuilder {
        RunBuilder::new(
            self.harness.clone(),
            self.session_id,
            self.config.name.clone(),
            model,
        )
    }
}
