use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::application::ports::{ModelInfo, TranscriptionEngine};

/// Engines keyed by their lookup name. Iteration order is the name order.
#[derive(Default, Clone)]
pub struct EngineRegistry {
    engines: BTreeMap<String, Arc<dyn TranscriptionEngine>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub available: bool,
    pub requirement: Option<String>,
    pub models: Vec<ModelInfo>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any engine previously registered under the same name.
    pub fn register(&mut self, engine: Arc<dyn TranscriptionEngine>) {
        let name = engine.name().to_string();
        if self.engines.insert(name.clone(), engine).is_some() {
            tracing::warn!(engine = %name, "Transcription engine registered twice, keeping the latest");
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn TranscriptionEngine>) -> Self {
        self.register(engine);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TranscriptionEngine>> {
        self.engines.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.engines.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// Models are only listed for engines that can actually run.
    pub fn describe(&self) -> Vec<EngineInfo> {
        self.engines
            .values()
            .map(|engine| {
                let available = engine.is_available();
                EngineInfo {
                    name: engine.name().to_string(),
                    display_name: engine.display_name().to_string(),
                    description: engine.description().to_string(),
                    available,
                    requirement: (!available).then(|| engine.requirement().to_string()),
                    models: if available {
                        engine.list_models()
                    } else {
                        Vec::new()
                    },
                }
            })
            .collect()
    }
}
