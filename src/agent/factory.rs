use std::sync::Arc;

use super::model::{ModelFactory, RankingModel};
use super::overlap::OverlapRanker;
use super::vectorizer::TextVectorizer;
use crate::core::config::AgentConfig;
use crate::core::errors::AgentError;

/// Pairs an already loaded vectorizer with the overlap baseline model.
pub struct BaselineFactory {
    vectorizer: Arc<dyn TextVectorizer>,
    ignored: Vec<u32>,
    devices: usize,
}

impl BaselineFactory {
    pub fn new(vectorizer: Arc<dyn TextVectorizer>) -> Self {
        let ignored = [vectorizer.start_idx(), vectorizer.end_idx()]
            .into_iter()
            .flatten()
            .collect();
        Self {
            vectorizer,
            ignored,
            devices: 0,
        }
    }

    /// Reports `devices` accelerators so data parallelism can kick in.
    pub fn with_devices(mut self, devices: usize) -> Self {
        self.devices = devices;
        self
    }
}

impl ModelFactory for BaselineFactory {
    fn build_vectorizer(&self, _config: &AgentConfig) -> Result<Arc<dyn TextVectorizer>, AgentError> {
        Ok(Arc::clone(&self.vectorizer))
    }

    fn build_model(
        &self,
        _config: &AgentConfig,
        _vectorizer: &Arc<dyn TextVectorizer>,
    ) -> Result<Arc<dyn RankingModel>, AgentError> {
        Ok(Arc::new(OverlapRanker::new(self.ignored.clone())))
    }

    fn device_count(&self) -> usize {
        self.devices
    }
}
