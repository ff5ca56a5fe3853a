use std::sync::Arc;

use crate::backend::AdkClient;
use crate::bridge::SessionRegistry;
use crate::config::Settings;
use crate::history::{HistoryStore, MemoryHistoryStore};
use crate::multimodal::{InlineConverter, MultimodalConverter};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub client: Arc<AdkClient>,
    pub registry: Arc<SessionRegistry>,
    pub converter: Arc<dyn MultimodalConverter>,
    pub history: Arc<dyn HistoryStore>,
}

impl AppState {
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let client = Arc::new(AdkClient::new(&settings)?);
        let registry = Arc::new(SessionRegistry::new(client.clone()));
        Ok(Self {
            settings: Arc::new(settings),
            client,
            registry,
            converter: Arc::new(InlineConverter),
            history: Arc::new(MemoryHistoryStore::default()),
        })
    }
}
