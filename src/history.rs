use tokio::sync::Mutex;

/// One completed conversational turn, handed to the store after the final
/// reconciled text is known.
#[derive(Clone, Debug)]
pub struct TurnRecord {
    pub session_id: String,
    pub user_id: String,
    pub role: &'static str,
    pub content: String,
    pub request_id: String,
    pub model: String,
    pub latency_ms: u64,
}

#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    async fn record_turn(&self, turn: TurnRecord);
}

/// In-memory history store. Persistent storage is an external concern; this
/// keeps the recording seam exercised and inspectable in tests.
#[derive(Default)]
pub struct MemoryHistoryStore {
    turns: Mutex<Vec<TurnRecord>>,
}

impl MemoryHistoryStore {
    pub async fn session_turns(&self, session_id: &str) -> Vec<TurnRecord> {
        self.turns
            .lock()
            .await
            .iter()
            .filter(|t| t.session_id == session_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.turns.lock().await.len()
    }
}

#[async_trait::async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn record_turn(&self, turn: TurnRecord) {
        tracing::debug!(
            session = %turn.session_id,
            role = turn.role,
            chars = turn.content.len(),
            "recording turn"
        );
        self.turns.lock().await.push(turn);
    }
}
