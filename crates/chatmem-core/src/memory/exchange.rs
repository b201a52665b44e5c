//! Exchange and session value types handed out by the manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::strategy::MemoryStrategy;
use crate::types::Message;

/// One human message and the AI response to it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub human: String,
    pub ai: String,
    /// When the exchange was appended. Metadata only; order is positional.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Exchange {
    pub fn new(human: impl Into<String>, ai: impl Into<String>) -> Self {
        Exchange {
            human: human.into(),
            ai: ai.into(),
            timestamp: Utc::now(),
        }
    }

    /// Borrow the pair as `(human, ai)`.
    pub fn as_pair(&self) -> (&str, &str) {
        (&self.human, &self.ai)
    }

    /// Render as the two chat messages it stands for.
    pub fn to_messages(&self) -> [Message; 2] {
        [Message::user(&self.human), Message::assistant(&self.ai)]
    }

    /// Plain-text transcript form used in condensation prompts.
    pub fn transcript(&self) -> String {
        format!("Human: {}\nAI: {}", self.human, self.ai)
    }
}

/// Read-only view of a session's state.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub strategy: MemoryStrategy,
    /// Raw exchanges currently held.
    pub exchanges: usize,
    /// Length of the running summary in characters.
    pub summary_chars: usize,
    /// How many times the session has been cleared.
    pub clear_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full state of one session, as handed to and from persistence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: String,
    pub strategy: MemoryStrategy,
    pub exchanges: Vec<Exchange>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub clear_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionSnapshot {
    /// An empty snapshot, as a freshly created session would produce.
    pub fn new(id: impl Into<String>, strategy: MemoryStrategy) -> Self {
        let now = Utc::now();
        SessionSnapshot {
            id: id.into(),
            strategy,
            exchanges: Vec::new(),
            summary: String::new(),
            clear_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
