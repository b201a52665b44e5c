//! Per-invocation state: config, memory manager and session store.
//!
//! Every command opens a `Workspace`, which restores the stored sessions into
//! a fresh `MemoryManager`. Commands that change a session call `persist`.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use chatmem_core::config::schema::ProviderConfig;
use chatmem_core::config::Config;
use chatmem_core::memory::{Condenser, MemoryManager, NoopCondenser};
use chatmem_core::session::SessionStore;
use chatmem_core::utils::expand_home;
use chatmem_providers::registry::with_env_keys;
use chatmem_providers::{create_provider, LlmCondenser};

pub struct Workspace {
    pub config: Config,
    pub memory: Arc<MemoryManager>,
    store: Option<SessionStore>,
}

impl Workspace {
    /// Build the manager and restore every stored session.
    pub fn open(config: Config) -> Result<Self> {
        let providers = with_env_keys(config.providers.to_map());
        let summary_model = config.chat.summary_model().to_string();

        let condenser: Arc<dyn Condenser> = match create_provider(&summary_model, &providers) {
            Ok(provider) => Arc::new(
                LlmCondenser::new(Arc::new(provider), summary_model)
                    .with_max_tokens(config.memory.summary_max_tokens),
            ),
            Err(e) => {
                warn!(error = %e, "summaries disabled, summary sessions will keep exchanges raw");
                Arc::new(NoopCondenser)
            }
        };
        let memory = Arc::new(MemoryManager::new(condenser, config.memory.clone()));

        let store = if config.storage.persist {
            let dir = expand_home(&config.storage.sessions_dir);
            let store = SessionStore::new(Some(dir.clone()))
                .with_context(|| format!("failed to open sessions dir: {}", dir.display()))?;
            for snapshot in store.load_all() {
                let id = snapshot.id.clone();
                if let Err(e) = memory.restore(snapshot) {
                    warn!(session = %id, error = %e, "skipping stored session");
                }
            }
            debug!(sessions = memory.len(), dir = %dir.display(), "restored sessions");
            Some(store)
        } else {
            None
        };

        Ok(Workspace {
            config,
            memory,
            store,
        })
    }

    /// Provider configs with API keys filled in from the environment.
    pub fn providers(&self) -> HashMap<String, ProviderConfig> {
        with_env_keys(self.config.providers.to_map())
    }

    /// Write one session back to disk (no-op when persistence is off).
    pub fn persist(&self, session_id: &str) -> Result<()> {
        if let Some(store) = &self.store {
            let snapshot = self.memory.snapshot(session_id)?;
            store
                .save(&snapshot)
                .with_context(|| format!("failed to save session '{session_id}'"))?;
        }
        Ok(())
    }

    /// Remove a session's file. Returns whether one existed.
    pub fn forget(&self, session_id: &str) -> bool {
        self.store.as_ref().is_some_and(|s| s.delete(session_id))
    }

    pub fn store(&self) -> Option<&SessionStore> {
        self.store.as_ref()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
