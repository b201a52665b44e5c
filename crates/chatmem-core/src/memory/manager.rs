//! The conversation memory manager.
//!
//! # Locking
//!
//! - The registry (`RwLock<HashMap<..>>`) is held only long enough to look
//!   up, insert or remove a session's `Arc`.
//! - Each session has its own `Mutex`, never held across an `.await`.
//! - Folding snapshots the due exchanges, releases the session lock, calls
//!   the condenser, then re-locks to commit. `clear` and `delete` bump the
//!   session epoch so a fold that straddles them is discarded.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::condense::{Condenser, NoopCondenser};
use super::error::{MemoryError, Result};
use super::exchange::{Exchange, SessionInfo, SessionSnapshot};
use super::strategy::{MemoryParams, MemoryStrategy, RetentionPolicy, StrategyKind};
use crate::config::schema::MemoryConfig;
use crate::types::Message;

/// Heading placed above the running summary in prompt context.
pub const SUMMARY_CONTEXT_PREFIX: &str = "Summary of the earlier conversation:";

// ─────────────────────────────────────────────
// Per-session state
// ─────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    Active,
    Deleted,
}

struct SessionState {
    strategy: MemoryStrategy,
    policy: Box<dyn RetentionPolicy>,
    raw: VecDeque<Exchange>,
    summary: String,
    lifecycle: Lifecycle,
    /// Bumped by `clear`/`delete`; a fold commits only if it still matches.
    epoch: u64,
    /// A fold is in flight for the current epoch.
    folding: bool,
    clear_count: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SessionState {
    fn from_snapshot(snapshot: SessionSnapshot) -> Self {
        SessionState {
            policy: snapshot.strategy.policy(),
            strategy: snapshot.strategy,
            raw: snapshot.exchanges.into(),
            summary: snapshot.summary,
            lifecycle: Lifecycle::Active,
            epoch: 0,
            folding: false,
            clear_count: snapshot.clear_count,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
        }
    }

    fn info(&self, id: &str) -> SessionInfo {
        SessionInfo {
            id: id.to_string(),
            strategy: self.strategy,
            exchanges: self.raw.len(),
            summary_chars: self.summary.chars().count(),
            clear_count: self.clear_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

struct SessionCell {
    id: String,
    state: Mutex<SessionState>,
}

impl SessionCell {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock, failing with `NotFound` once the session has been deleted.
    fn lock_active(&self) -> Result<MutexGuard<'_, SessionState>> {
        let guard = self.lock();
        if guard.lifecycle == Lifecycle::Deleted {
            return Err(MemoryError::NotFound(self.id.clone()));
        }
        Ok(guard)
    }
}

/// Work captured under the session lock and carried out without it.
struct FoldJob {
    epoch: u64,
    summary: String,
    pending: Vec<Exchange>,
}

/// Clears the `folding` flag however the fold ends, including when the
/// `append` future is dropped mid-condense.
struct FoldGuard {
    cell: Arc<SessionCell>,
    epoch: u64,
}

impl Drop for FoldGuard {
    fn drop(&mut self) {
        let mut state = self.cell.lock();
        if state.epoch == self.epoch {
            state.folding = false;
        }
    }
}

// ─────────────────────────────────────────────
// MemoryManager
// ─────────────────────────────────────────────

/// Per-session conversation memory.
///
/// Constructed once per process and shared (usually behind an `Arc`) with
/// whatever handles requests.
pub struct MemoryManager {
    sessions: RwLock<HashMap<String, Arc<SessionCell>>>,
    condenser: Arc<dyn Condenser>,
    defaults: MemoryConfig,
    condense_timeout: Duration,
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new(Arc::new(NoopCondenser), MemoryConfig::default())
    }
}

impl std::fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryManager")
            .field("sessions", &self.len())
            .field("condense_timeout", &self.condense_timeout)
            .finish()
    }
}

impl MemoryManager {
    /// Create a manager with the given condenser and defaults.
    pub fn new(condenser: Arc<dyn Condenser>, defaults: MemoryConfig) -> Self {
        let condense_timeout = defaults.condense_timeout();
        MemoryManager {
            sessions: RwLock::new(HashMap::new()),
            condenser,
            defaults,
            condense_timeout,
        }
    }

    /// Override the per-call condensation timeout.
    pub fn with_condense_timeout(mut self, timeout: Duration) -> Self {
        self.condense_timeout = timeout;
        self
    }

    /// Number of bound sessions.
    pub fn len(&self) -> usize {
        self.read_registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ────────────── Lifecycle ──────────────

    /// Create a session with a named strategy.
    ///
    /// Fails with `InvalidStrategy` for unknown names, `InvalidParameter` for
    /// non-positive sizes and `AlreadyExists` if the id is bound.
    pub fn create(&self, session_id: &str, strategy: &str, params: &MemoryParams) -> Result<SessionInfo> {
        let kind: StrategyKind = strategy.parse()?;
        let strategy = MemoryStrategy::build(kind, params, &self.defaults)?;
        self.create_with(session_id, strategy)
    }

    /// Create a session with an already-resolved strategy.
    pub fn create_with(&self, session_id: &str, strategy: MemoryStrategy) -> Result<SessionInfo> {
        strategy.validate()?;
        let info = self.insert(SessionSnapshot::new(session_id, strategy))?;
        info!(session = session_id, strategy = %strategy, "created memory session");
        Ok(info)
    }

    /// Return the session, creating it with the configured default strategy
    /// if it is not bound.
    ///
    /// `append` never auto-creates; callers that want implicit sessions use
    /// this first.
    pub fn ensure(&self, session_id: &str) -> Result<SessionInfo> {
        if let Ok(info) = self.info(session_id) {
            return Ok(info);
        }
        match self.create_with(session_id, self.defaults.default_strategy()) {
            Err(MemoryError::AlreadyExists(_)) => self.info(session_id),
            other => other,
        }
    }

    /// Empty a session's history and summary, keeping its strategy.
    ///
    /// Fails with `NotFound` if the session is not bound.
    pub fn clear(&self, session_id: &str) -> Result<()> {
        let cell = self.cell(session_id)?;
        let mut state = cell.lock_active()?;
        state.raw.clear();
        state.summary.clear();
        state.epoch += 1;
        state.folding = false;
        state.clear_count += 1;
        state.updated_at = Utc::now();
        debug!(session = session_id, clears = state.clear_count, "cleared memory session");
        Ok(())
    }

    /// Remove a session. Returns whether it existed; absent ids are a no-op.
    pub fn delete(&self, session_id: &str) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);

        match removed {
            Some(cell) => {
                let mut state = cell.lock();
                state.lifecycle = Lifecycle::Deleted;
                state.epoch += 1;
                state.folding = false;
                debug!(session = session_id, "deleted memory session");
                true
            }
            None => false,
        }
    }

    // ────────────── Writes ──────────────

    /// Record one exchange.
    ///
    /// `buffer` and `buffer_window` sessions complete without awaiting
    /// anything. Summary sessions additionally fold due exchanges through the
    /// condenser; condensation failures are logged and the exchanges stay raw.
    pub async fn append(
        &self,
        session_id: &str,
        human: impl Into<String>,
        ai: impl Into<String>,
    ) -> Result<()> {
        let cell = self.cell(session_id)?;

        let job = {
            let mut guard = cell.lock_active()?;
            let state = &mut *guard;
            state.raw.push_back(Exchange::new(human, ai));
            state.updated_at = Utc::now();

            let due = state.policy.on_append(&mut state.raw);
            if due == 0 {
                return Ok(());
            }
            if state.folding {
                debug!(session = session_id, due, "fold already in flight, deferring");
                return Ok(());
            }

            state.folding = true;
            FoldJob {
                epoch: state.epoch,
                summary: state.summary.clone(),
                pending: state.raw.iter().take(due).cloned().collect(),
            }
        };

        let _fold = FoldGuard {
            cell: Arc::clone(&cell),
            epoch: job.epoch,
        };
        let (summary, folded) = self.fold(session_id, job.summary, &job.pending).await;

        let mut state = cell.lock();
        if state.epoch != job.epoch || state.lifecycle == Lifecycle::Deleted {
            debug!(session = session_id, "session cleared during fold, discarding");
            return Ok(());
        }
        if folded > 0 {
            state.summary = summary;
            state.raw.drain(..folded);
            state.updated_at = Utc::now();
            debug!(
                session = session_id,
                folded,
                remaining = state.raw.len(),
                "folded exchanges into summary"
            );
        }
        Ok(())
    }

    /// Run the condenser over `pending`, oldest first, stopping at the first
    /// failure. Returns the new summary and how many exchanges it covers.
    async fn fold(&self, session_id: &str, mut summary: String, pending: &[Exchange]) -> (String, usize) {
        let mut folded = 0;
        for exchange in pending {
            let call = self.condenser.condense(&summary, exchange);
            match tokio::time::timeout(self.condense_timeout, call).await {
                Ok(Ok(next)) => {
                    summary = next;
                    folded += 1;
                }
                Ok(Err(e)) => {
                    warn!(session = session_id, error = %e, "condensation failed, keeping exchanges raw");
                    break;
                }
                Err(_) => {
                    warn!(
                        session = session_id,
                        timeout_secs = self.condense_timeout.as_secs_f64(),
                        "condensation timed out, keeping exchanges raw"
                    );
                    break;
                }
            }
        }
        (summary, folded)
    }

    // ────────────── Reads ──────────────

    /// Raw exchanges currently held, oldest first. The copy is the caller's.
    pub fn history(&self, session_id: &str) -> Result<Vec<Exchange>> {
        let cell = self.cell(session_id)?;
        let state = cell.lock_active()?;
        Ok(state.policy.current_history(&state.raw))
    }

    /// The running summary (empty for buffer strategies).
    pub fn summary(&self, session_id: &str) -> Result<String> {
        let cell = self.cell(session_id)?;
        let state = cell.lock_active()?;
        Ok(state.summary.clone())
    }

    /// Prompt-ready context: the summary as a system message (if any)
    /// followed by the raw exchanges as user/assistant turns.
    pub fn context(&self, session_id: &str) -> Result<Vec<Message>> {
        let cell = self.cell(session_id)?;
        let state = cell.lock_active()?;

        let mut messages = Vec::with_capacity(state.raw.len() * 2 + 1);
        if !state.summary.is_empty() {
            messages.push(Message::system(format!(
                "{SUMMARY_CONTEXT_PREFIX}\n{}",
                state.summary
            )));
        }
        for exchange in state.policy.current_history(&state.raw) {
            messages.extend(exchange.to_messages());
        }
        Ok(messages)
    }

    pub fn info(&self, session_id: &str) -> Result<SessionInfo> {
        let cell = self.cell(session_id)?;
        let state = cell.lock_active()?;
        Ok(state.info(session_id))
    }

    /// Every bound session, sorted by id.
    pub fn list(&self) -> Vec<SessionInfo> {
        let cells: Vec<Arc<SessionCell>> = self.read_registry().values().cloned().collect();
        let mut infos: Vec<SessionInfo> = cells
            .iter()
            .filter_map(|cell| cell.lock_active().ok().map(|s| s.info(&cell.id)))
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    // ────────────── Persistence hooks ──────────────

    /// Full state of a session for a persistence collaborator.
    pub fn snapshot(&self, session_id: &str) -> Result<SessionSnapshot> {
        let cell = self.cell(session_id)?;
        let state = cell.lock_active()?;
        Ok(SessionSnapshot {
            id: session_id.to_string(),
            strategy: state.strategy,
            exchanges: state.raw.iter().cloned().collect(),
            summary: state.summary.clone(),
            clear_count: state.clear_count,
            created_at: state.created_at,
            updated_at: state.updated_at,
        })
    }

    /// Rebind a session from a snapshot, e.g. after a restart.
    ///
    /// A window snapshot holding more than K exchanges is trimmed to the
    /// newest K.
    pub fn restore(&self, mut snapshot: SessionSnapshot) -> Result<SessionInfo> {
        snapshot.strategy.validate()?;
        if let MemoryStrategy::BufferWindow { k } = snapshot.strategy {
            if snapshot.exchanges.len() > k {
                warn!(
                    session = %snapshot.id,
                    stored = snapshot.exchanges.len(),
                    k,
                    "snapshot exceeds window, trimming"
                );
                let excess = snapshot.exchanges.len() - k;
                snapshot.exchanges.drain(..excess);
            }
        }
        let id = snapshot.id.clone();
        let info = self.insert(snapshot)?;
        debug!(session = %id, exchanges = info.exchanges, "restored memory session");
        Ok(info)
    }

    // ────────────── Internals ──────────────

    fn read_registry(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<SessionCell>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn cell(&self, session_id: &str) -> Result<Arc<SessionCell>> {
        self.read_registry()
            .get(session_id)
            .cloned()
            .ok_or_else(|| MemoryError::NotFound(session_id.to_string()))
    }

    fn insert(&self, snapshot: SessionSnapshot) -> Result<SessionInfo> {
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if sessions.contains_key(&snapshot.id) {
            return Err(MemoryError::AlreadyExists(snapshot.id));
        }

        let id = snapshot.id.clone();
        let state = SessionState::from_snapshot(snapshot);
        let info = state.info(&id);
        sessions.insert(
            id.clone(),
            Arc::new(SessionCell {
                id,
                state: Mutex::new(state),
            }),
        );
        Ok(info)
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Appends each human message to the summary, comma separated.
    #[derive(Default)]
    struct JoinCondenser {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Condenser for JoinCondenser {
        async fn condense(&self, summary: &str, exchange: &Exchange) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if summary.is_empty() {
                Ok(exchange.human.clone())
            } else {
                Ok(format!("{summary},{}", exchange.human))
            }
        }
    }

    #[derive(Default)]
    struct FailingCondenser {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Condenser for FailingCondenser {
        async fn condense(&self, _summary: &str, _exchange: &Exchange) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(MemoryError::CondenseFailed("model offline".to_string()))
        }
    }

    /// Blocks inside `condense` until released.
    #[derive(Default)]
    struct GatedCondenser {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Condenser for GatedCondenser {
        async fn condense(&self, summary: &str, exchange: &Exchange) -> Result<String> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(format!("{summary}{}", exchange.human))
        }
    }

    struct SlowCondenser;

    #[async_trait]
    impl Condenser for SlowCondenser {
        async fn condense(&self, _summary: &str, _exchange: &Exchange) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("never".to_string())
        }
    }

    fn manager_with(condenser: Arc<dyn Condenser>) -> MemoryManager {
        MemoryManager::new(condenser, MemoryConfig::default())
    }

    fn pairs(history: &[Exchange]) -> Vec<(&str, &str)> {
        history.iter().map(Exchange::as_pair).collect()
    }

    // ── create ──

    #[test]
    fn test_create_duplicate_fails() {
        let mgr = MemoryManager::default();
        mgr.create("s1", "buffer", &MemoryParams::default()).unwrap();
        let err = mgr.create("s1", "buffer", &MemoryParams::default()).unwrap_err();
        assert_eq!(err, MemoryError::AlreadyExists("s1".to_string()));
    }

    #[test]
    fn test_create_invalid_strategy() {
        let mgr = MemoryManager::default();
        let err = mgr.create("s1", "vector", &MemoryParams::default()).unwrap_err();
        assert!(matches!(err, MemoryError::InvalidStrategy(name) if name == "vector"));
        assert!(mgr.is_empty());
    }

    #[test]
    fn test_create_invalid_parameter() {
        let mgr = MemoryManager::default();
        let err = mgr
            .create("s1", "buffer_window", &MemoryParams::window(0))
            .unwrap_err();
        assert_eq!(err, MemoryError::InvalidParameter { name: "k", value: 0 });

        let err = mgr
            .create("s2", "summary_buffer", &MemoryParams::recent(-1))
            .unwrap_err();
        assert!(matches!(err, MemoryError::InvalidParameter { name: "max_recent", .. }));
    }

    #[test]
    fn test_create_default_window() {
        let mgr = MemoryManager::default();
        let info = mgr
            .create("s1", "buffer_window", &MemoryParams::default())
            .unwrap();
        assert_eq!(info.strategy, MemoryStrategy::BufferWindow { k: 10 });
        assert_eq!(info.exchanges, 0);
    }

    // ── append / history ──

    #[tokio::test]
    async fn test_buffer_keeps_everything_in_order() {
        let mgr = MemoryManager::default();
        mgr.create("s1", "buffer", &MemoryParams::default()).unwrap();
        for i in 0..25 {
            mgr.append("s1", format!("q{i}"), format!("a{i}")).await.unwrap();
        }

        let history = mgr.history("s1").unwrap();
        assert_eq!(history.len(), 25);
        for (i, ex) in history.iter().enumerate() {
            assert_eq!(ex.human, format!("q{i}"));
            assert_eq!(ex.ai, format!("a{i}"));
        }
    }

    #[tokio::test]
    async fn test_window_scenario() {
        let mgr = MemoryManager::default();
        mgr.create("s1", "buffer_window", &MemoryParams::window(2)).unwrap();
        mgr.append("s1", "hi", "hello").await.unwrap();
        mgr.append("s1", "bye", "goodbye").await.unwrap();
        mgr.append("s1", "ok", "sure").await.unwrap();

        let history = mgr.history("s1").unwrap();
        assert_eq!(pairs(&history), [("bye", "goodbye"), ("ok", "sure")]);
    }

    #[tokio::test]
    async fn test_window_keeps_last_k() {
        let mgr = MemoryManager::default();
        mgr.create("w", "buffer_window", &MemoryParams::window(4)).unwrap();
        for i in 0..11 {
            mgr.append("w", format!("q{i}"), "a").await.unwrap();
            assert!(mgr.history("w").unwrap().len() <= 4);
        }
        let humans: Vec<String> = mgr.history("w").unwrap().into_iter().map(|e| e.human).collect();
        assert_eq!(humans, ["q7", "q8", "q9", "q10"]);
    }

    #[tokio::test]
    async fn test_append_unknown_session_is_not_found() {
        let mgr = MemoryManager::default();
        let err = mgr.append("ghost", "hi", "hello").await.unwrap_err();
        assert_eq!(err, MemoryError::NotFound("ghost".to_string()));
        assert!(mgr.is_empty());
    }

    #[tokio::test]
    async fn test_history_is_a_copy() {
        let mgr = MemoryManager::default();
        mgr.create("s1", "buffer", &MemoryParams::default()).unwrap();
        mgr.append("s1", "hi", "hello").await.unwrap();

        let mut history = mgr.history("s1").unwrap();
        history[0].human = "tampered".to_string();
        history.clear();

        assert_eq!(pairs(&mgr.history("s1").unwrap()), [("hi", "hello")]);
    }

    // ── clear / delete ──

    #[tokio::test]
    async fn test_clear_keeps_strategy() {
        let mgr = MemoryManager::default();
        mgr.create("s1", "buffer_window", &MemoryParams::window(2)).unwrap();
        for i in 0..3 {
            mgr.append("s1", format!("q{i}"), "a").await.unwrap();
        }

        mgr.clear("s1").unwrap();
        mgr.clear("s1").unwrap();
        assert!(mgr.history("s1").unwrap().is_empty());

        for i in 0..3 {
            mgr.append("s1", format!("n{i}"), "a").await.unwrap();
        }
        let info = mgr.info("s1").unwrap();
        assert_eq!(info.strategy, MemoryStrategy::BufferWindow { k: 2 });
        assert_eq!(info.exchanges, 2);
        assert_eq!(info.clear_count, 2);
    }

    #[test]
    fn test_clear_unknown_session() {
        let mgr = MemoryManager::default();
        assert_eq!(
            mgr.clear("nope").unwrap_err(),
            MemoryError::NotFound("nope".to_string())
        );
    }

    #[tokio::test]
    async fn test_delete_then_everything_is_not_found() {
        let mgr = MemoryManager::default();
        mgr.create("s1", "buffer", &MemoryParams::default()).unwrap();
        mgr.append("s1", "hi", "hello").await.unwrap();

        assert!(mgr.delete("s1"));
        assert!(!mgr.delete("s1"));

        let not_found = MemoryError::NotFound("s1".to_string());
        assert_eq!(mgr.append("s1", "a", "b").await.unwrap_err(), not_found);
        assert_eq!(mgr.history("s1").unwrap_err(), not_found);
        assert_eq!(mgr.clear("s1").unwrap_err(), not_found);
        assert_eq!(mgr.summary("s1").unwrap_err(), not_found);
        assert_eq!(mgr.snapshot("s1").unwrap_err(), not_found);

        // Rebinding starts fresh.
        mgr.create("s1", "summary", &MemoryParams::default()).unwrap();
        assert!(mgr.history("s1").unwrap().is_empty());
    }

    #[test]
    fn test_ensure_uses_default_strategy() {
        let defaults = MemoryConfig {
            default_strategy: "buffer_window".to_string(),
            window_size: 3,
            ..Default::default()
        };
        let mgr = MemoryManager::new(Arc::new(NoopCondenser), defaults);

        let info = mgr.ensure("chat:1").unwrap();
        assert_eq!(info.strategy, MemoryStrategy::BufferWindow { k: 3 });

        // Existing sessions are returned unchanged.
        mgr.create("chat:2", "summary", &MemoryParams::default()).unwrap();
        assert_eq!(mgr.ensure("chat:2").unwrap().strategy, MemoryStrategy::Summary);
        assert_eq!(mgr.len(), 2);
    }

    // ── summarization ──

    #[tokio::test]
    async fn test_summary_folds_every_exchange() {
        let condenser = Arc::new(JoinCondenser::default());
        let mgr = manager_with(condenser.clone());
        mgr.create("s", "summary", &MemoryParams::default()).unwrap();

        for q in ["a", "b", "c"] {
            mgr.append("s", q, "ok").await.unwrap();
        }

        assert!(mgr.history("s").unwrap().is_empty());
        assert_eq!(mgr.summary("s").unwrap(), "a,b,c");
        assert_eq!(condenser.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_summary_buffer_keeps_recent_raw() {
        let mgr = manager_with(Arc::new(JoinCondenser::default()));
        mgr.create("s", "summary_buffer", &MemoryParams::recent(2)).unwrap();

        for i in 0..5 {
            mgr.append("s", format!("q{i}"), format!("a{i}")).await.unwrap();
        }

        let history = mgr.history("s").unwrap();
        assert_eq!(pairs(&history), [("q3", "a3"), ("q4", "a4")]);
        assert_eq!(mgr.summary("s").unwrap(), "q0,q1,q2");
    }

    #[tokio::test]
    async fn test_failing_condenser_loses_nothing() {
        let condenser = Arc::new(FailingCondenser::default());
        let mgr = manager_with(condenser.clone());
        mgr.create("s", "summary_buffer", &MemoryParams::recent(2)).unwrap();

        for i in 0..6 {
            mgr.append("s", format!("q{i}"), "a").await.unwrap();
        }

        assert_eq!(mgr.history("s").unwrap().len(), 6);
        assert_eq!(mgr.summary("s").unwrap(), "");
        // Retried on every append that had something due.
        assert_eq!(condenser.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_fold_retries_backlog_after_recovery() {
        let mgr = MemoryManager::default();
        mgr.create("s", "summary", &MemoryParams::default()).unwrap();
        mgr.append("s", "q0", "a").await.unwrap();
        mgr.append("s", "q1", "a").await.unwrap();
        assert_eq!(mgr.history("s").unwrap().len(), 2);

        // Same state handed to a manager whose condenser works.
        let snapshot = mgr.snapshot("s").unwrap();
        let healthy = manager_with(Arc::new(JoinCondenser::default()));
        healthy.restore(snapshot).unwrap();
        healthy.append("s", "q2", "a").await.unwrap();

        assert!(healthy.history("s").unwrap().is_empty());
        assert_eq!(healthy.summary("s").unwrap(), "q0,q1,q2");
    }

    #[tokio::test]
    async fn test_condense_timeout_keeps_exchange_raw() {
        let mgr = manager_with(Arc::new(SlowCondenser))
            .with_condense_timeout(Duration::from_millis(50));
        mgr.create("s", "summary", &MemoryParams::default()).unwrap();

        mgr.append("s", "slow", "reply").await.unwrap();

        assert_eq!(pairs(&mgr.history("s").unwrap()), [("slow", "reply")]);
        assert_eq!(mgr.summary("s").unwrap(), "");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_clear_during_fold_discards_commit() {
        let condenser = Arc::new(GatedCondenser::default());
        let mgr = Arc::new(manager_with(condenser.clone()));
        mgr.create("s", "summary", &MemoryParams::default()).unwrap();

        let task = {
            let mgr = Arc::clone(&mgr);
            tokio::spawn(async move { mgr.append("s", "old", "reply").await })
        };

        condenser.entered.notified().await;
        // The session lock is free while the condenser runs.
        assert_eq!(mgr.history("s").unwrap().len(), 1);
        mgr.clear("s").unwrap();
        condenser.release.notify_one();
        task.await.unwrap().unwrap();

        assert!(mgr.history("s").unwrap().is_empty());
        assert_eq!(mgr.summary("s").unwrap(), "");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_append_during_fold_is_preserved() {
        let condenser = Arc::new(GatedCondenser::default());
        let mgr = Arc::new(manager_with(condenser.clone()));
        mgr.create("s", "summary", &MemoryParams::default()).unwrap();

        let task = {
            let mgr = Arc::clone(&mgr);
            tokio::spawn(async move { mgr.append("s", "first", "r").await })
        };
        condenser.entered.notified().await;

        // A fold is in flight, so this append only records the exchange.
        mgr.append("s", "second", "r").await.unwrap();
        condenser.release.notify_one();
        task.await.unwrap().unwrap();

        assert_eq!(mgr.summary("s").unwrap(), "first");
        assert_eq!(pairs(&mgr.history("s").unwrap()), [("second", "r")]);
    }

    #[tokio::test]
    async fn test_cancelled_fold_is_retried() {
        let condenser = Arc::new(GatedCondenser::default());
        let mgr = manager_with(condenser.clone());
        mgr.create("s", "summary", &MemoryParams::default()).unwrap();

        // Drop the append future while it waits on the condenser.
        let cancelled = tokio::time::timeout(
            Duration::from_millis(20),
            mgr.append("s", "first", "r"),
        )
        .await;
        assert!(cancelled.is_err());
        assert_eq!(mgr.history("s").unwrap().len(), 1);

        // The in-flight flag was reset, so the next append folds both.
        condenser.release.notify_one();
        let next = mgr.append("s", "second", "r");
        tokio::pin!(next);
        loop {
            tokio::select! {
                res = &mut next => { res.unwrap(); break; }
                _ = condenser.entered.notified() => condenser.release.notify_one(),
            }
        }

        assert!(mgr.history("s").unwrap().is_empty());
        assert_eq!(mgr.summary("s").unwrap(), "firstsecond");
    }

    // ── concurrency ──

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_same_session() {
        let mgr = Arc::new(MemoryManager::default());
        mgr.create("s", "buffer", &MemoryParams::default()).unwrap();
        mgr.create("w", "buffer_window", &MemoryParams::window(10)).unwrap();

        let mut tasks = Vec::new();
        for t in 0..8 {
            let mgr = Arc::clone(&mgr);
            tasks.push(tokio::spawn(async move {
                for i in 0..25 {
                    mgr.append("s", format!("t{t}-{i}"), "a").await.unwrap();
                    mgr.append("w", format!("t{t}-{i}"), "a").await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let history = mgr.history("s").unwrap();
        assert_eq!(history.len(), 200);
        assert_eq!(mgr.history("w").unwrap().len(), 10);

        // Each writer's exchanges appear in the order it appended them.
        for t in 0..8 {
            let prefix = format!("t{t}-");
            let seq: Vec<usize> = history
                .iter()
                .filter_map(|e| e.human.strip_prefix(&prefix))
                .map(|n| n.parse().unwrap())
                .collect();
            assert_eq!(seq, (0..25).collect::<Vec<_>>());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_summary_appends_lose_nothing() {
        let condenser = Arc::new(JoinCondenser::default());
        let mgr = Arc::new(manager_with(condenser.clone()));
        mgr.create("s", "summary_buffer", &MemoryParams::recent(3)).unwrap();

        let mut tasks = Vec::new();
        for t in 0..6 {
            let mgr = Arc::clone(&mgr);
            tasks.push(tokio::spawn(async move {
                for i in 0..20 {
                    mgr.append("s", format!("t{t}-{i}"), "a").await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let raw = mgr.history("s").unwrap().len();
        let folded = condenser.calls.load(Ordering::SeqCst);
        assert_eq!(raw + folded, 120);
        assert!(raw >= 3);

        let summary = mgr.summary("s").unwrap();
        assert_eq!(summary.split(',').count(), folded);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sessions_are_independent() {
        let mgr = Arc::new(MemoryManager::default());
        for s in 0..4 {
            mgr.create(&format!("s{s}"), "buffer", &MemoryParams::default()).unwrap();
        }

        let mut tasks = Vec::new();
        for s in 0..4 {
            let mgr = Arc::clone(&mgr);
            tasks.push(tokio::spawn(async move {
                let id = format!("s{s}");
                for i in 0..(s + 1) * 5 {
                    mgr.append(&id, format!("{i}"), "a").await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let counts: Vec<usize> = mgr.list().iter().map(|i| i.exchanges).collect();
        assert_eq!(counts, [5, 10, 15, 20]);
    }

    // ── context / snapshot ──

    #[tokio::test]
    async fn test_context_includes_summary_and_turns() {
        let mgr = manager_with(Arc::new(JoinCondenser::default()));
        mgr.create("s", "summary_buffer", &MemoryParams::recent(1)).unwrap();
        mgr.append("s", "old", "x").await.unwrap();
        mgr.append("s", "new", "y").await.unwrap();

        let context = mgr.context("s").unwrap();
        assert_eq!(context.len(), 3);
        assert_eq!(context[0], Message::system(format!("{SUMMARY_CONTEXT_PREFIX}\nold")));
        assert_eq!(context[1], Message::user("new"));
        assert_eq!(context[2], Message::assistant("y"));
    }

    #[tokio::test]
    async fn test_context_without_summary() {
        let mgr = MemoryManager::default();
        mgr.create("s", "buffer", &MemoryParams::default()).unwrap();
        mgr.append("s", "hi", "hello").await.unwrap();

        let context = mgr.context("s").unwrap();
        assert_eq!(context, [Message::user("hi"), Message::assistant("hello")]);
    }

    #[tokio::test]
    async fn test_snapshot_restore_round_trip() {
        let mgr = manager_with(Arc::new(JoinCondenser::default()));
        mgr.create("s", "summary_buffer", &MemoryParams::recent(1)).unwrap();
        mgr.append("s", "q0", "a0").await.unwrap();
        mgr.append("s", "q1", "a1").await.unwrap();
        mgr.clear("s").unwrap();
        mgr.append("s", "q2", "a2").await.unwrap();
        mgr.append("s", "q3", "a3").await.unwrap();

        let snapshot = mgr.snapshot("s").unwrap();
        let restored = MemoryManager::default();
        let info = restored.restore(snapshot.clone()).unwrap();

        assert_eq!(info.strategy, MemoryStrategy::SummaryBuffer { max_recent: 1 });
        assert_eq!(info.clear_count, 1);
        assert_eq!(restored.summary("s").unwrap(), "q2");
        assert_eq!(pairs(&restored.history("s").unwrap()), [("q3", "a3")]);
        assert_eq!(restored.snapshot("s").unwrap(), snapshot);
        assert!(matches!(
            restored.restore(snapshot),
            Err(MemoryError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_restore_trims_oversized_window_and_rejects_bad_params() {
        let mgr = MemoryManager::default();
        let mut snapshot = SessionSnapshot::new("w", MemoryStrategy::BufferWindow { k: 2 });
        snapshot.exchanges = (0..5).map(|i| Exchange::new(format!("q{i}"), "a")).collect();

        let info = mgr.restore(snapshot).unwrap();
        assert_eq!(info.exchanges, 2);
        assert_eq!(mgr.history("w").unwrap()[0].human, "q3");

        let bad = SessionSnapshot::new("bad", MemoryStrategy::BufferWindow { k: 0 });
        assert!(matches!(
            mgr.restore(bad),
            Err(MemoryError::InvalidParameter { name: "k", .. })
        ));
    }
}
