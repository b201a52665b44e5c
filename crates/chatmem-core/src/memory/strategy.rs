//! Memory strategies and the retention policies behind them.
//!
//! A session's `MemoryStrategy` is chosen once at creation and resolved into
//! a boxed [`RetentionPolicy`]; the manager only ever talks to the policy.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{MemoryError, Result};
use super::exchange::Exchange;
use crate::config::schema::MemoryConfig;

// ─────────────────────────────────────────────
// Strategy names
// ─────────────────────────────────────────────

/// The four recognised strategy names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Buffer,
    BufferWindow,
    Summary,
    SummaryBuffer,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::Buffer,
        StrategyKind::BufferWindow,
        StrategyKind::Summary,
        StrategyKind::SummaryBuffer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Buffer => "buffer",
            StrategyKind::BufferWindow => "buffer_window",
            StrategyKind::Summary => "summary",
            StrategyKind::SummaryBuffer => "summary_buffer",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        StrategyKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| MemoryError::InvalidStrategy(s.to_string()))
    }
}

// ─────────────────────────────────────────────
// Parameters
// ─────────────────────────────────────────────

/// Caller-supplied strategy parameters, validated at creation.
///
/// Signed so that zero and negative input can be reported as
/// `InvalidParameter` instead of failing to parse.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryParams {
    /// Window size K for `buffer_window`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<i64>,
    /// Raw exchanges N kept verbatim by `summary_buffer`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_recent: Option<i64>,
}

impl MemoryParams {
    pub fn window(k: i64) -> Self {
        MemoryParams {
            k: Some(k),
            ..Default::default()
        }
    }

    pub fn recent(max_recent: i64) -> Self {
        MemoryParams {
            max_recent: Some(max_recent),
            ..Default::default()
        }
    }
}

fn positive(name: &'static str, value: Option<i64>, default: usize) -> Result<usize> {
    match value {
        None if default > 0 => Ok(default),
        None => Err(MemoryError::InvalidParameter { name, value: 0 }),
        Some(v) if v > 0 => Ok(v as usize),
        Some(v) => Err(MemoryError::InvalidParameter { name, value: v }),
    }
}

// ─────────────────────────────────────────────
// MemoryStrategy
// ─────────────────────────────────────────────

/// A fully resolved memory strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemoryStrategy {
    /// Keep every exchange.
    Buffer,
    /// Keep only the most recent `k` exchanges.
    BufferWindow { k: usize },
    /// Fold every exchange into the running summary.
    Summary,
    /// Keep the `max_recent` newest exchanges raw, fold the rest.
    SummaryBuffer { max_recent: usize },
}

impl MemoryStrategy {
    /// Build a strategy from a kind and caller params, filling gaps from
    /// the configured defaults.
    pub fn build(kind: StrategyKind, params: &MemoryParams, defaults: &MemoryConfig) -> Result<Self> {
        match kind {
            StrategyKind::Buffer => Ok(MemoryStrategy::Buffer),
            StrategyKind::BufferWindow => Ok(MemoryStrategy::BufferWindow {
                k: positive("k", params.k, defaults.window_size)?,
            }),
            StrategyKind::Summary => Ok(MemoryStrategy::Summary),
            StrategyKind::SummaryBuffer => Ok(MemoryStrategy::SummaryBuffer {
                max_recent: positive("max_recent", params.max_recent, defaults.max_recent)?,
            }),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            MemoryStrategy::Buffer => StrategyKind::Buffer,
            MemoryStrategy::BufferWindow { .. } => StrategyKind::BufferWindow,
            MemoryStrategy::Summary => StrategyKind::Summary,
            MemoryStrategy::SummaryBuffer { .. } => StrategyKind::SummaryBuffer,
        }
    }

    /// Re-check sizes on a strategy that did not come through `build`
    /// (e.g. one read back from disk).
    pub fn validate(&self) -> Result<()> {
        match *self {
            MemoryStrategy::BufferWindow { k: 0 } => {
                Err(MemoryError::InvalidParameter { name: "k", value: 0 })
            }
            MemoryStrategy::SummaryBuffer { max_recent: 0 } => Err(MemoryError::InvalidParameter {
                name: "max_recent",
                value: 0,
            }),
            _ => Ok(()),
        }
    }

    /// Resolve into the policy object the manager drives.
    pub fn policy(&self) -> Box<dyn RetentionPolicy> {
        match *self {
            MemoryStrategy::Buffer => Box::new(KeepAll),
            MemoryStrategy::BufferWindow { k } => Box::new(Window { k }),
            MemoryStrategy::Summary => Box::new(Condensing { keep_raw: 0 }),
            MemoryStrategy::SummaryBuffer { max_recent } => Box::new(Condensing {
                keep_raw: max_recent,
            }),
        }
    }
}

impl fmt::Display for MemoryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryStrategy::BufferWindow { k } => write!(f, "buffer_window(k={k})"),
            MemoryStrategy::SummaryBuffer { max_recent } => {
                write!(f, "summary_buffer(max_recent={max_recent})")
            }
            other => f.write_str(other.kind().as_str()),
        }
    }
}

// ─────────────────────────────────────────────
// Retention policies
// ─────────────────────────────────────────────

/// Strategy-specific behaviour applied to a session's raw exchange queue.
pub trait RetentionPolicy: Send + Sync + fmt::Debug {
    /// Called after a new exchange was pushed onto the back of `raw`.
    ///
    /// May drop exchanges from the front. Returns how many of the oldest
    /// exchanges are now due for condensation.
    fn on_append(&self, raw: &mut VecDeque<Exchange>) -> usize;

    /// The history callers see, oldest first.
    fn current_history(&self, raw: &VecDeque<Exchange>) -> Vec<Exchange> {
        raw.iter().cloned().collect()
    }
}

#[derive(Debug)]
struct KeepAll;

impl RetentionPolicy for KeepAll {
    fn on_append(&self, _raw: &mut VecDeque<Exchange>) -> usize {
        0
    }
}

#[derive(Debug)]
struct Window {
    k: usize,
}

impl RetentionPolicy for Window {
    fn on_append(&self, raw: &mut VecDeque<Exchange>) -> usize {
        while raw.len() > self.k {
            raw.pop_front();
        }
        0
    }
}

/// Shared by `summary` (`keep_raw == 0`) and `summary_buffer`.
#[derive(Debug)]
struct Condensing {
    keep_raw: usize,
}

impl RetentionPolicy for Condensing {
    fn on_append(&self, raw: &mut VecDeque<Exchange>) -> usize {
        raw.len().saturating_sub(self.keep_raw)
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
