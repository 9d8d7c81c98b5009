use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Scanning,
    Evaluating,
    /// `index` is 1-based.
    Deleting { index: usize, total: usize },
    Summarizing,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => f.write_str("idle"),
            RunState::Scanning => f.write_str("scanning"),
            RunState::Evaluating => f.write_str("evaluating"),
            RunState::Deleting { index, total } => write!(f, "deleting {index}/{total}"),
            RunState::Summarizing => f.write_str("summarizing"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub message: String,
    pub state: RunState,
}

impl ProgressEvent {
    pub fn new(state: RunState, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            state,
        }
    }
}

pub trait ProgressSink {
    fn emit(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent),
{
    fn emit(&self, event: &ProgressEvent) {
        self(event)
    }
}

pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn emit(&self, event: &ProgressEvent) {
        info!(state = %event.state, "{}", event.message);
    }
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&self, _event: &ProgressEvent) {}
}
