//! Compute-agent boundary and a scripted agent.

use crate::error::AgentError;
use crate::games::quoridor::Move;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, instrument};

/// Search mode of a compute agent.
///
/// Wire shape: `"greedy"` or `{"searchBudget": n}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AgentMode {
    /// Pick the best immediate move.
    Greedy,
    /// Search with a fixed step budget.
    SearchBudget(u32),
}

impl Default for AgentMode {
    fn default() -> Self {
        AgentMode::SearchBudget(2000)
    }
}

/// A move-selection agent hosted on a worker thread.
///
/// Calls are blocking; the worker channel never invokes them on the async runtime.
pub trait ComputeAgent: Send + 'static {
    /// Informs the agent of a move played on its board.
    fn send(&mut self, candidate: &Move) -> Result<(), AgentError>;

    /// Chooses and plays the agent's next move.
    fn receive(&mut self) -> Result<Move, AgentError>;

    /// Switches search mode.
    fn set_mode(&mut self, mode: AgentMode);
}

/// Builds a fresh agent for every new game or resynchronization.
pub type AgentFactory = Arc<dyn Fn() -> Box<dyn ComputeAgent> + Send + Sync>;

/// Agent that plays a fixed list of moves in order.
#[derive(Debug, Default)]
pub struct ScriptedAgent {
    script: VecDeque<Move>,
    mode: AgentMode,
    heard: Option<mpsc::UnboundedSender<Move>>,
}

impl ScriptedAgent {
    /// Creates an agent that answers with `script`, one move per turn.
    pub fn new(script: impl IntoIterator<Item = Move>) -> Self {
        Self {
            script: script.into_iter().collect(),
            mode: AgentMode::default(),
            heard: None,
        }
    }

    /// Forwards every move the agent is told about to `heard`.
    pub fn observed_by(mut self, heard: mpsc::UnboundedSender<Move>) -> Self {
        self.heard = Some(heard);
        self
    }

    /// Current search mode. Scripted play ignores it.
    pub fn mode(&self) -> AgentMode {
        self.mode
    }

    /// Moves left in the script.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl ComputeAgent for ScriptedAgent {
    #[instrument(skip(self))]
    fn send(&mut self, candidate: &Move) -> Result<(), AgentError> {
        if let Some(heard) = &self.heard {
            // A dropped observer only stops the echo.
            let _ = heard.send(*candidate);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(remaining = self.script.len()))]
    fn receive(&mut self) -> Result<Move, AgentError> {
        let next = self
            .script
            .pop_front()
            .ok_or_else(|| AgentError::new("Script exhausted"))?;
        debug!(%next, "Scripted agent played");
        Ok(next)
    }

    fn set_mode(&mut self, mode: AgentMode) {
        debug!(?mode, "Scripted agent mode set");
        self.mode = mode;
    }
}
