use bench_common::{BenchError, BenchResult, NodeIndex};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt;

const MAX_HISTORY: usize = 64;

/// Lifecycle of one node worker.
///
/// ```text
/// Starting -> Streaming -> (Parsing -> Writing)* -> Terminated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Child process is being spawned
    Starting,
    /// Waiting for the next batch terminator on the child's stdout
    Streaming,
    /// Turning a complete block into a record
    Parsing,
    /// Appending the record to the node's result file
    Writing,
    /// Child exited, stream closed, spawn failed or worker cancelled
    Terminated,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeState::Starting => write!(f, "starting"),
            NodeState::Streaming => write!(f, "streaming"),
            NodeState::Parsing => write!(f, "parsing"),
            NodeState::Writing => write!(f, "writing"),
            NodeState::Terminated => write!(f, "terminated"),
        }
    }
}

impl NodeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeState::Terminated)
    }
}

/// A recorded state change.
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from_state: NodeState,
    pub to_state: NodeState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Validated state machine owned by a single node worker.
#[derive(Debug, Clone)]
pub struct NodeStateMachine {
    node: NodeIndex,
    current_state: NodeState,
    state_history: VecDeque<StateTransition>,
    last_transition_time: DateTime<Utc>,
}

impl NodeStateMachine {
    pub fn new(node: NodeIndex) -> Self {
        Self {
            node,
            current_state: NodeState::Starting,
            state_history: VecDeque::new(),
            last_transition_time: Utc::now(),
        }
    }

    pub fn node(&self) -> NodeIndex {
        self.node
    }

    pub fn current_state(&self) -> NodeState {
        self.current_state
    }

    /// Most recent transitions, oldest first.
    pub fn state_history(&self) -> impl Iterator<Item = &StateTransition> {
        self.state_history.iter()
    }

    pub fn last_transition_time(&self) -> DateTime<Utc> {
        self.last_transition_time
    }

    pub fn is_valid_transition(&self, target_state: NodeState) -> bool {
        use NodeState::*;

        match (self.current_state, target_state) {
            (Starting, Streaming) => true,
            (Starting, Terminated) => true,

            (Streaming, Parsing) => true,
            (Streaming, Terminated) => true,

            (Parsing, Writing) => true,
            // Malformed block: nothing to write
            (Parsing, Streaming) => true,

            (Writing, Streaming) => true,

            (Terminated, _) => false,

            // Read timeouts are recorded as Streaming -> Streaming
            (state, target) if state == target => true,

            _ => false,
        }
    }

    pub fn transition_to(&mut self, target_state: NodeState, reason: Option<String>) -> BenchResult<()> {
        if !self.is_valid_transition(target_state) {
            return Err(BenchError::invalid_state(
                self.node,
                target_state.to_string(),
                self.current_state.to_string(),
            ));
        }

        let now = Utc::now();
        let from_state = self.current_state;
        self.state_history.push_back(StateTransition {
            from_state,
            to_state: target_state,
            timestamp: now,
            reason,
        });
        if self.state_history.len() > MAX_HISTORY {
            self.state_history.pop_front();
        }

        self.current_state = target_state;
        self.last_transition_time = now;

        tracing::trace!(
            node = %self.node,
            "Worker transitioned from {} to {}",
            from_state,
            target_state
        );

        Ok(())
    }

    pub fn transition_to_streaming(&mut self) -> BenchResult<()> {
        self.transition_to(NodeState::Streaming, None)
    }

    pub fn transition_to_parsing(&mut self) -> BenchResult<()> {
        self.transition_to(NodeState::Parsing, None)
    }

    pub fn transition_to_writing(&mut self) -> BenchResult<()> {
        self.transition_to(NodeState::Writing, None)
    }

    pub fn transition_to_terminated(&mut self, reason: impl Into<String>) -> BenchResult<()> {
        self.transition_to(NodeState::Terminated, Some(reason.into()))
    }
}
