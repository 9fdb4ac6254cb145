//! Error types used by the unitvisor runtime and its collaborators.
//!
//! This module defines one error enum per seam:
//!
//! - [`RuntimeError`] — errors raised by the orchestration runtime itself.
//! - [`AcquireError`] — errors raised by the acquisition collaborator.
//! - [`SinkError`] — errors raised by the persistence sink behind a batch writer.
//! - [`TxnError`] — errors raised while executing a transaction.
//! - [`AgentError`] — errors raised by behavior agents and their coordinator.
//!
//! The runtime distinguishes recoverable conditions (acquisition miss, sink
//! write failure, step failure) from programming-level invariant violations
//! (duplicate unit id, double agent activation). The former are retried or
//! skipped locally; the latter are returned eagerly and never swallowed.
//!
//! Each enum provides `as_label()` returning a short stable snake_case tag
//! for logs and metrics.

use std::time::Duration;
use thiserror::Error;

/// Errors produced by the orchestration runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A worker was registered twice for the same unit id.
    #[error("unit {unit:?} is already registered")]
    DuplicateUnit {
        /// The offending unit id.
        unit: String,
    },

    /// `start_all` was called while the orchestrator was already running.
    #[error("orchestrator is already running")]
    AlreadyRunning,

    /// The interval policy violates the adaptive-cadence contract
    /// (idle intervals must be strictly longer than the active interval).
    #[error("invalid interval policy for unit {unit:?}: {detail}")]
    InvalidIntervals {
        /// Unit whose policy failed validation.
        unit: String,
        /// Human-readable description of the violation.
        detail: String,
    },

    /// Shutdown grace period was exceeded; some workers had to be aborted.
    #[error("shutdown grace {grace:?} exceeded; stuck units: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Units that did not stop in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::DuplicateUnit { .. } => "runtime_duplicate_unit",
            RuntimeError::AlreadyRunning => "runtime_already_running",
            RuntimeError::InvalidIntervals { .. } => "runtime_invalid_intervals",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// Errors produced by the acquisition collaborator.
///
/// An acquisition failure is never fatal to the worker loop: the cycle is
/// skipped and the loop continues. A `None` reading (no error) is the normal
/// "nothing recognizable this cycle" outcome and is not represented here.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum AcquireError {
    /// The backend did not produce a reading within the configured timeout.
    #[error("acquisition timed out after {timeout:?}")]
    Timeout {
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// The backend failed to produce a reading.
    #[error("acquisition failed: {reason}")]
    Backend {
        /// The underlying failure message.
        reason: String,
    },
}

impl AcquireError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            AcquireError::Timeout { .. } => "acquire_timeout",
            AcquireError::Backend { .. } => "acquire_backend",
        }
    }
}

/// Errors produced by a persistence sink during a batch write.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SinkError {
    /// The sink rejected or failed the batch write.
    #[error("batch write failed: {reason}")]
    Write {
        /// The underlying failure message.
        reason: String,
    },

    /// The sink is permanently unavailable (no retry will help).
    #[error("sink unavailable: {reason}")]
    Unavailable {
        /// The underlying failure message.
        reason: String,
    },
}

impl SinkError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SinkError::Write { .. } => "sink_write",
            SinkError::Unavailable { .. } => "sink_unavailable",
        }
    }

    /// Indicates whether another flush attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SinkError::Write { .. })
    }
}

/// Errors produced while executing or submitting a transaction.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TxnError {
    /// A step failed after exhausting its retry budget.
    #[error("step {index} ({target}) failed: {reason}")]
    StepFailed {
        /// Zero-based index of the failed step.
        index: usize,
        /// Declared target of the failed step.
        target: String,
        /// The underlying failure message.
        reason: String,
    },

    /// A step exceeded its individual timeout.
    #[error("step {index} ({target}) timed out after {timeout:?}")]
    StepTimeout {
        /// Zero-based index of the timed-out step.
        index: usize,
        /// Declared target of the timed-out step.
        target: String,
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// The controller is shut down; the transaction was not accepted.
    #[error("transaction controller is closed")]
    Closed,

    /// The per-unit submission queue is full.
    #[error("transaction queue for unit {unit:?} is full")]
    QueueFull {
        /// The unit whose lane rejected the submission.
        unit: String,
    },
}

impl TxnError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TxnError::StepFailed { .. } => "txn_step_failed",
            TxnError::StepTimeout { .. } => "txn_step_timeout",
            TxnError::Closed => "txn_closed",
            TxnError::QueueFull { .. } => "txn_queue_full",
        }
    }
}

/// Errors produced by behavior agents and the per-unit coordinator.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum AgentError {
    /// `activate` was called for the agent that is already active.
    #[error("agent {name:?} is already active")]
    AlreadyActive {
        /// Name of the already-active agent.
        name: String,
    },

    /// The named agent was never registered with the coordinator.
    #[error("agent {name:?} is not registered")]
    Unregistered {
        /// The unknown agent name.
        name: String,
    },

    /// An agent's own work failed.
    #[error("agent execution failed: {reason}")]
    Failed {
        /// The underlying failure message.
        reason: String,
    },

    /// Coordinator state was poisoned by a panic while its lock was held.
    #[error("agent coordinator lock poisoned")]
    Poisoned,
}

impl AgentError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            AgentError::AlreadyActive { .. } => "agent_already_active",
            AgentError::Unregistered { .. } => "agent_unregistered",
            AgentError::Failed { .. } => "agent_failed",
            AgentError::Poisoned => "agent_poisoned",
        }
    }
}
