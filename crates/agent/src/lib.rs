//! The browserpilot agent loop.
//!
//! Orchestrates one task execution: ask the decision service for the next
//! step, gate flagged actions behind confirmation, dispatch them against the
//! browser capability, fold results back into the transcript, prune stale
//! screenshots, and repeat until the service stops proposing actions.

pub mod runner;
pub mod safety;
pub mod transcript;

pub use runner::{AgentLoop, LoopState, StopSignal, TaskOutcome};
pub use safety::{AutoApprove, AutoDeny, ConfirmationPolicy, SafetyGate, SafetyVerdict};
pub use transcript::{Transcript, MAX_RECENT_TURNS_WITH_SCREENSHOTS};
