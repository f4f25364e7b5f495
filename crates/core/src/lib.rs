//! # browserpilot-core
//!
//! Core domain types and traits for the browserpilot agent:
//!
//! - Conversation value types ([`content::Turn`], [`content::Part`])
//! - The browser capability seam ([`computer::Computer`])
//! - The decision service contract ([`decision::DecisionClient`])
//! - The error taxonomy ([`error::Error`])
//! - Progress events for front ends ([`event::EventBus`])
//!
//! This crate has no I/O of its own; concrete backends live in the
//! `browserpilot-gateway` and downstream front-end crates.

pub mod computer;
pub mod content;
pub mod decision;
pub mod error;
pub mod event;

pub use computer::{Computer, EnvState, ScrollDirection};
pub use content::{ActionOutcome, ActionProposal, OutcomePayload, Part, Role, TaskId, Turn};
pub use decision::{Candidate, DecisionClient, DecisionRequest, DecisionResponse, FinishReason};
pub use error::{ActionError, AgentError, Error, GatewayError, Result};
pub use event::{AgentEvent, EventBus};
