//! The conversation store for one task execution.
//!
//! Owned exclusively by the agent loop; created with a single seed user turn
//! carrying the task text, grown by one model turn and one user turn per
//! iteration, discarded when the loop terminates.
//!
//! Screenshots dominate the request payload sent on every iteration, and only
//! recent visual context helps the next decision, so [`Transcript::prune`]
//! clears screenshot bytes from all but the most recent screenshot-bearing
//! user turns while keeping their urls as text history.

use browserpilot_actions::dispatch::is_predefined_browser_action;
use browserpilot_core::content::{OutcomePayload, Part, Role, Turn};
use tracing::debug;

/// How many of the most recent screenshot-bearing user turns keep their image
/// payload.
pub const MAX_RECENT_TURNS_WITH_SCREENSHOTS: usize = 3;

/// An ordered sequence of turns with the screenshot-retention invariant.
#[derive(Debug, Clone)]
pub struct Transcript {
    turns: Vec<Turn>,
    retention: usize,
}

impl Transcript {
    /// Seed a new transcript with the task text.
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::user_text(task)],
            retention: MAX_RECENT_TURNS_WITH_SCREENSHOTS,
        }
    }

    /// Override the retention window (defaults to 3).
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    pub fn append_model_turn(&mut self, turn: Turn) {
        debug_assert_eq!(turn.role, Role::Model);
        self.turns.push(turn);
    }

    /// Append one user turn aggregating all action outcomes for a step.
    pub fn append_user_turn(&mut self, parts: Vec<Part>) {
        self.turns.push(Turn::user(parts));
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Clear screenshot bytes from user turns beyond the retention window.
    ///
    /// Scans newest to oldest, counting user turns that carry at least one
    /// browser-action outcome with a screenshot-eligible name. Once the count
    /// exceeds the window, every such outcome in the turn loses its image
    /// payload; urls and acknowledgment metadata survive. Custom action
    /// outcomes are never counted or cleared.
    pub fn prune(&mut self) {
        let mut turns_with_screenshots = 0usize;
        let mut cleared = 0usize;

        for turn in self.turns.iter_mut().rev() {
            if turn.role != Role::User {
                continue;
            }

            let has_screenshot = turn.parts.iter().any(|part| match part {
                Part::Outcome(outcome) => {
                    is_predefined_browser_action(&outcome.action)
                        && matches!(
                            &outcome.payload,
                            OutcomePayload::Browser {
                                screenshot: Some(_),
                                ..
                            }
                        )
                }
                _ => false,
            });
            if !has_screenshot {
                continue;
            }

            turns_with_screenshots += 1;
            if turns_with_screenshots <= self.retention {
                continue;
            }

            for part in &mut turn.parts {
                if let Part::Outcome(outcome) = part {
                    if !is_predefined_browser_action(&outcome.action) {
                        continue;
                    }
                    if let OutcomePayload::Browser { screenshot, .. } = &mut outcome.payload {
                        if screenshot.take().is_some() {
                            cleared += 1;
                        }
                    }
                }
            }
        }

        if cleared > 0 {
            debug!(cleared, retention = self.retention, "Pruned old screenshots");
        }
    }
}
