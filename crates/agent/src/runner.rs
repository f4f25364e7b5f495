//! The top-level agent state machine.
//!
//! One [`AgentLoop::run_one_iteration`] call asks the decision service for
//! the next step, gates and dispatches every proposal in order, folds the
//! results into the transcript, and prunes. [`AgentLoop::run`] drives
//! iterations until the service stops proposing actions, a fatal error is
//! recorded, the stop signal fires, or the iteration ceiling is hit.
//!
//! The loop is single-threaded and synchronous in structure: each iteration
//! fully blocks on the decision call and on each dispatched action before
//! proceeding. Proposals from one step execute strictly in order — later
//! actions may depend on page state left by earlier ones.

use crate::safety::{ConfirmationPolicy, SafetyGate, SafetyVerdict};
use crate::transcript::Transcript;
use browserpilot_actions::{DispatchOutcome, Dispatcher};
use browserpilot_config::AppConfig;
use browserpilot_core::content::{ActionOutcome, ActionProposal, Part, TaskId};
use browserpilot_core::decision::{
    DecisionClient, DecisionRequest, FinishReason, GenerationConfig,
};
use browserpilot_core::error::{Error, GatewayError};
use browserpilot_core::event::{AgentEvent, EventBus};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Whether the loop should keep going after an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Continue,
    Complete,
}

/// What one task execution produced.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task_id: TaskId,
    pub iterations: u32,
    /// The model's closing reasoning, when the task finished normally.
    pub final_reasoning: Option<String>,
    /// Recorded reason when the task ended without finishing.
    pub failure: Option<String>,
}

/// Cooperative cancellation handle. Checked only between iterations: an
/// in-flight decision call or action dispatch always completes first.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The agent loop for one task execution. Owns its transcript; never shared
/// across concurrent tasks.
pub struct AgentLoop {
    client: Arc<dyn DecisionClient>,
    dispatcher: Dispatcher,
    gate: SafetyGate,
    transcript: Transcript,
    task_id: TaskId,
    model: String,
    generation: GenerationConfig,
    events: Arc<EventBus>,
    max_iterations: u32,
    stop: StopSignal,
    final_reasoning: Option<String>,
    failure: Option<String>,
}

impl AgentLoop {
    /// Create a new loop seeded with the task text.
    pub fn new(
        client: Arc<dyn DecisionClient>,
        dispatcher: Dispatcher,
        gate: SafetyGate,
        task: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            dispatcher,
            gate,
            transcript: Transcript::new(task),
            task_id: TaskId::new(),
            model: model.into(),
            generation: GenerationConfig::default(),
            events: Arc::new(EventBus::default()),
            max_iterations: 50,
            stop: StopSignal::new(),
            final_reasoning: None,
            failure: None,
        }
    }

    /// Wire a loop from configuration: gate timeout, generation parameters,
    /// iteration ceiling and screenshot retention all come from `config`.
    /// The `[retry]` section is consumed where the client is built
    /// (`browserpilot_gateway::build_from_config`), not here.
    pub fn from_config(
        config: &AppConfig,
        client: Arc<dyn DecisionClient>,
        dispatcher: Dispatcher,
        policy: Arc<dyn ConfirmationPolicy>,
        task: impl Into<String>,
    ) -> Self {
        let gate = SafetyGate::new(policy)
            .with_timeout(Duration::from_secs(config.agent.confirmation_timeout_secs));
        let mut agent = Self::new(client, dispatcher, gate, task, config.model.clone());
        agent.generation = GenerationConfig {
            temperature: config.generation.temperature,
            top_p: config.generation.top_p,
            top_k: config.generation.top_k,
            max_output_tokens: config.generation.max_output_tokens,
        };
        agent.max_iterations = config.agent.max_iterations;
        agent.transcript = agent
            .transcript
            .with_retention(config.agent.recent_screenshot_turns);
        agent
    }

    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    /// Set the hard iteration ceiling (defaults to 50).
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Attach an event bus for front-end observers.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Attach a shared stop signal.
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Run one full iteration of the state machine.
    pub async fn run_one_iteration(&mut self) -> Result<LoopState, Error> {
        let request = DecisionRequest {
            model: self.model.clone(),
            turns: self.transcript.turns().to_vec(),
            generation: self.generation.clone(),
            custom_actions: self.dispatcher.custom_declarations(),
        };

        let start = Instant::now();
        let response = self.client.generate(request).await?;
        let latency_ms = start.elapsed().as_millis() as u64;

        self.events.publish(AgentEvent::ModelResponded {
            task_id: self.task_id.to_string(),
            latency_ms,
            candidates: response.candidates.len(),
            timestamp: Utc::now(),
        });

        if response.candidates.is_empty() {
            if let Some(feedback) = response.feedback.as_ref().filter(|f| f.is_blocked()) {
                // Terminal content-policy rejection, not a transient fault.
                let reason = feedback.block_reason.clone().unwrap_or_default();
                error!(
                    task_id = %self.task_id,
                    block_reason = %reason,
                    block_message = feedback.block_reason_message.as_deref().unwrap_or(""),
                    "Safety block detected, stopping agent"
                );
                self.failure = Some(format!("Safety block: {reason}"));
                return Ok(LoopState::Complete);
            }
            return Err(GatewayError::EmptyResponse(
                "response carried no candidates and no block reason".into(),
            )
            .into());
        }

        let candidate = &response.candidates[0];
        debug!(task_id = %self.task_id, finish_reason = ?candidate.finish_reason, "Candidate received");

        let (reasoning, proposals) = match &candidate.turn {
            Some(turn) => {
                let reasoning = turn.text();
                let proposals: Vec<ActionProposal> =
                    turn.proposals().into_iter().cloned().collect();
                self.transcript.append_model_turn(turn.clone());
                (reasoning, proposals)
            }
            None => (None, Vec::new()),
        };

        // Malformed function call with nothing usable: re-issue the same
        // request without mutating history further.
        if proposals.is_empty()
            && reasoning.is_none()
            && candidate.finish_reason == Some(FinishReason::MalformedFunctionCall)
        {
            warn!(task_id = %self.task_id, "Malformed function call, retrying request");
            return Ok(LoopState::Continue);
        }

        if proposals.is_empty() {
            info!(
                task_id = %self.task_id,
                reasoning = reasoning.as_deref().unwrap_or(""),
                "No proposals — task complete"
            );
            self.final_reasoning = reasoning;
            return Ok(LoopState::Complete);
        }

        let mut parts = Vec::with_capacity(proposals.len());

        for proposal in &proposals {
            let mut acknowledged = false;

            if let Some(payload) = proposal.safety_decision() {
                self.events.publish(AgentEvent::SafetyConfirmationRequested {
                    task_id: self.task_id.to_string(),
                    explanation: payload
                        .get("explanation")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    timestamp: Utc::now(),
                });

                match self.gate.confirm(payload).await? {
                    SafetyVerdict::Terminate => {
                        // Ends the whole loop, before remaining proposals in
                        // this step are processed.
                        warn!(task_id = %self.task_id, action = %proposal.name, "Safety gate terminated the loop");
                        self.failure = Some("Terminated at safety confirmation".into());
                        return Ok(LoopState::Complete);
                    }
                    SafetyVerdict::Continue => acknowledged = true,
                }
            }

            let dispatch_start = Instant::now();
            let result = self.dispatcher.dispatch(proposal).await;

            self.events.publish(AgentEvent::ActionDispatched {
                task_id: self.task_id.to_string(),
                action: proposal.name.clone(),
                success: result.is_ok(),
                duration_ms: dispatch_start.elapsed().as_millis() as u64,
                timestamp: Utc::now(),
            });

            // Fail-fast: the first error aborts the remaining proposals of
            // this step (actions are not idempotent).
            match result? {
                DispatchOutcome::Browser(state) => {
                    self.events.publish(AgentEvent::ScreenshotCaptured {
                        task_id: self.task_id.to_string(),
                        url: state.url.clone(),
                        png: state.screenshot.clone(),
                        timestamp: Utc::now(),
                    });

                    let mut outcome =
                        ActionOutcome::browser(&proposal.name, state.url, state.screenshot);
                    if acknowledged {
                        outcome = outcome.acknowledged();
                    }
                    parts.push(Part::Outcome(outcome));
                }
                DispatchOutcome::Custom(payload) => {
                    let mut outcome = ActionOutcome::custom(&proposal.name, payload);
                    if acknowledged {
                        outcome = outcome.acknowledged();
                    }
                    parts.push(Part::Outcome(outcome));
                }
            }
        }

        self.transcript.append_user_turn(parts);
        self.transcript.prune();

        Ok(LoopState::Continue)
    }

    /// Drive iterations to completion.
    ///
    /// Fatal errors are converted into a recorded failure reason rather than
    /// propagated; the front end always gets a [`TaskOutcome`].
    pub async fn run(mut self) -> TaskOutcome {
        info!(task_id = %self.task_id, model = %self.model, "Starting agent loop");

        let mut iterations = 0u32;

        loop {
            if self.stop.is_requested() {
                info!(task_id = %self.task_id, iterations, "Stop requested, ending loop");
                break;
            }
            if iterations >= self.max_iterations {
                warn!(task_id = %self.task_id, ceiling = self.max_iterations, "Iteration ceiling reached");
                self.failure = Some(format!(
                    "Reached maximum iterations ({})",
                    self.max_iterations
                ));
                break;
            }

            iterations += 1;
            self.events.publish(AgentEvent::IterationStarted {
                task_id: self.task_id.to_string(),
                iteration: iterations,
                timestamp: Utc::now(),
            });
            debug!(task_id = %self.task_id, iteration = iterations, "Agent loop iteration");

            match self.run_one_iteration().await {
                Ok(LoopState::Continue) => {}
                Ok(LoopState::Complete) => break,
                Err(e) => {
                    error!(task_id = %self.task_id, error = %e, "Iteration failed, aborting task");
                    self.failure = Some(e.to_string());
                    break;
                }
            }
        }

        match &self.failure {
            Some(reason) => self.events.publish(AgentEvent::TaskFailed {
                task_id: self.task_id.to_string(),
                reason: reason.clone(),
                timestamp: Utc::now(),
            }),
            None => self.events.publish(AgentEvent::TaskCompleted {
                task_id: self.task_id.to_string(),
                iterations,
                final_reasoning: self.final_reasoning.clone(),
                timestamp: Utc::now(),
            }),
        }

        info!(
            task_id = %self.task_id,
            iterations,
            failed = self.failure.is_some(),
            "Agent loop finished"
        );

        TaskOutcome {
            task_id: self.task_id,
            iterations,
            final_reasoning: self.final_reasoning,
            failure: self.failure,
        }
    }
}
