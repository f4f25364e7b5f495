//! The action dispatcher.
//!
//! Turns one [`ActionProposal`] into one [`Computer`] call: validates the
//! arguments against the typed schema, denormalizes pointer coordinates from
//! the 0–1000 virtual axis to live viewport pixels, and times and logs every
//! dispatch. Unrecognized names fail closed with [`ActionError::Unsupported`].
//!
//! Capability errors propagate unchanged — actions are not assumed idempotent,
//! so blind retry at this layer would be unsafe.

use crate::custom::CustomActionRegistry;
use crate::schema::{
    parse_args, DragAndDropArgs, KeyCombinationArgs, NavigateArgs, PointArgs, ScrollAtArgs,
    ScrollDocumentArgs, TypeTextArgs,
};
use browserpilot_core::{ActionError, ActionProposal, Computer, EnvState, ScrollDirection};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// The fixed set of built-in browser-actuation primitives, by wire name.
/// Results of these actions are eligible for screenshot-retention pruning.
pub const PREDEFINED_BROWSER_ACTIONS: &[&str] = &[
    "open_web_browser",
    "click_at",
    "hover_at",
    "type_text_at",
    "scroll_document",
    "scroll_at",
    "wait_5_seconds",
    "go_back",
    "go_forward",
    "search",
    "navigate",
    "key_combination",
    "drag_and_drop",
];

/// Whether an action name belongs to the predefined browser set.
pub fn is_predefined_browser_action(name: &str) -> bool {
    PREDEFINED_BROWSER_ACTIONS.contains(&name)
}

/// What one dispatch produced.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// A predefined browser action returned page state.
    Browser(EnvState),
    /// A custom action returned an opaque payload.
    Custom(serde_json::Value),
}

/// Maps action proposals to capability calls.
pub struct Dispatcher {
    computer: Arc<dyn Computer>,
    custom: CustomActionRegistry,
}

impl Dispatcher {
    pub fn new(computer: Arc<dyn Computer>) -> Self {
        Self {
            computer,
            custom: CustomActionRegistry::new(),
        }
    }

    /// Attach a registry of custom actions.
    pub fn with_custom_actions(mut self, custom: CustomActionRegistry) -> Self {
        self.custom = custom;
        self
    }

    /// Declarations for every registered custom action.
    pub fn custom_declarations(&self) -> Vec<browserpilot_core::decision::ActionDeclaration> {
        self.custom.declarations()
    }

    /// Execute one proposal against the capability.
    pub async fn dispatch(&self, proposal: &ActionProposal) -> Result<DispatchOutcome, ActionError> {
        debug!(action = %proposal.name, args = ?proposal.args, "Dispatching action");
        let start = Instant::now();

        let result = self.dispatch_inner(proposal).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(DispatchOutcome::Browser(state)) => {
                info!(
                    action = %proposal.name,
                    duration_ms,
                    url = %state.url,
                    screenshot_bytes = state.screenshot.len(),
                    "Action completed"
                );
            }
            Ok(DispatchOutcome::Custom(payload)) => {
                info!(action = %proposal.name, duration_ms, %payload, "Custom action completed");
            }
            Err(e) => {
                error!(action = %proposal.name, duration_ms, error = %e, "Action failed");
            }
        }

        result
    }

    async fn dispatch_inner(&self, proposal: &ActionProposal) -> Result<DispatchOutcome, ActionError> {
        let args = &proposal.args;

        let state = match proposal.name.as_str() {
            "open_web_browser" => self.computer.open_web_browser().await?,

            "click_at" => {
                let p: PointArgs = parse_args(&proposal.name, args)?;
                let (x, y) = self.denormalize_point(p.x, p.y).await?;
                self.computer.click_at(x, y).await?
            }

            "hover_at" => {
                let p: PointArgs = parse_args(&proposal.name, args)?;
                let (x, y) = self.denormalize_point(p.x, p.y).await?;
                self.computer.hover_at(x, y).await?
            }

            "type_text_at" => {
                let t: TypeTextArgs = parse_args(&proposal.name, args)?;
                let (x, y) = self.denormalize_point(t.x, t.y).await?;
                self.computer
                    .type_text_at(x, y, &t.text, t.press_enter, t.clear_before_typing)
                    .await?
            }

            "scroll_document" => {
                let s: ScrollDocumentArgs = parse_args(&proposal.name, args)?;
                let direction: ScrollDirection = s.direction.parse()?;
                self.computer.scroll_document(direction).await?
            }

            "scroll_at" => {
                let s: ScrollAtArgs = parse_args(&proposal.name, args)?;
                let direction: ScrollDirection = s.direction.parse()?;
                let (width, height) = self.computer.screen_size().await?;
                let x = denormalize(s.x, width);
                let y = denormalize(s.y, height);
                // Magnitude scales along the axis it moves on.
                let magnitude = if direction.is_vertical() {
                    denormalize(s.magnitude, height)
                } else {
                    denormalize(s.magnitude, width)
                };
                self.computer.scroll_at(x, y, direction, magnitude).await?
            }

            "wait_5_seconds" => self.computer.wait_fixed_interval().await?,

            "go_back" => self.computer.go_back().await?,

            "go_forward" => self.computer.go_forward().await?,

            "search" => self.computer.search().await?,

            "navigate" => {
                let n: NavigateArgs = parse_args(&proposal.name, args)?;
                let url = ensure_scheme(&n.url);
                self.computer.navigate(&url).await?
            }

            "key_combination" => {
                let k: KeyCombinationArgs = parse_args(&proposal.name, args)?;
                self.computer.key_combination(&k.key_list()).await?
            }

            "drag_and_drop" => {
                let d: DragAndDropArgs = parse_args(&proposal.name, args)?;
                let (width, height) = self.computer.screen_size().await?;
                self.computer
                    .drag_and_drop(
                        denormalize(d.x, width),
                        denormalize(d.y, height),
                        denormalize(d.destination_x, width),
                        denormalize(d.destination_y, height),
                    )
                    .await?
            }

            name => {
                if let Some(action) = self.custom.get(name) {
                    let payload = action.execute(args.clone()).await?;
                    return Ok(DispatchOutcome::Custom(payload));
                }
                return Err(ActionError::Unsupported(name.to_string()));
            }
        };

        Ok(DispatchOutcome::Browser(state))
    }

    /// Denormalize a point against the live viewport. Queried per dispatch so
    /// mid-session viewport changes are respected.
    async fn denormalize_point(&self, x: u32, y: u32) -> Result<(u32, u32), ActionError> {
        let (width, height) = self.computer.screen_size().await?;
        Ok((denormalize(x, width), denormalize(y, height)))
    }
}

/// `floor(v / 1000 * axis)` — proposals express coordinates on a fixed
/// 0–1000 virtual axis regardless of actual viewport size.
pub fn denormalize(v: u32, axis: u32) -> u32 {
    (v as u64 * axis as u64 / 1000) as u32
}

/// Prefix `https://` when the proposal carried no scheme.
fn ensure_scheme(url: &str) -> String {
    if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}
