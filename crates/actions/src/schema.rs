//! Typed argument schemas for the predefined browser actions.
//!
//! Proposal arguments arrive as a loose JSON mapping. Each action has a typed
//! struct here; presence and types are validated at dispatch time and failures
//! surface as [`ActionError::InvalidArguments`] instead of key-lookup panics.

use browserpilot_core::ActionError;
use serde::Deserialize;

/// Parse a proposal's argument mapping into a typed schema.
pub fn parse_args<T: for<'de> Deserialize<'de>>(
    action: &str,
    args: &serde_json::Map<String, serde_json::Value>,
) -> Result<T, ActionError> {
    serde_json::from_value(serde_json::Value::Object(args.clone())).map_err(|e| {
        ActionError::InvalidArguments {
            action: action.to_string(),
            reason: e.to_string(),
        }
    })
}

/// `click_at`, `hover_at`: a normalized point on the 0–1000 axis.
#[derive(Debug, Clone, Deserialize)]
pub struct PointArgs {
    pub x: u32,
    pub y: u32,
}

/// `type_text_at`.
#[derive(Debug, Clone, Deserialize)]
pub struct TypeTextArgs {
    pub x: u32,
    pub y: u32,
    pub text: String,

    #[serde(default)]
    pub press_enter: bool,

    #[serde(default = "default_true")]
    pub clear_before_typing: bool,
}

fn default_true() -> bool {
    true
}

/// `scroll_document`. The direction arrives as the raw wire literal; the
/// dispatcher parses it, so an unrecognized value surfaces as
/// [`UnknownDirection`](browserpilot_core::ActionError::UnknownDirection)
/// rather than a schema failure.
#[derive(Debug, Clone, Deserialize)]
pub struct ScrollDocumentArgs {
    pub direction: String,
}

/// `scroll_at`. The magnitude is itself normalized on the 0–1000 scale and is
/// denormalized along the axis matching the direction.
#[derive(Debug, Clone, Deserialize)]
pub struct ScrollAtArgs {
    pub x: u32,
    pub y: u32,
    pub direction: String,

    #[serde(default = "default_magnitude")]
    pub magnitude: u32,
}

fn default_magnitude() -> u32 {
    800
}

/// `navigate`.
#[derive(Debug, Clone, Deserialize)]
pub struct NavigateArgs {
    pub url: String,
}

/// `key_combination`: keys arrive as a single `"+"`-joined string.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyCombinationArgs {
    pub keys: String,
}

impl KeyCombinationArgs {
    /// Split into the ordered key list the capability expects.
    pub fn key_list(&self) -> Vec<String> {
        self.keys.split('+').map(str::to_string).collect()
    }
}

/// `drag_and_drop`.
#[derive(Debug, Clone, Deserialize)]
pub struct DragAndDropArgs {
    pub x: u32,
    pub y: u32,
    pub destination_x: u32,
    pub destination_y: u32,
}
