//! The browser capability seam.
//!
//! A [`Computer`] executes one primitive browser action and returns the
//! resulting page state. Implementations (CDP, WebDriver, a recording fake for
//! tests) live outside this workspace; the agent loop only ever talks to the
//! trait. All coordinate-taking methods receive already-denormalized pixel
//! coordinates — the 0–1000 virtual axis is resolved by the dispatcher.

use crate::error::ActionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The canonical result of a browser action: where the page ended up and what
/// it looked like.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvState {
    pub url: String,
    /// PNG-encoded screenshot of the viewport.
    pub screenshot: Vec<u8>,
}

impl EnvState {
    pub fn new(url: impl Into<String>, screenshot: Vec<u8>) -> Self {
        Self {
            url: url.into(),
            screenshot,
        }
    }
}

/// Scroll direction for `scroll_document` and `scroll_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    /// Whether the scroll moves along the vertical axis.
    pub fn is_vertical(self) -> bool {
        matches!(self, ScrollDirection::Up | ScrollDirection::Down)
    }
}

impl std::str::FromStr for ScrollDirection {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(ScrollDirection::Up),
            "down" => Ok(ScrollDirection::Down),
            "left" => Ok(ScrollDirection::Left),
            "right" => Ok(ScrollDirection::Right),
            other => Err(ActionError::UnknownDirection(other.to_string())),
        }
    }
}

impl std::fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
            ScrollDirection::Left => "left",
            ScrollDirection::Right => "right",
        };
        write!(f, "{s}")
    }
}

/// One primitive browser actuation backend.
///
/// Actions are not assumed idempotent; callers must not blindly retry a failed
/// call. Errors propagate unchanged to the agent loop.
#[async_trait]
pub trait Computer: Send + Sync {
    async fn open_web_browser(&self) -> Result<EnvState, ActionError>;

    async fn click_at(&self, x: u32, y: u32) -> Result<EnvState, ActionError>;

    async fn hover_at(&self, x: u32, y: u32) -> Result<EnvState, ActionError>;

    async fn type_text_at(
        &self,
        x: u32,
        y: u32,
        text: &str,
        press_enter: bool,
        clear_before_typing: bool,
    ) -> Result<EnvState, ActionError>;

    async fn scroll_document(&self, direction: ScrollDirection) -> Result<EnvState, ActionError>;

    async fn scroll_at(
        &self,
        x: u32,
        y: u32,
        direction: ScrollDirection,
        magnitude: u32,
    ) -> Result<EnvState, ActionError>;

    /// Block for the backend's fixed settle interval, then re-capture state.
    async fn wait_fixed_interval(&self) -> Result<EnvState, ActionError>;

    async fn go_back(&self) -> Result<EnvState, ActionError>;

    async fn go_forward(&self) -> Result<EnvState, ActionError>;

    /// Navigate to the backend's default search page.
    async fn search(&self) -> Result<EnvState, ActionError>;

    /// Navigate to an absolute URL. The dispatcher prefixes `https://` when
    /// the proposal carried no scheme.
    async fn navigate(&self, url: &str) -> Result<EnvState, ActionError>;

    /// Press the given keys together, in order.
    async fn key_combination(&self, keys: &[String]) -> Result<EnvState, ActionError>;

    async fn drag_and_drop(
        &self,
        x: u32,
        y: u32,
        destination_x: u32,
        destination_y: u32,
    ) -> Result<EnvState, ActionError>;

    /// Current viewport size as `(width, height)` in pixels. Queried live on
    /// every dispatch so mid-session viewport changes are respected.
    async fn screen_size(&self) -> Result<(u32, u32), ActionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn direction_parses_known_values() {
        assert_eq!(ScrollDirection::from_str("up").unwrap(), ScrollDirection::Up);
        assert_eq!(
            ScrollDirection::from_str("right").unwrap(),
            ScrollDirection::Right
        );
    }

    #[test]
    fn direction_rejects_unknown_value() {
        let err = ScrollDirection::from_str("sideways").unwrap_err();
        assert!(matches!(err, ActionError::UnknownDirection(d) if d == "sideways"));
    }

    #[test]
    fn direction_axis() {
        assert!(ScrollDirection::Up.is_vertical());
        assert!(ScrollDirection::Down.is_vertical());
        assert!(!ScrollDirection::Left.is_vertical());
        assert!(!ScrollDirection::Right.is_vertical());
    }
}
