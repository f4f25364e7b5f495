//! Conversation value types.
//!
//! A task execution owns one ordered sequence of [`Turn`]s: the model emits a
//! turn of reasoning text and action proposals, the loop answers with a single
//! user turn carrying every action outcome for that step. These are the value
//! objects that cross the wire to the decision service on every iteration.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one task execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The decision service.
    Model,
    /// The driving loop, speaking for the user (task text and action outcomes).
    User,
}

/// One role-tagged unit of conversation, containing ordered parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    /// A user turn carrying plain text (the task seed).
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// A user turn carrying the given parts (action outcomes for one step).
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    /// A model turn carrying the given parts.
    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }

    /// All text parts joined with a single space, or `None` when there are none.
    pub fn text(&self) -> Option<String> {
        let pieces: Vec<&str> = self
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) if !t.is_empty() => Some(t.as_str()),
                _ => None,
            })
            .collect();
        if pieces.is_empty() {
            None
        } else {
            Some(pieces.join(" "))
        }
    }

    /// All action proposals in this turn, in order.
    pub fn proposals(&self) -> Vec<&ActionProposal> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Proposal(fc) => Some(fc),
                _ => None,
            })
            .collect()
    }
}

/// One element of a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Part {
    /// Reasoning or task text.
    Text(String),
    /// A named action the decision service wants executed.
    Proposal(ActionProposal),
    /// The result of executing an action, fed back to the service.
    Outcome(ActionOutcome),
}

/// A named action with a JSON argument mapping, emitted by the decision service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionProposal {
    pub name: String,

    #[serde(default)]
    pub args: serde_json::Map<String, serde_json::Value>,
}

impl ActionProposal {
    pub fn new(name: impl Into<String>, args: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// The raw safety payload, if the service flagged this proposal.
    pub fn safety_decision(&self) -> Option<&serde_json::Value> {
        self.args.get("safety_decision")
    }
}

/// The result of one executed action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// The action name this outcome answers.
    pub action: String,

    pub payload: OutcomePayload,

    /// Set when the safety gate approved this action, so the decision service
    /// sees the confirmation.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub safety_acknowledged: bool,
}

impl ActionOutcome {
    pub fn browser(action: impl Into<String>, url: impl Into<String>, screenshot: Vec<u8>) -> Self {
        Self {
            action: action.into(),
            payload: OutcomePayload::Browser {
                url: url.into(),
                screenshot: Some(screenshot),
            },
            safety_acknowledged: false,
        }
    }

    pub fn custom(action: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            action: action.into(),
            payload: OutcomePayload::Custom(value),
            safety_acknowledged: false,
        }
    }

    pub fn acknowledged(mut self) -> Self {
        self.safety_acknowledged = true;
        self
    }
}

/// What an action produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomePayload {
    /// A predefined browser action returned the resulting page state.
    /// The screenshot is cleared once the turn falls out of the retention
    /// window; the url always survives.
    Browser {
        url: String,
        #[serde(default, with = "png_base64", skip_serializing_if = "Option::is_none")]
        screenshot: Option<Vec<u8>>,
    },
    /// A custom action returned an opaque payload. Never pruned.
    Custom(serde_json::Value),
}

/// Serde helper: PNG bytes as base64 text.
mod png_base64 {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, ser: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => ser.serialize_str(&STANDARD.encode(b)),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(de)?;
        match encoded {
            Some(s) => STANDARD
                .decode(s.as_bytes())
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
