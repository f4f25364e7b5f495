//! Action dispatch for browserpilot.
//!
//! Maps named action proposals from the decision service onto [`Computer`]
//! calls, after validating arguments against typed schemas and denormalizing
//! pointer coordinates from the 0–1000 virtual axis to actual screen pixels.
//! Non-browser capabilities plug in through the [`CustomAction`] registry.
//!
//! [`Computer`]: browserpilot_core::Computer
//! [`CustomAction`]: custom::CustomAction

pub mod custom;
pub mod dispatch;
pub mod schema;

pub use custom::{CustomAction, CustomActionRegistry};
pub use dispatch::{DispatchOutcome, Dispatcher, PREDEFINED_BROWSER_ACTIONS};
