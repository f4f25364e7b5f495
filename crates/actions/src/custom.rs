//! Custom action extension point.
//!
//! Any externally registered function callable by name and argument mapping.
//! Custom actions return an opaque JSON payload rather than page state; the
//! dispatcher treats the result as final, with no screenshot, and the
//! transcript never prunes it.

use async_trait::async_trait;
use browserpilot_core::decision::ActionDeclaration;
use browserpilot_core::ActionError;
use std::collections::HashMap;

/// A non-browser action the decision service may call.
#[async_trait]
pub trait CustomAction: Send + Sync {
    /// The unique name of this action.
    fn name(&self) -> &str;

    /// A description of what this action does (sent to the decision service).
    fn description(&self) -> &str;

    /// JSON Schema describing this action's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute with the given arguments, returning an opaque payload.
    async fn execute(
        &self,
        args: serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Value, ActionError>;

    /// Convert into a declaration for the request toolset.
    fn to_declaration(&self) -> ActionDeclaration {
        ActionDeclaration {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of custom actions, keyed by name.
pub struct CustomActionRegistry {
    actions: HashMap<String, Box<dyn CustomAction>>,
}

impl CustomActionRegistry {
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Register an action. Replaces any existing action with the same name.
    pub fn register(&mut self, action: Box<dyn CustomAction>) {
        let name = action.name().to_string();
        self.actions.insert(name, action);
    }

    /// Get an action by name.
    pub fn get(&self, name: &str) -> Option<&dyn CustomAction> {
        self.actions.get(name).map(|a| a.as_ref())
    }

    /// All declarations, for sending to the decision service.
    pub fn declarations(&self) -> Vec<ActionDeclaration> {
        self.actions.values().map(|a| a.to_declaration()).collect()
    }

    /// List all registered action names.
    pub fn names(&self) -> Vec<&str> {
        self.actions.keys().map(|s| s.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Default for CustomActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// The reference custom action: multiplies two numbers.
    struct MultiplyNumbers;

    #[async_trait]
    impl CustomAction for MultiplyNumbers {
        fn name(&self) -> &str {
            "multiply_numbers"
        }
        fn description(&self) -> &str {
            "Multiplies two numbers"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            json!({
                "type": "object",
                "properties": {
                    "x": { "type": "number" },
                    "y": { "type": "number" }
                },
                "required": ["x", "y"]
            })
        }
        async fn execute(
            &self,
            args: serde_json::Map<String, serde_json::Value>,
        ) -> Result<serde_json::Value, ActionError> {
            let get = |key: &str| {
                args.get(key).and_then(|v| v.as_f64()).ok_or_else(|| {
                    ActionError::InvalidArguments {
                        action: "multiply_numbers".into(),
                        reason: format!("missing numeric argument: {key}"),
                    }
                })
            };
            Ok(json!({ "result": get("x")? * get("y")? }))
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = CustomActionRegistry::new();
        registry.register(Box::new(MultiplyNumbers));
        assert!(registry.get("multiply_numbers").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn registry_declarations() {
        let mut registry = CustomActionRegistry::new();
        registry.register(Box::new(MultiplyNumbers));
        let decls = registry.declarations();
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].name, "multiply_numbers");
        assert!(decls[0].parameters["required"].is_array());
    }

    #[tokio::test]
    async fn execute_returns_opaque_payload() {
        let mut registry = CustomActionRegistry::new();
        registry.register(Box::new(MultiplyNumbers));

        let args = match json!({"x": 6.0, "y": 7.0}) {
            serde_json::Value::Object(m) => m,
            _ => unreachable!(),
        };
        let result = registry
            .get("multiply_numbers")
            .unwrap()
            .execute(args)
            .await
            .unwrap();
        assert_eq!(result, json!({"result": 42.0}));
    }
}
