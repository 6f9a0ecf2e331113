use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A callback reference stored in config.
///
/// Per the registry-based callback design, `name` is resolved against a
/// `flowerpower_core::CallbackRegistry` at invocation time rather than
/// carrying a live function pointer in the config itself — config must stay
/// plain data so it serializes losslessly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kwargs: Option<HashMap<String, Value>>,
}

impl CallbackSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: None,
            kwargs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_has_no_args_or_kwargs() {
        let spec = CallbackSpec::named("on_success_hook");
        assert_eq!(spec.name, "on_success_hook");
        assert!(spec.args.is_none());
        assert!(spec.kwargs.is_none());
    }

    #[test]
    fn roundtrips_through_json() {
        let spec = CallbackSpec {
            name: "notify".into(),
            args: Some(vec![Value::from(1)]),
            kwargs: None,
        };
        let json = serde_json::to_string(&spec).unwrap();
        let back: CallbackSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, back);
    }
}
