use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Boolean toggles for each adapter family, per `RunConfig.with_adapter`.
///
/// Concrete families mirror the ones named in the DAG library's adapter
/// abstraction: a tracking/tracer adapter, MLflow, OpenTelemetry, and a
/// progress-bar adapter. All default to off; `AdapterManager::build` returns
/// an empty sequence when every toggle is false and no custom adapter is
/// configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WithAdapterConfig {
    #[serde(default)]
    pub tracker: bool,
    #[serde(default)]
    pub mlflow: bool,
    #[serde(default)]
    pub otel: bool,
    #[serde(default)]
    pub progressbar: bool,
}

impl WithAdapterConfig {
    pub fn any_enabled(&self) -> bool {
        self.tracker || self.mlflow || self.otel || self.progressbar
    }
}

/// Per-adapter-family free-form settings, keyed by family name. Values are
/// opaque JSON blobs interpreted by the corresponding adapter implementation.
pub type AdapterSettings = HashMap<String, serde_json::Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_adapters_enabled() {
        let cfg = WithAdapterConfig::default();
        assert!(!cfg.any_enabled());
    }

    #[test]
    fn any_enabled_true_if_one_toggle_set() {
        let cfg = WithAdapterConfig {
            otel: true,
            ..WithAdapterConfig::default()
        };
        assert!(cfg.any_enabled());
    }
}
