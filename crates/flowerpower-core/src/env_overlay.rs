//! Typed access to the `FP_*` environment overlay.
//!
//! Configuration loaded from YAML can be overridden at process start by
//! environment variables of the form `FP_<SECTION>__<FIELD>` (double
//! underscore as the nesting separator, matching the dotted path used in
//! `RunConfig`/`PipelineConfig`/`ProjectConfig`). The overlay always wins
//! over file and default values.

use std::env;
use std::fmt;
use std::str::FromStr;

pub const ENV_PREFIX: &str = "FP_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvOverlayError {
    pub key: String,
    pub raw_value: String,
    pub reason: String,
}

impl fmt::Display for EnvOverlayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid value for environment variable {}: {:?} ({})",
            self.key, self.raw_value, self.reason
        )
    }
}

impl std::error::Error for EnvOverlayError {}

/// Builds the environment variable name for a dotted config path, e.g.
/// `"retry.max_retries"` becomes `"FP_RETRY__MAX_RETRIES"`.
pub fn env_key(dotted_path: &str) -> String {
    let mut key = String::from(ENV_PREFIX);
    key.push_str(&dotted_path.to_ascii_uppercase().replace('.', "__"));
    key
}

/// Reads and parses `FP_<dotted_path>` if present. Returns `Ok(None)` when
/// the variable is unset, and an error only when it is set to a value that
/// fails to parse as `T`.
pub fn get<T>(dotted_path: &str) -> Result<Option<T>, EnvOverlayError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let key = env_key(dotted_path);
    match env::var(&key) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| EnvOverlayError {
                key,
                raw_value: raw,
                reason: e.to_string(),
            }),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(EnvOverlayError {
            key,
            raw_value: String::from("<non-unicode>"),
            reason: "environment value is not valid unicode".to_string(),
        }),
    }
}

/// Reads `FP_<dotted_path>` as a raw string, with no parsing.
pub fn get_string(dotted_path: &str) -> Option<String> {
    env::var(env_key(dotted_path)).ok()
}

/// Reads `FP_<dotted_path>` as a boolean, accepting the common truthy
/// spellings used across the workspace's YAML and env conventions.
pub fn get_bool(dotted_path: &str) -> Result<Option<bool>, EnvOverlayError> {
    match get_string(dotted_path) {
        None => Ok(None),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(EnvOverlayError {
                key: env_key(dotted_path),
                raw_value: raw,
                reason: "expected one of true/false/1/0/yes/no/on/off".to_string(),
            }),
        },
    }
}
