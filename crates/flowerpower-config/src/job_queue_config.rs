use serde::{Deserialize, Serialize};

/// Backend selection and connection settings persisted in `ProjectConfig`.
///
/// Every field here can be overridden by an `FP_*` environment variable at
/// load time (see `flowerpower_core::env_overlay`); the overlay always wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobQueueConfig {
    #[serde(default = "default_backend_type")]
    pub r#type: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub database: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub tls: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_bundle_path: Option<String>,
    #[serde(default = "default_queues")]
    pub queues: Vec<String>,
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_backend_type() -> String {
    "memory".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6379
}

fn default_queues() -> Vec<String> {
    vec!["default".to_string(), "scheduled".to_string()]
}

fn default_num_workers() -> usize {
    1
}

fn default_key_prefix() -> String {
    "flowerpower".to_string()
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self {
            r#type: default_backend_type(),
            host: default_host(),
            port: default_port(),
            database: 0,
            username: None,
            password: None,
            tls: false,
            cert_bundle_path: None,
            queues: default_queues(),
            num_workers: default_num_workers(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl JobQueueConfig {
    /// The queue reserved for scheduled-job deferral: the last configured
    /// queue, per the backend contract.
    pub fn deferred_queue(&self) -> &str {
        self.queues.last().map(String::as_str).unwrap_or("scheduled")
    }

    pub fn apply_env_overlay(&mut self) -> Result<(), crate::error::ConfigValidationError> {
        use flowerpower_core::env_overlay;

        if let Some(v) = env_overlay::get_string("job_queue_type") {
            self.r#type = v;
        }
        if let Some(v) = env_overlay::get_string("rq_backend_host") {
            self.host = v;
        }
        if let Some(v) = env_overlay::get::<u16>("rq_backend_port")
            .map_err(|e| crate::error::ConfigValidationError::UnknownField { field: e.to_string() })?
        {
            self.port = v;
        }
        if let Some(v) = env_overlay::get::<u32>("rq_backend_db")
            .map_err(|e| crate::error::ConfigValidationError::UnknownField { field: e.to_string() })?
        {
            self.database = v;
        }
        if let Some(v) = env_overlay::get_string("rq_backend_username") {
            self.username = Some(v);
        }
        if let Some(v) = env_overlay::get_string("rq_backend_password") {
            self.password = Some(v);
        }
        if let Some(v) = env_overlay::get_string("rq_queues") {
            self.queues = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Some(v) = env_overlay::get::<usize>("rq_num_workers")
            .map_err(|e| crate::error::ConfigValidationError::UnknownField { field: e.to_string() })?
        {
            self.num_workers = v;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deferred_queue_is_the_last_configured_queue() {
        let cfg = JobQueueConfig::default();
        assert_eq!(cfg.deferred_queue(), "scheduled");
    }

    #[test]
    fn env_overlay_overrides_host_and_port() {
        std::env::set_var("FP_RQ_BACKEND_HOST", "queue.internal");
        std::env::set_var("FP_RQ_BACKEND_PORT", "7000");
        let mut cfg = JobQueueConfig::default();
        cfg.apply_env_overlay().unwrap();
        assert_eq!(cfg.host, "queue.internal");
        assert_eq!(cfg.port, 7000);
        std::env::remove_var("FP_RQ_BACKEND_HOST");
        std::env::remove_var("FP_RQ_BACKEND_PORT");
    }
}
