use serde::{Deserialize, Serialize};

/// Local execution strategy for a pipeline run.
///
/// `Synchronous` runs on the local-executor path; every other variant runs
/// on the remote-executor path. That distinction is load-bearing: tests may
/// inspect which path was chosen (see `ExecutorFactory::build`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorType {
    Synchronous,
    Threadpool,
    Processpool,
    Distributed,
}

impl Default for ExecutorType {
    fn default() -> Self {
        ExecutorType::Synchronous
    }
}

impl ExecutorType {
    /// Whether this strategy attaches via the DAG driver's local-executor
    /// path (`true`) or its remote-executor path (`false`).
    pub fn is_local(&self) -> bool {
        matches!(self, ExecutorType::Synchronous)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(rename = "type", default)]
    pub executor_type: ExecutorType,
    #[serde(default)]
    pub max_workers: Option<usize>,
    #[serde(default)]
    pub num_cpus: Option<usize>,
}

impl ExecutorConfig {
    pub fn synchronous() -> Self {
        Self {
            executor_type: ExecutorType::Synchronous,
            max_workers: None,
            num_cpus: None,
        }
    }

    /// Resolves `max_workers` for the threadpool strategy, defaulting to
    /// `cpu_count * 5`.
    pub fn resolved_max_workers(&self) -> usize {
        self.max_workers.unwrap_or_else(|| num_cpus::get() * 5)
    }

    /// Resolves `num_cpus` for the processpool strategy, defaulting to the
    /// detected cpu count.
    pub fn resolved_num_cpus(&self) -> usize {
        self.num_cpus.unwrap_or_else(num_cpus::get)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_executor_type_is_synchronous() {
        assert_eq!(ExecutorConfig::default().executor_type, ExecutorType::Synchronous);
    }

    #[test]
    fn only_synchronous_is_local() {
        assert!(ExecutorType::Synchronous.is_local());
        assert!(!ExecutorType::Threadpool.is_local());
        assert!(!ExecutorType::Processpool.is_local());
        assert!(!ExecutorType::Distributed.is_local());
    }

    #[test]
    fn resolved_max_workers_falls_back_to_cpu_count_times_five() {
        let cfg = ExecutorConfig::default();
        assert_eq!(cfg.resolved_max_workers(), num_cpus::get() * 5);
    }
}
