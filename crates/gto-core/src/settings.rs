use std::time::Duration;

/// Process configuration, read once from the environment at startup and
/// passed explicitly to every component that needs it.
///
/// Fields default sensibly for local development; production deployments set
/// the corresponding environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Message broker connection string.
    pub broker_url: String,
    /// Strategy snapshot cache connection string.
    pub cache_url: String,
    /// Relational store connection string (consumed by external adapters).
    pub database_url: String,
    /// Directory prefix for checkpoint and result artifacts.
    pub blob_prefix: String,
    /// Concurrent tasks a worker process will hold unacked.
    pub worker_concurrency: usize,
    /// Work queue for preflop tasks.
    pub queue_preflop: String,
    /// Work queue for postflop tasks.
    pub queue_postflop: String,
    /// Queue carrying task results back to the orchestrator.
    pub queue_results: String,
    /// Queue carrying node registrations and heartbeats.
    pub queue_heartbeats: String,
    /// Queue carrying claims, cancellations, and shutdown signals.
    pub queue_control: String,
    /// Per-task compute deadline.
    pub task_deadline: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            broker_url: String::from("redis://localhost:6379"),
            cache_url: String::from("redis://localhost:6379"),
            database_url: String::from("postgres://localhost:5432/gto"),
            blob_prefix: String::from("artifacts"),
            worker_concurrency: 4,
            queue_preflop: String::from("preflop_tasks"),
            queue_postflop: String::from("postflop_tasks"),
            queue_results: String::from("task_results"),
            queue_heartbeats: String::from("heartbeats"),
            queue_control: String::from("control"),
            task_deadline: Duration::from_secs(crate::TASK_DEADLINE_SECS),
        }
    }
}

impl Settings {
    /// Reads settings from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            broker_url: var("BROKER_URL", defaults.broker_url),
            cache_url: var("CACHE_URL", defaults.cache_url),
            database_url: var("DATABASE_URL", defaults.database_url),
            blob_prefix: var("BLOB_PREFIX", defaults.blob_prefix),
            worker_concurrency: var("WORKER_CONCURRENCY", defaults.worker_concurrency.to_string())
                .parse()
                .unwrap_or(defaults.worker_concurrency),
            queue_preflop: var("QUEUE_PREFLOP", defaults.queue_preflop),
            queue_postflop: var("QUEUE_POSTFLOP", defaults.queue_postflop),
            queue_results: var("QUEUE_RESULTS", defaults.queue_results),
            queue_heartbeats: var("QUEUE_HEARTBEATS", defaults.queue_heartbeats),
            queue_control: var("QUEUE_CONTROL", defaults.queue_control),
            task_deadline: Duration::from_secs(
                var("TASK_DEADLINE_SECS", crate::TASK_DEADLINE_SECS.to_string())
                    .parse()
                    .unwrap_or(crate::TASK_DEADLINE_SECS),
            ),
        }
    }
}

fn var(key: &str, fallback: String) -> String {
    std::env::var(key).unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_name_the_documented_queues() {
        let settings = Settings::default();
        assert_eq!(settings.queue_preflop, "preflop_tasks");
        assert_eq!(settings.queue_postflop, "postflop_tasks");
        assert_eq!(settings.queue_results, "task_results");
        assert_eq!(settings.queue_heartbeats, "heartbeats");
        assert_eq!(settings.queue_control, "control");
    }
}
