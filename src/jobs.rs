//! Built-in job implementations.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use jobsync_core::{ImplementationRegistry, Job};
use tracing::info;

/// Logs a line on every run. Registered with a nightly schedule.
pub(crate) struct EchoJob;

#[async_trait]
impl Job for EchoJob {
    fn id(&self) -> &str {
        "echo"
    }

    fn name(&self) -> &str {
        "Echo"
    }

    fn default_cron(&self) -> Option<&str> {
        Some("0 0 2 * * ?")
    }

    async fn execute(&self) -> anyhow::Result<()> {
        info!("echo job ran at {}", Utc::now().to_rfc3339());
        Ok(())
    }
}

/// Emits a liveness beat with a running count.
pub(crate) struct HeartbeatJob {
    beats: AtomicU64,
}

impl HeartbeatJob {
    pub(crate) fn new() -> Self {
        Self {
            beats: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl Job for HeartbeatJob {
    fn id(&self) -> &str {
        "heartbeat"
    }

    fn name(&self) -> &str {
        "Heartbeat"
    }

    fn default_cron(&self) -> Option<&str> {
        Some("0 */5 * * * *")
    }

    async fn execute(&self) -> anyhow::Result<()> {
        let beat = self.beats.fetch_add(1, Ordering::Relaxed) + 1;
        info!("heartbeat #{}", beat);
        Ok(())
    }
}

/// Registry with every built-in implementation.
pub(crate) fn builtin_registry() -> ImplementationRegistry {
    let mut registry = ImplementationRegistry::new();
    registry.register_job(Arc::new(EchoJob));
    registry.register_job(Arc::new(HeartbeatJob::new()));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobsync_core::{JobLookup, parse_schedule};

    #[test]
    fn test_builtin_registry() {
        let registry = builtin_registry();
        assert_eq!(registry.len(), 2);
        assert!(registry.lookup("echo").is_ok());
        assert!(registry.lookup("heartbeat").is_ok());
    }

    #[test]
    fn test_default_crons_parse() {
        for handle in builtin_registry().handles() {
            let cron = handle.job().default_cron().unwrap();
            assert!(parse_schedule(cron).is_ok(), "bad default cron {}", cron);
        }
    }

    #[tokio::test]
    async fn test_heartbeat_counts() {
        let job = HeartbeatJob::new();
        job.execute().await.unwrap();
        job.execute().await.unwrap();
        assert_eq!(job.beats.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_echo_succeeds() {
        assert!(EchoJob.execute().await.is_ok());
    }
}
