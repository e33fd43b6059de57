
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    use tokio::sync::Notify;

    /// Job that blocks until released, counting how many bodies started.
    struct GatedJob {
        started: AtomicU32,
        entered: Notify,
        release: Notify,
    }

    impl GatedJob {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                started: AtomicU32::new(0),
                entered: Notify::new(),
                release: Notify::new(),
            })
        }
    }

    #[async_trait]
    impl Job for GatedJob {
        fn id(&self) -> &str {
            "gated"
        }

        fn name(&self) -> &str {
            "Gated job"
        }

        async fn execute(&self) -> anyhow::Result<()> {
            self.started.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            self.release.notified().await;
            Ok(())
        }
    }

    struct FailingJob;

    #[async_trait]
    impl Job for FailingJob {
        fn id(&self) -> &str {
            "failing"
        }

        fn name(&self) -> &str {
            "Failing job"
        }

        async fn execute(&self) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    struct PanickingJob;

    #[async_trait]
    impl Job for PanickingJob {
        fn id(&self) -> &str {
            "panicking"
        }

        fn name(&self) -> &str {
            "Panicking job"
        }

        async fn execute(&self) -> anyhow::Result<()> {
            panic!("unexpected state");
        }
    }

    #[test]
    fn test_guard_transitions() {
        let guard = ReentrancyGuard::new();
        assert_eq!(guard.state(), GuardState::Idle);

        let permit = guard.try_enter().expect("idle guard can be entered");
        assert_eq!(guard.state(), GuardState::Running);
        assert!(guard.try_enter().is_none());

        drop(permit);
        assert_eq!(guard.state(), GuardState::Idle);
        assert!(guard.try_enter().is_some());
    }

    #[test]
    fn test_guard_released_on_unwind() {
        let guard = ReentrancyGuard::new();
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let _permit = guard.try_enter().unwrap();
            panic!("inside guarded section");
        }));
        assert!(result.is_err());
        assert_eq!(guard.state(), GuardState::Idle);
    }

    #[tokio::test]
    async fn test_handle_metadata() {
        let handle = JobHandle::new(GatedJob::new());
        assert_eq!(handle.implementation_id(), "gated");
        assert_eq!(handle.name(), "Gated job");
        assert!(!handle.is_running());
        assert!(handle.job().default_cron().is_none());
    }

    #[tokio::test]
    async fn test_overlapping_execution_is_skipped() {
        let job = GatedJob::new();
        let handle = Arc::new(JobHandle::new(job.clone()));

        let first = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.execute().await })
        };
        job.entered.notified().await;
        assert!(handle.is_running());

        let second = handle.execute().await;
        assert_eq!(second, Ok(ExecutionOutcome::Skipped));

        job.release.notify_one();
        let first = tokio::time::timeout(Duration::from_secs(2), first)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first, Ok(ExecutionOutcome::Completed));
        assert_eq!(job.started.load(Ordering::SeqCst), 1);
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn test_failure_is_reported_and_guard_cleared() {
        let handle = JobHandle::new(Arc::new(FailingJob));

        let result = handle.execute().await;
        match result {
            Err(ExecutionError::Failed {
                implementation_id,
                message,
            }) => {
                assert_eq!(implementation_id, "failing");
                assert!(message.contains("disk full"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!handle.is_running());

        // A failure never blocks the next firing.
        assert!(matches!(
            handle.execute().await,
            Err(ExecutionError::Failed { .. })
        ));
    }

    #[tokio::test]
    async fn test_panic_is_caught_and_guard_cleared() {
        let handle = JobHandle::new(Arc::new(PanickingJob));

        let result = handle.execute().await;
        match result {
            Err(ExecutionError::Panicked { message, .. }) => {
                assert!(message.contains("unexpected state"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!handle.is_running());
    }

    #[test]
    fn test_panic_message_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(payload.as_ref()), "static str");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");

        let payload: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
