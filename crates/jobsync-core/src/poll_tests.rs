
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use crate::definition::JobDefinition;
    use crate::dispatch::Dispatcher;
    use crate::error::{StoreError, StoreResult};
    use crate::handle::Job;
    use crate::node::StaticNode;
    use crate::registry::ImplementationRegistry;
    use crate::store::MemoryDefinitionStore;
    use crate::task_set::TaskSet;

    const NODE: &str = "10.0.0.1";

    struct NoopJob;

    #[async_trait]
    impl Job for NoopJob {
        fn id(&self) -> &str {
            "echo"
        }

        fn name(&self) -> &str {
            "Echo"
        }

        async fn execute(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct ThrowingJob;

    #[async_trait]
    impl Job for ThrowingJob {
        fn id(&self) -> &str {
            "throwing"
        }

        fn name(&self) -> &str {
            "Throwing"
        }

        async fn execute(&self) -> anyhow::Result<()> {
            anyhow::bail!("connection reset")
        }
    }

    /// Memory store whose reads can be made to fail.
    struct FlakyStore {
        inner: MemoryDefinitionStore,
        fail: AtomicBool,
    }

    #[async_trait]
    impl DefinitionStore for FlakyStore {
        async fn list_for_node(&self, node: &str) -> StoreResult<Vec<JobDefinition>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Connection("database is down".to_string()));
            }
            self.inner.list_for_node(node).await
        }

        async fn list_all(&self) -> StoreResult<Vec<JobDefinition>> {
            self.inner.list_all().await
        }

        async fn get(&self, id: &str) -> StoreResult<Option<JobDefinition>> {
            self.inner.get(id).await
        }

        async fn find_by_implementation(
            &self,
            implementation_id: &str,
        ) -> StoreResult<Option<JobDefinition>> {
            self.inner.find_by_implementation(implementation_id).await
        }

        async fn upsert(&self, definition: &JobDefinition) -> StoreResult<()> {
            self.inner.upsert(definition).await
        }

        async fn delete(&self, id: &str) -> StoreResult<()> {
            self.inner.delete(id).await
        }

        async fn record_execution(
            &self,
            id: &str,
            executed_at: DateTime<Utc>,
            enabled: Option<bool>,
        ) -> StoreResult<()> {
            self.inner.record_execution(id, executed_at, enabled).await
        }
    }

    struct Fixture {
        store: Arc<FlakyStore>,
        tasks: Arc<TaskSet>,
        registry: Arc<ImplementationRegistry>,
        poll: PollLoop,
    }

    fn fixture(definitions: Vec<JobDefinition>, interval: Duration) -> Fixture {
        let mut registry = ImplementationRegistry::new();
        registry.register_job(Arc::new(NoopJob));
        registry.register_job(Arc::new(ThrowingJob));
        let registry = Arc::new(registry);

        let store = Arc::new(FlakyStore {
            inner: MemoryDefinitionStore::with_definitions(definitions),
            fail: AtomicBool::new(false),
        });
        let (tasks, _firings) = TaskSet::new();
        let tasks = Arc::new(tasks);
        let reconciler = Arc::new(Reconciler::new(tasks.clone(), registry.clone()));
        let poll = PollLoop::new(
            store.clone(),
            Arc::new(StaticNode::new(NODE)),
            reconciler,
            interval,
        );
        Fixture {
            store,
            tasks,
            registry,
            poll,
        }
    }

    fn echo(id: &str) -> JobDefinition {
        JobDefinition::new(id, "echo", NODE).with_cron("0 0 2 * * ?")
    }

    #[tokio::test]
    async fn test_first_tick_always_reconciles() {
        // Even an empty table counts as changed on the first tick.
        let fx = fixture(Vec::new(), Duration::from_secs(60));
        assert!(matches!(fx.poll.tick().await, TickOutcome::Reconciled(_)));
        assert_eq!(fx.poll.tick().await, TickOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_last_executed_at_change_does_not_reconcile() {
        let fx = fixture(vec![echo("A")], Duration::from_secs(60));
        assert!(matches!(fx.poll.tick().await, TickOutcome::Reconciled(_)));

        fx.store
            .record_execution("A", Utc::now(), None)
            .await
            .unwrap();
        assert_eq!(fx.poll.tick().await, TickOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_changed_definition_reconciles() {
        let fx = fixture(vec![echo("A")], Duration::from_secs(60));
        fx.poll.tick().await;
        assert!(fx.tasks.contains("A"));

        fx.store.upsert(&echo("B")).await.unwrap();
        match fx.poll.tick().await {
            TickOutcome::Reconciled(report) => assert_eq!(report.scheduled, 2),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(fx.tasks.contains("B"));
    }

    #[tokio::test]
    async fn test_other_nodes_are_ignored() {
        let mut foreign = echo("X");
        foreign.owner_node = "10.0.0.2".to_string();
        let fx = fixture(vec![echo("A"), foreign], Duration::from_secs(60));

        fx.poll.tick().await;
        assert!(fx.tasks.contains("A"));
        assert!(!fx.tasks.contains("X"));
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_previous_snapshot() {
        let fx = fixture(vec![echo("A")], Duration::from_secs(60));
        fx.poll.tick().await;

        fx.store.fail.store(true, Ordering::SeqCst);
        assert_eq!(fx.poll.tick().await, TickOutcome::FetchFailed);
        assert!(fx.tasks.contains("A"));

        fx.store.fail.store(false, Ordering::SeqCst);
        assert_eq!(fx.poll.tick().await, TickOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_failed_job_is_removed_on_next_tick() {
        let definition = JobDefinition::new("B", "throwing", NODE).with_cron("0 0 2 * * ?");
        let fx = fixture(vec![definition], Duration::from_secs(60));
        fx.poll.tick().await;
        assert!(fx.tasks.contains("B"));

        let dispatcher = Dispatcher::new(fx.tasks.clone(), fx.registry.clone(), fx.store.clone(), 1);
        let outcome = dispatcher.fire("B").unwrap().await.unwrap();
        assert!(outcome.is_err());
        assert!(!fx.store.get("B").await.unwrap().unwrap().enabled);

        match fx.poll.tick().await {
            TickOutcome::Reconciled(report) => assert_eq!(report.disabled, 1),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(!fx.tasks.contains("B"));
    }

    #[tokio::test]
    async fn test_run_waits_for_gate() {
        let fx = fixture(vec![echo("A")], Duration::from_secs(60));
        let poll = Arc::new(fx.poll);
        let gate = ReadinessGate::new();
        let shutdown = CancellationToken::new();

        let join = {
            let poll = poll.clone();
            let gate = gate.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { poll.run(&gate, shutdown).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(fx.tasks.is_empty());

        gate.open();
        for _ in 0..50 {
            if fx.tasks.contains("A") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(fx.tasks.contains("A"));

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), join)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_trigger_forces_tick() {
        let fx = fixture(Vec::new(), Duration::from_secs(3600));
        let poll = Arc::new(fx.poll);
        let gate = ReadinessGate::new();
        gate.open();
        let shutdown = CancellationToken::new();

        let join = {
            let poll = poll.clone();
            let gate = gate.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { poll.run(&gate, shutdown).await })
        };

        // Let the immediate first tick run against the empty table.
        tokio::time::sleep(Duration::from_millis(50)).await;
        fx.store.upsert(&echo("A")).await.unwrap();
        poll.trigger().notify_one();

        for _ in 0..50 {
            if fx.tasks.contains("A") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(fx.tasks.contains("A"));

        shutdown.cancel();
        join.await.unwrap();
    }
