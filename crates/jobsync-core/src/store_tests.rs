
    use super::*;

    fn definition(id: &str, implementation_id: &str, node: &str) -> JobDefinition {
        JobDefinition::new(id, implementation_id, node).with_cron("0 * * * * *")
    }

    #[tokio::test]
    async fn test_memory_store_upsert_and_get() {
        let store = MemoryDefinitionStore::new();
        store.upsert(&definition("A", "echo", "node-1")).await.unwrap();

        let loaded = store.get("A").await.unwrap().unwrap();
        assert_eq!(loaded.implementation_id, "echo");

        let mut changed = loaded.clone();
        changed.cron_expression = Some("0 0 * * * *".to_string());
        store.upsert(&changed).await.unwrap();

        let loaded = store.get("A").await.unwrap().unwrap();
        assert_eq!(loaded.cron_expression.as_deref(), Some("0 0 * * * *"));
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_list_for_node() {
        let store = MemoryDefinitionStore::with_definitions([
            definition("B", "echo", "node-1"),
            definition("A", "echo", "node-1"),
            definition("C", "echo", "node-2"),
        ]);

        let ids: Vec<_> = store
            .list_for_node("node-1")
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert!(store.list_for_node("node-3").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_find_by_implementation() {
        let store = MemoryDefinitionStore::with_definitions([
            definition("B", "echo", "node-1"),
            definition("A", "echo", "node-2"),
            definition("C", "report", "node-1"),
        ]);

        let found = store.find_by_implementation("echo").await.unwrap().unwrap();
        assert_eq!(found.id, "A");
        assert!(store.find_by_implementation("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_delete() {
        let store = MemoryDefinitionStore::with_definitions([definition("A", "echo", "n")]);
        store.delete("A").await.unwrap();
        assert!(store.get("A").await.unwrap().is_none());

        // Deleting again is a no-op.
        store.delete("A").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_store_record_execution() {
        let store = MemoryDefinitionStore::with_definitions([definition("A", "echo", "n")]);
        let at = Utc::now();

        store.record_execution("A", at, None).await.unwrap();
        let loaded = store.get("A").await.unwrap().unwrap();
        assert_eq!(loaded.last_executed_at, Some(at));
        assert!(loaded.enabled);

        store.record_execution("A", at, Some(false)).await.unwrap();
        assert!(!store.get("A").await.unwrap().unwrap().enabled);
    }

    #[tokio::test]
    async fn test_memory_store_record_execution_unknown() {
        let store = MemoryDefinitionStore::new();
        let result = store.record_execution("missing", Utc::now(), None).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }
