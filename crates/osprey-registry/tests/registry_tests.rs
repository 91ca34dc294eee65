//! Registry boundary tests — memory registry, port allocation, retry budget.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use osprey_registry::*;

    fn registration(application: &str, port: u16) -> Registration {
        Registration {
            application: application.into(),
            port,
            protocol: "osprey".into(),
            interfaces: vec!["demo.Echo".into()],
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // MemoryRegistry
    // ─────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn register_and_lookup() {
        let registry = MemoryRegistry::new();
        registry
            .register(registration("app-a", 4040))
            .await
            .unwrap();

        let found = registry.lookup("app-a").unwrap();
        assert_eq!(found.port, 4040);
        assert_eq!(found.interfaces, vec!["demo.Echo".to_string()]);
        assert!(registry.lookup("app-b").is_none());
    }

    #[tokio::test]
    async fn reregistration_replaces_entry() {
        let registry = MemoryRegistry::new();
        registry
            .register(registration("app-a", 4040))
            .await
            .unwrap();
        registry
            .register(registration("app-a", 5050))
            .await
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("app-a").unwrap().port, 5050);
    }

    #[tokio::test]
    async fn closed_registry_rejects_registration() {
        let registry = MemoryRegistry::new();
        registry
            .register(registration("app-a", 4040))
            .await
            .unwrap();
        registry.close().await;

        assert!(registry.is_empty());
        assert!(matches!(
            registry.register(registration("app-b", 5050)).await,
            Err(RegistryError::Closed)
        ));
    }

    // ─────────────────────────────────────────────────────────────────────
    // Port allocation
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn os_allocator_returns_bindable_port() {
        let port = OsPortAllocator.get_available_port().unwrap();
        assert_ne!(port, 0);
        // The allocator released it, so we can bind it right back.
        std::net::TcpListener::bind(("127.0.0.1", port)).unwrap();
    }

    #[test]
    fn fixed_allocator_returns_configured_port() {
        let allocator = FixedPortAllocator::new(4444);
        assert_eq!(allocator.get_available_port().unwrap(), 4444);
        assert_eq!(allocator.get_available_port().unwrap(), 4444);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Retry budget
    // ─────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn budget_spends_down_to_exhaustion() {
        let mut budget = RetryBudget::new(2, Duration::from_millis(1));
        assert!(budget.retry().await);
        assert!(budget.retry().await);
        assert!(!budget.retry().await);
        assert_eq!(budget.remaining(), 0);
    }

    #[tokio::test]
    async fn reset_restores_full_budget() {
        let mut budget = RetryBudget::new(2, Duration::from_millis(1));
        assert!(budget.retry().await);
        budget.reset();
        assert_eq!(budget.remaining(), 2);
        assert!(budget.retry().await);
        assert!(budget.retry().await);
        assert!(!budget.retry().await);
    }
}
