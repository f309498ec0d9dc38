//! SubscriberRegistry - the set of currently connected subscribers

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, instrument};

use contracts::SubscriberId;

use crate::error::HubError;
use crate::handle::SubscriberHandle;

/// Concurrent subscriber set
///
/// Broadcasts hold the read lock only while enqueueing, never while waiting
/// for sends, so registrations are not blocked by a slow publish.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    members: RwLock<HashMap<SubscriberId, Arc<SubscriberHandle>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber exactly once
    pub async fn add(&self, handle: Arc<SubscriberHandle>) -> Result<(), HubError> {
        self.add_with(handle, |_| async { Ok::<_, HubError>(()) })
            .await
    }

    /// Register a subscriber after running `prelude` under the write lock
    ///
    /// No publish can interleave between the prelude and the insertion, so
    /// anything the prelude enqueues reaches the subscriber before the first
    /// broadcast it is part of. If the prelude fails nothing is registered.
    #[instrument(name = "registry_add", skip(self, handle, prelude), fields(subscriber = %handle.id()))]
    pub async fn add_with<F, Fut, T>(
        &self,
        handle: Arc<SubscriberHandle>,
        prelude: F,
    ) -> Result<T, HubError>
    where
        F: FnOnce(Arc<SubscriberHandle>) -> Fut,
        Fut: Future<Output = Result<T, HubError>>,
    {
        let id = handle.id();
        let mut members = self.members.write().await;
        if members.contains_key(&id) {
            return Err(HubError::AlreadyRegistered(id));
        }

        let value = prelude(Arc::clone(&handle)).await?;
        members.insert(id, handle);
        observability::metrics::record_subscriber_count(members.len());
        debug!(members = members.len(), "Subscriber registered");
        Ok(value)
    }

    /// Deregister a subscriber; removing an absent id is a no-op
    pub async fn remove(&self, id: SubscriberId) -> Option<Arc<SubscriberHandle>> {
        let mut members = self.members.write().await;
        let removed = members.remove(&id);
        if removed.is_some() {
            observability::metrics::record_subscriber_count(members.len());
            debug!(subscriber = %id, members = members.len(), "Subscriber deregistered");
        }
        removed
    }

    /// Point-in-time copy of the registered subscribers
    pub async fn current_members(&self) -> Vec<Arc<SubscriberHandle>> {
        self.members.read().await.values().cloned().collect()
    }

    /// Run `f` over the members while holding the read lock
    ///
    /// `f` must not await; registrations wait for it to return.
    pub(crate) async fn with_members<R>(
        &self,
        f: impl FnOnce(&HashMap<SubscriberId, Arc<SubscriberHandle>>) -> R,
    ) -> R {
        let members = self.members.read().await;
        f(&members)
    }

    pub async fn contains(&self, id: SubscriberId) -> bool {
        self.members.read().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::LogSink;
    use std::time::Duration;

    fn handle(id: u64) -> Arc<SubscriberHandle> {
        Arc::new(SubscriberHandle::spawn(
            SubscriberId(id),
            LogSink::new(format!("log-{id}")),
            4,
            Duration::from_secs(1),
        ))
    }

    #[tokio::test]
    async fn test_add_exactly_once() {
        let registry = SubscriberRegistry::new();
        let first = handle(1);

        registry.add(Arc::clone(&first)).await.unwrap();
        let err = registry.add(first).await.unwrap_err();

        assert!(matches!(err, HubError::AlreadyRegistered(SubscriberId(1))));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = SubscriberRegistry::new();
        registry.add(handle(7)).await.unwrap();

        assert!(registry.remove(SubscriberId(7)).await.is_some());
        assert!(registry.remove(SubscriberId(7)).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_current_members_is_a_copy() {
        let registry = SubscriberRegistry::new();
        registry.add(handle(1)).await.unwrap();
        registry.add(handle(2)).await.unwrap();

        let members = registry.current_members().await;
        registry.remove(SubscriberId(1)).await;

        assert_eq!(members.len(), 2);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_prelude_registers_nothing() {
        let registry = SubscriberRegistry::new();
        let result: Result<(), _> = registry
            .add_with(handle(3), |h| async move {
                Err(HubError::Undelivered {
                    id: h.id(),
                    outcome: "closed".into(),
                })
            })
            .await;

        assert!(result.is_err());
        assert!(!registry.contains(SubscriberId(3)).await);
    }

    #[tokio::test]
    async fn test_prelude_value_returned() {
        let registry = SubscriberRegistry::new();
        let value = registry
            .add_with(handle(4), |h| async move { Ok::<_, HubError>(h.id().0 * 10) })
            .await
            .unwrap();

        assert_eq!(value, 40);
        assert!(registry.contains(SubscriberId(4)).await);
    }
}
