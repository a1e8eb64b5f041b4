//! Endpoint → service-provider id map

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::errors::{SpMapError, SpMapResult};
use crate::observability::{log_event_with_fields, Event};
use crate::peers::Registry;

/// `endpoint → spId`
pub type EndpointMap = HashMap<String, u64>;

/// Owns the service-provider map.
///
/// Readers get an `Arc` snapshot and never observe a partial update. The
/// map is only ever replaced by a non-empty registry result.
#[derive(Default)]
pub struct SpIdMapManager {
    map: RwLock<Arc<EndpointMap>>,
}

impl SpIdMapManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing map
    pub fn with_map(map: EndpointMap) -> Self {
        Self {
            map: RwLock::new(Arc::new(map)),
        }
    }

    /// Current map snapshot
    pub fn get(&self) -> Arc<EndpointMap> {
        match self.map.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn sp_id_for(&self, endpoint: &str) -> Option<u64> {
        self.get().get(endpoint).copied()
    }

    fn replace(&self, next: Arc<EndpointMap>) {
        match self.map.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Refresh from the registry.
    ///
    /// A non-empty result replaces the map wholesale. An empty result or a
    /// registry error keeps the previous map; if that map is empty too the
    /// refresh fails with [`SpMapError::Initialization`].
    pub async fn refresh(&self, registry: &dyn Registry) -> SpMapResult<Arc<EndpointMap>> {
        let previous = self.get();
        let size_before = previous.len().to_string();

        let fetched = match registry.list_content_node_providers().await {
            Ok(records) => Ok(records
                .into_iter()
                .map(|record| (record.endpoint, record.sp_id))
                .collect::<EndpointMap>()),
            Err(e) => Err(e.to_string()),
        };

        let reason = match fetched {
            Ok(map) if !map.is_empty() => {
                let next = Arc::new(map);
                self.replace(next.clone());
                let size_after = next.len().to_string();
                log_event_with_fields(
                    Event::SpMapRefreshed,
                    &[
                        ("size_before", size_before.as_str()),
                        ("size_after", size_after.as_str()),
                    ],
                );
                return Ok(next);
            }
            Ok(_) => "registry returned no content nodes".to_string(),
            Err(e) => format!("registry fetch failed: {}", e),
        };

        if previous.is_empty() {
            log_event_with_fields(Event::SpMapInitFailed, &[("reason", reason.as_str())]);
            return Err(SpMapError::Initialization(reason));
        }

        log_event_with_fields(
            Event::SpMapRetained,
            &[("reason", reason.as_str()), ("size", size_before.as_str())],
        );
        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peers::{NodeRecord, PeerError, PeerFuture};

    enum FakeRegistry {
        Nodes(Vec<NodeRecord>),
        Fails,
    }

    impl Registry for FakeRegistry {
        fn list_content_node_providers(&self) -> PeerFuture<'_, Vec<NodeRecord>> {
            Box::pin(async move {
                match self {
                    FakeRegistry::Nodes(nodes) => Ok(nodes.clone()),
                    FakeRegistry::Fails => Err(PeerError::Unreachable("registry".into())),
                }
            })
        }
    }

    fn map_of(entries: &[(&str, u64)]) -> EndpointMap {
        entries
            .iter()
            .map(|(endpoint, id)| (endpoint.to_string(), *id))
            .collect()
    }

    #[tokio::test]
    async fn test_non_empty_result_replaces_map() {
        let manager = SpIdMapManager::with_map(map_of(&[("http://old.co", 9)]));
        let registry = FakeRegistry::Nodes(vec![NodeRecord::new("http://cn1.co", 1)]);

        manager.refresh(&registry).await.unwrap();
        assert_eq!(*manager.get(), map_of(&[("http://cn1.co", 1)]));
    }

    #[tokio::test]
    async fn test_empty_result_retains_map() {
        let manager = SpIdMapManager::with_map(map_of(&[("http://old.co", 9)]));
        manager
            .refresh(&FakeRegistry::Nodes(vec![]))
            .await
            .unwrap();
        assert_eq!(*manager.get(), map_of(&[("http://old.co", 9)]));
    }

    #[tokio::test]
    async fn test_error_retains_map() {
        let manager = SpIdMapManager::with_map(map_of(&[("http://old.co", 9)]));
        manager.refresh(&FakeRegistry::Fails).await.unwrap();
        assert_eq!(manager.sp_id_for("http://old.co"), Some(9));
    }

    #[tokio::test]
    async fn test_empty_everywhere_fails() {
        let manager = SpIdMapManager::new();
        let err = manager.refresh(&FakeRegistry::Fails).await.unwrap_err();
        assert!(matches!(err, SpMapError::Initialization(_)));

        let err = manager
            .refresh(&FakeRegistry::Nodes(vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, SpMapError::Initialization(_)));
        assert!(manager.get().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_unaffected_by_later_refresh() {
        let manager = SpIdMapManager::with_map(map_of(&[("http://old.co", 9)]));
        let before = manager.get();
        manager
            .refresh(&FakeRegistry::Nodes(vec![NodeRecord::new("http://cn1.co", 1)]))
            .await
            .unwrap();
        assert_eq!(*before, map_of(&[("http://old.co", 9)]));
    }
}
