use std::sync::Arc;

use tokio::sync::RwLock;

use crate::api::PlatformApi;
use crate::error::KilnError;
use crate::model::EnvironmentRecord;

/// Lazily populated cache of the platform's environments.
///
/// The list is replaced wholesale on refresh so readers never observe a
/// partially updated catalog. Entries keep the order the platform returned;
/// the first one is the default environment.
pub struct EnvironmentCatalog {
    api: Arc<dyn PlatformApi>,
    entries: RwLock<Arc<Vec<EnvironmentRecord>>>,
}

impl EnvironmentCatalog {
    pub fn new(api: Arc<dyn PlatformApi>) -> Self {
        Self {
            api,
            entries: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Cached environments, fetched from the platform when the cache is
    /// empty or `force_refresh` is set.
    pub async fn list(&self, force_refresh: bool) -> Result<Arc<Vec<EnvironmentRecord>>, KilnError> {
        if !force_refresh {
            let cached = self.entries.read().await.clone();
            if !cached.is_empty() {
                return Ok(cached);
            }
        }

        let fresh = Arc::new(self.api.list_environments().await?);
        tracing::debug!(count = fresh.len(), "Environment catalog refreshed");
        *self.entries.write().await = fresh.clone();
        Ok(fresh)
    }

    pub async fn find(&self, name: &str) -> Result<EnvironmentRecord, KilnError> {
        let entries = self.list(false).await?;
        entries
            .iter()
            .find(|e| e.name == name)
            .cloned()
            .ok_or_else(|| KilnError::EnvironmentNotFound {
                environment: name.to_string(),
                known: entries.iter().map(|e| e.name.clone()).collect(),
            })
    }

    /// First environment the platform lists, if any.
    pub async fn default_environment(&self) -> Result<Option<EnvironmentRecord>, KilnError> {
        Ok(self.list(false).await?.first().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubPlatform;

    fn env(name: &str) -> EnvironmentRecord {
        EnvironmentRecord {
            name: name.into(),
            title: name.into(),
            burning_rate: 10.0,
            language: "python".into(),
            description: None,
        }
    }

    fn catalog_with(names: &[&str]) -> (Arc<StubPlatform>, EnvironmentCatalog) {
        let stub = Arc::new(
            StubPlatform::new().with_environments(names.iter().map(|n| env(n)).collect()),
        );
        let catalog = EnvironmentCatalog::new(stub.clone());
        (stub, catalog)
    }

    #[tokio::test]
    async fn list_is_cached_until_forced() {
        let (stub, catalog) = catalog_with(&["python-default-env", "python-gpu-env"]);

        catalog.list(false).await.unwrap();
        catalog.list(false).await.unwrap();
        assert_eq!(stub.calls().list_environments, 1);

        catalog.list(true).await.unwrap();
        assert_eq!(stub.calls().list_environments, 2);
    }

    #[tokio::test]
    async fn empty_cache_is_refetched() {
        let (stub, catalog) = catalog_with(&[]);

        assert!(catalog.list(false).await.unwrap().is_empty());
        assert!(catalog.list(false).await.unwrap().is_empty());
        assert_eq!(stub.calls().list_environments, 2);
    }

    #[tokio::test]
    async fn find_reports_known_names() {
        let (_stub, catalog) = catalog_with(&["python-default-env", "python-gpu-env"]);

        let found = catalog.find("python-gpu-env").await.unwrap();
        assert_eq!(found.name, "python-gpu-env");

        match catalog.find("r-env").await.unwrap_err() {
            KilnError::EnvironmentNotFound { environment, known } => {
                assert_eq!(environment, "r-env");
                assert_eq!(known, vec!["python-default-env", "python-gpu-env"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn default_is_first_in_platform_order() {
        let (_stub, catalog) = catalog_with(&["zeta-env", "alpha-env"]);
        let default = catalog.default_environment().await.unwrap().unwrap();
        assert_eq!(default.name, "zeta-env");
        let names: Vec<_> = catalog
            .list(false)
            .await
            .unwrap()
            .iter()
            .map(|e| e.name.clone())
            .collect();
        assert_eq!(names, vec!["zeta-env", "alpha-env"]);
    }
}
