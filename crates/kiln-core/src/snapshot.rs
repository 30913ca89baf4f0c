use std::sync::Arc;

use crate::api::PlatformApi;
use crate::budget::credits_for_duration;
use crate::catalog::EnvironmentCatalog;
use crate::error::{ApiError, KilnError};
use crate::model::{CreateRuntimeRequest, CreateSnapshotRequest, RuntimeRecord, SnapshotRecord};

/// Creates snapshots of runtimes and starts new runtimes from them.
pub struct SnapshotCoordinator {
    api: Arc<dyn PlatformApi>,
    catalog: Arc<EnvironmentCatalog>,
}

impl SnapshotCoordinator {
    pub fn new(api: Arc<dyn PlatformApi>, catalog: Arc<EnvironmentCatalog>) -> Self {
        Self { api, catalog }
    }

    /// Snapshot `pod_name`. With `stop`, the platform also stops the source
    /// runtime; this returns as soon as the snapshot call completes.
    pub async fn create(
        &self,
        pod_name: &str,
        name: &str,
        description: &str,
        stop: bool,
    ) -> Result<SnapshotRecord, KilnError> {
        if pod_name.trim().is_empty() {
            return Err(KilnError::Validation("pod name must not be empty".into()));
        }
        if name.trim().is_empty() {
            return Err(KilnError::Validation("snapshot name must not be empty".into()));
        }

        let request = CreateSnapshotRequest {
            pod_name: pod_name.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            stop,
        };
        let snapshot = self
            .api
            .create_snapshot(&request)
            .await
            .map_err(|e| KilnError::runtime_lookup(pod_name, e))?;

        tracing::info!(pod_name, uid = %snapshot.uid, stop, "Snapshot created");
        Ok(snapshot)
    }

    /// Start a new runtime from `snapshot`, budgeting `minutes_limit` minutes
    /// at the target environment's burning rate.
    pub async fn restore(
        &self,
        snapshot: &SnapshotRecord,
        environment_override: Option<&str>,
        minutes_limit: Option<u64>,
    ) -> Result<RuntimeRecord, KilnError> {
        let credits_limit = match minutes_limit {
            Some(0) => {
                return Err(KilnError::Validation(
                    "minutes limit must be greater than zero".into(),
                ));
            }
            Some(minutes) => {
                let target = environment_override.unwrap_or(&snapshot.environment);
                let env = self.catalog.find(target).await?;
                Some(credits_for_duration(minutes, env.burning_rate) as f64)
            }
            None => None,
        };
        self.restore_with_credits(snapshot, environment_override, credits_limit)
            .await
    }

    /// Restore with a credit budget already expressed in credits.
    pub(crate) async fn restore_with_credits(
        &self,
        snapshot: &SnapshotRecord,
        environment_override: Option<&str>,
        credits_limit: Option<f64>,
    ) -> Result<RuntimeRecord, KilnError> {
        let environment = environment_override.unwrap_or(&snapshot.environment);
        let request = CreateRuntimeRequest {
            environment_name: environment.to_string(),
            credits_limit,
            from: Some(snapshot.uid.clone()),
            ..Default::default()
        };

        let runtime = match self.api.create_runtime(&request).await {
            Ok(runtime) => runtime,
            Err(ApiError::NotFound(_)) => {
                return Err(KilnError::SnapshotNotFound {
                    uid: snapshot.uid.clone(),
                });
            }
            Err(e) => return Err(provision_error(&self.catalog, environment, e).await),
        };

        tracing::info!(
            uid = %snapshot.uid,
            pod_name = %runtime.pod_name,
            environment,
            "Runtime restored from snapshot"
        );
        Ok(runtime)
    }
}

/// Lift a failed create call into the caller-facing taxonomy.
pub(crate) async fn provision_error(
    catalog: &EnvironmentCatalog,
    environment: &str,
    err: ApiError,
) -> KilnError {
    match err {
        ApiError::NoCapacity(message) => KilnError::Capacity {
            environment: environment.to_string(),
            message,
        },
        ApiError::EnvironmentUnknown(_) => {
            let known = match catalog.list(false).await {
                Ok(entries) => entries.iter().map(|e| e.name.clone()).collect(),
                Err(e) => {
                    tracing::warn!(environment, error = %e, "Could not list environments for the not-found error");
                    Vec::new()
                }
            };
            KilnError::EnvironmentNotFound {
                environment: environment.to_string(),
                known,
            }
        }
        other => KilnError::Api(other),
    }
}
