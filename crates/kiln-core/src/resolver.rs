use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::PlatformApi;
use crate::catalog::EnvironmentCatalog;
use crate::error::KilnError;
use crate::model::{CreateRuntimeRequest, RuntimeRecord, RuntimeType};
use crate::snapshot::{SnapshotCoordinator, provision_error};

/// What the caller wants from [`RuntimeResolver::ensure`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    /// Target environment; the platform's first environment when absent.
    pub environment_name: Option<String>,
    /// Upper bound on credits, both for reuse eligibility and for creation.
    pub credits_limit: Option<f64>,
    pub reuse_existing: bool,
    /// Restore from this snapshot instead of reusing or creating.
    pub snapshot_id: Option<String>,
    pub runtime_type: Option<RuntimeType>,
    pub given_name: Option<String>,
    /// Block until the runtime is running before returning it.
    pub wait_until_ready: bool,
}

impl Criteria {
    pub fn reuse(environment_name: &str) -> Self {
        Self {
            environment_name: Some(environment_name.to_string()),
            reuse_existing: true,
            ..Default::default()
        }
    }

    fn validate(&self) -> Result<(), KilnError> {
        if let Some(name) = &self.environment_name
            && name.trim().is_empty()
        {
            return Err(KilnError::Validation(
                "environment name must not be empty".into(),
            ));
        }
        if let Some(limit) = self.credits_limit
            && !(limit.is_finite() && limit > 0.0)
        {
            return Err(KilnError::Validation(format!(
                "credits limit must be a positive number, got {limit}"
            )));
        }
        if let Some(uid) = &self.snapshot_id
            && uid.trim().is_empty()
        {
            return Err(KilnError::Validation("snapshot id must not be empty".into()));
        }
        Ok(())
    }
}

/// Decides whether to restore, reuse or provision a runtime.
///
/// Decision order:
/// 1. A requested snapshot is always restored; reuse is skipped.
/// 2. With `reuse_existing`, the first `running` runtime in the requested
///    (or default) environment within the credit limit is returned as is.
/// 3. Otherwise a new runtime is created.
///
/// Nothing here serializes concurrent calls: two racing `ensure` calls may
/// both create.
pub struct RuntimeResolver {
    api: Arc<dyn PlatformApi>,
    catalog: Arc<EnvironmentCatalog>,
    snapshots: Arc<SnapshotCoordinator>,
}

impl RuntimeResolver {
    pub fn new(
        api: Arc<dyn PlatformApi>,
        catalog: Arc<EnvironmentCatalog>,
        snapshots: Arc<SnapshotCoordinator>,
    ) -> Self {
        Self {
            api,
            catalog,
            snapshots,
        }
    }

    pub async fn ensure(&self, criteria: &Criteria) -> Result<RuntimeRecord, KilnError> {
        criteria.validate()?;

        if let Some(uid) = &criteria.snapshot_id {
            let snapshot = self
                .api
                .get_snapshot(uid)
                .await
                .map_err(|e| KilnError::snapshot_lookup(uid, e))?;
            tracing::info!(uid = %snapshot.uid, "Snapshot requested, restoring instead of reusing");
            return self
                .snapshots
                .restore_with_credits(
                    &snapshot,
                    criteria.environment_name.as_deref(),
                    criteria.credits_limit,
                )
                .await;
        }

        let environment = match &criteria.environment_name {
            Some(name) => Some(name.clone()),
            None => self.catalog.default_environment().await?.map(|e| e.name),
        };

        if criteria.reuse_existing
            && let Some(environment) = &environment
            && let Some(runtime) = self.find_reusable(environment, criteria.credits_limit).await?
        {
            tracing::info!(
                pod_name = %runtime.pod_name,
                environment = %environment,
                "Reusing running runtime"
            );
            return Ok(runtime);
        }

        let Some(environment) = environment else {
            return Err(KilnError::NoEnvironments);
        };
        self.create(&environment, criteria).await
    }

    async fn find_reusable(
        &self,
        environment: &str,
        credits_limit: Option<f64>,
    ) -> Result<Option<RuntimeRecord>, KilnError> {
        let runtimes = self.api.list_runtimes().await?;
        let candidate = runtimes.into_iter().find(|r| {
            r.environment_name == environment
                && r.state.is_usable()
                && credits_limit.is_none_or(|limit| r.credits <= limit)
        });
        if candidate.is_none() {
            tracing::debug!(environment, credits_limit = ?credits_limit, "No reusable runtime");
        }
        Ok(candidate)
    }

    async fn create(
        &self,
        environment: &str,
        criteria: &Criteria,
    ) -> Result<RuntimeRecord, KilnError> {
        let request = CreateRuntimeRequest {
            environment_name: environment.to_string(),
            runtime_type: criteria.runtime_type,
            given_name: criteria.given_name.clone(),
            credits_limit: criteria.credits_limit,
            from: None,
        };

        let runtime = match self.api.create_runtime(&request).await {
            Ok(runtime) => runtime,
            Err(e) => return Err(provision_error(&self.catalog, environment, e).await),
        };

        tracing::info!(
            pod_name = %runtime.pod_name,
            environment,
            credits_limit = ?criteria.credits_limit,
            "Runtime created"
        );
        Ok(runtime)
    }
}
