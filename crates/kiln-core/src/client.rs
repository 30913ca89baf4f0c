use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::api::PlatformApi;
use crate::catalog::EnvironmentCatalog;
use crate::error::KilnError;
use crate::handle::{RuntimeHandle, SnapshotHandle};
use crate::intercept::{CallHooks, Intercepted};
use crate::model::{EnvironmentRecord, RuntimeRecord, SnapshotRecord};
use crate::poller::{DEFAULT_READY_TIMEOUT, ReadinessPoller};
use crate::resolver::{Criteria, RuntimeResolver};
use crate::snapshot::SnapshotCoordinator;

/// Per-runtime result of [`RuntimeAccess::terminate_all`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Termination {
    pub pod_name: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "error")]
pub enum Outcome {
    Success,
    Error(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// A snapshot given either by uid or as an already fetched record.
#[derive(Debug, Clone, Copy)]
pub enum SnapshotRef<'a> {
    Id(&'a str),
    Record(&'a SnapshotRecord),
}

impl<'a> From<&'a str> for SnapshotRef<'a> {
    fn from(uid: &'a str) -> Self {
        SnapshotRef::Id(uid)
    }
}

impl<'a> From<&'a SnapshotRecord> for SnapshotRef<'a> {
    fn from(record: &'a SnapshotRecord) -> Self {
        SnapshotRef::Record(record)
    }
}

pub trait EnvironmentAccess {
    fn list_environments(
        &self,
        force_refresh: bool,
    ) -> impl Future<Output = Result<Vec<EnvironmentRecord>, KilnError>> + Send;

    fn find_environment(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<EnvironmentRecord, KilnError>> + Send;
}

pub trait RuntimeAccess {
    /// Reuse, restore or create a runtime per `criteria`; waits for it to be
    /// running when `criteria.wait_until_ready` is set.
    fn ensure(
        &self,
        criteria: &Criteria,
    ) -> impl Future<Output = Result<RuntimeHandle, KilnError>> + Send;

    fn wait_until_ready<'h>(
        &self,
        runtime: &'h mut RuntimeHandle,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<&'h RuntimeRecord, KilnError>> + Send;

    fn list_runtimes(&self) -> impl Future<Output = Result<Vec<RuntimeHandle>, KilnError>> + Send;

    fn get_runtime(
        &self,
        pod_name: &str,
    ) -> impl Future<Output = Result<RuntimeHandle, KilnError>> + Send;

    /// Delete every runtime concurrently and report each outcome.
    fn terminate_all(&self) -> impl Future<Output = Result<Vec<Termination>, KilnError>> + Send;
}

pub trait SnapshotAccess {
    fn create_snapshot(
        &self,
        pod_name: &str,
        name: &str,
        description: &str,
        stop: bool,
    ) -> impl Future<Output = Result<SnapshotHandle, KilnError>> + Send;

    fn restore_from_snapshot(
        &self,
        snapshot: SnapshotRef<'_>,
        environment_override: Option<&str>,
        minutes_limit: Option<u64>,
    ) -> impl Future<Output = Result<RuntimeHandle, KilnError>> + Send;

    fn get_snapshot(
        &self,
        uid: &str,
    ) -> impl Future<Output = Result<SnapshotHandle, KilnError>> + Send;

    fn list_snapshots(&self) -> impl Future<Output = Result<Vec<SnapshotHandle>, KilnError>> + Send;
}

/// The one concrete client: holds every lifecycle component and exposes them
/// through [`EnvironmentAccess`], [`RuntimeAccess`] and [`SnapshotAccess`].
pub struct KilnClient {
    api: Arc<dyn PlatformApi>,
    catalog: Arc<EnvironmentCatalog>,
    snapshots: Arc<SnapshotCoordinator>,
    resolver: RuntimeResolver,
    poller: Arc<ReadinessPoller>,
    ready_timeout: Duration,
}

impl KilnClient {
    pub fn new(api: Arc<dyn PlatformApi>) -> Self {
        let catalog = Arc::new(EnvironmentCatalog::new(api.clone()));
        let snapshots = Arc::new(SnapshotCoordinator::new(api.clone(), catalog.clone()));
        let resolver = RuntimeResolver::new(api.clone(), catalog.clone(), snapshots.clone());
        let poller = Arc::new(ReadinessPoller::new(api.clone()));
        tracing::debug!(backend = api.backend_name(), "Client constructed");
        Self {
            api,
            catalog,
            snapshots,
            resolver,
            poller,
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }

    /// Build a client whose every platform call runs through `hooks`.
    pub fn with_hooks(api: Arc<dyn PlatformApi>, hooks: Arc<dyn CallHooks>) -> Self {
        Self::new(Arc::new(Intercepted::new(api, hooks)))
    }

    /// Override the readiness budget used when none is passed explicitly.
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn catalog(&self) -> &EnvironmentCatalog {
        &self.catalog
    }

    fn runtime_handle(&self, record: RuntimeRecord) -> RuntimeHandle {
        RuntimeHandle::new(
            record,
            self.api.clone(),
            self.snapshots.clone(),
            self.poller.clone(),
        )
    }

    fn snapshot_handle(&self, record: SnapshotRecord) -> SnapshotHandle {
        SnapshotHandle::new(record, self.api.clone())
    }
}

impl EnvironmentAccess for KilnClient {
    async fn list_environments(
        &self,
        force_refresh: bool,
    ) -> Result<Vec<EnvironmentRecord>, KilnError> {
        let entries = self.catalog.list(force_refresh).await?;
        Ok(entries.to_vec())
    }

    async fn find_environment(&self, name: &str) -> Result<EnvironmentRecord, KilnError> {
        self.catalog.find(name).await
    }
}

impl RuntimeAccess for KilnClient {
    async fn ensure(&self, criteria: &Criteria) -> Result<RuntimeHandle, KilnError> {
        let record = self.resolver.ensure(criteria).await?;
        let mut handle = self.runtime_handle(record);
        if criteria.wait_until_ready {
            handle.wait_until_ready(self.ready_timeout).await?;
        }
        Ok(handle)
    }

    async fn wait_until_ready<'h>(
        &self,
        runtime: &'h mut RuntimeHandle,
        timeout: Option<Duration>,
    ) -> Result<&'h RuntimeRecord, KilnError> {
        runtime
            .wait_until_ready(timeout.unwrap_or(self.ready_timeout))
            .await
    }

    async fn list_runtimes(&self) -> Result<Vec<RuntimeHandle>, KilnError> {
        let records = self.api.list_runtimes().await?;
        Ok(records
            .into_iter()
            .map(|r| self.runtime_handle(r))
            .collect())
    }

    async fn get_runtime(&self, pod_name: &str) -> Result<RuntimeHandle, KilnError> {
        if pod_name.trim().is_empty() {
            return Err(KilnError::Validation("pod name must not be empty".into()));
        }
        let record = self
            .api
            .get_runtime(pod_name)
            .await
            .map_err(|e| KilnError::runtime_lookup(pod_name, e))?;
        Ok(self.runtime_handle(record))
    }

    async fn terminate_all(&self) -> Result<Vec<Termination>, KilnError> {
        let runtimes = self.api.list_runtimes().await?;
        tracing::info!(count = runtimes.len(), "Terminating all runtimes");

        let deletions = runtimes.iter().map(|runtime| async move {
            let outcome = match self.api.delete_runtime(&runtime.pod_name).await {
                Ok(()) => Outcome::Success,
                Err(e) => {
                    tracing::warn!(pod_name = %runtime.pod_name, error = %e, "Runtime deletion failed");
                    Outcome::Error(e.to_string())
                }
            };
            Termination {
                pod_name: runtime.pod_name.clone(),
                outcome,
            }
        });
        let results = join_all(deletions).await;

        let failed = results.iter().filter(|t| !t.outcome.is_success()).count();
        tracing::info!(total = results.len(), failed, "Termination settled");
        Ok(results)
    }
}

impl SnapshotAccess for KilnClient {
    async fn create_snapshot(
        &self,
        pod_name: &str,
        name: &str,
        description: &str,
        stop: bool,
    ) -> Result<SnapshotHandle, KilnError> {
        let record = self.snapshots.create(pod_name, name, description, stop).await?;
        Ok(self.snapshot_handle(record))
    }

    async fn restore_from_snapshot(
        &self,
        snapshot: SnapshotRef<'_>,
        environment_override: Option<&str>,
        minutes_limit: Option<u64>,
    ) -> Result<RuntimeHandle, KilnError> {
        let fetched;
        let record = match snapshot {
            SnapshotRef::Record(record) => record,
            SnapshotRef::Id(uid) => {
                fetched = self.get_snapshot_record(uid).await?;
                &fetched
            }
        };
        let runtime = self
            .snapshots
            .restore(record, environment_override, minutes_limit)
            .await?;
        Ok(self.runtime_handle(runtime))
    }

    async fn get_snapshot(&self, uid: &str) -> Result<SnapshotHandle, KilnError> {
        let record = self.get_snapshot_record(uid).await?;
        Ok(self.snapshot_handle(record))
    }

    async fn list_snapshots(&self) -> Result<Vec<SnapshotHandle>, KilnError> {
        let records = self.api.list_snapshots().await?;
        Ok(records
            .into_iter()
            .map(|r| self.snapshot_handle(r))
            .collect())
    }
}

impl KilnClient {
    async fn get_snapshot_record(&self, uid: &str) -> Result<SnapshotRecord, KilnError> {
        if uid.trim().is_empty() {
            return Err(KilnError::Validation("snapshot id must not be empty".into()));
        }
        self.api
            .get_snapshot(uid)
            .await
            .map_err(|e| KilnError::snapshot_lookup(uid, e))
    }
}
