//! Handles that outlive the remote entity they refer to.
//!
//! Deleting through a handle tombstones it: the handle stays in memory but
//! every accessor returns [`KilnError::Deleted`] from then on.

use std::sync::Arc;
use std::time::Duration;

use crate::api::PlatformApi;
use crate::error::{KilnError, Resource};
use crate::model::{RuntimeRecord, RuntimeState, SnapshotRecord};
use crate::poller::ReadinessPoller;
use crate::snapshot::SnapshotCoordinator;

#[derive(Debug, Clone)]
enum Slot<T> {
    Live(T),
    Deleted,
}

impl<T> Slot<T> {
    fn get(&self, resource: Resource, id: &str) -> Result<&T, KilnError> {
        match self {
            Slot::Live(value) => Ok(value),
            Slot::Deleted => Err(KilnError::Deleted {
                resource,
                id: id.to_string(),
            }),
        }
    }

    fn get_mut(&mut self, resource: Resource, id: &str) -> Result<&mut T, KilnError> {
        match self {
            Slot::Live(value) => Ok(value),
            Slot::Deleted => Err(KilnError::Deleted {
                resource,
                id: id.to_string(),
            }),
        }
    }
}

/// A runtime bound to the platform it lives on.
pub struct RuntimeHandle {
    slot: Slot<RuntimeRecord>,
    /// Kept outside the slot so a tombstoned handle can still name itself.
    pod_name: String,
    api: Arc<dyn PlatformApi>,
    snapshots: Arc<SnapshotCoordinator>,
    poller: Arc<ReadinessPoller>,
}

impl std::fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("pod_name", &self.pod_name)
            .field("slot", &self.slot)
            .finish()
    }
}

impl RuntimeHandle {
    pub(crate) fn new(
        record: RuntimeRecord,
        api: Arc<dyn PlatformApi>,
        snapshots: Arc<SnapshotCoordinator>,
        poller: Arc<ReadinessPoller>,
    ) -> Self {
        Self {
            pod_name: record.pod_name.clone(),
            slot: Slot::Live(record),
            api,
            snapshots,
            poller,
        }
    }

    pub fn record(&self) -> Result<&RuntimeRecord, KilnError> {
        self.slot.get(Resource::Runtime, &self.pod_name)
    }

    pub fn pod_name(&self) -> Result<&str, KilnError> {
        Ok(&self.record()?.pod_name)
    }

    pub fn state(&self) -> Result<RuntimeState, KilnError> {
        Ok(self.record()?.state)
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self.slot, Slot::Deleted)
    }

    /// Consume the handle, returning the last observed record.
    pub fn into_record(self) -> Result<RuntimeRecord, KilnError> {
        match self.slot {
            Slot::Live(record) => Ok(record),
            Slot::Deleted => Err(KilnError::Deleted {
                resource: Resource::Runtime,
                id: self.pod_name,
            }),
        }
    }

    /// Re-fetch the runtime from the platform.
    pub async fn refresh(&mut self) -> Result<&RuntimeRecord, KilnError> {
        self.slot.get(Resource::Runtime, &self.pod_name)?;
        let fresh = self
            .api
            .get_runtime(&self.pod_name)
            .await
            .map_err(|e| KilnError::runtime_lookup(&self.pod_name, e))?;
        self.slot = Slot::Live(fresh);
        self.record()
    }

    /// Poll until the runtime is running. See [`ReadinessPoller`].
    pub async fn wait_until_ready(&mut self, timeout: Duration) -> Result<&RuntimeRecord, KilnError> {
        let record = self.slot.get_mut(Resource::Runtime, &self.pod_name)?;
        self.poller.wait_until_ready(record, timeout).await?;
        self.record()
    }

    pub async fn create_snapshot(
        &self,
        name: &str,
        description: &str,
        stop: bool,
    ) -> Result<SnapshotRecord, KilnError> {
        let pod_name = self.pod_name()?;
        self.snapshots.create(pod_name, name, description, stop).await
    }

    /// Delete the runtime. On success the handle is tombstoned; a failed
    /// delete leaves it live.
    pub async fn delete(&mut self) -> Result<(), KilnError> {
        self.slot.get(Resource::Runtime, &self.pod_name)?;
        self.api
            .delete_runtime(&self.pod_name)
            .await
            .map_err(|e| KilnError::runtime_lookup(&self.pod_name, e))?;
        self.slot = Slot::Deleted;
        tracing::info!(pod_name = %self.pod_name, "Runtime deleted");
        Ok(())
    }
}

/// A snapshot bound to the platform it lives on.
pub struct SnapshotHandle {
    slot: Slot<SnapshotRecord>,
    uid: String,
    api: Arc<dyn PlatformApi>,
}

impl std::fmt::Debug for SnapshotHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotHandle")
            .field("uid", &self.uid)
            .field("slot", &self.slot)
            .finish()
    }
}

impl SnapshotHandle {
    pub(crate) fn new(record: SnapshotRecord, api: Arc<dyn PlatformApi>) -> Self {
        Self {
            uid: record.uid.clone(),
            slot: Slot::Live(record),
            api,
        }
    }

    pub fn record(&self) -> Result<&SnapshotRecord, KilnError> {
        self.slot.get(Resource::Snapshot, &self.uid)
    }

    pub fn uid(&self) -> Result<&str, KilnError> {
        Ok(&self.record()?.uid)
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self.slot, Slot::Deleted)
    }

    pub async fn delete(&mut self) -> Result<(), KilnError> {
        self.slot.get(Resource::Snapshot, &self.uid)?;
        self.api
            .delete_snapshot(&self.uid)
            .await
            .map_err(|e| KilnError::snapshot_lookup(&self.uid, e))?;
        self.slot = Slot::Deleted;
        tracing::info!(uid = %self.uid, "Snapshot deleted");
        Ok(())
    }
}
