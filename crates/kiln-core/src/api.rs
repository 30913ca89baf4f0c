use std::future::Future;
use std::pin::Pin;

use crate::error::ApiError;
use crate::model::{
    CreateRuntimeRequest, CreateSnapshotRequest, EnvironmentRecord, RuntimeRecord, SnapshotRecord,
};

/// Boxed future returned by every [`PlatformApi`] call.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Facade over the remote runtime platform.
///
/// Implementations own the transport and the auth token; the core only sees
/// records and [`ApiError`] signals. Uses `Pin<Box<dyn Future>>` so the
/// client can hold an `Arc<dyn PlatformApi>`.
pub trait PlatformApi: Send + Sync {
    fn list_environments(&self) -> ApiFuture<'_, Vec<EnvironmentRecord>>;

    /// Fails with [`ApiError::EnvironmentUnknown`] or [`ApiError::NoCapacity`]
    /// when the platform refuses to provision.
    fn create_runtime<'a>(&'a self, request: &'a CreateRuntimeRequest)
    -> ApiFuture<'a, RuntimeRecord>;

    fn list_runtimes(&self) -> ApiFuture<'_, Vec<RuntimeRecord>>;

    fn get_runtime<'a>(&'a self, pod_name: &'a str) -> ApiFuture<'a, RuntimeRecord>;

    fn delete_runtime<'a>(&'a self, pod_name: &'a str) -> ApiFuture<'a, ()>;

    fn create_snapshot<'a>(
        &'a self,
        request: &'a CreateSnapshotRequest,
    ) -> ApiFuture<'a, SnapshotRecord>;

    fn list_snapshots(&self) -> ApiFuture<'_, Vec<SnapshotRecord>>;

    fn get_snapshot<'a>(&'a self, uid: &'a str) -> ApiFuture<'a, SnapshotRecord>;

    fn delete_snapshot<'a>(&'a self, uid: &'a str) -> ApiFuture<'a, ()>;

    /// Backend name for logging.
    fn backend_name(&self) -> &str;
}
