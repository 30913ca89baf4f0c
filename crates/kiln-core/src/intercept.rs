//! Before/after/on-error hooks around every platform call.
//!
//! [`Intercepted`] decorates any [`PlatformApi`] once, at construction, and
//! routes each call through a [`CallHooks`] implementation.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::api::{ApiFuture, PlatformApi};
use crate::error::ApiError;
use crate::model::{
    CreateRuntimeRequest, CreateSnapshotRequest, EnvironmentRecord, RuntimeRecord, SnapshotRecord,
};

/// Identifies a platform call for hook implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallInfo<'a> {
    pub operation: &'static str,
    /// Pod name, snapshot uid or environment the call targets, if any.
    pub target: Option<&'a str>,
}

pub trait CallHooks: Send + Sync {
    fn before(&self, _call: &CallInfo<'_>) {}

    fn after(&self, _call: &CallInfo<'_>, _elapsed: Duration) {}

    fn on_error(&self, _call: &CallInfo<'_>, _error: &ApiError) {}
}

/// Emits one structured `tracing` event per call outcome.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHooks;

impl CallHooks for TracingHooks {
    fn before(&self, call: &CallInfo<'_>) {
        tracing::debug!(operation = call.operation, target = ?call.target, "Platform call");
    }

    fn after(&self, call: &CallInfo<'_>, elapsed: Duration) {
        tracing::debug!(
            operation = call.operation,
            target = ?call.target,
            elapsed_ms = elapsed.as_millis() as u64,
            "Platform call completed"
        );
    }

    fn on_error(&self, call: &CallInfo<'_>, error: &ApiError) {
        tracing::warn!(
            operation = call.operation,
            target = ?call.target,
            error = %error,
            "Platform call failed"
        );
    }
}

/// A [`PlatformApi`] whose every call is wrapped with [`CallHooks`].
pub struct Intercepted<A> {
    inner: A,
    hooks: Arc<dyn CallHooks>,
}

impl<A: PlatformApi> Intercepted<A> {
    pub fn new(inner: A, hooks: Arc<dyn CallHooks>) -> Self {
        Self { inner, hooks }
    }

    fn wrap<'a, T, F>(&'a self, call: CallInfo<'a>, fut: F) -> ApiFuture<'a, T>
    where
        T: Send + 'a,
        F: Future<Output = Result<T, ApiError>> + Send + 'a,
    {
        Box::pin(async move {
            self.hooks.before(&call);
            let start = Instant::now();
            let result = fut.await;
            match &result {
                Ok(_) => self.hooks.after(&call, start.elapsed()),
                Err(e) => self.hooks.on_error(&call, e),
            }
            result
        })
    }
}

fn call<'a>(operation: &'static str, target: Option<&'a str>) -> CallInfo<'a> {
    CallInfo { operation, target }
}

impl<A: PlatformApi> PlatformApi for Intercepted<A> {
    fn list_environments(&self) -> ApiFuture<'_, Vec<EnvironmentRecord>> {
        self.wrap(call("list_environments", None), self.inner.list_environments())
    }

    fn create_runtime<'a>(
        &'a self,
        request: &'a CreateRuntimeRequest,
    ) -> ApiFuture<'a, RuntimeRecord> {
        self.wrap(
            call("create_runtime", Some(request.environment_name.as_str())),
            self.inner.create_runtime(request),
        )
    }

    fn list_runtimes(&self) -> ApiFuture<'_, Vec<RuntimeRecord>> {
        self.wrap(call("list_runtimes", None), self.inner.list_runtimes())
    }

    fn get_runtime<'a>(&'a self, pod_name: &'a str) -> ApiFuture<'a, RuntimeRecord> {
        self.wrap(call("get_runtime", Some(pod_name)), self.inner.get_runtime(pod_name))
    }

    fn delete_runtime<'a>(&'a self, pod_name: &'a str) -> ApiFuture<'a, ()> {
        self.wrap(
            call("delete_runtime", Some(pod_name)),
            self.inner.delete_runtime(pod_name),
        )
    }

    fn create_snapshot<'a>(
        &'a self,
        request: &'a CreateSnapshotRequest,
    ) -> ApiFuture<'a, SnapshotRecord> {
        self.wrap(
            call("create_snapshot", Some(request.pod_name.as_str())),
            self.inner.create_snapshot(request),
        )
    }

    fn list_snapshots(&self) -> ApiFuture<'_, Vec<SnapshotRecord>> {
        self.wrap(call("list_snapshots", None), self.inner.list_snapshots())
    }

    fn get_snapshot<'a>(&'a self, uid: &'a str) -> ApiFuture<'a, SnapshotRecord> {
        self.wrap(call("get_snapshot", Some(uid)), self.inner.get_snapshot(uid))
    }

    fn delete_snapshot<'a>(&'a self, uid: &'a str) -> ApiFuture<'a, ()> {
        self.wrap(call("delete_snapshot", Some(uid)), self.inner.delete_snapshot(uid))
    }

    fn backend_name(&self) -> &str {
        self.inner.backend_name()
    }
}

/// Lets an already type-erased platform be decorated.
impl PlatformApi for Arc<dyn PlatformApi> {
    fn list_environments(&self) -> ApiFuture<'_, Vec<EnvironmentRecord>> {
        self.as_ref().list_environments()
    }

    fn create_runtime<'a>(
        &'a self,
        request: &'a CreateRuntimeRequest,
    ) -> ApiFuture<'a, RuntimeRecord> {
        self.as_ref().create_runtime(request)
    }

    fn list_runtimes(&self) -> ApiFuture<'_, Vec<RuntimeRecord>> {
        self.as_ref().list_runtimes()
    }

    fn get_runtime<'a>(&'a self, pod_name: &'a str) -> ApiFuture<'a, RuntimeRecord> {
        self.as_ref().get_runtime(pod_name)
    }

    fn delete_runtime<'a>(&'a self, pod_name: &'a str) -> ApiFuture<'a, ()> {
        self.as_ref().delete_runtime(pod_name)
    }

    fn create_snapshot<'a>(
        &'a self,
        request: &'a CreateSnapshotRequest,
    ) -> ApiFuture<'a, SnapshotRecord> {
        self.as_ref().create_snapshot(request)
    }

    fn list_snapshots(&self) -> ApiFuture<'_, Vec<SnapshotRecord>> {
        self.as_ref().list_snapshots()
    }

    fn get_snapshot<'a>(&'a self, uid: &'a str) -> ApiFuture<'a, SnapshotRecord> {
        self.as_ref().get_snapshot(uid)
    }

    fn delete_snapshot<'a>(&'a self, uid: &'a str) -> ApiFuture<'a, ()> {
        self.as_ref().delete_snapshot(uid)
    }

    fn backend_name(&self) -> &str {
        self.as_ref().backend_name()
    }
}
