use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use crate::api::{ApiFuture, PlatformApi};
use crate::error::ApiError;
use crate::model::{
    CreateRuntimeRequest, CreateSnapshotRequest, EnvironmentRecord, RuntimeRecord, RuntimeState,
    RuntimeType, SnapshotRecord,
};

/// Per-operation call counters recorded by [`StubPlatform`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StubCalls {
    pub list_environments: usize,
    pub create_runtime: usize,
    pub list_runtimes: usize,
    pub get_runtime: usize,
    pub delete_runtime: usize,
    pub create_snapshot: usize,
    pub list_snapshots: usize,
    pub get_snapshot: usize,
    pub delete_snapshot: usize,
}

#[derive(Default)]
struct StubState {
    environments: Vec<EnvironmentRecord>,
    runtimes: Vec<RuntimeRecord>,
    snapshots: Vec<SnapshotRecord>,
    /// pod_name -> states returned by successive `get_runtime` calls; the
    /// last entry sticks.
    scripts: HashMap<String, VecDeque<RuntimeState>>,
    create_failures: VecDeque<ApiError>,
    delete_failures: HashMap<String, ApiError>,
    pod_names: VecDeque<String>,
    next_id: u64,
    created: Vec<CreateRuntimeRequest>,
    snapshot_requests: Vec<CreateSnapshotRequest>,
    calls: StubCalls,
}

/// Deterministic in-memory platform for tests and offline use.
///
/// Behaves like the remote platform for the happy path (created runtimes
/// start in `starting`, snapshots capture the source environment) and lets
/// callers script state sequences and inject failures.
pub struct StubPlatform {
    state: Mutex<StubState>,
}

impl Default for StubPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl StubPlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StubState::default()),
        }
    }

    pub fn with_environments(self, environments: Vec<EnvironmentRecord>) -> Self {
        self.lock().environments = environments;
        self
    }

    pub fn with_runtimes(self, runtimes: Vec<RuntimeRecord>) -> Self {
        self.lock().runtimes = runtimes;
        self
    }

    pub fn with_snapshots(self, snapshots: Vec<SnapshotRecord>) -> Self {
        self.lock().snapshots = snapshots;
        self
    }

    /// States handed out by successive `get_runtime(pod_name)` calls.
    pub fn script_states(&self, pod_name: &str, states: Vec<RuntimeState>) {
        self.lock()
            .scripts
            .insert(pod_name.to_string(), states.into_iter().collect());
    }

    /// Fail the next `create_runtime` call with `err`.
    pub fn fail_next_create(&self, err: ApiError) {
        self.lock().create_failures.push_back(err);
    }

    /// Fail every `delete_runtime(pod_name)` call with `err`.
    pub fn fail_delete(&self, pod_name: &str, err: ApiError) {
        self.lock()
            .delete_failures
            .insert(pod_name.to_string(), err);
    }

    /// Pod name assigned to the next created runtime.
    pub fn queue_pod_name(&self, pod_name: &str) {
        self.lock().pod_names.push_back(pod_name.to_string());
    }

    pub fn calls(&self) -> StubCalls {
        self.lock().calls.clone()
    }

    /// Every create request received, in order.
    pub fn create_requests(&self) -> Vec<CreateRuntimeRequest> {
        self.lock().created.clone()
    }

    pub fn snapshot_requests(&self) -> Vec<CreateSnapshotRequest> {
        self.lock().snapshot_requests.clone()
    }

    pub fn runtimes(&self) -> Vec<RuntimeRecord> {
        self.lock().runtimes.clone()
    }

    pub fn snapshots(&self) -> Vec<SnapshotRecord> {
        self.lock().snapshots.clone()
    }

    fn lock(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn ready<'a, T: Send + 'a>(result: Result<T, ApiError>) -> ApiFuture<'a, T> {
    Box::pin(std::future::ready(result))
}

impl StubState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn create_runtime(&mut self, request: &CreateRuntimeRequest) -> Result<RuntimeRecord, ApiError> {
        self.calls.create_runtime += 1;
        self.created.push(request.clone());

        if let Some(err) = self.create_failures.pop_front() {
            return Err(err);
        }

        let env = self
            .environments
            .iter()
            .find(|e| e.name == request.environment_name)
            .cloned()
            .ok_or_else(|| ApiError::EnvironmentUnknown(request.environment_name.clone()))?;

        if let Some(uid) = &request.from
            && !self.snapshots.iter().any(|s| &s.uid == uid)
        {
            return Err(ApiError::NotFound(format!("snapshot {uid}")));
        }

        let id = self.next_id();
        let pod_name = self
            .pod_names
            .pop_front()
            .unwrap_or_else(|| format!("runtime-{id:06}"));

        let runtime = RuntimeRecord {
            pod_name,
            uid: format!("uid-{id}"),
            environment_name: env.name,
            state: RuntimeState::Starting,
            runtime_type: request.runtime_type.unwrap_or(RuntimeType::Notebook),
            given_name: request.given_name.clone(),
            burning_rate: env.burning_rate,
            credits: request.credits_limit.unwrap_or(env.burning_rate),
            created_at: Some(Utc::now()),
            started_at: None,
            expired_at: None,
            ingress: None,
            token: None,
        };
        self.runtimes.push(runtime.clone());
        Ok(runtime)
    }

    fn get_runtime(&mut self, pod_name: &str) -> Result<RuntimeRecord, ApiError> {
        self.calls.get_runtime += 1;

        let next_state = self.scripts.get_mut(pod_name).and_then(|script| {
            if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().copied()
            }
        });

        let runtime = self
            .runtimes
            .iter_mut()
            .find(|r| r.pod_name == pod_name)
            .ok_or_else(|| ApiError::NotFound(format!("runtime {pod_name}")))?;

        if let Some(state) = next_state {
            runtime.state = state;
        }
        if runtime.state == RuntimeState::Running && runtime.ingress.is_none() {
            runtime.started_at = Some(Utc::now());
            runtime.ingress = Some(format!("https://{pod_name}.stub.kiln"));
            runtime.token = Some(format!("token-{}", runtime.uid));
        }
        Ok(runtime.clone())
    }

    fn delete_runtime(&mut self, pod_name: &str) -> Result<(), ApiError> {
        self.calls.delete_runtime += 1;

        if let Some(err) = self.delete_failures.get(pod_name) {
            return Err(err.clone());
        }
        let before = self.runtimes.len();
        self.runtimes.retain(|r| r.pod_name != pod_name);
        if self.runtimes.len() == before {
            return Err(ApiError::NotFound(format!("runtime {pod_name}")));
        }
        Ok(())
    }

    fn create_snapshot(
        &mut self,
        request: &CreateSnapshotRequest,
    ) -> Result<SnapshotRecord, ApiError> {
        self.calls.create_snapshot += 1;
        self.snapshot_requests.push(request.clone());

        let id = self.next_id();
        let runtime = self
            .runtimes
            .iter_mut()
            .find(|r| r.pod_name == request.pod_name)
            .ok_or_else(|| ApiError::NotFound(format!("runtime {}", request.pod_name)))?;

        if request.stop {
            runtime.state = RuntimeState::Stopping;
        }

        let snapshot = SnapshotRecord {
            uid: format!("snapshot-{id:06}"),
            name: request.name.clone(),
            description: Some(request.description.clone()),
            environment: runtime.environment_name.clone(),
            status: "ready".into(),
            updated_at: Some(Utc::now()),
            size: None,
            files: None,
        };
        self.snapshots.push(snapshot.clone());
        Ok(snapshot)
    }

    fn get_snapshot(&mut self, uid: &str) -> Result<SnapshotRecord, ApiError> {
        self.calls.get_snapshot += 1;
        self.snapshots
            .iter()
            .find(|s| s.uid == uid)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("snapshot {uid}")))
    }

    fn delete_snapshot(&mut self, uid: &str) -> Result<(), ApiError> {
        self.calls.delete_snapshot += 1;
        let before = self.snapshots.len();
        self.snapshots.retain(|s| s.uid != uid);
        if self.snapshots.len() == before {
            return Err(ApiError::NotFound(format!("snapshot {uid}")));
        }
        Ok(())
    }
}

impl PlatformApi for StubPlatform {
    fn list_environments(&self) -> ApiFuture<'_, Vec<EnvironmentRecord>> {
        let mut state = self.lock();
        state.calls.list_environments += 1;
        ready(Ok(state.environments.clone()))
    }

    fn create_runtime<'a>(
        &'a self,
        request: &'a CreateRuntimeRequest,
    ) -> ApiFuture<'a, RuntimeRecord> {
        ready(self.lock().create_runtime(request))
    }

    fn list_runtimes(&self) -> ApiFuture<'_, Vec<RuntimeRecord>> {
        let mut state = self.lock();
        state.calls.list_runtimes += 1;
        ready(Ok(state.runtimes.clone()))
    }

    fn get_runtime<'a>(&'a self, pod_name: &'a str) -> ApiFuture<'a, RuntimeRecord> {
        ready(self.lock().get_runtime(pod_name))
    }

    fn delete_runtime<'a>(&'a self, pod_name: &'a str) -> ApiFuture<'a, ()> {
        ready(self.lock().delete_runtime(pod_name))
    }

    fn create_snapshot<'a>(
        &'a self,
        request: &'a CreateSnapshotRequest,
    ) -> ApiFuture<'a, SnapshotRecord> {
        ready(self.lock().create_snapshot(request))
    }

    fn list_snapshots(&self) -> ApiFuture<'_, Vec<SnapshotRecord>> {
        let mut state = self.lock();
        state.calls.list_snapshots += 1;
        ready(Ok(state.snapshots.clone()))
    }

    fn get_snapshot<'a>(&'a self, uid: &'a str) -> ApiFuture<'a, SnapshotRecord> {
        ready(self.lock().get_snapshot(uid))
    }

    fn delete_snapshot<'a>(&'a self, uid: &'a str) -> ApiFuture<'a, ()> {
        ready(self.lock().delete_snapshot(uid))
    }

    fn backend_name(&self) -> &str {
        "stub"
    }
}
