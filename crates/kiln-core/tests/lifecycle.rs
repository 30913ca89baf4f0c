//! End-to-end lifecycle tests for `KilnClient` over the in-memory platform.
//!
//! Everything goes through the public access traits, the way a caller would
//! use the crate.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use kiln_core::error::{ApiError, Resource};
use kiln_core::intercept::{CallHooks, CallInfo};
use kiln_core::model::RuntimeType;
use kiln_core::{
    Criteria, EnvironmentAccess, EnvironmentRecord, KilnClient, KilnError, Outcome,
    RuntimeAccess, RuntimeRecord, RuntimeState, SnapshotAccess, SnapshotRecord, SnapshotRef,
    StubPlatform,
};

fn env(name: &str, burning_rate: f64) -> EnvironmentRecord {
    EnvironmentRecord {
        name: name.into(),
        title: name.into(),
        burning_rate,
        language: "python".into(),
        description: None,
    }
}

fn runtime(pod_name: &str, environment: &str, state: RuntimeState, credits: f64) -> RuntimeRecord {
    RuntimeRecord {
        pod_name: pod_name.into(),
        uid: format!("uid-{pod_name}"),
        environment_name: environment.into(),
        state,
        runtime_type: RuntimeType::Notebook,
        given_name: None,
        burning_rate: 10.0,
        credits,
        created_at: None,
        started_at: None,
        expired_at: None,
        ingress: None,
        token: None,
    }
}

fn snapshot(uid: &str, environment: &str) -> SnapshotRecord {
    SnapshotRecord {
        uid: uid.into(),
        name: "nightly".into(),
        description: None,
        environment: environment.into(),
        status: "ready".into(),
        updated_at: None,
        size: None,
        files: None,
    }
}

fn platform() -> StubPlatform {
    StubPlatform::new().with_environments(vec![
        env("python-default-env", 10.0),
        env("python-gpu-env", 120.0),
    ])
}

#[tokio::test]
async fn ensure_reuses_running_runtime_in_budget() {
    let stub = Arc::new(platform().with_runtimes(vec![runtime(
        "runtime-abc123",
        "python-default-env",
        RuntimeState::Running,
        40.0,
    )]));
    let client = KilnClient::new(stub.clone());

    let criteria = Criteria {
        credits_limit: Some(100.0),
        ..Criteria::reuse("python-default-env")
    };
    let handle = client.ensure(&criteria).await.unwrap();

    assert_eq!(handle.pod_name().unwrap(), "runtime-abc123");
    assert_eq!(stub.calls().create_runtime, 0);
}

#[tokio::test]
async fn ensure_without_environment_uses_first_catalog_entry() {
    let stub = Arc::new(platform());
    stub.queue_pod_name("runtime-new456");
    let client = KilnClient::new(stub.clone());

    let handle = client.ensure(&Criteria::default()).await.unwrap();

    assert_eq!(handle.pod_name().unwrap(), "runtime-new456");
    assert_eq!(handle.record().unwrap().environment_name, "python-default-env");
    assert_eq!(handle.state().unwrap(), RuntimeState::Starting);
}

#[tokio::test(start_paused = true)]
async fn ensure_waits_until_ready_when_asked() {
    let stub = Arc::new(platform());
    stub.queue_pod_name("runtime-new456");
    stub.script_states(
        "runtime-new456",
        vec![RuntimeState::Starting, RuntimeState::Running],
    );
    let client = KilnClient::new(stub.clone());

    let started = tokio::time::Instant::now();
    let criteria = Criteria {
        environment_name: Some("python-default-env".into()),
        wait_until_ready: true,
        ..Default::default()
    };
    let handle = client.ensure(&criteria).await.unwrap();

    assert_eq!(handle.state().unwrap(), RuntimeState::Running);
    assert!(handle.record().unwrap().ingress.is_some());
    assert_eq!(started.elapsed(), Duration::from_millis(2000));
    assert_eq!(stub.calls().get_runtime, 2);
}

#[tokio::test(start_paused = true)]
async fn ready_timeout_from_client_applies_when_none_given() {
    let stub = Arc::new(platform().with_runtimes(vec![runtime(
        "runtime-abc123",
        "python-default-env",
        RuntimeState::Starting,
        0.0,
    )]));
    let client = KilnClient::new(stub.clone()).with_ready_timeout(Duration::from_secs(3));

    let mut handle = client.get_runtime("runtime-abc123").await.unwrap();
    let fetched_before_wait = stub.calls().get_runtime;
    let err = client.wait_until_ready(&mut handle, None).await.unwrap_err();

    match err {
        KilnError::Timeout {
            pod_name,
            timeout_ms,
            elapsed_ms,
        } => {
            assert_eq!(pod_name, "runtime-abc123");
            assert_eq!(timeout_ms, 3000);
            assert_eq!(elapsed_ms, 4000);
        }
        other => panic!("expected Timeout, got {other:?}"),
    }
    // Fetches at 0s, 2s and 4s on top of the initial lookup.
    assert_eq!(stub.calls().get_runtime - fetched_before_wait, 3);
}

#[tokio::test]
async fn terminate_all_settles_every_deletion() {
    let stub = Arc::new(platform().with_runtimes(vec![
        runtime("runtime-a", "python-default-env", RuntimeState::Running, 0.0),
        runtime("runtime-b", "python-default-env", RuntimeState::Starting, 0.0),
        runtime("runtime-c", "python-gpu-env", RuntimeState::Running, 0.0),
    ]));
    stub.fail_delete(
        "runtime-b",
        ApiError::Status {
            status: 500,
            body: "volume busy".into(),
        },
    );
    let client = KilnClient::new(stub.clone());

    let results = client.terminate_all().await.unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(stub.calls().delete_runtime, 3);
    let failed: Vec<_> = results
        .iter()
        .filter(|t| !t.outcome.is_success())
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].pod_name, "runtime-b");
    assert!(matches!(&failed[0].outcome, Outcome::Error(msg) if msg.contains("volume busy")));

    let remaining: Vec<_> = stub.runtimes().into_iter().map(|r| r.pod_name).collect();
    assert_eq!(remaining, vec!["runtime-b".to_string()]);
}

#[tokio::test]
async fn terminate_all_with_nothing_running_is_empty() {
    let client = KilnClient::new(Arc::new(platform()));
    assert!(client.terminate_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn restore_by_id_honours_environment_override() {
    let stub = Arc::new(platform().with_snapshots(vec![snapshot(
        "snapshot-001",
        "python-default-env",
    )]));
    let client = KilnClient::new(stub.clone());

    let handle = client
        .restore_from_snapshot(SnapshotRef::Id("snapshot-001"), Some("python-gpu-env"), Some(30))
        .await
        .unwrap();

    assert_eq!(handle.record().unwrap().environment_name, "python-gpu-env");
    let request = &stub.create_requests()[0];
    assert_eq!(request.from.as_deref(), Some("snapshot-001"));
    assert_eq!(request.environment_name, "python-gpu-env");
    // 30 minutes at 120 credits/hour
    assert_eq!(request.credits_limit, Some(60.0));
}

#[tokio::test]
async fn restore_from_record_skips_the_lookup() {
    let record = snapshot("snapshot-001", "python-default-env");
    let stub = Arc::new(platform().with_snapshots(vec![record.clone()]));
    let client = KilnClient::new(stub.clone());

    let handle = client
        .restore_from_snapshot(SnapshotRef::from(&record), None, None)
        .await
        .unwrap();

    assert_eq!(handle.record().unwrap().environment_name, "python-default-env");
    assert_eq!(stub.calls().get_snapshot, 0);
    assert_eq!(stub.create_requests()[0].credits_limit, None);
}

#[tokio::test]
async fn restore_of_missing_snapshot_is_not_found() {
    let client = KilnClient::new(Arc::new(platform()));

    let err = client
        .restore_from_snapshot("snapshot-404".into(), None, None)
        .await
        .unwrap_err();

    assert!(matches!(&err, KilnError::SnapshotNotFound { uid } if uid == "snapshot-404"));
    assert!(err.is_not_found());
}

#[tokio::test]
async fn snapshot_round_trip_through_handles() {
    let stub = Arc::new(platform());
    stub.queue_pod_name("runtime-abc123");
    let client = KilnClient::new(stub.clone());
    let runtime = client
        .ensure(&Criteria::reuse("python-default-env"))
        .await
        .unwrap();

    let mut snap = client
        .create_snapshot(runtime.pod_name().unwrap(), "nightly", "before upgrade", false)
        .await
        .unwrap();
    let uid = snap.uid().unwrap().to_string();

    let listed = client.list_snapshots().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].uid().unwrap(), uid);

    snap.delete().await.unwrap();
    assert!(matches!(
        snap.record(),
        Err(KilnError::Deleted {
            resource: Resource::Snapshot,
            ..
        })
    ));
    let err = client.get_snapshot(&uid).await.unwrap_err();
    assert!(matches!(err, KilnError::SnapshotNotFound { .. }));
}

#[tokio::test]
async fn deleted_runtime_handle_is_tombstoned() {
    let stub = Arc::new(platform().with_runtimes(vec![runtime(
        "runtime-abc123",
        "python-default-env",
        RuntimeState::Running,
        0.0,
    )]));
    let client = KilnClient::new(stub.clone());
    let mut handles = client.list_runtimes().await.unwrap();
    let handle = &mut handles[0];

    handle.delete().await.unwrap();

    assert!(handle.is_deleted());
    assert!(matches!(
        handle.pod_name(),
        Err(KilnError::Deleted {
            resource: Resource::Runtime,
            ..
        })
    ));
    let err = client.get_runtime("runtime-abc123").await.unwrap_err();
    assert!(matches!(err, KilnError::RuntimeNotFound { .. }));
}

#[tokio::test]
async fn unknown_environment_lists_known_names() {
    let client = KilnClient::new(Arc::new(platform()));

    let err = client.find_environment("python-tpu-env").await.unwrap_err();

    match err {
        KilnError::EnvironmentNotFound { environment, known } => {
            assert_eq!(environment, "python-tpu-env");
            assert_eq!(known, vec!["python-default-env", "python-gpu-env"]);
        }
        other => panic!("expected EnvironmentNotFound, got {other:?}"),
    }
}

#[derive(Default)]
struct RecordingHooks {
    seen: Mutex<Vec<String>>,
}

impl CallHooks for RecordingHooks {
    fn before(&self, call: &CallInfo<'_>) {
        self.seen
            .lock()
            .unwrap()
            .push(format!("before:{}", call.operation));
    }

    fn on_error(&self, call: &CallInfo<'_>, _error: &ApiError) {
        self.seen
            .lock()
            .unwrap()
            .push(format!("error:{}", call.operation));
    }
}

#[tokio::test]
async fn hooks_observe_every_platform_call() {
    let hooks = Arc::new(RecordingHooks::default());
    let client = KilnClient::with_hooks(Arc::new(platform()), hooks.clone());

    client.list_environments(false).await.unwrap();
    client.get_runtime("runtime-missing").await.unwrap_err();

    let seen = hooks.seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            "before:list_environments",
            "before:get_runtime",
            "error:get_runtime",
        ]
    );
}
