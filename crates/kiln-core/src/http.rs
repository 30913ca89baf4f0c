use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::api::{ApiFuture, PlatformApi};
use crate::error::ApiError;
use crate::model::{
    CreateRuntimeRequest, CreateSnapshotRequest, EnvironmentRecord, RuntimeRecord, SnapshotRecord,
};

const API_PREFIX: &str = "/api/runtimes/v1";

#[derive(Deserialize)]
struct EnvironmentsBody {
    environments: Vec<EnvironmentRecord>,
}

#[derive(Deserialize)]
struct RuntimesBody {
    runtimes: Vec<RuntimeRecord>,
}

#[derive(Deserialize)]
struct RuntimeBody {
    runtime: RuntimeRecord,
}

#[derive(Deserialize)]
struct SnapshotsBody {
    snapshots: Vec<SnapshotRecord>,
}

#[derive(Deserialize)]
struct SnapshotBody {
    snapshot: SnapshotRecord,
}

/// Whether a failed call was a provisioning request; 404 and 503 mean
/// different things there. A 404 on a restore names the missing snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    Provision,
    Restore,
    Other,
}

/// JSON-over-HTTPS transport for the runtime platform.
///
/// Authenticates with a bearer token obtained elsewhere. No retries: every
/// failure is mapped to an [`ApiError`] and returned.
pub struct HttpPlatform {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpPlatform {
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{API_PREFIX}{path}", self.base_url.trim_end_matches('/'))
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        kind: CallKind,
        target: &str,
    ) -> Result<reqwest::Response, ApiError> {
        let resp = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ApiError::Transport(format!("HTTP request failed: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(classify(status.as_u16(), body, kind, target))
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        kind: CallKind,
        target: &str,
    ) -> Result<T, ApiError> {
        let resp = self.execute(request, kind, target).await?;
        resp.json::<T>()
            .await
            .map_err(|e| ApiError::Decode(format!("{target}: {e}")))
    }
}

fn classify(status: u16, body: String, kind: CallKind, target: &str) -> ApiError {
    match (status, kind) {
        (401 | 403, _) => ApiError::Unauthorized(body),
        (404, CallKind::Provision) => ApiError::EnvironmentUnknown(target.to_string()),
        (404, CallKind::Restore | CallKind::Other) => ApiError::NotFound(target.to_string()),
        (503 | 507, CallKind::Provision | CallKind::Restore) => ApiError::NoCapacity(body),
        _ => ApiError::Status { status, body },
    }
}

impl PlatformApi for HttpPlatform {
    fn list_environments(&self) -> ApiFuture<'_, Vec<EnvironmentRecord>> {
        Box::pin(async move {
            let req = self.http.get(self.url("/environments"));
            let body: EnvironmentsBody = self.fetch(req, CallKind::Other, "environments").await?;
            Ok(body.environments)
        })
    }

    fn create_runtime<'a>(
        &'a self,
        request: &'a CreateRuntimeRequest,
    ) -> ApiFuture<'a, RuntimeRecord> {
        Box::pin(async move {
            let req = self.http.post(self.url("/runtimes")).json(request);
            let (kind, target) = match &request.from {
                Some(uid) => (CallKind::Restore, uid.as_str()),
                None => (CallKind::Provision, request.environment_name.as_str()),
            };
            let body: RuntimeBody = self.fetch(req, kind, target).await?;
            Ok(body.runtime)
        })
    }

    fn list_runtimes(&self) -> ApiFuture<'_, Vec<RuntimeRecord>> {
        Box::pin(async move {
            let req = self.http.get(self.url("/runtimes"));
            let body: RuntimesBody = self.fetch(req, CallKind::Other, "runtimes").await?;
            Ok(body.runtimes)
        })
    }

    fn get_runtime<'a>(&'a self, pod_name: &'a str) -> ApiFuture<'a, RuntimeRecord> {
        Box::pin(async move {
            let req = self.http.get(self.url(&format!("/runtimes/{pod_name}")));
            let body: RuntimeBody = self.fetch(req, CallKind::Other, pod_name).await?;
            Ok(body.runtime)
        })
    }

    fn delete_runtime<'a>(&'a self, pod_name: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let req = self.http.delete(self.url(&format!("/runtimes/{pod_name}")));
            self.execute(req, CallKind::Other, pod_name).await?;
            Ok(())
        })
    }

    fn create_snapshot<'a>(
        &'a self,
        request: &'a CreateSnapshotRequest,
    ) -> ApiFuture<'a, SnapshotRecord> {
        Box::pin(async move {
            let req = self.http.post(self.url("/runtime-snapshots")).json(request);
            let body: SnapshotBody = self
                .fetch(req, CallKind::Other, &request.pod_name)
                .await?;
            Ok(body.snapshot)
        })
    }

    fn list_snapshots(&self) -> ApiFuture<'_, Vec<SnapshotRecord>> {
        Box::pin(async move {
            let req = self.http.get(self.url("/runtime-snapshots"));
            let body: SnapshotsBody = self.fetch(req, CallKind::Other, "snapshots").await?;
            Ok(body.snapshots)
        })
    }

    fn get_snapshot<'a>(&'a self, uid: &'a str) -> ApiFuture<'a, SnapshotRecord> {
        Box::pin(async move {
            let req = self.http.get(self.url(&format!("/runtime-snapshots/{uid}")));
            let body: SnapshotBody = self.fetch(req, CallKind::Other, uid).await?;
            Ok(body.snapshot)
        })
    }

    fn delete_snapshot<'a>(&'a self, uid: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let req = self.http.delete(self.url(&format!("/runtime-snapshots/{uid}")));
            self.execute(req, CallKind::Other, uid).await?;
            Ok(())
        })
    }

    fn backend_name(&self) -> &str {
        "http"
    }
}
