use thiserror::Error;

use crate::model::RuntimeState;

/// Failure reported by a [`PlatformApi`](crate::api::PlatformApi) transport.
///
/// Transports map their own failure signals onto these variants; the core
/// then lifts them into [`KilnError`] with the identifiers it knows about.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("environment unknown to the platform: {0}")]
    EnvironmentUnknown(String),

    #[error("platform has no capacity: {0}")]
    NoCapacity(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("platform returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport failed: {0}")]
    Transport(String),

    #[error("failed to decode platform response: {0}")]
    Decode(String),
}

/// What kind of tombstoned handle an operation was attempted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Runtime,
    Snapshot,
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::Runtime => write!(f, "runtime"),
            Resource::Snapshot => write!(f, "snapshot"),
        }
    }
}

#[derive(Debug, Error)]
pub enum KilnError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("environment not found: {environment} (known: {})", known.join(", "))]
    EnvironmentNotFound {
        environment: String,
        known: Vec<String>,
    },

    #[error("no environments are available on the platform")]
    NoEnvironments,

    #[error("runtime not found: {pod_name}")]
    RuntimeNotFound { pod_name: String },

    #[error("snapshot not found: {uid}")]
    SnapshotNotFound { uid: String },

    #[error("no capacity to provision a runtime in {environment}: {message}")]
    Capacity { environment: String, message: String },

    #[error("runtime {pod_name} failed (last state: {last_state})")]
    RuntimeFailed {
        pod_name: String,
        last_state: RuntimeState,
    },

    #[error("runtime {pod_name} not ready after {elapsed_ms}ms (timeout {timeout_ms}ms)")]
    Timeout {
        pod_name: String,
        timeout_ms: u64,
        elapsed_ms: u64,
    },

    #[error("{resource} {id} has been deleted")]
    Deleted { resource: Resource, id: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KilnError {
    /// True for every "entity absent" variant, whichever entity it names.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            KilnError::EnvironmentNotFound { .. }
                | KilnError::NoEnvironments
                | KilnError::RuntimeNotFound { .. }
                | KilnError::SnapshotNotFound { .. }
        )
    }

    pub(crate) fn runtime_lookup(pod_name: &str, err: ApiError) -> Self {
        match err {
            ApiError::NotFound(_) => KilnError::RuntimeNotFound {
                pod_name: pod_name.to_string(),
            },
            other => KilnError::Api(other),
        }
    }

    pub(crate) fn snapshot_lookup(uid: &str, err: ApiError) -> Self {
        match err {
            ApiError::NotFound(_) => KilnError::SnapshotNotFound {
                uid: uid.to_string(),
            },
            other => KilnError::Api(other),
        }
    }
}
