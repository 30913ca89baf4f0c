use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A platform-defined compute image a runtime can be started from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentRecord {
    pub name: String,
    #[serde(default)]
    pub title: String,
    /// Credits consumed per hour by a runtime of this environment.
    pub burning_rate: f64,
    #[serde(default)]
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Lifecycle state reported by the platform. The client only observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeState {
    Starting,
    Running,
    Stopping,
    Stopped,
    Error,
    #[serde(other)]
    Unknown,
}

impl RuntimeState {
    /// Only `running` runtimes are handed out for reuse.
    pub fn is_usable(self) -> bool {
        self == RuntimeState::Running
    }
}

impl std::fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RuntimeState::Starting => "starting",
            RuntimeState::Running => "running",
            RuntimeState::Stopping => "stopping",
            RuntimeState::Stopped => "stopped",
            RuntimeState::Error => "error",
            RuntimeState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    #[default]
    Notebook,
    Terminal,
    Job,
}

impl std::str::FromStr for RuntimeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "notebook" => Ok(RuntimeType::Notebook),
            "terminal" => Ok(RuntimeType::Terminal),
            "job" => Ok(RuntimeType::Job),
            other => Err(format!("unknown runtime type: {other}")),
        }
    }
}

/// A runtime as last observed on the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeRecord {
    /// Sole identity for every mutating call (delete, snapshot).
    pub pod_name: String,
    #[serde(default)]
    pub uid: String,
    pub environment_name: String,
    pub state: RuntimeState,
    #[serde(default, rename = "type")]
    pub runtime_type: RuntimeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default)]
    pub burning_rate: f64,
    /// Credits already used or reserved by this runtime.
    #[serde(default)]
    pub credits: f64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expired_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// A saved, restorable checkpoint of a runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub uid: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Environment a restored runtime is started from, unless overridden.
    pub environment: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
}

/// Parameters of a provisioning call. `from` names a snapshot uid to restore.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateRuntimeRequest {
    pub environment_name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub runtime_type: Option<RuntimeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    /// Absent means the platform applies its own default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSnapshotRequest {
    pub pod_name: String,
    pub name: String,
    pub description: String,
    pub stop: bool,
}
