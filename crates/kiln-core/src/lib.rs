//! Lifecycle core for remote compute runtimes.
//!
//! [`KilnClient`] decides whether to reuse a running runtime, restore one
//! from a snapshot or provision a new one, waits for runtimes to become
//! usable, and tears them down. The platform itself sits behind
//! [`PlatformApi`].
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kiln_core::{Criteria, KilnClient, RuntimeAccess, StubPlatform};
//!
//! # async fn run() -> Result<(), kiln_core::KilnError> {
//! let client = KilnClient::new(Arc::new(StubPlatform::new()));
//!
//! let criteria = Criteria {
//!     environment_name: Some("python-default-env".into()),
//!     reuse_existing: true,
//!     wait_until_ready: true,
//!     ..Default::default()
//! };
//! let runtime = client.ensure(&criteria).await?;
//! println!("{}", runtime.pod_name()?);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod budget;
pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod handle;
#[cfg(feature = "http")]
pub mod http;
pub mod intercept;
pub mod model;
pub mod poller;
pub mod resolver;
pub mod snapshot;
pub mod stub;

pub use api::PlatformApi;
pub use budget::{credits_for_duration, max_duration_for_credits};
pub use client::{
    EnvironmentAccess, KilnClient, Outcome, RuntimeAccess, SnapshotAccess, SnapshotRef,
    Termination,
};
pub use config::KilnConfig;
pub use error::{ApiError, KilnError};
pub use handle::{RuntimeHandle, SnapshotHandle};
pub use model::{EnvironmentRecord, RuntimeRecord, RuntimeState, RuntimeType, SnapshotRecord};
pub use resolver::Criteria;
pub use stub::StubPlatform;
