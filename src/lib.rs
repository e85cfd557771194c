//! milesync - local milestone mirror and reconciliation core.
//!
//! Maintains a local SQLite mirror of a GitLab project's milestones,
//! issues, merge requests, and branches so workflow tooling can answer
//! progress questions without hitting the remote API every time. The heart
//! of the crate is the reconciliation pipeline: fetch a milestone's related
//! entities, correlate issues with the merge requests that close them, and
//! persist the result under idempotency and transactional guarantees.
//!
//! The library never installs a logger; it emits through the `log` facade
//! and leaves sink setup to the binary layer.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use config::{BranchConfig, Config, RemoteConfig};
pub use error::{GitError, RemoteError, StoreError, SyncError};
pub use services::{MilestoneSyncer, SyncOutcome};
pub use store::{EntityStore, Filter, WriteScope};
