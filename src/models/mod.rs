//! Data models for the local milestone mirror.
//!
//! Each record carries a local autoincrement `id` plus the identifiers the
//! remote service assigned. All models derive `FromRow` for SQLx queries and
//! implement [`crate::store::Entity`] so the store can probe and insert them
//! generically.

pub mod branch;
pub mod issue;
pub mod merge_request;
pub mod milestone;
pub mod project;

// Re-exports for convenient access
pub use branch::Branch;
pub use issue::Issue;
pub use merge_request::MergeRequest;
pub use milestone::Milestone;
pub use project::Project;
