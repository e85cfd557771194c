//! Business logic services.
//!
//! The collaborator seams (remote API, local git) are traits so the sync
//! orchestrator is testable with in-memory fakes; the reducer is a pure
//! function with no collaborators at all.

pub mod git;
pub mod reducer;
pub mod remote;
pub mod sync;

pub use git::{CommandGit, GitClient};
pub use reducer::{reduce_milestone, ReducedMilestone};
pub use remote::{GitLabRemote, RemoteClient};
pub use sync::{MilestoneSyncer, SyncOutcome};
