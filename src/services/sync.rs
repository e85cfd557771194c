//! Sync orchestrator.
//!
//! `sync_milestone` is the consistency unit exposed to callers: fetch the
//! milestone's entities from the remote collaborator, reduce them, and
//! persist everything in one transaction. The orchestrator is stateless
//! between calls; re-running a sync is a safe no-op for records the mirror
//! already holds.

use crate::config::BranchConfig;
use crate::error::SyncError;
use crate::models::{Milestone, Project};
use crate::services::git::GitClient;
use crate::services::reducer::reduce_milestone;
use crate::services::remote::RemoteClient;
use crate::store::{EntityStore, Filter, WriteScope};
use std::sync::Arc;

/// Summary of one successful sync pass.
#[derive(Debug)]
pub struct SyncOutcome {
    /// The milestone record as persisted.
    pub milestone: Milestone,

    /// Rows actually written this pass (previously-seen records count 0).
    pub new_issues: usize,
    pub new_merge_requests: usize,
    pub new_branches: usize,

    /// Best-guess primary feature branch, empty if none detected.
    pub feature_branch: String,
}

/// Coordinates remote fetch, correlation, and transactional persistence.
pub struct MilestoneSyncer {
    remote: Arc<dyn RemoteClient>,
    git: Arc<dyn GitClient>,
    store: EntityStore,
    branches: BranchConfig,
}

impl MilestoneSyncer {
    pub fn new(
        remote: Arc<dyn RemoteClient>,
        git: Arc<dyn GitClient>,
        store: EntityStore,
        branches: BranchConfig,
    ) -> Self {
        Self {
            remote,
            git,
            store,
            branches,
        }
    }

    /// Locate a project by name, creating its local record on first sight.
    ///
    /// Local lookup first; on a miss the remote is consulted and the match
    /// persisted. Project records are never updated after creation.
    pub async fn ensure_project(
        &self,
        name: &str,
        local_path: &str,
    ) -> Result<Project, SyncError> {
        match self
            .store
            .query_one::<Project>(&Filter::new().eq("name", name))
            .await
        {
            Ok(project) => return Ok(project),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let remote_project = self
            .remote
            .find_project(name)
            .await
            .map_err(|e| SyncError::RemoteFetch {
                what: "project",
                source: e,
            })?
            .ok_or_else(|| SyncError::UnknownProject {
                name: name.to_string(),
            })?;

        let record = Project::new(
            remote_project.name,
            remote_project.id,
            local_path,
            remote_project.web_url,
        );
        self.store.save(&record, &mut WriteScope::Standalone).await?;
        self.store
            .query_one::<Project>(&Filter::new().eq("name", name))
            .await
            .map_err(SyncError::from)
    }

    /// Pull one milestone's entities from the remote, correlate them, and
    /// persist them as one atomic unit.
    ///
    /// The three fetches run sequentially and any failure aborts the whole
    /// operation before a single write happens. Persistence is
    /// abort-on-first-error: the transaction commits entirely or leaves the
    /// mirror untouched. The post-commit git refresh is best-effort.
    pub async fn sync_milestone(
        &self,
        project_id: i64,
        milestone_id: i64,
    ) -> Result<SyncOutcome, SyncError> {
        let remote_milestone = self
            .remote
            .fetch_milestone(project_id, milestone_id)
            .await
            .map_err(|e| SyncError::RemoteFetch {
                what: "milestone",
                source: e,
            })?;
        let merge_requests = self
            .remote
            .fetch_milestone_merge_requests(project_id, milestone_id)
            .await
            .map_err(|e| SyncError::RemoteFetch {
                what: "merge requests",
                source: e,
            })?;
        let issues = self
            .remote
            .fetch_milestone_issues(project_id, milestone_id)
            .await
            .map_err(|e| SyncError::RemoteFetch {
                what: "issues",
                source: e,
            })?;

        let reduced = reduce_milestone(
            project_id,
            &remote_milestone,
            &merge_requests,
            &issues,
            &self.branches,
        );

        let milestone = Milestone::new(
            project_id,
            remote_milestone.id,
            remote_milestone.title,
            remote_milestone.description.unwrap_or_default(),
            remote_milestone.web_url,
            remote_milestone.closed_at,
        );

        // Issues and merge requests precede branches by convention: branches
        // reference them, even though the engine enforces no foreign keys.
        let mut tx = self.store.begin().await?;
        let (new_issues, new_merge_requests, new_branches) = {
            let mut scope = WriteScope::Within(&mut tx);
            self.store.save(&milestone, &mut scope).await?;
            let issues = self.store.batch_create(&reduced.issues, &mut scope).await?;
            let mrs = self
                .store
                .batch_create(&reduced.merge_requests, &mut scope)
                .await?;
            let branches = self
                .store
                .batch_create(&reduced.branches, &mut scope)
                .await?;
            (issues, mrs, branches)
        };
        self.store.commit(tx).await?;

        log::info!(
            "synced milestone {} of project {}: {} issues, {} merge requests, {} branches written",
            milestone_id,
            project_id,
            new_issues,
            new_merge_requests,
            new_branches
        );

        // Outside the consistency unit: a failed refresh never invalidates
        // the committed sync.
        if let Err(e) = self.git.fetch_all().await {
            log::warn!("post-sync git fetch failed: {}", e);
        }

        let milestone = self
            .store
            .query_one::<Milestone>(
                &Filter::new()
                    .eq("project_id", project_id)
                    .eq("milestone_id", milestone_id),
            )
            .await?;

        Ok(SyncOutcome {
            milestone,
            new_issues,
            new_merge_requests,
            new_branches,
            feature_branch: reduced.feature_branch,
        })
    }
}
