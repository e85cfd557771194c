//! End-to-end milestone sync tests with fake collaborators.
//!
//! These exercise the whole consistency unit: remote fetch, correlation,
//! transactional persistence, and the best-effort git refresh. The remote
//! and git collaborators are in-memory fakes so every failure mode can be
//! provoked deterministically.

use async_trait::async_trait;
use milesync::db;
use milesync::error::{GitError, RemoteError, SyncError};
use milesync::models::{Branch, Issue, MergeRequest, Milestone};
use milesync::services::git::GitClient;
use milesync::services::remote::{
    RemoteClient, RemoteIssue, RemoteMergeRequest, RemoteMilestone, RemoteProject,
};
use milesync::{BranchConfig, EntityStore, Filter, MilestoneSyncer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

/// Which remote call should fail, if any.
#[derive(Clone, Copy, PartialEq)]
enum FailOn {
    Nothing,
    Milestone,
    MergeRequests,
    Issues,
}

struct FakeRemote {
    milestone: RemoteMilestone,
    merge_requests: Vec<RemoteMergeRequest>,
    issues: Vec<RemoteIssue>,
    fail_on: FailOn,
}

impl FakeRemote {
    fn failing(self, fail_on: FailOn) -> Self {
        Self { fail_on, ..self }
    }
}

fn unreachable_remote() -> RemoteError {
    RemoteError::Network("connection refused".to_string())
}

#[async_trait]
impl RemoteClient for FakeRemote {
    async fn fetch_milestone(
        &self,
        _project_id: i64,
        _milestone_id: i64,
    ) -> Result<RemoteMilestone, RemoteError> {
        if self.fail_on == FailOn::Milestone {
            return Err(unreachable_remote());
        }
        Ok(self.milestone.clone())
    }

    async fn fetch_milestone_merge_requests(
        &self,
        _project_id: i64,
        _milestone_id: i64,
    ) -> Result<Vec<RemoteMergeRequest>, RemoteError> {
        if self.fail_on == FailOn::MergeRequests {
            return Err(unreachable_remote());
        }
        Ok(self.merge_requests.clone())
    }

    async fn fetch_milestone_issues(
        &self,
        _project_id: i64,
        _milestone_id: i64,
    ) -> Result<Vec<RemoteIssue>, RemoteError> {
        if self.fail_on == FailOn::Issues {
            return Err(unreachable_remote());
        }
        Ok(self.issues.clone())
    }

    async fn find_project(&self, name: &str) -> Result<Option<RemoteProject>, RemoteError> {
        if name == "demo" {
            Ok(Some(RemoteProject {
                id: 1000,
                name: "demo".to_string(),
                web_url: "https://gitlab.example.com/g/demo".to_string(),
            }))
        } else {
            Ok(None)
        }
    }
}

struct FakeGit {
    fail: bool,
    fetch_calls: AtomicUsize,
}

impl FakeGit {
    fn new(fail: bool) -> Self {
        Self {
            fail,
            fetch_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl GitClient for FakeGit {
    async fn current_branch(&self) -> Result<String, GitError> {
        Ok("dev".to_string())
    }

    async fn checkout(&self, _branch: &str) -> Result<(), GitError> {
        Ok(())
    }

    async fn fetch_all(&self) -> Result<(), GitError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(GitError::Command {
                command: "fetch --all".to_string(),
                stderr: "no network".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

/// Remote fixture matching the reference scenario: milestone "Q3" with one
/// merge request closing issue #5 from `feature/x-5` into `develop`.
fn q3_remote() -> FakeRemote {
    FakeRemote {
        milestone: RemoteMilestone {
            id: 7,
            title: "Q3".to_string(),
            description: Some("third quarter".to_string()),
            web_url: "https://gitlab.example.com/g/p/-/milestones/7".to_string(),
            closed_at: None,
        },
        merge_requests: vec![RemoteMergeRequest {
            id: 100,
            iid: 9,
            title: "Fix bug".to_string(),
            description: Some("Closes #5".to_string()),
            web_url: "https://gitlab.example.com/mr/100".to_string(),
            source_branch: "feature/x-5".to_string(),
            target_branch: "develop".to_string(),
        }],
        issues: vec![RemoteIssue {
            id: 5000,
            iid: 5,
            title: "Bug".to_string(),
            description: Some("it breaks".to_string()),
            web_url: "https://gitlab.example.com/issues/5".to_string(),
            project_id: 1000,
            closed_at: None,
        }],
        fail_on: FailOn::Nothing,
    }
}

async fn setup(
    remote: FakeRemote,
    git: Arc<FakeGit>,
) -> (tempfile::TempDir, EntityStore, MilestoneSyncer) {
    let dir = tempdir().unwrap();
    let pool = db::initialize(&dir.path().join("test.db")).await.unwrap();
    let store = EntityStore::new(pool);
    let syncer = MilestoneSyncer::new(
        Arc::new(remote),
        git,
        store.clone(),
        BranchConfig::default(),
    );
    (dir, store, syncer)
}

#[tokio::test]
async fn sync_milestone_end_to_end() {
    let git = Arc::new(FakeGit::new(false));
    let (_dir, store, syncer) = setup(q3_remote(), git.clone()).await;

    let outcome = syncer.sync_milestone(1000, 7).await.unwrap();

    assert_eq!(outcome.milestone.title, "Q3");
    assert_eq!(outcome.new_issues, 1);
    assert_eq!(outcome.new_merge_requests, 1);
    assert_eq!(outcome.new_branches, 2);
    assert_eq!(outcome.feature_branch, "feature/x-5");

    let issue: Issue = store
        .query_one(&Filter::new().eq("issue_iid", 5i64))
        .await
        .unwrap();
    assert_eq!(issue.title, "Bug");
    assert_eq!(issue.related_branch, "feature/x-5");

    let mr: MergeRequest = store
        .query_one(&Filter::new().eq("mr_id", 100i64))
        .await
        .unwrap();
    assert_eq!(mr.issue_iid, 5);

    // `develop` is not a reserved name under the default config, so both
    // endpoints of the merge request are tracked
    let branches: Vec<Branch> = store
        .query_many(&Filter::new().eq("project_id", 1000i64))
        .await
        .unwrap();
    let mut names: Vec<&str> = branches.iter().map(|b| b.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["develop", "feature/x-5"]);

    assert_eq!(git.fetch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn two_merge_requests_into_the_same_target_track_one_branch() {
    let mut remote = q3_remote();
    remote.merge_requests.push(RemoteMergeRequest {
        id: 101,
        iid: 10,
        title: "Fix other bug".to_string(),
        description: Some("Closes #6".to_string()),
        web_url: "https://gitlab.example.com/mr/101".to_string(),
        source_branch: "feature/y-6".to_string(),
        target_branch: "develop".to_string(),
    });
    remote.issues.push(RemoteIssue {
        id: 5001,
        iid: 6,
        title: "Other bug".to_string(),
        description: None,
        web_url: "https://gitlab.example.com/issues/6".to_string(),
        project_id: 1000,
        closed_at: None,
    });

    let git = Arc::new(FakeGit::new(false));
    let (_dir, store, syncer) = setup(remote, git).await;

    let outcome = syncer.sync_milestone(1000, 7).await.unwrap();

    // Both sources plus one shared target
    assert_eq!(outcome.new_branches, 3);

    let develops: Vec<Branch> = store
        .query_many(&Filter::new().eq("name", "develop"))
        .await
        .unwrap();
    assert_eq!(develops.len(), 1);
}

#[tokio::test]
async fn resync_is_a_safe_noop() {
    let git = Arc::new(FakeGit::new(false));
    let (_dir, store, syncer) = setup(q3_remote(), git).await;

    syncer.sync_milestone(1000, 7).await.unwrap();
    let second = syncer.sync_milestone(1000, 7).await.unwrap();

    assert_eq!(second.new_issues, 0);
    assert_eq!(second.new_merge_requests, 0);
    assert_eq!(second.new_branches, 0);

    let milestones: Vec<Milestone> = store
        .query_many(&Filter::new().eq("milestone_id", 7i64))
        .await
        .unwrap();
    assert_eq!(milestones.len(), 1);
}

#[tokio::test]
async fn failed_fetch_aborts_before_any_write() {
    for fail_on in [FailOn::Milestone, FailOn::MergeRequests, FailOn::Issues] {
        let git = Arc::new(FakeGit::new(false));
        let (_dir, store, syncer) = setup(q3_remote().failing(fail_on), git.clone()).await;

        let err = syncer.sync_milestone(1000, 7).await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteFetch { .. }));

        let milestones: Vec<Milestone> = store
            .query_many(&Filter::new().eq("project_id", 1000i64))
            .await
            .unwrap();
        assert!(milestones.is_empty());

        // The best-effort refresh only runs after a successful commit
        assert_eq!(git.fetch_calls.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn failed_fetch_error_names_the_call() {
    let git = Arc::new(FakeGit::new(false));
    let (_dir, _store, syncer) = setup(q3_remote().failing(FailOn::MergeRequests), git).await;

    let err = syncer.sync_milestone(1000, 7).await.unwrap_err();
    assert!(err.to_string().contains("merge requests"));
}

#[tokio::test]
async fn git_refresh_failure_does_not_invalidate_the_sync() {
    let git = Arc::new(FakeGit::new(true));
    let (_dir, store, syncer) = setup(q3_remote(), git.clone()).await;

    let outcome = syncer.sync_milestone(1000, 7).await.unwrap();
    assert_eq!(outcome.new_issues, 1);
    assert_eq!(git.fetch_calls.load(Ordering::SeqCst), 1);

    // The commit happened even though the refresh failed
    store
        .query_one::<Milestone>(&Filter::new().eq("milestone_id", 7i64))
        .await
        .unwrap();
}

#[tokio::test]
async fn mid_sync_write_failure_leaves_the_store_unchanged() {
    let git = Arc::new(FakeGit::new(false));
    let (_dir, store, syncer) = setup(q3_remote(), git.clone()).await;

    // Make the merge-request batch fail after the milestone and issue
    // writes have already joined the transaction
    sqlx::query("DROP TABLE merge_requests")
        .execute(store.pool())
        .await
        .unwrap();

    let err = syncer.sync_milestone(1000, 7).await.unwrap_err();
    assert!(matches!(err, SyncError::Store(_)));

    let milestones: Vec<Milestone> = store
        .query_many(&Filter::new().eq("milestone_id", 7i64))
        .await
        .unwrap();
    let issues: Vec<Issue> = store
        .query_many(&Filter::new().eq("issue_iid", 5i64))
        .await
        .unwrap();
    let branches: Vec<Branch> = store
        .query_many(&Filter::new().eq("project_id", 1000i64))
        .await
        .unwrap();
    assert!(milestones.is_empty());
    assert!(issues.is_empty());
    assert!(branches.is_empty());

    assert_eq!(git.fetch_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn ensure_project_creates_once_and_reuses() {
    let git = Arc::new(FakeGit::new(false));
    let (_dir, store, syncer) = setup(q3_remote(), git).await;

    let first = syncer.ensure_project("demo", "/src/demo").await.unwrap();
    assert_eq!(first.project_id, 1000);

    let second = syncer.ensure_project("demo", "/src/demo").await.unwrap();
    assert_eq!(second.id, first.id);

    let all: Vec<milesync::models::Project> = store
        .query_many(&Filter::new().eq("name", "demo"))
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn ensure_project_unknown_name_is_an_error() {
    let git = Arc::new(FakeGit::new(false));
    let (_dir, _store, syncer) = setup(q3_remote(), git).await;

    let err = syncer.ensure_project("missing", "/src/missing").await.unwrap_err();
    assert!(matches!(err, SyncError::UnknownProject { .. }));
}
