//! Correlation reducer.
//!
//! Pure transformation of one milestone fetch (milestone + merge requests +
//! issues) into the local record batches. Issue ↔ merge-request linkage is
//! inferred from `Closes #N` references in MR descriptions; nothing here
//! touches the store.

use crate::config::BranchConfig;
use crate::models::{Branch, Issue, MergeRequest};
use crate::services::remote::{RemoteIssue, RemoteMergeRequest, RemoteMilestone};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// `Closes #42`, `closes #42`, `Close #42` — case-insensitive.
static CLOSING_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bcloses?\s+#(\d+)").unwrap());

/// The record batches produced from one milestone fetch.
#[derive(Debug, Default)]
pub struct ReducedMilestone {
    pub issues: Vec<Issue>,
    pub merge_requests: Vec<MergeRequest>,
    pub branches: Vec<Branch>,

    /// Best-guess primary feature branch for the milestone's work; empty
    /// when no branch carries the configured prefix.
    pub feature_branch: String,
}

/// Extract the IID of the issue a description closes, or 0 if none.
pub fn closing_issue_iid(description: &str) -> i64 {
    CLOSING_REF
        .captures(description)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// First branch name carrying the feature prefix, scanning each merge
/// request's source branch before its target. Empty string if none match.
pub fn guess_feature_branch(merge_requests: &[RemoteMergeRequest], prefix: &str) -> String {
    for mr in merge_requests {
        for name in [&mr.source_branch, &mr.target_branch] {
            if name.starts_with(prefix) {
                return name.clone();
            }
        }
    }
    String::new()
}

/// Reduce one milestone's merge requests and issues into local record
/// batches.
///
/// A merge request that closes an IID absent from the fetched issue set is
/// an anomaly: it is logged and an issue record is still emitted from the
/// partially-known data, so one broken cross-reference never fails the
/// batch. Multiple MRs may close the same IID; deduplication is the entity
/// store's job, not the reducer's.
pub fn reduce_milestone(
    project_id: i64,
    milestone: &RemoteMilestone,
    merge_requests: &[RemoteMergeRequest],
    issues: &[RemoteIssue],
    branches: &BranchConfig,
) -> ReducedMilestone {
    let milestone_id = milestone.id;
    let issue_index: HashMap<i64, &RemoteIssue> =
        issues.iter().map(|issue| (issue.iid, issue)).collect();

    let mut reduced = ReducedMilestone {
        feature_branch: guess_feature_branch(merge_requests, &branches.feature_prefix),
        ..Default::default()
    };

    for mr in merge_requests {
        let issue_iid = closing_issue_iid(mr.description.as_deref().unwrap_or(""));

        if issue_iid != 0 {
            match issue_index.get(&issue_iid) {
                Some(remote_issue) => {
                    let mut issue = Issue::new(
                        issue_iid,
                        remote_issue.title.clone(),
                        remote_issue.description.clone().unwrap_or_default(),
                        project_id,
                        milestone_id,
                        mr.source_branch.clone(),
                        remote_issue.web_url.clone(),
                    );
                    issue.closed_at = remote_issue.closed_at.clone();
                    reduced.issues.push(issue);
                }
                None => {
                    log::warn!(
                        "merge request !{} closes #{} but the milestone's issue list does not contain it",
                        mr.iid,
                        issue_iid
                    );
                    reduced.issues.push(Issue::new(
                        issue_iid,
                        "",
                        "",
                        project_id,
                        milestone_id,
                        mr.source_branch.clone(),
                        "",
                    ));
                }
            }
        }

        reduced.merge_requests.push(MergeRequest::new(
            project_id,
            milestone_id,
            issue_iid,
            mr.id,
            mr.iid,
            mr.source_branch.clone(),
            mr.target_branch.clone(),
            mr.web_url.clone(),
        ));

        reduced.branches.push(Branch::new(
            project_id,
            milestone_id,
            issue_iid,
            mr.source_branch.clone(),
        ));
        // Long-lived built-in branches are not tracked as project branches
        if !branches.is_reserved(&mr.target_branch) {
            reduced.branches.push(Branch::new(
                project_id,
                milestone_id,
                0,
                mr.target_branch.clone(),
            ));
        }
    }

    reduced
}
