//! Merge request record.

use crate::store::{Entity, SqlValue};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A mirrored merge request.
///
/// `issue_iid` of 0 means no linked issue was inferred from the merge
/// request's description — a valid state, not an error.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MergeRequest {
    /// Local autoincrement id.
    pub id: i64,

    /// Remote project id.
    pub project_id: i64,

    /// Remote milestone id.
    pub milestone_id: i64,

    /// IID of the issue this MR closes, 0 when unlinked.
    pub issue_iid: i64,

    /// Remote global MR id.
    pub mr_id: i64,

    /// Project-scoped MR number.
    pub mr_iid: i64,

    /// Branch being merged.
    pub source_branch: String,

    /// Destination branch.
    pub target_branch: String,

    /// Web URL for the MR.
    pub web_url: String,

    /// ISO 8601 close timestamp; None while open.
    pub closed_at: Option<String>,

    /// Local creation timestamp (Unix).
    pub created_at: i64,
}

impl MergeRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        project_id: i64,
        milestone_id: i64,
        issue_iid: i64,
        mr_id: i64,
        mr_iid: i64,
        source_branch: impl Into<String>,
        target_branch: impl Into<String>,
        web_url: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            project_id,
            milestone_id,
            issue_iid,
            mr_id,
            mr_iid,
            source_branch: source_branch.into(),
            target_branch: target_branch.into(),
            web_url: web_url.into(),
            closed_at: None,
            created_at: 0,
        }
    }

    /// Whether a closing issue reference was inferred.
    pub fn is_linked(&self) -> bool {
        self.issue_iid != 0
    }
}

impl Entity for MergeRequest {
    const TABLE: &'static str = "merge_requests";
    const KIND: &'static str = "merge request";
    const COLUMNS: &'static [&'static str] = &[
        "project_id",
        "milestone_id",
        "issue_iid",
        "mr_id",
        "mr_iid",
        "source_branch",
        "target_branch",
        "web_url",
        "closed_at",
    ];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.project_id.into(),
            self.milestone_id.into(),
            self.issue_iid.into(),
            self.mr_id.into(),
            self.mr_iid.into(),
            self.source_branch.as_str().into(),
            self.target_branch.as_str().into(),
            self.web_url.as_str().into(),
            match &self.closed_at {
                Some(ts) => ts.as_str().into(),
                None => SqlValue::Null,
            },
        ]
    }

    fn probe_filter(&self) -> Vec<(&'static str, SqlValue)> {
        let mut filter = Vec::new();
        if self.project_id != 0 {
            filter.push(("project_id", self.project_id.into()));
        }
        if self.milestone_id != 0 {
            filter.push(("milestone_id", self.milestone_id.into()));
        }
        if self.issue_iid != 0 {
            filter.push(("issue_iid", self.issue_iid.into()));
        }
        if self.mr_id != 0 {
            filter.push(("mr_id", self.mr_id.into()));
        }
        if self.mr_iid != 0 {
            filter.push(("mr_iid", self.mr_iid.into()));
        }
        if !self.source_branch.is_empty() {
            filter.push(("source_branch", self.source_branch.as_str().into()));
        }
        if !self.target_branch.is_empty() {
            filter.push(("target_branch", self.target_branch.as_str().into()));
        }
        if !self.web_url.is_empty() {
            filter.push(("web_url", self.web_url.as_str().into()));
        }
        if let Some(ts) = &self.closed_at {
            filter.push(("closed_at", ts.as_str().into()));
        }
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlinked_mr() {
        let mr = MergeRequest::new(1000, 7, 0, 100, 9, "feature/x", "dev", "");
        assert!(!mr.is_linked());
        assert!(mr.probe_filter().iter().all(|(c, _)| *c != "issue_iid"));
    }
}
