//! Issue record.

use crate::store::{Entity, SqlValue};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A mirrored issue.
///
/// `related_branch` may be empty (no branch created yet); that is a valid
/// state, not an error.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Issue {
    /// Local autoincrement id.
    pub id: i64,

    /// Project-scoped issue number (IID).
    pub issue_iid: i64,

    /// Issue title.
    pub title: String,

    /// Issue description (Markdown).
    pub description: String,

    /// Remote project id.
    pub project_id: i64,

    /// Remote milestone id.
    pub milestone_id: i64,

    /// Branch this issue's work happens on, inferred from the merge request
    /// that closes it.
    pub related_branch: String,

    /// Web URL for the issue.
    pub web_url: String,

    /// ISO 8601 close timestamp; None while open.
    pub closed_at: Option<String>,

    /// Local creation timestamp (Unix).
    pub created_at: i64,
}

impl Issue {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        issue_iid: i64,
        title: impl Into<String>,
        description: impl Into<String>,
        project_id: i64,
        milestone_id: i64,
        related_branch: impl Into<String>,
        web_url: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            issue_iid,
            title: title.into(),
            description: description.into(),
            project_id,
            milestone_id,
            related_branch: related_branch.into(),
            web_url: web_url.into(),
            closed_at: None,
            created_at: 0,
        }
    }
}

impl Entity for Issue {
    const TABLE: &'static str = "issues";
    const KIND: &'static str = "issue";
    const COLUMNS: &'static [&'static str] = &[
        "issue_iid",
        "title",
        "description",
        "project_id",
        "milestone_id",
        "related_branch",
        "web_url",
        "closed_at",
    ];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.issue_iid.into(),
            self.title.as_str().into(),
            self.description.as_str().into(),
            self.project_id.into(),
            self.milestone_id.into(),
            self.related_branch.as_str().into(),
            self.web_url.as_str().into(),
            match &self.closed_at {
                Some(ts) => ts.as_str().into(),
                None => SqlValue::Null,
            },
        ]
    }

    fn probe_filter(&self) -> Vec<(&'static str, SqlValue)> {
        let mut filter = Vec::new();
        if self.issue_iid != 0 {
            filter.push(("issue_iid", self.issue_iid.into()));
        }
        if !self.title.is_empty() {
            filter.push(("title", self.title.as_str().into()));
        }
        if !self.description.is_empty() {
            filter.push(("description", self.description.as_str().into()));
        }
        if self.project_id != 0 {
            filter.push(("project_id", self.project_id.into()));
        }
        if self.milestone_id != 0 {
            filter.push(("milestone_id", self.milestone_id.into()));
        }
        if !self.related_branch.is_empty() {
            filter.push(("related_branch", self.related_branch.as_str().into()));
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
