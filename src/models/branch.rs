//! Branch record.

use crate::store::{Entity, SqlValue};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A git ref of interest: a feature branch, an issue branch, or either
/// endpoint of a merge request. Reserved long-lived branches (master/dev/
/// test) are never tracked here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Branch {
    /// Local autoincrement id.
    pub id: i64,

    /// Remote project id.
    pub project_id: i64,

    /// Remote milestone id.
    pub milestone_id: i64,

    /// IID of the issue this branch belongs to, 0 when not tied to one.
    pub issue_iid: i64,

    /// Branch name.
    pub name: String,

    /// Local creation timestamp (Unix).
    pub created_at: i64,
}

impl Branch {
    pub fn new(project_id: i64, milestone_id: i64, issue_iid: i64, name: impl Into<String>) -> Self {
        Self {
            id: 0,
            project_id,
            milestone_id,
            issue_iid,
            name: name.into(),
            created_at: 0,
        }
    }
}

impl Entity for Branch {
    const TABLE: &'static str = "branches";
    const KIND: &'static str = "branch";
    const COLUMNS: &'static [&'static str] =
        &["project_id", "milestone_id", "issue_iid", "name"];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.project_id.into(),
            self.milestone_id.into(),
            self.issue_iid.into(),
            self.name.as_str().into(),
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
        if !self.name.is_empty() {
            filter.push(("name", self.name.as_str().into()));
        }
        filter
    }
}
