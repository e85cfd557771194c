//! Milestone record.

use crate::store::{Entity, SqlValue};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A mirrored milestone, refreshed on each sync pass.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Milestone {
    /// Local autoincrement id.
    pub id: i64,

    /// Remote project id.
    pub project_id: i64,

    /// Remote milestone id.
    pub milestone_id: i64,

    /// Milestone title.
    pub title: String,

    /// Milestone description (Markdown).
    pub description: String,

    /// Web URL for the milestone.
    pub web_url: String,

    /// ISO 8601 close timestamp; None while the milestone is open.
    pub closed_at: Option<String>,

    /// Local creation timestamp (Unix).
    pub created_at: i64,
}

impl Milestone {
    pub fn new(
        project_id: i64,
        milestone_id: i64,
        title: impl Into<String>,
        description: impl Into<String>,
        web_url: impl Into<String>,
        closed_at: Option<String>,
    ) -> Self {
        Self {
            id: 0,
            project_id,
            milestone_id,
            title: title.into(),
            description: description.into(),
            web_url: web_url.into(),
            closed_at,
            created_at: 0,
        }
    }

    /// Whether the milestone is still open.
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    /// Parse the ISO 8601 close timestamp, if any.
    pub fn closed_time(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.closed_at.as_deref().and_then(|ts| ts.parse().ok())
    }
}

impl Entity for Milestone {
    const TABLE: &'static str = "milestones";
    const KIND: &'static str = "milestone";
    const COLUMNS: &'static [&'static str] = &[
        "project_id",
        "milestone_id",
        "title",
        "description",
        "web_url",
        "closed_at",
    ];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.project_id.into(),
            self.milestone_id.into(),
            self.title.as_str().into(),
            self.description.as_str().into(),
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
        if !self.title.is_empty() {
            filter.push(("title", self.title.as_str().into()));
        }
        if !self.description.is_empty() {
            filter.push(("description", self.description.as_str().into()));
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
