//! Project record, the root of all other mirrored entities.

use crate::store::{Entity, SqlValue};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A project known to the local mirror.
///
/// Created once when the project is first located (locally or remotely) and
/// never updated afterwards; all other entities reference it through the
/// remote `project_id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    /// Local autoincrement id.
    pub id: i64,

    /// Short project name.
    pub name: String,

    /// Remote project id.
    pub project_id: i64,

    /// Local working-copy directory.
    pub local_path: String,

    /// Web URL for the project.
    pub web_url: String,

    /// Local creation timestamp (Unix).
    pub created_at: i64,
}

impl Project {
    /// Build a new record ready to insert (`id`/`created_at` are
    /// database-assigned).
    pub fn new(
        name: impl Into<String>,
        project_id: i64,
        local_path: impl Into<String>,
        web_url: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            name: name.into(),
            project_id,
            local_path: local_path.into(),
            web_url: web_url.into(),
            created_at: 0,
        }
    }
}

impl Entity for Project {
    const TABLE: &'static str = "projects";
    const KIND: &'static str = "project";
    const COLUMNS: &'static [&'static str] = &["name", "project_id", "local_path", "web_url"];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.name.as_str().into(),
            self.project_id.into(),
            self.local_path.as_str().into(),
            self.web_url.as_str().into(),
        ]
    }

    fn probe_filter(&self) -> Vec<(&'static str, SqlValue)> {
        let mut filter = Vec::new();
        if !self.name.is_empty() {
            filter.push(("name", self.name.as_str().into()));
        }
        if self.project_id != 0 {
            filter.push(("project_id", self.project_id.into()));
        }
        if !self.local_path.is_empty() {
            filter.push(("local_path", self.local_path.as_str().into()));
        }
        if !self.web_url.is_empty() {
            filter.push(("web_url", self.web_url.as_str().into()));
        }
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_filter_skips_unpopulated_fields() {
        let project = Project::new("demo", 1000, "", "");
        let filter = project.probe_filter();
        let columns: Vec<&str> = filter.iter().map(|(c, _)| *c).collect();
        assert_eq!(columns, vec!["name", "project_id"]);
    }

    #[test]
    fn test_values_align_with_columns() {
        let project = Project::new("demo", 1000, "/src/demo", "https://gitlab.example.com/demo");
        assert_eq!(project.values().len(), Project::COLUMNS.len());
    }
}
