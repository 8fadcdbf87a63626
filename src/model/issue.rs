use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use super::core_data::CoreData;
use crate::schema::FieldSchema;
use crate::util::text::collapse_whitespace;

/// An issue as delivered by the data source, with typed values.
///
/// Display text for dates, durations and lists is produced only when the
/// record is projected to [`CoreData`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Issue {
    pub key: String,
    pub title: String,
    pub issue_type: String,
    pub assignee: String,
    pub status: String,
    pub resolution: String,
    pub parent: String,
    pub epic: String,
    pub story_points: Option<f64>,
    pub sprints: Vec<String>,
    pub target_version: String,
    pub git_branches: String,
    pub creator: String,
    pub created: Option<DateTime<Utc>>,
    pub labels: Vec<String>,
    /// Seconds logged against the issue.
    pub time_spent: Option<u64>,
    /// Seconds originally estimated.
    pub original_estimate: Option<u64>,
    pub description: String,
    /// Source fields with no typed slot above.
    pub extra: BTreeMap<String, String>,
}

impl Issue {
    #[cfg(test)]
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    /// Text value of a field by its schema key. Unknown keys fall back to
    /// `extra`.
    pub fn field_text(&self, field: &str) -> Option<String> {
        let text = match field {
            "key" => self.key.clone(),
            "title" => self.title.clone(),
            "type" => self.issue_type.clone(),
            "assignee" => self.assignee.clone(),
            "status" => self.status.clone(),
            "resolution" => self.resolution.clone(),
            "parent" => self.parent.clone(),
            "epic" => self.epic.clone(),
            "story_points" => self.story_points.map(format_points).unwrap_or_default(),
            "sprints_str" => self.sprints.join(", "),
            "last_sprint" => self.sprints.last().cloned().unwrap_or_default(),
            "target_version" => self.target_version.clone(),
            "git_branches" => self.git_branches.clone(),
            "creator" => self.creator.clone(),
            "created_str" => self
                .created
                .map(|c| c.format("%d-%b-%Y").to_string())
                .unwrap_or_default(),
            "labels_str" => self.labels.join(", "),
            "time_spent_str" => self.time_spent.map(format_duration).unwrap_or_default(),
            "original_estimate_str" => self
                .original_estimate
                .map(format_duration)
                .unwrap_or_default(),
            "description" => self.description.clone(),
            other => return self.extra.get(other).cloned(),
        };
        Some(text)
    }

    /// Project onto the schema's fields plus `key`, whitespace-collapsed.
    pub fn core_data(&self, schema: &FieldSchema) -> CoreData {
        let mut core = CoreData::new(collapse_whitespace(&self.key));
        for field in schema.keys() {
            let value = self.field_text(field).unwrap_or_default();
            core.set(field, collapse_whitespace(&value));
        }
        core
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.key, self.title)
    }
}

fn format_points(points: f64) -> String {
    if points.fract() == 0.0 {
        format!("{}", points as i64)
    } else {
        points.to_string()
    }
}

/// `H:MM`, e.g. 13500 seconds is `3:45`.
pub fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 3600, (seconds % 3600) / 60)
}
