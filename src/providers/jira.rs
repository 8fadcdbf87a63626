use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::IssueSource;
use crate::config::CustomFields;
use crate::error::{CueError, Result};
use crate::model::Issue;
use crate::util::adf::description_text;

const PAGE_SIZE: usize = 100;

/// Legacy sprint values are `toString()` dumps like `...[id=1,name=Sprint 5,...]`.
static SPRINT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"name=([^,\]]+)").expect("valid sprint regex"));

pub struct JiraSource {
    base_url: String,
    auth_header: String,
    client: reqwest::Client,
    custom: CustomFields,
}

impl JiraSource {
    pub fn new(
        instance_url: &str,
        auth_header: String,
        timeout: Duration,
        custom: CustomFields,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: instance_url.trim_end_matches('/').to_string(),
            auth_header,
            client,
            custom,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, key: Option<&str>) -> Result<T> {
        debug!(%url, "GET");
        let resp = self
            .client
            .get(url)
            .header("Authorization", &self.auth_header)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| CueError::unavailable(format!("Jira API request failed: {e}")))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            if let Some(key) = key {
                return Err(CueError::NotFound {
                    key: key.to_string(),
                });
            }
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let body: String = body.chars().take(200).collect();
            return Err(CueError::unavailable(format!("Jira answered {status}: {body}")));
        }

        resp.json()
            .await
            .map_err(|e| CueError::unavailable(format!("Failed to parse Jira response: {e}")))
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    issues: Vec<RawIssue>,
}

#[derive(Deserialize)]
struct RawIssue {
    #[serde(default)]
    key: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[async_trait]
impl IssueSource for JiraSource {
    fn name(&self) -> &str {
        "Jira"
    }

    async fn search(&self, jql: &str) -> Result<Vec<Issue>> {
        let mut issues = Vec::new();
        let mut start_at = 0;
        loop {
            let url = format!(
                "{}/rest/api/2/search?jql={}&startAt={start_at}&maxResults={PAGE_SIZE}",
                self.base_url,
                urlencoding::encode(jql)
            );
            let page: SearchResponse = self.get_json(&url, None).await?;
            let received = page.issues.len();
            issues.extend(
                page.issues
                    .into_iter()
                    .filter_map(|raw| to_issue(raw, &self.custom)),
            );
            start_at += received;
            if received == 0 || start_at >= page.total {
                break;
            }
        }
        info!(count = issues.len(), "Search returned issues");
        Ok(issues)
    }

    async fn fetch(&self, key: &str) -> Result<Issue> {
        let url = format!(
            "{}/rest/api/2/issue/{}",
            self.base_url,
            urlencoding::encode(key)
        );
        let raw: RawIssue = self.get_json(&url, Some(key)).await?;
        to_issue(raw, &self.custom)
            .ok_or_else(|| CueError::malformed(format!("Jira returned {key} without a key")))
    }
}

/// `None` for an issue without a usable key; it could not be stored.
fn to_issue(raw: RawIssue, custom: &CustomFields) -> Option<Issue> {
    let key = raw.key.trim();
    if key.is_empty() {
        warn!("Skipping issue without a key");
        return None;
    }
    let f = &raw.fields;
    let mut extra = std::collections::BTreeMap::new();
    for name in ["priority", "reporter", "project"] {
        let value = text_of(f.get(name));
        if !value.is_empty() {
            extra.insert(name.to_string(), value);
        }
    }

    Some(Issue {
        key: key.to_string(),
        title: text_of(f.get("summary")),
        issue_type: text_of(f.get("issuetype")),
        assignee: text_of(f.get("assignee")),
        status: text_of(f.get("status")),
        resolution: text_of(f.get("resolution")),
        parent: f
            .get("parent")
            .and_then(|p| p.get("key"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        epic: text_of(f.get(&custom.epic)),
        story_points: f.get(&custom.story_points).and_then(Value::as_f64),
        sprints: sprint_names(f.get(&custom.sprints)),
        target_version: text_of(f.get(&custom.target_version)),
        git_branches: text_of(f.get(&custom.git_branches)),
        creator: text_of(f.get("creator")),
        created: f.get("created").and_then(Value::as_str).and_then(parse_timestamp),
        labels: f
            .get("labels")
            .and_then(Value::as_array)
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|l| l.trim().to_string())
                    .collect()
            })
            .unwrap_or_default(),
        time_spent: f.get("timespent").and_then(Value::as_u64),
        original_estimate: f.get("timeoriginalestimate").and_then(Value::as_u64),
        description: f.get("description").map(description_text).unwrap_or_default(),
        extra,
    })
}

/// Display text of a field: strings as-is, objects by name, arrays joined.
fn text_of(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Object(obj)) => ["name", "displayName", "value", "key"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .unwrap_or_default()
            .trim()
            .to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| text_of(Some(v)))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

fn sprint_names(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(obj) => obj.get("name").and_then(Value::as_str).map(String::from),
            Value::String(s) => SPRINT_NAME
                .captures(s)
                .map(|c| c[1].trim().to_string()),
            _ => None,
        })
        .collect()
}

/// Jira timestamps look like `2024-03-07T10:00:00.000+0000`.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
