pub mod jira;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use tracing::warn;

use crate::config::AppConfig;
use crate::error::{CueError, Result};
use crate::model::Issue;

/// Issues returned by a multi-key lookup, plus the keys the source did not
/// know.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub issues: Vec<Issue>,
    pub missing: Vec<String>,
}

/// Where fresh issues come from.
#[async_trait]
pub trait IssueSource: Send + Sync {
    fn name(&self) -> &str;

    /// Every issue matching a query expression.
    async fn search(&self, jql: &str) -> Result<Vec<Issue>>;

    /// One issue by key. Unknown keys are [`CueError::NotFound`].
    async fn fetch(&self, key: &str) -> Result<Issue>;

    /// Fetch several keys. A missing key is recorded and skipped; any other
    /// failure aborts the batch.
    async fn fetch_many(&self, keys: &[String]) -> Result<FetchReport> {
        let mut report = FetchReport::default();
        for key in keys {
            match self.fetch(key).await {
                Ok(issue) => report.issues.push(issue),
                Err(CueError::NotFound { key }) => {
                    warn!(%key, source = self.name(), "Issue not found");
                    report.missing.push(key);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }
}


pub fn create_source(config: &AppConfig) -> AnyResult<Box<dyn IssueSource>> {
    let source = jira::JiraSource::new(
        &config.jira_instance_url,
        config.authorization()?,
        std::time::Duration::from_secs(config.request_timeout_seconds),
        config.custom_fields.clone(),
    )?;
    Ok(Box::new(source))
}
