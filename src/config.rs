use anyhow::{bail, Context, Result};
use base64::Engine;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub jira_instance_url: String,
    pub jira_key_file: PathBuf,
    pub queries_definition_file: PathBuf,
    pub result_files_dir: PathBuf,
    pub alert_sound_file: PathBuf,
    pub all_issues_file: PathBuf,
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
    /// Prefix for bare numeric issue references, e.g. `PROJ`.
    pub default_project: Option<String>,
    #[serde(default)]
    pub custom_fields: CustomFields,
}

/// Source field ids for values the tracker keeps in custom fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CustomFields {
    pub target_version: String,
    pub git_branches: String,
    pub epic: String,
    pub story_points: String,
    pub sprints: String,
}

impl Default for CustomFields {
    fn default() -> Self {
        Self {
            target_version: "customfield_13621".into(),
            git_branches: "customfield_11207".into(),
            epic: "customfield_10008".into(),
            story_points: "customfield_10002".into(),
            sprints: "customfield_10004".into(),
        }
    }
}

fn default_timeout() -> u64 {
    120
}

impl AppConfig {
    /// Value for the `Authorization` header. The key file holds either an
    /// already encoded credential or a plain `user:token` pair.
    pub fn authorization(&self) -> Result<String> {
        let raw = std::fs::read_to_string(&self.jira_key_file)
            .with_context(|| format!("Failed to read key file {}", self.jira_key_file.display()))?;
        let raw = raw.trim();
        if raw.is_empty() {
            bail!("Key file {} is empty", self.jira_key_file.display());
        }
        let encoded = if raw.contains(':') {
            base64::engine::general_purpose::STANDARD.encode(raw)
        } else {
            raw.to_string()
        };
        Ok(format!("Basic {encoded}"))
    }

    pub fn queue_file(&self) -> PathBuf {
        self.result_files_dir.join(crate::store::queue::QUEUE_FILE_NAME)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.jira_key_file,
            &mut self.queries_definition_file,
            &mut self.result_files_dir,
            &mut self.alert_sound_file,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        if self.all_issues_file.is_relative() {
            self.all_issues_file = self.result_files_dir.join(&self.all_issues_file);
        }
    }
}

/// Explicit path, then `./config.toml`, then the user config directory.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return local;
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cue")
        .join(CONFIG_FILE_NAME)
}

pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let path = config_path(explicit);
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let mut config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let base = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    config.resolve_paths(base);

    std::fs::create_dir_all(&config.result_files_dir).with_context(|| {
        format!(
            "Failed to create results directory {}",
            config.result_files_dir.display()
        )
    })?;
    Ok(config)
}

#[derive(Debug, Deserialize)]
struct QueryEntry {
    name: String,
    jql: String,
    #[serde(default)]
    passive: bool,
}

/// A named query. `title` doubles as the snapshot file stem and the queue
/// line prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDef {
    pub title: String,
    pub name: String,
    pub jql: String,
    pub passive: bool,
}

#[derive(Debug, Default)]
pub struct Queries {
    defs: Vec<QueryDef>,
}

impl Queries {
    /// Parse the YAML definitions, keeping file order.
    pub fn parse(text: &str) -> Result<Self> {
        let mapping: serde_yaml::Mapping =
            serde_yaml::from_str(text).context("Failed to parse query definitions")?;
        let mut defs: Vec<QueryDef> = Vec::with_capacity(mapping.len());
        for (title, entry) in mapping {
            let title = title
                .as_str()
                .map(String::from)
                .context("Query titles must be strings")?;
            if title.contains(['/', '\\']) || title.trim().is_empty() {
                bail!("Query title '{title}' cannot be used as a file name");
            }
            let entry: QueryEntry = serde_yaml::from_value(entry)
                .with_context(|| format!("Invalid definition for query '{title}'"))?;
            if defs.iter().any(|d| d.name == entry.name) {
                bail!("Duplicate query name '{}'", entry.name);
            }
            defs.push(QueryDef {
                title,
                name: entry.name,
                jql: entry.jql,
                passive: entry.passive,
            });
        }
        Ok(Self { defs })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read query definitions from {}", path.display()))?;
        Self::parse(&text)
    }

    pub fn find(&self, name: &str) -> Result<&QueryDef> {
        match self.defs.iter().find(|d| d.name == name) {
            Some(def) => Ok(def),
            None => bail!(
                "Unknown query name '{name}' - available: {}",
                self.names().join(", ")
            ),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryDef> {
        self.defs.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.defs.iter().map(|d| d.name.as_str()).collect()
    }

    /// Queries that `--all` runs.
    pub fn active(&self) -> impl Iterator<Item = &QueryDef> {
        self.defs.iter().filter(|d| !d.passive)
    }
}
