use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::codec::issue_order;
use crate::config::{AppConfig, Queries, QueryDef};
use crate::detector::detect_changes;
use crate::model::CoreData;
use crate::providers::IssueSource;
use crate::render::{Format, Renderer};
use crate::schema::FieldSchema;
use crate::store::cache::AllIssuesCache;
use crate::store::queue::{queue_entry, QueueStore, TriageOutcome};
use crate::store::snapshot::SnapshotStore;

/// Everything one command invocation reads and writes. The all-issues cache
/// is parsed on first use, so queue commands work even when it is damaged.
pub struct Session {
    pub schema: FieldSchema,
    pub snapshots: SnapshotStore,
    pub queue: QueueStore,
    pub default_project: Option<String>,
    pub colors: bool,
    cache: Option<AllIssuesCache>,
    cache_file: PathBuf,
    queries_file: PathBuf,
}

impl Session {
    pub fn open(config: &AppConfig, colors: bool) -> Result<Self> {
        let schema = FieldSchema::issue();
        Ok(Self {
            snapshots: SnapshotStore::new(&config.result_files_dir, schema.clone()),
            queue: QueueStore::new(config.queue_file()),
            schema,
            default_project: config.default_project.clone(),
            colors,
            cache: None,
            cache_file: config.all_issues_file.clone(),
            queries_file: config.queries_definition_file.clone(),
        })
    }

    /// Query definitions. A title whose snapshot would land on the queue or
    /// the all-issues file is rejected.
    pub fn queries(&self) -> Result<Queries> {
        let queries = Queries::load(&self.queries_file)?;
        for def in queries.iter() {
            let snapshot = self.snapshots.path_for(&def.title);
            if snapshot == self.queue.path() || snapshot == self.cache_file {
                bail!(
                    "Query title '{}' would overwrite {}",
                    def.title,
                    snapshot.display()
                );
            }
        }
        Ok(queries)
    }

    pub fn cache(&mut self) -> Result<&mut AllIssuesCache> {
        loaded_cache(&mut self.cache, &self.cache_file, &self.schema)
    }

    fn render(&mut self, records: &[CoreData], format: Format) -> Result<String> {
        let cache = loaded_cache(&mut self.cache, &self.cache_file, &self.schema)?;
        Ok(Renderer::new(cache, &self.schema, self.colors).render(records, format))
    }
}

fn loaded_cache<'a>(
    slot: &'a mut Option<AllIssuesCache>,
    path: &Path,
    schema: &FieldSchema,
) -> Result<&'a mut AllIssuesCache> {
    let cache = match slot.take() {
        Some(cache) => cache,
        None => AllIssuesCache::open(path, schema.clone())
            .with_context(|| format!("Failed to load {}", path.display()))?,
    };
    Ok(slot.insert(cache))
}

pub struct ExecOptions {
    pub names: Vec<String>,
    pub all: bool,
    pub refresh: bool,
    pub extra: Option<String>,
    pub format: Format,
}

/// `cue exec`: run saved queries, queue what changed, show the results.
pub async fn exec(
    session: &mut Session,
    source: &dyn IssueSource,
    opts: &ExecOptions,
    out: &mut dyn Write,
) -> Result<()> {
    let queries = session.queries()?;
    if opts.names.is_empty() && !opts.all {
        bail!("Query name expected - available: {}", queries.names().join(", "));
    }

    let mut selected: Vec<&QueryDef> = Vec::new();
    if opts.all {
        selected.extend(queries.active());
    }
    for name in &opts.names {
        let def = queries.find(name)?;
        if !selected.iter().any(|d| d.name == def.name) {
            selected.push(def);
        }
    }

    let mut failures = 0;
    for def in &selected {
        match run_query(session, source, def, opts).await {
            Ok(records) if records.is_empty() => writeln!(out, "{}: no issues found", def.title)?,
            Ok(records) => writeln!(out, "{}", session.render(&records, opts.format)?)?,
            Err(e) => {
                warn!(query = %def.title, error = %e, "Query failed");
                writeln!(out, "{}: {e:#}", def.title)?;
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} queries failed", selected.len());
    }
    Ok(())
}

/// Serve a query from its snapshot, or fetch it when the snapshot is empty or
/// a refresh is asked for. A failed fetch writes nothing.
async fn run_query(
    session: &mut Session,
    source: &dyn IssueSource,
    def: &QueryDef,
    opts: &ExecOptions,
) -> Result<Vec<CoreData>> {
    let stored = session.snapshots.load(&def.title)?;
    let records = if stored.is_empty() || opts.refresh {
        let jql = with_extra(&def.jql, opts.extra.as_deref());
        let fresh = source.search(&jql).await?;

        let mut changed: Vec<CoreData> = detect_changes(&fresh, &stored, &session.schema)
            .into_values()
            .map(|issue| issue.core_data(&session.schema))
            .collect();
        changed.sort_by(|a, b| issue_order(&a.key, &b.key));
        let entries: Vec<String> = changed.iter().map(|c| queue_entry(&def.title, c)).collect();
        session.queue.append(&entries)?;

        let records: Vec<CoreData> = fresh.iter().map(|i| i.core_data(&session.schema)).collect();
        session.snapshots.save(&def.title, &records)?;
        info!(query = %def.title, fetched = records.len(), queued = entries.len(), "Query refreshed");
        records
    } else {
        stored.into_values().collect()
    };

    if !records.is_empty() {
        session.cache()?.merge_and_persist(records.iter().cloned())?;
    }
    Ok(records)
}

/// `cue exec-query`: ad-hoc query, cached but not queued.
pub async fn exec_query(
    session: &mut Session,
    source: &dyn IssueSource,
    jql: &str,
    format: Format,
    out: &mut dyn Write,
) -> Result<()> {
    let records: Vec<CoreData> = source
        .search(jql)
        .await?
        .iter()
        .map(|i| i.core_data(&session.schema))
        .collect();
    show_records(session, records, format, out)
}

/// `cue search`: full-text search, optionally within one project.
pub async fn search(
    session: &mut Session,
    source: &dyn IssueSource,
    keywords: &[String],
    project: Option<&str>,
    format: Format,
    out: &mut dyn Write,
) -> Result<()> {
    exec_query(session, source, &text_search_jql(keywords, project)?, format, out).await
}

/// `cue show`: issues by reference, from the cache where possible.
pub async fn show(
    session: &mut Session,
    source: &dyn IssueSource,
    refs: &[String],
    refresh: bool,
    format: Format,
    out: &mut dyn Write,
) -> Result<()> {
    let mut keys: Vec<String> = Vec::with_capacity(refs.len());
    for r in refs {
        let key = to_issue_key(r, session.default_project.as_deref())?;
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    let (mut records, to_fetch): (Vec<CoreData>, Vec<String>) = if refresh {
        (Vec::new(), keys)
    } else {
        let cache = session.cache()?;
        let (cached, missing): (Vec<String>, Vec<String>) =
            keys.into_iter().partition(|k| cache.contains(k));
        let records = cached.iter().filter_map(|k| cache.get(k).cloned()).collect();
        (records, missing)
    };

    if !to_fetch.is_empty() {
        let report = source.fetch_many(&to_fetch).await?;
        for key in &report.missing {
            writeln!(out, "{key}: issue not found")?;
        }
        records.extend(report.issues.iter().map(|i| i.core_data(&session.schema)));
    }
    show_records(session, records, format, out)
}

fn show_records(
    session: &mut Session,
    records: Vec<CoreData>,
    format: Format,
    out: &mut dyn Write,
) -> Result<()> {
    if records.is_empty() {
        writeln!(out, "no issues found")?;
        return Ok(());
    }
    session.cache()?.merge_and_persist(records.iter().cloned())?;
    writeln!(out, "{}", session.render(&records, format)?)?;
    Ok(())
}

/// `cue list`
pub fn list(session: &Session, out: &mut dyn Write) -> Result<()> {
    let lines = session.queue.load()?;
    if lines.is_empty() {
        writeln!(out, "Queue is empty")?;
    } else {
        writeln!(out, "{}", lines.join("\n"))?;
    }
    Ok(())
}

/// `cue queue`: step through the queue on stdin/stdout.
pub fn triage(session: &Session) -> Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let outcome = session.queue.triage(stdin.lock(), &mut stdout)?;
    match outcome {
        TriageOutcome::Empty => println!("Queue is empty"),
        TriageOutcome::Aborted => println!("Triage interrupted, queue unchanged"),
        TriageOutcome::Committed { kept, done } => {
            println!("{done} done, {kept} left in queue")
        }
    }
    Ok(())
}

/// `cue alert`: play the alert sound when the queue has entries.
pub async fn alert(session: &Session, sound: &Path, out: &mut dyn Write) -> Result<()> {
    if session.queue.load()?.is_empty() {
        writeln!(out, "Queue is empty")?;
        return Ok(());
    }
    let player = if cfg!(target_os = "linux") { "aplay" } else { "afplay" };
    let output = tokio::process::Command::new(player)
        .arg(sound)
        .output()
        .await
        .with_context(|| format!("Failed to run {player}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{player} failed: {}", stderr.trim());
    }
    Ok(())
}

/// AND an extra clause into a query, keeping any `ORDER BY` at the end.
pub fn with_extra(jql: &str, extra: Option<&str>) -> String {
    let Some(extra) = extra.map(str::trim).filter(|e| !e.is_empty()) else {
        return jql.to_string();
    };
    let lower = jql.to_ascii_lowercase();
    match lower.find(" order by ") {
        Some(pos) => format!("({}) AND ({extra}){}", jql[..pos].trim(), &jql[pos..]),
        None => format!("({}) AND ({extra})", jql.trim()),
    }
}

pub fn text_search_jql(keywords: &[String], project: Option<&str>) -> Result<String> {
    let keywords = keywords.join(" ");
    let keywords = keywords.trim();
    if keywords.is_empty() {
        bail!("Keywords are expected");
    }
    let mut jql = format!("text ~ \"{}\"", keywords.replace('"', "\\\""));
    if let Some(project) = project {
        jql.push_str(&format!(" and project={}", project.trim().to_uppercase()));
    }
    Ok(jql)
}

/// Normalize a user reference: `proj-12` is `PROJ-12`, a bare `12` takes the
/// default project.
pub fn to_issue_key(reference: &str, default_project: Option<&str>) -> Result<String> {
    let reference = reference.trim();
    if !reference.is_empty() && reference.chars().all(|c| c.is_ascii_digit()) {
        return match default_project {
            Some(project) => Ok(format!("{}-{reference}", project.to_uppercase())),
            None => bail!("Issue reference '{reference}' needs a project (set default_project)"),
        };
    }
    let key = reference.to_uppercase();
    match key.rsplit_once('-') {
        Some((project, number))
            if !project.is_empty() && !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) =>
        {
            Ok(key)
        }
        _ => bail!("Invalid issue reference '{reference}'"),
    }
}
