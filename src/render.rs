use std::sync::LazyLock;

use crossterm::style::{style, Color, Stylize};
use regex::{Captures, Regex};

use crate::codec::{format_core_data, issue_order, BLOCK_INDENT};
use crate::model::CoreData;
use crate::schema::FieldSchema;
use crate::store::cache::AllIssuesCache;
use crate::util::text::fit;

static ISSUE_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][A-Z0-9_]+-\d+\b").expect("valid issue key regex"));

const HEAD_KEY_WIDTH: usize = 7;
const LINE_WIDTH: usize = 125;
const HEAD_SEPARATOR: &str = " - ";
const BODY_SEPARATOR: &str = " | ";

/// Compact body columns: field, width, placeholder when empty, color.
const COMPACT_BODY: &[(&str, usize, &str, Color)] = &[
    ("assignee", 16, "unassigned", Color::DarkGreen),
    ("type", 8, "", Color::Blue),
    ("status", 21, "", Color::Red),
    ("resolution", 10, "unresolved", Color::DarkGrey),
    ("last_sprint", 7, "backlog", Color::DarkCyan),
    ("target_version", 9, "no target", Color::DarkMagenta),
    ("time_spent_str", 7, "0", Color::Yellow),
    ("original_estimate_str", 7, "0", Color::Magenta),
    ("git_branches", 77, "", Color::DarkCyan),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    Oneline,
    #[default]
    Compact,
    Long,
}

/// Turns core data into terminal text. Issue keys in parent and epic are
/// expanded to `KEY - title` from the all-issues cache.
pub struct Renderer<'a> {
    cache: &'a AllIssuesCache,
    schema: &'a FieldSchema,
    colors: bool,
}

impl<'a> Renderer<'a> {
    pub fn new(cache: &'a AllIssuesCache, schema: &'a FieldSchema, colors: bool) -> Self {
        Self {
            cache,
            schema,
            colors,
        }
    }

    /// Newest issue first.
    pub fn render(&self, records: &[CoreData], format: Format) -> String {
        let mut sorted: Vec<&CoreData> = records.iter().collect();
        sorted.sort_by(|a, b| issue_order(&a.key, &b.key));

        let blocks: Vec<String> = sorted
            .into_iter()
            .map(|core| match format {
                Format::Oneline => self.oneline(core),
                Format::Compact => self.compact(core),
                Format::Long => self.long(core),
            })
            .collect();

        let separator = match format {
            Format::Oneline => "\n".to_string(),
            Format::Compact => format!("\n{}\n", "-".repeat(LINE_WIDTH)),
            Format::Long => "\n\n".to_string(),
        };
        blocks.join(&separator)
    }

    fn oneline(&self, core: &CoreData) -> String {
        format!(
            "{}{HEAD_SEPARATOR}{}",
            self.paint(&fit(&core.key, HEAD_KEY_WIDTH), Color::Yellow),
            self.paint(core.title(), Color::White)
        )
    }

    fn compact(&self, core: &CoreData) -> String {
        let mut lines = vec![self.oneline(core)];
        for field in ["parent", "epic"] {
            let value = core.get(field).unwrap_or_default();
            if !value.is_empty() {
                let text = fit(&self.expand_links(value), LINE_WIDTH);
                lines.push(self.paint(text.trim_end(), Color::Cyan));
            }
        }

        let body: Vec<String> = COMPACT_BODY
            .iter()
            .map(|&(field, width, placeholder, color)| {
                let value = match field {
                    "last_sprint" => last_sprint(core),
                    _ => core.get(field).unwrap_or_default(),
                };
                let value = if value.is_empty() { placeholder } else { value };
                self.paint(&fit(value, width), color)
            })
            .collect();
        lines.push(body.join(BODY_SEPARATOR).trim_end().to_string());
        lines.join("\n")
    }

    fn long(&self, core: &CoreData) -> String {
        let mut expanded = core.clone();
        for field in ["parent", "epic"] {
            if let Some(value) = core.get(field) {
                expanded.set(field, self.expand_links(value));
            }
        }
        let text = format_core_data(&expanded, self.schema, BLOCK_INDENT);
        match text.split_once('\n') {
            Some((key, rest)) => format!("{}\n{rest}", self.paint(key, Color::Yellow)),
            None => self.paint(&text, Color::Yellow),
        }
    }

    /// `PROJ-45` becomes `PROJ-45 - Fix login bug` when the cache knows it.
    pub fn expand_links(&self, text: &str) -> String {
        ISSUE_KEY
            .replace_all(text, |caps: &Captures| {
                let key = &caps[0];
                match self.cache.title_of(key) {
                    Some(title) if !title.is_empty() => format!("{key}{HEAD_SEPARATOR}{title}"),
                    _ => key.to_string(),
                }
            })
            .into_owned()
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.colors {
            style(text).with(color).to_string()
        } else {
            text.to_string()
        }
    }
}

fn last_sprint(core: &CoreData) -> &str {
    core.get("sprints_str")
        .and_then(|s| s.rsplit(", ").next())
        .unwrap_or_default()
}
