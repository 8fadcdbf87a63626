//! Text format for stored issues.
//!
//! A block is the bare issue key on its own line followed by one
//! `label : value` line per schema field, labels left-aligned to the widest
//! label. In a snapshot file every field line is indented, so any unindented
//! line starts a new block:
//!
//! ```text
//! PROJ-12
//!     Title          : Fix login bug
//!     Assignee       : jdoe
//! PROJ-9
//!     Title          : Flaky test
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::{CueError, Result};
use crate::model::CoreData;
use crate::schema::FieldSchema;
use crate::util::text::collapse_whitespace;

/// Prefix of every field line inside a snapshot file.
pub const BLOCK_INDENT: &str = "    ";

/// Render one record. Fields missing from `core` are written with an empty
/// value so they parse back as `""`.
pub fn format_core_data(core: &CoreData, schema: &FieldSchema, indent: &str) -> String {
    let width = schema.label_width();
    let mut out = core.key.clone();
    for entry in schema.entries() {
        let value = collapse_whitespace(core.get(entry.key).unwrap_or_default());
        out.push('\n');
        out.push_str(&format!("{indent}{:<width$} : {value}", entry.label));
    }
    out
}

/// Render a whole snapshot, newest issue first.
///
/// A key that could not start a block on its own line (blank, indented or
/// multi-line) is refused instead of merging into its neighbour.
pub fn serialize_batch<'a, I>(records: I, schema: &FieldSchema) -> Result<String>
where
    I: IntoIterator<Item = &'a CoreData>,
{
    let mut records: Vec<&CoreData> = records.into_iter().collect();
    for core in &records {
        check_block_key(&core.key)?;
    }
    records.sort_by(|a, b| issue_order(&a.key, &b.key));

    let mut out = String::new();
    for core in records {
        out.push_str(&format_core_data(core, schema, BLOCK_INDENT));
        out.push('\n');
    }
    Ok(out)
}

/// A stored key must be one non-blank, unindented line.
pub fn check_block_key(key: &str) -> Result<()> {
    if key.is_empty() || key.trim() != key || key.contains(['\n', '\r']) {
        return Err(CueError::malformed(format!("issue key {key:?} cannot start a block")));
    }
    Ok(())
}

/// Descending by project prefix, then by numeric suffix, so `PROJ-100`
/// precedes `PROJ-99`. Keys without a numeric suffix sort by text.
pub fn issue_order(a: &str, b: &str) -> Ordering {
    sort_key(b).cmp(&sort_key(a))
}

fn sort_key(key: &str) -> (&str, Option<u64>, &str) {
    match key.rsplit_once('-') {
        Some((prefix, number)) => match number.parse::<u64>() {
            Ok(n) => (prefix, Some(n), key),
            Err(_) => (key, None, key),
        },
        None => (key, None, key),
    }
}

/// Parse a single block back into core data.
///
/// The first line is always the key. A schema field that happens to be named
/// `key` is ignored so a field line can never rename the record.
pub fn parse_block(text: &str, schema: &FieldSchema) -> Result<CoreData> {
    let mut lines = text.lines().map(str::trim);
    let key = lines.next().unwrap_or_default();
    if key.is_empty() {
        return Err(CueError::malformed("block has no issue key line"));
    }

    let mut core = CoreData::new(key);
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (label, value) = line.split_once(':').ok_or_else(|| {
            CueError::malformed(format!("{key}: field line without ':': {line}"))
        })?;
        let label = label.trim();
        let field = schema
            .key_for_label(label)
            .ok_or_else(|| CueError::SchemaViolation {
                key: key.to_string(),
                label: label.to_string(),
            })?;
        if field == "key" {
            continue;
        }
        core.set(field, value.trim());
    }
    Ok(core)
}

/// Parse a snapshot file. Blank input yields no records; on duplicate keys
/// the later block wins.
pub fn parse_batch(text: &str, schema: &FieldSchema) -> Result<HashMap<String, CoreData>> {
    let mut records = HashMap::new();
    for block in split_blocks(text)? {
        let core = parse_block(block, schema)?;
        records.insert(core.key.clone(), core);
    }
    Ok(records)
}

fn split_blocks(text: &str) -> Result<Vec<&str>> {
    let mut starts = Vec::new();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        match line.chars().next() {
            Some(c) if !c.is_whitespace() => starts.push(offset),
            _ if starts.is_empty() && !line.trim().is_empty() => {
                return Err(CueError::malformed(
                    "indented field line before the first issue key",
                ));
            }
            _ => {}
        }
        offset += line.len();
    }

    Ok(starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            &text[start..end]
        })
        .collect())
}
