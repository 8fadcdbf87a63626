use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

use super::{read_or_empty, write_atomic};
use crate::codec::{check_block_key, parse_batch, serialize_batch};
use crate::error::Result;
use crate::model::CoreData;
use crate::schema::FieldSchema;

/// Union of every issue seen by any query or lookup, keyed by issue key.
///
/// Loaded once when a command starts and handed to whatever needs title
/// lookups or merges; every merge rewrites the whole file.
pub struct AllIssuesCache {
    path: PathBuf,
    schema: FieldSchema,
    issues: HashMap<String, CoreData>,
}

impl AllIssuesCache {
    pub fn open(path: impl Into<PathBuf>, schema: FieldSchema) -> Result<Self> {
        let path = path.into();
        let issues = parse_batch(&read_or_empty(&path)?, &schema)?;
        debug!(path = %path.display(), count = issues.len(), "Loaded all-issues cache");
        Ok(Self {
            path,
            schema,
            issues,
        })
    }

    pub fn get(&self, key: &str) -> Option<&CoreData> {
        self.issues.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.issues.contains_key(key)
    }

    /// Title for link expansion, e.g. `PROJ-45` to `Fix login bug`.
    pub fn title_of(&self, key: &str) -> Option<&str> {
        self.issues.get(key).map(CoreData::title)
    }

    /// Overlay `records` (newer wins) and rewrite the cache file.
    pub fn merge_and_persist<I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = CoreData>,
    {
        let records: Vec<CoreData> = records.into_iter().collect();
        for core in &records {
            check_block_key(&core.key)?;
        }
        let merged = records.len();
        for core in records {
            self.issues.insert(core.key.clone(), core);
        }
        write_atomic(&self.path, &serialize_batch(self.issues.values(), &self.schema)?)?;
        debug!(merged, total = self.issues.len(), "Persisted all-issues cache");
        Ok(())
    }
}
