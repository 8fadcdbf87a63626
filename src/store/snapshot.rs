use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

use super::{read_or_empty, write_atomic};
use crate::codec::{parse_batch, serialize_batch};
use crate::error::Result;
use crate::model::CoreData;
use crate::schema::FieldSchema;

/// Per-query snapshot files, `<query_title>.txt` in the results directory.
pub struct SnapshotStore {
    dir: PathBuf,
    schema: FieldSchema,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>, schema: FieldSchema) -> Self {
        Self {
            dir: dir.into(),
            schema,
        }
    }

    pub fn path_for(&self, query_title: &str) -> PathBuf {
        self.dir.join(format!("{query_title}.txt"))
    }

    /// Core data of the last fetch for a query; empty if it never ran.
    pub fn load(&self, query_title: &str) -> Result<HashMap<String, CoreData>> {
        let path = self.path_for(query_title);
        let text = read_or_empty(&path)?;
        let records = parse_batch(&text, &self.schema)?;
        debug!(path = %path.display(), count = records.len(), "Loaded snapshot");
        Ok(records)
    }

    /// Overwrite the query's snapshot with `records`.
    pub fn save<'a, I>(&self, query_title: &str, records: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a CoreData>,
    {
        let path = self.path_for(query_title);
        write_atomic(&path, &serialize_batch(records, &self.schema)?)?;
        debug!(path = %path.display(), "Wrote snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CueError;
    use crate::model::Issue;

    #[test]
    fn missing_snapshot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), FieldSchema::issue());
        assert!(store.load("My bugs").unwrap().is_empty());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let schema = FieldSchema::issue();
        let store = SnapshotStore::new(dir.path(), schema.clone());
        let records: Vec<CoreData> = ["PROJ-1", "PROJ-2"]
            .iter()
            .map(|k| Issue::new(*k, "Title").core_data(&schema))
            .collect();

        store.save("My bugs", &records).unwrap();
        assert!(dir.path().join("My bugs.txt").is_file());

        let loaded = store.load("My bugs").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded["PROJ-2"], records[1]);
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let schema = FieldSchema::issue();
        let store = SnapshotStore::new(dir.path(), schema.clone());

        let old = Issue::new("PROJ-1", "Old").core_data(&schema);
        let new = Issue::new("PROJ-2", "New").core_data(&schema);
        store.save("q", [&old]).unwrap();
        store.save("q", [&new]).unwrap();

        let loaded = store.load("q").unwrap();
        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["PROJ-2"]);
    }

    #[test]
    fn corrupt_snapshot_reports_schema_violation() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), FieldSchema::issue());
        std::fs::write(store.path_for("q"), "PROJ-1\n    Mood : grumpy\n").unwrap();

        assert!(matches!(
            store.load("q"),
            Err(CueError::SchemaViolation { .. })
        ));
    }
}
