use std::collections::{BTreeMap, HashMap};

use crate::model::{CoreData, Issue};
use crate::schema::FieldSchema;

/// Fresh issues that are new, or whose core data differs from the stored
/// snapshot. Comparison is exact text over the schema's fields.
pub fn detect_changes<'a>(
    fresh: &'a [Issue],
    stored: &HashMap<String, CoreData>,
    schema: &FieldSchema,
) -> BTreeMap<String, &'a Issue> {
    let mut changed = BTreeMap::new();
    for issue in fresh {
        let core = issue.core_data(schema);
        let unchanged = stored
            .get(&core.key)
            .is_some_and(|previous| previous.same_fields(&core, schema));
        if !unchanged {
            changed.insert(core.key, issue);
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(key: &str, status: &str) -> Issue {
        Issue {
            key: key.into(),
            title: format!("Issue {key}"),
            status: status.into(),
            ..Issue::default()
        }
    }

    fn stored(issues: &[Issue]) -> HashMap<String, CoreData> {
        let schema = FieldSchema::issue();
        issues
            .iter()
            .map(|i| (i.key.clone(), i.core_data(&schema)))
            .collect()
    }

    #[test]
    fn new_issue_is_reported() {
        let schema = FieldSchema::issue();
        let snapshot = stored(&[issue("A-1", "Open")]);
        let fresh = vec![issue("A-1", "Open"), issue("B-1", "Open")];

        let changed = detect_changes(&fresh, &snapshot, &schema);
        assert_eq!(changed.keys().collect::<Vec<_>>(), vec!["B-1"]);
    }

    #[test]
    fn status_change_is_reported() {
        let schema = FieldSchema::issue();
        let snapshot = stored(&[issue("A-1", "Open")]);
        let fresh = vec![issue("A-1", "Closed")];

        let changed = detect_changes(&fresh, &snapshot, &schema);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed["A-1"].status, "Closed");
    }

    #[test]
    fn case_only_change_counts() {
        let schema = FieldSchema::issue();
        let mut old = issue("A-1", "Done");
        old.resolution = "Fixed".into();
        let mut new = old.clone();
        new.resolution = "fixed".into();

        let fresh = [new];
        let changed = detect_changes(&fresh, &stored(&[old]), &schema);
        assert!(changed.contains_key("A-1"));
    }

    #[test]
    fn fields_outside_schema_do_not_count() {
        let schema = FieldSchema::issue();
        let old = issue("A-1", "Open");
        let mut new = old.clone();
        new.description = "rewritten".into();
        new.creator = "someone else".into();

        assert!(detect_changes(&[new], &stored(&[old]), &schema).is_empty());
    }

    #[test]
    fn whitespace_only_difference_is_not_a_change() {
        let schema = FieldSchema::issue();
        let old = issue("A-1", "In Progress");
        let new = issue("A-1", "In   Progress\n");

        assert!(detect_changes(&[new], &stored(&[old]), &schema).is_empty());
    }

    #[test]
    fn snapshot_from_older_schema_is_a_change() {
        let schema = FieldSchema::issue();
        let mut snapshot = stored(&[issue("A-1", "Open")]);
        snapshot.get_mut("A-1").unwrap().fields.remove("epic");

        let fresh = [issue("A-1", "Open")];
        let changed = detect_changes(&fresh, &snapshot, &schema);
        assert!(changed.contains_key("A-1"));
    }

    #[test]
    fn empty_snapshot_reports_everything() {
        let schema = FieldSchema::issue();
        let fresh = vec![issue("A-1", "Open"), issue("A-2", "Open")];
        assert_eq!(detect_changes(&fresh, &HashMap::new(), &schema).len(), 2);
    }
}
