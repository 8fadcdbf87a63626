//! Ordered field schema shared by the snapshot codec and the change detector.

/// One persisted field: the record key it reads and the label written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldEntry {
    pub key: &'static str,
    pub label: &'static str,
}

const ISSUE_FIELDS: &[FieldEntry] = &[
    FieldEntry { key: "title", label: "Title" },
    FieldEntry { key: "assignee", label: "Assignee" },
    FieldEntry { key: "status", label: "Status" },
    FieldEntry { key: "type", label: "Type" },
    FieldEntry { key: "parent", label: "Parent" },
    FieldEntry { key: "epic", label: "Epic" },
    FieldEntry { key: "story_points", label: "Story points" },
    FieldEntry { key: "sprints_str", label: "Sprints" },
    FieldEntry { key: "resolution", label: "Resolution" },
    FieldEntry { key: "target_version", label: "Target version" },
    FieldEntry { key: "git_branches", label: "Git branches" },
    FieldEntry { key: "created_str", label: "Created" },
    FieldEntry { key: "labels_str", label: "Labels" },
    FieldEntry { key: "time_spent_str", label: "Time spent" },
    FieldEntry { key: "original_estimate_str", label: "Estimate" },
];

#[derive(Debug, Clone)]
pub struct FieldSchema {
    entries: Vec<FieldEntry>,
    label_width: usize,
}

impl FieldSchema {
    pub fn new(entries: Vec<FieldEntry>) -> Self {
        let label_width = entries
            .iter()
            .map(|e| e.label.chars().count())
            .max()
            .unwrap_or(0);
        Self {
            entries,
            label_width,
        }
    }

    /// The schema used for every snapshot file `cue` writes.
    pub fn issue() -> Self {
        Self::new(ISSUE_FIELDS.to_vec())
    }

    pub fn entries(&self) -> &[FieldEntry] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|e| e.key)
    }

    /// Width every label is padded to when serialized.
    pub fn label_width(&self) -> usize {
        self.label_width
    }

    pub fn key_for_label(&self, label: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.key)
    }
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::issue()
    }
}
