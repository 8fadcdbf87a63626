use std::fmt::Display;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{read_or_empty, write_atomic};
use crate::error::Result;

pub const QUEUE_FILE_NAME: &str = "queue.txt";

/// A queue line: `<query_title> -- <key> - <title>`.
pub fn queue_entry(query_title: &str, issue: &impl Display) -> String {
    format!("{query_title} -- {issue}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Skip,
    Done,
    Quit,
}

impl Decision {
    /// Empty input means skip. Anything unrecognised is `None`.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "" | "s" | "skip" => Some(Self::Skip),
            "d" | "done" => Some(Self::Done),
            "q" | "quit" => Some(Self::Quit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriageOutcome {
    /// The pass finished and the queue file was rewritten.
    Committed { kept: usize, done: usize },
    /// Input ended before a decision was made for every line; the file is
    /// untouched.
    Aborted,
    Empty,
}

/// The review queue: an append-only line log that triage rewrites.
pub struct QueueStore {
    path: PathBuf,
}

impl QueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append lines, keeping whatever the file already holds. An empty slice
    /// does not touch the file.
    pub fn append(&self, entries: &[String]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut buf = String::new();
        for entry in entries {
            buf.push_str(entry);
            buf.push('\n');
        }
        file.write_all(buf.as_bytes())?;
        debug!(count = entries.len(), path = %self.path.display(), "Appended queue entries");
        Ok(())
    }

    /// Trimmed, non-empty lines in file order.
    pub fn load(&self) -> Result<Vec<String>> {
        let text = read_or_empty(&self.path)?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    /// Replace the queue with exactly `entries`.
    pub fn rewrite(&self, entries: &[String]) -> Result<()> {
        let mut buf = String::new();
        for entry in entries {
            buf.push_str(entry);
            buf.push('\n');
        }
        write_atomic(&self.path, &buf)
    }

    /// Walk the queue once, asking for a decision per line. `done` drops the
    /// line, `skip` keeps it, `quit` keeps it and every line after it without
    /// asking. The file is rewritten only after the pass completes.
    pub fn triage<R: BufRead, W: Write>(&self, mut input: R, mut output: W) -> Result<TriageOutcome> {
        let lines = self.load()?;
        if lines.is_empty() {
            return Ok(TriageOutcome::Empty);
        }

        let total = lines.len();
        let mut kept = Vec::with_capacity(total);
        let mut done = 0;
        let mut remaining = lines.into_iter().enumerate();

        while let Some((idx, line)) = remaining.next() {
            let decision = loop {
                write!(output, "[{}/{}] {}\n  (s)kip, (d)one, (q)uit > ", idx + 1, total, line)?;
                output.flush()?;
                let mut answer = String::new();
                if input.read_line(&mut answer)? == 0 {
                    writeln!(output)?;
                    info!("Triage input closed, queue left unchanged");
                    return Ok(TriageOutcome::Aborted);
                }
                match Decision::parse(&answer) {
                    Some(decision) => break decision,
                    None => writeln!(output, "  unknown answer '{}'", answer.trim())?,
                }
            };

            match decision {
                Decision::Skip => kept.push(line),
                Decision::Done => done += 1,
                Decision::Quit => {
                    kept.push(line);
                    kept.extend(remaining.by_ref().map(|(_, rest)| rest));
                    break;
                }
            }
        }

        self.rewrite(&kept)?;
        info!(kept = kept.len(), done, "Queue triaged");
        Ok(TriageOutcome::Committed {
            kept: kept.len(),
            done,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn lines(strs: &[&str]) -> Vec<String> {
        strs.iter().map(|s| s.to_string()).collect()
    }

    fn store_with(dir: &tempfile::TempDir, contents: &str) -> QueueStore {
        let path = dir.path().join(QUEUE_FILE_NAME);
        std::fs::write(&path, contents).unwrap();
        QueueStore::new(path)
    }

    #[test]
    fn entry_format() {
        struct Rec;
        impl Display for Rec {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("PROJ-1 - Crash")
            }
        }
        assert_eq!(queue_entry("My bugs", &Rec), "My bugs -- PROJ-1 - Crash");
    }

    #[test]
    fn empty_append_does_not_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(QUEUE_FILE_NAME);
        QueueStore::new(&path).append(&[]).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn empty_append_keeps_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, "q -- A-1 - one\n");
        store.append(&[]).unwrap();
        assert_eq!(store.load().unwrap(), lines(&["q -- A-1 - one"]));
    }

    #[test]
    fn append_preserves_existing_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, "q -- A-1 - one\n");
        store.append(&lines(&["q -- A-2 - two", "q -- A-3 - three"])).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join(QUEUE_FILE_NAME)).unwrap(),
            "q -- A-1 - one\nq -- A-2 - two\nq -- A-3 - three\n"
        );
    }

    #[test]
    fn load_skips_blank_lines_and_trims() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, "\n  a  \n\n b\n");
        assert_eq!(store.load().unwrap(), lines(&["a", "b"]));
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = QueueStore::new(dir.path().join(QUEUE_FILE_NAME));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn rewrite_with_nothing_leaves_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, "a\nb\n");
        store.rewrite(&[]).unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join(QUEUE_FILE_NAME)).unwrap(), "");
    }

    #[test]
    fn decision_parsing() {
        assert_eq!(Decision::parse("\n"), Some(Decision::Skip));
        assert_eq!(Decision::parse("S"), Some(Decision::Skip));
        assert_eq!(Decision::parse("done\n"), Some(Decision::Done));
        assert_eq!(Decision::parse(" q "), Some(Decision::Quit));
        assert_eq!(Decision::parse("maybe"), None);
    }

    #[test]
    fn quit_keeps_current_and_remaining_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, "L1\nL2\nL3\n");
        let mut out = Vec::new();

        let outcome = store.triage(Cursor::new("d\nq\n"), &mut out).unwrap();

        assert_eq!(outcome, TriageOutcome::Committed { kept: 2, done: 1 });
        assert_eq!(store.load().unwrap(), lines(&["L2", "L3"]));
        let prompts = String::from_utf8(out).unwrap();
        assert!(prompts.contains("[2/3] L2"));
        assert!(!prompts.contains("L3"));
    }

    #[test]
    fn skip_and_empty_answer_keep_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, "L1\nL2\nL3\n");

        store.triage(Cursor::new("s\n\nd\n"), Vec::new()).unwrap();
        assert_eq!(store.load().unwrap(), lines(&["L1", "L2"]));
    }

    #[test]
    fn all_done_empties_the_queue() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, "L1\nL2\n");

        let outcome = store.triage(Cursor::new("d\nd\n"), Vec::new()).unwrap();
        assert_eq!(outcome, TriageOutcome::Committed { kept: 0, done: 2 });
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn unknown_answer_asks_again_for_same_line() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, "L1\nL2\n");
        let mut out = Vec::new();

        store.triage(Cursor::new("what\nd\ns\n"), &mut out).unwrap();
        assert_eq!(store.load().unwrap(), lines(&["L2"]));
        let prompts = String::from_utf8(out).unwrap();
        assert_eq!(prompts.matches("[1/2] L1").count(), 2);
    }

    #[test]
    fn closed_input_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, "L1\nL2\nL3\n");

        let outcome = store.triage(Cursor::new("d\n"), Vec::new()).unwrap();
        assert_eq!(outcome, TriageOutcome::Aborted);
        assert_eq!(store.load().unwrap(), lines(&["L1", "L2", "L3"]));
    }

    #[test]
    fn empty_queue_has_nothing_to_triage() {
        let dir = tempfile::tempdir().unwrap();
        let store = QueueStore::new(dir.path().join(QUEUE_FILE_NAME));
        assert_eq!(store.triage(Cursor::new(""), Vec::new()).unwrap(), TriageOutcome::Empty);
    }
}
