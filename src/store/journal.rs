use super::StoreError;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};

/// One write-ahead record, serialized as a JSON line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JournalEntry {
    /// A link is about to be created at `path`.
    Link { path: Utf8PathBuf },
    /// A directory is about to be created at `path`.
    Mkdir { path: Utf8PathBuf },
}

impl JournalEntry {
    pub fn path(&self) -> &Utf8Path {
        match self {
            JournalEntry::Link { path } | JournalEntry::Mkdir { path } => path,
        }
    }
}

/// Append-only log written before each link or directory is created.
///
/// Between two link-store saves, the journal is what lets a later `Clear`
/// find links the interrupted deployment already made.
#[derive(Debug)]
pub struct DeployJournal {
    path: Utf8PathBuf,
    file: Option<File>,
}

impl DeployJournal {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Read all complete entries.
    ///
    /// A line that does not parse (a write torn by a crash) is skipped.
    pub fn entries(&self) -> Result<Vec<JournalEntry>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::io("read", &self.path, err)),
        };

        let mut entries = Vec::new();
        for line in raw.lines().filter(|line| !line.trim().is_empty()) {
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(err) => tracing::warn!("Skipping torn journal line in {}: {}", self.path, err),
            }
        }
        Ok(entries)
    }

    /// Paths of every pending entry, in the order they were written.
    pub fn pending_paths(&self) -> Result<Vec<Utf8PathBuf>, StoreError> {
        Ok(self
            .entries()?
            .iter()
            .map(|entry| entry.path().to_path_buf())
            .collect())
    }

    pub fn record_link(&mut self, path: &Utf8Path) -> Result<(), StoreError> {
        self.append(&JournalEntry::Link {
            path: path.to_path_buf(),
        })
    }

    pub fn record_dir(&mut self, path: &Utf8Path) -> Result<(), StoreError> {
        self.append(&JournalEntry::Mkdir {
            path: path.to_path_buf(),
        })
    }

    fn append(&mut self, entry: &JournalEntry) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(entry).map_err(|source| StoreError::Serialize {
            path: self.path.clone(),
            source,
        })?;
        line.push('\n');

        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|err| StoreError::io("open", &self.path, err))?;
            self.file = Some(file);
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(line.as_bytes())
                .and_then(|()| file.flush())
                .map_err(|err| StoreError::io("append to", &self.path, err))?;
        }
        Ok(())
    }

    /// Drop every entry. Called once the link store covers them.
    pub fn truncate(&mut self) -> Result<(), StoreError> {
        self.file = None;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::io("remove", &self.path, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn journal_in(dir: &TempDir) -> DeployJournal {
        DeployJournal::new(Utf8PathBuf::try_from(dir.path().join("deploy_journal.jsonl")).unwrap())
    }

    #[test]
    fn test_missing_journal_has_no_entries() {
        let dir = TempDir::new().unwrap();
        assert!(journal_in(&dir).entries().unwrap().is_empty());
    }

    #[test]
    fn test_record_and_read_back() {
        let dir = TempDir::new().unwrap();
        let mut journal = journal_in(&dir);
        journal.record_link(Utf8Path::new("/game/a.dds")).unwrap();
        journal.record_link(Utf8Path::new("/game/b.dds")).unwrap();

        journal.record_dir(Utf8Path::new("/game/textures")).unwrap();

        let reader = journal_in(&dir);
        assert_eq!(
            reader.pending_paths().unwrap(),
            vec!["/game/a.dds", "/game/b.dds", "/game/textures"]
        );
        assert!(matches!(reader.entries().unwrap()[2], JournalEntry::Mkdir { .. }));
    }

    #[test]
    fn test_torn_line_is_skipped() {
        let dir = TempDir::new().unwrap();
        let journal = journal_in(&dir);
        fs::write(
            journal.path(),
            "{\"op\":\"link\",\"path\":\"/game/a.dds\"}\n{\"op\":\"li",
        )
        .unwrap();

        assert_eq!(journal.pending_paths().unwrap(), vec!["/game/a.dds"]);
    }

    #[test]
    fn test_truncate_removes_entries() {
        let dir = TempDir::new().unwrap();
        let mut journal = journal_in(&dir);
        journal.record_link(Utf8Path::new("/game/a.dds")).unwrap();
        journal.truncate().unwrap();

        assert!(!journal.path().exists());
        assert!(journal.entries().unwrap().is_empty());
    }
}
