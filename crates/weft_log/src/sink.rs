//! Per-mod append-only text files with size-based rotation.

use core::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use chrono::Local;

/// Default rotation budget: 1 MiB.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;

/// Which of a mod's two log files a line goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    /// `<Mod>_Messages.txt`: debug, info and warning lines.
    Messages,
    /// `<Mod>_Exceptions.txt`: errors and captured faults.
    Exceptions,
}

impl SinkKind {
    /// File-name component for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SinkKind::Messages => "Messages",
            SinkKind::Exceptions => "Exceptions",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of a mod's log files.
#[derive(Debug, Clone)]
pub struct FileSink {
    directory: PathBuf,
    mod_name: String,
    kind: SinkKind,
    max_bytes: u64,
}

impl FileSink {
    /// Describes the `kind` file of `mod_name` inside `directory`.
    #[must_use]
    pub fn new(
        directory: impl Into<PathBuf>,
        mod_name: impl Into<String>,
        kind: SinkKind,
        max_bytes: u64,
    ) -> Self {
        Self {
            directory: directory.into(),
            mod_name: mod_name.into(),
            kind,
            max_bytes,
        }
    }

    /// Path of the live file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.directory
            .join(format!("{}_{}.txt", self.mod_name, self.kind))
    }

    /// Appends `text` as one entry, rotating first if the file is over budget.
    ///
    /// The file is opened, written and flushed on every call, so nothing is
    /// buffered across entries.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from creating the directory, rotating or writing.
    pub fn append(&self, text: &str) -> io::Result<()> {
        fs::create_dir_all(&self.directory)?;
        self.rotate_if_needed()?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path())?;
        file.write_all(text.as_bytes())?;
        if !text.ends_with('\n') {
            file.write_all(b"\n")?;
        }
        file.flush()
    }

    /// Renames the live file to `Old_<Mod>_<Kind>_<stamp>.txt` when it
    /// exceeds the budget. Returns the rotated path.
    ///
    /// # Errors
    ///
    /// Returns any I/O error other than the live file not existing.
    pub fn rotate_if_needed(&self) -> io::Result<Option<PathBuf>> {
        let path = self.path();
        let len = match fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };
        if len <= self.max_bytes {
            return Ok(None);
        }

        let rotated = self.rotated_path();
        fs::rename(&path, &rotated)?;
        tracing::debug!(
            target: "weft::log",
            from = %path.display(),
            to = %rotated.display(),
            "rotated log file"
        );
        Ok(Some(rotated))
    }

    fn rotated_path(&self) -> PathBuf {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S%.6f");
        self.directory.join(format!("Old_{}_{}_{}.txt", self.mod_name, self.kind, stamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_mod_name() {
        let sink = FileSink::new("/logs", "Tidy", SinkKind::Exceptions, 10);
        assert_eq!(sink.path(), PathBuf::from("/logs/Tidy_Exceptions.txt"));
    }

    #[test]
    fn append_adds_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path(), "Tidy", SinkKind::Messages, DEFAULT_MAX_FILE_BYTES);
        sink.append("one").unwrap();
        sink.append("two\n").unwrap();
        assert_eq!(fs::read_to_string(sink.path()).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn oversized_file_is_rotated_before_write() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path(), "Tidy", SinkKind::Messages, 8);
        sink.append("first line is long").unwrap();
        sink.append("second").unwrap();

        assert_eq!(fs::read_to_string(sink.path()).unwrap(), "second\n");
        let rotated: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("Old_Tidy_Messages_"))
            .collect();
        assert_eq!(rotated.len(), 1);
        let old = fs::read_to_string(dir.path().join(&rotated[0])).unwrap();
        assert_eq!(old, "first line is long\n");
    }

    #[test]
    fn small_file_is_not_rotated() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path(), "Tidy", SinkKind::Messages, 1024);
        sink.append("short").unwrap();
        assert!(sink.rotate_if_needed().unwrap().is_none());
    }
}
