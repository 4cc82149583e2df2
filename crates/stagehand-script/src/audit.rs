use parking_lot::Mutex;
use serde::Serialize;
use stagehand_foundation::ScriptError;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// One row of the matcher's audit trail, same fields as the original
/// matcher's search log: which kind of search ran, its winning score, what
/// was searched for, and which chunk (if any) won.
#[derive(Debug, Serialize)]
pub struct AuditRow<'a> {
    pub search_type: &'a str,
    pub best_score: u8,
    pub target_string: &'a str,
    pub chunk_text: &'a str,
    pub page_number: String,
}

/// Appends one CSV row per matcher search. The file is created with a
/// header on first use; a fresh `csv::Writer` is opened per write since
/// writes are infrequent (at most once per audio-snapshot period) and this
/// keeps the type `Send` without holding a file handle open across awaits.
pub struct AuditLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ScriptError> {
        let path = path.into();
        write_header(&path)?;
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn log(&self, row: AuditRow<'_>) {
        let _guard = self.lock.lock();
        if let Err(err) = append_row(&self.path, &row) {
            tracing::warn!(error = %err, "failed to write matcher audit row");
        }
    }
}

fn write_header(path: &Path) -> Result<(), ScriptError> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|e| ScriptError::Malformed(format!("cannot create audit log: {e}")))?;
    let mut writer = csv::Writer::from_writer(file);
    writer
        .write_record(["search_type", "best_score", "target_string", "chunk_text", "page_number"])
        .map_err(|e| ScriptError::Malformed(format!("cannot write audit header: {e}")))?;
    writer
        .flush()
        .map_err(|e| ScriptError::Malformed(format!("cannot flush audit header: {e}")))?;
    Ok(())
}

fn append_row(path: &Path, row: &AuditRow<'_>) -> std::io::Result<()> {
    let file = OpenOptions::new().append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer.serialize(row)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_creates_header_and_appends_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.csv");
        let log = AuditLog::new(&path).unwrap();

        log.log(AuditRow {
            search_type: "local",
            best_score: 72,
            target_string: "to be or not to be",
            chunk_text: "to be or not to be",
            page_number: "3".to_string(),
        });

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("search_type,best_score,target_string,chunk_text,page_number"));
        assert!(contents.contains("local,72"));
    }
}
