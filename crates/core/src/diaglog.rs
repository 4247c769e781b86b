use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::error;

/// Append-only diagnostic log, one line per event:
/// `yyyy-MM-dd HH:mm:ss.fff - <message>`. This is the only error surface
/// the bridge exposes; there is no interactive channel.
pub struct DiagnosticLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl DiagnosticLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best-effort append. A log that cannot be written must never take
    /// the bridge down, so failures only surface on stderr.
    pub fn record(&self, message: impl AsRef<str>) {
        let line = format!(
            "{} - {}",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            message.as_ref()
        );
        let _guard = match self.lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = self.append(&line) {
            error!(error = %e, path = %self.path.display(), "failed to append diagnostic log");
        }
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }
}
