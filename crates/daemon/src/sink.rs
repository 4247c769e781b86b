use peerbridge_core::{DiagnosticLog, Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Persists routed response text. One primary location, one fallback,
/// nothing beyond that.
pub struct ResponseSink {
    primary: PathBuf,
    fallback: PathBuf,
    diag: Arc<DiagnosticLog>,
}

impl ResponseSink {
    pub fn new(primary: PathBuf, fallback: PathBuf, diag: Arc<DiagnosticLog>) -> Self {
        Self {
            primary,
            fallback,
            diag,
        }
    }

    /// Writes `text` verbatim, overwriting. Returns the path that
    /// actually received the content.
    pub fn write(&self, text: &str) -> Result<PathBuf> {
        match write_to(&self.primary, text) {
            Ok(()) => {
                info!(path = %self.primary.display(), chars = text.len(), "response saved");
                Ok(self.primary.clone())
            }
            Err(e) => {
                warn!(error = %e, path = %self.primary.display(), "primary response write failed, trying fallback");
                self.diag
                    .record(format!("error writing {}: {}", self.primary.display(), e));
                match write_to(&self.fallback, text) {
                    Ok(()) => {
                        self.diag.record(format!(
                            "response saved to fallback {}",
                            self.fallback.display()
                        ));
                        Ok(self.fallback.clone())
                    }
                    Err(e) => {
                        self.diag.record(format!(
                            "fallback write to {} failed: {}",
                            self.fallback.display(),
                            e
                        ));
                        Err(Error::Io(e))
                    }
                }
            }
        }
    }
}

fn write_to(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text)
}
