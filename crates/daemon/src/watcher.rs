use notify::{Event, EventKind, RecursiveMode, Watcher};
use once_cell::sync::Lazy;
use peerbridge_core::{Config, DiagnosticLog, Error, Paths, Result};
use regex::Regex;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// One filesystem notification, stamped when it arrived.
#[derive(Debug)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub at: Instant,
}

/// What the watcher hands to the outbound builder: the inbox body with
/// the leading path block removed, plus the referenced files.
#[derive(Debug)]
pub struct InboxUpdate {
    pub body: String,
    pub references: Vec<PathBuf>,
}

/// Line-anchored absolute paths: optional drive letter, then one or more
/// `/`- or `\`-separated segments, optionally ending in an extension.
static PATH_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^((?:[a-zA-Z]:)?(?:[\\/][^\\/:*?"<>|\r\n]+)+\.?\w*)"#)
        .expect("path regex must compile")
});

pub struct InboxWatcher {
    inbox: PathBuf,
    default_attachment: PathBuf,
    debounce: Duration,
    read_attempts: u32,
    retry_delay: Duration,
    event_buffer: usize,
    diag: Arc<DiagnosticLog>,
}

impl InboxWatcher {
    pub fn new(config: &Config, paths: &Paths, diag: Arc<DiagnosticLog>) -> Self {
        Self {
            inbox: config.inbox_file(paths),
            default_attachment: config.default_attachment(paths),
            debounce: Duration::from_millis(config.watch.debounce_ms),
            read_attempts: config.watch.read_attempts,
            retry_delay: Duration::from_millis(config.watch.read_retry_delay_ms),
            event_buffer: config.bridge.queue_size,
            diag,
        }
    }

    /// Watches the inbox until shutdown. The notify callback only
    /// enqueues a lightweight event into a bounded channel; this worker
    /// does the debouncing and the retrying read, so a slow read cannot
    /// stall notification delivery.
    pub async fn run(
        self,
        outbound_tx: mpsc::Sender<InboxUpdate>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        let (event_tx, mut event_rx) = mpsc::channel::<WatchEvent>(self.event_buffer);

        let inbox = self.inbox.clone();
        let inbox_name: OsString = inbox
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        return;
                    }
                    if !event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(inbox_name.as_os_str()))
                    {
                        return;
                    }
                    let event = WatchEvent {
                        path: inbox.clone(),
                        at: Instant::now(),
                    };
                    if event_tx.try_send(event).is_err() {
                        warn!("watch event queue full, dropping notification");
                    }
                }
                Err(e) => warn!(error = %e, "filesystem notification error"),
            }
        })
        .map_err(|e| Error::Watch(e.to_string()))?;

        // Watch the parent directory: editors replace files on save, and a
        // watch on the file itself would be lost with the old inode.
        let watch_dir = self.inbox.parent().unwrap_or_else(|| Path::new("."));
        watcher
            .watch(watch_dir, RecursiveMode::NonRecursive)
            .map_err(|e| Error::Watch(e.to_string()))?;
        info!(path = %self.inbox.display(), "watching inbox");

        let mut debouncer = Debouncer::new(self.debounce);
        loop {
            tokio::select! {
                maybe = event_rx.recv() => {
                    let Some(event) = maybe else { break };
                    if !debouncer.accept(event.at) {
                        debug!("skipping duplicate inbox change event");
                        self.diag.record("skipping duplicate inbox change event");
                        continue;
                    }
                    let Some(content) =
                        read_with_retry(&event.path, self.read_attempts, self.retry_delay).await
                    else {
                        error!(path = %event.path.display(), "failed to read inbox after retries");
                        self.diag.record(format!(
                            "failed to read {} after {} attempts",
                            event.path.display(),
                            self.read_attempts
                        ));
                        continue;
                    };
                    let (body, references) =
                        extract_references(&content, &self.default_attachment);
                    if outbound_tx.send(InboxUpdate { body, references }).await.is_err() {
                        break;
                    }
                }
                _ = shutdown.recv() => break,
            }
        }

        Ok(())
    }
}

/// Fixed-window debounce: an event inside the window of the last
/// *accepted* event is dropped, and dropping it does not move the window.
struct Debouncer {
    window: Duration,
    last: Option<Instant>,
}

impl Debouncer {
    fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    fn accept(&mut self, at: Instant) -> bool {
        if let Some(last) = self.last {
            if at.duration_since(last) < self.window {
                return false;
            }
        }
        self.last = Some(at);
        true
    }
}

/// The inbox writer may hold an exclusive lock mid-save; retry a bounded
/// number of times before giving the event up. Partial content is never
/// returned.
async fn read_with_retry(path: &Path, attempts: u32, delay: Duration) -> Option<String> {
    for attempt in 1..=attempts {
        match std::fs::read_to_string(path) {
            Ok(content) => return Some(content),
            Err(e) => {
                debug!(error = %e, attempt, path = %path.display(), "inbox read failed");
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    None
}

/// Pulls line-anchored absolute paths out of the body. Matches that name
/// an existing file are recorded and removed from the text; when nothing
/// resolves, the configured default attachment stands in.
fn extract_references(body: &str, default_attachment: &Path) -> (String, Vec<PathBuf>) {
    let mut references = Vec::new();
    let mut remaining = String::with_capacity(body.len());
    let mut cursor = 0;

    for m in PATH_LINE.find_iter(body) {
        let candidate = Path::new(m.as_str());
        if candidate.is_file() {
            references.push(candidate.to_path_buf());
            remaining.push_str(&body[cursor..m.start()]);
            cursor = m.end();
        }
    }
    remaining.push_str(&body[cursor..]);

    let body = if references.is_empty() {
        references.push(default_attachment.to_path_buf());
        remaining
    } else {
        remaining.trim_start_matches(['\r', '\n']).to_string()
    };

    (body, references)
}
