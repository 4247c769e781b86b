use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".peerbridge"))
            .unwrap_or_else(|| PathBuf::from(".peerbridge"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    pub fn inbox_file(&self) -> PathBuf {
        self.base.join("command.txt")
    }

    pub fn attachment_file(&self) -> PathBuf {
        self.base.join("attach.txt")
    }

    pub fn response_file(&self) -> PathBuf {
        self.base.join("output.txt")
    }

    /// Per-user location used only when the primary response write fails.
    pub fn fallback_response_file(&self) -> PathBuf {
        dirs::desktop_dir()
            .or_else(dirs::home_dir)
            .map(|d| d.join("peerbridge_output.txt"))
            .unwrap_or_else(|| self.base.join("output_fallback.txt"))
    }

    pub fn log_file(&self) -> PathBuf {
        self.base.join("bridge.log")
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.base)
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
