pub mod config;
pub mod diaglog;
pub mod error;
pub mod message;
pub mod paths;

pub use config::Config;
pub use diaglog::DiagnosticLog;
pub use error::{Error, Result};
pub use message::{InboundMessage, OutboundEnvelope};
pub use paths::Paths;
