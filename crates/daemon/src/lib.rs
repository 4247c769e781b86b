pub mod outbound;
pub mod router;
pub mod sink;
pub mod supervisor;
pub mod watcher;

pub use outbound::OutboundBuilder;
pub use router::InboundRouter;
pub use sink::ResponseSink;
pub use supervisor::Supervisor;
pub use watcher::{InboxUpdate, InboxWatcher, WatchEvent};
