//! Development server for mortar sites.
//!
//! Polls the source directories, rebuilds on change and pushes
//! server-sent events to the live reload client running in the browser.

pub mod events;
pub mod live;
pub mod server;
pub mod watcher;

pub use events::{LiveEvent, LiveHub};
pub use live::{client_script, Action, ClientConfig, ResourceKind};
pub use server::{DevServer, DevServerConfig, ServerError, EVENTS_PATH, SCRIPT_PATH};
pub use watcher::{directory_mtime, Rebuild, StateFile, TickOutcome, WatchState, Watcher, STATE_FILE};
