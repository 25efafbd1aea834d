//! # prompter-hub
//!
//! Real-time broadcast hub for teleprompter scripts.
//!
//! - **Remote control** over server-sent events: anything that can POST JSON
//!   (an agent, a phone, the `prompter-hub control` command) drives every
//!   viewer of a script with `next`, `prev`, `goto`, `reset`, `focus` and
//!   `reload` events.
//! - **Live preview** over WebSocket: editors of the same script mirror each
//!   other's preview content.
//! - **Reload on save**: an optional watcher publishes `reload` when a
//!   script file changes on disk.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use prompter_hub::{BroadcastHub, HubConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let hub = BroadcastHub::from_config(&HubConfig::default());
//!     let mut viewer = hub.subscribe_events("demo");
//!
//!     hub.control("demo", &json!({ "type": "next" }))?;
//!     let frame = viewer.recv().await;
//!     assert!(frame.is_some());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod hub;
pub mod server;
pub mod watcher;

pub use config::HubConfig;
pub use error::{DeliveryError, HubError};
pub use hub::{BroadcastHub, ControlEvent, DuplexChannel, PushChannel, TopicRegistry};
pub use watcher::ScriptWatcher;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
