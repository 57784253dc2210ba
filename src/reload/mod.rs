//! Live reload.
//!
//! Two hops connect a source edit to a refreshed browser tab:
//!
//! ```text
//! watcher --broadcast--> changes --wait--> pipelines (re-render)
//! pipelines --broadcast--> passes --wait--> WebSocket server --> browsers
//! ```
//!
//! Both hops use the same one-shot [`ReloadCoordinator`].
//!
//! # Modules
//!
//! - `coordinator` - one-shot change signal shared by waiters
//! - `message` - JSON messages sent to browsers
//! - `server` - WebSocket server for browser connections

mod coordinator;
pub mod message;
pub mod server;

pub use coordinator::{ReloadCoordinator, ReloadSignal};
