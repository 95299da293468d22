//! nordswitch - least-loaded server selection for strongSwan IPsec tunnels
//!
//! Fetches the NordVPN server load statistics, picks the least-loaded
//! server, rewrites the endpoint directive in the local IPsec configuration
//! and re-establishes the tunnel, retrying the bring-up until the daemon
//! accepts it.
//!
//! ## What this crate provides
//! - Load report fetching and fastest-server selection
//! - Line-oriented IPsec configuration rewriting
//! - Daemon control (down/up/reload/restart) with output classification
//! - The bring-up retry state machine and the full run orchestration
//!
//! The `nordswitch` binary in `src/bin/` wires these together behind a
//! command line surface; all behavior lives here.

pub mod conf;
pub mod config;
pub mod daemon;
pub mod error;
pub mod stats;
pub mod switcher;

// Re-export core types
pub use conf::IpsecConf;
pub use config::{ConnAction, Settings};
pub use daemon::{BringUp, BringUpState, IpsecDaemon};
pub use error::{Result, SwitchError};
pub use stats::{fastest, LoadReport, Selection, ServerLoad, StatsFeed};
pub use switcher::Switcher;

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
