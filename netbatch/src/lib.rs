//! # Netbatch
//!
//! Async CLI batch engine for multi-vendor network fleets.
//!
//! Netbatch connects to routers, switches, firewalls and wireless
//! controllers over SSH or Telnet, runs an ordered batch of CLI commands on
//! each and returns one structured result per device.
//!
//! ## Features
//!
//! - SSH via russh (with opt-in legacy ciphers and key exchange) and Telnet
//! - Expect-style prompt detection with tail search and ANSI stripping
//! - Data-driven driver table for nine vendor/platform families
//! - Concurrent fan-out with bounded concurrency, a run deadline and
//!   per-device failure isolation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use netbatch::{
//!     Credentials, DeviceEntry, JobOptions, PlatformRegistry, Scheduler, resolve_inventory,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), netbatch::Error> {
//!     let registry = PlatformRegistry::builtin()?;
//!     let credentials = Arc::new(Credentials::new("admin").with_password("secret"));
//!     let options = JobOptions::default().with_max_concurrency(32);
//!
//!     let inventory = vec![DeviceEntry::new("r1", "192.0.2.1", "cisco", "ios")];
//!     let resolution =
//!         resolve_inventory(inventory, &credentials, &registry, options.connect_timeout());
//!
//!     let scheduler = Scheduler::new(options)?;
//!     let commands = vec!["show version".to_string()];
//!     let (results, report) = scheduler.run_collect(resolution.devices, &commands).await;
//!
//!     for result in &results {
//!         println!("{result}");
//!     }
//!     assert!(report.is_complete());
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod driver;
pub mod error;
pub mod job;
pub mod platform;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for convenience
pub use driver::{
    CommandOutput, CommandRunner, Device, DeviceEntry, DeviceResult, Resolution, resolve_inventory,
};
pub use error::{Error, Result};
pub use job::{JobOptions, JobReport, ResultSink, Scheduler};
pub use platform::{PlatformDefinition, PlatformRegistry, PromptSet};
pub use transport::{
    ConnectionOverrides, Connector, Credentials, HostKeyVerification, NetworkConnector, Protocol,
    Session,
};
