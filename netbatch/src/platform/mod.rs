//! Platform definitions for multi-vendor support.
//!
//! This module is the device driver table: per vendor/platform it holds the
//! prompt patterns, the setup commands that make the CLI batch friendly, the
//! command timeout and the connection defaults.

mod definition;
mod prompts;
mod registry;
pub mod vendors;

pub use definition::PlatformDefinition;
pub use prompts::PromptSet;
pub use registry::{PlatformRegistry, platform_key};
