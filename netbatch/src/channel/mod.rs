//! Channel layer: the expect engine.
//!
//! This module turns a raw device byte stream into discrete
//! command/response exchanges, including pattern-based prompt detection,
//! ANSI stripping and output normalization.

mod buffer;
mod normalize;
mod patterns;
mod pty;

pub use buffer::PatternBuffer;
pub use normalize::{command_key, truncate_output};
pub use patterns::{CompletionPattern, combine_prompt_patterns, compile_prompt_pattern};
pub use pty::{DeviceStream, PtyChannel, PtyConfig};
