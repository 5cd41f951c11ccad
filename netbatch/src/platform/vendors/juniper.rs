//! Juniper JUNOS platform definition.
//!
//! Operational mode is the only mode commands run in; there is no enable
//! step.
//!
//! # Prompt Examples
//!
//! ```text
//! user@router>              # operational mode (trailing space)
//! [edit]
//! user@router#              # configuration mode
//! ```

use std::time::Duration;

use crate::error::PlatformError;
use crate::platform::{PlatformDefinition, PromptSet};

/// Create the Juniper JUNOS platform definition.
pub fn platform() -> Result<PlatformDefinition, PlatformError> {
    let prompts = PromptSet::single(
        r"(?im)[a-z0-9.\-_@()/:]{1,63}>\s$",
        Some(r"(?im)(\[edit\]\n){0,1}[a-z0-9.\-_@()/:]{1,63}#\s?$"),
    )?;

    Ok(PlatformDefinition::new("juniper_junos", prompts)
        .with_on_open_command("set cli screen-length 0")
        .with_timeout(Duration::from_secs(2))
        .with_insecure_host_key(true)
        .with_legacy_ciphers(true))
}
