//! Aruba AOS-CX platform definition.
//!
//! AOS-CX prompts end with a space and hostnames are at most 31 characters.

use std::time::Duration;

use crate::error::PlatformError;
use crate::platform::{PlatformDefinition, PromptSet};

/// Create the Aruba AOS-CX platform definition.
pub fn aoscx() -> Result<PlatformDefinition, PlatformError> {
    let prompts = PromptSet::new(
        r"(?im)[a-z0-9\.-]{1,31}>\s$",
        r"(?im)[a-z0-9\.-]{1,31}#\s$",
        Some(r"(?im)[a-z0-9\.-]{1,31}\(config[a-z0-9-]{0,63}\)#\s$"),
    )?;

    Ok(PlatformDefinition::new("aruba_aoscx", prompts)
        .with_on_open_command("no page")
        .with_timeout(Duration::from_secs(2))
        .with_insecure_host_key(true)
        .with_escalate_command("enable"))
}
