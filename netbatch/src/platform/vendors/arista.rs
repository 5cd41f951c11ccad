//! Arista EOS platform definition.
//!
//! # Prompt Examples
//!
//! ```text
//! switch>                            # exec mode
//! switch#                            # privileged exec mode
//! switch(config)#                    # configuration mode
//! switch(config-if-et1)#             # config sub-mode (interface)
//! ```

use std::time::Duration;

use crate::error::PlatformError;
use crate::platform::{PlatformDefinition, PromptSet};

/// Create the Arista EOS platform definition.
pub fn platform() -> Result<PlatformDefinition, PlatformError> {
    let prompts = PromptSet::new(
        r"(?im)[a-z0-9.-]{1,63}>$",
        r"(?im)[a-z0-9.-]{1,63}#$",
        Some(r"(?im)[a-z0-9.-]{1,63}\(config[a-z0-9-]{0,63}\)#$"),
    )?;

    Ok(PlatformDefinition::new("arista_eos", prompts)
        .with_on_open_command("terminal length 0")
        .with_timeout(Duration::from_secs(2))
        .with_insecure_host_key(true)
        .with_legacy_ciphers(true)
        .with_escalate_command("enable"))
}
