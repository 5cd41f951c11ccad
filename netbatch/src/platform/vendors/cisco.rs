//! Cisco platform definitions.
//!
//! # Prompt Examples
//!
//! ```text
//! router>                     # ios, smb: user exec
//! router#                     # ios, smb: privileged exec
//! router(config)#             # ios, smb: configuration
//! RP/0/RSP0/CPU0:xr#          # iosxr: exec (no separate user mode)
//! fw/admin>                   # asa, nxos: user exec (trailing space)
//! fw/admin#                   # asa, nxos: privileged exec (trailing space)
//! (Cisco Controller) >        # aireos: exec (no separate user mode)
//! (Cisco Controller) config>  # aireos: configuration
//! ```

use std::time::Duration;

use crate::error::PlatformError;
use crate::platform::{PlatformDefinition, PromptSet};

/// Cisco IOS / IOS-XE.
pub fn ios() -> Result<PlatformDefinition, PlatformError> {
    let prompts = PromptSet::new(
        r"(?im)^[a-z0-9.\-_@()/:]{1,63}>$",
        r"(?im)^[a-z0-9.\-_@()/:]{1,63}#$",
        Some(r"(?im)^[a-z0-9.\-_@/:]{1,63}\([a-z0-9.\-@/:\+]{0,32}\)#$"),
    )?;

    Ok(PlatformDefinition::new("cisco_ios", prompts)
        .with_on_open_command("terminal length 0")
        .with_timeout(Duration::from_secs(2))
        .with_insecure_host_key(true)
        .with_legacy_ciphers(true)
        .with_escalate_command("enable"))
}

/// Cisco IOS-XR.
pub fn iosxr() -> Result<PlatformDefinition, PlatformError> {
    let prompts = PromptSet::single(
        r"(?im)^[a-z0-9.\-_@/:]{1,63}#\s?$",
        Some(r"(?im)^[a-z0-9.\-_@/:]{1,63}\(config[a-z0-9.\-@/:\+]{0,32}\)#$"),
    )?;

    Ok(PlatformDefinition::new("cisco_iosxr", prompts)
        .with_on_open_command("terminal length 0")
        .with_on_open_command("terminal width 0")
        .with_timeout(Duration::from_secs(2))
        .with_insecure_host_key(true))
}

/// Cisco NX-OS.
pub fn nxos() -> Result<PlatformDefinition, PlatformError> {
    let prompts = PromptSet::new(
        r"(?im)[a-z0-9.\-_@()/:]{1,63}>\s$",
        r"(?im)[a-z0-9.\-_@/:]{1,63}#\s$",
        Some(r"(?im)[a-z0-9.\-_@/:]{1,63}\(config[a-z0-9.\-@/:\+]{0,32}\)#\s$"),
    )?;

    Ok(PlatformDefinition::new("cisco_nxos", prompts)
        .with_on_open_command("terminal length 0")
        .with_on_open_command("terminal width 511")
        .with_timeout(Duration::from_secs(5))
        .with_insecure_host_key(true)
        .with_escalate_command("enable"))
}

/// Cisco ASA.
pub fn asa() -> Result<PlatformDefinition, PlatformError> {
    let prompts = PromptSet::new(
        r"(?im)[a-z0-9.\-_@()/:]{1,63}>\s$",
        r"(?im)[a-z0-9.\-_@/:]{1,63}#\s$",
        Some(r"(?im)[a-z0-9.\-_@/:]{1,63}\(config[a-z0-9.\-@/:\+]{0,32}\)#\s$"),
    )?;

    Ok(PlatformDefinition::new("cisco_asa", prompts)
        .with_on_open_command("terminal pager 0")
        .with_timeout(Duration::from_secs(5))
        .with_insecure_host_key(true)
        .with_escalate_command("enable"))
}

/// Cisco Small Business switches.
///
/// These are slow to render large outputs, hence the long timeout.
pub fn smb() -> Result<PlatformDefinition, PlatformError> {
    let prompts = PromptSet::new(
        r"(?im)[a-z0-9.\-_@()/:]{1,63}>$",
        r"(?im)[a-z0-9.\-_@()/:]{1,63}#$",
        Some(r"(?im)[a-z0-9.\-_@/:]{1,63}\([a-z0-9.\-@/:\+]{0,32}\)#$"),
    )?;

    Ok(PlatformDefinition::new("cisco_smb", prompts)
        .with_on_open_command("terminal datadump")
        .with_on_open_command("terminal width 512")
        .with_timeout(Duration::from_secs(120))
        .with_insecure_host_key(true)
        .with_legacy_ciphers(true)
        .with_legacy_kex(true)
        .with_escalate_command("enable"))
}

/// Cisco AireOS wireless controllers.
pub fn aireos() -> Result<PlatformDefinition, PlatformError> {
    let prompts = PromptSet::single(
        r"(?im)^\([a-z0-9.\-_\s@()/:]{1,63}\)\s>$",
        Some(r"(?im)^\([a-z0-9.\-_\s@()/:]{1,63}\)\sconfig>$"),
    )?;

    Ok(PlatformDefinition::new("cisco_aireos", prompts)
        .with_on_open_command("config paging disable")
        .with_timeout(Duration::from_secs(5))
        .with_insecure_host_key(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ios_prompts() {
        let platform = ios().unwrap();
        let prompts = &platform.prompts;

        assert!(prompts.any.is_match(b"\r\nrouter>"));
        assert!(prompts.at_privileged("\r\nrouter#"));
        assert!(!prompts.at_privileged("\r\nrouter>"));
        assert!(!prompts.at_privileged("router#\r\ninterface Gi0/1\r\n"));
        let config = prompts.config.as_ref().unwrap();
        assert!(config.is_match(b"\r\nrouter(config-if)#"));
        assert!(platform.connection.legacy_ciphers);
        assert!(!platform.connection.legacy_kex);
    }

    #[test]
    fn test_iosxr_prompt() {
        let platform = iosxr().unwrap();
        assert!(platform.prompts.at_privileged("\r\nRP/0/RSP0/CPU0:xr#"));
        assert!(!platform.prompts.has_privilege_levels());
        assert_eq!(
            platform.on_open_commands,
            ["terminal length 0", "terminal width 0"]
        );
    }

    #[test]
    fn test_asa_prompt_needs_trailing_space() {
        let platform = asa().unwrap();
        assert!(platform.prompts.at_privileged("\r\nfw/admin# "));
        assert!(!platform.prompts.at_privileged("\r\nfw/admin#"));
        assert!(platform.prompts.user.is_match(b"\r\nfw> "));
    }

    #[test]
    fn test_nxos_definition() {
        let platform = nxos().unwrap();
        assert_eq!(platform.timeout, Duration::from_secs(5));
        assert!(platform.prompts.at_privileged("\r\nnexus1# "));
    }

    #[test]
    fn test_smb_is_legacy() {
        let platform = smb().unwrap();
        assert!(platform.connection.legacy_ciphers);
        assert!(platform.connection.legacy_kex);
        assert_eq!(platform.timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_aireos_prompt() {
        let platform = aireos().unwrap();
        assert!(platform.prompts.at_privileged("\r\n(Cisco Controller) >"));
        let config = platform.prompts.config.as_ref().unwrap();
        assert!(config.is_match(b"\r\n(Cisco Controller) config>"));
    }
}
