//! Platform definition for vendor-specific configurations.

use std::time::Duration;

use super::prompts::PromptSet;
use crate::transport::ConnectionDefaults;

/// Everything the runner needs to know about one vendor/platform.
#[derive(Debug, Clone)]
pub struct PlatformDefinition {
    /// Registry key, `<vendor>_<platform>` (e.g. "cisco_ios").
    pub name: String,

    /// Prompt patterns.
    pub prompts: PromptSet,

    /// Commands run after login, before the job's commands (paging off,
    /// terminal width).
    pub on_open_commands: Vec<String>,

    /// Per-command response timeout.
    pub timeout: Duration,

    /// Connection defaults, overridable per device.
    pub connection: ConnectionDefaults,

    /// Command that moves from the user prompt to the privileged prompt.
    pub escalate_command: Option<String>,

    /// Terminal width for PTY.
    pub terminal_width: u32,

    /// Terminal height for PTY.
    pub terminal_height: u32,
}

impl PlatformDefinition {
    /// Create a new platform definition with minimal required fields.
    pub fn new(name: impl Into<String>, prompts: PromptSet) -> Self {
        Self {
            name: name.into(),
            prompts,
            on_open_commands: vec![],
            timeout: Duration::from_secs(2),
            connection: ConnectionDefaults::default(),
            escalate_command: None,
            terminal_width: 511,
            terminal_height: 24,
        }
    }

    /// Add an on_open command.
    pub fn with_on_open_command(mut self, command: impl Into<String>) -> Self {
        self.on_open_commands.push(command.into());
        self
    }

    /// Set the per-command timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Skip host key verification unless a device overrides it.
    pub fn with_insecure_host_key(mut self, insecure: bool) -> Self {
        self.connection.insecure_host_key = insecure;
        self
    }

    /// Offer legacy ciphers unless a device overrides it.
    pub fn with_legacy_ciphers(mut self, legacy: bool) -> Self {
        self.connection.legacy_ciphers = legacy;
        self
    }

    /// Offer legacy key exchange unless a device overrides it.
    pub fn with_legacy_kex(mut self, legacy: bool) -> Self {
        self.connection.legacy_kex = legacy;
        self
    }

    /// Set the escalation command.
    pub fn with_escalate_command(mut self, command: impl Into<String>) -> Self {
        self.escalate_command = Some(command.into());
        self
    }

    /// Set terminal dimensions.
    pub fn with_terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }
}
