//! Per-command and per-device result types.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Output of one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    /// The command as submitted.
    pub command: String,

    /// Key-safe form of the command (`show_version`), usable as a map key
    /// or file name fragment.
    #[serde(skip)]
    pub key: String,

    /// Captured output with the echoed command and the prompt line removed.
    pub output: String,

    /// Time from write to prompt.
    #[serde(skip)]
    pub elapsed: Duration,
}

/// The outcome of one device's run. Exactly one is produced per device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceResult {
    /// Device name from the inventory.
    pub device: String,

    /// Whether every command completed.
    pub ok: bool,

    /// Human-readable cause of failure; empty on success.
    pub error: String,

    /// Unix timestamp (seconds) of completion.
    pub timestamp: u64,

    /// Outputs of the commands that completed, in submission order.
    pub command_outputs: Vec<CommandOutput>,
}

impl DeviceResult {
    /// A successful result.
    pub fn success(device: impl Into<String>, command_outputs: Vec<CommandOutput>) -> Self {
        Self {
            device: device.into(),
            ok: true,
            error: String::new(),
            timestamp: unix_now(),
            command_outputs,
        }
    }

    /// A failed result keeping whatever completed before `error`.
    pub fn failure(
        device: impl Into<String>,
        error: impl fmt::Display,
        command_outputs: Vec<CommandOutput>,
    ) -> Self {
        Self {
            device: device.into(),
            ok: false,
            error: error.to_string(),
            timestamp: unix_now(),
            command_outputs,
        }
    }

    /// Failed after at least one command completed.
    pub fn is_partial(&self) -> bool {
        !self.ok && !self.command_outputs.is_empty()
    }

    /// Look up a command's output by command key.
    pub fn output_for(&self, key: &str) -> Option<&str> {
        self.command_outputs
            .iter()
            .find(|c| c.key == key)
            .map(|c| c.output.as_str())
    }
}

impl fmt::Display for DeviceResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ok {
            write!(f, "{}: ok ({} commands)", self.device, self.command_outputs.len())
        } else {
            write!(
                f,
                "{}: failed after {} commands: {}",
                self.device,
                self.command_outputs.len(),
                self.error
            )
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
