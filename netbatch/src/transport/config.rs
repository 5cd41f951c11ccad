//! Connection configuration: credentials, protocol and per-device parameters.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Default SSH port.
pub const SSH_PORT: u16 = 22;

/// Default Telnet port.
pub const TELNET_PORT: u16 = 23;

/// Wire protocol used to reach a device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Ssh,
    Telnet,
}

impl Protocol {
    /// Well-known port for the protocol.
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Ssh => SSH_PORT,
            Protocol::Telnet => TELNET_PORT,
        }
    }

    /// Line terminator written after each command.
    pub fn line_ending(self) -> &'static str {
        match self {
            Protocol::Ssh => "\r",
            Protocol::Telnet => "\n",
        }
    }
}

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys. Connection fails if the host
    /// is not already in known_hosts.
    #[default]
    Strict,

    /// Accept and auto-learn unknown keys, but reject changed keys.
    AcceptNew,

    /// Accept all keys without checking.
    ///
    /// Insecure; exists for legacy gear with self-signed or ephemeral keys.
    Disabled,
}

/// Login credentials, resolved once per run.
#[derive(Debug)]
pub struct Credentials {
    /// Username for authentication.
    pub username: String,

    password: Option<SecretString>,

    /// Path to a private key file; preferred over the password for SSH.
    pub private_key: Option<PathBuf>,

    enable_password: Option<SecretString>,
}

impl Credentials {
    /// Create credentials for `username` with no secrets attached yet.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: None,
            private_key: None,
            enable_password: None,
        }
    }

    /// Set the login password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Set the private key file.
    pub fn with_private_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.private_key = Some(path.into());
        self
    }

    /// Set the privileged (enable) password.
    pub fn with_enable_password(mut self, password: impl Into<String>) -> Self {
        self.enable_password = Some(SecretString::from(password.into()));
        self
    }

    /// The login password, if any.
    pub fn password(&self) -> Option<&str> {
        self.password.as_ref().map(|p| p.expose_secret())
    }

    /// The enable password, if any.
    pub fn enable_password(&self) -> Option<&str> {
        self.enable_password.as_ref().map(|p| p.expose_secret())
    }
}

/// Driver-supplied connection defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionDefaults {
    /// Skip host key verification.
    pub insecure_host_key: bool,

    /// Offer legacy ciphers (CBC/CTR modes required by old firmware).
    pub legacy_ciphers: bool,

    /// Offer legacy key exchange algorithms (SHA-1 Diffie-Hellman groups).
    pub legacy_kex: bool,
}

impl Default for ConnectionDefaults {
    fn default() -> Self {
        Self {
            insecure_host_key: false,
            legacy_ciphers: false,
            legacy_kex: false,
        }
    }
}

/// Per-device overrides from the inventory. Unset fields fall back to the
/// driver defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConnectionOverrides {
    pub port: Option<u16>,
    pub insecure_host_key: Option<bool>,
    pub host_key_verification: Option<HostKeyVerification>,
    pub legacy_ciphers: Option<bool>,
    pub legacy_kex: Option<bool>,
    pub known_hosts: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

/// Fully resolved connection parameters for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Wire protocol.
    pub protocol: Protocol,

    /// TCP port.
    pub port: u16,

    /// Host key verification mode (SSH only).
    pub host_key_verification: HostKeyVerification,

    /// Offer legacy ciphers (SSH only).
    pub legacy_ciphers: bool,

    /// Offer legacy key exchange algorithms (SSH only).
    pub legacy_kex: bool,

    /// Path to known_hosts; `None` uses `~/.ssh/known_hosts`.
    pub known_hosts_path: Option<PathBuf>,

    /// Dial and authentication timeout.
    pub connect_timeout: Duration,
}

impl ConnectionParams {
    /// Merge driver defaults with per-device overrides.
    pub fn resolve(
        protocol: Protocol,
        defaults: &ConnectionDefaults,
        overrides: &ConnectionOverrides,
        connect_timeout: Duration,
    ) -> Self {
        let host_key_verification = match overrides.host_key_verification {
            Some(mode) => mode,
            None if overrides
                .insecure_host_key
                .unwrap_or(defaults.insecure_host_key) =>
            {
                HostKeyVerification::Disabled
            }
            None => HostKeyVerification::Strict,
        };

        Self {
            protocol,
            port: overrides.port.unwrap_or(protocol.default_port()),
            host_key_verification,
            legacy_ciphers: overrides.legacy_ciphers.unwrap_or(defaults.legacy_ciphers),
            legacy_kex: overrides.legacy_kex.unwrap_or(defaults.legacy_kex),
            known_hosts_path: overrides.known_hosts.clone(),
            connect_timeout,
        }
    }
}

/// SSH connection configuration.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Target host (hostname or IP address).
    pub host: String,

    /// SSH port (default: 22).
    pub port: u16,

    /// Connection and authentication timeout.
    pub timeout: Duration,

    /// Terminal width for PTY.
    pub terminal_width: u32,

    /// Terminal height for PTY.
    pub terminal_height: u32,

    /// Host key verification mode.
    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file.
    pub known_hosts_path: Option<PathBuf>,

    /// Append legacy ciphers to the negotiated set.
    pub legacy_ciphers: bool,

    /// Append legacy key exchange algorithms to the negotiated set.
    pub legacy_kex: bool,
}

impl SshConfig {
    /// Get the socket address for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_without_overrides() {
        let defaults = ConnectionDefaults {
            insecure_host_key: true,
            legacy_ciphers: true,
            legacy_kex: false,
        };
        let params = ConnectionParams::resolve(
            Protocol::Ssh,
            &defaults,
            &ConnectionOverrides::default(),
            Duration::from_secs(10),
        );

        assert_eq!(params.port, 22);
        assert_eq!(params.host_key_verification, HostKeyVerification::Disabled);
        assert!(params.legacy_ciphers);
        assert!(!params.legacy_kex);
    }

    #[test]
    fn test_overrides_win() {
        let defaults = ConnectionDefaults {
            insecure_host_key: true,
            legacy_ciphers: true,
            legacy_kex: true,
        };
        let overrides = ConnectionOverrides {
            port: Some(2222),
            insecure_host_key: Some(false),
            legacy_kex: Some(false),
            known_hosts: Some(PathBuf::from("/tmp/known_hosts")),
            ..Default::default()
        };
        let params = ConnectionParams::resolve(
            Protocol::Ssh,
            &defaults,
            &overrides,
            Duration::from_secs(10),
        );

        assert_eq!(params.port, 2222);
        assert_eq!(params.host_key_verification, HostKeyVerification::Strict);
        assert!(params.legacy_ciphers);
        assert!(!params.legacy_kex);
        assert_eq!(
            params.known_hosts_path,
            Some(PathBuf::from("/tmp/known_hosts"))
        );
    }

    #[test]
    fn test_explicit_host_key_mode() {
        let overrides = ConnectionOverrides {
            host_key_verification: Some(HostKeyVerification::AcceptNew),
            insecure_host_key: Some(true),
            ..Default::default()
        };
        let params = ConnectionParams::resolve(
            Protocol::Ssh,
            &ConnectionDefaults::default(),
            &overrides,
            Duration::from_secs(10),
        );
        assert_eq!(params.host_key_verification, HostKeyVerification::AcceptNew);
    }

    #[test]
    fn test_telnet_port_default() {
        let params = ConnectionParams::resolve(
            Protocol::Telnet,
            &ConnectionDefaults::default(),
            &ConnectionOverrides::default(),
            Duration::from_secs(10),
        );
        assert_eq!(params.port, 23);
        assert_eq!(params.protocol.line_ending(), "\n");
    }

    #[test]
    fn test_credentials_keep_secrets() {
        let creds = Credentials::new("admin")
            .with_password("secret")
            .with_enable_password("enable-secret");
        assert_eq!(creds.password(), Some("secret"));
        assert_eq!(creds.enable_password(), Some("enable-secret"));

        let debug = format!("{creds:?}");
        assert!(!debug.contains("secret\""));
        assert!(!debug.contains("enable-secret"));
    }

    #[test]
    fn test_overrides_deserialize() {
        let overrides: ConnectionOverrides = serde_json::from_str(
            r#"{"port": 830, "host_key_verification": "accept_new", "legacy_kex": true}"#,
        )
        .unwrap();
        assert_eq!(overrides.port, Some(830));
        assert_eq!(
            overrides.host_key_verification,
            Some(HostKeyVerification::AcceptNew)
        );
        assert_eq!(overrides.legacy_kex, Some(true));
        assert_eq!(overrides.legacy_ciphers, None);
    }
}
