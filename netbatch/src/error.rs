//! Error types for netbatch.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for netbatch operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level errors (dial, authentication, negotiation)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Expect/channel errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Driver-level errors
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Platform/vendor errors
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

impl Error {
    /// Whether this error is an expect timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Channel(ChannelError::PatternTimeout(_)))
    }

    /// Whether this error was caused by job cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Channel(ChannelError::Cancelled))
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Channel(ChannelError::InvalidPattern(err))
    }
}

/// Transport layer errors (SSH/Telnet connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Neither a private key nor a password was supplied
    #[error("No private key or password supplied for user '{user}'")]
    MissingCredentials { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host is not present in known_hosts (strict checking)
    #[error("Host key for {host}:{port} not found in known_hosts")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key does not match the known_hosts entry
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// PTY or shell request was refused
    #[error("Failed to open interactive shell: {0}")]
    ShellRequestFailed(String),

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel layer errors (expect loop, pattern matching).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Completion pattern not seen in time
    #[error("Pattern not found within {0:?}")]
    PatternTimeout(Duration),

    /// Remote end closed the stream
    #[error("Channel closed")]
    Closed,

    /// The job was cancelled while waiting
    #[error("Cancelled")]
    Cancelled,

    /// Read or write failure on the stream
    #[error("Channel I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Driver layer errors (device resolution, runner state).
#[derive(Error, Debug)]
pub enum DriverError {
    /// Invalid device or job configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Platform/vendor definition errors.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// No driver entry for the device's vendor/platform key
    #[error("Device '{device}' uses unsupported vendor/platform '{key}'")]
    UnsupportedPlatform { device: String, key: String },

    /// Invalid platform definition
    #[error("Invalid platform definition: {message}")]
    InvalidDefinition { message: String },

    /// A platform with this key is already registered
    #[error("Platform '{name}' is already registered")]
    AlreadyRegistered { name: String },
}

impl From<regex::Error> for PlatformError {
    fn from(err: regex::Error) -> Self {
        PlatformError::InvalidDefinition {
            message: err.to_string(),
        }
    }
}

/// Result type alias using netbatch's Error.
pub type Result<T> = std::result::Result<T, Error>;
