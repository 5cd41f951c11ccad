//! Transport layer: SSH and Telnet sessions to devices.
//!
//! This module provides connection setup, authentication and shell
//! creation, and hands the runner a [`Session`] whose byte stream looks the
//! same regardless of protocol.

pub mod config;
mod ssh;
pub mod telnet;

use std::future::Future;

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

pub use config::{
    ConnectionDefaults, ConnectionOverrides, ConnectionParams, Credentials, HostKeyVerification,
    Protocol, SshConfig,
};
pub use ssh::SshTransport;
pub use telnet::TelnetStream;

use crate::channel::{PtyChannel, PtyConfig};
use crate::driver::Device;
use crate::error::Result;

/// An open, authenticated interactive session.
pub struct Session {
    channel: PtyChannel,
    ssh: Option<SshTransport>,
    login_output: Option<String>,
}

impl Session {
    /// Session over a stream that needs no transport-level teardown.
    pub fn new(channel: PtyChannel) -> Self {
        Self {
            channel,
            ssh: None,
            login_output: None,
        }
    }

    /// Session over an SSH shell channel.
    pub fn ssh(channel: PtyChannel, transport: SshTransport) -> Self {
        Self {
            channel,
            ssh: Some(transport),
            login_output: None,
        }
    }

    /// Record output that login already consumed, up to and including the
    /// first prompt.
    pub fn with_login_output(mut self, output: String) -> Self {
        self.login_output = Some(output);
        self
    }

    /// The expect channel.
    pub fn channel_mut(&mut self) -> &mut PtyChannel {
        &mut self.channel
    }

    /// Take the output consumed during login, if the transport logged in
    /// interactively.
    pub fn take_login_output(&mut self) -> Option<String> {
        self.login_output.take()
    }

    /// Close the channel and the underlying connection.
    pub async fn disconnect(mut self) -> Result<()> {
        let shutdown = self.channel.shutdown().await;
        if let Some(ssh) = self.ssh.take() {
            ssh.close().await?;
        }
        shutdown
    }
}

/// Opens sessions to devices.
///
/// The runner only talks to devices through this seam, so tests can swap in
/// scripted devices.
pub trait Connector: Send + Sync + 'static {
    /// Dial, authenticate and open an interactive shell on `device`.
    fn connect(
        &self,
        device: &Device,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Session>> + Send;
}

/// Connector that reaches real devices over SSH or Telnet.
#[derive(Debug, Clone, Default)]
pub struct NetworkConnector {
    pty: PtyConfig,
}

impl NetworkConnector {
    /// Create a connector whose channels use `pty` (the line ending is
    /// chosen per protocol).
    pub fn new(pty: PtyConfig) -> Self {
        Self { pty }
    }

    fn pty_config(&self, protocol: Protocol) -> PtyConfig {
        PtyConfig {
            line_ending: protocol.line_ending(),
            ..self.pty.clone()
        }
    }

    async fn connect_ssh(&self, device: &Device) -> Result<Session> {
        let params = &device.params;
        let config = SshConfig {
            host: device.address.clone(),
            port: params.port,
            timeout: params.connect_timeout,
            terminal_width: device.platform.terminal_width,
            terminal_height: device.platform.terminal_height,
            host_key_verification: params.host_key_verification,
            known_hosts_path: params.known_hosts_path.clone(),
            legacy_ciphers: params.legacy_ciphers,
            legacy_kex: params.legacy_kex,
        };

        let transport = SshTransport::connect(config, &device.credentials).await?;
        let stream = match transport.open_shell().await {
            Ok(stream) => stream,
            Err(e) => {
                if let Err(close_err) = transport.close().await {
                    warn!("{}: close after shell failure: {}", device.name, close_err);
                }
                return Err(e);
            }
        };

        let channel = PtyChannel::new(Box::new(stream), self.pty_config(Protocol::Ssh));
        Ok(Session::ssh(channel, transport))
    }

    async fn connect_telnet(&self, device: &Device, cancel: &CancellationToken) -> Result<Session> {
        let params = &device.params;
        let stream = telnet::connect(&device.address, params.port, params.connect_timeout).await?;
        let mut channel = PtyChannel::new(Box::new(stream), self.pty_config(Protocol::Telnet));

        let login = telnet::login(
            &mut channel,
            &device.credentials,
            device.platform.prompts.sources(),
            params.connect_timeout,
            cancel,
        )
        .await;

        match login {
            Ok(output) => Ok(Session::new(channel).with_login_output(output)),
            Err(e) => {
                let _ = channel.shutdown().await;
                Err(e)
            }
        }
    }
}

impl Connector for NetworkConnector {
    async fn connect(&self, device: &Device, cancel: &CancellationToken) -> Result<Session> {
        debug!(
            "{}: connecting to {}:{} over {:?}",
            device.name, device.address, device.params.port, device.params.protocol
        );
        match device.params.protocol {
            Protocol::Ssh => self.connect_ssh(device).await,
            Protocol::Telnet => self.connect_telnet(device, cancel).await,
        }
    }
}
