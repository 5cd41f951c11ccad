//! SSH transport implementation using russh.

use std::borrow::Cow;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use russh::{ChannelStream, Preferred, cipher, kex};

use super::config::{Credentials, HostKeyVerification, SshConfig};
use crate::error::{Result, TransportError};

/// Key exchange algorithms offered in addition to the defaults when a device
/// needs legacy key exchange.
const LEGACY_KEX: &[kex::Name] = &[
    kex::DH_GEX_SHA256,
    kex::DH_GEX_SHA1,
    kex::DH_G1_SHA1,
    kex::DH_G14_SHA1,
];

/// Ciphers offered in addition to the defaults when a device needs legacy
/// ciphers.
const LEGACY_CIPHERS: &[cipher::Name] = &[
    cipher::AES_128_CTR,
    cipher::AES_192_CTR,
    cipher::AES_256_CTR,
    cipher::AES_128_CBC,
    cipher::AES_192_CBC,
    cipher::AES_256_CBC,
];

/// SSH transport wrapping russh client.
pub struct SshTransport {
    /// The russh session handle.
    session: Handle<SshHandler>,

    /// Configuration used for this connection.
    config: SshConfig,
}

impl SshTransport {
    /// Connect to the SSH server and authenticate.
    ///
    /// The dial, key exchange and authentication together are bounded by
    /// `config.timeout`.
    pub async fn connect(config: SshConfig, credentials: &Credentials) -> Result<Self> {
        let timeout = config.timeout;
        within(timeout, Self::establish(config, credentials)).await
    }

    async fn establish(config: SshConfig, credentials: &Credentials) -> Result<Self> {
        let ssh_config = Arc::new(client::Config {
            preferred: negotiated_algorithms(&config),
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            host_key_verification: config.host_key_verification,
            known_hosts_path: config.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        debug!("dialing {}", config.socket_addr());
        let mut session = client::connect(ssh_config, (config.host.as_str(), config.port), handler)
            .await
            .map_err(|e| {
                // Prefer the detailed host key error recorded by the handler
                // over russh's generic UnknownKey.
                if let Some(hk_err) = host_key_error.lock().ok().and_then(|mut slot| slot.take()) {
                    return hk_err;
                }
                match e {
                    russh::Error::IO(source) => TransportError::ConnectionFailed {
                        host: config.host.clone(),
                        port: config.port,
                        source,
                    },
                    other => TransportError::Ssh(other),
                }
            })?;

        if let Err(e) = Self::authenticate(&mut session, credentials).await {
            let _ = session
                .disconnect(russh::Disconnect::ByApplication, "", "en")
                .await;
            return Err(e);
        }

        Ok(Self { session, config })
    }

    /// Open a PTY session channel, start the remote shell and return it as a
    /// byte stream.
    ///
    /// Bounded by the connect timeout; a server that never confirms the
    /// channel fails with [`TransportError::Timeout`].
    pub async fn open_shell(&self) -> Result<ChannelStream<Msg>> {
        within(self.config.timeout, self.request_shell()).await
    }

    async fn request_shell(&self) -> Result<ChannelStream<Msg>> {
        let channel = self
            .session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_pty(
                true,
                "xterm",
                self.config.terminal_width,
                self.config.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(|e| TransportError::ShellRequestFailed(e.to_string()))?;

        channel
            .request_shell(true)
            .await
            .map_err(|e| TransportError::ShellRequestFailed(e.to_string()))?;

        Ok(channel.into_stream())
    }

    /// Authenticate with the server: private key first, then password.
    async fn authenticate(session: &mut Handle<SshHandler>, credentials: &Credentials) -> Result<()> {
        let user = credentials.username.as_str();
        let password = credentials.password();

        if credentials.private_key.is_none() && password.is_none() {
            return Err(TransportError::MissingCredentials {
                user: user.to_string(),
            }
            .into());
        }

        if let Some(path) = &credentials.private_key {
            match load_secret_key(path, None) {
                Ok(key) => {
                    // Get the best RSA hash algorithm supported by the server
                    let hash_alg = session
                        .best_supported_rsa_hash()
                        .await
                        .map_err(TransportError::Ssh)?
                        .flatten();

                    let accepted = session
                        .authenticate_publickey(
                            user,
                            PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                        )
                        .await
                        .map_err(TransportError::Ssh)?
                        .success();
                    if accepted {
                        return Ok(());
                    }
                    debug!("public key for {} rejected", user);
                }
                Err(e) if password.is_some() => {
                    warn!("cannot load key {}: {}; trying password", path.display(), e);
                }
                Err(e) => return Err(TransportError::Key(e.to_string()).into()),
            }
        }

        if let Some(password) = password {
            let accepted = session
                .authenticate_password(user, password)
                .await
                .map_err(TransportError::Ssh)?
                .success();
            if accepted {
                return Ok(());
            }
        }

        Err(TransportError::AuthenticationFailed {
            user: user.to_string(),
        }
        .into())
    }

    /// Close the connection.
    pub async fn close(self) -> Result<()> {
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }
}

/// Algorithm preferences for the handshake. Legacy sets are appended to the
/// defaults, never replacing them.
fn negotiated_algorithms(config: &SshConfig) -> Preferred {
    let mut preferred = Preferred::default();
    if config.legacy_kex {
        preferred.kex = Cow::Owned(append_missing(&preferred.kex, LEGACY_KEX));
    }
    if config.legacy_ciphers {
        preferred.cipher = Cow::Owned(append_missing(&preferred.cipher, LEGACY_CIPHERS));
    }
    preferred
}

/// Bound one connection setup step by `timeout`.
async fn within<T>(timeout: Duration, step: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(timeout, step)
        .await
        .map_err(|_| TransportError::Timeout(timeout))?
}

fn append_missing<T: Clone + PartialEq>(base: &[T], extra: &[T]) -> Vec<T> {
    let mut merged = base.to_vec();
    for item in extra {
        if !merged.contains(item) {
            merged.push(item.clone());
        }
    }
    merged
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Stores a detailed host-key error so connect() can surface it
    /// instead of the generic russh::Error::UnknownKey.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Check the host key against known_hosts.
    ///
    /// Returns `Ok(true)` if matched, `Ok(false)` if host not found,
    /// `Err(TransportError::HostKeyChanged)` if key changed.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> std::result::Result<bool, TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::check_known_hosts(&self.host, self.port, pubkey)
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    /// Save a new host key to known_hosts.
    fn learn_host_key(&self, pubkey: &PublicKey) -> std::result::Result<(), TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey)
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    /// Record why the key was rejected and reject it.
    fn reject(&self, error: TransportError) -> bool {
        if let Ok(mut slot) = self.host_key_error.lock() {
            *slot = Some(error);
        }
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match self.host_key_verification {
            HostKeyVerification::Disabled => Ok(true),

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => {
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key for {}: {}", self.host, e);
                    }
                    Ok(true)
                }
                Err(e) => Ok(self.reject(e)),
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => Ok(self.reject(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                })),
                Err(e) => Ok(self.reject(e)),
            },
        }
    }
}
