//! Telnet transport: plain TCP with option negotiation filtered out of the
//! data stream.
//!
//! Every option the server asks us to enable is refused. The server's own
//! offers to echo and to suppress go-ahead are accepted, since that is what
//! an interactive CLI expects; any other offer is declined.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use super::config::Credentials;
use crate::channel::{CompletionPattern, PtyChannel, combine_prompt_patterns};
use crate::error::{Result, TransportError};

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

const OPT_ECHO: u8 = 1;
const OPT_SGA: u8 = 3;

/// Largest raw read per poll.
const RAW_CHUNK: usize = 4096;

/// Username challenge printed by the device.
const USERNAME_CHALLENGE: &str = r"(?im)^(?:user(?: ?name)?|login):\s*$";

/// Password challenge printed by the device.
const PASSWORD_CHALLENGE: &str = r"(?im)^password:\s*$";

/// Banner printed after rejected credentials.
const LOGIN_FAILED: &str = r"(?im)^%?\s*(?:authentication failed|login invalid|login incorrect)[^\n]*\s*$";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Data,
    Iac,
    Negotiate(u8),
    Subnegotiation,
    SubnegotiationIac,
}

/// A byte stream with Telnet negotiation stripped from reads and IAC bytes
/// escaped on writes.
pub struct TelnetStream<S> {
    inner: S,
    state: ParseState,
    /// Negotiation replies and escaped writes not yet sent.
    pending: Vec<u8>,
    /// Remote options we have already agreed to.
    accepted: [bool; 256],
}

impl<S> TelnetStream<S> {
    /// Wrap a raw stream.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            state: ParseState::Data,
            pending: Vec::new(),
            accepted: [false; 256],
        }
    }

    /// Run `raw` through the protocol parser, appending data bytes to `out`.
    fn filter(&mut self, raw: &[u8], out: &mut ReadBuf<'_>) {
        for &byte in raw {
            self.state = match (self.state, byte) {
                (ParseState::Data, IAC) => ParseState::Iac,
                // Telnet sends a bare CR as CR NUL.
                (ParseState::Data, 0) => ParseState::Data,
                (ParseState::Data, b) => {
                    out.put_slice(&[b]);
                    ParseState::Data
                }
                (ParseState::Iac, IAC) => {
                    out.put_slice(&[IAC]);
                    ParseState::Data
                }
                (ParseState::Iac, cmd @ (DO | DONT | WILL | WONT)) => ParseState::Negotiate(cmd),
                (ParseState::Iac, SB) => ParseState::Subnegotiation,
                // NOP, GA, AYT and friends carry no data.
                (ParseState::Iac, _) => ParseState::Data,
                (ParseState::Negotiate(cmd), option) => {
                    self.negotiate(cmd, option);
                    ParseState::Data
                }
                (ParseState::Subnegotiation, IAC) => ParseState::SubnegotiationIac,
                (ParseState::Subnegotiation, _) => ParseState::Subnegotiation,
                (ParseState::SubnegotiationIac, SE) => ParseState::Data,
                (ParseState::SubnegotiationIac, _) => ParseState::Subnegotiation,
            };
        }
    }

    fn negotiate(&mut self, cmd: u8, option: u8) {
        trace!("telnet negotiation {} {}", cmd, option);
        let reply = match cmd {
            DO => Some(WONT),
            WILL if matches!(option, OPT_ECHO | OPT_SGA) => {
                if self.accepted[option as usize] {
                    None
                } else {
                    self.accepted[option as usize] = true;
                    Some(DO)
                }
            }
            WILL => Some(DONT),
            WONT => {
                self.accepted[option as usize] = false;
                None
            }
            _ => None,
        };
        if let Some(reply) = reply {
            self.pending.extend_from_slice(&[IAC, reply, option]);
        }
    }
}

impl<S: AsyncWrite + Unpin> TelnetStream<S> {
    /// Write out everything in `pending`.
    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while !self.pending.is_empty() {
            let n = ready!(Pin::new(&mut self.inner).poll_write(cx, &self.pending))?;
            if n == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            self.pending.drain(..n);
        }
        Poll::Ready(Ok(()))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> AsyncRead for TelnetStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            // Negotiation replies go out as soon as the socket takes them.
            if let Poll::Ready(Err(e)) = this.poll_drain(cx) {
                return Poll::Ready(Err(e));
            }

            let cap = buf.remaining().min(RAW_CHUNK);
            if cap == 0 {
                return Poll::Ready(Ok(()));
            }

            let mut raw = [0u8; RAW_CHUNK];
            let mut raw_buf = ReadBuf::new(&mut raw[..cap]);
            ready!(Pin::new(&mut this.inner).poll_read(cx, &mut raw_buf))?;
            if raw_buf.filled().is_empty() {
                return Poll::Ready(Ok(()));
            }

            let before = buf.filled().len();
            this.filter(raw_buf.filled(), buf);
            if buf.filled().len() > before {
                return Poll::Ready(Ok(()));
            }
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for TelnetStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;

        if !buf.contains(&IAC) {
            return Pin::new(&mut this.inner).poll_write(cx, buf);
        }

        for &byte in buf {
            this.pending.push(byte);
            if byte == IAC {
                this.pending.push(IAC);
            }
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_shutdown(cx)
    }
}

/// Open a TCP connection to a Telnet service.
pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<TelnetStream<TcpStream>> {
    debug!("dialing {}:{} (telnet)", host, port);
    let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| TransportError::Timeout(timeout))?
        .map_err(|source| TransportError::ConnectionFailed {
            host: host.to_string(),
            port,
            source,
        })?;
    stream.set_nodelay(true).map_err(TransportError::Io)?;
    Ok(TelnetStream::new(stream))
}

/// Log in over an interactive Telnet session.
///
/// Answers the username and password challenges, then waits until the
/// device shows one of `prompts`. Returns the output received after the
/// password, ending with the prompt.
pub async fn login<'a>(
    channel: &mut PtyChannel,
    credentials: &Credentials,
    prompts: impl IntoIterator<Item = &'a str>,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<String> {
    let user = credentials.username.as_str();
    let Some(password) = credentials.password() else {
        return Err(TransportError::MissingCredentials {
            user: user.to_string(),
        }
        .into());
    };

    let prompt_sources: Vec<&str> = prompts.into_iter().collect();
    let prompt = CompletionPattern::from(combine_prompt_patterns(prompt_sources.iter().copied())?);
    let outcome = CompletionPattern::from(combine_prompt_patterns(
        prompt_sources
            .iter()
            .copied()
            .chain([USERNAME_CHALLENGE, LOGIN_FAILED]),
    )?);

    channel
        .read_until(&CompletionPattern::new(USERNAME_CHALLENGE)?, timeout, cancel)
        .await?;
    channel.send(user).await?;

    channel
        .read_until(&CompletionPattern::new(PASSWORD_CHALLENGE)?, timeout, cancel)
        .await?;
    channel.send_hidden(password).await?;

    let reply = channel.read_until(&outcome, timeout, cancel).await?;
    if !prompt.is_match(reply.as_bytes()) {
        debug!("telnet login for {} rejected", user);
        return Err(TransportError::AuthenticationFailed {
            user: user.to_string(),
        }
        .into());
    }

    Ok(reply)
}
