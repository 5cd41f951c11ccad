//! Scripted devices and connectors for unit tests.

use std::collections::{HashMap, HashSet};
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf, duplex};
use tokio_util::sync::CancellationToken;

use crate::channel::{CompletionPattern, PtyChannel, PtyConfig};
use crate::driver::{Device, DeviceEntry};
use crate::error::{Result, TransportError};
use crate::platform::vendors::cisco;
use crate::transport::{Connector, Credentials, Session, telnet};

pub(crate) const IOS_PRIVILEGED: &str = r"(?im)^[a-z0-9.\-_@()/:]{1,63}#$";

pub(crate) fn ios_prompt() -> CompletionPattern {
    CompletionPattern::new(IOS_PRIVILEGED).unwrap()
}

pub(crate) fn commands(list: &[&str]) -> Vec<String> {
    list.iter().map(|c| c.to_string()).collect()
}

pub(crate) fn credentials() -> Arc<Credentials> {
    Arc::new(
        Credentials::new("admin")
            .with_password("secret")
            .with_enable_password("enable-secret"),
    )
}

/// A `cisco_ios` device named `name` with the default test credentials.
pub(crate) fn ios_device(name: &str) -> Device {
    ios_device_with(name, credentials())
}

pub(crate) fn ios_device_with(name: &str, credentials: Arc<Credentials>) -> Device {
    let platform = Arc::new(cisco::ios().unwrap());
    Device::resolve(
        DeviceEntry::new(name, "192.0.2.1", "cisco", "ios"),
        platform,
        credentials,
        Duration::from_secs(10),
    )
}

/// Lines a fake device received, in order.
#[derive(Debug, Clone, Default)]
pub(crate) struct CommandLog(Arc<Mutex<Vec<String>>>);

impl CommandLog {
    pub(crate) fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn push(&self, line: impl Into<String>) {
        self.0.lock().unwrap().push(line.into());
    }
}

/// A fake IOS-style CLI served over an in-memory pipe.
#[derive(Debug, Clone)]
pub(crate) struct FakeCli {
    hostname: String,
    responses: HashMap<String, String>,
    hang_on: HashSet<String>,
    delays: HashMap<String, Duration>,
    greeting_delay: Duration,
    enable_secret: Option<String>,
    login: Option<(String, String)>,
    log: CommandLog,
    closed: Arc<AtomicUsize>,
}

impl FakeCli {
    pub(crate) fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            responses: HashMap::new(),
            hang_on: HashSet::new(),
            delays: HashMap::new(),
            greeting_delay: Duration::ZERO,
            enable_secret: None,
            login: None,
            log: CommandLog::default(),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Answer `command` with `output`. Unknown commands produce no output.
    pub(crate) fn respond(mut self, command: &str, output: &str) -> Self {
        self.responses
            .insert(command.to_string(), output.to_string());
        self
    }

    /// Echo `command` but never return to the prompt.
    pub(crate) fn hang_on(mut self, command: &str) -> Self {
        self.hang_on.insert(command.to_string());
        self
    }

    /// Answer `command` only after `delay`.
    pub(crate) fn delay(mut self, command: &str, delay: Duration) -> Self {
        self.delays.insert(command.to_string(), delay);
        self
    }

    /// Print the first prompt only after `delay`.
    pub(crate) fn greet_after(mut self, delay: Duration) -> Self {
        self.greeting_delay = delay;
        self
    }

    /// Start at the user prompt; `enable` asks for `secret`.
    pub(crate) fn user_mode(mut self, secret: &str) -> Self {
        self.enable_secret = Some(secret.to_string());
        self
    }

    /// Require an interactive username/password login first.
    pub(crate) fn with_login(mut self, username: &str, password: &str) -> Self {
        self.login = Some((username.to_string(), password.to_string()));
        self
    }

    pub(crate) fn log(&self) -> CommandLog {
        self.log.clone()
    }

    /// Number of times a client closed its end.
    pub(crate) fn closed(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closed)
    }

    /// Start serving; returns the client end of the pipe.
    pub(crate) fn spawn(self) -> DuplexStream {
        let (client, server) = duplex(64 * 1024);
        tokio::spawn(self.serve(server));
        client
    }

    fn prompt(&self, privileged: bool) -> String {
        format!("{}{}", self.hostname, if privileged { '#' } else { '>' })
    }

    async fn serve(self, mut io: DuplexStream) {
        let mut lines = LineReader::default();

        if let Some((username, password)) = &self.login {
            loop {
                if io.write_all(b"\r\nUser Access Verification\r\n\r\nUsername: ").await.is_err() {
                    return;
                }
                let Some(user) = lines.next(&mut io).await else {
                    return self.hang_up();
                };
                let echo = format!("{user}\r\nPassword: ");
                if io.write_all(echo.as_bytes()).await.is_err() {
                    return;
                }
                let Some(pass) = lines.next(&mut io).await else {
                    return self.hang_up();
                };
                if &user == username && &pass == password {
                    break;
                }
                if io.write_all(b"\r\n% Authentication failed\r\n").await.is_err() {
                    return;
                }
            }
        }

        let mut privileged = self.enable_secret.is_none();
        if !self.greeting_delay.is_zero() {
            tokio::time::sleep(self.greeting_delay).await;
        }
        let greeting = format!("\r\n\r\n{}", self.prompt(privileged));
        if io.write_all(greeting.as_bytes()).await.is_err() {
            return;
        }

        let mut awaiting_secret = false;
        while let Some(line) = lines.next(&mut io).await {
            let reply = if awaiting_secret {
                awaiting_secret = false;
                self.log.push("<password>");
                if self.enable_secret.as_deref() == Some(line.as_str()) {
                    privileged = true;
                    format!("\r\n{}", self.prompt(privileged))
                } else {
                    format!("\r\n% Access denied\r\n\r\n{}", self.prompt(privileged))
                }
            } else {
                self.log.push(line.clone());
                if self.hang_on.contains(&line) {
                    format!("{line}\r\n")
                } else if line == "enable" && !privileged {
                    awaiting_secret = true;
                    "enable\r\nPassword: ".to_string()
                } else {
                    match self.responses.get(&line) {
                        Some(output) => format!("{line}\r\n{output}\r\n{}", self.prompt(privileged)),
                        None => format!("{line}\r\n{}", self.prompt(privileged)),
                    }
                }
            };
            if let Some(delay) = self.delays.get(&line) {
                tokio::time::sleep(*delay).await;
            }
            if io.write_all(reply.as_bytes()).await.is_err() {
                break;
            }
        }

        self.hang_up();
    }

    fn hang_up(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Splits client input into lines on CR or LF.
#[derive(Default)]
struct LineReader {
    pending: Vec<u8>,
}

impl LineReader {
    async fn next(&mut self, io: &mut DuplexStream) -> Option<String> {
        loop {
            if let Some(pos) = self.pending.iter().position(|b| matches!(b, b'\r' | b'\n')) {
                let line: Vec<u8> = self.pending.drain(..=pos).collect();
                return Some(String::from_utf8_lossy(&line[..pos]).trim().to_string());
            }
            let mut buf = [0u8; 1024];
            match io.read(&mut buf).await {
                Ok(0) | Err(_) => return None,
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
            }
        }
    }
}

/// Pipe whose shutdown never completes, like a peer that ignores close.
struct StuckOnClose(DuplexStream);

impl AsyncRead for StuckOnClose {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().0).poll_read(cx, buf)
    }
}

impl AsyncWrite for StuckOnClose {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().0).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().0).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Pending
    }
}

#[derive(Debug, Clone)]
enum Behavior {
    Cli(FakeCli),
    StuckOnClose(FakeCli),
    Telnet(FakeCli),
    Refuse,
    Stall,
    Panic,
}

/// Connector that hands out scripted devices by device name.
#[derive(Debug, Default)]
pub(crate) struct FakeConnector {
    behaviors: HashMap<String, Behavior>,
    attempts: Mutex<HashMap<String, usize>>,
}

impl FakeConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// SSH-like session straight to the CLI.
    pub(crate) fn cli(mut self, name: &str, cli: FakeCli) -> Self {
        self.behaviors.insert(name.to_string(), Behavior::Cli(cli));
        self
    }

    /// Session to the CLI whose close never finishes.
    pub(crate) fn stuck_on_close(mut self, name: &str, cli: FakeCli) -> Self {
        self.behaviors
            .insert(name.to_string(), Behavior::StuckOnClose(cli));
        self
    }

    /// Telnet-like session that logs in through the CLI's login exchange.
    pub(crate) fn telnet(mut self, name: &str, cli: FakeCli) -> Self {
        self.behaviors
            .insert(name.to_string(), Behavior::Telnet(cli));
        self
    }

    /// Connection refused.
    pub(crate) fn refuse(mut self, name: &str) -> Self {
        self.behaviors.insert(name.to_string(), Behavior::Refuse);
        self
    }

    /// Connection attempt that never completes.
    pub(crate) fn stall(mut self, name: &str) -> Self {
        self.behaviors.insert(name.to_string(), Behavior::Stall);
        self
    }

    /// Connection attempt that panics.
    pub(crate) fn panic(mut self, name: &str) -> Self {
        self.behaviors.insert(name.to_string(), Behavior::Panic);
        self
    }

    pub(crate) fn attempts(&self, name: &str) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .unwrap_or_default()
    }
}

impl Connector for FakeConnector {
    async fn connect(&self, device: &Device, cancel: &CancellationToken) -> Result<Session> {
        *self
            .attempts
            .lock()
            .unwrap()
            .entry(device.name.clone())
            .or_default() += 1;

        match self.behaviors.get(&device.name).cloned() {
            Some(Behavior::Cli(cli)) => {
                let channel = PtyChannel::new(Box::new(cli.spawn()), PtyConfig::default());
                Ok(Session::new(channel))
            }
            Some(Behavior::StuckOnClose(cli)) => {
                let stream = StuckOnClose(cli.spawn());
                let channel = PtyChannel::new(Box::new(stream), PtyConfig::default());
                Ok(Session::new(channel))
            }
            Some(Behavior::Telnet(cli)) => {
                let config = PtyConfig {
                    line_ending: "\n",
                    ..PtyConfig::default()
                };
                let mut channel = PtyChannel::new(Box::new(cli.spawn()), config);
                let output = telnet::login(
                    &mut channel,
                    &device.credentials,
                    device.platform.prompts.sources(),
                    device.params.connect_timeout,
                    cancel,
                )
                .await?;
                Ok(Session::new(channel).with_login_output(output))
            }
            Some(Behavior::Stall) => std::future::pending().await,
            Some(Behavior::Panic) => panic!("connector failure for {}", device.name),
            Some(Behavior::Refuse) | None => Err(TransportError::ConnectionFailed {
                host: device.address.clone(),
                port: device.params.port,
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            }
            .into()),
        }
    }
}
