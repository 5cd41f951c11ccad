//! Per-device command runner.
//!
//! Drives one device through
//! `Idle -> Connecting -> Initializing -> Executing -> Disconnecting -> Done`
//! and always produces exactly one [`DeviceResult`], whatever fails.

use std::fmt;
use std::time::Duration;

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use super::device::Device;
use super::response::{CommandOutput, DeviceResult};
use crate::channel::{CompletionPattern, combine_prompt_patterns};
use crate::error::{ChannelError, Error, Result};
use crate::transport::{Connector, Session};

/// Challenge printed after the escalation command.
const ENABLE_PASSWORD_CHALLENGE: &str = r"(?im)^password:\s*$";

/// Upper bound on closing a session.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a runner is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Connecting,
    Initializing,
    Executing,
    Disconnecting,
    Done,
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunnerState::Idle => "idle",
            RunnerState::Connecting => "connecting",
            RunnerState::Initializing => "initializing",
            RunnerState::Executing => "executing",
            RunnerState::Disconnecting => "disconnecting",
            RunnerState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Runs one command batch against one device.
pub struct CommandRunner<'a, C> {
    device: &'a Device,
    connector: &'a C,
    cancel: &'a CancellationToken,
    state: RunnerState,
}

impl<'a, C: Connector> CommandRunner<'a, C> {
    /// Create an idle runner.
    pub fn new(device: &'a Device, connector: &'a C, cancel: &'a CancellationToken) -> Self {
        Self {
            device,
            connector,
            cancel,
            state: RunnerState::Idle,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunnerState {
        self.state
    }

    fn transition(&mut self, next: RunnerState) {
        debug!("{}: {} -> {}", self.device.name, self.state, next);
        self.state = next;
    }

    /// Connect, initialize, run `commands` in order and disconnect.
    ///
    /// Stops at the first failing command, keeping the outputs gathered so
    /// far. A connection failure yields a failed result with no outputs.
    pub async fn run(&mut self, commands: &[String]) -> DeviceResult {
        let name = self.device.name.as_str();
        info!("{}: starting {} commands", name, commands.len());

        self.transition(RunnerState::Connecting);
        let connected = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ChannelError::Cancelled.into()),
            session = self.connector.connect(self.device, self.cancel) => session,
        };

        let mut session = match connected {
            Ok(session) => session,
            Err(e) => {
                warn!("{}: connection failed: {}", name, e);
                self.transition(RunnerState::Done);
                return DeviceResult::failure(name, e, Vec::new());
            }
        };

        self.transition(RunnerState::Initializing);
        self.initialize(&mut session).await;

        self.transition(RunnerState::Executing);
        let (outputs, failure) = self.execute(&mut session, commands).await;

        self.transition(RunnerState::Disconnecting);
        match tokio::time::timeout(DISCONNECT_TIMEOUT, session.disconnect()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("{}: disconnect: {}", name, e),
            Err(_) => warn!("{}: disconnect took longer than {:?}", name, DISCONNECT_TIMEOUT),
        }
        self.transition(RunnerState::Done);

        match failure {
            None => {
                info!("{}: completed {} commands", name, outputs.len());
                DeviceResult::success(name, outputs)
            }
            Some(e) => {
                warn!(
                    "{}: failed after {} of {} commands: {}",
                    name,
                    outputs.len(),
                    commands.len(),
                    e
                );
                DeviceResult::failure(name, e, outputs)
            }
        }
    }

    /// Sync on the first prompt, escalate if needed and run the driver's
    /// setup commands. Nothing here fails the device.
    async fn initialize(&self, session: &mut Session) {
        let device = self.device;
        let prompts = &device.platform.prompts;

        // Prompts the device still owes for reads that timed out.
        let mut owed = 0;

        let landing = match session.take_login_output() {
            Some(output) => Some(output),
            None => match session
                .channel_mut()
                .read_until(&prompts.any, device.timeout, self.cancel)
                .await
            {
                Ok(output) => Some(output),
                Err(e) => {
                    warn!("{}: no initial prompt: {}", device.name, e);
                    if e.is_timeout() {
                        owed += 1;
                    }
                    None
                }
            },
        };

        let at_user_prompt = landing
            .as_deref()
            .is_some_and(|output| prompts.has_privilege_levels() && !prompts.at_privileged(output));
        if at_user_prompt {
            if let Err(e) = self.escalate(session).await {
                warn!("{}: escalation failed: {}", device.name, e);
                if e.is_timeout() {
                    owed += 1;
                }
            }
        }

        for command in &device.platform.on_open_commands {
            if self.cancel.is_cancelled() {
                return;
            }
            if let Err(e) = session
                .channel_mut()
                .send_command(command, &prompts.privileged, device.timeout, self.cancel)
                .await
            {
                warn!("{}: setup command '{}' failed: {}", device.name, command, e);
                if e.is_timeout() {
                    owed += 1;
                }
            }
        }

        if owed > 0 && !self.cancel.is_cancelled() {
            self.resync(session, owed).await;
        }
    }

    /// Consume late replies so they are not read as batch output.
    ///
    /// The device answers every line with exactly one prompt. After one
    /// extra empty line the stream is back in step once `owed + 1` prompt
    /// lines have been read.
    async fn resync(&self, session: &mut Session, owed: usize) {
        let device = self.device;
        let prompts = &device.platform.prompts;
        let channel = session.channel_mut();

        debug!("{}: resyncing, {} replies outstanding", device.name, owed);
        if let Err(e) = channel.send("").await {
            warn!("{}: resync failed: {}", device.name, e);
            return;
        }

        let mut remaining = owed + 1;
        while remaining > 0 {
            match channel
                .read_until(&prompts.any, device.timeout, self.cancel)
                .await
            {
                Ok(output) => {
                    let seen = output
                        .lines()
                        .filter(|line| prompts.any.is_match(line.as_bytes()))
                        .count();
                    remaining = remaining.saturating_sub(seen.max(1));
                }
                Err(e) => {
                    warn!(
                        "{}: resync gave up with {} replies outstanding: {}",
                        device.name, remaining, e
                    );
                    return;
                }
            }
        }
        debug!("{}: back in sync", device.name);
    }

    /// Move from the user prompt to the privileged prompt.
    async fn escalate(&self, session: &mut Session) -> Result<()> {
        let device = self.device;
        let platform = &device.platform;
        let Some(command) = platform.escalate_command.as_deref() else {
            return Ok(());
        };
        let Some(secret) = device.credentials.enable_password() else {
            debug!("{}: at user prompt but no enable password", device.name);
            return Ok(());
        };

        let challenge = CompletionPattern::from(combine_prompt_patterns([
            ENABLE_PASSWORD_CHALLENGE,
            platform.prompts.privileged_source(),
        ])?);

        let channel = session.channel_mut();
        channel.send(command).await?;
        let reply = channel
            .read_until(&challenge, device.timeout, self.cancel)
            .await?;
        if !platform.prompts.at_privileged(&reply) {
            channel.send_hidden(secret).await?;
            channel
                .read_until(&platform.prompts.privileged, device.timeout, self.cancel)
                .await?;
        }
        debug!("{}: escalated", device.name);
        Ok(())
    }

    /// Run `commands` sequentially until one fails.
    async fn execute(
        &self,
        session: &mut Session,
        commands: &[String],
    ) -> (Vec<CommandOutput>, Option<Error>) {
        let device = self.device;
        let prompt = &device.platform.prompts.privileged;
        let mut outputs = Vec::with_capacity(commands.len());

        for command in commands {
            match session
                .channel_mut()
                .send_command(command, prompt, device.timeout, self.cancel)
                .await
            {
                Ok(output) => outputs.push(output),
                Err(e) => return (outputs, Some(e)),
            }
        }

        (outputs, None)
    }
}

/// Run one device to completion.
pub async fn run_device<C: Connector>(
    connector: &C,
    device: &Device,
    commands: &[String],
    cancel: &CancellationToken,
) -> DeviceResult {
    CommandRunner::new(device, connector, cancel).run(commands).await
}
