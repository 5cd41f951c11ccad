//! Job scheduler: fans a command batch out across the inventory and fans the
//! results back in.
//!
//! Each device gets its own task. A semaphore bounds how many run at once,
//! a shared cancellation token tears in-flight work down when the deadline
//! passes, and the `JoinSet` is the barrier: `run` returns only after every
//! task it spawned has finished or been aborted.

use std::collections::HashMap;
use std::future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{info, warn};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;

use super::options::JobOptions;
use crate::driver::{Device, DeviceResult, run_device};
use crate::error::{ChannelError, Result};
use crate::transport::{Connector, NetworkConnector};

/// Receives each device's result as soon as it is available.
pub trait ResultSink: Send {
    fn accept(&mut self, result: DeviceResult);
}

impl ResultSink for Vec<DeviceResult> {
    fn accept(&mut self, result: DeviceResult) {
        self.push(result);
    }
}

impl ResultSink for mpsc::UnboundedSender<DeviceResult> {
    fn accept(&mut self, result: DeviceResult) {
        if self.send(result).is_err() {
            warn!("result receiver dropped");
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobReport {
    /// Devices handed to the scheduler.
    pub submitted: usize,

    /// Results delivered with `ok == true`.
    pub succeeded: usize,

    /// Results delivered with `ok == false`.
    pub failed: usize,

    /// Devices that never reported (only possible after a deadline).
    pub missing: Vec<String>,

    /// Whether the run-level deadline fired.
    pub deadline_exceeded: bool,

    /// Wall time of the run.
    pub elapsed: Duration,
}

impl JobReport {
    /// Every submitted device delivered a result.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.succeeded + self.failed == self.submitted
    }
}

/// Runs command batches against device inventories.
#[derive(Debug)]
pub struct Scheduler<C = NetworkConnector> {
    connector: Arc<C>,
    options: JobOptions,
}

impl Scheduler<NetworkConnector> {
    /// Scheduler that reaches real devices over SSH/Telnet.
    ///
    /// Fails if `options` does not pass [`JobOptions::validate`].
    pub fn new(options: JobOptions) -> Result<Self> {
        let connector = NetworkConnector::new(options.pty_config());
        Self::with_connector(connector, options)
    }
}

impl<C: Connector> Scheduler<C> {
    /// Scheduler using a custom connector.
    pub fn with_connector(connector: C, options: JobOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            connector: Arc::new(connector),
            options,
        })
    }

    /// Run `commands` on every device, delivering each result to `sink` in
    /// arrival order.
    pub async fn run<S: ResultSink>(
        &self,
        devices: Vec<Device>,
        commands: &[String],
        sink: &mut S,
    ) -> JobReport {
        let started = Instant::now();
        let commands: Arc<[String]> = Arc::from(commands);
        let cancel = CancellationToken::new();
        let semaphore = (self.options.max_concurrency > 0)
            .then(|| Arc::new(Semaphore::new(self.options.max_concurrency)));

        let mut report = JobReport {
            submitted: devices.len(),
            ..JobReport::default()
        };
        info!(
            "running {} commands on {} devices (concurrency {})",
            commands.len(),
            devices.len(),
            match self.options.max_concurrency {
                0 => "unbounded".to_string(),
                n => n.to_string(),
            }
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut workers = JoinSet::new();
        let mut tasks: HashMap<task::Id, String> = HashMap::new();
        let mut outstanding: Vec<String> = Vec::with_capacity(devices.len());

        for device in devices {
            outstanding.push(device.name.clone());
            let name = device.name.clone();

            let connector = Arc::clone(&self.connector);
            let commands = Arc::clone(&commands);
            let cancel = cancel.clone();
            let semaphore = semaphore.clone();
            let tx = tx.clone();

            let handle = workers.spawn(async move {
                let permit = match semaphore {
                    Some(semaphore) => tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            let _ = tx.send(DeviceResult::failure(
                                &device.name,
                                crate::Error::from(ChannelError::Cancelled),
                                Vec::new(),
                            ));
                            return;
                        }
                        permit = semaphore.acquire_owned() => permit.ok(),
                    },
                    None => None,
                };

                let result = run_device(connector.as_ref(), &device, &commands, &cancel).await;
                drop(permit);
                let _ = tx.send(result);
            });
            tasks.insert(handle.id(), name);
        }
        drop(tx);

        let deadline = self.options.deadline();
        let expired = async {
            match deadline {
                Some(deadline) => tokio::time::sleep(deadline).await,
                None => future::pending().await,
            }
        };
        tokio::pin!(expired);

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(result) => deliver(result, sink, &mut report, &mut outstanding),
                    None => break,
                },
                _ = &mut expired => {
                    warn!(
                        "deadline of {:?} exceeded with {} devices outstanding; cancelling",
                        deadline.unwrap_or_default(),
                        outstanding.len()
                    );
                    report.deadline_exceeded = true;
                    cancel.cancel();
                    break;
                }
            }
        }

        if report.deadline_exceeded {
            let grace = tokio::time::sleep(self.options.cancel_grace());
            tokio::pin!(grace);
            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Some(result) => deliver(result, sink, &mut report, &mut outstanding),
                        None => break,
                    },
                    _ = &mut grace => {
                        warn!("aborting {} workers that ignored cancellation", outstanding.len());
                        workers.abort_all();
                        break;
                    }
                }
            }
        }

        while let Some(joined) = workers.join_next_with_id().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    if let Some(name) = tasks.get(&e.id()) {
                        warn!("{}: worker panicked", name);
                        let result = DeviceResult::failure(name, "worker panicked", Vec::new());
                        deliver(result, sink, &mut report, &mut outstanding);
                    }
                }
            }
        }

        // Results sent between the abort and the join.
        while let Ok(result) = rx.try_recv() {
            deliver(result, sink, &mut report, &mut outstanding);
        }

        for name in &outstanding {
            warn!("{}: no result", name);
        }
        report.missing = outstanding;
        report.elapsed = started.elapsed();

        info!(
            "job finished in {:?}: {} ok, {} failed, {} missing",
            report.elapsed,
            report.succeeded,
            report.failed,
            report.missing.len()
        );
        report
    }

    /// Run and collect all results.
    pub async fn run_collect(
        &self,
        devices: Vec<Device>,
        commands: &[String],
    ) -> (Vec<DeviceResult>, JobReport) {
        let mut results = Vec::with_capacity(devices.len());
        let report = self.run(devices, commands, &mut results).await;
        (results, report)
    }
}

fn deliver<S: ResultSink>(
    result: DeviceResult,
    sink: &mut S,
    report: &mut JobReport,
    outstanding: &mut Vec<String>,
) {
    if let Some(pos) = outstanding.iter().position(|name| *name == result.device) {
        outstanding.swap_remove(pos);
    }
    if result.ok {
        report.succeeded += 1;
    } else {
        report.failed += 1;
    }
    info!("{}", result);
    sink.accept(result);
}
