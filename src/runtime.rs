//! Host loop driving a running session
//!
//! Stands in for the host application's frame loop. Everything runs on one
//! task; the session itself is never shared across threads.
//!
//! ```text
//! frame interval ──► session.on_frame(elapsed)
//! poll interval  ──► session.poll_devices()
//! commands (mpsc) ─► SimulatedHost.apply ──► session.handle_host_event
//!                └─► plug / unplug ──► SimulatedPlatformHandle
//! cancellation   ──► exit
//! ```
//!
//! Command lines are read on a plain OS thread (see [`spawn_command_reader`]).
//! A blocked read never holds up shutdown: the thread is not joined.

use std::io::BufRead;
use std::ops::ControlFlow;
use std::thread;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RuntimeConfig;
use crate::device::SimulatedPlatformHandle;
use crate::host::{HostCommand, HostContextSource, SimulatedHost};
use crate::session::{ControllerSession, Running};

const COMMAND_BUFFER: usize = 32;

/// Parses one command per line from `input` on a detached thread.
///
/// Blank lines are skipped and unparseable ones are logged. The thread ends
/// at end of input, on a read error, or once the receiver is dropped.
pub fn spawn_command_reader<R>(input: R) -> mpsc::Receiver<HostCommand>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let spawned = thread::Builder::new()
        .name("command-reader".to_string())
        .spawn(move || {
            for line in input.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        error!("Failed to read command input: {}", e);
                        return;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<HostCommand>() {
                    Ok(command) => {
                        if tx.blocking_send(command).is_err() {
                            debug!("Command receiver dropped");
                            return;
                        }
                    }
                    Err(e) => warn!("{}", e),
                }
            }
            debug!("Command input closed");
        });
    if let Err(e) = spawned {
        error!("Failed to start command reader: {}", e);
    }
    rx
}

/// Why the loop returned
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopExit {
    Quit,
    Cancelled,
}

pub struct HostLoop<'a> {
    session: &'a ControllerSession<Running>,
    host: &'a SimulatedHost,
    devices: Option<SimulatedPlatformHandle>,
    config: RuntimeConfig,
}

impl<'a> HostLoop<'a> {
    /// `devices` is only present with the simulated backend; without it
    /// `plug`/`unplug` are rejected.
    pub fn new(
        session: &'a ControllerSession<Running>,
        host: &'a SimulatedHost,
        devices: Option<SimulatedPlatformHandle>,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            session,
            host,
            devices,
            config,
        }
    }

    pub async fn run(
        &self,
        mut commands: mpsc::Receiver<HostCommand>,
        cancel: CancellationToken,
    ) -> LoopExit {
        let mut frames = time::interval(self.config.frame_interval());
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut polls = time::interval(self.config.poll_interval());
        polls.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_frame = Instant::now();
        let mut commands_open = true;
        info!(
            "Host loop started (frame {:?}, poll {:?})",
            self.config.frame_interval(),
            self.config.poll_interval()
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Host loop cancelled");
                    return LoopExit::Cancelled;
                }

                now = frames.tick() => {
                    let elapsed = now.duration_since(last_frame);
                    last_frame = now;
                    self.session.on_frame(elapsed);
                }

                _ = polls.tick() => {
                    self.session.poll_devices();
                }

                command = commands.recv(), if commands_open => {
                    match command {
                        Some(command) => {
                            if let ControlFlow::Break(()) = self.handle_command(command) {
                                info!("Quit requested");
                                return LoopExit::Quit;
                            }
                        }
                        None => {
                            debug!("Command channel closed");
                            commands_open = false;
                        }
                    }
                }
            }
        }
    }

    pub fn handle_command(&self, command: HostCommand) -> ControlFlow<()> {
        debug!("Command: {:?}", command);
        match command {
            HostCommand::Quit => return ControlFlow::Break(()),
            HostCommand::Status => self.log_status(),
            HostCommand::Plug(device) => match &self.devices {
                Some(devices) => devices.plug(device),
                None => warn!("'plug' needs the simulated backend"),
            },
            HostCommand::Unplug => match &self.devices {
                Some(devices) => devices.unplug_all(),
                None => warn!("'unplug' needs the simulated backend"),
            },
            other => {
                if let Some(event) = self.host.apply(other) {
                    self.session.handle_host_event(event);
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn log_status(&self) {
        let device = self
            .session
            .device()
            .map_or_else(|| "none".to_string(), |d| d.to_string());
        let mode = self
            .session
            .current_mode()
            .map_or_else(|| "none".to_string(), |m| m.to_string());
        info!(
            "tick {} | device {} | mode {} | recompute pending: {} | context {:?}",
            self.session.tick(),
            device,
            mode,
            self.session.is_recompute_pending(),
            self.host.snapshot()
        );
    }
}
