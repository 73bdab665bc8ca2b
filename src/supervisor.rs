//! Process supervision: lifecycle of the single child-process slot.

use std::{
	path::PathBuf,
	process::{ExitStatus, Stdio},
	time::Duration,
};

use nix::{
	errno::Errno,
	sys::signal::{kill, Signal},
	unistd::Pid,
};
use tokio::{process::Command, sync::mpsc, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use crate::{
	error::CriticalError,
	exec::{self, ExitKind},
	mailbox::Mailbox,
};

/// Initial delay before relaunching an app that exited on its own.
pub const BACKOFF_FLOOR: Duration = Duration::from_secs(1);

/// Upper bound for the relaunch delay.
pub const BACKOFF_CEILING: Duration = Duration::from_secs(8);

/// Grace period after the interrupt before noting the process is still up.
const STOP_GRACE: Duration = Duration::from_secs(3);

/// Hard deadline after the interrupt before the process is killed.
const STOP_KILL_AFTER: Duration = Duration::from_secs(15);

/// Terminal result of a supervised process, as seen by its waiter task.
type AppExit = std::io::Result<ExitStatus>;

/// Supervises at most one running instance of the target program.
///
/// The process slot is exclusively owned here: starting a replacement always
/// completes the stop protocol on the previous instance first.
#[derive(Debug)]
pub struct Supervisor {
	program: PathBuf,
	args: Vec<String>,
	auto_restart: bool,

	grace: Duration,
	kill_after: Duration,
	backoff_floor: Duration,
	backoff_ceiling: Duration,

	/// PID of the live child, if any.
	current: Option<Pid>,

	/// Completion notifications from the waiter task of the live child.
	ended_rx: mpsc::Receiver<AppExit>,
	ended_tx: mpsc::Sender<AppExit>,
}

impl Supervisor {
	pub fn new(program: PathBuf, args: Vec<String>, auto_restart: bool) -> Self {
		let (ended_tx, ended_rx) = mpsc::channel(1);
		Self {
			program,
			args,
			auto_restart,
			grace: STOP_GRACE,
			kill_after: STOP_KILL_AFTER,
			backoff_floor: BACKOFF_FLOOR,
			backoff_ceiling: BACKOFF_CEILING,
			current: None,
			ended_rx,
			ended_tx,
		}
	}

	/// Spawn a fresh instance and begin awaiting its termination.
	fn start(&mut self) -> Result<(), CriticalError> {
		let mut child = Command::new(&self.program)
			.args(&self.args)
			.stdin(Stdio::inherit())
			.stdout(Stdio::inherit())
			.stderr(Stdio::inherit())
			.spawn()
			.map_err(|err| CriticalError::Spawn {
				program: self.program.display().to_string(),
				err,
			})?;

		self.current = child.id().map(|id| Pid::from_raw(id as i32));

		let ended = self.ended_tx.clone();
		tokio::spawn(async move {
			let exit = child.wait().await;
			trace!(?exit, "process close detected");
			ended.send(exit).await.ok();
		});

		Ok(())
	}

	/// Stop the current instance, if any.
	///
	/// Sends an interrupt right away and waits for the process to finish.
	/// After the grace period a notice is logged without further action;
	/// after the hard deadline the process is killed and the forced stop is
	/// reported as an error. A process that is already gone counts as
	/// stopped, not as a failure.
	async fn stop(&mut self) -> Result<(), CriticalError> {
		let Some(pid) = self.current.take() else {
			return Ok(());
		};

		trace!(%pid, "send interrupt signal");
		signal_process(pid, Signal::SIGINT)?;

		let grace = sleep(self.grace);
		let deadline = sleep(self.kill_after);
		tokio::pin!(grace, deadline);
		let mut grace_elapsed = false;

		loop {
			tokio::select! {
				exit = self.ended_rx.recv() => {
					trace!(%pid, ?exit, "process closed before the timeout");
					return Ok(());
				}

				() = &mut grace, if !grace_elapsed => {
					grace_elapsed = true;
					info!(">>> close process...");
				}

				() = &mut deadline => {
					warn!(%pid, "kill process after timeout");
					signal_process(pid, Signal::SIGKILL)?;

					// Drain the completion notification so a later start
					// doesn't observe this instance's exit.
					self.ended_rx.recv().await;

					return Err(CriticalError::StopTimeout {
						pid: pid.as_raw(),
						timeout: self.kill_after,
					});
				}
			}
		}
	}

	/// Supervision loop for Run mode.
	///
	/// Reacts to coalesced restart signals by replacing the current instance,
	/// to backoff resets from successful builds, and to the process ending on
	/// its own, which relaunches it after an exponentially growing delay when
	/// auto-restart is enabled.
	pub async fn worker(
		mut self,
		token: CancellationToken,
		mut restart: mpsc::Receiver<()>,
		mut reset: mpsc::Receiver<()>,
		relaunch: Mailbox,
	) -> Result<(), CriticalError> {
		let mut backoff = self.backoff_floor;

		loop {
			tokio::select! {
				biased;

				() = token.cancelled() => {
					return self.stop().await;
				}

				signal = reset.recv() => {
					let Some(()) = signal else { return Ok(()) };
					backoff = self.backoff_floor;
				}

				signal = restart.recv() => {
					let Some(()) = signal else { return Ok(()) };
					self.stop().await?;
					info!(">>> run...");
					self.start()?;
				}

				exit = self.ended_rx.recv() => {
					let Some(exit) = exit else { return Ok(()) };
					self.current = None;

					let failure = match &exit {
						Ok(status) if status.success() => None,
						Ok(status) => Some(status.to_string()),
						Err(err) => Some(err.to_string()),
					};

					if self.auto_restart {
						match &failure {
							Some(err) => error!(error = %err, ">>> command failed, restarting in {backoff:?}"),
							None => error!(">>> command exited, restarting in {backoff:?}"),
						}

						tokio::select! {
							() = token.cancelled() => return Ok(()),
							() = sleep(backoff) => {}
						}
						backoff = next_backoff(backoff, self.backoff_ceiling);

						relaunch.raise();
					} else if let Some(err) = failure {
						error!(error = %err, ">>> command failed");
					}
				}
			}
		}
	}
}

/// Rerun loop for Test mode: one synchronous test run per reload signal.
///
/// There is no long-lived child here, so there is no backoff and no
/// auto-retry: a failed run waits for the next reload signal.
pub async fn test_worker(
	token: CancellationToken,
	program: String,
	args: Vec<String>,
	mut reload: mpsc::Receiver<()>,
) -> Result<(), CriticalError> {
	loop {
		tokio::select! {
			() = token.cancelled() => return Ok(()),

			signal = reload.recv() => {
				let Some(()) = signal else { return Ok(()) };

				info!(">>> test...");
				match exec::run(&token, &program, &args).await? {
					ExitKind::Failed => error!(">>> command failed!"),
					ExitKind::Success => info!(">>> waiting..."),
				}
			}
		}
	}
}

/// Double the relaunch delay, capped at the ceiling.
fn next_backoff(current: Duration, ceiling: Duration) -> Duration {
	(current * 2).min(ceiling)
}

/// Deliver a signal, treating "process already finished" as success.
///
/// The process may legitimately exit between the completion-notification
/// check and the signal attempt; ESRCH is that benign race, not an error.
fn signal_process(pid: Pid, signal: Signal) -> Result<(), CriticalError> {
	match kill(pid, signal) {
		Ok(()) | Err(Errno::ESRCH) => Ok(()),
		Err(errno) => Err(CriticalError::Signal {
			pid: pid.as_raw(),
			err: std::io::Error::from_raw_os_error(errno as i32),
		}),
	}
}
