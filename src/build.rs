//! Build coordination: single-flight builds driven by the rebuild signal.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
	error::CriticalError,
	exec::{self, ExitKind},
	mailbox::Mailbox,
};

/// Invoke the build command once, inheriting standard streams.
async fn build_once(
	token: &CancellationToken,
	program: &str,
	args: &[String],
) -> Result<ExitKind, CriticalError> {
	info!(">>> build...");

	let outcome = exec::run(token, program, args).await?;
	if outcome == ExitKind::Failed {
		error!(">>> build command failed!");
	}

	Ok(outcome)
}

/// Run the initial build, then rebuild on demand.
///
/// Build failures are recoverable: they are logged and the worker keeps
/// waiting for the next rebuild signal. Restart and backoff-reset signals are
/// only emitted for successful rebuilds so a broken binary is never
/// relaunched; the initial build is the exception and always emits a restart
/// so the app comes up on boot.
///
/// Builds are single-flight: each one runs synchronously within a loop
/// iteration, and rebuild requests arriving meanwhile coalesce in the mailbox
/// until the next iteration.
pub async fn worker(
	token: CancellationToken,
	program: String,
	args: Vec<String>,
	mut rebuild: mpsc::Receiver<()>,
	restart: Mailbox,
	reset: Mailbox,
) -> Result<(), CriticalError> {
	// Build the application for the first time when starting up.
	build_once(&token, &program, &args).await?;
	restart.raise();

	loop {
		tokio::select! {
			() = token.cancelled() => return Ok(()),

			signal = rebuild.recv() => {
				let Some(()) = signal else { return Ok(()) };

				if build_once(&token, &program, &args).await? == ExitKind::Success {
					// Backoff must reflect the health of the current binary,
					// not of previous ones.
					reset.raise();
					restart.raise();
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use tokio::time::{sleep, timeout};

	use crate::mailbox::mailbox;

	use super::*;

	struct Harness {
		token: CancellationToken,
		rebuild: Mailbox,
		restart: mpsc::Receiver<()>,
		reset: mpsc::Receiver<()>,
		worker: tokio::task::JoinHandle<Result<(), CriticalError>>,
	}

	fn spawn_worker(program: &str) -> Harness {
		let token = CancellationToken::new();
		let (rebuild, rebuild_rx) = mailbox();
		let (restart, restart_rx) = mailbox();
		let (reset, reset_rx) = mailbox();

		let worker = tokio::spawn(worker(
			token.clone(),
			program.to_string(),
			Vec::new(),
			rebuild_rx,
			restart,
			reset,
		));

		Harness {
			token,
			rebuild,
			restart: restart_rx,
			reset: reset_rx,
			worker,
		}
	}

	#[tokio::test]
	async fn initial_build_always_signals_a_restart() {
		// Even a failing initial build launches whatever binary is present.
		let mut h = spawn_worker("false");

		timeout(Duration::from_secs(5), h.restart.recv())
			.await
			.expect("restart should be signalled after the initial build")
			.unwrap();

		h.token.cancel();
		h.worker.await.unwrap().unwrap();
	}

	#[tokio::test]
	async fn failed_rebuild_emits_no_signals() {
		let mut h = spawn_worker("false");

		timeout(Duration::from_secs(5), h.restart.recv())
			.await
			.unwrap()
			.unwrap();

		h.rebuild.raise();
		sleep(Duration::from_millis(300)).await;

		assert!(h.restart.try_recv().is_err(), "no restart after a failed build");
		assert!(h.reset.try_recv().is_err(), "no backoff reset after a failed build");

		h.token.cancel();
		h.worker.await.unwrap().unwrap();
	}

	#[tokio::test]
	async fn successful_rebuild_signals_reset_and_restart() {
		let mut h = spawn_worker("true");

		timeout(Duration::from_secs(5), h.restart.recv())
			.await
			.unwrap()
			.unwrap();

		h.rebuild.raise();

		timeout(Duration::from_secs(5), h.reset.recv())
			.await
			.expect("backoff reset should be signalled")
			.unwrap();
		timeout(Duration::from_secs(5), h.restart.recv())
			.await
			.expect("restart should be signalled")
			.unwrap();

		h.token.cancel();
		h.worker.await.unwrap().unwrap();
	}

	#[tokio::test]
	async fn missing_build_command_is_fatal() {
		let h = spawn_worker("/does/not/exist");

		let err = h.worker.await.unwrap().unwrap_err();
		assert!(matches!(err, CriticalError::Spawn { .. }));
	}
}
