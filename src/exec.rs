//! External command execution with inherited standard streams.

use std::{ffi::OsStr, process::Stdio};

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::CriticalError;

/// Classification of a finished command run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
	/// The command ran and exited successfully.
	Success,

	/// The command ran but exited with a non-zero status.
	Failed,
}

/// Run an external command to completion.
///
/// Standard input and output are inherited from the reloader so the command's
/// output lands on the user's terminal. A non-zero exit is a normal
/// [`ExitKind::Failed`] outcome; only failing to spawn or wait on the command
/// is an error. Cancelling the token terminates the command.
pub async fn run(
	token: &CancellationToken,
	program: impl AsRef<OsStr>,
	args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<ExitKind, CriticalError> {
	let program = program.as_ref();
	trace!(program = ?program, "running command");

	let mut child = Command::new(program)
		.args(args)
		.stdin(Stdio::inherit())
		.stdout(Stdio::inherit())
		.stderr(Stdio::inherit())
		.kill_on_drop(true)
		.spawn()
		.map_err(|err| CriticalError::Spawn {
			program: program.to_string_lossy().into_owned(),
			err,
		})?;

	tokio::select! {
		() = token.cancelled() => {
			child.kill().await.map_err(|err| CriticalError::Io {
				about: "killing cancelled command",
				err,
			})?;
			Ok(ExitKind::Failed)
		}
		status = child.wait() => {
			let status = status.map_err(|err| CriticalError::Io {
				about: "waiting on command",
				err,
			})?;
			Ok(if status.success() {
				ExitKind::Success
			} else {
				ExitKind::Failed
			})
		}
	}
}

#[cfg(test)]
mod tests {
	use std::time::{Duration, Instant};

	use super::*;

	#[tokio::test]
	async fn clean_exit_is_success() {
		let token = CancellationToken::new();
		let outcome = run(&token, "true", Vec::<String>::new()).await.unwrap();
		assert_eq!(outcome, ExitKind::Success);
	}

	#[tokio::test]
	async fn non_zero_exit_is_failed() {
		let token = CancellationToken::new();
		let outcome = run(&token, "false", Vec::<String>::new()).await.unwrap();
		assert_eq!(outcome, ExitKind::Failed);
	}

	#[tokio::test]
	async fn missing_program_is_fatal() {
		let token = CancellationToken::new();
		let err = run(&token, "/does/not/exist", Vec::<String>::new())
			.await
			.unwrap_err();
		assert!(matches!(err, CriticalError::Spawn { .. }));
	}

	#[tokio::test]
	async fn cancellation_terminates_the_command() {
		let token = CancellationToken::new();
		let started = Instant::now();

		let cancel = token.clone();
		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_millis(50)).await;
			cancel.cancel();
		});

		let outcome = run(&token, "sleep", ["30"]).await.unwrap();
		assert_eq!(outcome, ExitKind::Failed);
		assert!(started.elapsed() < Duration::from_secs(5));
	}
}
