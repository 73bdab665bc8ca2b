//! Wires the watchers, aggregator, coordinator and supervisor into one
//! cancellation-linked task group.

use std::path::PathBuf;

use tokio::{signal::ctrl_c, sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
	build, changes,
	config::{RunConfig, TestConfig},
	error::CriticalError,
	fs, mailbox,
	supervisor::{self, Supervisor},
};

/// Watch, rebuild and supervise the target app until interrupted.
pub async fn run_mode(config: RunConfig) -> Result<(), CriticalError> {
	let token = CancellationToken::new();
	let mut group = JoinSet::new();

	let (changes_tx, changes_rx) = mpsc::unbounded_channel();
	for folder in &config.watch {
		group.spawn(fs::subscribe(
			token.clone(),
			changes_tx.clone(),
			folder.clone(),
			config.ignore.clone(),
		));
	}
	drop(changes_tx);

	let (rebuild, rebuild_rx) = mailbox::mailbox();
	let (restart, restart_rx) = mailbox::mailbox();
	let (reset, reset_rx) = mailbox::mailbox();

	group.spawn(changes::worker(
		token.clone(),
		changes_rx,
		config.restart_exts.clone(),
		rebuild,
		restart.clone(),
	));

	let (build_program, build_args) = config.build_command();
	group.spawn(build::worker(
		token.clone(),
		build_program,
		build_args,
		rebuild_rx,
		restart.clone(),
		reset,
	));

	let supervisor = Supervisor::new(config.program, Vec::new(), config.auto_restart);
	group.spawn(supervisor.worker(token.clone(), restart_rx, reset_rx, restart));

	group.spawn(interrupt(token.clone()));

	drain(token, group).await
}

/// Watch the packages and rerun their tests until interrupted.
pub async fn test_mode(config: TestConfig) -> Result<(), CriticalError> {
	let token = CancellationToken::new();
	let mut group = JoinSet::new();

	let (changes_tx, changes_rx) = mpsc::unbounded_channel();
	for package in &config.packages {
		group.spawn(fs::subscribe(
			token.clone(),
			changes_tx.clone(),
			PathBuf::from(package),
			Vec::new(),
		));
	}
	drop(changes_tx);

	let (reload, reload_rx) = mailbox::mailbox();

	// First run of the tests happens right away, before any change.
	reload.raise();

	// In test mode every classified change means the same thing: rerun.
	group.spawn(changes::worker(
		token.clone(),
		changes_rx,
		Vec::new(),
		reload.clone(),
		reload,
	));

	let (program, args) = config.test_command();
	group.spawn(supervisor::test_worker(token.clone(), program, args, reload_rx));

	group.spawn(interrupt(token.clone()));

	drain(token, group).await
}

/// Cancel the token when the user interrupts the process.
async fn interrupt(token: CancellationToken) -> Result<(), CriticalError> {
	tokio::select! {
		() = token.cancelled() => {}
		result = ctrl_c() => {
			result.map_err(|err| CriticalError::Io {
				about: "listening for interrupt",
				err,
			})?;
			debug!("interrupt received, shutting down");
			token.cancel();
		}
	}
	Ok(())
}

/// Wait for every worker; the first fatal error cancels the rest and wins.
async fn drain(
	token: CancellationToken,
	mut group: JoinSet<Result<(), CriticalError>>,
) -> Result<(), CriticalError> {
	let mut failure = None;

	while let Some(joined) = group.join_next().await {
		let result = joined.map_err(CriticalError::TaskJoin).and_then(|r| r);
		if let Err(err) = result {
			if failure.is_none() {
				failure = Some(err);
			}
			token.cancel();
		}
	}

	failure.map_or(Ok(()), Err)
}
