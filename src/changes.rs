//! Change aggregation: classify and debounce raw filesystem events.

use std::{
	path::{Path, PathBuf},
	time::Duration,
};

use tokio::{
	sync::mpsc,
	time::{sleep_until, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{error::CriticalError, mailbox::Mailbox};

/// Quiet period after the last classified change before a decision is made.
///
/// Editors with atomic saves produce several events per logical edit;
/// batching them avoids redundant rebuilds.
pub const QUIET_PERIOD: Duration = Duration::from_millis(50);

/// Extension of source files that require a rebuild.
const SOURCE_EXT: &str = "go";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Classification {
	Rebuild,
	Restart,
	Ignore,
}

fn classify(path: &Path, restart_exts: &[String]) -> Classification {
	match path.extension().and_then(|ext| ext.to_str()) {
		Some(SOURCE_EXT) => Classification::Rebuild,
		Some(ext) if restart_exts.iter().any(|e| e == ext) => Classification::Restart,
		_ => Classification::Ignore,
	}
}

/// Consume raw change events until cancelled, emitting coalesced decisions.
///
/// Each classified change re-arms the debounce deadline. When the quiet
/// period elapses, a single signal is emitted for the whole burst: a rebuild
/// if any change in it touched a source file, a restart otherwise. Ignored
/// extensions never arm the deadline.
pub async fn worker(
	token: CancellationToken,
	mut changes: mpsc::UnboundedReceiver<PathBuf>,
	restart_exts: Vec<String>,
	rebuild: Mailbox,
	restart: Mailbox,
) -> Result<(), CriticalError> {
	let mut build_pending = false;
	let mut deadline: Option<Instant> = None;

	loop {
		tokio::select! {
			() = token.cancelled() => return Ok(()),

			change = changes.recv() => {
				let Some(change) = change else { return Ok(()) };

				match classify(&change, &restart_exts) {
					Classification::Rebuild => {
						debug!(path = ?change, "file change detected, rebuild");
						build_pending = true;
					}
					Classification::Restart => {
						debug!(path = ?change, "file change detected, restart");
					}
					Classification::Ignore => {
						debug!(path = ?change, "file change detected, but no action performed");
						continue;
					}
				}

				deadline = Some(Instant::now() + QUIET_PERIOD);
			}

			() = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
				deadline = None;

				if build_pending {
					build_pending = false;
					rebuild.raise();
				} else {
					restart.raise();
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use tokio::{task::yield_now, time::advance};

	use crate::mailbox::mailbox;

	use super::*;

	/// Let spawned tasks observe pending messages before the clock moves.
	async fn settle() {
		for _ in 0..20 {
			yield_now().await;
		}
	}

	struct Harness {
		token: CancellationToken,
		changes: mpsc::UnboundedSender<PathBuf>,
		rebuild: mpsc::Receiver<()>,
		restart: mpsc::Receiver<()>,
		worker: tokio::task::JoinHandle<Result<(), CriticalError>>,
	}

	fn spawn_worker(restart_exts: Vec<String>) -> Harness {
		let token = CancellationToken::new();
		let (changes_tx, changes_rx) = mpsc::unbounded_channel();
		let (rebuild, rebuild_rx) = mailbox();
		let (restart, restart_rx) = mailbox();

		let worker = tokio::spawn(worker(
			token.clone(),
			changes_rx,
			restart_exts,
			rebuild,
			restart,
		));

		Harness {
			token,
			changes: changes_tx,
			rebuild: rebuild_rx,
			restart: restart_rx,
			worker,
		}
	}

	#[tokio::test(start_paused = true)]
	async fn burst_collapses_into_one_rebuild() {
		let mut h = spawn_worker(Vec::new());

		h.changes.send("foo.go".into()).unwrap();
		settle().await;
		advance(Duration::from_millis(10)).await;
		h.changes.send("bar.go".into()).unwrap();
		settle().await;

		// 49ms after the second event: the deadline was re-armed, nothing yet.
		advance(Duration::from_millis(49)).await;
		settle().await;
		assert!(h.rebuild.try_recv().is_err());

		advance(Duration::from_millis(2)).await;
		settle().await;
		assert_eq!(h.rebuild.try_recv(), Ok(()));
		assert!(h.rebuild.try_recv().is_err(), "exactly one rebuild");
		assert!(h.restart.try_recv().is_err(), "no restart for source bursts");

		h.token.cancel();
		h.worker.await.unwrap().unwrap();
	}

	#[tokio::test(start_paused = true)]
	async fn restart_extension_triggers_restart_only() {
		let mut h = spawn_worker(vec!["yml".to_string()]);

		h.changes.send("config.yml".into()).unwrap();
		settle().await;
		advance(Duration::from_millis(60)).await;
		settle().await;

		assert_eq!(h.restart.try_recv(), Ok(()));
		assert!(h.rebuild.try_recv().is_err());

		h.token.cancel();
		h.worker.await.unwrap().unwrap();
	}

	#[tokio::test(start_paused = true)]
	async fn any_source_change_in_a_burst_wins() {
		let mut h = spawn_worker(vec!["yml".to_string()]);

		h.changes.send("config.yml".into()).unwrap();
		h.changes.send("foo.go".into()).unwrap();
		h.changes.send("other.yml".into()).unwrap();
		settle().await;
		advance(Duration::from_millis(60)).await;
		settle().await;

		assert_eq!(h.rebuild.try_recv(), Ok(()));
		assert!(h.restart.try_recv().is_err());

		h.token.cancel();
		h.worker.await.unwrap().unwrap();
	}

	#[tokio::test(start_paused = true)]
	async fn unknown_extensions_are_ignored() {
		let mut h = spawn_worker(vec!["yml".to_string()]);

		h.changes.send("notes.txt".into()).unwrap();
		h.changes.send("binary".into()).unwrap();
		settle().await;
		advance(Duration::from_millis(200)).await;
		settle().await;

		assert!(h.rebuild.try_recv().is_err());
		assert!(h.restart.try_recv().is_err());

		h.token.cancel();
		h.worker.await.unwrap().unwrap();
	}

	#[tokio::test(start_paused = true)]
	async fn cancellation_mid_debounce_returns_cleanly() {
		let mut h = spawn_worker(Vec::new());

		h.changes.send("foo.go".into()).unwrap();
		settle().await;

		h.token.cancel();
		h.worker.await.unwrap().unwrap();
		assert!(h.rebuild.try_recv().is_err());
	}

	#[test]
	fn classification_by_extension() {
		let exts = vec!["yml".to_string()];
		assert_eq!(classify(Path::new("a/b/main.go"), &exts), Classification::Rebuild);
		assert_eq!(classify(Path::new("config.yml"), &exts), Classification::Restart);
		assert_eq!(classify(Path::new("README.md"), &exts), Classification::Ignore);
		assert_eq!(classify(Path::new("Makefile"), &exts), Classification::Ignore);
	}
}
