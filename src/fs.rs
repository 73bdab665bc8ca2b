//! Directory enumeration and filesystem watching.

use std::{
	io::ErrorKind,
	path::{Path, PathBuf},
};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};
use walkdir::WalkDir;

use crate::error::CriticalError;

/// Folders that are never watched, regardless of configuration.
pub const DEFAULT_IGNORE_FOLDERS: &[&str] = &["node_modules", ".git"];

/// Enumerate the directories under `root` that should be watched.
///
/// Skips the default ignore folders and anything whose path starts with one
/// of the configured ignore prefixes. A missing root is tolerated and yields
/// no directories.
pub fn walk(root: &Path, ignore: &[PathBuf]) -> Result<Vec<PathBuf>, CriticalError> {
	let mut paths = Vec::new();

	let walker = WalkDir::new(root)
		.into_iter()
		.filter_entry(|entry| !is_ignored(entry.path(), ignore));

	for entry in walker {
		let entry = match entry {
			Ok(entry) => entry,
			Err(err)
				if err
					.io_error()
					.is_some_and(|io| io.kind() == ErrorKind::NotFound) =>
			{
				continue;
			}
			Err(err) => {
				return Err(CriticalError::Walk {
					path: root.to_owned(),
					err,
				})
			}
		};

		if entry.file_type().is_dir() {
			paths.push(entry.into_path());
		}
	}

	Ok(paths)
}

fn is_ignored(path: &Path, ignore: &[PathBuf]) -> bool {
	if let Some(name) = path.file_name() {
		if DEFAULT_IGNORE_FOLDERS.iter().any(|folder| name == *folder) {
			return true;
		}
	}

	ignore.iter().any(|prefix| path.starts_with(prefix))
}

/// Watch `root`, forwarding changed-file paths to `changes` until cancelled.
///
/// Directories are enumerated up front and registered individually so the
/// ignore rules apply to the subscription itself, mirroring how the walk
/// filters them out.
pub async fn subscribe(
	token: CancellationToken,
	changes: mpsc::UnboundedSender<PathBuf>,
	root: PathBuf,
	ignore: Vec<PathBuf>,
) -> Result<(), CriticalError> {
	let paths = walk(&root, &ignore)?;

	let mut watcher = RecommendedWatcher::new(
		move |event: Result<notify::Event, notify::Error>| {
			let event = match event {
				Ok(event) => event,
				Err(err) => {
					error!(?err, "filesystem watcher error");
					return;
				}
			};

			trace!(?event, "filesystem event");
			if !(event.kind.is_create() || event.kind.is_modify() || event.kind.is_remove()) {
				return;
			}

			for path in event.paths {
				changes.send(path).ok();
			}
		},
		notify::Config::default(),
	)
	.map_err(|err| CriticalError::WatcherInit { err })?;

	for path in &paths {
		watcher
			.watch(path, RecursiveMode::NonRecursive)
			.map_err(|err| CriticalError::WatcherSubscribe {
				path: path.clone(),
				err,
			})?;
	}

	debug!(path = ?root, "watching changes");
	token.cancelled().await;
	Ok(())
}
