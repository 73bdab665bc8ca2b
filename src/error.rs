//! Fatal error taxonomy.

use std::{path::PathBuf, time::Duration};

use miette::Diagnostic;
use thiserror::Error;
use tokio::task::JoinError;

/// Errors which are not recoverable and terminate the reloader.
///
/// Failed builds, failed test runs, and exits of the supervised app are not
/// errors in this sense: they are logged and the loops keep going.
#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum CriticalError {
	/// A fatal I/O error occurred.
	#[error("io({about}): {err}")]
	Io {
		/// What it was about.
		about: &'static str,

		/// The I/O error which occurred.
		#[source]
		err: std::io::Error,
	},

	/// Walking a watched folder failed.
	#[error("walking {path:?}: {err}")]
	Walk {
		/// The folder being walked.
		path: PathBuf,

		/// The error which occurred.
		#[source]
		err: walkdir::Error,
	},

	/// The filesystem watcher could not be created.
	#[error("fs: cannot initialise watcher: {err}")]
	WatcherInit {
		/// The error which occurred.
		#[source]
		err: notify::Error,
	},

	/// A folder could not be registered with the filesystem watcher.
	#[error("fs: cannot watch {path:?}: {err}")]
	WatcherSubscribe {
		/// The folder being subscribed.
		path: PathBuf,

		/// The error which occurred.
		#[source]
		err: notify::Error,
	},

	/// An external command could not be spawned.
	#[error("spawning {program}: {err}")]
	Spawn {
		/// The program being spawned.
		program: String,

		/// The error which occurred.
		#[source]
		err: std::io::Error,
	},

	/// Delivering a signal to the supervised process failed.
	#[error("signalling process {pid}: {err}")]
	Signal {
		/// PID of the process being signalled.
		pid: i32,

		/// The error which occurred.
		#[source]
		err: std::io::Error,
	},

	/// The supervised process ignored the interrupt and had to be killed.
	#[error("process {pid} did not stop after {timeout:?} and was killed")]
	StopTimeout {
		/// PID of the killed process.
		pid: i32,

		/// How long the process was given before the kill.
		timeout: Duration,
	},

	/// A worker task panicked or was aborted.
	#[error("worker task join: {0}")]
	TaskJoin(#[source] JoinError),
}
