//! Immutable per-mode configuration, built once from the CLI arguments.

use std::{
	env,
	ffi::OsString,
	path::{Path, PathBuf},
};

use crate::{
	args::{RunArgs, TestArgs},
	error::CriticalError,
};

/// Configuration for `reloader run`.
#[derive(Debug, Clone)]
pub struct RunConfig {
	/// Package path passed to `go install`.
	pub target: String,

	/// Path of the installed binary to supervise.
	pub program: PathBuf,

	/// All roots to watch: the target plus any extra folders.
	pub watch: Vec<PathBuf>,

	/// Path prefixes to skip while walking.
	pub ignore: Vec<PathBuf>,

	/// Extensions (without the leading dot) that restart the app without a
	/// rebuild.
	pub restart_exts: Vec<String>,

	/// Relaunch the app automatically when it exits or crashes.
	pub auto_restart: bool,
}

impl RunConfig {
	pub fn from_args(args: RunArgs) -> Result<Self, CriticalError> {
		let program = installed_binary(&gopath(), &args.target)?;

		let mut watch = args.watch;
		watch.extend(args.extra_watch);
		watch.push(PathBuf::from(&args.target));

		Ok(Self {
			program,
			target: args.target,
			watch,
			ignore: args.ignore,
			restart_exts: normalize_exts(args.restart_exts),
			auto_restart: args.restart,
		})
	}

	/// The build command for the target: `go install <target>`.
	pub fn build_command(&self) -> (String, Vec<String>) {
		(
			"go".to_string(),
			vec!["install".to_string(), self.target.clone()],
		)
	}
}

/// Configuration for `reloader test`.
#[derive(Debug, Clone)]
pub struct TestConfig {
	/// Packages to watch and test.
	pub packages: Vec<String>,

	/// Pass `-v` to the go tests.
	pub verbose: bool,

	/// Test-name filter regex, passed to `-run`.
	pub run: Option<String>,

	/// Build tags, passed to `-tags`.
	pub tags: Option<String>,
}

impl TestConfig {
	pub fn from_args(args: TestArgs) -> Self {
		Self {
			packages: args.packages,
			verbose: args.verbose,
			run: args.run,
			tags: args.tags,
		}
	}

	/// The test command for the packages: `go test [flags] <packages...>`.
	pub fn test_command(&self) -> (String, Vec<String>) {
		let mut args = vec!["test".to_string()];
		if self.verbose {
			args.push("-v".to_string());
		}
		if let Some(run) = &self.run {
			args.push("-run".to_string());
			args.push(run.clone());
		}
		if let Some(tags) = &self.tags {
			args.push("-tags".to_string());
			args.push(tags.clone());
		}
		args.extend(self.packages.iter().cloned());
		("go".to_string(), args)
	}
}

/// Strip the leading dot so both `-e yml` and `-e .yml` work.
fn normalize_exts(exts: Vec<String>) -> Vec<String> {
	exts.into_iter()
		.map(|ext| ext.trim_start_matches('.').to_string())
		.collect()
}

/// Where `go install` places the binary for `target`.
///
/// The binary is named after the last path component of the target, or after
/// the working directory when the target is the current package.
fn installed_binary(gopath: &Path, target: &str) -> Result<PathBuf, CriticalError> {
	let name: OsString = match Path::new(target).file_name() {
		Some(name) => name.to_os_string(),
		None => {
			let cwd = env::current_dir().map_err(|err| CriticalError::Io {
				about: "resolving the working directory",
				err,
			})?;
			cwd.file_name().map_or_else(|| "main".into(), OsString::from)
		}
	};

	Ok(gopath.join("bin").join(name))
}

/// `GOPATH` from the environment, defaulting to `~/go`.
fn gopath() -> PathBuf {
	env::var_os("GOPATH").map_or_else(
		|| {
			dirs::home_dir()
				.unwrap_or_else(|| PathBuf::from("."))
				.join("go")
		},
		PathBuf::from,
	)
}
