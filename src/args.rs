//! Command line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Build & run a Go app or its tests for every change.
#[derive(Debug, Clone, Parser)]
#[command(name = "reloader", version, about)]
pub struct Args {
	/// Print debug logging
	#[arg(short, long, global = true)]
	pub debug: bool,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
	/// Run a command every time the package changes
	#[command(after_help = "Example: reloader run -r ./backend")]
	Run(RunArgs),

	/// Run Go tests every time the package changes
	#[command(after_help = "Example: reloader test ./my/package")]
	Test(TestArgs),
}

#[derive(Debug, Clone, clap::Args)]
pub struct RunArgs {
	/// Package to build and run
	pub target: String,

	/// Extra folders to watch for changes, in addition to the target
	pub extra_watch: Vec<PathBuf>,

	/// Folders to watch recursively for changes
	#[arg(short, long)]
	pub watch: Vec<PathBuf>,

	/// Folders to ignore
	#[arg(short = 'g', long)]
	pub ignore: Vec<PathBuf>,

	/// Automatic restart in case of failure
	#[arg(short, long)]
	pub restart: bool,

	/// List of extensions that cause the app to restart without a rebuild
	#[arg(short = 'e', long = "restart-exts")]
	pub restart_exts: Vec<String>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct TestArgs {
	/// Packages to watch and test
	#[arg(required = true)]
	pub packages: Vec<String>,

	/// Verbose run of the go tests
	#[arg(short, long)]
	pub verbose: bool,

	/// Run only those tests and examples matching the regular expression
	#[arg(short, long)]
	pub run: Option<String>,

	/// Tags for the go build command
	#[arg(short, long)]
	pub tags: Option<String>,
}
