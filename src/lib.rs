#![deny(rust_2018_idioms)]

use std::env::var;

use clap::Parser;
use miette::Result;
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub mod args;
mod build;
mod changes;
mod config;
mod error;
mod exec;
mod fs;
mod mailbox;
mod orchestrator;
mod supervisor;

use args::{Args, Command};

fn init_logging(debug_on: bool) {
	if var("RUST_LOG").is_ok() {
		tracing_subscriber::fmt()
			.with_env_filter(EnvFilter::from_default_env())
			.init();
		return;
	}

	let filter = if debug_on {
		"reloader=debug"
	} else {
		"reloader=info"
	};
	tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub async fn run() -> Result<()> {
	let args = Args::parse();
	init_logging(args.debug);
	debug!(version = %env!("CARGO_PKG_VERSION"), ?args, "starting reloader");

	match args.command {
		Command::Run(run) => {
			let config = config::RunConfig::from_args(run)?;
			orchestrator::run_mode(config).await?;
		}
		Command::Test(test) => {
			let config = config::TestConfig::from_args(test);
			orchestrator::test_mode(config).await?;
		}
	}

	debug!("clean shutdown");
	Ok(())
}
