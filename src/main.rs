//! command line front end of the policy tree matcher
//!
//! Reads a policy tree and either alert groups or label sets from json files, runs them through the
//! matcher worker and prints the result as json.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use routematch::{MatchOptions, MatcherWorker, Route};
use serde::de::DeserializeOwned;
use settings::{Cli, Operation, Settings};

mod log;
mod settings;

/// exit the complete program if one thread panics
fn setup_panic_handler() {
	let default_panic = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		default_panic(info);
		std::process::exit(1);
	}));
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
	let file = File::open(path).with_context(|| format!("can't open {}", path.display()))?;

	serde_json::from_reader(BufReader::new(file))
		.with_context(|| format!("can't parse {}", path.display()))
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
	setup_panic_handler();

	let cli = Cli::parse().context("invalid command line arguments")?;
	Settings::init(Settings::load(&cli).context("failed to load config")?)?;

	log::setup_logging().context("could not setup logging")?;

	let settings = Settings::global();

	let mut handle = MatcherWorker::spawn(settings.worker.queue_capacity)
		.context("failed to spawn matcher worker")?;
	if let Some(timeout) = settings.worker.request_timeout {
		handle = handle.with_timeout(timeout);
	}

	let options = MatchOptions { unquote_matchers: settings.unquote_matchers };

	let output = match &cli.operation {
		Operation::Groups { tree, groups } => {
			let root: Route = read_json(tree)?;
			let map = handle
				.route_groups_map(root, read_json(groups)?, options)
				.await
				.context("failed to match alert groups")?;

			serde_json::to_string_pretty(&map)?
		}
		Operation::Match { tree, labels } => {
			let root: Route = read_json(tree)?;
			let report = handle
				.match_instances(root, read_json(labels)?, options)
				.await
				.context("failed to match label sets")?;

			serde_json::to_string_pretty(&report)?
		}
	};

	println!("{output}");

	Ok(())
}
