//! Tether demo host.
//!
//! Reads commands from stdin and drives one worker service. The main task is
//! the home context: processing results and service notifications are posted
//! back to it and printed between commands.

mod app;
mod command;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tether_service::{DispatchNotifier, HomeContext, ServiceConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::app::{App, Console, Flow};
use crate::command::ParseError;

/// Demo command line arguments.
#[derive(Parser, Debug)]
#[command(name = "tether-demo")]
#[command(about = "Bind to an in-process worker service and drive it from the console")]
struct Args {
	/// Config file (defaults to <config dir>/tether/config.toml when present)
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Override the simulated processing delay
	#[arg(long, value_name = "MS")]
	delay_ms: Option<u64>,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

fn load_config(explicit: Option<&Path>) -> anyhow::Result<ServiceConfig> {
	let path = match explicit {
		Some(path) => path.to_path_buf(),
		None => match dirs::config_dir().map(|dir| dir.join("tether").join("config.toml")) {
			Some(path) if path.is_file() => path,
			_ => return Ok(ServiceConfig::default()),
		},
	};
	ServiceConfig::load(&path).with_context(|| format!("loading config from {}", path.display()))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	let subscriber = tracing_subscriber::fmt()
		.with_max_level(if args.verbose {
			tracing::Level::DEBUG
		} else {
			tracing::Level::WARN
		})
		.with_writer(std::io::stderr)
		.finish();
	tracing::subscriber::set_global_default(subscriber)?;

	let mut config = load_config(args.config.as_deref())?;
	if let Some(delay) = args.delay_ms {
		config.processing_delay_ms = delay;
	}
	info!(records = config.seed.len(), delay_ms = config.processing_delay_ms, "starting tether-demo");

	let mut home = HomeContext::new("demo.main");
	let console: Console = Arc::new(|line: &str| println!("{line}"));
	let notifier = DispatchNotifier::new(home.dispatcher(), |msg: &str| println!("[service] {msg}"));
	let mut app = App::new(config, home.dispatcher(), Arc::new(notifier), console);
	println!("{}", command::HELP);

	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	loop {
		tokio::select! {
			line = lines.next_line() => {
				let Some(line) = line? else {
					break;
				};
				match command::parse(&line) {
					Ok(cmd) => {
						if app.handle(cmd) == Flow::Quit {
							break;
						}
					}
					Err(ParseError::Empty) => {}
					Err(err) => println!("{err}"),
				}
			}
			_ = home.next() => {}
		}
	}

	app.shutdown();
	home.pump();
	info!("tether-demo stopped");
	Ok(())
}
