//! fixture-builder CLI
//!
//! Regenerates fixture files from a database populated by setup scripts.
//!
//! ## Usage
//!
//! ```bash
//! fixture-builder generate            # rebuild when watched files changed
//! fixture-builder generate --force    # always rebuild
//! fixture-builder check               # exit 1 when a rebuild is due
//! fixture-builder clean
//! ```
//!
//! Exit codes: 0 on success, 1 on errors, 2 when the setup scripts fail.

mod settings;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fixture_builder::{
	FixtureBuilder, GenerateOutcome, SqliteBackend, clean_fixtures, fixtures_stale,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

const SETUP_FAILED: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "fixture-builder")]
#[command(about = "Generate named fixture files from a seeded database", long_about = None)]
#[command(version)]
struct Cli {
	/// Path to the TOML settings file
	#[arg(short, long, default_value = "fixture_builder.toml")]
	config: PathBuf,

	/// Verbosity level (can be repeated)
	#[arg(short, long, action = clap::ArgAction::Count)]
	verbosity: u8,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
	/// Regenerate the fixtures
	Generate {
		/// Rebuild even when no watched file changed
		#[arg(short, long)]
		force: bool,
	},

	/// Report whether the fixtures need rebuilding
	Check,

	/// Delete generated fixture files
	Clean,
}

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();
	init_tracing(cli.verbosity);

	match run(cli).await {
		Ok(code) => code,
		Err(e) => {
			eprintln!("Error: {:#}", e);
			ExitCode::FAILURE
		}
	}
}

/// `RUST_LOG` wins over `-v`.
fn init_tracing(verbosity: u8) {
	let default = match verbosity {
		0 => "fixture_builder=info",
		1 => "fixture_builder=debug",
		_ => "debug",
	};
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(false)
		.with_writer(std::io::stderr)
		.init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
	let settings = Settings::load(&cli.config)?;
	let config = settings.to_config()?;

	let force = match cli.command {
		Commands::Clean => {
			let removed = clean_fixtures(&config)?;
			println!("Removed {} fixture file(s)", removed);
			return Ok(ExitCode::SUCCESS);
		}
		Commands::Check => {
			return if fixtures_stale(&config)? {
				println!("Fixtures are stale");
				Ok(ExitCode::FAILURE)
			} else {
				println!("Fixtures are up to date");
				Ok(ExitCode::SUCCESS)
			};
		}
		Commands::Generate { force } => force,
	};

	let factory = settings.factory()?;
	let backend = SqliteBackend::connect(&settings.database_url).await?;
	info!("Connected to {}", settings.database_url);
	let builder = FixtureBuilder::new(config, Arc::new(backend), Arc::new(factory));

	let outcome = if force {
		builder.regenerate().await?
	} else {
		builder.generate_if_stale().await?
	};
	Ok(report(&outcome))
}

fn report(outcome: &GenerateOutcome) -> ExitCode {
	match outcome {
		GenerateOutcome::Built(report) => {
			info!("Wrote {} record(s)", report.records);
			for file in &report.files {
				println!("{}", file.display());
			}
			ExitCode::SUCCESS
		}
		GenerateOutcome::UpToDate => {
			println!("Fixtures are up to date");
			ExitCode::SUCCESS
		}
		GenerateOutcome::SetupFailed(failure) => {
			eprintln!("{}", failure);
			ExitCode::from(SETUP_FAILED)
		}
	}
}
