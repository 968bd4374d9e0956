use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use rust_dotenv::dotenv::DotEnv;
use tracing_subscriber::EnvFilter;

mod catalog;
mod config;
mod core;
mod error;
mod scaffold;
mod seed;
mod summary;

use catalog::{Catalog, CatalogSource, Preset};
use config::{CfgOverrides, DbCfg, connect};
use seed::{SeedMode, SeedOpts, run_seed};
use summary::run_summary;

#[derive(Parser, Debug)]
#[command(version, about = "Seed a SurrealDB products table with sample catalogs")]
pub struct Cli {
	/// Increase output
	#[arg(short, long, global = true)]
	verbose: bool,

	/// Database endpoint, e.g. http://localhost:8000 or ws://localhost:8000
	#[arg(long, global = true)]
	host: Option<String>,

	#[arg(long, global = true)]
	ns: Option<String>,

	#[arg(long, global = true)]
	db: Option<String>,

	/// Table the products are written to
	#[arg(long, global = true)]
	table: Option<String>,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Args, Debug)]
#[group(multiple = false)]
struct SourceArgs {
	/// Built-in catalog to use
	#[arg(long, value_enum)]
	preset: Option<Preset>,

	/// Catalog file, or a directory of .toml catalog files
	#[arg(long)]
	catalog: Option<PathBuf>,
}

impl SourceArgs {
	fn source(self) -> CatalogSource {
		match (self.catalog, self.preset) {
			(Some(path), _) => CatalogSource::Path(path),
			(None, preset) => CatalogSource::Preset(preset.unwrap_or(Preset::All)),
		}
	}
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Write the built-in catalogs to database/catalog for editing
	Init,
	/// Insert a catalog one category batch at a time, then print counts
	Seed {
		#[command(flatten)]
		source: SourceArgs,
		#[arg(long, value_enum, default_value_t = SeedMode::Append)]
		mode: SeedMode,
		/// Delete existing products first
		#[arg(long)]
		clear: bool,
		/// Do nothing when the table already holds products
		#[arg(long)]
		if_empty: bool,
		#[arg(long)]
		dry_run: bool,
		#[arg(long)]
		json_out: Option<PathBuf>,
	},
	/// Print product counts per category and in total
	Summary {
		/// Categories to report; defaults to those of the full catalog
		#[arg(long = "category")]
		categories: Vec<String>,
		#[arg(long)]
		json_out: Option<PathBuf>,
	},
	/// Check a catalog without touching the database
	Validate {
		#[command(flatten)]
		source: SourceArgs,
	},
}

fn init_tracing(verbose: bool) {
	let default = if verbose { "debug" } else { "info" };
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(false)
		.init();
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Cli::parse();
	init_tracing(args.verbose);

	// Loads .env in CWD if present.
	let env = DotEnv::new("");
	let overrides = CfgOverrides {
		host: args.host,
		ns: args.ns,
		db: args.db,
		table: args.table,
	};

	match args.command {
		Commands::Init => {
			scaffold::scaffold(Path::new("."))?;
		}
		Commands::Seed {
			source,
			mode,
			clear,
			if_empty,
			dry_run,
			json_out,
		} => {
			let cfg = DbCfg::from_env(&env)?.with_overrides(overrides)?;
			let opts = SeedOpts {
				mode,
				clear,
				if_empty,
				dry_run,
			};
			run_seed(&cfg, &source.source(), &opts, json_out.as_deref()).await?;
		}
		Commands::Summary {
			categories,
			json_out,
		} => {
			let cfg = DbCfg::from_env(&env)?.with_overrides(overrides)?;
			let categories = if categories.is_empty() {
				Catalog::load(&CatalogSource::Preset(Preset::All))?.categories()
			} else {
				categories
			};
			let db = connect(&cfg).await?;
			run_summary(&db, cfg.table(), &categories, json_out.as_deref()).await?;
		}
		Commands::Validate { source } => {
			let source = source.source();
			let catalog = Catalog::load(&source)?;
			println!(
				"{}: {} products, valid",
				source.describe(),
				catalog.products.len()
			);
			for batch in catalog.batches() {
				println!("  {}  {}", batch.category, batch.products.len());
			}
		}
	}

	Ok(())
}
