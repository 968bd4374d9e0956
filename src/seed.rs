use std::fmt::Write as _;
use std::path::Path;
use std::time::Instant;

use anyhow::{Result, bail};
use clap::ValueEnum;
use serde::Serialize;
use surrealdb::{Surreal, engine::any::Any};
use surrealdb_types::SurrealValue;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::catalog::{Catalog, CatalogSource, CategoryBatch, Product};
use crate::config::{DbCfg, connect};
use crate::core::{exec_surql, slugify};
use crate::error::SeedError;
use crate::summary::{Summary, count_all, print_human_summary, report_summary, write_json_report};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedMode {
	/// Insert every record as a new document; re-running duplicates them.
	#[default]
	Append,
	/// Key records on their name so re-running updates in place.
	Upsert,
}

#[derive(Debug, Clone, Default)]
pub struct SeedOpts {
	pub mode: SeedMode,
	pub clear: bool,
	pub if_empty: bool,
	pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
	pub category: String,
	pub products: usize,
	pub error: Option<String>,
}

impl BatchOutcome {
	pub fn succeeded(&self) -> bool {
		self.error.is_none()
	}
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedOutcome {
	/// The table already held records and `if_empty` was requested.
	pub skipped: bool,
	pub cleared: bool,
	pub dry_run: bool,
	pub batches: Vec<BatchOutcome>,
}

impl SeedOutcome {
	pub fn written(&self) -> usize {
		if self.dry_run {
			return 0;
		}
		self.batches
			.iter()
			.filter(|b| b.succeeded())
			.map(|b| b.products)
			.sum()
	}

	pub fn failed(&self) -> usize {
		self.batches.iter().filter(|b| !b.succeeded()).count()
	}
}

/// Row shape bound into the insert statements.
#[derive(Debug, Clone, SurrealValue)]
struct ProductRow {
	name: String,
	description: String,
	price: i64,
	category: String,
	in_stock: i64,
	image_url: String,
}

impl From<&Product> for ProductRow {
	fn from(p: &Product) -> Self {
		Self {
			name: p.name.clone(),
			description: p.description.clone(),
			price: p.price,
			category: p.category.clone(),
			in_stock: i64::from(p.in_stock),
			image_url: p.image_url.clone(),
		}
	}
}

pub struct Seeder<'a> {
	db: &'a Surreal<Any>,
	table: &'a str,
}

impl<'a> Seeder<'a> {
	pub fn new(db: &'a Surreal<Any>, table: &'a str) -> Self {
		Self { db, table }
	}

	/// Submits one batch per category, in catalog order. A failed batch is
	/// recorded in the outcome and the remaining categories are still attempted.
	pub async fn seed_catalog(&self, catalog: &Catalog, opts: &SeedOpts) -> Result<SeedOutcome> {
		let mut outcome = SeedOutcome {
			dry_run: opts.dry_run,
			..Default::default()
		};

		if !opts.dry_run {
			exec_surql(
				self.db,
				&format!("DEFINE TABLE IF NOT EXISTS {} SCHEMALESS;", self.table),
			)
			.await?;
		}

		if opts.if_empty {
			let existing = count_all(self.db, self.table).await?;
			if existing > 0 {
				if opts.dry_run {
					println!(
						"DRY RUN: would skip seed, {} already holds {} products",
						self.table, existing
					);
				} else {
					tracing::info!(
						table = self.table,
						existing,
						"table already holds products, skipping seed"
					);
				}
				outcome.skipped = true;
				return Ok(outcome);
			}
		}

		if opts.clear {
			if opts.dry_run {
				println!("DRY RUN: would delete every record in {}", self.table);
			} else {
				exec_surql(self.db, &format!("DELETE {};", self.table)).await?;
				tracing::info!(table = self.table, "cleared existing products");
				outcome.cleared = true;
			}
		}

		for batch in catalog.batches() {
			let products = batch.products.len();
			if opts.dry_run {
				println!(
					"DRY RUN: would {} {} {} products into {}",
					verb(opts.mode),
					products,
					batch.category,
					self.table
				);
				outcome.batches.push(BatchOutcome {
					category: batch.category.to_string(),
					products,
					error: None,
				});
				continue;
			}

			let error = match self.insert_batch(&batch, opts.mode).await {
				Ok(()) => {
					tracing::info!(category = batch.category, products, "seeded batch");
					None
				}
				Err(err) => {
					tracing::warn!(category = batch.category, error = %err, "batch failed");
					Some(err.to_string())
				}
			};
			outcome.batches.push(BatchOutcome {
				category: batch.category.to_string(),
				products,
				error,
			});
		}

		Ok(outcome)
	}

	/// All-or-nothing: the batch runs in one transaction with a single timestamp.
	async fn insert_batch(&self, batch: &CategoryBatch<'_>, mode: SeedMode) -> Result<(), SeedError> {
		let rows: Vec<ProductRow> = batch.products.iter().map(|p| ProductRow::from(*p)).collect();
		let sql = match mode {
			SeedMode::Append => append_sql(self.table),
			SeedMode::Upsert => upsert_sql(self.table, &batch.products),
		};

		self.db
			.query(sql)
			.bind(("records", rows))
			.await
			.and_then(|r| r.check())
			.map(|_| ())
			.map_err(|source| SeedError::WriteFailure {
				category: batch.category.to_string(),
				source,
			})
	}
}

fn verb(mode: SeedMode) -> &'static str {
	match mode {
		SeedMode::Append => "insert",
		SeedMode::Upsert => "upsert",
	}
}

fn append_sql(table: &str) -> String {
	format!(
		"BEGIN TRANSACTION;
LET $now = time::now();
FOR $p IN $records {{
	CREATE {table} SET
		name = $p.name,
		description = $p.description,
		price = $p.price,
		category = $p.category,
		in_stock = $p.in_stock,
		image_url = $p.image_url,
		created_at = $now,
		updated_at = $now;
}};
COMMIT TRANSACTION;"
	)
}

fn upsert_sql(table: &str, products: &[&Product]) -> String {
	let mut sql = String::from("BEGIN TRANSACTION;\nLET $now = time::now();\n");
	for (idx, product) in products.iter().enumerate() {
		let _ = writeln!(
			sql,
			"UPSERT {table}:⟨{key}⟩ SET \
			 name = $records[{idx}].name, \
			 description = $records[{idx}].description, \
			 price = $records[{idx}].price, \
			 category = $records[{idx}].category, \
			 in_stock = $records[{idx}].in_stock, \
			 image_url = $records[{idx}].image_url, \
			 created_at = created_at ?? $now, \
			 updated_at = $now;",
			key = record_key(&product.name),
		);
	}
	sql.push_str("COMMIT TRANSACTION;");
	sql
}

/// Stable record key derived from a product name.
pub fn record_key(name: &str) -> String {
	let slug = slugify(name);
	if !slug.is_empty() {
		return slug;
	}
	let mut hex = String::from("x");
	for byte in name.as_bytes() {
		let _ = write!(hex, "{byte:02x}");
	}
	hex
}

#[derive(Debug, Serialize)]
struct SeedReport<'a> {
	started_at: String,
	finished_at: String,
	duration_ms: u128,
	source: String,
	mode: SeedMode,
	outcome: &'a SeedOutcome,
	summary: Option<&'a Summary>,
}

/// Loads and validates the catalog before connecting, then seeds it and
/// prints the outcome and the resulting counts.
pub async fn run_seed(
	cfg: &DbCfg,
	source: &CatalogSource,
	opts: &SeedOpts,
	json_out: Option<&Path>,
) -> Result<()> {
	let catalog = Catalog::load(source)?;
	tracing::info!(
		source = %source.describe(),
		products = catalog.products.len(),
		host = cfg.host(),
		db = cfg.db(),
		table = cfg.table(),
		"seeding catalog"
	);

	let db = connect(cfg).await?;
	seed_and_report(&db, cfg.table(), &catalog, source, opts, json_out).await
}

/// Seeds an already loaded catalog and reports on it. Fails when any category
/// batch failed, after every batch was attempted and the report written.
async fn seed_and_report(
	db: &Surreal<Any>,
	table: &str,
	catalog: &Catalog,
	source: &CatalogSource,
	opts: &SeedOpts,
	json_out: Option<&Path>,
) -> Result<()> {
	let started_at = OffsetDateTime::now_utc();
	let run_start = Instant::now();
	let outcome = Seeder::new(db, table).seed_catalog(catalog, opts).await?;

	print_human_outcome(&outcome);
	let summary = if opts.dry_run {
		None
	} else {
		let summary = report_summary(db, table, &catalog.categories()).await?;
		print_human_summary(&summary);
		Some(summary)
	};

	if let Some(path) = json_out {
		let report = SeedReport {
			started_at: started_at.format(&Rfc3339)?,
			finished_at: OffsetDateTime::now_utc().format(&Rfc3339)?,
			duration_ms: run_start.elapsed().as_millis(),
			source: source.describe(),
			mode: opts.mode,
			outcome: &outcome,
			summary: summary.as_ref(),
		};
		write_json_report(path, &report)?;
	}

	if outcome.failed() > 0 {
		bail!(
			"{} of {} category batches failed",
			outcome.failed(),
			outcome.batches.len()
		);
	}
	Ok(())
}

fn print_human_outcome(outcome: &SeedOutcome) {
	if outcome.skipped {
		println!("Skipped: table already holds products");
		return;
	}
	if outcome.dry_run {
		return;
	}
	for batch in &outcome.batches {
		match &batch.error {
			None => println!("seeded {} ({} products)", batch.category, batch.products),
			Some(err) => println!("FAIL {} ({} products) {}", batch.category, batch.products, err),
		}
	}
	println!(
		"Inserted {} products in {} batches, {} failed",
		outcome.written(),
		outcome.batches.len(),
		outcome.failed()
	);
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::Preset;
	use crate::config::memory_db;

	const TABLE: &str = "products";

	fn preset(preset: Preset) -> Catalog {
		Catalog::load(&CatalogSource::Preset(preset)).unwrap()
	}

	fn opts(mode: SeedMode) -> SeedOpts {
		SeedOpts {
			mode,
			..Default::default()
		}
	}

	async fn summary(db: &Surreal<Any>, catalog: &Catalog) -> Summary {
		report_summary(db, TABLE, &catalog.categories()).await.unwrap()
	}

	#[derive(Debug, SurrealValue)]
	struct Stamp {
		created_at: Option<String>,
	}

	#[tokio::test]
	async fn full_catalog_seeds_ten_per_category() {
		let db = memory_db().await;
		let catalog = preset(Preset::All);

		let outcome = Seeder::new(&db, TABLE)
			.seed_catalog(&catalog, &opts(SeedMode::Append))
			.await
			.unwrap();
		assert_eq!(outcome.batches.len(), 7);
		assert_eq!(outcome.failed(), 0);
		assert_eq!(outcome.written(), 70);

		let summary = summary(&db, &catalog).await;
		assert_eq!(summary.total, 70);
		for c in &summary.categories {
			assert_eq!(c.count, 10, "{}", c.category);
		}
		assert!(summary.other.is_empty());
	}

	#[tokio::test]
	async fn electronics_subset_seeds_only_electronics() {
		let db = memory_db().await;
		let catalog = preset(Preset::Electronics);
		Seeder::new(&db, TABLE)
			.seed_catalog(&catalog, &opts(SeedMode::Append))
			.await
			.unwrap();

		let summary = summary(&db, &catalog).await;
		assert_eq!(summary.total, 10);
		assert_eq!(summary.count("Electronics"), Some(10));
		assert!(summary.other.is_empty());
	}

	#[tokio::test]
	async fn appending_twice_doubles_counts() {
		let db = memory_db().await;
		let catalog = preset(Preset::All);
		let seeder = Seeder::new(&db, TABLE);
		seeder.seed_catalog(&catalog, &opts(SeedMode::Append)).await.unwrap();
		seeder.seed_catalog(&catalog, &opts(SeedMode::Append)).await.unwrap();

		let summary = summary(&db, &catalog).await;
		assert_eq!(summary.total, 140);
		assert_eq!(summary.count("Home & Garden"), Some(20));
	}

	#[tokio::test]
	async fn stored_records_carry_fields_and_timestamps() {
		let db = memory_db().await;
		Seeder::new(&db, TABLE)
			.seed_catalog(&preset(Preset::All), &opts(SeedMode::Append))
			.await
			.unwrap();

		let mut resp = db
			.query(
				"SELECT count() AS count FROM products WHERE
					created_at = NONE OR created_at = NULL
					OR updated_at = NONE OR updated_at = NULL
					OR price <= 0 OR in_stock < 0
					OR name = '' OR description = '' OR category = '' OR image_url = ''
				GROUP ALL;",
			)
			.await
			.unwrap()
			.check()
			.unwrap();
		let bad: Option<serde_json::Value> = resp.take(0).unwrap();
		assert_eq!(bad.map_or(0, |v| v["count"].as_i64().unwrap_or(-1)), 0);

		let mut resp = db
			.query("SELECT count() AS count FROM products WHERE created_at = updated_at GROUP ALL;")
			.await
			.unwrap();
		let same: Option<serde_json::Value> = resp.take(0).unwrap();
		assert_eq!(same.and_then(|v| v["count"].as_i64()), Some(70));
	}

	#[tokio::test]
	async fn upsert_is_idempotent_and_refreshes_updated_at() {
		let db = memory_db().await;
		let catalog = preset(Preset::All);
		let seeder = Seeder::new(&db, TABLE);
		seeder.seed_catalog(&catalog, &opts(SeedMode::Upsert)).await.unwrap();

		let fresh: Vec<bool> = db
			.query("SELECT VALUE updated_at = created_at FROM products:⟨wireless_bluetooth_earbuds⟩;")
			.await
			.unwrap()
			.take(0)
			.unwrap();
		assert_eq!(fresh, vec![true]);

		let stamp_sql = "SELECT <string> created_at AS created_at FROM products:⟨wireless_bluetooth_earbuds⟩;";
		let before: Option<Stamp> = db.query(stamp_sql).await.unwrap().take(0).unwrap();

		seeder.seed_catalog(&catalog, &opts(SeedMode::Upsert)).await.unwrap();
		let after: Option<Stamp> = db.query(stamp_sql).await.unwrap().take(0).unwrap();

		let summary = summary(&db, &catalog).await;
		assert_eq!(summary.total, 70);
		assert_eq!(summary.count("Toys"), Some(10));

		let before = before.and_then(|s| s.created_at);
		assert!(before.is_some());
		assert_eq!(before, after.and_then(|s| s.created_at));

		let refreshed: Vec<bool> = db
			.query("SELECT VALUE updated_at > created_at FROM products:⟨wireless_bluetooth_earbuds⟩;")
			.await
			.unwrap()
			.take(0)
			.unwrap();
		assert_eq!(refreshed, vec![true]);
	}

	#[tokio::test]
	async fn if_empty_leaves_populated_table_alone() {
		let db = memory_db().await;
		let seeder = Seeder::new(&db, TABLE);
		seeder
			.seed_catalog(&preset(Preset::Electronics), &opts(SeedMode::Append))
			.await
			.unwrap();

		let outcome = seeder
			.seed_catalog(
				&preset(Preset::All),
				&SeedOpts {
					if_empty: true,
					..Default::default()
				},
			)
			.await
			.unwrap();
		assert!(outcome.skipped);
		assert!(outcome.batches.is_empty());
		assert_eq!(count_all(&db, TABLE).await.unwrap(), 10);
	}

	#[tokio::test]
	async fn if_empty_seeds_an_empty_table() {
		let db = memory_db().await;
		let outcome = Seeder::new(&db, TABLE)
			.seed_catalog(
				&preset(Preset::Electronics),
				&SeedOpts {
					if_empty: true,
					..Default::default()
				},
			)
			.await
			.unwrap();
		assert!(!outcome.skipped);
		assert_eq!(count_all(&db, TABLE).await.unwrap(), 10);
	}

	#[tokio::test]
	async fn clear_replaces_existing_records() {
		let db = memory_db().await;
		let seeder = Seeder::new(&db, TABLE);
		let electronics = preset(Preset::Electronics);
		seeder.seed_catalog(&electronics, &opts(SeedMode::Append)).await.unwrap();
		seeder.seed_catalog(&electronics, &opts(SeedMode::Append)).await.unwrap();

		let catalog = preset(Preset::All);
		let outcome = seeder
			.seed_catalog(
				&catalog,
				&SeedOpts {
					clear: true,
					..Default::default()
				},
			)
			.await
			.unwrap();
		assert!(outcome.cleared);

		let summary = summary(&db, &catalog).await;
		assert_eq!(summary.total, 70);
		assert_eq!(summary.count("Electronics"), Some(10));
	}

	#[tokio::test]
	async fn rejected_category_does_not_stop_the_others() {
		let db = memory_db().await;
		exec_surql(
			&db,
			"DEFINE TABLE products SCHEMALESS;
			 DEFINE FIELD category ON products TYPE string ASSERT $value != 'Books';",
		)
		.await
		.unwrap();

		let catalog = preset(Preset::All);
		let outcome = Seeder::new(&db, TABLE)
			.seed_catalog(&catalog, &opts(SeedMode::Append))
			.await
			.unwrap();

		assert_eq!(outcome.batches.len(), 7);
		assert_eq!(outcome.failed(), 1);
		let failed: Vec<&str> = outcome
			.batches
			.iter()
			.filter(|b| !b.succeeded())
			.map(|b| b.category.as_str())
			.collect();
		assert_eq!(failed, vec!["Books"]);
		assert_eq!(outcome.written(), 60);

		let summary = summary(&db, &catalog).await;
		assert_eq!(summary.total, 60);
		assert_eq!(summary.count("Books"), Some(0));
		assert_eq!(summary.count("Toys"), Some(10));
	}

	#[tokio::test]
	async fn dry_run_writes_nothing() {
		let db = memory_db().await;
		exec_surql(&db, "DEFINE TABLE products SCHEMALESS;").await.unwrap();

		let outcome = Seeder::new(&db, TABLE)
			.seed_catalog(
				&preset(Preset::All),
				&SeedOpts {
					dry_run: true,
					clear: true,
					..Default::default()
				},
			)
			.await
			.unwrap();
		assert_eq!(outcome.batches.len(), 7);
		assert_eq!(outcome.written(), 0);
		assert!(!outcome.cleared);
		assert_eq!(count_all(&db, TABLE).await.unwrap(), 0);
	}

	#[tokio::test]
	async fn dry_run_reports_if_empty_skip() {
		let db = memory_db().await;
		let seeder = Seeder::new(&db, TABLE);
		let if_empty_dry = SeedOpts {
			if_empty: true,
			dry_run: true,
			..Default::default()
		};

		let fresh = seeder.seed_catalog(&preset(Preset::All), &if_empty_dry).await.unwrap();
		assert!(!fresh.skipped);
		assert_eq!(fresh.batches.len(), 7);

		seeder
			.seed_catalog(&preset(Preset::Electronics), &opts(SeedMode::Append))
			.await
			.unwrap();
		let populated = seeder.seed_catalog(&preset(Preset::All), &if_empty_dry).await.unwrap();
		assert!(populated.skipped);
		assert!(populated.batches.is_empty());
		assert_eq!(count_all(&db, TABLE).await.unwrap(), 10);
	}

	#[tokio::test]
	async fn failed_category_fails_the_run_after_writing_the_report() {
		let db = memory_db().await;
		exec_surql(
			&db,
			"DEFINE TABLE products SCHEMALESS;
			 DEFINE FIELD category ON products TYPE string ASSERT $value != 'Sports';",
		)
		.await
		.unwrap();

		let report_path = std::env::temp_dir().join(format!(
			"catalog_seed_report_{}/seed.json",
			OffsetDateTime::now_utc().unix_timestamp_nanos()
		));
		let source = CatalogSource::Preset(Preset::All);
		let err = seed_and_report(
			&db,
			TABLE,
			&preset(Preset::All),
			&source,
			&SeedOpts::default(),
			Some(&report_path),
		)
		.await
		.unwrap_err();
		assert!(err.to_string().contains("1 of 7 category batches failed"), "{err}");

		let raw = std::fs::read_to_string(&report_path).unwrap();
		let report: serde_json::Value = serde_json::from_str(&raw).unwrap();
		let batches = report["outcome"]["batches"].as_array().unwrap();
		assert_eq!(batches.len(), 7);
		let failed: Vec<&str> = batches
			.iter()
			.filter(|b| !b["error"].is_null())
			.filter_map(|b| b["category"].as_str())
			.collect();
		assert_eq!(failed, vec!["Sports"]);
		assert_eq!(report["summary"]["total"], 60);
		assert_eq!(report["mode"], "append");

		if let Some(dir) = report_path.parent() {
			std::fs::remove_dir_all(dir).unwrap();
		}
	}

	#[test]
	fn record_keys_are_stable_slugs() {
		assert_eq!(record_key("Wireless Bluetooth Earbuds"), "wireless_bluetooth_earbuds");
		assert_eq!(record_key("!!"), "x2121");
	}

	#[test]
	fn upsert_statements_reference_each_record() {
		let catalog = preset(Preset::Electronics);
		let batch = &catalog.batches()[0];
		let sql = upsert_sql(TABLE, &batch.products);
		assert!(sql.starts_with("BEGIN TRANSACTION;"));
		assert!(sql.ends_with("COMMIT TRANSACTION;"));
		assert_eq!(sql.matches("UPSERT products:⟨").count(), 10);
		assert!(sql.contains("$records[9].image_url"));
	}
}
