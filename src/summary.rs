use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use surrealdb::{Surreal, engine::any::Any};
use surrealdb_types::SurrealValue;

use crate::error::SeedError;

#[derive(Debug, SurrealValue)]
struct CategoryCountRow {
	category: Option<String>,
	count: i64,
}

#[derive(Debug, SurrealValue)]
struct CountRow {
	count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
	pub category: String,
	pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
	pub table: String,
	/// Requested categories, in request order, zero when absent.
	pub categories: Vec<CategoryCount>,
	/// Categories present in the table that were not requested.
	pub other: Vec<CategoryCount>,
	pub total: usize,
}

impl Summary {
	fn empty(table: &str, categories: &[String]) -> Self {
		Self {
			table: table.to_string(),
			categories: categories
				.iter()
				.map(|category| CategoryCount {
					category: category.clone(),
					count: 0,
				})
				.collect(),
			other: Vec::new(),
			total: 0,
		}
	}

	#[cfg(test)]
	pub fn count(&self, category: &str) -> Option<usize> {
		self.categories
			.iter()
			.chain(&self.other)
			.find(|c| c.category == category)
			.map(|c| c.count)
	}
}

pub async fn report_summary(
	db: &Surreal<Any>,
	table: &str,
	categories: &[String],
) -> Result<Summary, SeedError> {
	let sql = format!(
		"SELECT category, count() AS count FROM {table} GROUP BY category;\n\
		 SELECT count() AS count FROM {table} GROUP ALL;"
	);
	let mut resp = match db.query(sql).await.and_then(|r| r.check()) {
		Ok(resp) => resp,
		Err(err) if is_missing_table(&err) => return Ok(Summary::empty(table, categories)),
		Err(err) => return Err(SeedError::ReadFailure(err)),
	};
	let grouped: Vec<CategoryCountRow> = resp.take(0).map_err(SeedError::ReadFailure)?;
	let totals: Vec<CountRow> = resp.take(1).map_err(SeedError::ReadFailure)?;

	let mut found: Vec<CategoryCount> = grouped
		.into_iter()
		.map(|row| CategoryCount {
			category: row.category.unwrap_or_default(),
			count: as_count(row.count),
		})
		.collect();

	let requested = categories
		.iter()
		.map(|category| {
			let count = found
				.iter()
				.find(|c| &c.category == category)
				.map_or(0, |c| c.count);
			CategoryCount {
				category: category.clone(),
				count,
			}
		})
		.collect();
	found.retain(|c| !categories.contains(&c.category));
	found.sort_by(|a, b| a.category.cmp(&b.category));

	Ok(Summary {
		table: table.to_string(),
		categories: requested,
		other: found,
		total: totals.first().map_or(0, |row| as_count(row.count)),
	})
}

pub async fn count_all(db: &Surreal<Any>, table: &str) -> Result<usize, SeedError> {
	let sql = format!("SELECT count() AS count FROM {table} GROUP ALL;");
	let mut resp = match db.query(sql).await.and_then(|r| r.check()) {
		Ok(resp) => resp,
		Err(err) if is_missing_table(&err) => return Ok(0),
		Err(err) => return Err(SeedError::ReadFailure(err)),
	};
	let rows: Vec<CountRow> = resp.take(0).map_err(SeedError::ReadFailure)?;
	Ok(rows.first().map_or(0, |row| as_count(row.count)))
}

/// A table that was never written to counts as empty.
fn is_missing_table(err: &surrealdb::Error) -> bool {
	let msg = err.to_string().to_ascii_lowercase();
	msg.contains("table") && msg.contains("does not exist")
}

fn as_count(raw: i64) -> usize {
	usize::try_from(raw).unwrap_or(0)
}

pub async fn run_summary(
	db: &Surreal<Any>,
	table: &str,
	categories: &[String],
	json_out: Option<&Path>,
) -> Result<()> {
	let summary = report_summary(db, table, categories).await?;
	print_human_summary(&summary);
	if let Some(path) = json_out {
		write_json_report(path, &summary)?;
	}
	Ok(())
}

pub fn print_human_summary(summary: &Summary) {
	println!("Summary for {}:", summary.table);
	let width = summary
		.categories
		.iter()
		.chain(&summary.other)
		.map(|c| c.category.len())
		.max()
		.unwrap_or(0);
	for c in &summary.categories {
		println!("  {:<width$}  {}", c.category, c.count);
	}
	if !summary.other.is_empty() {
		println!("  other categories:");
		for c in &summary.other {
			let label = if c.category.is_empty() {
				"(none)"
			} else {
				c.category.as_str()
			};
			println!("  {:<width$}  {}", label, c.count);
		}
	}
	println!("Total products: {}", summary.total);
}

pub fn write_json_report<T: Serialize>(path: &Path, report: &T) -> Result<()> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent)
			.with_context(|| format!("creating report directory {}", parent.display()))?;
	}
	let raw = serde_json::to_string_pretty(report).context("serializing report json")?;
	fs::write(path, format!("{raw}\n"))
		.with_context(|| format!("writing report file {}", path.display()))?;
	Ok(())
}
