//! Product catalogs: TOML files of `[[product]]` tables, either compiled in as
//! presets or read from disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::core::display;
use crate::error::SeedError;

static HTTP_URL: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^https?://\S+$").expect("url pattern is valid"));

/// A product as written in a catalog file. Timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Product {
	pub name: String,
	pub description: String,
	/// Smallest currency unit.
	pub price: i64,
	pub category: String,
	pub in_stock: u32,
	pub image_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Catalog {
	#[serde(default, rename = "product")]
	pub products: Vec<Product>,
}

/// Products sharing a category, submitted to the store as one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryBatch<'a> {
	pub category: &'a str,
	pub products: Vec<&'a Product>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
	/// Ten products in each of the seven storefront categories.
	All,
	/// The ten Electronics products on their own.
	Electronics,
}

impl Preset {
	pub fn file_name(self) -> &'static str {
		match self {
			Self::All => "all_categories.toml",
			Self::Electronics => "electronics.toml",
		}
	}

	pub fn source(self) -> &'static str {
		match self {
			Self::All => include_str!("../catalog/all_categories.toml"),
			Self::Electronics => include_str!("../catalog/electronics.toml"),
		}
	}
}

#[derive(Debug, Clone)]
pub enum CatalogSource {
	Preset(Preset),
	Path(PathBuf),
}

impl CatalogSource {
	pub fn describe(&self) -> String {
		match self {
			Self::Preset(p) => format!("preset {}", p.file_name()),
			Self::Path(path) => display(path),
		}
	}
}

impl Catalog {
	pub fn parse(raw: &str) -> Result<Self> {
		Ok(toml::from_str(raw)?)
	}

	pub fn load(source: &CatalogSource) -> Result<Self> {
		let catalog = match source {
			CatalogSource::Preset(preset) => Self::parse(preset.source())
				.with_context(|| format!("parsing built-in {}", preset.file_name()))?,
			CatalogSource::Path(path) if path.is_dir() => Self::load_dir(path)?,
			CatalogSource::Path(path) => Self::load_file(path)?,
		};
		catalog.validate()?;
		Ok(catalog)
	}

	fn load_file(path: &Path) -> Result<Self> {
		let raw = fs::read_to_string(path).with_context(|| format!("reading {}", display(path)))?;
		Self::parse(&raw).with_context(|| format!("parsing {}", display(path)))
	}

	fn load_dir(dir: &Path) -> Result<Self> {
		let mut files: Vec<PathBuf> = WalkDir::new(dir)
			.follow_links(true)
			.into_iter()
			.filter_map(|e| e.ok())
			.filter(|e| e.file_type().is_file())
			.map(|e| e.into_path())
			.filter(|p| p.extension().and_then(|s| s.to_str()) == Some("toml"))
			.collect();
		files.sort();

		if files.is_empty() {
			return Err(anyhow!("no .toml catalog files found in {}", display(dir)));
		}

		let mut merged = Catalog::default();
		for path in files {
			let part = Self::load_file(&path)?;
			let file = display(&path);
			tracing::debug!(file = %file, products = part.products.len(), "loaded catalog file");
			merged.products.extend(part.products);
		}
		Ok(merged)
	}

	/// Collects every problem instead of stopping at the first one.
	pub fn validate(&self) -> Result<(), SeedError> {
		let mut problems = Vec::new();
		if self.products.is_empty() {
			problems.push("catalog contains no products".to_string());
		}

		for (idx, p) in self.products.iter().enumerate() {
			let label = if p.name.trim().is_empty() {
				format!("product #{}", idx + 1)
			} else {
				format!("product #{} ({})", idx + 1, p.name)
			};
			for (field, value) in [
				("name", &p.name),
				("description", &p.description),
				("category", &p.category),
				("image_url", &p.image_url),
			] {
				if value.trim().is_empty() {
					problems.push(format!("{label}: {field} is empty"));
				}
			}
			if p.price <= 0 {
				problems.push(format!("{label}: price must be positive, got {}", p.price));
			}
			if !p.image_url.trim().is_empty() && !HTTP_URL.is_match(&p.image_url) {
				problems.push(format!("{label}: image_url is not an http(s) URL"));
			}
		}

		if problems.is_empty() {
			Ok(())
		} else {
			Err(SeedError::InvalidCatalog(problems))
		}
	}

	/// Groups products by category, categories in first-seen order.
	pub fn batches(&self) -> Vec<CategoryBatch<'_>> {
		let mut batches: Vec<CategoryBatch<'_>> = Vec::new();
		for product in &self.products {
			match batches.iter_mut().find(|b| b.category == product.category) {
				Some(batch) => batch.products.push(product),
				None => batches.push(CategoryBatch {
					category: &product.category,
					products: vec![product],
				}),
			}
		}
		batches
	}

	pub fn categories(&self) -> Vec<String> {
		self.batches()
			.into_iter()
			.map(|b| b.category.to_string())
			.collect()
	}
}
