use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use rust_dotenv::dotenv::DotEnv;
use surrealdb::{Surreal, engine::any::Any, opt::auth::Root};

use crate::core::create_surreal_client;
use crate::error::SeedError;

static IDENT: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Connection target for the loader. Everything the seed touches is named here.
#[derive(Debug, Clone)]
pub struct DbCfg {
	host: String,
	ns: String,
	db: String,
	user: String,
	pass: String,
	table: String,
}

/// Values given on the command line win over `.env` and the process environment.
#[derive(Debug, Clone, Default)]
pub struct CfgOverrides {
	pub host: Option<String>,
	pub ns: Option<String>,
	pub db: Option<String>,
	pub table: Option<String>,
}

impl DbCfg {
	pub fn from_env(env: &DotEnv) -> Result<Self> {
		Self::from_lookup(|key| env.get_var(key.to_string()))
	}

	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
		let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

		let cfg = Self {
			host: var("PUBLIC_DATABASE_HOST", "http://localhost:8000"),
			ns: var("PUBLIC_DATABASE_NAMESPACE", "shop"),
			db: var("PUBLIC_DATABASE_NAME", "e-commerce-app"),
			user: var("DATABASE_USER", "root"),
			pass: var("DATABASE_PASSWORD", "root"),
			table: var("PRODUCTS_TABLE", "products"),
		};
		cfg.validate()?;
		Ok(cfg)
	}

	pub fn with_overrides(mut self, overrides: CfgOverrides) -> Result<Self> {
		if let Some(host) = overrides.host {
			self.host = host;
		}
		if let Some(ns) = overrides.ns {
			self.ns = ns;
		}
		if let Some(db) = overrides.db {
			self.db = db;
		}
		if let Some(table) = overrides.table {
			self.table = table;
		}
		self.validate()?;
		Ok(self)
	}

	fn validate(&self) -> Result<(), SeedError> {
		if IDENT.is_match(&self.table) {
			Ok(())
		} else {
			Err(SeedError::InvalidTable(self.table.clone()))
		}
	}

	pub fn host(&self) -> &str {
		&self.host
	}

	pub fn db(&self) -> &str {
		&self.db
	}

	pub fn table(&self) -> &str {
		&self.table
	}

	fn is_embedded(&self) -> bool {
		self.host.starts_with("mem://")
	}
}

pub async fn connect(cfg: &DbCfg) -> Result<Surreal<Any>> {
	let db = create_surreal_client(&cfg.host)
		.await
		.with_context(|| format!("Failed connecting to {}", cfg.host))?;

	// The embedded engine has no users to sign in as.
	if !cfg.is_embedded() {
		db.signin(Root {
			username: cfg.user.to_string(),
			password: cfg.pass.to_string(),
		})
		.await
		.context("signin failed")?;
	}

	db.use_ns(&cfg.ns)
		.use_db(&cfg.db)
		.await
		.with_context(|| format!("use_ns/use_db failed for ns={} db={}", cfg.ns, cfg.db))?;

	tracing::debug!(host = %cfg.host, ns = %cfg.ns, db = %cfg.db, "connected");
	Ok(db)
}

/// Fresh embedded datastore with the default namespace and database selected.
#[cfg(test)]
pub(crate) async fn memory_db() -> Surreal<Any> {
	let cfg = DbCfg::from_lookup(|key| {
		(key == "PUBLIC_DATABASE_HOST").then(|| "mem://".to_string())
	})
	.expect("default config is valid");
	connect(&cfg).await.expect("embedded datastore starts")
}
