use std::path::Path;
use surrealdb::{
	Surreal,
	engine::any::{Any, connect},
	opt::{Config, capabilities::Capabilities},
};

pub async fn create_surreal_client(address: &str) -> Result<Surreal<Any>, surrealdb::Error> {
	let config =
		Config::new().capabilities(Capabilities::all().with_all_experimental_features_allowed());

	connect((address, config)).await
}

pub async fn exec_surql(db: &Surreal<Any>, sql: &str) -> anyhow::Result<()> {
	db.query(sql).await?.check()?;
	Ok(())
}

pub fn display(p: &Path) -> String {
	p.to_string_lossy().replace('\\', "/")
}

/// Lowercase ASCII slug with runs of other characters collapsed to `_`.
pub fn slugify(input: &str) -> String {
	let mut out = String::new();
	let mut prev_dash = false;
	for ch in input.chars() {
		let c = ch.to_ascii_lowercase();
		if c.is_ascii_alphanumeric() {
			out.push(c);
			prev_dash = false;
		} else if !prev_dash {
			out.push('_');
			prev_dash = true;
		}
	}
	out.trim_matches('_').to_string()
}
