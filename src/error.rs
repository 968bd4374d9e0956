use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeedError {
	#[error("writing the {category} batch failed: {source}")]
	WriteFailure {
		category: String,
		#[source]
		source: surrealdb::Error,
	},
	#[error("reading product counts failed: {0}")]
	ReadFailure(#[source] surrealdb::Error),
	#[error("catalog has {} problem(s):\n  {}", .0.len(), .0.join("\n  "))]
	InvalidCatalog(Vec<String>),
	#[error("table name '{0}' is not a plain identifier")]
	InvalidTable(String),
}
