use anyhow::{Context, Result};
use std::{fs, path::Path};

use crate::catalog::Preset;
use crate::core::display;

pub const CATALOG_DIR: &str = "database/catalog";

/// Writes the built-in catalogs as editable files. Existing files are left alone.
pub fn scaffold(root: &Path) -> Result<Vec<String>> {
	let catalog_dir = root.join(CATALOG_DIR);
	fs::create_dir_all(&catalog_dir)
		.with_context(|| format!("creating {}", display(&catalog_dir)))?;

	let mut written = Vec::new();
	for preset in [Preset::All, Preset::Electronics] {
		let path = catalog_dir.join(preset.file_name());
		if path.exists() {
			println!("kept existing {}", display(&path));
			continue;
		}
		fs::write(&path, preset.source()).with_context(|| format!("writing {}", display(&path)))?;
		written.push(display(&path));
	}

	if written.is_empty() {
		println!("Nothing to scaffold in {}", display(&catalog_dir));
	} else {
		println!("Scaffolded {}", written.join(", "));
	}
	Ok(written)
}
