//! `civic init`: write a commented example configuration.

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::config::EXAMPLE_CONFIG;

pub fn run_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    std::fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote example config to {}", path.display());
    println!("Edit [document] paths, then run `civic index`.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_once_then_requires_force() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config/civic.toml");
        run_init(&path, false).unwrap();
        assert!(crate::config::load_config(&path).is_ok());
        assert!(run_init(&path, false).is_err());
        run_init(&path, true).unwrap();
    }
}
