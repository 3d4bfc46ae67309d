//! Write a default configuration file.

use anyhow::Result;
use std::path::Path;
use tracing::info;

use crate::config::Config;

pub fn run(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    Config::default().save(path)?;
    info!("Wrote default configuration to {}", path.display());
    info!("Set gateway.account_id and the GATEWARDEN_API_TOKEN environment variable before syncing");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gatewarden.yaml");

        run(&path, false).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.feeds.len(), 1);
    }

    #[test]
    fn test_init_refuses_overwrite_without_force() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gatewarden.yaml");

        run(&path, false).unwrap();
        assert!(run(&path, false).is_err());
        assert!(run(&path, true).is_ok());
    }
}
