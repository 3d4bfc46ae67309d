//! Persistent run state: per-feed statistics from the last successful
//! sync, serialized as JSON next to the artifacts.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::normalize::RejectStats;

/// Statistics for one feed from one sync run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedRunStats {
    pub name: String,
    /// Raw lines seen across all sources
    pub raw_lines: usize,
    /// Valid unique domains before cross-feed dedup and pruning
    pub candidates: usize,
    /// Removed because a higher-priority feed already blocks them
    pub deduped: usize,
    /// Removed as strict subdomains of another blocked domain
    pub pruned: usize,
    /// Final block-set size pushed to the gateway
    pub blocked: usize,
    pub chunks: usize,
    pub rejected_invalid: usize,
    pub rejected_punycode: usize,
    pub rejected_tld: usize,
    pub rejected_keyword: usize,
}

impl FeedRunStats {
    pub fn from_rejects(name: &str, rejects: &RejectStats) -> Self {
        Self {
            name: name.to_string(),
            raw_lines: rejects.raw_lines,
            candidates: rejects.accepted,
            rejected_invalid: rejects.invalid,
            rejected_punycode: rejects.punycode,
            rejected_tld: rejects.by_tld.values().sum(),
            rejected_keyword: rejects.by_keyword.values().sum(),
            ..Default::default()
        }
    }
}

/// Everything remembered between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunState {
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default)]
    pub feeds: Vec<FeedRunStats>,
}

impl RunState {
    /// Load state from disk. A missing file is a fresh start, not an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize state")?;

        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = dir {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }
        let mut tmp = match dir {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }
        .context("Failed to create temporary file")?;
        tmp.write_all(content.as_bytes())
            .context("Failed to write state")?;
        tmp.persist(path)
            .with_context(|| format!("Failed to persist state to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_is_default() {
        let dir = tempdir().unwrap();
        let state = RunState::load(&dir.path().join("missing.json")).unwrap();
        assert!(state.last_sync.is_none());
        assert!(state.feeds.is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let state = RunState {
            last_sync: Some(Utc::now()),
            feeds: vec![FeedRunStats {
                name: "ads".to_string(),
                raw_lines: 100_000,
                candidates: 80_000,
                deduped: 0,
                pruned: 5_000,
                blocked: 75_000,
                chunks: 75,
                rejected_invalid: 12,
                rejected_punycode: 3,
                rejected_tld: 40,
                rejected_keyword: 0,
            }],
        };
        state.save(&path).unwrap();

        let loaded = RunState::load(&path).unwrap();
        assert!(loaded.last_sync.is_some());
        assert_eq!(loaded.feeds.len(), 1);
        assert_eq!(loaded.feeds[0].blocked, 75_000);
        assert_eq!(loaded.feeds[0].chunks, 75);
    }

    #[test]
    fn test_load_corrupt_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(RunState::load(&path).is_err());
    }

    #[test]
    fn test_from_rejects_maps_counters() {
        let mut rejects = RejectStats::default();
        rejects.raw_lines = 10;
        rejects.accepted = 7;
        rejects.invalid = 2;
        rejects.punycode = 1;

        let stats = FeedRunStats::from_rejects("ads", &rejects);
        assert_eq!(stats.name, "ads");
        assert_eq!(stats.raw_lines, 10);
        assert_eq!(stats.candidates, 7);
        assert_eq!(stats.rejected_invalid, 2);
        assert_eq!(stats.rejected_punycode, 1);
    }
}
