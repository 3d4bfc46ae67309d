//! Configuration management for gatewarden.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Default per-list item cap (vendor limit for free-tier gateway lists).
const DEFAULT_MAX_LIST_SIZE: usize = 1000;

/// Default account-wide list quota.
const DEFAULT_MAX_LISTS: usize = 300;

/// Default cap on outstanding concurrent gateway API calls.
/// Conservative to stay under the gateway's rate-limit threshold.
const DEFAULT_CONCURRENCY: usize = 5;

/// Secure string type that zeroizes memory on drop.
/// Used for the gateway API token.
#[derive(Clone, Default, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecureString(String);

impl SecureString {
    pub fn new(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Main configuration structure.
///
/// Loaded once per run and passed into the pipeline; there is no
/// process-wide mutable registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote gateway account and quota settings
    pub gateway: GatewayConfig,

    /// Domain rejection policy shared by all feeds
    pub filter: FilterConfig,

    /// Configured feeds, each with its own remote resource group
    pub feeds: Vec<FeedConfig>,

    /// Path of the persisted per-run statistics file
    pub state_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            filter: FilterConfig::default(),
            feeds: default_feeds(),
            state_file: PathBuf::from("gatewarden_state.json"),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.gateway.max_list_size == 0 {
            anyhow::bail!("gateway.max_list_size must be at least 1");
        }
        if self.gateway.concurrency == 0 {
            anyhow::bail!("gateway.concurrency must be at least 1");
        }

        let mut names = HashSet::new();
        let mut priorities = HashSet::new();
        for feed in &self.feeds {
            if feed.name.is_empty() || feed.prefix.is_empty() || feed.policy_name.is_empty() {
                anyhow::bail!("Feed name, prefix and policy_name must be non-empty");
            }
            if !names.insert(feed.name.as_str()) {
                anyhow::bail!("Duplicate feed name '{}'", feed.name);
            }
            // Priority is a total order over feeds; ties would make the
            // cross-feed dedup ambiguous.
            if !priorities.insert(feed.priority) {
                anyhow::bail!(
                    "Duplicate feed priority {} (feed '{}')",
                    feed.priority,
                    feed.name
                );
            }
            if feed.sources.is_empty() {
                anyhow::bail!("Feed '{}' has no sources", feed.name);
            }
            for source in &feed.sources {
                if !source.url.starts_with("https://") {
                    anyhow::bail!(
                        "Source '{}' of feed '{}' must use HTTPS: {}",
                        source.name,
                        feed.name,
                        source.url
                    );
                }
            }
        }

        // A prefix that is itself a prefix of another feed's prefix would
        // make remote lists match both feeds' name filters.
        for a in &self.feeds {
            for b in &self.feeds {
                if a.name != b.name && b.prefix.starts_with(&a.prefix) {
                    anyhow::bail!(
                        "Feed prefixes '{}' and '{}' overlap",
                        a.prefix,
                        b.prefix
                    );
                }
            }
        }

        Ok(())
    }

    /// Save configuration to a YAML file atomically.
    ///
    /// Uses tempfile + rename to prevent corruption on crash.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let path = path.as_ref();
        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        let parent_dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        let mut temp_file = match parent_dir {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new_in("."),
        }
        .context("Failed to create temporary file for config")?;

        temp_file.write_all(content.as_bytes())?;
        temp_file.as_file().sync_all()?;

        temp_file
            .persist(path)
            .with_context(|| format!("Failed to persist config file: {:?}", path))?;

        Ok(())
    }

    /// Feeds ordered by priority (lower number wins cross-feed dedup).
    pub fn feeds_by_priority(&self) -> Vec<&FeedConfig> {
        let mut feeds: Vec<&FeedConfig> = self.feeds.iter().collect();
        feeds.sort_by_key(|f| f.priority);
        feeds
    }
}

/// Remote gateway account settings and vendor-declared limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Gateway account identifier. Env var GATEWARDEN_ACCOUNT_ID overrides.
    pub account_id: String,

    /// API token. Prefer the GATEWARDEN_API_TOKEN env var over this field.
    pub api_token: SecureString,

    /// Environment variable name to read the token from (optional)
    #[serde(default)]
    pub api_token_env: Option<String>,

    /// Maximum items per remote list (vendor limit)
    pub max_list_size: usize,

    /// Maximum lists per account (vendor limit)
    pub max_lists: usize,

    /// Cap on concurrent gateway API calls
    pub concurrency: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            account_id: String::new(),
            api_token: SecureString::default(),
            api_token_env: None,
            max_list_size: DEFAULT_MAX_LIST_SIZE,
            max_lists: DEFAULT_MAX_LISTS,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl GatewayConfig {
    /// Get the effective API token, checking env vars first.
    /// Returns a SecureString that is zeroed when dropped.
    pub fn get_token(&self) -> SecureString {
        if let Some(ref env_name) = self.api_token_env {
            if let Ok(val) = env::var(env_name) {
                return SecureString::new(val);
            }
        }
        if let Ok(val) = env::var("GATEWARDEN_API_TOKEN") {
            return SecureString::new(val);
        }
        self.api_token.clone()
    }

    /// Get the effective account id, checking the env var first.
    pub fn get_account_id(&self) -> String {
        env::var("GATEWARDEN_ACCOUNT_ID").unwrap_or_else(|_| self.account_id.clone())
    }

    /// Account-wide domain quota implied by the list limits.
    pub fn domain_quota(&self) -> usize {
        self.max_lists * self.max_list_size
    }
}

/// Domain rejection policy applied during normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Rightmost labels rejected outright (quota/noise policy)
    pub banned_tlds: Vec<String>,

    /// Substrings that disqualify a domain
    pub banned_keywords: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            banned_tlds: default_banned_tlds(),
            banned_keywords: Vec::new(),
        }
    }
}

/// A named feed: origin URLs plus routing metadata for the remote
/// resource group it owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Feed identifier used in logs and state
    pub name: String,

    /// Remote list display-name prefix (lists are "<prefix> 001", ...)
    pub prefix: String,

    /// Name of the single firewall rule owned by this feed
    pub policy_name: String,

    /// Local artifact file holding the last synced block-set
    pub output: PathBuf,

    /// Cross-feed dedup precedence; lower number = higher priority.
    /// Must be unique across feeds.
    pub priority: u32,

    /// Origin URLs, fetched independently and best-effort
    pub sources: Vec<FeedSource>,
}

/// A single origin URL within a feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

fn default_feeds() -> Vec<FeedConfig> {
    vec![FeedConfig {
        name: "ads".to_string(),
        prefix: "GW Ads".to_string(),
        policy_name: "GW Ads Block".to_string(),
        output: PathBuf::from("aggregate_blocklist.txt"),
        priority: 0,
        sources: vec![
            FeedSource {
                name: "HaGeZi Pro++".to_string(),
                url: "https://cdn.jsdelivr.net/gh/hagezi/dns-blocklists@latest/wildcard/pro.plus-onlydomains.txt".to_string(),
            },
            FeedSource {
                name: "1Hosts Lite".to_string(),
                url: "https://raw.githubusercontent.com/badmojr/1Hosts/refs/heads/master/Lite/domains.wildcards".to_string(),
            },
            FeedSource {
                name: "TIF Mini".to_string(),
                url: "https://cdn.jsdelivr.net/gh/hagezi/dns-blocklists@latest/wildcard/tif.mini-onlydomains.txt".to_string(),
            },
        ],
    }]
}

fn default_banned_tlds() -> Vec<String> {
    [
        "zip", "mov", "su", "top", "xin", "win", "icu", "sbs", "cfd", "bond", "monster", "buzz",
        "tk", "ml", "ga", "cf", "gq", "pw", "cc", "rest", "cam", "kim", "cricket", "science",
        "work", "party", "review", "country", "motorcycles", "ooo", "wang", "online", "host",
        "zw", "stream", "date", "faith", "racing", "li", "ing", "foo", "meme", "bot",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gateway.max_list_size, 1000);
        assert_eq!(config.gateway.max_lists, 300);
        assert_eq!(config.feeds.len(), 1);
    }

    #[test]
    fn test_secure_string_debug_redacted() {
        let secret = SecureString::new("my-secret-token".to_string());
        let debug_str = format!("{:?}", secret);
        assert_eq!(debug_str, "[REDACTED]");
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.feeds.len(), config.feeds.len());
        assert_eq!(parsed.gateway.max_list_size, config.gateway.max_list_size);
    }

    #[test]
    fn test_validate_rejects_http_source() {
        let mut config = Config::default();
        config.feeds[0].sources[0].url = "http://example.com/list.txt".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("HTTPS"));
    }

    #[test]
    fn test_validate_rejects_duplicate_priority() {
        let mut config = Config::default();
        let mut second = config.feeds[0].clone();
        second.name = "security".to_string();
        second.prefix = "GW Sec".to_string();
        second.policy_name = "GW Sec Block".to_string();
        config.feeds.push(second);
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("priority"));
    }

    #[test]
    fn test_validate_rejects_overlapping_prefixes() {
        let mut config = Config::default();
        let mut second = config.feeds[0].clone();
        second.name = "security".to_string();
        second.prefix = "GW Ads Extra".to_string();
        second.priority = 1;
        config.feeds.push(second);
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("overlap"));
    }

    #[test]
    fn test_validate_rejects_zero_list_size() {
        let mut config = Config::default();
        config.gateway.max_list_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_feeds_by_priority() {
        let mut config = Config::default();
        let mut second = config.feeds[0].clone();
        second.name = "threat-intel".to_string();
        second.prefix = "GW TI".to_string();
        second.priority = 5;
        config.feeds.push(second);
        // Insert out of order
        config.feeds.swap(0, 1);

        let ordered = config.feeds_by_priority();
        assert_eq!(ordered[0].name, "ads");
        assert_eq!(ordered[1].name, "threat-intel");
    }

    #[test]
    fn test_token_falls_back_to_config_value() {
        let config = GatewayConfig {
            api_token: SecureString::from("from-config"),
            api_token_env: Some("GATEWARDEN_TEST_TOKEN_UNSET".to_string()),
            ..Default::default()
        };
        assert_eq!(config.get_token().as_str(), "from-config");
    }

    #[test]
    fn test_domain_quota() {
        let config = GatewayConfig::default();
        assert_eq!(config.domain_quota(), 300_000);
    }

    #[test]
    fn test_default_banned_tlds_present() {
        let filter = FilterConfig::default();
        assert!(filter.banned_tlds.contains(&"zip".to_string()));
        assert!(filter.banned_tlds.contains(&"tk".to_string()));
        assert!(filter.banned_keywords.is_empty());
    }
}
