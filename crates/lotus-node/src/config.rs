//! Node configuration — parsed from TOML file + environment variable overrides.
//!
//! Priority: environment variables > config file > defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,

    #[serde(default)]
    pub security: SecuritySection,

    #[serde(default)]
    pub musig: MusigSection,

    #[serde(default)]
    pub swapsig: SwapsigSection,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node: NodeSection::default(),
            security: SecuritySection::default(),
            musig: MusigSection::default(),
            swapsig: SwapsigSection::default(),
        }
    }
}

/// General node settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSection {
    /// Data directory for the optional session/pool snapshot.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log level (error, warn, info, debug, trace).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Local peer id this node presents on the transport substrate.
    #[serde(default = "default_peer_id")]
    pub peer_id: String,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            peer_id: default_peer_id(),
        }
    }
}

/// Inbound-message validator settings (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySection {
    #[serde(default = "default_rate_limit_burst")]
    pub rate_limit_burst: u32,

    #[serde(default = "default_rate_limit_refill_per_sec")]
    pub rate_limit_refill_per_sec: f64,

    #[serde(default = "default_max_clock_skew_ms")]
    pub max_clock_skew_ms: i64,

    #[serde(default = "default_replay_ttl_ms")]
    pub replay_ttl_ms: i64,

    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    /// Path to a newline-delimited list of blocked peer ids, loaded at startup.
    pub peer_blocklist_file: Option<PathBuf>,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            rate_limit_burst: default_rate_limit_burst(),
            rate_limit_refill_per_sec: default_rate_limit_refill_per_sec(),
            max_clock_skew_ms: default_max_clock_skew_ms(),
            replay_ttl_ms: default_replay_ttl_ms(),
            max_payload_bytes: default_max_payload_bytes(),
            peer_blocklist_file: None,
        }
    }
}

/// MuSig2 session timeout/grace settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusigSection {
    #[serde(default = "default_nonce_exchange_timeout_ms")]
    pub nonce_exchange_timeout_ms: i64,

    #[serde(default = "default_partial_sig_timeout_ms")]
    pub partial_sig_timeout_ms: i64,

    #[serde(default = "default_terminal_grace_ms")]
    pub terminal_grace_ms: i64,

    #[serde(default = "default_require_nonce_commitments")]
    pub require_nonce_commitments: bool,
}

impl Default for MusigSection {
    fn default() -> Self {
        Self {
            nonce_exchange_timeout_ms: default_nonce_exchange_timeout_ms(),
            partial_sig_timeout_ms: default_partial_sig_timeout_ms(),
            terminal_grace_ms: default_terminal_grace_ms(),
            require_nonce_commitments: default_require_nonce_commitments(),
        }
    }
}

/// SwapSig pool defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapsigSection {
    #[serde(default = "default_burn_percentage")]
    pub burn_percentage: f64,

    #[serde(default = "default_burn_min")]
    pub burn_min: u64,

    #[serde(default = "default_burn_max")]
    pub burn_max: u64,

    #[serde(default = "default_burn_address")]
    pub burn_address: String,

    #[serde(default = "default_setup_timeout_ms")]
    pub setup_timeout_ms: i64,

    #[serde(default = "default_settlement_timeout_ms")]
    pub settlement_timeout_ms: i64,

    #[serde(default = "default_required_confirmations")]
    pub required_confirmations: u32,

    #[serde(default)]
    pub strict_mode: bool,
}

impl Default for SwapsigSection {
    fn default() -> Self {
        Self {
            burn_percentage: default_burn_percentage(),
            burn_min: default_burn_min(),
            burn_max: default_burn_max(),
            burn_address: default_burn_address(),
            setup_timeout_ms: default_setup_timeout_ms(),
            settlement_timeout_ms: default_settlement_timeout_ms(),
            required_confirmations: default_required_confirmations(),
            strict_mode: false,
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_data_dir() -> PathBuf {
    PathBuf::from("/data")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_peer_id() -> String {
    "lotus-node".to_string()
}

fn default_rate_limit_burst() -> u32 {
    20
}

fn default_rate_limit_refill_per_sec() -> f64 {
    5.0
}

fn default_max_clock_skew_ms() -> i64 {
    30_000
}

fn default_replay_ttl_ms() -> i64 {
    5 * 60 * 1000
}

fn default_max_payload_bytes() -> usize {
    64 * 1024
}

fn default_nonce_exchange_timeout_ms() -> i64 {
    60_000
}

fn default_partial_sig_timeout_ms() -> i64 {
    60_000
}

fn default_terminal_grace_ms() -> i64 {
    5 * 60 * 1000
}

fn default_require_nonce_commitments() -> bool {
    true
}

fn default_burn_percentage() -> f64 {
    0.001
}

fn default_burn_min() -> u64 {
    0
}

fn default_burn_max() -> u64 {
    u64::MAX
}

fn default_burn_address() -> String {
    String::new()
}

fn default_setup_timeout_ms() -> i64 {
    10 * 60 * 1000
}

fn default_settlement_timeout_ms() -> i64 {
    10 * 60 * 1000
}

fn default_required_confirmations() -> u32 {
    1
}

// ============================================================================
// Loading & environment override
// ============================================================================

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: NodeConfig =
            toml::from_str(&contents).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `LOTUS_DATA_DIR`
    /// - `LOTUS_LOG_LEVEL`
    /// - `LOTUS_PEER_ID`
    /// - `LOTUS_MAX_CLOCK_SKEW_MS`
    /// - `LOTUS_BURN_PERCENTAGE`
    /// - `LOTUS_STRICT_MODE`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LOTUS_DATA_DIR") {
            self.node.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("LOTUS_LOG_LEVEL") {
            self.node.log_level = v;
        }
        if let Ok(v) = std::env::var("LOTUS_PEER_ID") {
            self.node.peer_id = v;
        }
        if let Ok(v) = std::env::var("LOTUS_MAX_CLOCK_SKEW_MS") {
            if let Ok(ms) = v.parse::<i64>() {
                self.security.max_clock_skew_ms = ms;
            }
        }
        if let Ok(v) = std::env::var("LOTUS_BURN_PERCENTAGE") {
            if let Ok(pct) = v.parse::<f64>() {
                self.swapsig.burn_percentage = pct;
            }
        }
        if let Ok(v) = std::env::var("LOTUS_STRICT_MODE") {
            self.swapsig.strict_mode = v == "1" || v.eq_ignore_ascii_case("true");
        }
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.node.peer_id.is_empty(),
            "node.peer_id must not be empty"
        );
        anyhow::ensure!(
            self.security.max_clock_skew_ms > 0,
            "security.max_clock_skew_ms must be > 0"
        );
        anyhow::ensure!(
            self.security.max_payload_bytes > 0,
            "security.max_payload_bytes must be > 0"
        );
        anyhow::ensure!(
            self.musig.nonce_exchange_timeout_ms > 0 && self.musig.partial_sig_timeout_ms > 0,
            "musig phase timeouts must be > 0"
        );
        anyhow::ensure!(
            (0.0005..=0.01).contains(&self.swapsig.burn_percentage),
            "swapsig.burn_percentage must be within [0.05%, 1%]"
        );
        anyhow::ensure!(
            self.swapsig.burn_min <= self.swapsig.burn_max,
            "swapsig.burn_min must not exceed swapsig.burn_max"
        );
        Ok(())
    }

    /// Build the `SecurityConfig` the `lotus-security` validator is constructed from.
    pub fn security_config(&self) -> lotus_security::SecurityConfig {
        lotus_security::SecurityConfig {
            rate_limit: lotus_security::RateLimiterConfig {
                burst: self.security.rate_limit_burst,
                refill_per_sec: self.security.rate_limit_refill_per_sec,
            },
            max_clock_skew_ms: self.security.max_clock_skew_ms,
            replay: lotus_security::ReplayCacheConfig {
                ttl_ms: self.security.replay_ttl_ms,
            },
            max_payload_bytes: self.security.max_payload_bytes,
            rate_limit_enabled: true,
        }
    }

    /// Build the `SessionConfig` the MuSig2 session store is constructed from.
    pub fn session_config(&self) -> lotus_session::SessionConfig {
        lotus_session::SessionConfig {
            require_nonce_commitments: self.musig.require_nonce_commitments,
            nonce_exchange_timeout_ms: self.musig.nonce_exchange_timeout_ms,
            partial_sig_timeout_ms: self.musig.partial_sig_timeout_ms,
            terminal_grace_ms: self.musig.terminal_grace_ms,
        }
    }

    /// Build the default `BurnConfig` new pools are created with.
    pub fn burn_config(&self) -> lotus_swapsig::BurnConfig {
        lotus_swapsig::BurnConfig {
            percentage: self.swapsig.burn_percentage,
            min: self.swapsig.burn_min,
            max: self.swapsig.burn_max,
            address: self.swapsig.burn_address.clone(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn minimal_toml() -> &'static str {
        ""
    }

    fn full_toml() -> &'static str {
        r#"
[node]
data_dir = "/custom/data"
log_level = "debug"
peer_id = "node-1"

[security]
rate_limit_burst = 50
rate_limit_refill_per_sec = 10.0
max_clock_skew_ms = 15000
replay_ttl_ms = 120000
max_payload_bytes = 32768

[musig]
nonce_exchange_timeout_ms = 30000
partial_sig_timeout_ms = 30000
terminal_grace_ms = 60000
require_nonce_commitments = false

[swapsig]
burn_percentage = 0.002
burn_min = 100
burn_max = 50000
burn_address = "burn-addr"
setup_timeout_ms = 120000
settlement_timeout_ms = 120000
required_confirmations = 2
strict_mode = true
"#
    }

    #[test]
    fn parses_empty_config_with_all_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", minimal_toml()).unwrap();

        let config = NodeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.node.log_level, "info");
        assert_eq!(config.security.max_clock_skew_ms, 30_000);
        assert!(config.musig.require_nonce_commitments);
        assert_eq!(config.swapsig.burn_percentage, 0.001);
    }

    #[test]
    fn parses_full_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", full_toml()).unwrap();

        let config = NodeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.node.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.node.peer_id, "node-1");
        assert_eq!(config.security.rate_limit_burst, 50);
        assert!(!config.musig.require_nonce_commitments);
        assert_eq!(config.swapsig.burn_min, 100);
        assert!(config.swapsig.strict_mode);
    }

    #[test]
    fn env_overrides_take_priority_over_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", minimal_toml()).unwrap();
        let mut config = NodeConfig::from_file(file.path()).unwrap();

        std::env::set_var("LOTUS_DATA_DIR", "/env/data");
        std::env::set_var("LOTUS_PEER_ID", "env-node");
        std::env::set_var("LOTUS_STRICT_MODE", "true");

        config.apply_env_overrides();

        assert_eq!(config.node.data_dir, PathBuf::from("/env/data"));
        assert_eq!(config.node.peer_id, "env-node");
        assert!(config.swapsig.strict_mode);

        std::env::remove_var("LOTUS_DATA_DIR");
        std::env::remove_var("LOTUS_PEER_ID");
        std::env::remove_var("LOTUS_STRICT_MODE");
    }

    #[test]
    fn validation_ok_for_defaults() {
        let config = NodeConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_rejects_burn_percentage_outside_range() {
        let mut config = NodeConfig::default();
        config.swapsig.burn_percentage = 0.05;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_zero_clock_skew() {
        let mut config = NodeConfig::default();
        config.security.max_clock_skew_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", full_toml()).unwrap();
        let config = NodeConfig::from_file(file.path()).unwrap();

        let serialized = toml::to_string_pretty(&config).unwrap();
        let reparsed: NodeConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(reparsed.node.peer_id, config.node.peer_id);
        assert_eq!(reparsed.swapsig.burn_percentage, config.swapsig.burn_percentage);
    }
}
