//! Daemon configuration management

use anyhow::{Context, Result, anyhow};
use deck::{CatalogEntry, DeviceFamily, DiscoveryCatalog, ListenOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub daemon: DaemonSettings,
    #[serde(default)]
    pub timing: TimingSettings,
    /// Products added on top of the built-in catalog
    #[serde(default)]
    pub catalog: CatalogSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonSettings {
    #[serde(default = "DaemonSettings::default_log_level")]
    pub log_level: String,
    /// Surface already-attached decks as `added` to new subscribers
    #[serde(default = "default_true")]
    pub emit_existing: bool,
    /// Wake, full brightness, clear icons and refresh on attach
    #[serde(default = "default_true")]
    pub init_on_attach: bool,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            emit_existing: true,
            init_on_attach: true,
        }
    }
}

impl DaemonSettings {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSettings {
    #[serde(default = "TimingSettings::default_reconcile_interval")]
    pub reconcile_interval_ms: u64,
    #[serde(default = "TimingSettings::default_read_interval")]
    pub read_interval_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            reconcile_interval_ms: Self::default_reconcile_interval(),
            read_interval_ms: Self::default_read_interval(),
        }
    }
}

impl TimingSettings {
    fn default_reconcile_interval() -> u64 {
        1000
    }

    fn default_read_interval() -> u64 {
        100
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSettings {
    #[serde(default)]
    pub extra: Vec<ProductEntry>,
}

/// One extra catalog row
///
/// # Example Configuration
/// ```toml
/// [[catalog.extra]]
/// vendor_id = "0x5500"
/// product_id = "0x1001"
/// family = "n3"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductEntry {
    pub vendor_id: String,
    pub product_id: String,
    pub family: String,
}

impl ProductEntry {
    /// Parse into a catalog row
    pub fn to_entry(&self) -> Result<CatalogEntry> {
        let vendor_id = parse_hex_id(&self.vendor_id, "vendor_id")?;
        let product_id = parse_hex_id(&self.product_id, "product_id")?;
        let family: DeviceFamily = self
            .family
            .parse()
            .map_err(|e| anyhow!("Invalid catalog entry: {}", e))?;
        Ok(CatalogEntry::new(vendor_id, product_id, family))
    }
}

fn default_true() -> bool {
    true
}

impl DaemonConfig {
    /// Load configuration from file
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/stream-deck-rs/deckd.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::from_toml(&content)
            .with_context(|| format!("Invalid config file: {}", config_path.display()))?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: DaemonConfig =
            toml::from_str(content).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("stream-deck-rs").join("deckd.toml")
        } else {
            PathBuf::from(".config/stream-deck-rs/deckd.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        validate_log_level(&self.daemon.log_level)?;

        if self.timing.reconcile_interval_ms == 0 {
            return Err(anyhow!("timing.reconcile_interval_ms must be greater than 0"));
        }
        if self.timing.read_interval_ms == 0 {
            return Err(anyhow!("timing.read_interval_ms must be greater than 0"));
        }

        for product in &self.catalog.extra {
            product.to_entry()?;
        }

        Ok(())
    }

    /// Built-in catalog extended with the configured rows
    pub fn catalog(&self) -> Result<DiscoveryCatalog> {
        let extra = self
            .catalog
            .extra
            .iter()
            .map(ProductEntry::to_entry)
            .collect::<Result<Vec<_>>>()?;
        Ok(DiscoveryCatalog::builtin_with(extra))
    }

    /// Hotplug monitor options
    pub fn listen_options(&self) -> ListenOptions {
        ListenOptions {
            emit_existing: self.daemon.emit_existing,
            reconcile_interval: Duration::from_millis(self.timing.reconcile_interval_ms),
            read_interval: self.read_interval(),
        }
    }

    /// Read loop cadence
    pub fn read_interval(&self) -> Duration {
        Duration::from_millis(self.timing.read_interval_ms)
    }
}

/// Check a level name against the accepted set
pub fn validate_log_level(level: &str) -> Result<()> {
    if !VALID_LOG_LEVELS.contains(&level) {
        return Err(anyhow!(
            "Invalid log level '{}', must be one of: {}",
            level,
            VALID_LOG_LEVELS.join(", ")
        ));
    }
    Ok(())
}

/// Parse a `0x`-prefixed hex ID (VID or PID)
pub fn parse_hex_id(id: &str, name: &str) -> Result<u16> {
    let hex_part = id
        .strip_prefix("0x")
        .or_else(|| id.strip_prefix("0X"))
        .ok_or_else(|| {
            anyhow!(
                "Invalid {} '{}', must start with '0x' (e.g., '0x1234')",
                name,
                id
            )
        })?;

    if hex_part.is_empty() || hex_part.len() > 4 {
        return Err(anyhow!(
            "Invalid {} '{}', hex part must be 1-4 digits",
            name,
            id
        ));
    }

    u16::from_str_radix(hex_part, 16)
        .map_err(|_| anyhow!("Invalid {} '{}', not a valid hex number", name, id))
}

/// Load a config file, expanding `~`
pub fn load_config(path: &str) -> Result<DaemonConfig> {
    let path_buf = PathBuf::from(shellexpand::tilde(path).as_ref());
    DaemonConfig::load(Some(path_buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.daemon.log_level, "info");
        assert!(config.daemon.emit_existing);
        assert!(config.daemon.init_on_attach);
        assert_eq!(config.timing.reconcile_interval_ms, 1000);
        assert_eq!(config.timing.read_interval_ms, 100);
        assert!(config.catalog.extra.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_hex_id_valid() {
        assert_eq!(parse_hex_id("0x5500", "VID").unwrap(), 0x5500);
        assert_eq!(parse_hex_id("0X1", "VID").unwrap(), 1);
        assert_eq!(parse_hex_id("0xffff", "PID").unwrap(), 0xFFFF);
    }

    #[test]
    fn test_parse_hex_id_invalid() {
        assert!(parse_hex_id("5500", "VID").is_err());
        assert!(parse_hex_id("0x", "VID").is_err());
        assert!(parse_hex_id("0x12345", "VID").is_err());
        assert!(parse_hex_id("0xGG", "VID").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_log_level() {
        let mut config = DaemonConfig::default();
        config.daemon.log_level = "verbose".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("verbose"));
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let mut config = DaemonConfig::default();
        config.timing.reconcile_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = DaemonConfig::default();
        config.timing.read_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_family() {
        let mut config = DaemonConfig::default();
        config.catalog.extra.push(ProductEntry {
            vendor_id: "0x1234".to_string(),
            product_id: "0x5678".to_string(),
            family: "n9".to_string(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_catalog_appends_extra_rows() {
        let mut config = DaemonConfig::default();
        config.catalog.extra.push(ProductEntry {
            vendor_id: "0x1234".to_string(),
            product_id: "0x5678".to_string(),
            family: "N3".to_string(),
        });

        let catalog = config.catalog().unwrap();
        assert_eq!(catalog.len(), DiscoveryCatalog::builtin().len() + 1);
        assert_eq!(catalog.lookup(0x1234, 0x5678), Some(DeviceFamily::N3));
    }

    #[test]
    fn test_listen_options_follow_timing() {
        let mut config = DaemonConfig::default();
        config.daemon.emit_existing = false;
        config.timing.reconcile_interval_ms = 250;
        config.timing.read_interval_ms = 20;

        let options = config.listen_options();
        assert!(!options.emit_existing);
        assert_eq!(options.reconcile_interval, Duration::from_millis(250));
        assert_eq!(options.read_interval, Duration::from_millis(20));
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(load_config("/nonexistent/stream-deck-rs/deckd.toml").is_err());
    }
}
