use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::{DeviceSelection, Dimensions};

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Configuration for one scan loop.
///
/// All fields are threaded through the loop explicitly; there is no
/// process-wide debug switch.
#[derive(Clone, Debug)]
pub struct ScanConfig {
    /// Target dimensions of the capture surface.
    pub target_dimensions: Dimensions,
    /// Delay between the end of one capture attempt and the start of the next.
    pub poll_interval: Duration,
    /// Keep scanning after the first successful decode.
    pub continuous: bool,
    /// Emit per-tick debug logs.
    pub debug_logging: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            target_dimensions: Dimensions {
                width: DEFAULT_WIDTH,
                height: DEFAULT_HEIGHT,
            },
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            continuous: false,
            debug_logging: false,
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<()> {
        if self.target_dimensions.width == 0 || self.target_dimensions.height == 0 {
            return Err(anyhow!("target dimensions must be non-zero"));
        }
        if self.poll_interval.is_zero() {
            return Err(anyhow!("poll interval must be greater than zero"));
        }
        Ok(())
    }
}

// -------------------- Daemon configuration --------------------

#[derive(Debug, Deserialize, Default)]
struct ScandConfigFile {
    device: Option<String>,
    scan: Option<ScanConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ScanConfigFile {
    width: Option<u32>,
    height: Option<u32>,
    poll_interval_ms: Option<u64>,
    continuous: Option<bool>,
    debug_logging: Option<bool>,
}

/// Configuration for the `scand` daemon: scan settings plus an optional
/// initial device selection.
#[derive(Clone, Debug)]
pub struct ScandConfig {
    pub device: Option<DeviceSelection>,
    pub scan: ScanConfig,
}

impl ScandConfig {
    /// Load from the file named by `CODESCAN_CONFIG` (JSON), then apply
    /// `CODESCAN_*` environment overrides, then validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CODESCAN_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.scan.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ScandConfigFile) -> Self {
        let scan_file = file.scan.unwrap_or_default();
        let scan = ScanConfig {
            target_dimensions: Dimensions {
                width: scan_file.width.unwrap_or(DEFAULT_WIDTH),
                height: scan_file.height.unwrap_or(DEFAULT_HEIGHT),
            },
            poll_interval: Duration::from_millis(
                scan_file.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
            continuous: scan_file.continuous.unwrap_or(false),
            debug_logging: scan_file.debug_logging.unwrap_or(false),
        };
        Self {
            device: file.device.map(DeviceSelection::new),
            scan,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("CODESCAN_DEVICE") {
            if !device.trim().is_empty() {
                self.device = Some(DeviceSelection::new(device.trim()));
            }
        }
        if let Ok(interval) = std::env::var("CODESCAN_POLL_INTERVAL_MS") {
            let ms: u64 = interval.parse().map_err(|_| {
                anyhow!("CODESCAN_POLL_INTERVAL_MS must be an integer number of milliseconds")
            })?;
            self.scan.poll_interval = Duration::from_millis(ms);
        }
        if let Ok(continuous) = std::env::var("CODESCAN_CONTINUOUS") {
            self.scan.continuous = parse_bool("CODESCAN_CONTINUOUS", &continuous)?;
        }
        if let Ok(debug) = std::env::var("CODESCAN_DEBUG_LOGGING") {
            self.scan.debug_logging = parse_bool("CODESCAN_DEBUG_LOGGING", &debug)?;
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ScandConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(anyhow!("{} must be a boolean, got {:?}", key, other)),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scan_config_is_valid() {
        let cfg = ScanConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.target_dimensions.width, 640);
        assert_eq!(cfg.target_dimensions.height, 480);
        assert_eq!(cfg.poll_interval, Duration::from_millis(500));
        assert!(!cfg.continuous);
        assert!(!cfg.debug_logging);
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let cfg = ScanConfig {
            poll_interval: Duration::ZERO,
            ..ScanConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        let cfg = ScanConfig {
            target_dimensions: Dimensions {
                width: 0,
                height: 480,
            },
            ..ScanConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("K", "true").unwrap());
        assert!(parse_bool("K", "1").unwrap());
        assert!(!parse_bool("K", "no").unwrap());
        assert!(parse_bool("K", "maybe").is_err());
    }
}
