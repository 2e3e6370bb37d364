use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::common::{CONFIG_DIR, SOCKET_PATH};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub shell: ShellConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub helper: HelperConfig,
    #[serde(default)]
    pub platform: PlatformOverrides,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DaemonConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_socket_path")]
    pub socket_path: String,

    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            socket_path: default_socket_path(),
            store_dir: default_store_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShellConfig {
    #[serde(default = "default_privileged_shell")]
    pub privileged_shell: String,

    #[serde(default = "default_fallback_shell")]
    pub fallback_shell: String,

    #[serde(default = "default_shell_timeout")]
    pub timeout_ms: u64,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            privileged_shell: default_privileged_shell(),
            fallback_shell: default_fallback_shell(),
            timeout_ms: default_shell_timeout(),
        }
    }
}

/// Settle delays attached to individual commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct TimingConfig {
    #[serde(default = "default_backlight_delay")]
    pub backlight_delay_ms: u64,

    #[serde(default = "default_refresh_delay")]
    pub refresh_delay_ms: u64,

    /// Wait after a full restart before polling for boot completion.
    #[serde(default = "default_boot_settle")]
    pub boot_settle_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            backlight_delay_ms: default_backlight_delay(),
            refresh_delay_ms: default_refresh_delay(),
            boot_settle_ms: default_boot_settle(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HelperConfig {
    #[serde(default = "default_spool_dir")]
    pub spool_dir: PathBuf,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            spool_dir: default_spool_dir(),
        }
    }
}

/// Manual corrections for capability detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PlatformOverrides {
    #[serde(default)]
    pub api_level: Option<u32>,
    #[serde(default)]
    pub secure_settings: Option<bool>,
    #[serde(default)]
    pub reboot_workaround: Option<bool>,
    #[serde(default)]
    pub vibration_path: Option<String>,
    #[serde(default)]
    pub backlight_path: Option<String>,
    #[serde(default)]
    pub home_package: Option<String>,
}

impl Settings {
    /// Load settings from TOML file, falling back to defaults when absent.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!("Settings file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read {}", path.display()))?;

        toml::from_str(&content).context("Failed to parse settings.toml")
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_socket_path() -> String {
    SOCKET_PATH.to_string()
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(CONFIG_DIR)
}

fn default_privileged_shell() -> String {
    "su".to_string()
}

fn default_fallback_shell() -> String {
    "sh".to_string()
}

fn default_shell_timeout() -> u64 {
    30_000
}

fn default_backlight_delay() -> u64 {
    2000
}

fn default_refresh_delay() -> u64 {
    1000
}

fn default_boot_settle() -> u64 {
    15_000
}

fn default_spool_dir() -> PathBuf {
    PathBuf::from("/data/local/tmp/altscreen-helper")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_fill_defaults() {
        let s: Settings = toml::from_str(
            r#"
            [daemon]
            log_level = "debug"

            [platform]
            api_level = 29
            secure_settings = false
            "#,
        )
        .unwrap();
        assert_eq!(s.daemon.log_level, "debug");
        assert_eq!(s.daemon.socket_path, SOCKET_PATH);
        assert_eq!(s.shell.privileged_shell, "su");
        assert_eq!(s.timing.backlight_delay_ms, 2000);
        assert_eq!(s.platform.api_level, Some(29));
        assert_eq!(s.platform.secure_settings, Some(false));
        assert_eq!(s.platform.reboot_workaround, None);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(dir.path().join("settings.toml")).unwrap();
        assert_eq!(s.timing.refresh_delay_ms, 1000);
    }
}
