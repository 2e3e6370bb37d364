use anyhow::Result;

use crate::core::config::{self, Settings};
use crate::core::platform::PlatformCapabilities;

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub settings: Settings,
    pub caps: PlatformCapabilities,
}

impl DaemonConfig {
    /// Read `settings.toml` and detect the device, applying any overrides.
    pub fn load() -> Result<Self> {
        let settings = Settings::load(config::settings_path())?;
        let caps = PlatformCapabilities::detect().with_overrides(&settings.platform);
        Ok(Self { settings, caps })
    }
}
