pub mod settings;

pub use settings::*;

use crate::common::CONFIG_DIR;
use std::path::PathBuf;

pub fn settings_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("settings.toml")
}
