use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::cmd::read_output;

/// Physical panel metrics, what `reset` resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeDisplay {
    pub width: u32,
    pub height: u32,
    pub density: u32,
}

impl NativeDisplay {
    /// The panel's natural orientation is landscape (most tablets).
    pub fn is_landscape(&self) -> bool {
        self.width >= self.height
    }
}

pub fn query_native_display() -> Result<NativeDisplay> {
    let size = read_output("wm", &["size"])?.context("Empty output from wm size")?;
    let density = read_output("wm", &["density"])?.context("Empty output from wm density")?;
    let (width, height) = parse_physical_size(&size)?;
    let density = parse_physical_density(&density)?;
    debug!(target: "altscreen::display", "Native display {}x{} @ {}dpi", width, height, density);
    Ok(NativeDisplay { width, height, density })
}

/// `wm size` prints `Physical size: 1080x2400` and, when overridden, an
/// `Override size` line as well. Only the physical value is wanted.
fn parse_physical_size(input: &str) -> Result<(u32, u32)> {
    let re = Regex::new(r"Physical size:\s*(\d+)x(\d+)")?;
    let caps = re
        .captures(input)
        .context("Could not find physical size in wm output")?;
    Ok((caps[1].parse()?, caps[2].parse()?))
}

fn parse_physical_density(input: &str) -> Result<u32> {
    let re = Regex::new(r"Physical density:\s*(\d+)")?;
    let caps = re
        .captures(input)
        .context("Could not find physical density in wm output")?;
    Ok(caps[1].parse()?)
}
