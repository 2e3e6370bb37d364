use crate::core::display::NativeDisplay;
use crate::core::profile::{Density, Resolution};

const MIN_SMALLEST_WIDTH_DP: u32 = 320;
const MAX_SMALLEST_WIDTH_DP: u32 = 1280;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlacklistReason {
    TooSmall,
    TooLarge,
    Upscaled,
}

impl std::fmt::Display for BlacklistReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooSmall => write!(f, "smallest width below {}dp", MIN_SMALLEST_WIDTH_DP),
            Self::TooLarge => write!(f, "smallest width above {}dp", MAX_SMALLEST_WIDTH_DP),
            Self::Upscaled => write!(f, "larger than the physical panel"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted { smallest_width_dp: u32 },
    Blacklisted { smallest_width_dp: u32, reason: BlacklistReason },
}

impl Verdict {
    pub fn is_blacklisted(&self) -> bool {
        matches!(self, Self::Blacklisted { .. })
    }
}

/// `sw = 160 * min(w, h) / density` after resolving `reset` to native values.
pub fn smallest_width_dp(width: u32, height: u32, density: u32) -> u32 {
    if density == 0 {
        return 0;
    }
    u32::try_from((160u64 * u64::from(width.min(height))) / u64::from(density)).unwrap_or(u32::MAX)
}

/// Decide whether a resolution/density pair is safe to apply.
pub fn check(
    resolution: Resolution,
    density: Density,
    native: &NativeDisplay,
    rejects_upscale: bool,
) -> Verdict {
    let (width, height) = resolution.resolve(native.width, native.height);
    let dpi = density.resolve(native.density);
    let sw = smallest_width_dp(width, height, dpi);

    if sw < MIN_SMALLEST_WIDTH_DP {
        return Verdict::Blacklisted { smallest_width_dp: sw, reason: BlacklistReason::TooSmall };
    }
    if sw > MAX_SMALLEST_WIDTH_DP {
        return Verdict::Blacklisted { smallest_width_dp: sw, reason: BlacklistReason::TooLarge };
    }

    if rejects_upscale {
        // Compare in the panel's own orientation; a rotated request is fine.
        let (req_short, req_long) = (width.min(height), width.max(height));
        let (nat_short, nat_long) = (native.width.min(native.height), native.width.max(native.height));
        if req_short > nat_short || req_long > nat_long {
            return Verdict::Blacklisted { smallest_width_dp: sw, reason: BlacklistReason::Upscaled };
        }
    }

    Verdict::Accepted { smallest_width_dp: sw }
}
