use thiserror::Error;

use crate::core::blacklist::BlacklistReason;
use crate::core::profile::{Density, Resolution};

/// Why a transition did not happen. Nothing was dispatched for any of these.
#[derive(Error, Debug)]
pub enum TransitionError {
    #[error("{resolution} at density {density} is blacklisted: {reason} ({smallest_width_dp}dp)")]
    Blacklisted {
        resolution: Resolution,
        density: Density,
        smallest_width_dp: u32,
        reason: BlacklistReason,
    },

    #[error("No shell can run the commands; grant root access and retry")]
    PermissionUnavailable,

    #[error("Profile {0} not found")]
    ProfileNotFound(String),

    #[error("Native display metrics unavailable: {0:#}")]
    NativeDisplay(anyhow::Error),

    #[error("Store error: {0:#}")]
    Store(anyhow::Error),

    #[error("Dispatch failed: {0:#}")]
    Dispatch(anyhow::Error),
}

impl TransitionError {
    /// Short machine-readable tag used in IPC replies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Blacklisted { .. } => "BLACKLISTED",
            Self::PermissionUnavailable => "PERMISSION",
            Self::ProfileNotFound(_) => "NOT_FOUND",
            Self::NativeDisplay(_) => "DISPLAY",
            Self::Store(_) => "STORE",
            Self::Dispatch(_) => "DISPATCH",
        }
    }
}
