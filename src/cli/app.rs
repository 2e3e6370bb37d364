use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "altscreenctl")]
#[command(version, about = "AltScreen daemon control CLI")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
    #[arg(short, long, global = true)]
    pub socket: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    Status,
    List,

    /// Apply a saved profile.
    Load {
        id: String,
    },

    /// Revert the device to its pre-profile state.
    Off,

    Toggle {
        id: String,
    },

    /// Exit 0 when the profile (or any profile, with `*`) is active.
    Active {
        #[arg(default_value = "*")]
        id: String,
    },

    Delete {
        id: String,
    },

    /// Print the commands a load would run, without running them.
    Preview {
        id: String,
    },

    Import {
        path: PathBuf,
    },

    /// Start editing a saved profile, or a new one when no id is given.
    Edit {
        id: Option<String>,
    },

    /// Set one field of the profile being edited.
    Set {
        field: String,
        value: String,
    },

    /// Save the profile being edited.
    Commit {
        title: Option<String>,
    },

    Reapply,

    SetLog {
        #[arg(value_enum)]
        level: LogLevel,
    },

    /// Block until the next profile change.
    Wait,
    Ping,
}

#[derive(Clone, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_upper_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl Commands {
    /// The protocol line for this subcommand.
    pub fn to_line(&self) -> String {
        match self {
            Self::Status => "STATUS".into(),
            Self::List => "LIST".into(),
            Self::Load { id } => format!("LOAD {}", id),
            Self::Off => "OFF".into(),
            Self::Toggle { id } => format!("TOGGLE {}", id),
            Self::Active { id } => format!("ACTIVE {}", id),
            Self::Delete { id } => format!("DELETE {}", id),
            Self::Preview { id } => format!("PREVIEW {}", id),
            Self::Import { path } => format!("IMPORT {}", path.display()),
            Self::Edit { id } => format!("EDIT {}", id.as_deref().unwrap_or("new")),
            Self::Set { field, value } => format!("SET {} {}", field, value),
            Self::Commit { title: Some(t) } => format!("COMMIT {}", t),
            Self::Commit { title: None } => "COMMIT".into(),
            Self::Reapply => "REAPPLY".into(),
            Self::SetLog { level } => format!("SETLOG {}", level.to_upper_str()),
            Self::Wait => "WAIT_CHANGE".into(),
            Self::Ping => "PING".into(),
        }
    }
}
