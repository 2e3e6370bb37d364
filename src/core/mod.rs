pub mod blacklist;
pub mod cmd;
pub mod commands;
pub mod config;
pub mod device;
pub mod diff;
pub mod display;
pub mod engine;
pub mod error;
pub mod plan;
pub mod platform;
pub mod profile;
pub mod refresh;
pub mod sink;
pub mod snapshot;
pub mod state;
pub mod store;
