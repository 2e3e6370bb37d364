pub mod config;
pub mod ipc;
pub mod run;
pub mod watcher;
pub mod worker;
