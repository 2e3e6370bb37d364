use crate::common::{DaemonStatus, ProfileEntry};
use crate::core::store::ScratchDocument;

pub fn print_status(status: &DaemonStatus) {
    println!("      AltScreen Daemon Status     ");
    println!("Daemon: Running\n");

    let icon = if status.active { "✓" } else { "✗" };
    println!("  {} Active:   {}", icon, status.active);
    if let Some(id) = &status.profile_id {
        let title = status.title.as_deref().unwrap_or("(untitled)");
        println!("    Profile:  {} ({})", title, id);
    }
    println!("    Saved:    {} profiles", status.profiles);
    if status.reboot_required {
        println!("  ! Reboot required for full effect");
    }

    println!();
}

pub fn print_list(entries: &[ProfileEntry]) {
    if entries.is_empty() {
        println!("No saved profiles");
        return;
    }
    for e in entries {
        let marker = if e.active { "*" } else { " " };
        println!(" {} {:<16} {}", marker, e.id, e.title);
    }
}

pub fn print_scratch(scratch: &ScratchDocument) {
    match &scratch.editing_id {
        Some(id) => println!(" Editing profile {}", id),
        None => println!(" Editing new profile"),
    }
    match toml::to_string(&scratch.profile) {
        Ok(text) => println!("{}", text),
        Err(e) => print_error(&format!("Cannot render profile: {}", e)),
    }
}

pub fn print_daemon_stopped() {
    println!("      AltScreen Daemon Status     ");
    println!(" Daemon: Not running\n");
}

pub fn print_reboot_hint() {
    println!(" Reboot the device for every setting to take effect");
}

pub fn print_success(message: &str) {
    println!(" {}", message);
}

pub fn print_error(message: &str) {
    eprintln!(" Error: {}", message);
}
