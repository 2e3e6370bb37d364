pub const SOCKET_PATH: &str = "/dev/socket/altscreen.sock";
pub const CONFIG_DIR: &str = "/data/adb/.config/altscreen";

/// Profile selector that matches whichever profile is active.
pub const ANY_PROFILE: &str = "*";
