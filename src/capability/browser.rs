//! Web browser launch availability.

use crate::platform::SystemProbe;

pub const BROWSER_ENV: &str = "BROWSER";
pub const TERMUX_LAUNCHER: &str = "termux-open-url";
pub const DESKTOP_LAUNCHERS: &[&str] = &["xdg-open", "sensible-browser", "x-www-browser", "open"];
pub const WINDOWS_SHELL: &str = "explorer.exe";

/// `$BROWSER` holds a `:`-separated list of commands; each may carry
/// arguments (`firefox %s`).
pub fn browser_env_commands(value: &str) -> Vec<&str> {
    value
        .split(':')
        .filter_map(|entry| entry.split_whitespace().next())
        .collect()
}

pub fn web_browser_available(system: &dyn SystemProbe, on_termux: bool, on_windows: bool) -> bool {
    if let Some(value) = system.env_var(BROWSER_ENV)
        && let Some(command) = browser_env_commands(&value)
            .into_iter()
            .find(|command| on_path(command))
    {
        log::debug!("{BROWSER_ENV} command {command} is available");
        return true;
    }

    if on_termux && on_path(TERMUX_LAUNCHER) {
        return true;
    }

    if let Some(launcher) = DESKTOP_LAUNCHERS.iter().find(|launcher| on_path(launcher)) {
        log::debug!("Browser launcher {launcher} found");
        return true;
    }

    on_windows && on_path(WINDOWS_SHELL)
}

fn on_path(program: &str) -> bool {
    match which::which(program) {
        Ok(_) => true,
        Err(e) => {
            log::trace!("{program}: {e}");
            false
        }
    }
}
