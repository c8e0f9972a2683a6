//! Terminal, CI and container heuristics.

use crate::platform::SystemProbe;
use std::io::{self, IsTerminal};
use std::path::Path;

pub const CI_MARKERS: &[&str] = &[
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "TRAVIS",
    "JENKINS_URL",
    "TF_BUILD",
    "CI",
    "BUILD_ID",
    "CODEBUILD_BUILD_ID",
    "BITBUCKET_BUILD_NUMBER",
];

/// Values that leave a CI marker switched off.
const FALSY_VALUES: &[&str] = &["", "false", "0", "no"];

pub const FORCE_KIOSK_ENV: &str = "HABITAT_FORCE_KIOSK";

pub const DOCKERENV_PATH: &str = "/.dockerenv";
pub const INIT_CGROUP_PATH: &str = "/proc/1/cgroup";
pub const CONTAINER_CGROUP_MARKERS: &[&str] = &["docker", "kubepods", "containerd"];

pub fn stdio_is_terminal() -> bool {
    io::stdin().is_terminal() && io::stdout().is_terminal()
}

/// Retail demo accounts can start interpreters but not consoles.
pub fn is_kiosk_account(system: &dyn SystemProbe, on_windows: bool, accounts: &[String]) -> bool {
    if system
        .env_var(FORCE_KIOSK_ENV)
        .is_some_and(|value| value.eq_ignore_ascii_case("true"))
    {
        log::debug!("{FORCE_KIOSK_ENV} is set; treating account as kiosk");
        return true;
    }
    if !on_windows {
        return false;
    }

    let Some(user) = system.env_var("USERNAME").or_else(|| system.env_var("USER")) else {
        return false;
    };
    let user = user.trim().to_lowercase();
    let kiosk = accounts.iter().any(|account| *account == user);
    if kiosk {
        log::debug!("Running as kiosk account '{user}'");
    }
    kiosk
}

pub fn is_truthy_marker(value: &str) -> bool {
    !FALSY_VALUES.contains(&value.to_lowercase().as_str())
}

/// First CI marker variable that is switched on.
pub fn active_ci_marker(system: &dyn SystemProbe, extra: &[String]) -> Option<String> {
    CI_MARKERS
        .iter()
        .copied()
        .chain(extra.iter().map(String::as_str))
        .find(|name| system.env_var(name).is_some_and(|value| is_truthy_marker(&value)))
        .map(str::to_string)
}

pub fn in_container(system: &dyn SystemProbe) -> bool {
    if system.path_exists(Path::new(DOCKERENV_PATH)) {
        log::debug!("{DOCKERENV_PATH} present");
        return true;
    }

    system
        .read_to_string(Path::new(INIT_CGROUP_PATH))
        .is_some_and(|cgroup| {
            CONTAINER_CGROUP_MARKERS
                .iter()
                .any(|marker| cgroup.contains(marker))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::probe::MockSystemProbe;

    fn env_only(vars: &'static [(&'static str, &'static str)]) -> MockSystemProbe {
        let mut mock = MockSystemProbe::new();
        mock.expect_env_var().returning(move |name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        });
        mock
    }

    #[test]
    fn test_truthy_marker() {
        assert!(is_truthy_marker("true"));
        assert!(is_truthy_marker("1"));
        assert!(is_truthy_marker("yes"));
        assert!(!is_truthy_marker("FALSE"));
        assert!(!is_truthy_marker("0"));
        assert!(!is_truthy_marker("No"));
        assert!(!is_truthy_marker(""));
    }

    #[test]
    fn test_active_ci_marker() {
        let mock = env_only(&[("CI", "false"), ("GITLAB_CI", "true")]);
        assert_eq!(active_ci_marker(&mock, &[]).as_deref(), Some("GITLAB_CI"));

        let mock = env_only(&[("CI", "0")]);
        assert_eq!(active_ci_marker(&mock, &[]), None);

        let mock = env_only(&[("WOODPECKER", "1")]);
        assert_eq!(
            active_ci_marker(&mock, &["WOODPECKER".to_string()]).as_deref(),
            Some("WOODPECKER")
        );
    }

    #[test]
    fn test_kiosk_account() {
        let accounts = vec!["darrin deyoung".to_string()];

        let mock = env_only(&[("USERNAME", "Darrin DeYoung")]);
        assert!(is_kiosk_account(&mock, true, &accounts));
        assert!(!is_kiosk_account(&mock, false, &accounts));

        let mock = env_only(&[("USERNAME", "alice")]);
        assert!(!is_kiosk_account(&mock, true, &accounts));

        let mock = env_only(&[(FORCE_KIOSK_ENV, "TRUE")]);
        assert!(is_kiosk_account(&mock, false, &accounts));
    }

    #[test]
    fn test_container_from_cgroup() {
        let mut mock = MockSystemProbe::new();
        mock.expect_path_exists().return_const(false);
        mock.expect_read_to_string()
            .return_const(Some("0::/system.slice/containerd.service\n".to_string()));
        assert!(in_container(&mock));

        let mut mock = MockSystemProbe::new();
        mock.expect_path_exists().return_const(false);
        mock.expect_read_to_string()
            .return_const(Some("0::/init.scope\n".to_string()));
        assert!(!in_container(&mock));
    }
}
