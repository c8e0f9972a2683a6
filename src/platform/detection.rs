//! Layered platform predicates.
//!
//! Each predicate tries the cheapest evidence first (environment), then a
//! filesystem marker, then the kernel release string, and stops at the first
//! positive answer.

use super::constants::*;
use super::probe::SystemProbe;
use std::path::Path;

pub fn is_windows(system: &dyn SystemProbe) -> bool {
    system.target_os() == "windows"
}

pub fn is_macos(system: &dyn SystemProbe) -> bool {
    system.target_os() == "macos"
}

pub fn is_freebsd(system: &dyn SystemProbe) -> bool {
    system.target_os() == "freebsd"
}

/// Linux kernel underneath, Android included.
pub fn is_linux(system: &dyn SystemProbe) -> bool {
    matches!(system.target_os().as_str(), "linux" | "android")
}

pub fn is_wsl(system: &dyn SystemProbe) -> bool {
    if !is_linux(system) {
        return false;
    }

    if WSL_ENV_MARKERS.iter().any(|name| env_is_set(system, name)) {
        log::debug!("WSL detected from environment");
        return true;
    }

    if file_mentions(system, PROC_VERSION, &["microsoft", "wsl"]) {
        log::debug!("WSL detected from {PROC_VERSION}");
        return true;
    }

    if file_mentions(system, PROC_OSRELEASE, &["microsoft"]) {
        log::debug!("WSL detected from {PROC_OSRELEASE}");
        return true;
    }

    kernel_mentions(system, "microsoft")
}

pub fn is_termux(system: &dyn SystemProbe) -> bool {
    if !is_linux(system) {
        return false;
    }

    let env_hit = system
        .env_var("PREFIX")
        .is_some_and(|prefix| prefix.starts_with(TERMUX_PREFIX))
        || system
            .env_var("HOME")
            .is_some_and(|home| home.starts_with(TERMUX_HOME))
        || system.env_var(TERMUX_VERSION_ENV).is_some();
    if env_hit {
        log::debug!("Termux detected from environment");
        return true;
    }

    system.is_dir(Path::new(TERMUX_PREFIX))
}

pub fn is_android(system: &dyn SystemProbe) -> bool {
    if system.target_os() == "android" {
        return true;
    }
    if !is_linux(system) {
        return false;
    }

    if ANDROID_ENV_MARKERS.iter().all(|name| env_is_set(system, name)) {
        log::debug!("Android detected from environment");
        return true;
    }

    if system.path_exists(Path::new(ANDROID_BUILD_PROP)) {
        log::debug!("Android detected from {ANDROID_BUILD_PROP}");
        return true;
    }

    kernel_mentions(system, "android")
}

/// iSH reports Linux; only its pseudo-kernel creates `/proc/ish`, which is
/// what separates it from a stock Alpine install.
pub fn is_ish_alpine(system: &dyn SystemProbe) -> bool {
    is_linux(system)
        && system.is_dir(Path::new(ISH_APK_DIR))
        && system.is_dir(Path::new(ISH_PROC_DIR))
}

/// An interpreter hosted inside an Android app sandbox (Pydroid, QPython).
///
/// `android` is the already-computed Android verdict.
pub fn is_sandboxed_mobile_ide(
    system: &dyn SystemProbe,
    android: bool,
    interpreter: Option<&Path>,
) -> bool {
    if !android {
        return false;
    }

    let interp_hit = interpreter
        .map(|path| path.to_string_lossy().to_lowercase())
        .is_some_and(|path| contains_any(&path, MOBILE_IDE_MARKERS));
    let home_hit = system
        .env_var("HOME")
        .is_some_and(|home| contains_any(&home.to_lowercase(), MOBILE_IDE_MARKERS));
    if interp_hit || home_hit {
        log::debug!("Mobile IDE detected from interpreter/HOME");
        return true;
    }

    MOBILE_IDE_DATA_DIRS
        .iter()
        .any(|dir| system.is_dir(Path::new(dir)))
}

fn env_is_set(system: &dyn SystemProbe, name: &str) -> bool {
    system.env_var(name).is_some_and(|value| !value.is_empty())
}

fn file_mentions(system: &dyn SystemProbe, path: &str, needles: &[&str]) -> bool {
    system
        .read_to_string(Path::new(path))
        .is_some_and(|contents| contains_any(&contents.to_lowercase(), needles))
}

fn kernel_mentions(system: &dyn SystemProbe, needle: &str) -> bool {
    let hit = system
        .kernel_release()
        .is_some_and(|release| release.to_lowercase().contains(needle));
    if hit {
        log::debug!("Kernel release mentions {needle}");
    }
    hit
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::probe::MockSystemProbe;
    use mockall::predicate::eq;
    use std::path::PathBuf;

    fn linux_mock() -> MockSystemProbe {
        let mut mock = MockSystemProbe::new();
        mock.expect_target_os().return_const("linux".to_string());
        mock
    }

    #[test]
    fn test_wsl_from_environment_short_circuits() {
        let mut mock = linux_mock();
        mock.expect_env_var()
            .with(eq("WSL_DISTRO_NAME"))
            .return_const(Some("Ubuntu".to_string()));
        mock.expect_read_to_string().never();
        mock.expect_kernel_release().never();

        assert!(is_wsl(&mock));
    }

    #[test]
    fn test_wsl_from_proc_version() {
        let mut mock = linux_mock();
        mock.expect_env_var().return_const(None);
        mock.expect_read_to_string()
            .withf(|p| p == Path::new(PROC_VERSION))
            .return_const(Some("Linux version 5.15.90.1-microsoft-standard-WSL2".to_string()));
        mock.expect_kernel_release().never();

        assert!(is_wsl(&mock));
    }

    #[test]
    fn test_wsl_falls_through_to_kernel_release() {
        let mut mock = linux_mock();
        mock.expect_env_var().return_const(None);
        mock.expect_read_to_string().return_const(None);
        mock.expect_kernel_release()
            .times(1)
            .return_const(Some("4.4.0-19041-Microsoft".to_string()));

        assert!(is_wsl(&mock));
    }

    #[test]
    fn test_not_wsl_on_plain_linux() {
        let mut mock = linux_mock();
        mock.expect_env_var().return_const(None);
        mock.expect_read_to_string()
            .return_const(Some("Linux version 6.8.0-generic".to_string()));
        mock.expect_kernel_release()
            .return_const(Some("6.8.0-generic".to_string()));

        assert!(!is_wsl(&mock));
    }

    #[test]
    fn test_wsl_never_on_windows() {
        let mut mock = MockSystemProbe::new();
        mock.expect_target_os().return_const("windows".to_string());
        mock.expect_env_var().never();

        assert!(!is_wsl(&mock));
        assert!(is_windows(&mock));
    }

    #[test]
    fn test_termux_from_prefix() {
        let mut mock = linux_mock();
        mock.expect_env_var()
            .returning(|name| (name == "PREFIX").then(|| TERMUX_PREFIX.to_string()));
        mock.expect_is_dir().never();

        assert!(is_termux(&mock));
    }

    #[test]
    fn test_termux_from_marker_directory() {
        let mut mock = linux_mock();
        mock.expect_env_var().return_const(None);
        mock.expect_is_dir()
            .withf(|p| p == Path::new(TERMUX_PREFIX))
            .return_const(true);

        assert!(is_termux(&mock));
    }

    #[test]
    fn test_android_requires_both_env_markers() {
        let mut mock = linux_mock();
        mock.expect_env_var()
            .returning(|name| (name == "ANDROID_ROOT").then(|| "/system".to_string()));
        mock.expect_path_exists().return_const(false);
        mock.expect_kernel_release()
            .return_const(Some("6.1.0".to_string()));

        assert!(!is_android(&mock));
    }

    #[test]
    fn test_android_from_build_prop() {
        let mut mock = linux_mock();
        mock.expect_env_var().return_const(None);
        mock.expect_path_exists()
            .withf(|p| p == Path::new(ANDROID_BUILD_PROP))
            .return_const(true);

        assert!(is_android(&mock));
    }

    #[test]
    fn test_android_target_os() {
        let mut mock = MockSystemProbe::new();
        mock.expect_target_os().return_const("android".to_string());
        assert!(is_android(&mock));
        assert!(is_linux(&mock));
    }

    #[test]
    fn test_ish_needs_both_directories() {
        let mut mock = linux_mock();
        mock.expect_is_dir()
            .returning(|p| p == Path::new(ISH_APK_DIR));
        assert!(!is_ish_alpine(&mock));

        let mut mock = linux_mock();
        mock.expect_is_dir().return_const(true);
        assert!(is_ish_alpine(&mock));
    }

    #[test]
    fn test_mobile_ide_from_interpreter() {
        let mut mock = linux_mock();
        mock.expect_env_var().return_const(None);
        mock.expect_is_dir().never();
        let interp = PathBuf::from("/data/user/0/ru.iiec.pydroid3/files/aarch64-linux-android/bin/python3");

        assert!(is_sandboxed_mobile_ide(&mock, true, Some(&interp)));
        assert!(!is_sandboxed_mobile_ide(&mock, false, Some(&interp)));
    }

    #[test]
    fn test_mobile_ide_absent() {
        let mut mock = linux_mock();
        mock.expect_env_var()
            .returning(|name| (name == "HOME").then(|| "/home/user".to_string()));
        mock.expect_is_dir().return_const(false);

        assert!(!is_sandboxed_mobile_ide(&mock, true, Some(Path::new("/usr/bin/python3"))));
    }
}
