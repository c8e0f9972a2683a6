mod common;

use common::FakeSystem;
use habitat::{PlatformIdentifier, PlatformTag};
use std::path::PathBuf;

fn identify(system: FakeSystem) -> PlatformIdentifier {
    PlatformIdentifier::with_system(system, None)
}

#[test]
fn test_exactly_one_family() {
    for os in ["windows", "macos", "linux", "freebsd"] {
        let platform = identify(FakeSystem::new(os));
        let families = [
            platform.is_windows(),
            platform.is_macos(),
            platform.is_linux(),
            platform.is_freebsd(),
        ];
        assert_eq!(families.iter().filter(|hit| **hit).count(), 1, "{os}");
        assert_eq!(platform.variant(), None, "{os}");
    }
}

#[test]
fn test_wsl_from_environment_and_proc() {
    let from_env = identify(FakeSystem::new("linux").env("WSL_DISTRO_NAME", "Ubuntu"));
    assert!(from_env.is_wsl());

    let from_proc = identify(FakeSystem::new("linux").file(
        "/proc/version",
        "Linux version 5.15.90.1-microsoft-standard-WSL2",
    ));
    assert!(from_proc.is_wsl());
    assert_eq!(from_proc.identify().to_string(), "Linux (WSL)");

    let from_kernel = identify(FakeSystem::new("linux").kernel("6.6.36.6-microsoft-standard-WSL2"));
    assert!(from_kernel.is_wsl());

    // The marker variables mean nothing outside a Linux kernel.
    let windows = identify(FakeSystem::new("windows").env("WSL_DISTRO_NAME", "Ubuntu"));
    assert!(!windows.is_wsl());
}

#[test]
fn test_termux_is_linux_and_android() {
    let platform = identify(
        FakeSystem::new("linux")
            .env("PREFIX", "/data/data/com.termux/files/usr")
            .env("ANDROID_ROOT", "/system")
            .env("ANDROID_DATA", "/data"),
    );

    assert!(platform.is_linux());
    assert!(platform.is_termux());
    assert!(platform.is_android());
    assert_eq!(platform.family(), Some(PlatformTag::Linux));
    assert_eq!(platform.variant(), Some(PlatformTag::Termux));
}

#[test]
fn test_ish_needs_both_markers() {
    let alpine = identify(FakeSystem::new("linux").dir("/etc/apk"));
    assert!(!alpine.is_ish_alpine());

    let ish = identify(FakeSystem::new("linux").dir("/etc/apk").dir("/proc/ish"));
    assert!(ish.is_ish_alpine());
    assert_eq!(ish.variant(), Some(PlatformTag::IshAlpine));
}

#[test]
fn test_mobile_ide_from_interpreter_path() {
    let platform = PlatformIdentifier::with_system(
        FakeSystem::new("linux").file("/system/build.prop", "ro.build.version.sdk=33"),
        Some(PathBuf::from(
            "/data/user/0/ru.iiec.pydroid3/files/aarch64-linux-android/bin/python",
        )),
    );

    assert!(platform.is_android());
    assert!(platform.is_sandboxed_mobile_ide());
    assert_eq!(platform.variant(), Some(PlatformTag::SandboxedMobileIde));
}

#[test]
fn test_mobile_ide_requires_android() {
    let platform = PlatformIdentifier::with_system(
        FakeSystem::new("linux"),
        Some(PathBuf::from("/home/user/pydroid/bin/python")),
    );
    assert!(!platform.is_android());
    assert!(!platform.is_sandboxed_mobile_ide());
}

#[test]
fn test_reset_keeps_answers_consistent() {
    let platform = identify(FakeSystem::new("macos"));
    let before = platform.identify();
    platform.reset();
    assert_eq!(platform.identify(), before);
    assert_eq!(before.to_string(), "macOS");
}
